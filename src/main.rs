//! Command-line interface for the LIS parser.
//!
//! This binary converts LIS tapes to flat binary datasets or Parquet.

use anyhow::Result;
use clap::{Parser, ValueEnum};
use lis_parser::{
    DatWriter, Dialect, LisReader, LisReaderBuilder, LogProgress, OutputFormat, ParquetWriter,
};
use log::{info, LevelFilter};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

const TAPE_EXTENSIONS: [&str; 3] = ["lis", "nti", "tif"];

#[derive(Debug, Clone, Copy, ValueEnum)]
enum FormatArg {
    Dat,
    Parquet,
}

impl From<FormatArg> for OutputFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Dat => OutputFormat::Dat,
            FormatArg::Parquet => OutputFormat::Parquet,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum DialectArg {
    Auto,
    Blocked,
    Unblocked,
}

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Convert LIS well-logging tapes to depth-indexed datasets",
    long_about = "Decodes LIS tapes (.lis, .nti, .tif) into one dataset per samples-per-frame group.\n\n\
                  Datasets are written as flat little-endian f32 rows (depth in meters, then values) \
                  or as Apache Parquet."
)]
struct Args {
    /// A tape file, or a directory containing .lis/.nti/.tif files
    #[arg(value_name = "IN")]
    input: PathBuf,

    /// Root output directory
    #[arg(short, long, value_name = "OUT_ROOT")]
    out_root: PathBuf,

    /// Output format
    #[arg(short, long, value_enum, default_value = "dat")]
    format: FormatArg,

    /// Number of rows per Parquet file chunk
    #[arg(long, default_value = "50000")]
    chunk_size: usize,

    /// Physical framing of the input
    #[arg(long, value_enum, default_value = "auto")]
    dialect: DialectArg,

    /// Extract this logical file instead of the longest one
    #[arg(long, value_name = "N")]
    logical_file: Option<usize>,

    /// Print the record index and channel table instead of converting
    #[arg(long)]
    list: bool,
}

fn open(input_file: &Path, args: &Args) -> Result<LisReader> {
    let mut builder = LisReaderBuilder::new();
    match args.dialect {
        DialectArg::Auto => {}
        DialectArg::Blocked => builder = builder.dialect(Dialect::Blocked),
        DialectArg::Unblocked => builder = builder.dialect(Dialect::Unblocked),
    }
    if let Some(n) = args.logical_file {
        builder = builder.logical_file(n);
    }
    Ok(builder.from_file_with_progress(input_file, &mut LogProgress::new())?)
}

fn list_one_file(input_file: &Path, args: &Args) -> Result<()> {
    info!("📄 {}", input_file.display());
    let reader = open(input_file, args)?;

    info!(
        "   ├─ {} dialect, {} logical records in {} blocks",
        reader.dialect().name(),
        reader.index().len(),
        reader.index().block_count()
    );
    if let Some(err) = reader.index().scan_error() {
        info!("   ├─ Index incomplete: {}", err);
    }
    for (record_type, count) in reader.index().type_counts() {
        info!(
            "   ├─ {:>6} x {:<28} (type {})",
            count,
            record_type.name(),
            record_type.code()
        );
    }
    for (n, file) in reader.logical_files().iter().enumerate() {
        let marker = if Some(n) == reader.active_file_index() { "*" } else { " " };
        info!(
            "   ├─ {}logical file {}: data records {}..={} ({} records)",
            marker,
            n,
            file.first_data_record,
            file.last_data_record,
            file.data_record_count()
        );
    }

    let (format, layout) = reader.plan()?;
    info!(
        "   ├─ Direction {:?}, depth {:?} in {}, spacing {} {}, absent {}",
        format.spec.direction,
        format.spec.depth_mode,
        format.depth_units(),
        format.spec.frame_spacing,
        format.spec.frame_spacing_units,
        format.spec.absent_value
    );
    for channel in &format.channels {
        let dataset = channel
            .dataset
            .map(|slot| slot.dataset.to_string())
            .unwrap_or_else(|| "-".to_string());
        info!(
            "   ├─ {:<6} {:<6} code {:>2} size {:>5} samples {:>3} items {:>4} dataset {}{}",
            channel.mnemonic,
            channel.units,
            channel.repr_code,
            channel.size,
            channel.samples,
            channel.items_per_frame,
            dataset,
            if channel.fast { " (fast)" } else { "" }
        );
    }
    info!("   └─ {} dataset(s)\n", layout.datasets.len());
    Ok(())
}

fn convert_one_file(input_file: &Path, output_dir: &Path, args: &Args) -> Result<()> {
    info!("📄 Processing: {}", input_file.display());

    let start_time = Instant::now();
    let reader = open(input_file, args)?;
    info!(
        "   ├─ {} dialect, {} logical records, {} logical file(s)",
        reader.dialect().name(),
        reader.index().len(),
        reader.logical_files().len()
    );

    let t0 = Instant::now();
    let extraction = reader.extract_with_progress(&mut LogProgress::new())?;
    info!(
        "   ├─ Decoded {} frames from {} records in {:.2?} ({} skipped)",
        extraction.frames,
        extraction.records_processed,
        t0.elapsed(),
        extraction.records_skipped
    );

    let t1 = Instant::now();
    let stats = match OutputFormat::from(args.format) {
        OutputFormat::Dat => DatWriter::new(output_dir).write(&extraction)?,
        OutputFormat::Parquet => ParquetWriter::new(output_dir)
            .chunk_size(args.chunk_size)
            .write(&extraction)?,
    };

    info!("   ├─ Wrote output in {:.2?}", t1.elapsed());
    info!("   ├─ {}", stats.summary());
    info!("   └─ ✓ Total time: {:.2?}\n", start_time.elapsed());

    Ok(())
}

fn is_tape(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| TAPE_EXTENSIONS.iter().any(|t| ext.eq_ignore_ascii_case(t)))
        .unwrap_or(false)
}

fn main() -> Result<()> {
    // Initialize logger
    env_logger::Builder::new()
        .filter_level(LevelFilter::Info)
        .format_timestamp(None)
        .init();

    let args = Args::parse();

    let tape_files: Vec<PathBuf> = if args.input.is_dir() {
        let mut files: Vec<PathBuf> = fs::read_dir(&args.input)?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.is_file() && is_tape(path))
            .collect();
        files.sort();
        files
    } else if args.input.is_file() {
        vec![args.input.clone()]
    } else {
        anyhow::bail!("'{}' is not a file or directory", args.input.display());
    };

    if tape_files.is_empty() {
        info!("No .lis/.nti/.tif files found in {}", args.input.display());
        return Ok(());
    }

    info!(
        "📂 Found {} tape file(s) in {}",
        tape_files.len(),
        args.input.display()
    );
    if !args.list {
        info!("📁 Output directory: {}", args.out_root.display());
    }
    info!("");

    let total_start = Instant::now();

    for (idx, input_file) in tape_files.iter().enumerate() {
        let file_name = input_file
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("unknown");

        info!("[{}/{}]", idx + 1, tape_files.len());

        let result = if args.list {
            list_one_file(input_file, &args)
        } else {
            let output_dir = args.out_root.join(format!("filename={}", file_name));
            fs::create_dir_all(&output_dir)?;
            convert_one_file(input_file, &output_dir, &args)
        };

        if let Err(e) = result {
            log::error!("   └─ ✗ Error: {}", e);
            log::error!("");
            continue;
        }
    }

    info!("🏁 All files processed in {:.2?}", total_start.elapsed());

    Ok(())
}

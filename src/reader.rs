//! High-level API for reading LIS tapes.

use crate::error::{Error, Result};
use crate::extract::FrameExtractor;
use crate::format_spec::DataFormat;
use crate::index::{Dialect, RecordIndex};
use crate::models::{DatasetLayout, Extraction, LogicalFile, RecordType};
use crate::planner::plan_datasets;
use crate::progress::{NoProgress, ProgressSink};
use crate::segment::{segment, select_active};
use log::info;
use memmap2::Mmap;
use std::fs::File;
use std::path::Path;

enum Source {
    Mapped(Mmap),
    Owned(Vec<u8>),
}

impl Source {
    fn bytes(&self) -> &[u8] {
        match self {
            Source::Mapped(mmap) => &mmap[..],
            Source::Owned(data) => &data[..],
        }
    }
}

/// A reader for LIS tape files.
///
/// Opening a tape indexes every logical record and splits the data
/// records into logical files. Decoding happens in [`LisReader::extract`].
///
/// # Examples
///
/// ```no_run
/// use lis_parser::LisReader;
///
/// let reader = LisReader::from_file("well.lis")?;
/// let extraction = reader.extract()?;
/// println!("{} rows", extraction.total_rows());
/// # Ok::<(), lis_parser::Error>(())
/// ```
pub struct LisReader {
    source: Source,
    index: RecordIndex,
    files: Vec<LogicalFile>,
    active: Option<usize>,
}

impl LisReader {
    /// Open and index a tape file.
    ///
    /// The file is memory-mapped for the lifetime of the reader and the
    /// dialect is sniffed from its first bytes.
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the `.lis` or `.tif` tape
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The file cannot be opened or mapped
    /// - The file is too short to be a LIS tape
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use lis_parser::LisReader;
    ///
    /// let reader = LisReader::from_file("well.lis")?;
    /// println!("{} logical files", reader.logical_files().len());
    /// # Ok::<(), lis_parser::Error>(())
    /// ```
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        LisReaderBuilder::new().from_file(path)
    }

    /// Index a tape held in memory.
    ///
    /// # Arguments
    ///
    /// * `data` - Complete tape contents
    ///
    /// # Errors
    ///
    /// Returns an error if the data is too short to sniff a dialect.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use lis_parser::LisReader;
    ///
    /// let data = std::fs::read("well.lis")?;
    /// let reader = LisReader::from_bytes(data)?;
    /// println!("{} dialect", reader.dialect().name());
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn from_bytes(data: Vec<u8>) -> Result<Self> {
        LisReaderBuilder::new().from_bytes(data)
    }

    fn open(
        source: Source,
        dialect: Option<Dialect>,
        logical_file: Option<usize>,
        progress: &mut dyn ProgressSink,
    ) -> Result<Self> {
        let data = source.bytes();
        let dialect = match dialect {
            Some(dialect) => dialect,
            None => Dialect::detect(data)?,
        };

        let index = RecordIndex::build_with_progress(data, dialect, progress);
        let files = segment(&index);
        let active = match logical_file {
            Some(n) if n < files.len() => Some(n),
            Some(n) => {
                return Err(Error::Other(format!(
                    "logical file {} requested but the tape holds {}",
                    n,
                    files.len()
                )))
            }
            None => select_active(&index, &files),
        };

        info!(
            "Indexed {} logical records ({} dialect), {} logical files",
            index.len(),
            dialect.name(),
            files.len()
        );

        Ok(Self {
            source,
            index,
            files,
            active,
        })
    }

    /// Raw tape bytes.
    pub fn data(&self) -> &[u8] {
        self.source.bytes()
    }

    /// Dialect the tape was indexed with.
    pub fn dialect(&self) -> Dialect {
        self.index.dialect()
    }

    pub fn index(&self) -> &RecordIndex {
        &self.index
    }

    /// Logical files in tape order.
    pub fn logical_files(&self) -> &[LogicalFile] {
        &self.files
    }

    /// Position of the active file in [`LisReader::logical_files`], if any.
    pub fn active_file_index(&self) -> Option<usize> {
        self.active
    }

    /// The logical file that will be extracted.
    ///
    /// # Errors
    ///
    /// `EmptyActiveFile` when the tape holds no data records.
    pub fn active_file(&self) -> Result<&LogicalFile> {
        self.active
            .and_then(|n| self.files.get(n))
            .ok_or(Error::EmptyActiveFile)
    }

    /// Index of the format specification record that describes the active
    /// logical file.
    ///
    /// The first one attributed to the file wins; otherwise the closest one
    /// before its first data record.
    pub fn format_spec_record(&self) -> Result<usize> {
        let file = self.active_file()?;
        if let Some(&record) = file.records_of(RecordType::DataFormatSpec).first() {
            return Ok(record);
        }
        self.index.records()[..file.first_data_record]
            .iter()
            .rposition(|r| r.record_type == RecordType::DataFormatSpec)
            .ok_or(Error::MissingFormatSpec)
    }

    /// Decode the format specification of the active logical file.
    pub fn data_format(&self) -> Result<DataFormat> {
        let file = self.active_file()?;
        let payload = self.index.payload(self.data(), self.format_spec_record()?)?;
        let reference = self
            .index
            .record(file.first_data_record)
            .map(|r| r.total_length as usize);
        DataFormat::parse(&payload, reference)
    }

    /// Decode the format specification and plan the output datasets.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The format specification is missing or malformed
    /// - The frame spacing unit cannot be converted to meters
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use lis_parser::LisReader;
    ///
    /// let reader = LisReader::from_file("well.lis")?;
    /// let (format, layout) = reader.plan()?;
    /// for dataset in &layout.datasets {
    ///     println!("dataset {}: {} channels", dataset.index, dataset.channels.len());
    /// }
    /// println!("{} channels in the spec", format.channels.len());
    /// # Ok::<(), lis_parser::Error>(())
    /// ```
    pub fn plan(&self) -> Result<(DataFormat, DatasetLayout)> {
        let mut format = self.data_format()?;
        let spacing = format.frame_spacing_meters()?;
        let layout = plan_datasets(&mut format, spacing);
        Ok((format, layout))
    }

    /// Extract every dataset of the active logical file.
    ///
    /// # Errors
    ///
    /// Fails when the active file is empty, has no format specification or
    /// no decodable channels, or when depth cannot be converted to meters.
    /// Corrupt data records are skipped and counted instead.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use lis_parser::LisReader;
    ///
    /// let extraction = LisReader::from_file("well.lis")?.extract()?;
    /// println!(
    ///     "{} frames, {} records skipped",
    ///     extraction.frames, extraction.records_skipped
    /// );
    /// # Ok::<(), lis_parser::Error>(())
    /// ```
    pub fn extract(&self) -> Result<Extraction> {
        self.extract_with_progress(&mut NoProgress)
    }

    /// Extract the active logical file, reporting each data record to `progress`.
    ///
    /// # Arguments
    ///
    /// * `progress` - Receives [`Stage::Extracting`](crate::Stage) updates
    ///
    /// # Errors
    ///
    /// Same as [`LisReader::extract`].
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use lis_parser::{LisReader, LogProgress};
    ///
    /// let reader = LisReader::from_file("well.lis")?;
    /// let extraction = reader.extract_with_progress(&mut LogProgress::new())?;
    /// # Ok::<(), lis_parser::Error>(())
    /// ```
    pub fn extract_with_progress(&self, progress: &mut dyn ProgressSink) -> Result<Extraction> {
        let file = self.active_file()?;
        let (format, layout) = self.plan()?;
        let extractor = FrameExtractor::new(self.data(), &self.index, &format, &layout)?;
        extractor.run(file, progress)
    }
}

/// Builder for configuring how a tape is opened.
///
/// # Examples
///
/// ```no_run
/// use lis_parser::{Dialect, LisReaderBuilder};
///
/// let reader = LisReaderBuilder::new()
///     .dialect(Dialect::Blocked)
///     .logical_file(1)
///     .from_file("well.tif")?;
/// # Ok::<(), lis_parser::Error>(())
/// ```
#[derive(Debug, Default, Clone, Copy)]
pub struct LisReaderBuilder {
    dialect: Option<Dialect>,
    logical_file: Option<usize>,
}

impl LisReaderBuilder {
    /// Builder that sniffs the dialect and picks the widest logical file.
    pub fn new() -> Self {
        Self::default()
    }

    /// Force a dialect instead of sniffing it.
    ///
    /// # Arguments
    ///
    /// * `dialect` - Physical framing of the tape
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use lis_parser::{Dialect, LisReaderBuilder};
    ///
    /// let reader = LisReaderBuilder::new()
    ///     .dialect(Dialect::Unblocked)
    ///     .from_file("well.lis")?;
    /// # Ok::<(), lis_parser::Error>(())
    /// ```
    pub fn dialect(mut self, dialect: Dialect) -> Self {
        self.dialect = Some(dialect);
        self
    }

    /// Extract logical file `n` instead of the one with the widest span.
    ///
    /// # Arguments
    ///
    /// * `n` - Zero-based position in [`LisReader::logical_files`]
    ///
    /// Opening fails if the tape holds fewer than `n + 1` logical files.
    pub fn logical_file(mut self, n: usize) -> Self {
        self.logical_file = Some(n);
        self
    }

    /// Open and index a tape file with this configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The file cannot be opened or mapped
    /// - No dialect is forced and the file is too short to sniff one
    /// - The requested logical file does not exist
    pub fn from_file<P: AsRef<Path>>(self, path: P) -> Result<LisReader> {
        self.from_file_with_progress(path, &mut NoProgress)
    }

    /// Open a tape file, reporting indexing progress to `progress`.
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the tape
    /// * `progress` - Receives [`Stage::Indexing`](crate::Stage) updates
    ///
    /// # Errors
    ///
    /// Same as [`LisReaderBuilder::from_file`].
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use lis_parser::{LisReaderBuilder, LogProgress};
    ///
    /// let reader = LisReaderBuilder::new()
    ///     .from_file_with_progress("well.lis", &mut LogProgress::new())?;
    /// # Ok::<(), lis_parser::Error>(())
    /// ```
    pub fn from_file_with_progress<P: AsRef<Path>>(
        self,
        path: P,
        progress: &mut dyn ProgressSink,
    ) -> Result<LisReader> {
        let file = File::open(path.as_ref())?;
        let mmap = unsafe { Mmap::map(&file)? };
        LisReader::open(Source::Mapped(mmap), self.dialect, self.logical_file, progress)
    }

    /// Index an in-memory tape with this configuration.
    ///
    /// # Errors
    ///
    /// Same as [`LisReaderBuilder::from_file`], minus the I/O cases.
    pub fn from_bytes(self, data: Vec<u8>) -> Result<LisReader> {
        LisReader::open(Source::Owned(data), self.dialect, self.logical_file, &mut NoProgress)
    }
}

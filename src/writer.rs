//! High-level API for writing extracted datasets.

use crate::error::{Error, Result};
use crate::formats::dat::DatFormatter;
use crate::formats::parquet::ParquetFormatter;
use crate::models::Extraction;
use crate::progress::{NoProgress, ProgressSink, Stage};
use std::path::{Path, PathBuf};

/// Writer for the flat binary dataset layout.
///
/// Every dataset becomes `Dataset_<i>.dat`: fixed-width little-endian rows
/// of one `f32` depth in meters followed by the dataset's `f32` values in
/// channel order. Absent values are NaN. A `datasets.json` manifest
/// describes the columns of each file.
///
/// # Examples
///
/// ```no_run
/// use lis_parser::{DatWriter, LisReader};
///
/// let extraction = LisReader::from_file("well.lis")?.extract()?;
/// let stats = DatWriter::new("./output").write(&extraction)?;
/// println!("{}", stats.summary());
/// # Ok::<(), lis_parser::Error>(())
/// ```
pub struct DatWriter {
    output_directory: PathBuf,
    manifest: bool,
}

impl DatWriter {
    /// Create a new DAT writer that will write to the specified directory.
    ///
    /// The directory is created on the first write if it does not exist.
    ///
    /// # Arguments
    ///
    /// * `output_directory` - Directory where `.dat` files will be written
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use lis_parser::DatWriter;
    ///
    /// let writer = DatWriter::new("./output");
    /// ```
    pub fn new<P: AsRef<Path>>(output_directory: P) -> Self {
        Self {
            output_directory: output_directory.as_ref().to_path_buf(),
            manifest: true,
        }
    }

    /// Whether to write `datasets.json` next to the data files.
    ///
    /// Default is true.
    ///
    /// # Arguments
    ///
    /// * `enabled` - Write the manifest when true
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use lis_parser::DatWriter;
    ///
    /// let writer = DatWriter::new("./output").manifest(false);
    /// ```
    pub fn manifest(mut self, enabled: bool) -> Self {
        self.manifest = enabled;
        self
    }

    /// Write every dataset of an extraction as a `.dat` file.
    ///
    /// # Arguments
    ///
    /// * `extraction` - Datasets produced by [`LisReader::extract`](crate::LisReader::extract)
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The output directory cannot be created
    /// - A data file or the manifest cannot be written
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use lis_parser::{DatWriter, LisReader};
    ///
    /// let extraction = LisReader::from_file("well.lis")?.extract()?;
    /// let stats = DatWriter::new("./output").write(&extraction)?;
    /// assert_eq!(stats.datasets, extraction.datasets.len());
    /// # Ok::<(), lis_parser::Error>(())
    /// ```
    pub fn write(self, extraction: &Extraction) -> Result<WriteStats> {
        self.write_with_progress(extraction, &mut NoProgress)
    }

    /// Write every dataset, reporting one step per dataset to `progress`.
    ///
    /// # Arguments
    ///
    /// * `extraction` - Datasets to write
    /// * `progress` - Receives [`Stage::Writing`] updates
    ///
    /// # Errors
    ///
    /// Same as [`DatWriter::write`].
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use lis_parser::{DatWriter, LisReader, LogProgress};
    ///
    /// let extraction = LisReader::from_file("well.lis")?.extract()?;
    /// DatWriter::new("./output").write_with_progress(&extraction, &mut LogProgress::new())?;
    /// # Ok::<(), lis_parser::Error>(())
    /// ```
    pub fn write_with_progress(
        self,
        extraction: &Extraction,
        progress: &mut dyn ProgressSink,
    ) -> Result<WriteStats> {
        let formatter = DatFormatter::new(&self.output_directory);
        progress.start(Stage::Writing, extraction.datasets.len() as u64);

        let mut files = 0;
        for (n, dataset) in extraction.datasets.iter().enumerate() {
            formatter
                .write_dataset(dataset)
                .map_err(|e| Error::OutputError(e.to_string()))?;
            files += 1;
            progress.advance(Stage::Writing, n as u64 + 1);
        }

        if self.manifest {
            formatter
                .write_manifest(&extraction.datasets)
                .map_err(|e| Error::OutputError(e.to_string()))?;
        }

        Ok(WriteStats {
            datasets: extraction.datasets.len(),
            rows: extraction.total_rows(),
            files,
        })
    }
}

/// Writer for outputting datasets to Apache Parquet format.
///
/// Each dataset gets its own directory of `file_partNNN.parquet` chunks with
/// a `DEPTH` column followed by one column per channel. Channels with more
/// than one item per sample are list columns. Absent values are nulls.
///
/// # Examples
///
/// ```no_run
/// use lis_parser::{LisReader, ParquetWriter};
///
/// let extraction = LisReader::from_file("well.lis")?.extract()?;
/// ParquetWriter::new("./output")
///     .chunk_size(100_000)
///     .write(&extraction)?;
/// # Ok::<(), lis_parser::Error>(())
/// ```
pub struct ParquetWriter {
    output_directory: PathBuf,
    chunk_size: usize,
}

impl ParquetWriter {
    /// Create a new Parquet writer that will write to the specified directory.
    ///
    /// # Arguments
    ///
    /// * `output_directory` - Directory where the per-dataset folders will be created
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use lis_parser::ParquetWriter;
    ///
    /// let writer = ParquetWriter::new("./output");
    /// ```
    pub fn new<P: AsRef<Path>>(output_directory: P) -> Self {
        Self {
            output_directory: output_directory.as_ref().to_path_buf(),
            chunk_size: 50_000,
        }
    }

    /// Set the number of rows per Parquet file.
    ///
    /// Default is 50,000 rows per file.
    ///
    /// # Arguments
    ///
    /// * `size` - Maximum rows in each `file_partNNN.parquet`
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use lis_parser::ParquetWriter;
    ///
    /// let writer = ParquetWriter::new("./output").chunk_size(10_000);
    /// ```
    pub fn chunk_size(mut self, size: usize) -> Self {
        self.chunk_size = size;
        self
    }

    /// Write every non-empty dataset as chunked Parquet files.
    ///
    /// # Arguments
    ///
    /// * `extraction` - Datasets produced by [`LisReader::extract`](crate::LisReader::extract)
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - A dataset directory cannot be created
    /// - Arrow batch construction fails
    /// - Parquet encoding or file I/O fails
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use lis_parser::{LisReader, ParquetWriter};
    ///
    /// let extraction = LisReader::from_file("well.lis")?.extract()?;
    /// let stats = ParquetWriter::new("./output").write(&extraction)?;
    /// println!("{}", stats.summary());
    /// # Ok::<(), lis_parser::Error>(())
    /// ```
    pub fn write(self, extraction: &Extraction) -> Result<WriteStats> {
        self.write_with_progress(extraction, &mut NoProgress)
    }

    /// Write every dataset, reporting one step per dataset to `progress`.
    ///
    /// # Arguments
    ///
    /// * `extraction` - Datasets to write
    /// * `progress` - Receives [`Stage::Writing`] updates
    ///
    /// # Errors
    ///
    /// Same as [`ParquetWriter::write`].
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use lis_parser::{LisReader, LogProgress, ParquetWriter};
    ///
    /// let extraction = LisReader::from_file("well.lis")?.extract()?;
    /// ParquetWriter::new("./output").write_with_progress(&extraction, &mut LogProgress::new())?;
    /// # Ok::<(), lis_parser::Error>(())
    /// ```
    pub fn write_with_progress(
        self,
        extraction: &Extraction,
        progress: &mut dyn ProgressSink,
    ) -> Result<WriteStats> {
        let formatter = ParquetFormatter::new(&self.output_directory, self.chunk_size);
        progress.start(Stage::Writing, extraction.datasets.len() as u64);

        let mut files = 0;
        for (n, dataset) in extraction.datasets.iter().enumerate() {
            files += formatter
                .convert(dataset)
                .map_err(|e| Error::OutputError(e.to_string()))?;
            progress.advance(Stage::Writing, n as u64 + 1);
        }

        Ok(WriteStats {
            datasets: extraction.datasets.len(),
            rows: extraction.total_rows(),
            files,
        })
    }
}

/// Statistics about a write operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteStats {
    pub datasets: usize,
    /// Rows across all datasets
    pub rows: usize,
    /// Data files created
    pub files: usize,
}

impl WriteStats {
    /// Get a human-readable summary of the write operation.
    pub fn summary(&self) -> String {
        format!(
            "Wrote {} rows from {} dataset(s) across {} file(s)",
            self.rows, self.datasets, self.files
        )
    }
}

//! Error types for the LIS decoder library.

use thiserror::Error;

/// Result type alias for LIS operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur when indexing, decoding or writing LIS tapes.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error occurred while reading or writing
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The input is not a LIS tape at all (e.g. too short to sniff a dialect)
    #[error("Invalid LIS file: {0}")]
    InvalidFormat(String),

    /// Bad length or continuation bits while indexing
    #[error("Malformed physical record header at offset {offset}: {reason}")]
    MalformedHeader { offset: u64, reason: String },

    /// Representation code outside the supported set
    #[error("Unsupported representation code {0}")]
    UnsupportedCode(u8),

    /// Format specification payload shorter than its structure requires
    #[error("Truncated format specification record: needed {needed} bytes, {available} available")]
    TruncatedFormatSpec { needed: usize, available: usize },

    /// Record or field payload shorter than its structure requires
    #[error("Truncated record: needed {needed} bytes, {available} available")]
    TruncatedRecord { needed: usize, available: usize },

    /// Depth or spacing unit with no conversion to meters
    #[error("Unknown depth unit '{0}'")]
    UnknownDepthUnit(String),

    /// The selected logical file has no data records
    #[error("No data records in the active logical file")]
    EmptyActiveFile,

    /// No format specification record could be tied to the active logical file
    #[error("No data format specification record for the active logical file")]
    MissingFormatSpec,

    /// The format specification defines no channels
    #[error("Data format specification defines no channels")]
    NoChannels,

    /// Frame layout cannot be used for extraction
    #[error("Invalid frame layout: {0}")]
    InvalidFrame(String),

    /// Output format error (e.g. Parquet write error)
    #[error("Output error: {0}")]
    OutputError(String),

    /// Generic error with message
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Whether the error only invalidates the record being decoded.
    ///
    /// The frame extractor skips a data record on a recoverable error and
    /// keeps going; anything else stops the extraction.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::UnsupportedCode(_) | Error::TruncatedRecord { .. }
        )
    }
}

impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Error::Other(err.to_string())
    }
}

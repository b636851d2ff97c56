//! # LIS Parser
//!
//! A Rust library for decoding LIS well-logging tapes (`.lis`, `.nti`, `.tif`)
//! into depth-indexed datasets and writing them out as flat binary files or
//! Apache Parquet.
//!
//! ## Features
//!
//! - **Both tape dialects**: bare physical records and tape-image files with
//!   12-byte tape position blocks, sniffed automatically
//! - **Memory-mapped input**: records are reassembled straight from the map
//! - **Exact decoding**: LIS 16 and 32-bit floats and every integer code
//! - **Depth ordered output**: up-logged passes come out with depth increasing
//! - **Fault tolerant**: a corrupt data record is skipped, not fatal
//!
//! ## Quick Start
//!
//! ```no_run
//! use lis_parser::{LisReader, DatWriter};
//!
//! let reader = LisReader::from_file("well.lis")?;
//! let extraction = reader.extract()?;
//!
//! println!("Decoded {} frames", extraction.frames);
//!
//! let stats = DatWriter::new("output_directory").write(&extraction)?;
//! println!("{}", stats.summary());
//! # Ok::<(), lis_parser::Error>(())
//! ```
//!
//! ## Datasets
//!
//! Channels are grouped by their samples per frame. Every group becomes one
//! dataset with its own depth step, so a tape with ordinary curves and a
//! four times oversampled curve yields two datasets. Depths are in meters.
//!
//! ```no_run
//! use lis_parser::LisReader;
//!
//! let reader = LisReader::from_file("well.lis")?;
//! let (format, layout) = reader.plan()?;
//!
//! for plan in &layout.datasets {
//!     let names: Vec<&str> = plan
//!         .channels
//!         .iter()
//!         .map(|&c| format.channels[c].mnemonic.as_str())
//!         .collect();
//!     println!("{} samples/frame, step {} m: {:?}", plan.samples_per_frame, plan.step, names);
//! }
//! # Ok::<(), lis_parser::Error>(())
//! ```
//!
//! ## Low-Level Access
//!
//! The record index is available for inspecting the raw tape structure:
//!
//! ```no_run
//! use lis_parser::LisReader;
//!
//! let reader = LisReader::from_file("well.tif")?;
//! for (record_type, count) in reader.index().type_counts() {
//!     println!("{:>5} x {}", count, record_type.name());
//! }
//! # Ok::<(), lis_parser::Error>(())
//! ```
//!
//! ## Error Handling
//!
//! ```no_run
//! use lis_parser::{Error, LisReader};
//!
//! match LisReader::from_file("well.lis").and_then(|r| r.extract()) {
//!     Ok(extraction) => println!("{} rows", extraction.total_rows()),
//!     Err(Error::UnknownDepthUnit(unit)) => eprintln!("Cannot convert '{}' to meters", unit),
//!     Err(Error::EmptyActiveFile) => eprintln!("Tape holds no data"),
//!     Err(err) => eprintln!("Error: {}", err),
//! }
//! # Ok::<(), lis_parser::Error>(())
//! ```

// Public API modules
pub mod error;
pub mod reader;
pub mod writer;

// Re-export commonly used types
pub use error::{Error, Result};
pub use index::{Dialect, RecordIndex};
pub use reader::{LisReader, LisReaderBuilder};
pub use writer::{DatWriter, ParquetWriter, WriteStats};

// Re-export models for users who need them
pub use format_spec::DataFormat;
pub use models::{Dataset, Direction, Extraction, OutputFormat, RecordType};
pub use progress::{LogProgress, NoProgress, ProgressSink, Stage};

// Decoding pipeline (public but not part of the high-level API)
pub mod extract;
pub mod format_spec;
pub mod formats;
pub mod index;
pub mod models;
pub mod planner;
pub mod progress;
pub mod repr;
pub mod segment;
pub mod units;

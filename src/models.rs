use serde::Serialize;
use std::collections::BTreeMap;
use std::ops::RangeInclusive;

use crate::repr::{ReprCode, REPR_FLOAT32};

pub const FIRST_HEADER_LEN: usize = 6;
pub const CONTINUATION_HEADER_LEN: usize = 4;

pub const ATTR_FILE_NUMBER: u8 = 0x4;
pub const ATTR_RECORD_NUMBER: u8 = 0x2;
const ATTR_SUCCESSOR: u8 = 0x1;

/// Channels with at least this many items per frame sample are flagged fast.
///
/// This is a policy value observed on real tapes, not a format constant.
pub const FAST_CHANNEL_MIN_ITEMS: usize = 101;

/// Value written in place of the tape's absent value.
pub const NULL_VALUE: f32 = f32::NAN;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Dat,
    Parquet,
}

/// Logical record types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum RecordType {
    NormalData,
    AlternateData,
    JobIdentification,
    WellsiteData,
    ToolStringInfo,
    EncryptedTableDump,
    TableDump,
    DataFormatSpec,
    DataDescriptor,
    Picture,
    Image,
    SoftwareBoot,
    BootstrapLoader,
    KernelLoaderBoot,
    ProgramFileHeader,
    ProgramOverlayHeader,
    ProgramOverlayLoad,
    FileHeader,
    FileTrailer,
    TapeHeader,
    TapeTrailer,
    ReelHeader,
    ReelTrailer,
    LogicalEof,
    LogicalBot,
    LogicalEot,
    LogicalEom,
    OperatorCommand,
    OperatorResponse,
    SystemOutput,
    Comment,
    BlankRecord,
    Other(u8),
}

impl RecordType {
    pub fn code(self) -> u8 {
        match self {
            RecordType::NormalData => 0,
            RecordType::AlternateData => 1,
            RecordType::JobIdentification => 32,
            RecordType::WellsiteData => 34,
            RecordType::ToolStringInfo => 39,
            RecordType::EncryptedTableDump => 42,
            RecordType::TableDump => 47,
            RecordType::DataFormatSpec => 64,
            RecordType::DataDescriptor => 65,
            RecordType::Picture => 85,
            RecordType::Image => 86,
            RecordType::SoftwareBoot => 95,
            RecordType::BootstrapLoader => 96,
            RecordType::KernelLoaderBoot => 97,
            RecordType::ProgramFileHeader => 100,
            RecordType::ProgramOverlayHeader => 101,
            RecordType::ProgramOverlayLoad => 102,
            RecordType::FileHeader => 128,
            RecordType::FileTrailer => 129,
            RecordType::TapeHeader => 130,
            RecordType::TapeTrailer => 131,
            RecordType::ReelHeader => 132,
            RecordType::ReelTrailer => 133,
            RecordType::LogicalEof => 137,
            RecordType::LogicalBot => 138,
            RecordType::LogicalEot => 139,
            RecordType::LogicalEom => 141,
            RecordType::OperatorCommand => 224,
            RecordType::OperatorResponse => 225,
            RecordType::SystemOutput => 227,
            RecordType::Comment => 232,
            RecordType::BlankRecord => 234,
            RecordType::Other(code) => code,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            RecordType::NormalData => "Normal Data",
            RecordType::AlternateData => "Alternate Data",
            RecordType::JobIdentification => "Job Identification",
            RecordType::WellsiteData => "Wellsite Data",
            RecordType::ToolStringInfo => "Tool String Info",
            RecordType::EncryptedTableDump => "Encrypted Table Dump",
            RecordType::TableDump => "Table Dump",
            RecordType::DataFormatSpec => "Data Format Specification",
            RecordType::DataDescriptor => "Data Descriptor",
            RecordType::Picture => "Picture",
            RecordType::Image => "Image",
            RecordType::SoftwareBoot => "TU10 Software Boot",
            RecordType::BootstrapLoader => "Bootstrap Loader",
            RecordType::KernelLoaderBoot => "CP-Kernel Loader Boot",
            RecordType::ProgramFileHeader => "Program File Header",
            RecordType::ProgramOverlayHeader => "Program Overlay Header",
            RecordType::ProgramOverlayLoad => "Program Overlay Load",
            RecordType::FileHeader => "File Header",
            RecordType::FileTrailer => "File Trailer",
            RecordType::TapeHeader => "Tape Header",
            RecordType::TapeTrailer => "Tape Trailer",
            RecordType::ReelHeader => "Reel Header",
            RecordType::ReelTrailer => "Reel Trailer",
            RecordType::LogicalEof => "Logical EOF",
            RecordType::LogicalBot => "Logical BOT",
            RecordType::LogicalEot => "Logical EOT",
            RecordType::LogicalEom => "Logical EOM",
            RecordType::OperatorCommand => "Operator Command Inputs",
            RecordType::OperatorResponse => "Operator Response Inputs",
            RecordType::SystemOutput => "System Outputs to Operator",
            RecordType::Comment => "Comment",
            RecordType::BlankRecord => "Blank Record/CSU Comment",
            RecordType::Other(_) => "Unknown",
        }
    }

    pub fn is_trailer(self) -> bool {
        matches!(
            self,
            RecordType::FileTrailer | RecordType::TapeTrailer | RecordType::ReelTrailer
        )
    }
}

impl From<u8> for RecordType {
    fn from(code: u8) -> Self {
        match code {
            0 => RecordType::NormalData,
            1 => RecordType::AlternateData,
            32 => RecordType::JobIdentification,
            34 => RecordType::WellsiteData,
            39 => RecordType::ToolStringInfo,
            42 => RecordType::EncryptedTableDump,
            47 => RecordType::TableDump,
            64 => RecordType::DataFormatSpec,
            65 => RecordType::DataDescriptor,
            85 => RecordType::Picture,
            86 => RecordType::Image,
            95 => RecordType::SoftwareBoot,
            96 => RecordType::BootstrapLoader,
            97 => RecordType::KernelLoaderBoot,
            100 => RecordType::ProgramFileHeader,
            101 => RecordType::ProgramOverlayHeader,
            102 => RecordType::ProgramOverlayLoad,
            128 => RecordType::FileHeader,
            129 => RecordType::FileTrailer,
            130 => RecordType::TapeHeader,
            131 => RecordType::TapeTrailer,
            132 => RecordType::ReelHeader,
            133 => RecordType::ReelTrailer,
            137 => RecordType::LogicalEof,
            138 => RecordType::LogicalBot,
            139 => RecordType::LogicalEot,
            141 => RecordType::LogicalEom,
            224 => RecordType::OperatorCommand,
            225 => RecordType::OperatorResponse,
            227 => RecordType::SystemOutput,
            232 => RecordType::Comment,
            234 => RecordType::BlankRecord,
            other => RecordType::Other(other),
        }
    }
}

/// One on-disk block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhysicalRecord {
    /// File position of the block header
    pub offset: u64,
    /// Block length including the header
    pub length: u32,
    pub attr1: u8,
    pub attr2: u8,
}

impl PhysicalRecord {
    pub fn has_successor(&self) -> bool {
        self.attr2 & ATTR_SUCCESSOR != 0
    }

    /// Bytes taken by the optional file-number and record-number fields at
    /// the end of the block.
    pub fn trailer_len(&self) -> usize {
        let mut len = 0;
        if self.attr1 & ATTR_FILE_NUMBER != 0 {
            len += 2;
        }
        if self.attr1 & ATTR_RECORD_NUMBER != 0 {
            len += 2;
        }
        len
    }

    pub fn header_len(first: bool) -> usize {
        if first {
            FIRST_HEADER_LEN
        } else {
            CONTINUATION_HEADER_LEN
        }
    }

    pub fn payload_len(&self, first: bool) -> usize {
        (self.length as usize).saturating_sub(Self::header_len(first) + self.trailer_len())
    }

    /// File range of the payload bytes.
    pub fn payload_range(&self, first: bool) -> std::ops::Range<usize> {
        let start = self.offset as usize + Self::header_len(first);
        let end = (self.offset as usize + self.length as usize).saturating_sub(self.trailer_len());
        start..end.max(start)
    }
}

/// A logically complete record; its blocks live in the index arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogicalRecord {
    pub record_type: RecordType,
    /// Reassembled payload size
    pub total_length: u32,
    pub first_block: usize,
    pub block_count: usize,
}

/// One contiguous logging pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogicalFile {
    pub first_data_record: usize,
    pub last_data_record: usize,
    pub auxiliary: BTreeMap<RecordType, Vec<usize>>,
}

impl LogicalFile {
    pub fn new(first_data_record: usize, last_data_record: usize) -> Self {
        Self {
            first_data_record,
            last_data_record,
            auxiliary: BTreeMap::new(),
        }
    }

    pub fn data_records(&self) -> RangeInclusive<usize> {
        self.first_data_record..=self.last_data_record
    }

    pub fn data_record_count(&self) -> usize {
        self.last_data_record - self.first_data_record + 1
    }

    pub fn records_of(&self, record_type: RecordType) -> &[usize] {
        self.auxiliary
            .get(&record_type)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn attach(&mut self, record_type: RecordType, record: usize) {
        self.auxiliary.entry(record_type).or_default().push(record);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Direction {
    Up,
    Down,
    Neither,
}

impl Direction {
    pub fn from_code(code: i64) -> Self {
        match code {
            1 => Direction::Up,
            255 => Direction::Down,
            _ => Direction::Neither,
        }
    }

    /// Sign of depth change as acquisition proceeds.
    pub fn sign(self) -> f64 {
        match self {
            Direction::Up => -1.0,
            Direction::Down | Direction::Neither => 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DepthMode {
    /// Depth is a channel inside every frame
    PerFrame,
    /// Depth occurs once per data record, before the first frame
    PerRecord,
}

impl DepthMode {
    pub fn from_code(code: i64) -> Self {
        if code == 0 {
            DepthMode::PerFrame
        } else {
            DepthMode::PerRecord
        }
    }
}

/// Global acquisition parameters from the entry blocks.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FormatSpec {
    pub data_record_type: i64,
    pub datum_block_type: i64,
    /// Frame size from entry type 3, when present
    pub declared_frame_size: Option<usize>,
    /// Declared frame size, or the one derived from the first data record
    pub frame_size: usize,
    pub direction: Direction,
    pub optical_depth_units: i64,
    pub reference_point: f64,
    pub reference_point_units: String,
    pub frame_spacing: f64,
    pub frame_spacing_units: String,
    pub max_frames_per_record: Option<i64>,
    pub absent_value: f64,
    pub depth_mode: DepthMode,
    pub depth_units: String,
    pub depth_repr_code: u8,
    pub datum_block_subtype: i64,
}

impl Default for FormatSpec {
    fn default() -> Self {
        Self {
            data_record_type: 0,
            datum_block_type: 0,
            declared_frame_size: None,
            frame_size: 0,
            direction: Direction::Neither,
            optical_depth_units: 0,
            reference_point: 0.0,
            reference_point_units: String::new(),
            frame_spacing: 0.0,
            frame_spacing_units: ".1IN".to_string(),
            max_frames_per_record: None,
            absent_value: -999.25,
            depth_mode: DepthMode::PerFrame,
            depth_units: ".1IN".to_string(),
            depth_repr_code: REPR_FLOAT32,
            datum_block_subtype: 0,
        }
    }
}

/// Position of a channel inside its output dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DatasetSlot {
    pub dataset: usize,
    /// Index among the dataset's channels
    pub index: usize,
    /// First value column of this channel in a dataset row
    pub position: usize,
}

/// One datum specification block.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChannelDescriptor {
    pub mnemonic: String,
    pub service_id: String,
    pub service_order: String,
    pub units: String,
    pub file_number: i64,
    /// Bytes per frame
    pub size: usize,
    pub samples: usize,
    pub repr_code: u8,
    /// Values per frame sample
    pub items_per_frame: usize,
    /// Byte offset inside a frame
    pub offset: usize,
    pub fast: bool,
    pub dataset: Option<DatasetSlot>,
}

impl ChannelDescriptor {
    pub fn repr(&self) -> Option<ReprCode> {
        ReprCode::try_from(self.repr_code).ok()
    }

    pub fn is_numeric(&self) -> bool {
        self.repr().is_some_and(ReprCode::is_numeric) && self.items_per_frame > 0
    }

    /// Width of one value in bytes.
    pub fn item_width(&self) -> Option<usize> {
        self.repr().and_then(ReprCode::size)
    }
}

/// Output dataset definition for one samples-per-frame value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatasetPlan {
    pub index: usize,
    pub samples_per_frame: usize,
    /// Depth step between rows, meters
    pub step: f64,
    /// Member channels in descriptor order
    pub channels: Vec<usize>,
    /// Values per row
    pub item_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatasetLayout {
    pub datasets: Vec<DatasetPlan>,
    pub max_samples: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Column {
    pub mnemonic: String,
    pub units: String,
    pub items: usize,
    pub fast: bool,
}

/// Extracted rows of one dataset, ordered by increasing depth.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    pub index: usize,
    pub samples_per_frame: usize,
    pub step: f64,
    pub columns: Vec<Column>,
    pub item_count: usize,
    /// Depth in meters, one per row
    pub depths: Vec<f64>,
    /// Row-major values, `item_count` per row
    pub values: Vec<f32>,
}

impl Dataset {
    pub fn new(plan: &DatasetPlan, columns: Vec<Column>) -> Self {
        Self {
            index: plan.index,
            samples_per_frame: plan.samples_per_frame,
            step: plan.step,
            columns,
            item_count: plan.item_count,
            depths: Vec::new(),
            values: Vec::new(),
        }
    }

    pub fn row_count(&self) -> usize {
        self.depths.len()
    }

    pub fn row(&self, i: usize) -> Option<(f64, &[f32])> {
        let depth = *self.depths.get(i)?;
        let start = i * self.item_count;
        Some((depth, &self.values[start..start + self.item_count]))
    }

    pub fn depth_range(&self) -> Option<(f64, f64)> {
        Some((*self.depths.first()?, *self.depths.last()?))
    }
}

/// Result of extracting the active logical file.
#[derive(Debug, Clone, PartialEq)]
pub struct Extraction {
    pub datasets: Vec<Dataset>,
    pub records_processed: usize,
    pub records_skipped: usize,
    pub frames: usize,
}

impl Extraction {
    pub fn total_rows(&self) -> usize {
        self.datasets.iter().map(Dataset::row_count).sum()
    }
}

//! Data format specification record parsing.
//!
//! The record holds a list of entry blocks with the global acquisition
//! parameters, terminated by an entry of type 0, followed by one 40-byte
//! datum specification block per channel.

use byteorder::{BigEndian, ReadBytesExt};
use log::{debug, warn};
use std::collections::{HashMap, HashSet};
use std::io::Cursor;

use crate::error::{Error, Result};
use crate::models::{ChannelDescriptor, DepthMode, Direction, FormatSpec, FAST_CHANNEL_MIN_ITEMS};
use crate::repr::{self, DecodedValue, ReprCode};
use crate::units::DepthUnit;

pub const DATUM_BLOCK_LEN: usize = 40;
const ENTRY_HEADER_LEN: usize = 3;

const ENTRY_TERMINATOR: u8 = 0;
const ENTRY_DATA_RECORD_TYPE: u8 = 1;
const ENTRY_DATUM_BLOCK_TYPE: u8 = 2;
const ENTRY_FRAME_SIZE: u8 = 3;
const ENTRY_DIRECTION: u8 = 4;
const ENTRY_OPTICAL_DEPTH_UNITS: u8 = 5;
const ENTRY_REFERENCE_POINT: u8 = 6;
const ENTRY_REFERENCE_POINT_UNITS: u8 = 7;
const ENTRY_FRAME_SPACING: u8 = 8;
const ENTRY_FRAME_SPACING_UNITS: u8 = 9;
const ENTRY_UNDEFINED: u8 = 10;
const ENTRY_MAX_FRAMES: u8 = 11;
const ENTRY_ABSENT_VALUE: u8 = 12;
const ENTRY_DEPTH_MODE: u8 = 13;
const ENTRY_DEPTH_UNITS: u8 = 14;
const ENTRY_DEPTH_REPR: u8 = 15;
const ENTRY_DATUM_BLOCK_SUBTYPE: u8 = 16;

const DEPTH_MNEMONICS: [&str; 2] = ["DEPT", "DEP"];

/// Decoded format specification: global parameters plus channels.
#[derive(Debug, Clone, PartialEq)]
pub struct DataFormat {
    pub spec: FormatSpec,
    pub channels: Vec<ChannelDescriptor>,
}

impl DataFormat {
    /// Parse a reassembled format specification payload.
    ///
    /// `reference_payload_len` is the payload length of the first data
    /// record of the active logical file. It is only used when the record
    /// declares no frame size.
    ///
    /// # Errors
    ///
    /// `TruncatedFormatSpec` when the entry list is cut short and
    /// `NoChannels` when no whole datum block follows it.
    pub fn parse(payload: &[u8], reference_payload_len: Option<usize>) -> Result<Self> {
        let (mut spec, consumed) = parse_entries(payload)?;
        let channels = parse_channels(&payload[consumed..]);
        if channels.is_empty() {
            return Err(Error::NoChannels);
        }

        let channel_total: usize = channels.iter().map(|c| c.size).sum();
        spec.frame_size = match (spec.declared_frame_size, reference_payload_len) {
            (Some(declared), _) => declared,
            (None, Some(len)) => {
                let depth_width = match spec.depth_mode {
                    DepthMode::PerRecord => repr::code_size(spec.depth_repr_code).unwrap_or(0),
                    DepthMode::PerFrame => 0,
                };
                len.saturating_sub(depth_width)
            }
            (None, None) => channel_total,
        };

        debug!(
            "Format spec: {} channels, frame size {} ({} from channels), direction {:?}, depth {:?}",
            channels.len(),
            spec.frame_size,
            channel_total,
            spec.direction,
            spec.depth_mode
        );

        Ok(Self { spec, channels })
    }

    /// Index of the channel carrying depth in per-frame mode.
    ///
    /// The first channel named `DEPT` or `DEP`, else channel 0. `None` in
    /// per-record mode.
    pub fn depth_channel(&self) -> Option<usize> {
        if self.spec.depth_mode != DepthMode::PerFrame || self.channels.is_empty() {
            return None;
        }
        let found = self
            .channels
            .iter()
            .position(|c| is_depth_mnemonic(&c.mnemonic));
        Some(found.unwrap_or(0))
    }

    /// Representation code of the depth value.
    pub fn depth_repr_code(&self) -> u8 {
        match self.depth_channel() {
            Some(i) => self.channels[i].repr_code,
            None => self.spec.depth_repr_code,
        }
    }

    /// Unit string the depth value is recorded in.
    ///
    /// A per-frame depth channel with blank units falls back to the
    /// depth units entry.
    pub fn depth_units(&self) -> &str {
        match self.depth_channel() {
            Some(i) if !self.channels[i].units.trim().is_empty() => &self.channels[i].units,
            _ => &self.spec.depth_units,
        }
    }

    pub fn depth_unit(&self) -> Result<DepthUnit> {
        self.depth_units().parse()
    }

    pub fn frame_spacing_unit(&self) -> Result<DepthUnit> {
        self.spec.frame_spacing_units.parse()
    }

    /// Absolute frame spacing in meters.
    pub fn frame_spacing_meters(&self) -> Result<f64> {
        Ok(self.frame_spacing_unit()?.to_meters(self.spec.frame_spacing).abs())
    }

    /// Frame size implied by the channel sizes.
    pub fn channel_frame_size(&self) -> usize {
        self.channels.iter().map(|c| c.size).sum()
    }
}

pub fn is_depth_mnemonic(mnemonic: &str) -> bool {
    DEPTH_MNEMONICS
        .iter()
        .any(|m| mnemonic.trim().eq_ignore_ascii_case(m))
}

/// Read entry blocks up to and including the terminator.
///
/// Returns the parameters and the number of bytes consumed.
fn parse_entries(payload: &[u8]) -> Result<(FormatSpec, usize)> {
    let mut spec = FormatSpec::default();
    let mut pos = 0;

    loop {
        let header = payload
            .get(pos..pos + ENTRY_HEADER_LEN)
            .ok_or(Error::TruncatedFormatSpec {
                needed: pos + ENTRY_HEADER_LEN,
                available: payload.len(),
            })?;
        let (kind, size, code) = (header[0], header[1] as usize, header[2]);

        let start = pos + ENTRY_HEADER_LEN;
        let value = payload
            .get(start..start + size)
            .ok_or(Error::TruncatedFormatSpec {
                needed: start + size,
                available: payload.len(),
            })?;
        pos = start + size;

        if kind == ENTRY_TERMINATOR {
            break;
        }
        apply_entry(&mut spec, kind, code, value);
    }

    Ok((spec, pos))
}

fn apply_entry(spec: &mut FormatSpec, kind: u8, code: u8, value: &[u8]) {
    if kind == ENTRY_UNDEFINED || kind > ENTRY_DATUM_BLOCK_SUBTYPE {
        debug!("Skipping entry block type {} ({} bytes)", kind, value.len());
        return;
    }

    let decoded = match repr::decode(value, code, value.len()) {
        Ok((decoded, _)) => decoded,
        Err(err) => {
            warn!("Entry block type {} kept its default: {}", kind, err);
            return;
        }
    };

    let int = decoded.as_i64();
    let real = decoded.as_f64();
    match kind {
        ENTRY_DATA_RECORD_TYPE => set(&mut spec.data_record_type, int),
        ENTRY_DATUM_BLOCK_TYPE => set(&mut spec.datum_block_type, int),
        ENTRY_FRAME_SIZE => {
            spec.declared_frame_size = int.filter(|&n| n > 0).map(|n| n as usize);
        }
        ENTRY_DIRECTION => {
            if let Some(n) = int {
                spec.direction = Direction::from_code(n);
            }
        }
        ENTRY_OPTICAL_DEPTH_UNITS => set(&mut spec.optical_depth_units, int),
        ENTRY_REFERENCE_POINT => set(&mut spec.reference_point, real),
        ENTRY_REFERENCE_POINT_UNITS => set(&mut spec.reference_point_units, unit_text(&decoded)),
        ENTRY_FRAME_SPACING => set(&mut spec.frame_spacing, real),
        ENTRY_FRAME_SPACING_UNITS => set(&mut spec.frame_spacing_units, unit_text(&decoded)),
        ENTRY_MAX_FRAMES => spec.max_frames_per_record = int,
        ENTRY_ABSENT_VALUE => set(&mut spec.absent_value, real),
        ENTRY_DEPTH_MODE => {
            if let Some(n) = int {
                spec.depth_mode = DepthMode::from_code(n);
            }
        }
        ENTRY_DEPTH_UNITS => set(&mut spec.depth_units, unit_text(&decoded)),
        ENTRY_DEPTH_REPR => {
            if let Some(n) = int.and_then(|n| u8::try_from(n).ok()) {
                spec.depth_repr_code = n;
            }
        }
        ENTRY_DATUM_BLOCK_SUBTYPE => set(&mut spec.datum_block_subtype, int),
        _ => {}
    }
}

fn set<T>(field: &mut T, value: Option<T>) {
    if let Some(value) = value {
        *field = value;
    }
}

/// Unit entries are normally strings; some writers store a legacy numeric
/// unit code instead. Blank strings keep the default.
fn unit_text(value: &DecodedValue) -> Option<String> {
    match value {
        DecodedValue::Text(s) if s.is_empty() => None,
        DecodedValue::Text(s) => Some(s.clone()),
        other => {
            let code = other.as_i64()?;
            Some(match DepthUnit::from_code(code) {
                Some(unit) => unit.mnemonic().to_string(),
                None => code.to_string(),
            })
        }
    }
}

fn parse_channels(bytes: &[u8]) -> Vec<ChannelDescriptor> {
    let mut channels = Vec::with_capacity(bytes.len() / DATUM_BLOCK_LEN);
    // Names in use, upper-cased.
    let mut used: HashSet<String> = HashSet::new();
    // Last suffix handed out per base name; all depth mnemonics share one.
    let mut suffixes: HashMap<String, usize> = HashMap::new();
    let mut offset = 0;

    for block in bytes.chunks_exact(DATUM_BLOCK_LEN) {
        let mut channel = parse_datum_block(block, offset);
        offset += channel.size;

        if used.contains(&channel.mnemonic.to_ascii_uppercase()) {
            let depth = is_depth_mnemonic(&channel.mnemonic);
            let key = if depth {
                DEPTH_MNEMONICS[1].to_string()
            } else {
                channel.mnemonic.to_ascii_uppercase()
            };
            let suffix = suffixes.entry(key).or_insert(0);
            let renamed = loop {
                *suffix += 1;
                let candidate = if depth {
                    format!("DEP{}", suffix)
                } else {
                    format!("{}_{}", channel.mnemonic, suffix)
                };
                if !used.contains(&candidate.to_ascii_uppercase()) {
                    break candidate;
                }
            };
            debug!("Renamed duplicate channel {} to {}", channel.mnemonic, renamed);
            channel.mnemonic = renamed;
        }
        used.insert(channel.mnemonic.to_ascii_uppercase());

        channels.push(channel);
    }

    let trailing = bytes.len() % DATUM_BLOCK_LEN;
    if trailing != 0 {
        debug!("Ignoring {} trailing bytes after the last datum block", trailing);
    }
    channels
}

/// Decode one 40-byte datum specification block.
///
/// Layout: mnemonic 4, service id 6, service order 8, units 4, API codes 4,
/// file number 2, size 2, process level 3, samples 1, representation code 1,
/// process indicators 5.
fn parse_datum_block(block: &[u8], offset: usize) -> ChannelDescriptor {
    let mut cursor = Cursor::new(&block[26..34]);
    // The slice is exactly eight bytes, so these reads cannot run short.
    let file_number = cursor.read_i16::<BigEndian>().unwrap_or(0);
    let size = cursor.read_i16::<BigEndian>().unwrap_or(0).max(0) as usize;
    cursor.set_position(7);
    let samples = (cursor.read_u8().unwrap_or(1) as usize).max(1);
    let repr_code = block[34];

    let items_per_frame = match ReprCode::try_from(repr_code).ok().and_then(ReprCode::size) {
        Some(width) => size / (width * samples),
        None => 0,
    };

    ChannelDescriptor {
        mnemonic: ascii(&block[0..4]),
        service_id: ascii(&block[4..10]),
        service_order: ascii(&block[10..18]),
        units: ascii(&block[18..22]),
        file_number: file_number as i64,
        size,
        samples,
        repr_code,
        items_per_frame,
        offset,
        fast: items_per_frame >= FAST_CHANNEL_MIN_ITEMS,
        dataset: None,
    }
}

fn ascii(bytes: &[u8]) -> String {
    match repr::decode_as(bytes, ReprCode::Ascii, bytes.len()) {
        Ok((DecodedValue::Text(s), _)) => s,
        _ => String::new(),
    }
}

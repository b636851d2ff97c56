//! Test utilities for building LIS tapes
#![allow(dead_code)]

use byteorder::{BigEndian, LittleEndian, WriteBytesExt};

pub const NORMAL_DATA: u8 = 0;
pub const FORMAT_SPEC: u8 = 64;
pub const FILE_HEADER: u8 = 128;
pub const FILE_TRAILER: u8 = 129;
pub const TAPE_HEADER: u8 = 130;
pub const COMMENT: u8 = 232;

/// Builder for creating tape files in either dialect
pub struct TapeBuilder {
    data: Vec<u8>,
    blocked: bool,
    max_block_payload: Option<usize>,
    attr1: u8,
    previous_block: u32,
}

impl TapeBuilder {
    /// Bare physical records
    pub fn unblocked() -> Self {
        Self {
            data: Vec::new(),
            blocked: false,
            max_block_payload: None,
            attr1: 0,
            previous_block: 0,
        }
    }

    /// Every physical record preceded by a 12-byte tape position block
    pub fn blocked() -> Self {
        Self {
            blocked: true,
            ..Self::unblocked()
        }
    }

    /// Split every following record into blocks of at most `n` payload bytes
    pub fn max_block_payload(mut self, n: usize) -> Self {
        self.max_block_payload = Some(n);
        self
    }

    /// Set attr1 for every following block; bits 0x4 and 0x2 append 2-byte
    /// file and record number fields to each block
    pub fn attr1(mut self, attr1: u8) -> Self {
        self.attr1 = attr1;
        self
    }

    /// Add a logical record
    pub fn record(mut self, record_type: u8, payload: &[u8]) -> Self {
        let chunk = self.max_block_payload.unwrap_or(usize::MAX).max(1);
        let chunks: Vec<&[u8]> = if payload.is_empty() {
            vec![payload]
        } else {
            payload.chunks(chunk).collect()
        };

        let last = chunks.len() - 1;
        for (n, part) in chunks.iter().enumerate() {
            let attr2 = match (n == 0, n == last) {
                (true, true) => 0,
                (true, false) => 1,
                (false, false) => 3,
                (false, true) => 2,
            };
            self.write_block(n == 0, record_type, attr2, part);
        }
        self
    }

    /// Add raw bytes, e.g. a cut-off header
    pub fn raw(mut self, bytes: &[u8]) -> Self {
        self.data.extend_from_slice(bytes);
        self
    }

    fn trailer_len(&self) -> usize {
        let mut len = 0;
        if self.attr1 & 0x4 != 0 {
            len += 2;
        }
        if self.attr1 & 0x2 != 0 {
            len += 2;
        }
        len
    }

    fn write_block(&mut self, first: bool, record_type: u8, attr2: u8, payload: &[u8]) {
        let header_len = if first { 6 } else { 4 };
        let length = header_len + payload.len() + self.trailer_len();

        if self.blocked {
            let here = self.data.len() as u32;
            let next = here + 12 + length as u32;
            self.data.write_u32::<LittleEndian>(0).unwrap();
            self.data
                .write_u32::<LittleEndian>(self.previous_block)
                .unwrap();
            self.data.write_u32::<LittleEndian>(next).unwrap();
            self.previous_block = here;
        }

        self.data.write_u16::<BigEndian>(length as u16).unwrap();
        self.data.push(self.attr1);
        self.data.push(attr2);
        if first {
            self.data.push(record_type);
            self.data.push(0);
        }
        self.data.extend_from_slice(payload);
        if self.attr1 & 0x4 != 0 {
            self.data.write_u16::<BigEndian>(0xF11E).unwrap();
        }
        if self.attr1 & 0x2 != 0 {
            self.data.write_u16::<BigEndian>(0xEC0D).unwrap();
        }
    }

    /// Build the final tape
    pub fn build(self) -> Vec<u8> {
        self.data
    }
}

/// Builder for data format specification payloads
pub struct FormatSpecBuilder {
    entries: Vec<u8>,
    channels: Vec<u8>,
}

impl FormatSpecBuilder {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            channels: Vec::new(),
        }
    }

    /// Add an entry block
    pub fn entry(mut self, kind: u8, code: u8, value: &[u8]) -> Self {
        self.entries.push(kind);
        self.entries.push(value.len() as u8);
        self.entries.push(code);
        self.entries.extend_from_slice(value);
        self
    }

    /// 1 = up, 255 = down
    pub fn direction(self, code: u8) -> Self {
        self.entry(4, 66, &[code])
    }

    pub fn frame_size(self, size: i16) -> Self {
        self.entry(3, 79, &size.to_be_bytes())
    }

    pub fn frame_spacing(self, spacing: f64, units: &str) -> Self {
        self.entry(8, 68, &lis_f32(spacing))
            .entry(9, 65, units.as_bytes())
    }

    pub fn absent_value(self, value: f64) -> Self {
        self.entry(12, 68, &lis_f32(value))
    }

    /// Depth once per record, recorded with code 68
    pub fn depth_per_record(self, units: &str) -> Self {
        self.entry(13, 66, &[1])
            .entry(14, 65, units.as_bytes())
            .entry(15, 66, &[68])
    }

    /// Add a 40-byte datum specification block
    pub fn channel(mut self, mnemonic: &str, units: &str, size: i16, samples: u8, code: u8) -> Self {
        let mut block = vec![b' '; 40];
        block[..mnemonic.len()].copy_from_slice(mnemonic.as_bytes());
        block[4..10].copy_from_slice(b"SRV   ");
        block[10..18].copy_from_slice(b"00000001");
        block[18..18 + units.len()].copy_from_slice(units.as_bytes());
        block[22..26].copy_from_slice(&[0; 4]);
        block[26..28].copy_from_slice(&1i16.to_be_bytes());
        block[28..30].copy_from_slice(&size.to_be_bytes());
        block[30..33].copy_from_slice(&[0; 3]);
        block[33] = samples;
        block[34] = code;
        block[35..40].copy_from_slice(&[0; 5]);
        self.channels.extend(block);
        self
    }

    /// Entries, the terminator, then the channels
    pub fn build(self) -> Vec<u8> {
        let mut out = self.entries;
        out.extend_from_slice(&[0, 1, 66, 0]);
        out.extend(self.channels);
        out
    }
}

/// Encode `value` with representation code 68
pub fn lis_f32(value: f64) -> [u8; 4] {
    if value == 0.0 {
        return [0; 4];
    }
    let magnitude = value.abs();
    let mut exponent = magnitude.log2().floor() as i32 + 1;
    let mut mantissa = magnitude / 2f64.powi(exponent);
    if mantissa >= 1.0 {
        mantissa /= 2.0;
        exponent += 1;
    } else if mantissa < 0.5 {
        mantissa *= 2.0;
        exponent -= 1;
    }
    let fraction = ((mantissa * (1u32 << 23) as f64).round() as u32).min(0x7F_FFFF);

    let raw = if value > 0.0 {
        (((exponent + 128) as u32) << 23) | fraction
    } else {
        0x8000_0000 | (((127 - exponent) as u32) << 23) | (fraction.wrapping_neg() & 0x7F_FFFF)
    };
    raw.to_be_bytes()
}

/// Encode a small integral `value` with representation code 49
pub fn lis_f16(value: f64) -> [u8; 2] {
    for exponent in 0..16 {
        let fraction = value * 2048.0 / 2f64.powi(exponent);
        if (-2048.0..=2047.0).contains(&fraction) && fraction.fract() == 0.0 {
            let raw = ((fraction as i16 as u16) << 4) | exponent as u16;
            return raw.to_be_bytes();
        }
    }
    panic!("{} cannot be encoded with code 49", value);
}

/// Concatenate code 68 values
pub fn lis_f32s(values: &[f64]) -> Vec<u8> {
    values.iter().flat_map(|&v| lis_f32(v)).collect()
}

//! Representation code decoding.
//!
//! LIS packs every field with one of a fixed set of representation codes.
//! All multi-byte codes are big-endian. Codes 49 and 68 are LIS-specific
//! floating point layouts, not IEEE 754.

use byteorder::{BigEndian, ReadBytesExt};
use serde::Serialize;
use std::fmt;
use std::io::Cursor;

use crate::error::{Error, Result};

pub const REPR_FLOAT16: u8 = 49;
pub const REPR_LOW_RES_FLOAT32: u8 = 50;
pub const REPR_INT8: u8 = 56;
pub const REPR_ASCII: u8 = 65;
pub const REPR_UINT8: u8 = 66;
pub const REPR_FLOAT32: u8 = 68;
pub const REPR_FIXED32: u8 = 70;
pub const REPR_INT32: u8 = 73;
pub const REPR_INT16: u8 = 79;

/// The representation codes known to the format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ReprCode {
    /// 16-bit LIS float (code 49)
    Float16,
    /// 32-bit low resolution float (code 50), size only
    LowResFloat32,
    /// 8-bit two's complement integer (code 56)
    Int8,
    /// ASCII string (code 65)
    Ascii,
    /// Unsigned byte (code 66)
    UInt8,
    /// 32-bit LIS float (code 68)
    Float32,
    /// 32-bit fixed point (code 70), size only
    Fixed32,
    /// 32-bit two's complement integer (code 73)
    Int32,
    /// 16-bit two's complement integer (code 79)
    Int16,
}

impl ReprCode {
    pub fn code(self) -> u8 {
        match self {
            ReprCode::Float16 => REPR_FLOAT16,
            ReprCode::LowResFloat32 => REPR_LOW_RES_FLOAT32,
            ReprCode::Int8 => REPR_INT8,
            ReprCode::Ascii => REPR_ASCII,
            ReprCode::UInt8 => REPR_UINT8,
            ReprCode::Float32 => REPR_FLOAT32,
            ReprCode::Fixed32 => REPR_FIXED32,
            ReprCode::Int32 => REPR_INT32,
            ReprCode::Int16 => REPR_INT16,
        }
    }

    /// Fixed width in bytes. Strings have no fixed width.
    pub fn size(self) -> Option<usize> {
        match self {
            ReprCode::Int8 | ReprCode::UInt8 => Some(1),
            ReprCode::Float16 | ReprCode::Int16 => Some(2),
            ReprCode::LowResFloat32 | ReprCode::Float32 | ReprCode::Fixed32 | ReprCode::Int32 => {
                Some(4)
            }
            ReprCode::Ascii => None,
        }
    }

    /// Whether values of this code can be decoded to a number.
    ///
    /// Codes 50 and 70 have a declared width but no known bit layout.
    pub fn is_numeric(self) -> bool {
        !matches!(
            self,
            ReprCode::Ascii | ReprCode::LowResFloat32 | ReprCode::Fixed32
        )
    }
}

impl TryFrom<u8> for ReprCode {
    type Error = Error;

    fn try_from(code: u8) -> Result<Self> {
        match code {
            REPR_FLOAT16 => Ok(ReprCode::Float16),
            REPR_LOW_RES_FLOAT32 => Ok(ReprCode::LowResFloat32),
            REPR_INT8 => Ok(ReprCode::Int8),
            REPR_ASCII => Ok(ReprCode::Ascii),
            REPR_UINT8 => Ok(ReprCode::UInt8),
            REPR_FLOAT32 => Ok(ReprCode::Float32),
            REPR_FIXED32 => Ok(ReprCode::Fixed32),
            REPR_INT32 => Ok(ReprCode::Int32),
            REPR_INT16 => Ok(ReprCode::Int16),
            other => Err(Error::UnsupportedCode(other)),
        }
    }
}

impl fmt::Display for ReprCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Width in bytes of a fixed-size code.
pub fn code_size(code: u8) -> Result<usize> {
    ReprCode::try_from(code)?
        .size()
        .ok_or(Error::UnsupportedCode(code))
}

/// A decoded field value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum DecodedValue {
    Integer(i64),
    Real(f64),
    Text(String),
}

impl DecodedValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            DecodedValue::Integer(v) => Some(*v as f64),
            DecodedValue::Real(v) => Some(*v),
            DecodedValue::Text(_) => None,
        }
    }

    /// Integer view; reals are truncated toward zero.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            DecodedValue::Integer(v) => Some(*v),
            DecodedValue::Real(v) => Some(*v as i64),
            DecodedValue::Text(_) => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            DecodedValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for DecodedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodedValue::Integer(v) => write!(f, "{}", v),
            DecodedValue::Real(v) => write!(f, "{}", v),
            DecodedValue::Text(s) => write!(f, "{}", s),
        }
    }
}

/// Decode one field starting at `bytes[0]`.
///
/// `count` is the field width for strings and is ignored for fixed-size
/// codes. Returns the value together with the number of bytes consumed.
///
/// # Errors
///
/// `UnsupportedCode` for codes outside the table and for codes 50 and 70,
/// `TruncatedRecord` when `bytes` is shorter than the field.
pub fn decode(bytes: &[u8], code: u8, count: usize) -> Result<(DecodedValue, usize)> {
    decode_as(bytes, ReprCode::try_from(code)?, count)
}

/// Same as [`decode`] with an already validated code.
pub fn decode_as(bytes: &[u8], code: ReprCode, count: usize) -> Result<(DecodedValue, usize)> {
    let width = code.size().unwrap_or(count);
    let field = field(bytes, width)?;

    let value = match code {
        ReprCode::Ascii => DecodedValue::Text(read_ascii(field)),
        ReprCode::Float16 | ReprCode::Float32 => DecodedValue::Real(read_number(field, code)?),
        ReprCode::LowResFloat32 | ReprCode::Fixed32 => {
            return Err(Error::UnsupportedCode(code.code()))
        }
        _ => DecodedValue::Integer(read_number(field, code)? as i64),
    };

    Ok((value, width))
}

/// Decode a numeric field straight to `f64`.
///
/// This is the per-sample path of the frame extractor; it skips building a
/// [`DecodedValue`].
pub fn decode_number(bytes: &[u8], code: ReprCode) -> Result<f64> {
    let width = code.size().ok_or(Error::UnsupportedCode(code.code()))?;
    read_number(field(bytes, width)?, code)
}

fn field(bytes: &[u8], width: usize) -> Result<&[u8]> {
    bytes.get(..width).ok_or(Error::TruncatedRecord {
        needed: width,
        available: bytes.len(),
    })
}

fn read_number(field: &[u8], code: ReprCode) -> Result<f64> {
    let mut cursor = Cursor::new(field);
    let value = match code {
        ReprCode::Float16 => float16(cursor.read_u16::<BigEndian>()?),
        ReprCode::Float32 => float32(cursor.read_u32::<BigEndian>()?),
        ReprCode::Int8 => cursor.read_i8()? as f64,
        ReprCode::UInt8 => cursor.read_u8()? as f64,
        ReprCode::Int16 => cursor.read_i16::<BigEndian>()? as f64,
        ReprCode::Int32 => cursor.read_i32::<BigEndian>()? as f64,
        other => return Err(Error::UnsupportedCode(other.code())),
    };
    Ok(value)
}

fn read_ascii(field: &[u8]) -> String {
    let end = field.iter().rposition(|&b| b != 0).map_or(0, |p| p + 1);
    String::from_utf8_lossy(&field[..end]).trim().to_string()
}

/// Code 49: 12-bit two's complement fraction, 4-bit exponent.
fn float16(raw: u16) -> f64 {
    // Arithmetic shift keeps the fraction's sign.
    let fraction = ((raw as i16) >> 4) as f64 / 2048.0;
    let exponent = (raw & 0x000F) as i32;
    fraction * 2f64.powi(exponent)
}

/// Code 68: sign, excess-128 exponent, 23-bit fraction.
///
/// Negative values carry a two's complemented fraction and a one's
/// complemented exponent.
fn float32(raw: u32) -> f64 {
    let negative = raw & 0x8000_0000 != 0;
    let exponent = ((raw >> 23) & 0xFF) as i32;
    let mut fraction = raw & 0x007F_FFFF;
    if negative {
        fraction = fraction.wrapping_neg() & 0x007F_FFFF;
    }
    let mantissa = fraction as f64 / (1u32 << 23) as f64;

    if !negative {
        mantissa * 2f64.powi(exponent - 128)
    } else if fraction == 0 {
        0.0
    } else {
        -mantissa * 2f64.powi(127 - exponent)
    }
}

//! Depth unit conversion.

use serde::Serialize;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Units a tape may record depth or frame spacing in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DepthUnit {
    Feet,
    Centimeters,
    Meters,
    Millimeters,
    HalfMillimeters,
    TenthInches,
}

impl DepthUnit {
    pub fn meters_per_unit(self) -> f64 {
        match self {
            DepthUnit::Feet => 0.3048,
            DepthUnit::Centimeters => 0.01,
            DepthUnit::Meters => 1.0,
            DepthUnit::Millimeters => 0.001,
            DepthUnit::HalfMillimeters => 0.0005,
            DepthUnit::TenthInches => 0.00254,
        }
    }

    pub fn to_meters(self, value: f64) -> f64 {
        value * self.meters_per_unit()
    }

    /// Canonical LIS mnemonic.
    pub fn mnemonic(self) -> &'static str {
        match self {
            DepthUnit::Feet => "FT",
            DepthUnit::Centimeters => "CM",
            DepthUnit::Meters => "M",
            DepthUnit::Millimeters => "MM",
            DepthUnit::HalfMillimeters => ".5MM",
            DepthUnit::TenthInches => ".1IN",
        }
    }

    /// Legacy numeric unit codes used by some writers in place of a mnemonic.
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            1 => Some(DepthUnit::Feet),
            2 => Some(DepthUnit::Centimeters),
            3 => Some(DepthUnit::Meters),
            4 => Some(DepthUnit::Millimeters),
            5 => Some(DepthUnit::HalfMillimeters),
            7 => Some(DepthUnit::TenthInches),
            _ => None,
        }
    }
}

impl FromStr for DepthUnit {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let normalized: String = s
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect::<String>()
            .to_ascii_uppercase();

        let unit = match normalized.as_str() {
            "F" | "FT" | "FEET" | "FOOT" => DepthUnit::Feet,
            "CM" => DepthUnit::Centimeters,
            "M" | "METER" | "METERS" | "METRE" | "METRES" => DepthUnit::Meters,
            "MM" => DepthUnit::Millimeters,
            ".5MM" | "0.5MM" | "HMM" => DepthUnit::HalfMillimeters,
            ".1IN" | "0.1IN" | "P1IN" => DepthUnit::TenthInches,
            _ => return Err(Error::UnknownDepthUnit(s.to_string())),
        };
        Ok(unit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conversion_table() {
        let cases = [
            ("FT", 0.3048),
            ("CM", 0.01),
            ("M", 1.0),
            ("MM", 0.001),
            (".5MM", 0.0005),
            (".1IN", 0.00254),
        ];
        for (name, factor) in cases {
            let unit: DepthUnit = name.parse().unwrap();
            assert!((unit.to_meters(10.0) - 10.0 * factor).abs() < 1e-12, "{}", name);
        }
    }

    #[test]
    fn test_padded_and_lowercase() {
        assert_eq!("m   ".parse::<DepthUnit>().unwrap(), DepthUnit::Meters);
        assert_eq!(" 0.1 in".parse::<DepthUnit>().unwrap(), DepthUnit::TenthInches);
    }

    #[test]
    fn test_unknown_unit() {
        assert!(matches!("FATHOM".parse::<DepthUnit>(), Err(Error::UnknownDepthUnit(_))));
        assert!(matches!("".parse::<DepthUnit>(), Err(Error::UnknownDepthUnit(_))));
    }

    #[test]
    fn test_legacy_codes() {
        assert_eq!(DepthUnit::from_code(1), Some(DepthUnit::Feet));
        assert_eq!(DepthUnit::from_code(6), None);
        assert_eq!(DepthUnit::from_code(7), Some(DepthUnit::TenthInches));
    }
}

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Length unit of model coordinates. Spacing tables and offsets are always
/// expressed in millimetres, so everything measured on the model passes
/// through `to_mm` before planning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LengthUnit {
    Millimeter,
    Centimeter,
    Meter,
    Inch,
    #[default]
    Foot,
}

impl LengthUnit {
    pub fn to_mm(&self, value: f64) -> f64 {
        match self {
            Self::Millimeter => value,
            Self::Centimeter => value * 10.0,
            Self::Meter => value * 1000.0,
            Self::Inch => value * 25.4,
            Self::Foot => value * 304.8,
        }
    }

    pub fn from_mm(&self, mm: f64) -> f64 {
        match self {
            Self::Millimeter => mm,
            Self::Centimeter => mm / 10.0,
            Self::Meter => mm / 1000.0,
            Self::Inch => mm / 25.4,
            Self::Foot => mm / 304.8,
        }
    }
}

impl fmt::Display for LengthUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Millimeter => write!(f, "mm"),
            Self::Centimeter => write!(f, "cm"),
            Self::Meter => write!(f, "m"),
            Self::Inch => write!(f, "in"),
            Self::Foot => write!(f, "ft"),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
#[error("Unknown length unit: '{0}'")]
pub struct UnknownUnit(pub String);

impl FromStr for LengthUnit {
    type Err = UnknownUnit;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mm" | "millimeter" | "millimeters" => Ok(Self::Millimeter),
            "cm" | "centimeter" | "centimeters" => Ok(Self::Centimeter),
            "m" | "meter" | "meters" => Ok(Self::Meter),
            "in" | "inch" | "inches" => Ok(Self::Inch),
            "ft" | "foot" | "feet" => Ok(Self::Foot),
            other => Err(UnknownUnit(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feet_round_trip_through_mm() {
        let ft = LengthUnit::Foot;
        assert!((ft.to_mm(1.0) - 304.8).abs() < 1e-9);
        assert!((ft.from_mm(ft.to_mm(32.8)) - 32.8).abs() < 1e-9);
    }

    #[test]
    fn test_parse_unit_names() {
        assert_eq!("ft".parse::<LengthUnit>(), Ok(LengthUnit::Foot));
        assert_eq!(" MM ".parse::<LengthUnit>(), Ok(LengthUnit::Millimeter));
        assert_eq!(
            "furlong".parse::<LengthUnit>(),
            Err(UnknownUnit("furlong".to_string()))
        );
    }
}

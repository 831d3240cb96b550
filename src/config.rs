//! Engine configuration.
//!
//! `EngineConfig` collects the knobs that influence how templates turn into
//! live blocks and how the registry treats files on disk. It is passed
//! explicitly to factories and the registry; there is no global state.
//!
//! Every field has a default, so a partial (or empty) JSON document is a
//! valid configuration.
//!
//! # Example
//!
//! ```
//! use crazymatrix::{AngleUnit, EngineConfig};
//!
//! let config = EngineConfig::from_json(r#"{ "angle_unit": "radians" }"#).unwrap();
//! assert_eq!(config.angle_unit, AngleUnit::Radians);
//! assert_eq!(config.max_repeat, EngineConfig::default().max_repeat);
//! ```

use crate::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Unit of the argument of the trigonometric blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AngleUnit {
    /// Arguments are degrees
    #[default]
    Degrees,
    /// Arguments are radians
    Radians,
}

impl AngleUnit {
    /// Factor converting an argument in this unit to radians.
    #[inline]
    pub fn to_radians_factor(self) -> f64 {
        match self {
            AngleUnit::Degrees => std::f64::consts::PI / 180.0,
            AngleUnit::Radians => 1.0,
        }
    }
}

/// Configuration for instantiation and the definition registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Unit applied to `sin`/`cos`/`tan` blocks at instantiation
    pub angle_unit: AngleUnit,

    /// Upper bound for a latched repeat count
    pub max_repeat: usize,

    /// Run the structural schema check before parsing registry files
    pub validate_schema: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            angle_unit: AngleUnit::Degrees,
            max_repeat: 10_000,
            validate_schema: true,
        }
    }
}

impl EngineConfig {
    /// Deserialize from a JSON string.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Serialize to a pretty JSON string.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Load from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.angle_unit, AngleUnit::Degrees);
        assert_eq!(config.max_repeat, 10_000);
        assert!(config.validate_schema);
    }

    #[test]
    fn test_empty_json_is_default() {
        let config = EngineConfig::from_json("{}").unwrap();
        assert_eq!(config, EngineConfig::default());
    }

    #[test]
    fn test_json_roundtrip() {
        let config = EngineConfig {
            angle_unit: AngleUnit::Radians,
            max_repeat: 16,
            validate_schema: false,
        };
        let restored = EngineConfig::from_json(&config.to_json().unwrap()).unwrap();
        assert_eq!(config, restored);
    }

    #[test]
    fn test_angle_factor() {
        assert_eq!(AngleUnit::Radians.to_radians_factor(), 1.0);
        assert!((AngleUnit::Degrees.to_radians_factor() * 180.0 - std::f64::consts::PI).abs() < 1e-12);
    }
}

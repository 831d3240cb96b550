//! Value - the content of one output pin.
//!
//! A pin is either still `Unset` (never computed, or a fresh block), holds a
//! finite `Number`, or holds the `Undefined` sentinel produced by a domain
//! violation somewhere upstream. `Undefined` is a regular value: operators
//! receive it, propagate it and never raise on it.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Cached content of one output pin.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Value {
    /// Not yet materialized
    #[default]
    Unset,
    /// A finite number
    Number(f64),
    /// Domain violated for the current inputs
    Undefined,
}

impl Value {
    /// Wrap a float, mapping NaN and infinities to `Undefined`.
    ///
    /// # Examples
    ///
    /// ```
    /// use crazymatrix::Value;
    ///
    /// assert_eq!(Value::from_f64(2.5), Value::Number(2.5));
    /// assert_eq!(Value::from_f64(f64::NAN), Value::Undefined);
    /// assert_eq!(Value::from_f64(1.0 / 0.0), Value::Undefined);
    /// ```
    #[inline]
    pub fn from_f64(x: f64) -> Self {
        if x.is_finite() {
            Value::Number(x)
        } else {
            Value::Undefined
        }
    }

    /// The number, if this value is defined.
    ///
    /// `Unset` counts as not defined: an operator reading an input that
    /// nobody ever produced has nothing to compute with.
    #[inline]
    pub fn number(self) -> Option<f64> {
        match self {
            Value::Number(x) => Some(x),
            Value::Unset | Value::Undefined => None,
        }
    }

    /// `true` for `Number`.
    #[inline]
    pub fn is_defined(self) -> bool {
        matches!(self, Value::Number(_))
    }

    /// `true` for `Undefined`.
    #[inline]
    pub fn is_undefined(self) -> bool {
        matches!(self, Value::Undefined)
    }

    /// The number, or `default` when not defined.
    #[inline]
    pub fn number_or(self, default: f64) -> f64 {
        self.number().unwrap_or(default)
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::from_f64(x)
    }
}

impl From<Option<f64>> for Value {
    fn from(x: Option<f64>) -> Self {
        x.map_or(Value::Undefined, Value::from_f64)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Unset => write!(f, "-"),
            Value::Number(x) => write!(f, "{}", x),
            Value::Undefined => write!(f, "undefined"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_unset() {
        assert_eq!(Value::default(), Value::Unset);
        assert!(!Value::Unset.is_defined());
        assert!(!Value::Unset.is_undefined());
    }

    #[test]
    fn test_number_access() {
        assert_eq!(Value::Number(3.0).number(), Some(3.0));
        assert_eq!(Value::Undefined.number(), None);
        assert_eq!(Value::Unset.number_or(7.0), 7.0);
    }

    #[test]
    fn test_from_option() {
        assert_eq!(Value::from(Some(1.5)), Value::Number(1.5));
        assert_eq!(Value::from(None), Value::Undefined);
    }

    #[test]
    fn test_display() {
        assert_eq!(Value::Number(2.0).to_string(), "2");
        assert_eq!(Value::Undefined.to_string(), "undefined");
    }
}

//! Comparison and boolean helpers.
//!
//! Truth is encoded as `1.0`, falsehood as `0.0`; any input greater than
//! zero counts as true.

use super::InputSource;
use crate::error::Result;
use crate::value::Value;

/// Encode a boolean as a block value.
#[inline]
pub(crate) fn truth(b: bool) -> f64 {
    if b {
        1.0
    } else {
        0.0
    }
}

/// Read every input and apply `pred` to the collected numbers.
///
/// Stops at the first undefined input. Zero inputs yield `Undefined`.
pub(crate) fn all_inputs(
    inputs: &mut dyn InputSource,
    pred: impl Fn(&[f64]) -> bool,
) -> Result<Value> {
    if inputs.is_empty() {
        return Ok(Value::Undefined);
    }
    let mut xs = Vec::with_capacity(inputs.len());
    for pin in 0..inputs.len() {
        match inputs.number(pin)? {
            Some(x) => xs.push(x),
            None => return Ok(Value::Undefined),
        }
    }
    Ok(Value::Number(truth(pred(&xs))))
}

pub(crate) fn all_equal(xs: &[f64]) -> bool {
    xs.windows(2).all(|w| w[0] == w[1])
}

//! Arithmetic helpers behind the math operators.
//!
//! Each helper reads its inputs lazily and returns a single value. `None`
//! from a domain function means the domain was violated for these inputs.

use super::InputSource;
use crate::config::AngleUnit;
use crate::error::Result;
use crate::value::Value;

/// Fold all inputs with `f`, short-circuiting on the first undefined input.
///
/// Zero inputs yield `Undefined`: an aggregate of nothing has no value.
pub(crate) fn fold(inputs: &mut dyn InputSource, f: impl Fn(f64, f64) -> f64) -> Result<Value> {
    let mut acc: Option<f64> = None;
    for pin in 0..inputs.len() {
        let Some(x) = inputs.number(pin)? else {
            return Ok(Value::Undefined);
        };
        acc = Some(match acc {
            Some(a) => f(a, x),
            None => x,
        });
    }
    Ok(acc.map_or(Value::Undefined, Value::from_f64))
}

pub(crate) fn unary(inputs: &mut dyn InputSource, f: impl Fn(f64) -> Option<f64>) -> Result<Value> {
    Ok(inputs.number(0)?.and_then(f).into())
}

pub(crate) fn binary(
    inputs: &mut dyn InputSource,
    f: impl Fn(f64, f64) -> Option<f64>,
) -> Result<Value> {
    let Some(a) = inputs.number(0)? else {
        return Ok(Value::Undefined);
    };
    let Some(b) = inputs.number(1)? else {
        return Ok(Value::Undefined);
    };
    Ok(f(a, b).into())
}

pub(crate) fn trig(inputs: &mut dyn InputSource, unit: AngleUnit, f: fn(f64) -> f64) -> Result<Value> {
    let factor = unit.to_radians_factor();
    unary(inputs, |a| Some(f(a * factor)))
}

pub(crate) fn div(a: f64, b: f64) -> Option<f64> {
    (b != 0.0).then(|| a / b)
}

/// Floored modulo: the result has the sign of the divisor.
pub(crate) fn modulo(a: f64, b: f64) -> Option<f64> {
    (b != 0.0).then(|| a - b * (a / b).floor())
}

pub(crate) fn sqrt(a: f64) -> Option<f64> {
    (a >= 0.0).then(|| a.sqrt())
}

pub(crate) fn ln(a: f64) -> Option<f64> {
    (a > 0.0).then(|| a.ln())
}

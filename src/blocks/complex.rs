//! Complex arithmetic over (re, im) input pairs.
//!
//! Complex operands arrive as two consecutive input pins; results leave on
//! two output pins (real part on pin 0, imaginary part on pin 1).

use super::InputSource;
use crate::error::Result;
use crate::value::Value;
use num_complex::Complex64;

fn undefined_pair() -> Vec<Value> {
    vec![Value::Undefined, Value::Undefined]
}

fn pair(z: Complex64) -> Vec<Value> {
    let (re, im) = (Value::from_f64(z.re), Value::from_f64(z.im));
    if re.is_defined() && im.is_defined() {
        vec![re, im]
    } else {
        undefined_pair()
    }
}

/// Read the complex operand starting at `pin`.
fn read_complex(inputs: &mut dyn InputSource, pin: usize) -> Result<Option<Complex64>> {
    let Some(re) = inputs.number(pin)? else {
        return Ok(None);
    };
    let Some(im) = inputs.number(pin + 1)? else {
        return Ok(None);
    };
    Ok(Some(Complex64::new(re, im)))
}

/// Fold consecutive input pairs starting from `init`.
///
/// An odd pin count or no pins at all yields undefined outputs.
pub(crate) fn fold_pairs(
    inputs: &mut dyn InputSource,
    init: Complex64,
    f: impl Fn(Complex64, Complex64) -> Complex64,
) -> Result<Vec<Value>> {
    let n = inputs.len();
    if n == 0 || n % 2 != 0 {
        return Ok(undefined_pair());
    }
    let mut acc = init;
    for pin in (0..n).step_by(2) {
        match read_complex(inputs, pin)? {
            Some(z) => acc = f(acc, z),
            None => return Ok(undefined_pair()),
        }
    }
    Ok(pair(acc))
}

pub(crate) fn binary(
    inputs: &mut dyn InputSource,
    f: impl Fn(Complex64, Complex64) -> Option<Complex64>,
) -> Result<Vec<Value>> {
    let Some(a) = read_complex(inputs, 0)? else {
        return Ok(undefined_pair());
    };
    let Some(b) = read_complex(inputs, 2)? else {
        return Ok(undefined_pair());
    };
    Ok(f(a, b).map_or_else(undefined_pair, pair))
}

pub(crate) fn div(a: Complex64, b: Complex64) -> Option<Complex64> {
    (b.norm_sqr() != 0.0).then(|| a / b)
}

#[cfg(test)]
mod tests {
    use crate::blocks::{Operator, ValueInputs};
    use crate::value::Value;

    fn run(op: Operator, values: &[f64]) -> Vec<Value> {
        let mut inputs = ValueInputs::new(values.iter().map(|x| Value::Number(*x)).collect());
        op.compute(&mut inputs).unwrap()
    }

    fn nums(re: f64, im: f64) -> Vec<Value> {
        vec![Value::Number(re), Value::Number(im)]
    }

    #[test]
    fn test_complex_add() {
        assert_eq!(run(Operator::ComplexAdd, &[1.0, 2.0, 3.0, -1.0]), nums(4.0, 1.0));
    }

    #[test]
    fn test_complex_mul() {
        // (1 + 2i)(3 - i) = 5 + 5i
        assert_eq!(run(Operator::ComplexMul, &[1.0, 2.0, 3.0, -1.0]), nums(5.0, 5.0));
    }

    #[test]
    fn test_complex_sub_div() {
        assert_eq!(run(Operator::ComplexSub, &[1.0, 2.0, 3.0, -1.0]), nums(-2.0, 3.0));
        // (5 + 5i) / (3 - i) = 1 + 2i
        assert_eq!(run(Operator::ComplexDiv, &[5.0, 5.0, 3.0, -1.0]), nums(1.0, 2.0));
    }

    #[test]
    fn test_complex_div_by_zero() {
        let out = run(Operator::ComplexDiv, &[1.0, 1.0, 0.0, 0.0]);
        assert!(out.iter().all(|v| v.is_undefined()));
    }

    #[test]
    fn test_odd_pin_count_is_undefined() {
        let out = run(Operator::ComplexAdd, &[1.0, 2.0, 3.0]);
        assert!(out.iter().all(|v| v.is_undefined()));
    }
}

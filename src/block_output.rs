//! BlockOutput - Cached output values of a block.
//!
//! One slot per output pin; the output arity is fixed at construction.
//! Slots start `Unset` and are overwritten as a whole by every `compute()`.
//! Whether the cache is valid for the current epoch is tracked by the
//! block's [`BlockBase`](crate::BlockBase), not here.
//!
//! # Examples
//!
//! ```
//! use crazymatrix::{BlockOutput, Value};
//!
//! let mut output = BlockOutput::new(2);
//! assert_eq!(output.get(0).unwrap(), Value::Unset);
//!
//! output.store(vec![Value::Number(1.0), Value::Undefined]);
//! assert_eq!(output.get(1).unwrap(), Value::Undefined);
//! assert!(output.get(2).is_err());
//! ```

use crate::error::{CrazyMatrixError, Result};
use crate::value::Value;

/// Output slots of one block.
#[derive(Debug, Clone, Default)]
pub struct BlockOutput {
    values: Vec<Value>,
}

impl BlockOutput {
    /// Create `n` unset output slots.
    pub fn new(n: usize) -> Self {
        Self {
            values: vec![Value::Unset; n],
        }
    }

    /// Number of output pins.
    #[inline]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// `true` for sink blocks without outputs.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Cached value of `pin`.
    ///
    /// # Errors
    ///
    /// Returns `PinRange` if `pin` is not an output pin.
    #[inline]
    pub fn get(&self, pin: usize) -> Result<Value> {
        self.values
            .get(pin)
            .copied()
            .ok_or(CrazyMatrixError::PinRange {
                pin,
                len: self.values.len(),
            })
    }

    /// Overwrite a single slot.
    pub fn set(&mut self, pin: usize, value: Value) -> Result<()> {
        let len = self.values.len();
        let slot = self
            .values
            .get_mut(pin)
            .ok_or(CrazyMatrixError::PinRange { pin, len })?;
        *slot = value;
        Ok(())
    }

    /// Replace all slots with freshly computed values.
    ///
    /// Extra values are dropped; missing ones become `Undefined`, so the
    /// output arity never changes.
    pub fn store(&mut self, computed: Vec<Value>) {
        for (i, slot) in self.values.iter_mut().enumerate() {
            *slot = computed.get(i).copied().unwrap_or(Value::Undefined);
        }
    }

    /// Set every slot to `value`.
    pub fn fill(&mut self, value: Value) {
        self.values.iter_mut().for_each(|slot| *slot = value);
    }

    /// All cached values.
    #[inline]
    pub fn values(&self) -> &[Value] {
        &self.values
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_unset() {
        let output = BlockOutput::new(3);
        assert_eq!(output.len(), 3);
        assert!(output.values().iter().all(|v| *v == Value::Unset));
    }

    #[test]
    fn test_pin_range() {
        let output = BlockOutput::new(1);
        assert!(matches!(
            output.get(1),
            Err(CrazyMatrixError::PinRange { pin: 1, len: 1 })
        ));
    }

    #[test]
    fn test_store_pads_with_undefined() {
        let mut output = BlockOutput::new(2);
        output.store(vec![Value::Number(4.0)]);
        assert_eq!(output.values(), &[Value::Number(4.0), Value::Undefined]);
    }

    #[test]
    fn test_store_keeps_arity() {
        let mut output = BlockOutput::new(1);
        output.store(vec![Value::Number(1.0), Value::Number(2.0)]);
        assert_eq!(output.len(), 1);
        assert_eq!(output.get(0).unwrap(), Value::Number(1.0));
    }

    #[test]
    fn test_set_and_fill() {
        let mut output = BlockOutput::new(2);
        output.set(1, Value::Number(9.0)).unwrap();
        assert_eq!(output.get(1).unwrap(), Value::Number(9.0));

        output.fill(Value::Undefined);
        assert!(output.values().iter().all(|v| v.is_undefined()));
        assert!(output.set(2, Value::Unset).is_err());
    }
}

//! Repeat box state machine.
//!
//! The input layer of a repeat box carries a [`RepeatLatch`]. On the first
//! evaluation of an epoch the latch samples the trailing count pin and moves
//! from [`RepeatPhase::Idle`] to [`RepeatPhase::Iterating`]; the count stays
//! fixed until the network finishes the last cycle and returns the latch to
//! `Idle`.
//!
//! While the latch is `Iterating`, resetting the input layer neither clears
//! its cache nor cascades to the blocks feeding the box from outside.
//!
//! # Examples
//!
//! ```
//! use crazymatrix::blocks::{RepeatLatch, RepeatPhase};
//!
//! let mut latch = RepeatLatch::default();
//! latch.begin(3);
//! assert!(latch.advance());
//! assert!(latch.advance());
//! assert!(!latch.advance());
//! assert_eq!(latch.phase(), RepeatPhase::Iterating { n_rep: 3, cycle: 2 });
//!
//! latch.finish();
//! assert_eq!(latch.phase(), RepeatPhase::Idle);
//! ```

use crate::value::Value;

/// Named states of the repeat input layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RepeatPhase {
    /// No iteration in flight; the next evaluation samples the count
    #[default]
    Idle,
    /// Cycles of the current epoch are being driven
    Iterating {
        /// Latched number of inner evaluations
        n_rep: usize,
        /// Index of the current cycle, `0..n_rep`
        cycle: usize,
    },
}

/// Count latch and cycle counter of one repeat box.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RepeatLatch {
    phase: RepeatPhase,
}

impl RepeatLatch {
    /// Current phase.
    #[inline]
    pub fn phase(&self) -> RepeatPhase {
        self.phase
    }

    /// `true` while cycles are being driven.
    #[inline]
    pub fn is_iterating(&self) -> bool {
        matches!(self.phase, RepeatPhase::Iterating { .. })
    }

    /// Latch `n_rep` for this epoch and start at cycle 0.
    pub fn begin(&mut self, n_rep: usize) {
        self.phase = RepeatPhase::Iterating { n_rep, cycle: 0 };
    }

    /// Move to the next cycle.
    ///
    /// Returns `false` without changing state once the last cycle
    /// (`n_rep - 1`) has been reached, or when idle.
    pub fn advance(&mut self) -> bool {
        match &mut self.phase {
            RepeatPhase::Iterating { n_rep, cycle } if *cycle + 1 < *n_rep => {
                *cycle += 1;
                true
            }
            _ => false,
        }
    }

    /// Return to `Idle` with the counter cleared.
    pub fn finish(&mut self) {
        self.phase = RepeatPhase::Idle;
    }
}

/// Turn the value on the count pin into a cycle count.
///
/// Fractions are truncated, counts below one become one (a single
/// pass-through) and counts above `max_repeat` are clamped. `None` when the
/// count is not defined.
pub fn latch_count(count: Value, max_repeat: usize) -> Option<usize> {
    let x = count.number()?;
    let n = if x < 1.0 { 1 } else { x.trunc().min(max_repeat as f64) as usize };
    if n < x.trunc() as usize {
        log::debug!("repeat count {x} clamped to {n}");
    }
    Some(n.max(1))
}

/// Feed the output layer's values back into the data pins.
///
/// Output pin `i` replaces data pin `i` for every index both sides have;
/// remaining data pins keep their external values.
pub(crate) fn feed_back(data: &mut [Value], outputs: &[Value]) {
    data.iter_mut()
        .zip(outputs)
        .for_each(|(slot, value)| *slot = *value);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_idle_does_not_advance() {
        let mut latch = RepeatLatch::default();
        assert!(!latch.is_iterating());
        assert!(!latch.advance());
        assert_eq!(latch.phase(), RepeatPhase::Idle);
    }

    #[test]
    fn test_single_cycle() {
        let mut latch = RepeatLatch::default();
        latch.begin(1);
        assert!(latch.is_iterating());
        assert!(!latch.advance());
        latch.finish();
        assert!(!latch.is_iterating());
    }

    #[test]
    fn test_count_conversion() {
        assert_eq!(latch_count(Value::Number(3.0), 100), Some(3));
        assert_eq!(latch_count(Value::Number(3.9), 100), Some(3));
        assert_eq!(latch_count(Value::Number(0.0), 100), Some(1));
        assert_eq!(latch_count(Value::Number(-4.0), 100), Some(1));
        assert_eq!(latch_count(Value::Number(1e9), 100), Some(100));
        assert_eq!(latch_count(Value::Undefined, 100), None);
        assert_eq!(latch_count(Value::Unset, 100), None);
    }

    #[test]
    fn test_feed_back_keeps_extra_data_pins() {
        let mut data = vec![Value::Number(1.0), Value::Number(2.0), Value::Number(3.0)];
        feed_back(&mut data, &[Value::Number(9.0)]);
        assert_eq!(data, vec![Value::Number(9.0), Value::Number(2.0), Value::Number(3.0)]);

        let mut short = vec![Value::Number(1.0)];
        feed_back(&mut short, &[Value::Number(5.0), Value::Number(6.0)]);
        assert_eq!(short, vec![Value::Number(5.0)]);
    }
}

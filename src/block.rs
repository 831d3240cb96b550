//! Block - One node of a circuit.
//!
//! A block bundles the four parts every node has:
//!
//! - [`BlockBase`]: identity, optional name, cache-valid flag, statistics
//! - [`BlockInput`]: one optional [`Connection`](crate::Connection) per input pin
//! - [`BlockOutput`]: one cached [`Value`](crate::Value) per output pin
//! - [`Operator`]: what `compute()` does
//!
//! Blocks live inside a [`Network`](crate::Network), which owns them and
//! drives the value/compute/reset cycle. Input arity follows the operator:
//! fixed operators get their slot count up front, n-ary operators start
//! with no slots and grow one per appended connection.
//!
//! # Examples
//!
//! ```
//! use crazymatrix::blocks::Operator;
//! use crazymatrix::{Block, BlockId};
//!
//! let block = Block::new(BlockId::from_raw(0), Operator::Sub, None);
//! assert_eq!(block.n_in(), 2);
//! assert_eq!(block.n_out(), 1);
//! assert!(!block.base.is_evaluated());
//! ```

use crate::block_base::BlockBase;
use crate::block_input::BlockInput;
use crate::block_output::BlockOutput;
use crate::blocks::{Arity, Operator};
use crate::network::BlockId;
use std::fmt;

/// A node: base, input slots, cached outputs and operator.
#[derive(Debug, Clone)]
pub struct Block {
    /// Identity, cache flag and statistics
    pub base: BlockBase,
    /// Connection slots
    pub input: BlockInput,
    /// Cached output values
    pub output: BlockOutput,
    /// Computation performed on a cache miss
    pub operator: Operator,
}

impl Block {
    /// Create a block for `operator` with empty connections and unset outputs.
    pub fn new(id: BlockId, operator: Operator, name: Option<String>) -> Self {
        let input = match operator.arity() {
            Arity::Fixed(n) => BlockInput::fixed(n),
            Arity::Dynamic => BlockInput::dynamic(),
        };
        Self {
            base: BlockBase::new(id, name),
            input,
            output: BlockOutput::new(operator.n_out()),
            operator,
        }
    }

    /// Current number of input pins.
    #[inline]
    pub fn n_in(&self) -> usize {
        self.input.len()
    }

    /// Number of output pins.
    #[inline]
    pub fn n_out(&self) -> usize {
        self.output.len()
    }
}

impl fmt::Display for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.operator.label())?;
        if let Some(name) = self.base.name() {
            write!(f, " '{name}'")?;
        }
        write!(f, " #{} ({} -> {})", self.base.id().as_usize(), self.n_in(), self.n_out())
    }
}

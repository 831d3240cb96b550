//! BlockInput - Connection slots of a block.
//!
//! Every input pin of a block owns at most one [`Connection`], an immutable
//! pair of source block handle and source output pin. Resolving a
//! connection pulls the source block's value; nothing is copied when the
//! connection is made.
//!
//! Blocks are either of *fixed* input arity (slot count set at construction)
//! or *dynamic* arity, where connecting without naming a destination pin
//! appends a fresh slot (n-ary add, multiply, min, ...).
//!
//! # Examples
//!
//! ```
//! use crazymatrix::{BlockId, BlockInput, Connection};
//!
//! let mut input = BlockInput::dynamic();
//! let pin = input.resolve_dest_pin(None).unwrap();
//! input.attach(pin, Connection::new(BlockId::from_raw(7), 0)).unwrap();
//!
//! assert_eq!(input.len(), 1);
//! assert_eq!(input.sources(), vec![BlockId::from_raw(7)]);
//! ```

use crate::error::{CrazyMatrixError, Result};
use crate::network::BlockId;
use itertools::Itertools;

/// Directed edge into an input pin: where the value comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Connection {
    /// Block whose output is read
    pub source: BlockId,
    /// Output pin on the source block
    pub pin: usize,
}

impl Connection {
    /// Create a connection reading `source`'s output `pin`.
    pub fn new(source: BlockId, pin: usize) -> Self {
        Self { source, pin }
    }
}

/// Result of a successful `connect`.
///
/// `Overwrote` is the non-fatal "overwritten connection" report: the slot
/// was occupied and its previous connection has been replaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectOutcome {
    /// Empty slot `pin` now holds the connection
    Connected {
        /// Destination pin
        pin: usize,
    },
    /// Slot `pin` held `previous`, which was replaced
    Overwrote {
        /// Destination pin
        pin: usize,
        /// The replaced connection
        previous: Connection,
    },
}

impl ConnectOutcome {
    /// Destination pin the connection landed on.
    pub fn pin(&self) -> usize {
        match *self {
            ConnectOutcome::Connected { pin } | ConnectOutcome::Overwrote { pin, .. } => pin,
        }
    }

    /// `true` if an existing connection was replaced.
    pub fn overwrote(&self) -> bool {
        matches!(self, ConnectOutcome::Overwrote { .. })
    }
}

/// Input slots of one block.
#[derive(Debug, Clone, Default)]
pub struct BlockInput {
    slots: Vec<Option<Connection>>,
    dynamic: bool,
}

impl BlockInput {
    /// Fixed arity with `n` empty slots.
    pub fn fixed(n: usize) -> Self {
        Self {
            slots: vec![None; n],
            dynamic: false,
        }
    }

    /// Dynamic arity, starting with no slots.
    pub fn dynamic() -> Self {
        Self {
            slots: Vec::new(),
            dynamic: true,
        }
    }

    /// Number of input pins (current slot count).
    #[inline]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// `true` when there are no input pins.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// `true` when connecting without a destination pin appends a slot.
    #[inline]
    pub fn is_dynamic(&self) -> bool {
        self.dynamic
    }

    /// Connection held by `pin`.
    ///
    /// # Errors
    ///
    /// Returns `PinRange` if `pin` is not an input pin of this block.
    pub fn get(&self, pin: usize) -> Result<Option<Connection>> {
        self.slots
            .get(pin)
            .copied()
            .ok_or(CrazyMatrixError::PinRange {
                pin,
                len: self.slots.len(),
            })
    }

    /// Turn an optional destination pin into a concrete slot index.
    ///
    /// Omitted pins append a new slot on dynamic blocks and default to pin 0
    /// on fixed blocks. Explicit pins are range checked.
    pub fn resolve_dest_pin(&mut self, dest_pin: Option<usize>) -> Result<usize> {
        match dest_pin {
            Some(pin) if pin < self.slots.len() => Ok(pin),
            Some(pin) => Err(CrazyMatrixError::PinRange {
                pin,
                len: self.slots.len(),
            }),
            None if self.dynamic => {
                self.slots.push(None);
                Ok(self.slots.len() - 1)
            }
            None if self.slots.is_empty() => Err(CrazyMatrixError::PinRange { pin: 0, len: 0 }),
            None => Ok(0),
        }
    }

    /// Store `conn` in slot `pin`, returning the connection it replaced.
    pub fn attach(&mut self, pin: usize, conn: Connection) -> Result<Option<Connection>> {
        let len = self.slots.len();
        let slot = self
            .slots
            .get_mut(pin)
            .ok_or(CrazyMatrixError::PinRange { pin, len })?;
        Ok(slot.replace(conn))
    }

    /// All slots, occupied or not.
    #[inline]
    pub fn slots(&self) -> &[Option<Connection>] {
        &self.slots
    }

    /// Iterate over the occupied slots as `(pin, connection)`.
    pub fn connections(&self) -> impl Iterator<Item = (usize, Connection)> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(pin, slot)| slot.map(|conn| (pin, conn)))
    }

    /// Distinct source blocks, in first-connected order.
    pub fn sources(&self) -> Vec<BlockId> {
        self.connections().map(|(_, conn)| conn.source).unique().collect()
    }

    /// Number of occupied slots.
    pub fn num_connected(&self) -> usize {
        self.connections().count()
    }
}

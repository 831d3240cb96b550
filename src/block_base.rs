//! BlockBase - Common state shared by all blocks.
//!
//! This module provides the `BlockBase` structure that holds what every
//! block carries regardless of its operator: its arena handle, an optional
//! display name, the single cache-validity flag and evaluation statistics.

use crate::network::BlockId;

/// Counters of how often a block was computed and reset.
///
/// These are the observable side of the caching contract: two `value()`
/// calls without an intervening reset compute at most once, and a reset
/// cascade visits every block at most once.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BlockStats {
    /// Number of `compute()` invocations
    pub computes: u64,
    /// Number of times the cache flag was cleared by a reset cascade
    pub resets: u64,
}

/// Common state shared by all blocks.
///
/// # Examples
///
/// ```
/// use crazymatrix::{BlockBase, BlockId};
///
/// let mut base = BlockBase::new(BlockId::from_raw(3), Some("gain".into()));
/// assert!(!base.is_evaluated());
/// base.set_evaluated(true);
/// assert!(base.is_evaluated());
/// ```
#[derive(Debug, Clone)]
pub struct BlockBase {
    /// Handle of this block in its network
    id: BlockId,
    /// Optional display name
    name: Option<String>,
    /// Cache-validity flag (outputs are current for this epoch)
    evaluated: bool,
    stats: BlockStats,
}

impl BlockBase {
    /// Create a new BlockBase for the given handle.
    pub fn new(id: BlockId, name: Option<String>) -> Self {
        Self {
            id,
            name,
            evaluated: false,
            stats: BlockStats::default(),
        }
    }

    /// Get the block handle.
    #[inline]
    pub fn id(&self) -> BlockId {
        self.id
    }

    /// Get the display name, if any.
    #[inline]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Check whether the cached outputs are valid for this epoch.
    #[inline]
    pub fn is_evaluated(&self) -> bool {
        self.evaluated
    }

    /// Set the cache-validity flag.
    #[inline]
    pub fn set_evaluated(&mut self, flag: bool) {
        self.evaluated = flag;
    }

    /// Get the evaluation statistics.
    #[inline]
    pub fn stats(&self) -> BlockStats {
        self.stats
    }

    #[inline]
    pub(crate) fn record_compute(&mut self) {
        self.stats.computes += 1;
    }

    #[inline]
    pub(crate) fn record_reset(&mut self) {
        self.stats.resets += 1;
    }
}

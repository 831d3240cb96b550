//! Network - Arena of blocks with pull evaluation.
//!
//! This module provides the `Network` struct that owns every block of a
//! circuit and drives the value/compute/reset cycle.
//!
//! # Model
//!
//! - Blocks live in an arena and are addressed by [`BlockId`] handles.
//!   Connections are `(source handle, source pin)` pairs stored in the
//!   destination's input slots, so the graph never holds references into
//!   itself.
//! - `value(id, pin)` returns the cached output when the block is evaluated
//!   and otherwise computes it, pulling upstream blocks on demand.
//! - `reset_evaluated(id)` clears the cache flag of a block and of
//!   everything upstream of it, visiting each block once per call.
//!
//! # Boxes
//!
//! A box is a facade handle over two pass-through layers. Connecting *into*
//! a box lands on its input layer; reading *from* a box reads its output
//! layer. `bind_input` / `bind_output` wire inner blocks to the layers.
//!
//! A repeat box replaces the input layer by a repeat input with one extra
//! trailing count pin. On the first evaluation of an epoch it latches the
//! count and re-runs the inner graph, feeding the output layer back into
//! its data pins, until the count is exhausted.
//!
//! # Example
//!
//! ```
//! use crazymatrix::blocks::Operator;
//! use crazymatrix::{Network, Result, Value};
//!
//! # fn main() -> Result<()> {
//! let mut net = Network::new();
//!
//! let a = net.add(Operator::Const(2.0));
//! let b = net.add(Operator::Const(3.0));
//! let add = net.add(Operator::Add);
//! net.connect(a, None, add, None)?;
//! net.connect(b, None, add, None)?;
//!
//! assert_eq!(net.value(add, None)?, Value::Number(5.0));
//!
//! // Next epoch
//! net.reset_evaluated(add)?;
//! # Ok(())
//! # }
//! ```

use crate::block::Block;
use crate::block_base::BlockStats;
use crate::block_input::{ConnectOutcome, Connection};
use crate::blocks::{boundary, latch_count, InputSource, Operator, RepeatLatch, RepeatPhase};
use crate::config::EngineConfig;
use crate::error::{CrazyMatrixError, Result};
use crate::value::Value;
use std::collections::{HashMap, HashSet};
use std::fmt;

/// Handle of a block (or box) inside a [`Network`].
///
/// Handles are arena indices: they are unique within one network and
/// meaningless in any other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
pub struct BlockId(u32);

impl BlockId {
    /// Create a BlockId from a raw u32 value (for testing).
    #[doc(hidden)]
    pub fn from_raw(id: u32) -> Self {
        BlockId(id)
    }

    /// Get the raw value (for indexing).
    #[inline]
    pub fn as_usize(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Kind of box behind a facade handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BoxFlavor {
    /// Plain subgraph
    Black,
    /// Subgraph re-evaluated a latched number of times per epoch
    Repeat,
}

/// Facade of a box: its two boundary layers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoxHandle {
    /// Layer the external inputs connect to
    pub input_layer: BlockId,
    /// Layer the external consumers read from
    pub output_layer: BlockId,
    /// Black or repeat box
    pub flavor: BoxFlavor,
    /// Optional instance name
    pub name: Option<String>,
}

#[derive(Debug, Clone)]
enum Entry {
    Block(Block),
    Box(BoxHandle),
}

/// Network owns a circuit's blocks and evaluates them on demand.
///
/// # Lifecycle
///
/// 1. Create network: `Network::new()`
/// 2. Add blocks and boxes: `net.add(op)`, `net.add_box(..)`
/// 3. Connect: `net.connect(source, None, dest, None)?`
/// 4. Read: `net.value(sink, None)?`
/// 5. Start the next epoch: `net.reset_evaluated(sink)?`
#[derive(Debug, Clone)]
pub struct Network {
    /// Blocks and box facades, indexed by `BlockId`
    entries: Vec<Entry>,

    /// Repeat input layer -> output layer of the same box
    feedback: HashMap<BlockId, BlockId>,

    /// Upper bound for latched repeat counts
    max_repeat: usize,
}

impl Network {
    /// Create a new empty Network with default configuration.
    pub fn new() -> Self {
        Self::with_config(&EngineConfig::default())
    }

    /// Create a new empty Network using the repeat cap of `config`.
    pub fn with_config(config: &EngineConfig) -> Self {
        Self {
            entries: Vec::new(),
            feedback: HashMap::new(),
            max_repeat: config.max_repeat,
        }
    }

    /// Upper bound for latched repeat counts.
    pub fn max_repeat(&self) -> usize {
        self.max_repeat
    }

    fn next_id(&self) -> BlockId {
        BlockId(self.entries.len() as u32)
    }

    /// Add a block computing `operator` and return its handle.
    ///
    /// # Examples
    ///
    /// ```
    /// use crazymatrix::blocks::Operator;
    /// use crazymatrix::Network;
    ///
    /// let mut net = Network::new();
    /// let sq = net.add(Operator::Square);
    /// assert_eq!(net.n_in(sq).unwrap(), 1);
    /// ```
    pub fn add(&mut self, operator: Operator) -> BlockId {
        self.push_block(operator, None)
    }

    /// Add a named block.
    pub fn add_named(&mut self, operator: Operator, name: impl Into<String>) -> BlockId {
        self.push_block(operator, Some(name.into()))
    }

    fn push_block(&mut self, operator: Operator, name: Option<String>) -> BlockId {
        let id = self.next_id();
        log::trace!("add {} as {id}", operator.label());
        self.entries.push(Entry::Block(Block::new(id, operator, name)));
        id
    }

    /// Add an empty black box with `n_in` inputs and `n_out` outputs.
    ///
    /// Returns the facade handle; wire its inside with
    /// [`bind_input`](Self::bind_input) and [`bind_output`](Self::bind_output).
    pub fn add_box(&mut self, n_in: usize, n_out: usize, name: Option<&str>) -> BlockId {
        let input_layer = self.push_block(Operator::PassThrough(n_in), None);
        let output_layer = self.push_block(Operator::PassThrough(n_out), None);
        self.push_facade(input_layer, output_layer, BoxFlavor::Black, name)
    }

    /// Add an empty repeat box with `n_data` data inputs and `n_out` outputs.
    ///
    /// The box has `n_data + 1` input pins; the last one carries the repeat
    /// count.
    pub fn add_repeat_box(&mut self, n_data: usize, n_out: usize, name: Option<&str>) -> BlockId {
        let input_layer = self.push_block(
            Operator::RepeatInput {
                n_data,
                latch: RepeatLatch::default(),
            },
            None,
        );
        let output_layer = self.push_block(Operator::PassThrough(n_out), None);
        self.feedback.insert(input_layer, output_layer);
        self.push_facade(input_layer, output_layer, BoxFlavor::Repeat, name)
    }

    fn push_facade(
        &mut self,
        input_layer: BlockId,
        output_layer: BlockId,
        flavor: BoxFlavor,
        name: Option<&str>,
    ) -> BlockId {
        let id = self.next_id();
        self.entries.push(Entry::Box(BoxHandle {
            input_layer,
            output_layer,
            flavor,
            name: name.map(str::to_owned),
        }));
        id
    }

    fn entry(&self, id: BlockId) -> Result<&Entry> {
        self.entries
            .get(id.as_usize())
            .ok_or(CrazyMatrixError::UnknownBlock(id))
    }

    /// The block behind `id`.
    ///
    /// # Errors
    ///
    /// Returns `UnknownBlock` for foreign handles and for box facades.
    pub fn block(&self, id: BlockId) -> Result<&Block> {
        match self.entry(id)? {
            Entry::Block(block) => Ok(block),
            Entry::Box(_) => Err(CrazyMatrixError::UnknownBlock(id)),
        }
    }

    fn block_mut(&mut self, id: BlockId) -> Result<&mut Block> {
        match self.entries.get_mut(id.as_usize()) {
            Some(Entry::Block(block)) => Ok(block),
            _ => Err(CrazyMatrixError::UnknownBlock(id)),
        }
    }

    /// Facade of the box behind `id`, if `id` is a box.
    pub fn box_handle(&self, id: BlockId) -> Option<&BoxHandle> {
        match self.entries.get(id.as_usize()) {
            Some(Entry::Box(handle)) => Some(handle),
            _ => None,
        }
    }

    fn facade(&self, id: BlockId) -> Result<&BoxHandle> {
        self.box_handle(id)
            .ok_or_else(|| CrazyMatrixError::Other(format!("{id} is not a box")))
    }

    /// Block that produces the outputs of `id`.
    fn as_source(&self, id: BlockId) -> Result<BlockId> {
        Ok(match self.entry(id)? {
            Entry::Block(_) => id,
            Entry::Box(handle) => handle.output_layer,
        })
    }

    /// Block that receives the inputs of `id`.
    fn as_dest(&self, id: BlockId) -> Result<BlockId> {
        Ok(match self.entry(id)? {
            Entry::Block(_) => id,
            Entry::Box(handle) => handle.input_layer,
        })
    }

    /// Number of entries (blocks, boundary layers and box facades).
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// `true` for a network without blocks.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All handles, in creation order.
    pub fn ids(&self) -> impl Iterator<Item = BlockId> + '_ {
        (0..self.entries.len() as u32).map(BlockId)
    }

    /// Name of a block or box.
    pub fn name(&self, id: BlockId) -> Option<&str> {
        match self.entries.get(id.as_usize())? {
            Entry::Block(block) => block.base.name(),
            Entry::Box(handle) => handle.name.as_deref(),
        }
    }

    /// Number of input pins of a block or box.
    pub fn n_in(&self, id: BlockId) -> Result<usize> {
        Ok(self.block(self.as_dest(id)?)?.n_in())
    }

    /// Number of output pins of a block or box.
    pub fn n_out(&self, id: BlockId) -> Result<usize> {
        Ok(self.block(self.as_source(id)?)?.n_out())
    }

    /// Connect output `source_pin` of `source` to input `dest_pin` of `dest`.
    ///
    /// An omitted `source_pin` is 0. An omitted `dest_pin` appends a pin on
    /// n-ary blocks and is pin 0 on fixed-arity blocks. Replacing an
    /// existing connection succeeds, logs a warning and is reported as
    /// [`ConnectOutcome::Overwrote`].
    ///
    /// # Errors
    ///
    /// - `UnknownBlock` if either handle is foreign
    /// - `PinRange` if either pin is outside the block's arity
    /// - `Cycle` if `source` already depends on `dest`
    pub fn connect(
        &mut self,
        source: BlockId,
        source_pin: Option<usize>,
        dest: BlockId,
        dest_pin: Option<usize>,
    ) -> Result<ConnectOutcome> {
        let from = self.as_source(source)?;
        let to = self.as_dest(dest)?;
        let pin = source_pin.unwrap_or(0);
        let n_out = self.block(from)?.n_out();
        if pin >= n_out {
            return Err(CrazyMatrixError::PinRange { pin, len: n_out });
        }
        if self.depends_on(from, to)? {
            return Err(CrazyMatrixError::Cycle { from: source, dest });
        }

        let block = self.block_mut(to)?;
        let dest_pin = block.input.resolve_dest_pin(dest_pin)?;
        let previous = block.input.attach(dest_pin, Connection::new(from, pin))?;
        block.base.set_evaluated(false);

        Ok(match previous {
            Some(previous) => {
                log::warn!(
                    "connection into {to} pin {dest_pin} from {}:{} overwritten",
                    previous.source,
                    previous.pin
                );
                ConnectOutcome::Overwrote {
                    pin: dest_pin,
                    previous,
                }
            }
            None => ConnectOutcome::Connected { pin: dest_pin },
        })
    }

    /// `true` if `target` is `start` or upstream of it.
    fn depends_on(&self, start: BlockId, target: BlockId) -> Result<bool> {
        let mut stack = vec![start];
        let mut visited = HashSet::new();
        while let Some(id) = stack.pop() {
            if id == target {
                return Ok(true);
            }
            if visited.insert(id) {
                stack.extend(self.block(id)?.input.sources());
            }
        }
        Ok(false)
    }

    /// Feed boundary input `boundary_pin` of a box into `inner`.
    ///
    /// `inner_pin` follows the `dest_pin` rules of [`connect`](Self::connect).
    /// On a repeat box the count pin cannot be bound.
    pub fn bind_input(
        &mut self,
        box_id: BlockId,
        inner: BlockId,
        inner_pin: Option<usize>,
        boundary_pin: usize,
    ) -> Result<ConnectOutcome> {
        let input_layer = self.facade(box_id)?.input_layer;
        self.connect(input_layer, Some(boundary_pin), inner, inner_pin)
    }

    /// Expose output `inner_pin` of `inner` as boundary output `boundary_pin`.
    pub fn bind_output(
        &mut self,
        box_id: BlockId,
        inner: BlockId,
        inner_pin: Option<usize>,
        boundary_pin: usize,
    ) -> Result<ConnectOutcome> {
        let output_layer = self.facade(box_id)?.output_layer;
        self.connect(inner, inner_pin, output_layer, Some(boundary_pin))
    }

    /// Output `pin` (default 0) of a block or box, computing it if needed.
    ///
    /// # Errors
    ///
    /// Structural errors only; domain problems come back as
    /// [`Value::Undefined`].
    pub fn value(&mut self, id: BlockId, pin: Option<usize>) -> Result<Value> {
        let source = self.as_source(id)?;
        self.pull(source, pin.unwrap_or(0))
    }

    /// Value arriving at input `pin` of a block or box.
    ///
    /// Unconnected pins read as `Undefined`.
    pub fn input_value(&mut self, id: BlockId, pin: usize) -> Result<Value> {
        let dest = self.as_dest(id)?;
        self.read_input(dest, pin)
    }

    fn read_input(&mut self, id: BlockId, pin: usize) -> Result<Value> {
        match self.block(id)?.input.get(pin)? {
            Some(conn) => self.pull(conn.source, conn.pin),
            None => Ok(Value::Undefined),
        }
    }

    fn pull(&mut self, id: BlockId, pin: usize) -> Result<Value> {
        self.evaluate(id)?;
        self.block(id)?.output.get(pin)
    }

    fn evaluate(&mut self, id: BlockId) -> Result<()> {
        let block = self.block(id)?;
        if block.base.is_evaluated() {
            return Ok(());
        }
        if let Operator::RepeatInput { n_data, .. } = block.operator {
            return self.drive_repeat(id, n_data);
        }

        let operator = block.operator.clone();
        let slots = block.input.slots().to_vec();
        let computed = operator.compute(&mut NetworkInputs {
            network: self,
            slots,
        })?;
        self.finish_compute(id, computed)
    }

    fn finish_compute(&mut self, id: BlockId, computed: Vec<Value>) -> Result<()> {
        let block = self.block_mut(id)?;
        block.output.store(computed);
        block.base.set_evaluated(true);
        block.base.record_compute();
        log::trace!("computed {block}");
        Ok(())
    }

    fn latch_mut(&mut self, id: BlockId) -> Result<&mut RepeatLatch> {
        match &mut self.block_mut(id)?.operator {
            Operator::RepeatInput { latch, .. } => Ok(latch),
            _ => Err(CrazyMatrixError::Other(format!("{id} is not a repeat input"))),
        }
    }

    /// Publish `values` as the input layer's outputs without recomputing.
    fn publish(&mut self, id: BlockId, values: &[Value]) -> Result<()> {
        let block = self.block_mut(id)?;
        block.output.store(values.to_vec());
        block.base.set_evaluated(true);
        Ok(())
    }

    /// Run all cycles of a repeat box for the current epoch.
    fn drive_repeat(&mut self, id: BlockId, n_data: usize) -> Result<()> {
        let output_layer = *self
            .feedback
            .get(&id)
            .ok_or_else(|| CrazyMatrixError::Other(format!("repeat input {id} has no box")))?;

        if self.latch_mut(id)?.is_iterating() {
            return Err(CrazyMatrixError::Other(format!(
                "repeat input {id} re-entered while iterating"
            )));
        }

        // Reading the inputs may drive enclosing repeat boxes, which can
        // evaluate this layer on their own; latch only once they are done.
        let count = self.read_input(id, n_data)?;
        let mut data = (0..n_data)
            .map(|pin| self.read_input(id, pin))
            .collect::<Result<Vec<_>>>()?;

        let Some(n_rep) = latch_count(count, self.max_repeat) else {
            log::debug!("repeat input {id}: count undefined");
            return self.finish_compute(id, vec![Value::Undefined; n_data]);
        };
        log::debug!("repeat input {id}: latched {n_rep} cycles");
        self.latch_mut(id)?.begin(n_rep);

        while self.latch_mut(id)?.advance() {
            self.publish(id, &data)?;
            self.reset_evaluated(output_layer)?;
            let n_out = self.block(output_layer)?.n_out();
            let outputs = (0..n_out)
                .map(|pin| self.pull(output_layer, pin))
                .collect::<Result<Vec<_>>>()?;
            boundary::feed_back(&mut data, &outputs);
        }

        // Final values; blocks computed during the cycles read them afresh
        self.publish(id, &data)?;
        self.reset_evaluated(output_layer)?;
        self.latch_mut(id)?.finish();
        self.block_mut(id)?.base.record_compute();
        Ok(())
    }

    /// Invalidate the cache of `id` and of everything upstream of it.
    ///
    /// Each block is visited at most once per call. A repeat input layer in
    /// the middle of its cycles keeps its cache and does not pass the reset
    /// on to the blocks feeding the box.
    pub fn reset_evaluated(&mut self, id: BlockId) -> Result<()> {
        let start = self.as_source(id)?;
        let mut stack = vec![start];
        let mut visited = HashSet::new();
        while let Some(id) = stack.pop() {
            if !visited.insert(id) {
                continue;
            }
            let block = self.block_mut(id)?;
            if let Operator::RepeatInput { latch, .. } = &block.operator {
                if latch.is_iterating() {
                    continue;
                }
            }
            block.base.set_evaluated(false);
            block.base.record_reset();
            log::trace!("reset {id}");
            stack.extend(block.input.sources());
        }
        Ok(())
    }

    /// Move the point of a `Point` block.
    pub fn set_point(&mut self, id: BlockId, x: f64, y: f64) -> Result<()> {
        let block = self.block_mut(id)?;
        match &mut block.operator {
            Operator::Point { x: px, y: py } => {
                *px = x;
                *py = y;
                block.base.set_evaluated(false);
                Ok(())
            }
            other => Err(CrazyMatrixError::InvalidParameter(format!(
                "{id} is a {} block, not a point",
                other.label()
            ))),
        }
    }

    /// Replace the held value of a `Variable` block.
    pub fn set_variable(&mut self, id: BlockId, value: Value) -> Result<()> {
        let block = self.block_mut(id)?;
        match &mut block.operator {
            Operator::Variable(held) => {
                *held = value;
                block.base.set_evaluated(false);
                Ok(())
            }
            other => Err(CrazyMatrixError::InvalidParameter(format!(
                "{id} is a {} block, not a variable",
                other.label()
            ))),
        }
    }

    /// Compute and reset counters of a block (a box reports its output layer).
    pub fn stats(&self, id: BlockId) -> Result<BlockStats> {
        Ok(self.block(self.as_source(id)?)?.base.stats())
    }

    /// Iteration state of a repeat box.
    pub fn repeat_phase(&self, box_id: BlockId) -> Result<RepeatPhase> {
        let input_layer = self.facade(box_id)?.input_layer;
        match &self.block(input_layer)?.operator {
            Operator::RepeatInput { latch, .. } => Ok(latch.phase()),
            _ => Err(CrazyMatrixError::Other(format!("{box_id} is not a repeat box"))),
        }
    }
}

impl Default for Network {
    fn default() -> Self {
        Self::new()
    }
}

/// Input pins of the block being computed, backed by the network.
struct NetworkInputs<'a> {
    network: &'a mut Network,
    slots: Vec<Option<Connection>>,
}

impl InputSource for NetworkInputs<'_> {
    fn len(&self) -> usize {
        self.slots.len()
    }

    fn read(&mut self, pin: usize) -> Result<Value> {
        match self.slots.get(pin) {
            Some(Some(conn)) => self.network.pull(conn.source, conn.pin),
            Some(None) => Ok(Value::Undefined),
            None => Err(CrazyMatrixError::PinRange {
                pin,
                len: self.slots.len(),
            }),
        }
    }

    fn is_connected(&self, pin: usize) -> bool {
        matches!(self.slots.get(pin), Some(Some(_)))
    }
}

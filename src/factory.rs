//! Factories - Build, persist and instantiate template graphs.
//!
//! A factory accumulates block, connection and (for boxes) bond templates,
//! stores them as a [`DefinitionDoc`] and turns them into live blocks.
//!
//! - [`CircuitFactory`] instantiates a [`Circuit`]; the reserved ids
//!   [`POINT_ID`] and [`DRAWER_ID`] name its position block and drawer.
//! - [`BoxFactory`] instantiates a black box or a repeat box into a
//!   [`Network`] and returns the facade handle.
//!
//! # Instantiation
//!
//! `inst` runs in two passes. The first creates one live block per block
//! template, keyed by template id; `box` templates are resolved by name
//! through a [`DefinitionResolver`] and instantiated recursively. The
//! second wires every connection and bond by looking the ids up. A box that
//! (transitively) references itself is rejected.
//!
//! # Example
//!
//! ```
//! use crazymatrix::{
//!     BlockKind, BondTemplate, BoxFactory, BoxSide, CircuitFactory, Definition,
//!     DefinitionLibrary, EngineConfig, Result, TemplateFactory, Value, DRAWER_ID, POINT_ID,
//! };
//!
//! # fn main() -> Result<()> {
//! // A box squaring its single input
//! let mut square = BoxFactory::black_box();
//! let sq = square.add(BlockKind::Square);
//! square.add_bond(BondTemplate::new(BoxSide::In, &sq.id, None, 0));
//! square.add_bond(BondTemplate::new(BoxSide::Out, &sq.id, None, 0));
//!
//! let mut library = DefinitionLibrary::new();
//! library.insert("square", Definition::Box(square));
//!
//! // A circuit drawing square(x)
//! let mut circuit = CircuitFactory::new();
//! let bx = circuit.add_box_ref("square", 1, 1);
//! circuit.connect(POINT_ID, 0, &bx.id, None);
//! circuit.connect(&bx.id, 0, DRAWER_ID, None);
//!
//! let mut live = circuit.inst(&library, &EngineConfig::default())?;
//! assert_eq!(live.eval(-3.0, 0.0)?, Value::Number(9.0));
//! # Ok(())
//! # }
//! ```

use crate::circuit::Circuit;
use crate::config::EngineConfig;
use crate::definition_file::{DefinitionDoc, DefinitionKind, DocMeta};
use crate::error::{CrazyMatrixError, Result};
use crate::network::{BlockId, BoxFlavor, Network};
use crate::template::{
    BlockKind, BlockTemplate, BondTemplate, BoxSide, ConnTemplate, IdGenerator, DRAWER_ID,
    POINT_ID,
};
use std::collections::{HashMap, HashSet};
use std::path::Path;

/// Looks up stored definitions by name.
pub trait DefinitionResolver {
    /// The definition stored under `name`.
    ///
    /// # Errors
    ///
    /// `UnresolvedBoxReference` when no usable definition exists.
    fn resolve(&self, name: &str) -> Result<Definition>;
}

/// A circuit or box definition.
#[derive(Debug, Clone)]
pub enum Definition {
    /// Top-level circuit
    Circuit(CircuitFactory),
    /// Black box or repeat box
    Box(BoxFactory),
}

impl Definition {
    /// Kind of this definition.
    pub fn kind(&self) -> DefinitionKind {
        match self {
            Definition::Circuit(_) => DefinitionKind::Circuit,
            Definition::Box(factory) => match factory.flavor() {
                BoxFlavor::Black => DefinitionKind::BlackBox,
                BoxFlavor::Repeat => DefinitionKind::RepeatBox,
            },
        }
    }

    /// Persistable document.
    pub fn to_doc(&self) -> DefinitionDoc {
        match self {
            Definition::Circuit(factory) => factory.to_doc(),
            Definition::Box(factory) => factory.to_doc(),
        }
    }

    /// Factory of `kind` holding the templates of `doc`.
    pub fn from_doc(kind: DefinitionKind, doc: DefinitionDoc) -> Result<Self> {
        Ok(match kind {
            DefinitionKind::Circuit => Definition::Circuit(CircuitFactory::from_doc(doc)?),
            DefinitionKind::BlackBox => Definition::Box(BoxFactory::from_doc(doc, BoxFlavor::Black)?),
            DefinitionKind::RepeatBox => Definition::Box(BoxFactory::from_doc(doc, BoxFlavor::Repeat)?),
        })
    }

    /// Templates and bonds, for inspection.
    pub fn graph(&self) -> &TemplateGraph {
        match self {
            Definition::Circuit(factory) => factory.graph(),
            Definition::Box(factory) => factory.graph(),
        }
    }
}

/// In-memory set of named definitions.
#[derive(Debug, Clone, Default)]
pub struct DefinitionLibrary {
    definitions: HashMap<String, Definition>,
}

impl DefinitionLibrary {
    /// Create an empty library.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `definition` under `name`, returning the one it replaced.
    pub fn insert(&mut self, name: impl Into<String>, definition: Definition) -> Option<Definition> {
        self.definitions.insert(name.into(), definition)
    }

    /// Definition stored under `name`.
    pub fn get(&self, name: &str) -> Option<&Definition> {
        self.definitions.get(name)
    }

    /// Number of definitions.
    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    /// `true` when empty.
    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }
}

impl DefinitionResolver for DefinitionLibrary {
    fn resolve(&self, name: &str) -> Result<Definition> {
        self.get(name)
            .cloned()
            .ok_or_else(|| CrazyMatrixError::UnresolvedBoxReference(name.to_owned()))
    }
}

/// State shared by one (possibly nested) instantiation.
struct InstContext<'a> {
    resolver: &'a dyn DefinitionResolver,
    config: &'a EngineConfig,
    /// Box definitions currently being instantiated, outermost first
    stack: Vec<String>,
}

/// Block and connection templates plus the id generator producing them.
#[derive(Debug, Clone, Default)]
pub struct TemplateGraph {
    blocks: Vec<BlockTemplate>,
    conns: Vec<ConnTemplate>,
    description: Option<String>,
    ids: IdGenerator,
}

impl TemplateGraph {
    fn with_ids(ids: IdGenerator) -> Self {
        Self {
            ids,
            ..Self::default()
        }
    }

    /// Block templates in insertion order.
    pub fn blocks(&self) -> &[BlockTemplate] {
        &self.blocks
    }

    /// Connection templates in insertion order.
    pub fn conns(&self) -> &[ConnTemplate] {
        &self.conns
    }

    /// Free-text description.
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    fn load(&mut self, doc_blocks: Vec<BlockTemplate>, doc_conns: Vec<ConnTemplate>, meta: &DocMeta) {
        for block in &doc_blocks {
            self.ids.observe(&block.id);
        }
        self.blocks = doc_blocks;
        self.conns = doc_conns;
        self.description = meta.description.clone();
    }

    /// First pass: one live block per template, keyed by template id.
    fn instantiate_blocks(
        &self,
        net: &mut Network,
        ctx: &mut InstContext<'_>,
        mut by_id: HashMap<String, BlockId>,
    ) -> Result<HashMap<String, BlockId>> {
        for template in &self.blocks {
            if by_id.contains_key(&template.id) {
                if template.id == POINT_ID || template.id == DRAWER_ID {
                    continue;
                }
                return Err(CrazyMatrixError::InvalidParameter(format!(
                    "duplicate template id '{}'",
                    template.id
                )));
            }
            let id = match template.kind {
                BlockKind::Box => inst_box_ref(template, net, ctx)?,
                kind => {
                    let operator = kind.operator(template.value, ctx.config)?;
                    match &template.name {
                        Some(name) => net.add_named(operator, name.clone()),
                        None => net.add(operator),
                    }
                }
            };
            by_id.insert(template.id.clone(), id);
        }
        Ok(by_id)
    }

    /// Second pass: wire connections.
    fn wire_conns(&self, net: &mut Network, by_id: &HashMap<String, BlockId>) -> Result<()> {
        for conn in &self.conns {
            let source = lookup(by_id, &conn.source_id)?;
            let dest = lookup(by_id, &conn.dest_id)?;
            net.connect(source, Some(conn.source_pin), dest, conn.dest_pin)?;
        }
        Ok(())
    }
}

fn lookup(by_id: &HashMap<String, BlockId>, id: &str) -> Result<BlockId> {
    by_id
        .get(id)
        .copied()
        .ok_or_else(|| CrazyMatrixError::UnknownTemplateId(id.to_owned()))
}

/// Instantiate the definition a `box` template refers to.
fn inst_box_ref(template: &BlockTemplate, net: &mut Network, ctx: &mut InstContext<'_>) -> Result<BlockId> {
    let name = template.reference.as_deref().ok_or_else(|| {
        CrazyMatrixError::UnresolvedBoxReference(format!("<box template {} without reference>", template.id))
    })?;
    if ctx.stack.iter().any(|open| open == name) {
        return Err(CrazyMatrixError::RecursiveBoxReference(name.to_owned()));
    }

    let factory = match ctx.resolver.resolve(name)? {
        Definition::Box(factory) => factory,
        Definition::Circuit(_) => {
            return Err(CrazyMatrixError::InvalidParameter(format!(
                "'{name}' is a circuit and cannot be used as a box"
            )))
        }
    };
    if let Some(declared_in) = template.n_in {
        if (declared_in, template.n_out) != (factory.n_in(), factory.n_out()) {
            return Err(CrazyMatrixError::ArityMismatch {
                name: name.to_owned(),
                declared_in,
                declared_out: template.n_out,
                actual_in: factory.n_in(),
                actual_out: factory.n_out(),
            });
        }
    }

    ctx.stack.push(name.to_owned());
    let instance_name = template.name.as_deref().unwrap_or(name);
    let handle = factory.inst_into(net, Some(instance_name), ctx);
    ctx.stack.pop();
    handle
}

/// Template-building operations shared by circuit and box factories.
pub trait TemplateFactory {
    /// The accumulated templates.
    fn graph(&self) -> &TemplateGraph;

    /// Mutable access to the accumulated templates.
    fn graph_mut(&mut self) -> &mut TemplateGraph;

    /// A fresh template id from this factory's generator.
    fn new_id(&mut self) -> String {
        self.graph_mut().ids.next_id()
    }

    /// Add a block template and return it.
    fn add_block(&mut self, template: BlockTemplate) -> BlockTemplate {
        let graph = self.graph_mut();
        if graph.blocks.iter().any(|b| b.id == template.id) {
            log::warn!("template id '{}' added twice", template.id);
        }
        graph.ids.observe(&template.id);
        graph.blocks.push(template.clone());
        template
    }

    /// Add a block of `kind` with a fresh id.
    fn add(&mut self, kind: BlockKind) -> BlockTemplate {
        let id = self.new_id();
        self.add_block(BlockTemplate::of_kind(kind, id))
    }

    /// Add a constant block.
    fn add_const(&mut self, value: f64) -> BlockTemplate {
        let id = self.new_id();
        self.add_block(BlockTemplate::of_kind(BlockKind::Const, id).with_value(value))
    }

    /// Add a box block referencing the definition `reference`.
    fn add_box_ref(&mut self, reference: &str, n_in: usize, n_out: usize) -> BlockTemplate {
        let id = self.new_id();
        self.add_block(BlockTemplate::boxed(reference, n_in, n_out, id))
    }

    /// Add a connection template and return it.
    fn add_conn(&mut self, conn: ConnTemplate) -> ConnTemplate {
        self.graph_mut().conns.push(conn.clone());
        conn
    }

    /// Add a connection from `source:source_pin` to `dest:dest_pin`.
    fn connect(&mut self, source: &str, source_pin: usize, dest: &str, dest_pin: Option<usize>) -> ConnTemplate {
        self.add_conn(ConnTemplate::new(source, source_pin, dest, dest_pin))
    }

    /// Block templates.
    fn blocks(&self) -> &[BlockTemplate] {
        self.graph().blocks()
    }

    /// Connection templates.
    fn conns(&self) -> &[ConnTemplate] {
        self.graph().conns()
    }

    /// Set the free-text description.
    fn set_description(&mut self, description: impl Into<String>) {
        self.graph_mut().description = Some(description.into());
    }
}

/// Builds top-level circuits.
#[derive(Debug, Clone, Default)]
pub struct CircuitFactory {
    graph: TemplateGraph,
}

impl TemplateFactory for CircuitFactory {
    fn graph(&self) -> &TemplateGraph {
        &self.graph
    }

    fn graph_mut(&mut self) -> &mut TemplateGraph {
        &mut self.graph
    }
}

impl CircuitFactory {
    /// Create an empty factory with an entropy-seeded id generator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty factory using `ids`.
    pub fn with_ids(ids: IdGenerator) -> Self {
        Self {
            graph: TemplateGraph::with_ids(ids),
        }
    }

    /// Instantiate a live circuit.
    ///
    /// # Errors
    ///
    /// - `UnknownTemplateId` for connections naming unknown blocks
    /// - `UnresolvedBoxReference` / `RecursiveBoxReference` / `ArityMismatch`
    ///   for box templates
    /// - `IncompleteBoxBonding` from nested boxes
    /// - `PinRange` for connections outside a block's arity
    pub fn inst(&self, resolver: &dyn DefinitionResolver, config: &EngineConfig) -> Result<Circuit> {
        let mut circuit = Circuit::with_config(config);
        let reserved = HashMap::from([
            (POINT_ID.to_owned(), circuit.point()),
            (DRAWER_ID.to_owned(), circuit.drawer()),
        ]);
        let mut ctx = InstContext {
            resolver,
            config,
            stack: Vec::new(),
        };

        let net = circuit.network_mut();
        let by_id = self.graph.instantiate_blocks(net, &mut ctx, reserved)?;
        self.graph.wire_conns(net, &by_id)?;
        log::debug!("instantiated circuit: {} blocks", net.len());
        Ok(circuit)
    }

    /// Persistable document.
    pub fn to_doc(&self) -> DefinitionDoc {
        DefinitionDoc {
            meta: DocMeta {
                kind: Some(DefinitionKind::Circuit),
                n_in: None,
                n_out: None,
                description: self.graph.description.clone(),
            },
            blocks: self.graph.blocks.clone(),
            conns: self.graph.conns.clone(),
            bonds: Vec::new(),
        }
    }

    /// Factory holding the templates of `doc`; bonds are ignored.
    pub fn from_doc(doc: DefinitionDoc) -> Result<Self> {
        if !doc.bonds.is_empty() {
            log::warn!("circuit document carries {} bonds, ignored", doc.bonds.len());
        }
        let mut factory = Self::new();
        factory.graph.load(doc.blocks, doc.conns, &doc.meta);
        Ok(factory)
    }

    /// Write the templates to `path` as JSON.
    pub fn store(&self, path: impl AsRef<Path>) -> Result<()> {
        self.to_doc().write_json(path)
    }

    /// Read a factory from a JSON or legacy definition file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_doc(DefinitionDoc::read(path)?)
    }
}

/// A box instantiated on its own network.
#[derive(Debug, Clone)]
pub struct BoxInstance {
    /// Network holding the box and its inner blocks
    pub network: Network,
    /// Facade handle of the box
    pub handle: BlockId,
}

/// Builds black boxes and repeat boxes.
///
/// Boundary pin counts follow the bonds: IN bonds count distinct boundary
/// pins, OUT bonds count one each, and [`reserve_pin`](Self::reserve_pin)
/// adds a pin without binding it. The count pin of a repeat box is such a
/// reserved pin and always the last IN pin.
#[derive(Debug, Clone)]
pub struct BoxFactory {
    graph: TemplateGraph,
    flavor: BoxFlavor,
    bonds: Vec<BondTemplate>,
    n_in: usize,
    n_out: usize,
}

impl TemplateFactory for BoxFactory {
    fn graph(&self) -> &TemplateGraph {
        &self.graph
    }

    fn graph_mut(&mut self) -> &mut TemplateGraph {
        &mut self.graph
    }
}

impl BoxFactory {
    /// Create an empty factory of `flavor`.
    pub fn new(flavor: BoxFlavor) -> Self {
        Self::with_ids(flavor, IdGenerator::new())
    }

    /// Create an empty factory of `flavor` using `ids`.
    pub fn with_ids(flavor: BoxFlavor, ids: IdGenerator) -> Self {
        Self {
            graph: TemplateGraph::with_ids(ids),
            flavor,
            bonds: Vec::new(),
            n_in: 0,
            n_out: 0,
        }
    }

    /// Empty black box factory.
    pub fn black_box() -> Self {
        Self::new(BoxFlavor::Black)
    }

    /// Empty repeat box factory.
    pub fn repeat_box() -> Self {
        Self::new(BoxFlavor::Repeat)
    }

    /// Black or repeat box.
    pub fn flavor(&self) -> BoxFlavor {
        self.flavor
    }

    /// Boundary input pins, including a repeat box's count pin.
    pub fn n_in(&self) -> usize {
        self.n_in
    }

    /// Boundary output pins.
    pub fn n_out(&self) -> usize {
        self.n_out
    }

    /// Bond templates.
    pub fn bonds(&self) -> &[BondTemplate] {
        &self.bonds
    }

    /// Add a bond and update the pin counters.
    pub fn add_bond(&mut self, bond: BondTemplate) -> BondTemplate {
        match bond.side {
            BoxSide::In => {
                let shared = self
                    .bonds
                    .iter()
                    .any(|b| b.side == BoxSide::In && b.box_pin == bond.box_pin);
                if !shared {
                    self.n_in += 1;
                }
            }
            BoxSide::Out => self.n_out += 1,
        }
        self.bonds.push(bond.clone());
        bond
    }

    /// Add a boundary pin on `side` without an inner binding.
    ///
    /// Returns the index the reserved pin will have once all bonded pins
    /// are numbered before it.
    pub fn reserve_pin(&mut self, side: BoxSide) -> usize {
        let counter = match side {
            BoxSide::In => &mut self.n_in,
            BoxSide::Out => &mut self.n_out,
        };
        *counter += 1;
        *counter - 1
    }

    /// Check that the bond set matches the pin counts.
    ///
    /// # Errors
    ///
    /// `IncompleteBoxBonding` when a repeat box has no count pin, when the
    /// box has no output, when a bond addresses a boundary pin outside the
    /// box (or the count pin), when a data input pin has no bond, or when
    /// an output pin is bonded zero or several times.
    pub fn validate_bonds(&self, name: &str) -> Result<()> {
        let fail = |reason: String| CrazyMatrixError::IncompleteBoxBonding {
            name: name.to_owned(),
            reason,
        };
        if self.n_out == 0 {
            return Err(fail("box has no output pins".into()));
        }

        let n_data = match self.flavor {
            BoxFlavor::Black => self.n_in,
            BoxFlavor::Repeat => self
                .n_in
                .checked_sub(1)
                .ok_or_else(|| fail("repeat box without a count pin".into()))?,
        };

        let mut in_pins = HashSet::new();
        let mut out_pins = HashSet::new();
        for bond in &self.bonds {
            match bond.side {
                BoxSide::In if bond.box_pin >= n_data => {
                    return Err(fail(if self.flavor == BoxFlavor::Repeat && bond.box_pin == n_data {
                        format!("IN bond {bond} targets the count pin")
                    } else {
                        format!("IN bond {bond} outside {n_data} input pins")
                    }))
                }
                BoxSide::Out if bond.box_pin >= self.n_out => {
                    return Err(fail(format!("OUT bond {bond} outside {} output pins", self.n_out)))
                }
                BoxSide::Out if !out_pins.insert(bond.box_pin) => {
                    return Err(fail(format!("output pin {} bonded twice", bond.box_pin)))
                }
                BoxSide::In => {
                    in_pins.insert(bond.box_pin);
                }
                BoxSide::Out => {}
            }
        }
        if let Some(missing) = (0..n_data).find(|pin| !in_pins.contains(pin)) {
            return Err(fail(format!("input pin {missing} has no bond")));
        }
        if let Some(missing) = (0..self.n_out).find(|pin| !out_pins.contains(pin)) {
            return Err(fail(format!("output pin {missing} has no bond")));
        }
        Ok(())
    }

    /// Instantiate the box on a fresh network.
    ///
    /// `name` names the instance and guards against the box referencing
    /// itself through nested box templates.
    pub fn inst(
        &self,
        resolver: &dyn DefinitionResolver,
        config: &EngineConfig,
        name: Option<&str>,
    ) -> Result<BoxInstance> {
        let mut network = Network::with_config(config);
        let mut ctx = InstContext {
            resolver,
            config,
            stack: name.map(str::to_owned).into_iter().collect(),
        };
        let handle = self.inst_into(&mut network, name, &mut ctx)?;
        Ok(BoxInstance { network, handle })
    }

    fn inst_into(&self, net: &mut Network, name: Option<&str>, ctx: &mut InstContext<'_>) -> Result<BlockId> {
        self.validate_bonds(name.unwrap_or("<anonymous>"))?;

        let handle = match self.flavor {
            BoxFlavor::Black => net.add_box(self.n_in, self.n_out, name),
            BoxFlavor::Repeat => net.add_repeat_box(self.n_in - 1, self.n_out, name),
        };
        let by_id = self.graph.instantiate_blocks(net, ctx, HashMap::new())?;
        self.graph.wire_conns(net, &by_id)?;

        for bond in &self.bonds {
            let inner = lookup(&by_id, &bond.block_id)?;
            match bond.side {
                BoxSide::In => net.bind_input(handle, inner, bond.block_pin, bond.box_pin)?,
                BoxSide::Out => net.bind_output(handle, inner, bond.block_pin, bond.box_pin)?,
            };
        }
        log::debug!(
            "instantiated {:?} box '{}' ({} -> {}) as {handle}",
            self.flavor,
            name.unwrap_or("<anonymous>"),
            self.n_in,
            self.n_out
        );
        Ok(handle)
    }

    /// Persistable document.
    pub fn to_doc(&self) -> DefinitionDoc {
        let kind = match self.flavor {
            BoxFlavor::Black => DefinitionKind::BlackBox,
            BoxFlavor::Repeat => DefinitionKind::RepeatBox,
        };
        DefinitionDoc {
            meta: DocMeta {
                kind: Some(kind),
                n_in: Some(self.n_in),
                n_out: Some(self.n_out),
                description: self.graph.description.clone(),
            },
            blocks: self.graph.blocks.clone(),
            conns: self.graph.conns.clone(),
            bonds: self.bonds.clone(),
        }
    }

    /// Factory of `flavor` holding the templates of `doc`.
    ///
    /// Pin counts are recounted from the bonds (plus the count pin of a
    /// repeat box). The meta record's counts must agree with them.
    ///
    /// # Errors
    ///
    /// `IncompleteBoxBonding` when `meta.n_in` or `meta.n_out` differs from
    /// the bonded pin count.
    pub fn from_doc(doc: DefinitionDoc, flavor: BoxFlavor) -> Result<Self> {
        let mut factory = Self::new(flavor);
        factory.graph.load(doc.blocks, doc.conns, &doc.meta);
        for bond in doc.bonds {
            factory.add_bond(bond);
        }
        if flavor == BoxFlavor::Repeat {
            factory.reserve_pin(BoxSide::In);
        }

        let declared = [("inputs", doc.meta.n_in, factory.n_in), ("outputs", doc.meta.n_out, factory.n_out)];
        for (side, meta, bonded) in declared {
            match meta {
                Some(meta) if meta != bonded => {
                    return Err(CrazyMatrixError::IncompleteBoxBonding {
                        name: "<anonymous>".into(),
                        reason: format!("meta declares {meta} {side}, bonds give {bonded}"),
                    });
                }
                _ => {}
            }
        }
        Ok(factory)
    }

    /// Write the templates to `path` as JSON.
    pub fn store(&self, path: impl AsRef<Path>) -> Result<()> {
        self.to_doc().write_json(path)
    }

    /// Read a factory of `flavor` from a JSON or legacy definition file.
    pub fn load(path: impl AsRef<Path>, flavor: BoxFlavor) -> Result<Self> {
        Self::from_doc(DefinitionDoc::read(path)?, flavor)
    }
}

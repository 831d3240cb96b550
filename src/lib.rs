//! CrazyMatrix - Pull-Evaluated Dataflow Circuits
//!
//! CrazyMatrix evaluates circuits of small computational blocks. Each block
//! has numbered input and output pins; connections run from an output pin
//! to an input pin. Asking a block for a value pulls its inputs, computes
//! once and caches the result until the epoch is reset. A circuit is
//! evaluated once per coordinate of a 2-D grid.
//!
//! # Key Characteristics
//!
//! - Arena-owned blocks addressed by copyable [`BlockId`] handles
//! - Undefined results (division by zero, `sqrt(-1)`) propagate as values
//! - Black boxes compose sub-networks behind a fixed pin interface
//! - Repeat boxes iterate a sub-network, feeding outputs back into inputs
//! - Templates describe circuits and boxes by stable ids and persist as JSON
//!
//! # Architecture
//!
//! - **Value** / **Block**: the dataflow value type and one node with its
//!   input slots, cached outputs and operator
//! - **Network**: the arena, connection rules, pull evaluation and resets
//! - **Circuit**: a network with a position input and a drawer sink
//! - **Templates** / **Factories**: descriptions of blocks, connections and
//!   box bonds, instantiated into live networks
//! - **Registry**: named definitions stored under a directory tree
//!
//! # Examples
//!
//! ## Wiring a network by hand
//!
//! ```
//! use crazymatrix::blocks::Operator;
//! use crazymatrix::{Network, Value};
//!
//! let mut net = Network::new();
//! let x = net.add(Operator::Const(3.0));
//! let sq = net.add(Operator::Square);
//! net.connect(x, None, sq, None).unwrap();
//!
//! assert_eq!(net.value(sq, None).unwrap(), Value::Number(9.0));
//! ```
//!
//! ## Building a circuit from templates
//!
//! ```
//! use crazymatrix::{
//!     BlockKind, CircuitFactory, DefinitionLibrary, EngineConfig, TemplateFactory, Value,
//!     DRAWER_ID, POINT_ID,
//! };
//!
//! let mut factory = CircuitFactory::new();
//! let mul = factory.add(BlockKind::Mul);
//! factory.connect(POINT_ID, 0, &mul.id, None);
//! factory.connect(POINT_ID, 1, &mul.id, None);
//! factory.connect(&mul.id, 0, DRAWER_ID, None);
//!
//! let mut circuit = factory
//!     .inst(&DefinitionLibrary::new(), &EngineConfig::default())
//!     .unwrap();
//! assert_eq!(circuit.eval(-2.0, 4.0).unwrap(), Value::Number(-8.0));
//! ```

pub mod error;
pub mod value;

// Block infrastructure
pub mod block;
pub mod block_base;
pub mod block_input;
pub mod block_output;
pub mod blocks;

// Evaluation
pub mod circuit;
pub mod config;
pub mod network;

// Templates and persistence
pub mod definition_file;
pub mod factory;
pub mod registry;
pub mod template;

pub use error::{CrazyMatrixError, Result};
pub use value::Value;

pub use block::Block;
pub use block_base::{BlockBase, BlockStats};
pub use block_input::{BlockInput, ConnectOutcome, Connection};
pub use block_output::BlockOutput;
pub use blocks::{Operator, RepeatPhase};

pub use circuit::Circuit;
pub use config::{AngleUnit, EngineConfig};
pub use network::{BlockId, BoxFlavor, BoxHandle, Network};

pub use definition_file::{DefinitionDoc, DefinitionKind, DocMeta};
pub use factory::{
    BoxFactory, BoxInstance, CircuitFactory, Definition, DefinitionLibrary, DefinitionResolver,
    TemplateFactory, TemplateGraph,
};
pub use registry::{DuplicateName, LoadOutcome, Registry, RegistryEntry, ScanReport};
pub use template::{
    BlockKind, BlockTemplate, BondTemplate, BoxSide, ConnTemplate, IdGenerator, DRAWER_ID,
    POINT_ID,
};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Runtime name
pub const NAME: &str = "CrazyMatrix";

/// Get version string
pub fn version() -> String {
    format!("{} v{}", NAME, VERSION)
}

//! Circuit - Top-level evaluation entry point.
//!
//! A circuit is a [`Network`] with two designated blocks: the input
//! position (a `Point`, emitting x on pin 0 and y on pin 1) and the drawer
//! sink. Evaluating a circuit at a coordinate moves the position, pulls the
//! drawer's input and then resets the epoch so the next coordinate starts
//! from clean caches.
//!
//! # Example
//!
//! ```
//! use crazymatrix::blocks::Operator;
//! use crazymatrix::{Circuit, Result, Value};
//!
//! # fn main() -> Result<()> {
//! let mut circuit = Circuit::new();
//! let (point, drawer) = (circuit.point(), circuit.drawer());
//!
//! let net = circuit.network_mut();
//! let mul = net.add(Operator::Mul);
//! net.connect(point, Some(0), mul, None)?;
//! net.connect(point, Some(1), mul, None)?;
//! net.connect(mul, None, drawer, None)?;
//!
//! assert_eq!(circuit.eval(3.0, -2.0)?, Value::Number(-6.0));
//! assert_eq!(circuit.eval(4.0, 5.0)?, Value::Number(20.0));
//! # Ok(())
//! # }
//! ```

use crate::blocks::Operator;
use crate::config::EngineConfig;
use crate::error::Result;
use crate::network::{BlockId, Network};
use crate::value::Value;

/// A network with an input position and a drawer sink.
#[derive(Debug, Clone)]
pub struct Circuit {
    network: Network,
    point: BlockId,
    drawer: BlockId,
}

impl Circuit {
    /// Create a circuit holding only its position and drawer blocks.
    pub fn new() -> Self {
        Self::with_network(Network::new())
    }

    /// Create an empty circuit whose network uses `config`.
    pub fn with_config(config: &EngineConfig) -> Self {
        Self::with_network(Network::with_config(config))
    }

    fn with_network(mut network: Network) -> Self {
        let point = network.add_named(Operator::Point { x: 0.0, y: 0.0 }, "pos");
        let drawer = network.add_named(Operator::Drawer, "drawer");
        Self {
            network,
            point,
            drawer,
        }
    }

    /// Handle of the input position block.
    pub fn point(&self) -> BlockId {
        self.point
    }

    /// Handle of the drawer sink.
    pub fn drawer(&self) -> BlockId {
        self.drawer
    }

    /// The underlying network.
    pub fn network(&self) -> &Network {
        &self.network
    }

    /// The underlying network, for wiring.
    pub fn network_mut(&mut self) -> &mut Network {
        &mut self.network
    }

    /// Evaluate the circuit at `(x, y)`.
    ///
    /// Returns the value arriving at the drawer; `Undefined` when nothing
    /// is connected to it.
    pub fn eval(&mut self, x: f64, y: f64) -> Result<Value> {
        self.network.set_point(self.point, x, y)?;
        let value = self.network.input_value(self.drawer, 0)?;
        self.network.reset_evaluated(self.drawer)?;
        Ok(value)
    }

    /// Evaluate a `width` x `height` grid of integer coordinates.
    ///
    /// The grid is centred on the origin: column `c` maps to
    /// `x = c - width / 2`, row `r` to `y = r - height / 2` (integer halves).
    /// The result is indexed `[row][column]`.
    pub fn eval_grid(&mut self, width: usize, height: usize) -> Result<Vec<Vec<Value>>> {
        let offset_x = (width / 2) as f64;
        let offset_y = (height / 2) as f64;
        (0..height)
            .map(|row| {
                (0..width)
                    .map(|col| self.eval(col as f64 - offset_x, row as f64 - offset_y))
                    .collect()
            })
            .collect()
    }
}

impl Default for Circuit {
    fn default() -> Self {
        Self::new()
    }
}

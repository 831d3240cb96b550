//! Operator blocks - the closed set of things a block can compute.
//!
//! Every block in a [`Network`](crate::Network) carries one [`Operator`].
//! `Operator::compute` is the single dispatch point: it reads the block's
//! inputs through an [`InputSource`] (which pulls upstream blocks lazily)
//! and returns the new output values.
//!
//! # Operator families
//!
//! - **Sources**: `Const`, `Point` (circuit input position), `Variable`
//! - **Sink**: `Drawer`
//! - **Math**: n-ary `Add`/`Mul`/`Min`/`Max`, binary `Sub`/`Div`/`Mod`,
//!   unary `Abs`/`Minus`/`Square`/`Sqrt`/`Log`/`Sin`/`Cos`/`Tan`
//! - **Logic**: n-ary `And`/`Or`/`Eq`, `Not`, `Gt`, `Lt`
//! - **Complex**: n-ary `ComplexAdd`/`ComplexMul` over (re, im) input pairs,
//!   `ComplexSub`/`ComplexDiv` over four inputs
//! - **Boundary**: `PassThrough` (box layers) and `RepeatInput` (the input
//!   layer of a repeat box, driven by the network)
//!
//! # Undefined propagation
//!
//! No operator raises on bad data. An undefined input, a violated domain
//! (division by zero, square root of a negative, logarithm of a
//! non-positive number) or a non-finite result sets *all* outputs to
//! [`Value::Undefined`].

pub mod boundary;
pub mod complex;
pub mod logic;
pub mod math;

pub use boundary::{latch_count, RepeatLatch, RepeatPhase};

use crate::config::AngleUnit;
use crate::error::{CrazyMatrixError, Result};
use crate::value::Value;

/// Read access to the inputs of the block being computed.
///
/// Reading a pin may evaluate the upstream block it is connected to, so
/// operators read only what they need and stop at the first undefined
/// input where the result is already decided.
pub trait InputSource {
    /// Number of input pins.
    fn len(&self) -> usize;

    /// Value arriving at `pin`; unconnected pins read as `Undefined`.
    fn read(&mut self, pin: usize) -> Result<Value>;

    /// `true` when the block has no input pins.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// `true` when `pin` holds a connection.
    ///
    /// Sources that cannot tell (plain value lists) report every existing
    /// pin as connected.
    fn is_connected(&self, pin: usize) -> bool {
        pin < self.len()
    }

    /// Value at `pin` as a number, `None` when not defined.
    fn number(&mut self, pin: usize) -> Result<Option<f64>> {
        Ok(self.read(pin)?.number())
    }
}

/// Input arity of an operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    /// Exactly this many input pins
    Fixed(usize),
    /// Pins are appended as connections are made
    Dynamic,
}

/// The closed set of block operators.
#[derive(Debug, Clone, PartialEq)]
pub enum Operator {
    /// Constant value, no inputs
    Const(f64),
    /// Input position of a circuit (x, y); settable from outside
    Point {
        /// First output
        x: f64,
        /// Second output
        y: f64,
    },
    /// Holds a value; forwards its input once connected
    Variable(Value),
    /// Circuit sink: one input, no outputs
    Drawer,

    /// Sum of all inputs
    Add,
    /// Product of all inputs
    Mul,
    /// Smallest input
    Min,
    /// Largest input
    Max,
    /// `in0 - in1`
    Sub,
    /// `in0 / in1`
    Div,
    /// `in0 mod in1`, result takes the sign of the divisor
    Mod,
    /// `|in0|`
    Abs,
    /// `-in0`
    Minus,
    /// `in0²`
    Square,
    /// `√in0`
    Sqrt,
    /// `ln(in0)`
    Log,
    /// Sine with the given argument unit
    Sin(AngleUnit),
    /// Cosine with the given argument unit
    Cos(AngleUnit),
    /// Tangent with the given argument unit
    Tan(AngleUnit),

    /// 1 when every input is > 0
    And,
    /// 1 when any input is > 0
    Or,
    /// 1 when the input is 0
    Not,
    /// `in0 > in1`
    Gt,
    /// `in0 < in1`
    Lt,
    /// 1 when all inputs are equal
    Eq,

    /// Sum of (re, im) input pairs
    ComplexAdd,
    /// Product of (re, im) input pairs
    ComplexMul,
    /// `(in0 + i·in1) - (in2 + i·in3)`
    ComplexSub,
    /// `(in0 + i·in1) / (in2 + i·in3)`
    ComplexDiv,

    /// Identity over `n` pins (box boundary layer)
    PassThrough(usize),
    /// Input layer of a repeat box with `n_data` data pins plus a count pin
    RepeatInput {
        /// Number of data pins (the count pin comes after them)
        n_data: usize,
        /// Iteration state
        latch: RepeatLatch,
    },
}

impl Operator {
    /// Input arity of this operator.
    pub fn arity(&self) -> Arity {
        use Operator::*;
        match self {
            Const(_) | Point { .. } => Arity::Fixed(0),
            Variable(_) | Drawer => Arity::Fixed(1),
            Add | Mul | Min | Max | And | Or | Eq | ComplexAdd | ComplexMul => Arity::Dynamic,
            Sub | Div | Mod | Gt | Lt => Arity::Fixed(2),
            Abs | Minus | Square | Sqrt | Log | Sin(_) | Cos(_) | Tan(_) | Not => Arity::Fixed(1),
            ComplexSub | ComplexDiv => Arity::Fixed(4),
            PassThrough(n) => Arity::Fixed(*n),
            RepeatInput { n_data, .. } => Arity::Fixed(n_data + 1),
        }
    }

    /// Output arity of this operator (always fixed).
    pub fn n_out(&self) -> usize {
        use Operator::*;
        match self {
            Drawer => 0,
            Point { .. } | ComplexAdd | ComplexMul | ComplexSub | ComplexDiv => 2,
            PassThrough(n) => *n,
            RepeatInput { n_data, .. } => *n_data,
            _ => 1,
        }
    }

    /// Short lowercase label, used in logs and `Display` output.
    pub fn label(&self) -> &'static str {
        use Operator::*;
        match self {
            Const(_) => "const",
            Point { .. } => "pos",
            Variable(_) => "variable",
            Drawer => "drawer",
            Add => "add",
            Mul => "mul",
            Min => "min",
            Max => "max",
            Sub => "sub",
            Div => "div",
            Mod => "mod",
            Abs => "abs",
            Minus => "minus",
            Square => "square",
            Sqrt => "sqrt",
            Log => "log",
            Sin(_) => "sin",
            Cos(_) => "cos",
            Tan(_) => "tan",
            And => "and",
            Or => "or",
            Not => "not",
            Gt => "gt",
            Lt => "lt",
            Eq => "eq",
            ComplexAdd => "cadd",
            ComplexMul => "cmul",
            ComplexSub => "csub",
            ComplexDiv => "cdiv",
            PassThrough(_) => "passthrough",
            RepeatInput { .. } => "repeat_input",
        }
    }

    /// Compute output values from the current inputs.
    ///
    /// Only the owning network calls this, from inside `value()` when the
    /// block's cache is stale.
    ///
    /// # Errors
    ///
    /// Structural errors raised while pulling upstream blocks are passed
    /// through. A `RepeatInput` cannot compute on its own and reports an
    /// error; the network drives it instead.
    pub fn compute(&self, inputs: &mut dyn InputSource) -> Result<Vec<Value>> {
        use Operator::*;
        let out = match self {
            Const(x) => vec![Value::from_f64(*x)],
            Point { x, y } => vec![Value::from_f64(*x), Value::from_f64(*y)],
            Variable(held) => {
                if inputs.is_empty() || !inputs.is_connected(0) {
                    vec![*held]
                } else {
                    vec![inputs.read(0)?]
                }
            }
            Drawer => Vec::new(),

            Add => vec![math::fold(inputs, |a, b| a + b)?],
            Mul => vec![math::fold(inputs, |a, b| a * b)?],
            Min => vec![math::fold(inputs, f64::min)?],
            Max => vec![math::fold(inputs, f64::max)?],
            Sub => vec![math::binary(inputs, |a, b| Some(a - b))?],
            Div => vec![math::binary(inputs, math::div)?],
            Mod => vec![math::binary(inputs, math::modulo)?],
            Abs => vec![math::unary(inputs, |a| Some(a.abs()))?],
            Minus => vec![math::unary(inputs, |a| Some(-a))?],
            Square => vec![math::unary(inputs, |a| Some(a * a))?],
            Sqrt => vec![math::unary(inputs, math::sqrt)?],
            Log => vec![math::unary(inputs, math::ln)?],
            Sin(unit) => vec![math::trig(inputs, *unit, f64::sin)?],
            Cos(unit) => vec![math::trig(inputs, *unit, f64::cos)?],
            Tan(unit) => vec![math::trig(inputs, *unit, f64::tan)?],

            And => vec![logic::all_inputs(inputs, |xs| xs.iter().all(|x| *x > 0.0))?],
            Or => vec![logic::all_inputs(inputs, |xs| xs.iter().any(|x| *x > 0.0))?],
            Eq => vec![logic::all_inputs(inputs, logic::all_equal)?],
            Not => vec![math::unary(inputs, |a| Some(logic::truth(a == 0.0)))?],
            Gt => vec![math::binary(inputs, |a, b| Some(logic::truth(a > b)))?],
            Lt => vec![math::binary(inputs, |a, b| Some(logic::truth(a < b)))?],

            ComplexAdd => complex::fold_pairs(inputs, num_complex::Complex64::new(0.0, 0.0), |a, b| a + b)?,
            ComplexMul => complex::fold_pairs(inputs, num_complex::Complex64::new(1.0, 0.0), |a, b| a * b)?,
            ComplexSub => complex::binary(inputs, |a, b| Some(a - b))?,
            ComplexDiv => complex::binary(inputs, complex::div)?,

            PassThrough(n) => (0..*n).map(|pin| inputs.read(pin)).collect::<Result<_>>()?,
            RepeatInput { .. } => {
                return Err(CrazyMatrixError::Other(
                    "repeat input layer is driven by its network".into(),
                ))
            }
        };
        Ok(out)
    }
}

/// Input source over plain values, for evaluating operators in isolation.
///
/// # Examples
///
/// ```
/// use crazymatrix::blocks::{Operator, ValueInputs};
/// use crazymatrix::Value;
///
/// let mut inputs = ValueInputs::new(vec![Value::Number(6.0), Value::Number(3.0)]);
/// let out = Operator::Div.compute(&mut inputs).unwrap();
/// assert_eq!(out, vec![Value::Number(2.0)]);
/// ```
#[derive(Debug, Clone, Default)]
pub struct ValueInputs {
    values: Vec<Value>,
    reads: usize,
}

impl ValueInputs {
    /// Wrap `values` as pins 0..n.
    pub fn new(values: Vec<Value>) -> Self {
        Self { values, reads: 0 }
    }

    /// Number of `read` calls so far.
    pub fn reads(&self) -> usize {
        self.reads
    }
}

impl InputSource for ValueInputs {
    fn len(&self) -> usize {
        self.values.len()
    }

    fn read(&mut self, pin: usize) -> Result<Value> {
        self.reads += 1;
        self.values
            .get(pin)
            .copied()
            .ok_or(CrazyMatrixError::PinRange {
                pin,
                len: self.values.len(),
            })
    }
}

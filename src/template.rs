//! Templates - Serializable descriptions of blocks, connections and bonds.
//!
//! Templates describe a circuit or box without instantiating it. Every
//! block template carries an opaque string id; connections and bonds refer
//! to blocks by id only, never by position in a list.
//!
//! Two ids are reserved for top-level circuits: [`POINT_ID`] names the input
//! position block and [`DRAWER_ID`] the drawer sink. The [`IdGenerator`]
//! never hands them out.
//!
//! # Examples
//!
//! ```
//! use crazymatrix::{BlockKind, BlockTemplate, IdGenerator};
//!
//! let mut ids = IdGenerator::with_seed(7);
//! let add = BlockTemplate::of_kind(BlockKind::Add, ids.next_id());
//! assert_eq!(add.n_in, None);
//! assert_eq!(add.n_out, 1);
//! assert_eq!(add.id.len(), 32);
//! ```

use crate::blocks::Operator;
use crate::config::EngineConfig;
use crate::error::{CrazyMatrixError, Result};
use crate::value::Value;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

/// Reserved id of a circuit's input position block.
pub const POINT_ID: &str = "0";

/// Reserved id of a circuit's drawer sink.
pub const DRAWER_ID: &str = "1";

/// Closed set of block kinds a template can name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockKind {
    /// Dynamic input position (x, y)
    Pos,
    /// Fixed point (x, y)
    Point,
    /// Circuit sink
    Drawer,
    /// Constant value
    Const,
    /// Settable variable
    Variable,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Abs,
    Minus,
    Square,
    Sqrt,
    Log,
    Min,
    Max,
    Sin,
    Cos,
    Tan,
    And,
    Or,
    Not,
    Gt,
    Lt,
    Eq,
    /// Complex sum over (re, im) pairs
    Cadd,
    /// Complex product over (re, im) pairs
    Cmul,
    /// Complex difference
    Csub,
    /// Complex quotient
    Cdiv,
    /// Nested box, resolved by reference name
    Box,
}

impl BlockKind {
    /// Every kind, in declaration order.
    pub const ALL: [BlockKind; 31] = [
        BlockKind::Pos,
        BlockKind::Point,
        BlockKind::Drawer,
        BlockKind::Const,
        BlockKind::Variable,
        BlockKind::Add,
        BlockKind::Sub,
        BlockKind::Mul,
        BlockKind::Div,
        BlockKind::Mod,
        BlockKind::Abs,
        BlockKind::Minus,
        BlockKind::Square,
        BlockKind::Sqrt,
        BlockKind::Log,
        BlockKind::Min,
        BlockKind::Max,
        BlockKind::Sin,
        BlockKind::Cos,
        BlockKind::Tan,
        BlockKind::And,
        BlockKind::Or,
        BlockKind::Not,
        BlockKind::Gt,
        BlockKind::Lt,
        BlockKind::Eq,
        BlockKind::Cadd,
        BlockKind::Cmul,
        BlockKind::Csub,
        BlockKind::Cdiv,
        BlockKind::Box,
    ];

    /// Tag used in definition files.
    pub fn as_str(self) -> &'static str {
        use BlockKind::*;
        match self {
            Pos => "pos",
            Point => "point",
            Drawer => "drawer",
            Const => "const",
            Variable => "variable",
            Add => "add",
            Sub => "sub",
            Mul => "mul",
            Div => "div",
            Mod => "mod",
            Abs => "abs",
            Minus => "minus",
            Square => "square",
            Sqrt => "sqrt",
            Log => "log",
            Min => "min",
            Max => "max",
            Sin => "sin",
            Cos => "cos",
            Tan => "tan",
            And => "and",
            Or => "or",
            Not => "not",
            Gt => "gt",
            Lt => "lt",
            Eq => "eq",
            Cadd => "cadd",
            Cmul => "cmul",
            Csub => "csub",
            Cdiv => "cdiv",
            Box => "box",
        }
    }

    /// Default `(n_in, n_out)`; `None` inputs means n-ary.
    ///
    /// A box's arity comes from its definition, so `Box` reports `(None, 0)`.
    pub fn pin_counts(self) -> (Option<usize>, usize) {
        use BlockKind::*;
        match self {
            Pos | Point => (Some(0), 2),
            Drawer => (Some(1), 0),
            Const => (Some(0), 1),
            Add | Mul | Min | Max | And | Or | Eq => (None, 1),
            Cadd | Cmul => (None, 2),
            Sub | Div | Mod | Gt | Lt => (Some(2), 1),
            Variable | Abs | Minus | Square | Sqrt | Log | Sin | Cos | Tan | Not => (Some(1), 1),
            Csub | Cdiv => (Some(4), 2),
            Box => (None, 0),
        }
    }

    /// Operator for a primitive kind.
    ///
    /// # Errors
    ///
    /// `InvalidParameter` for a `const` without a value and for `box`,
    /// which is resolved by the factory instead.
    pub fn operator(self, value: Option<f64>, config: &EngineConfig) -> Result<Operator> {
        use BlockKind::*;
        let unit = config.angle_unit;
        Ok(match self {
            Pos | Point => Operator::Point { x: 0.0, y: 0.0 },
            Drawer => Operator::Drawer,
            Const => Operator::Const(value.ok_or_else(|| {
                CrazyMatrixError::InvalidParameter("const block without a value".into())
            })?),
            Variable => Operator::Variable(value.map_or(Value::Unset, Value::from_f64)),
            Add => Operator::Add,
            Sub => Operator::Sub,
            Mul => Operator::Mul,
            Div => Operator::Div,
            Mod => Operator::Mod,
            Abs => Operator::Abs,
            Minus => Operator::Minus,
            Square => Operator::Square,
            Sqrt => Operator::Sqrt,
            Log => Operator::Log,
            Min => Operator::Min,
            Max => Operator::Max,
            Sin => Operator::Sin(unit),
            Cos => Operator::Cos(unit),
            Tan => Operator::Tan(unit),
            And => Operator::And,
            Or => Operator::Or,
            Not => Operator::Not,
            Gt => Operator::Gt,
            Lt => Operator::Lt,
            Eq => Operator::Eq,
            Cadd => Operator::ComplexAdd,
            Cmul => Operator::ComplexMul,
            Csub => Operator::ComplexSub,
            Cdiv => Operator::ComplexDiv,
            Box => {
                return Err(CrazyMatrixError::InvalidParameter(
                    "box templates are instantiated from their definition".into(),
                ))
            }
        })
    }
}

impl fmt::Display for BlockKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BlockKind {
    type Err = CrazyMatrixError;

    fn from_str(s: &str) -> Result<Self> {
        BlockKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| CrazyMatrixError::InvalidParameter(format!("unknown block kind '{s}'")))
    }
}

/// Description of one block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockTemplate {
    /// What the block computes
    pub kind: BlockKind,
    /// Input pins; `None` for n-ary blocks
    #[serde(default)]
    pub n_in: Option<usize>,
    /// Output pins
    #[serde(default)]
    pub n_out: usize,
    /// Stable id, unique within its definition
    pub id: String,
    /// Scalar parameter (`const`, `variable`)
    #[serde(default)]
    pub value: Option<f64>,
    /// Name of the referenced definition (`box`)
    #[serde(default)]
    pub reference: Option<String>,
    /// Display name
    #[serde(default)]
    pub name: Option<String>,
    /// Free text
    #[serde(default)]
    pub description: Option<String>,
}

impl BlockTemplate {
    /// Template of `kind` with its default pin counts.
    pub fn of_kind(kind: BlockKind, id: impl Into<String>) -> Self {
        let (n_in, n_out) = kind.pin_counts();
        Self {
            kind,
            n_in,
            n_out,
            id: id.into(),
            value: None,
            reference: None,
            name: None,
            description: None,
        }
    }

    /// Template of a box referencing the definition `reference`.
    pub fn boxed(reference: impl Into<String>, n_in: usize, n_out: usize, id: impl Into<String>) -> Self {
        Self {
            n_in: Some(n_in),
            n_out,
            reference: Some(reference.into()),
            ..Self::of_kind(BlockKind::Box, id)
        }
    }

    /// Set the scalar parameter.
    pub fn with_value(mut self, value: f64) -> Self {
        self.value = Some(value);
        self
    }

    /// Set the display name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

impl fmt::Display for BlockTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let n_in = self.n_in.map_or_else(|| "-".to_string(), |n| n.to_string());
        let short: String = self.id.chars().take(8).collect();
        write!(f, "{} ({n_in} -> {}) id {short}", self.kind, self.n_out)?;
        if let Some(reference) = &self.reference {
            write!(f, " -> '{reference}'")?;
        }
        Ok(())
    }
}

/// Description of one connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnTemplate {
    /// Id of the block providing the value
    pub source_id: String,
    /// Output pin on the source
    #[serde(default)]
    pub source_pin: usize,
    /// Id of the block receiving the value
    pub dest_id: String,
    /// Input pin on the destination; `None` appends a pin
    #[serde(default)]
    pub dest_pin: Option<usize>,
}

impl ConnTemplate {
    /// Connect `source_id:source_pin` to `dest_id:dest_pin`.
    pub fn new(
        source_id: impl Into<String>,
        source_pin: usize,
        dest_id: impl Into<String>,
        dest_pin: Option<usize>,
    ) -> Self {
        Self {
            source_id: source_id.into(),
            source_pin,
            dest_id: dest_id.into(),
            dest_pin,
        }
    }
}

impl fmt::Display for ConnTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let dest_pin = self.dest_pin.map_or_else(|| "+".to_string(), |p| p.to_string());
        write!(f, "{}:{} -> {}:{dest_pin}", self.source_id, self.source_pin, self.dest_id)
    }
}

/// Side of a box boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BoxSide {
    /// Boundary input
    In,
    /// Boundary output
    Out,
}

impl BoxSide {
    /// Tag used in definition files.
    pub fn as_str(self) -> &'static str {
        match self {
            BoxSide::In => "in",
            BoxSide::Out => "out",
        }
    }
}

impl FromStr for BoxSide {
    type Err = CrazyMatrixError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "in" => Ok(BoxSide::In),
            "out" => Ok(BoxSide::Out),
            other => Err(CrazyMatrixError::InvalidParameter(format!("unknown box side '{other}'"))),
        }
    }
}

/// Mapping between a box boundary pin and an inner block pin.
///
/// For `In`, the boundary input `box_pin` feeds input `block_pin` of the
/// inner block (`None` appends). For `Out`, output `block_pin` (default 0)
/// of the inner block becomes boundary output `box_pin`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BondTemplate {
    /// Boundary side
    pub side: BoxSide,
    /// Inner block id
    pub block_id: String,
    /// Inner block pin
    #[serde(default)]
    pub block_pin: Option<usize>,
    /// Boundary pin
    pub box_pin: usize,
}

impl BondTemplate {
    /// Bond `block_id:block_pin` to boundary pin `box_pin` on `side`.
    pub fn new(side: BoxSide, block_id: impl Into<String>, block_pin: Option<usize>, box_pin: usize) -> Self {
        Self {
            side,
            block_id: block_id.into(),
            block_pin,
            box_pin,
        }
    }
}

impl fmt::Display for BondTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let pin = self.block_pin.map_or_else(|| "-".to_string(), |p| p.to_string());
        write!(f, "{}:{pin} <=> {}:{}", self.block_id, self.side.as_str(), self.box_pin)
    }
}

/// Source of unique template ids, scoped to one factory.
///
/// Ids are 32 lowercase hex digits. Ids loaded from a file are registered
/// with [`observe`](Self::observe) so fresh ids never collide with them.
#[derive(Debug, Clone)]
pub struct IdGenerator {
    rng: StdRng,
    seen: HashSet<String>,
}

impl IdGenerator {
    /// Generator seeded from the operating system.
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_entropy(),
            seen: HashSet::new(),
        }
    }

    /// Deterministic generator, for tests.
    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            seen: HashSet::new(),
        }
    }

    /// A fresh id, distinct from every id seen so far and from the reserved ids.
    pub fn next_id(&mut self) -> String {
        loop {
            let id = format!("{:032x}", self.rng.gen::<u128>());
            if id != POINT_ID && id != DRAWER_ID && self.seen.insert(id.clone()) {
                return id;
            }
        }
    }

    /// Register an id that was created elsewhere.
    pub fn observe(&mut self, id: &str) {
        self.seen.insert(id.to_owned());
    }

    /// `true` if `id` was generated or observed.
    pub fn contains(&self, id: &str) -> bool {
        self.seen.contains(id)
    }
}

impl Default for IdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AngleUnit;

    #[test]
    fn test_kind_tags_roundtrip() {
        for kind in BlockKind::ALL {
            assert_eq!(kind.as_str().parse::<BlockKind>().unwrap(), kind);
            let json = serde_json::to_string(&kind).unwrap();
            assert_eq!(json, format!("\"{}\"", kind.as_str()));
        }
        assert!("triangle".parse::<BlockKind>().is_err());
    }

    #[test]
    fn test_pin_counts_match_operators() {
        let config = EngineConfig::default();
        for kind in BlockKind::ALL {
            if kind == BlockKind::Box {
                continue;
            }
            let op = kind.operator(Some(1.0), &config).unwrap();
            let (n_in, n_out) = kind.pin_counts();
            assert_eq!(op.n_out(), n_out, "{kind}");
            match op.arity() {
                crate::blocks::Arity::Fixed(n) => assert_eq!(n_in, Some(n), "{kind}"),
                crate::blocks::Arity::Dynamic => assert_eq!(n_in, None, "{kind}"),
            }
        }
    }

    #[test]
    fn test_const_needs_value() {
        let config = EngineConfig::default();
        assert!(BlockKind::Const.operator(None, &config).is_err());
        assert_eq!(
            BlockKind::Const.operator(Some(2.0), &config).unwrap(),
            Operator::Const(2.0)
        );
        assert!(BlockKind::Box.operator(None, &config).is_err());
    }

    #[test]
    fn test_angle_unit_applied() {
        let config = EngineConfig {
            angle_unit: AngleUnit::Radians,
            ..EngineConfig::default()
        };
        assert_eq!(
            BlockKind::Sin.operator(None, &config).unwrap(),
            Operator::Sin(AngleUnit::Radians)
        );
    }

    #[test]
    fn test_id_generator_unique_and_seeded() {
        let mut ids = IdGenerator::with_seed(1);
        let a = ids.next_id();
        let b = ids.next_id();
        assert_ne!(a, b);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));

        let mut again = IdGenerator::with_seed(1);
        assert_eq!(again.next_id(), a);
    }

    #[test]
    fn test_observed_ids_are_skipped() {
        let mut twin = IdGenerator::with_seed(3);
        let first = twin.next_id();

        let mut ids = IdGenerator::with_seed(3);
        ids.observe(&first);
        assert!(ids.contains(&first));
        assert_ne!(ids.next_id(), first);
    }

    #[test]
    fn test_template_json_tolerates_missing_fields() {
        let t: BlockTemplate = serde_json::from_str(r#"{ "kind": "add", "id": "abc" }"#).unwrap();
        assert_eq!(t.kind, BlockKind::Add);
        assert_eq!(t.value, None);
        assert_eq!(t.reference, None);

        let c: ConnTemplate = serde_json::from_str(r#"{ "source_id": "a", "dest_id": "b" }"#).unwrap();
        assert_eq!(c.source_pin, 0);
        assert_eq!(c.dest_pin, None);
    }

    #[test]
    fn test_display() {
        let t = BlockTemplate::boxed("and4", 4, 1, "0123456789abcdef");
        assert_eq!(t.to_string(), "box (4 -> 1) id 01234567 -> 'and4'");
        let c = ConnTemplate::new("a", 0, "b", None);
        assert_eq!(c.to_string(), "a:0 -> b:+");
    }

    #[test]
    fn test_display_shortens_by_characters() {
        let t = BlockTemplate::of_kind(BlockKind::Abs, "aäääääääää");
        assert_eq!(t.to_string(), "abs (1 -> 1) id aäääääää");
    }
}

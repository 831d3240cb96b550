//! Integration tests for Network evaluation.
//!
//! Tests the Network with real operators to verify:
//! - Per-epoch caching
//! - Reset propagation through shared upstream blocks
//! - Undefined propagation
//! - Connection rules (overwrite, append, cycles)

use crazymatrix::blocks::Operator;
use crazymatrix::{Circuit, CrazyMatrixError, Network, Result, Value};

#[test]
fn test_value_is_cached_within_epoch() -> Result<()> {
    let mut net = Network::new();
    let x = net.add(Operator::Const(4.0));
    let sqrt = net.add(Operator::Sqrt);
    let add = net.add(Operator::Add);
    net.connect(x, None, sqrt, None)?;
    net.connect(sqrt, None, add, None)?;
    net.connect(sqrt, None, add, None)?;

    assert_eq!(net.value(add, None)?, Value::Number(4.0));
    assert_eq!(net.value(add, None)?, Value::Number(4.0));

    // sqrt feeds two pins of `add` but is computed once
    assert_eq!(net.stats(sqrt)?.computes, 1);
    assert_eq!(net.stats(add)?.computes, 1);
    Ok(())
}

#[test]
fn test_diamond_reset_visits_once() -> Result<()> {
    let mut net = Network::new();
    let top = net.add(Operator::Const(3.0));
    let left = net.add(Operator::Square);
    let right = net.add(Operator::Minus);
    let bottom = net.add(Operator::Add);
    net.connect(top, None, left, None)?;
    net.connect(top, None, right, None)?;
    net.connect(left, None, bottom, None)?;
    net.connect(right, None, bottom, None)?;

    assert_eq!(net.value(bottom, None)?, Value::Number(6.0));
    net.reset_evaluated(bottom)?;

    for id in [top, left, right, bottom] {
        let stats = net.stats(id)?;
        assert_eq!(stats.resets, 1, "{id}");
        assert_eq!(stats.computes, 1, "{id}");
    }
    assert!(!net.block(top)?.base.is_evaluated());

    assert_eq!(net.value(bottom, None)?, Value::Number(6.0));
    assert_eq!(net.stats(top)?.computes, 2);
    Ok(())
}

#[test]
fn test_reset_only_reaches_upstream() -> Result<()> {
    let mut net = Network::new();
    let a = net.add(Operator::Const(1.0));
    let b = net.add(Operator::Abs);
    let other = net.add(Operator::Const(2.0));
    net.connect(a, None, b, None)?;

    net.value(b, None)?;
    net.value(other, None)?;
    net.reset_evaluated(b)?;

    assert!(!net.block(a)?.base.is_evaluated());
    assert!(net.block(other)?.base.is_evaluated());
    assert_eq!(net.stats(other)?.resets, 0);
    Ok(())
}

#[test]
fn test_undefined_propagates() -> Result<()> {
    let mut net = Network::new();
    let one = net.add(Operator::Const(1.0));
    let zero = net.add(Operator::Const(0.0));
    let div = net.add(Operator::Div);
    let square = net.add(Operator::Square);
    let add = net.add(Operator::Add);
    net.connect(one, None, div, Some(0))?;
    net.connect(zero, None, div, Some(1))?;
    net.connect(div, None, square, None)?;
    net.connect(square, None, add, None)?;
    net.connect(one, None, add, None)?;

    assert_eq!(net.value(div, None)?, Value::Undefined);
    assert_eq!(net.value(square, None)?, Value::Undefined);
    assert_eq!(net.value(add, None)?, Value::Undefined);
    Ok(())
}

#[test]
fn test_nary_append_order() -> Result<()> {
    let mut net = Network::new();
    let a = net.add(Operator::Const(10.0));
    let b = net.add(Operator::Const(4.0));
    let min = net.add(Operator::Min);

    assert_eq!(net.connect(a, None, min, None)?.pin(), 0);
    assert_eq!(net.connect(b, None, min, None)?.pin(), 1);
    assert_eq!(net.n_in(min)?, 2);
    assert_eq!(net.value(min, None)?, Value::Number(4.0));
    Ok(())
}

#[test]
fn test_fixed_arity_pin_range() {
    let mut net = Network::new();
    let a = net.add(Operator::Const(1.0));
    let sub = net.add(Operator::Sub);

    assert!(matches!(
        net.connect(a, None, sub, Some(2)),
        Err(CrazyMatrixError::PinRange { pin: 2, len: 2 })
    ));
    assert!(matches!(
        net.connect(a, Some(1), sub, Some(0)),
        Err(CrazyMatrixError::PinRange { pin: 1, len: 1 })
    ));
}

#[test]
fn test_cycle_through_chain_rejected() -> Result<()> {
    let mut net = Network::new();
    let a = net.add(Operator::Abs);
    let b = net.add(Operator::Minus);
    let c = net.add(Operator::Square);
    net.connect(a, None, b, None)?;
    net.connect(b, None, c, None)?;

    assert!(matches!(
        net.connect(c, None, a, None),
        Err(CrazyMatrixError::Cycle { .. })
    ));
    assert!(matches!(
        net.connect(a, None, a, None),
        Err(CrazyMatrixError::Cycle { .. })
    ));
    Ok(())
}

#[test]
fn test_variable_holds_until_connected() -> Result<()> {
    let mut net = Network::new();
    let var = net.add(Operator::Variable(Value::Number(1.5)));
    assert_eq!(net.value(var, None)?, Value::Number(1.5));

    net.set_variable(var, Value::Number(2.5))?;
    assert_eq!(net.value(var, None)?, Value::Number(2.5));

    let c = net.add(Operator::Const(-1.0));
    net.connect(c, None, var, None)?;
    assert_eq!(net.value(var, None)?, Value::Number(-1.0));
    Ok(())
}

#[test]
fn test_circuit_epochs() -> Result<()> {
    let mut circuit = Circuit::new();
    let (point, drawer) = (circuit.point(), circuit.drawer());
    let net = circuit.network_mut();
    let sub = net.add(Operator::Sub);
    net.connect(point, Some(0), sub, Some(0))?;
    net.connect(point, Some(1), sub, Some(1))?;
    net.connect(sub, None, drawer, None)?;

    assert_eq!(circuit.eval(5.0, 2.0)?, Value::Number(3.0));
    assert_eq!(circuit.eval(1.0, 2.0)?, Value::Number(-1.0));
    assert_eq!(circuit.network().stats(sub)?.computes, 2);

    let grid = circuit.eval_grid(3, 3)?;
    assert_eq!(grid[0][0], Value::Number(0.0));
    assert_eq!(grid[0][2], Value::Number(2.0));
    assert_eq!(grid[2][0], Value::Number(-2.0));
    Ok(())
}

//! Integration tests for repeat boxes.
//!
//! A repeat box re-runs its inner graph a latched number of times per
//! epoch, feeding each cycle's outputs back into its data inputs.

use crazymatrix::blocks::Operator;
use crazymatrix::{
    BlockId, BlockKind, BondTemplate, BoxFactory, BoxSide, CircuitFactory, Definition,
    DefinitionLibrary, EngineConfig, Network, RepeatPhase, Result, TemplateFactory, Value,
    DRAWER_ID,
};

/// Repeat box squaring its single data input; returns (net, box, data, count).
fn squaring_box(config: &EngineConfig) -> Result<(Network, BlockId, BlockId, BlockId)> {
    let mut net = Network::with_config(config);
    let rb = net.add_repeat_box(1, 1, Some("square_loop"));
    let sq = net.add(Operator::Square);
    net.bind_input(rb, sq, None, 0)?;
    net.bind_output(rb, sq, None, 0)?;

    let data = net.add(Operator::Variable(Value::Number(10.0)));
    let count = net.add(Operator::Variable(Value::Number(3.0)));
    net.connect(data, None, rb, Some(0))?;
    net.connect(count, None, rb, Some(1))?;
    Ok((net, rb, data, count))
}

#[test]
fn test_three_cycles() -> Result<()> {
    let (mut net, rb, _, _) = squaring_box(&EngineConfig::default())?;
    assert_eq!(net.value(rb, None)?, Value::Number(1e8));
    assert_eq!(net.repeat_phase(rb)?, RepeatPhase::Idle);
    Ok(())
}

#[test]
fn test_single_cycle_input_layer_passes_external_value_through() -> Result<()> {
    let (mut net, rb, _, count) = squaring_box(&EngineConfig::default())?;
    net.set_variable(count, Value::Number(1.0))?;

    // One cycle computes the body once; the input layer still holds 10
    assert_eq!(net.value(rb, None)?, Value::Number(100.0));
    let input_layer = net.box_handle(rb).expect("repeat box facade").input_layer;
    assert_eq!(net.value(input_layer, None)?, Value::Number(10.0));
    Ok(())
}

#[test]
fn test_count_is_truncated_and_floored_at_one() -> Result<()> {
    let (mut net, rb, _, count) = squaring_box(&EngineConfig::default())?;

    net.set_variable(count, Value::Number(2.9))?;
    assert_eq!(net.value(rb, None)?, Value::Number(1e4));

    for below_one in [0.0, 0.5, -4.0] {
        net.reset_evaluated(rb)?;
        net.set_variable(count, Value::Number(below_one))?;
        assert_eq!(net.value(rb, None)?, Value::Number(100.0), "count {below_one}");
    }
    Ok(())
}

#[test]
fn test_undefined_count() -> Result<()> {
    let (mut net, rb, _, count) = squaring_box(&EngineConfig::default())?;
    net.set_variable(count, Value::Undefined)?;
    assert_eq!(net.value(rb, None)?, Value::Undefined);
    assert_eq!(net.repeat_phase(rb)?, RepeatPhase::Idle);
    Ok(())
}

#[test]
fn test_count_clamped_to_max_repeat() -> Result<()> {
    let config = EngineConfig {
        max_repeat: 4,
        ..EngineConfig::default()
    };
    let mut net = Network::with_config(&config);
    let rb = net.add_repeat_box(1, 1, None);
    let inc = net.add(Operator::Add);
    let one = net.add(Operator::Const(1.0));
    net.bind_input(rb, inc, None, 0)?;
    net.connect(one, None, inc, None)?;
    net.bind_output(rb, inc, None, 0)?;

    let start = net.add(Operator::Const(0.0));
    let count = net.add(Operator::Const(1000.0));
    net.connect(start, None, rb, Some(0))?;
    net.connect(count, None, rb, Some(1))?;

    assert_eq!(net.value(rb, None)?, Value::Number(4.0));
    assert_eq!(net.stats(inc)?.computes, 4);
    Ok(())
}

#[test]
fn test_epochs_restart_from_external_inputs() -> Result<()> {
    let (mut net, rb, data, _) = squaring_box(&EngineConfig::default())?;
    assert_eq!(net.value(rb, None)?, Value::Number(1e8));

    // Same epoch: cached
    assert_eq!(net.value(rb, None)?, Value::Number(1e8));

    net.reset_evaluated(rb)?;
    net.set_variable(data, Value::Number(2.0))?;
    assert_eq!(net.value(rb, None)?, Value::Number(256.0));

    net.reset_evaluated(rb)?;
    assert_eq!(net.value(rb, None)?, Value::Number(256.0));
    Ok(())
}

#[test]
fn test_extra_data_pins_keep_external_values() -> Result<()> {
    // out0 = in0 * in1; only pin 0 is fed back
    let mut net = Network::new();
    let rb = net.add_repeat_box(2, 1, None);
    let mul = net.add(Operator::Mul);
    net.bind_input(rb, mul, None, 0)?;
    net.bind_input(rb, mul, None, 1)?;
    net.bind_output(rb, mul, None, 0)?;

    for (pin, value) in [(0, 2.0), (1, 3.0), (2, 3.0)] {
        let c = net.add(Operator::Const(value));
        net.connect(c, None, rb, Some(pin))?;
    }
    assert_eq!(net.value(rb, None)?, Value::Number(54.0));
    Ok(())
}

#[test]
fn test_repeat_box_from_template() -> Result<()> {
    let mut body = BoxFactory::repeat_box();
    let sq = body.add(BlockKind::Square);
    body.add_bond(BondTemplate::new(BoxSide::In, &sq.id, None, 0));
    body.add_bond(BondTemplate::new(BoxSide::Out, &sq.id, None, 0));
    let count_pin = body.reserve_pin(BoxSide::In);
    assert_eq!(count_pin, 1);

    let mut lib = DefinitionLibrary::new();
    lib.insert("squarer", Definition::Box(body));

    let mut factory = CircuitFactory::new();
    let rb = factory.add_box_ref("squarer", 2, 1);
    let count = factory.add_const(2.0);
    factory.connect("0", 0, &rb.id, Some(0));
    factory.connect(&count.id, 0, &rb.id, Some(count_pin));
    factory.connect(&rb.id, 0, DRAWER_ID, None);

    let mut circuit = factory.inst(&lib, &EngineConfig::default())?;
    assert_eq!(circuit.eval(3.0, 0.0)?, Value::Number(81.0));
    assert_eq!(circuit.eval(-2.0, 0.0)?, Value::Number(16.0));
    Ok(())
}

/// Outer repeat box (count 2) around an inner one (count 2, squaring), so
/// one outer cycle computes `x^4`; returns (net, outer box, x).
fn nested_squaring(x: f64) -> Result<(Network, BlockId, BlockId)> {
    let mut net = Network::new();
    let outer = net.add_repeat_box(1, 1, Some("outer"));
    let inner = net.add_repeat_box(1, 1, Some("inner"));
    let sq = net.add(Operator::Square);
    net.bind_input(inner, sq, None, 0)?;
    net.bind_output(inner, sq, None, 0)?;

    let inner_count = net.add(Operator::Const(2.0));
    net.connect(inner_count, None, inner, Some(1))?;
    net.bind_input(outer, inner, Some(0), 0)?;
    net.bind_output(outer, inner, Some(0), 0)?;

    let data = net.add(Operator::Variable(Value::Number(x)));
    let outer_count = net.add(Operator::Const(2.0));
    net.connect(data, None, outer, Some(0))?;
    net.connect(outer_count, None, outer, Some(1))?;
    Ok((net, outer, data))
}

#[test]
fn test_nested_repeat_boxes() -> Result<()> {
    let (mut net, outer, data) = nested_squaring(2.0)?;
    // (2^4)^4
    assert_eq!(net.value(outer, None)?, Value::Number(65536.0));
    assert_eq!(net.repeat_phase(outer)?, RepeatPhase::Idle);

    net.reset_evaluated(outer)?;
    net.set_variable(data, Value::Number(1.5))?;
    assert_eq!(net.value(outer, None)?, Value::Number(1.5f64.powi(16)));
    Ok(())
}

#[test]
fn test_nested_repeat_boxes_with_shared_input() -> Result<()> {
    let (mut net, outer, data) = nested_squaring(2.0)?;
    let sum = net.add(Operator::Add);
    net.connect(data, None, sum, None)?;
    net.connect(outer, None, sum, None)?;

    assert_eq!(net.value(sum, None)?, Value::Number(65538.0));
    net.reset_evaluated(sum)?;
    assert_eq!(net.value(sum, None)?, Value::Number(65538.0));
    Ok(())
}

//! Integration tests for black boxes.
//!
//! Covers hand-wired boxes on a network and boxes instantiated from
//! templates: instance isolation, nesting, and the reference errors.

use crazymatrix::blocks::Operator;
use crazymatrix::{
    BlockKind, BlockTemplate, BondTemplate, BoxFactory, BoxSide, CircuitFactory, CrazyMatrixError,
    Definition, DefinitionLibrary, EngineConfig, IdGenerator, Network, Result, TemplateFactory,
    Value, DRAWER_ID,
};

/// Black box adding its two inputs.
fn adder() -> BoxFactory {
    let mut factory = BoxFactory::with_ids(crazymatrix::BoxFlavor::Black, IdGenerator::with_seed(1));
    let add = factory.add(BlockKind::Add);
    factory.add_bond(BondTemplate::new(BoxSide::In, &add.id, None, 0));
    factory.add_bond(BondTemplate::new(BoxSide::In, &add.id, None, 1));
    factory.add_bond(BondTemplate::new(BoxSide::Out, &add.id, None, 0));
    factory
}

/// Black box doubling its input through a nested adder.
fn doubler() -> BoxFactory {
    let mut factory = BoxFactory::black_box();
    let inner = factory.add_box_ref("adder", 2, 1);
    factory.add_bond(BondTemplate::new(BoxSide::In, &inner.id, Some(0), 0));
    factory.add_bond(BondTemplate::new(BoxSide::In, &inner.id, Some(1), 0));
    factory.add_bond(BondTemplate::new(BoxSide::Out, &inner.id, Some(0), 0));
    factory
}

fn library() -> DefinitionLibrary {
    let mut lib = DefinitionLibrary::new();
    lib.insert("adder", Definition::Box(adder()));
    lib.insert("doubler", Definition::Box(doubler()));
    lib
}

#[test]
fn test_hand_wired_box() -> Result<()> {
    let mut net = Network::new();
    let bx = net.add_box(2, 2, Some("sum_and_diff"));
    let add = net.add(Operator::Add);
    let sub = net.add(Operator::Sub);
    net.bind_input(bx, add, None, 0)?;
    net.bind_input(bx, add, None, 1)?;
    net.bind_input(bx, sub, Some(0), 0)?;
    net.bind_input(bx, sub, Some(1), 1)?;
    net.bind_output(bx, add, None, 0)?;
    net.bind_output(bx, sub, None, 1)?;

    let a = net.add(Operator::Const(9.0));
    let b = net.add(Operator::Const(4.0));
    net.connect(a, None, bx, Some(0))?;
    net.connect(b, None, bx, Some(1))?;

    assert_eq!(net.value(bx, Some(0))?, Value::Number(13.0));
    assert_eq!(net.value(bx, Some(1))?, Value::Number(5.0));
    assert_eq!(net.input_value(bx, 1)?, Value::Number(4.0));
    Ok(())
}

#[test]
fn test_unbound_box_output_is_undefined() -> Result<()> {
    let mut net = Network::new();
    let bx = net.add_box(1, 1, None);
    let c = net.add(Operator::Const(1.0));
    net.connect(c, None, bx, None)?;
    assert_eq!(net.value(bx, None)?, Value::Undefined);
    Ok(())
}

#[test]
fn test_two_instances_are_isolated() -> Result<()> {
    let mut factory = CircuitFactory::new();
    let first = factory.add_box_ref("adder", 2, 1);
    let second = factory.add_box_ref("adder", 2, 1);
    let consts: Vec<_> = [2.0, 3.0, 5.0, 7.0].map(|v| factory.add_const(v)).into();
    factory.connect(&consts[0].id, 0, &first.id, Some(0));
    factory.connect(&consts[1].id, 0, &first.id, Some(1));
    factory.connect(&consts[2].id, 0, &second.id, Some(0));
    factory.connect(&consts[3].id, 0, &second.id, Some(1));

    // (2 + 3) * 100 + (5 + 7)
    let scale = factory.add_const(100.0);
    let mul = factory.add(BlockKind::Mul);
    let sum = factory.add(BlockKind::Add);
    factory.connect(&first.id, 0, &mul.id, None);
    factory.connect(&scale.id, 0, &mul.id, None);
    factory.connect(&mul.id, 0, &sum.id, None);
    factory.connect(&second.id, 0, &sum.id, None);
    factory.connect(&sum.id, 0, DRAWER_ID, None);

    let mut circuit = factory.inst(&library(), &EngineConfig::default())?;
    assert_eq!(circuit.eval(0.0, 0.0)?, Value::Number(512.0));
    Ok(())
}

#[test]
fn test_instance_caches_are_independent() -> Result<()> {
    fn add_adder(net: &mut Network) -> Result<crazymatrix::BlockId> {
        let bx = net.add_box(2, 1, Some("adder"));
        let add = net.add(Operator::Add);
        net.bind_input(bx, add, None, 0)?;
        net.bind_input(bx, add, None, 1)?;
        net.bind_output(bx, add, None, 0)?;
        Ok(bx)
    }

    let mut net = Network::new();
    let first = add_adder(&mut net)?;
    let second = add_adder(&mut net)?;
    for (bx, inputs) in [(first, [2.0, 3.0]), (second, [5.0, 7.0])] {
        for (pin, value) in inputs.into_iter().enumerate() {
            let c = net.add(Operator::Const(value));
            net.connect(c, None, bx, Some(pin))?;
        }
    }

    assert_eq!(net.value(first, None)?, Value::Number(5.0));
    assert_eq!(net.value(second, None)?, Value::Number(12.0));
    assert_eq!(net.value(first, None)?, Value::Number(5.0));
    assert_eq!(net.stats(first)?.computes, 1);

    net.reset_evaluated(second)?;
    assert!(net.block(net.box_handle(first).unwrap().output_layer)?.base.is_evaluated());
    Ok(())
}

#[test]
fn test_instances_on_separate_networks() -> Result<()> {
    let lib = library();
    let config = EngineConfig::default();
    let mut one = adder().inst(&lib, &config, Some("adder"))?;
    let mut two = adder().inst(&lib, &config, Some("adder"))?;

    let a = one.network.add(Operator::Const(2.0));
    one.network.connect(a, None, one.handle, Some(0))?;
    one.network.connect(a, None, one.handle, Some(1))?;
    let b = two.network.add(Operator::Const(5.0));
    two.network.connect(b, None, two.handle, Some(0))?;

    assert_eq!(one.network.value(one.handle, None)?, Value::Number(4.0));
    // Second input of the other instance is still unconnected
    assert_eq!(two.network.value(two.handle, None)?, Value::Undefined);
    Ok(())
}

#[test]
fn test_nested_box_reference() -> Result<()> {
    let mut factory = CircuitFactory::new();
    let double = factory.add_box_ref("doubler", 1, 1);
    factory.connect("0", 1, &double.id, Some(0));
    factory.connect(&double.id, 0, DRAWER_ID, None);

    let mut circuit = factory.inst(&library(), &EngineConfig::default())?;
    assert_eq!(circuit.eval(0.0, 21.0)?, Value::Number(42.0));
    assert_eq!(circuit.eval(0.0, -1.5)?, Value::Number(-3.0));
    Ok(())
}

#[test]
fn test_unresolved_reference() {
    let mut factory = CircuitFactory::new();
    factory.add_box_ref("nowhere", 1, 1);
    let err = factory
        .inst(&library(), &EngineConfig::default())
        .unwrap_err();
    assert!(matches!(err, CrazyMatrixError::UnresolvedBoxReference(name) if name == "nowhere"));
}

#[test]
fn test_arity_mismatch() {
    let mut factory = CircuitFactory::new();
    factory.add_box_ref("adder", 1, 1);
    let err = factory
        .inst(&library(), &EngineConfig::default())
        .unwrap_err();
    assert!(matches!(
        err,
        CrazyMatrixError::ArityMismatch {
            declared_in: 1,
            actual_in: 2,
            ..
        }
    ));
}

#[test]
fn test_recursive_reference() {
    let mut ouroboros = BoxFactory::black_box();
    let inner = ouroboros.add_block(BlockTemplate::boxed("ouroboros", 1, 1, "self"));
    ouroboros.add_bond(BondTemplate::new(BoxSide::In, &inner.id, Some(0), 0));
    ouroboros.add_bond(BondTemplate::new(BoxSide::Out, &inner.id, Some(0), 0));

    let mut lib = DefinitionLibrary::new();
    lib.insert("ouroboros", Definition::Box(ouroboros));

    let mut factory = CircuitFactory::new();
    factory.add_box_ref("ouroboros", 1, 1);
    let err = factory.inst(&lib, &EngineConfig::default()).unwrap_err();
    assert!(matches!(err, CrazyMatrixError::RecursiveBoxReference(name) if name == "ouroboros"));
}

#[test]
fn test_incomplete_bonding_rejected() {
    let mut factory = BoxFactory::black_box();
    let sq = factory.add(BlockKind::Square);
    factory.add_bond(BondTemplate::new(BoxSide::In, &sq.id, None, 0));
    factory.reserve_pin(BoxSide::Out);

    let err = factory
        .inst(&DefinitionLibrary::new(), &EngineConfig::default(), Some("half"))
        .unwrap_err();
    assert!(matches!(err, CrazyMatrixError::IncompleteBoxBonding { name, .. } if name == "half"));
}

#[test]
fn test_unbonded_input_pin_rejected() {
    let mut factory = BoxFactory::black_box();
    let sq = factory.add(BlockKind::Square);
    factory.add_bond(BondTemplate::new(BoxSide::In, &sq.id, None, 0));
    factory.add_bond(BondTemplate::new(BoxSide::Out, &sq.id, None, 0));
    assert_eq!(factory.reserve_pin(BoxSide::In), 1);

    let err = factory
        .inst(&DefinitionLibrary::new(), &EngineConfig::default(), Some("gap"))
        .unwrap_err();
    assert!(matches!(
        err,
        CrazyMatrixError::IncompleteBoxBonding { name, reason }
            if name == "gap" && reason.contains("input pin 1")
    ));
}

#[test]
fn test_box_without_outputs_rejected() {
    let mut factory = BoxFactory::black_box();
    let sq = factory.add(BlockKind::Square);
    factory.add_bond(BondTemplate::new(BoxSide::In, &sq.id, None, 0));

    let err = factory
        .inst(&DefinitionLibrary::new(), &EngineConfig::default(), Some("sink"))
        .unwrap_err();
    assert!(matches!(
        err,
        CrazyMatrixError::IncompleteBoxBonding { reason, .. } if reason.contains("no output")
    ));
}

//! Example: Store and load definitions through a registry
//!
//! Demonstrates how to:
//! 1. Build a black box and a circuit using it with factories
//! 2. Store both into a registry directory
//! 3. Rescan the directory and load the circuit back
//! 4. Instantiate it, resolving the nested box through the registry
//!
//! Run with `RUST_LOG=info` to see the registry's log output.

use crazymatrix::{
    BlockKind, BondTemplate, BoxFactory, BoxSide, CircuitFactory, Definition, EngineConfig,
    LoadOutcome, Registry, Result, TemplateFactory, DRAWER_ID, POINT_ID,
};

fn main() -> Result<()> {
    env_logger::init();
    println!("=== Registry Round Trip Example ===\n");

    let root = std::env::temp_dir().join("crazymatrix-registry-demo");
    let _ = std::fs::remove_dir_all(&root);

    // ========================================
    // PART 1: Build definitions
    // ========================================
    println!("Part 1: Building definitions...");

    // ring(x, y) = |sqrt(x² + y²) - 5|
    let mut ring = BoxFactory::black_box();
    let sx = ring.add(BlockKind::Square);
    let sy = ring.add(BlockKind::Square);
    let sum = ring.add(BlockKind::Add);
    let root_block = ring.add(BlockKind::Sqrt);
    let radius = ring.add_const(5.0);
    let diff = ring.add(BlockKind::Sub);
    let abs = ring.add(BlockKind::Abs);
    ring.connect(&sx.id, 0, &sum.id, None);
    ring.connect(&sy.id, 0, &sum.id, None);
    ring.connect(&sum.id, 0, &root_block.id, None);
    ring.connect(&root_block.id, 0, &diff.id, Some(0));
    ring.connect(&radius.id, 0, &diff.id, Some(1));
    ring.connect(&diff.id, 0, &abs.id, None);
    ring.add_bond(BondTemplate::new(BoxSide::In, &sx.id, Some(0), 0));
    ring.add_bond(BondTemplate::new(BoxSide::In, &sy.id, Some(0), 1));
    ring.add_bond(BondTemplate::new(BoxSide::Out, &abs.id, None, 0));
    ring.set_description("distance to a circle of radius 5");

    let mut picture = CircuitFactory::new();
    let ring_ref = picture.add_box_ref("ring", 2, 1);
    let inside = picture.add(BlockKind::Lt);
    let width = picture.add_const(1.0);
    picture.connect(POINT_ID, 0, &ring_ref.id, Some(0));
    picture.connect(POINT_ID, 1, &ring_ref.id, Some(1));
    picture.connect(&ring_ref.id, 0, &inside.id, Some(0));
    picture.connect(&width.id, 0, &inside.id, Some(1));
    picture.connect(&inside.id, 0, DRAWER_ID, None);
    println!("✓ Box 'ring': {} blocks, {} bonds", ring.blocks().len(), ring.bonds().len());
    println!("✓ Circuit 'picture': {} blocks", picture.blocks().len());

    // ========================================
    // PART 2: Store into the registry
    // ========================================
    println!("\nPart 2: Storing into {}...", root.display());

    let mut registry = Registry::new(&root, EngineConfig::default());
    for (name, definition) in [
        ("ring", Definition::Box(ring)),
        ("picture", Definition::Circuit(picture)),
    ] {
        let path = registry.store(&definition, name, false)?;
        println!("✓ Stored '{name}' at {}", path.display());
    }

    // ========================================
    // PART 3: Rescan and load
    // ========================================
    println!("\nPart 3: Rescanning...");

    let mut fresh = Registry::new(&root, EngineConfig::default());
    let report = fresh.scan()?;
    println!("✓ Indexed {} definitions", report.indexed);
    for entry in fresh.entries() {
        println!("  {} ({:?})", entry.name, entry.kind);
    }

    let circuit_factory = match fresh.load("picture")? {
        LoadOutcome::Usable(Definition::Circuit(factory)) => factory,
        LoadOutcome::Usable(other) => {
            println!("✗ 'picture' is a {:?}", other.kind());
            return Ok(());
        }
        LoadOutcome::Unusable { reason, .. } => {
            println!("✗ 'picture' is unusable: {reason}");
            return Ok(());
        }
    };

    // ========================================
    // PART 4: Instantiate and draw
    // ========================================
    println!("\nPart 4: Drawing...\n");

    let mut circuit = circuit_factory.inst(&fresh, fresh.config())?;
    for row in circuit.eval_grid(31, 15)? {
        let line: String = row
            .iter()
            .map(|v| if v.number_or(0.0) > 0.0 { 'o' } else { '.' })
            .collect();
        println!("  {line}");
    }

    println!("\n=== Example Complete ===");
    Ok(())
}

//! Example: Mandelbrot set with a repeat box
//!
//! Demonstrates how to:
//! 1. Wire a repeat box computing one step of `z -> z² + c`
//! 2. Feed its outputs back as the next cycle's `z` while `c` stays fixed
//! 3. Sweep the circuit over a grid and print the bounded points
//!
//! Diverging points overflow to `Undefined`, which propagates to the drawer.
//! Run with `RUST_LOG=debug` to see the repeat latch at work.

use crazymatrix::blocks::Operator;
use crazymatrix::{Circuit, Result, Value};

const WIDTH: usize = 72;
const HEIGHT: usize = 28;
const ITERATIONS: f64 = 24.0;

fn main() -> Result<()> {
    env_logger::init();
    println!("=== Repeat Box Example ===\n");

    let mut circuit = Circuit::new();
    let (point, drawer) = (circuit.point(), circuit.drawer());
    let net = circuit.network_mut();

    // Data pins: z.re, z.im, c.re, c.im; outputs: z.re, z.im
    let step = net.add_repeat_box(4, 2, Some("mandel_step"));
    let z_squared = net.add(Operator::ComplexMul);
    let plus_c = net.add(Operator::ComplexAdd);
    for pin in [0, 1, 0, 1] {
        net.bind_input(step, z_squared, None, pin)?;
    }
    net.connect(z_squared, Some(0), plus_c, None)?;
    net.connect(z_squared, Some(1), plus_c, None)?;
    net.bind_input(step, plus_c, None, 2)?;
    net.bind_input(step, plus_c, None, 3)?;
    net.bind_output(step, plus_c, Some(0), 0)?;
    net.bind_output(step, plus_c, Some(1), 1)?;
    println!("✓ Repeat box wired: {} inputs, {} outputs", net.n_in(step)?, net.n_out(step)?);

    // c = (x / 24 - 0.6, y / 12)
    let scale_x = net.add(Operator::Const(1.0 / 24.0));
    let shift_x = net.add(Operator::Const(-0.6));
    let scale_y = net.add(Operator::Const(1.0 / 12.0));
    let cx = net.add(Operator::Mul);
    let cx_shifted = net.add(Operator::Add);
    let cy = net.add(Operator::Mul);
    net.connect(point, Some(0), cx, None)?;
    net.connect(scale_x, None, cx, None)?;
    net.connect(cx, None, cx_shifted, None)?;
    net.connect(shift_x, None, cx_shifted, None)?;
    net.connect(point, Some(1), cy, None)?;
    net.connect(scale_y, None, cy, None)?;

    let zero = net.add(Operator::Const(0.0));
    let count = net.add(Operator::Const(ITERATIONS));
    net.connect(zero, None, step, Some(0))?;
    net.connect(zero, None, step, Some(1))?;
    net.connect(cx_shifted, None, step, Some(2))?;
    net.connect(cy, None, step, Some(3))?;
    net.connect(count, None, step, Some(4))?;

    // |z|²
    let re2 = net.add(Operator::Square);
    let im2 = net.add(Operator::Square);
    let norm = net.add(Operator::Add);
    net.connect(step, Some(0), re2, None)?;
    net.connect(step, Some(1), im2, None)?;
    net.connect(re2, None, norm, None)?;
    net.connect(im2, None, norm, None)?;
    net.connect(norm, None, drawer, None)?;
    println!("✓ Circuit built with {} blocks\n", net.len());

    let grid = circuit.eval_grid(WIDTH, HEIGHT)?;
    let mut inside = 0;
    for row in &grid {
        let line: String = row
            .iter()
            .map(|v| match v {
                Value::Number(n) if *n <= 4.0 => {
                    inside += 1;
                    '#'
                }
                _ => ' ',
            })
            .collect();
        println!("|{line}|");
    }

    println!("\n✓ {inside} of {} points stayed bounded", WIDTH * HEIGHT);
    println!("  Repeat box phase after the sweep: {:?}", circuit.network().repeat_phase(step)?);
    Ok(())
}

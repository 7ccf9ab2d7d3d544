use approx::assert_relative_eq;
use numbat::{exp, pow, sin, Expression, Tape, TapeGuard, TraceLevel, Variable};

fn third_tape() -> Tape<f64> {
    let mut tape = Tape::<f64>::new();
    tape.set_trace_level(TraceLevel::ThirdOrderMixedPartials);
    tape
}

// ── Single-variable towers ──

#[test]
fn exp_times_x() {
    // y = exp(x)·x at x = 1: dʲy/dxʲ = e·(x + j) = 2e, 3e, 4e
    let mut tape = third_tape();
    let _guard = TapeGuard::new(&mut tape);
    let x = Variable::new(1.0_f64);
    let mut y = Variable::default();
    y.assign(exp(&x) * &x);
    tape.accumulate_third_order_mixed();

    let e = 1.0_f64.exp();
    assert_relative_eq!(y.value(), e, max_relative = 1e-15);
    assert_relative_eq!(x.adjoint(), 2.0 * e, max_relative = 1e-12);
    assert_relative_eq!(tape.hessian_value(x.id(), x.id()), 3.0 * e, max_relative = 1e-12);
    assert_relative_eq!(
        tape.third_value(x.id(), x.id(), x.id()),
        4.0 * e,
        max_relative = 1e-12
    );
}

#[test]
fn exp_times_x_with_intermediate() {
    // Same tower split as t = exp(x), y = t·x: exercises cross-record
    // propagation of the second- and third-order stores.
    let mut tape = third_tape();
    let _guard = TapeGuard::new(&mut tape);
    let x = Variable::new(1.0_f64);
    let mut t = Variable::default();
    let mut y = Variable::default();
    t.assign(exp(&x));
    y.assign(&t * &x);
    tape.accumulate_third_order_mixed();

    let e = 1.0_f64.exp();
    assert_relative_eq!(x.adjoint(), 2.0 * e, max_relative = 1e-12);
    assert_relative_eq!(tape.hessian_value(x.id(), x.id()), 3.0 * e, max_relative = 1e-12);
    assert_relative_eq!(
        tape.third_value(x.id(), x.id(), x.id()),
        4.0 * e,
        max_relative = 1e-12
    );
}

#[test]
fn cubic_power() {
    // y = x³ at x = 0.5: 3x² = 0.75, 6x = 3, 6
    let mut tape = third_tape();
    let _guard = TapeGuard::new(&mut tape);
    let x = Variable::new(0.5_f64);
    let mut y = Variable::default();
    y.assign(pow(&x, 3.0));
    tape.accumulate_third_order_mixed();

    assert_relative_eq!(x.adjoint(), 0.75, max_relative = 1e-12);
    assert_relative_eq!(tape.hessian_value(x.id(), x.id()), 3.0, max_relative = 1e-12);
    assert_relative_eq!(
        tape.third_value(x.id(), x.id(), x.id()),
        6.0,
        max_relative = 1e-12
    );
}

#[test]
fn reciprocal_tower() {
    // y = 1/x at x = 2: -1/x², 2/x³, -6/x⁴
    let mut tape = third_tape();
    let _guard = TapeGuard::new(&mut tape);
    let x = Variable::new(2.0_f64);
    let mut y = Variable::default();
    y.assign(1.0 / &x);
    tape.accumulate_third_order_mixed();

    assert_relative_eq!(x.adjoint(), -0.25, max_relative = 1e-12);
    assert_relative_eq!(tape.hessian_value(x.id(), x.id()), 0.25, max_relative = 1e-12);
    assert_relative_eq!(
        tape.third_value(x.id(), x.id(), x.id()),
        -6.0 / 16.0,
        max_relative = 1e-12
    );
}

// ── Mixed partials ──

#[test]
fn triple_product_tensor() {
    // w = x·y·z at (2,3,4): the only nonzero third partial is d³w/dx dy dz = 1.
    let mut tape = third_tape();
    let _guard = TapeGuard::new(&mut tape);
    let x = Variable::new(2.0_f64);
    let y = Variable::new(3.0_f64);
    let z = Variable::new(4.0_f64);
    let mut w = Variable::default();
    w.assign(&x * &y * &z);
    tape.accumulate_third_order_mixed();

    assert_relative_eq!(x.adjoint(), 12.0, max_relative = 1e-12);
    assert_relative_eq!(y.adjoint(), 8.0, max_relative = 1e-12);
    assert_relative_eq!(z.adjoint(), 6.0, max_relative = 1e-12);

    assert_relative_eq!(tape.hessian_value(x.id(), y.id()), 4.0, max_relative = 1e-12);
    assert_relative_eq!(tape.hessian_value(x.id(), z.id()), 3.0, max_relative = 1e-12);
    assert_relative_eq!(tape.hessian_value(y.id(), z.id()), 2.0, max_relative = 1e-12);

    assert_relative_eq!(
        tape.third_value(x.id(), y.id(), z.id()),
        1.0,
        max_relative = 1e-12
    );
    assert!(tape.third_value(x.id(), x.id(), y.id()).abs() < 1e-12);
    assert!(tape.third_value(x.id(), x.id(), x.id()).abs() < 1e-12);
}

#[test]
fn triple_product_tensor_with_intermediate() {
    // Same tensor via t = x·y, w = t·z.
    let mut tape = third_tape();
    let _guard = TapeGuard::new(&mut tape);
    let x = Variable::new(2.0_f64);
    let y = Variable::new(3.0_f64);
    let z = Variable::new(4.0_f64);
    let mut t = Variable::default();
    let mut w = Variable::default();
    t.assign(&x * &y);
    w.assign(&t * &z);
    tape.accumulate_third_order_mixed();

    assert_relative_eq!(x.adjoint(), 12.0, max_relative = 1e-12);
    assert_relative_eq!(y.adjoint(), 8.0, max_relative = 1e-12);
    assert_relative_eq!(z.adjoint(), 6.0, max_relative = 1e-12);
    assert_relative_eq!(tape.hessian_value(x.id(), y.id()), 4.0, max_relative = 1e-12);
    assert_relative_eq!(tape.hessian_value(x.id(), z.id()), 3.0, max_relative = 1e-12);
    assert_relative_eq!(tape.hessian_value(y.id(), z.id()), 2.0, max_relative = 1e-12);
    assert_relative_eq!(
        tape.third_value(x.id(), y.id(), z.id()),
        1.0,
        max_relative = 1e-12
    );
    assert!(tape.third_value(y.id(), y.id(), z.id()).abs() < 1e-12);
}

#[test]
fn exp_of_product_mixed_third() {
    // f = exp(x·y) via an intermediate: d³f/dx²dy = e^{xy}·(2y + xy²).
    let (xv, yv) = (0.5_f64, 0.25_f64);
    let mut tape = third_tape();
    let _guard = TapeGuard::new(&mut tape);
    let x = Variable::new(xv);
    let y = Variable::new(yv);
    let mut t = Variable::default();
    let mut f = Variable::default();
    t.assign(&x * &y);
    f.assign(exp(&t));
    tape.accumulate_third_order_mixed();

    let e = (xv * yv).exp();
    assert_relative_eq!(
        tape.third_value(x.id(), x.id(), x.id()),
        yv.powi(3) * e,
        max_relative = 1e-12
    );
    assert_relative_eq!(
        tape.third_value(x.id(), x.id(), y.id()),
        e * (2.0 * yv + xv * yv * yv),
        max_relative = 1e-12
    );
    assert_relative_eq!(
        tape.third_value(x.id(), y.id(), y.id()),
        e * (2.0 * xv + yv * xv * xv),
        max_relative = 1e-12
    );
}

#[test]
fn full_extraction_driver() {
    // w = x·y·z: gradient, Hessian, and tensor pulled dense in one call.
    let mut tape = third_tape();
    let _guard = TapeGuard::new(&mut tape);
    let x = Variable::new(2.0_f64);
    let y = Variable::new(3.0_f64);
    let z = Variable::new(4.0_f64);
    let mut w = Variable::default();
    w.assign(&x * &y * &z);

    let vars = [x.clone(), y.clone(), z.clone()];
    let mut g = Vec::new();
    let mut h = Vec::new();
    let mut t3 = Vec::new();
    tape.compute_up_to_third_order_mixed(&vars, &mut g, &mut h, &mut t3);

    assert_eq!(g.len(), 3);
    assert_relative_eq!(g[0], 12.0, max_relative = 1e-12);
    assert_relative_eq!(h[0][1], 4.0, max_relative = 1e-12);
    assert_relative_eq!(h[1][0], 4.0, max_relative = 1e-12);
    assert_relative_eq!(t3[0][1][2], 1.0, max_relative = 1e-12);
    // Dense reads reconstruct every permutation from the canonical cell.
    assert_relative_eq!(t3[2][0][1], 1.0, max_relative = 1e-12);
    assert_relative_eq!(t3[1][2][0], 1.0, max_relative = 1e-12);
}

// ── Node-level symmetry ──

#[test]
fn partial3_is_permutation_symmetric() {
    let x = Variable::new(0.8_f64);
    let y = Variable::new(1.7_f64);
    let e = sin(&x) * exp(&y) + &x * &y * &x;
    let (a, b) = (x.id(), y.id());

    let reference = e.partial3(a, a, b);
    for (p, q, r) in [(a, b, a), (b, a, a)] {
        assert_relative_eq!(e.partial3(p, q, r), reference, max_relative = 1e-12);
    }

    let reference = e.partial3(a, b, b);
    for (p, q, r) in [(b, a, b), (b, b, a)] {
        assert_relative_eq!(e.partial3(p, q, r), reference, max_relative = 1e-12);
    }
}

#[test]
fn sin_tower_matches_analytic() {
    // y = sin(x): derivatives cos, -sin, -cos.
    let xv = 0.9_f64;
    let mut tape = third_tape();
    let _guard = TapeGuard::new(&mut tape);
    let x = Variable::new(xv);
    let mut y = Variable::default();
    y.assign(sin(&x));
    tape.accumulate_third_order_mixed();

    assert_relative_eq!(x.adjoint(), xv.cos(), max_relative = 1e-12);
    assert_relative_eq!(
        tape.hessian_value(x.id(), x.id()),
        -xv.sin(),
        max_relative = 1e-12
    );
    assert_relative_eq!(
        tape.third_value(x.id(), x.id(), x.id()),
        -xv.cos(),
        max_relative = 1e-12
    );
}

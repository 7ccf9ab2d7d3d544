use approx::assert_relative_eq;
use numbat::{
    cos, exp, fabs, log, log10, pow, sin, sqrt, tan, tanh, Tape, TapeGuard, Variable,
};

/// Record `build(x, out)` on a fresh tape, sweep, and return dy/dx.
fn reverse_grad(
    x_val: f64,
    build: impl FnOnce(&Variable<f64>, &mut Variable<f64>),
) -> f64 {
    let mut tape = Tape::<f64>::new();
    let _guard = TapeGuard::new(&mut tape);
    let x = Variable::new(x_val);
    let mut y = Variable::default();
    build(&x, &mut y);
    tape.accumulate();
    x.adjoint()
}

/// Central finite difference for comparison.
fn finite_diff(f: impl Fn(f64) -> f64, x: f64) -> f64 {
    let h = 1e-7;
    (f(x + h) - f(x - h)) / (2.0 * h)
}

fn check_elemental(
    build: impl FnOnce(&Variable<f64>, &mut Variable<f64>),
    f: impl Fn(f64) -> f64,
    x: f64,
    tol: f64,
) {
    let grad = reverse_grad(x, build);
    let expected = finite_diff(&f, x);
    assert_relative_eq!(grad, expected, max_relative = tol);
}

// ── Round trips ──

#[test]
fn identity_assignment() {
    let mut tape = Tape::<f64>::new();
    let _guard = TapeGuard::new(&mut tape);
    let u = Variable::new(5.0_f64);
    let other = Variable::new(9.0_f64);
    let mut v = Variable::default();
    v.assign(&u);
    tape.accumulate();
    assert_relative_eq!(u.adjoint(), 1.0, max_relative = 1e-15);
    assert!(other.adjoint().abs() < 1e-15);
    assert_relative_eq!(v.value(), 5.0, max_relative = 1e-15);
}

#[test]
fn constant_assignment_leaves_no_trace() {
    let mut tape = Tape::<f64>::new();
    let _guard = TapeGuard::new(&mut tape);
    let x = Variable::new(3.0_f64);
    let mut v = Variable::default();
    v.set_value(4.0);
    assert_eq!(tape.num_entries(), 0);
    v.assign(2.0 + 1.5_f64);
    assert_eq!(tape.num_entries(), 0);
    assert_relative_eq!(v.value(), 3.5, max_relative = 1e-15);

    v.assign(&x * &x);
    assert_eq!(tape.num_entries(), 1);
    tape.accumulate();
    assert_relative_eq!(x.adjoint(), 6.0, max_relative = 1e-12);
}

#[test]
fn one_record_per_expression_assignment() {
    let mut tape = Tape::<f64>::new();
    let _guard = TapeGuard::new(&mut tape);
    let x = Variable::new(1.0_f64);
    let mut a = Variable::default();
    let mut b = Variable::default();
    a.assign(&x * &x);
    b.assign(&a + &x);
    assert_eq!(tape.num_entries(), 2);
}

#[test]
fn recording_gate_off_keeps_values_only() {
    let mut tape = Tape::<f64>::new();
    tape.set_recording(false);
    let _guard = TapeGuard::new(&mut tape);
    let x = Variable::new(2.0_f64);
    let mut y = Variable::default();
    y.assign(&x * &x);
    assert_eq!(tape.num_entries(), 0);
    assert_relative_eq!(y.value(), 4.0, max_relative = 1e-15);
}

// ── Arithmetic shapes ──

#[test]
fn x_squared() {
    let grad = reverse_grad(3.0, |x, y| y.assign(x * x));
    assert_relative_eq!(grad, 6.0, max_relative = 1e-12);
}

#[test]
fn diamond_pattern() {
    // y = x² + x³, dy/dx = 2x + 3x²
    let grad = reverse_grad(2.0, |x, y| y.assign(x * x + x * x * x));
    assert_relative_eq!(grad, 16.0, max_relative = 1e-12);
}

#[test]
fn fan_out() {
    let grad = reverse_grad(5.0, |x, y| y.assign(x + x + x));
    assert_relative_eq!(grad, 3.0, max_relative = 1e-12);
}

#[test]
fn chain_of_intermediates() {
    // y = ((x²)²)² = x^8, dy/dx = 8x^7
    let mut tape = Tape::<f64>::new();
    let _guard = TapeGuard::new(&mut tape);
    let x = Variable::new(2.0_f64);
    let mut a = Variable::default();
    let mut b = Variable::default();
    let mut y = Variable::default();
    a.assign(&x * &x);
    b.assign(&a * &a);
    y.assign(&b * &b);
    tape.accumulate();
    assert_relative_eq!(x.adjoint(), 8.0 * 2.0_f64.powi(7), max_relative = 1e-10);
}

#[test]
fn reassigned_dependent() {
    // v = x², then v = v·x. Final v = x³, dv/dx = 3x².
    let mut tape = Tape::<f64>::new();
    let _guard = TapeGuard::new(&mut tape);
    let x = Variable::new(2.0_f64);
    let mut v = Variable::default();
    v.assign(&x * &x);
    let v_prev = v.clone();
    v.assign(&v_prev * &x);
    tape.accumulate();
    assert_relative_eq!(v.value(), 8.0, max_relative = 1e-15);
    assert_relative_eq!(x.adjoint(), 12.0, max_relative = 1e-12);
}

#[test]
fn compound_assignment_records_once_each() {
    // v = x·y, then v += sin(x): dv/dx = y + cos(x), dv/dy = x.
    let mut tape = Tape::<f64>::new();
    let _guard = TapeGuard::new(&mut tape);
    let x = Variable::new(3.0_f64);
    let y = Variable::new(2.0_f64);
    let mut v = Variable::default();
    v.assign(&x * &y);
    assert_eq!(tape.num_entries(), 1);
    v += sin(&x);
    assert_eq!(tape.num_entries(), 2);
    tape.accumulate();
    assert_relative_eq!(v.value(), 6.0 + 3.0_f64.sin(), max_relative = 1e-15);
    assert_relative_eq!(x.adjoint(), 2.0 + 3.0_f64.cos(), max_relative = 1e-12);
    assert_relative_eq!(y.adjoint(), 3.0, max_relative = 1e-12);
}

#[test]
fn compound_family() {
    // v starts at x; v -= y; v *= x; v /= y.
    // v = (x - y)·x / y; dv/dx = (2x - y)/y.
    let mut tape = Tape::<f64>::new();
    let _guard = TapeGuard::new(&mut tape);
    let x = Variable::new(3.0_f64);
    let y = Variable::new(2.0_f64);
    let mut v = Variable::default();
    v.assign(&x);
    v -= &y;
    v *= &x;
    v /= &y;
    tape.accumulate();
    assert_relative_eq!(v.value(), 1.5, max_relative = 1e-15);
    assert_relative_eq!(x.adjoint(), 2.0, max_relative = 1e-12);
    // dv/dy = -x/y - (x-y)x/y² = -1.5 - 0.75
    assert_relative_eq!(y.adjoint(), -2.25, max_relative = 1e-12);
}

// ── Scenario tables ──

#[test]
fn product_and_sine() {
    // z = x·y + sin(x) at (3, 2)
    let mut tape = Tape::<f64>::new();
    let _guard = TapeGuard::new(&mut tape);
    let x = Variable::new(3.0_f64);
    let y = Variable::new(2.0_f64);
    let mut z = Variable::default();
    z.assign(&x * &y + sin(&x));
    tape.accumulate();
    assert_relative_eq!(z.value(), 6.0 + 3.0_f64.sin(), max_relative = 1e-15);
    assert_relative_eq!(x.adjoint(), 2.0 + 3.0_f64.cos(), max_relative = 1e-12);
    assert_relative_eq!(y.adjoint(), 3.0, max_relative = 1e-12);
}

#[test]
fn triple_product() {
    // w = x·y·z at (2, 3, 4)
    let mut tape = Tape::<f64>::new();
    let _guard = TapeGuard::new(&mut tape);
    let x = Variable::new(2.0_f64);
    let y = Variable::new(3.0_f64);
    let z = Variable::new(4.0_f64);
    let mut w = Variable::default();
    w.assign(&x * &y * &z);
    tape.accumulate();
    assert_relative_eq!(w.value(), 24.0, max_relative = 1e-15);
    assert_relative_eq!(x.adjoint(), 12.0, max_relative = 1e-12);
    assert_relative_eq!(y.adjoint(), 8.0, max_relative = 1e-12);
    assert_relative_eq!(z.adjoint(), 6.0, max_relative = 1e-12);
}

#[test]
fn gradient_extraction_driver() {
    let mut tape = Tape::<f64>::new();
    let _guard = TapeGuard::new(&mut tape);
    let x = Variable::new(3.0_f64);
    let y = Variable::new(2.0_f64);
    let mut z = Variable::default();
    z.assign(&x * &y + sin(&x));
    let vars = [x.clone(), y.clone()];
    let mut g = Vec::new();
    tape.compute_gradient(&vars, &mut g);
    assert_eq!(g.len(), 2);
    assert_relative_eq!(g[0], 2.0 + 3.0_f64.cos(), max_relative = 1e-12);
    assert_relative_eq!(g[1], 3.0, max_relative = 1e-12);
}

// ── Elementals against finite differences ──

#[test]
fn elemental_sin() {
    check_elemental(|x, y| y.assign(sin(x)), |x| x.sin(), 1.0, 1e-5);
}

#[test]
fn elemental_cos() {
    check_elemental(|x, y| y.assign(cos(x)), |x| x.cos(), 1.0, 1e-5);
}

#[test]
fn elemental_tan() {
    check_elemental(|x, y| y.assign(tan(x)), |x| x.tan(), 0.5, 1e-5);
}

#[test]
fn elemental_exp() {
    check_elemental(|x, y| y.assign(exp(x)), |x| x.exp(), 1.0, 1e-5);
}

#[test]
fn elemental_log() {
    check_elemental(|x, y| y.assign(log(x)), |x| x.ln(), 2.0, 1e-5);
}

#[test]
fn elemental_log10() {
    check_elemental(|x, y| y.assign(log10(x)), |x| x.log10(), 2.0, 1e-5);
}

#[test]
fn elemental_sqrt() {
    check_elemental(|x, y| y.assign(sqrt(x)), |x| x.sqrt(), 4.0, 1e-5);
}

#[test]
fn elemental_tanh() {
    check_elemental(|x, y| y.assign(tanh(x)), |x| x.tanh(), 1.0, 1e-5);
}

#[test]
fn elemental_asin() {
    check_elemental(|x, y| y.assign(numbat::asin(x)), |x| x.asin(), 0.5, 1e-5);
}

#[test]
fn elemental_acos() {
    check_elemental(|x, y| y.assign(numbat::acos(x)), |x| x.acos(), 0.5, 1e-5);
}

#[test]
fn elemental_atan() {
    check_elemental(|x, y| y.assign(numbat::atan(x)), |x| x.atan(), 1.0, 1e-5);
}

#[test]
fn elemental_sinh() {
    check_elemental(|x, y| y.assign(numbat::sinh(x)), |x| x.sinh(), 1.0, 1e-5);
}

#[test]
fn elemental_cosh() {
    check_elemental(|x, y| y.assign(numbat::cosh(x)), |x| x.cosh(), 1.0, 1e-5);
}

#[test]
fn elemental_pow() {
    check_elemental(|x, y| y.assign(pow(x, 3.0)), |x| x.powf(3.0), 0.5, 1e-5);
}

#[test]
fn elemental_div() {
    check_elemental(|x, y| y.assign(1.0 / x), |x| 1.0 / x, 2.5, 1e-5);
}

#[test]
fn elemental_fabs_negative() {
    let grad = reverse_grad(-3.0, |x, y| y.assign(fabs(x)));
    assert_relative_eq!(grad, -1.0, max_relative = 1e-15);
}

// ── Scalar mixing and negation ──

#[test]
fn scalar_operands_both_sides() {
    // y = 3x + (2 - x)/2 = 2.5x + 1, dy/dx = 2.5
    let grad = reverse_grad(1.0, |x, y| y.assign(3.0 * x + (2.0 - x) / 2.0));
    assert_relative_eq!(grad, 2.5, max_relative = 1e-12);
}

#[test]
fn negation() {
    let grad = reverse_grad(2.0, |x, y| y.assign(-(x * x)));
    assert_relative_eq!(grad, -4.0, max_relative = 1e-12);
}

#[test]
fn composite_sin_of_exp() {
    let x_val = 0.5;
    let grad = reverse_grad(x_val, |x, y| y.assign(sin(exp(x))));
    let expected = x_val.exp().cos() * x_val.exp();
    assert_relative_eq!(grad, expected, max_relative = 1e-10);
}

#[test]
fn pow_with_expression_exponent() {
    // y = x^w at (2, 3): dy/dx = 12, dy/dw = 8 ln 2
    let mut tape = Tape::<f64>::new();
    let _guard = TapeGuard::new(&mut tape);
    let x = Variable::new(2.0_f64);
    let w = Variable::new(3.0_f64);
    let mut y = Variable::default();
    y.assign(pow(&x, &w));
    tape.accumulate();
    assert_relative_eq!(y.value(), 8.0, max_relative = 1e-15);
    assert_relative_eq!(x.adjoint(), 12.0, max_relative = 1e-12);
    assert_relative_eq!(w.adjoint(), 8.0 * 2.0_f64.ln(), max_relative = 1e-12);
}

#[test]
fn pow_at_negative_base_constant_exponent() {
    // y = x³ at x = -2: dy/dx = 3x² = 12
    let grad = reverse_grad(-2.0, |x, y| y.assign(pow(x, 3.0)));
    assert_relative_eq!(grad, 12.0, max_relative = 1e-12);
}

#[test]
fn repeated_accumulate_is_idempotent() {
    let mut tape = Tape::<f64>::new();
    let _guard = TapeGuard::new(&mut tape);
    let x = Variable::new(3.0_f64);
    let mut y = Variable::default();
    y.assign(&x * &x);
    tape.accumulate();
    let first = x.adjoint();
    tape.accumulate();
    assert_relative_eq!(x.adjoint(), first, max_relative = 1e-15);
}

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use numbat::{Tape, TapeGuard, Variable};

fn rosenbrock_f64(x: &[f64]) -> f64 {
    let mut sum = 0.0;
    for i in 0..x.len() - 1 {
        let t1 = 1.0 - x[i];
        let t2 = x[i + 1] - x[i] * x[i];
        sum += t1 * t1 + 100.0 * t2 * t2;
    }
    sum
}

/// Record the Rosenbrock objective on the active tape and return the output
/// variable. One record per accumulation term.
fn rosenbrock_taped(x: &[Variable<f64>]) -> Variable<f64> {
    let mut sum = Variable::new(0.0);
    for i in 0..x.len() - 1 {
        let t1 = 1.0 - &x[i];
        let t2 = &x[i + 1] - &x[i] * &x[i];
        sum += t1.clone() * t1 + 100.0 * (t2.clone() * t2);
    }
    sum
}

fn taped_gradient(values: &[f64]) -> Vec<f64> {
    let mut tape: Tape<f64> = Tape::with_capacity(values.len() * 2);
    let _guard = TapeGuard::new(&mut tape);
    let vars: Vec<Variable<f64>> = values.iter().map(|&v| Variable::new(v)).collect();
    let _out = rosenbrock_taped(&vars);
    tape.accumulate();
    vars.iter().map(|v| v.adjoint()).collect()
}

fn finite_diff_gradient(x: &[f64]) -> Vec<f64> {
    let n = x.len();
    let h = 1e-7;
    let mut grad = vec![0.0; n];
    for i in 0..n {
        let mut xp = x.to_vec();
        let mut xm = x.to_vec();
        xp[i] += h;
        xm[i] -= h;
        grad[i] = (rosenbrock_f64(&xp) - rosenbrock_f64(&xm)) / (2.0 * h);
    }
    grad
}

fn bench_reverse_gradient(c: &mut Criterion) {
    let mut group = c.benchmark_group("reverse_gradient");
    for n in [2, 10, 100, 1000] {
        let x: Vec<f64> = (0..n).map(|i| 0.5 + 0.01 * i as f64).collect();

        group.bench_with_input(BenchmarkId::new("f64_eval", n), &x, |b, x| {
            b.iter(|| black_box(rosenbrock_f64(black_box(x))))
        });

        group.bench_with_input(BenchmarkId::new("taped_reverse", n), &x, |b, x| {
            b.iter(|| black_box(taped_gradient(black_box(x))))
        });

        group.bench_with_input(BenchmarkId::new("finite_diff_2n", n), &x, |b, x| {
            b.iter(|| black_box(finite_diff_gradient(black_box(x))))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_reverse_gradient);
criterion_main!(benches);

//! Gradient-plus-Hessian reverse sweep.

use std::collections::HashMap;

use crate::float::Float;
use crate::tape::stores::SymMatrix;
use crate::tape::{StackEntry, Tape};

impl<F: Float> Tape<F> {
    /// Accumulate first- and second-order adjoints over the tape.
    ///
    /// For each record, newest first: snapshot the dependent's adjoint and
    /// its whole Hessian row, clear both, then apply the substitution
    /// `a = f(x₁..xₙ)` to the snapshot. Clearing before applying means a
    /// record whose dependent is reassigned later (or appears among its own
    /// independents) starts from exactly the state the newer records left.
    pub(crate) fn sweep_second_order_mixed(&mut self) {
        self.clear_adjoints();
        self.hessian.clear();
        self.seed_output();

        for e in self.entries.iter().rev() {
            let Some(a) = e.w.upgrade() else { continue };
            let a_id = a.id();

            let a_adj = a.adjoint.get();
            a.adjoint.set(F::zero());
            let a_row: HashMap<u32, F> = self.hessian.row(a_id).into_iter().collect();
            self.hessian.clear_var(a_id);

            if a_adj == F::zero() && a_row.is_empty() {
                continue;
            }

            let n = e.ids.len();
            let fs: Vec<F> = (0..n).map(|i| e.local_first(i)).collect();

            for (i, x) in e.ids.iter().enumerate() {
                x.adjoint.set(x.adjoint.get() + a_adj * fs[i]);
            }

            propagate_hessian(&mut self.hessian, e, &fs, a_id, a_adj, &a_row);
        }
    }
}

/// Second-order part of popping one record: distribute the dependent's
/// Hessian snapshot onto its independents.
///
/// With `fᵢ` the local first and `fᵢⱼ` the local second partials:
///
/// ```text
/// H(xᵢ,xⱼ) += adj·fᵢⱼ + fᵢ·fⱼ·H(a,a)            for every pair in ids
/// H(xᵢ,z)  += fᵢ·H(a,z)                          for every row partner z
/// ```
///
/// where the second line doubles on the diagonal (z = xᵢ), since both index
/// positions of the cell pick up the cross term.
pub(crate) fn propagate_hessian<F: Float>(
    hessian: &mut SymMatrix<F>,
    e: &StackEntry<F>,
    fs: &[F],
    a_id: u32,
    a_adj: F,
    a_row: &HashMap<u32, F>,
) {
    let n = e.ids.len();
    let haa = a_row.get(&a_id).copied().unwrap_or_else(F::zero);

    let needs_second = a_adj != F::zero();
    for i in 0..n {
        let xi = e.ids.get(i).id();
        for j in 0..=i {
            let xj = e.ids.get(j).id();
            let mut delta = fs[i] * fs[j] * haa;
            if needs_second {
                delta = delta + a_adj * e.local_second(i, j);
            }
            hessian.add(xi, xj, delta);
        }
    }

    for (&z, &haz) in a_row {
        if z == a_id {
            continue;
        }
        for i in 0..n {
            let xi = e.ids.get(i).id();
            let mut delta = fs[i] * haz;
            if xi == z {
                delta = delta + delta;
            }
            hessian.add(xi, z, delta);
        }
    }
}

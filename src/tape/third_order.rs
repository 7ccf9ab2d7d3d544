//! Third-order mixed reverse sweep.
//!
//! Extends the Hessian sweep with a three-index adjoint tensor. Popping a
//! record substitutes `a = f(x₁..xₙ)` into the accumulated derivatives of the
//! output with respect to `a`; the third-order pieces of that substitution
//! fall into three cell classes, by how many of the cell's indices come from
//! the record's own independents:
//!
//! ```text
//! T(xᵢ,xⱼ,xₖ) += adj·fᵢⱼₖ
//!             + H(a,a)·(fᵢⱼ·fₖ + fᵢₖ·fⱼ + fⱼₖ·fᵢ)
//!             + T(a,a,a)·fᵢ·fⱼ·fₖ
//!             + T(a,a,xₖ)·fᵢ·fⱼ + T(a,a,xⱼ)·fᵢ·fₖ + T(a,a,xᵢ)·fⱼ·fₖ
//!             + T(a,xⱼ,xₖ)·fᵢ + T(a,xᵢ,xₖ)·fⱼ + T(a,xᵢ,xⱼ)·fₖ
//!             + H(a,xₖ)·fᵢⱼ + H(a,xⱼ)·fᵢₖ + H(a,xᵢ)·fⱼₖ
//! T(xᵢ,xⱼ,z)  += T(a,a,z)·fᵢ·fⱼ + H(a,z)·fᵢⱼ + T(a,xⱼ,z)·fᵢ + T(a,xᵢ,z)·fⱼ
//! T(xᵢ,z,w)   += T(a,z,w)·fᵢ
//! ```
//!
//! with `z`, `w` ranging over earlier-tape variables outside the record's id
//! set. Every right-hand side reads the snapshot taken before the dependent's
//! rows were cleared, so the formulas stay valid when the dependent appears
//! among its own independents.

use std::collections::{HashMap, HashSet};

use crate::float::Float;
use crate::tape::second_order::propagate_hessian;
use crate::tape::Tape;

impl<F: Float> Tape<F> {
    pub(crate) fn sweep_third_order_mixed(&mut self) {
        self.clear_adjoints();
        self.hessian.clear();
        self.third.clear();
        self.seed_output();

        for e in self.entries.iter().rev() {
            let Some(a) = e.w.upgrade() else { continue };
            let a_id = a.id();

            let a_adj = a.adjoint.get();
            a.adjoint.set(F::zero());
            let a_row: HashMap<u32, F> = self.hessian.row(a_id).into_iter().collect();
            self.hessian.clear_var(a_id);
            let a_cells = self.third.cells_with(a_id);
            self.third.clear_var(a_id);

            if a_adj == F::zero() && a_row.is_empty() && a_cells.is_empty() {
                continue;
            }

            // Split the dependent's tensor slice by multiplicity of `a`.
            let mut taaa = F::zero();
            let mut taaz: HashMap<u32, F> = HashMap::new();
            let mut tazw: HashMap<(u32, u32), F> = HashMap::new();
            for ((p, q, r), v) in a_cells {
                let others: Vec<u32> = [p, q, r].into_iter().filter(|&id| id != a_id).collect();
                match others.len() {
                    0 => taaa = v,
                    1 => {
                        taaz.insert(others[0], v);
                    }
                    _ => {
                        tazw.insert((others[0], others[1]), v);
                    }
                }
            }

            let zero = F::zero();
            let haa = a_row.get(&a_id).copied().unwrap_or(zero);
            let h_a = |z: u32| {
                if z == a_id {
                    haa
                } else {
                    a_row.get(&z).copied().unwrap_or(zero)
                }
            };
            let t_aaz = |z: u32| {
                if z == a_id {
                    taaa
                } else {
                    taaz.get(&z).copied().unwrap_or(zero)
                }
            };
            let t_azw = |z: u32, w: u32| {
                if z == a_id {
                    t_aaz(w)
                } else if w == a_id {
                    t_aaz(z)
                } else {
                    let key = if z <= w { (z, w) } else { (w, z) };
                    tazw.get(&key).copied().unwrap_or(zero)
                }
            };

            let n = e.ids.len();
            let fs: Vec<F> = (0..n).map(|i| e.local_first(i)).collect();

            for (i, x) in e.ids.iter().enumerate() {
                x.adjoint.set(x.adjoint.get() + a_adj * fs[i]);
            }
            propagate_hessian(&mut self.hessian, e, &fs, a_id, a_adj, &a_row);

            // Cells with all three indices among this record's independents.
            for i in 0..n {
                let xi = e.ids.get(i).id();
                for j in 0..=i {
                    let xj = e.ids.get(j).id();
                    let s2ij = e.local_second(i, j);
                    for k in 0..=j {
                        let xk = e.ids.get(k).id();
                        let s2ik = e.local_second(i, k);
                        let s2jk = e.local_second(j, k);
                        let mut delta = haa * (s2ij * fs[k] + s2ik * fs[j] + s2jk * fs[i])
                            + taaa * fs[i] * fs[j] * fs[k]
                            + fs[i] * fs[j] * t_aaz(xk)
                            + fs[i] * fs[k] * t_aaz(xj)
                            + fs[j] * fs[k] * t_aaz(xi)
                            + fs[i] * t_azw(xj, xk)
                            + fs[j] * t_azw(xi, xk)
                            + fs[k] * t_azw(xi, xj)
                            + s2ij * h_a(xk)
                            + s2ik * h_a(xj)
                            + s2jk * h_a(xi);
                        if a_adj != zero {
                            delta = delta + a_adj * e.local_third(i, j, k);
                        }
                        self.third.add(xi, xj, xk, delta);
                    }
                }
            }

            // Earlier-tape variables coupled to the dependent.
            let mut outside: HashSet<u32> = HashSet::new();
            for &z in a_row.keys() {
                outside.insert(z);
            }
            for &z in taaz.keys() {
                outside.insert(z);
            }
            for &(z, w) in tazw.keys() {
                outside.insert(z);
                outside.insert(w);
            }
            outside.retain(|&z| z != a_id && !e.ids.contains(z));

            // Cells with two indices among the independents and one outside.
            for &z in &outside {
                for i in 0..n {
                    let xi = e.ids.get(i).id();
                    for j in 0..=i {
                        let xj = e.ids.get(j).id();
                        let delta = fs[i] * fs[j] * t_aaz(z)
                            + e.local_second(i, j) * h_a(z)
                            + fs[i] * t_azw(xj, z)
                            + fs[j] * t_azw(xi, z);
                        self.third.add(xi, xj, z, delta);
                    }
                }
            }

            // Cells with one index among the independents and two outside.
            for (&(z, w), &v) in &tazw {
                if z == a_id
                    || w == a_id
                    || e.ids.contains(z)
                    || e.ids.contains(w)
                {
                    continue;
                }
                for (i, x) in e.ids.iter().enumerate() {
                    self.third.add(x.id(), z, w, fs[i] * v);
                }
            }
        }
    }
}

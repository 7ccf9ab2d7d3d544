//! Sparse symmetric accumulators for the higher-order reverse sweeps.
//!
//! Cells are keyed by canonically sorted id tuples, so each unordered pair or
//! triple is stored once and reads reconstruct any index ordering. A per-id
//! adjacency index makes "everything involving id `a`" enumerable and
//! clearable without scanning the whole map; the sweeps snapshot and clear a
//! dependent's cells each time its record is popped.

use std::collections::{HashMap, HashSet};

use crate::float::Float;

#[inline]
fn pair_key(a: u32, b: u32) -> (u32, u32) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

#[inline]
fn triple_key(a: u32, b: u32, c: u32) -> (u32, u32, u32) {
    let mut k = [a, b, c];
    k.sort_unstable();
    (k[0], k[1], k[2])
}

/// Sparse symmetric matrix indexed by leaf-id pairs.
pub(crate) struct SymMatrix<F: Float> {
    cells: HashMap<(u32, u32), F>,
    partners: HashMap<u32, HashSet<u32>>,
}

impl<F: Float> SymMatrix<F> {
    pub fn new() -> Self {
        SymMatrix {
            cells: HashMap::new(),
            partners: HashMap::new(),
        }
    }

    pub fn clear(&mut self) {
        self.cells.clear();
        self.partners.clear();
    }

    #[inline]
    pub fn get(&self, a: u32, b: u32) -> F {
        self.cells
            .get(&pair_key(a, b))
            .copied()
            .unwrap_or_else(F::zero)
    }

    pub fn add(&mut self, a: u32, b: u32, delta: F) {
        if delta == F::zero() {
            return;
        }
        let key = pair_key(a, b);
        let cell = self.cells.entry(key).or_insert_with(F::zero);
        *cell = *cell + delta;
        self.partners.entry(a).or_default().insert(b);
        self.partners.entry(b).or_default().insert(a);
    }

    /// All `(partner, value)` cells involving `a`, including the diagonal.
    pub fn row(&self, a: u32) -> Vec<(u32, F)> {
        match self.partners.get(&a) {
            Some(ps) => ps
                .iter()
                .map(|&p| (p, self.get(a, p)))
                .collect(),
            None => Vec::new(),
        }
    }

    /// Remove every cell involving `a`.
    pub fn clear_var(&mut self, a: u32) {
        if let Some(ps) = self.partners.remove(&a) {
            for p in ps {
                self.cells.remove(&pair_key(a, p));
                if p != a {
                    if let Some(set) = self.partners.get_mut(&p) {
                        set.remove(&a);
                        if set.is_empty() {
                            self.partners.remove(&p);
                        }
                    }
                }
            }
        }
    }
}

/// Sparse symmetric three-index tensor indexed by leaf-id triples.
pub(crate) struct SymTensor<F: Float> {
    cells: HashMap<(u32, u32, u32), F>,
    holders: HashMap<u32, HashSet<(u32, u32, u32)>>,
}

impl<F: Float> SymTensor<F> {
    pub fn new() -> Self {
        SymTensor {
            cells: HashMap::new(),
            holders: HashMap::new(),
        }
    }

    pub fn clear(&mut self) {
        self.cells.clear();
        self.holders.clear();
    }

    #[inline]
    pub fn get(&self, a: u32, b: u32, c: u32) -> F {
        self.cells
            .get(&triple_key(a, b, c))
            .copied()
            .unwrap_or_else(F::zero)
    }

    pub fn add(&mut self, a: u32, b: u32, c: u32, delta: F) {
        if delta == F::zero() {
            return;
        }
        let key = triple_key(a, b, c);
        let cell = self.cells.entry(key).or_insert_with(F::zero);
        *cell = *cell + delta;
        for id in [key.0, key.1, key.2] {
            self.holders.entry(id).or_default().insert(key);
        }
    }

    /// All `(canonical_triple, value)` cells involving `a`.
    pub fn cells_with(&self, a: u32) -> Vec<((u32, u32, u32), F)> {
        match self.holders.get(&a) {
            Some(ts) => ts
                .iter()
                .map(|&t| (t, self.cells.get(&t).copied().unwrap_or_else(F::zero)))
                .collect(),
            None => Vec::new(),
        }
    }

    /// Remove every cell involving `a`.
    pub fn clear_var(&mut self, a: u32) {
        if let Some(ts) = self.holders.remove(&a) {
            for t in ts {
                self.cells.remove(&t);
                for id in [t.0, t.1, t.2] {
                    if id != a {
                        if let Some(set) = self.holders.get_mut(&id) {
                            set.remove(&t);
                            if set.is_empty() {
                                self.holders.remove(&id);
                            }
                        }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matrix_is_symmetric_and_clearable() {
        let mut m = SymMatrix::<f64>::new();
        m.add(3, 7, 1.5);
        m.add(7, 3, 0.5);
        m.add(7, 7, 2.0);
        assert_eq!(m.get(3, 7), 2.0);
        assert_eq!(m.get(7, 3), 2.0);
        assert_eq!(m.get(7, 7), 2.0);

        let mut row: Vec<_> = m.row(7);
        row.sort_by_key(|&(p, _)| p);
        assert_eq!(row, vec![(3, 2.0), (7, 2.0)]);

        m.clear_var(7);
        assert_eq!(m.get(3, 7), 0.0);
        assert_eq!(m.get(7, 7), 0.0);
        assert!(m.row(7).is_empty());
        assert!(m.row(3).is_empty());
    }

    #[test]
    fn tensor_canonicalizes_permutations() {
        let mut t = SymTensor::<f64>::new();
        t.add(5, 2, 9, 1.0);
        t.add(9, 5, 2, 1.0);
        assert_eq!(t.get(2, 5, 9), 2.0);
        assert_eq!(t.get(9, 2, 5), 2.0);

        t.clear_var(5);
        assert_eq!(t.get(2, 5, 9), 0.0);
        assert!(t.cells_with(2).is_empty());
    }
}

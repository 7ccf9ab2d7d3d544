//! Insertion-ordered, deduplicating sets of leaf references.
//!
//! Expression walks push every leaf they touch; the set keeps the first
//! occurrence only, and iteration replays insertion order. That order is what
//! makes per-record partial layout and sweep traversal deterministic.

use std::collections::HashSet;
use std::rc::Rc;

use crate::float::Float;
use crate::info::VariableInfo;

/// Ordered, deduplicating collection of leaf infos.
pub struct IdSet<F: Float> {
    items: Vec<Rc<VariableInfo<F>>>,
    seen: HashSet<u32>,
}

impl<F: Float> IdSet<F> {
    pub fn new() -> Self {
        IdSet {
            items: Vec::new(),
            seen: HashSet::new(),
        }
    }

    /// Insert an info, keeping the first occurrence. Returns `true` if the
    /// info was not already present.
    pub fn insert(&mut self, info: Rc<VariableInfo<F>>) -> bool {
        if self.seen.insert(info.id()) {
            self.items.push(info);
            true
        } else {
            false
        }
    }

    #[inline]
    pub fn contains(&self, id: u32) -> bool {
        self.seen.contains(&id)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    #[inline]
    pub fn get(&self, index: usize) -> &Rc<VariableInfo<F>> {
        &self.items[index]
    }

    /// Iterate infos in insertion order.
    pub fn iter(&self) -> std::slice::Iter<'_, Rc<VariableInfo<F>>> {
        self.items.iter()
    }

    pub fn clear(&mut self) {
        self.items.clear();
        self.seen.clear();
    }
}

impl<F: Float> Default for IdSet<F> {
    fn default() -> Self {
        Self::new()
    }
}

/// Ordered, deduplicating collection of bare leaf ids.
///
/// Same contract as [`IdSet`] for callers that do not need the info objects.
#[derive(Default)]
pub struct RawIdSet {
    items: Vec<u32>,
    seen: HashSet<u32>,
}

impl RawIdSet {
    pub fn new() -> Self {
        RawIdSet {
            items: Vec::new(),
            seen: HashSet::new(),
        }
    }

    pub fn insert(&mut self, id: u32) -> bool {
        if self.seen.insert(id) {
            self.items.push(id);
            true
        } else {
            false
        }
    }

    #[inline]
    pub fn contains(&self, id: u32) -> bool {
        self.seen.contains(&id)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, u32> {
        self.items.iter()
    }

    pub fn clear(&mut self) {
        self.items.clear();
        self.seen.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dedup_keeps_first_occurrence_order() {
        let a = VariableInfo::<f64>::new(1.0);
        let b = VariableInfo::<f64>::new(2.0);
        let mut set = IdSet::new();
        assert!(set.insert(Rc::clone(&a)));
        assert!(set.insert(Rc::clone(&b)));
        assert!(!set.insert(Rc::clone(&a)));
        assert_eq!(set.len(), 2);
        assert_eq!(set.get(0).id(), a.id());
        assert_eq!(set.get(1).id(), b.id());
    }

    #[test]
    fn raw_set_dedups() {
        let mut set = RawIdSet::new();
        assert!(set.insert(7));
        assert!(!set.insert(7));
        assert!(set.insert(3));
        assert_eq!(set.iter().copied().collect::<Vec<_>>(), vec![7, 3]);
    }
}

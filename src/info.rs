//! Per-leaf bookkeeping records shared between variables and the tape.
//!
//! A [`VariableInfo`] is the identity of one differentiable leaf: its unique
//! id, primal value, and the adjoint slot the reverse sweeps accumulate into.
//! Infos are shared via `Rc`: every live [`Variable`](crate::Variable) handle
//! holds one strong count, and every tape record holds one per independent it
//! references. Mutation goes through `Cell`s so shared infos stay plain data.

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::sync::atomic::{AtomicU32, Ordering};

use crate::float::Float;
use crate::id_set::RawIdSet;

// Leaf ids are minted process-wide so two tapes on two threads can never
// collide. Id 0 is reserved as "no id".
static NEXT_ID: AtomicU32 = AtomicU32::new(1);

pub(crate) fn mint_id() -> u32 {
    NEXT_ID.fetch_add(1, Ordering::Relaxed)
}

/// Restart leaf-id allocation at `epoch`.
///
/// Intended for the boundary between optimization iterations, after the tape
/// has been [reset](crate::Tape::reset) and no recorded entries survive.
/// Infos created before the reset keep their old ids; reusing an epoch while
/// such infos are still live on a tape aliases ids and corrupts sweeps.
pub fn reset_id_epoch(epoch: u32) {
    NEXT_ID.store(epoch.max(1), Ordering::Relaxed);
}

/// Sentinel for [`VariableInfo::push_start`]: the info has not yet appeared
/// in a nonlinear context on the tape.
pub const NO_PUSH_START: usize = usize::MAX;

/// Reference-counted record identifying one differentiable leaf.
///
/// Holds the unique id, the current primal value, the accumulated first-order
/// adjoint, and the dependency bookkeeping the higher-order sweeps consult.
pub struct VariableInfo<F: Float> {
    id: u32,
    pub(crate) value: Cell<F>,
    pub(crate) adjoint: Cell<F>,
    /// Set when this info has appeared as the dependent of a tape record.
    pub(crate) dependent: Cell<bool>,
    /// Set when this info was pushed from inside a nonlinear chain.
    pub(crate) nonlinear: Cell<bool>,
    /// Set by `make_nl_interactions` when this leaf participates in a
    /// nonlinear interaction (a cross-partial that is not identically zero).
    pub(crate) nl_interaction: Cell<bool>,
    /// Number of tape records referencing this info as an independent.
    pub(crate) dependence_level: Cell<u32>,
    /// Tape index of the first record that saw this info in a nonlinear
    /// context, or [`NO_PUSH_START`].
    pub(crate) push_start: Cell<usize>,
    /// Ids of the independents this info was derived from. Populated only by
    /// the mixed-partials trace levels. Stored by id, not by reference, so a
    /// self-referential assignment (`v = v + x`) cannot form an `Rc` cycle.
    pub(crate) dependencies: RefCell<RawIdSet>,
    pub(crate) name: RefCell<Option<String>>,
}

impl<F: Float> VariableInfo<F> {
    /// Allocate a fresh info with a newly minted id.
    pub fn new(value: F) -> Rc<Self> {
        Rc::new(VariableInfo {
            id: mint_id(),
            value: Cell::new(value),
            adjoint: Cell::new(F::zero()),
            dependent: Cell::new(false),
            nonlinear: Cell::new(false),
            nl_interaction: Cell::new(false),
            dependence_level: Cell::new(0),
            push_start: Cell::new(NO_PUSH_START),
            dependencies: RefCell::new(RawIdSet::new()),
            name: RefCell::new(None),
        })
    }

    /// The unique leaf id. Never reused while this info is live.
    #[inline]
    pub fn id(&self) -> u32 {
        self.id
    }

    /// Current primal value.
    #[inline]
    pub fn value(&self) -> F {
        self.value.get()
    }

    /// Accumulated first-order adjoint from the last reverse sweep.
    #[inline]
    pub fn adjoint(&self) -> F {
        self.adjoint.get()
    }

    /// Whether this info has been the left-hand side of a tape record.
    #[inline]
    pub fn is_dependent(&self) -> bool {
        self.dependent.get()
    }

    /// Whether this info was reached through a nonlinear chain.
    #[inline]
    pub fn is_nonlinear(&self) -> bool {
        self.nonlinear.get()
    }

    /// Whether this leaf participates in a nonlinear interaction.
    #[inline]
    pub fn has_nl_interaction(&self) -> bool {
        self.nl_interaction.get()
    }

    /// Number of tape records referencing this info as an independent.
    #[inline]
    pub fn dependence_level(&self) -> u32 {
        self.dependence_level.get()
    }

    /// Tape index of the first nonlinear appearance, if any.
    #[inline]
    pub fn push_start(&self) -> Option<usize> {
        let idx = self.push_start.get();
        (idx != NO_PUSH_START).then_some(idx)
    }

    /// Ids of the independents this info was derived from, in first-touch
    /// order. Empty outside the mixed-partials trace levels.
    pub fn dependency_ids(&self) -> Vec<u32> {
        self.dependencies.borrow().iter().copied().collect()
    }
}

//! The tape: an append-only log of assignment records and the reverse sweeps
//! that turn it into first-, second-, and third-order adjoints.
//!
//! Recording happens at assignment granularity: each differentiable
//! assignment contributes exactly one [`StackEntry`] holding the local
//! partials of its right-hand side with respect to the leaves it touches.
//! Which derivative orders are captured is selected per tape by
//! [`TraceLevel`]. The sweeps walk the records newest to oldest and
//! accumulate into the leaves' info records and the tape's sparse
//! higher-order stores.
//!
//! One tape serves one thread; the active tape is a thread-local pointer
//! installed by [`TapeGuard`].

use std::cell::Cell;
use std::rc::{Rc, Weak};

use crate::dynamic::DynExpr;
use crate::expr::Expression;
use crate::float::Float;
use crate::id_set::IdSet;
use crate::info::{VariableInfo, NO_PUSH_START};
use crate::variable::Variable;

mod first_order;
mod second_order;
mod stores;
mod third_order;

use self::stores::{SymMatrix, SymTensor};

/// Selector for which derivative orders each tape record captures.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TraceLevel {
    /// First partials only; dependents are flagged.
    FirstOrder,
    /// First plus diagonal second partials.
    SecondOrder,
    /// First plus diagonal second and third partials.
    ThirdOrder,
    /// Full per-record Hessian.
    SecondOrderMixedPartials,
    /// Full per-record Hessian and third-order tensor.
    ThirdOrderMixedPartials,
    /// First partials only, minimal bookkeeping.
    #[default]
    Gradient,
    /// Per-record Hessian, lower triangle only.
    GradientAndHessian,
    /// Defer derivative evaluation: store an owned clone of the expression.
    DynamicRecord,
}

/// One tape record: the dependent, its independents, and the local partials
/// of the assigned expression.
pub struct StackEntry<F: Float> {
    /// Back-reference to the dependent. Weak: ownership stays with the
    /// variable handles; an entry whose dependent died (and which no later
    /// entry references) can contribute nothing and is skipped by sweeps.
    pub(crate) w: Weak<VariableInfo<F>>,
    /// Independent leaves, in first-touch order.
    pub(crate) ids: IdSet<F>,
    pub(crate) first: Vec<F>,
    /// Diagonal second partials (diagonal trace levels only).
    pub(crate) second: Vec<F>,
    /// Diagonal third partials (diagonal trace levels only).
    pub(crate) third: Vec<F>,
    /// Row-major n·n Hessian of this assignment (mixed trace levels; the
    /// lower-triangle level fills slots with row index >= column index).
    pub(crate) second_mixed: Vec<F>,
    /// Row-major n·n·n third-order tensor of this assignment.
    pub(crate) third_mixed: Vec<F>,
    /// Owned expression clone for deferred evaluation.
    pub(crate) exp: Option<DynExpr<F>>,
}

impl<F: Float> StackEntry<F> {
    fn new(w: Weak<VariableInfo<F>>) -> Self {
        StackEntry {
            w,
            ids: IdSet::new(),
            first: Vec::new(),
            second: Vec::new(),
            third: Vec::new(),
            second_mixed: Vec::new(),
            third_mixed: Vec::new(),
            exp: None,
        }
    }

    /// The dependent info, if it is still alive.
    pub fn dependent(&self) -> Option<Rc<VariableInfo<F>>> {
        self.w.upgrade()
    }

    /// Independent leaves of this record, in first-touch order.
    pub fn ids(&self) -> &IdSet<F> {
        &self.ids
    }

    /// Number of independent leaves.
    pub fn num_independents(&self) -> usize {
        self.ids.len()
    }

    pub fn first(&self) -> &[F] {
        &self.first
    }

    pub fn second(&self) -> &[F] {
        &self.second
    }

    pub fn third(&self) -> &[F] {
        &self.third
    }

    pub fn second_mixed(&self) -> &[F] {
        &self.second_mixed
    }

    pub fn third_mixed(&self) -> &[F] {
        &self.third_mixed
    }

    /// Whether this record carries a deferred expression clone.
    pub fn has_expression(&self) -> bool {
        self.exp.is_some()
    }

    /// Local first partial with respect to independent `i`, re-deriving from
    /// the stored expression clone when this record was deferred.
    pub(crate) fn local_first(&self, i: usize) -> F {
        match &self.exp {
            Some(e) => e.partial(self.ids.get(i).id()),
            None => self.first[i],
        }
    }

    /// Local second partial with respect to independents `i` and `j`.
    pub(crate) fn local_second(&self, i: usize, j: usize) -> F {
        if let Some(e) = &self.exp {
            return e.partial2(self.ids.get(i).id(), self.ids.get(j).id());
        }
        assert!(
            !self.second_mixed.is_empty(),
            "tape record carries no mixed second-order partials; it was recorded \
             under a first-order trace level"
        );
        let n = self.ids.len();
        let (hi, lo) = if i >= j { (i, j) } else { (j, i) };
        // Lower-triangle storage fills exactly the slots with row >= column,
        // and full storage is symmetric, so this read serves both layouts.
        self.second_mixed[hi * n + lo]
    }

    /// Local third partial with respect to independents `i`, `j`, and `k`.
    pub(crate) fn local_third(&self, i: usize, j: usize, k: usize) -> F {
        if let Some(e) = &self.exp {
            return e.partial3(
                self.ids.get(i).id(),
                self.ids.get(j).id(),
                self.ids.get(k).id(),
            );
        }
        assert!(
            !self.third_mixed.is_empty(),
            "tape record carries no mixed third-order partials; it was recorded \
             under a lower trace level"
        );
        let n = self.ids.len();
        self.third_mixed[(i * n + j) * n + k]
    }
}

/// The gradient structure: owns the record log, the recording gate, the
/// trace level, and the reverse-sweep accumulators.
pub struct Tape<F: Float> {
    entries: Vec<StackEntry<F>>,
    recording: bool,
    trace_level: TraceLevel,
    min_id: u32,
    max_id: u32,
    pub(crate) hessian: SymMatrix<F>,
    pub(crate) third: SymTensor<F>,
}

impl<F: Float> Tape<F> {
    /// Create an empty tape, recording, at the default trace level.
    pub fn new() -> Self {
        Tape {
            entries: Vec::new(),
            recording: true,
            trace_level: TraceLevel::default(),
            min_id: u32::MAX,
            max_id: 0,
            hessian: SymMatrix::new(),
            third: SymTensor::new(),
        }
    }

    /// Create a tape with pre-allocated record capacity.
    pub fn with_capacity(est_records: usize) -> Self {
        let mut tape = Tape::new();
        tape.entries.reserve(est_records);
        tape
    }

    /// Whether assignments currently produce records.
    #[inline]
    pub fn recording(&self) -> bool {
        self.recording
    }

    /// Open or close the recording gate. While closed, arithmetic still
    /// computes values but assignments leave no trace.
    #[inline]
    pub fn set_recording(&mut self, recording: bool) {
        self.recording = recording;
    }

    #[inline]
    pub fn trace_level(&self) -> TraceLevel {
        self.trace_level
    }

    #[inline]
    pub fn set_trace_level(&mut self, level: TraceLevel) {
        self.trace_level = level;
    }

    /// Number of records on the tape.
    #[inline]
    pub fn num_entries(&self) -> usize {
        self.entries.len()
    }

    /// Borrow record `index` (0 is the oldest).
    pub fn entry(&self, index: usize) -> &StackEntry<F> {
        &self.entries[index]
    }

    /// Index the next record will occupy.
    #[inline]
    pub fn next_index(&self) -> usize {
        self.entries.len()
    }

    /// Smallest and largest leaf id observed on the tape, if any records
    /// exist. Dense sweep buffers can be sized from this range.
    pub fn id_range(&self) -> Option<(u32, u32)> {
        (self.min_id <= self.max_id).then_some((self.min_id, self.max_id))
    }

    /// Release all records and accumulator state. Recording flag and trace
    /// level are preserved. Intended for optimization-iteration boundaries.
    pub fn reset(&mut self) {
        self.entries.clear();
        self.hessian.clear();
        self.third.clear();
        self.min_id = u32::MAX;
        self.max_id = 0;
    }

    /// Record one assignment: fill a fresh [`StackEntry`] for dependent `w`
    /// from `expr` according to the active trace level.
    ///
    /// An expression with no leaves produces no record; assigning a constant
    /// does not grow the tape.
    pub(crate) fn record<E: Expression<F>>(&mut self, w: &Rc<VariableInfo<F>>, expr: &E) {
        let index = self.next_index();
        let mut entry = StackEntry::new(Rc::downgrade(w));

        let mixed = matches!(
            self.trace_level,
            TraceLevel::SecondOrderMixedPartials
                | TraceLevel::GradientAndHessian
                | TraceLevel::ThirdOrderMixedPartials
        );
        expr.push_ids(&mut entry.ids, mixed);
        if entry.ids.is_empty() {
            return;
        }
        let n = entry.ids.len();

        match self.trace_level {
            TraceLevel::FirstOrder | TraceLevel::Gradient => {
                fill_first(&mut entry, expr);
                if self.trace_level == TraceLevel::FirstOrder {
                    w.dependent.set(true);
                }
            }
            TraceLevel::SecondOrder => {
                fill_first(&mut entry, expr);
                entry.second = (0..n)
                    .map(|i| {
                        let id = entry.ids.get(i).id();
                        expr.partial2(id, id)
                    })
                    .collect();
                w.dependent.set(true);
            }
            TraceLevel::ThirdOrder => {
                fill_first(&mut entry, expr);
                entry.second = (0..n)
                    .map(|i| {
                        let id = entry.ids.get(i).id();
                        expr.partial2(id, id)
                    })
                    .collect();
                entry.third = (0..n)
                    .map(|i| {
                        let id = entry.ids.get(i).id();
                        expr.partial3(id, id, id)
                    })
                    .collect();
                for x in entry.ids.iter() {
                    x.dependence_level.set(x.dependence_level.get() + 1);
                }
                w.dependent.set(true);
            }
            TraceLevel::SecondOrderMixedPartials | TraceLevel::GradientAndHessian => {
                expr.make_nl_interactions(false);
                fill_first(&mut entry, expr);
                fill_second_mixed(
                    &mut entry,
                    expr,
                    self.trace_level == TraceLevel::SecondOrderMixedPartials,
                );
                finish_mixed_bookkeeping(&entry, w, index);
            }
            TraceLevel::ThirdOrderMixedPartials => {
                expr.make_nl_interactions(false);
                fill_first(&mut entry, expr);
                fill_second_mixed(&mut entry, expr, true);
                fill_third_mixed(&mut entry, expr);
                finish_mixed_bookkeeping(&entry, w, index);
            }
            TraceLevel::DynamicRecord => {
                entry.exp = Some(expr.dynamic_clone());
                for x in entry.ids.iter() {
                    x.dependence_level.set(x.dependence_level.get() + 1);
                }
            }
        }

        for x in entry.ids.iter() {
            let id = x.id();
            self.min_id = self.min_id.min(id);
            self.max_id = self.max_id.max(id);
        }
        self.entries.push(entry);
    }

    /// Run the reverse sweep matching the active trace level.
    ///
    /// Seeds the newest record's dependent with adjoint 1, then walks the
    /// tape newest to oldest. Afterwards every leaf info carries its exact
    /// first-order partial of the output, and for the mixed trace levels the
    /// tape's Hessian (and third-order) stores are populated.
    ///
    /// The diagonal-only `SecondOrder` and `ThirdOrder` levels have no
    /// dedicated sweep in this build and abort.
    pub fn accumulate(&mut self) {
        match self.trace_level {
            TraceLevel::FirstOrder | TraceLevel::Gradient | TraceLevel::DynamicRecord => {
                self.sweep_first_order()
            }
            TraceLevel::SecondOrderMixedPartials | TraceLevel::GradientAndHessian => {
                self.sweep_second_order_mixed()
            }
            TraceLevel::ThirdOrderMixedPartials => self.sweep_third_order_mixed(),
            level @ (TraceLevel::SecondOrder | TraceLevel::ThirdOrder) => panic!(
                "accumulate: the diagonal {level:?} sweep is not available; \
                 use SecondOrderMixedPartials or ThirdOrderMixedPartials"
            ),
        }
    }

    /// Run the third-order mixed reverse sweep, populating gradient, Hessian,
    /// and third-order stores.
    pub fn accumulate_third_order_mixed(&mut self) {
        assert!(
            matches!(
                self.trace_level,
                TraceLevel::ThirdOrderMixedPartials | TraceLevel::DynamicRecord
            ),
            "accumulate_third_order_mixed requires ThirdOrderMixedPartials or \
             DynamicRecord records, tape is at {:?}",
            self.trace_level
        );
        self.sweep_third_order_mixed();
    }

    /// Accumulated second-order adjoint d²y/da db from the last mixed sweep.
    #[inline]
    pub fn hessian_value(&self, a: u32, b: u32) -> F {
        self.hessian.get(a, b)
    }

    /// Accumulated third-order adjoint d³y/da db dc from the last
    /// third-order sweep.
    #[inline]
    pub fn third_value(&self, a: u32, b: u32, c: u32) -> F {
        self.third.get(a, b, c)
    }

    /// Sweep, then collect dy/dx for each variable in `vars`.
    pub fn compute_gradient(&mut self, vars: &[Variable<F>], gradient: &mut Vec<F>) {
        self.accumulate();
        gradient.clear();
        gradient.extend(vars.iter().map(|v| v.adjoint()));
    }

    /// Sweep, then collect the gradient and the dense Hessian over `vars`.
    pub fn compute_gradient_and_hessian(
        &mut self,
        vars: &[Variable<F>],
        gradient: &mut Vec<F>,
        hessian: &mut Vec<Vec<F>>,
    ) {
        match self.trace_level {
            TraceLevel::SecondOrderMixedPartials
            | TraceLevel::GradientAndHessian
            | TraceLevel::DynamicRecord => self.sweep_second_order_mixed(),
            TraceLevel::ThirdOrderMixedPartials => self.sweep_third_order_mixed(),
            level => panic!(
                "compute_gradient_and_hessian requires a mixed-partials trace \
                 level, tape is at {level:?}"
            ),
        }
        gradient.clear();
        gradient.extend(vars.iter().map(|v| v.adjoint()));
        hessian.clear();
        hessian.extend(vars.iter().map(|vi| {
            vars.iter()
                .map(|vj| self.hessian.get(vi.id(), vj.id()))
                .collect::<Vec<F>>()
        }));
    }

    /// Sweep to third order, then collect gradient, Hessian, and the dense
    /// symmetric third-order tensor over `vars`.
    pub fn compute_up_to_third_order_mixed(
        &mut self,
        vars: &[Variable<F>],
        gradient: &mut Vec<F>,
        hessian: &mut Vec<Vec<F>>,
        third: &mut Vec<Vec<Vec<F>>>,
    ) {
        self.accumulate_third_order_mixed();
        gradient.clear();
        gradient.extend(vars.iter().map(|v| v.adjoint()));
        hessian.clear();
        hessian.extend(vars.iter().map(|vi| {
            vars.iter()
                .map(|vj| self.hessian.get(vi.id(), vj.id()))
                .collect::<Vec<F>>()
        }));
        third.clear();
        third.extend(vars.iter().map(|vi| {
            vars.iter()
                .map(|vj| {
                    vars.iter()
                        .map(|vk| self.third.get(vi.id(), vj.id(), vk.id()))
                        .collect::<Vec<F>>()
                })
                .collect::<Vec<Vec<F>>>()
        }));
    }

    /// Zero the adjoint of every info reachable from the tape, so repeated
    /// sweeps over one tape start from a clean slate.
    pub(crate) fn clear_adjoints(&self) {
        for e in &self.entries {
            if let Some(w) = e.w.upgrade() {
                w.adjoint.set(F::zero());
            }
            for x in e.ids.iter() {
                x.adjoint.set(F::zero());
            }
        }
    }

    /// Seed the newest record's dependent with adjoint 1.
    pub(crate) fn seed_output(&self) {
        if let Some(e) = self.entries.last() {
            if let Some(w) = e.w.upgrade() {
                w.adjoint.set(F::one());
            }
        }
    }
}

impl<F: Float> Default for Tape<F> {
    fn default() -> Self {
        Self::new()
    }
}

fn fill_first<F: Float, E: Expression<F>>(entry: &mut StackEntry<F>, expr: &E) {
    entry.first = entry
        .ids
        .iter()
        .map(|x| expr.partial(x.id()))
        .collect();
}

fn fill_second_mixed<F: Float, E: Expression<F>>(
    entry: &mut StackEntry<F>,
    expr: &E,
    full: bool,
) {
    let n = entry.ids.len();
    let mut buf = vec![F::zero(); n * n];
    for i in 0..n {
        for j in 0..=i {
            let v = expr.partial2(entry.ids.get(i).id(), entry.ids.get(j).id());
            buf[i * n + j] = v;
            if full && j != i {
                buf[j * n + i] = v;
            }
        }
    }
    entry.second_mixed = buf;
}

fn fill_third_mixed<F: Float, E: Expression<F>>(entry: &mut StackEntry<F>, expr: &E) {
    let n = entry.ids.len();
    let mut buf = vec![F::zero(); n * n * n];
    // The tensor is symmetric in any index permutation (all operators have
    // continuous third partials), so each sorted cell is evaluated once and
    // mirrored.
    for i in 0..n {
        for j in 0..=i {
            for k in 0..=j {
                let v = expr.partial3(
                    entry.ids.get(i).id(),
                    entry.ids.get(j).id(),
                    entry.ids.get(k).id(),
                );
                for (p, q, r) in [
                    (i, j, k),
                    (i, k, j),
                    (j, i, k),
                    (j, k, i),
                    (k, i, j),
                    (k, j, i),
                ] {
                    buf[(p * n + q) * n + r] = v;
                }
            }
        }
    }
    entry.third_mixed = buf;
}

fn finish_mixed_bookkeeping<F: Float>(
    entry: &StackEntry<F>,
    w: &Rc<VariableInfo<F>>,
    index: usize,
) {
    for x in entry.ids.iter() {
        if x.nl_interaction.get() && x.push_start.get() == NO_PUSH_START {
            x.push_start.set(index);
        }
        w.dependencies.borrow_mut().insert(x.id());
    }
    w.dependent.set(true);
}

// ── Thread-local active tape ──

thread_local! {
    static TAPE_F32: Cell<*mut Tape<f32>> = const { Cell::new(std::ptr::null_mut()) };
    static TAPE_F64: Cell<*mut Tape<f64>> = const { Cell::new(std::ptr::null_mut()) };
}

/// Trait to select the correct thread-local for a given float type.
pub trait TapeThreadLocal: Float {
    fn cell() -> &'static std::thread::LocalKey<Cell<*mut Tape<Self>>>;
}

impl TapeThreadLocal for f32 {
    fn cell() -> &'static std::thread::LocalKey<Cell<*mut Tape<Self>>> {
        &TAPE_F32
    }
}

impl TapeThreadLocal for f64 {
    fn cell() -> &'static std::thread::LocalKey<Cell<*mut Tape<Self>>> {
        &TAPE_F64
    }
}

/// Access the active tape for the current thread. Panics if no tape is
/// active. Assignments use a tolerant internal variant instead, so plain
/// value arithmetic works with no tape installed.
#[inline]
pub fn with_active_tape<F: TapeThreadLocal, R>(f: impl FnOnce(&mut Tape<F>) -> R) -> R {
    F::cell().with(|cell| {
        let ptr = cell.get();
        assert!(
            !ptr.is_null(),
            "No active tape on this thread. Install one with TapeGuard::new."
        );
        // SAFETY: the TapeGuard keeps the pointed-to tape alive for the
        // duration of its scope, and thread-local access means no other
        // mutable reference can exist during this closure.
        let tape = unsafe { &mut *ptr };
        f(tape)
    })
}

/// As [`with_active_tape`], but hands the closure `None` when no tape is
/// installed instead of panicking.
#[inline]
pub(crate) fn with_tape_opt<F: TapeThreadLocal, R>(
    f: impl FnOnce(Option<&mut Tape<F>>) -> R,
) -> R {
    F::cell().with(|cell| {
        let ptr = cell.get();
        if ptr.is_null() {
            f(None)
        } else {
            // SAFETY: as in `with_active_tape`.
            let tape = unsafe { &mut *ptr };
            f(Some(tape))
        }
    })
}

/// RAII guard that installs a tape as the thread-local active tape and
/// restores the previous one on drop.
pub struct TapeGuard<F: TapeThreadLocal> {
    prev: *mut Tape<F>,
}

impl<F: TapeThreadLocal> TapeGuard<F> {
    /// Activate `tape` for the current thread. Returns a guard that restores
    /// the previously active tape when dropped.
    pub fn new(tape: &mut Tape<F>) -> Self {
        let prev = F::cell().with(|cell| {
            let prev = cell.get();
            cell.set(tape as *mut Tape<F>);
            prev
        });
        TapeGuard { prev }
    }
}

impl<F: TapeThreadLocal> Drop for TapeGuard<F> {
    fn drop(&mut self) {
        F::cell().with(|cell| {
            cell.set(self.prev);
        });
    }
}

//! The differentiable variable: the crate's user-facing handle.
//!
//! A `Variable` binds an id, a current value, and a lifecycle to one shared
//! [`VariableInfo`]. Cloning a handle shares the info; the info dies with its
//! last handle (and the last tape record referencing it). Assigning an
//! expression to a variable is the sole producer of tape records.

use std::fmt::{self, Display};
use std::rc::Rc;

use crate::expr::Expression;
use crate::float::Float;
use crate::id_set::{IdSet, RawIdSet};
use crate::info::VariableInfo;
use crate::ops::binary::{Add, Divide, Multiply, Subtract};
use crate::tape::{with_tape_opt, TapeThreadLocal};
use crate::transform::{ParameterTransformation, SinTransformation};
use crate::DynExpr;

/// A differentiable scalar variable.
///
/// As an expression, a variable is the leaf node: its first partial with
/// respect to its own id is one, everything else is zero.
pub struct Variable<F: Float> {
    pub(crate) info: Rc<VariableInfo<F>>,
    bounded: bool,
    min_b: F,
    max_b: F,
    transform: Rc<dyn ParameterTransformation<F>>,
}

impl<F: Float> Variable<F> {
    /// Create an unbounded variable with a fresh leaf id.
    pub fn new(value: F) -> Self {
        Variable {
            info: VariableInfo::new(value),
            bounded: false,
            min_b: F::neg_infinity(),
            max_b: F::infinity(),
            transform: Rc::new(SinTransformation),
        }
    }

    /// Create a named variable.
    pub fn named(value: F, name: &str) -> Self {
        let v = Variable::new(value);
        v.info.name.borrow_mut().replace(name.to_string());
        v
    }

    /// Current primal value.
    #[inline]
    pub fn value(&self) -> F {
        self.info.value()
    }

    /// This variable's leaf id.
    #[inline]
    pub fn id(&self) -> u32 {
        self.info.id()
    }

    /// Accumulated first-order adjoint from the last reverse sweep.
    #[inline]
    pub fn adjoint(&self) -> F {
        self.info.adjoint()
    }

    /// The shared info record backing this handle.
    #[inline]
    pub fn info(&self) -> &Rc<VariableInfo<F>> {
        &self.info
    }

    pub fn name(&self) -> Option<String> {
        self.info.name.borrow().clone()
    }

    pub fn set_name(&mut self, name: &str) {
        self.info.name.borrow_mut().replace(name.to_string());
    }

    /// Set the value without recording. When bounded, the value is clamped
    /// into `[min, max]`; a NaN is replaced by the interval midpoint.
    pub fn set_value(&mut self, value: F) {
        let v = if self.bounded {
            if value.is_nan() {
                (self.min_b + self.max_b) / F::two()
            } else {
                value.max(self.min_b).min(self.max_b)
            }
        } else {
            value
        };
        self.info.value.set(v);
    }

    /// Constrain this variable to `[min, max]`. The current value is clamped
    /// into the interval.
    pub fn bound(&mut self, min: F, max: F) {
        self.bounded = true;
        self.min_b = min;
        self.max_b = max;
        self.set_value(self.value());
    }

    #[inline]
    pub fn is_bounded(&self) -> bool {
        self.bounded
    }

    #[inline]
    pub fn min_boundary(&self) -> F {
        self.min_b
    }

    #[inline]
    pub fn max_boundary(&self) -> F {
        self.max_b
    }

    /// Replace the bounding transformation.
    pub fn set_transformation(&mut self, transform: Rc<dyn ParameterTransformation<F>>) {
        self.transform = transform;
    }

    /// The active bounding transformation.
    pub fn transformation(&self) -> &Rc<dyn ParameterTransformation<F>> {
        &self.transform
    }

    /// The value an optimizer sees: the unconstrained internal coordinate
    /// when bounded, the plain value otherwise.
    pub fn internal_value(&self) -> F {
        if self.bounded {
            self.transform
                .external_to_internal(self.value(), self.min_b, self.max_b)
        } else {
            self.value()
        }
    }

    /// Update from an optimizer step: map the internal coordinate back into
    /// the bounds (identity when unbounded) and store it.
    pub fn update_value(&mut self, internal: F) {
        if self.bounded {
            let external = self
                .transform
                .internal_to_external(internal, self.min_b, self.max_b);
            self.set_value(external);
        } else {
            self.set_value(internal);
        }
    }

    /// Record-and-assign: evaluate `expr`, producing one tape record when the
    /// active tape is recording, then store the value.
    ///
    /// With no active tape, or recording off, only the value is stored. An
    /// expression with no leaves (a constant) never grows the tape.
    pub fn assign<E: Expression<F>>(&mut self, expr: E)
    where
        F: TapeThreadLocal,
    {
        with_tape_opt(|tape: Option<&mut crate::Tape<F>>| {
            if let Some(tape) = tape {
                if tape.recording() {
                    tape.record(&self.info, &expr);
                }
            }
        });
        // The record captured partials at the pre-assignment values; only now
        // may the dependent's value change.
        let v = expr.value();
        self.info.value.set(v);
    }
}

impl<F: Float> Clone for Variable<F> {
    /// Copying a handle shares the underlying info (and its id); bounds and
    /// transformation are carried along.
    fn clone(&self) -> Self {
        Variable {
            info: Rc::clone(&self.info),
            bounded: self.bounded,
            min_b: self.min_b,
            max_b: self.max_b,
            transform: Rc::clone(&self.transform),
        }
    }
}

impl<F: Float> Default for Variable<F> {
    fn default() -> Self {
        Variable::new(F::zero())
    }
}

impl<F: Float> Display for Variable<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value())
    }
}

impl<F: Float> Expression<F> for Variable<F> {
    #[inline]
    fn value(&self) -> F {
        self.info.value()
    }

    fn push_ids(&self, ids: &mut IdSet<F>, include_dependent: bool) {
        ids.insert(Rc::clone(&self.info));
        if include_dependent {
            self.info.nonlinear.set(true);
        }
    }

    fn push_ids_raw(&self, ids: &mut RawIdSet) {
        ids.insert(self.info.id());
    }

    #[inline]
    fn is_nonlinear(&self) -> bool {
        false
    }

    #[inline]
    fn is_non_function(&self) -> bool {
        false
    }

    fn make_nl_interactions(&self, embedded: bool) {
        if embedded {
            self.info.nl_interaction.set(true);
        }
    }

    fn push_nl_interactions(&self, ids: &mut IdSet<F>) {
        if self.info.nl_interaction.get() {
            ids.insert(Rc::clone(&self.info));
        }
    }

    #[inline]
    fn partial(&self, a: u32) -> F {
        if a == self.info.id() {
            F::one()
        } else {
            F::zero()
        }
    }

    #[inline]
    fn partial2(&self, _a: u32, _b: u32) -> F {
        F::zero()
    }

    #[inline]
    fn partial3(&self, _a: u32, _b: u32, _c: u32) -> F {
        F::zero()
    }

    fn dynamic_clone(&self) -> DynExpr<F> {
        DynExpr::Leaf(Rc::clone(&self.info))
    }
}

// Compound arithmetic rebuilds and reassigns; each produces exactly one
// additional tape record.
impl<F: Float + TapeThreadLocal, E: Expression<F>> std::ops::AddAssign<E> for Variable<F> {
    fn add_assign(&mut self, rhs: E) {
        let expr = Add::new(self.clone(), rhs);
        self.assign(expr);
    }
}

impl<F: Float + TapeThreadLocal, E: Expression<F>> std::ops::SubAssign<E> for Variable<F> {
    fn sub_assign(&mut self, rhs: E) {
        let expr = Subtract::new(self.clone(), rhs);
        self.assign(expr);
    }
}

impl<F: Float + TapeThreadLocal, E: Expression<F>> std::ops::MulAssign<E> for Variable<F> {
    fn mul_assign(&mut self, rhs: E) {
        let expr = Multiply::new(self.clone(), rhs);
        self.assign(expr);
    }
}

impl<F: Float + TapeThreadLocal, E: Expression<F>> std::ops::DivAssign<E> for Variable<F> {
    fn div_assign(&mut self, rhs: E) {
        let expr = Divide::new(self.clone(), rhs);
        self.assign(expr);
    }
}

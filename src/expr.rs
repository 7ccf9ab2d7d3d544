//! The uniform contract every arithmetic node answers.
//!
//! An expression is a tree built on the stack by operator overloading: each
//! node owns its children by value, so a statement like
//! `z.assign(&x * &y + sin(&x))` heap-allocates only the single tape record
//! the assignment produces, never the intermediate nodes. The tree is walked
//! once, while the statement is live, to fill that record.
//!
//! Bare floats are expressions too: a plain `f64` is the constant node, with
//! zero partials of every order.

use crate::dynamic::DynExpr;
use crate::float::Float;
use crate::id_set::{IdSet, RawIdSet};

/// The queries every arithmetic node (leaf, constant, or operator) answers.
///
/// The three `partial*` methods evaluate exact derivatives with respect to
/// leaf ids at the current leaf values, applying the chain rule symbolically.
/// They are symmetric in their arguments: `partial3(a, b, c)` equals
/// `partial3` of any permutation of `(a, b, c)`.
pub trait Expression<F: Float> {
    /// Current forward value of the subexpression.
    fn value(&self) -> F;

    /// Insert every leaf info this subexpression depends on into `ids`.
    ///
    /// When `include_dependent` is true, each inserted leaf is additionally
    /// marked as participating in a nonlinear chain; the mixed-partials
    /// trace levels push with this flag set.
    fn push_ids(&self, ids: &mut IdSet<F>, include_dependent: bool);

    /// As [`push_ids`](Self::push_ids), but collects bare ids only.
    fn push_ids_raw(&self, ids: &mut RawIdSet);

    /// Conservative nonlinearity test: `true` unless the subexpression is
    /// purely affine in its leaves.
    fn is_nonlinear(&self) -> bool;

    /// Operator-local smoothness flag: `true` for nodes like `floor`,
    /// `ceil`, and `fabs` whose derivative is not continuous everywhere.
    fn is_non_function(&self) -> bool;

    /// Recursively mark leaves that participate in nonlinear interactions.
    ///
    /// `embedded` is true when an ancestor already established a nonlinear
    /// context; nonlinear nodes force it to true for their children.
    fn make_nl_interactions(&self, embedded: bool);

    /// Collect the leaves currently marked as nonlinear-interacting.
    fn push_nl_interactions(&self, ids: &mut IdSet<F>);

    /// First partial with respect to leaf `a`.
    fn partial(&self, a: u32) -> F;

    /// Second partial with respect to leaves `a` and `b`.
    fn partial2(&self, a: u32, b: u32) -> F;

    /// Third partial with respect to leaves `a`, `b`, and `c`.
    fn partial3(&self, a: u32, b: u32, c: u32) -> F;

    /// Deep-clone into an owned, type-erased tree that can be re-evaluated
    /// after this borrowed tree is gone. Used by the deferred-evaluation
    /// trace level.
    fn dynamic_clone(&self) -> DynExpr<F>;
}

// A shared subexpression can be referenced instead of moved; everything
// delegates.
impl<'a, F: Float, E: Expression<F>> Expression<F> for &'a E {
    #[inline]
    fn value(&self) -> F {
        (**self).value()
    }

    #[inline]
    fn push_ids(&self, ids: &mut IdSet<F>, include_dependent: bool) {
        (**self).push_ids(ids, include_dependent)
    }

    #[inline]
    fn push_ids_raw(&self, ids: &mut RawIdSet) {
        (**self).push_ids_raw(ids)
    }

    #[inline]
    fn is_nonlinear(&self) -> bool {
        (**self).is_nonlinear()
    }

    #[inline]
    fn is_non_function(&self) -> bool {
        (**self).is_non_function()
    }

    #[inline]
    fn make_nl_interactions(&self, embedded: bool) {
        (**self).make_nl_interactions(embedded)
    }

    #[inline]
    fn push_nl_interactions(&self, ids: &mut IdSet<F>) {
        (**self).push_nl_interactions(ids)
    }

    #[inline]
    fn partial(&self, a: u32) -> F {
        (**self).partial(a)
    }

    #[inline]
    fn partial2(&self, a: u32, b: u32) -> F {
        (**self).partial2(a, b)
    }

    #[inline]
    fn partial3(&self, a: u32, b: u32, c: u32) -> F {
        (**self).partial3(a, b, c)
    }

    #[inline]
    fn dynamic_clone(&self) -> DynExpr<F> {
        (**self).dynamic_clone()
    }
}

// Bare floats are the constant node: fixed value, no leaves, zero partials.
macro_rules! impl_constant_expression {
    ($f:ty) => {
        impl Expression<$f> for $f {
            #[inline]
            fn value(&self) -> $f {
                *self
            }

            #[inline]
            fn push_ids(&self, _ids: &mut IdSet<$f>, _include_dependent: bool) {}

            #[inline]
            fn push_ids_raw(&self, _ids: &mut RawIdSet) {}

            #[inline]
            fn is_nonlinear(&self) -> bool {
                false
            }

            #[inline]
            fn is_non_function(&self) -> bool {
                false
            }

            #[inline]
            fn make_nl_interactions(&self, _embedded: bool) {}

            #[inline]
            fn push_nl_interactions(&self, _ids: &mut IdSet<$f>) {}

            #[inline]
            fn partial(&self, _a: u32) -> $f {
                0.0
            }

            #[inline]
            fn partial2(&self, _a: u32, _b: u32) -> $f {
                0.0
            }

            #[inline]
            fn partial3(&self, _a: u32, _b: u32, _c: u32) -> $f {
                0.0
            }

            #[inline]
            fn dynamic_clone(&self) -> DynExpr<$f> {
                DynExpr::Constant(*self)
            }
        }
    };
}

impl_constant_expression!(f32);
impl_constant_expression!(f64);

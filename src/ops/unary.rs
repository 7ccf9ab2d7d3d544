//! Unary arithmetic nodes and the free-function math catalog.
//!
//! Every node applies the same third-order chain rule for `f(g)`:
//!
//! ```text
//! d¹ = f'·gₐ
//! d² = f''·gₐ·g_b + f'·gₐ_b
//! d³ = f'''·gₐ·g_b·g_c + f''·(gₐ_b·g_c + gₐ_c·g_b + g_b_c·gₐ) + f'·gₐ_b_c
//! ```
//!
//! with the operator-specific f', f'', f''' looked up from the shared
//! [`UnaryOp`] tables.

use std::marker::PhantomData;

use crate::dynamic::{DynExpr, UnaryOp};
use crate::expr::Expression;
use crate::float::Float;
use crate::id_set::{IdSet, RawIdSet};

macro_rules! unary_node {
    ($(#[$doc:meta])* $name:ident, $func:ident, $op:ident) => {
        $(#[$doc])*
        #[derive(Clone)]
        pub struct $name<F: Float, E: Expression<F>> {
            pub(crate) inner: E,
            marker: PhantomData<F>,
        }

        impl<F: Float, E: Expression<F>> $name<F, E> {
            #[inline]
            pub fn new(inner: E) -> Self {
                $name {
                    inner,
                    marker: PhantomData,
                }
            }
        }

        impl<F: Float, E: Expression<F>> Expression<F> for $name<F, E> {
            #[inline]
            fn value(&self) -> F {
                UnaryOp::$op.eval(self.inner.value())
            }

            #[inline]
            fn push_ids(&self, ids: &mut IdSet<F>, include_dependent: bool) {
                self.inner.push_ids(ids, include_dependent);
            }

            #[inline]
            fn push_ids_raw(&self, ids: &mut RawIdSet) {
                self.inner.push_ids_raw(ids);
            }

            #[inline]
            fn is_nonlinear(&self) -> bool {
                UnaryOp::$op.is_nonlinear() || self.inner.is_nonlinear()
            }

            #[inline]
            fn is_non_function(&self) -> bool {
                UnaryOp::$op.is_non_function()
            }

            #[inline]
            fn make_nl_interactions(&self, embedded: bool) {
                self.inner
                    .make_nl_interactions(embedded || UnaryOp::$op.is_nonlinear());
            }

            #[inline]
            fn push_nl_interactions(&self, ids: &mut IdSet<F>) {
                self.inner.push_nl_interactions(ids);
            }

            #[inline]
            fn partial(&self, a: u32) -> F {
                UnaryOp::$op.d1(self.inner.value()) * self.inner.partial(a)
            }

            #[inline]
            fn partial2(&self, a: u32, b: u32) -> F {
                let v = self.inner.value();
                UnaryOp::$op.d2(v) * self.inner.partial(a) * self.inner.partial(b)
                    + UnaryOp::$op.d1(v) * self.inner.partial2(a, b)
            }

            #[inline]
            fn partial3(&self, a: u32, b: u32, c: u32) -> F {
                let v = self.inner.value();
                let (ga, gb, gc) = (
                    self.inner.partial(a),
                    self.inner.partial(b),
                    self.inner.partial(c),
                );
                UnaryOp::$op.d3(v) * ga * gb * gc
                    + UnaryOp::$op.d2(v)
                        * (self.inner.partial2(a, b) * gc
                            + self.inner.partial2(a, c) * gb
                            + self.inner.partial2(b, c) * ga)
                    + UnaryOp::$op.d1(v) * self.inner.partial3(a, b, c)
            }

            fn dynamic_clone(&self) -> DynExpr<F> {
                DynExpr::unary(UnaryOp::$op, self.inner.dynamic_clone())
            }
        }

        #[doc = concat!("Build a [`", stringify!($name), "`] node from any expression.")]
        #[inline]
        pub fn $func<F: Float, E: Expression<F>>(expr: E) -> $name<F, E> {
            $name::new(expr)
        }
    };
}

unary_node!(
    /// Arithmetic negation. The only affine unary node.
    Negate,
    negate,
    Neg
);
unary_node!(
    /// Square root of an expression.
    Sqrt,
    sqrt,
    Sqrt
);
unary_node!(
    /// Natural exponential of an expression.
    Exp,
    exp,
    Exp
);
unary_node!(
    /// Natural logarithm of an expression.
    Log,
    log,
    Log
);
unary_node!(
    /// Base-10 logarithm of an expression.
    Log10,
    log10,
    Log10
);
unary_node!(
    /// Sine of an expression.
    Sin,
    sin,
    Sin
);
unary_node!(
    /// Cosine of an expression.
    Cos,
    cos,
    Cos
);
unary_node!(
    /// Tangent of an expression.
    Tan,
    tan,
    Tan
);
unary_node!(
    /// Inverse sine of an expression.
    ASin,
    asin,
    ASin
);
unary_node!(
    /// Inverse cosine of an expression.
    ACos,
    acos,
    ACos
);
unary_node!(
    /// Inverse tangent of an expression.
    ATan,
    atan,
    ATan
);
unary_node!(
    /// Hyperbolic sine of an expression.
    Sinh,
    sinh,
    Sinh
);
unary_node!(
    /// Hyperbolic cosine of an expression.
    Cosh,
    cosh,
    Cosh
);
unary_node!(
    /// Hyperbolic tangent of an expression.
    Tanh,
    tanh,
    Tanh
);
unary_node!(
    /// Absolute value. Reports the right-hand derivative at zero.
    Fabs,
    fabs,
    Fabs
);
unary_node!(
    /// Floor. Derivative is zero away from (and just right of) integers.
    Floor,
    floor,
    Floor
);
unary_node!(
    /// Ceiling. Derivative is zero away from (and just right of) integers.
    Ceil,
    ceil,
    Ceil
);

//! Binary arithmetic nodes: `Add`, `Subtract`, `Multiply`, `Divide`, `Pow`.
//!
//! Each node borrows nothing and owns its two children by value. The partial
//! evaluators expand the chain rule in closed form up to third order; the
//! free `*_partial*` helpers hold the shared expansions so the owned dynamic
//! tree ([`crate::DynExpr`]) evaluates with exactly the same formulas.

use std::marker::PhantomData;

use crate::dynamic::{BinaryOp, DynExpr};
use crate::expr::Expression;
use crate::float::Float;
use crate::id_set::{IdSet, RawIdSet};

/// `ln(u)` terms of the power rule are only meaningful when the exponent
/// actually varies; short-circuiting on a zero coefficient keeps constant
/// integer exponents differentiable at non-positive bases.
#[inline]
fn ln_term<F: Float>(coeff: F, ln_u: F) -> F {
    if coeff == F::zero() {
        F::zero()
    } else {
        coeff * ln_u
    }
}

/// d²(l·r)/da db by the product rule.
pub(crate) fn mul_partial2<F: Float>(
    l: &impl Expression<F>,
    r: &impl Expression<F>,
    a: u32,
    b: u32,
) -> F {
    l.partial2(a, b) * r.value()
        + l.partial(a) * r.partial(b)
        + l.partial(b) * r.partial(a)
        + l.value() * r.partial2(a, b)
}

/// d³(l·r)/da db dc by the product rule over all eight operand splits.
pub(crate) fn mul_partial3<F: Float>(
    l: &impl Expression<F>,
    r: &impl Expression<F>,
    a: u32,
    b: u32,
    c: u32,
) -> F {
    l.partial3(a, b, c) * r.value()
        + l.partial2(a, b) * r.partial(c)
        + l.partial2(a, c) * r.partial(b)
        + l.partial2(b, c) * r.partial(a)
        + l.partial(a) * r.partial2(b, c)
        + l.partial(b) * r.partial2(a, c)
        + l.partial(c) * r.partial2(a, b)
        + l.value() * r.partial3(a, b, c)
}

// The quotient derivatives invert the product rule on l = f·r, which keeps
// every order a single division deep.
pub(crate) fn div_partial<F: Float>(
    l: &impl Expression<F>,
    r: &impl Expression<F>,
    a: u32,
) -> F {
    let rv = r.value();
    (l.partial(a) - (l.value() / rv) * r.partial(a)) / rv
}

pub(crate) fn div_partial2<F: Float>(
    l: &impl Expression<F>,
    r: &impl Expression<F>,
    a: u32,
    b: u32,
) -> F {
    let rv = r.value();
    let fv = l.value() / rv;
    let fa = div_partial(l, r, a);
    let fb = div_partial(l, r, b);
    (l.partial2(a, b) - fa * r.partial(b) - fb * r.partial(a) - fv * r.partial2(a, b)) / rv
}

pub(crate) fn div_partial3<F: Float>(
    l: &impl Expression<F>,
    r: &impl Expression<F>,
    a: u32,
    b: u32,
    c: u32,
) -> F {
    let rv = r.value();
    let fv = l.value() / rv;
    let fa = div_partial(l, r, a);
    let fb = div_partial(l, r, b);
    let fc = div_partial(l, r, c);
    let fab = div_partial2(l, r, a, b);
    let fac = div_partial2(l, r, a, c);
    let fbc = div_partial2(l, r, b, c);
    (l.partial3(a, b, c)
        - fab * r.partial(c)
        - fac * r.partial(b)
        - fbc * r.partial(a)
        - fa * r.partial2(b, c)
        - fb * r.partial2(a, c)
        - fc * r.partial2(a, b)
        - fv * r.partial3(a, b, c))
        / rv
}

// Power derivatives via log-differentiation: with f = u^w and
// s(a) = d(ln f)/da = w'ₐ·ln u + w·uₐ/u, successive orders are
//   fₐ          = f·s(a)
//   fₐ_b        = f·(s(a)s(b) + s(a)_b)
//   fₐ_b_c      = f·(s(a)s(b)s(c) + s(a)s(b)_c + s(b)s(a)_c + s(c)s(a)_b + s(a)_b_c)
// The first order is evaluated in the direct w·u^(w-1) form instead, which
// stays finite at u = 0 for constant exponents.

fn pow_s1<F: Float>(l: &impl Expression<F>, r: &impl Expression<F>, ln_u: F, a: u32) -> F {
    ln_term(r.partial(a), ln_u) + r.value() * l.partial(a) / l.value()
}

fn pow_s2<F: Float>(
    l: &impl Expression<F>,
    r: &impl Expression<F>,
    ln_u: F,
    a: u32,
    b: u32,
) -> F {
    let u = l.value();
    let w = r.value();
    let (ua, ub, uab) = (l.partial(a), l.partial(b), l.partial2(a, b));
    let (wa, wb, wab) = (r.partial(a), r.partial(b), r.partial2(a, b));
    ln_term(wab, ln_u) + (wa * ub + wb * ua + w * uab) / u - w * ua * ub / (u * u)
}

fn pow_s3<F: Float>(
    l: &impl Expression<F>,
    r: &impl Expression<F>,
    ln_u: F,
    a: u32,
    b: u32,
    c: u32,
) -> F {
    let u = l.value();
    let u2 = u * u;
    let w = r.value();
    let (ua, ub, uc) = (l.partial(a), l.partial(b), l.partial(c));
    let (uab, uac, ubc) = (l.partial2(a, b), l.partial2(a, c), l.partial2(b, c));
    let (wa, wb, wc) = (r.partial(a), r.partial(b), r.partial(c));
    let (wab, wac, wbc) = (r.partial2(a, b), r.partial2(a, c), r.partial2(b, c));
    ln_term(r.partial3(a, b, c), ln_u)
        + (wab * uc + wac * ub + wbc * ua + wc * uab + wb * uac + wa * ubc
            + w * l.partial3(a, b, c))
            / u
        - (wa * ub * uc + wb * ua * uc + wc * ua * ub
            + w * (uab * uc + uac * ub + ua * ubc))
            / u2
        + F::two() * w * ua * ub * uc / (u2 * u)
}

pub(crate) fn pow_partial<F: Float>(
    l: &impl Expression<F>,
    r: &impl Expression<F>,
    a: u32,
) -> F {
    let u = l.value();
    let w = r.value();
    w * u.powf(w - F::one()) * l.partial(a) + ln_term(r.partial(a), u.ln() * u.powf(w))
}

pub(crate) fn pow_partial2<F: Float>(
    l: &impl Expression<F>,
    r: &impl Expression<F>,
    a: u32,
    b: u32,
) -> F {
    let ln_u = l.value().ln();
    let f = l.value().powf(r.value());
    f * (pow_s1(l, r, ln_u, a) * pow_s1(l, r, ln_u, b) + pow_s2(l, r, ln_u, a, b))
}

pub(crate) fn pow_partial3<F: Float>(
    l: &impl Expression<F>,
    r: &impl Expression<F>,
    a: u32,
    b: u32,
    c: u32,
) -> F {
    let ln_u = l.value().ln();
    let f = l.value().powf(r.value());
    let s1a = pow_s1(l, r, ln_u, a);
    let s1b = pow_s1(l, r, ln_u, b);
    let s1c = pow_s1(l, r, ln_u, c);
    f * (s1a * s1b * s1c
        + s1a * pow_s2(l, r, ln_u, b, c)
        + s1b * pow_s2(l, r, ln_u, a, c)
        + s1c * pow_s2(l, r, ln_u, a, b)
        + pow_s3(l, r, ln_u, a, b, c))
}

macro_rules! binary_node {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Clone)]
        pub struct $name<F: Float, L: Expression<F>, R: Expression<F>> {
            pub(crate) left: L,
            pub(crate) right: R,
            marker: PhantomData<F>,
        }

        impl<F: Float, L: Expression<F>, R: Expression<F>> $name<F, L, R> {
            #[inline]
            pub fn new(left: L, right: R) -> Self {
                $name {
                    left,
                    right,
                    marker: PhantomData,
                }
            }
        }
    };
}

binary_node!(
    /// Sum of two subexpressions.
    Add
);
binary_node!(
    /// Difference of two subexpressions.
    Subtract
);
binary_node!(
    /// Product of two subexpressions.
    Multiply
);
binary_node!(
    /// Quotient of two subexpressions.
    Divide
);
binary_node!(
    /// One subexpression raised to another.
    Pow
);

macro_rules! forward_structural {
    () => {
        #[inline]
        fn push_ids(&self, ids: &mut IdSet<F>, include_dependent: bool) {
            self.left.push_ids(ids, include_dependent);
            self.right.push_ids(ids, include_dependent);
        }

        #[inline]
        fn push_ids_raw(&self, ids: &mut RawIdSet) {
            self.left.push_ids_raw(ids);
            self.right.push_ids_raw(ids);
        }

        #[inline]
        fn is_non_function(&self) -> bool {
            false
        }

        #[inline]
        fn push_nl_interactions(&self, ids: &mut IdSet<F>) {
            self.left.push_nl_interactions(ids);
            self.right.push_nl_interactions(ids);
        }
    };
}

impl<F: Float, L: Expression<F>, R: Expression<F>> Expression<F> for Add<F, L, R> {
    forward_structural!();

    #[inline]
    fn value(&self) -> F {
        self.left.value() + self.right.value()
    }

    #[inline]
    fn is_nonlinear(&self) -> bool {
        self.left.is_nonlinear() || self.right.is_nonlinear()
    }

    #[inline]
    fn make_nl_interactions(&self, embedded: bool) {
        self.left.make_nl_interactions(embedded);
        self.right.make_nl_interactions(embedded);
    }

    #[inline]
    fn partial(&self, a: u32) -> F {
        self.left.partial(a) + self.right.partial(a)
    }

    #[inline]
    fn partial2(&self, a: u32, b: u32) -> F {
        self.left.partial2(a, b) + self.right.partial2(a, b)
    }

    #[inline]
    fn partial3(&self, a: u32, b: u32, c: u32) -> F {
        self.left.partial3(a, b, c) + self.right.partial3(a, b, c)
    }

    fn dynamic_clone(&self) -> DynExpr<F> {
        DynExpr::binary(BinaryOp::Add, self.left.dynamic_clone(), self.right.dynamic_clone())
    }
}

impl<F: Float, L: Expression<F>, R: Expression<F>> Expression<F> for Subtract<F, L, R> {
    forward_structural!();

    #[inline]
    fn value(&self) -> F {
        self.left.value() - self.right.value()
    }

    #[inline]
    fn is_nonlinear(&self) -> bool {
        self.left.is_nonlinear() || self.right.is_nonlinear()
    }

    #[inline]
    fn make_nl_interactions(&self, embedded: bool) {
        self.left.make_nl_interactions(embedded);
        self.right.make_nl_interactions(embedded);
    }

    #[inline]
    fn partial(&self, a: u32) -> F {
        self.left.partial(a) - self.right.partial(a)
    }

    #[inline]
    fn partial2(&self, a: u32, b: u32) -> F {
        self.left.partial2(a, b) - self.right.partial2(a, b)
    }

    #[inline]
    fn partial3(&self, a: u32, b: u32, c: u32) -> F {
        self.left.partial3(a, b, c) - self.right.partial3(a, b, c)
    }

    fn dynamic_clone(&self) -> DynExpr<F> {
        DynExpr::binary(BinaryOp::Sub, self.left.dynamic_clone(), self.right.dynamic_clone())
    }
}

impl<F: Float, L: Expression<F>, R: Expression<F>> Expression<F> for Multiply<F, L, R> {
    forward_structural!();

    #[inline]
    fn value(&self) -> F {
        self.left.value() * self.right.value()
    }

    #[inline]
    fn is_nonlinear(&self) -> bool {
        true
    }

    #[inline]
    fn make_nl_interactions(&self, _embedded: bool) {
        self.left.make_nl_interactions(true);
        self.right.make_nl_interactions(true);
    }

    #[inline]
    fn partial(&self, a: u32) -> F {
        self.left.partial(a) * self.right.value() + self.left.value() * self.right.partial(a)
    }

    #[inline]
    fn partial2(&self, a: u32, b: u32) -> F {
        mul_partial2(&self.left, &self.right, a, b)
    }

    #[inline]
    fn partial3(&self, a: u32, b: u32, c: u32) -> F {
        mul_partial3(&self.left, &self.right, a, b, c)
    }

    fn dynamic_clone(&self) -> DynExpr<F> {
        DynExpr::binary(BinaryOp::Mul, self.left.dynamic_clone(), self.right.dynamic_clone())
    }
}

impl<F: Float, L: Expression<F>, R: Expression<F>> Expression<F> for Divide<F, L, R> {
    forward_structural!();

    #[inline]
    fn value(&self) -> F {
        self.left.value() / self.right.value()
    }

    #[inline]
    fn is_nonlinear(&self) -> bool {
        true
    }

    #[inline]
    fn make_nl_interactions(&self, _embedded: bool) {
        self.left.make_nl_interactions(true);
        self.right.make_nl_interactions(true);
    }

    #[inline]
    fn partial(&self, a: u32) -> F {
        div_partial(&self.left, &self.right, a)
    }

    #[inline]
    fn partial2(&self, a: u32, b: u32) -> F {
        div_partial2(&self.left, &self.right, a, b)
    }

    #[inline]
    fn partial3(&self, a: u32, b: u32, c: u32) -> F {
        div_partial3(&self.left, &self.right, a, b, c)
    }

    fn dynamic_clone(&self) -> DynExpr<F> {
        DynExpr::binary(BinaryOp::Div, self.left.dynamic_clone(), self.right.dynamic_clone())
    }
}

impl<F: Float, L: Expression<F>, R: Expression<F>> Expression<F> for Pow<F, L, R> {
    forward_structural!();

    #[inline]
    fn value(&self) -> F {
        self.left.value().powf(self.right.value())
    }

    #[inline]
    fn is_nonlinear(&self) -> bool {
        true
    }

    #[inline]
    fn make_nl_interactions(&self, _embedded: bool) {
        self.left.make_nl_interactions(true);
        self.right.make_nl_interactions(true);
    }

    #[inline]
    fn partial(&self, a: u32) -> F {
        pow_partial(&self.left, &self.right, a)
    }

    #[inline]
    fn partial2(&self, a: u32, b: u32) -> F {
        pow_partial2(&self.left, &self.right, a, b)
    }

    #[inline]
    fn partial3(&self, a: u32, b: u32, c: u32) -> F {
        pow_partial3(&self.left, &self.right, a, b, c)
    }

    fn dynamic_clone(&self) -> DynExpr<F> {
        DynExpr::binary(BinaryOp::Pow, self.left.dynamic_clone(), self.right.dynamic_clone())
    }
}

/// Raise `base` to `exponent`. Both operands may be expressions; a bare
/// float exponent behaves as a constant.
#[inline]
pub fn pow<F: Float, L: Expression<F>, R: Expression<F>>(base: L, exponent: R) -> Pow<F, L, R> {
    Pow::new(base, exponent)
}

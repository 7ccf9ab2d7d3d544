//! Owned, type-erased expression trees.
//!
//! A [`DynExpr`] is the deep clone an assignment stores on the tape under the
//! deferred-evaluation trace level: the borrowed, statically typed node tree
//! is gone once the statement ends, but the clone can re-derive local
//! partials during a later reverse sweep, at whatever leaf values are then
//! current.
//!
//! The representation is a tagged variant per operator; the tape never
//! observes node types either way, so the two representations are
//! interchangeable and share one set of derivative formulas.

use std::rc::Rc;

use crate::expr::Expression;
use crate::float::Float;
use crate::id_set::{IdSet, RawIdSet};
use crate::info::VariableInfo;
use crate::ops::binary::{
    div_partial, div_partial2, div_partial3, mul_partial2, mul_partial3, pow_partial,
    pow_partial2, pow_partial3,
};

/// Tag for the binary operator variants of [`DynExpr`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
}

/// Tag for the unary operator variants of [`DynExpr`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Sqrt,
    Exp,
    Log,
    Log10,
    Sin,
    Cos,
    Tan,
    ASin,
    ACos,
    ATan,
    Sinh,
    Cosh,
    Tanh,
    Fabs,
    Floor,
    Ceil,
}

impl UnaryOp {
    /// Forward value f(v).
    pub fn eval<F: Float>(self, v: F) -> F {
        match self {
            UnaryOp::Neg => -v,
            UnaryOp::Sqrt => v.sqrt(),
            UnaryOp::Exp => v.exp(),
            UnaryOp::Log => v.ln(),
            UnaryOp::Log10 => v.log10(),
            UnaryOp::Sin => v.sin(),
            UnaryOp::Cos => v.cos(),
            UnaryOp::Tan => v.tan(),
            UnaryOp::ASin => v.asin(),
            UnaryOp::ACos => v.acos(),
            UnaryOp::ATan => v.atan(),
            UnaryOp::Sinh => v.sinh(),
            UnaryOp::Cosh => v.cosh(),
            UnaryOp::Tanh => v.tanh(),
            UnaryOp::Fabs => v.abs(),
            UnaryOp::Floor => v.floor(),
            UnaryOp::Ceil => v.ceil(),
        }
    }

    /// f'(v).
    ///
    /// Kinked operators (`Fabs`, `Floor`, `Ceil`) report the right-hand
    /// limit at the kink.
    pub fn d1<F: Float>(self, v: F) -> F {
        match self {
            UnaryOp::Neg => -F::one(),
            UnaryOp::Sqrt => (F::two() * v.sqrt()).recip(),
            UnaryOp::Exp => v.exp(),
            UnaryOp::Log => v.recip(),
            UnaryOp::Log10 => (v * F::LN_10()).recip(),
            UnaryOp::Sin => v.cos(),
            UnaryOp::Cos => -v.sin(),
            UnaryOp::Tan => {
                let t = v.tan();
                F::one() + t * t
            }
            UnaryOp::ASin => (F::one() - v * v).sqrt().recip(),
            UnaryOp::ACos => -(F::one() - v * v).sqrt().recip(),
            UnaryOp::ATan => (F::one() + v * v).recip(),
            UnaryOp::Sinh => v.cosh(),
            UnaryOp::Cosh => v.sinh(),
            UnaryOp::Tanh => {
                let t = v.tanh();
                F::one() - t * t
            }
            UnaryOp::Fabs => {
                if v < F::zero() {
                    -F::one()
                } else {
                    F::one()
                }
            }
            UnaryOp::Floor | UnaryOp::Ceil => F::zero(),
        }
    }

    /// f''(v).
    pub fn d2<F: Float>(self, v: F) -> F {
        match self {
            UnaryOp::Neg | UnaryOp::Fabs | UnaryOp::Floor | UnaryOp::Ceil => F::zero(),
            UnaryOp::Sqrt => -(F::cst(4.0) * v * v.sqrt()).recip(),
            UnaryOp::Exp => v.exp(),
            UnaryOp::Log => -(v * v).recip(),
            UnaryOp::Log10 => -(v * v * F::LN_10()).recip(),
            UnaryOp::Sin => -v.sin(),
            UnaryOp::Cos => -v.cos(),
            UnaryOp::Tan => {
                let t = v.tan();
                F::two() * t * (F::one() + t * t)
            }
            UnaryOp::ASin => {
                let r = F::one() - v * v;
                v / (r * r.sqrt())
            }
            UnaryOp::ACos => {
                let r = F::one() - v * v;
                -v / (r * r.sqrt())
            }
            UnaryOp::ATan => {
                let q = F::one() + v * v;
                -F::two() * v / (q * q)
            }
            UnaryOp::Sinh => v.sinh(),
            UnaryOp::Cosh => v.cosh(),
            UnaryOp::Tanh => {
                let t = v.tanh();
                -F::two() * t * (F::one() - t * t)
            }
        }
    }

    /// f'''(v).
    pub fn d3<F: Float>(self, v: F) -> F {
        match self {
            UnaryOp::Neg | UnaryOp::Fabs | UnaryOp::Floor | UnaryOp::Ceil => F::zero(),
            UnaryOp::Sqrt => F::cst(3.0) / (F::cst(8.0) * v * v * v.sqrt()),
            UnaryOp::Exp => v.exp(),
            UnaryOp::Log => F::two() / (v * v * v),
            UnaryOp::Log10 => F::two() / (v * v * v * F::LN_10()),
            UnaryOp::Sin => -v.cos(),
            UnaryOp::Cos => v.sin(),
            UnaryOp::Tan => {
                let t = v.tan();
                let sec2 = F::one() + t * t;
                F::two() * sec2 * (sec2 + F::two() * t * t)
            }
            UnaryOp::ASin => {
                let r = F::one() - v * v;
                (F::one() + F::two() * v * v) / (r * r * r.sqrt())
            }
            UnaryOp::ACos => {
                let r = F::one() - v * v;
                -(F::one() + F::two() * v * v) / (r * r * r.sqrt())
            }
            UnaryOp::ATan => {
                let q = F::one() + v * v;
                (F::cst(6.0) * v * v - F::two()) / (q * q * q)
            }
            UnaryOp::Sinh => v.cosh(),
            UnaryOp::Cosh => v.sinh(),
            UnaryOp::Tanh => {
                let t = v.tanh();
                (F::one() - t * t) * (F::cst(6.0) * t * t - F::two())
            }
        }
    }

    /// Whether this operator breaks affinity of its argument.
    pub fn is_nonlinear(self) -> bool {
        !matches!(self, UnaryOp::Neg)
    }

    /// Operator-local smoothness flag; see
    /// [`Expression::is_non_function`](crate::Expression::is_non_function).
    pub fn is_non_function(self) -> bool {
        matches!(self, UnaryOp::Fabs | UnaryOp::Floor | UnaryOp::Ceil)
    }
}

/// An owned expression tree, cloneable and independent of any borrowed nodes.
#[derive(Clone)]
pub enum DynExpr<F: Float> {
    /// A fixed scalar.
    Constant(F),
    /// A differentiable leaf, sharing the live info record.
    Leaf(Rc<VariableInfo<F>>),
    Binary(BinaryOp, Box<DynExpr<F>>, Box<DynExpr<F>>),
    Unary(UnaryOp, Box<DynExpr<F>>),
}

impl<F: Float> DynExpr<F> {
    #[inline]
    pub fn binary(op: BinaryOp, left: DynExpr<F>, right: DynExpr<F>) -> Self {
        DynExpr::Binary(op, Box::new(left), Box::new(right))
    }

    #[inline]
    pub fn unary(op: UnaryOp, inner: DynExpr<F>) -> Self {
        DynExpr::Unary(op, Box::new(inner))
    }
}

impl<F: Float> Expression<F> for DynExpr<F> {
    fn value(&self) -> F {
        match self {
            DynExpr::Constant(c) => *c,
            DynExpr::Leaf(info) => info.value(),
            DynExpr::Binary(op, l, r) => {
                let (lv, rv) = (l.value(), r.value());
                match op {
                    BinaryOp::Add => lv + rv,
                    BinaryOp::Sub => lv - rv,
                    BinaryOp::Mul => lv * rv,
                    BinaryOp::Div => lv / rv,
                    BinaryOp::Pow => lv.powf(rv),
                }
            }
            DynExpr::Unary(op, inner) => op.eval(inner.value()),
        }
    }

    fn push_ids(&self, ids: &mut IdSet<F>, include_dependent: bool) {
        match self {
            DynExpr::Constant(_) => {}
            DynExpr::Leaf(info) => {
                ids.insert(Rc::clone(info));
                if include_dependent {
                    info.nonlinear.set(true);
                }
            }
            DynExpr::Binary(_, l, r) => {
                l.push_ids(ids, include_dependent);
                r.push_ids(ids, include_dependent);
            }
            DynExpr::Unary(_, inner) => inner.push_ids(ids, include_dependent),
        }
    }

    fn push_ids_raw(&self, ids: &mut RawIdSet) {
        match self {
            DynExpr::Constant(_) => {}
            DynExpr::Leaf(info) => {
                ids.insert(info.id());
            }
            DynExpr::Binary(_, l, r) => {
                l.push_ids_raw(ids);
                r.push_ids_raw(ids);
            }
            DynExpr::Unary(_, inner) => inner.push_ids_raw(ids),
        }
    }

    fn is_nonlinear(&self) -> bool {
        match self {
            DynExpr::Constant(_) | DynExpr::Leaf(_) => false,
            DynExpr::Binary(op, l, r) => match op {
                BinaryOp::Add | BinaryOp::Sub => l.is_nonlinear() || r.is_nonlinear(),
                _ => true,
            },
            DynExpr::Unary(op, inner) => op.is_nonlinear() || inner.is_nonlinear(),
        }
    }

    fn is_non_function(&self) -> bool {
        match self {
            DynExpr::Unary(op, _) => op.is_non_function(),
            _ => false,
        }
    }

    fn make_nl_interactions(&self, embedded: bool) {
        match self {
            DynExpr::Constant(_) => {}
            DynExpr::Leaf(info) => {
                if embedded {
                    info.nl_interaction.set(true);
                }
            }
            DynExpr::Binary(op, l, r) => {
                let down = match op {
                    BinaryOp::Add | BinaryOp::Sub => embedded,
                    _ => true,
                };
                l.make_nl_interactions(down);
                r.make_nl_interactions(down);
            }
            DynExpr::Unary(op, inner) => {
                inner.make_nl_interactions(embedded || op.is_nonlinear())
            }
        }
    }

    fn push_nl_interactions(&self, ids: &mut IdSet<F>) {
        match self {
            DynExpr::Constant(_) => {}
            DynExpr::Leaf(info) => {
                if info.nl_interaction.get() {
                    ids.insert(Rc::clone(info));
                }
            }
            DynExpr::Binary(_, l, r) => {
                l.push_nl_interactions(ids);
                r.push_nl_interactions(ids);
            }
            DynExpr::Unary(_, inner) => inner.push_nl_interactions(ids),
        }
    }

    fn partial(&self, a: u32) -> F {
        match self {
            DynExpr::Constant(_) => F::zero(),
            DynExpr::Leaf(info) => {
                if info.id() == a {
                    F::one()
                } else {
                    F::zero()
                }
            }
            DynExpr::Binary(op, l, r) => {
                let (l, r) = (&**l, &**r);
                match op {
                    BinaryOp::Add => l.partial(a) + r.partial(a),
                    BinaryOp::Sub => l.partial(a) - r.partial(a),
                    BinaryOp::Mul => l.partial(a) * r.value() + l.value() * r.partial(a),
                    BinaryOp::Div => div_partial(l, r, a),
                    BinaryOp::Pow => pow_partial(l, r, a),
                }
            }
            DynExpr::Unary(op, inner) => op.d1(inner.value()) * inner.partial(a),
        }
    }

    fn partial2(&self, a: u32, b: u32) -> F {
        match self {
            DynExpr::Constant(_) | DynExpr::Leaf(_) => F::zero(),
            DynExpr::Binary(op, l, r) => {
                let (l, r) = (&**l, &**r);
                match op {
                    BinaryOp::Add => l.partial2(a, b) + r.partial2(a, b),
                    BinaryOp::Sub => l.partial2(a, b) - r.partial2(a, b),
                    BinaryOp::Mul => mul_partial2(l, r, a, b),
                    BinaryOp::Div => div_partial2(l, r, a, b),
                    BinaryOp::Pow => pow_partial2(l, r, a, b),
                }
            }
            DynExpr::Unary(op, inner) => {
                let v = inner.value();
                op.d2(v) * inner.partial(a) * inner.partial(b) + op.d1(v) * inner.partial2(a, b)
            }
        }
    }

    fn partial3(&self, a: u32, b: u32, c: u32) -> F {
        match self {
            DynExpr::Constant(_) | DynExpr::Leaf(_) => F::zero(),
            DynExpr::Binary(op, l, r) => {
                let (l, r) = (&**l, &**r);
                match op {
                    BinaryOp::Add => l.partial3(a, b, c) + r.partial3(a, b, c),
                    BinaryOp::Sub => l.partial3(a, b, c) - r.partial3(a, b, c),
                    BinaryOp::Mul => mul_partial3(l, r, a, b, c),
                    BinaryOp::Div => div_partial3(l, r, a, b, c),
                    BinaryOp::Pow => pow_partial3(l, r, a, b, c),
                }
            }
            DynExpr::Unary(op, inner) => {
                let v = inner.value();
                let (ga, gb, gc) = (inner.partial(a), inner.partial(b), inner.partial(c));
                op.d3(v) * ga * gb * gc
                    + op.d2(v)
                        * (inner.partial2(a, b) * gc
                            + inner.partial2(a, c) * gb
                            + inner.partial2(b, c) * ga)
                    + op.d1(v) * inner.partial3(a, b, c)
            }
        }
    }

    fn dynamic_clone(&self) -> DynExpr<F> {
        self.clone()
    }
}

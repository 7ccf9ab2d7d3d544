//! `std::ops` wiring for expression nodes, variables, and bare floats.
//!
//! Every node type (and [`Variable`]) gets `+ - * /` against any other
//! expression, plus unary minus; bare floats compose from either side. The
//! impls are macro-generated so each operand pairing stays a one-liner.

use crate::expr::Expression;
use crate::float::Float;
use crate::ops::binary::{Add, Divide, Multiply, Pow, Subtract};
use crate::ops::unary::{
    ACos, ASin, ATan, Ceil, Cos, Cosh, Exp, Fabs, Floor, Log, Log10, Negate, Sin, Sinh, Sqrt,
    Tan, Tanh,
};
use crate::variable::Variable;

// Expression (op) expression and expression (op) float. The Rhs bound covers
// both: bare floats are constant expressions.
macro_rules! impl_expr_ops {
    ($name:ident $(, $gen:ident)*) => {
        impl<F: Float $(, $gen: Expression<F>)*, Rhs: Expression<F>> std::ops::Add<Rhs>
            for $name<F $(, $gen)*>
        {
            type Output = Add<F, Self, Rhs>;
            #[inline]
            fn add(self, rhs: Rhs) -> Self::Output {
                Add::new(self, rhs)
            }
        }

        impl<F: Float $(, $gen: Expression<F>)*, Rhs: Expression<F>> std::ops::Sub<Rhs>
            for $name<F $(, $gen)*>
        {
            type Output = Subtract<F, Self, Rhs>;
            #[inline]
            fn sub(self, rhs: Rhs) -> Self::Output {
                Subtract::new(self, rhs)
            }
        }

        impl<F: Float $(, $gen: Expression<F>)*, Rhs: Expression<F>> std::ops::Mul<Rhs>
            for $name<F $(, $gen)*>
        {
            type Output = Multiply<F, Self, Rhs>;
            #[inline]
            fn mul(self, rhs: Rhs) -> Self::Output {
                Multiply::new(self, rhs)
            }
        }

        impl<F: Float $(, $gen: Expression<F>)*, Rhs: Expression<F>> std::ops::Div<Rhs>
            for $name<F $(, $gen)*>
        {
            type Output = Divide<F, Self, Rhs>;
            #[inline]
            fn div(self, rhs: Rhs) -> Self::Output {
                Divide::new(self, rhs)
            }
        }

        impl<F: Float $(, $gen: Expression<F>)*> std::ops::Neg for $name<F $(, $gen)*> {
            type Output = Negate<F, Self>;
            #[inline]
            fn neg(self) -> Self::Output {
                Negate::new(self)
            }
        }
    };
}

impl_expr_ops!(Add, L, R);
impl_expr_ops!(Subtract, L, R);
impl_expr_ops!(Multiply, L, R);
impl_expr_ops!(Divide, L, R);
impl_expr_ops!(Pow, L, R);
impl_expr_ops!(Negate, E);
impl_expr_ops!(Sqrt, E);
impl_expr_ops!(Exp, E);
impl_expr_ops!(Log, E);
impl_expr_ops!(Log10, E);
impl_expr_ops!(Sin, E);
impl_expr_ops!(Cos, E);
impl_expr_ops!(Tan, E);
impl_expr_ops!(ASin, E);
impl_expr_ops!(ACos, E);
impl_expr_ops!(ATan, E);
impl_expr_ops!(Sinh, E);
impl_expr_ops!(Cosh, E);
impl_expr_ops!(Tanh, E);
impl_expr_ops!(Fabs, E);
impl_expr_ops!(Floor, E);
impl_expr_ops!(Ceil, E);
impl_expr_ops!(Variable);

// Borrowed variables are the common leaf spelling (`&x * &y`); the handle is
// cloned into the node, which bumps the info's ref count for the statement.
impl<'a, F: Float, Rhs: Expression<F>> std::ops::Add<Rhs> for &'a Variable<F> {
    type Output = Add<F, Variable<F>, Rhs>;
    #[inline]
    fn add(self, rhs: Rhs) -> Self::Output {
        Add::new(self.clone(), rhs)
    }
}

impl<'a, F: Float, Rhs: Expression<F>> std::ops::Sub<Rhs> for &'a Variable<F> {
    type Output = Subtract<F, Variable<F>, Rhs>;
    #[inline]
    fn sub(self, rhs: Rhs) -> Self::Output {
        Subtract::new(self.clone(), rhs)
    }
}

impl<'a, F: Float, Rhs: Expression<F>> std::ops::Mul<Rhs> for &'a Variable<F> {
    type Output = Multiply<F, Variable<F>, Rhs>;
    #[inline]
    fn mul(self, rhs: Rhs) -> Self::Output {
        Multiply::new(self.clone(), rhs)
    }
}

impl<'a, F: Float, Rhs: Expression<F>> std::ops::Div<Rhs> for &'a Variable<F> {
    type Output = Divide<F, Variable<F>, Rhs>;
    #[inline]
    fn div(self, rhs: Rhs) -> Self::Output {
        Divide::new(self.clone(), rhs)
    }
}

impl<'a, F: Float> std::ops::Neg for &'a Variable<F> {
    type Output = Negate<F, Variable<F>>;
    #[inline]
    fn neg(self) -> Self::Output {
        Negate::new(self.clone())
    }
}

// Bare float on the left of a node.
macro_rules! impl_scalar_lhs_ops {
    (@one $f:ty, $name:ident $(, $gen:ident)*) => {
        impl<$($gen: Expression<$f>),*> std::ops::Add<$name<$f $(, $gen)*>> for $f {
            type Output = Add<$f, $f, $name<$f $(, $gen)*>>;
            #[inline]
            fn add(self, rhs: $name<$f $(, $gen)*>) -> Self::Output {
                Add::new(self, rhs)
            }
        }

        impl<$($gen: Expression<$f>),*> std::ops::Sub<$name<$f $(, $gen)*>> for $f {
            type Output = Subtract<$f, $f, $name<$f $(, $gen)*>>;
            #[inline]
            fn sub(self, rhs: $name<$f $(, $gen)*>) -> Self::Output {
                Subtract::new(self, rhs)
            }
        }

        impl<$($gen: Expression<$f>),*> std::ops::Mul<$name<$f $(, $gen)*>> for $f {
            type Output = Multiply<$f, $f, $name<$f $(, $gen)*>>;
            #[inline]
            fn mul(self, rhs: $name<$f $(, $gen)*>) -> Self::Output {
                Multiply::new(self, rhs)
            }
        }

        impl<$($gen: Expression<$f>),*> std::ops::Div<$name<$f $(, $gen)*>> for $f {
            type Output = Divide<$f, $f, $name<$f $(, $gen)*>>;
            #[inline]
            fn div(self, rhs: $name<$f $(, $gen)*>) -> Self::Output {
                Divide::new(self, rhs)
            }
        }
    };
    ($name:ident $(, $gen:ident)*) => {
        impl_scalar_lhs_ops!(@one f32, $name $(, $gen)*);
        impl_scalar_lhs_ops!(@one f64, $name $(, $gen)*);
    };
}

impl_scalar_lhs_ops!(Add, L, R);
impl_scalar_lhs_ops!(Subtract, L, R);
impl_scalar_lhs_ops!(Multiply, L, R);
impl_scalar_lhs_ops!(Divide, L, R);
impl_scalar_lhs_ops!(Pow, L, R);
impl_scalar_lhs_ops!(Negate, E);
impl_scalar_lhs_ops!(Sqrt, E);
impl_scalar_lhs_ops!(Exp, E);
impl_scalar_lhs_ops!(Log, E);
impl_scalar_lhs_ops!(Log10, E);
impl_scalar_lhs_ops!(Sin, E);
impl_scalar_lhs_ops!(Cos, E);
impl_scalar_lhs_ops!(Tan, E);
impl_scalar_lhs_ops!(ASin, E);
impl_scalar_lhs_ops!(ACos, E);
impl_scalar_lhs_ops!(ATan, E);
impl_scalar_lhs_ops!(Sinh, E);
impl_scalar_lhs_ops!(Cosh, E);
impl_scalar_lhs_ops!(Tanh, E);
impl_scalar_lhs_ops!(Fabs, E);
impl_scalar_lhs_ops!(Floor, E);
impl_scalar_lhs_ops!(Ceil, E);

// Bare float on the left of a variable, owned or borrowed.
macro_rules! impl_scalar_variable_ops {
    ($f:ty) => {
        impl std::ops::Add<Variable<$f>> for $f {
            type Output = Add<$f, $f, Variable<$f>>;
            #[inline]
            fn add(self, rhs: Variable<$f>) -> Self::Output {
                Add::new(self, rhs)
            }
        }

        impl<'a> std::ops::Add<&'a Variable<$f>> for $f {
            type Output = Add<$f, $f, Variable<$f>>;
            #[inline]
            fn add(self, rhs: &'a Variable<$f>) -> Self::Output {
                Add::new(self, rhs.clone())
            }
        }

        impl std::ops::Sub<Variable<$f>> for $f {
            type Output = Subtract<$f, $f, Variable<$f>>;
            #[inline]
            fn sub(self, rhs: Variable<$f>) -> Self::Output {
                Subtract::new(self, rhs)
            }
        }

        impl<'a> std::ops::Sub<&'a Variable<$f>> for $f {
            type Output = Subtract<$f, $f, Variable<$f>>;
            #[inline]
            fn sub(self, rhs: &'a Variable<$f>) -> Self::Output {
                Subtract::new(self, rhs.clone())
            }
        }

        impl std::ops::Mul<Variable<$f>> for $f {
            type Output = Multiply<$f, $f, Variable<$f>>;
            #[inline]
            fn mul(self, rhs: Variable<$f>) -> Self::Output {
                Multiply::new(self, rhs)
            }
        }

        impl<'a> std::ops::Mul<&'a Variable<$f>> for $f {
            type Output = Multiply<$f, $f, Variable<$f>>;
            #[inline]
            fn mul(self, rhs: &'a Variable<$f>) -> Self::Output {
                Multiply::new(self, rhs.clone())
            }
        }

        impl std::ops::Div<Variable<$f>> for $f {
            type Output = Divide<$f, $f, Variable<$f>>;
            #[inline]
            fn div(self, rhs: Variable<$f>) -> Self::Output {
                Divide::new(self, rhs)
            }
        }

        impl<'a> std::ops::Div<&'a Variable<$f>> for $f {
            type Output = Divide<$f, $f, Variable<$f>>;
            #[inline]
            fn div(self, rhs: &'a Variable<$f>) -> Self::Output {
                Divide::new(self, rhs.clone())
            }
        }
    };
}

impl_scalar_variable_ops!(f32);
impl_scalar_variable_ops!(f64);

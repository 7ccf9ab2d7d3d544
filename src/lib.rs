//! Tape-based reverse-mode automatic differentiation for scalar computations.
//!
//! numbat records arithmetic at assignment granularity: operators build a
//! stack-allocated expression tree, and assigning the tree to a [`Variable`]
//! walks it once, writing a single record with the local partials onto the
//! thread's active [`Tape`]. A reverse sweep then accumulates exact first-,
//! second-, or third-order partial derivatives of the output with respect to
//! every leaf, depending on the tape's [`TraceLevel`].
//!
//! # Quick start
//!
//! ```
//! use numbat::{sin, Tape, TapeGuard, TraceLevel, Variable};
//!
//! let mut tape = Tape::<f64>::new();
//! tape.set_trace_level(TraceLevel::GradientAndHessian);
//! let _guard = TapeGuard::new(&mut tape);
//!
//! let x = Variable::new(3.0_f64);
//! let y = Variable::new(2.0_f64);
//! let mut z = Variable::default();
//! z.assign(&x * &y + sin(&x));
//!
//! tape.accumulate();
//! assert!((z.value() - (6.0 + 3.0_f64.sin())).abs() < 1e-12);
//! assert!((x.adjoint() - (2.0 + 3.0_f64.cos())).abs() < 1e-12);
//! assert!((y.adjoint() - 3.0).abs() < 1e-12);
//! assert!((tape.hessian_value(x.id(), x.id()) + 3.0_f64.sin()).abs() < 1e-12);
//! ```
//!
//! Tapes are strictly per thread; parallel threads each install their own
//! with [`TapeGuard`] and never interact.

pub mod dynamic;
pub mod expr;
pub mod float;
pub mod id_set;
pub mod info;
pub mod ops;
pub mod tape;
pub mod transform;
pub mod variable;

pub use dynamic::{BinaryOp, DynExpr, UnaryOp};
pub use expr::Expression;
pub use float::Float;
pub use id_set::{IdSet, RawIdSet};
pub use info::{reset_id_epoch, VariableInfo};
pub use ops::{
    acos, asin, atan, ceil, cos, cosh, exp, fabs, floor, log, log10, pow, sin, sinh, sqrt, tan,
    tanh,
};
pub use tape::{with_active_tape, StackEntry, Tape, TapeGuard, TapeThreadLocal, TraceLevel};
pub use transform::{ParameterTransformation, SinTransformation, TanhTransformation};
pub use variable::Variable;

/// Type alias for reverse-mode variables over `f64`.
pub type Variable64 = Variable<f64>;
/// Type alias for reverse-mode variables over `f32`.
pub type Variable32 = Variable<f32>;

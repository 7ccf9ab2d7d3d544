//! The arithmetic node schemas and their operator wiring.

pub mod binary;
mod overloads;
pub mod unary;

pub use binary::{pow, Add, Divide, Multiply, Pow, Subtract};
pub use unary::{
    acos, asin, atan, ceil, cos, cosh, exp, fabs, floor, log, log10, negate, sin, sinh, sqrt,
    tan, tanh, ACos, ASin, ATan, Ceil, Cos, Cosh, Exp, Fabs, Floor, Log, Log10, Negate, Sin,
    Sinh, Sqrt, Tan, Tanh,
};

use std::fmt::{Debug, Display};

use num_traits::{Float as NumFloat, FloatConst, FromPrimitive};

/// Marker trait for base floating-point types (`f32`, `f64`).
///
/// Bundles the numeric and utility traits needed throughout numbat.
/// Only primitive float types implement this; expression nodes and
/// variables are generic over it.
pub trait Float:
    NumFloat + FloatConst + FromPrimitive + Copy + Send + Sync + Default + Debug + Display + 'static
{
    /// Lift an `f64` literal into `Self`. Total for the primitive floats
    /// this trait is implemented for.
    #[inline]
    fn cst(v: f64) -> Self {
        Self::from_f64(v).unwrap_or_else(Self::nan)
    }

    #[inline]
    fn two() -> Self {
        Self::one() + Self::one()
    }
}

impl Float for f32 {}
impl Float for f64 {}

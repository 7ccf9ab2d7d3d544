//! Bounded-parameter transformations.
//!
//! Optimizers search an unconstrained internal space; a transformation maps
//! internal coordinates onto a variable's `[min, max]` interval and back.
//! The core only consults these maps from
//! [`Variable::internal_value`](crate::Variable::internal_value) and
//! [`Variable::update_value`](crate::Variable::update_value); the reverse
//! sweeps never see them.

use crate::float::Float;

/// Maps between a bounded external value and an unbounded internal one.
pub trait ParameterTransformation<F: Float> {
    /// Map a value in `[min, max]` to the internal coordinate.
    fn external_to_internal(&self, external: F, min: F, max: F) -> F;

    /// Map an internal coordinate back into `[min, max]`.
    fn internal_to_external(&self, internal: F, min: F, max: F) -> F;

    /// d(external)/d(internal) at the given internal coordinate.
    fn derivative_internal_to_external(&self, internal: F, min: F, max: F) -> F;
}

/// Sine bounding: `external = min + (sin(internal) + 1)/2 · (max − min)`.
///
/// The default transformation for bounded variables.
pub struct SinTransformation;

impl<F: Float> ParameterTransformation<F> for SinTransformation {
    fn external_to_internal(&self, external: F, min: F, max: F) -> F {
        (F::two() * (external - min) / (max - min) - F::one()).asin()
    }

    fn internal_to_external(&self, internal: F, min: F, max: F) -> F {
        min + (internal.sin() + F::one()) / F::two() * (max - min)
    }

    fn derivative_internal_to_external(&self, internal: F, min: F, max: F) -> F {
        internal.cos() * (max - min) / F::two()
    }
}

/// Hyperbolic-tangent bounding:
/// `external = min + (tanh(internal) + 1)/2 · (max − min)`.
pub struct TanhTransformation;

impl<F: Float> ParameterTransformation<F> for TanhTransformation {
    fn external_to_internal(&self, external: F, min: F, max: F) -> F {
        (F::two() * (external - min) / (max - min) - F::one()).atanh()
    }

    fn internal_to_external(&self, internal: F, min: F, max: F) -> F {
        min + (internal.tanh() + F::one()) / F::two() * (max - min)
    }

    fn derivative_internal_to_external(&self, internal: F, min: F, max: F) -> F {
        let t = internal.tanh();
        (F::one() - t * t) * (max - min) / F::two()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sin_round_trip() {
        let t = SinTransformation;
        let (min, max) = (0.0_f64, 10.0);
        for v in [0.5, 3.0, 7.0, 9.5] {
            let internal = t.external_to_internal(v, min, max);
            let back = t.internal_to_external(internal, min, max);
            assert!((back - v).abs() < 1e-12);
        }
    }

    #[test]
    fn tanh_derivative_matches_finite_difference() {
        let t = TanhTransformation;
        let (min, max) = (-2.0_f64, 5.0);
        let h = 1e-6;
        for x in [-1.5, -0.2, 0.0, 0.8, 2.0] {
            let analytic = t.derivative_internal_to_external(x, min, max);
            let fd = (t.internal_to_external(x + h, min, max)
                - t.internal_to_external(x - h, min, max))
                / (2.0 * h);
            assert!((analytic - fd).abs() < 1e-6, "at {x}: {analytic} vs {fd}");
        }
    }
}

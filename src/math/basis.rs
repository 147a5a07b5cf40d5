//! Stable ramp function for the facilitation curve.
//!
//! The facilitation curve is built from
//!
//! - `ramp(x, τ) = x - τ (1 - exp(-x/τ))`
//!
//! which rises quadratically from zero (`≈ x²/(2τ)`) and becomes linear with
//! slope 1 for `x ≫ τ`.
//!
//! Numerical notes:
//! - For small `u = x/τ`, both terms are nearly equal and the subtraction
//!   cancels. We use `expm1` (and a series fallback) to keep precision.

/// Threshold below which we switch to a small-u series approximation.
const SMALL_U: f64 = 1e-5;

/// Compute `ramp(x, τ)` in a numerically stable way.
pub fn ramp(x: f64, tau: f64) -> f64 {
    let u = x / tau;

    if u.abs() < SMALL_U {
        // τ (u²/2 - u³/6) from the Taylor series of exp(-u).
        return tau * (u * u / 2.0 - u * u * u / 6.0);
    }

    // 1 - exp(-u) = -expm1(-u), so x - τ(1 - e^{-u}) = x + τ expm1(-u).
    x + tau * (-u).exp_m1()
}

//! Facilitation curve evaluation.
//!
//! For one simulated trial with onset offset `pre_t`, the curve at time `t`
//! (seconds relative to target) is
//!
//! ```text
//! x = t + pre_t
//! fac(t) = ramp(x, τ) / k     if x >= 0
//!        = 0                  otherwise
//! ```
//!
//! so facilitation starts `pre_t` seconds before the target and grows
//! quadratically, then linearly.

use crate::math::ramp;

/// Curve value at a single time.
pub fn fac_value(t: f64, k_fac: f64, tau_fac: f64, pre_t: f64) -> f64 {
    let x = t + pre_t;
    if x >= 0.0 {
        ramp(x, tau_fac) / k_fac
    } else {
        0.0
    }
}

/// Evaluate the curve over `times`, writing into `out`.
///
/// # Panics
/// Panics if `out` is shorter than `times`.
pub fn fill_curve(times: &[f64], k_fac: f64, tau_fac: f64, pre_t: f64, out: &mut [f64]) {
    for (slot, &t) in out[..times.len()].iter_mut().zip(times) {
        *slot = fac_value(t, k_fac, tau_fac, pre_t);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fac_value_hand_computed() {
        // x = -0.1 + 0.4 = 0.3; ramp = 0.3 - 2 (1 - e^{-0.15})
        let expected = (0.3 - 2.0 * (1.0 - (-0.15_f64).exp())) / 0.06;
        let got = fac_value(-0.1, 0.06, 2.0, 0.4);
        assert!((got - expected).abs() < 1e-12);
        assert!((got - 0.356_932_5).abs() < 1e-6, "got {got}");
    }

    #[test]
    fn fac_value_zero_before_onset_and_continuous() {
        assert_eq!(fac_value(-0.5, 0.06, 2.0, 0.4), 0.0);
        assert_eq!(fac_value(-0.4, 0.06, 2.0, 0.4), 0.0);
        let just_after = fac_value(-0.4 + 1e-9, 0.06, 2.0, 0.4);
        assert!(just_after >= 0.0 && just_after < 1e-12);
    }

    #[test]
    fn fill_curve_is_monotone_for_positive_scale() {
        let times: Vec<f64> = (0..50).map(|i| -0.4 + i as f64 * 0.01).collect();
        let mut out = vec![f64::NAN; times.len()];
        fill_curve(&times, 0.06, 2.0, 0.3, &mut out);
        assert!(out.iter().all(|v| v.is_finite()));
        for w in out.windows(2) {
            assert!(w[1] >= w[0]);
        }
    }
}

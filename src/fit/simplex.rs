//! Initial simplex construction for Nelder-Mead.
//!
//! The start point is one vertex; every other vertex scales one coordinate by
//! `1 + NONZERO_DELTA` (or sets it to `ZERO_DELTA` when it is exactly zero).
//! Relative steps keep the simplex sensibly sized for parameters whose
//! magnitudes differ by orders of magnitude (`k_fac ≈ 0.06` vs `tau_fac ≈ 2`).

use tracing::debug;

use crate::error::AppError;

pub const NONZERO_DELTA: f64 = 0.05;
pub const ZERO_DELTA: f64 = 0.00025;

/// Build the `n + 1` vertices around `start`.
pub fn initial_simplex(start: &[f64]) -> Result<Vec<Vec<f64>>, AppError> {
    if start.is_empty() {
        return Err(AppError::new(2, "Initial point has no parameters."));
    }
    if start.iter().any(|v| !v.is_finite()) {
        return Err(AppError::new(2, "Initial point must be finite."));
    }

    let mut vertices = Vec::with_capacity(start.len() + 1);
    vertices.push(start.to_vec());
    for i in 0..start.len() {
        let mut vertex = start.to_vec();
        vertex[i] = if vertex[i] != 0.0 {
            (1.0 + NONZERO_DELTA) * vertex[i]
        } else {
            ZERO_DELTA
        };
        vertices.push(vertex);
    }

    debug!(?vertices, "initial simplex");
    Ok(vertices)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simplex_perturbs_one_coordinate_per_vertex() {
        let simplex = initial_simplex(&[0.06, 0.0, -2.0]).unwrap();
        assert_eq!(simplex.len(), 4);
        assert_eq!(simplex[0], vec![0.06, 0.0, -2.0]);
        assert!((simplex[1][0] - 0.063).abs() < 1e-15);
        assert_eq!(&simplex[1][1..], &[0.0, -2.0]);
        assert_eq!(simplex[2], vec![0.06, ZERO_DELTA, -2.0]);
        assert!((simplex[3][2] + 2.1).abs() < 1e-12);
    }

    #[test]
    fn simplex_rejects_bad_start() {
        assert!(initial_simplex(&[]).is_err());
        assert!(initial_simplex(&[1.0, f64::NAN]).is_err());
    }
}

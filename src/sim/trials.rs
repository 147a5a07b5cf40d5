//! Trial batch generation.
//!
//! Each simulated trial draws its own onset offset
//! `pre_t ~ Normal(pre_t_mean, pre_t_sd)` and evaluates the facilitation curve
//! over the shared time grid.
//!
//! Onsets are drawn sequentially from the caller's RNG; only the (pure) curve
//! evaluation runs in parallel, so a given RNG state always yields the same
//! batch.

use nalgebra::DMatrix;
use rand::Rng;
use rand_distr::{Distribution, Normal};
use rayon::prelude::*;

use crate::domain::FacParams;
use crate::error::AppError;
use crate::math::percentile_sorted;
use crate::models::fill_curve;
use crate::sim::TimeGrid;

/// Simulated curves: one row per trial, one column per grid time.
#[derive(Debug, Clone)]
pub struct TrialBatch {
    pub onsets: Vec<f64>,
    pub curves: DMatrix<f64>,
}

impl TrialBatch {
    pub fn n_trials(&self) -> usize {
        self.curves.nrows()
    }

    pub fn n_times(&self) -> usize {
        self.curves.ncols()
    }

    /// Curve of a single trial.
    pub fn trial(&self, i: usize) -> Vec<f64> {
        self.curves.row(i).iter().copied().collect()
    }

    /// Values of every trial at one grid index.
    pub fn column(&self, j: usize) -> Vec<f64> {
        self.curves.column(j).iter().copied().collect()
    }

    /// Mean curve across trials.
    pub fn mean_curve(&self) -> Vec<f64> {
        self.curves.column_iter().map(|c| c.mean()).collect()
    }

    /// Per-time percentile across trials (`q` in `[0, 100]`).
    pub fn percentile_curve(&self, q: f64) -> Vec<f64> {
        self.curves
            .column_iter()
            .map(|c| {
                let mut values: Vec<f64> = c.iter().copied().collect();
                values.sort_by(|a, b| a.total_cmp(b));
                percentile_sorted(&values, q).unwrap_or(f64::NAN)
            })
            .collect()
    }
}

/// Simulate `n_rep` trials for the given parameters.
pub fn simulate_trials<R: Rng + ?Sized>(
    params: &FacParams,
    grid: &TimeGrid,
    n_rep: usize,
    rng: &mut R,
) -> Result<TrialBatch, AppError> {
    if n_rep == 0 {
        return Err(AppError::new(2, "Number of simulated trials must be > 0."));
    }
    if !(params.pre_t_sd.is_finite() && params.pre_t_sd >= 0.0) {
        return Err(AppError::new(
            4,
            format!("Onset spread must be finite and >= 0, got {}.", params.pre_t_sd),
        ));
    }
    let normal = Normal::new(params.pre_t_mean, params.pre_t_sd)
        .map_err(|e| AppError::new(4, format!("Onset distribution error: {e}")))?;

    let onsets: Vec<f64> = (0..n_rep).map(|_| normal.sample(rng)).collect();

    let n_t = grid.len();
    let times = grid.times();
    let mut flat = vec![0.0; n_rep * n_t];
    flat.par_chunks_mut(n_t)
        .zip(onsets.par_iter())
        .for_each(|(row, &pre_t)| fill_curve(times, params.k_fac, params.tau_fac, pre_t, row));

    let curves = DMatrix::from_row_slice(n_rep, n_t, &flat);
    Ok(TrialBatch { onsets, curves })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{DEFAULT_GRID, DEFAULT_INITIAL};
    use crate::models::fac_value;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn same_seed_same_batch() {
        let grid = TimeGrid::new(&DEFAULT_GRID).unwrap();
        let a = simulate_trials(&DEFAULT_INITIAL, &grid, 200, &mut StdRng::seed_from_u64(7)).unwrap();
        let b = simulate_trials(&DEFAULT_INITIAL, &grid, 200, &mut StdRng::seed_from_u64(7)).unwrap();
        assert_eq!(a.onsets, b.onsets);
        assert_eq!(a.curves, b.curves);
        assert_eq!(a.n_trials(), 200);
        assert_eq!(a.n_times(), 600);
    }

    #[test]
    fn rows_match_closed_form() {
        let grid = TimeGrid::new(&DEFAULT_GRID).unwrap();
        let p = DEFAULT_INITIAL;
        let batch = simulate_trials(&p, &grid, 5, &mut StdRng::seed_from_u64(1)).unwrap();
        for i in 0..batch.n_trials() {
            let row = batch.trial(i);
            for (j, &t) in grid.times().iter().enumerate() {
                assert_eq!(row[j], fac_value(t, p.k_fac, p.tau_fac, batch.onsets[i]));
            }
        }
    }

    #[test]
    fn onsets_follow_requested_distribution() {
        let grid = TimeGrid::new(&DEFAULT_GRID).unwrap();
        let p = FacParams { pre_t_mean: 0.25, pre_t_sd: 0.05, ..DEFAULT_INITIAL };
        let batch = simulate_trials(&p, &grid, 10_000, &mut StdRng::seed_from_u64(3)).unwrap();
        let n = batch.onsets.len() as f64;
        let mean = batch.onsets.iter().sum::<f64>() / n;
        let var = batch.onsets.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (n - 1.0);
        assert!((mean - 0.25).abs() < 0.003, "mean {mean}");
        assert!((var.sqrt() - 0.05).abs() < 0.003, "sd {}", var.sqrt());
    }

    #[test]
    fn zero_spread_gives_identical_trials() {
        let grid = TimeGrid::new(&DEFAULT_GRID).unwrap();
        let p = FacParams { pre_t_sd: 0.0, ..DEFAULT_INITIAL };
        let batch = simulate_trials(&p, &grid, 3, &mut StdRng::seed_from_u64(0)).unwrap();
        assert_eq!(batch.trial(0), batch.trial(2));
        for (m, v) in batch.mean_curve().iter().zip(batch.trial(1)) {
            assert!((m - v).abs() <= 1e-12 * v.abs().max(1.0));
        }
        assert_eq!(batch.percentile_curve(90.0), batch.trial(0));
    }

    #[test]
    fn invalid_spread_is_an_error() {
        let grid = TimeGrid::new(&DEFAULT_GRID).unwrap();
        let p = FacParams { pre_t_sd: -1.0, ..DEFAULT_INITIAL };
        let err = simulate_trials(&p, &grid, 3, &mut StdRng::seed_from_u64(0)).unwrap_err();
        assert_eq!(err.exit_code(), 4);
        let p = FacParams { pre_t_sd: f64::NAN, ..DEFAULT_INITIAL };
        assert_eq!(
            simulate_trials(&p, &grid, 3, &mut StdRng::seed_from_u64(0)).unwrap_err().exit_code(),
            4
        );
        assert!(simulate_trials(&DEFAULT_INITIAL, &grid, 0, &mut StdRng::seed_from_u64(0)).is_err());
    }
}

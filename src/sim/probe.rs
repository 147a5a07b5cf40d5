//! Probe-time extraction.
//!
//! Experimental MEPs were recorded at fixed TMS times. The simulated value for
//! a trial at a probe time is the curve value at the matching grid point;
//! matching uses a relative + absolute tolerance so probe times written as
//! decimals still find grid points built by repeated addition.

use crate::error::AppError;
use crate::sim::{TimeGrid, TrialBatch};

const REL_TOL: f64 = 1e-5;
const ABS_TOL: f64 = 1e-8;

/// `|a - b| <= ABS_TOL + REL_TOL * |b|`.
pub fn is_close(a: f64, b: f64) -> bool {
    (a - b).abs() <= ABS_TOL + REL_TOL * b.abs()
}

/// First grid index whose time matches `time`.
pub fn probe_index(grid: &TimeGrid, time: f64) -> Result<usize, AppError> {
    grid.times()
        .iter()
        .position(|&t| is_close(t, time))
        .ok_or_else(|| {
            AppError::new(
                4,
                format!(
                    "Probe time {time} is not on the simulation grid [{}, {}] ({} points).",
                    grid.first(),
                    grid.last(),
                    grid.len()
                ),
            )
        })
}

/// Simulated values at each probe time, one vector (across trials) per time.
pub fn extract_probe_values(
    batch: &TrialBatch,
    grid: &TimeGrid,
    times: &[f64],
) -> Result<Vec<Vec<f64>>, AppError> {
    times
        .iter()
        .map(|&time| probe_index(grid, time).map(|j| batch.column(j)))
        .collect()
}

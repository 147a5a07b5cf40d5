//! Evenly spaced simulation time grid.

use crate::domain::GridSpec;
use crate::error::AppError;

/// Times (seconds relative to target) at which every trial curve is evaluated.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeGrid {
    times: Vec<f64>,
}

impl TimeGrid {
    /// `spec.points` samples from `spec.start` up to, but excluding, `spec.end`.
    pub fn new(spec: &GridSpec) -> Result<Self, AppError> {
        if !(spec.start.is_finite() && spec.end.is_finite() && spec.end > spec.start) {
            return Err(AppError::new(
                2,
                format!(
                    "Invalid time grid: start={}, end={} (must be finite and end>start).",
                    spec.start, spec.end
                ),
            ));
        }
        if spec.points == 0 {
            return Err(AppError::new(2, "Time grid needs at least one point."));
        }

        let step = (spec.end - spec.start) / spec.points as f64;
        let times = (0..spec.points)
            .map(|i| i as f64 * step + spec.start)
            .collect();
        Ok(Self { times })
    }

    pub fn times(&self) -> &[f64] {
        &self.times
    }

    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    pub fn first(&self) -> f64 {
        self.times[0]
    }

    pub fn last(&self) -> f64 {
        self.times[self.times.len() - 1]
    }
}

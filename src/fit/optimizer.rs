//! Derivative-free minimization (Nelder-Mead via `argmin`).
//!
//! The chi-square objective is piecewise constant in the parameters (it only
//! changes when simulated values cross a bin edge), so gradient methods are of
//! no use. Nelder-Mead only compares costs, which also lets out-of-domain
//! vertices score `+inf` without special handling.

use argmin::core::{CostFunction, Executor};
use argmin::solver::neldermead::NelderMead;
use tracing::info;

use crate::domain::{Evaluation, FacParams, OptimizerSummary};
use crate::error::AppError;
use crate::fit::objective::{Objective, ObjectiveCost};
use crate::fit::simplex::initial_simplex;

/// Stopping rules.
#[derive(Debug, Clone, Copy)]
pub struct OptimizerOptions {
    pub max_iters: u64,
    /// Stop once the standard deviation of the simplex costs drops below this.
    pub sd_tolerance: f64,
}

impl Default for OptimizerOptions {
    fn default() -> Self {
        Self {
            max_iters: 200 * FacParams::LEN as u64,
            sd_tolerance: 1e-4,
        }
    }
}

/// Raw Nelder-Mead result over a plain parameter vector.
#[derive(Debug, Clone)]
pub struct Minimum {
    pub param: Vec<f64>,
    pub cost: f64,
    pub iterations: u64,
    pub termination: String,
}

/// Outcome of fitting the facilitation model.
#[derive(Debug, Clone)]
pub struct FitOutcome {
    pub initial: FacParams,
    pub best: FacParams,
    pub summary: OptimizerSummary,
    pub history: Vec<Evaluation>,
}

/// Minimize any vector cost function from `start`.
pub fn nelder_mead<C>(cost: C, start: &[f64], opts: &OptimizerOptions) -> Result<Minimum, AppError>
where
    C: CostFunction<Param = Vec<f64>, Output = f64>,
{
    if !(opts.sd_tolerance.is_finite() && opts.sd_tolerance > 0.0) {
        return Err(AppError::new(2, "Simplex tolerance must be finite and > 0."));
    }
    let simplex = initial_simplex(start)?;
    let solver: NelderMead<Vec<f64>, f64> = NelderMead::new(simplex)
        .with_sd_tolerance(opts.sd_tolerance)
        .map_err(|e| AppError::new(4, format!("Failed to configure Nelder-Mead: {e}")))?;

    let max_iters = opts.max_iters;
    let res = Executor::new(cost, solver)
        .configure(|state| state.max_iters(max_iters))
        .run()
        .map_err(|e| AppError::new(4, format!("Optimization failed: {e}")))?;

    let state = res.state;
    let param = state
        .best_param
        .ok_or_else(|| AppError::new(4, "Optimizer finished without a best parameter."))?;

    Ok(Minimum {
        param,
        cost: state.best_cost,
        iterations: state.iter,
        termination: format!("{:?}", state.termination_status),
    })
}

/// Fit the facilitation model starting from `initial`.
pub fn fit_params(
    objective: &Objective<'_>,
    initial: &FacParams,
    opts: &OptimizerOptions,
) -> Result<FitOutcome, AppError> {
    info!(%initial, max_iters = opts.max_iters, sd_tolerance = opts.sd_tolerance, "starting Nelder-Mead");

    let minimum = nelder_mead(ObjectiveCost { objective }, &initial.to_vec(), opts)?;
    let best = FacParams::from_slice(&minimum.param).map_err(|e| AppError::new(4, e))?;

    info!(
        %best,
        cost = minimum.cost,
        iterations = minimum.iterations,
        termination = %minimum.termination,
        "optimizer finished"
    );

    Ok(FitOutcome {
        initial: *initial,
        best,
        summary: OptimizerSummary {
            iterations: minimum.iterations,
            evaluations: objective.evaluations(),
            termination: minimum.termination,
            best_cost: minimum.cost,
        },
        history: objective.history(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use argmin::core::Error;

    struct Bowl {
        center: Vec<f64>,
    }

    impl CostFunction for Bowl {
        type Param = Vec<f64>;
        type Output = f64;

        fn cost(&self, p: &Self::Param) -> Result<Self::Output, Error> {
            Ok(p.iter()
                .zip(&self.center)
                .enumerate()
                .map(|(i, (x, c))| (i as f64 + 1.0) * (x - c).powi(2))
                .sum())
        }
    }

    #[test]
    fn nelder_mead_finds_bowl_minimum() {
        let bowl = Bowl { center: vec![0.05, 0.3, 0.08, 1.5] };
        let opts = OptimizerOptions { max_iters: 2000, sd_tolerance: 1e-14 };
        let min = nelder_mead(bowl, &[0.06, 0.4, 0.1, 2.0], &opts).unwrap();
        for (x, c) in min.param.iter().zip([0.05, 0.3, 0.08, 1.5]) {
            assert!((x - c).abs() < 1e-3, "param {x} vs {c}");
        }
        assert!(min.cost < 1e-6);
        assert!(min.iterations > 0);
    }

    #[test]
    fn infinite_costs_are_avoided() {
        // Quadratic with a wall: x < 0 is infeasible.
        struct Walled;
        impl CostFunction for Walled {
            type Param = Vec<f64>;
            type Output = f64;
            fn cost(&self, p: &Self::Param) -> Result<Self::Output, Error> {
                if p[0] < 0.0 {
                    return Ok(f64::INFINITY);
                }
                Ok((p[0] - 0.2).powi(2) + (p[1] - 1.0).powi(2))
            }
        }
        let opts = OptimizerOptions { max_iters: 1000, sd_tolerance: 1e-12 };
        let min = nelder_mead(Walled, &[0.5, 0.5], &opts).unwrap();
        assert!(min.cost.is_finite());
        assert!((min.param[0] - 0.2).abs() < 1e-2);
        assert!((min.param[1] - 1.0).abs() < 1e-2);
    }

    #[test]
    fn invalid_tolerance_is_rejected() {
        let bowl = Bowl { center: vec![0.0] };
        let opts = OptimizerOptions { max_iters: 10, sd_tolerance: 0.0 };
        assert_eq!(nelder_mead(bowl, &[1.0], &opts).unwrap_err().exit_code(), 2);
    }
}

//! The chi-square error function minimized by the optimizer.
//!
//! One evaluation:
//! 1. simulate a trial batch for the candidate parameters
//! 2. read every trial's value at each cohort's probe time
//! 3. chi-square the experimental amplitudes against those values
//! 4. sum the three statistics
//!
//! Every evaluation is recorded so the search can be reported and exported
//! afterwards.

use std::cell::RefCell;

use argmin::core::{CostFunction, Error};
use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::{info, warn};

use crate::domain::{Cohort, CohortScore, Evaluation, FacParams};
use crate::error::AppError;
use crate::io::ExperimentData;
use crate::math::chi_square_binned;
use crate::sim::{TimeGrid, TrialBatch, extract_probe_values, simulate_trials};

/// Simulation and scoring settings shared by every evaluation.
#[derive(Debug, Clone)]
pub struct SimSettings {
    pub grid: TimeGrid,
    pub n_rep: usize,
    pub nbins: usize,
    pub seed: u64,
    /// Continue one RNG stream across evaluations instead of reseeding.
    pub fresh_draws: bool,
}

/// Scores parameter vectors against the experimental cohorts.
pub struct Objective<'a> {
    data: &'a ExperimentData,
    settings: SimSettings,
    rng: RefCell<StdRng>,
    history: RefCell<Vec<Evaluation>>,
}

impl<'a> Objective<'a> {
    pub fn new(data: &'a ExperimentData, settings: SimSettings) -> Self {
        let rng = StdRng::seed_from_u64(settings.seed);
        Self {
            data,
            settings,
            rng: RefCell::new(rng),
            history: RefCell::new(Vec::new()),
        }
    }

    /// Simulate a batch with this objective's RNG policy.
    fn simulate(&self, params: &FacParams) -> Result<TrialBatch, AppError> {
        if self.settings.fresh_draws {
            let mut rng = self.rng.borrow_mut();
            simulate_trials(params, &self.settings.grid, self.settings.n_rep, &mut *rng)
        } else {
            let mut rng = StdRng::seed_from_u64(self.settings.seed);
            simulate_trials(params, &self.settings.grid, self.settings.n_rep, &mut rng)
        }
    }

    /// Score one parameter vector and record it.
    ///
    /// Parameters outside the model's domain score `+inf`.
    pub fn evaluate(&self, params: &FacParams) -> Result<Evaluation, AppError> {
        self.evaluate_with_batch(params).map(|(evaluation, _)| evaluation)
    }

    /// Like `evaluate`, also returning the batch the scores were computed on.
    ///
    /// The batch is `None` for parameters outside the model's domain.
    pub fn evaluate_with_batch(
        &self,
        params: &FacParams,
    ) -> Result<(Evaluation, Option<TrialBatch>), AppError> {
        let index = self.history.borrow().len();
        info!("Trying with values: {params}");

        let (evaluation, batch) = match params.domain_error() {
            Some(reason) => {
                warn!(%params, reason, "parameters outside model domain; scoring +inf");
                let evaluation = Evaluation {
                    index,
                    params: *params,
                    scores: Vec::new(),
                    total: f64::INFINITY,
                };
                (evaluation, None)
            }
            None => {
                let batch = self.simulate(params)?;
                let scores = self.score_batch(&batch)?;
                let total: f64 = scores.iter().map(|s| s.statistic).sum();
                let total = if total.is_nan() { f64::INFINITY } else { total };
                info!("X2 summed: {total}");
                let evaluation = Evaluation {
                    index,
                    params: *params,
                    scores,
                    total,
                };
                (evaluation, Some(batch))
            }
        };

        self.history.borrow_mut().push(evaluation.clone());
        Ok((evaluation, batch))
    }

    /// Chi-square every cohort against an already simulated batch.
    pub fn score_batch(&self, batch: &TrialBatch) -> Result<Vec<CohortScore>, AppError> {
        let times: Vec<f64> = Cohort::ALL.iter().map(|c| c.probe_time()).collect();
        let predicted = extract_probe_values(batch, &self.settings.grid, &times)?;

        let mut scores = Vec::with_capacity(Cohort::ALL.len());
        for (cohort, model_values) in Cohort::ALL.iter().zip(&predicted) {
            let data = self.data.get(*cohort).ok_or_else(|| {
                AppError::new(3, format!("No experimental data loaded for {}.", cohort.label()))
            })?;
            let res = chi_square_binned(&data.values, model_values, self.settings.nbins)?;
            info!("X2_{}: {}", cohort.ms(), res.statistic);
            scores.push(CohortScore {
                cohort: *cohort,
                statistic: res.statistic,
                p_value: res.p_value,
                dof: res.dof,
                observed: res.observed,
                expected: res.expected,
            });
        }
        Ok(scores)
    }

    pub fn history(&self) -> Vec<Evaluation> {
        self.history.borrow().clone()
    }

    pub fn evaluations(&self) -> usize {
        self.history.borrow().len()
    }
}

/// Adapter exposing an `Objective` to argmin over plain parameter vectors.
pub struct ObjectiveCost<'o, 'a> {
    pub objective: &'o Objective<'a>,
}

impl CostFunction for ObjectiveCost<'_, '_> {
    type Param = Vec<f64>;
    type Output = f64;

    fn cost(&self, param: &Self::Param) -> Result<Self::Output, Error> {
        let params = FacParams::from_slice(param).map_err(Error::msg)?;
        let evaluation = self.objective.evaluate(&params)?;
        Ok(evaluation.total)
    }
}

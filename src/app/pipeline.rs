//! Shared "fit pipeline" logic used by both CLI and TUI front-ends.
//!
//! Keeping this in one place avoids duplicating the core workflow:
//! CSV ingest -> trial simulation -> chi-square scoring -> Nelder-Mead -> final batch
//!
//! The CLI and the TUI can then focus on presentation (printing vs widgets).

use chrono::Utc;

use crate::domain::{CohortPoints, CurveGrid, Evaluation, FacParams, FitConfig, FitFile};
use crate::error::AppError;
use crate::fit::{FitOutcome, Objective, OptimizerOptions, SimSettings, fit_params};
use crate::io::{ExperimentData, load_experiment};
use crate::sim::{TimeGrid, TrialBatch};

/// Central band drawn around the mean curve (percentiles).
pub const BAND_LOWER: f64 = 5.0;
pub const BAND_UPPER: f64 = 95.0;

/// All computed outputs of a single `fac fit` run.
#[derive(Debug, Clone)]
pub struct RunOutput {
    pub data: ExperimentData,
    pub outcome: FitOutcome,
    /// Scores of the best parameters (re-evaluated once after the search).
    pub final_eval: Evaluation,
    /// Trials simulated at the best parameters.
    pub batch: TrialBatch,
    pub grid: TimeGrid,
}

/// Outputs of a single `fac score` evaluation.
#[derive(Debug, Clone)]
pub struct ScoreOutput {
    pub data: ExperimentData,
    pub evaluation: Evaluation,
    pub batch: TrialBatch,
    pub grid: TimeGrid,
}

pub fn sim_settings(config: &FitConfig) -> Result<SimSettings, AppError> {
    if config.n_rep == 0 {
        return Err(AppError::new(2, "--n-rep must be > 0."));
    }
    if config.nbins == 0 {
        return Err(AppError::new(2, "--nbins must be > 0."));
    }
    Ok(SimSettings {
        grid: TimeGrid::new(&config.grid)?,
        n_rep: config.n_rep,
        nbins: config.nbins,
        seed: config.seed,
        fresh_draws: config.fresh_draws,
    })
}

/// Execute the full fitting pipeline and return the computed outputs.
pub fn run_fit(config: &FitConfig) -> Result<RunOutput, AppError> {
    // 1) Load the three cohorts.
    let data = load_experiment(config)?;
    run_fit_with_data(config, data)
}

/// Execute the fitting pipeline on already loaded data.
pub fn run_fit_with_data(config: &FitConfig, data: ExperimentData) -> Result<RunOutput, AppError> {
    let settings = sim_settings(config)?;
    let grid = settings.grid.clone();

    // 2) Minimize the summed chi-square.
    let (outcome, final_eval, batch) = {
        let objective = Objective::new(&data, settings);
        let opts = OptimizerOptions {
            max_iters: config.max_iters,
            sd_tolerance: config.sd_tolerance,
        };
        let outcome = fit_params(&objective, &config.initial, &opts)?;

        // 3) Score the winner once more; report and plot share that batch.
        let (final_eval, batch) = objective.evaluate_with_batch(&outcome.best)?;
        let batch = require_batch(&outcome.best, batch)?;
        (outcome, final_eval, batch)
    };

    Ok(RunOutput {
        data,
        outcome,
        final_eval,
        batch,
        grid,
    })
}

/// Evaluate the error function once, without optimizing.
pub fn run_score(config: &FitConfig, params: &FacParams) -> Result<ScoreOutput, AppError> {
    let data = load_experiment(config)?;
    let settings = sim_settings(config)?;
    let grid = settings.grid.clone();

    let (evaluation, batch) = {
        let objective = Objective::new(&data, settings);
        let (evaluation, batch) = objective.evaluate_with_batch(params)?;
        (evaluation, require_batch(params, batch)?)
    };

    Ok(ScoreOutput {
        data,
        evaluation,
        batch,
        grid,
    })
}

fn require_batch(params: &FacParams, batch: Option<TrialBatch>) -> Result<TrialBatch, AppError> {
    batch.ok_or_else(|| {
        let reason = params.domain_error().unwrap_or("invalid parameters");
        AppError::new(4, format!("Cannot simulate {params}: {reason}."))
    })
}

/// Mean curve and central band of a batch.
pub fn curve_grid(batch: &TrialBatch, grid: &TimeGrid) -> CurveGrid {
    CurveGrid {
        time: grid.times().to_vec(),
        mean: batch.mean_curve(),
        lower: batch.percentile_curve(BAND_LOWER),
        upper: batch.percentile_curve(BAND_UPPER),
    }
}

pub fn cohort_points(data: &ExperimentData) -> Vec<CohortPoints> {
    data.cohorts
        .iter()
        .map(|c| CohortPoints {
            cohort: c.cohort,
            probe_time: c.cohort.probe_time(),
            values: c.values.clone(),
        })
        .collect()
}

/// Build the portable fit file for a finished run.
pub fn build_fit_file(config: &FitConfig, run: &RunOutput) -> FitFile {
    FitFile {
        tool: format!("fac-curves {}", env!("CARGO_PKG_VERSION")),
        created: Utc::now(),
        seed: config.seed,
        n_rep: config.n_rep,
        nbins: config.nbins,
        initial: run.outcome.initial,
        params: run.outcome.best,
        scores: run.final_eval.scores.clone(),
        total: run.final_eval.total,
        optimizer: run.outcome.summary.clone(),
        data: cohort_points(&run.data),
        grid: curve_grid(&run.batch, &run.grid),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Cohort, DEFAULT_GRID, DEFAULT_INITIAL};
    use crate::sim::{extract_probe_values, simulate_trials};
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use std::path::Path;

    const TRUTH: FacParams = FacParams {
        k_fac: 0.05,
        pre_t_mean: 0.3,
        pre_t_sd: 0.05,
        tau_fac: 1.0,
    };

    /// Write one single-column CSV per cohort with amplitudes drawn from `TRUTH`.
    fn write_cohorts(dir: &Path, n: usize) -> [std::path::PathBuf; 3] {
        let grid = TimeGrid::new(&DEFAULT_GRID).unwrap();
        let batch = simulate_trials(&TRUTH, &grid, n, &mut StdRng::seed_from_u64(11)).unwrap();
        let times: Vec<f64> = Cohort::ALL.iter().map(|c| c.probe_time()).collect();
        let values = extract_probe_values(&batch, &grid, &times).unwrap();

        Cohort::ALL.map(|cohort| {
            let path = dir.join(cohort.default_file_name());
            let mut text = String::from("S01\n");
            for v in &values[cohort.index()] {
                text.push_str(&format!("{v}\n"));
            }
            std::fs::write(&path, text).unwrap();
            path
        })
    }

    fn config(csv_paths: [std::path::PathBuf; 3], fresh_draws: bool) -> FitConfig {
        FitConfig {
            csv_paths,
            grid: DEFAULT_GRID,
            n_rep: 300,
            seed: 5,
            fresh_draws,
            nbins: 2,
            initial: DEFAULT_INITIAL,
            max_iters: 40,
            sd_tolerance: 1e-4,
            plot: false,
            plot_width: 80,
            plot_height: 20,
            plot_curves: 5,
            export_fit: None,
            export_history: None,
            debug_bundle: false,
        }
    }

    /// Rescore a batch from scratch against the loaded data.
    fn rescore(config: &FitConfig, data: &ExperimentData, batch: &TrialBatch) -> f64 {
        let objective = Objective::new(data, sim_settings(config).unwrap());
        objective
            .score_batch(batch)
            .unwrap()
            .iter()
            .map(|s| s.statistic)
            .sum()
    }

    #[test]
    fn fit_improves_on_the_initial_guess() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(write_cohorts(dir.path(), 400), false);
        let run = run_fit(&config).unwrap();

        let history = &run.outcome.history;
        assert_eq!(history[0].params, DEFAULT_INITIAL);
        assert_eq!(run.outcome.summary.evaluations, history.len());
        assert!(run.outcome.summary.iterations <= 40);
        assert!(run.outcome.summary.best_cost <= history[0].total);

        // Common random numbers: re-scoring the winner reproduces its cost.
        assert_eq!(run.final_eval.params, run.outcome.best);
        assert_eq!(run.final_eval.total, run.outcome.summary.best_cost);
        assert_eq!(run.batch.n_trials(), 300);
        assert_eq!(rescore(&config, &run.data, &run.batch), run.final_eval.total);
    }

    #[test]
    fn fresh_draws_report_the_plotted_batch() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(write_cohorts(dir.path(), 200), true);

        let run = run_fit(&config).unwrap();
        assert_eq!(rescore(&config, &run.data, &run.batch), run.final_eval.total);

        let fit = build_fit_file(&config, &run);
        assert_eq!(fit.total, run.final_eval.total);
        assert_eq!(fit.grid.mean, run.batch.mean_curve());
        assert_eq!(fit.grid.time.len(), 600);
        assert_eq!(fit.data.len(), 3);

        let out = run_score(&config, &TRUTH).unwrap();
        assert_eq!(rescore(&config, &out.data, &out.batch), out.evaluation.total);
    }

    #[test]
    fn scoring_out_of_domain_params_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(write_cohorts(dir.path(), 50), false);
        let bad = FacParams { tau_fac: 0.0, ..TRUTH };
        assert_eq!(run_score(&config, &bad).unwrap_err().exit_code(), 4);
    }

    #[test]
    fn invalid_settings_are_input_errors() {
        let paths = Cohort::ALL.map(|c| std::path::PathBuf::from(c.default_file_name()));
        let mut cfg = config(paths, false);
        cfg.nbins = 0;
        assert_eq!(sim_settings(&cfg).unwrap_err().exit_code(), 2);
        cfg.nbins = 2;
        cfg.n_rep = 0;
        assert_eq!(sim_settings(&cfg).unwrap_err().exit_code(), 2);
    }
}

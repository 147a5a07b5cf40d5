//! Command-line parsing for the MEP facilitation curve fitter.
//!
//! The goal of this module is to keep **argument parsing** and **command dispatch**
//! separate from the simulation/fitting code.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::domain::FacParams;

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(
    name = "fac",
    version,
    about = "Fit a stochastic facilitation curve to Go-trial MEP amplitudes"
)]
pub struct Cli {
    /// Log verbosity level (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "info")]
    pub log_level: tracing::Level,

    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fit the model with Nelder-Mead, print diagnostics, and optionally plot/export.
    Fit(FitArgs),
    /// Evaluate the chi-square error function once for the given parameters.
    Score(ScoreArgs),
    /// Plot a previously exported fit JSON.
    Plot(PlotArgs),
    /// Launch the interactive plot window.
    ///
    /// Shows simulated curves and data for the initial parameters and lets you
    /// nudge them while the per-cohort chi-square updates.
    View(FitArgs),
}

/// Where to find the three cohort CSV files.
#[derive(Debug, Args, Clone)]
pub struct DataArgs {
    /// Directory holding `Go_trial_MEP_amplitudes_<ms>ms.csv` (falls back to FAC_DATA_DIR, then cwd).
    #[arg(long, value_name = "DIR")]
    pub data_dir: Option<PathBuf>,

    /// CSV for the 150 ms cohort (overrides --data-dir).
    #[arg(long = "csv-150", value_name = "CSV")]
    pub csv_150: Option<PathBuf>,

    /// CSV for the 125 ms cohort (overrides --data-dir).
    #[arg(long = "csv-125", value_name = "CSV")]
    pub csv_125: Option<PathBuf>,

    /// CSV for the 100 ms cohort (overrides --data-dir).
    #[arg(long = "csv-100", value_name = "CSV")]
    pub csv_100: Option<PathBuf>,
}

/// Simulation and scoring options shared by every command that evaluates the model.
#[derive(Debug, Args, Clone)]
pub struct SimArgs {
    #[command(flatten)]
    pub data: DataArgs,

    /// Number of simulated trials per evaluation.
    #[arg(long, default_value_t = 10_000)]
    pub n_rep: usize,

    /// Random seed for onset draws.
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Draw new onsets at every evaluation instead of reusing the seed.
    #[arg(long)]
    pub fresh_draws: bool,

    /// Number of percentile bins for the chi-square test.
    #[arg(long, default_value_t = 2)]
    pub nbins: usize,

    /// Start of the simulation time grid (seconds, inclusive).
    #[arg(long, default_value_t = -0.4, allow_hyphen_values = true)]
    pub grid_start: f64,

    /// End of the simulation time grid (seconds, exclusive).
    #[arg(long, default_value_t = 0.2, allow_hyphen_values = true)]
    pub grid_end: f64,

    /// Number of grid points.
    #[arg(long, default_value_t = 600)]
    pub grid_points: usize,

    /// Render an ASCII plot in the terminal (enabled by default).
    #[arg(long, default_value_t = true)]
    pub plot: bool,

    /// Disable the terminal plot.
    #[arg(long)]
    pub no_plot: bool,

    /// Plot width (columns).
    #[arg(long, default_value_t = 100)]
    pub width: usize,

    /// Plot height (rows).
    #[arg(long, default_value_t = 25)]
    pub height: usize,

    /// Number of simulated trial curves drawn in plots.
    #[arg(long, default_value_t = 20)]
    pub plot_curves: usize,

    /// Write a markdown debug bundle into ./debug.
    #[arg(long)]
    pub debug_bundle: bool,
}

/// Options for fitting and for the interactive view.
#[derive(Debug, Args, Clone)]
pub struct FitArgs {
    #[command(flatten)]
    pub sim: SimArgs,

    /// Initial guess `k_fac,pre_t_mean,pre_t_sd,tau_fac`.
    #[arg(
        long,
        value_name = "K,MEAN,SD,TAU",
        default_value = "0.06,0.4,0.1,2.0",
        allow_hyphen_values = true
    )]
    pub initial: FacParams,

    /// Maximum Nelder-Mead iterations.
    #[arg(long, default_value_t = 800)]
    pub max_iters: u64,

    /// Stop when the standard deviation of simplex costs falls below this.
    #[arg(long, default_value_t = 1e-4)]
    pub sd_tolerance: f64,

    /// Export the fit (params, scores, data, mean curve) to JSON.
    #[arg(long = "export-fit", value_name = "JSON")]
    pub export_fit: Option<PathBuf>,

    /// Export every objective evaluation to CSV.
    #[arg(long = "export-history", value_name = "CSV")]
    pub export_history: Option<PathBuf>,
}

/// Options for a single error-function evaluation.
#[derive(Debug, Args, Clone)]
pub struct ScoreArgs {
    #[command(flatten)]
    pub sim: SimArgs,

    /// Parameters `k_fac,pre_t_mean,pre_t_sd,tau_fac`.
    #[arg(long, value_name = "K,MEAN,SD,TAU", allow_hyphen_values = true)]
    pub params: FacParams,
}

/// Options for plotting a saved fit.
#[derive(Debug, Parser)]
pub struct PlotArgs {
    /// Fit JSON file produced by `fac fit --export-fit`.
    #[arg(long, value_name = "JSON")]
    pub fit: PathBuf,

    /// Plot width (columns).
    #[arg(long, default_value_t = 100)]
    pub width: usize,

    /// Plot height (rows).
    #[arg(long, default_value_t = 25)]
    pub height: usize,
}

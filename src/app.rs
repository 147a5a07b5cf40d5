//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - parses CLI arguments and initializes logging
//! - resolves the cohort CSV paths
//! - runs the fit / single evaluation
//! - prints reports/plots
//! - writes optional exports

use std::path::{Path, PathBuf};

use clap::Parser;
use tracing::{Level, info};

use crate::cli::{Command, DataArgs, FitArgs, PlotArgs, ScoreArgs, SimArgs};
use crate::domain::{Cohort, FacParams, FitConfig, GridSpec};
use crate::error::AppError;
use crate::fit::OptimizerOptions;

pub mod pipeline;

/// Environment variable naming the directory with the cohort CSVs.
pub const DATA_DIR_ENV: &str = "FAC_DATA_DIR";

/// Entry point for the `fac` binary.
pub fn run() -> Result<(), AppError> {
    // We want `fac` and `fac --seed 7` to behave like `fac fit ...`.
    let argv = rewrite_args(std::env::args().collect());
    let cli = crate::cli::Cli::parse_from(argv);

    // The interactive view owns the terminal; only errors may be logged there.
    let level = if matches!(cli.command, Command::View(_)) {
        Level::ERROR
    } else {
        cli.log_level
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Command::Fit(args) => handle_fit(args),
        Command::Score(args) => handle_score(args),
        Command::Plot(args) => handle_plot(args),
        Command::View(args) => handle_view(args),
    }
}

fn handle_fit(args: FitArgs) -> Result<(), AppError> {
    let config = fit_config_from_args(&args)?;
    let run = pipeline::run_fit(&config)?;

    println!(
        "{}",
        crate::report::format_fit_summary(&run.data, &run.outcome, &run.final_eval, &config)
    );

    if config.plot {
        let plot = crate::plot::render_trials_plot(
            &run.batch,
            &run.grid,
            &pipeline::cohort_points(&run.data),
            config.plot_curves,
            config.plot_width,
            config.plot_height,
        );
        println!("{plot}");
    }

    // Optional exports.
    if let Some(path) = &config.export_fit {
        crate::io::write_fit_json(path, &pipeline::build_fit_file(&config, &run))?;
        info!(path = %path.display(), "wrote fit JSON");
    }
    if let Some(path) = &config.export_history {
        crate::io::write_history_csv(path, &run.outcome.history)?;
        info!(path = %path.display(), rows = run.outcome.history.len(), "wrote evaluation history");
    }
    if config.debug_bundle {
        let path =
            crate::debug::write_debug_bundle(&run.data, &run.final_eval, &run.outcome.history, &config)?;
        println!("Debug bundle: {}", path.display());
    }

    Ok(())
}

fn handle_score(args: ScoreArgs) -> Result<(), AppError> {
    let config = config_from_sim_args(&args.sim, args.params, OptimizerOptions::default())?;
    let out = pipeline::run_score(&config, &args.params)?;

    println!(
        "{}",
        crate::report::format_score_summary(&out.data, &out.evaluation, &config)
    );

    if config.plot {
        let plot = crate::plot::render_trials_plot(
            &out.batch,
            &out.grid,
            &pipeline::cohort_points(&out.data),
            config.plot_curves,
            config.plot_width,
            config.plot_height,
        );
        println!("{plot}");
    }
    if config.debug_bundle {
        let path = crate::debug::write_debug_bundle(&out.data, &out.evaluation, &[], &config)?;
        println!("Debug bundle: {}", path.display());
    }

    Ok(())
}

fn handle_plot(args: PlotArgs) -> Result<(), AppError> {
    let fit = crate::io::read_fit_json(&args.fit)?;
    let plot = crate::plot::render_fit_file_plot(&fit, args.width, args.height);
    println!("{plot}");
    Ok(())
}

fn handle_view(args: FitArgs) -> Result<(), AppError> {
    let config = fit_config_from_args(&args)?;
    let data = crate::io::load_experiment(&config)?;
    crate::tui::run(config, data)
}

pub fn fit_config_from_args(args: &FitArgs) -> Result<FitConfig, AppError> {
    let mut config = config_from_sim_args(
        &args.sim,
        args.initial,
        OptimizerOptions {
            max_iters: args.max_iters,
            sd_tolerance: args.sd_tolerance,
        },
    )?;
    config.export_fit = args.export_fit.clone();
    config.export_history = args.export_history.clone();
    Ok(config)
}

fn config_from_sim_args(
    sim: &SimArgs,
    initial: FacParams,
    opts: OptimizerOptions,
) -> Result<FitConfig, AppError> {
    if sim.width == 0 || sim.height == 0 {
        return Err(AppError::new(2, "Plot width and height must be > 0."));
    }
    Ok(FitConfig {
        csv_paths: resolve_csv_paths(&sim.data, env_data_dir().as_deref()),
        grid: GridSpec {
            start: sim.grid_start,
            end: sim.grid_end,
            points: sim.grid_points,
        },
        n_rep: sim.n_rep,
        seed: sim.seed,
        fresh_draws: sim.fresh_draws,
        nbins: sim.nbins,
        initial,
        max_iters: opts.max_iters,
        sd_tolerance: opts.sd_tolerance,
        plot: sim.plot && !sim.no_plot,
        plot_width: sim.width,
        plot_height: sim.height,
        plot_curves: sim.plot_curves,
        export_fit: None,
        export_history: None,
        debug_bundle: sim.debug_bundle,
    })
}

/// `FAC_DATA_DIR` from the environment or `.env`.
fn env_data_dir() -> Option<PathBuf> {
    dotenvy::dotenv().ok();
    std::env::var_os(DATA_DIR_ENV)
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
}

/// Per-cohort flag, else `<data-dir>/<default name>` with data-dir from the
/// flag, the environment, or the current directory.
pub fn resolve_csv_paths(data: &DataArgs, env_dir: Option<&Path>) -> [PathBuf; 3] {
    let dir = data
        .data_dir
        .as_deref()
        .or(env_dir)
        .unwrap_or_else(|| Path::new("."));

    Cohort::ALL.map(|cohort| {
        let explicit = match cohort {
            Cohort::Ms150 => &data.csv_150,
            Cohort::Ms125 => &data.csv_125,
            Cohort::Ms100 => &data.csv_100,
        };
        explicit
            .clone()
            .unwrap_or_else(|| dir.join(cohort.default_file_name()))
    })
}

/// Rewrite argv so `fac` defaults to `fac fit`.
///
/// Rules:
/// - `fac`                      -> `fac fit`
/// - `fac --seed 7 ...`         -> `fac fit --seed 7 ...`
/// - `fac --help/--version/-h`  -> unchanged (show top-level help/version)
/// - `fac --log-level debug`    -> `fac --log-level debug fit`
fn rewrite_args(mut argv: Vec<String>) -> Vec<String> {
    // Leading global flags stay in front of the subcommand.
    let mut pos = 1;
    while argv.get(pos).map(String::as_str) == Some("--log-level") {
        pos += 2;
    }
    if argv.get(pos).is_some_and(|a| a.starts_with("--log-level=")) {
        pos += 1;
    }
    let pos = pos.min(argv.len());

    let Some(arg) = argv.get(pos).cloned() else {
        argv.push("fit".to_string());
        return argv;
    };

    let is_top_level_help_or_version = matches!(
        arg.as_str(),
        "-h" | "--help" | "-V" | "--version" | "help"
    );
    if is_top_level_help_or_version {
        return argv;
    }

    let is_subcommand = matches!(arg.as_str(), "fit" | "score" | "plot" | "view");
    if is_subcommand {
        return argv;
    }

    // If the token is a flag, treat it as "fit flags".
    if arg.starts_with('-') {
        argv.insert(pos, "fit".to_string());
        return argv;
    }

    // Otherwise, leave as-is.
    argv
}

#[cfg(test)]
mod tests {
    use super::*;

    fn argv(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn bare_invocation_becomes_fit() {
        assert_eq!(rewrite_args(argv(&["fac"])), argv(&["fac", "fit"]));
        assert_eq!(
            rewrite_args(argv(&["fac", "--seed", "7"])),
            argv(&["fac", "fit", "--seed", "7"])
        );
    }

    #[test]
    fn global_log_level_stays_in_front() {
        assert_eq!(
            rewrite_args(argv(&["fac", "--log-level", "debug"])),
            argv(&["fac", "--log-level", "debug", "fit"])
        );
        assert_eq!(
            rewrite_args(argv(&["fac", "--log-level=warn", "--n-rep", "10"])),
            argv(&["fac", "--log-level=warn", "fit", "--n-rep", "10"])
        );
    }

    #[test]
    fn explicit_subcommands_and_help_are_untouched() {
        for args in [&["fac", "score", "--params", "1,2,3,4"][..], &["fac", "--help"][..], &["fac", "view"][..]] {
            assert_eq!(rewrite_args(argv(args)), argv(args));
        }
    }

    #[test]
    fn csv_paths_prefer_flags_then_dirs() {
        let data = DataArgs {
            data_dir: None,
            csv_150: Some(PathBuf::from("x/150.csv")),
            csv_125: None,
            csv_100: None,
        };
        let paths = resolve_csv_paths(&data, Some(Path::new("/env")));
        assert_eq!(paths[0], PathBuf::from("x/150.csv"));
        assert_eq!(paths[1], Path::new("/env").join("Go_trial_MEP_amplitudes_125ms.csv"));

        let data = DataArgs { data_dir: Some(PathBuf::from("/flag")), ..data };
        let paths = resolve_csv_paths(&data, Some(Path::new("/env")));
        assert_eq!(paths[2], Path::new("/flag").join("Go_trial_MEP_amplitudes_100ms.csv"));

        let data = DataArgs { data_dir: None, ..data };
        let paths = resolve_csv_paths(&data, None);
        assert_eq!(paths[2], Path::new(".").join("Go_trial_MEP_amplitudes_100ms.csv"));
    }
}

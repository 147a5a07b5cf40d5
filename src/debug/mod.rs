//! Debug bundle writer for inspecting cohort inputs, binning and the search.

use std::fs::{File, create_dir_all};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Local;

use crate::domain::{Cohort, Evaluation, FitConfig};
use crate::error::AppError;
use crate::io::ExperimentData;
use crate::math::percentile_edges;
use crate::sim::{TimeGrid, probe_index};

/// Write a markdown bundle into `./debug` and return its path.
pub fn write_debug_bundle(
    data: &ExperimentData,
    eval: &Evaluation,
    history: &[Evaluation],
    config: &FitConfig,
) -> Result<PathBuf, AppError> {
    write_debug_bundle_in(Path::new("debug"), data, eval, history, config)
}

/// Same as `write_debug_bundle`, into an explicit directory.
pub fn write_debug_bundle_in(
    dir: &Path,
    data: &ExperimentData,
    eval: &Evaluation,
    history: &[Evaluation],
    config: &FitConfig,
) -> Result<PathBuf, AppError> {
    create_dir_all(dir).map_err(|e| AppError::new(4, format!("Failed to create debug dir: {e}")))?;

    let ts = Local::now().format("%Y%m%d_%H%M%S");
    let path = dir.join(format!("fac_debug_seed{}_{}.md", config.seed, ts));

    let mut file = File::create(&path)
        .map_err(|e| AppError::new(4, format!("Failed to create debug file: {e}")))?;
    write_bundle(&mut file, data, eval, history, config)
        .map_err(|e| AppError::new(4, format!("Failed to write debug: {e}")))?;

    Ok(path)
}

fn write_bundle(
    out: &mut impl Write,
    data: &ExperimentData,
    eval: &Evaluation,
    history: &[Evaluation],
    config: &FitConfig,
) -> std::io::Result<()> {
    writeln!(out, "# fac debug bundle")?;
    writeln!(out, "- generated: {}", Local::now().to_rfc3339())?;
    writeln!(out, "- seed: {} ({} draws)", config.seed, if config.fresh_draws { "fresh" } else { "common" })?;
    writeln!(out, "- n_rep: {}", config.n_rep)?;
    writeln!(out, "- nbins: {}", config.nbins)?;
    writeln!(
        out,
        "- grid: start={}, end={}, points={}",
        config.grid.start, config.grid.end, config.grid.points
    )?;
    writeln!(out, "- params: {}", eval.params)?;

    writeln!(out, "\n## Cohorts")?;
    writeln!(out, "| cohort | file | cells | dropped | n | min | median | mean | max |")?;
    writeln!(out, "| - | - | - | - | - | - | - | - | - |")?;
    for c in &data.cohorts {
        writeln!(
            out,
            "| {} | {} | {} | {} | {} | {:.4} | {:.4} | {:.4} | {:.4} |",
            c.cohort.label(),
            c.path.display(),
            c.cells_read,
            c.cells_dropped,
            c.stats.n,
            c.stats.min,
            c.stats.median,
            c.stats.mean,
            c.stats.max
        )?;
    }
    for c in &data.cohorts {
        for err in &c.row_errors {
            writeln!(out, "- {} line {}: {}", c.cohort.label(), err.line, err.message)?;
        }
    }

    writeln!(out, "\n## Probe times")?;
    writeln!(out, "| cohort | probe_time | grid index | grid time |")?;
    writeln!(out, "| - | - | - | - |")?;
    match TimeGrid::new(&config.grid) {
        Ok(grid) => {
            for cohort in Cohort::ALL {
                match probe_index(&grid, cohort.probe_time()) {
                    Ok(idx) => writeln!(
                        out,
                        "| {} | {} | {} | {:.17} |",
                        cohort.label(),
                        cohort.probe_time(),
                        idx,
                        grid.times()[idx]
                    )?,
                    Err(e) => writeln!(out, "| {} | {} | - | {} |", cohort.label(), cohort.probe_time(), e)?,
                }
            }
        }
        Err(e) => writeln!(out, "- invalid grid: {e}")?,
    }

    writeln!(out, "\n## Chi-square")?;
    writeln!(out, "| cohort | data bin edges | observed | expected | X2 | dof | p |")?;
    writeln!(out, "| - | - | - | - | - | - | - |")?;
    for s in &eval.scores {
        let edges = data
            .get(s.cohort)
            .and_then(|c| percentile_edges(&c.values, config.nbins))
            .unwrap_or_default();
        writeln!(
            out,
            "| {} | {} | {} | {} | {} | {} | {} |",
            s.cohort.label(),
            fmt_vec(&edges),
            fmt_vec(&s.observed),
            fmt_vec(&s.expected),
            s.statistic,
            s.dof,
            s.p_value
        )?;
    }
    writeln!(out, "\nX2 summed: {}", eval.total)?;

    if !history.is_empty() {
        writeln!(out, "\n## Evaluations")?;
        writeln!(out, "| # | k_fac | pre_t_mean | pre_t_sd | tau_fac | X2 summed |")?;
        writeln!(out, "| - | - | - | - | - | - |")?;
        for e in history {
            writeln!(
                out,
                "| {} | {:.6} | {:.6} | {:.6} | {:.6} | {} |",
                e.index, e.params.k_fac, e.params.pre_t_mean, e.params.pre_t_sd, e.params.tau_fac, e.total
            )?;
        }
    }

    Ok(())
}

fn fmt_vec(values: &[f64]) -> String {
    let parts: Vec<String> = values.iter().map(|v| format!("{v:.6}")).collect();
    format!("[{}]", parts.join(", "))
}

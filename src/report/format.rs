//! Formatted terminal output for fits and single evaluations.
//!
//! We keep formatting code in one place so:
//! - the math/fitting code stays clean and testable
//! - output changes are localized (important for snapshot tests)

use crate::domain::{Evaluation, FacParams, FitConfig};
use crate::fit::FitOutcome;
use crate::io::ExperimentData;

/// Format the per-cohort dataset table.
pub fn format_data_summary(data: &ExperimentData) -> String {
    let mut out = String::new();
    out.push_str("Data:\n");
    out.push_str(
        format!(
            "{:<8} {:>7} {:>9} {:>10} {:>10} {:>10} {:>10}  {}\n",
            "cohort", "n", "dropped", "min", "median", "mean", "max", "file"
        )
        .trim_end(),
    );
    out.push('\n');
    for c in &data.cohorts {
        out.push_str(
            format!(
                "{:<8} {:>7} {:>9} {:>10.4} {:>10.4} {:>10.4} {:>10.4}  {}\n",
                c.cohort.label(),
                c.stats.n,
                c.cells_dropped,
                c.stats.min,
                c.stats.median,
                c.stats.mean,
                c.stats.max,
                c.path.display()
            )
            .trim_end(),
        );
        out.push('\n');
        if !c.row_errors.is_empty() {
            out.push_str(&format!("         ({} unreadable rows)\n", c.row_errors.len()));
        }
    }
    out
}

/// Format per-cohort chi-square results and the summed statistic.
pub fn format_scores(eval: &Evaluation) -> String {
    let mut out = String::new();
    if eval.scores.is_empty() {
        out.push_str(&format!(
            "Parameters outside model domain: {} -> X2 summed = {}\n",
            eval.params,
            fmt_stat(eval.total)
        ));
        return out;
    }

    out.push_str(format!("{:<8} {:>14} {:>5} {:>12}  {}\n", "cohort", "X2", "dof", "p", "data|model").trim_end());
    out.push('\n');
    for s in &eval.scores {
        out.push_str(
            format!(
                "{:<8} {:>14} {:>5} {:>12}  {}|{}\n",
                s.cohort.label(),
                fmt_stat(s.statistic),
                s.dof,
                fmt_p(s.p_value),
                fmt_vec(&s.observed),
                fmt_vec(&s.expected)
            )
            .trim_end(),
        );
        out.push('\n');
    }
    out.push_str(&format!("X2 summed: {}\n", fmt_stat(eval.total)));
    out
}

/// Format the full run summary (data + search + fitted parameters + scores).
pub fn format_fit_summary(
    data: &ExperimentData,
    outcome: &FitOutcome,
    final_eval: &Evaluation,
    config: &FitConfig,
) -> String {
    let mut out = String::new();

    out.push_str("=== fac - MEP facilitation curve fit ===\n");
    out.push_str(&format!(
        "Simulation: n_rep={} | seed={} | draws={} | nbins={}\n",
        config.n_rep,
        config.seed,
        if config.fresh_draws { "fresh" } else { "common" },
        config.nbins
    ));
    out.push_str(&format!(
        "Grid: t=[{:.3}, {:.3}) s | points={}\n\n",
        config.grid.start, config.grid.end, config.grid.points
    ));

    out.push_str(&format_data_summary(data));
    out.push('\n');

    let s = &outcome.summary;
    out.push_str("Optimizer (Nelder-Mead):\n");
    out.push_str(&format!(
        "- iterations: {} | evaluations: {} | best X2: {}\n",
        s.iterations,
        s.evaluations,
        fmt_stat(s.best_cost)
    ));
    out.push_str(&format!("- termination: {}\n\n", s.termination));

    out.push_str(&format_params_table(&outcome.initial, &outcome.best));
    out.push('\n');
    out.push_str(&format_scores(final_eval));

    out
}

/// Format a single `fac score` evaluation.
pub fn format_score_summary(data: &ExperimentData, eval: &Evaluation, config: &FitConfig) -> String {
    let mut out = String::new();
    out.push_str("=== fac - error function evaluation ===\n");
    out.push_str(&format!(
        "Simulation: n_rep={} | seed={} | nbins={}\n\n",
        config.n_rep, config.seed, config.nbins
    ));
    out.push_str(&format_data_summary(data));
    out.push('\n');
    out.push_str(&format!("Parameters: {}\n", eval.params));
    out.push_str(&format_scores(eval));
    out
}

fn format_params_table(initial: &FacParams, best: &FacParams) -> String {
    let mut out = String::new();
    out.push_str(format!("{:<12} {:>12} {:>12}\n", "param", "initial", "fitted").trim_end());
    out.push('\n');
    for ((name, a), b) in FacParams::NAMES.iter().zip(initial.to_vec()).zip(best.to_vec()) {
        out.push_str(&format!("{name:<12} {a:>12.6} {b:>12.6}\n"));
    }
    out
}

fn fmt_stat(v: f64) -> String {
    if v.is_finite() { format!("{v:.6}") } else { format!("{v}") }
}

fn fmt_p(v: f64) -> String {
    if v.is_nan() { "-".to_string() } else { format!("{v:.4e}") }
}

fn fmt_vec(v: &[f64]) -> String {
    let parts: Vec<String> = v.iter().map(|x| format!("{x:.3}")).collect();
    format!("[{}]", parts.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Cohort, CohortScore, DEFAULT_INITIAL};

    fn eval_with(total: f64, scores: Vec<CohortScore>) -> Evaluation {
        Evaluation {
            index: 0,
            params: DEFAULT_INITIAL,
            scores,
            total,
        }
    }

    #[test]
    fn scores_table_lists_every_cohort() {
        let scores = Cohort::ALL
            .iter()
            .map(|&cohort| CohortScore {
                cohort,
                statistic: 0.5,
                p_value: 0.479500,
                dof: 1,
                observed: vec![0.5, 0.5],
                expected: vec![0.25, 0.75],
            })
            .collect();
        let txt = format_scores(&eval_with(1.5, scores));
        assert!(txt.contains("150ms"));
        assert!(txt.contains("125ms"));
        assert!(txt.contains("100ms"));
        assert!(txt.contains("[0.500, 0.500]|[0.250, 0.750]"));
        assert!(txt.ends_with("X2 summed: 1.500000\n"));
    }

    #[test]
    fn out_of_domain_evaluation_is_reported() {
        let txt = format_scores(&eval_with(f64::INFINITY, Vec::new()));
        assert!(txt.starts_with("Parameters outside model domain"));
        assert!(txt.contains("inf"));
    }

    #[test]
    fn params_table_has_one_row_per_parameter() {
        let best = FacParams { k_fac: 0.05, ..DEFAULT_INITIAL };
        let txt = format_params_table(&DEFAULT_INITIAL, &best);
        assert_eq!(txt.lines().count(), 1 + FacParams::LEN);
        assert!(txt.contains("k_fac            0.060000     0.050000"));
    }
}

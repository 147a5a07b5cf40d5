//! Export the optimizer's evaluation history to CSV.
//!
//! One row per objective evaluation, easy to load in a spreadsheet to inspect
//! how the search moved through parameter space.

use std::path::Path;

use crate::domain::{Cohort, Evaluation, FacParams};
use crate::error::AppError;

/// Write the evaluation history to a CSV file.
pub fn write_history_csv(path: &Path, history: &[Evaluation]) -> Result<(), AppError> {
    let mut writer = csv::Writer::from_path(path)
        .map_err(|e| AppError::new(2, format!("Failed to create history CSV '{}': {e}", path.display())))?;

    let mut header: Vec<String> = vec!["evaluation".to_string()];
    header.extend(FacParams::NAMES.iter().map(|s| s.to_string()));
    header.extend(Cohort::ALL.iter().map(|c| format!("x2_{}", c.ms())));
    header.push("x2_summed".to_string());
    writer
        .write_record(&header)
        .map_err(|e| AppError::new(2, format!("Failed to write history CSV header: {e}")))?;

    for eval in history {
        let mut row = vec![eval.index.to_string()];
        row.extend(eval.params.to_vec().iter().map(|v| format!("{v:.10}")));
        for cohort in Cohort::ALL {
            row.push(
                eval.score(cohort)
                    .map(|s| format!("{:.10}", s.statistic))
                    .unwrap_or_default(),
            );
        }
        row.push(format!("{:.10}", eval.total));
        writer
            .write_record(&row)
            .map_err(|e| AppError::new(2, format!("Failed to write history CSV row: {e}")))?;
    }

    writer
        .flush()
        .map_err(|e| AppError::new(2, format!("Failed to flush history CSV: {e}")))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{CohortScore, DEFAULT_INITIAL};

    #[test]
    fn history_csv_has_one_row_per_evaluation() {
        let scored = Evaluation {
            index: 0,
            params: DEFAULT_INITIAL,
            scores: Cohort::ALL
                .iter()
                .map(|&cohort| CohortScore {
                    cohort,
                    statistic: 0.5,
                    p_value: 0.48,
                    dof: 1,
                    observed: vec![0.5, 0.5],
                    expected: vec![0.4, 0.6],
                })
                .collect(),
            total: 1.5,
        };
        let rejected = Evaluation {
            index: 1,
            params: FacParams { pre_t_sd: -0.1, ..DEFAULT_INITIAL },
            scores: Vec::new(),
            total: f64::INFINITY,
        };

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.csv");
        write_history_csv(&path, &[scored, rejected]).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(
            lines[0],
            "evaluation,k_fac,pre_t_mean,pre_t_sd,tau_fac,x2_150,x2_125,x2_100,x2_summed"
        );
        assert!(lines[1].starts_with("0,0.0600000000,"));
        assert!(lines[2].ends_with(",,,,inf"));
    }
}

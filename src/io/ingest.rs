//! CSV ingest for experimental MEP amplitudes.
//!
//! Each cohort file has one header row (subject codes) followed by amplitude
//! rows. Every cell of every column is a sample; the file is flattened in
//! row-major order. Blank, `nan` and non-numeric cells are treated as missing
//! and dropped, so subjects with different trial counts can share one file.
//! Infinite amplitudes are kept.
//!
//! Design goals:
//! - **Row-level validation** (skip bad rows/cells, but report what happened)
//! - **Deterministic behavior** (no hidden randomness)
//! - **Separation of concerns**: no scoring logic here

use std::fs::File;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::domain::{Cohort, DatasetStats, FitConfig};
use crate::error::AppError;
use crate::math::describe;

/// A row-level error encountered during ingest.
#[derive(Debug, Clone)]
pub struct RowError {
    pub line: usize,
    pub message: String,
}

/// Usable amplitudes of one cohort plus ingest bookkeeping.
#[derive(Debug, Clone)]
pub struct CohortData {
    pub cohort: Cohort,
    pub path: PathBuf,
    pub values: Vec<f64>,
    pub stats: DatasetStats,
    pub cells_read: usize,
    pub cells_dropped: usize,
    pub row_errors: Vec<RowError>,
}

/// All three cohorts, ordered as `Cohort::ALL`.
#[derive(Debug, Clone)]
pub struct ExperimentData {
    pub cohorts: Vec<CohortData>,
}

impl ExperimentData {
    pub fn get(&self, cohort: Cohort) -> Option<&CohortData> {
        self.cohorts.iter().find(|c| c.cohort == cohort)
    }
}

/// Load the three cohort files named by the config.
pub fn load_experiment(config: &FitConfig) -> Result<ExperimentData, AppError> {
    let cohorts = Cohort::ALL
        .iter()
        .map(|&cohort| load_exp_data(config.csv_path(cohort), cohort))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(ExperimentData { cohorts })
}

/// Load one cohort file.
pub fn load_exp_data(path: &Path, cohort: Cohort) -> Result<CohortData, AppError> {
    let file = File::open(path).map_err(|e| {
        AppError::new(
            2,
            format!("Failed to open {} CSV '{}': {e}", cohort.label(), path.display()),
        )
    })?;

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(file);

    let mut values = Vec::new();
    let mut row_errors = Vec::new();
    let mut cells_read = 0usize;
    let mut cells_dropped = 0usize;

    for (idx, result) in reader.records().enumerate() {
        // +2: records() starts after the header, and lines are 1-based.
        let line = idx + 2;
        let record = match result {
            Ok(r) => r,
            Err(e) => {
                row_errors.push(RowError {
                    line,
                    message: format!("CSV parse error: {e}"),
                });
                continue;
            }
        };

        for field in record.iter() {
            cells_read += 1;
            match parse_amplitude(field) {
                Some(v) => values.push(v),
                None => cells_dropped += 1,
            }
        }
    }

    for err in &row_errors {
        warn!(cohort = cohort.label(), line = err.line, "{}", err.message);
    }

    let stats = describe(&values).ok_or_else(|| {
        AppError::new(
            3,
            format!(
                "No usable amplitudes in {} CSV '{}'.",
                cohort.label(),
                path.display()
            ),
        )
    })?;

    debug!(
        cohort = cohort.label(),
        path = %path.display(),
        cells_read,
        cells_dropped,
        n = stats.n,
        "loaded cohort"
    );

    Ok(CohortData {
        cohort,
        path: path.to_path_buf(),
        values,
        stats,
        cells_read,
        cells_dropped,
        row_errors,
    })
}

fn parse_amplitude(field: &str) -> Option<f64> {
    if field.is_empty() {
        return None;
    }
    field.parse::<f64>().ok().filter(|v| !v.is_nan())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_csv(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn flattens_columns_and_skips_header() {
        let file = write_csv("S01,S02,S03\n0.5,1.25,2\n0.75,,3.5\n,1.0,\n");
        let data = load_exp_data(file.path(), Cohort::Ms150).unwrap();
        assert_eq!(data.values, vec![0.5, 1.25, 2.0, 0.75, 3.5, 1.0]);
        assert_eq!(data.cells_read, 9);
        assert_eq!(data.cells_dropped, 3);
        assert_eq!(data.stats.n, 6);
        assert_eq!(data.stats.max, 3.5);
    }

    #[test]
    fn non_numeric_cells_are_dropped() {
        let file = write_csv("S01,S02\nnan,1.5\nabc, 2.5 \n");
        let data = load_exp_data(file.path(), Cohort::Ms100).unwrap();
        assert_eq!(data.values, vec![1.5, 2.5]);
        assert_eq!(data.cells_dropped, 2);
    }

    #[test]
    fn infinite_cells_are_kept() {
        let file = write_csv("S01,S02\ninf,1.5\n-inf,NaN\n");
        let data = load_exp_data(file.path(), Cohort::Ms125).unwrap();
        assert_eq!(data.values, vec![f64::INFINITY, 1.5, f64::NEG_INFINITY]);
        assert_eq!(data.cells_dropped, 1);
        assert_eq!(data.stats.n, 3);
    }

    #[test]
    fn empty_cohort_is_a_data_error() {
        let file = write_csv("S01,S02\n,\n");
        let err = load_exp_data(file.path(), Cohort::Ms125).unwrap_err();
        assert_eq!(err.exit_code(), 3);
    }

    #[test]
    fn missing_file_is_an_input_error() {
        let err = load_exp_data(Path::new("/nonexistent/fac/none.csv"), Cohort::Ms125).unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }
}

//! Shared domain types.
//!
//! These types are intentionally kept lightweight and serializable so they can be:
//!
//! - used in-memory during simulation and scoring
//! - exported to JSON/CSV
//! - reloaded later for plotting

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Experimental cohort, identified by the TMS probe time before target onset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Cohort {
    Ms150,
    Ms125,
    Ms100,
}

impl Cohort {
    pub const ALL: [Cohort; 3] = [Cohort::Ms150, Cohort::Ms125, Cohort::Ms100];

    /// Milliseconds before target presentation.
    pub fn ms(self) -> u32 {
        match self {
            Cohort::Ms150 => 150,
            Cohort::Ms125 => 125,
            Cohort::Ms100 => 100,
        }
    }

    /// Probe time in seconds relative to target (negative = before).
    pub fn probe_time(self) -> f64 {
        match self {
            Cohort::Ms150 => -0.150,
            Cohort::Ms125 => -0.125,
            Cohort::Ms100 => -0.100,
        }
    }

    pub fn index(self) -> usize {
        match self {
            Cohort::Ms150 => 0,
            Cohort::Ms125 => 1,
            Cohort::Ms100 => 2,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Cohort::Ms150 => "150ms",
            Cohort::Ms125 => "125ms",
            Cohort::Ms100 => "100ms",
        }
    }

    /// File name used when resolving a cohort CSV inside a data directory.
    pub fn default_file_name(self) -> String {
        format!("Go_trial_MEP_amplitudes_{}ms.csv", self.ms())
    }
}

/// Facilitation model parameters, in optimizer order.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FacParams {
    /// Scale of the facilitation curve (divides the ramp).
    pub k_fac: f64,
    /// Mean onset offset before target (seconds).
    pub pre_t_mean: f64,
    /// Standard deviation of the onset offset (seconds).
    pub pre_t_sd: f64,
    /// Curvature time constant of the ramp.
    pub tau_fac: f64,
}

/// Starting point used when no `--initial` is given.
pub const DEFAULT_INITIAL: FacParams = FacParams {
    k_fac: 0.06,
    pre_t_mean: 0.4,
    pre_t_sd: 0.1,
    tau_fac: 2.0,
};

impl FacParams {
    pub const LEN: usize = 4;
    pub const NAMES: [&'static str; 4] = ["k_fac", "pre_t_mean", "pre_t_sd", "tau_fac"];

    pub fn from_slice(values: &[f64]) -> Result<Self, String> {
        match values {
            [k_fac, pre_t_mean, pre_t_sd, tau_fac] => Ok(Self {
                k_fac: *k_fac,
                pre_t_mean: *pre_t_mean,
                pre_t_sd: *pre_t_sd,
                tau_fac: *tau_fac,
            }),
            _ => Err(format!(
                "expected {} parameters (k_fac,pre_t_mean,pre_t_sd,tau_fac), got {}",
                Self::LEN,
                values.len()
            )),
        }
    }

    pub fn to_vec(&self) -> Vec<f64> {
        vec![self.k_fac, self.pre_t_mean, self.pre_t_sd, self.tau_fac]
    }

    /// Reason the parameters fall outside the model's domain, if any.
    pub fn domain_error(&self) -> Option<&'static str> {
        if self.to_vec().iter().any(|v| !v.is_finite()) {
            return Some("non-finite parameter");
        }
        if self.k_fac == 0.0 {
            return Some("k_fac must be non-zero");
        }
        if self.pre_t_sd < 0.0 {
            return Some("pre_t_sd must be >= 0");
        }
        if self.tau_fac <= 0.0 {
            return Some("tau_fac must be > 0");
        }
        None
    }
}

impl fmt::Display for FacParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[k_fac={:.6}, pre_t_mean={:.6}, pre_t_sd={:.6}, tau_fac={:.6}]",
            self.k_fac, self.pre_t_mean, self.pre_t_sd, self.tau_fac
        )
    }
}

/// Parses `k,mean,sd,tau` (comma or whitespace separated).
impl FromStr for FacParams {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let values = s
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|part| !part.is_empty())
            .map(|part| {
                part.parse::<f64>()
                    .map_err(|e| format!("invalid number '{part}': {e}"))
            })
            .collect::<Result<Vec<f64>, String>>()?;
        Self::from_slice(&values)
    }
}

/// Simulation time grid: `points` samples from `start` (inclusive) to `end` (exclusive).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridSpec {
    pub start: f64,
    pub end: f64,
    pub points: usize,
}

pub const DEFAULT_GRID: GridSpec = GridSpec {
    start: -0.4,
    end: 0.2,
    points: 600,
};

/// Summary stats about one cohort's usable amplitudes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetStats {
    pub n: usize,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub median: f64,
}

/// Chi-square comparison of one cohort against its simulated probe values.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CohortScore {
    pub cohort: Cohort,
    #[serde(with = "nullable_f64")]
    pub statistic: f64,
    #[serde(with = "nullable_f64")]
    pub p_value: f64,
    pub dof: usize,
    /// Observed (data) proportions per bin.
    pub observed: Vec<f64>,
    /// Expected (model) proportions per bin.
    pub expected: Vec<f64>,
}

/// One objective evaluation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Evaluation {
    pub index: usize,
    pub params: FacParams,
    /// Empty when the parameters were outside the model's domain.
    pub scores: Vec<CohortScore>,
    #[serde(with = "nullable_f64")]
    pub total: f64,
}

impl Evaluation {
    pub fn score(&self, cohort: Cohort) -> Option<&CohortScore> {
        self.scores.iter().find(|s| s.cohort == cohort)
    }
}

/// A full run's configuration as understood by the pipeline.
///
/// This is derived from CLI flags (plus environment and defaults).
#[derive(Debug, Clone)]
pub struct FitConfig {
    /// CSV path per cohort, indexed by `Cohort::index`.
    pub csv_paths: [PathBuf; 3],

    pub grid: GridSpec,
    pub n_rep: usize,
    pub seed: u64,
    /// Draw new onsets at every evaluation instead of reusing the seed.
    pub fresh_draws: bool,
    pub nbins: usize,

    pub initial: FacParams,
    pub max_iters: u64,
    pub sd_tolerance: f64,

    pub plot: bool,
    pub plot_width: usize,
    pub plot_height: usize,
    /// Number of simulated curves drawn in plots.
    pub plot_curves: usize,

    pub export_fit: Option<PathBuf>,
    pub export_history: Option<PathBuf>,
    pub debug_bundle: bool,
}

impl FitConfig {
    pub fn csv_path(&self, cohort: Cohort) -> &PathBuf {
        &self.csv_paths[cohort.index()]
    }
}

/// Optimizer outcome summary (serializable part).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizerSummary {
    pub iterations: u64,
    pub evaluations: usize,
    pub termination: String,
    #[serde(with = "nullable_f64")]
    pub best_cost: f64,
}

/// Experimental values of one cohort, for re-plotting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CohortPoints {
    pub cohort: Cohort,
    pub probe_time: f64,
    pub values: Vec<f64>,
}

/// Mean simulated curve and a central band over the time grid.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurveGrid {
    pub time: Vec<f64>,
    pub mean: Vec<f64>,
    pub lower: Vec<f64>,
    pub upper: Vec<f64>,
}

/// A saved fit file (JSON).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FitFile {
    pub tool: String,
    pub created: DateTime<Utc>,
    pub seed: u64,
    pub n_rep: usize,
    pub nbins: usize,
    pub initial: FacParams,
    pub params: FacParams,
    pub scores: Vec<CohortScore>,
    #[serde(with = "nullable_f64")]
    pub total: f64,
    pub optimizer: OptimizerSummary,
    pub data: Vec<CohortPoints>,
    pub grid: CurveGrid,
}

/// JSON has no representation for infinities or NaN; store them as `null`
/// and read `null` back as NaN.
mod nullable_f64 {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        if value.is_finite() {
            serializer.serialize_f64(*value)
        } else {
            serializer.serialize_none()
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(f64::NAN))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn params_parse_from_comma_list() {
        let p: FacParams = "0.06, 0.4,0.1 ,2".parse().unwrap();
        assert_eq!(p, DEFAULT_INITIAL);
    }

    #[test]
    fn params_parse_rejects_wrong_arity() {
        assert!("0.06,0.4,0.1".parse::<FacParams>().is_err());
        assert!("0.06,0.4,x,2".parse::<FacParams>().is_err());
    }

    #[test]
    fn domain_error_flags_invalid_params() {
        assert!(DEFAULT_INITIAL.domain_error().is_none());
        let bad_sd = FacParams { pre_t_sd: -0.01, ..DEFAULT_INITIAL };
        assert!(bad_sd.domain_error().is_some());
        let bad_k = FacParams { k_fac: 0.0, ..DEFAULT_INITIAL };
        assert!(bad_k.domain_error().is_some());
        let bad_tau = FacParams { tau_fac: 0.0, ..DEFAULT_INITIAL };
        assert!(bad_tau.domain_error().is_some());
        let nan = FacParams { pre_t_mean: f64::NAN, ..DEFAULT_INITIAL };
        assert!(nan.domain_error().is_some());
    }

    #[test]
    fn non_finite_scores_survive_json() {
        let score = CohortScore {
            cohort: Cohort::Ms100,
            statistic: f64::INFINITY,
            p_value: 0.25,
            dof: 1,
            observed: vec![0.5, 0.5],
            expected: vec![0.0, 1.0],
        };
        let json = serde_json::to_string(&score).unwrap();
        assert!(json.contains("\"statistic\":null"));
        assert!(json.contains("\"cohort\":\"ms100\""));
        let back: CohortScore = serde_json::from_str(&json).unwrap();
        assert!(back.statistic.is_nan());
        assert_eq!(back.p_value, 0.25);
    }

    #[test]
    fn cohort_metadata() {
        assert_eq!(Cohort::Ms125.default_file_name(), "Go_trial_MEP_amplitudes_125ms.csv");
        for (i, c) in Cohort::ALL.iter().enumerate() {
            assert_eq!(c.index(), i);
            assert!((c.probe_time() * 1000.0 + c.ms() as f64).abs() < 1e-9);
        }
    }
}

//! Descriptive statistics, percentile binning and the chi-square test.
//!
//! Percentiles and histograms follow the conventions of numpy's
//! `percentile` (linear interpolation) and `histogram` (half-open bins, last
//! bin closed, out-of-range values dropped) so that bin edges computed from
//! experimental data partition that same data exactly.

use statrs::distribution::{ChiSquared, ContinuousCDF};

use crate::domain::DatasetStats;
use crate::error::AppError;

/// Result of a one-way chi-square test.
#[derive(Debug, Clone, PartialEq)]
pub struct ChiSquare {
    pub statistic: f64,
    pub p_value: f64,
    pub dof: usize,
    pub observed: Vec<f64>,
    pub expected: Vec<f64>,
}

fn sorted_finite(values: &[f64]) -> Vec<f64> {
    let mut out: Vec<f64> = values.iter().copied().filter(|v| !v.is_nan()).collect();
    out.sort_by(|a, b| a.total_cmp(b));
    out
}

/// Linear-interpolation percentile of already sorted values (`q` in `[0, 100]`).
pub fn percentile_sorted(sorted: &[f64], q: f64) -> Option<f64> {
    if sorted.is_empty() || !q.is_finite() {
        return None;
    }
    let q = q.clamp(0.0, 100.0);
    let pos = q / 100.0 * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    Some(sorted[lo] + (sorted[hi] - sorted[lo]) * frac)
}

/// Percentiles of unsorted values.
pub fn percentiles(values: &[f64], qs: &[f64]) -> Option<Vec<f64>> {
    let sorted = sorted_finite(values);
    qs.iter().map(|&q| percentile_sorted(&sorted, q)).collect()
}

/// Bin edges at evenly spaced percentiles `0, 100/nbins, ..., 100` of `values`.
pub fn percentile_edges(values: &[f64], nbins: usize) -> Option<Vec<f64>> {
    if nbins == 0 {
        return None;
    }
    let qs: Vec<f64> = (0..=nbins)
        .map(|i| 100.0 * i as f64 / nbins as f64)
        .collect();
    percentiles(values, &qs)
}

/// Count values per bin.
///
/// Bins are `[e_i, e_{i+1})` except the last, which is `[e_{n-1}, e_n]`.
/// Values outside `[e_0, e_n]` (and NaNs) are not counted.
pub fn histogram(values: &[f64], edges: &[f64]) -> Vec<usize> {
    if edges.len() < 2 {
        return Vec::new();
    }
    let sorted = sorted_finite(values);
    let nbins = edges.len() - 1;

    // cum[j] = number of values strictly below e_j, except the final entry,
    // which counts values <= e_n.
    let mut cum = Vec::with_capacity(edges.len());
    for &e in &edges[..nbins] {
        cum.push(sorted.partition_point(|&v| v < e));
    }
    let last = edges[nbins];
    cum.push(sorted.partition_point(|&v| v <= last));

    cum.windows(2)
        .map(|w| w[1].saturating_sub(w[0]))
        .collect()
}

/// Histogram counts divided by the total sample size (including dropped values).
pub fn histogram_proportions(values: &[f64], edges: &[f64]) -> Vec<f64> {
    let n = values.len() as f64;
    histogram(values, edges)
        .into_iter()
        .map(|c| if n > 0.0 { c as f64 / n } else { 0.0 })
        .collect()
}

/// One-way chi-square test of `observed` against `expected` frequencies.
///
/// A bin with zero expected and zero observed contributes nothing; zero
/// expected with non-zero observed makes the statistic infinite.
pub fn chi_square_test(observed: &[f64], expected: &[f64]) -> Result<ChiSquare, AppError> {
    if observed.len() != expected.len() {
        return Err(AppError::new(
            4,
            format!(
                "Chi-square: observed has {} bins but expected has {}.",
                observed.len(),
                expected.len()
            ),
        ));
    }
    if observed.is_empty() {
        return Err(AppError::new(4, "Chi-square: no bins to compare."));
    }

    let mut statistic = 0.0;
    for (&o, &e) in observed.iter().zip(expected) {
        let diff = o - e;
        if e == 0.0 {
            if diff != 0.0 {
                statistic = f64::INFINITY;
            }
            continue;
        }
        statistic += diff * diff / e;
    }

    let dof = observed.len() - 1;
    let p_value = if dof == 0 || statistic.is_nan() {
        f64::NAN
    } else if statistic.is_infinite() {
        0.0
    } else {
        let dist = ChiSquared::new(dof as f64)
            .map_err(|e| AppError::new(4, format!("Chi-square distribution error: {e}")))?;
        dist.sf(statistic)
    };

    Ok(ChiSquare {
        statistic,
        p_value,
        dof,
        observed: observed.to_vec(),
        expected: expected.to_vec(),
    })
}

/// Bin both samples at the percentiles of `obs_data` and compare proportions.
///
/// `obs_data` supplies the observed frequencies and `obs_model` the expected
/// ones.
pub fn chi_square_binned(obs_data: &[f64], obs_model: &[f64], nbins: usize) -> Result<ChiSquare, AppError> {
    if nbins == 0 {
        return Err(AppError::new(2, "Number of bins must be > 0."));
    }
    if obs_data.is_empty() {
        return Err(AppError::new(3, "Chi-square: experimental sample is empty."));
    }
    if obs_model.is_empty() {
        return Err(AppError::new(4, "Chi-square: simulated sample is empty."));
    }

    let edges = percentile_edges(obs_data, nbins)
        .ok_or_else(|| AppError::new(3, "Chi-square: experimental sample has no finite values."))?;
    let hist_data = histogram_proportions(obs_data, &edges);
    let hist_model = histogram_proportions(obs_model, &edges);
    chi_square_test(&hist_data, &hist_model)
}

/// Summary statistics; `None` for an empty sample.
pub fn describe(values: &[f64]) -> Option<DatasetStats> {
    let sorted = sorted_finite(values);
    if sorted.is_empty() {
        return None;
    }
    let n = sorted.len();
    let mean = sorted.iter().sum::<f64>() / n as f64;
    Some(DatasetStats {
        n,
        min: sorted[0],
        max: sorted[n - 1],
        mean,
        median: percentile_sorted(&sorted, 50.0)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percentile_interpolates_linearly() {
        let v = [4.0, 1.0, 3.0, 2.0];
        let p = percentiles(&v, &[0.0, 50.0, 100.0, 25.0]).unwrap();
        assert_eq!(p, vec![1.0, 2.5, 4.0, 1.75]);
    }

    #[test]
    fn histogram_closes_last_bin_and_drops_outside() {
        let edges = [1.0, 2.0, 3.0];
        let values = [0.5, 1.0, 1.5, 2.0, 2.5, 3.0, 3.5];
        assert_eq!(histogram(&values, &edges), vec![2, 3]);

        let props = histogram_proportions(&values, &edges);
        assert!((props[0] - 2.0 / 7.0).abs() < 1e-12);
        assert!((props[1] - 3.0 / 7.0).abs() < 1e-12);
    }

    #[test]
    fn histogram_with_repeated_edges() {
        // Same behavior as numpy: an empty zero-width bin, values at the
        // repeated edge fall into the following bin.
        let edges = [1.0, 1.0, 3.0];
        let values = [1.0, 1.0, 2.0, 3.0];
        assert_eq!(histogram(&values, &edges), vec![0, 4]);
    }

    #[test]
    fn percentile_edges_split_data_evenly() {
        let data: Vec<f64> = (1..=10).map(|i| i as f64).collect();
        let edges = percentile_edges(&data, 2).unwrap();
        assert_eq!(edges, vec![1.0, 5.5, 10.0]);
        assert_eq!(histogram(&data, &edges), vec![5, 5]);
    }

    #[test]
    fn chi_square_matches_reference_values() {
        // scipy.stats.chisquare([0.5, 0.5], [0.4, 0.6])
        //   -> statistic=0.041666..., pvalue=0.83826...
        let res = chi_square_test(&[0.5, 0.5], &[0.4, 0.6]).unwrap();
        assert!((res.statistic - 0.041_666_666_666_666_664).abs() < 1e-12);
        assert_eq!(res.dof, 1);
        assert!((res.p_value - 0.838_256).abs() < 1e-4, "p={}", res.p_value);

        // scipy.stats.chisquare([10, 20, 30], [20, 20, 20])
        //   -> statistic=10.0, pvalue=0.006737947
        let res = chi_square_test(&[10.0, 20.0, 30.0], &[20.0, 20.0, 20.0]).unwrap();
        assert!((res.statistic - 10.0).abs() < 1e-12);
        assert!((res.p_value - 0.006_737_947).abs() < 1e-7);
    }

    #[test]
    fn chi_square_zero_expected() {
        let res = chi_square_test(&[0.0, 1.0], &[0.0, 1.0]).unwrap();
        assert_eq!(res.statistic, 0.0);

        let res = chi_square_test(&[0.5, 0.5], &[0.0, 1.0]).unwrap();
        assert!(res.statistic.is_infinite());
        assert_eq!(res.p_value, 0.0);
    }

    #[test]
    fn binned_identical_samples_score_zero() {
        let data: Vec<f64> = (0..100).map(|i| (i as f64 * 0.37).sin()).collect();
        let res = chi_square_binned(&data, &data, 3).unwrap();
        assert!(res.statistic.abs() < 1e-12);
        assert!((res.p_value - 1.0).abs() < 1e-9);
    }

    #[test]
    fn binned_model_outside_data_range() {
        // All model values below the data range: no expected mass anywhere,
        // observed mass everywhere.
        let data = [1.0, 2.0, 3.0, 4.0];
        let model = [-1.0; 10];
        let res = chi_square_binned(&data, &model, 2).unwrap();
        assert!(res.statistic.is_infinite());
        assert_eq!(res.expected, vec![0.0, 0.0]);
    }

    #[test]
    fn binned_rejects_empty_inputs() {
        assert!(chi_square_binned(&[], &[1.0], 2).is_err());
        assert!(chi_square_binned(&[1.0], &[], 2).is_err());
        assert!(chi_square_binned(&[1.0], &[1.0], 0).is_err());
    }

    #[test]
    fn describe_basic() {
        let s = describe(&[3.0, 1.0, 2.0, f64::NAN]).unwrap();
        assert_eq!(s.n, 3);
        assert_eq!(s.min, 1.0);
        assert_eq!(s.max, 3.0);
        assert!((s.mean - 2.0).abs() < 1e-12);
        assert_eq!(s.median, 2.0);
        assert!(describe(&[]).is_none());
    }
}

//! Summary statistics for grids and survey values
//!
//! Provides common statistical summaries over the finite values of a
//! dataset:
//! - Min, max, range
//! - Mean, standard deviation
//! - Median and arbitrary percentiles

use serde::{Deserialize, Serialize};

use crate::histogram::{StatsError, StatsResult};

/// Summary statistics for a numeric dataset
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummaryStats {
    /// Number of finite values
    pub count: usize,
    /// Number of missing/NaN values
    pub missing: usize,
    /// Minimum value
    pub min: f64,
    /// Maximum value
    pub max: f64,
    /// Mean (average)
    pub mean: f64,
    /// Standard deviation (population)
    pub std_dev: f64,
    /// Median (50th percentile)
    pub median: f64,
}

impl SummaryStats {
    /// Compute summary statistics from data
    pub fn from_data(data: &[f64]) -> Self {
        let mut finite: Vec<f64> = data.iter().copied().filter(|x| x.is_finite()).collect();
        let missing = data.len() - finite.len();

        if finite.is_empty() {
            return Self::empty(missing);
        }

        let count = finite.len();
        let mean = finite.iter().sum::<f64>() / count as f64;
        let variance = finite.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / count as f64;

        finite.sort_by(f64::total_cmp);
        let median = percentile_sorted(&finite, 50.0);

        Self {
            count,
            missing,
            min: finite[0],
            max: finite[count - 1],
            mean,
            std_dev: variance.sqrt(),
            median,
        }
    }

    /// Create empty statistics (all NaN)
    fn empty(missing: usize) -> Self {
        Self {
            count: 0,
            missing,
            min: f64::NAN,
            max: f64::NAN,
            mean: f64::NAN,
            std_dev: f64::NAN,
            median: f64::NAN,
        }
    }

    /// Get the range (max - min)
    pub fn range(&self) -> f64 {
        self.max - self.min
    }

    /// Check if there were no finite values
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }
}

/// Percentile `q` (0 to 100) of the finite values of `data`
///
/// Uses linear interpolation between the two nearest ranks. Returns
/// `Ok(None)` when there are no finite values.
pub fn percentile(data: &[f64], q: f64) -> StatsResult<Option<f64>> {
    if !(0.0..=100.0).contains(&q) {
        return Err(StatsError::InvalidPercentile(q));
    }

    let mut finite: Vec<f64> = data.iter().copied().filter(|x| x.is_finite()).collect();
    if finite.is_empty() {
        return Ok(None);
    }
    finite.sort_by(f64::total_cmp);
    Ok(Some(percentile_sorted(&finite, q)))
}

/// Minimum and maximum of the finite values, if any
pub fn finite_range(data: &[f64]) -> Option<(f64, f64)> {
    data.iter()
        .copied()
        .filter(|x| x.is_finite())
        .fold(None, |acc, v| match acc {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })
}

fn percentile_sorted(sorted: &[f64], q: f64) -> f64 {
    let n = sorted.len();
    if n == 1 {
        return sorted[0];
    }
    let rank = q / 100.0 * (n - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = (lo + 1).min(n - 1);
    let t = rank - lo as f64;
    sorted[lo] + t * (sorted[hi] - sorted[lo])
}

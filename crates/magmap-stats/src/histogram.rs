//! Binned cumulative distribution
//!
//! A fixed-bin estimate of the cumulative distribution of a sample. Values
//! are histogrammed over their own `[min, max]` range with `nbins` equal
//! bins; the CDF is the running sum of the counts normalized by the total,
//! reported at the bin centres.
//!
//! This is the estimate a histogram-equalized color scale is built from:
//! equal steps of the CDF correspond to equal numbers of data values.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default number of bins for color equalization
pub const DEFAULT_BINS: usize = 256;

/// Errors raised by statistical constructors
#[derive(Debug, Error, PartialEq)]
pub enum StatsError {
    #[error("Bin count must be at least 1")]
    NoBins,

    #[error("Percentile {0} is outside [0, 100]")]
    InvalidPercentile(f64),
}

/// Result type for statistics operations
pub type StatsResult<T> = Result<T, StatsError>;

/// Histogram with equal-width bins
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Histogram {
    /// Bin edges (`counts.len() + 1` entries)
    edges: Vec<f64>,
    /// Count per bin
    counts: Vec<usize>,
    /// Number of finite values histogrammed
    total: usize,
}

impl Histogram {
    /// Histogram the finite values of `data` over their own range
    ///
    /// A zero-width range is widened to `[v - 0.5, v + 0.5]` so that every
    /// bin has a positive width.
    pub fn from_data(data: &[f64], nbins: usize) -> StatsResult<Self> {
        if nbins == 0 {
            return Err(StatsError::NoBins);
        }

        let finite: Vec<f64> = data.iter().copied().filter(|x| x.is_finite()).collect();
        if finite.is_empty() {
            return Ok(Self {
                edges: Vec::new(),
                counts: Vec::new(),
                total: 0,
            });
        }

        let mut lo = finite.iter().copied().fold(f64::INFINITY, f64::min);
        let mut hi = finite.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        if lo == hi {
            lo -= 0.5;
            hi += 0.5;
        }

        let width = (hi - lo) / nbins as f64;
        let edges: Vec<f64> = (0..=nbins).map(|i| lo + i as f64 * width).collect();

        let mut counts = vec![0usize; nbins];
        for &v in &finite {
            // Last edge is inclusive
            let idx = (((v - lo) / width).floor() as usize).min(nbins - 1);
            counts[idx] += 1;
        }

        Ok(Self {
            edges,
            counts,
            total: finite.len(),
        })
    }

    /// Bin edges
    pub fn edges(&self) -> &[f64] {
        &self.edges
    }

    /// Count per bin
    pub fn counts(&self) -> &[usize] {
        &self.counts
    }

    /// Bin centres
    pub fn centers(&self) -> Vec<f64> {
        self.edges.windows(2).map(|w| 0.5 * (w[0] + w[1])).collect()
    }

    /// Number of finite values histogrammed
    pub fn total(&self) -> usize {
        self.total
    }

    /// Check if no values were histogrammed
    pub fn is_empty(&self) -> bool {
        self.total == 0
    }
}

/// Cumulative distribution estimated on a fixed number of bins
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CumulativeDistribution {
    /// Bin centres, increasing
    centers: Vec<f64>,
    /// CDF at each centre, non-decreasing, last entry 1.0
    cdf: Vec<f64>,
    /// Number of distinct finite values seen (saturates at 2)
    distinct: usize,
}

impl CumulativeDistribution {
    /// Build with the default 256 bins
    pub fn from_data(data: &[f64]) -> Self {
        // DEFAULT_BINS is non-zero
        Self::with_bins(data, DEFAULT_BINS).unwrap_or_else(|_| Self::empty())
    }

    /// Build with a custom bin count
    pub fn with_bins(data: &[f64], nbins: usize) -> StatsResult<Self> {
        let hist = Histogram::from_data(data, nbins)?;
        if hist.is_empty() {
            return Ok(Self::empty());
        }

        let total = hist.total() as f64;
        let mut running = 0usize;
        let cdf: Vec<f64> = hist
            .counts()
            .iter()
            .map(|&c| {
                running += c;
                running as f64 / total
            })
            .collect();

        let mut finite = data.iter().copied().filter(|x| x.is_finite());
        let distinct = match finite.next() {
            Some(first) => {
                if finite.any(|v| v != first) {
                    2
                } else {
                    1
                }
            }
            None => 0,
        };

        Ok(Self {
            centers: hist.centers(),
            cdf,
            distinct,
        })
    }

    fn empty() -> Self {
        Self {
            centers: Vec::new(),
            cdf: Vec::new(),
            distinct: 0,
        }
    }

    /// Bin centres
    pub fn bin_centers(&self) -> &[f64] {
        &self.centers
    }

    /// CDF values at the bin centres
    pub fn cdf_values(&self) -> &[f64] {
        &self.cdf
    }

    /// Check if the distribution holds no values
    pub fn is_empty(&self) -> bool {
        self.cdf.is_empty()
    }

    /// A distribution with fewer than two distinct values is a single step
    /// and carries no information about relative density.
    pub fn is_degenerate(&self) -> bool {
        self.distinct < 2
    }

    /// Evaluate the CDF at `x` by linear interpolation between bin centres
    ///
    /// Below the first centre the first CDF value is returned, above the
    /// last centre 1.0. Non-decreasing in `x`.
    pub fn evaluate(&self, x: f64) -> f64 {
        let (Some(&first), Some(&last)) = (self.centers.first(), self.centers.last()) else {
            return 0.0;
        };
        if x.is_nan() {
            return f64::NAN;
        }
        if x <= first {
            return self.cdf[0];
        }
        if x >= last {
            return self.cdf[self.cdf.len() - 1];
        }

        // First centre strictly greater than x
        let hi = self.centers.partition_point(|&c| c <= x);
        let lo = hi - 1;
        let (c0, c1) = (self.centers[lo], self.centers[hi]);
        let t = (x - c0) / (c1 - c0);
        self.cdf[lo] + t * (self.cdf[hi] - self.cdf[lo])
    }
}

//! Histogram-equalized color scales
//!
//! Equal intervals of an equalized colormap hold equal numbers of grid
//! values instead of equal value ranges, so crowded parts of the data
//! distribution get more of the palette.

use serde::{Deserialize, Serialize};

use crate::colormap::Colormap;
use crate::error::{validation, GridResult};
use magmap_stats::{CumulativeDistribution, DEFAULT_BINS};

/// Monotonic map from data value to color position in `[0, 1]`
///
/// Knots run from `(vmin, 0)` through the bin centres of the cumulative
/// distribution to `(vmax, 1)`. A degenerate distribution collapses to the
/// linear ramp between the limits.
#[derive(Debug, Clone, PartialEq)]
pub struct EqualizationTable {
    vmin: f64,
    vmax: f64,
    knots: Vec<(f64, f64)>,
}

impl EqualizationTable {
    /// Build from grid values with the default 256 bins
    pub fn new(values: &[f64], vmin: f64, vmax: f64) -> GridResult<Self> {
        Self::with_bins(values, vmin, vmax, DEFAULT_BINS)
    }

    pub fn with_bins(values: &[f64], vmin: f64, vmax: f64, nbins: usize) -> GridResult<Self> {
        validation::ordered_range(vmin, vmax)?;
        validation::positive("nbins", nbins as f64)?;

        let inside: Vec<f64> = values
            .iter()
            .copied()
            .filter(|&v| v > vmin && v < vmax)
            .collect();
        let cdf = CumulativeDistribution::with_bins(&inside, nbins)
            .unwrap_or_else(|_| CumulativeDistribution::from_data(&[]));

        let mut knots = vec![(vmin, 0.0)];
        if cdf.is_empty() || cdf.is_degenerate() {
            tracing::debug!(
                "Equalization over [{}, {}] has {} usable values; using a linear ramp",
                vmin,
                vmax,
                inside.len()
            );
        } else {
            knots.extend(
                cdf.bin_centers()
                    .iter()
                    .copied()
                    .zip(cdf.cdf_values().iter().copied()),
            );
        }
        knots.push((vmax, 1.0));

        Ok(Self { vmin, vmax, knots })
    }

    pub fn vmin(&self) -> f64 {
        self.vmin
    }

    pub fn vmax(&self) -> f64 {
        self.vmax
    }

    /// True when the table is the plain linear ramp
    pub fn is_linear(&self) -> bool {
        self.knots.len() == 2
    }

    /// `(value, position)` knots, both ascending
    pub fn knots(&self) -> &[(f64, f64)] {
        &self.knots
    }

    /// Color position of `value`; `NaN` stays `NaN`
    pub fn map(&self, value: f64) -> f64 {
        if value.is_nan() {
            return f64::NAN;
        }
        if value <= self.vmin {
            return 0.0;
        }
        if value >= self.vmax {
            return 1.0;
        }
        let hi = self.knots.partition_point(|&(x, _)| x <= value);
        let (x0, y0) = self.knots[hi - 1];
        let (x1, y1) = self.knots[hi];
        y0 + (value - x0) / (x1 - x0) * (y1 - y0)
    }

    /// Colormap that, sampled at linear positions, shows `base` at the
    /// equalized positions
    pub fn remap(&self, base: &Colormap) -> Colormap {
        let span = self.vmax - self.vmin;
        let stops = self
            .knots
            .iter()
            .map(|&(x, y)| (((x - self.vmin) / span) as f32, base.sample(y as f32)))
            .collect();
        Colormap::from_stops(format!("{}_equalized", base.name), stops)
    }
}

/// Histogram equalization settings
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistogramEqualizer {
    pub enabled: bool,
    pub nbins: usize,
}

impl Default for HistogramEqualizer {
    fn default() -> Self {
        Self {
            enabled: true,
            nbins: DEFAULT_BINS,
        }
    }
}

impl HistogramEqualizer {
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Default::default()
        }
    }

    /// Colormap for `values` displayed over `[vmin, vmax]`
    ///
    /// When disabled the base colormap is returned unchanged.
    pub fn colormap(
        &self,
        base: &Colormap,
        values: &[f64],
        vmin: f64,
        vmax: f64,
    ) -> GridResult<Colormap> {
        validation::ordered_range(vmin, vmax)?;
        if !self.enabled {
            return Ok(base.clone());
        }
        let table = EqualizationTable::with_bins(values, vmin, vmax, self.nbins)?;
        Ok(table.remap(base))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::colormap::{get_colormap, viridis, Color};
    use crate::error::GridError;

    fn skewed() -> Vec<f64> {
        // Most values crowd the bottom of the range
        let mut values: Vec<f64> = (0..900).map(|i| 1.0 + i as f64 / 900.0).collect();
        values.extend((0..100).map(|i| 2.0 + 8.0 * i as f64 / 100.0));
        values
    }

    #[test]
    fn test_monotonic() {
        let table = EqualizationTable::new(&skewed(), 0.0, 10.0).unwrap();
        let mut last = -1.0;
        for i in 0..=1000 {
            let v = table.map(i as f64 / 100.0);
            assert!(v >= last);
            assert!((0.0..=1.0).contains(&v));
            last = v;
        }
    }

    #[test]
    fn test_spreads_crowded_values() {
        let table = EqualizationTable::new(&skewed(), 0.0, 10.0).unwrap();
        // 90% of the data lies below 2.0
        assert!((table.map(2.0) - 0.9).abs() < 0.02);
        assert!(!table.is_linear());
    }

    #[test]
    fn test_limits_clamp() {
        let table = EqualizationTable::new(&skewed(), 0.0, 10.0).unwrap();
        assert_eq!(table.map(-5.0), 0.0);
        assert_eq!(table.map(0.0), 0.0);
        assert_eq!(table.map(10.0), 1.0);
        assert_eq!(table.map(50.0), 1.0);
        assert!(table.map(f64::NAN).is_nan());
    }

    #[test]
    fn test_degenerate_falls_back_to_linear() {
        let table = EqualizationTable::new(&[1.0, 1.0, 1.0, 1.0, 10.0], 1.0, 10.0).unwrap();
        assert!(table.is_linear());
        assert_eq!(table.map(5.5), 0.5);
        assert!(table.map(2.0) <= table.map(3.0));

        let table = EqualizationTable::new(&[4.0, 4.0, 4.0], 0.0, 10.0).unwrap();
        assert!(table.is_linear());

        let table = EqualizationTable::new(&[], 0.0, 10.0).unwrap();
        assert_eq!(table.map(2.5), 0.25);
    }

    #[test]
    fn test_invalid_range() {
        assert!(matches!(
            EqualizationTable::new(&[1.0], 5.0, 5.0),
            Err(GridError::InvalidRange { .. })
        ));
        assert!(matches!(
            EqualizationTable::new(&[1.0], 6.0, 5.0),
            Err(GridError::InvalidRange { .. })
        ));
    }

    #[test]
    fn test_remap_matches_table() {
        let base = viridis();
        let table = EqualizationTable::new(&skewed(), 0.0, 10.0).unwrap();
        let remapped = table.remap(&base);

        for value in [0.5, 1.5, 1.9, 4.0, 9.0] {
            let linear = (value / 10.0) as f32;
            let expected = base.sample(table.map(value) as f32);
            let got: Color = remapped.sample(linear);
            assert!((got.r - expected.r).abs() < 0.02);
            assert!((got.g - expected.g).abs() < 0.02);
            assert!((got.b - expected.b).abs() < 0.02);
        }
    }

    #[test]
    fn test_disabled_keeps_base() {
        let base = get_colormap("RdBu_r").unwrap();
        let cmap = HistogramEqualizer::disabled()
            .colormap(&base, &skewed(), 0.0, 10.0)
            .unwrap();
        assert_eq!(cmap, base);

        let cmap = HistogramEqualizer::default()
            .colormap(&base, &skewed(), 0.0, 10.0)
            .unwrap();
        assert_ne!(cmap, base);
    }
}

//! Value normalization for color mapping
//!
//! A `ColorNorm` maps data values onto `[0, 1]` before a colormap lookup.
//! `MidPoint` normalization pins a chosen value (typically zero for
//! residual or derivative grids) to the centre of the colormap.

use serde::{Deserialize, Serialize};

use crate::error::{GridError, GridResult};
use magmap_stats::{finite_range, percentile};

/// How values between the limits are spread over `[0, 1]`
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Normalization {
    #[default]
    Linear,
    /// Below the midpoint maps to `[0, 0.5]`, above to `[0.5, 1]`;
    /// `None` takes the centre of the limits
    MidPoint { midpoint: Option<f64> },
}

/// Normalization with its limits
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColorNorm {
    vmin: f64,
    vmax: f64,
    midpoint: Option<f64>,
    clip: bool,
}

impl ColorNorm {
    /// Linear map of `[vmin, vmax]` onto `[0, 1]`
    pub fn linear(vmin: f64, vmax: f64) -> GridResult<Self> {
        Self::new(vmin, vmax, Normalization::Linear)
    }

    /// Piecewise-linear map pinning `midpoint` to 0.5
    pub fn midpoint(vmin: f64, vmax: f64, midpoint: Option<f64>) -> GridResult<Self> {
        Self::new(vmin, vmax, Normalization::MidPoint { midpoint })
    }

    pub fn new(vmin: f64, vmax: f64, kind: Normalization) -> GridResult<Self> {
        if !(vmin.is_finite() && vmax.is_finite()) {
            return Err(GridError::range(format!(
                "limits must be finite, got [{}, {}]",
                vmin, vmax
            )));
        }
        if vmin > vmax {
            return Err(GridError::range(format!(
                "vmax ({}) must be bigger than vmin ({})",
                vmax, vmin
            )));
        }

        let midpoint = match kind {
            Normalization::Linear => None,
            Normalization::MidPoint { .. } if vmin == vmax => None,
            Normalization::MidPoint { midpoint } => {
                let m = midpoint.unwrap_or((vmin + vmax) / 2.0);
                if !(vmin < m && m < vmax) {
                    return Err(GridError::range(format!(
                        "midpoint ({}) must lie between vmin ({}) and vmax ({})",
                        m, vmin, vmax
                    )));
                }
                Some(m)
            }
        };

        Ok(Self {
            vmin,
            vmax,
            midpoint,
            clip: false,
        })
    }

    /// Clamp values to the limits before mapping
    pub fn with_clip(mut self, clip: bool) -> Self {
        self.clip = clip;
        self
    }

    pub fn vmin(&self) -> f64 {
        self.vmin
    }

    pub fn vmax(&self) -> f64 {
        self.vmax
    }

    /// Map a value; `NaN` stays `NaN`
    pub fn normalize(&self, value: f64) -> f64 {
        if value.is_nan() {
            return f64::NAN;
        }
        if self.vmin == self.vmax {
            return 0.0;
        }
        let value = if self.clip {
            value.clamp(self.vmin, self.vmax)
        } else {
            value
        };

        match self.midpoint {
            None => (value - self.vmin) / (self.vmax - self.vmin),
            Some(m) => {
                let shifted = value - m;
                let scaled = if shifted > 0.0 {
                    shifted / (self.vmax - m).abs()
                } else if shifted < 0.0 {
                    shifted / (self.vmin - m).abs()
                } else {
                    0.0
                };
                scaled / 2.0 + 0.5
            }
        }
    }

    /// Value that maps to `t`
    pub fn inverse(&self, t: f64) -> f64 {
        match self.midpoint {
            None => self.vmin + t * (self.vmax - self.vmin),
            Some(m) => {
                let s = 2.0 * (t - 0.5);
                if s < 0.0 {
                    s * (self.vmin - m).abs() + m
                } else {
                    s * (self.vmax - m).abs() + m
                }
            }
        }
    }
}

/// Floor of the smallest and ceiling of the largest finite value
pub fn rounded_limits(values: &[f64]) -> Option<(f64, f64)> {
    finite_range(values).map(|(lo, hi)| (lo.floor(), hi.ceil()))
}

/// Percentile limits, e.g. `(5.0, 95.0)` for derived grids
pub fn percentile_limits(values: &[f64], lower: f64, upper: f64) -> GridResult<Option<(f64, f64)>> {
    let to_param = |e: magmap_stats::StatsError| GridError::parameter("percentile", e.to_string());
    let lo = percentile(values, lower).map_err(to_param)?;
    let hi = percentile(values, upper).map_err(to_param)?;
    Ok(lo.zip(hi))
}

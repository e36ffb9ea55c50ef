//! Distance masking
//!
//! Interpolators extend smoothly past the last observation. `DistanceMask`
//! blanks every cell whose centre is farther than `dist_max` from the
//! nearest real sample.

use serde::{Deserialize, Serialize};

use crate::error::{validation, GridError, GridResult};
use crate::grid::RegularGrid;
use crate::spatial::KdTree;
use crate::types::{finite_samples, ScatterSample};

/// Default masking distance in map units
pub const DEFAULT_DIST_MAX: f64 = 1000.0;

/// Blank cells far from any sample
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DistanceMask {
    pub dist_max: f64,
}

impl Default for DistanceMask {
    fn default() -> Self {
        Self {
            dist_max: DEFAULT_DIST_MAX,
        }
    }
}

impl DistanceMask {
    pub fn new(dist_max: f64) -> GridResult<Self> {
        let mask = Self { dist_max };
        mask.validate()?;
        Ok(mask)
    }

    pub fn validate(&self) -> GridResult<()> {
        validation::positive("dist_max", self.dist_max)
    }

    /// Copy of `grid` with far cells set to `NaN`
    pub fn apply(&self, grid: &RegularGrid, samples: &[ScatterSample]) -> GridResult<RegularGrid> {
        let mut masked = grid.clone();
        self.apply_in_place(&mut masked, samples)?;
        Ok(masked)
    }

    /// Blank far cells in place, returning how many were blanked
    pub fn apply_in_place(
        &self,
        grid: &mut RegularGrid,
        samples: &[ScatterSample],
    ) -> GridResult<usize> {
        self.validate()?;
        let distances = nearest_sample_distances(samples, &grid.cell_centers())?;

        let mut blanked = 0;
        for (v, d) in grid.values.iter_mut().zip(distances) {
            if d > self.dist_max {
                if !v.is_nan() {
                    blanked += 1;
                }
                *v = f64::NAN;
            }
        }

        tracing::debug!(
            "Masked {} of {} cells farther than {} from any sample",
            blanked,
            grid.values.len(),
            self.dist_max
        );
        Ok(blanked)
    }
}

/// Distance from each point to its nearest finite sample
pub fn nearest_sample_distances(
    samples: &[ScatterSample],
    points: &[[f64; 2]],
) -> GridResult<Vec<f64>> {
    let samples = finite_samples(samples);
    if samples.is_empty() {
        return Err(GridError::EmptyInput);
    }
    let positions: Vec<[f64; 2]> = samples.iter().map(|s| s.position()).collect();
    let tree = KdTree::build(&positions);
    Ok(tree.nearest_distances(points))
}

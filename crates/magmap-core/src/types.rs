//! Common types for magmap-core
//!
//! Scattered observations and the rectangular extents derived from them.

use serde::{Deserialize, Serialize};

use crate::error::{validation, GridResult};
use magmap_io::SurveyTable;

/// A single observation: location and measured value
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScatterSample {
    pub x: f64,
    pub y: f64,
    pub value: f64,
}

impl ScatterSample {
    pub fn new(x: f64, y: f64, value: f64) -> Self {
        Self { x, y, value }
    }

    /// Location as `[x, y]`
    pub fn position(&self) -> [f64; 2] {
        [self.x, self.y]
    }

    /// Check that location and value are all finite
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.value.is_finite()
    }

    /// Squared Euclidean distance to a point
    #[inline]
    pub fn dist_sq(&self, x: f64, y: f64) -> f64 {
        let dx = self.x - x;
        let dy = self.y - y;
        dx * dx + dy * dy
    }
}

impl From<(f64, f64, f64)> for ScatterSample {
    fn from((x, y, value): (f64, f64, f64)) -> Self {
        Self { x, y, value }
    }
}

/// Zip parallel coordinate and value columns into samples
///
/// Fails with `ShapeMismatch` when the lengths disagree.
pub fn samples_from_columns(x: &[f64], y: &[f64], values: &[f64]) -> GridResult<Vec<ScatterSample>> {
    validation::same_len("y coordinates", x.len(), y.len())?;
    validation::same_len("values", x.len(), values.len())?;

    Ok(x.iter()
        .zip(y)
        .zip(values)
        .map(|((&x, &y), &value)| ScatterSample { x, y, value })
        .collect())
}

/// Convert a survey table read from disk
pub fn samples_from_table(table: &SurveyTable) -> GridResult<Vec<ScatterSample>> {
    samples_from_columns(&table.x, &table.y, &table.values)
}

/// Split samples back into a survey table
pub fn samples_to_table(samples: &[ScatterSample]) -> SurveyTable {
    SurveyTable {
        x: samples.iter().map(|s| s.x).collect(),
        y: samples.iter().map(|s| s.y).collect(),
        values: samples.iter().map(|s| s.value).collect(),
    }
}

/// Keep only samples with finite location and value
pub fn finite_samples(samples: &[ScatterSample]) -> Vec<ScatterSample> {
    let kept: Vec<ScatterSample> = samples.iter().copied().filter(|s| s.is_finite()).collect();
    if kept.len() < samples.len() {
        tracing::warn!(
            "Skipping {} non-finite samples out of {}",
            samples.len() - kept.len(),
            samples.len()
        );
    }
    kept
}

/// Axis-aligned rectangle in map coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Extent {
    pub min_x: f64,
    pub max_x: f64,
    pub min_y: f64,
    pub max_y: f64,
}

impl Extent {
    pub fn new(min_x: f64, max_x: f64, min_y: f64, max_y: f64) -> Self {
        Self {
            min_x,
            max_x,
            min_y,
            max_y,
        }
    }

    /// Bounding rectangle of the finite sample locations
    pub fn of_samples(samples: &[ScatterSample]) -> Option<Self> {
        samples
            .iter()
            .filter(|s| s.x.is_finite() && s.y.is_finite())
            .fold(None, |acc: Option<Extent>, s| match acc {
                None => Some(Extent::new(s.x, s.x, s.y, s.y)),
                Some(e) => Some(Extent::new(
                    e.min_x.min(s.x),
                    e.max_x.max(s.x),
                    e.min_y.min(s.y),
                    e.max_y.max(s.y),
                )),
            })
    }

    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    /// Check if a point lies inside or on the boundary
    pub fn contains(&self, x: f64, y: f64) -> bool {
        x >= self.min_x && x <= self.max_x && y >= self.min_y && y <= self.max_y
    }

    /// Check if a point lies strictly inside
    pub fn contains_strictly(&self, x: f64, y: f64) -> bool {
        x > self.min_x && x < self.max_x && y > self.min_y && y < self.max_y
    }

    /// Length of the diagonal
    pub fn diagonal(&self) -> f64 {
        self.width().hypot(self.height())
    }

    /// Centre point
    pub fn center(&self) -> (f64, f64) {
        (
            0.5 * (self.min_x + self.max_x),
            0.5 * (self.min_y + self.max_y),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GridError;

    #[test]
    fn test_samples_from_columns() {
        let samples = samples_from_columns(&[0.0, 1.0], &[2.0, 3.0], &[4.0, 5.0]).unwrap();
        assert_eq!(samples[1], ScatterSample::new(1.0, 3.0, 5.0));
    }

    #[test]
    fn test_samples_from_columns_mismatch() {
        let err = samples_from_columns(&[0.0, 1.0], &[2.0, 3.0], &[4.0]).unwrap_err();
        assert!(matches!(
            err,
            GridError::ShapeMismatch {
                expected: 2,
                actual: 1,
                ..
            }
        ));
    }

    #[test]
    fn test_finite_samples() {
        let samples = vec![
            ScatterSample::new(0.0, 0.0, 1.0),
            ScatterSample::new(f64::NAN, 0.0, 1.0),
            ScatterSample::new(0.0, 0.0, f64::INFINITY),
        ];
        assert_eq!(finite_samples(&samples).len(), 1);
    }

    #[test]
    fn test_extent_of_samples() {
        let samples = vec![
            ScatterSample::new(3.0, -1.0, 0.0),
            ScatterSample::new(-2.0, 4.0, 0.0),
        ];
        let extent = Extent::of_samples(&samples).unwrap();
        assert_eq!(extent, Extent::new(-2.0, 3.0, -1.0, 4.0));
        assert!(extent.contains(3.0, 4.0));
        assert!(!extent.contains_strictly(3.0, 0.0));
        assert!(Extent::of_samples(&[]).is_none());
    }

    #[test]
    fn test_table_round_trip() {
        let samples = vec![ScatterSample::new(1.0, 2.0, 3.0)];
        let table = samples_to_table(&samples);
        assert_eq!(samples_from_table(&table).unwrap(), samples);
    }
}

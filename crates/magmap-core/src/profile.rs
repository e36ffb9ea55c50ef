//! Profile sampling along a straight line
//!
//! A `LineSegment` from A to A' is discretized into evenly spaced positions.
//! Positions outside the data extent are dropped, then each data series is
//! resampled at the remaining positions: scattered series through a
//! `ScatteredInterpolator`, gridded series by bilinear interpolation.

use serde::{Deserialize, Serialize};

use crate::error::{validation, GridError, GridResult};
use crate::grid::RegularGrid;
use crate::interpolate::{InterpolationMethod, ScatteredInterpolator, TriangulatedInterpolator};
use crate::types::{Extent, ScatterSample};

/// Default tolerance below which a line counts as vertical or horizontal
pub const DEFAULT_LINE_TOLERANCE: f64 = 1e-3;

/// Fraction of the requested length kept inside the map frame
const LENGTH_FRAME_RATIO: f64 = 0.98;

/// `n` evenly spaced values from `start` to `end` inclusive
fn linspace(start: f64, end: f64, n: usize) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (end - start) / (n - 1) as f64;
            (0..n)
                .map(|i| if i == n - 1 { end } else { start + i as f64 * step })
                .collect()
        }
    }
}

/// Positions along the line from `(x1, y1)` to `(x2, y2)`
///
/// Argument order follows the `(x1, x2, y1, y2)` convention of the line
/// helper it replaces. Vertical lines get evenly spaced `y` at constant `x`;
/// horizontal lines evenly spaced `x` at constant `y`; anything else evenly
/// spaced `x` with `y` from the slope.
pub fn line_positions(
    x1: f64,
    x2: f64,
    y1: f64,
    y2: f64,
    n: usize,
    tol: f64,
) -> (Vec<f64>, Vec<f64>) {
    let dx = x2 - x1;
    let dy = y2 - y1;

    if dx.abs() < tol {
        let y = linspace(y1, y2, n);
        (vec![x1; y.len()], y)
    } else if dy.abs() < tol {
        let x = linspace(x1, x2, n);
        (x.clone(), vec![y1; x.len()])
    } else {
        let slope = dy / dx;
        let x = linspace(x1, x2, n);
        let y = x.iter().map(|&xi| slope * (xi - x1) + y1).collect();
        (x, y)
    }
}

/// Straight profile line from A to A'
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LineSegment {
    pub ax: f64,
    pub ay: f64,
    pub bx: f64,
    pub by: f64,
    pub num_points: usize,
}

impl LineSegment {
    pub fn new(a: [f64; 2], b: [f64; 2], num_points: usize) -> GridResult<Self> {
        let segment = Self {
            ax: a[0],
            ay: a[1],
            bx: b[0],
            by: b[1],
            num_points,
        };
        segment.validate()?;
        Ok(segment)
    }

    /// Line through `center` with direction `(cos(-azimuth), sin(-azimuth))`,
    /// `azimuth` in degrees
    ///
    /// The endpoints sit `length / (2 * 0.98)` from the centre.
    pub fn from_center(
        center: [f64; 2],
        azimuth: f64,
        length: f64,
        num_points: usize,
    ) -> GridResult<Self> {
        let angle = -azimuth.to_radians();
        Self::from_direction(center, [angle.cos(), angle.sin()], length, num_points)
    }

    /// Line through `center` along a compass bearing (degrees clockwise
    /// from north)
    pub fn from_bearing(
        center: [f64; 2],
        bearing: f64,
        length: f64,
        num_points: usize,
    ) -> GridResult<Self> {
        let angle = (450.0 - bearing).rem_euclid(360.0).to_radians();
        Self::from_direction(center, [angle.cos(), angle.sin()], length, num_points)
    }

    fn from_direction(
        center: [f64; 2],
        dir: [f64; 2],
        length: f64,
        num_points: usize,
    ) -> GridResult<Self> {
        validation::positive("length", length)?;
        let half = length / (2.0 * LENGTH_FRAME_RATIO);
        let (dx, dy) = (dir[0] * half, dir[1] * half);
        Self::new(
            [center[0] - dx, center[1] - dy],
            [center[0] + dx, center[1] + dy],
            num_points,
        )
    }

    pub fn validate(&self) -> GridResult<()> {
        if self.num_points == 0 {
            return Err(GridError::parameter("num_points", "must be at least 1"));
        }
        if ![self.ax, self.ay, self.bx, self.by]
            .iter()
            .all(|v| v.is_finite())
        {
            return Err(GridError::parameter("endpoints", "must be finite"));
        }
        Ok(())
    }

    pub fn start(&self) -> [f64; 2] {
        [self.ax, self.ay]
    }

    pub fn end(&self) -> [f64; 2] {
        [self.bx, self.by]
    }

    pub fn length(&self) -> f64 {
        (self.bx - self.ax).hypot(self.by - self.ay)
    }

    /// Evenly spaced positions from A to A'
    pub fn positions(&self, tol: f64) -> (Vec<f64>, Vec<f64>) {
        line_positions(self.ax, self.bx, self.ay, self.by, self.num_points, tol)
    }
}

/// Origin of the distance axis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoordinateSystem {
    /// Distance from A
    #[default]
    Local,
    /// Distance from A plus A's easting
    XProfile,
    /// Distance from A plus A's northing
    YProfile,
}

/// How missing values are removed from multi-series profiles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidityMask {
    /// Each series keeps its own valid positions
    PerSeries,
    /// A position missing in any series is removed from all
    #[default]
    Shared,
}

/// Data to sample along the line
#[derive(Debug, Clone, Copy)]
pub enum ProfileSource<'a> {
    /// Scattered observations, interpolated linearly
    Scattered(&'a [ScatterSample]),
    /// Regular grid, interpolated bilinearly between cell centres
    Gridded(&'a RegularGrid),
}

impl ProfileSource<'_> {
    /// Region the source has data for
    pub fn extent(&self) -> Option<Extent> {
        match self {
            ProfileSource::Scattered(samples) => Extent::of_samples(samples),
            ProfileSource::Gridded(grid) => {
                if grid.nx() == 0 || grid.ny() == 0 {
                    return None;
                }
                Some(Extent::new(
                    grid.x_center(0),
                    grid.x_center(grid.nx() - 1),
                    grid.y_center(0),
                    grid.y_center(grid.ny() - 1),
                ))
            }
        }
    }

    fn sample(
        &self,
        interpolator: &dyn ScatteredInterpolator,
        points: &[[f64; 2]],
    ) -> GridResult<Vec<f64>> {
        match self {
            ProfileSource::Scattered(samples) => {
                interpolator.interpolate(samples, points, &InterpolationMethod::Linear)
            }
            ProfileSource::Gridded(grid) => Ok(points
                .iter()
                .map(|p| grid.sample_bilinear(p[0], p[1]))
                .collect()),
        }
    }
}

/// Profile sampling options
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfileOptions {
    pub coordinate_system: CoordinateSystem,
    pub validity: ValidityMask,
    pub tolerance: f64,
}

impl Default for ProfileOptions {
    fn default() -> Self {
        Self {
            coordinate_system: CoordinateSystem::Local,
            validity: ValidityMask::Shared,
            tolerance: DEFAULT_LINE_TOLERANCE,
        }
    }
}

/// One resampled series
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ProfileSeries {
    pub distance: Vec<f64>,
    pub x: Vec<f64>,
    pub y: Vec<f64>,
    pub values: Vec<f64>,
}

impl ProfileSeries {
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    fn keep(distance: &[f64], x: &[f64], y: &[f64], values: &[f64], mask: &[bool]) -> Self {
        let pick = |src: &[f64]| -> Vec<f64> {
            src.iter()
                .zip(mask)
                .filter(|(_, keep)| **keep)
                .map(|(v, _)| *v)
                .collect()
        };
        Self {
            distance: pick(distance),
            x: pick(x),
            y: pick(y),
            values: pick(values),
        }
    }
}

/// Result of sampling one line through several sources
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Profile {
    pub segment: Option<LineSegment>,
    pub series: Vec<ProfileSeries>,
}

/// Sample `sources` along `segment` with the built-in interpolator
pub fn sample_profile(
    segment: &LineSegment,
    sources: &[ProfileSource<'_>],
    options: &ProfileOptions,
) -> GridResult<Profile> {
    sample_profile_with(&TriangulatedInterpolator, segment, sources, options)
}

/// Sample `sources` along `segment`
///
/// Positions strictly inside the combined extent of all sources are kept.
/// Missing values are then removed per `options.validity`.
pub fn sample_profile_with(
    interpolator: &dyn ScatteredInterpolator,
    segment: &LineSegment,
    sources: &[ProfileSource<'_>],
    options: &ProfileOptions,
) -> GridResult<Profile> {
    segment.validate()?;
    let extent = sources
        .iter()
        .filter_map(|s| s.extent())
        .reduce(|a, b| {
            Extent::new(
                a.min_x.min(b.min_x),
                a.max_x.max(b.max_x),
                a.min_y.min(b.min_y),
                a.max_y.max(b.max_y),
            )
        })
        .ok_or(GridError::EmptyInput)?;

    let (line_x, line_y) = segment.positions(options.tolerance);
    let (x, y): (Vec<f64>, Vec<f64>) = line_x
        .into_iter()
        .zip(line_y)
        .filter(|&(x, y)| extent.contains_strictly(x, y))
        .unzip();

    let offset = match options.coordinate_system {
        CoordinateSystem::Local => 0.0,
        CoordinateSystem::XProfile => segment.ax,
        CoordinateSystem::YProfile => segment.ay,
    };
    let distance: Vec<f64> = x
        .iter()
        .zip(&y)
        .map(|(&x, &y)| (x - segment.ax).hypot(y - segment.ay) + offset)
        .collect();

    let points: Vec<[f64; 2]> = x.iter().zip(&y).map(|(&x, &y)| [x, y]).collect();
    let sampled = sources
        .iter()
        .map(|s| s.sample(interpolator, &points))
        .collect::<GridResult<Vec<_>>>()?;

    let series = match options.validity {
        ValidityMask::PerSeries => sampled
            .iter()
            .map(|values| {
                let mask: Vec<bool> = values.iter().map(|v| !v.is_nan()).collect();
                ProfileSeries::keep(&distance, &x, &y, values, &mask)
            })
            .collect(),
        ValidityMask::Shared => {
            let mask: Vec<bool> = (0..points.len())
                .map(|i| sampled.iter().all(|values| !values[i].is_nan()))
                .collect();
            sampled
                .iter()
                .map(|values| ProfileSeries::keep(&distance, &x, &y, values, &mask))
                .collect()
        }
    };

    tracing::debug!(
        "Sampled {} series at {} of {} line positions",
        sources.len(),
        points.len(),
        segment.num_points
    );

    Ok(Profile {
        segment: Some(*segment),
        series,
    })
}

//! Minimum-curvature gridding
//!
//! Finds the smoothest surface through the observations by relaxing the
//! biharmonic equation `∇⁴u = 0` on a lattice. Each observation is snapped
//! to the node of the cell containing it (several observations in one cell
//! are averaged) and held fixed. Free nodes start from the nearest
//! observation, or from a coarser solution when the lattice is large enough,
//! and are updated by Gauss-Seidel sweeps until the largest update falls
//! below `tol × (data range)`.
//!
//! Outside the lattice the surface is continued linearly, which gives the
//! natural boundary condition of zero curvature across the edges.

use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::error::{validation, GridError, GridResult};
use crate::grid::{GridBuilder, GridSizing, RegularGrid};
use crate::spatial::KdTree;
use crate::types::{finite_samples, Extent, ScatterSample};

/// Default convergence tolerance, relative to the data range
pub const DEFAULT_TOLERANCE: f64 = 1e-5;

/// Default lattice spacing in map units
pub const DEFAULT_GRID_SIZE: f64 = 25.0;

/// Upper bound on the automatic iteration count
pub const MAX_AUTO_ITERATIONS: usize = 20_000;

/// Smallest lattice side that gets a coarse-grid starting guess
const COARSE_START_MIN: usize = 16;

/// Parameters of the minimum-curvature solver
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MinCurvatureParams {
    /// Node spacing
    pub grid_size: f64,
    /// Convergence tolerance relative to the data range
    pub tol: f64,
    /// Sweep limit; `None` picks `200 × max(nx, ny)` capped at 20 000
    pub iter_max: Option<usize>,
}

impl Default for MinCurvatureParams {
    fn default() -> Self {
        Self {
            grid_size: DEFAULT_GRID_SIZE,
            tol: DEFAULT_TOLERANCE,
            iter_max: None,
        }
    }
}

impl MinCurvatureParams {
    pub fn validate(&self) -> GridResult<()> {
        validation::positive("grid_size", self.grid_size)?;
        validation::positive("tol", self.tol)?;
        if self.iter_max == Some(0) {
            return Err(GridError::parameter("iter_max", "must be at least 1"));
        }
        Ok(())
    }

    /// Sweep limit for a lattice of `nx × ny` nodes
    pub fn iterations_for(&self, nx: usize, ny: usize) -> usize {
        self.iter_max
            .unwrap_or_else(|| (200 * nx.max(ny)).min(MAX_AUTO_ITERATIONS))
    }
}

/// Solve on a lattice whose nodes start at the minimum sample coordinate
///
/// Nodes are spaced `grid_size` apart and the last node lies at or beyond
/// the maximum sample coordinate. The returned grid carries both the node
/// coordinates (cell centres) and the solved values.
pub fn min_curvature(
    samples: &[ScatterSample],
    params: &MinCurvatureParams,
) -> GridResult<RegularGrid> {
    let samples = finite_samples(samples);
    let lattice = node_lattice(&samples, params)?;
    solve(&samples, &lattice, params)
}

/// Empty lattice with a node on the minimum sample coordinate
pub fn node_lattice(
    samples: &[ScatterSample],
    params: &MinCurvatureParams,
) -> GridResult<RegularGrid> {
    params.validate()?;
    let extent = Extent::of_samples(samples).ok_or(GridError::EmptyInput)?;

    let d = params.grid_size;
    let (x0, y0) = (extent.min_x - d / 2.0, extent.min_y - d / 2.0);
    GridBuilder::new(GridSizing::Explicit {
        dx: d,
        dy: d,
        nx: node_count(x0, extent.max_x, d),
        ny: node_count(y0, extent.max_y, d),
    })
    .origin(x0, y0)
    .build(samples)
}

/// Fewest nodes whose last centre `origin + (n - 0.5) * d` reaches `max`
fn node_count(origin: f64, max: f64, d: f64) -> usize {
    let mut n = ((max - origin) / d).floor().max(0.0) as usize + 1;
    while origin + (n as f64 - 0.5) * d < max {
        n += 1;
    }
    n
}

/// Solve on an existing lattice (its values are ignored)
pub fn solve(
    samples: &[ScatterSample],
    lattice: &RegularGrid,
    params: &MinCurvatureParams,
) -> GridResult<RegularGrid> {
    params.validate()?;
    let samples = finite_samples(samples);
    if samples.is_empty() {
        return Err(GridError::EmptyInput);
    }

    let (nx, ny) = (lattice.nx(), lattice.ny());
    let fixed = snap_samples(&samples, lattice);
    if fixed.iter().all(Option::is_none) {
        tracing::warn!("No samples fall inside the lattice; returning nearest-sample values");
    }

    let mut values = initial_guess(&samples, lattice, params)?;
    for ((j, i), v) in fixed.indexed_iter() {
        if let Some(fv) = v {
            values[[j, i]] = *fv;
        }
    }

    let (lo, hi) = samples
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), s| {
            (lo.min(s.value), hi.max(s.value))
        });
    let range = hi - lo;
    if range <= 0.0 {
        return lattice.with_values(values);
    }
    let threshold = params.tol * range;
    let max_iter = params.iterations_for(nx, ny);

    let stencil = Stencil::new(lattice.cell_size_x, lattice.cell_size_y);
    let diagonal = stencil.diagonal(nx, ny);

    let mut converged = false;
    let mut iterations = 0;
    while iterations < max_iter {
        iterations += 1;
        let mut max_update: f64 = 0.0;
        for j in 0..ny {
            for i in 0..nx {
                if fixed[[j, i]].is_some() || diagonal[[j, i]] <= 0.0 {
                    continue;
                }
                let r = stencil.residual(&values, i as isize, j as isize);
                let update = r / diagonal[[j, i]];
                values[[j, i]] -= update;
                max_update = max_update.max(update.abs());
            }
        }
        if max_update < threshold {
            converged = true;
            break;
        }
    }

    if converged {
        tracing::debug!(
            "Minimum curvature converged after {} sweeps on {}x{} nodes",
            iterations,
            nx,
            ny
        );
    } else {
        tracing::warn!(
            "Minimum curvature stopped after {} sweeps without reaching tolerance {}",
            iterations,
            params.tol
        );
    }

    lattice.with_values(values)
}

/// Average of the samples inside each cell, if any
fn snap_samples(samples: &[ScatterSample], lattice: &RegularGrid) -> Array2<Option<f64>> {
    let (nx, ny) = (lattice.nx(), lattice.ny());
    let extent = lattice.extent();
    let mut sums = Array2::<(f64, usize)>::from_elem((ny, nx), (0.0, 0));

    for s in samples {
        if !extent.contains(s.x, s.y) {
            continue;
        }
        let i = (((s.x - lattice.origin_x) / lattice.cell_size_x).floor() as usize).min(nx - 1);
        let j = (((s.y - lattice.origin_y) / lattice.cell_size_y).floor() as usize).min(ny - 1);
        let cell = &mut sums[[j, i]];
        cell.0 += s.value;
        cell.1 += 1;
    }

    sums.mapv(|(sum, n)| (n > 0).then(|| sum / n as f64))
}

/// Starting surface: a coarser solution where available, else nearest sample
fn initial_guess(
    samples: &[ScatterSample],
    lattice: &RegularGrid,
    params: &MinCurvatureParams,
) -> GridResult<Array2<f64>> {
    let points: Vec<[f64; 2]> = samples.iter().map(|s| s.position()).collect();
    let tree = KdTree::build(&points);
    let nearest = |x: f64, y: f64| {
        tree.nearest([x, y])
            .map_or(f64::NAN, |(k, _)| samples[k].value)
    };

    let (nx, ny) = (lattice.nx(), lattice.ny());
    let coarse = if nx.min(ny) >= COARSE_START_MIN {
        let coarse_lattice = RegularGrid::filled(
            lattice.origin_x,
            lattice.origin_y,
            2.0 * lattice.cell_size_x,
            2.0 * lattice.cell_size_y,
            nx.div_ceil(2),
            ny.div_ceil(2),
            f64::NAN,
        )?;
        Some(solve(samples, &coarse_lattice, params)?)
    } else {
        None
    };

    let mut values = Array2::from_elem((ny, nx), f64::NAN);
    for ((j, i), v) in values.indexed_iter_mut() {
        let (x, y) = (lattice.x_center(i), lattice.y_center(j));
        let start = coarse
            .as_ref()
            .map_or(f64::NAN, |c| c.sample_bilinear(x, y));
        *v = if start.is_finite() { start } else { nearest(x, y) };
    }
    Ok(values)
}

/// Finite-difference biharmonic operator with linear continuation
struct Stencil {
    /// `1/dx⁴`
    xxxx: f64,
    /// `1/dy⁴`
    yyyy: f64,
    /// `2/(dx²·dy²)`
    xxyy: f64,
}

impl Stencil {
    fn new(dx: f64, dy: f64) -> Self {
        let (dx2, dy2) = (dx * dx, dy * dy);
        Self {
            xxxx: 1.0 / (dx2 * dx2),
            yyyy: 1.0 / (dy2 * dy2),
            xxyy: 2.0 / (dx2 * dy2),
        }
    }

    /// `∇⁴u` at node `(i, j)`
    fn residual(&self, values: &Array2<f64>, i: isize, j: isize) -> f64 {
        let (ny, nx) = values.dim();
        self.apply(|a, b| continued(a, b, nx, ny, |p, q| values[[q, p]]), i, j)
    }

    /// Coefficient of node `(i, j)` in its own residual
    fn diagonal(&self, nx: usize, ny: usize) -> Array2<f64> {
        Array2::from_shape_fn((ny, nx), |(j, i)| {
            let unit = |p: usize, q: usize| if p == i && q == j { 1.0 } else { 0.0 };
            self.apply(
                |a, b| continued(a, b, nx, ny, unit),
                i as isize,
                j as isize,
            )
        })
    }

    fn apply<F: Fn(isize, isize) -> f64>(&self, u: F, i: isize, j: isize) -> f64 {
        let c = u(i, j);
        let d4x = u(i - 2, j) - 4.0 * u(i - 1, j) + 6.0 * c - 4.0 * u(i + 1, j) + u(i + 2, j);
        let d4y = u(i, j - 2) - 4.0 * u(i, j - 1) + 6.0 * c - 4.0 * u(i, j + 1) + u(i, j + 2);
        let d2x2y = u(i + 1, j + 1) + u(i - 1, j + 1) + u(i + 1, j - 1) + u(i - 1, j - 1)
            - 2.0 * (u(i + 1, j) + u(i - 1, j) + u(i, j + 1) + u(i, j - 1))
            + 4.0 * c;
        self.xxxx * d4x + self.yyyy * d4y + self.xxyy * d2x2y
    }
}

/// Value at `(i, j)`, linearly continued beyond the lattice edges
fn continued<F: Fn(usize, usize) -> f64>(i: isize, j: isize, nx: usize, ny: usize, at: F) -> f64 {
    let along_y = |p: usize| continue_axis(j, ny, |q| at(p, q));
    continue_axis(i, nx, along_y)
}

fn continue_axis<F: Fn(usize) -> f64>(k: isize, n: usize, at: F) -> f64 {
    let last = n as isize - 1;
    if (0..=last).contains(&k) {
        return at(k as usize);
    }
    if n == 1 {
        return at(0);
    }
    if k < 0 {
        let steps = -k as f64;
        (1.0 + steps) * at(0) - steps * at(1)
    } else {
        let steps = (k - last) as f64;
        (1.0 + steps) * at(n - 1) - steps * at(n - 2)
    }
}

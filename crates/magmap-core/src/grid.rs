//! Regular grids and the grid builder
//!
//! A `RegularGrid` is a lattice of `nx × ny` rectangular cells. Cell `(i, j)`
//! covers `[x0 + i·dx, x0 + (i+1)·dx] × [y0 + j·dy, y0 + (j+1)·dy]` and is
//! sampled at its centre. Values are stored row-major in an `Array2` of shape
//! `(ny, nx)`; row 0 is the southern edge. Missing cells hold `NaN`.

use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::error::{validation, Axis, GridError, GridResult};
use crate::types::{Extent, ScatterSample};

/// A regular lattice of values
#[derive(Debug, Clone, PartialEq)]
pub struct RegularGrid {
    pub origin_x: f64,
    pub origin_y: f64,
    pub cell_size_x: f64,
    pub cell_size_y: f64,
    /// Shape `(ny, nx)`
    pub values: Array2<f64>,
}

impl RegularGrid {
    /// Create a grid from existing values
    pub fn new(
        origin_x: f64,
        origin_y: f64,
        cell_size_x: f64,
        cell_size_y: f64,
        values: Array2<f64>,
    ) -> GridResult<Self> {
        validation::positive("cell_size_x", cell_size_x)?;
        validation::positive("cell_size_y", cell_size_y)?;
        let (ny, nx) = values.dim();
        if nx == 0 || ny == 0 {
            return Err(GridError::parameter("values", "grid must have at least one cell"));
        }
        Ok(Self {
            origin_x,
            origin_y,
            cell_size_x,
            cell_size_y,
            values,
        })
    }

    /// Create a grid with every cell set to `value`
    pub fn filled(
        origin_x: f64,
        origin_y: f64,
        cell_size_x: f64,
        cell_size_y: f64,
        nx: usize,
        ny: usize,
        value: f64,
    ) -> GridResult<Self> {
        Self::new(
            origin_x,
            origin_y,
            cell_size_x,
            cell_size_y,
            Array2::from_elem((ny, nx), value),
        )
    }

    /// Same lattice, new values
    pub fn with_values(&self, values: Array2<f64>) -> GridResult<Self> {
        validation::same_len("grid rows", self.ny(), values.nrows())?;
        validation::same_len("grid columns", self.nx(), values.ncols())?;
        Ok(Self {
            values,
            ..self.clone()
        })
    }

    /// Number of columns
    pub fn nx(&self) -> usize {
        self.values.ncols()
    }

    /// Number of rows
    pub fn ny(&self) -> usize {
        self.values.nrows()
    }

    /// Easting of the centre of column `i`
    pub fn x_center(&self, i: usize) -> f64 {
        self.origin_x + (i as f64 + 0.5) * self.cell_size_x
    }

    /// Northing of the centre of row `j`
    pub fn y_center(&self, j: usize) -> f64 {
        self.origin_y + (j as f64 + 0.5) * self.cell_size_y
    }

    /// Column centre coordinates
    pub fn x_centers(&self) -> Vec<f64> {
        (0..self.nx()).map(|i| self.x_center(i)).collect()
    }

    /// Row centre coordinates
    pub fn y_centers(&self) -> Vec<f64> {
        (0..self.ny()).map(|j| self.y_center(j)).collect()
    }

    /// Every cell centre, row by row (row 0 first)
    pub fn cell_centers(&self) -> Vec<[f64; 2]> {
        let xs = self.x_centers();
        (0..self.ny())
            .flat_map(|j| {
                let y = self.y_center(j);
                xs.iter().map(move |&x| [x, y])
            })
            .collect()
    }

    /// Outer boundary of the grid
    pub fn extent(&self) -> Extent {
        Extent::new(
            self.origin_x,
            self.origin_x + self.nx() as f64 * self.cell_size_x,
            self.origin_y,
            self.origin_y + self.ny() as f64 * self.cell_size_y,
        )
    }

    /// Finite cell values, row by row
    pub fn finite_values(&self) -> Vec<f64> {
        self.values.iter().copied().filter(|v| v.is_finite()).collect()
    }

    /// Number of missing cells
    pub fn missing_count(&self) -> usize {
        self.values.iter().filter(|v| !v.is_finite()).count()
    }

    /// Bilinear interpolation between cell centres
    ///
    /// Returns `NaN` outside the span of cell centres, or when a corner that
    /// contributes to the result is missing.
    pub fn sample_bilinear(&self, x: f64, y: f64) -> f64 {
        let Some((i0, i1, tx)) = bracket(x, self.origin_x, self.cell_size_x, self.nx()) else {
            return f64::NAN;
        };
        let Some((j0, j1, ty)) = bracket(y, self.origin_y, self.cell_size_y, self.ny()) else {
            return f64::NAN;
        };

        let corners = [
            (j0, i0, (1.0 - tx) * (1.0 - ty)),
            (j0, i1, tx * (1.0 - ty)),
            (j1, i0, (1.0 - tx) * ty),
            (j1, i1, tx * ty),
        ];

        let mut sum = 0.0;
        for (j, i, w) in corners {
            if w == 0.0 {
                continue;
            }
            let v = self.values[[j, i]];
            if !v.is_finite() {
                return f64::NAN;
            }
            sum += w * v;
        }
        sum
    }
}

/// Locate `v` between two neighbouring centres along one axis
fn bracket(v: f64, origin: f64, cell: f64, n: usize) -> Option<(usize, usize, f64)> {
    if !v.is_finite() {
        return None;
    }
    let f = (v - origin) / cell - 0.5;
    let last = (n - 1) as f64;
    if f < 0.0 || f > last {
        return None;
    }
    if n == 1 {
        return Some((0, 0, 0.0));
    }
    let i0 = (f.floor() as usize).min(n - 2);
    Some((i0, i0 + 1, f - i0 as f64))
}

/// How the builder derives cell sizes and counts
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GridSizing {
    /// Cell size given; counts are `ceil(extent / cell)` (at least 1)
    CellSize { dx: f64, dy: f64 },
    /// Counts given; cell size is `extent / n`
    Resolution { nx: usize, ny: usize },
    /// Both given; nothing is derived
    Explicit {
        dx: f64,
        dy: f64,
        nx: usize,
        ny: usize,
    },
}

impl GridSizing {
    /// Square cells of the given size
    pub fn square(cell_size: f64) -> Self {
        GridSizing::CellSize {
            dx: cell_size,
            dy: cell_size,
        }
    }
}

/// Builds an empty (all-NaN) lattice covering a set of samples
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridBuilder {
    sizing: GridSizing,
    origin: Option<(f64, f64)>,
}

impl GridBuilder {
    pub fn new(sizing: GridSizing) -> Self {
        Self {
            sizing,
            origin: None,
        }
    }

    /// Square cells of the given size with automatic counts
    pub fn with_cell_size(cell_size: f64) -> Self {
        Self::new(GridSizing::square(cell_size))
    }

    /// Override the origin (must not lie above/right of any sample)
    pub fn origin(mut self, x: f64, y: f64) -> Self {
        self.origin = Some((x, y));
        self
    }

    /// Build the lattice for `samples`
    pub fn build(&self, samples: &[ScatterSample]) -> GridResult<RegularGrid> {
        let extent = Extent::of_samples(samples).ok_or(GridError::EmptyInput)?;

        let (x0, y0) = self.origin.unwrap_or((extent.min_x, extent.min_y));
        if !(x0.is_finite() && y0.is_finite()) || x0 > extent.min_x || y0 > extent.min_y {
            return Err(GridError::parameter(
                "origin",
                format!(
                    "({}, {}) must lie at or below the sample minimum ({}, {})",
                    x0, y0, extent.min_x, extent.min_y
                ),
            ));
        }
        let span_x = extent.max_x - x0;
        let span_y = extent.max_y - y0;

        let (dx, dy, nx, ny) = match self.sizing {
            GridSizing::CellSize { dx, dy } => {
                validation::positive("dx", dx)?;
                validation::positive("dy", dy)?;
                require_extent(Axis::X, span_x, extent.min_x)?;
                require_extent(Axis::Y, span_y, extent.min_y)?;
                (
                    dx,
                    dy,
                    cell_count(x0, extent.max_x, dx),
                    cell_count(y0, extent.max_y, dy),
                )
            }
            GridSizing::Resolution { nx, ny } => {
                require_count("nx", nx)?;
                require_count("ny", ny)?;
                require_extent(Axis::X, span_x, extent.min_x)?;
                require_extent(Axis::Y, span_y, extent.min_y)?;
                (span_x / nx as f64, span_y / ny as f64, nx, ny)
            }
            GridSizing::Explicit { dx, dy, nx, ny } => {
                validation::positive("dx", dx)?;
                validation::positive("dy", dy)?;
                require_count("nx", nx)?;
                require_count("ny", ny)?;
                (dx, dy, nx, ny)
            }
        };

        tracing::debug!(
            "Grid {}x{} cells of {}x{} at origin ({}, {})",
            nx,
            ny,
            dx,
            dy,
            x0,
            y0
        );
        RegularGrid::filled(x0, y0, dx, dy, nx, ny, f64::NAN)
    }
}

/// Fewest cells (at least 1) whose far edge `origin + n * cell` reaches `max`
pub(crate) fn cell_count(origin: f64, max: f64, cell: f64) -> usize {
    let mut n = (((max - origin) / cell).floor() as usize).max(1);
    while origin + n as f64 * cell < max {
        n += 1;
    }
    n
}

fn require_extent(axis: Axis, span: f64, value: f64) -> GridResult<()> {
    if span <= 0.0 {
        return Err(GridError::DegenerateExtent { axis, value });
    }
    Ok(())
}

fn require_count(name: &str, n: usize) -> GridResult<()> {
    if n == 0 {
        return Err(GridError::parameter(name, "cell count must be at least 1"));
    }
    Ok(())
}

//! Contour lines
//!
//! Isolines are traced with marching squares over the cell centres of a
//! `RegularGrid`. A square with a missing corner produces no segment, so
//! lines stop at masked areas. Segments are not joined into polylines;
//! they are only drawn.

use crate::error::{validation, GridError, GridResult};
use crate::grid::RegularGrid;
use crate::render::RgbaImage;

/// Number of contour levels offered by default
pub const DEFAULT_CONTOURS: usize = 50;

/// Line color of drawn contours
pub const CONTOUR_COLOR: [u8; 4] = [0, 0, 0, 255];

/// Straight piece of an isoline, in map coordinates
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Segment {
    pub start: [f64; 2],
    pub end: [f64; 2],
}

impl Segment {
    pub fn length(&self) -> f64 {
        (self.end[0] - self.start[0]).hypot(self.end[1] - self.start[1])
    }
}

/// All segments of one contour level
#[derive(Debug, Clone, PartialEq)]
pub struct Isoline {
    pub level: f64,
    pub segments: Vec<Segment>,
}

/// `n` evenly spaced levels from `vmin` to `vmax`, both included
pub fn contour_levels(vmin: f64, vmax: f64, n: usize) -> GridResult<Vec<f64>> {
    validation::ordered_range(vmin, vmax)?;
    if n < 2 {
        return Err(GridError::parameter(
            "contours",
            format!("need at least 2 levels, got {}", n),
        ));
    }
    let step = (vmax - vmin) / (n - 1) as f64;
    Ok((0..n)
        .map(|k| if k == n - 1 { vmax } else { vmin + k as f64 * step })
        .collect())
}

// Edges of a square, counter-clockwise from the south
#[derive(Clone, Copy)]
enum Edge {
    South,
    East,
    North,
    West,
}

/// Isoline of `level` through the grid
pub fn isoline(grid: &RegularGrid, level: f64) -> Isoline {
    let mut segments = Vec::new();
    let (ny, nx) = grid.values.dim();
    if nx < 2 || ny < 2 || !level.is_finite() {
        return Isoline { level, segments };
    }

    for j in 0..ny - 1 {
        for i in 0..nx - 1 {
            let sw = grid.values[[j, i]];
            let se = grid.values[[j, i + 1]];
            let ne = grid.values[[j + 1, i + 1]];
            let nw = grid.values[[j + 1, i]];
            if [sw, se, ne, nw].iter().any(|v| v.is_nan()) {
                continue;
            }

            let case = (sw >= level) as u8
                | ((se >= level) as u8) << 1
                | ((ne >= level) as u8) << 2
                | ((nw >= level) as u8) << 3;

            // Saddles resolved by the square's mean
            let center_high = (sw + se + ne + nw) / 4.0 >= level;
            let pairs: &[(Edge, Edge)] = match case {
                0 | 15 => &[],
                1 | 14 => &[(Edge::West, Edge::South)],
                2 | 13 => &[(Edge::South, Edge::East)],
                3 | 12 => &[(Edge::West, Edge::East)],
                4 | 11 => &[(Edge::East, Edge::North)],
                6 | 9 => &[(Edge::South, Edge::North)],
                7 | 8 => &[(Edge::West, Edge::North)],
                5 if center_high => &[(Edge::South, Edge::East), (Edge::West, Edge::North)],
                5 => &[(Edge::West, Edge::South), (Edge::East, Edge::North)],
                10 if center_high => &[(Edge::West, Edge::South), (Edge::East, Edge::North)],
                _ => &[(Edge::South, Edge::East), (Edge::West, Edge::North)],
            };

            let crossing = |edge: Edge| -> [f64; 2] {
                // (corner a, corner b, value a, value b) in index space
                let (a, b, va, vb) = match edge {
                    Edge::South => ((i, j), (i + 1, j), sw, se),
                    Edge::East => ((i + 1, j), (i + 1, j + 1), se, ne),
                    Edge::North => ((i, j + 1), (i + 1, j + 1), nw, ne),
                    Edge::West => ((i, j), (i, j + 1), sw, nw),
                };
                let t = (level - va) / (vb - va);
                let x = grid.x_center(a.0) + t * (grid.x_center(b.0) - grid.x_center(a.0));
                let y = grid.y_center(a.1) + t * (grid.y_center(b.1) - grid.y_center(a.1));
                [x, y]
            };

            for &(from, to) in pairs {
                segments.push(Segment {
                    start: crossing(from),
                    end: crossing(to),
                });
            }
        }
    }
    Isoline { level, segments }
}

/// Isolines of every level
pub fn isolines(grid: &RegularGrid, levels: &[f64]) -> Vec<Isoline> {
    let lines: Vec<Isoline> = levels.iter().map(|&level| isoline(grid, level)).collect();
    tracing::debug!(
        "Traced {} contour levels ({} segments)",
        lines.len(),
        lines.iter().map(|l| l.segments.len()).sum::<usize>()
    );
    lines
}

/// Draw isolines one pixel wide into an image covering the same extent
pub fn draw_isolines(image: &mut RgbaImage, lines: &[Isoline], color: [u8; 4]) {
    let (width, height) = (image.width(), image.height());
    if width == 0 || height == 0 {
        return;
    }
    let extent = image.extent;
    let px = extent.width() / width as f64;
    let py = extent.height() / height as f64;
    // Pixel (col, row) of a map point; pixel centres sit on whole numbers
    let to_pixel = |p: [f64; 2]| {
        (
            (p[0] - extent.min_x) / px - 0.5,
            (p[1] - extent.min_y) / py - 0.5,
        )
    };

    for segment in lines.iter().flat_map(|line| &line.segments) {
        let (c0, r0) = to_pixel(segment.start);
        let (c1, r1) = to_pixel(segment.end);
        let steps = (c1 - c0).abs().max((r1 - r0).abs()).ceil().max(1.0) as usize;
        for k in 0..=steps {
            let t = k as f64 / steps as f64;
            let col = (c0 + t * (c1 - c0)).round();
            let row = (r0 + t * (r1 - r0)).round();
            if col >= 0.0 && row >= 0.0 && (col as usize) < width && (row as usize) < height {
                image.set(row as usize, col as usize, color);
            }
        }
    }
}

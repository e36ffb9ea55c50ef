//! Scattered-data interpolation
//!
//! `interpolate` maps irregular samples to arbitrary query positions with
//! one of four methods:
//!
//! - `Nearest`: value of the closest sample
//! - `Linear`: barycentric interpolation on the Delaunay triangulation
//! - `Cubic`: cubic Bézier triangle patches over the same triangulation,
//!   with vertex gradients fitted by weighted least squares
//! - `MinimumCurvature`: bilinear sampling of a minimum-curvature surface
//!
//! Triangulated methods return `NaN` outside the convex hull of the samples.

use std::fmt;
use std::str::FromStr;

use nalgebra::{Matrix2, Vector2};
use serde::{Deserialize, Serialize};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::error::{GridError, GridResult};
use crate::grid::RegularGrid;
use crate::min_curvature::{self, MinCurvatureParams};
use crate::spatial::{KdTree, Location, Triangulation};
use crate::types::{finite_samples, ScatterSample};

/// Interpolation strategy
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InterpolationMethod {
    Nearest,
    Linear,
    Cubic,
    MinimumCurvature(MinCurvatureParams),
}

impl Default for InterpolationMethod {
    fn default() -> Self {
        InterpolationMethod::MinimumCurvature(MinCurvatureParams::default())
    }
}

impl InterpolationMethod {
    /// Canonical name, as accepted by `FromStr`
    pub fn name(&self) -> &'static str {
        match self {
            InterpolationMethod::Nearest => "nearest",
            InterpolationMethod::Linear => "linear",
            InterpolationMethod::Cubic => "cubic",
            InterpolationMethod::MinimumCurvature(_) => "minimumCurvature",
        }
    }
}

impl fmt::Display for InterpolationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for InterpolationMethod {
    type Err = GridError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "nearest" => Ok(InterpolationMethod::Nearest),
            "linear" => Ok(InterpolationMethod::Linear),
            "cubic" => Ok(InterpolationMethod::Cubic),
            "minimumCurvature" | "minimum_curvature" | "min_curvature" => Ok(
                InterpolationMethod::MinimumCurvature(MinCurvatureParams::default()),
            ),
            other => Err(GridError::unsupported(other)),
        }
    }
}

/// Trait for scattered-to-point interpolation backends
pub trait ScatteredInterpolator {
    /// One value per query position, `NaN` where the method cannot
    /// produce one
    fn interpolate(
        &self,
        samples: &[ScatterSample],
        queries: &[[f64; 2]],
        method: &InterpolationMethod,
    ) -> GridResult<Vec<f64>>;

    /// Fill every cell of `lattice` from its centre
    fn interpolate_grid(
        &self,
        samples: &[ScatterSample],
        lattice: &RegularGrid,
        method: &InterpolationMethod,
    ) -> GridResult<RegularGrid> {
        let values = self.interpolate(samples, &lattice.cell_centers(), method)?;
        fill_lattice(lattice, values)
    }
}

/// Built-in interpolator backed by the kd-tree and Delaunay triangulation
#[derive(Debug, Clone, Copy, Default)]
pub struct TriangulatedInterpolator;

impl ScatteredInterpolator for TriangulatedInterpolator {
    fn interpolate(
        &self,
        samples: &[ScatterSample],
        queries: &[[f64; 2]],
        method: &InterpolationMethod,
    ) -> GridResult<Vec<f64>> {
        let samples = finite_samples(samples);
        if samples.is_empty() {
            return Err(GridError::EmptyInput);
        }
        tracing::debug!(
            "Interpolating {} samples at {} positions ({})",
            samples.len(),
            queries.len(),
            method
        );

        match method {
            InterpolationMethod::Nearest => {
                let points: Vec<[f64; 2]> = samples.iter().map(|s| s.position()).collect();
                let tree = KdTree::build(&points);
                Ok(map_queries(queries, |q| {
                    tree.nearest(q).map_or(f64::NAN, |(i, _)| samples[i].value)
                }))
            }
            InterpolationMethod::Linear => {
                let mesh = Mesh::new(&samples);
                Ok(map_queries(queries, |q| mesh.linear(q)))
            }
            InterpolationMethod::Cubic => {
                let mesh = Mesh::new(&samples);
                let gradients = mesh.gradients();
                Ok(map_queries(queries, |q| mesh.cubic(q, &gradients)))
            }
            InterpolationMethod::MinimumCurvature(params) => {
                let surface = min_curvature::min_curvature(&samples, params)?;
                Ok(map_queries(queries, |q| surface.sample_bilinear(q[0], q[1])))
            }
        }
    }

    fn interpolate_grid(
        &self,
        samples: &[ScatterSample],
        lattice: &RegularGrid,
        method: &InterpolationMethod,
    ) -> GridResult<RegularGrid> {
        if let InterpolationMethod::MinimumCurvature(params) = method {
            return min_curvature::solve(&finite_samples(samples), lattice, params);
        }
        let values = self.interpolate(samples, &lattice.cell_centers(), method)?;
        fill_lattice(lattice, values)
    }
}

/// Interpolate with the built-in backend
pub fn interpolate(
    samples: &[ScatterSample],
    queries: &[[f64; 2]],
    method: &InterpolationMethod,
) -> GridResult<Vec<f64>> {
    TriangulatedInterpolator.interpolate(samples, queries, method)
}

/// Fill a lattice with the built-in backend
pub fn interpolate_grid(
    samples: &[ScatterSample],
    lattice: &RegularGrid,
    method: &InterpolationMethod,
) -> GridResult<RegularGrid> {
    TriangulatedInterpolator.interpolate_grid(samples, lattice, method)
}

fn fill_lattice(lattice: &RegularGrid, values: Vec<f64>) -> GridResult<RegularGrid> {
    let values = ndarray::Array2::from_shape_vec((lattice.ny(), lattice.nx()), values)
        .map_err(|e| GridError::parameter("values", e.to_string()))?;
    lattice.with_values(values)
}

fn map_queries<F>(queries: &[[f64; 2]], f: F) -> Vec<f64>
where
    F: Fn([f64; 2]) -> f64 + Sync + Send,
{
    #[cfg(feature = "parallel")]
    {
        queries.par_iter().map(|&q| f(q)).collect()
    }

    #[cfg(not(feature = "parallel"))]
    {
        queries.iter().map(|&q| f(q)).collect()
    }
}

/// Triangulation with per-vertex values and a locator index
struct Mesh {
    tri: Triangulation,
    values: Vec<f64>,
    index: KdTree,
}

impl Mesh {
    fn new(samples: &[ScatterSample]) -> Self {
        let points: Vec<[f64; 2]> = samples.iter().map(|s| s.position()).collect();
        let tri = Triangulation::new(&points);
        let values = tri.sources().iter().map(|&i| samples[i].value).collect();
        let index = KdTree::build(tri.vertices());
        if tri.is_empty() {
            tracing::warn!(
                "Samples do not span an area; triangulated interpolation yields no values"
            );
        }
        Self { tri, values, index }
    }

    fn locate(&self, q: [f64; 2]) -> Option<Location> {
        let hint = self
            .index
            .nearest(q)
            .and_then(|(v, _)| self.tri.vertex_triangle(v));
        self.tri.locate(q, hint)
    }

    fn linear(&self, q: [f64; 2]) -> f64 {
        match self.locate(q) {
            Some(loc) => {
                let t = self.tri.triangles()[loc.triangle];
                (0..3).map(|k| loc.weights[k] * self.values[t[k]]).sum()
            }
            None => f64::NAN,
        }
    }

    /// Inverse-distance-squared weighted least-squares gradient per vertex
    fn gradients(&self) -> Vec<Vector2<f64>> {
        let vertices = self.tri.vertices();
        self.tri
            .vertex_neighbors()
            .iter()
            .enumerate()
            .map(|(i, neighbors)| {
                let mut normal = Matrix2::zeros();
                let mut rhs = Vector2::zeros();
                for &j in neighbors {
                    let d = Vector2::new(
                        vertices[j][0] - vertices[i][0],
                        vertices[j][1] - vertices[i][1],
                    );
                    let len_sq = d.norm_squared();
                    if len_sq == 0.0 {
                        continue;
                    }
                    let w = 1.0 / len_sq;
                    normal += w * d * d.transpose();
                    rhs += w * (self.values[j] - self.values[i]) * d;
                }
                normal
                    .try_inverse()
                    .map_or_else(Vector2::zeros, |inv| inv * rhs)
            })
            .collect()
    }

    fn cubic(&self, q: [f64; 2], gradients: &[Vector2<f64>]) -> f64 {
        let Some(loc) = self.locate(q) else {
            return f64::NAN;
        };
        let t = self.tri.triangles()[loc.triangle];
        let p: Vec<Vector2<f64>> = t
            .iter()
            .map(|&v| Vector2::new(self.tri.vertices()[v][0], self.tri.vertices()[v][1]))
            .collect();
        let f: Vec<f64> = t.iter().map(|&v| self.values[v]).collect();
        let g: Vec<Vector2<f64>> = t.iter().map(|&v| gradients[v]).collect();

        // Edge control points: b_ij sits a third of the way from vertex i to j
        let edge = |i: usize, j: usize| f[i] + g[i].dot(&(p[j] - p[i])) / 3.0;
        let b210 = edge(0, 1);
        let b201 = edge(0, 2);
        let b120 = edge(1, 0);
        let b021 = edge(1, 2);
        let b102 = edge(2, 0);
        let b012 = edge(2, 1);

        let e = (b210 + b201 + b120 + b021 + b102 + b012) / 6.0;
        let v = (f[0] + f[1] + f[2]) / 3.0;
        let b111 = e + (e - v) / 2.0;

        let [u, v, w] = loc.weights;
        f[0] * u * u * u
            + f[1] * v * v * v
            + f[2] * w * w * w
            + 3.0 * (b210 * u * u * v + b201 * u * u * w + b120 * u * v * v)
            + 3.0 * (b021 * v * v * w + b102 * u * w * w + b012 * v * w * w)
            + 6.0 * b111 * u * v * w
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::GridBuilder;

    fn plane_samples() -> Vec<ScatterSample> {
        let mut samples = Vec::new();
        for j in 0..6 {
            for i in 0..6 {
                let x = i as f64 * 20.0 + (j as f64 * 3.0);
                let y = j as f64 * 20.0;
                samples.push(ScatterSample::new(x, y, 2.0 * x - 0.5 * y + 10.0));
            }
        }
        samples
    }

    #[test]
    fn test_method_from_str() {
        assert_eq!(
            "nearest".parse::<InterpolationMethod>().unwrap(),
            InterpolationMethod::Nearest
        );
        assert!(matches!(
            "minimumCurvature".parse::<InterpolationMethod>().unwrap(),
            InterpolationMethod::MinimumCurvature(_)
        ));
        let err = "kriging".parse::<InterpolationMethod>().unwrap_err();
        assert!(matches!(err, GridError::UnsupportedMethod { name } if name == "kriging"));
    }

    #[test]
    fn test_method_display_round_trip() {
        for method in [
            InterpolationMethod::Nearest,
            InterpolationMethod::Linear,
            InterpolationMethod::Cubic,
            InterpolationMethod::default(),
        ] {
            let parsed: InterpolationMethod = method.to_string().parse().unwrap();
            assert_eq!(parsed.name(), method.name());
        }
    }

    #[test]
    fn test_nearest() {
        let samples = vec![
            ScatterSample::new(0.0, 0.0, 1.0),
            ScatterSample::new(10.0, 0.0, 2.0),
        ];
        let values = interpolate(
            &samples,
            &[[1.0, 0.0], [9.0, 5.0], [100.0, 100.0]],
            &InterpolationMethod::Nearest,
        )
        .unwrap();
        assert_eq!(values, vec![1.0, 2.0, 2.0]);
    }

    #[test]
    fn test_linear_reproduces_plane() {
        let samples = plane_samples();
        let queries = [[30.0, 30.0], [55.5, 71.0], [90.0, 10.0]];
        let values = interpolate(&samples, &queries, &InterpolationMethod::Linear).unwrap();

        for (q, v) in queries.iter().zip(values) {
            let expected = 2.0 * q[0] - 0.5 * q[1] + 10.0;
            assert!((v - expected).abs() < 1e-8, "{} vs {}", v, expected);
        }
    }

    #[test]
    fn test_linear_outside_hull_is_nan() {
        let values =
            interpolate(&plane_samples(), &[[-50.0, 0.0]], &InterpolationMethod::Linear).unwrap();
        assert!(values[0].is_nan());
    }

    #[test]
    fn test_linear_exact_at_samples() {
        let samples = vec![
            ScatterSample::new(0.0, 0.0, 1.0),
            ScatterSample::new(10.0, 0.0, 2.0),
            ScatterSample::new(0.0, 10.0, 3.0),
            ScatterSample::new(10.0, 10.0, 4.0),
        ];
        let queries: Vec<[f64; 2]> = samples.iter().map(|s| s.position()).collect();
        let values = interpolate(&samples, &queries, &InterpolationMethod::Linear).unwrap();
        for (s, v) in samples.iter().zip(values) {
            assert!((v - s.value).abs() < 1e-12);
        }
    }

    #[test]
    fn test_cubic_reproduces_plane() {
        let samples = plane_samples();
        let queries = [[30.0, 30.0], [47.0, 63.0]];
        let values = interpolate(&samples, &queries, &InterpolationMethod::Cubic).unwrap();

        for (q, v) in queries.iter().zip(values) {
            let expected = 2.0 * q[0] - 0.5 * q[1] + 10.0;
            assert!((v - expected).abs() < 1e-6, "{} vs {}", v, expected);
        }
    }

    #[test]
    fn test_too_few_samples_gives_nan() {
        let samples = vec![
            ScatterSample::new(0.0, 0.0, 1.0),
            ScatterSample::new(10.0, 0.0, 2.0),
        ];
        let values = interpolate(&samples, &[[5.0, 0.0]], &InterpolationMethod::Linear).unwrap();
        assert!(values[0].is_nan());
        let values = interpolate(&samples, &[[5.0, 0.0]], &InterpolationMethod::Cubic).unwrap();
        assert!(values[0].is_nan());
    }

    #[test]
    fn test_empty_input() {
        let err = interpolate(&[], &[[0.0, 0.0]], &InterpolationMethod::Nearest).unwrap_err();
        assert!(matches!(err, GridError::EmptyInput));
    }

    #[test]
    fn test_interpolate_grid_shape() {
        let samples = plane_samples();
        let lattice = GridBuilder::with_cell_size(10.0).build(&samples).unwrap();
        let grid = interpolate_grid(&samples, &lattice, &InterpolationMethod::Nearest).unwrap();

        assert_eq!(grid.values.dim(), lattice.values.dim());
        assert_eq!(grid.missing_count(), 0);
    }

    #[test]
    fn test_minimum_curvature_query() {
        let mut samples = Vec::new();
        for j in 0..6 {
            for i in 0..6 {
                let (x, y) = (i as f64 * 20.0, j as f64 * 20.0);
                samples.push(ScatterSample::new(x, y, 2.0 * x - 0.5 * y + 10.0));
            }
        }
        let method = InterpolationMethod::MinimumCurvature(MinCurvatureParams {
            grid_size: 10.0,
            ..Default::default()
        });
        let values = interpolate(&samples, &[[50.0, 50.0], [40.0, 60.0]], &method).unwrap();

        assert!((values[0] - 85.0).abs() < 1.0);
        assert!((values[1] - 60.0).abs() < 1e-6);
    }
}

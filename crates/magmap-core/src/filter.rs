//! Grid filters for magnetic interpretation
//!
//! Horizontal derivatives are central finite differences (one-sided at the
//! edges). Vertical derivative, upward continuation and reduction to the
//! pole work in the wavenumber domain: missing cells are filled with the
//! grid mean, the grid is transformed, multiplied by the filter response,
//! transformed back, and the missing cells are restored as `NaN`.

use std::f64::consts::PI;
use std::fmt;
use std::str::FromStr;

use nalgebra::Complex;
use ndarray::{Array2, Axis as ArrayAxis};
use serde::{Deserialize, Serialize};

use crate::error::{GridError, GridResult};
use crate::grid::RegularGrid;

/// A derived grid
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GridFilter {
    DerivativeX,
    DerivativeY,
    DerivativeZ,
    TotalHorizontalGradient,
    TiltAngle,
    /// Field continued `height` map units above the observation surface
    UpwardContinuation { height: f64 },
    /// Field reduced to the pole for the given ambient direction in degrees
    ReductionToPole { inclination: f64, declination: f64 },
}

impl GridFilter {
    pub fn name(&self) -> &'static str {
        match self {
            GridFilter::DerivativeX => "derivativeX",
            GridFilter::DerivativeY => "derivativeY",
            GridFilter::DerivativeZ => "derivativeZ",
            GridFilter::TotalHorizontalGradient => "totalHorizontalGradient",
            GridFilter::TiltAngle => "tiltAngle",
            GridFilter::UpwardContinuation { .. } => "upwardContinuation",
            GridFilter::ReductionToPole { .. } => "RTP",
        }
    }

    /// Check parameter domains
    pub fn validate(&self) -> GridResult<()> {
        match *self {
            GridFilter::UpwardContinuation { height } if !(height.is_finite() && height >= 0.0) => {
                Err(GridError::parameter(
                    "height",
                    format!("must be finite and non-negative, got {}", height),
                ))
            }
            GridFilter::ReductionToPole {
                inclination,
                declination,
            } if !(inclination.is_finite() && declination.is_finite()) => Err(
                GridError::parameter("inclination/declination", "must be finite"),
            ),
            _ => Ok(()),
        }
    }

    /// Apply to `grid`, keeping its geometry
    pub fn apply(&self, grid: &RegularGrid) -> GridResult<RegularGrid> {
        self.validate()?;
        let (dx, dy) = (grid.cell_size_x, grid.cell_size_y);
        let values = &grid.values;

        let out = match *self {
            GridFilter::DerivativeX => gradient(values, ArrayAxis(1), dx),
            GridFilter::DerivativeY => gradient(values, ArrayAxis(0), dy),
            GridFilter::DerivativeZ => spectral(values, dx, dy, |_, _, k| Complex::new(k, 0.0)),
            GridFilter::TotalHorizontalGradient => total_horizontal_gradient(values, dx, dy),
            GridFilter::TiltAngle => {
                let dz = spectral(values, dx, dy, |_, _, k| Complex::new(k, 0.0));
                let thg = total_horizontal_gradient(values, dx, dy);
                ndarray::Zip::from(&dz)
                    .and(&thg)
                    .map_collect(|&v, &h| v.atan2(h))
            }
            GridFilter::UpwardContinuation { height } => spectral(values, dx, dy, |_, _, k| {
                Complex::new((-k * height).exp(), 0.0)
            }),
            GridFilter::ReductionToPole {
                inclination,
                declination,
            } => {
                let (inc, dec) = (inclination.to_radians(), declination.to_radians());
                // Unit field direction: east, north, down
                let (fe, fn_, fz) = (inc.cos() * dec.sin(), inc.cos() * dec.cos(), inc.sin());
                spectral(values, dx, dy, |kx, ky, k| {
                    if k == 0.0 {
                        return Complex::new(1.0, 0.0);
                    }
                    let theta = Complex::new(fz, (fe * kx + fn_ * ky) / k);
                    Complex::new(1.0, 0.0) / (theta * theta)
                })
            }
        };

        tracing::debug!(
            "Applied {} to {}x{} grid",
            self.name(),
            grid.nx(),
            grid.ny()
        );
        grid.with_values(out)
    }
}

impl fmt::Display for GridFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Parse a parameterless filter name; continuation and RTP take their
/// parameters from defaults (`height` 0, vertical field)
impl FromStr for GridFilter {
    type Err = GridError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "derivativeX" | "derivative_x" | "dx" => Ok(GridFilter::DerivativeX),
            "derivativeY" | "derivative_y" | "dy" => Ok(GridFilter::DerivativeY),
            "derivativeZ" | "derivative_z" | "dz" => Ok(GridFilter::DerivativeZ),
            "totalHorizontalGradient" | "total_horizontal_gradient" | "thg" => {
                Ok(GridFilter::TotalHorizontalGradient)
            }
            "tiltAngle" | "tilt_angle" | "tilt" => Ok(GridFilter::TiltAngle),
            "upwardContinuation" | "upward_continuation" => {
                Ok(GridFilter::UpwardContinuation { height: 0.0 })
            }
            "RTP" | "rtp" | "reduction_to_pole" => Ok(GridFilter::ReductionToPole {
                inclination: 90.0,
                declination: 0.0,
            }),
            other => Err(GridError::unsupported(other)),
        }
    }
}

/// Central differences along `axis`, one-sided at the ends
pub(crate) fn gradient(values: &Array2<f64>, axis: ArrayAxis, step: f64) -> Array2<f64> {
    let mut out = Array2::from_elem(values.dim(), f64::NAN);
    let n = values.len_of(axis);
    if n < 2 {
        return out;
    }
    for (lane, mut out_lane) in values.lanes(axis).into_iter().zip(out.lanes_mut(axis)) {
        out_lane[0] = (lane[1] - lane[0]) / step;
        out_lane[n - 1] = (lane[n - 1] - lane[n - 2]) / step;
        for i in 1..n - 1 {
            out_lane[i] = (lane[i + 1] - lane[i - 1]) / (2.0 * step);
        }
    }
    out
}

fn total_horizontal_gradient(values: &Array2<f64>, dx: f64, dy: f64) -> Array2<f64> {
    let gx = gradient(values, ArrayAxis(1), dx);
    let gy = gradient(values, ArrayAxis(0), dy);
    ndarray::Zip::from(&gx)
        .and(&gy)
        .map_collect(|&a, &b| a.hypot(b))
}

/// Angular wavenumbers of a transform of length `n` with spacing `d`
fn wavenumbers(n: usize, d: f64) -> Vec<f64> {
    let half = n.div_ceil(2);
    (0..n)
        .map(|i| {
            let index = if i < half {
                i as f64
            } else {
                i as f64 - n as f64
            };
            2.0 * PI * index / (n as f64 * d)
        })
        .collect()
}

/// Multiply the spectrum of `values` by `response(kx, ky, |k|)`
fn spectral<F>(values: &Array2<f64>, dx: f64, dy: f64, response: F) -> Array2<f64>
where
    F: Fn(f64, f64, f64) -> Complex<f64>,
{
    let (ny, nx) = values.dim();
    let finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if finite.is_empty() {
        return Array2::from_elem((ny, nx), f64::NAN);
    }
    let mean = finite.iter().sum::<f64>() / finite.len() as f64;

    let mut spectrum = values.mapv(|v| Complex::new(if v.is_finite() { v } else { mean }, 0.0));
    dft_2d(&mut spectrum, false);

    let kx = wavenumbers(nx, dx);
    let ky = wavenumbers(ny, dy);
    for ((j, i), c) in spectrum.indexed_iter_mut() {
        let k = kx[i].hypot(ky[j]);
        *c *= response(kx[i], ky[j], k);
    }

    dft_2d(&mut spectrum, true);
    ndarray::Zip::from(&spectrum)
        .and(values)
        .map_collect(|c, &v| if v.is_finite() { c.re } else { f64::NAN })
}

/// In-place separable 2-D transform; the inverse is scaled by `1/(nx*ny)`
fn dft_2d(data: &mut Array2<Complex<f64>>, inverse: bool) {
    for axis in [ArrayAxis(1), ArrayAxis(0)] {
        let n = data.len_of(axis);
        let plan = Transform::new(n, inverse);
        let mut buffer = vec![Complex::new(0.0, 0.0); n];
        for mut lane in data.lanes_mut(axis) {
            for (b, v) in buffer.iter_mut().zip(lane.iter()) {
                *b = *v;
            }
            plan.run(&mut buffer);
            for (v, b) in lane.iter_mut().zip(&buffer) {
                *v = *b;
            }
        }
    }
}

/// 1-D discrete Fourier transform of a fixed length
///
/// Power-of-two lengths use an iterative radix-2 FFT; other lengths fall
/// back to the direct sum.
struct Transform {
    n: usize,
    inverse: bool,
    twiddles: Vec<Complex<f64>>,
}

impl Transform {
    fn new(n: usize, inverse: bool) -> Self {
        let sign = if inverse { 1.0 } else { -1.0 };
        let twiddles = (0..n)
            .map(|k| {
                let angle = sign * 2.0 * PI * k as f64 / n as f64;
                Complex::new(angle.cos(), angle.sin())
            })
            .collect();
        Self {
            n,
            inverse,
            twiddles,
        }
    }

    fn run(&self, data: &mut [Complex<f64>]) {
        if self.n < 2 {
            return;
        }
        if self.n.is_power_of_two() {
            self.radix2(data);
        } else {
            self.direct(data);
        }
        if self.inverse {
            let scale = 1.0 / self.n as f64;
            for v in data.iter_mut() {
                *v *= scale;
            }
        }
    }

    fn direct(&self, data: &mut [Complex<f64>]) {
        let n = self.n;
        let input = data.to_vec();
        for (k, out) in data.iter_mut().enumerate() {
            *out = input
                .iter()
                .enumerate()
                .map(|(t, &x)| x * self.twiddles[(k * t) % n])
                .sum();
        }
    }

    fn radix2(&self, data: &mut [Complex<f64>]) {
        let n = self.n;
        let bits = n.trailing_zeros();
        for i in 0..n {
            let j = i.reverse_bits() >> (usize::BITS - bits);
            if j > i {
                data.swap(i, j);
            }
        }

        let mut len = 2;
        while len <= n {
            let stride = n / len;
            for start in (0..n).step_by(len) {
                for k in 0..len / 2 {
                    let w = self.twiddles[k * stride];
                    let a = data[start + k];
                    let b = data[start + k + len / 2] * w;
                    data[start + k] = a + b;
                    data[start + k + len / 2] = a - b;
                }
            }
            len <<= 1;
        }
    }
}

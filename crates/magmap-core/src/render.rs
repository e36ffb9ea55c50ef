//! Grid rendering
//!
//! Produces an `RgbaImage` from a `RegularGrid`: cell colors from a
//! `ColorScale` painted over white, optionally overlaid with a hillshade
//! layer lit from a configurable sun position.

use ndarray::{Array2, Array3, Axis as ArrayAxis};
use serde::{Deserialize, Serialize};

use crate::colormap::{get_colormap, Color, Colormap};
use crate::equalize::HistogramEqualizer;
use crate::error::{validation, GridError, GridResult};
use crate::filter::gradient;
use crate::grid::RegularGrid;
use crate::norm::{rounded_limits, ColorNorm, Normalization};
use crate::types::Extent;

/// Default opacity of the colored layer
pub const DEFAULT_ALPHA: f32 = 0.5;

/// Sun position and shading strength
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HillshadeParams {
    /// Sun azimuth in degrees clockwise from north
    pub azimuth: f64,
    /// Sun elevation above the horizon in degrees
    pub altitude: f64,
    /// Vertical exaggeration applied to the grid values
    pub vertical_exaggeration: f64,
    /// Opacity of the shading layer
    pub alpha_hs: f32,
}

impl Default for HillshadeParams {
    fn default() -> Self {
        Self {
            azimuth: 315.0,
            altitude: 45.0,
            vertical_exaggeration: 1.0,
            alpha_hs: 0.5,
        }
    }
}

impl HillshadeParams {
    pub fn validate(&self) -> GridResult<()> {
        if !self.azimuth.is_finite() {
            return Err(GridError::parameter("azimuth", "must be finite"));
        }
        if !(0.0..=90.0).contains(&self.altitude) {
            return Err(GridError::parameter(
                "altitude",
                format!("must lie in [0, 90], got {}", self.altitude),
            ));
        }
        validation::positive("vertical_exaggeration", self.vertical_exaggeration)?;
        if !(0.0..=1.0).contains(&self.alpha_hs) {
            return Err(GridError::parameter(
                "alpha_hs",
                format!("must lie in [0, 1], got {}", self.alpha_hs),
            ));
        }
        Ok(())
    }
}

/// Illumination of each cell in `[0, 1]`, `NaN` where undefined
///
/// Surface normals come from central differences of the exaggerated grid;
/// intensity is the cosine between normal and sun direction, rescaled to
/// span `[0, 1]` over the finite cells.
pub fn hillshade(grid: &RegularGrid, params: &HillshadeParams) -> GridResult<Array2<f64>> {
    params.validate()?;
    let ve = params.vertical_exaggeration;
    let scaled = grid.values.mapv(|v| v * ve);
    let gx = gradient(&scaled, ArrayAxis(1), grid.cell_size_x);
    let gy = gradient(&scaled, ArrayAxis(0), grid.cell_size_y);

    let az = params.azimuth.to_radians();
    let alt = params.altitude.to_radians();
    let sun = [az.sin() * alt.cos(), az.cos() * alt.cos(), alt.sin()];

    let mut intensity = ndarray::Zip::from(&gx).and(&gy).map_collect(|&ex, &ey| {
        let norm = (ex * ex + ey * ey + 1.0).sqrt();
        (-ex * sun[0] - ey * sun[1] + sun[2]) / norm
    });

    let finite = intensity.iter().copied().filter(|v| v.is_finite());
    let (lo, hi) = finite.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
        (lo.min(v), hi.max(v))
    });
    if hi > lo {
        intensity.mapv_inplace(|v| (v - lo) / (hi - lo));
    } else {
        intensity.mapv_inplace(|v| v.clamp(0.0, 1.0));
    }
    Ok(intensity)
}

/// Value-to-color mapping of one rendered grid
#[derive(Clone, Debug, PartialEq)]
pub struct ColorScale {
    pub colormap: Colormap,
    pub norm: ColorNorm,
    pub alpha: f32,
}

impl ColorScale {
    pub fn new(colormap: Colormap, norm: ColorNorm) -> Self {
        Self {
            colormap,
            norm,
            alpha: DEFAULT_ALPHA,
        }
    }

    /// Scale fitted to `values`
    ///
    /// Limits default to the floor/ceiling of the finite range. With
    /// equalization enabled the colormap is remapped to the data
    /// distribution and normalization is linear between the limits.
    pub fn for_values(
        values: &[f64],
        base: &Colormap,
        limits: Option<(f64, f64)>,
        normalization: Normalization,
        equalizer: &HistogramEqualizer,
    ) -> GridResult<Self> {
        let (vmin, vmax) = match limits {
            Some(limits) => limits,
            None => rounded_limits(values).ok_or(GridError::EmptyInput)?,
        };

        let scale = if equalizer.enabled && vmin < vmax {
            let colormap = equalizer.colormap(base, values, vmin, vmax)?;
            Self::new(colormap, ColorNorm::linear(vmin, vmax)?)
        } else {
            Self::new(base.clone(), ColorNorm::new(vmin, vmax, normalization)?)
        };
        Ok(scale.clipped())
    }

    /// Scale from a colormap name
    pub fn named(
        values: &[f64],
        colormap: &str,
        limits: Option<(f64, f64)>,
        normalization: Normalization,
        equalizer: &HistogramEqualizer,
    ) -> GridResult<Self> {
        Self::for_values(
            values,
            &get_colormap(colormap)?,
            limits,
            normalization,
            equalizer,
        )
    }

    pub fn with_alpha(mut self, alpha: f32) -> Self {
        self.alpha = alpha;
        self
    }

    fn clipped(mut self) -> Self {
        self.norm = self.norm.with_clip(true);
        self
    }

    /// Color of a value; `None` for missing values
    pub fn color(&self, value: f64) -> Option<Color> {
        if value.is_nan() {
            return None;
        }
        Some(self.colormap.sample(self.norm.normalize(value) as f32))
    }
}

/// Rendered grid: RGBA pixels with shape `(ny, nx, 4)`, row 0 south
#[derive(Clone, Debug, PartialEq)]
pub struct RgbaImage {
    pub pixels: Array3<u8>,
    pub extent: Extent,
}

impl RgbaImage {
    /// Opaque white image
    pub fn blank(width: usize, height: usize, extent: Extent) -> Self {
        Self {
            pixels: Array3::from_elem((height, width, 4), 255),
            extent,
        }
    }

    pub fn width(&self) -> usize {
        self.pixels.dim().1
    }

    pub fn height(&self) -> usize {
        self.pixels.dim().0
    }

    pub fn pixel(&self, row: usize, col: usize) -> [u8; 4] {
        let p = |c| self.pixels[[row, col, c]];
        [p(0), p(1), p(2), p(3)]
    }

    pub(crate) fn set(&mut self, row: usize, col: usize, rgba: [u8; 4]) {
        for (c, v) in rgba.into_iter().enumerate() {
            self.pixels[[row, col, c]] = v;
        }
    }
}

/// Paint `grid` with `scale` over white, then the hillshade layer if given
///
/// Shading is skipped when the colors are fully opaque or the shading
/// fully transparent. Missing cells stay white.
pub fn render_grid(
    grid: &RegularGrid,
    scale: &ColorScale,
    hillshade_params: Option<&HillshadeParams>,
) -> GridResult<RgbaImage> {
    if !(0.0..=1.0).contains(&scale.alpha) {
        return Err(GridError::parameter(
            "alpha",
            format!("must lie in [0, 1], got {}", scale.alpha),
        ));
    }

    let shading = match hillshade_params {
        Some(params) if scale.alpha != 1.0 && params.alpha_hs != 0.0 => {
            Some((hillshade(grid, params)?, params.alpha_hs))
        }
        Some(params) => {
            params.validate()?;
            None
        }
        None => None,
    };
    // Shading drawn with the reversed gray palette
    let shade_map = get_colormap("gray_r")?;

    let mut image = RgbaImage::blank(grid.nx(), grid.ny(), grid.extent());
    for ((row, col), &value) in grid.values.indexed_iter() {
        let Some(color) = scale.color(value) else {
            continue;
        };
        let mut pixel = color.over(&Color::WHITE, scale.alpha);
        if let Some((intensity, alpha_hs)) = &shading {
            let shade = intensity[[row, col]];
            if shade.is_finite() {
                pixel = shade_map.sample(shade as f32).over(&pixel, *alpha_hs);
            }
        }
        image.set(row, col, pixel.to_rgba8());
    }

    tracing::debug!(
        "Rendered {}x{} grid with {} ({})",
        grid.nx(),
        grid.ny(),
        scale.colormap.name,
        if shading.is_some() { "shaded" } else { "flat" }
    );
    Ok(image)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::colormap::greys;

    fn ramp() -> RegularGrid {
        let mut grid = RegularGrid::filled(0.0, 0.0, 1.0, 1.0, 4, 3, 0.0).unwrap();
        for ((_, i), v) in grid.values.indexed_iter_mut() {
            *v = i as f64;
        }
        grid
    }

    #[test]
    fn test_hillshade_defaults() {
        let params = HillshadeParams::default();
        assert_eq!(params.azimuth, 315.0);
        assert_eq!(params.altitude, 45.0);
        assert_eq!(params.vertical_exaggeration, 1.0);
        assert_eq!(params.alpha_hs, 0.5);
    }

    #[test]
    fn test_hillshade_faces() {
        // Surface rising to the east faces west, toward a north-west sun
        let mut grid = RegularGrid::filled(0.0, 0.0, 1.0, 1.0, 8, 4, 0.0).unwrap();
        for ((_, i), v) in grid.values.indexed_iter_mut() {
            *v = if i < 4 { i as f64 } else { 8.0 - i as f64 };
        }
        let shade = hillshade(&grid, &HillshadeParams::default()).unwrap();
        assert!(shade[[1, 1]] > shade[[1, 6]]);
        assert!(shade.iter().all(|v| (0.0..=1.0).contains(v)));
    }

    #[test]
    fn test_hillshade_invalid() {
        let params = HillshadeParams {
            altitude: 120.0,
            ..Default::default()
        };
        assert!(hillshade(&ramp(), &params).is_err());
    }

    #[test]
    fn test_color_scale_defaults_to_rounded_limits() {
        let values = [0.4, 2.6];
        let scale = ColorScale::for_values(
            &values,
            &greys(),
            None,
            Normalization::Linear,
            &HistogramEqualizer::disabled(),
        )
        .unwrap();
        assert_eq!(scale.norm.vmin(), 0.0);
        assert_eq!(scale.norm.vmax(), 3.0);
        assert!(scale.color(f64::NAN).is_none());
        // Out-of-range values take the end colors
        assert_eq!(scale.color(-10.0), scale.color(0.0));
    }

    #[test]
    fn test_render_flat() {
        let grid = ramp();
        let scale = ColorScale::for_values(
            &grid.finite_values(),
            &greys(),
            Some((0.0, 3.0)),
            Normalization::Linear,
            &HistogramEqualizer::disabled(),
        )
        .unwrap()
        .with_alpha(1.0);
        let image = render_grid(&grid, &scale, None).unwrap();

        assert_eq!(image.width(), 4);
        assert_eq!(image.height(), 3);
        // Greys runs from white to black
        assert_eq!(image.pixel(0, 0), [255, 255, 255, 255]);
        assert_eq!(image.pixel(2, 3), [0, 0, 0, 255]);
    }

    #[test]
    fn test_missing_cells_stay_white() {
        let mut grid = ramp();
        grid.values[[1, 3]] = f64::NAN;
        let scale = ColorScale::named(
            &grid.finite_values(),
            "viridis",
            None,
            Normalization::Linear,
            &HistogramEqualizer::default(),
        )
        .unwrap();
        let image = render_grid(&grid, &scale, Some(&HillshadeParams::default())).unwrap();
        assert_eq!(image.pixel(1, 3), [255, 255, 255, 255]);
        assert_ne!(image.pixel(1, 1), [255, 255, 255, 255]);
    }

    #[test]
    fn test_opaque_colors_skip_shading() {
        let grid = ramp();
        let scale = ColorScale::named(
            &grid.finite_values(),
            "RdBu_r",
            None,
            Normalization::Linear,
            &HistogramEqualizer::disabled(),
        )
        .unwrap()
        .with_alpha(1.0);
        let shaded = render_grid(&grid, &scale, Some(&HillshadeParams::default())).unwrap();
        let flat = render_grid(&grid, &scale, None).unwrap();
        assert_eq!(shaded, flat);
    }

    #[test]
    fn test_invalid_alpha() {
        let grid = ramp();
        let scale = ColorScale::new(greys(), ColorNorm::linear(0.0, 3.0).unwrap()).with_alpha(2.0);
        assert!(render_grid(&grid, &scale, None).is_err());
    }
}

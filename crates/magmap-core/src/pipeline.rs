//! Survey-to-image pipeline
//!
//! `GridPipeline` runs the stages of a survey display in order:
//! lattice construction, interpolation, distance masking, optional
//! filtering, color scaling, rendering and contouring. Every stage takes its
//! parameters explicitly; the pipeline holds nothing but the interpolator.

use serde::{Deserialize, Serialize};

use crate::config::{DisplayConfig, GriddingConfig};
use crate::contour::{contour_levels, draw_isolines, isolines, CONTOUR_COLOR};
use crate::error::{GridError, GridResult};
use crate::grid::{GridBuilder, GridSizing, RegularGrid};
use crate::interpolate::{InterpolationMethod, ScatteredInterpolator, TriangulatedInterpolator};
use crate::min_curvature::node_lattice;
use crate::norm::percentile_limits;
use crate::render::{render_grid, ColorScale, RgbaImage};
use crate::types::{finite_samples, ScatterSample};

/// Percentile limits used for derived grids
const FILTER_PERCENTILES: (f64, f64) = (5.0, 95.0);

/// A gridded survey and how it was produced
#[derive(Debug, Clone, PartialEq)]
pub struct GriddedSurvey {
    pub grid: RegularGrid,
    pub method: InterpolationMethod,
    /// Finite samples used
    pub sample_count: usize,
    /// Cells blanked by the distance mask
    pub masked_cells: usize,
}

/// Summary of a gridding run, for logs and reports
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridSummary {
    pub method: String,
    pub nx: usize,
    pub ny: usize,
    pub sample_count: usize,
    pub masked_cells: usize,
    pub missing_cells: usize,
}

impl GriddedSurvey {
    pub fn summary(&self) -> GridSummary {
        GridSummary {
            method: self.method.to_string(),
            nx: self.grid.nx(),
            ny: self.grid.ny(),
            sample_count: self.sample_count,
            masked_cells: self.masked_cells,
            missing_cells: self.grid.missing_count(),
        }
    }
}

/// Gridding and rendering with a chosen interpolation backend
#[derive(Debug, Clone, Copy, Default)]
pub struct GridPipeline<I = TriangulatedInterpolator> {
    interpolator: I,
}

impl GridPipeline {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<I: ScatteredInterpolator> GridPipeline<I> {
    pub fn with_interpolator(interpolator: I) -> Self {
        Self { interpolator }
    }

    /// Lattice the samples are interpolated onto
    ///
    /// Minimum curvature places a node on the minimum sample coordinate;
    /// the other methods use the configured cell sizing.
    pub fn lattice(
        &self,
        samples: &[ScatterSample],
        config: &GriddingConfig,
    ) -> GridResult<RegularGrid> {
        let builder = match (config.min_curvature(), config.origin) {
            (Some(params), None) => return node_lattice(samples, params),
            (Some(params), Some(_)) => GridBuilder::new(GridSizing::square(params.grid_size)),
            (None, _) => GridBuilder::new(config.sizing),
        };
        let builder = match config.origin {
            Some([x, y]) => builder.origin(x, y),
            None => builder,
        };
        builder.build(samples)
    }

    /// Interpolate and mask
    pub fn grid_survey(
        &self,
        samples: &[ScatterSample],
        config: &GriddingConfig,
    ) -> GridResult<GriddedSurvey> {
        config.validate()?;
        let samples = finite_samples(samples);
        if samples.is_empty() {
            return Err(GridError::EmptyInput);
        }

        let lattice = self.lattice(&samples, config)?;
        let mut grid = self
            .interpolator
            .interpolate_grid(&samples, &lattice, &config.method)?;

        let masked_cells = match &config.mask {
            Some(mask) => mask.apply_in_place(&mut grid, &samples)?,
            None => 0,
        };

        tracing::info!(
            "Gridded {} samples onto {}x{} cells with {} ({} masked)",
            samples.len(),
            grid.nx(),
            grid.ny(),
            config.method,
            masked_cells
        );
        Ok(GriddedSurvey {
            grid,
            method: config.method,
            sample_count: samples.len(),
            masked_cells,
        })
    }

    /// Grid that is actually displayed: the input, or its filtered version
    pub fn display_grid(&self, grid: &RegularGrid, display: &DisplayConfig) -> GridResult<RegularGrid> {
        match &display.filter {
            Some(filter) => filter.apply(grid),
            None => Ok(grid.clone()),
        }
    }

    /// Color scale for a displayed grid
    pub fn color_scale(&self, grid: &RegularGrid, display: &DisplayConfig) -> GridResult<ColorScale> {
        let values = grid.finite_values();
        let limits = match (display.limits, display.filter) {
            (Some([vmin, vmax]), _) => Some((vmin, vmax)),
            (None, Some(_)) => {
                let (lo, hi) = FILTER_PERCENTILES;
                percentile_limits(&values, lo, hi)?
            }
            (None, None) => None,
        };
        Ok(ColorScale::named(
            &values,
            &display.colormap,
            limits,
            display.normalization,
            &display.equalizer,
        )?
        .with_alpha(display.alpha))
    }

    /// Render a grid (filtered first if configured), then its contours
    pub fn render_survey(&self, grid: &RegularGrid, display: &DisplayConfig) -> GridResult<RgbaImage> {
        display.validate()?;
        let shown = self.display_grid(grid, display)?;
        let scale = self.color_scale(&shown, display)?;
        let mut image = render_grid(&shown, &scale, display.hillshade.as_ref())?;

        if let Some(n) = display.contours {
            let levels = contour_levels(scale.norm.vmin(), scale.norm.vmax(), n)?;
            draw_isolines(&mut image, &isolines(&shown, &levels), CONTOUR_COLOR);
        }
        Ok(image)
    }
}

/// Grid with the built-in interpolator
pub fn grid_survey(samples: &[ScatterSample], config: &GriddingConfig) -> GridResult<GriddedSurvey> {
    GridPipeline::new().grid_survey(samples, config)
}

/// Render with the built-in interpolator
pub fn render_survey(grid: &RegularGrid, display: &DisplayConfig) -> GridResult<RgbaImage> {
    GridPipeline::new().render_survey(grid, display)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::GridFilter;
    use crate::mask::DistanceMask;
    use crate::min_curvature::MinCurvatureParams;

    fn survey() -> Vec<ScatterSample> {
        let mut samples = Vec::new();
        for i in 0..=10 {
            for j in 0..=10 {
                let (x, y) = (i as f64 * 20.0, j as f64 * 20.0);
                samples.push(ScatterSample::new(x, y, (x / 50.0).sin() * 100.0 + y));
            }
        }
        samples
    }

    #[test]
    fn test_grid_survey_linear() {
        let config = GriddingConfig {
            method: InterpolationMethod::Linear,
            ..Default::default()
        }
        .with_cell_size(10.0);
        let gridded = grid_survey(&survey(), &config).unwrap();

        assert_eq!(gridded.grid.nx(), 20);
        assert_eq!(gridded.grid.ny(), 20);
        assert_eq!(gridded.sample_count, 121);
        assert_eq!(gridded.masked_cells, 0);
        assert_eq!(gridded.grid.missing_count(), 0);
    }

    #[test]
    fn test_grid_survey_min_curvature_lattice() {
        let config = GriddingConfig {
            method: InterpolationMethod::MinimumCurvature(MinCurvatureParams {
                grid_size: 20.0,
                ..Default::default()
            }),
            ..Default::default()
        };
        let gridded = grid_survey(&survey(), &config).unwrap();
        // Nodes on every sample
        assert_eq!(gridded.grid.nx(), 11);
        assert_eq!(gridded.grid.x_center(0), 0.0);
        let s = survey()[15];
        let (i, j) = ((s.x / 20.0) as usize, (s.y / 20.0) as usize);
        assert!((gridded.grid.values[[j, i]] - s.value).abs() < 1e-9);
    }

    #[test]
    fn test_mask_applies_to_every_method() {
        let mut samples = survey();
        samples.push(ScatterSample::new(1000.0, 1000.0, 0.0));
        for method in [
            InterpolationMethod::Nearest,
            InterpolationMethod::MinimumCurvature(MinCurvatureParams {
                grid_size: 100.0,
                ..Default::default()
            }),
        ] {
            let config = GriddingConfig {
                method,
                sizing: GridSizing::square(100.0),
                mask: Some(DistanceMask::new(150.0).unwrap()),
                ..Default::default()
            };
            let gridded = grid_survey(&samples, &config).unwrap();
            assert!(gridded.masked_cells > 0, "{}", method);
        }
    }

    #[test]
    fn test_grid_survey_empty() {
        let err = grid_survey(&[], &GriddingConfig::default()).unwrap_err();
        assert!(matches!(err, GridError::EmptyInput));
    }

    #[test]
    fn test_render_survey() {
        let config = GriddingConfig {
            method: InterpolationMethod::Nearest,
            ..Default::default()
        }
        .with_cell_size(20.0);
        let gridded = grid_survey(&survey(), &config).unwrap();
        let image = render_survey(&gridded.grid, &DisplayConfig::default()).unwrap();
        assert_eq!(image.width(), gridded.grid.nx());
        assert_eq!(image.height(), gridded.grid.ny());
        assert_eq!(image.extent, gridded.grid.extent());
    }

    #[test]
    fn test_render_survey_draws_contours() {
        let config = GriddingConfig {
            method: InterpolationMethod::Linear,
            ..Default::default()
        }
        .with_cell_size(10.0);
        let gridded = grid_survey(&survey(), &config).unwrap();
        let plain = DisplayConfig {
            hillshade: None,
            ..Default::default()
        };
        let contoured = DisplayConfig {
            contours: Some(10),
            ..plain.clone()
        };

        let without = render_survey(&gridded.grid, &plain).unwrap();
        let with = render_survey(&gridded.grid, &contoured).unwrap();
        let black = |image: &RgbaImage| {
            (0..image.height())
                .flat_map(|row| (0..image.width()).map(move |col| (row, col)))
                .filter(|&(row, col)| image.pixel(row, col) == CONTOUR_COLOR)
                .count()
        };
        assert_eq!(black(&without), 0);
        assert!(black(&with) > 0);
    }

    #[test]
    fn test_render_survey_rejects_single_contour() {
        let grid = RegularGrid::filled(0.0, 0.0, 1.0, 1.0, 3, 3, 1.0).unwrap();
        let display = DisplayConfig {
            contours: Some(1),
            ..Default::default()
        };
        assert!(render_survey(&grid, &display).is_err());
    }

    #[test]
    fn test_filtered_display_uses_percentiles() {
        let config = GriddingConfig {
            method: InterpolationMethod::Nearest,
            ..Default::default()
        }
        .with_cell_size(20.0);
        let gridded = grid_survey(&survey(), &config).unwrap();
        let display = DisplayConfig {
            filter: Some(GridFilter::DerivativeY),
            ..Default::default()
        };
        let pipeline = GridPipeline::new();
        let shown = pipeline.display_grid(&gridded.grid, &display).unwrap();
        let scale = pipeline.color_scale(&shown, &display).unwrap();

        let (lo, hi) = percentile_limits(&shown.finite_values(), 5.0, 95.0)
            .unwrap()
            .unwrap();
        assert_eq!(scale.norm.vmin(), lo);
        assert_eq!(scale.norm.vmax(), hi);
    }

    #[test]
    fn test_summary() {
        let config = GriddingConfig {
            method: InterpolationMethod::Nearest,
            ..Default::default()
        };
        let summary = grid_survey(&survey(), &config).unwrap().summary();
        assert_eq!(summary.method, "nearest");
        assert_eq!(summary.sample_count, 121);
    }
}

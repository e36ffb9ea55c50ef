//! Configuration for magmap
//!
//! Immutable parameter sets for gridding, display and export, loadable
//! from TOML or JSON.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::colormap::get_colormap;
use crate::equalize::HistogramEqualizer;
use crate::error::{validation, GridError, GridResult};
use crate::export::ExportConfig;
use crate::filter::GridFilter;
use crate::grid::GridSizing;
use crate::interpolate::InterpolationMethod;
use crate::mask::DistanceMask;
use crate::min_curvature::{MinCurvatureParams, DEFAULT_GRID_SIZE};
use crate::norm::{ColorNorm, Normalization};
use crate::render::{HillshadeParams, DEFAULT_ALPHA};
use magmap_io::IoError;

/// Full configuration
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MagmapConfig {
    /// How scattered samples become a grid
    pub gridding: GriddingConfig,
    /// How a grid becomes an image
    pub display: DisplayConfig,
    /// Where and how results are written
    pub export: ExportConfig,
}

/// Gridding parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GriddingConfig {
    /// Interpolation method; minimum curvature solves on its own lattice
    pub method: InterpolationMethod,
    /// Lattice sizing for the other methods
    pub sizing: GridSizing,
    /// Lattice origin override
    pub origin: Option<[f64; 2]>,
    /// Out-of-coverage masking; `None` keeps every cell
    pub mask: Option<DistanceMask>,
}

impl Default for GriddingConfig {
    fn default() -> Self {
        Self {
            method: InterpolationMethod::default(),
            sizing: GridSizing::square(DEFAULT_GRID_SIZE),
            origin: None,
            mask: Some(DistanceMask::default()),
        }
    }
}

impl GriddingConfig {
    /// Same spacing for every method
    pub fn with_cell_size(mut self, cell_size: f64) -> Self {
        self.sizing = GridSizing::square(cell_size);
        if let InterpolationMethod::MinimumCurvature(params) = &mut self.method {
            params.grid_size = cell_size;
        }
        self
    }

    pub fn validate(&self) -> GridResult<()> {
        if let InterpolationMethod::MinimumCurvature(params) = &self.method {
            params.validate()?;
        }
        match self.sizing {
            GridSizing::CellSize { dx, dy } | GridSizing::Explicit { dx, dy, .. } => {
                validation::positive("dx", dx)?;
                validation::positive("dy", dy)?;
            }
            GridSizing::Resolution { .. } => {}
        }
        if let GridSizing::Resolution { nx, ny } | GridSizing::Explicit { nx, ny, .. } = self.sizing
        {
            if nx == 0 || ny == 0 {
                return Err(GridError::parameter("resolution", "counts must be at least 1"));
            }
        }
        if let Some(mask) = &self.mask {
            mask.validate()?;
        }
        Ok(())
    }

    /// Minimum-curvature parameters, if that method is selected
    pub fn min_curvature(&self) -> Option<&MinCurvatureParams> {
        match &self.method {
            InterpolationMethod::MinimumCurvature(params) => Some(params),
            _ => None,
        }
    }
}

/// Display parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// Colormap name (`_r` suffix reverses)
    pub colormap: String,
    /// Color limits; default floor/ceil of the data range, or the 5th/95th
    /// percentiles when a filter is applied
    pub limits: Option<[f64; 2]>,
    pub normalization: Normalization,
    pub equalizer: HistogramEqualizer,
    /// Opacity of the colored layer
    pub alpha: f32,
    /// Sun shading; `None` for flat colors
    pub hillshade: Option<HillshadeParams>,
    /// Derived grid shown instead of the data
    pub filter: Option<GridFilter>,
    /// Number of contour levels drawn between the color limits
    pub contours: Option<usize>,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            colormap: "RdBu_r".to_string(),
            limits: None,
            normalization: Normalization::Linear,
            equalizer: HistogramEqualizer::default(),
            alpha: DEFAULT_ALPHA,
            hillshade: Some(HillshadeParams::default()),
            filter: None,
            contours: None,
        }
    }
}

impl DisplayConfig {
    pub fn validate(&self) -> GridResult<()> {
        get_colormap(&self.colormap)?;
        if let Some([vmin, vmax]) = self.limits {
            ColorNorm::new(vmin, vmax, self.normalization)?;
        }
        if !(0.0..=1.0).contains(&self.alpha) {
            return Err(GridError::parameter(
                "alpha",
                format!("must lie in [0, 1], got {}", self.alpha),
            ));
        }
        validation::positive("nbins", self.equalizer.nbins as f64)?;
        if let Some(hillshade) = &self.hillshade {
            hillshade.validate()?;
        }
        if let Some(filter) = &self.filter {
            filter.validate()?;
        }
        if let Some(n) = self.contours {
            if n < 2 {
                return Err(GridError::parameter(
                    "contours",
                    format!("need at least 2 levels, got {}", n),
                ));
            }
        }
        Ok(())
    }
}

impl MagmapConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from a TOML string
    pub fn from_toml(toml_str: &str) -> GridResult<Self> {
        toml::from_str(toml_str).map_err(|e| GridError::InvalidConfig(e.to_string()))
    }

    /// Serialize configuration to TOML
    pub fn to_toml(&self) -> GridResult<String> {
        toml::to_string_pretty(self).map_err(|e| GridError::InvalidConfig(e.to_string()))
    }

    /// Load configuration from a JSON string
    pub fn from_json(json_str: &str) -> GridResult<Self> {
        serde_json::from_str(json_str).map_err(|e| GridError::InvalidConfig(e.to_string()))
    }

    /// Serialize configuration to JSON
    pub fn to_json(&self) -> GridResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| GridError::InvalidConfig(e.to_string()))
    }

    /// Read a `.json` or TOML file and validate it
    pub fn load(path: &Path) -> GridResult<Self> {
        let text = std::fs::read_to_string(path).map_err(IoError::from)?;
        let config = if is_json(path) {
            Self::from_json(&text)?
        } else {
            Self::from_toml(&text)?
        };
        config.validate()?;
        tracing::info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Write as JSON or TOML depending on the extension
    pub fn save(&self, path: &Path) -> GridResult<()> {
        let text = if is_json(path) {
            self.to_json()?
        } else {
            self.to_toml()?
        };
        std::fs::write(path, text).map_err(IoError::from)?;
        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> GridResult<()> {
        self.gridding.validate()?;
        self.display.validate()?;
        Ok(())
    }
}

fn is_json(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
}

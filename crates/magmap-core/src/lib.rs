//! magmap-core - Gridding and display engine for magnetic survey data
//!
//! Turns scattered survey readings into regular grids and colored,
//! sun-shaded map images.
//!
//! # Key Components
//!
//! - **Interpolation**: nearest, linear, cubic and minimum-curvature gridding
//! - **DistanceMask**: blanks cells far from any observation
//! - **EqualizationTable**: histogram-equalized colormaps
//! - **Isoline**: contour lines drawn over rendered grids
//! - **Profile**: values sampled along a straight line
//! - **GridFilter**: derivatives, tilt angle, upward continuation, reduction to pole
//! - **ForwardModel**: fields of a magnetized prism for synthetic surveys
//! - **GridPipeline**: gridding, masking, filtering and rendering in one pass
//!
//! # Conventions
//!
//! Grids are `(ny, nx)` arrays with row 0 at the southern edge, values
//! sampled at cell centres and `NaN` marking missing cells.

pub mod colormap;
pub mod config;
pub mod contour;
pub mod equalize;
pub mod error;
pub mod export;
pub mod filter;
pub mod forward;
pub mod grid;
pub mod interpolate;
pub mod mask;
pub mod min_curvature;
pub mod norm;
pub mod pipeline;
pub mod profile;
pub mod render;
pub mod spatial;
pub mod types;

pub use colormap::{get_colormap, Color, Colormap};
pub use config::*;
pub use contour::*;
pub use equalize::*;
pub use error::*;
pub use export::*;
pub use filter::*;
pub use forward::*;
pub use grid::*;
pub use interpolate::*;
pub use mask::*;
pub use min_curvature::{MinCurvatureParams, DEFAULT_GRID_SIZE, DEFAULT_TOLERANCE};
pub use norm::*;
pub use pipeline::*;
pub use profile::*;
pub use render::*;
pub use types::*;

// spatial indexes are internal building blocks, access via spatial:: prefix

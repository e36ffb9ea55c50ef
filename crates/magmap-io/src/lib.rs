//! magmap-io - Data I/O for magnetic survey grids
//!
//! This crate provides the file-facing pieces of magmap:
//!
//! - **Survey tables**: scattered `(x, y, value)` observations from CSV/TSV
//! - **Raster export**: georeferenced rasters written through the
//!   `RasterWriter` trait (GeoTIFF, ESRI ASCII grid, PPM + world file)
//!
//! # Design
//!
//! Writers only see a `GeoRaster`: band data plus a bounding box and an EPSG
//! code. They know nothing about how the grid was produced.

pub mod error;
pub mod raster;

#[cfg(feature = "csv")]
pub mod survey;

pub use error::*;
pub use raster::*;

#[cfg(feature = "csv")]
pub use survey::*;

//! Raster export of grids and rendered images
//!
//! Converts core types into `GeoRaster`s (rows flipped to north-up) and
//! hands them to a `RasterWriter`:
//! - Data grids: one band, GeoTIFF (or ESRI ASCII grid)
//! - Rendered images: three 8-bit bands, PPM with world file

use std::path::{Path, PathBuf};

use ndarray::{s, Array3};
use serde::{Deserialize, Serialize};

use crate::error::GridResult;
use crate::grid::RegularGrid;
use crate::render::RgbaImage;
use crate::types::Extent;
use magmap_io::{
    AsciiGridWriter, GeoRaster, GeoTiffWriter, PpmWorldFileWriter, RasterWriter, DEFAULT_EPSG,
};

/// What gets written
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportFormat {
    /// Grid values as a 64-bit float GeoTIFF
    #[default]
    GeoTiff,
    /// Grid values as an ESRI ASCII grid
    AsciiGrid,
    /// Rendered colors as PPM plus world file
    PpmImage,
}

impl ExportFormat {
    /// File extension for this format
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::GeoTiff => GeoTiffWriter.extension(),
            ExportFormat::AsciiGrid => AsciiGridWriter.extension(),
            ExportFormat::PpmImage => PpmWorldFileWriter.extension(),
        }
    }
}

/// Export configuration
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// Output format
    pub format: ExportFormat,

    /// Coordinate reference system of the survey coordinates
    pub epsg: u32,

    /// Directory outputs are written to
    pub output_dir: PathBuf,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            format: ExportFormat::GeoTiff,
            epsg: DEFAULT_EPSG,
            output_dir: PathBuf::from("Output"),
        }
    }
}

impl ExportConfig {
    /// Path for an output named `stem`
    pub fn output_path(&self, stem: &str) -> PathBuf {
        self.output_dir
            .join(stem)
            .with_extension(self.format.extension())
    }
}

fn georeference(bands: Array3<f64>, extent: &Extent, epsg: u32) -> GridResult<GeoRaster> {
    Ok(GeoRaster::new(
        bands,
        epsg,
        extent.min_x,
        extent.max_x,
        extent.min_y,
        extent.max_y,
    )?)
}

/// Single-band raster of the grid values, north row first
pub fn grid_raster(grid: &RegularGrid, epsg: u32) -> GridResult<GeoRaster> {
    let flipped = grid.values.slice(s![..;-1, ..]);
    let bands = flipped.insert_axis(ndarray::Axis(0)).to_owned();
    georeference(bands, &grid.extent(), epsg)
}

/// Three-band (RGB) raster of a rendered image, north row first
pub fn image_raster(image: &RgbaImage, epsg: u32) -> GridResult<GeoRaster> {
    let rgb = image.pixels.slice(s![..;-1, .., 0..3]);
    // (row, col, band) -> (band, row, col)
    let bands = rgb.permuted_axes([2, 0, 1]).mapv(f64::from);
    georeference(bands, &image.extent, epsg)
}

/// Write grid values as a GeoTIFF
pub fn export_grid(grid: &RegularGrid, epsg: u32, path: &Path) -> GridResult<Vec<PathBuf>> {
    write_with(&GeoTiffWriter, &grid_raster(grid, epsg)?, path)
}

/// Write grid values as an ESRI ASCII grid
pub fn export_ascii_grid(
    grid: &RegularGrid,
    epsg: u32,
    path: &Path,
) -> GridResult<Vec<PathBuf>> {
    write_with(&AsciiGridWriter, &grid_raster(grid, epsg)?, path)
}

/// Write a rendered image with the PPM writer
pub fn export_image(image: &RgbaImage, epsg: u32, path: &Path) -> GridResult<Vec<PathBuf>> {
    write_with(&PpmWorldFileWriter, &image_raster(image, epsg)?, path)
}

/// Write through any writer
pub fn write_with(
    writer: &dyn RasterWriter,
    raster: &GeoRaster,
    path: &Path,
) -> GridResult<Vec<PathBuf>> {
    let written = writer.write(raster, path)?;
    tracing::info!("Wrote {} ({} files)", path.display(), written.len());
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use tiff::decoder::{Decoder, DecodingResult};

    fn grid() -> RegularGrid {
        let mut grid = RegularGrid::filled(100.0, 200.0, 10.0, 10.0, 3, 2, 0.0).unwrap();
        for ((j, i), v) in grid.values.indexed_iter_mut() {
            *v = (10 * j + i) as f64;
        }
        grid
    }

    #[test]
    fn test_grid_raster_is_north_up() {
        let raster = grid_raster(&grid(), DEFAULT_EPSG).unwrap();
        assert_eq!(raster.band_count(), 1);
        assert_eq!(raster.rows(), 2);
        assert_eq!(raster.cols(), 3);
        // Row 0 of the raster is the northern grid row
        assert_eq!(raster.bands[[0, 0, 0]], 10.0);
        assert_eq!(raster.bands[[0, 1, 2]], 2.0);
        assert_eq!((raster.min_x, raster.max_x), (100.0, 130.0));
        assert_eq!((raster.min_y, raster.max_y), (200.0, 220.0));
        assert_eq!(raster.epsg, 26909);
    }

    #[test]
    fn test_image_raster() {
        let mut image = RgbaImage::blank(2, 2, Extent::new(0.0, 2.0, 0.0, 2.0));
        image.pixels[[0, 0, 0]] = 7;
        let raster = image_raster(&image, 4326).unwrap();
        assert_eq!(raster.band_count(), 3);
        assert_eq!(raster.bands[[0, 1, 0]], 7.0);
        assert_eq!(raster.bands[[2, 0, 0]], 255.0);
    }

    #[test]
    fn test_output_path() {
        let config = ExportConfig::default();
        assert_eq!(
            config.output_path("DataHillshade"),
            PathBuf::from("Output/DataHillshade.tif")
        );
    }

    #[test]
    fn test_export_grid_writes_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("grid.tif");
        let written = export_grid(&grid(), DEFAULT_EPSG, &path).unwrap();
        assert_eq!(written, vec![path.clone()]);

        let mut decoder = Decoder::new(File::open(&path).unwrap()).unwrap();
        assert_eq!(decoder.dimensions().unwrap(), (3, 2));
        match decoder.read_image().unwrap() {
            DecodingResult::F64(values) => {
                // North row first
                assert_eq!(values, vec![10.0, 11.0, 12.0, 0.0, 1.0, 2.0]);
            }
            _ => panic!("expected 64-bit float samples"),
        }
    }

    #[test]
    fn test_export_ascii_grid_writes_projection() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("grid.asc");
        let written = export_ascii_grid(&grid(), DEFAULT_EPSG, &path).unwrap();
        assert_eq!(written.len(), 2);
        assert!(written.iter().all(|p| p.exists()));
    }
}

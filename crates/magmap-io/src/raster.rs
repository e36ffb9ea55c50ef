//! Georeferenced raster export
//!
//! A `GeoRaster` is band data plus the geographic bounding box it covers and
//! the EPSG code of its coordinate reference system. `RasterWriter`
//! implementations persist it:
//!
//! - `GeoTiffWriter`: one band, 64-bit float GeoTIFF (`.tif`) with the CRS
//!   in its GeoKey directory
//! - `AsciiGridWriter`: one band, ESRI ASCII grid (`.asc`) with a `.prj`
//! - `PpmWorldFileWriter`: three 8-bit bands, binary PPM with a `.wld`
//!   world file and a `.prj`

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use ndarray::Array3;
use tiff::encoder::{colortype, TiffEncoder};
use tiff::tags::Tag;

use crate::error::{IoError, IoResult};

/// EPSG code used when none is configured (NAD83 / UTM zone 9N)
pub const DEFAULT_EPSG: u32 = 26909;

/// Marker written for missing cells in text rasters
pub const NODATA_VALUE: f64 = -99999.0;

// GeoKey ids and values (GeoTIFF 1.0)
const GT_MODEL_TYPE_KEY: u16 = 1024;
const GT_RASTER_TYPE_KEY: u16 = 1025;
const GEOGRAPHIC_TYPE_KEY: u16 = 2048;
const PROJECTED_CS_TYPE_KEY: u16 = 3072;
const MODEL_TYPE_PROJECTED: u16 = 1;
const MODEL_TYPE_GEOGRAPHIC: u16 = 2;
const RASTER_PIXEL_IS_AREA: u16 = 1;

/// Band data with georeferencing
///
/// `bands` has shape `(band, row, col)` with row 0 at the northern edge.
#[derive(Clone, Debug)]
pub struct GeoRaster {
    pub bands: Array3<f64>,
    pub epsg: u32,
    pub min_x: f64,
    pub max_x: f64,
    pub min_y: f64,
    pub max_y: f64,
}

impl GeoRaster {
    /// Create a raster, validating the bounding box
    pub fn new(
        bands: Array3<f64>,
        epsg: u32,
        min_x: f64,
        max_x: f64,
        min_y: f64,
        max_y: f64,
    ) -> IoResult<Self> {
        let finite = [min_x, max_x, min_y, max_y].iter().all(|v| v.is_finite());
        if !finite || min_x >= max_x || min_y >= max_y {
            return Err(IoError::InvalidBounds {
                min_x,
                max_x,
                min_y,
                max_y,
            });
        }
        Ok(Self {
            bands,
            epsg,
            min_x,
            max_x,
            min_y,
            max_y,
        })
    }

    /// Number of bands
    pub fn band_count(&self) -> usize {
        self.bands.dim().0
    }

    /// Number of rows
    pub fn rows(&self) -> usize {
        self.bands.dim().1
    }

    /// Number of columns
    pub fn cols(&self) -> usize {
        self.bands.dim().2
    }

    /// Pixel width in map units
    pub fn pixel_width(&self) -> f64 {
        (self.max_x - self.min_x) / self.cols().max(1) as f64
    }

    /// Pixel height in map units
    pub fn pixel_height(&self) -> f64 {
        (self.max_y - self.min_y) / self.rows().max(1) as f64
    }

    fn expect_bands(&self, expected: usize) -> IoResult<()> {
        if self.band_count() != expected {
            return Err(IoError::BandCount {
                expected,
                actual: self.band_count(),
            });
        }
        Ok(())
    }
}

/// Trait for persisting georeferenced rasters
pub trait RasterWriter {
    /// Write the raster to `path`, plus any sidecar files
    ///
    /// Returns every path written.
    fn write(&self, raster: &GeoRaster, path: &Path) -> IoResult<Vec<PathBuf>>;

    /// Preferred file extension
    fn extension(&self) -> &'static str;
}

/// Pick a writer for the band count of a raster
pub fn writer_for(raster: &GeoRaster) -> IoResult<Box<dyn RasterWriter>> {
    match raster.band_count() {
        1 => Ok(Box::new(GeoTiffWriter)),
        3 => Ok(Box::new(PpmWorldFileWriter)),
        n => Err(IoError::BandCount {
            expected: 1,
            actual: n,
        }),
    }
}

/// Single-band GeoTIFF writer
///
/// Samples are stored as 64-bit floats, north row first, with missing cells
/// left as NaN. The raster is placed by a tie point on its north-west corner
/// plus the pixel scale.
#[derive(Clone, Copy, Debug, Default)]
pub struct GeoTiffWriter;

impl RasterWriter for GeoTiffWriter {
    fn write(&self, raster: &GeoRaster, path: &Path) -> IoResult<Vec<PathBuf>> {
        raster.expect_bands(1)?;
        let keys = geo_key_directory(raster.epsg)?;
        let (rows, cols) = (raster.rows(), raster.cols());
        let data: Vec<f64> = raster
            .bands
            .index_axis(ndarray::Axis(0), 0)
            .iter()
            .copied()
            .collect();

        let mut encoder = TiffEncoder::new(BufWriter::new(File::create(path)?))?;
        let mut image = encoder.new_image::<colortype::Gray64Float>(cols as u32, rows as u32)?;

        let scale = [raster.pixel_width(), raster.pixel_height(), 0.0];
        let tie_point = [0.0, 0.0, 0.0, raster.min_x, raster.max_y, 0.0];
        let directory = image.encoder();
        directory.write_tag(Tag::ModelPixelScaleTag, &scale[..])?;
        directory.write_tag(Tag::ModelTiepointTag, &tie_point[..])?;
        directory.write_tag(Tag::GeoKeyDirectoryTag, &keys[..])?;
        image.write_data(&data)?;

        tracing::info!(
            "Wrote {}x{} GeoTIFF (EPSG:{}) to {}",
            cols,
            rows,
            raster.epsg,
            path.display()
        );
        Ok(vec![path.to_path_buf()])
    }

    fn extension(&self) -> &'static str {
        "tif"
    }
}

/// GeoKey directory for an EPSG coordinate reference system
///
/// Header `[version, revision, minor, key count]` followed by one
/// `[key, location, count, value]` entry per key, sorted by key id.
/// Codes in 4000..5000 are treated as geographic, everything else as
/// projected.
pub fn geo_key_directory(epsg: u32) -> IoResult<Vec<u16>> {
    let code = u16::try_from(epsg).map_err(|_| IoError::UnsupportedEpsg(epsg))?;
    let (model, crs_key) = if (4000..5000).contains(&epsg) {
        (MODEL_TYPE_GEOGRAPHIC, GEOGRAPHIC_TYPE_KEY)
    } else {
        (MODEL_TYPE_PROJECTED, PROJECTED_CS_TYPE_KEY)
    };
    let entries = [
        (GT_MODEL_TYPE_KEY, model),
        (GT_RASTER_TYPE_KEY, RASTER_PIXEL_IS_AREA),
        (crs_key, code),
    ];

    let mut keys = vec![1, 1, 0, entries.len() as u16];
    for (key, value) in entries {
        keys.extend([key, 0, 1, value]);
    }
    Ok(keys)
}

/// Single-band ESRI ASCII grid writer
#[derive(Clone, Copy, Debug, Default)]
pub struct AsciiGridWriter;

impl RasterWriter for AsciiGridWriter {
    fn write(&self, raster: &GeoRaster, path: &Path) -> IoResult<Vec<PathBuf>> {
        raster.expect_bands(1)?;

        let mut out = BufWriter::new(File::create(path)?);
        writeln!(out, "ncols {}", raster.cols())?;
        writeln!(out, "nrows {}", raster.rows())?;
        writeln!(out, "xllcorner {}", raster.min_x)?;
        writeln!(out, "yllcorner {}", raster.min_y)?;

        let (dx, dy) = (raster.pixel_width(), raster.pixel_height());
        if (dx - dy).abs() <= 1e-9 * dx.abs().max(dy.abs()) {
            writeln!(out, "cellsize {}", dx)?;
        } else {
            writeln!(out, "dx {}", dx)?;
            writeln!(out, "dy {}", dy)?;
        }
        writeln!(out, "NODATA_value {}", NODATA_VALUE)?;

        for row in raster.bands.index_axis(ndarray::Axis(0), 0).rows() {
            let line: Vec<String> = row
                .iter()
                .map(|&v| {
                    if v.is_finite() {
                        v.to_string()
                    } else {
                        NODATA_VALUE.to_string()
                    }
                })
                .collect();
            writeln!(out, "{}", line.join(" "))?;
        }
        out.flush()?;

        let prj = write_projection(raster, path)?;
        tracing::info!(
            "Wrote {}x{} ASCII grid to {}",
            raster.cols(),
            raster.rows(),
            path.display()
        );
        Ok(vec![path.to_path_buf(), prj])
    }

    fn extension(&self) -> &'static str {
        "asc"
    }
}

/// Three-band 8-bit image writer (binary PPM + world file)
///
/// Band values are clamped to `[0, 255]`; missing values are written white.
#[derive(Clone, Copy, Debug, Default)]
pub struct PpmWorldFileWriter;

impl RasterWriter for PpmWorldFileWriter {
    fn write(&self, raster: &GeoRaster, path: &Path) -> IoResult<Vec<PathBuf>> {
        raster.expect_bands(3)?;
        let (rows, cols) = (raster.rows(), raster.cols());

        let mut out = BufWriter::new(File::create(path)?);
        write!(out, "P6\n{} {}\n255\n", cols, rows)?;
        let mut bytes = Vec::with_capacity(rows * cols * 3);
        for r in 0..rows {
            for c in 0..cols {
                for b in 0..3 {
                    let v = raster.bands[[b, r, c]];
                    let byte = if v.is_finite() {
                        v.round().clamp(0.0, 255.0) as u8
                    } else {
                        255
                    };
                    bytes.push(byte);
                }
            }
        }
        out.write_all(&bytes)?;
        out.flush()?;

        // World file: pixel size, rotation terms, then the centre of the
        // upper-left pixel
        let world = path.with_extension("wld");
        let (dx, dy) = (raster.pixel_width(), raster.pixel_height());
        let mut wld = BufWriter::new(File::create(&world)?);
        writeln!(wld, "{}", dx)?;
        writeln!(wld, "0")?;
        writeln!(wld, "0")?;
        writeln!(wld, "{}", -dy)?;
        writeln!(wld, "{}", raster.min_x + dx / 2.0)?;
        writeln!(wld, "{}", raster.max_y - dy / 2.0)?;
        wld.flush()?;

        let prj = write_projection(raster, path)?;
        tracing::info!("Wrote {}x{} image to {}", cols, rows, path.display());
        Ok(vec![path.to_path_buf(), world, prj])
    }

    fn extension(&self) -> &'static str {
        "ppm"
    }
}

fn write_projection(raster: &GeoRaster, path: &Path) -> IoResult<PathBuf> {
    let prj = path.with_extension("prj");
    std::fs::write(&prj, format!("EPSG:{}\n", raster.epsg))?;
    Ok(prj)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tiff::decoder::{Decoder, DecodingResult};

    fn single_band() -> GeoRaster {
        let mut bands = Array3::zeros((1, 2, 3));
        bands[[0, 0, 0]] = 1.5;
        bands[[0, 1, 2]] = f64::NAN;
        GeoRaster::new(bands, DEFAULT_EPSG, 0.0, 30.0, 0.0, 20.0).unwrap()
    }

    #[test]
    fn test_invalid_bounds() {
        let bands = Array3::zeros((1, 1, 1));
        let err = GeoRaster::new(bands, DEFAULT_EPSG, 5.0, 5.0, 0.0, 1.0).unwrap_err();
        assert!(matches!(err, IoError::InvalidBounds { .. }));
    }

    #[test]
    fn test_geotiff_writer_reads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("grid.tif");
        let written = GeoTiffWriter.write(&single_band(), &path).unwrap();
        assert_eq!(written, vec![path.clone()]);

        let mut decoder = Decoder::new(File::open(&path).unwrap()).unwrap();
        assert_eq!(decoder.dimensions().unwrap(), (3, 2));
        assert_eq!(
            decoder.get_tag_f64_vec(Tag::ModelPixelScaleTag).unwrap(),
            vec![10.0, 10.0, 0.0]
        );
        assert_eq!(
            decoder.get_tag_f64_vec(Tag::ModelTiepointTag).unwrap(),
            vec![0.0, 0.0, 0.0, 0.0, 20.0, 0.0]
        );
        let keys = decoder.get_tag_u32_vec(Tag::GeoKeyDirectoryTag).unwrap();
        assert_eq!(&keys[..4], &[1, 1, 0, 3]);
        assert_eq!(&keys[12..], &[3072, 0, 1, 26909]);

        match decoder.read_image().unwrap() {
            DecodingResult::F64(values) => {
                assert_eq!(values.len(), 6);
                assert_eq!(values[0], 1.5);
                assert_eq!(values[1], 0.0);
                assert!(values[5].is_nan());
            }
            _ => panic!("expected 64-bit float samples"),
        }
    }

    #[test]
    fn test_geo_key_directory() {
        let keys = geo_key_directory(4326).unwrap();
        assert_eq!(keys.len(), 16);
        assert_eq!(&keys[4..8], &[1024, 0, 1, 2]);
        assert_eq!(&keys[12..], &[2048, 0, 1, 4326]);

        let err = geo_key_directory(102_100).unwrap_err();
        assert!(matches!(err, IoError::UnsupportedEpsg(102_100)));
    }

    #[test]
    fn test_geotiff_rejects_rgb() {
        let bands = Array3::zeros((3, 2, 2));
        let raster = GeoRaster::new(bands, 4326, 0.0, 1.0, 0.0, 1.0).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let err = GeoTiffWriter
            .write(&raster, &dir.path().join("x.tif"))
            .unwrap_err();
        assert!(matches!(err, IoError::BandCount { expected: 1, actual: 3 }));
    }

    #[test]
    fn test_ascii_grid_writer() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("grid.asc");
        let written = AsciiGridWriter.write(&single_band(), &path).unwrap();

        assert_eq!(written.len(), 2);
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("ncols 3"));
        assert!(text.contains("nrows 2"));
        assert!(text.contains("cellsize 10"));
        assert!(text.contains("1.5 0 0"));
        assert!(text.contains("0 0 -99999"));

        let prj = std::fs::read_to_string(dir.path().join("grid.prj")).unwrap();
        assert_eq!(prj.trim(), "EPSG:26909");
    }

    #[test]
    fn test_ascii_grid_rejects_rgb() {
        let bands = Array3::zeros((3, 2, 2));
        let raster = GeoRaster::new(bands, 4326, 0.0, 1.0, 0.0, 1.0).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let err = AsciiGridWriter
            .write(&raster, &dir.path().join("x.asc"))
            .unwrap_err();
        assert!(matches!(err, IoError::BandCount { expected: 1, actual: 3 }));
    }

    #[test]
    fn test_ppm_world_file_writer() {
        let mut bands = Array3::from_elem((3, 2, 2), 128.0);
        bands[[0, 0, 0]] = 300.0;
        bands[[1, 0, 0]] = f64::NAN;
        let raster = GeoRaster::new(bands, 26909, 100.0, 120.0, 50.0, 70.0).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("image.ppm");
        let written = PpmWorldFileWriter.write(&raster, &path).unwrap();
        assert_eq!(written.len(), 3);

        let bytes = std::fs::read(&path).unwrap();
        let header = b"P6\n2 2\n255\n";
        assert_eq!(&bytes[..header.len()], header);
        assert_eq!(bytes.len(), header.len() + 12);
        assert_eq!(bytes[header.len()], 255);
        assert_eq!(bytes[header.len() + 1], 255);
        assert_eq!(bytes[header.len() + 2], 128);

        let world = std::fs::read_to_string(dir.path().join("image.wld")).unwrap();
        let lines: Vec<f64> = world.lines().map(|l| l.parse().unwrap()).collect();
        assert_eq!(lines, vec![10.0, 0.0, 0.0, -10.0, 105.0, 65.0]);
    }

    #[test]
    fn test_writer_for_band_count() {
        assert_eq!(writer_for(&single_band()).unwrap().extension(), "tif");

        let bands = Array3::zeros((2, 1, 1));
        let raster = GeoRaster::new(bands, 4326, 0.0, 1.0, 0.0, 1.0).unwrap();
        assert!(writer_for(&raster).is_err());
    }
}

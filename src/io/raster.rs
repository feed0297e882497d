//! GDAL-backed raster handle.
//!
//! Opening a raster loads metadata only; band data is pulled into memory
//! explicitly with `load`/`read_band` and can be mutated in place
//! (`assign`, `rescale`, `reduce`) without touching the source file.
//! `write` materializes either the in-memory data or a windowed copy of the
//! source into a new file.

use std::path::{Path, PathBuf};

use gdal::raster::{Buffer, GdalType, ResampleAlg};
use gdal::{Dataset, DriverManager, Metadata};
use ndarray::{Array2, s};
use tracing::debug;

use crate::error::{Error, Result};
use crate::exec;
use crate::io::vector::BoundingBox;
use crate::types::{OutputDriver, PixelType, ResamplingMethod};

/// Pixel rectangle: column/row offset plus size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub col_off: usize,
    pub row_off: usize,
    pub cols: usize,
    pub rows: usize,
}

impl Window {
    pub fn full(cols: usize, rows: usize) -> Self {
        Window {
            col_off: 0,
            row_off: 0,
            cols,
            rows,
        }
    }
}

/// Geotransform-derived raster geometry.
///
/// `pixel_height` is signed; for the usual top-down rasters it is negative
/// and `origin_y` is the top edge.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RasterGeometry {
    pub origin_x: f64,
    pub origin_y: f64,
    pub pixel_width: f64,
    pub pixel_height: f64,
    pub rotation_x: f64,
    pub rotation_y: f64,
    pub cols: usize,
    pub rows: usize,
}

impl RasterGeometry {
    pub fn from_transform(gt: [f64; 6], cols: usize, rows: usize) -> Self {
        RasterGeometry {
            origin_x: gt[0],
            pixel_width: gt[1],
            rotation_x: gt[2],
            origin_y: gt[3],
            rotation_y: gt[4],
            pixel_height: gt[5],
            cols,
            rows,
        }
    }

    pub fn to_transform(&self) -> [f64; 6] {
        [
            self.origin_x,
            self.pixel_width,
            self.rotation_x,
            self.origin_y,
            self.rotation_y,
            self.pixel_height,
        ]
    }

    pub fn xmax(&self) -> f64 {
        self.origin_x + self.pixel_width * self.cols as f64
    }

    pub fn ymin(&self) -> f64 {
        self.origin_y + self.pixel_height * self.rows as f64
    }

    /// Absolute pixel size (x, y).
    pub fn resolution(&self) -> (f64, f64) {
        (self.pixel_width.abs(), self.pixel_height.abs())
    }

    pub fn bbox(&self) -> BoundingBox {
        let (x0, x1) = (self.origin_x, self.xmax());
        let (y0, y1) = (self.origin_y, self.ymin());
        BoundingBox {
            xmin: x0.min(x1),
            xmax: x0.max(x1),
            ymin: y0.min(y1),
            ymax: y0.max(y1),
        }
    }

    /// Geometry of a window into this raster: origin shifted by the offset,
    /// size taken from the window.
    pub fn shifted(&self, window: &Window) -> Self {
        RasterGeometry {
            origin_x: self.origin_x + window.col_off as f64 * self.pixel_width,
            origin_y: self.origin_y + window.row_off as f64 * self.pixel_height,
            cols: window.cols,
            rows: window.rows,
            ..*self
        }
    }
}

/// Options for [`RasterHandle::write`].
#[derive(Debug, Clone)]
pub struct WriteOptions {
    pub driver: OutputDriver,
    /// Output band type; the source type when `None`.
    pub pixel_type: Option<PixelType>,
    /// Spatial crop in pixel coordinates; full extent when `None`.
    pub window: Option<Window>,
    pub overwrite: bool,
}

impl Default for WriteOptions {
    fn default() -> Self {
        WriteOptions {
            driver: OutputDriver::Envi,
            pixel_type: None,
            window: None,
            overwrite: true,
        }
    }
}

/// Wrapper around one raster file.
pub struct RasterHandle {
    path: PathBuf,
    dataset: Dataset,
    geometry: RasterGeometry,
    bands: usize,
    pixel_type: PixelType,
    projection: String,
    epsg: Option<u32>,
    nodata: Option<f64>,
    cache: Vec<Array2<f64>>,
}

impl std::fmt::Debug for RasterHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RasterHandle")
            .field("path", &self.path)
            .field("geometry", &self.geometry)
            .field("bands", &self.bands)
            .field("pixel_type", &self.pixel_type)
            .field("projection", &self.projection)
            .field("epsg", &self.epsg)
            .field("nodata", &self.nodata)
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}

// Extract the EPSG code from a WKT authority tag.
fn parse_epsg(projection: &str) -> Option<u32> {
    if let Some(code) = projection.strip_prefix("EPSG:") {
        return code.parse().ok();
    }
    const KEY: &str = "AUTHORITY[\"EPSG\",\"";
    let idx = projection.rfind(KEY)?;
    let start = idx + KEY.len();
    let end = projection[start..].find('"')?;
    projection[start..start + end].parse().ok()
}

impl RasterHandle {
    /// Open an existing raster file and read its metadata.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(Error::FileNotFound {
                path: path.to_path_buf(),
            });
        }
        debug!(path = %path.display(), "opening raster");
        let dataset = Dataset::open(path)?;
        let (cols, rows) = dataset.raster_size();
        let bands = dataset.raster_count() as usize;
        let gt = dataset
            .geo_transform()
            .unwrap_or([0.0, 1.0, 0.0, 0.0, 0.0, 1.0]);
        let geometry = RasterGeometry::from_transform(gt, cols, rows);

        let mut projection = dataset.projection();
        if projection.is_empty() {
            // fall back to the GCP projection when the dataset is not yet warped
            if let Some(gcp_proj) = dataset.gcp_projection() {
                projection = gcp_proj;
            }
        }
        let epsg = parse_epsg(&projection);

        let band = dataset.rasterband(1)?;
        let pixel_type =
            PixelType::from_gdal(band.band_type()).ok_or_else(|| Error::UnsupportedOperation {
                op: "open",
                reason: format!("band data type {:?} not supported", band.band_type()),
            })?;
        let nodata = band.no_data_value();

        Ok(RasterHandle {
            path: path.to_path_buf(),
            dataset,
            geometry,
            bands,
            pixel_type,
            projection,
            epsg,
            nodata,
            cache: Vec::new(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn band_count(&self) -> usize {
        self.bands
    }

    pub fn geometry(&self) -> &RasterGeometry {
        &self.geometry
    }

    pub fn resolution(&self) -> (f64, f64) {
        self.geometry.resolution()
    }

    pub fn projection(&self) -> &str {
        &self.projection
    }

    pub fn epsg(&self) -> Option<u32> {
        self.epsg
    }

    pub fn nodata(&self) -> Option<f64> {
        self.nodata
    }

    pub fn pixel_type(&self) -> PixelType {
        self.pixel_type
    }

    pub fn bbox(&self) -> BoundingBox {
        self.geometry.bbox()
    }

    pub fn is_loaded(&self) -> bool {
        !self.cache.is_empty()
    }

    fn check_window(&self, window: &Window) -> Result<()> {
        if window.col_off + window.cols > self.geometry.cols
            || window.row_off + window.rows > self.geometry.rows
        {
            return Err(Error::precondition(format!(
                "window {window:?} exceeds raster extent {}x{}",
                self.geometry.cols, self.geometry.rows
            )));
        }
        Ok(())
    }

    /// Read one band (1-based) as a 2D array of shape (rows, cols).
    ///
    /// Slices the in-memory cache when loaded, otherwise reads the window
    /// from the source file.
    pub fn read_band(&self, band: usize, window: Option<Window>) -> Result<Array2<f64>> {
        if band == 0 || band > self.bands {
            return Err(Error::precondition(format!(
                "band index {band} out of range 1..={}",
                self.bands
            )));
        }
        let window = window.unwrap_or(Window::full(self.geometry.cols, self.geometry.rows));
        self.check_window(&window)?;

        if self.cache.len() >= band {
            let mat = &self.cache[band - 1];
            return Ok(mat
                .slice(s![
                    window.row_off..window.row_off + window.rows,
                    window.col_off..window.col_off + window.cols
                ])
                .to_owned());
        }

        let gdal_band = self.dataset.rasterband(band)?;
        let buf = gdal_band.read_as::<f64>(
            (window.col_off as isize, window.row_off as isize),
            (window.cols, window.rows),
            (window.cols, window.rows),
            Some(ResampleAlg::NearestNeighbour),
        )?;
        let array = Array2::from_shape_vec((window.rows, window.cols), buf.data().to_vec())
            .map_err(|_| {
                Error::precondition(format!(
                    "unexpected buffer shape for window {}x{}",
                    window.cols, window.rows
                ))
            })?;
        Ok(array)
    }

    /// Load every band over the full extent into the in-memory cache.
    pub fn load(&mut self) -> Result<()> {
        if self.is_loaded() {
            return Ok(());
        }
        let mut data = Vec::with_capacity(self.bands);
        for band in 1..=self.bands {
            data.push(self.read_band(band, None)?);
        }
        self.cache = data;
        Ok(())
    }

    /// Replace the in-memory data with `array`, taking ownership of it.
    ///
    /// With a window, the logical extent shrinks to the window and the
    /// geometry origin shifts by its offset; the source file is untouched.
    pub fn assign(&mut self, array: Array2<f64>, window: Option<Window>) -> Result<()> {
        let (rows, cols) = array.dim();
        match window {
            Some(w) => {
                if w.rows != rows || w.cols != cols {
                    return Err(Error::precondition(format!(
                        "array shape {rows}x{cols} does not match window {w:?}"
                    )));
                }
                self.geometry = self.geometry.shifted(&w);
            }
            None => {
                self.geometry.rows = rows;
                self.geometry.cols = cols;
            }
        }
        self.bands = 1;
        self.cache = vec![array];
        Ok(())
    }

    /// Apply a numeric transform to a single-band raster and round to the
    /// nearest integer.
    pub fn rescale<F>(&mut self, transform: F) -> Result<()>
    where
        F: Fn(f64) -> f64,
    {
        if self.bands != 1 {
            return Err(Error::UnsupportedOperation {
                op: "rescale",
                reason: format!("only single band images supported, got {}", self.bands),
            });
        }
        let mat = self.read_band(1, None)?;
        let rounded = mat.mapv(|v| transform(v).round());
        self.assign(rounded, None)
    }

    /// Trim border rows and columns that contain only no-data values.
    pub fn reduce(&mut self) -> Result<()> {
        if self.bands != 1 {
            return Err(Error::UnsupportedOperation {
                op: "reduce",
                reason: format!("only single band images supported, got {}", self.bands),
            });
        }
        let Some(nodata) = self.nodata else {
            return Err(Error::UnsupportedOperation {
                op: "reduce",
                reason: "raster defines no no-data value".to_string(),
            });
        };
        let mat = self.read_band(1, None)?;

        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        let mut valid = 0usize;
        for &v in mat.iter() {
            if v != nodata {
                min = min.min(v);
                max = max.max(v);
                valid += 1;
            }
        }
        if valid == 0 {
            return Err(Error::DegenerateData {
                reason: "file does not contain valid pixels".to_string(),
            });
        }
        if min == max {
            return Err(Error::DegenerateData {
                reason: format!("all valid pixels share one value ({min})"),
            });
        }

        // trim_valid cannot fail here, the band has valid pixels
        let (window, trimmed) = trim_valid(&mat, nodata).unwrap();
        debug!(?window, "reducing raster to valid extent");
        self.assign(trimmed, Some(window))
    }

    /// Inverse-distance weighted average of valid pixels around a point.
    ///
    /// The search window spans `radius` pixels in each direction. Returns
    /// `nodata` when no valid pixel falls inside it, and 0.0 when valid
    /// pixels exist but their weighted sum is not positive.
    pub fn extract(&self, px: f64, py: f64, radius: f64, nodata: f64) -> Result<f64> {
        let (xres, yres) = self.geometry.resolution();
        let xlim = xres * radius;
        let ylim = yres * radius;

        let col_min = (((px - self.geometry.origin_x - xlim) / xres).floor() as isize).max(0);
        let row_min = (((self.geometry.origin_y - py - ylim) / yres).floor() as isize).max(0);
        let col_max = ((((px - self.geometry.origin_x + xlim) / xres).floor() as isize) + 2)
            .min(self.geometry.cols as isize);
        let row_max = ((((self.geometry.origin_y - py + ylim) / yres).floor() as isize) + 2)
            .min(self.geometry.rows as isize);

        if col_min >= col_max || row_min >= row_max {
            return Ok(nodata);
        }
        let window = Window {
            col_off: col_min as usize,
            row_off: row_min as usize,
            cols: (col_max - col_min) as usize,
            rows: (row_max - row_min) as usize,
        };
        let array = self.read_band(1, Some(window))?;
        Ok(weighted_average(
            &array,
            &self.geometry,
            &window,
            px,
            py,
            nodata,
        ))
    }

    /// Write the raster to a new file.
    ///
    /// In-memory data is written when loaded, otherwise the (windowed)
    /// source data is copied. Geometry, projection, metadata and per-band
    /// no-data are carried over, with the geotransform shifted for the
    /// window offset.
    pub fn write(&self, outname: &Path, opts: &WriteOptions) -> Result<()> {
        let outname = normalized_outname(outname, opts.driver);
        if outname.exists() && !opts.overwrite {
            return Err(Error::OutputExists { path: outname });
        }

        let window = opts
            .window
            .unwrap_or(Window::full(self.geometry.cols, self.geometry.rows));
        self.check_window(&window)?;
        let pixel_type = opts.pixel_type.unwrap_or(self.pixel_type);
        let geometry = self.geometry.shifted(&window);

        debug!(path = %outname.display(), driver = %opts.driver, "writing raster");
        let driver = DriverManager::get_driver_by_name(opts.driver.gdal_name())?;
        let mut out = match pixel_type {
            PixelType::Byte => {
                driver.create_with_band_type::<u8, _>(&outname, window.cols, window.rows, self.bands)?
            }
            PixelType::Int16 => {
                driver.create_with_band_type::<i16, _>(&outname, window.cols, window.rows, self.bands)?
            }
            PixelType::UInt16 => {
                driver.create_with_band_type::<u16, _>(&outname, window.cols, window.rows, self.bands)?
            }
            PixelType::Int32 => {
                driver.create_with_band_type::<i32, _>(&outname, window.cols, window.rows, self.bands)?
            }
            PixelType::UInt32 => {
                driver.create_with_band_type::<u32, _>(&outname, window.cols, window.rows, self.bands)?
            }
            PixelType::Float32 => {
                driver.create_with_band_type::<f32, _>(&outname, window.cols, window.rows, self.bands)?
            }
            PixelType::Float64 => {
                driver.create_with_band_type::<f64, _>(&outname, window.cols, window.rows, self.bands)?
            }
        };

        if let Some(entries) = self.dataset.metadata_domain("") {
            for entry in entries {
                if let Some((key, value)) = entry.split_once('=') {
                    out.set_metadata_item(key, value, "")?;
                }
            }
        }
        out.set_geo_transform(&geometry.to_transform())?;
        if !self.projection.is_empty() {
            out.set_projection(&self.projection)?;
        }

        for band in 1..=self.bands {
            let mat = self.read_band(band, Some(window))?;
            let mut out_band = out.rasterband(band)?;
            match pixel_type {
                PixelType::Byte => write_band(&mut out_band, &mat, |v| v as u8)?,
                PixelType::Int16 => write_band(&mut out_band, &mat, |v| v as i16)?,
                PixelType::UInt16 => write_band(&mut out_band, &mat, |v| v as u16)?,
                PixelType::Int32 => write_band(&mut out_band, &mat, |v| v as i32)?,
                PixelType::UInt32 => write_band(&mut out_band, &mat, |v| v as u32)?,
                PixelType::Float32 => write_band(&mut out_band, &mat, |v| v as f32)?,
                PixelType::Float64 => write_band(&mut out_band, &mat, |v| v)?,
            }
            if self.nodata.is_some() {
                out_band.set_no_data_value(self.nodata)?;
            }
        }
        out.flush_cache()?;
        Ok(())
    }
}

fn write_band<T: GdalType + Copy>(
    band: &mut gdal::raster::RasterBand,
    mat: &Array2<f64>,
    cast: impl Fn(f64) -> T,
) -> Result<()> {
    let (rows, cols) = mat.dim();
    let data: Vec<T> = mat.iter().map(|&v| cast(v)).collect();
    let mut buffer = Buffer::new((cols, rows), data);
    band.write((0, 0), (cols, rows), &mut buffer)?;
    Ok(())
}

// GTiff outputs conventionally carry a .tif suffix.
fn normalized_outname(outname: &Path, driver: OutputDriver) -> PathBuf {
    match driver {
        OutputDriver::GTiff => {
            let matches = outname
                .extension()
                .and_then(|e| e.to_str())
                .map(|e| e.eq_ignore_ascii_case("tif") || e.eq_ignore_ascii_case("tiff"))
                .unwrap_or(false);
            if matches {
                outname.to_path_buf()
            } else {
                let mut os = outname.as_os_str().to_os_string();
                os.push(".tif");
                PathBuf::from(os)
            }
        }
        OutputDriver::Envi => outname.to_path_buf(),
    }
}

/// Window enclosing all valid (non-no-data) pixels, with the trimmed matrix.
/// `None` when the matrix holds no valid pixel.
fn trim_valid(mat: &Array2<f64>, nodata: f64) -> Option<(Window, Array2<f64>)> {
    let (rows, cols) = mat.dim();
    let valid_row: Vec<bool> = (0..rows)
        .map(|r| mat.row(r).iter().any(|&v| v != nodata))
        .collect();
    let valid_col: Vec<bool> = (0..cols)
        .map(|c| mat.column(c).iter().any(|&v| v != nodata))
        .collect();

    let top = valid_row.iter().position(|&v| v)?;
    let bottom = valid_row.iter().rposition(|&v| v)?;
    let left = valid_col.iter().position(|&v| v)?;
    let right = valid_col.iter().rposition(|&v| v)?;

    let window = Window {
        col_off: left,
        row_off: top,
        cols: right - left + 1,
        rows: bottom - top + 1,
    };
    let trimmed = mat
        .slice(s![top..bottom + 1, left..right + 1])
        .to_owned();
    Some((window, trimmed))
}

/// Weighted-average core of [`RasterHandle::extract`], over an already-read
/// window. Weights are inverse distances from pixel center to the point.
fn weighted_average(
    array: &Array2<f64>,
    geometry: &RasterGeometry,
    window: &Window,
    px: f64,
    py: f64,
    nodata: f64,
) -> f64 {
    let mut sum = 0.0;
    let mut weightsum = 0.0;
    let mut counter = 0usize;

    for row in 0..window.rows {
        for col in 0..window.cols {
            let val = array[[row, col]];
            if val == nodata {
                continue;
            }
            let abs_col = (window.col_off + col) as f64;
            let abs_row = (window.row_off + row) as f64;
            let xc = geometry.origin_x + (abs_col + 0.5) * geometry.pixel_width;
            let yc = geometry.origin_y + (abs_row + 0.5) * geometry.pixel_height;
            let dist = ((xc - px).powi(2) + (yc - py).powi(2)).sqrt();
            let weight = 1.0 / dist.max(1e-9);
            sum += val * weight;
            weightsum += weight;
            counter += 1;
        }
    }

    if sum > 0.0 {
        sum / weightsum
    } else if counter > 0 {
        0.0
    } else {
        nodata
    }
}

/// Reproject a raster into `target_projection` via gdalwarp, preserving the
/// source resolution and no-data value.
pub fn reproject(
    raster: &RasterHandle,
    target_projection: &str,
    outname: &Path,
    resampling: ResamplingMethod,
    driver: OutputDriver,
) -> Result<()> {
    let (xres, yres) = raster.resolution();
    let mut args: Vec<String> = vec![
        "gdalwarp".into(),
        "-overwrite".into(),
        "-q".into(),
        "-r".into(),
        resampling.gdal_name().into(),
        "-of".into(),
        driver.gdal_name().into(),
        "-tr".into(),
        xres.to_string(),
        yres.to_string(),
    ];
    if let Some(nodata) = raster.nodata() {
        args.push("-srcnodata".into());
        args.push(nodata.to_string());
        args.push("-dstnodata".into());
        args.push(nodata.to_string());
    }
    args.push("-t_srs".into());
    args.push(target_projection.into());
    args.push(raster.path().display().to_string());
    args.push(outname.display().to_string());
    exec::run(&args, None, true)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn north_up_geometry() -> RasterGeometry {
        // 10 m pixels, origin at (500000, 4600000), 100x80 raster
        RasterGeometry::from_transform([500_000.0, 10.0, 0.0, 4_600_000.0, 0.0, -10.0], 100, 80)
    }

    #[test]
    fn derived_extents() {
        let geo = north_up_geometry();
        assert_eq!(geo.xmax(), 501_000.0);
        assert_eq!(geo.ymin(), 4_599_200.0);
        assert_eq!(geo.resolution(), (10.0, 10.0));
        let bbox = geo.bbox();
        assert_eq!(bbox.xmin, 500_000.0);
        assert_eq!(bbox.xmax, 501_000.0);
        assert_eq!(bbox.ymin, 4_599_200.0);
        assert_eq!(bbox.ymax, 4_600_000.0);
    }

    #[test]
    fn transform_round_trips() {
        let geo = north_up_geometry();
        let rebuilt = RasterGeometry::from_transform(geo.to_transform(), geo.cols, geo.rows);
        assert_eq!(geo, rebuilt);
    }

    #[test]
    fn shifted_window_moves_the_origin() {
        let geo = north_up_geometry();
        let window = Window {
            col_off: 10,
            row_off: 5,
            cols: 20,
            rows: 15,
        };
        let shifted = geo.shifted(&window);
        assert_eq!(shifted.origin_x, 500_100.0);
        assert_eq!(shifted.origin_y, 4_599_950.0);
        assert_eq!(shifted.cols, 20);
        assert_eq!(shifted.rows, 15);
    }

    #[test]
    fn trim_valid_strips_nodata_border() {
        let nd = -99.0;
        let mat = array![
            [nd, nd, nd, nd],
            [nd, 1.0, 2.0, nd],
            [nd, 3.0, nd, nd],
            [nd, nd, nd, nd],
        ];
        let (window, trimmed) = trim_valid(&mat, nd).unwrap();
        assert_eq!(
            window,
            Window {
                col_off: 1,
                row_off: 1,
                cols: 2,
                rows: 2
            }
        );
        assert_eq!(trimmed, array![[1.0, 2.0], [3.0, nd]]);
    }

    #[test]
    fn trim_valid_on_all_nodata_is_none() {
        let mat = Array2::from_elem((3, 3), -99.0);
        assert!(trim_valid(&mat, -99.0).is_none());
    }

    #[test]
    fn weighted_average_single_valid_pixel_returns_its_value() {
        let nd = 0.0;
        let geo = north_up_geometry();
        let window = Window::full(2, 2);
        let array = array![[nd, nd], [7.5, nd]];
        // query point far from the pixel center, weight arithmetic irrelevant
        let result = weighted_average(&array, &geo, &window, 500_018.0, 4_599_993.0, nd);
        assert!((result - 7.5).abs() < 1e-9);
    }

    #[test]
    fn weighted_average_no_valid_pixels_returns_nodata() {
        let nd = -1.0;
        let geo = north_up_geometry();
        let window = Window::full(2, 2);
        let array = Array2::from_elem((2, 2), nd);
        assert_eq!(
            weighted_average(&array, &geo, &window, 500_010.0, 4_599_990.0, nd),
            nd
        );
    }

    #[test]
    fn weighted_average_nonpositive_sum_is_zero() {
        let nd = 99.0;
        let geo = north_up_geometry();
        let window = Window::full(2, 2);
        let array = array![[-3.0, nd], [nd, nd]];
        assert_eq!(
            weighted_average(&array, &geo, &window, 500_010.0, 4_599_990.0, nd),
            0.0
        );
    }

    #[test]
    fn gtiff_outname_gets_a_tif_suffix() {
        assert_eq!(
            normalized_outname(Path::new("/out/scene"), OutputDriver::GTiff),
            PathBuf::from("/out/scene.tif")
        );
        assert_eq!(
            normalized_outname(Path::new("/out/scene.tiff"), OutputDriver::GTiff),
            PathBuf::from("/out/scene.tiff")
        );
        assert_eq!(
            normalized_outname(Path::new("/out/scene"), OutputDriver::Envi),
            PathBuf::from("/out/scene")
        );
    }

    #[test]
    fn epsg_from_wkt_authority_tag() {
        let wkt = r#"PROJCS["WGS 84 / UTM zone 30N",GEOGCS["WGS 84",AUTHORITY["EPSG","4326"]],AUTHORITY["EPSG","32630"]]"#;
        assert_eq!(parse_epsg(wkt), Some(32630));
        assert_eq!(parse_epsg("EPSG:4326"), Some(4326));
        assert_eq!(parse_epsg("LOCAL_CS[\"unnamed\"]"), None);
    }

    #[test]
    fn open_missing_file_is_file_not_found() {
        let err = RasterHandle::open("/no/such/raster.tif").unwrap_err();
        assert!(matches!(err, Error::FileNotFound { .. }));
    }
}

// Tests below exercise the handle against real GeoTIFF files written through
// the GDAL driver API.
#[cfg(test)]
mod gdal_io_tests {
    use super::*;
    use tempfile::TempDir;

    const ND: f64 = -99.0;

    // 4x3 raster, 10 m pixels, origin (500000, 4600000), row-major values
    fn create_raster(dir: &Path, name: &str, values: [f64; 12]) -> PathBuf {
        let path = dir.join(name);
        let driver = DriverManager::get_driver_by_name("GTiff").unwrap();
        let mut ds = driver
            .create_with_band_type::<f64, _>(&path, 4, 3, 1)
            .unwrap();
        ds.set_geo_transform(&[500_000.0, 10.0, 0.0, 4_600_000.0, 0.0, -10.0])
            .unwrap();
        let mut band = ds.rasterband(1).unwrap();
        let mut buffer = Buffer::new((4, 3), values.to_vec());
        band.write((0, 0), (4, 3), &mut buffer).unwrap();
        band.set_no_data_value(Some(ND)).unwrap();
        ds.flush_cache().unwrap();
        drop(ds);
        path
    }

    fn bordered(dir: &Path) -> PathBuf {
        create_raster(
            dir,
            "bordered.tif",
            [
                ND, ND, ND, ND, //
                ND, 1.0, 2.0, ND, //
                ND, ND, ND, ND,
            ],
        )
    }

    #[test]
    fn open_reads_metadata() {
        let temp = TempDir::new().unwrap();
        let raster = RasterHandle::open(bordered(temp.path())).unwrap();
        assert_eq!(raster.band_count(), 1);
        assert_eq!(raster.pixel_type(), PixelType::Float64);
        assert_eq!(raster.nodata(), Some(ND));
        assert_eq!(raster.geometry().cols, 4);
        assert_eq!(raster.geometry().rows, 3);
        assert_eq!(raster.resolution(), (10.0, 10.0));
    }

    #[test]
    fn read_band_windows_into_the_file() {
        let temp = TempDir::new().unwrap();
        let raster = RasterHandle::open(bordered(temp.path())).unwrap();
        let window = Window {
            col_off: 1,
            row_off: 1,
            cols: 2,
            rows: 1,
        };
        let mat = raster.read_band(1, Some(window)).unwrap();
        assert_eq!(mat, ndarray::array![[1.0, 2.0]]);

        let err = raster.read_band(2, None).unwrap_err();
        assert!(matches!(err, Error::Precondition { .. }));
    }

    #[test]
    fn load_serves_reads_from_the_cache() {
        let temp = TempDir::new().unwrap();
        let mut raster = RasterHandle::open(bordered(temp.path())).unwrap();
        raster.load().unwrap();
        assert!(raster.is_loaded());
        let mat = raster.read_band(1, None).unwrap();
        assert_eq!(mat[[1, 1]], 1.0);
    }

    #[test]
    fn rescale_applies_and_rounds() {
        let temp = TempDir::new().unwrap();
        let mut raster = RasterHandle::open(bordered(temp.path())).unwrap();
        raster.rescale(|v| if v == ND { ND } else { v * 2.0 + 0.2 }).unwrap();
        let mat = raster.read_band(1, None).unwrap();
        assert_eq!(mat[[1, 1]], 2.0);
        assert_eq!(mat[[1, 2]], 4.0);
        assert_eq!(mat[[0, 0]], ND);
    }

    #[test]
    fn reduce_trims_and_shifts_the_origin() {
        let temp = TempDir::new().unwrap();
        let mut raster = RasterHandle::open(bordered(temp.path())).unwrap();
        raster.reduce().unwrap();
        assert_eq!(raster.geometry().cols, 2);
        assert_eq!(raster.geometry().rows, 1);
        assert_eq!(raster.geometry().origin_x, 500_010.0);
        assert_eq!(raster.geometry().origin_y, 4_599_990.0);
        assert_eq!(raster.read_band(1, None).unwrap(), ndarray::array![[1.0, 2.0]]);
    }

    #[test]
    fn reduce_rejects_degenerate_bands() {
        let temp = TempDir::new().unwrap();
        let all_nodata = create_raster(temp.path(), "nodata.tif", [ND; 12]);
        let mut raster = RasterHandle::open(all_nodata).unwrap();
        assert!(matches!(
            raster.reduce().unwrap_err(),
            Error::DegenerateData { .. }
        ));

        let constant = create_raster(temp.path(), "constant.tif", [5.0; 12]);
        let mut raster = RasterHandle::open(constant).unwrap();
        assert!(matches!(
            raster.reduce().unwrap_err(),
            Error::DegenerateData { .. }
        ));
    }

    #[test]
    fn extract_single_valid_pixel_returns_its_value() {
        let temp = TempDir::new().unwrap();
        let single = create_raster(
            temp.path(),
            "single.tif",
            [
                ND, ND, ND, ND, //
                ND, 7.5, ND, ND, //
                ND, ND, ND, ND,
            ],
        );
        let raster = RasterHandle::open(single).unwrap();
        let value = raster.extract(500_012.0, 4_599_987.0, 2.0, ND).unwrap();
        assert!((value - 7.5).abs() < 1e-9);
    }

    #[test]
    fn extract_without_valid_pixels_returns_the_override() {
        let temp = TempDir::new().unwrap();
        let all_nodata = create_raster(temp.path(), "nodata.tif", [ND; 12]);
        let raster = RasterHandle::open(all_nodata).unwrap();
        assert_eq!(raster.extract(500_015.0, 4_599_985.0, 1.0, ND).unwrap(), ND);
    }

    #[test]
    fn write_round_trips_through_gdal() {
        let temp = TempDir::new().unwrap();
        let raster = RasterHandle::open(bordered(temp.path())).unwrap();
        let out = temp.path().join("copy");
        let opts = WriteOptions {
            driver: OutputDriver::GTiff,
            window: Some(Window {
                col_off: 1,
                row_off: 1,
                cols: 2,
                rows: 1,
            }),
            ..Default::default()
        };
        raster.write(&out, &opts).unwrap();

        let copy = RasterHandle::open(temp.path().join("copy.tif")).unwrap();
        assert_eq!(copy.geometry().cols, 2);
        assert_eq!(copy.geometry().rows, 1);
        assert_eq!(copy.geometry().origin_x, 500_010.0);
        assert_eq!(copy.nodata(), Some(ND));
        assert_eq!(copy.read_band(1, None).unwrap(), ndarray::array![[1.0, 2.0]]);
    }

    #[test]
    fn write_refuses_existing_output_without_overwrite() {
        let temp = TempDir::new().unwrap();
        let raster = RasterHandle::open(bordered(temp.path())).unwrap();
        let out = temp.path().join("copy");
        let opts = WriteOptions {
            driver: OutputDriver::GTiff,
            overwrite: false,
            ..Default::default()
        };
        raster.write(&out, &opts).unwrap();
        let err = raster.write(&out, &opts).unwrap_err();
        assert!(matches!(err, Error::OutputExists { .. }));
    }
}

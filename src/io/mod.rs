//! I/O layer: the GDAL raster handle, clip-geometry extents and the ENVI
//! sidecar header.
pub mod envi;
pub mod raster;
pub mod vector;

pub use envi::{EnviError, EnviHeader};
pub use raster::{RasterGeometry, RasterHandle, Window, WriteOptions, reproject};
pub use vector::{BoundingBox, clip_extent};

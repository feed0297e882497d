//! Clip-geometry support: bounding boxes and vector-extent extraction.

use std::path::Path;

use gdal::Dataset;
use gdal::spatial_ref::{AxisMappingStrategy, CoordTransform, SpatialRef};
use gdal::vector::LayerAccess;
use serde::Serialize;

use crate::error::{Error, Result};

/// Axis-aligned bounding rectangle in map coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BoundingBox {
    pub xmin: f64,
    pub xmax: f64,
    pub ymin: f64,
    pub ymax: f64,
}

impl BoundingBox {
    /// Overlap test; touching edges count as intersecting.
    pub fn intersects(&self, other: &BoundingBox) -> bool {
        self.xmin <= other.xmax
            && self.xmax >= other.xmin
            && self.ymin <= other.ymax
            && self.ymax >= other.ymin
    }
}

/// Read the extent of the first layer of a vector dataset, reprojected into
/// `target_projection` (WKT) when the layer carries a spatial reference.
///
/// The four envelope corners are transformed and the enclosing rectangle
/// returned, the usual conservative approximation for warp bounds.
pub fn clip_extent(path: &Path, target_projection: &str) -> Result<BoundingBox> {
    if !path.exists() {
        return Err(Error::FileNotFound {
            path: path.to_path_buf(),
        });
    }
    let dataset = Dataset::open(path)?;
    let layer = dataset.layer(0)?;
    let env = layer.get_extent()?;

    let Some(mut src_srs) = layer.spatial_ref() else {
        return Ok(BoundingBox {
            xmin: env.MinX,
            xmax: env.MaxX,
            ymin: env.MinY,
            ymax: env.MaxY,
        });
    };
    src_srs.set_axis_mapping_strategy(AxisMappingStrategy::TraditionalGisOrder);
    let mut dst_srs = SpatialRef::from_wkt(target_projection)?;
    dst_srs.set_axis_mapping_strategy(AxisMappingStrategy::TraditionalGisOrder);

    let transform = CoordTransform::new(&src_srs, &dst_srs)?;
    let mut xs = [env.MinX, env.MinX, env.MaxX, env.MaxX];
    let mut ys = [env.MinY, env.MaxY, env.MinY, env.MaxY];
    let mut zs = [0.0; 4];
    transform.transform_coords(&mut xs, &mut ys, &mut zs)?;

    Ok(BoundingBox {
        xmin: xs.iter().cloned().fold(f64::INFINITY, f64::min),
        xmax: xs.iter().cloned().fold(f64::NEG_INFINITY, f64::max),
        ymin: ys.iter().cloned().fold(f64::INFINITY, f64::min),
        ymax: ys.iter().cloned().fold(f64::NEG_INFINITY, f64::max),
    })
}

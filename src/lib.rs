#![doc = r#"
sarstack — discovery, grouping, mosaicking and stacking of SAR processing products.

This crate provides a typed, ergonomic layer over GDAL for the recurring chores
around SAR product handling: parsing structured metadata out of product file
names, discovering and filtering datasets on disk, grouping scenes by attribute
or acquisition time, wrapping single raster files for windowed reads and
in-memory edits, and mosaicking/stacking groups of rasters into a multi-band
cube or separate tiles. It powers the sarstack CLI and can be embedded in your
own Rust applications.

Requirements
------------
- GDAL development headers and runtime available on your system.
- The `gdalbuildvrt` and `gdalwarp` executables on PATH (stacking only).
- Rust 2024 edition toolchain.

Quick start: stack two scenes into a cube
-----------------------------------------
```rust,no_run
use std::path::PathBuf;
use sarstack::{ResamplingMethod, StackRequest, stack};

fn main() -> sarstack::Result<()> {
    let request = StackRequest {
        groups: vec![
            vec![PathBuf::from("/data/S1A__IW___A_20150309T173017_VV_grd.tif")],
            vec![PathBuf::from("/data/S1A__IW___A_20150315T173017_VV_grd.tif")],
        ],
        destination: PathBuf::from("/out/cube"),
        resampling: ResamplingMethod::Bilinear,
        target_resolution: (20.0, 20.0),
        src_nodata: -99.0,
        dst_nodata: -99.0,
        clip: None,
        layer_names: None,
        sort_key: None,
        separate: false,
        overwrite: false,
        compress: true,
        workers: 4,
    };
    stack(&request)
}
```

Discover and group datasets
---------------------------
```rust,no_run
use std::path::Path;
use sarstack::{DatasetFilter, Match, find_datasets, group_by_interval, seconds};

fn main() -> sarstack::Result<()> {
    let filter = DatasetFilter {
        sensor: Some(Match::OneOf(vec!["S1A".into(), "S1B".into()])),
        polarization: Some(Match::Is("VV".into())),
        ..Default::default()
    };
    let scenes = find_datasets(Path::new("/data"), true, &filter)?;
    let groups = group_by_interval(&scenes, |p| seconds(p), 30.0)?;
    println!("{} acquisition groups", groups.len());
    Ok(())
}
```

Raster handles
--------------
```rust,no_run
use std::path::Path;
use sarstack::RasterHandle;

fn main() -> sarstack::Result<()> {
    let mut raster = RasterHandle::open("/data/scene.tif")?;
    println!("{} bands, EPSG {:?}", raster.band_count(), raster.epsg());
    raster.reduce()?; // trim the no-data border
    raster.write(Path::new("/out/trimmed"), &Default::default())
}
```

Error handling
--------------
All public functions return [`Result`]; match on [`Error`] to handle specific
cases such as precondition violations or projection mismatches.

Useful modules
--------------
- [`meta`] — product-name parsing, dataset discovery, grouping.
- [`io`] — raster handle, clip extents, ENVI headers.
- [`stack`] — the mosaicking/stacking pipeline.
- [`exec`] — subprocess helpers used for the GDAL tools.
"#]

pub mod error;
pub mod exec;
pub mod io;
pub mod meta;
pub mod stack;
pub mod types;

pub use error::{Error, Result};
pub use types::{OutputDriver, PixelType, ResamplingMethod};

pub use meta::{
    DatasetFilter, Match, ProductAttr, ProductName, find_datasets, group_by_attribute,
    group_by_interval, seconds,
};

pub use io::{
    BoundingBox, EnviHeader, RasterGeometry, RasterHandle, Window, WriteOptions, clip_extent,
    reproject,
};

pub use exec::{CommandOutput, run, which};

pub use stack::{SortKey, StackRequest, stack};

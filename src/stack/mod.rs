//! Mosaicking, resampling and stacking of raster groups.
//!
//! Each source group is mosaicked into a virtual raster and warped, either
//! independently into per-group GeoTIFF tiles (bounded parallel fan-out) or
//! as bands of one ENVI cube whose header is relabeled afterwards. All pixel
//! work is delegated to gdalbuildvrt/gdalwarp.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::exec;
use crate::io::envi::EnviHeader;
use crate::io::raster::RasterHandle;
use crate::io::vector::{BoundingBox, clip_extent};
use crate::types::{OutputDriver, ResamplingMethod};

/// Numeric sort key over a source path, e.g.
/// [`crate::meta::filename::seconds`] wrapped in a closure.
pub type SortKey = fn(&Path) -> Option<f64>;

/// Parameters of one stacking run.
pub struct StackRequest {
    /// Source groups; each group is mosaicked into one output layer.
    pub groups: Vec<Vec<PathBuf>>,
    /// Output cube path, or the output directory in separate mode.
    pub destination: PathBuf,
    pub resampling: ResamplingMethod,
    /// Target (x, y) resolution, both positive.
    pub target_resolution: (f64, f64),
    pub src_nodata: f64,
    pub dst_nodata: f64,
    /// Optional vector dataset bounding the output extent.
    pub clip: Option<PathBuf>,
    /// Explicit output layer names; first-member basenames when `None`.
    pub layer_names: Option<Vec<String>>,
    /// Mosaic/layer ordering key.
    pub sort_key: Option<SortKey>,
    /// Write one GeoTIFF per group instead of a single cube.
    pub separate: bool,
    pub overwrite: bool,
    /// DEFLATE-compress GeoTIFF tiles.
    pub compress: bool,
    /// Upper bound on concurrent warps in separate mode.
    pub workers: usize,
}

#[derive(Debug, Clone)]
struct WarpOptions {
    format: OutputDriver,
    bounds: Option<BoundingBox>,
    resampling: ResamplingMethod,
    target_resolution: (f64, f64),
    src_nodata: f64,
    dst_nodata: f64,
    overwrite: bool,
    compress: bool,
}

fn stem_of(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "stack".to_string())
}

fn validate(request: &StackRequest) -> Result<()> {
    if request.groups.is_empty() {
        return Err(Error::precondition("no source files supplied"));
    }
    if request.groups.iter().any(|g| g.is_empty()) {
        return Err(Error::precondition("empty source group"));
    }
    if request.groups.len() == 1 && request.groups[0].len() == 1 {
        return Err(Error::precondition(
            "only one file specified; nothing to be done",
        ));
    }
    if let Some(names) = &request.layer_names {
        if names.len() != request.groups.len() {
            return Err(Error::precondition(format!(
                "mismatch between number of source file groups ({}) and layer names ({})",
                request.groups.len(),
                names.len()
            )));
        }
    }
    let (xres, yres) = request.target_resolution;
    if !(xres > 0.0 && yres > 0.0) {
        return Err(Error::precondition(format!(
            "target resolution must be positive, got ({xres}, {yres})"
        )));
    }
    if request.workers == 0 {
        return Err(Error::precondition("worker count must be at least 1"));
    }
    Ok(())
}

fn buildvrt_args(
    inputs: &[PathBuf],
    outname: &Path,
    bounds: Option<&BoundingBox>,
    src_nodata: Option<f64>,
    separate: bool,
) -> Vec<String> {
    let mut args: Vec<String> = vec!["gdalbuildvrt".into(), "-q".into()];
    if separate {
        args.push("-separate".into());
    }
    if let Some(b) = bounds {
        args.push("-te".into());
        args.extend([b.xmin, b.ymin, b.xmax, b.ymax].map(|v| v.to_string()));
    }
    if let Some(nodata) = src_nodata {
        args.push("-srcnodata".into());
        args.push(nodata.to_string());
    }
    args.push(outname.display().to_string());
    args.extend(inputs.iter().map(|p| p.display().to_string()));
    args
}

fn warp_args(src: &Path, dst: &Path, opts: &WarpOptions) -> Vec<String> {
    let mut args: Vec<String> = vec!["gdalwarp".into(), "-q".into()];
    if opts.overwrite {
        args.push("-overwrite".into());
    }
    if opts.compress && opts.format == OutputDriver::GTiff {
        args.extend(
            ["-co", "COMPRESS=DEFLATE", "-co", "PREDICTOR=2"]
                .iter()
                .map(|s| s.to_string()),
        );
    }
    args.push("-of".into());
    args.push(opts.format.gdal_name().into());
    if let Some(b) = opts.bounds {
        args.push("-te".into());
        args.extend([b.xmin, b.ymin, b.xmax, b.ymax].map(|v| v.to_string()));
    }
    args.push("-multi".into());
    args.push("-srcnodata".into());
    args.push(opts.src_nodata.to_string());
    args.push("-dstnodata".into());
    args.push(opts.dst_nodata.to_string());
    args.push("-tr".into());
    args.push(opts.target_resolution.0.to_string());
    args.push(opts.target_resolution.1.to_string());
    args.push("-r".into());
    args.push(opts.resampling.gdal_name().into());
    args.push(src.display().to_string());
    args.push(dst.display().to_string());
    args
}

fn build_vrt(
    inputs: &[PathBuf],
    outname: &Path,
    bounds: Option<&BoundingBox>,
    src_nodata: Option<f64>,
    separate: bool,
) -> Result<()> {
    debug!(vrt = %outname.display(), sources = inputs.len(), "building virtual mosaic");
    exec::run(
        &buildvrt_args(inputs, outname, bounds, src_nodata, separate),
        None,
        true,
    )?;
    Ok(())
}

fn warp(src: &Path, dst: &Path, opts: &WarpOptions) -> Result<()> {
    debug!(src = %src.display(), dst = %dst.display(), "warping");
    exec::run(&warp_args(src, dst, opts), None, true)?;
    Ok(())
}

/// Mosaic, resample and stack groups of raster files.
///
/// Precondition violations abort before any file is touched. All inputs must
/// share one spatial reference. When a clip dataset is given, groups are
/// reduced to members intersecting its extent; a fully disjoint group is
/// dropped with a warning. In separate mode one failed warp aborts the whole
/// batch; finished tiles are left on disk.
pub fn stack(request: &StackRequest) -> Result<()> {
    info!("beginning of stacking");
    validate(request)?;

    // projection consistency across every source, checked up front
    let mut projections = BTreeSet::new();
    let mut entries: Vec<(Vec<(PathBuf, BoundingBox)>, Option<String>)> = Vec::new();
    for (i, group) in request.groups.iter().enumerate() {
        let mut members = Vec::with_capacity(group.len());
        for path in group {
            let handle = RasterHandle::open(path)?;
            projections.insert(handle.projection().to_string());
            members.push((path.clone(), handle.bbox()));
        }
        let name = request.layer_names.as_ref().map(|n| n[i].clone());
        entries.push((members, name));
    }
    if projections.len() > 1 {
        return Err(Error::ProjectionMismatch {
            found: projections.len(),
        });
    }
    let srs = projections.into_iter().next().unwrap_or_default();

    // mosaic order within each group
    if let Some(key) = request.sort_key {
        let keyval = |p: &Path| key(p).unwrap_or(f64::INFINITY);
        for (members, _) in &mut entries {
            members.sort_by(|a, b| keyval(&a.0).total_cmp(&keyval(&b.0)));
        }
        // and layer order across groups, unless names pin it down
        if request.layer_names.is_none() {
            entries.sort_by(|a, b| keyval(&a.0[0].0).total_cmp(&keyval(&b.0[0].0)));
        }
    }

    // reduce groups to members overlapping the clip extent
    let bounds = match &request.clip {
        Some(clip) => Some(clip_extent(clip, &srs)?),
        None => None,
    };
    if let Some(bounds) = &bounds {
        let mut kept = Vec::with_capacity(entries.len());
        for (members, name) in entries {
            let filtered: Vec<_> = members
                .into_iter()
                .filter(|(_, bbox)| bbox.intersects(bounds))
                .collect();
            if filtered.is_empty() {
                warn!(
                    layer = name.as_deref().unwrap_or("<unnamed>"),
                    "group does not intersect the clip extent, dropping it"
                );
            } else {
                kept.push((filtered, name));
            }
        }
        entries = kept;
        if entries.is_empty() {
            info!("no source group overlaps the clip extent, nothing to be done");
            return Ok(());
        }
    }

    let dst_stem = stem_of(&request.destination);
    let parent = match request.destination.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&parent)?;
    // removed on success, early exit and error paths alike
    let tmpdir = tempfile::Builder::new()
        .prefix(&format!("{dst_stem}__tmp"))
        .tempdir_in(&parent)?;

    // one metadata-only mosaic per group; pixel merging happens in the warp
    let mut vrts = Vec::with_capacity(entries.len());
    let mut names = Vec::with_capacity(entries.len());
    for (members, name) in &entries {
        let paths: Vec<PathBuf> = members.iter().map(|(p, _)| p.clone()).collect();
        let vrt = tmpdir.path().join(format!("{}.vrt", stem_of(&paths[0])));
        build_vrt(
            &paths,
            &vrt,
            bounds.as_ref(),
            Some(request.src_nodata),
            false,
        )?;
        names.push(name.clone().unwrap_or_else(|| stem_of(&paths[0])));
        vrts.push(vrt);
    }

    let mut warp_opts = WarpOptions {
        format: OutputDriver::GTiff,
        bounds,
        resampling: request.resampling,
        target_resolution: request.target_resolution,
        src_nodata: request.src_nodata,
        dst_nodata: request.dst_nodata,
        overwrite: request.overwrite,
        compress: request.compress,
    };

    if request.separate || vrts.len() == 1 {
        fs::create_dir_all(&request.destination)?;
        let jobs: Vec<(PathBuf, PathBuf)> = vrts
            .iter()
            .zip(&names)
            .map(|(vrt, name)| (vrt.clone(), request.destination.join(format!("{name}.tif"))))
            .filter(|(_, dst)| request.overwrite || !dst.is_file())
            .collect();
        if jobs.is_empty() {
            info!("all target tiff files already exist, nothing to be done");
            return Ok(());
        }

        let workers = request.workers.min(jobs.len());
        info!(tiles = jobs.len(), workers, "warping separate tiles");
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .build()
            .map_err(|e| Error::WorkerPool(e.to_string()))?;
        pool.install(|| {
            jobs.par_iter()
                .map(|(src, dst)| warp(src, dst, &warp_opts))
                .collect::<Result<Vec<()>>>()
        })?;
    } else {
        // stack the group mosaics as bands of one virtual raster
        let stack_vrt = tmpdir.path().join(format!("{dst_stem}.vrt"));
        build_vrt(
            &vrts,
            &stack_vrt,
            bounds.as_ref(),
            Some(request.src_nodata),
            true,
        )?;

        warp_opts.format = OutputDriver::Envi;
        warp_opts.compress = false;
        info!(bands = names.len(), dst = %request.destination.display(), "warping stacked cube");
        warp(&stack_vrt, &request.destination, &warp_opts)?;

        // relabel the cube's bands in the sidecar header
        let hdr_path = EnviHeader::sidecar(&request.destination);
        let mut hdr = EnviHeader::read(&hdr_path)?;
        hdr.band_names = names;
        hdr.write(&hdr_path)?;
    }

    info!("stacking complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(groups: Vec<Vec<PathBuf>>) -> StackRequest {
        StackRequest {
            groups,
            destination: PathBuf::from("/out/stack"),
            resampling: ResamplingMethod::Near,
            target_resolution: (10.0, 10.0),
            src_nodata: -99.0,
            dst_nodata: -99.0,
            clip: None,
            layer_names: None,
            sort_key: None,
            separate: false,
            overwrite: false,
            compress: true,
            workers: 4,
        }
    }

    fn two_groups() -> Vec<Vec<PathBuf>> {
        vec![
            vec![PathBuf::from("/data/S1A__IW___A_20150309T173017_VV_grd.tif")],
            vec![PathBuf::from("/data/S1A__IW___A_20150315T173017_VV_grd.tif")],
        ]
    }

    #[test]
    fn empty_request_is_rejected() {
        let err = stack(&request(Vec::new())).unwrap_err();
        assert!(matches!(err, Error::Precondition { .. }));
    }

    #[test]
    fn single_ungrouped_input_is_rejected() {
        let groups = vec![vec![PathBuf::from("/data/a.tif")]];
        let err = stack(&request(groups)).unwrap_err();
        assert!(matches!(err, Error::Precondition { .. }));
    }

    #[test]
    fn one_group_of_many_files_passes_validation() {
        // a single multi-member group is a plain mosaic and is allowed;
        // with fake paths the pipeline must fail at open time, after the
        // precondition checks
        let groups = vec![vec![
            PathBuf::from("/data/a.tif"),
            PathBuf::from("/data/b.tif"),
        ]];
        let err = stack(&request(groups)).unwrap_err();
        assert!(matches!(err, Error::FileNotFound { .. }));
    }

    #[test]
    fn layer_name_count_must_match_groups() {
        let mut req = request(two_groups());
        req.layer_names = Some(vec!["only_one".into()]);
        let err = stack(&req).unwrap_err();
        assert!(matches!(err, Error::Precondition { .. }));
    }

    #[test]
    fn nonpositive_resolution_is_rejected() {
        let mut req = request(two_groups());
        req.target_resolution = (10.0, 0.0);
        let err = stack(&req).unwrap_err();
        assert!(matches!(err, Error::Precondition { .. }));
    }

    #[test]
    fn zero_workers_are_rejected() {
        let mut req = request(two_groups());
        req.workers = 0;
        let err = stack(&req).unwrap_err();
        assert!(matches!(err, Error::Precondition { .. }));
    }

    #[test]
    fn preconditions_run_before_any_io() {
        // both a bad name count and missing files: the precondition wins
        let mut req = request(two_groups());
        req.layer_names = Some(vec!["a".into()]);
        let err = stack(&req).unwrap_err();
        assert!(matches!(err, Error::Precondition { .. }));

        // with a valid request, the first failure is the missing source
        let err = stack(&request(two_groups())).unwrap_err();
        assert!(matches!(err, Error::FileNotFound { .. }));
    }

    #[test]
    fn warp_args_carry_the_full_option_set() {
        let opts = WarpOptions {
            format: OutputDriver::GTiff,
            bounds: Some(BoundingBox {
                xmin: 0.0,
                xmax: 100.0,
                ymin: 10.0,
                ymax: 90.0,
            }),
            resampling: ResamplingMethod::Bilinear,
            target_resolution: (20.0, 20.0),
            src_nodata: -99.0,
            dst_nodata: 0.0,
            overwrite: true,
            compress: true,
        };
        let args = warp_args(Path::new("/tmp/in.vrt"), Path::new("/out/a.tif"), &opts);
        assert_eq!(args[0], "gdalwarp");
        assert!(args.contains(&"-overwrite".to_string()));
        assert!(args.contains(&"COMPRESS=DEFLATE".to_string()));
        assert!(args.windows(2).any(|w| w == ["-r", "bilinear"]));
        assert!(args.windows(3).any(|w| w == ["-tr", "20", "20"]));
        assert!(
            args.windows(5)
                .any(|w| w == ["-te", "0", "10", "100", "90"])
        );
        assert_eq!(args[args.len() - 2], "/tmp/in.vrt");
        assert_eq!(args[args.len() - 1], "/out/a.tif");
    }

    #[test]
    fn warp_args_skip_compression_for_envi() {
        let opts = WarpOptions {
            format: OutputDriver::Envi,
            bounds: None,
            resampling: ResamplingMethod::Near,
            target_resolution: (10.0, 10.0),
            src_nodata: -99.0,
            dst_nodata: -99.0,
            overwrite: false,
            compress: true,
        };
        let args = warp_args(Path::new("in.vrt"), Path::new("out"), &opts);
        assert!(!args.contains(&"-overwrite".to_string()));
        assert!(!args.contains(&"-co".to_string()));
        assert!(args.windows(2).any(|w| w == ["-of", "ENVI"]));
    }

    #[test]
    fn buildvrt_args_for_a_stacking_vrt() {
        let inputs = vec![PathBuf::from("a.vrt"), PathBuf::from("b.vrt")];
        let args = buildvrt_args(&inputs, Path::new("stack.vrt"), None, Some(-99.0), true);
        assert_eq!(args[0], "gdalbuildvrt");
        assert!(args.contains(&"-separate".to_string()));
        assert!(args.windows(2).any(|w| w == ["-srcnodata", "-99"]));
        assert_eq!(&args[args.len() - 3..], ["stack.vrt", "a.vrt", "b.vrt"]);
    }

    #[test]
    fn stem_of_strips_the_extension() {
        assert_eq!(
            stem_of(Path::new("/data/S1A__IW___A_20150309T173017_VV_grd.tif")),
            "S1A__IW___A_20150309T173017_VV_grd"
        );
        assert_eq!(stem_of(Path::new("/out/cube")), "cube");
    }
}

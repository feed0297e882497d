use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::info;

use sarstack::{
    BoundingBox, DatasetFilter, Match, PixelType, ProductName, RasterHandle, SortKey,
    StackRequest, find_datasets, group_by_interval, seconds, stack,
};

use super::args::{CliArgs, Command};
use super::errors::AppError;

fn to_match(values: Vec<String>) -> Option<Match> {
    match values.len() {
        0 => None,
        1 => Some(Match::Is(values.into_iter().next().unwrap())),
        _ => Some(Match::OneOf(values)),
    }
}

fn run_find(
    directory: PathBuf,
    recursive: bool,
    filter: DatasetFilter,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let found = find_datasets(&directory, recursive, &filter)?;
    if json {
        let records: Vec<ProductName> = found.iter().filter_map(ProductName::parse).collect();
        println!("{}", serde_json::to_string_pretty(&records)?);
    } else {
        for path in &found {
            println!("{}", path.display());
        }
    }
    info!("{} datasets found in {:?}", found.len(), directory);
    Ok(())
}

/// Metadata summary printed by `sarstack info`.
#[derive(Serialize)]
struct RasterInfo {
    path: PathBuf,
    cols: usize,
    rows: usize,
    bands: usize,
    pixel_type: PixelType,
    projection: String,
    epsg: Option<u32>,
    nodata: Option<f64>,
    resolution: (f64, f64),
    bbox: BoundingBox,
}

fn run_info(raster: &Path, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let handle = RasterHandle::open(raster)?;
    let geo = handle.geometry();
    let info = RasterInfo {
        path: raster.to_path_buf(),
        cols: geo.cols,
        rows: geo.rows,
        bands: handle.band_count(),
        pixel_type: handle.pixel_type(),
        projection: handle.projection().to_string(),
        epsg: handle.epsg(),
        nodata: handle.nodata(),
        resolution: handle.resolution(),
        bbox: handle.bbox(),
    };
    if json {
        println!("{}", serde_json::to_string_pretty(&info)?);
    } else {
        println!("path:       {}", info.path.display());
        println!("size:       {} x {} pixels", info.cols, info.rows);
        println!("bands:      {}", info.bands);
        println!("pixel type: {}", info.pixel_type);
        println!("resolution: {} x {}", info.resolution.0, info.resolution.1);
        match info.epsg {
            Some(code) => println!("epsg:       {code}"),
            None => println!("projection: {}", info.projection),
        }
        if let Some(nodata) = info.nodata {
            println!("no-data:    {nodata}");
        }
        println!(
            "extent:     {} {} {} {}",
            info.bbox.xmin, info.bbox.ymin, info.bbox.xmax, info.bbox.ymax
        );
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn run_stack(
    inputs: Vec<PathBuf>,
    dst: PathBuf,
    resampling: sarstack::ResamplingMethod,
    tr: Vec<f64>,
    src_nodata: f64,
    dst_nodata: f64,
    clip: Option<PathBuf>,
    layernames: Option<Vec<String>>,
    group_interval: Option<f64>,
    separate: bool,
    overwrite: bool,
    no_compress: bool,
    workers: usize,
) -> Result<(), Box<dyn std::error::Error>> {
    let [xres, yres] = tr[..] else {
        return Err(AppError::InvalidArgument {
            arg: "--tr",
            value: format!("{tr:?}"),
        }
        .into());
    };

    let groups = match group_interval {
        Some(threshold) => group_by_interval(&inputs, |p| seconds(p), threshold)?,
        None => inputs.into_iter().map(|p| vec![p]).collect(),
    };
    info!("{} source groups", groups.len());

    // keep the mosaicking order aligned with the acquisition times
    let sort_key = group_interval.map(|_| (|p: &Path| seconds(p)) as SortKey);

    let request = StackRequest {
        groups,
        destination: dst,
        resampling,
        target_resolution: (xres, yres),
        src_nodata,
        dst_nodata,
        clip,
        layer_names: layernames,
        sort_key,
        separate,
        overwrite,
        compress: !no_compress,
        workers,
    };
    stack(&request)?;
    Ok(())
}

pub fn run(args: CliArgs) -> Result<(), Box<dyn std::error::Error>> {
    if args.log {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .init();
    }

    match args.command {
        Command::Find {
            directory,
            recursive,
            sensor,
            mode,
            orbit,
            polarization,
            steps,
            json,
        } => {
            let filter = DatasetFilter {
                sensor: to_match(sensor),
                acquisition_mode: to_match(mode),
                orbit: to_match(orbit),
                start: None,
                polarization: to_match(polarization),
                proc_steps: steps,
            };
            run_find(directory, recursive, filter, json)
        }
        Command::Stack {
            inputs,
            dst,
            resampling,
            tr,
            src_nodata,
            dst_nodata,
            clip,
            layernames,
            group_interval,
            separate,
            overwrite,
            no_compress,
            workers,
        } => run_stack(
            inputs,
            dst,
            resampling,
            tr,
            src_nodata,
            dst_nodata,
            clip,
            layernames,
            group_interval,
            separate,
            overwrite,
            no_compress,
            workers,
        ),
        Command::Info { raster, json } => run_info(&raster, json),
    }
}

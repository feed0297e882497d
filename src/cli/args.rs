use clap::{Parser, Subcommand};
use std::path::PathBuf;

use sarstack::ResamplingMethod;

#[derive(Parser)]
#[command(name = "sarstack", version, about = "sarstack CLI")]
pub struct CliArgs {
    /// Enable logging
    #[arg(long, global = true, default_value_t = false)]
    pub log: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Find product datasets in a directory by their name metadata
    Find {
        /// Directory to search
        #[arg(short, long)]
        directory: PathBuf,

        /// Search subdirectories recursively
        #[arg(short, long, default_value_t = false)]
        recursive: bool,

        /// Sensor id; repeat for alternatives (e.g. --sensor S1A --sensor S1B)
        #[arg(long)]
        sensor: Vec<String>,

        /// Acquisition mode; repeat for alternatives
        #[arg(long)]
        mode: Vec<String>,

        /// Orbit direction (A or D); repeat for alternatives
        #[arg(long)]
        orbit: Vec<String>,

        /// Polarization; repeat for alternatives
        #[arg(long)]
        polarization: Vec<String>,

        /// Exact processing-step chain, comma separated (e.g. grd,mli,geo)
        #[arg(long, value_delimiter = ',')]
        steps: Option<Vec<String>>,

        /// Print parsed metadata records as JSON instead of plain paths
        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// Mosaic, resample and stack rasters into a cube or separate tiles
    Stack {
        /// Source raster files
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Output cube path, or output directory with --separate
        #[arg(short, long)]
        dst: PathBuf,

        /// Resampling method passed to gdalwarp
        #[arg(long, value_enum, default_value_t = ResamplingMethod::Bilinear)]
        resampling: ResamplingMethod,

        /// Target resolution as x and y (e.g. --tr 20 20)
        #[arg(long, num_args = 2, required = true, value_names = ["XRES", "YRES"])]
        tr: Vec<f64>,

        /// No-data value of the source files
        #[arg(long, default_value_t = -99.0, allow_hyphen_values = true)]
        src_nodata: f64,

        /// No-data value of the output file(s)
        #[arg(long, default_value_t = -99.0, allow_hyphen_values = true)]
        dst_nodata: f64,

        /// Vector dataset bounding the output extent
        #[arg(long)]
        clip: Option<PathBuf>,

        /// Output layer names, comma separated; defaults to input basenames
        #[arg(long, value_delimiter = ',')]
        layernames: Option<Vec<String>>,

        /// Group inputs whose acquisition times are within this many seconds,
        /// mosaicking each group; without it every input is its own layer
        #[arg(long)]
        group_interval: Option<f64>,

        /// Write one GeoTIFF per group instead of a single ENVI cube
        #[arg(long, default_value_t = false)]
        separate: bool,

        /// Overwrite existing output files
        #[arg(long, default_value_t = false)]
        overwrite: bool,

        /// Disable DEFLATE compression of GeoTIFF tiles
        #[arg(long, default_value_t = false)]
        no_compress: bool,

        /// Number of parallel warp workers (separate mode)
        #[arg(long, default_value_t = 4)]
        workers: usize,
    },

    /// Print the metadata of a raster file
    Info {
        /// Raster file
        raster: PathBuf,

        /// Print as JSON
        #[arg(long, default_value_t = false)]
        json: bool,
    },
}

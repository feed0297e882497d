//! Shared types and enums used across sarstack.
//! Includes `ResamplingMethod` (the gdalwarp resampling set), `PixelType`
//! (raster band data types) and `OutputDriver` (supported output formats).
use clap::ValueEnum;
use gdal::raster::GdalDataType;
use serde::{Deserialize, Serialize};

/// Resampling methods accepted by gdalwarp.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Debug, Serialize, Deserialize)]
pub enum ResamplingMethod {
    Near,
    Bilinear,
    Cubic,
    CubicSpline,
    Lanczos,
    Average,
    Mode,
    Max,
    Min,
    Med,
    Q1,
    Q3,
}

impl ResamplingMethod {
    /// The spelling gdalwarp expects for `-r`.
    pub fn gdal_name(&self) -> &'static str {
        match self {
            ResamplingMethod::Near => "near",
            ResamplingMethod::Bilinear => "bilinear",
            ResamplingMethod::Cubic => "cubic",
            ResamplingMethod::CubicSpline => "cubicspline",
            ResamplingMethod::Lanczos => "lanczos",
            ResamplingMethod::Average => "average",
            ResamplingMethod::Mode => "mode",
            ResamplingMethod::Max => "max",
            ResamplingMethod::Min => "min",
            ResamplingMethod::Med => "med",
            ResamplingMethod::Q1 => "q1",
            ResamplingMethod::Q3 => "q3",
        }
    }
}

// Manual implementation so the CLI spellings match the gdalwarp ones exactly
// (cubicspline, q1, q3) instead of the derived kebab-case.
impl ValueEnum for ResamplingMethod {
    fn value_variants<'a>() -> &'a [Self] {
        &[
            ResamplingMethod::Near,
            ResamplingMethod::Bilinear,
            ResamplingMethod::Cubic,
            ResamplingMethod::CubicSpline,
            ResamplingMethod::Lanczos,
            ResamplingMethod::Average,
            ResamplingMethod::Mode,
            ResamplingMethod::Max,
            ResamplingMethod::Min,
            ResamplingMethod::Med,
            ResamplingMethod::Q1,
            ResamplingMethod::Q3,
        ]
    }

    fn to_possible_value(&self) -> Option<clap::builder::PossibleValue> {
        Some(clap::builder::PossibleValue::new(self.gdal_name()))
    }
}

impl std::fmt::Display for ResamplingMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.gdal_name())
    }
}

/// Raster band data types supported for reading and writing.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum, Debug, Serialize, Deserialize)]
pub enum PixelType {
    Byte,
    Int16,
    UInt16,
    Int32,
    UInt32,
    Float32,
    Float64,
}

impl PixelType {
    pub fn from_gdal(dtype: GdalDataType) -> Option<Self> {
        match dtype {
            GdalDataType::UInt8 => Some(PixelType::Byte),
            GdalDataType::Int16 => Some(PixelType::Int16),
            GdalDataType::UInt16 => Some(PixelType::UInt16),
            GdalDataType::Int32 => Some(PixelType::Int32),
            GdalDataType::UInt32 => Some(PixelType::UInt32),
            GdalDataType::Float32 => Some(PixelType::Float32),
            GdalDataType::Float64 => Some(PixelType::Float64),
            _ => None,
        }
    }

    /// GDAL's name for the type, as reported by `gdalinfo`.
    pub fn gdal_name(&self) -> &'static str {
        match self {
            PixelType::Byte => "Byte",
            PixelType::Int16 => "Int16",
            PixelType::UInt16 => "UInt16",
            PixelType::Int32 => "Int32",
            PixelType::UInt32 => "UInt32",
            PixelType::Float32 => "Float32",
            PixelType::Float64 => "Float64",
        }
    }
}

impl std::fmt::Display for PixelType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.gdal_name())
    }
}

/// Output formats the pipeline writes.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum, Debug, Serialize, Deserialize)]
pub enum OutputDriver {
    GTiff,
    Envi,
}

impl OutputDriver {
    pub fn gdal_name(&self) -> &'static str {
        match self {
            OutputDriver::GTiff => "GTiff",
            OutputDriver::Envi => "ENVI",
        }
    }
}

impl std::fmt::Display for OutputDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.gdal_name())
    }
}

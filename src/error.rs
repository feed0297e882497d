//! Crate-level error type and `Result` alias for stable, structured error handling.
//! Converts underlying I/O, GDAL, subprocess and header errors, and provides
//! semantic variants for request validation and raster operations.
use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("GDAL error: {0}")]
    Gdal(#[from] gdal::errors::GdalError),

    #[error("subprocess error: {0}")]
    Exec(#[from] crate::exec::ExecError),

    #[error("ENVI header error: {0}")]
    Envi(#[from] crate::io::envi::EnviError),

    #[error("file does not exist: {path}")]
    FileNotFound { path: PathBuf },

    #[error("output file already exists: {path}")]
    OutputExists { path: PathBuf },

    #[error("invalid request: {reason}")]
    Precondition { reason: String },

    #[error("raster projection mismatch: {found} distinct spatial references among inputs")]
    ProjectionMismatch { found: usize },

    #[error("unsupported operation `{op}`: {reason}")]
    UnsupportedOperation { op: &'static str, reason: String },

    #[error("degenerate raster data: {reason}")]
    DegenerateData { reason: String },

    #[error("file name does not match the product grammar: {path}")]
    NameParse { path: PathBuf },

    #[error("worker pool configuration error: {0}")]
    WorkerPool(String),
}

impl Error {
    pub fn precondition<S: Into<String>>(reason: S) -> Self {
        Error::Precondition {
            reason: reason.into(),
        }
    }
}

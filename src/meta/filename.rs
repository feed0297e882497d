//! Product file-name parsing.
//!
//! Processing products follow a fixed naming grammar, e.g.
//! `S1A__IW___A_20150309T173017_VV_grd_mli_geo_norm_db.tif`:
//! sensor and acquisition mode padded to four characters with underscores,
//! an ascending/descending orbit flag, the acquisition start timestamp,
//! the polarization, an optional underscore-delimited chain of processing
//! steps and an optional extension.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use chrono::{NaiveDate, NaiveDateTime};
use regex::Regex;
use serde::Serialize;

fn product_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        // Underscores pad the sensor/mode fields, so they cannot appear
        // inside the captures themselves.
        Regex::new(
            r"(?x)
            ^(?P<sensor>[0-9A-Z]{1,4})_+
            (?P<acquisition_mode>[0-9A-Z]{1,4})_+
            (?P<orbit>[AD])_
            (?P<start>[0-9]{8}T[0-9]{6})_
            (?P<polarization>[HV]{2})
            (?P<proc_steps>(?:_[a-z0-9]+)*)
            (?P<extension>\.[a-zA-Z0-9]+)?$",
        )
        .unwrap()
    })
}

fn timestamp_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"[0-9]{8}T[0-9]{6}").unwrap())
}

/// Metadata attributes encoded in a product name.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum ProductAttr {
    Sensor,
    AcquisitionMode,
    Orbit,
    Start,
    Polarization,
}

/// Structured identity parsed from a product file name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProductName {
    /// The path the name was parsed from.
    pub filename: PathBuf,
    pub sensor: String,
    pub acquisition_mode: String,
    /// Orbit direction flag, `A` or `D`.
    pub orbit: String,
    /// Acquisition start as the raw `YYYYMMDDTHHMMSS` token.
    pub start: String,
    pub polarization: String,
    /// Processing-step chain; `None` when the name carries no steps.
    pub proc_steps: Option<Vec<String>>,
    /// File extension including the leading dot, if present.
    pub extension: Option<String>,
}

impl ProductName {
    /// Parse the basename of `path` against the product grammar.
    ///
    /// Returns `None` for non-conforming names; callers must handle this.
    pub fn parse<P: AsRef<Path>>(path: P) -> Option<Self> {
        let path = path.as_ref();
        let name = path.file_name()?.to_str()?;
        let caps = product_pattern().captures(name)?;

        let steps = caps.name("proc_steps").map_or("", |m| m.as_str());
        let proc_steps = if steps.is_empty() {
            None
        } else {
            Some(
                steps
                    .trim_start_matches('_')
                    .split('_')
                    .map(str::to_string)
                    .collect(),
            )
        };

        Some(ProductName {
            filename: path.to_path_buf(),
            sensor: caps["sensor"].to_string(),
            acquisition_mode: caps["acquisition_mode"].to_string(),
            orbit: caps["orbit"].to_string(),
            start: caps["start"].to_string(),
            polarization: caps["polarization"].to_string(),
            proc_steps,
            extension: caps.name("extension").map(|m| m.as_str().to_string()),
        })
    }

    /// The acquisition start parsed to a calendar value, when well-formed.
    pub fn start_datetime(&self) -> Option<NaiveDateTime> {
        NaiveDateTime::parse_from_str(&self.start, "%Y%m%dT%H%M%S").ok()
    }

    /// Access a scalar attribute by selector, for grouping and filtering.
    pub fn attr(&self, attr: ProductAttr) -> &str {
        match attr {
            ProductAttr::Sensor => &self.sensor,
            ProductAttr::AcquisitionMode => &self.acquisition_mode,
            ProductAttr::Orbit => &self.orbit,
            ProductAttr::Start => &self.start,
            ProductAttr::Polarization => &self.polarization,
        }
    }
}

/// Extract the acquisition time from a file name as seconds since
/// 1900-01-01T00:00:00, the epoch used throughout historical processing
/// chains. Returns `None` when the basename carries no timestamp token.
pub fn seconds<P: AsRef<Path>>(path: P) -> Option<f64> {
    let name = path.as_ref().file_name()?.to_str()?;
    let token = timestamp_pattern().find(name)?.as_str();
    let dt = NaiveDateTime::parse_from_str(token, "%Y%m%dT%H%M%S").ok()?;
    let epoch = NaiveDate::from_ymd_opt(1900, 1, 1)?.and_hms_opt(0, 0, 0)?;
    Some((dt - epoch).num_seconds() as f64)
}

//! ENVI sidecar header reading and writing.
//!
//! The stacking pipeline rewrites the `band names` entry of the `.hdr`
//! sidecar after warping a cube. Known keys are typed struct fields; any
//! unknown key is preserved verbatim, in order, in `extras`.

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EnviError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("not an ENVI header: missing magic line")]
    MissingMagic,

    #[error("malformed header line: {line}")]
    MalformedLine { line: String },

    #[error("invalid value for `{key}`: {value}")]
    InvalidValue { key: String, value: String },
}

/// Parsed ENVI header.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EnviHeader {
    pub description: Option<String>,
    pub samples: usize,
    pub lines: usize,
    pub bands: usize,
    pub header_offset: usize,
    pub file_type: String,
    pub data_type: u8,
    pub interleave: String,
    pub byte_order: u8,
    pub map_info: Option<String>,
    pub coordinate_system_string: Option<String>,
    /// Ordered band labels; one per band.
    pub band_names: Vec<String>,
    /// Unknown keys, preserved in file order.
    pub extras: Vec<(String, String)>,
}

impl EnviHeader {
    /// The conventional sidecar path for a dataset: `<file>.hdr`.
    pub fn sidecar<P: AsRef<Path>>(dataset: P) -> PathBuf {
        let mut os = dataset.as_ref().as_os_str().to_os_string();
        os.push(".hdr");
        PathBuf::from(os)
    }

    pub fn read<P: AsRef<Path>>(path: P) -> Result<Self, EnviError> {
        let text = fs::read_to_string(path)?;
        Self::parse(&text)
    }

    pub fn parse(text: &str) -> Result<Self, EnviError> {
        let mut lines = text.lines();
        match lines.next() {
            Some(first) if first.trim() == "ENVI" => {}
            _ => return Err(EnviError::MissingMagic),
        }

        let mut header = EnviHeader::default();
        let mut pending: Vec<String> = Vec::new();
        while let Some(line) = lines.next() {
            if line.trim().is_empty() {
                continue;
            }
            let (key, rest) = line
                .split_once('=')
                .ok_or_else(|| EnviError::MalformedLine {
                    line: line.to_string(),
                })?;
            let key = key.trim().to_ascii_lowercase();
            let mut value = rest.trim().to_string();

            // brace-delimited values may span multiple lines
            if value.starts_with('{') && !value.ends_with('}') {
                pending.clear();
                pending.push(value);
                for cont in lines.by_ref() {
                    pending.push(cont.trim().to_string());
                    if cont.trim_end().ends_with('}') {
                        break;
                    }
                }
                value = pending.join(" ");
            }
            header.set(&key, &value)?;
        }
        Ok(header)
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), EnviError> {
        let invalid = |value: &str| EnviError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
        };
        match key {
            "description" => self.description = Some(unbrace(value).to_string()),
            "samples" => self.samples = value.parse().map_err(|_| invalid(value))?,
            "lines" => self.lines = value.parse().map_err(|_| invalid(value))?,
            "bands" => self.bands = value.parse().map_err(|_| invalid(value))?,
            "header offset" => self.header_offset = value.parse().map_err(|_| invalid(value))?,
            "file type" => self.file_type = value.to_string(),
            "data type" => self.data_type = value.parse().map_err(|_| invalid(value))?,
            "interleave" => self.interleave = value.to_string(),
            "byte order" => self.byte_order = value.parse().map_err(|_| invalid(value))?,
            "map info" => self.map_info = Some(unbrace(value).to_string()),
            "coordinate system string" => {
                self.coordinate_system_string = Some(unbrace(value).to_string())
            }
            "band names" => {
                self.band_names = unbrace(value)
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            }
            _ => self.extras.push((key.to_string(), value.to_string())),
        }
        Ok(())
    }

    pub fn write<P: AsRef<Path>>(&self, path: P) -> Result<(), EnviError> {
        fs::write(path, self.render())?;
        Ok(())
    }

    pub fn render(&self) -> String {
        let mut out = String::from("ENVI\n");
        if let Some(desc) = &self.description {
            out.push_str(&format!("description = {{{desc}}}\n"));
        }
        out.push_str(&format!("samples = {}\n", self.samples));
        out.push_str(&format!("lines = {}\n", self.lines));
        out.push_str(&format!("bands = {}\n", self.bands));
        out.push_str(&format!("header offset = {}\n", self.header_offset));
        out.push_str(&format!("file type = {}\n", self.file_type));
        out.push_str(&format!("data type = {}\n", self.data_type));
        out.push_str(&format!("interleave = {}\n", self.interleave));
        out.push_str(&format!("byte order = {}\n", self.byte_order));
        if let Some(map_info) = &self.map_info {
            out.push_str(&format!("map info = {{{map_info}}}\n"));
        }
        if let Some(css) = &self.coordinate_system_string {
            out.push_str(&format!("coordinate system string = {{{css}}}\n"));
        }
        if !self.band_names.is_empty() {
            out.push_str("band names = {\n");
            let last = self.band_names.len() - 1;
            for (i, name) in self.band_names.iter().enumerate() {
                if i == last {
                    out.push_str(&format!("{name}}}\n"));
                } else {
                    out.push_str(&format!("{name},\n"));
                }
            }
        }
        for (key, value) in &self.extras {
            out.push_str(&format!("{key} = {value}\n"));
        }
        out
    }
}

fn unbrace(value: &str) -> &str {
    value
        .trim()
        .trim_start_matches('{')
        .trim_end_matches('}')
        .trim()
}

//! Dataset discovery: walk a directory tree and select product files whose
//! parsed metadata satisfies a set of attribute predicates.

use std::path::{Path, PathBuf};

use tracing::debug;
use walkdir::WalkDir;

use crate::error::Result;
use crate::meta::filename::ProductName;

/// Predicate on a single name attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Match {
    /// Exact equality.
    Is(String),
    /// Membership in a set of allowed values.
    OneOf(Vec<String>),
}

impl Match {
    fn matches(&self, value: &str) -> bool {
        match self {
            Match::Is(v) => v == value,
            Match::OneOf(vs) => vs.iter().any(|v| v == value),
        }
    }
}

/// Attribute predicates for dataset selection. Every populated field must
/// accept a record for the file to be selected.
#[derive(Debug, Clone, Default)]
pub struct DatasetFilter {
    pub sensor: Option<Match>,
    pub acquisition_mode: Option<Match>,
    pub orbit: Option<Match>,
    pub start: Option<Match>,
    pub polarization: Option<Match>,
    /// Exact ordered-sequence equality against the processing-step chain.
    pub proc_steps: Option<Vec<String>>,
}

impl DatasetFilter {
    pub fn accepts(&self, meta: &ProductName) -> bool {
        let scalar = [
            (&self.sensor, meta.sensor.as_str()),
            (&self.acquisition_mode, meta.acquisition_mode.as_str()),
            (&self.orbit, meta.orbit.as_str()),
            (&self.start, meta.start.as_str()),
            (&self.polarization, meta.polarization.as_str()),
        ];
        for (rule, value) in scalar {
            if let Some(rule) = rule {
                if !rule.matches(value) {
                    return false;
                }
            }
        }
        if let Some(steps) = &self.proc_steps {
            if meta.proc_steps.as_deref() != Some(steps.as_slice()) {
                return false;
            }
        }
        true
    }
}

/// Find product datasets under `directory` and filter them by metadata.
///
/// Only entries whose basename conforms to the product grammar are
/// considered. With `recursive` unset only the top level is searched.
/// Results are sorted by path for deterministic output.
pub fn find_datasets<P: AsRef<Path>>(
    directory: P,
    recursive: bool,
    filter: &DatasetFilter,
) -> Result<Vec<PathBuf>> {
    let max_depth = if recursive { usize::MAX } else { 1 };
    let mut selection = Vec::new();
    for entry in WalkDir::new(directory.as_ref())
        .max_depth(max_depth)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
    {
        let Some(meta) = ProductName::parse(entry.path()) else {
            continue;
        };
        if filter.accepts(&meta) {
            debug!(path = %entry.path().display(), "dataset matched");
            selection.push(entry.path().to_path_buf());
        }
    }
    selection.sort();
    Ok(selection)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn touch(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, b"").unwrap();
        path
    }

    fn fixture() -> TempDir {
        let temp = TempDir::new().unwrap();
        touch(temp.path(), "S1A__IW___A_20150309T173017_VV_grd_mli.tif");
        touch(temp.path(), "S1B__IW___D_20150310T173017_VV_grd_mli.tif");
        touch(temp.path(), "S1A__IW___A_20150311T173017_VH_grd.tif");
        touch(temp.path(), "notes.txt");
        let sub = temp.path().join("sub");
        fs::create_dir(&sub).unwrap();
        touch(&sub, "S1B__EW___A_20150312T173017_HH_grd.tif");
        temp
    }

    #[test]
    fn unfiltered_search_skips_nonconforming_names() {
        let temp = fixture();
        let found = find_datasets(temp.path(), false, &DatasetFilter::default()).unwrap();
        assert_eq!(found.len(), 3);
        assert!(found.iter().all(|p| p.extension().unwrap() == "tif"));
    }

    #[test]
    fn recursive_search_descends() {
        let temp = fixture();
        let found = find_datasets(temp.path(), true, &DatasetFilter::default()).unwrap();
        assert_eq!(found.len(), 4);
    }

    #[test]
    fn scalar_and_membership_predicates() {
        let temp = fixture();
        let filter = DatasetFilter {
            sensor: Some(Match::OneOf(vec!["S1A".into(), "S1B".into()])),
            polarization: Some(Match::Is("VV".into())),
            ..Default::default()
        };
        let found = find_datasets(temp.path(), false, &filter).unwrap();
        assert_eq!(found.len(), 2);
    }

    #[test]
    fn proc_steps_require_exact_sequence() {
        let temp = fixture();
        let filter = DatasetFilter {
            proc_steps: Some(vec!["grd".into(), "mli".into()]),
            ..Default::default()
        };
        let found = find_datasets(temp.path(), false, &filter).unwrap();
        assert_eq!(found.len(), 2);

        // prefix alone is not a match
        let filter = DatasetFilter {
            proc_steps: Some(vec!["grd".into()]),
            ..Default::default()
        };
        let found = find_datasets(temp.path(), false, &filter).unwrap();
        assert_eq!(found.len(), 1);
    }

    #[test]
    fn failing_predicate_excludes_the_file() {
        let temp = fixture();
        let filter = DatasetFilter {
            sensor: Some(Match::Is("TSX1".into())),
            ..Default::default()
        };
        let found = find_datasets(temp.path(), true, &filter).unwrap();
        assert!(found.is_empty());
    }
}

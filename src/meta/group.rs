//! Grouping of product files by metadata attribute or acquisition-time
//! proximity. Both entry points always return a list of groups, each a list
//! of paths (singletons included), regardless of group size.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{Error, Result};
use crate::meta::filename::{ProductAttr, ProductName};

/// Group files by a parsed name attribute.
///
/// Files are sorted by the attribute value, then scanned once; a new group
/// starts whenever the value changes. Insertion order within a group follows
/// the sorted order. Any file whose name does not conform to the product
/// grammar fails the whole call.
pub fn group_by_attribute(files: &[PathBuf], attr: ProductAttr) -> Result<Vec<Vec<PathBuf>>> {
    let mut parsed = files
        .iter()
        .map(|f| {
            ProductName::parse(f).ok_or_else(|| Error::NameParse { path: f.clone() })
        })
        .collect::<Result<Vec<_>>>()?;
    parsed.sort_by(|a, b| a.attr(attr).cmp(b.attr(attr)));

    let mut groups: Vec<Vec<PathBuf>> = Vec::new();
    let mut current: Option<String> = None;
    for meta in parsed {
        let value = meta.attr(attr).to_string();
        if current.as_deref() == Some(value.as_str()) {
            groups.last_mut().unwrap().push(meta.filename);
        } else {
            debug!(attribute = ?attr, value = %value, "starting new group");
            groups.push(vec![meta.filename]);
            current = Some(value);
        }
    }
    Ok(groups)
}

/// Group files by the proximity of a numeric key, typically an acquisition
/// time derived with [`crate::meta::filename::seconds`].
///
/// Files are sorted by the key, then scanned once; a file joins the current
/// group while the absolute difference to the group's last key is within
/// `threshold`. The comparison is inclusive: equal keys and gaps of exactly
/// `threshold` stay in one group.
pub fn group_by_interval<F>(files: &[PathBuf], key: F, threshold: f64) -> Result<Vec<Vec<PathBuf>>>
where
    F: Fn(&Path) -> Option<f64>,
{
    if files.is_empty() {
        return Ok(Vec::new());
    }

    let mut keyed = files
        .iter()
        .map(|f| {
            key(f)
                .map(|k| (k, f.clone()))
                .ok_or_else(|| Error::NameParse { path: f.clone() })
        })
        .collect::<Result<Vec<_>>>()?;
    keyed.sort_by(|a, b| a.0.total_cmp(&b.0));

    let mut iter = keyed.into_iter();
    let (mut last_key, first) = iter.next().unwrap();
    let mut groups: Vec<Vec<PathBuf>> = vec![vec![first]];
    for (k, file) in iter {
        if (k - last_key).abs() <= threshold {
            groups.last_mut().unwrap().push(file);
        } else {
            groups.push(vec![file]);
        }
        last_key = k;
    }
    Ok(groups)
}

//! Product-name metadata: parsing, dataset discovery and grouping.
pub mod discover;
pub mod filename;
pub mod group;

pub use discover::{DatasetFilter, Match, find_datasets};
pub use filename::{ProductAttr, ProductName, seconds};
pub use group::{group_by_attribute, group_by_interval};

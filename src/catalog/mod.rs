// src/catalog/mod.rs

//! File catalog view used by the rules.
//!
//! The engine never stores radar files itself. It only needs a metadata
//! view ([`FileEntry`]) and a way to ask "which files of these types, from
//! these sources, fall inside this time range?" ([`CatalogGateway`]).
//!
//! - [`filter`] holds the compiled attribute filters rules may carry.
//! - [`memory`] is an in-process catalog used by the binary and the tests,
//!   optionally journaled to disk ([`journal`]).

pub mod filter;
pub mod journal;
pub mod memory;

use std::collections::BTreeMap;
use std::fmt::{self, Debug};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::Result;
use crate::nominal::TimeRange;

pub use filter::{ContentFilter, RawContentFilter};
pub use journal::CATALOG_FILE_PATH;
pub use memory::InMemoryCatalog;

/// ODIM object type of a catalogued file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ObjectType {
    /// Polar volume.
    Pvol,
    /// Single elevation scan.
    Scan,
    Image,
    /// Composite.
    Comp,
}

impl fmt::Display for ObjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ObjectType::Pvol => "PVOL",
            ObjectType::Scan => "SCAN",
            ObjectType::Image => "IMAGE",
            ObjectType::Comp => "COMP",
        };
        f.write_str(s)
    }
}

/// Read-only metadata for one catalogued file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileEntry {
    pub uuid: Uuid,
    pub source: String,
    pub object_type: ObjectType,
    /// Observation date/time.
    pub datetime: DateTime<Utc>,
    /// Elevation angle in degrees (scans only).
    #[serde(default)]
    pub elevation: Option<f64>,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
}

impl FileEntry {
    /// Look up an attribute for filter matching.
    ///
    /// `source` and `object` resolve to the entry's own fields; anything
    /// else is read from `attributes`.
    pub fn attribute(&self, name: &str) -> Option<String> {
        match name {
            "source" => Some(self.source.clone()),
            "object" => Some(self.object_type.to_string()),
            "elangle" => self.elevation.map(|e| e.to_string()),
            other => self.attributes.get(other).cloned(),
        }
    }
}

/// A catalog lookup.
#[derive(Debug, Clone)]
pub struct CatalogQuery {
    pub range: TimeRange,
    /// Empty means any source.
    pub sources: Vec<String>,
    /// Empty means any object type.
    pub object_types: Vec<ObjectType>,
    pub filter: Option<ContentFilter>,
}

impl CatalogQuery {
    pub fn new(range: TimeRange) -> Self {
        Self {
            range,
            sources: Vec::new(),
            object_types: Vec::new(),
            filter: None,
        }
    }

    pub fn sources<I, S>(mut self, sources: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.sources = sources.into_iter().map(Into::into).collect();
        self
    }

    pub fn object_type(mut self, object_type: ObjectType) -> Self {
        self.object_types.push(object_type);
        self
    }

    pub fn filter(mut self, filter: Option<ContentFilter>) -> Self {
        self.filter = filter;
        self
    }

    pub fn matches(&self, entry: &FileEntry) -> bool {
        self.range.contains(entry.datetime)
            && (self.sources.is_empty() || self.sources.iter().any(|s| *s == entry.source))
            && (self.object_types.is_empty() || self.object_types.contains(&entry.object_type))
            && self.filter.as_ref().is_none_or(|f| f.matches(entry))
    }
}

/// Query interface onto the external file catalog.
///
/// An empty result is valid and not an error.
pub trait CatalogGateway: Send + Sync + Debug {
    fn fetch(&self, query: &CatalogQuery) -> Result<Vec<FileEntry>>;
}

// src/criteria/mod.rs

//! "Is this window's data sufficient to trigger now?"
//!
//! One policy per rule family:
//! - source-set coverage for area composites built from volumes,
//! - elevation coverage with replacement for scan-based composites,
//! - volume assembly by elevation angle for single-radar volumes,
//! - [`unconditional`] for term rules, which trigger on boundary crossing.

pub mod elevation;
pub mod volume;

use std::collections::BTreeMap;

use uuid::Uuid;

use crate::catalog::FileEntry;
use crate::window::WindowState;

pub use elevation::{Candidate, ElevationBand, ElevationCandidates};
pub use volume::{ElevationSelection, VolumeScans};

/// Outcome of evaluating a window against its policy.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Evaluation {
    pub met: bool,
    /// Files a command built now would reference, in command order.
    pub files: Vec<Uuid>,
    /// What is still missing (sources or elevation angles), for logging.
    pub missing: Vec<String>,
}

/// Criteria for windowed rules, borrowed from the rule's configuration.
#[derive(Debug, Clone, Copy)]
pub enum CriteriaPolicy<'a> {
    SourceCoverage {
        sources: &'a [String],
    },
    ElevationCoverage {
        sources: &'a [String],
        band: ElevationBand,
        ascending: bool,
    },
    VolumeAssembly {
        selection: &'a ElevationSelection,
    },
}

impl CriteriaPolicy<'_> {
    /// Fold freshly fetched entries into the window and report whether the
    /// criteria hold.
    pub fn evaluate(self, state: &mut WindowState, entries: &[FileEntry]) -> Evaluation {
        match self {
            CriteriaPolicy::SourceCoverage { sources } => source_coverage(sources, entries),
            CriteriaPolicy::ElevationCoverage {
                sources,
                band,
                ascending,
            } => {
                for entry in entries {
                    state.elevations.offer(entry, &band, ascending);
                }
                let missing = state.elevations.missing(sources);
                Evaluation {
                    met: !sources.is_empty() && missing.is_empty(),
                    files: state.elevations.files(sources),
                    missing,
                }
            }
            CriteriaPolicy::VolumeAssembly { selection } => {
                for entry in entries {
                    state.scans.offer(entry, selection);
                }
                Evaluation {
                    met: state.scans.is_complete(selection),
                    files: state.scans.files(),
                    missing: state.scans.missing(selection),
                }
            }
        }
    }
}

/// Every required source has at least one entry. No partial credit, and an
/// empty source list is never met.
pub fn source_coverage(sources: &[String], entries: &[FileEntry]) -> Evaluation {
    let picked = select_per_source(sources, entries);
    let files = picked.iter().map(|e| e.uuid).collect();
    let missing: Vec<String> = sources
        .iter()
        .filter(|s| !picked.iter().any(|e| &e.source == *s))
        .cloned()
        .collect();

    Evaluation {
        met: !sources.is_empty() && missing.is_empty(),
        files,
        missing,
    }
}

/// Pick one entry per required source: the earliest observation, ties
/// keeping the first one seen. Result follows the order of `sources`; with
/// no configured sources every source present is picked, ordered by name.
pub fn select_per_source<'a>(sources: &[String], entries: &'a [FileEntry]) -> Vec<&'a FileEntry> {
    let mut best: BTreeMap<&str, &FileEntry> = BTreeMap::new();
    for entry in entries {
        if !sources.is_empty() && !sources.iter().any(|s| *s == entry.source) {
            continue;
        }
        best.entry(entry.source.as_str())
            .and_modify(|cur| {
                if entry.datetime < cur.datetime {
                    *cur = entry;
                }
            })
            .or_insert(entry);
    }
    if sources.is_empty() {
        return best.into_values().collect();
    }
    sources
        .iter()
        .filter_map(|s| best.get(s.as_str()).copied())
        .collect()
}

/// Term rules: always met; every entry in the term is used.
pub fn unconditional(entries: &[FileEntry]) -> Evaluation {
    Evaluation {
        met: true,
        files: entries.iter().map(|e| e.uuid).collect(),
        missing: Vec::new(),
    }
}

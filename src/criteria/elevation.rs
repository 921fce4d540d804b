// src/criteria/elevation.rs

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use tracing::trace;
use uuid::Uuid;

use crate::catalog::FileEntry;

/// Angles closer than this are the same elevation.
pub const ELEVATION_EPSILON: f64 = 1e-6;

/// Inclusive elevation band, degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ElevationBand {
    pub min: f64,
    pub max: f64,
}

impl ElevationBand {
    pub fn contains(&self, elevation: f64) -> bool {
        elevation >= self.min - ELEVATION_EPSILON && elevation <= self.max + ELEVATION_EPSILON
    }
}

/// A scan chosen to represent a source (or an angle) in a window.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub uuid: Uuid,
    pub source: String,
    pub elevation: f64,
    pub datetime: DateTime<Utc>,
}

impl Candidate {
    pub(crate) fn from_entry(entry: &FileEntry, elevation: f64) -> Self {
        Self {
            uuid: entry.uuid,
            source: entry.source.clone(),
            elevation,
            datetime: entry.datetime,
        }
    }
}

/// Lowest in-band elevation seen per source.
///
/// A scan replaces the current candidate only if it is strictly lower; a
/// later scan at the same angle never displaces the earlier one. Once a
/// source's sweep reaches the far end of the band (the top when
/// `ascending`, the bottom otherwise) it accepts no further scans.
#[derive(Debug, Clone, Default)]
pub struct ElevationCandidates {
    best: BTreeMap<String, Candidate>,
    sealed: BTreeSet<String>,
}

impl ElevationCandidates {
    /// Offer a scan. Returns `true` if the candidate set changed.
    pub fn offer(&mut self, entry: &FileEntry, band: &ElevationBand, ascending: bool) -> bool {
        let Some(elevation) = entry.elevation else {
            return false;
        };
        if !band.contains(elevation) {
            trace!(source = %entry.source, elevation, "scan outside elevation band");
            return false;
        }
        if self.sealed.contains(&entry.source) {
            trace!(source = %entry.source, elevation, "sweep already complete for source");
            return false;
        }

        let changed = self.consider(entry, elevation);
        let end_of_sweep = if ascending {
            elevation >= band.max - ELEVATION_EPSILON
        } else {
            elevation <= band.min + ELEVATION_EPSILON
        };
        if end_of_sweep {
            self.sealed.insert(entry.source.clone());
        }
        changed
    }

    pub fn is_sealed(&self, source: &str) -> bool {
        self.sealed.contains(source)
    }

    fn consider(&mut self, entry: &FileEntry, elevation: f64) -> bool {
        match self.best.get(&entry.source) {
            Some(current) if current.uuid == entry.uuid => false,
            Some(current) if elevation < current.elevation - ELEVATION_EPSILON => {
                trace!(
                    source = %entry.source,
                    previous = current.elevation,
                    elevation,
                    "lower elevation replaces candidate"
                );
                self.best
                    .insert(entry.source.clone(), Candidate::from_entry(entry, elevation));
                true
            }
            Some(_) => false,
            None => {
                self.best
                    .insert(entry.source.clone(), Candidate::from_entry(entry, elevation));
                true
            }
        }
    }

    pub fn get(&self, source: &str) -> Option<&Candidate> {
        self.best.get(source)
    }

    /// Required sources without a candidate.
    pub fn missing(&self, sources: &[String]) -> Vec<String> {
        sources
            .iter()
            .filter(|s| !self.best.contains_key(s.as_str()))
            .cloned()
            .collect()
    }

    /// Candidate files in the order of `sources` (every candidate, by
    /// source name, when `sources` is empty).
    pub fn files(&self, sources: &[String]) -> Vec<Uuid> {
        if sources.is_empty() {
            return self.best.values().map(|c| c.uuid).collect();
        }
        sources
            .iter()
            .filter_map(|s| self.best.get(s).map(|c| c.uuid))
            .collect()
    }
}

// src/catalog/memory.rs

use std::path::Path;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use tracing::{debug, error, info};

use super::journal::CatalogJournal;
use super::{CatalogGateway, CatalogQuery, FileEntry};
use crate::errors::Result;

#[derive(Debug, Default)]
struct Store {
    entries: Vec<FileEntry>,
    journal: Option<CatalogJournal>,
}

impl Store {
    /// Mirror a trim into the journal.
    fn rewrite_journal(&mut self) {
        let Store { entries, journal } = self;
        if let Some(journal) = journal
            && let Err(err) = journal.rewrite(entries)
        {
            error!(error = %err, "could not rewrite catalog journal after trim");
        }
    }
}

/// In-process catalog.
///
/// Entries are kept in insertion order; `fetch` returns matches ordered by
/// observation time with insertion order breaking ties, so "earliest
/// arrival wins" decisions downstream are stable.
///
/// A catalog built with [`open`](Self::open) also keeps a journal on disk,
/// so files that arrived before a restart are still there for windows the
/// ledger re-arms.
#[derive(Debug, Default)]
pub struct InMemoryCatalog {
    store: RwLock<Store>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Catalog backed by the journal at `path`, loaded with what it holds.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let (journal, entries) = CatalogJournal::open(path.as_ref())?;
        Ok(Self {
            store: RwLock::new(Store {
                entries,
                journal: Some(journal),
            }),
        })
    }

    /// Store an entry. Re-inserting a known UUID is ignored.
    pub fn insert(&self, entry: FileEntry) -> bool {
        let mut store = self.write();
        if store.entries.iter().any(|e| e.uuid == entry.uuid) {
            debug!(uuid = %entry.uuid, "catalog already holds entry; ignoring");
            return false;
        }
        if let Some(journal) = store.journal.as_mut()
            && let Err(err) = journal.append(&entry)
        {
            error!(uuid = %entry.uuid, error = %err, "arrival not journaled");
        }
        store.entries.push(entry);
        true
    }

    pub fn len(&self) -> usize {
        self.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().entries.is_empty()
    }

    /// Drop entries observed before `cutoff`. Returns how many were removed.
    pub fn trim_older_than(&self, cutoff: DateTime<Utc>) -> usize {
        let mut store = self.write();
        let before = store.entries.len();
        store.entries.retain(|e| e.datetime >= cutoff);
        let removed = before - store.entries.len();
        if removed > 0 {
            store.rewrite_journal();
            info!(removed, %cutoff, "trimmed catalog by age");
        }
        removed
    }

    /// Keep only the `keep` most recently observed entries.
    pub fn trim_to_count(&self, keep: usize) -> usize {
        let mut store = self.write();
        if store.entries.len() <= keep {
            return 0;
        }
        let removed = store.entries.len() - keep;
        store.entries.sort_by_key(|e| e.datetime);
        store.entries.drain(..removed);
        store.rewrite_journal();
        info!(removed, keep, "trimmed catalog by count");
        removed
    }

    fn read(&self) -> RwLockReadGuard<'_, Store> {
        self.store.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Store> {
        self.store.write().unwrap_or_else(|e| e.into_inner())
    }
}

impl CatalogGateway for InMemoryCatalog {
    fn fetch(&self, query: &CatalogQuery) -> Result<Vec<FileEntry>> {
        let mut found: Vec<FileEntry> = self
            .read()
            .entries
            .iter()
            .filter(|e| query.matches(e))
            .cloned()
            .collect();
        // Stable sort keeps insertion order for equal timestamps.
        found.sort_by_key(|e| e.datetime);
        Ok(found)
    }
}

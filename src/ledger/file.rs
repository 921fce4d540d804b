// src/ledger/file.rs

use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use super::{LedgerEntries, LedgerRecord, PendingWindow, TriggerLedger};
use crate::errors::{EngineError, Result};
use crate::window::WindowKey;

/// Default ledger location, relative to the working directory.
pub const LEDGER_FILE_PATH: &str = ".radargen/ledger.jsonl";

struct Journal {
    entries: LedgerEntries,
    writer: BufWriter<File>,
}

/// Durable ledger backed by an append-only JSON-lines journal.
///
/// The journal is replayed and compacted on open. Each change is appended
/// and synced before it becomes visible, all under one lock, so a mark that
/// returned `true` survives a crash.
pub struct FileLedger {
    path: PathBuf,
    journal: Mutex<Journal>,
}

impl std::fmt::Debug for FileLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileLedger")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl FileLedger {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }

        let entries = replay(&path)?;
        compact(&path, &entries)?;

        let file = OpenOptions::new().append(true).create(true).open(&path)?;
        info!(
            path = %path.display(),
            triggered = entries.triggered_len(),
            pending = entries.pending().len(),
            "opened trigger ledger (file)"
        );

        Ok(Self {
            path,
            journal: Mutex::new(Journal {
                entries,
                writer: BufWriter::new(file),
            }),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock(&self) -> MutexGuard<'_, Journal> {
        self.journal.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Journal {
    /// Persist first, then apply.
    fn append(&mut self, record: LedgerRecord) -> Result<()> {
        let line = serde_json::to_string(&record)?;
        writeln!(self.writer, "{line}")?;
        self.writer.flush()?;
        self.writer.get_ref().sync_data()?;
        self.entries.apply(&record);
        Ok(())
    }
}

impl TriggerLedger for FileLedger {
    fn is_triggered(&self, key: &WindowKey) -> Result<bool> {
        Ok(self.lock().entries.is_triggered(key))
    }

    fn try_mark(&self, key: &WindowKey) -> Result<bool> {
        let mut journal = self.lock();
        if journal.entries.is_triggered(key) {
            debug!(window = %key, "already marked (file)");
            return Ok(false);
        }
        journal
            .append(LedgerRecord::Triggered { key: key.clone() })
            .map_err(|e| EngineError::Ledger(format!("marking {key}: {e}")))?;
        debug!(window = %key, "marked triggered (file)");
        Ok(true)
    }

    fn record_pending(&self, key: &WindowKey, deadline: DateTime<Utc>) -> Result<()> {
        let mut journal = self.lock();
        if journal.entries.is_triggered(key) {
            return Ok(());
        }
        journal
            .append(LedgerRecord::Pending {
                key: key.clone(),
                deadline,
            })
            .map_err(|e| EngineError::Ledger(format!("recording pending {key}: {e}")))
    }

    fn clear_pending(&self, key: &WindowKey) -> Result<()> {
        self.lock()
            .append(LedgerRecord::Cleared { key: key.clone() })
            .map_err(|e| EngineError::Ledger(format!("clearing {key}: {e}")))
    }

    fn pending(&self) -> Result<Vec<PendingWindow>> {
        Ok(self.lock().entries.pending())
    }
}

fn replay(path: &Path) -> Result<LedgerEntries> {
    let mut entries = LedgerEntries::default();
    if !path.exists() {
        return Ok(entries);
    }

    let reader = BufReader::new(File::open(path)?);
    for (n, line) in reader.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        match serde_json::from_str::<LedgerRecord>(trimmed) {
            Ok(record) => entries.apply(&record),
            // A torn final write after a crash; the record never took effect.
            Err(err) => warn!(
                path = %path.display(),
                line = n + 1,
                error = %err,
                "skipping unreadable ledger line"
            ),
        }
    }
    Ok(entries)
}

/// Rewrite the journal with only the live records.
fn compact(path: &Path, entries: &LedgerEntries) -> Result<()> {
    let tmp = path.with_extension("jsonl.tmp");
    {
        let mut out = BufWriter::new(File::create(&tmp)?);
        for record in entries.snapshot() {
            writeln!(out, "{}", serde_json::to_string(&record)?)?;
        }
        out.flush()?;
        out.get_ref().sync_all()?;
    }
    fs::rename(&tmp, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nominal::NominalTime;
    use chrono::TimeZone;
    use tempfile::tempdir;

    fn key(source: Option<&str>) -> WindowKey {
        let nominal = NominalTime::exact(Utc.with_ymd_and_hms(2024, 3, 1, 6, 0, 0).unwrap());
        match source {
            Some(s) => WindowKey::per_source("vol", nominal, s),
            None => WindowKey::area("comp", nominal),
        }
    }

    #[test]
    fn marks_survive_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state").join("ledger.jsonl");

        {
            let ledger = FileLedger::open(&path).unwrap();
            assert!(ledger.try_mark(&key(None)).unwrap());
            assert!(ledger.try_mark(&key(Some("seang"))).unwrap());
        }

        let ledger = FileLedger::open(&path).unwrap();
        assert!(ledger.is_triggered(&key(None)).unwrap());
        assert!(ledger.is_triggered(&key(Some("seang"))).unwrap());
        assert!(!ledger.is_triggered(&key(Some("sekir"))).unwrap());
        assert!(!ledger.try_mark(&key(None)).unwrap());
    }

    #[test]
    fn pending_windows_survive_reopen_until_resolved() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ledger.jsonl");
        let deadline = Utc.with_ymd_and_hms(2024, 3, 1, 6, 15, 0).unwrap();

        {
            let ledger = FileLedger::open(&path).unwrap();
            ledger.record_pending(&key(None), deadline).unwrap();
            ledger.record_pending(&key(Some("seang")), deadline).unwrap();
            ledger.try_mark(&key(Some("seang"))).unwrap();
        }

        let ledger = FileLedger::open(&path).unwrap();
        let pending = ledger.pending().unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].key, key(None));
        assert_eq!(pending[0].deadline, deadline);

        ledger.clear_pending(&key(None)).unwrap();
        drop(ledger);
        assert!(FileLedger::open(&path).unwrap().pending().unwrap().is_empty());
    }

    #[test]
    fn torn_line_is_skipped() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ledger.jsonl");
        {
            let ledger = FileLedger::open(&path).unwrap();
            ledger.try_mark(&key(None)).unwrap();
        }
        let mut f = OpenOptions::new().append(true).open(&path).unwrap();
        write!(f, "{{\"op\":\"trigg").unwrap();
        drop(f);

        let ledger = FileLedger::open(&path).unwrap();
        assert!(ledger.is_triggered(&key(None)).unwrap());
    }

    #[test]
    fn compaction_drops_resolved_records() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ledger.jsonl");
        let deadline = Utc.with_ymd_and_hms(2024, 3, 1, 6, 15, 0).unwrap();
        {
            let ledger = FileLedger::open(&path).unwrap();
            ledger.record_pending(&key(None), deadline).unwrap();
            ledger.clear_pending(&key(None)).unwrap();
            ledger.try_mark(&key(Some("seang"))).unwrap();
        }
        let _ = FileLedger::open(&path).unwrap();
        let contents = fs::read_to_string(&path).unwrap();
        assert_eq!(contents.lines().count(), 1);
        assert!(contents.contains("\"op\":\"triggered\""));
    }
}

// src/ledger/memory.rs

use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use tracing::debug;

use super::{LedgerEntries, LedgerRecord, PendingWindow, TriggerLedger};
use crate::errors::Result;
use crate::window::WindowKey;

/// Keeps trigger records in memory only (lost on restart).
#[derive(Debug, Default)]
pub struct MemoryLedger {
    entries: Mutex<LedgerEntries>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn triggered_count(&self) -> usize {
        self.lock().triggered_len()
    }

    fn lock(&self) -> MutexGuard<'_, LedgerEntries> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl TriggerLedger for MemoryLedger {
    fn is_triggered(&self, key: &WindowKey) -> Result<bool> {
        Ok(self.lock().is_triggered(key))
    }

    fn try_mark(&self, key: &WindowKey) -> Result<bool> {
        let mut entries = self.lock();
        if entries.is_triggered(key) {
            debug!(window = %key, "already marked (memory)");
            return Ok(false);
        }
        entries.apply(&LedgerRecord::Triggered { key: key.clone() });
        debug!(window = %key, "marked triggered (memory)");
        Ok(true)
    }

    fn record_pending(&self, key: &WindowKey, deadline: DateTime<Utc>) -> Result<()> {
        self.lock().apply(&LedgerRecord::Pending {
            key: key.clone(),
            deadline,
        });
        Ok(())
    }

    fn clear_pending(&self, key: &WindowKey) -> Result<()> {
        self.lock()
            .apply(&LedgerRecord::Cleared { key: key.clone() });
        Ok(())
    }

    fn pending(&self) -> Result<Vec<PendingWindow>> {
        Ok(self.lock().pending())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nominal::NominalTime;
    use chrono::TimeZone;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn key(minute: u32) -> WindowKey {
        WindowKey::area(
            "comp",
            NominalTime::exact(Utc.with_ymd_and_hms(2024, 3, 1, 6, minute, 0).unwrap()),
        )
    }

    #[test]
    fn mark_is_test_and_set() {
        let ledger = MemoryLedger::new();
        assert!(!ledger.is_triggered(&key(0)).unwrap());
        assert!(ledger.try_mark(&key(0)).unwrap());
        assert!(!ledger.try_mark(&key(0)).unwrap());
        assert!(ledger.is_triggered(&key(0)).unwrap());
        assert!(!ledger.is_triggered(&key(15)).unwrap());
    }

    #[test]
    fn marking_clears_pending() {
        let ledger = MemoryLedger::new();
        let deadline = Utc.with_ymd_and_hms(2024, 3, 1, 6, 30, 0).unwrap();
        ledger.record_pending(&key(0), deadline).unwrap();
        ledger.record_pending(&key(15), deadline).unwrap();
        assert_eq!(ledger.pending().unwrap().len(), 2);

        ledger.try_mark(&key(0)).unwrap();
        ledger.clear_pending(&key(15)).unwrap();
        assert!(ledger.pending().unwrap().is_empty());

        // A triggered window is never pending again.
        ledger.record_pending(&key(0), deadline).unwrap();
        assert!(ledger.pending().unwrap().is_empty());
    }

    #[test]
    fn concurrent_marks_have_one_winner() {
        let ledger = Arc::new(MemoryLedger::new());
        let winners = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let ledger = Arc::clone(&ledger);
                let winners = Arc::clone(&winners);
                std::thread::spawn(move || {
                    if ledger.try_mark(&key(0)).unwrap() {
                        winners.fetch_add(1, Ordering::SeqCst);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(winners.load(Ordering::SeqCst), 1);
    }
}

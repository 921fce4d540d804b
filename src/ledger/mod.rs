// src/ledger/mod.rs

//! Trigger ledger: the at-most-once record of which windows have produced a
//! command.
//!
//! [`TriggerLedger::try_mark`] is the single serialization point for
//! emission. Every path about to emit a command calls it immediately before
//! building the command and only proceeds if it won.
//!
//! The ledger also remembers windows that are armed but not yet triggered
//! ("pending"), with their deadline, so that a restart can re-arm them.

pub mod file;
pub mod memory;

use std::collections::{HashMap, HashSet};
use std::fmt::Debug;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::Result;
use crate::window::WindowKey;

pub use file::{FileLedger, LEDGER_FILE_PATH};
pub use memory::MemoryLedger;

/// An armed window that has not produced a command yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingWindow {
    pub key: WindowKey,
    pub deadline: DateTime<Utc>,
}

/// Abstract storage for trigger records.
pub trait TriggerLedger: Send + Sync + Debug {
    fn is_triggered(&self, key: &WindowKey) -> Result<bool>;

    /// Atomically mark `key` as triggered.
    ///
    /// Returns `true` for exactly one caller per key; everyone else gets
    /// `false`. Marking also drops any pending record for the key.
    fn try_mark(&self, key: &WindowKey) -> Result<bool>;

    /// Remember that `key` is armed and times out at `deadline`.
    fn record_pending(&self, key: &WindowKey, deadline: DateTime<Utc>) -> Result<()>;

    /// Forget a pending window without triggering it.
    fn clear_pending(&self, key: &WindowKey) -> Result<()>;

    /// Armed, untriggered windows, ordered by deadline.
    fn pending(&self) -> Result<Vec<PendingWindow>>;
}

/// In-memory view shared by both ledger implementations.
#[derive(Debug, Default)]
pub(crate) struct LedgerEntries {
    triggered: HashSet<WindowKey>,
    pending: HashMap<WindowKey, DateTime<Utc>>,
}

impl LedgerEntries {
    pub(crate) fn is_triggered(&self, key: &WindowKey) -> bool {
        self.triggered.contains(key)
    }

    pub(crate) fn apply(&mut self, record: &LedgerRecord) {
        match record {
            LedgerRecord::Triggered { key } => {
                self.pending.remove(key);
                self.triggered.insert(key.clone());
            }
            LedgerRecord::Pending { key, deadline } => {
                if !self.triggered.contains(key) {
                    self.pending.insert(key.clone(), *deadline);
                }
            }
            LedgerRecord::Cleared { key } => {
                self.pending.remove(key);
            }
        }
    }

    pub(crate) fn pending(&self) -> Vec<PendingWindow> {
        let mut out: Vec<PendingWindow> = self
            .pending
            .iter()
            .map(|(key, deadline)| PendingWindow {
                key: key.clone(),
                deadline: *deadline,
            })
            .collect();
        out.sort_by(|a, b| a.deadline.cmp(&b.deadline).then_with(|| a.key.cmp(&b.key)));
        out
    }

    /// The minimal record list that reproduces this state.
    pub(crate) fn snapshot(&self) -> Vec<LedgerRecord> {
        let mut triggered: Vec<&WindowKey> = self.triggered.iter().collect();
        triggered.sort();
        triggered
            .into_iter()
            .map(|key| LedgerRecord::Triggered { key: key.clone() })
            .chain(self.pending().into_iter().map(|p| LedgerRecord::Pending {
                key: p.key,
                deadline: p.deadline,
            }))
            .collect()
    }

    pub(crate) fn triggered_len(&self) -> usize {
        self.triggered.len()
    }
}

/// One line of the ledger journal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub(crate) enum LedgerRecord {
    Triggered {
        key: WindowKey,
    },
    Pending {
        key: WindowKey,
        deadline: DateTime<Utc>,
    },
    Cleared {
        key: WindowKey,
    },
}

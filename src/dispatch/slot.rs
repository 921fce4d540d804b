// src/dispatch/slot.rs

use std::sync::{Arc, RwLock, Weak};

use tracing::{debug, error};

use super::sink::CommandSink;
use crate::command::RuleAction;
use crate::errors::Result;
use crate::ledger::PendingWindow;
use crate::rule::{Rule, RuleContext, RuleEnv, RuleEvent, RuleId};
use crate::timeout::{TimeoutKind, TimeoutOwner};
use crate::window::{WindowKey, WindowTable};

/// One registered rule: its current configuration snapshot plus the open
/// windows, which outlive snapshot swaps.
///
/// The slot is what timers call back into, so a timer armed under an old
/// snapshot fires against the current one.
pub struct RuleSlot {
    me: Weak<RuleSlot>,
    id: RuleId,
    rule: RwLock<Arc<Rule>>,
    windows: WindowTable,
    env: RuleEnv,
    sink: Arc<dyn CommandSink>,
}

impl std::fmt::Debug for RuleSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuleSlot")
            .field("id", &self.id)
            .field("open_windows", &self.windows.len())
            .finish_non_exhaustive()
    }
}

impl RuleSlot {
    pub(crate) fn new(rule: Rule, env: RuleEnv, sink: Arc<dyn CommandSink>) -> Arc<Self> {
        Arc::new_cyclic(|me| Self {
            me: me.clone(),
            id: rule.id().clone(),
            rule: RwLock::new(Arc::new(rule)),
            windows: WindowTable::new(),
            env,
            sink,
        })
    }

    pub fn id(&self) -> &RuleId {
        &self.id
    }

    /// The current snapshot. Callers keep using it even if it is replaced
    /// meanwhile.
    pub fn snapshot(&self) -> Arc<Rule> {
        Arc::clone(&self.rule.read().unwrap_or_else(|e| e.into_inner()))
    }

    pub fn windows(&self) -> &WindowTable {
        &self.windows
    }

    pub(crate) fn replace(&self, rule: Rule) -> Arc<Rule> {
        let mut current = self.rule.write().unwrap_or_else(|e| e.into_inner());
        std::mem::replace(&mut *current, Arc::new(rule))
    }

    pub(crate) fn handle(self: &Arc<Self>, event: RuleEvent<'_>) -> Result<Option<RuleAction>> {
        let owner: Arc<dyn TimeoutOwner> = self.clone();
        let rule = self.snapshot();
        rule.handle(event, &self.context(&owner))
    }

    pub(crate) fn timeout(
        self: &Arc<Self>,
        kind: TimeoutKind,
        key: &WindowKey,
    ) -> Result<Option<RuleAction>> {
        let owner: Arc<dyn TimeoutOwner> = self.clone();
        let rule = self.snapshot();
        rule.timeout(kind, key, &self.context(&owner))
    }

    pub(crate) fn recover(self: &Arc<Self>, pending: &PendingWindow) -> Result<bool> {
        let owner: Arc<dyn TimeoutOwner> = self.clone();
        let rule = self.snapshot();
        rule.recover(pending, &self.context(&owner))
    }

    pub(crate) fn emit(&self, action: &RuleAction) -> Result<()> {
        self.sink.emit(action)
    }

    fn context<'a>(&'a self, owner: &'a Arc<dyn TimeoutOwner>) -> RuleContext<'a> {
        RuleContext {
            env: &self.env,
            windows: &self.windows,
            owner,
        }
    }
}

impl TimeoutOwner for RuleSlot {
    fn on_timeout(&self, kind: TimeoutKind, key: WindowKey) {
        let Some(slot) = self.me.upgrade() else {
            debug!(window = %key, "rule slot dropped before its timer fired");
            return;
        };
        match slot.timeout(kind, &key) {
            Ok(Some(action)) => {
                if let Err(err) = slot.emit(&action) {
                    error!(rule = %slot.id, window = %key, error = %err, "failed to emit action");
                }
            }
            Ok(None) => {}
            Err(err) => error!(rule = %slot.id, window = %key, %kind, error = %err, "timeout handling failed"),
        }
    }
}

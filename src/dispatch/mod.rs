// src/dispatch/mod.rs

//! Routing of engine events to rules.
//!
//! Three kinds of event reach the engine ([`EngineEvent`]): file arrivals,
//! scheduled ticks and window timeouts. The dispatcher matches on them
//! exhaustively, hands each to the relevant [`RuleSlot`]s and forwards what
//! the rules emit to the [`CommandSink`].

pub mod sink;
pub mod slot;

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock, RwLockReadGuard};

use chrono::{DateTime, Utc};
use tracing::{debug, error, info, warn};

use crate::catalog::FileEntry;
use crate::command::RuleAction;
use crate::errors::{EngineError, Result};
use crate::rule::{Rule, RuleEnv, RuleEvent, RuleId};
use crate::timeout::TimeoutKind;
use crate::window::WindowKey;

pub use sink::{CommandSink, StdoutSink};
pub use slot::RuleSlot;

#[derive(Debug, Clone)]
pub enum EngineEvent {
    /// A file was added to the catalog.
    Arrival(FileEntry),
    /// A schedule fired for a rule id or a route name.
    Tick {
        target: String,
        fire_time: DateTime<Utc>,
    },
    /// A window timer expired.
    Timeout {
        rule_id: RuleId,
        kind: TimeoutKind,
        key: WindowKey,
    },
}

/// What one dispatch produced. Per-rule failures do not stop other rules
/// from seeing the event.
#[derive(Debug, Default)]
pub struct DispatchReport {
    pub emitted: Vec<RuleAction>,
    pub errors: Vec<(RuleId, EngineError)>,
}

impl DispatchReport {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

pub struct RuleDispatcher {
    env: RuleEnv,
    sink: Arc<dyn CommandSink>,
    slots: RwLock<BTreeMap<RuleId, Arc<RuleSlot>>>,
    routes: RwLock<BTreeMap<String, Vec<RuleId>>>,
}

impl std::fmt::Debug for RuleDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuleDispatcher")
            .field("rules", &self.rule_ids())
            .finish_non_exhaustive()
    }
}

impl RuleDispatcher {
    pub fn new(env: RuleEnv, sink: Arc<dyn CommandSink>) -> Self {
        Self {
            env,
            sink,
            slots: RwLock::new(BTreeMap::new()),
            routes: RwLock::new(BTreeMap::new()),
        }
    }

    pub fn env(&self) -> &RuleEnv {
        &self.env
    }

    /// Add a rule. Ids are unique.
    pub fn register(&self, rule: Rule) -> Result<()> {
        let mut slots = self.slots.write().unwrap_or_else(|e| e.into_inner());
        if slots.contains_key(rule.id()) {
            return Err(EngineError::DuplicateRule(rule.id().to_string()));
        }
        info!(rule = %rule.id(), kind = rule.kind(), "rule registered");
        let slot = RuleSlot::new(rule, self.env.clone(), Arc::clone(&self.sink));
        slots.insert(slot.id().clone(), slot);
        Ok(())
    }

    /// Name a group of rules that ticks can target.
    pub fn add_route(&self, name: impl Into<String>, rules: Vec<RuleId>) -> Result<()> {
        let name = name.into();
        {
            let slots = self.slots();
            if let Some(missing) = rules.iter().find(|id| !slots.contains_key(*id)) {
                return Err(EngineError::UnknownRule(format!(
                    "route '{name}' references unknown rule '{missing}'"
                )));
            }
        }
        debug!(route = %name, ?rules, "route added");
        self.routes
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(name, rules);
        Ok(())
    }

    /// Swap in a new configuration for an existing rule. Evaluations already
    /// running finish on the old snapshot; open windows and timers carry over.
    pub fn replace_rule(&self, rule: Rule) -> Result<()> {
        let slot = self
            .slot(rule.id().as_str())
            .ok_or_else(|| EngineError::UnknownRule(rule.id().to_string()))?;
        let kind = rule.kind();
        let old = slot.replace(rule);
        info!(rule = %slot.id(), from = old.kind(), to = kind, "rule replaced");
        Ok(())
    }

    /// Current snapshot of a rule.
    pub fn rule(&self, id: &str) -> Option<Arc<Rule>> {
        self.slots().get(id).map(|slot| slot.snapshot())
    }

    pub fn slot(&self, id: &str) -> Option<Arc<RuleSlot>> {
        self.slots().get(id).cloned()
    }

    pub fn rule_ids(&self) -> Vec<RuleId> {
        self.slots().keys().cloned().collect()
    }

    /// Re-arm windows the ledger recorded as pending (e.g. before a restart).
    /// Returns how many timers were registered.
    pub fn recover(&self) -> Result<usize> {
        let mut armed = 0;
        for pending in self.env.ledger.pending()? {
            let Some(slot) = self.slot(pending.key.rule_id.as_str()) else {
                warn!(window = %pending.key, "pending window for unknown rule; discarding");
                self.env.ledger.clear_pending(&pending.key)?;
                continue;
            };
            if slot.recover(&pending)? {
                armed += 1;
            }
        }
        if armed > 0 {
            info!(armed, "recovered pending windows");
        }
        Ok(armed)
    }

    /// Route one event.
    ///
    /// Fails only when the event names a target that does not exist; errors
    /// from individual rules are collected in the report.
    pub fn dispatch(&self, event: EngineEvent) -> Result<DispatchReport> {
        let mut report = DispatchReport::default();
        match event {
            EngineEvent::Arrival(entry) => {
                debug!(uuid = %entry.uuid, source = %entry.source, object = %entry.object_type, "arrival");
                for slot in self.all_slots() {
                    let outcome = slot.handle(RuleEvent::Arrival(&entry));
                    self.collect(&slot, outcome, &mut report);
                }
            }
            EngineEvent::Tick { target, fire_time } => {
                let slots = self.resolve_target(&target)?;
                debug!(%target, %fire_time, rules = slots.len(), "tick");
                for slot in slots {
                    let outcome = slot.handle(RuleEvent::Tick(fire_time));
                    self.collect(&slot, outcome, &mut report);
                }
            }
            EngineEvent::Timeout { rule_id, kind, key } => {
                let slot = self
                    .slot(rule_id.as_str())
                    .ok_or_else(|| EngineError::UnknownRule(rule_id.to_string()))?;
                let outcome = slot.timeout(kind, &key);
                self.collect(&slot, outcome, &mut report);
            }
        }
        Ok(report)
    }

    fn collect(
        &self,
        slot: &RuleSlot,
        outcome: Result<Option<RuleAction>>,
        report: &mut DispatchReport,
    ) {
        match outcome {
            Ok(Some(action)) => match slot.emit(&action) {
                Ok(()) => report.emitted.push(action),
                Err(err) => {
                    error!(rule = %slot.id(), error = %err, "failed to emit action");
                    report.errors.push((slot.id().clone(), err));
                }
            },
            Ok(None) => {}
            Err(err) => {
                warn!(rule = %slot.id(), error = %err, "rule failed to handle event");
                report.errors.push((slot.id().clone(), err));
            }
        }
    }

    /// A tick target is a rule id or a route name, rule ids first.
    fn resolve_target(&self, target: &str) -> Result<Vec<Arc<RuleSlot>>> {
        if let Some(slot) = self.slot(target) {
            return Ok(vec![slot]);
        }
        let routes = self.routes.read().unwrap_or_else(|e| e.into_inner());
        let ids = routes
            .get(target)
            .ok_or_else(|| EngineError::UnknownTarget(target.to_string()))?;
        Ok(ids
            .iter()
            .filter_map(|id| self.slot(id.as_str()))
            .collect())
    }

    fn all_slots(&self) -> Vec<Arc<RuleSlot>> {
        self.slots().values().cloned().collect()
    }

    fn slots(&self) -> RwLockReadGuard<'_, BTreeMap<RuleId, Arc<RuleSlot>>> {
        self.slots.read().unwrap_or_else(|e| e.into_inner())
    }
}

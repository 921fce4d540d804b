// src/rule/mod.rs

//! Rules: configuration snapshots plus the logic that turns events into
//! actions.
//!
//! [`Rule`] is a closed set of variants dispatched by `match`. Windowed
//! rules (composite, volume) share the arrival/timeout flow in
//! [`windowed`]; accumulation rules (ACRR, GRA) share the term policy in
//! [`term`]. A `Rule` is never mutated once built: a configuration change
//! builds a new one and swaps it in.

pub mod acrr;
pub mod composite;
pub mod gra;
pub mod housekeeping;
pub mod scansun;
pub mod term;
pub mod volume;
pub mod windowed;

use std::borrow::Borrow;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::catalog::{CatalogGateway, FileEntry};
use crate::clock::Clock;
use crate::command::RuleAction;
use crate::errors::Result;
use crate::ledger::{PendingWindow, TriggerLedger};
use crate::timeout::{TimeoutCoordinator, TimeoutKind, TimeoutOwner};
use crate::window::{WindowKey, WindowTable};

pub use acrr::AcrrRule;
pub use composite::{CompositeMode, CompositeRule};
pub use gra::GraRule;
pub use housekeeping::{DistributionRule, TrimPolicy, TrimRule};
pub use scansun::ScansunRule;
pub use term::TermPolicy;
pub use volume::VolumeRule;
pub use windowed::TimeoutSettings;

/// Rule identifier, unique within a dispatcher.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RuleId(String);

impl RuleId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for RuleId {
    fn from(s: &str) -> Self {
        RuleId(s.to_string())
    }
}

impl From<String> for RuleId {
    fn from(s: String) -> Self {
        RuleId(s)
    }
}

impl Borrow<str> for RuleId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// What a rule is asked to react to.
#[derive(Debug, Clone, Copy)]
pub enum RuleEvent<'a> {
    Arrival(&'a FileEntry),
    Tick(DateTime<Utc>),
}

/// How often a timeout whose catalog fetch fails is retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub delay: std::time::Duration,
    pub max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            delay: std::time::Duration::from_secs(30),
            max_attempts: 3,
        }
    }
}

/// Collaborators shared by every rule.
#[derive(Debug, Clone)]
pub struct RuleEnv {
    pub clock: Arc<dyn Clock>,
    pub catalog: Arc<dyn CatalogGateway>,
    pub ledger: Arc<dyn TriggerLedger>,
    pub timers: TimeoutCoordinator,
    pub retry: RetryPolicy,
}

/// Per-call view handed to a rule: the shared environment, the open windows
/// of the rule's slot, and the owner timers must call back.
pub struct RuleContext<'a> {
    pub env: &'a RuleEnv,
    pub windows: &'a WindowTable,
    pub owner: &'a Arc<dyn TimeoutOwner>,
}

#[derive(Debug, Clone)]
pub enum Rule {
    Composite(CompositeRule),
    Volume(VolumeRule),
    Acrr(AcrrRule),
    Gra(GraRule),
    Scansun(ScansunRule),
    Distribution(DistributionRule),
    Trim(TrimRule),
}

impl Rule {
    pub fn id(&self) -> &RuleId {
        match self {
            Rule::Composite(r) => &r.id,
            Rule::Volume(r) => &r.id,
            Rule::Acrr(r) => &r.id,
            Rule::Gra(r) => &r.id,
            Rule::Scansun(r) => &r.id,
            Rule::Distribution(r) => &r.id,
            Rule::Trim(r) => &r.id,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Rule::Composite(_) => "composite",
            Rule::Volume(_) => "volume",
            Rule::Acrr(_) => "acrr",
            Rule::Gra(_) => "gra",
            Rule::Scansun(_) => "scansun",
            Rule::Distribution(_) => "distribution",
            Rule::Trim(_) => "trim",
        }
    }

    /// React to an arrival or a tick. `Ok(None)` is the common case: not
    /// relevant, not complete yet, or already triggered.
    pub fn handle(&self, event: RuleEvent<'_>, ctx: &RuleContext<'_>) -> Result<Option<RuleAction>> {
        match self {
            Rule::Composite(r) => r.handle(event, ctx),
            Rule::Volume(r) => r.handle(event, ctx),
            Rule::Acrr(r) => r.handle(event, ctx),
            Rule::Gra(r) => r.handle(event, ctx),
            Rule::Scansun(r) => r.handle(event, ctx),
            Rule::Distribution(r) => Ok(r.handle(event)),
            Rule::Trim(r) => Ok(r.handle(event)),
        }
    }

    /// A window timer expired.
    pub fn timeout(
        &self,
        kind: TimeoutKind,
        key: &WindowKey,
        ctx: &RuleContext<'_>,
    ) -> Result<Option<RuleAction>> {
        match self {
            Rule::Composite(r) => windowed::on_timeout(r, kind, key, ctx),
            Rule::Volume(r) => windowed::on_timeout(r, kind, key, ctx),
            other => {
                warn!(rule = %other.id(), kind = other.kind(), window = %key, "rule does not use timeouts; ignoring");
                Ok(None)
            }
        }
    }

    /// Re-arm a window recorded as pending before a restart. Returns whether
    /// a timer was registered.
    pub fn recover(&self, pending: &PendingWindow, ctx: &RuleContext<'_>) -> Result<bool> {
        match self {
            Rule::Composite(r) => windowed::rearm(r, pending, ctx),
            Rule::Volume(r) => windowed::rearm(r, pending, ctx),
            other => {
                debug!(rule = %other.id(), window = %pending.key, "no timeouts for this rule; dropping pending record");
                ctx.env.ledger.clear_pending(&pending.key)?;
                Ok(false)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn rule_ids_look_up_by_str() {
        let mut map = BTreeMap::new();
        map.insert(RuleId::from("acrr_12h"), 1);
        assert_eq!(map.get("acrr_12h"), Some(&1));
        assert_eq!(RuleId::from("x".to_string()).to_string(), "x");
    }
}

// src/rule/scansun.rs

use tracing::{debug, info};

use super::{RuleContext, RuleEvent, RuleId};
use crate::catalog::{FileEntry, ObjectType};
use crate::command::{RuleAction, render};
use crate::errors::Result;
use crate::nominal::NominalTime;
use crate::window::WindowKey;

/// Sun-hit detection, once per incoming file.
#[derive(Debug, Clone)]
pub struct ScansunRule {
    pub id: RuleId,
    /// Empty means any source.
    pub sources: Vec<String>,
    pub object_types: Vec<ObjectType>,
}

impl ScansunRule {
    pub fn accepts(&self, entry: &FileEntry) -> bool {
        self.object_types.contains(&entry.object_type)
            && (self.sources.is_empty() || self.sources.contains(&entry.source))
    }

    pub(crate) fn handle(
        &self,
        event: RuleEvent<'_>,
        ctx: &RuleContext<'_>,
    ) -> Result<Option<RuleAction>> {
        let RuleEvent::Arrival(entry) = event else {
            return Ok(None);
        };
        if !self.accepts(entry) {
            return Ok(None);
        }

        // Several scans of one volume share source and time; the file
        // itself is the unit of work.
        let key = WindowKey::per_source(
            self.id.clone(),
            NominalTime::exact(entry.datetime),
            format!("{}/{}", entry.source, entry.uuid),
        );
        if !ctx.env.ledger.try_mark(&key)? {
            debug!(window = %key, "file already handled");
            return Ok(None);
        }
        info!(rule = %self.id, window = %key, "scansun triggered");
        Ok(Some(RuleAction::Generate {
            rule: self.id.clone(),
            command: render::scansun(self, &entry.source, entry.uuid),
        }))
    }
}

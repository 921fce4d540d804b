// src/rule/volume.rs

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::windowed::{self, TimeoutSettings, WindowedRule};
use super::{RuleContext, RuleEvent, RuleId};
use crate::catalog::{CatalogQuery, ContentFilter, FileEntry, ObjectType};
use crate::command::{GenerationCommand, RuleAction, render};
use crate::criteria::{CriteriaPolicy, ElevationSelection};
use crate::errors::Result;
use crate::nominal::Interval;
use crate::types::QualityControlMode;
use crate::window::WindowKey;

/// Assembles single-radar volumes from scans; one window per source.
#[derive(Debug, Clone)]
pub struct VolumeRule {
    pub id: RuleId,
    /// Empty means any source.
    pub sources: Vec<String>,
    pub interval: Interval,
    pub timeout: Option<TimeoutSettings>,
    pub selection: ElevationSelection,
    pub detectors: Vec<String>,
    pub qc_mode: QualityControlMode,
    pub filter: Option<ContentFilter>,
}

impl VolumeRule {
    pub fn accepts(&self, entry: &FileEntry) -> bool {
        entry.object_type == ObjectType::Scan
            && entry.elevation.is_some()
            && (self.sources.is_empty() || self.sources.contains(&entry.source))
            && self.filter.as_ref().is_none_or(|f| f.matches(entry))
    }

    pub fn window_key(&self, source: &str, at: DateTime<Utc>) -> WindowKey {
        WindowKey::per_source(self.id.clone(), self.interval.nominal(at), source)
    }

    pub(crate) fn handle(
        &self,
        event: RuleEvent<'_>,
        ctx: &RuleContext<'_>,
    ) -> Result<Option<RuleAction>> {
        match event {
            RuleEvent::Arrival(entry) if self.accepts(entry) => {
                windowed::on_arrival(self, self.window_key(&entry.source, entry.datetime), ctx)
            }
            RuleEvent::Arrival(_) | RuleEvent::Tick(_) => Ok(None),
        }
    }
}

impl WindowedRule for VolumeRule {
    fn id(&self) -> &RuleId {
        &self.id
    }

    fn criteria(&self) -> CriteriaPolicy<'_> {
        CriteriaPolicy::VolumeAssembly {
            selection: &self.selection,
        }
    }

    fn window_span(&self) -> chrono::Duration {
        self.interval.duration()
    }

    fn timeout_settings(&self) -> Option<TimeoutSettings> {
        self.timeout
    }

    fn query(&self, key: &WindowKey) -> CatalogQuery {
        CatalogQuery::new(self.interval.window(key.nominal))
            .sources(key.source.iter().cloned())
            .object_type(ObjectType::Scan)
            .filter(self.filter.clone())
    }

    fn render(&self, key: &WindowKey, files: Vec<Uuid>) -> GenerationCommand {
        render::volume(self, key.source.as_deref().unwrap_or_default(), key.nominal, files)
    }
}

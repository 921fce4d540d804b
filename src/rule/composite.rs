// src/rule/composite.rs

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::windowed::{self, TimeoutSettings, WindowedRule};
use super::{RuleContext, RuleEvent, RuleId};
use crate::catalog::{CatalogQuery, ContentFilter, FileEntry, ObjectType};
use crate::command::{GenerationCommand, RuleAction, render};
use crate::criteria::{CriteriaPolicy, ElevationBand};
use crate::errors::Result;
use crate::nominal::Interval;
use crate::types::{CompositeMethod, QualityControlMode, SelectionMethod, ZrCoefficients};
use crate::window::WindowKey;

/// What a composite is built from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CompositeMode {
    /// One polar volume per source.
    Volume,
    /// The lowest in-band scan per source, collected until each source's
    /// sweep reaches the far end of the band.
    Scan { band: ElevationBand, ascending: bool },
}

/// Area-wide product from several radars.
#[derive(Debug, Clone)]
pub struct CompositeRule {
    pub id: RuleId,
    pub area: String,
    pub interval: Interval,
    pub sources: Vec<String>,
    pub detectors: Vec<String>,
    pub qc_mode: QualityControlMode,
    pub method: CompositeMethod,
    pub prodpar: String,
    pub selection: SelectionMethod,
    pub quantity: String,
    pub timeout: Option<TimeoutSettings>,
    pub mode: CompositeMode,
    pub apply_gra: bool,
    pub zr: ZrCoefficients,
    pub ignore_malfunc: bool,
    pub ctfilter: bool,
    pub qitotal_field: String,
    pub filter: Option<ContentFilter>,
}

impl CompositeRule {
    pub fn object_type(&self) -> ObjectType {
        match self.mode {
            CompositeMode::Volume => ObjectType::Pvol,
            CompositeMode::Scan { .. } => ObjectType::Scan,
        }
    }

    /// Whether an arriving file can contribute to this composite.
    pub fn accepts(&self, entry: &FileEntry) -> bool {
        if entry.object_type != self.object_type() {
            return false;
        }
        if !self.sources.is_empty() && !self.sources.contains(&entry.source) {
            return false;
        }
        if let CompositeMode::Scan { band, .. } = self.mode
            && !entry.elevation.is_some_and(|e| band.contains(e))
        {
            return false;
        }
        self.filter.as_ref().is_none_or(|f| f.matches(entry))
    }

    pub fn window_key(&self, at: DateTime<Utc>) -> WindowKey {
        WindowKey::area(self.id.clone(), self.interval.nominal(at))
    }

    pub(crate) fn handle(
        &self,
        event: RuleEvent<'_>,
        ctx: &RuleContext<'_>,
    ) -> Result<Option<RuleAction>> {
        match event {
            RuleEvent::Arrival(entry) if self.accepts(entry) => {
                windowed::on_arrival(self, self.window_key(entry.datetime), ctx)
            }
            RuleEvent::Arrival(_) | RuleEvent::Tick(_) => Ok(None),
        }
    }
}

impl WindowedRule for CompositeRule {
    fn id(&self) -> &RuleId {
        &self.id
    }

    fn criteria(&self) -> CriteriaPolicy<'_> {
        match self.mode {
            CompositeMode::Volume => CriteriaPolicy::SourceCoverage {
                sources: &self.sources,
            },
            CompositeMode::Scan { band, ascending } => CriteriaPolicy::ElevationCoverage {
                sources: &self.sources,
                band,
                ascending,
            },
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
            .sources(self.sources.iter().cloned())
            .object_type(self.object_type())
            .filter(self.filter.clone())
    }

    fn render(&self, key: &WindowKey, files: Vec<Uuid>) -> GenerationCommand {
        render::composite(self, key.nominal, files)
    }
}

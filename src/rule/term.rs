// src/rule/term.rs

//! Term window plus degraded trigger, shared by ACRR and GRA rules.

use chrono::{DateTime, Utc};
use tracing::{debug, info, trace, warn};
use uuid::Uuid;

use super::{RuleContext, RuleId};
use crate::catalog::{CatalogQuery, ContentFilter, FileEntry, ObjectType};
use crate::command::{GenerationCommand, RuleAction};
use crate::criteria;
use crate::errors::Result;
use crate::nominal::{NominalTime, Term};
use crate::types::ZrCoefficients;
use crate::window::WindowKey;

/// One file per second.
pub const MAX_FILES_PER_HOUR: u32 = 3600;

#[derive(Debug, Clone)]
pub struct TermPolicy {
    /// Area whose composites are accumulated (the composites' source).
    pub area: String,
    pub term: Term,
    pub object_type: ObjectType,
    pub files_per_hour: u32,
    /// Percentage of expected files that may be missing before the result
    /// counts as degraded.
    pub acceptable_loss: u32,
    pub distance_field: String,
    pub zr: ZrCoefficients,
    pub quantity: String,
    pub filter: Option<ContentFilter>,
}

impl TermPolicy {
    pub fn expected_files(&self) -> u32 {
        self.files_per_hour.saturating_mul(self.term.hours())
    }

    /// Fewest files that still count as a full accumulation.
    pub fn minimum_files(&self) -> u32 {
        let expected = u64::from(self.expected_files());
        let lost = expected * u64::from(self.acceptable_loss.min(100)) / 100;
        // lost <= expected, which came from a u32.
        u32::try_from(expected - lost).unwrap_or(u32::MAX)
    }

    pub fn accepts(&self, entry: &FileEntry) -> bool {
        entry.object_type == self.object_type
            && entry.source == self.area
            && self.filter.as_ref().is_none_or(|f| f.matches(entry))
    }

    pub fn query(&self, nominal: NominalTime) -> CatalogQuery {
        CatalogQuery::new(self.term.window(nominal))
            .sources([self.area.clone()])
            .object_type(self.object_type)
            .filter(self.filter.clone())
    }

    /// Trigger the most recently completed term as of `at`, once.
    ///
    /// Always met at the boundary; fewer files than expected only makes the
    /// result degraded. A term without any file is skipped and stays
    /// untriggered.
    pub(crate) fn trigger<F>(
        &self,
        rule: &RuleId,
        at: DateTime<Utc>,
        ctx: &RuleContext<'_>,
        render: F,
    ) -> Result<Option<RuleAction>>
    where
        F: FnOnce(NominalTime, Vec<Uuid>) -> GenerationCommand,
    {
        let nominal = self.term.nominal(at);
        let key = WindowKey::area(rule.clone(), nominal);
        if ctx.env.ledger.is_triggered(&key)? {
            trace!(window = %key, "term already triggered");
            return Ok(None);
        }

        let entries = ctx.env.catalog.fetch(&self.query(nominal))?;
        let eval = criteria::unconditional(&entries);
        if eval.files.is_empty() {
            debug!(window = %key, "no files in term; not triggering");
            return Ok(None);
        }

        let found = eval.files.len() as u32;
        let degraded = found < self.minimum_files();
        if degraded {
            warn!(
                window = %key,
                found,
                expected = self.expected_files(),
                acceptable_loss = self.acceptable_loss,
                "term below acceptable loss; triggering degraded"
            );
        }

        if !ctx.env.ledger.try_mark(&key)? {
            debug!(window = %key, "lost trigger race; nothing to emit");
            return Ok(None);
        }
        info!(rule = %rule, window = %key, files = found, degraded, "term triggered");
        Ok(Some(RuleAction::Generate {
            rule: rule.clone(),
            command: render(nominal, eval.files),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(files_per_hour: u32, hours: u32, loss: u32) -> TermPolicy {
        TermPolicy {
            area: "swegmaps".to_string(),
            term: Term::new(hours, 0).unwrap(),
            object_type: ObjectType::Comp,
            files_per_hour,
            acceptable_loss: loss,
            distance_field: String::new(),
            zr: ZrCoefficients::default(),
            quantity: "DBZH".to_string(),
            filter: None,
        }
    }

    #[test]
    fn expected_and_minimum_counts() {
        let p = policy(4, 12, 10);
        assert_eq!(p.expected_files(), 48);
        assert_eq!(p.minimum_files(), 44);
        assert_eq!(policy(4, 12, 0).minimum_files(), 48);
        assert_eq!(policy(4, 12, 100).minimum_files(), 0);
    }

    #[test]
    fn counts_do_not_overflow() {
        let p = policy(u32::MAX, 24, 50);
        assert_eq!(p.expected_files(), u32::MAX);
        assert_eq!(p.minimum_files(), u32::MAX - u32::MAX / 2);
    }
}

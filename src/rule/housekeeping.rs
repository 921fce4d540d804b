// src/rule/housekeeping.rs

//! Stateless rules outside the windowing engine: forward files as they
//! arrive, trim the catalog on ticks.

use chrono::Duration;
use tracing::debug;

use super::{RuleEvent, RuleId};
use crate::catalog::{ContentFilter, FileEntry};
use crate::command::RuleAction;

pub const DEFAULT_NAME_TEMPLATE: &str = "{source}_{object}_{date}T{time}.h5";

#[derive(Debug, Clone)]
pub struct DistributionRule {
    pub id: RuleId,
    pub destination: String,
    /// File name with `{source}`, `{object}`, `{date}`, `{time}`, `{uuid}`
    /// placeholders.
    pub name_template: String,
    /// Empty means any source.
    pub sources: Vec<String>,
    pub filter: Option<ContentFilter>,
}

impl DistributionRule {
    pub fn accepts(&self, entry: &FileEntry) -> bool {
        (self.sources.is_empty() || self.sources.contains(&entry.source))
            && self.filter.as_ref().is_none_or(|f| f.matches(entry))
    }

    pub fn file_name(&self, entry: &FileEntry) -> String {
        self.name_template
            .replace("{source}", &entry.source)
            .replace("{object}", &entry.object_type.to_string())
            .replace("{date}", &entry.datetime.format("%Y%m%d").to_string())
            .replace("{time}", &entry.datetime.format("%H%M%S").to_string())
            .replace("{uuid}", &entry.uuid.to_string())
    }

    pub(crate) fn handle(&self, event: RuleEvent<'_>) -> Option<RuleAction> {
        match event {
            RuleEvent::Arrival(entry) if self.accepts(entry) => {
                debug!(rule = %self.id, uuid = %entry.uuid, "distributing file");
                Some(RuleAction::Distribute {
                    rule: self.id.clone(),
                    file: entry.uuid,
                    destination: self.destination.clone(),
                    name: self.file_name(entry),
                })
            }
            RuleEvent::Arrival(_) | RuleEvent::Tick(_) => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrimPolicy {
    MaxAge(Duration),
    MaxCount(usize),
}

#[derive(Debug, Clone)]
pub struct TrimRule {
    pub id: RuleId,
    pub policy: TrimPolicy,
}

impl TrimRule {
    pub(crate) fn handle(&self, event: RuleEvent<'_>) -> Option<RuleAction> {
        let RuleEvent::Tick(at) = event else {
            return None;
        };
        let rule = self.id.clone();
        Some(match self.policy {
            TrimPolicy::MaxAge(age) => RuleAction::TrimByAge {
                rule,
                cutoff: at - age,
            },
            TrimPolicy::MaxCount(keep) => RuleAction::TrimByCount { rule, keep },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::ObjectType;
    use chrono::{TimeZone, Utc};
    use uuid::Uuid;

    fn entry() -> FileEntry {
        FileEntry {
            uuid: Uuid::nil(),
            source: "seang".to_string(),
            object_type: ObjectType::Pvol,
            datetime: Utc.with_ymd_and_hms(2024, 7, 1, 10, 15, 0).unwrap(),
            elevation: None,
            attributes: Default::default(),
        }
    }

    #[test]
    fn distribution_names_files_from_template() {
        let rule = DistributionRule {
            id: RuleId::from("ftp_out"),
            destination: "ftp://example.org/in".to_string(),
            name_template: DEFAULT_NAME_TEMPLATE.to_string(),
            sources: Vec::new(),
            filter: None,
        };
        let e = entry();
        let action = rule.handle(RuleEvent::Arrival(&e));
        assert_eq!(
            action,
            Some(RuleAction::Distribute {
                rule: RuleId::from("ftp_out"),
                file: Uuid::nil(),
                destination: "ftp://example.org/in".to_string(),
                name: "seang_PVOL_20240701T101500.h5".to_string(),
            })
        );
        assert_eq!(rule.handle(RuleEvent::Tick(e.datetime)), None);
    }

    #[test]
    fn trim_fires_on_ticks_only() {
        let at = Utc.with_ymd_and_hms(2024, 7, 2, 0, 0, 0).unwrap();
        let by_age = TrimRule {
            id: RuleId::from("trim_age"),
            policy: TrimPolicy::MaxAge(Duration::hours(24)),
        };
        assert_eq!(
            by_age.handle(RuleEvent::Tick(at)),
            Some(RuleAction::TrimByAge {
                rule: RuleId::from("trim_age"),
                cutoff: Utc.with_ymd_and_hms(2024, 7, 1, 0, 0, 0).unwrap(),
            })
        );
        assert_eq!(by_age.handle(RuleEvent::Arrival(&entry())), None);

        let by_count = TrimRule {
            id: RuleId::from("trim_count"),
            policy: TrimPolicy::MaxCount(100),
        };
        assert!(matches!(
            by_count.handle(RuleEvent::Tick(at)),
            Some(RuleAction::TrimByCount { keep: 100, .. })
        ));
    }
}

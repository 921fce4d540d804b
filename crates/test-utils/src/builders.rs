#![allow(dead_code)]

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, TimeZone, Utc};
use uuid::Uuid;

use radargen::catalog::{FileEntry, ObjectType};
use radargen::criteria::{ElevationBand, ElevationSelection};
use radargen::nominal::{Interval, Term};
use radargen::rule::{
    AcrrRule, CompositeMode, CompositeRule, Rule, RuleId, TermPolicy, TimeoutSettings, VolumeRule,
};
use radargen::types::{
    CompositeMethod, QualityControlMode, SelectionMethod, TimeoutMode, ZrCoefficients,
};

/// 2024-06-01 at `h:m:s` UTC. Every test scenario lives on this day.
pub fn at(h: u32, m: u32, s: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, h, m, s).unwrap()
}

/// Builder for catalogued files.
pub struct EntryBuilder {
    entry: FileEntry,
}

impl EntryBuilder {
    pub fn new(source: &str, object_type: ObjectType, datetime: DateTime<Utc>) -> Self {
        Self {
            entry: FileEntry {
                uuid: Uuid::new_v4(),
                source: source.to_string(),
                object_type,
                datetime,
                elevation: None,
                attributes: BTreeMap::new(),
            },
        }
    }

    pub fn elevation(mut self, elevation: f64) -> Self {
        self.entry.elevation = Some(elevation);
        self
    }

    pub fn attribute(mut self, name: &str, value: &str) -> Self {
        self.entry
            .attributes
            .insert(name.to_string(), value.to_string());
        self
    }

    pub fn build(self) -> FileEntry {
        self.entry
    }
}

pub fn pvol(source: &str, datetime: DateTime<Utc>) -> FileEntry {
    EntryBuilder::new(source, ObjectType::Pvol, datetime).build()
}

pub fn scan(source: &str, datetime: DateTime<Utc>, elevation: f64) -> FileEntry {
    EntryBuilder::new(source, ObjectType::Scan, datetime)
        .elevation(elevation)
        .build()
}

pub fn comp(area: &str, datetime: DateTime<Utc>) -> FileEntry {
    EntryBuilder::new(area, ObjectType::Comp, datetime).build()
}

/// Builder for `CompositeRule`; defaults to a 15-minute volume composite
/// without timeout.
pub struct CompositeRuleBuilder {
    rule: CompositeRule,
}

impl CompositeRuleBuilder {
    pub fn new(id: &str, area: &str, sources: &[&str]) -> Self {
        Self {
            rule: CompositeRule {
                id: RuleId::from(id),
                area: area.to_string(),
                interval: Interval::try_from(15).expect("valid interval"),
                sources: sources.iter().map(|s| s.to_string()).collect(),
                detectors: Vec::new(),
                qc_mode: QualityControlMode::default(),
                method: CompositeMethod::default(),
                prodpar: String::new(),
                selection: SelectionMethod::default(),
                quantity: "DBZH".to_string(),
                timeout: None,
                mode: CompositeMode::Volume,
                apply_gra: false,
                zr: ZrCoefficients::default(),
                ignore_malfunc: false,
                ctfilter: false,
                qitotal_field: String::new(),
                filter: None,
            },
        }
    }

    pub fn interval(mut self, minutes: u32) -> Self {
        self.rule.interval = Interval::try_from(minutes).expect("valid interval");
        self
    }

    pub fn timeout(mut self, after: Duration, mode: TimeoutMode) -> Self {
        self.rule.timeout = Some(TimeoutSettings { mode, after });
        self
    }

    /// Scan-based composite over an ascending sweep.
    pub fn scan_band(mut self, min: f64, max: f64) -> Self {
        self.rule.mode = CompositeMode::Scan {
            band: ElevationBand { min, max },
            ascending: true,
        };
        self
    }


    pub fn detectors(mut self, detectors: &[&str]) -> Self {
        self.rule.detectors = detectors.iter().map(|d| d.to_string()).collect();
        self
    }

    pub fn build(self) -> CompositeRule {
        self.rule
    }

    pub fn rule(self) -> Rule {
        Rule::Composite(self.rule)
    }
}

/// Builder for `VolumeRule`; defaults to a 15-minute band 0.0..=40.0.
pub struct VolumeRuleBuilder {
    rule: VolumeRule,
}

impl VolumeRuleBuilder {
    pub fn new(id: &str, sources: &[&str]) -> Self {
        Self {
            rule: VolumeRule {
                id: RuleId::from(id),
                sources: sources.iter().map(|s| s.to_string()).collect(),
                interval: Interval::try_from(15).expect("valid interval"),
                timeout: None,
                selection: ElevationSelection::Band {
                    band: ElevationBand {
                        min: 0.0,
                        max: 40.0,
                    },
                    ascending: true,
                },
                detectors: Vec::new(),
                qc_mode: QualityControlMode::default(),
                filter: None,
            },
        }
    }

    pub fn band(mut self, min: f64, max: f64, ascending: bool) -> Self {
        self.rule.selection = ElevationSelection::Band {
            band: ElevationBand { min, max },
            ascending,
        };
        self
    }

    pub fn angles(mut self, angles: &[f64]) -> Self {
        self.rule.selection = ElevationSelection::Angles(angles.to_vec());
        self
    }

    pub fn timeout(mut self, after: Duration, mode: TimeoutMode) -> Self {
        self.rule.timeout = Some(TimeoutSettings { mode, after });
        self
    }

    pub fn rule(self) -> Rule {
        Rule::Volume(self.rule)
    }
}

/// Builder for `AcrrRule`; defaults to 12-hour terms from 00:00 over
/// composites arriving four per hour.
pub struct AcrrRuleBuilder {
    rule: AcrrRule,
}

impl AcrrRuleBuilder {
    pub fn new(id: &str, area: &str) -> Self {
        Self {
            rule: AcrrRule {
                id: RuleId::from(id),
                term: TermPolicy {
                    area: area.to_string(),
                    term: Term::new(12, 0).expect("valid term"),
                    object_type: ObjectType::Comp,
                    files_per_hour: 4,
                    acceptable_loss: 0,
                    distance_field: "eu.baltrad.composite.quality.distance.radar".to_string(),
                    zr: ZrCoefficients::default(),
                    quantity: "DBZH".to_string(),
                    filter: None,
                },
                apply_gra: false,
            },
        }
    }

    pub fn term(mut self, hours: u32, first_offset: u32) -> Self {
        self.rule.term.term = Term::new(hours, first_offset).expect("valid term");
        self
    }

    pub fn files_per_hour(mut self, n: u32) -> Self {
        self.rule.term.files_per_hour = n;
        self
    }

    pub fn acceptable_loss(mut self, percent: u32) -> Self {
        self.rule.term.acceptable_loss = percent;
        self
    }

    pub fn rule(self) -> Rule {
        Rule::Acrr(self.rule)
    }
}

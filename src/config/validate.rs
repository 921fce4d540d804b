// src/config/validate.rs

use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::catalog::{ContentFilter, RawContentFilter};
use crate::config::duration::parse_duration;
use crate::config::model::{
    ConfigFile, EngineSettings, RawAcrrConfig, RawCompositeConfig, RawConfigFile,
    RawDistributionConfig, RawEngineSection, RawGraConfig, RawRuleConfig, RawScansunConfig,
    RawTermConfig, RawTrimConfig, RawVolumeConfig, Schedule,
};
use crate::criteria::{ElevationBand, ElevationSelection};
use crate::errors::{EngineError, Result};
use crate::nominal::{Interval, Term};
use crate::rule::housekeeping::DEFAULT_NAME_TEMPLATE;
use crate::rule::term::MAX_FILES_PER_HOUR;
use crate::rule::{
    AcrrRule, CompositeMode, CompositeRule, DistributionRule, GraRule, RetryPolicy, Rule, RuleId,
    ScansunRule, TermPolicy, TimeoutSettings, TrimPolicy, TrimRule, VolumeRule,
};
use crate::types::{LedgerStorageMode, TimeoutMode, ZrCoefficients};

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = EngineError;

    fn try_from(raw: RawConfigFile) -> Result<Self> {
        let engine = compile_engine(&raw.engine)?;

        let mut rules = Vec::with_capacity(raw.rule.len());
        for (id, rule) in raw.rule {
            validate_rule_id(&id)?;
            rules.push(compile_rule(RuleId::from(id), rule)?);
        }

        let mut routes = BTreeMap::new();
        for (name, route) in raw.route {
            if rules.iter().any(|r| r.id().as_str() == name) {
                return Err(config_err(format!(
                    "route '{name}' has the same name as a rule"
                )));
            }
            if route.rules.is_empty() {
                return Err(config_err(format!("route '{name}' has no rules")));
            }
            for member in &route.rules {
                if !rules.iter().any(|r| r.id().as_str() == member) {
                    return Err(config_err(format!(
                        "route '{name}' references unknown rule '{member}'"
                    )));
                }
            }
            routes.insert(name, route.rules.into_iter().map(RuleId::from).collect());
        }

        let mut schedules = Vec::with_capacity(raw.schedule.len());
        for (name, schedule) in raw.schedule {
            let every = parse_duration(&schedule.every)
                .map_err(|e| config_err(format!("schedule '{name}': every: {e}")))?;
            if every.is_zero() {
                return Err(config_err(format!("schedule '{name}': every must be > 0")));
            }
            let known = routes.contains_key(&schedule.target)
                || rules.iter().any(|r| r.id().as_str() == schedule.target);
            if !known {
                return Err(config_err(format!(
                    "schedule '{name}' targets unknown rule or route '{}'",
                    schedule.target
                )));
            }
            schedules.push(Schedule {
                name,
                every,
                target: schedule.target,
            });
        }

        Ok(ConfigFile {
            engine,
            rules,
            routes,
            schedules,
        })
    }
}

fn config_err(msg: String) -> EngineError {
    EngineError::Config(msg)
}

fn compile_engine(raw: &RawEngineSection) -> Result<EngineSettings> {
    let delay = parse_duration(&raw.timeout_retry)
        .map_err(|e| config_err(format!("[engine].timeout_retry: {e}")))?;
    for (field, value) in [("ledger_path", &raw.ledger_path), ("catalog_path", &raw.catalog_path)] {
        if value.trim().is_empty() {
            return Err(config_err(format!("[engine].{field} must not be empty")));
        }
    }
    if raw.ledger == LedgerStorageMode::File && raw.ledger_path.trim() == raw.catalog_path.trim() {
        return Err(config_err(
            "[engine].ledger_path and catalog_path must differ".to_string(),
        ));
    }
    Ok(EngineSettings {
        ledger: raw.ledger,
        ledger_path: PathBuf::from(&raw.ledger_path),
        catalog_path: PathBuf::from(&raw.catalog_path),
        retry: RetryPolicy {
            delay,
            max_attempts: raw.max_timeout_retries,
        },
    })
}

fn validate_rule_id(id: &str) -> Result<()> {
    if id.is_empty() || id.chars().any(char::is_whitespace) {
        return Err(config_err(format!(
            "rule id '{id}' must be non-empty and contain no whitespace"
        )));
    }
    Ok(())
}

fn compile_rule(id: RuleId, raw: RawRuleConfig) -> Result<Rule> {
    let rule = match raw {
        RawRuleConfig::Composite(c) => Rule::Composite(compile_composite(id, c)?),
        RawRuleConfig::Volume(c) => Rule::Volume(compile_volume(id, c)?),
        RawRuleConfig::Acrr(c) => Rule::Acrr(compile_acrr(id, c)?),
        RawRuleConfig::Gra(c) => Rule::Gra(compile_gra(id, c)?),
        RawRuleConfig::Scansun(c) => Rule::Scansun(compile_scansun(id, c)?),
        RawRuleConfig::Distribution(c) => Rule::Distribution(compile_distribution(id, c)?),
        RawRuleConfig::Trim(c) => Rule::Trim(compile_trim(id, c)?),
    };
    Ok(rule)
}

/// Prefix a compile error with the rule it came from.
fn in_rule<T>(id: &RuleId, res: Result<T>) -> Result<T> {
    res.map_err(|e| match e {
        EngineError::Config(msg) => config_err(format!("rule '{id}': {msg}")),
        other => other,
    })
}

fn interval(id: &RuleId, minutes: u32) -> Result<Interval> {
    in_rule(id, Interval::try_from(minutes))
}

fn term(id: &RuleId, hours: u32, offset: u32) -> Result<Term> {
    in_rule(id, Term::new(hours, offset))
}

fn filter(id: &RuleId, raw: Option<RawContentFilter>) -> Result<Option<ContentFilter>> {
    raw.map(|f| in_rule(id, ContentFilter::try_from(f))).transpose()
}

fn timeout(id: &RuleId, raw: Option<&str>, mode: TimeoutMode) -> Result<Option<TimeoutSettings>> {
    let Some(raw) = raw else {
        return Ok(None);
    };
    let std_duration = parse_duration(raw).map_err(|e| config_err(format!("rule '{id}': timeout: {e}")))?;
    let after = chrono::Duration::from_std(std_duration)
        .map_err(|e| config_err(format!("rule '{id}': timeout out of range: {e}")))?;
    Ok(Some(TimeoutSettings { mode, after }))
}

fn elevation_band(id: &RuleId, min: f64, max: f64) -> Result<ElevationBand> {
    let valid = min.is_finite() && max.is_finite() && (-90.0..=90.0).contains(&min) && max <= 90.0;
    if !valid || min > max {
        return Err(config_err(format!(
            "rule '{id}': elevation band [{min}, {max}] is invalid"
        )));
    }
    Ok(ElevationBand { min, max })
}

fn compile_composite(id: RuleId, c: RawCompositeConfig) -> Result<CompositeRule> {
    if c.area.trim().is_empty() {
        return Err(config_err(format!("rule '{id}': area must not be empty")));
    }
    let mode = if c.scan_based {
        CompositeMode::Scan {
            band: elevation_band(&id, c.min_elevation, c.max_elevation)?,
            ascending: c.ascending,
        }
    } else {
        CompositeMode::Volume
    };

    Ok(CompositeRule {
        interval: interval(&id, c.interval)?,
        timeout: timeout(&id, c.timeout.as_deref(), c.timeout_mode)?,
        filter: filter(&id, c.filter)?,
        area: c.area,
        sources: c.sources,
        detectors: c.detectors,
        qc_mode: c.qc_mode,
        method: c.method,
        prodpar: c.prodpar,
        selection: c.selection,
        quantity: c.quantity,
        mode,
        apply_gra: c.apply_gra,
        zr: ZrCoefficients { a: c.zr_a, b: c.zr_b },
        ignore_malfunc: c.ignore_malfunc,
        ctfilter: c.ctfilter,
        qitotal_field: c.qitotal_field,
        id,
    })
}

fn compile_volume(id: RuleId, c: RawVolumeConfig) -> Result<VolumeRule> {
    let selection = if c.elevation_angles.is_empty() {
        ElevationSelection::Band {
            band: elevation_band(&id, c.elevation_min, c.elevation_max)?,
            ascending: c.ascending,
        }
    } else {
        if c.elevation_angles.iter().any(|a| !a.is_finite()) {
            return Err(config_err(format!("rule '{id}': elevation_angles must be finite")));
        }
        let mut angles = c.elevation_angles;
        angles.sort_by(f64::total_cmp);
        angles.dedup();
        ElevationSelection::Angles(angles)
    };

    Ok(VolumeRule {
        interval: interval(&id, c.interval)?,
        timeout: timeout(&id, c.timeout.as_deref(), c.timeout_mode)?,
        filter: filter(&id, c.filter)?,
        sources: c.sources,
        selection,
        detectors: c.detectors,
        qc_mode: c.qc_mode,
        id,
    })
}

fn compile_term(id: &RuleId, c: RawTermConfig, hours: u32, offset: u32) -> Result<TermPolicy> {
    if c.area.trim().is_empty() {
        return Err(config_err(format!("rule '{id}': area must not be empty")));
    }
    if c.acceptable_loss > 100 {
        return Err(config_err(format!(
            "rule '{id}': acceptable_loss must be within 0..=100 percent (got {})",
            c.acceptable_loss
        )));
    }
    if !(1..=MAX_FILES_PER_HOUR).contains(&c.files_per_hour) {
        return Err(config_err(format!(
            "rule '{id}': files_per_hour must be within 1..={MAX_FILES_PER_HOUR} (got {})",
            c.files_per_hour
        )));
    }
    Ok(TermPolicy {
        term: term(id, hours, offset)?,
        filter: filter(id, c.filter)?,
        area: c.area,
        object_type: c.object_type,
        files_per_hour: c.files_per_hour,
        acceptable_loss: c.acceptable_loss,
        distance_field: c.distance_field,
        zr: ZrCoefficients { a: c.zr_a, b: c.zr_b },
        quantity: c.quantity,
    })
}

fn compile_acrr(id: RuleId, c: RawAcrrConfig) -> Result<AcrrRule> {
    Ok(AcrrRule {
        term: compile_term(&id, c.term, c.hours, c.first_term_offset)?,
        apply_gra: c.apply_gra,
        id,
    })
}

fn compile_gra(id: RuleId, c: RawGraConfig) -> Result<GraRule> {
    Ok(GraRule {
        term: compile_term(&id, c.term, c.interval, c.first_term_utc)?,
        id,
    })
}

fn compile_scansun(id: RuleId, c: RawScansunConfig) -> Result<ScansunRule> {
    if c.object_types.is_empty() {
        return Err(config_err(format!("rule '{id}': object_types must not be empty")));
    }
    Ok(ScansunRule {
        sources: c.sources,
        object_types: c.object_types,
        id,
    })
}

fn compile_distribution(id: RuleId, c: RawDistributionConfig) -> Result<DistributionRule> {
    if c.destination.trim().is_empty() {
        return Err(config_err(format!("rule '{id}': destination must not be empty")));
    }
    Ok(DistributionRule {
        filter: filter(&id, c.filter)?,
        destination: c.destination,
        name_template: c
            .name_template
            .unwrap_or_else(|| DEFAULT_NAME_TEMPLATE.to_string()),
        sources: c.sources,
        id,
    })
}

fn compile_trim(id: RuleId, c: RawTrimConfig) -> Result<TrimRule> {
    let policy = match (c.max_age, c.max_count) {
        (Some(age), None) => {
            let age = parse_duration(&age)
                .map_err(|e| config_err(format!("rule '{id}': max_age: {e}")))?;
            let age = chrono::Duration::from_std(age)
                .map_err(|e| config_err(format!("rule '{id}': max_age out of range: {e}")))?;
            TrimPolicy::MaxAge(age)
        }
        (None, Some(count)) => TrimPolicy::MaxCount(count),
        _ => {
            return Err(config_err(format!(
                "rule '{id}': set exactly one of max_age or max_count"
            )));
        }
    };
    Ok(TrimRule { id, policy })
}

use std::error::Error;

use chrono::Duration;

use radargen::catalog::ObjectType;
use radargen::command::{RuleAction, SCANSUN_ALGORITHM};
use radargen::dispatch::EngineEvent;
use radargen::errors::EngineError;
use radargen::nominal::NominalTime;
use radargen::rule::housekeeping::DEFAULT_NAME_TEMPLATE;
use radargen::rule::{DistributionRule, Rule, RuleId, ScansunRule, TrimPolicy, TrimRule};
use radargen::timeout::TimeoutKind;
use radargen::types::TimeoutMode;
use radargen::window::WindowKey;
use radargen_test_utils::builders::{AcrrRuleBuilder, CompositeRuleBuilder, at, comp, pvol, scan};
use radargen_test_utils::harness::HarnessBuilder;
use radargen_test_utils::init_tracing;

type TestResult = Result<(), Box<dyn Error>>;

#[tokio::test]
async fn duplicate_rule_ids_are_refused() -> TestResult {
    init_tracing();
    let h = HarnessBuilder::new(at(12, 0, 0))
        .rule(AcrrRuleBuilder::new("acrr_12h", "swegmaps_2000").rule())
        .build()?;

    let err = h
        .dispatcher
        .register(AcrrRuleBuilder::new("acrr_12h", "other").rule())
        .unwrap_err();
    assert!(matches!(err, EngineError::DuplicateRule(id) if id == "acrr_12h"));
    Ok(())
}

#[tokio::test]
async fn ticks_and_timeouts_for_unknown_targets_are_errors() -> TestResult {
    init_tracing();
    let h = HarnessBuilder::new(at(12, 0, 0))
        .rule(AcrrRuleBuilder::new("acrr_12h", "swegmaps_2000").rule())
        .build()?;

    let err = h.tick("nobody", at(12, 0, 0)).unwrap_err();
    assert!(matches!(err, EngineError::UnknownTarget(t) if t == "nobody"));

    let err = h
        .dispatcher
        .dispatch(EngineEvent::Timeout {
            rule_id: RuleId::from("ghost"),
            kind: TimeoutKind::Nominal,
            key: WindowKey::area("ghost", NominalTime::exact(at(12, 0, 0))),
        })
        .unwrap_err();
    assert!(matches!(err, EngineError::UnknownRule(_)));

    let err = h
        .dispatcher
        .add_route("hourly", vec![RuleId::from("acrr_12h"), RuleId::from("ghost")])
        .unwrap_err();
    assert!(matches!(err, EngineError::UnknownRule(_)));
    Ok(())
}

#[tokio::test]
async fn route_ticks_reach_every_member() -> TestResult {
    init_tracing();
    let h = HarnessBuilder::new(at(13, 0, 0))
        .rule(AcrrRuleBuilder::new("acrr_a", "area_a").rule())
        .rule(AcrrRuleBuilder::new("acrr_b", "area_b").rule())
        .rule(AcrrRuleBuilder::new("acrr_c", "area_c").rule())
        .build()?;
    h.dispatcher
        .add_route("twice_daily", vec![RuleId::from("acrr_a"), RuleId::from("acrr_b")])?;

    for area in ["area_a", "area_b", "area_c"] {
        h.store.insert(comp(area, at(11, 0, 0)));
    }

    let report = h.tick("twice_daily", at(13, 0, 0))?;
    let rules: Vec<&str> = report.emitted.iter().map(|a| a.rule().as_str()).collect();
    assert_eq!(rules, vec!["acrr_a", "acrr_b"]);

    // A rule id is a valid target on its own.
    let report = h.tick("acrr_c", at(13, 0, 0))?;
    assert_eq!(report.emitted.len(), 1);
    Ok(())
}

#[tokio::test]
async fn replaced_rule_keeps_its_open_windows() -> TestResult {
    init_tracing();
    let h = HarnessBuilder::new(at(12, 1, 0))
        .rule(
            CompositeRuleBuilder::new("swe_comp", "swegmaps_2000", &["seang", "sekir"])
                .timeout(Duration::minutes(10), TimeoutMode::Nominal)
                .rule(),
        )
        .build()?;

    h.arrive(pvol("seang", at(12, 1, 0)))?;
    assert!(h.sink.is_empty());

    // sekir is dropped from the configuration while the window is open.
    h.dispatcher.replace_rule(
        CompositeRuleBuilder::new("swe_comp", "swegmaps_2000", &["seang"])
            .timeout(Duration::minutes(10), TimeoutMode::Nominal)
            .rule(),
    )?;
    let slot = h.dispatcher.slot("swe_comp").unwrap();
    assert_eq!(slot.windows().len(), 1);

    let report = h.arrive(pvol("seang", at(12, 2, 0)))?;
    assert_eq!(report.emitted.len(), 1);
    assert_eq!(h.dispatcher.env().timers.outstanding(), 0);

    let err = h
        .dispatcher
        .replace_rule(AcrrRuleBuilder::new("unknown", "x").rule())
        .unwrap_err();
    assert!(matches!(err, EngineError::UnknownRule(_)));
    Ok(())
}

#[tokio::test]
async fn scansun_runs_once_per_file() -> TestResult {
    init_tracing();
    let h = HarnessBuilder::new(at(12, 0, 0))
        .rule(Rule::Scansun(ScansunRule {
            id: RuleId::from("scansun"),
            sources: Vec::new(),
            object_types: vec![ObjectType::Scan, ObjectType::Pvol],
        }))
        .build()?;

    let entry = scan("sevil", at(12, 0, 12), 0.5);
    h.arrive(entry.clone())?;
    // Delivered twice: only the first one counts.
    h.dispatcher.dispatch(EngineEvent::Arrival(entry.clone()))?;
    h.arrive(comp("swegmaps_2000", at(12, 0, 12)))?;

    let commands = h.sink.commands();
    assert_eq!(commands.len(), 1);
    assert_eq!(commands[0].algorithm, SCANSUN_ALGORITHM);
    assert_eq!(commands[0].files, vec![entry.uuid]);
    assert_eq!(commands[0].arguments[0], "--source=sevil");
    Ok(())
}

#[tokio::test]
async fn scansun_handles_scans_sharing_source_and_time() -> TestResult {
    init_tracing();
    let h = HarnessBuilder::new(at(12, 0, 0))
        .rule(Rule::Scansun(ScansunRule {
            id: RuleId::from("scansun"),
            sources: vec!["seang".to_string()],
            object_types: vec![ObjectType::Scan],
        }))
        .build()?;

    let low = scan("seang", at(12, 0, 0), 0.5);
    let high = scan("seang", at(12, 0, 0), 1.0);
    h.arrive(low.clone())?;
    h.arrive(high.clone())?;

    let files: Vec<_> = h.sink.commands().into_iter().flat_map(|c| c.files).collect();
    assert_eq!(files, vec![low.uuid, high.uuid]);
    Ok(())
}

#[tokio::test]
async fn housekeeping_rules_pass_through() -> TestResult {
    init_tracing();
    let h = HarnessBuilder::new(at(12, 0, 0))
        .rule(Rule::Distribution(DistributionRule {
            id: RuleId::from("to_ftp"),
            destination: "ftp://ftp.example.org/radar".to_string(),
            name_template: DEFAULT_NAME_TEMPLATE.to_string(),
            sources: vec!["seang".to_string()],
            filter: None,
        }))
        .rule(Rule::Trim(TrimRule {
            id: RuleId::from("trim_day"),
            policy: TrimPolicy::MaxAge(Duration::hours(24)),
        }))
        .build()?;

    let entry = pvol("seang", at(12, 15, 0));
    let report = h.arrive(entry.clone())?;
    assert_eq!(
        report.emitted,
        vec![RuleAction::Distribute {
            rule: RuleId::from("to_ftp"),
            file: entry.uuid,
            destination: "ftp://ftp.example.org/radar".to_string(),
            name: "seang_PVOL_20240601T121500.h5".to_string(),
        }]
    );
    h.arrive(pvol("sekir", at(12, 15, 0)))?;

    let report = h.tick("trim_day", at(13, 0, 0))?;
    assert_eq!(
        report.emitted,
        vec![RuleAction::TrimByAge {
            rule: RuleId::from("trim_day"),
            cutoff: at(13, 0, 0) - Duration::hours(24),
        }]
    );
    assert_eq!(h.sink.len(), 2);
    Ok(())
}

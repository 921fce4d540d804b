use std::error::Error;

use chrono::Duration;

use radargen::command::COMPOSITE_ALGORITHM;
use radargen::ledger::TriggerLedger;
use radargen::nominal::NominalTime;
use radargen::types::TimeoutMode;
use radargen::window::{IDLE_WINDOW_SPANS, WindowKey};
use radargen_test_utils::builders::{CompositeRuleBuilder, VolumeRuleBuilder, at, pvol, scan};
use radargen_test_utils::harness::HarnessBuilder;
use radargen_test_utils::init_tracing;

type TestResult = Result<(), Box<dyn Error>>;

fn two_source_rule() -> radargen::rule::Rule {
    CompositeRuleBuilder::new("swe_comp", "swegmaps_2000", &["seang", "sekir"])
        .timeout(Duration::minutes(10), TimeoutMode::Nominal)
        .rule()
}

#[tokio::test]
async fn second_arrival_triggers_immediately_and_late_arrival_is_ignored() -> TestResult {
    init_tracing();
    let h = HarnessBuilder::new(at(12, 1, 0))
        .rule(two_source_rule())
        .build()?;

    let first = pvol("seang", at(12, 1, 0));
    let report = h.arrive(first.clone())?;
    assert!(report.is_clean());
    assert!(report.emitted.is_empty());
    // Waiting for sekir: one timer outstanding.
    assert_eq!(h.dispatcher.env().timers.outstanding(), 1);

    let second = pvol("sekir", at(12, 3, 0));
    let report = h.arrive(second.clone())?;
    assert_eq!(report.emitted.len(), 1);

    let commands = h.sink.commands();
    assert_eq!(commands.len(), 1);
    let cmd = &commands[0];
    assert_eq!(cmd.algorithm, COMPOSITE_ALGORITHM);
    assert_eq!(cmd.files, vec![first.uuid, second.uuid]);
    assert!(cmd.arguments.contains(&"--date=20240601".to_string()));
    assert!(cmd.arguments.contains(&"--time=120000".to_string()));
    assert_eq!(cmd.arguments.last().unwrap(), "--algorithm_id=swe_comp");

    // Triggering cancelled the timer.
    assert_eq!(h.dispatcher.env().timers.outstanding(), 0);

    let key = WindowKey::area("swe_comp", NominalTime::exact(at(12, 0, 0)));
    assert!(h.ledger.is_triggered(&key)?);

    // Late data for the same window is expected and silently ignored.
    let report = h.arrive(pvol("seang", at(12, 9, 0)))?;
    assert!(report.is_clean());
    assert!(report.emitted.is_empty());
    assert_eq!(h.sink.len(), 1);
    Ok(())
}

#[tokio::test]
async fn next_interval_opens_a_new_window() -> TestResult {
    init_tracing();
    let h = HarnessBuilder::new(at(12, 1, 0))
        .rule(two_source_rule())
        .build()?;

    h.arrive(pvol("seang", at(12, 1, 0)))?;
    h.arrive(pvol("sekir", at(12, 2, 0)))?;
    assert_eq!(h.sink.len(), 1);

    // 12:15 belongs to the next 15-minute window.
    h.arrive(pvol("sekir", at(12, 15, 0)))?;
    assert_eq!(h.sink.len(), 1);
    h.arrive(pvol("seang", at(12, 29, 59)))?;
    assert_eq!(h.sink.len(), 2);

    let commands = h.sink.commands();
    assert!(commands[1].arguments.contains(&"--time=121500".to_string()));
    Ok(())
}

#[tokio::test]
async fn unrelated_files_do_not_open_windows() -> TestResult {
    init_tracing();
    let h = HarnessBuilder::new(at(12, 1, 0))
        .rule(two_source_rule())
        .build()?;

    // Wrong object type and an unconfigured source.
    h.arrive(scan("seang", at(12, 1, 0), 0.5))?;
    h.arrive(pvol("sevil", at(12, 2, 0)))?;

    assert!(h.sink.is_empty());
    assert_eq!(h.dispatcher.env().timers.outstanding(), 0);
    let slot = h.dispatcher.slot("swe_comp").unwrap();
    assert!(slot.windows().is_empty());
    Ok(())
}

#[tokio::test]
async fn rendering_is_identical_for_identical_inputs() -> TestResult {
    init_tracing();
    let a = pvol("seang", at(12, 1, 0));
    let b = pvol("sekir", at(12, 2, 0));

    let mut rendered = Vec::new();
    for _ in 0..2 {
        let h = HarnessBuilder::new(at(12, 1, 0))
            .rule(
                CompositeRuleBuilder::new("swe_comp", "swegmaps_2000", &["seang", "sekir"])
                    .detectors(&["ropo", "beamb"])
                    .rule(),
            )
            .build()?;
        h.arrive(a.clone())?;
        h.arrive(b.clone())?;
        rendered.extend(h.sink.commands());
    }

    assert_eq!(rendered.len(), 2);
    assert_eq!(rendered[0], rendered[1]);
    assert!(rendered[0]
        .arguments
        .contains(&"--anomaly-qc=ropo,beamb".to_string()));
    Ok(())
}

#[tokio::test]
async fn incomplete_windows_without_timeout_are_evicted() -> TestResult {
    init_tracing();
    let h = HarnessBuilder::new(at(0, 0, 0))
        .rule(CompositeRuleBuilder::new("swe_comp", "swegmaps_2000", &["seang", "sekir"]).rule())
        .rule(VolumeRuleBuilder::new("seang_vol", &["seang"]).angles(&[0.5, 1.0]).rule())
        .build()?;
    let limit = IDLE_WINDOW_SPANS as usize + 1;

    // sekir and the 1.0 degree scan never show up.
    let start = at(0, 1, 0);
    for i in 0..40 {
        let t = start + Duration::minutes(15 * i);
        h.clock.set(t);
        h.arrive(pvol("seang", t))?;
        h.arrive(scan("seang", t, 0.5))?;

        for rule in ["swe_comp", "seang_vol"] {
            let open = h.dispatcher.slot(rule).unwrap().windows().len();
            assert!(open <= limit, "{rule} holds {open} windows after {i} intervals");
        }
    }
    assert!(h.sink.is_empty());
    assert_eq!(h.dispatcher.env().timers.outstanding(), 0);

    // A late file for an evicted window rebuilds it from the catalog.
    h.arrive(pvol("sekir", at(0, 2, 0)))?;
    let commands = h.sink.commands();
    assert_eq!(commands.len(), 1);
    assert!(commands[0].arguments.contains(&"--time=000000".to_string()));
    Ok(())
}

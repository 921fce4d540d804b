use std::error::Error;
use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::Duration;

use radargen::catalog::InMemoryCatalog;
use radargen::ledger::TriggerLedger;
use radargen::nominal::NominalTime;
use radargen::types::TimeoutMode;
use radargen::window::{WindowKey, WindowPhase};
use radargen_test_utils::builders::{CompositeRuleBuilder, at, pvol};
use radargen_test_utils::harness::{FlakyCatalog, HarnessBuilder};
use radargen_test_utils::{init_tracing, with_timeout};

type TestResult = Result<(), Box<dyn Error>>;

fn window() -> WindowKey {
    WindowKey::area("swe_comp", NominalTime::exact(at(12, 0, 0)))
}

fn three_source_rule(after: Duration) -> radargen::rule::Rule {
    CompositeRuleBuilder::new("swe_comp", "swegmaps_2000", &["seang", "sekir", "sevil"])
        .timeout(after, TimeoutMode::Arrival)
        .rule()
}

#[tokio::test]
async fn timeout_uses_only_the_sources_that_arrived() -> TestResult {
    init_tracing();
    let h = HarnessBuilder::new(at(12, 2, 0))
        .rule(three_source_rule(Duration::milliseconds(50)))
        .build()?;

    let a = pvol("seang", at(12, 1, 0));
    let c = pvol("sevil", at(12, 4, 0));
    h.arrive(a.clone())?;
    h.arrive(c.clone())?;
    assert!(h.sink.is_empty());

    let actions = with_timeout(h.sink.wait_for(1)).await;
    let cmd = actions[0].command().expect("generate action");
    assert_eq!(cmd.files, vec![a.uuid, c.uuid]);
    assert!(h.ledger.is_triggered(&window())?);
    assert!(h.ledger.pending()?.is_empty());

    // sekir shows up late: the ledger already holds the window.
    let report = h.arrive(pvol("sekir", at(12, 6, 0)))?;
    assert!(report.emitted.is_empty());
    tokio::time::sleep(StdDuration::from_millis(100)).await;
    assert_eq!(h.sink.len(), 1);
    Ok(())
}

#[tokio::test]
async fn nominal_deadline_in_the_past_fires_right_away() -> TestResult {
    init_tracing();
    // 12:30 is already past 12:00 + 10m.
    let h = HarnessBuilder::new(at(12, 30, 0))
        .rule(
            CompositeRuleBuilder::new("swe_comp", "swegmaps_2000", &["seang", "sekir"])
                .timeout(Duration::minutes(10), TimeoutMode::Nominal)
                .rule(),
        )
        .build()?;

    let a = pvol("seang", at(12, 1, 0));
    h.arrive(a.clone())?;

    let actions = with_timeout(h.sink.wait_for(1)).await;
    assert_eq!(actions[0].command().unwrap().files, vec![a.uuid]);
    Ok(())
}

#[tokio::test]
async fn window_without_data_at_timeout_is_dropped_untriggered() -> TestResult {
    init_tracing();
    let store = Arc::new(InMemoryCatalog::new());
    let h = HarnessBuilder::new(at(12, 2, 0))
        .store(store.clone())
        .rule(three_source_rule(Duration::milliseconds(100)))
        .build()?;

    h.arrive(pvol("seang", at(12, 1, 0)))?;
    assert_eq!(h.ledger.pending()?.len(), 1);
    // The only file is trimmed away before the timeout.
    store.trim_to_count(0);

    tokio::time::sleep(StdDuration::from_millis(300)).await;
    assert!(h.sink.is_empty());
    assert!(!h.ledger.is_triggered(&window())?);
    assert!(h.ledger.pending()?.is_empty());
    assert!(h.dispatcher.slot("swe_comp").unwrap().windows().is_empty());

    // A fresh arrival starts over with a new window.
    h.arrive(pvol("sekir", at(12, 5, 0)))?;
    let slot = h.dispatcher.slot("swe_comp").unwrap();
    assert_eq!(slot.windows().phase(&window()), Some(WindowPhase::Armed));
    Ok(())
}

#[tokio::test]
async fn failed_timeout_fetch_is_retried() -> TestResult {
    init_tracing();
    let store = Arc::new(InMemoryCatalog::new());
    let flaky = Arc::new(FlakyCatalog::new(store.clone(), 0));
    let h = HarnessBuilder::new(at(12, 2, 0))
        .store(store)
        .catalog(flaky.clone())
        .retry(StdDuration::from_millis(20), 3)
        .rule(three_source_rule(Duration::milliseconds(30)))
        .build()?;

    let a = pvol("seang", at(12, 1, 0));
    h.arrive(a.clone())?;
    flaky.fail_next(2);

    let actions = with_timeout(h.sink.wait_for(1)).await;
    assert_eq!(actions[0].command().unwrap().files, vec![a.uuid]);
    // Arrival, two failed timeout attempts, one that succeeded.
    assert_eq!(flaky.fetches(), 4);
    assert!(h.ledger.is_triggered(&window())?);
    Ok(())
}

#[tokio::test]
async fn window_is_abandoned_after_retries_run_out() -> TestResult {
    init_tracing();
    let store = Arc::new(InMemoryCatalog::new());
    let flaky = Arc::new(FlakyCatalog::new(store.clone(), 0));
    let h = HarnessBuilder::new(at(12, 2, 0))
        .store(store)
        .catalog(flaky.clone())
        .retry(StdDuration::from_millis(10), 2)
        .rule(three_source_rule(Duration::milliseconds(10)))
        .build()?;

    h.arrive(pvol("seang", at(12, 1, 0)))?;
    flaky.fail_next(100);

    with_timeout(async {
        while !h.ledger.pending().unwrap().is_empty() {
            tokio::time::sleep(StdDuration::from_millis(5)).await;
        }
    })
    .await;

    // First timeout plus two retries.
    assert_eq!(flaky.fetches(), 4);
    assert!(h.sink.is_empty());
    assert!(!h.ledger.is_triggered(&window())?);
    assert_eq!(h.dispatcher.env().timers.outstanding(), 0);
    Ok(())
}

#[tokio::test]
async fn failed_arrival_fetch_still_arms_the_window() -> TestResult {
    init_tracing();
    let store = Arc::new(InMemoryCatalog::new());
    let flaky = Arc::new(FlakyCatalog::new(store.clone(), 1));
    let h = HarnessBuilder::new(at(12, 2, 0))
        .store(store)
        .catalog(flaky)
        .rule(three_source_rule(Duration::milliseconds(40)))
        .build()?;

    let a = pvol("seang", at(12, 1, 0));
    let report = h.arrive(a.clone())?;
    assert_eq!(report.errors.len(), 1);
    assert!(h.dispatcher.env().timers.registered(&window()).is_some());

    // The timeout path fetches again and succeeds with partial data.
    let actions = with_timeout(h.sink.wait_for(1)).await;
    assert_eq!(actions[0].command().unwrap().files, vec![a.uuid]);
    Ok(())
}

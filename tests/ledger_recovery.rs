use std::error::Error;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use chrono::Duration;
use tempfile::tempdir;
use tokio::sync::mpsc;

use radargen::clock::ManualClock;
use radargen::config::{ConfigFile, load_and_validate};
use radargen::dispatch::EngineEvent;
use radargen::engine::{Runtime, RuntimeEvent};
use radargen::ledger::{FileLedger, TriggerLedger};
use radargen::start_engine;
use radargen::nominal::NominalTime;
use radargen::types::TimeoutMode;
use radargen::window::WindowKey;
use radargen_test_utils::builders::{CompositeRuleBuilder, at, pvol};
use radargen_test_utils::harness::{HarnessBuilder, RecordingSink};
use radargen_test_utils::{init_tracing, with_timeout};

type TestResult = Result<(), Box<dyn Error>>;

fn rule() -> radargen::rule::Rule {
    CompositeRuleBuilder::new("swe_comp", "swegmaps_2000", &["seang", "sekir"])
        .timeout(Duration::minutes(10), TimeoutMode::Nominal)
        .rule()
}

fn window() -> WindowKey {
    WindowKey::area("swe_comp", NominalTime::exact(at(12, 0, 0)))
}

#[tokio::test]
async fn triggered_windows_stay_triggered_after_restart() -> TestResult {
    init_tracing();
    let dir = tempdir()?;
    let path = dir.path().join("ledger.jsonl");

    {
        let ledger = Arc::new(FileLedger::open(&path)?);
        let h = HarnessBuilder::new(at(12, 1, 0))
            .ledger(ledger)
            .rule(rule())
            .build()?;
        h.arrive(pvol("seang", at(12, 1, 0)))?;
        h.arrive(pvol("sekir", at(12, 2, 0)))?;
        assert_eq!(h.sink.len(), 1);
    }

    let ledger = Arc::new(FileLedger::open(&path)?);
    assert!(ledger.is_triggered(&window())?);
    assert!(ledger.pending()?.is_empty());

    let h = HarnessBuilder::new(at(12, 5, 0))
        .ledger(ledger)
        .rule(rule())
        .build()?;
    // Both sources again, e.g. replayed input: no second command.
    h.arrive(pvol("seang", at(12, 3, 0)))?;
    h.arrive(pvol("sekir", at(12, 4, 0)))?;
    assert!(h.sink.is_empty());
    Ok(())
}

fn durable_config(dir: &Path) -> Result<ConfigFile, Box<dyn Error>> {
    let path = dir.join("Radargen.toml");
    fs::write(
        &path,
        format!(
            r#"
[engine]
ledger = "file"
ledger_path = "{ledger}"
catalog_path = "{catalog}"

[rule.swe_comp]
type = "composite"
area = "swegmaps_2000"
sources = ["seang", "sekir"]
timeout = "10m"
"#,
            ledger = dir.join("ledger.jsonl").display(),
            catalog = dir.join("catalog.jsonl").display(),
        ),
    )?;
    Ok(load_and_validate(&path)?)
}

/// One process lifetime: its own Tokio runtime, dropped at the end along
/// with every timer it still had.
fn process() -> Result<tokio::runtime::Runtime, Box<dyn Error>> {
    Ok(tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()?)
}

#[test]
fn pending_window_is_rearmed_and_times_out_after_restart() -> TestResult {
    init_tracing();
    let dir = tempdir()?;
    let cfg = durable_config(dir.path())?;
    let a = pvol("seang", at(12, 1, 0));

    // First run: one of two sources arrives, then the process goes away
    // before the 12:10 deadline.
    {
        let rt = process()?;
        let sink = Arc::new(RecordingSink::new());
        rt.block_on(async {
            let startup = start_engine(&cfg, Arc::new(ManualClock::new(at(12, 1, 0))), sink.clone())?;
            assert_eq!(startup.recovered, 0);

            let (tx, rx) = mpsc::channel(8);
            tx.send(RuntimeEvent::Dispatch(EngineEvent::Arrival(a.clone())))
                .await?;
            tx.send(RuntimeEvent::ShutdownRequested).await?;
            with_timeout(Runtime::new(startup.dispatcher, startup.catalog, rx).run()).await?;
            Ok::<_, Box<dyn Error>>(())
        })?;
        assert!(sink.is_empty());
    }

    let ledger = FileLedger::open(dir.path().join("ledger.jsonl"))?;
    let pending = ledger.pending()?;
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].key, window());
    assert_eq!(pending[0].deadline, at(12, 10, 0));
    drop(ledger);

    // Restarted after the deadline with no new input: the recovered timer
    // fires at once over the journaled arrival.
    let rt = process()?;
    let sink = Arc::new(RecordingSink::new());
    let actions = rt.block_on(async {
        let startup = start_engine(&cfg, Arc::new(ManualClock::new(at(12, 30, 0))), sink.clone())?;
        assert_eq!(startup.recovered, 1);
        assert_eq!(startup.catalog.len(), 1);
        let actions = with_timeout(sink.wait_for(1)).await;
        assert!(startup.dispatcher.env().ledger.is_triggered(&window())?);
        assert!(startup.dispatcher.env().ledger.pending()?.is_empty());
        Ok::<_, Box<dyn Error>>(actions)
    })?;
    assert_eq!(actions[0].command().unwrap().files, vec![a.uuid]);
    Ok(())
}

#[tokio::test]
async fn pending_records_of_removed_rules_are_discarded() -> TestResult {
    init_tracing();
    let dir = tempdir()?;
    let path = dir.path().join("ledger.jsonl");

    {
        let ledger = FileLedger::open(&path)?;
        ledger.record_pending(&window(), at(12, 10, 0))?;
    }

    let ledger = Arc::new(FileLedger::open(&path)?);
    let h = HarnessBuilder::new(at(12, 30, 0))
        .ledger(ledger.clone())
        .build()?;
    assert_eq!(h.dispatcher.recover()?, 0);
    assert!(ledger.pending()?.is_empty());
    Ok(())
}

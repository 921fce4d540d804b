// src/lib.rs

pub mod catalog;
pub mod cli;
pub mod clock;
pub mod command;
pub mod config;
pub mod criteria;
pub mod dispatch;
pub mod engine;
pub mod errors;
pub mod ledger;
pub mod logging;
pub mod nominal;
pub mod rule;
pub mod timeout;
pub mod types;
pub mod window;

use std::sync::Arc;

use anyhow::Result;
use tokio::io::BufReader;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::catalog::InMemoryCatalog;
use crate::cli::CliArgs;
use crate::clock::{Clock, SystemClock};
use crate::config::{ConfigFile, load_and_validate};
use crate::dispatch::{CommandSink, RuleDispatcher, StdoutSink};
use crate::engine::{Runtime, RuntimeEvent, spawn_line_ingest, spawn_schedule};
use crate::ledger::{FileLedger, MemoryLedger, TriggerLedger};
use crate::rule::{Rule, RuleEnv};
use crate::timeout::TimeoutCoordinator;
use crate::types::LedgerStorageMode;

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading
/// - ledger, catalog and dispatcher
/// - recovery of windows left pending by a previous run
/// - stdin ingest and schedule tickers
/// - Ctrl-C handling
pub async fn run(args: CliArgs) -> Result<()> {
    let cfg = load_and_validate(&args.config)?;

    if args.dry_run {
        print_dry_run(&cfg);
        return Ok(());
    }

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let Startup {
        dispatcher,
        catalog,
        recovered,
    } = start_engine(&cfg, Arc::clone(&clock), Arc::new(StdoutSink))?;
    debug!(recovered, catalog = catalog.len(), "engine started");

    let (rt_tx, rt_rx) = mpsc::channel::<RuntimeEvent>(256);

    let _ingest = spawn_line_ingest(
        BufReader::new(tokio::io::stdin()),
        rt_tx.clone(),
        args.exit_on_eof,
    );

    for schedule in cfg.schedules.iter().cloned() {
        spawn_schedule(schedule, Arc::clone(&clock), rt_tx.clone());
    }

    // Ctrl-C → graceful shutdown.
    {
        let tx = rt_tx.clone();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                eprintln!("failed to listen for Ctrl+C: {e}");
                return;
            }
            let _ = tx.send(RuntimeEvent::ShutdownRequested).await;
        });
    }
    drop(rt_tx);

    info!(rules = cfg.rules.len(), schedules = cfg.schedules.len(), "radargen ready");
    Runtime::new(dispatcher, catalog, rt_rx).run().await?;
    Ok(())
}

/// Everything `run` needs once the stores are open.
#[derive(Debug)]
pub struct Startup {
    pub dispatcher: Arc<RuleDispatcher>,
    pub catalog: Arc<InMemoryCatalog>,
    /// Pending windows re-armed from the ledger.
    pub recovered: usize,
}

/// Open the ledger and catalog, register the configuration, and re-arm
/// windows a previous run left pending.
///
/// With a `file` ledger the catalog is reloaded from its journal first, so
/// re-armed windows time out over the files that had already arrived.
/// Must be called from within a Tokio runtime.
pub fn start_engine(
    cfg: &ConfigFile,
    clock: Arc<dyn Clock>,
    sink: Arc<dyn CommandSink>,
) -> errors::Result<Startup> {
    let (ledger, catalog): (Arc<dyn TriggerLedger>, Arc<InMemoryCatalog>) = match cfg.engine.ledger
    {
        LedgerStorageMode::File => (
            Arc::new(FileLedger::open(&cfg.engine.ledger_path)?),
            Arc::new(InMemoryCatalog::open(&cfg.engine.catalog_path)?),
        ),
        LedgerStorageMode::Memory => (
            Arc::new(MemoryLedger::new()),
            Arc::new(InMemoryCatalog::new()),
        ),
    };
    let env = RuleEnv {
        clock,
        catalog: catalog.clone(),
        ledger,
        timers: TimeoutCoordinator::current()?,
        retry: cfg.engine.retry,
    };

    let dispatcher = Arc::new(build_dispatcher(cfg, env, sink)?);
    let recovered = dispatcher.recover()?;
    Ok(Startup {
        dispatcher,
        catalog,
        recovered,
    })
}

/// Register every configured rule and route.
pub fn build_dispatcher(
    cfg: &ConfigFile,
    env: RuleEnv,
    sink: Arc<dyn CommandSink>,
) -> errors::Result<RuleDispatcher> {
    let dispatcher = RuleDispatcher::new(env, sink);
    for rule in &cfg.rules {
        dispatcher.register(rule.clone())?;
    }
    for (name, members) in &cfg.routes {
        dispatcher.add_route(name.clone(), members.clone())?;
    }
    Ok(dispatcher)
}

/// Simple dry-run output: engine settings, rules, routes, schedules.
fn print_dry_run(cfg: &ConfigFile) {
    println!("radargen dry-run");
    println!("  engine.ledger = {:?}", cfg.engine.ledger);
    println!("  engine.ledger_path = {}", cfg.engine.ledger_path.display());
    if cfg.engine.ledger == LedgerStorageMode::File {
        println!("  engine.catalog_path = {}", cfg.engine.catalog_path.display());
    }
    println!(
        "  engine.timeout_retry = {:?} (max {})",
        cfg.engine.retry.delay, cfg.engine.retry.max_attempts
    );
    println!();

    println!("rules ({}):", cfg.rules.len());
    for rule in &cfg.rules {
        println!("  - {} [{}]", rule.id(), rule.kind());
        match rule {
            Rule::Composite(c) => {
                println!("      area: {}  interval: {}m", c.area, c.interval.minutes());
                println!("      sources: {:?}", c.sources);
                if let Some(t) = c.timeout {
                    println!("      timeout: {} ({:?})", t.after, t.mode);
                }
            }
            Rule::Volume(v) => {
                println!("      sources: {:?}  interval: {}m", v.sources, v.interval.minutes());
                println!("      elevations: {:?}", v.selection);
            }
            Rule::Acrr(a) => println!(
                "      area: {}  term: {}h from {:02}:00",
                a.term.area,
                a.term.term.hours(),
                a.term.term.first_offset()
            ),
            Rule::Gra(g) => println!(
                "      area: {}  term: {}h from {:02}:00",
                g.term.area,
                g.term.term.hours(),
                g.term.term.first_offset()
            ),
            Rule::Scansun(s) => println!("      sources: {:?}", s.sources),
            Rule::Distribution(d) => println!("      destination: {}", d.destination),
            Rule::Trim(t) => println!("      policy: {:?}", t.policy),
        }
    }

    if !cfg.routes.is_empty() {
        println!();
        println!("routes ({}):", cfg.routes.len());
        for (name, members) in &cfg.routes {
            println!("  - {name}: {members:?}");
        }
    }
    if !cfg.schedules.is_empty() {
        println!();
        println!("schedules ({}):", cfg.schedules.len());
        for s in &cfg.schedules {
            println!("  - {} every {:?} -> {}", s.name, s.every, s.target);
        }
    }

    debug!("dry-run complete (nothing run)");
}

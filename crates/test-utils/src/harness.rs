#![allow(dead_code)]

//! In-process engine for tests: manual clock, in-memory catalog, a ledger
//! of the test's choosing and a sink that records every action.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};

use radargen::catalog::{CatalogGateway, CatalogQuery, FileEntry, InMemoryCatalog};
use radargen::clock::ManualClock;
use radargen::command::{GenerationCommand, RuleAction};
use radargen::dispatch::{CommandSink, DispatchReport, EngineEvent, RuleDispatcher};
use radargen::errors::{EngineError, Result};
use radargen::ledger::{MemoryLedger, TriggerLedger};
use radargen::rule::{RetryPolicy, Rule, RuleEnv};
use radargen::timeout::TimeoutCoordinator;

/// Sink that keeps everything emitted, timer-driven actions included.
#[derive(Debug, Default)]
pub struct RecordingSink {
    actions: Mutex<Vec<RuleAction>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn actions(&self) -> Vec<RuleAction> {
        self.actions.lock().unwrap().clone()
    }

    pub fn commands(&self) -> Vec<GenerationCommand> {
        self.actions()
            .iter()
            .filter_map(|a| a.command().cloned())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.actions.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Poll until at least `n` actions were recorded.
    pub async fn wait_for(&self, n: usize) -> Vec<RuleAction> {
        loop {
            if self.len() >= n {
                return self.actions();
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }
}

impl CommandSink for RecordingSink {
    fn emit(&self, action: &RuleAction) -> Result<()> {
        self.actions.lock().unwrap().push(action.clone());
        Ok(())
    }
}

/// Catalog whose first `failures` fetches fail.
#[derive(Debug)]
pub struct FlakyCatalog {
    inner: Arc<InMemoryCatalog>,
    remaining: AtomicUsize,
    fetches: AtomicUsize,
}

impl FlakyCatalog {
    pub fn new(inner: Arc<InMemoryCatalog>, failures: usize) -> Self {
        Self {
            inner,
            remaining: AtomicUsize::new(failures),
            fetches: AtomicUsize::new(0),
        }
    }

    /// Fail the next `n` fetches.
    pub fn fail_next(&self, n: usize) {
        self.remaining.store(n, Ordering::SeqCst);
    }

    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

impl CatalogGateway for FlakyCatalog {
    fn fetch(&self, query: &CatalogQuery) -> Result<Vec<FileEntry>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        let failing = self
            .remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(EngineError::Catalog("catalog unavailable".to_string()));
        }
        self.inner.fetch(query)
    }
}

/// A dispatcher wired to test doubles. Must be built inside a Tokio
/// runtime (timers need one).
pub struct Harness {
    pub clock: Arc<ManualClock>,
    pub store: Arc<InMemoryCatalog>,
    pub ledger: Arc<dyn TriggerLedger>,
    pub sink: Arc<RecordingSink>,
    pub dispatcher: RuleDispatcher,
}

pub struct HarnessBuilder {
    start: DateTime<Utc>,
    store: Arc<InMemoryCatalog>,
    catalog: Option<Arc<dyn CatalogGateway>>,
    ledger: Arc<dyn TriggerLedger>,
    retry: RetryPolicy,
    rules: Vec<Rule>,
}

impl HarnessBuilder {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            start,
            store: Arc::new(InMemoryCatalog::new()),
            catalog: None,
            ledger: Arc::new(MemoryLedger::new()),
            retry: RetryPolicy::default(),
            rules: Vec::new(),
        }
    }

    pub fn rule(mut self, rule: Rule) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn ledger(mut self, ledger: Arc<dyn TriggerLedger>) -> Self {
        self.ledger = ledger;
        self
    }

    /// Use `store` as the backing catalog.
    pub fn store(mut self, store: Arc<InMemoryCatalog>) -> Self {
        self.store = store;
        self
    }

    /// Read through `catalog` instead of the store directly; arrivals are
    /// still inserted into the store.
    pub fn catalog(mut self, catalog: Arc<dyn CatalogGateway>) -> Self {
        self.catalog = Some(catalog);
        self
    }

    pub fn retry(mut self, delay: Duration, max_attempts: u32) -> Self {
        self.retry = RetryPolicy {
            delay,
            max_attempts,
        };
        self
    }

    pub fn build(self) -> anyhow::Result<Harness> {
        let clock = Arc::new(ManualClock::new(self.start));
        let sink = Arc::new(RecordingSink::new());
        let catalog = self
            .catalog
            .unwrap_or_else(|| self.store.clone() as Arc<dyn CatalogGateway>);
        let env = RuleEnv {
            clock: clock.clone(),
            catalog,
            ledger: Arc::clone(&self.ledger),
            timers: TimeoutCoordinator::current()?,
            retry: self.retry,
        };
        let dispatcher = RuleDispatcher::new(env, sink.clone());
        for rule in self.rules {
            dispatcher.register(rule)?;
        }
        Ok(Harness {
            clock,
            store: self.store,
            ledger: self.ledger,
            sink,
            dispatcher,
        })
    }
}

impl Harness {
    /// Catalogue `entry` and dispatch its arrival, as the runtime does.
    pub fn arrive(&self, entry: FileEntry) -> Result<DispatchReport> {
        self.store.insert(entry.clone());
        self.dispatcher.dispatch(EngineEvent::Arrival(entry))
    }

    pub fn tick(&self, target: &str, fire_time: DateTime<Utc>) -> Result<DispatchReport> {
        self.dispatcher.dispatch(EngineEvent::Tick {
            target: target.to_string(),
            fire_time,
        })
    }
}

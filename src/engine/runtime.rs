// src/engine/runtime.rs

use std::fmt;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use super::RuntimeEvent;
use crate::catalog::InMemoryCatalog;
use crate::command::RuleAction;
use crate::dispatch::{EngineEvent, RuleDispatcher};
use crate::errors::Result;

/// Reads `RuntimeEvent`s and feeds them to the dispatcher.
pub struct Runtime {
    dispatcher: Arc<RuleDispatcher>,
    catalog: Arc<InMemoryCatalog>,
    event_rx: mpsc::Receiver<RuntimeEvent>,
}

impl fmt::Debug for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("dispatcher", &self.dispatcher)
            .field("catalog_len", &self.catalog.len())
            .finish_non_exhaustive()
    }
}

impl Runtime {
    pub fn new(
        dispatcher: Arc<RuleDispatcher>,
        catalog: Arc<InMemoryCatalog>,
        event_rx: mpsc::Receiver<RuntimeEvent>,
    ) -> Self {
        Self {
            dispatcher,
            catalog,
            event_rx,
        }
    }

    /// Main event loop. Returns once shutdown is requested or every sender
    /// is gone, after in-flight dispatches have finished.
    pub async fn run(mut self) -> Result<()> {
        info!("radargen runtime started");
        let mut in_flight = JoinSet::new();

        loop {
            let event = match self.event_rx.recv().await {
                Some(e) => e,
                None => {
                    info!("runtime event channel closed; exiting");
                    break;
                }
            };

            match event {
                RuntimeEvent::ShutdownRequested => {
                    info!("shutdown requested; stopping runtime");
                    break;
                }
                RuntimeEvent::Dispatch(event) => self.spawn_dispatch(&mut in_flight, event),
            }

            while let Some(done) = in_flight.try_join_next() {
                if let Err(err) = done {
                    error!(error = %err, "dispatch task panicked");
                }
            }
        }

        while let Some(done) = in_flight.join_next().await {
            if let Err(err) = done {
                error!(error = %err, "dispatch task panicked");
            }
        }
        info!("runtime exiting");
        Ok(())
    }

    fn spawn_dispatch(&self, in_flight: &mut JoinSet<()>, event: EngineEvent) {
        if let EngineEvent::Arrival(entry) = &event
            && !self.catalog.insert(entry.clone())
        {
            debug!(uuid = %entry.uuid, "duplicate arrival; not dispatched");
            return;
        }

        let dispatcher = Arc::clone(&self.dispatcher);
        let catalog = Arc::clone(&self.catalog);
        in_flight.spawn_blocking(move || match dispatcher.dispatch(event) {
            Ok(report) => {
                apply_housekeeping(&catalog, &report.emitted);
                for (rule, err) in &report.errors {
                    warn!(%rule, error = %err, "rule reported an error");
                }
            }
            Err(err) => warn!(error = %err, "event could not be routed"),
        });
    }
}

/// Trim actions act on the catalog this process owns.
pub fn apply_housekeeping(catalog: &InMemoryCatalog, actions: &[RuleAction]) {
    for action in actions {
        match action {
            RuleAction::TrimByAge { cutoff, .. } => {
                catalog.trim_older_than(*cutoff);
            }
            RuleAction::TrimByCount { keep, .. } => {
                catalog.trim_to_count(*keep);
            }
            RuleAction::Generate { .. } | RuleAction::Distribute { .. } => {}
        }
    }
}

// src/engine/mod.rs

//! Async shell around the dispatcher.
//!
//! Events reach the runtime over one channel: arrivals read by [`ingest`],
//! ticks from [`schedule`], and shutdown from Ctrl-C or end of input. The
//! [`runtime`] loop stores arrivals in the catalog and runs each dispatch on
//! the blocking pool, so arrivals, ticks and timer callbacks all reach the
//! rules concurrently.

pub mod ingest;
pub mod runtime;
pub mod schedule;

use crate::dispatch::EngineEvent;

/// Events flowing into the runtime.
#[derive(Debug, Clone)]
pub enum RuntimeEvent {
    Dispatch(EngineEvent),
    /// Graceful shutdown (Ctrl-C, or end of input with `--exit-on-eof`).
    ShutdownRequested,
}

pub use ingest::spawn_line_ingest;
pub use runtime::Runtime;
pub use schedule::spawn_schedule;

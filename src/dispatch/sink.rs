// src/dispatch/sink.rs

//! Outbound side: where emitted actions go.
//!
//! The dispatcher talks to a `CommandSink` instead of writing anywhere
//! itself, so tests can record actions while the binary prints them.

use std::io::Write;

use crate::command::RuleAction;
use crate::errors::Result;

/// Receives every action a rule emits, including those produced by timers.
///
/// Called from blocking worker threads; emission is fire-and-forget from
/// the engine's point of view.
pub trait CommandSink: Send + Sync {
    fn emit(&self, action: &RuleAction) -> Result<()>;
}

/// Writes each action as one JSON line on stdout.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdoutSink;

impl CommandSink for StdoutSink {
    fn emit(&self, action: &RuleAction) -> Result<()> {
        let line = serde_json::to_string(action)?;
        let mut out = std::io::stdout().lock();
        writeln!(out, "{line}")?;
        out.flush()?;
        Ok(())
    }
}

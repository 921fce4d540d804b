// src/rule/windowed.rs

//! Shared arrival/timeout flow for windowed rules.
//!
//! Arrival: sweep idle windows, ledger check, lock the window, re-check, fetch, evaluate, then
//! either trigger or arm the window's timer. Timeout: re-check, fetch,
//! trigger with whatever is there. Both paths only emit after winning
//! [`TriggerLedger::try_mark`](crate::ledger::TriggerLedger::try_mark).

use std::sync::{Arc, MutexGuard};

use tracing::{debug, error, info, trace, warn};
use uuid::Uuid;

use super::{RuleContext, RuleId};
use crate::catalog::CatalogQuery;
use crate::command::{GenerationCommand, RuleAction};
use crate::criteria::CriteriaPolicy;
use crate::errors::{EngineError, Result};
use crate::ledger::PendingWindow;
use crate::timeout::deadline::delay_until;
use crate::timeout::{TimeoutKind, timeout_deadline};
use crate::types::TimeoutMode;
use crate::window::{
    IDLE_WINDOW_SPANS, SharedWindow, WindowKey, WindowPhase, WindowState, lock_window,
};

/// How long a window waits for missing data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeoutSettings {
    pub mode: TimeoutMode,
    pub after: chrono::Duration,
}

impl TimeoutSettings {
    fn kind(&self) -> TimeoutKind {
        match self.mode {
            TimeoutMode::Nominal => TimeoutKind::Nominal,
            TimeoutMode::Arrival => TimeoutKind::Arrival,
        }
    }
}

/// The parts of a rule the windowed flow needs.
pub(crate) trait WindowedRule {
    fn id(&self) -> &RuleId;
    fn criteria(&self) -> CriteriaPolicy<'_>;
    /// Length of one window.
    fn window_span(&self) -> chrono::Duration;
    /// `None` means wait for the criteria only.
    fn timeout_settings(&self) -> Option<TimeoutSettings>;
    fn query(&self, key: &WindowKey) -> CatalogQuery;
    fn render(&self, key: &WindowKey, files: Vec<Uuid>) -> GenerationCommand;
}

pub(crate) fn on_arrival<R: WindowedRule>(
    rule: &R,
    key: WindowKey,
    ctx: &RuleContext<'_>,
) -> Result<Option<RuleAction>> {
    let horizon = ctx.env.clock.now() - rule.window_span() * IDLE_WINDOW_SPANS;
    let evicted = ctx.windows.evict_idle_before(horizon);
    if evicted > 0 {
        debug!(rule = %rule.id(), evicted, %horizon, "evicted idle windows");
    }

    if ctx.env.ledger.is_triggered(&key)? {
        debug!(window = %key, "window already triggered; ignoring arrival");
        return Ok(None);
    }

    loop {
        let window = ctx.windows.get_or_create(&key);
        let state = lock_window(&window);
        // An abandoned window lingering in the table is replaced by a fresh one.
        if state.phase() == WindowPhase::Abandoned {
            drop(state);
            ctx.windows.remove_if_same(&key, &window);
            continue;
        }
        return arrive(rule, &key, &window, state, ctx);
    }
}

fn arrive<R: WindowedRule>(
    rule: &R,
    key: &WindowKey,
    window: &SharedWindow,
    mut state: MutexGuard<'_, WindowState>,
    ctx: &RuleContext<'_>,
) -> Result<Option<RuleAction>> {
    // Another path may have completed the window while we waited for the lock.
    if state.phase().is_terminal() || ctx.env.ledger.is_triggered(key)? {
        debug!(window = %key, "window completed concurrently; ignoring arrival");
        close(ctx, key, window, state, WindowPhase::Triggered);
        return Ok(None);
    }

    let entries = match ctx.env.catalog.fetch(&rule.query(key)) {
        Ok(entries) => entries,
        Err(err) => {
            warn!(window = %key, error = %err, "catalog fetch failed on arrival");
            // Keep the window alive: its timeout will try again.
            if let Err(arm_err) = arm(rule, &mut state, ctx) {
                warn!(window = %key, error = %arm_err, "could not arm window after failed fetch");
            }
            return Err(err);
        }
    };

    let eval = rule.criteria().evaluate(&mut state, &entries);
    if eval.met {
        return fire(rule, key, window, state, eval.files, WindowPhase::Triggered, ctx);
    }

    debug!(
        window = %key,
        files = eval.files.len(),
        missing = ?eval.missing,
        "criteria not met yet"
    );
    arm(rule, &mut state, ctx)?;
    Ok(None)
}

pub(crate) fn on_timeout<R: WindowedRule>(
    rule: &R,
    kind: TimeoutKind,
    key: &WindowKey,
    ctx: &RuleContext<'_>,
) -> Result<Option<RuleAction>> {
    let window = ctx.windows.get_or_create(key);
    let mut state = lock_window(&window);
    // The timer that fired is spent.
    state.disarm();

    if state.phase().is_terminal() || ctx.env.ledger.is_triggered(key)? {
        debug!(window = %key, %kind, "timeout for a completed window; no-op");
        close(ctx, key, &window, state, WindowPhase::Triggered);
        return Ok(None);
    }

    let entries = match ctx.env.catalog.fetch(&rule.query(key)) {
        Ok(entries) => entries,
        Err(err) => {
            retry_or_abandon(key, &window, state, ctx, &err);
            return Err(err);
        }
    };

    let eval = rule.criteria().evaluate(&mut state, &entries);
    if eval.files.is_empty() {
        info!(window = %key, %kind, "no data at timeout; dropping window");
        close(ctx, key, &window, state, WindowPhase::Abandoned);
        ctx.env.ledger.clear_pending(key)?;
        return Ok(None);
    }
    if !eval.met {
        warn!(
            window = %key,
            %kind,
            files = eval.files.len(),
            missing = ?eval.missing,
            "timed out with partial data"
        );
    }
    fire(
        rule,
        key,
        &window,
        state,
        eval.files,
        WindowPhase::TriggeredOnTimeout,
        ctx,
    )
}

/// Re-register the timer of a window that was armed before a restart.
pub(crate) fn rearm<R: WindowedRule>(
    rule: &R,
    pending: &PendingWindow,
    ctx: &RuleContext<'_>,
) -> Result<bool> {
    let key = &pending.key;
    if ctx.env.ledger.is_triggered(key)? {
        ctx.env.ledger.clear_pending(key)?;
        return Ok(false);
    }

    let window = ctx.windows.get_or_create(key);
    let mut state = lock_window(&window);
    if state.timer().is_some() || ctx.env.timers.registered(key).is_some() {
        trace!(window = %key, "window already armed; nothing to recover");
        return Ok(false);
    }

    let delay = delay_until(pending.deadline, ctx.env.clock.now());
    let handle = ctx.env.timers.register(
        Arc::clone(ctx.owner),
        delay,
        key.clone(),
        TimeoutKind::Recovered,
    )?;
    state.arm(handle, pending.deadline);
    info!(
        rule = %rule.id(),
        window = %key,
        delay_ms = delay.as_millis() as u64,
        "re-armed pending window"
    );
    Ok(true)
}

/// Claim the window in the ledger and, if we won, build the command.
fn fire<R: WindowedRule>(
    rule: &R,
    key: &WindowKey,
    window: &SharedWindow,
    state: MutexGuard<'_, WindowState>,
    files: Vec<Uuid>,
    phase: WindowPhase,
    ctx: &RuleContext<'_>,
) -> Result<Option<RuleAction>> {
    if !ctx.env.ledger.try_mark(key)? {
        debug!(window = %key, "lost trigger race; nothing to emit");
        close(ctx, key, window, state, WindowPhase::Triggered);
        return Ok(None);
    }

    let count = files.len();
    let command = rule.render(key, files);
    close(ctx, key, window, state, phase);
    info!(
        rule = %rule.id(),
        window = %key,
        files = count,
        on_timeout = phase == WindowPhase::TriggeredOnTimeout,
        "window triggered"
    );
    Ok(Some(RuleAction::Generate {
        rule: rule.id().clone(),
        command,
    }))
}

/// Arm the window's timeout unless one is already outstanding.
fn arm<R: WindowedRule>(rule: &R, state: &mut WindowState, ctx: &RuleContext<'_>) -> Result<()> {
    let Some(settings) = rule.timeout_settings() else {
        return Ok(());
    };
    let key = state.key().clone();
    if state.timer().is_some() || ctx.env.timers.registered(&key).is_some() {
        trace!(window = %key, "timer already outstanding");
        return Ok(());
    }

    let deadline = timeout_deadline(settings.mode, key.nominal, settings.after, ctx.env.clock.now());
    let handle = ctx.env.timers.register(
        Arc::clone(ctx.owner),
        deadline.delay,
        key.clone(),
        settings.kind(),
    )?;
    state.arm(handle, deadline.at);
    ctx.env.ledger.record_pending(&key, deadline.at)?;
    debug!(
        window = %key,
        deadline = %deadline.at,
        delay_ms = deadline.delay.as_millis() as u64,
        "window armed"
    );
    Ok(())
}

fn retry_or_abandon(
    key: &WindowKey,
    window: &SharedWindow,
    mut state: MutexGuard<'_, WindowState>,
    ctx: &RuleContext<'_>,
    err: &EngineError,
) {
    let attempt = state.note_timeout_attempt();
    let retry = ctx.env.retry;
    if attempt > retry.max_attempts {
        error!(
            window = %key,
            attempts = attempt,
            error = %err,
            "timeout fetch kept failing; dropping window"
        );
        close(ctx, key, window, state, WindowPhase::Abandoned);
        if let Err(e) = ctx.env.ledger.clear_pending(key) {
            warn!(window = %key, error = %e, "could not clear pending record");
        }
        return;
    }

    warn!(
        window = %key,
        attempt,
        max_attempts = retry.max_attempts,
        error = %err,
        "timeout fetch failed; retrying"
    );
    match ctx.env.timers.register(
        Arc::clone(ctx.owner),
        retry.delay,
        key.clone(),
        TimeoutKind::Retry,
    ) {
        Ok(handle) => {
            let at = ctx.env.clock.now()
                + chrono::Duration::from_std(retry.delay).unwrap_or(chrono::Duration::zero());
            state.arm(handle, at);
            if let Err(e) = ctx.env.ledger.record_pending(key, at) {
                warn!(window = %key, error = %e, "could not record retry deadline");
            }
        }
        Err(e) => error!(window = %key, error = %e, "could not re-arm window"),
    }
}

/// Close the window (cancelling its timer) and drop it from the table.
fn close(
    ctx: &RuleContext<'_>,
    key: &WindowKey,
    window: &SharedWindow,
    mut state: MutexGuard<'_, WindowState>,
    phase: WindowPhase,
) {
    if !state.phase().is_terminal()
        && let Some(timer) = state.close(phase)
    {
        ctx.env.timers.cancel(&timer);
    }
    drop(state);
    ctx.windows.remove_if_same(key, window);
}

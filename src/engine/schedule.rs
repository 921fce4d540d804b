// src/engine/schedule.rs

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, trace};

use super::RuntimeEvent;
use crate::clock::Clock;
use crate::config::Schedule;
use crate::dispatch::EngineEvent;

/// Periodic tick source for one schedule. The first tick fires
/// immediately, so term rules catch up on start.
pub fn spawn_schedule(
    schedule: Schedule,
    clock: Arc<dyn Clock>,
    tx: mpsc::Sender<RuntimeEvent>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        debug!(schedule = %schedule.name, target = %schedule.target, every_ms = schedule.every.as_millis() as u64, "schedule started");
        let mut ticker = tokio::time::interval(schedule.every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            let fire_time = clock.now();
            trace!(schedule = %schedule.name, %fire_time, "tick");
            let event = RuntimeEvent::Dispatch(EngineEvent::Tick {
                target: schedule.target.clone(),
                fire_time,
            });
            if tx.send(event).await.is_err() {
                debug!(schedule = %schedule.name, "runtime gone; schedule stopped");
                break;
            }
        }
    })
}

//! Cron Scheduler (spec §4.9) — minute-aligned timer driving minor
//! refreshes, with an in-flight guard so overlapping ticks are skipped
//! rather than queued. New module; `tokio::time` + `chrono` for the
//! minute-boundary math, following the teacher's preference for
//! `tokio::spawn`'d background loops over a dedicated scheduling crate.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{Timelike, Utc};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::warn;

use crate::orchestrator::ContentOrchestrator;
use crate::model::GenerationContext;

fn millis_until_next_minute() -> u64 {
    let now = Utc::now();
    let seconds_into_minute = now.second() as u64;
    let millis_into_second = now.timestamp_subsec_millis() as u64;
    let elapsed = seconds_into_minute * 1000 + millis_into_second;
    60_000u64.saturating_sub(elapsed)
}

pub struct CronScheduler {
    orchestrator: Arc<ContentOrchestrator>,
    in_flight: Arc<AtomicBool>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl CronScheduler {
    pub fn new(orchestrator: Arc<ContentOrchestrator>) -> Self {
        Self {
            orchestrator,
            in_flight: Arc::new(AtomicBool::new(false)),
            handle: Mutex::new(None),
        }
    }

    async fn run_minor_update(orchestrator: &ContentOrchestrator, in_flight: &AtomicBool) {
        if in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            warn!("previous minor refresh still running, skipping this tick");
            return;
        }

        let result = orchestrator.generate_and_send(GenerationContext::minor(Utc::now())).await;
        if let Err(e) = result {
            warn!(error = %e, "minor refresh failed");
        }

        in_flight.store(false, Ordering::SeqCst);
    }

    pub async fn start(&self) {
        let mut handle_guard = self.handle.lock().await;
        if handle_guard.is_some() {
            return;
        }

        let orchestrator = Arc::clone(&self.orchestrator);
        let in_flight = Arc::clone(&self.in_flight);

        let task = tokio::spawn(async move {
            let first_tick = tokio::time::Instant::now() + std::time::Duration::from_millis(millis_until_next_minute());
            let mut ticker = tokio::time::interval_at(first_tick, std::time::Duration::from_millis(60_000));
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                Self::run_minor_update(&orchestrator, &in_flight).await;
            }
        });

        *handle_guard = Some(task);
    }

    pub async fn stop(&self) {
        if let Some(task) = self.handle.lock().await.take() {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn millis_until_next_minute_is_within_bounds() {
        let millis = millis_until_next_minute();
        assert!(millis <= 60_000);
    }
}

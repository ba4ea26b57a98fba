//! Periodic expiry sweeps.
//!
//! Lazy expiry keeps every lookup correct on its own; the sweeper only bounds
//! memory. Analytics retention runs once at start and then daily.

use std::time::Duration;

use tokio::sync::broadcast;
use tokio::time::MissedTickBehavior;

use crate::http::server::AppState;

const RETENTION_INTERVAL_MS: u64 = 24 * 3600 * 1000;

/// One sweep of the in-memory tables. Returns how many entries were dropped.
pub fn sweep_memory(state: &AppState) -> usize {
    state.gateway.sweep() + state.actions.sweep() + state.actions.challenges().sweep()
}

pub async fn run_sweeper(
    state: AppState,
    interval: Duration,
    mut shutdown: broadcast::Receiver<()>,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut last_retention: Option<u64> = None;

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = shutdown.recv() => {
                tracing::debug!("Sweeper stopping");
                return;
            }
        }

        let dropped = sweep_memory(&state);
        if dropped > 0 {
            tracing::debug!(dropped, "Expired entries swept");
        }

        let now = state.clock.now_ms();
        let due = last_retention.map_or(true, |at| now.saturating_sub(at) >= RETENTION_INTERVAL_MS);
        if due {
            match state.analytics.prune_retention().await {
                Ok(_) => last_retention = Some(now),
                Err(e) => tracing::warn!(error = %e, "Analytics retention failed"),
            }
        }
    }
}

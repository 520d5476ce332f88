// Periodic dispatch sweep
// Drives the campaign engine off the persisted next_due_at column. There are
// no in-process timers per enrollment; a restart just resumes at the next
// tick.

use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::services::campaign_engine::CampaignEngine;

/// Spawn the sweep loop. The returned handle is held by main for the life of
/// the process.
pub fn spawn_dispatch_sweep(
    engine: Arc<CampaignEngine>,
    interval_seconds: u64,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(interval_seconds));
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        info!(
            interval_seconds = interval_seconds,
            "Dispatch sweep started"
        );

        loop {
            ticker.tick().await;
            if let Err(e) = engine.run_due_sweep(Utc::now()).await {
                error!("Dispatch sweep iteration failed: {}", e);
            }
        }
    })
}

//! Periodic background tasks run next to the HTTP server.
//!
//! One task refreshes the daily transaction aggregates, the other queues a
//! reset sweep. Both skip missed ticks rather than bursting to catch up.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use nodemgr_control::{ControlConfig, GroupManager};

/// Spawn the aggregation and reset loops on the current runtime.
///
/// The first tick of each loop fires immediately.
#[must_use]
pub fn spawn_background_tasks<M>(manager: &Arc<M>, config: &ControlConfig) -> Vec<JoinHandle<()>>
where
    M: GroupManager + 'static,
{
    vec![
        tokio::spawn(aggregation_loop(
            Arc::clone(manager),
            config.aggregation_interval(),
        )),
        tokio::spawn(reset_loop(Arc::clone(manager), config.reset_interval())),
    ]
}

async fn aggregation_loop<M: GroupManager>(manager: Arc<M>, period: Duration) {
    tracing::info!(interval_secs = period.as_secs(), "Aggregation task started");
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        ticker.tick().await;
        if let Err(e) = manager.refresh_trans_daily().await {
            tracing::error!(error = %e, "Periodic aggregation failed");
        }
    }
}

async fn reset_loop<M: GroupManager>(manager: Arc<M>, period: Duration) {
    tracing::info!(interval_secs = period.as_secs(), "Reset task started");
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        ticker.tick().await;
        if !manager.async_reset_group_list() {
            tracing::debug!("Periodic reset not queued");
        }
    }
}

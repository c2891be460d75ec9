use std::sync::Arc;
use std::time::Duration;

use tokio::time::MissedTickBehavior;

use crate::ws::manager::WsManager;

/// Spawn the task that pings every socket each `every` and prunes
/// connections whose socket task has exited without deregistering.
///
/// The returned `JoinHandle` is aborted during shutdown.
pub fn start_heartbeat(ws_manager: Arc<WsManager>, every: Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately.
        interval.tick().await;

        loop {
            interval.tick().await;
            let pruned = ws_manager.ping_all().await;
            if pruned > 0 {
                tracing::info!(pruned, "Dropped closed WebSocket connections");
            }
            let connections = ws_manager.connection_count().await;
            tracing::debug!(
                connections,
                "WebSocket heartbeat",
            );
        }
    })
}

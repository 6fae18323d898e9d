use std::sync::Arc;
use std::time::Duration;

use crate::connections::ConnectionManager;

/// Spawn a background task that sends periodic Ping frames to all connected
/// clients.
///
/// The returned `JoinHandle` is aborted by [`HostHandle::shutdown`]
/// (crate::server::HostHandle).
pub fn start_heartbeat(
    connections: Arc<ConnectionManager>,
    interval: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);

        loop {
            ticker.tick().await;
            let count = connections.connection_count().await;
            tracing::debug!(count, "Heartbeat ping");
            connections.ping_all().await;
        }
    })
}

//! Host-side beacon sender.

use std::net::SocketAddr;

use tokio::net::UdpSocket;
use tokio_util::sync::CancellationToken;

use crate::{Announcement, DiscoveryConfig};

/// Spawn a background task that broadcasts `announcement` on an interval
/// until `cancel` fires.
///
/// Every failure is non-fatal: a bind error ends the task (hosting
/// continues without discovery), a send error is logged and the next tick
/// tries again.
pub fn start_advertiser(
    announcement: Announcement,
    config: DiscoveryConfig,
    cancel: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let target = config
            .target
            .unwrap_or_else(|| SocketAddr::from(([255, 255, 255, 255], config.port)));

        let socket = match UdpSocket::bind(("0.0.0.0", 0)).await {
            Ok(socket) => socket,
            Err(e) => {
                tracing::warn!(error = %e, "Discovery advertiser could not bind; hosting continues without beacons");
                return;
            }
        };
        if let Err(e) = socket.set_broadcast(true) {
            tracing::warn!(error = %e, "Discovery advertiser could not enable broadcast; hosting continues without beacons");
            return;
        }

        let payload =
            serde_json::to_vec(&announcement).expect("Announcement is always serialisable");

        tracing::debug!(
            hostname = %announcement.hostname,
            port = announcement.port,
            target = %target,
            "Discovery advertiser started",
        );

        let mut interval = tokio::time::interval(config.advertise_interval);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::debug!("Discovery advertiser stopped");
                    break;
                }
                _ = interval.tick() => {
                    if let Err(e) = socket.send_to(&payload, target).await {
                        tracing::debug!(error = %e, "Discovery beacon send failed");
                    }
                }
            }
        }
    })
}

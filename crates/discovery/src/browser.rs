//! Client-side beacon listener.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::net::UdpSocket;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

use crate::{Announcement, DiscoveryConfig};

/// A server learned from discovery beacons.
///
/// Ephemeral and non-authoritative: entries exist only while beacons keep
/// arriving and are never persisted as truth.
#[derive(Debug, Clone, PartialEq)]
pub struct DiscoveredServer {
    pub hostname: String,
    pub ip: String,
    pub port: u16,
    pub last_seen: chrono::DateTime<chrono::Utc>,
}

type ServerMap = HashMap<(String, u16), DiscoveredServer>;

/// Maintains the time-windowed set of discovered servers.
///
/// If the discovery port cannot be bound (already in use, permission
/// denied) the browser is inert: [`servers`](ServerBrowser::servers)
/// returns an empty list forever and manual IP-based connection is
/// unaffected.
pub struct ServerBrowser {
    servers: Arc<RwLock<ServerMap>>,
    stale_after: chrono::Duration,
    local_port: Option<u16>,
    cancel: CancellationToken,
}

impl ServerBrowser {
    /// Bind the discovery port and start listening for beacons.
    pub async fn start(config: DiscoveryConfig) -> Self {
        let servers: Arc<RwLock<ServerMap>> = Arc::new(RwLock::new(HashMap::new()));
        let stale_after = chrono::Duration::from_std(config.stale_after)
            .unwrap_or_else(|_| chrono::Duration::seconds(30));
        let cancel = CancellationToken::new();

        let socket = match UdpSocket::bind(("0.0.0.0", config.port)).await {
            Ok(socket) => socket,
            Err(e) => {
                tracing::warn!(
                    port = config.port,
                    error = %e,
                    "Discovery browser could not bind; no servers will be discovered",
                );
                return Self {
                    servers,
                    stale_after,
                    local_port: None,
                    cancel,
                };
            }
        };
        let local_port = socket.local_addr().ok().map(|addr| addr.port());

        let map = Arc::clone(&servers);
        let task_cancel = cancel.clone();
        let sweep_every = config.stale_after / 2;
        tokio::spawn(async move {
            let mut buf = [0u8; 1024];
            let mut sweep = tokio::time::interval(sweep_every.max(std::time::Duration::from_millis(50)));
            loop {
                tokio::select! {
                    _ = task_cancel.cancelled() => break,
                    _ = sweep.tick() => {
                        let cutoff = chrono::Utc::now() - stale_after;
                        map.write().await.retain(|_, s| s.last_seen > cutoff);
                    }
                    recv = socket.recv_from(&mut buf) => {
                        match recv {
                            Ok((len, src)) => {
                                handle_beacon(&map, &buf[..len], src.ip().to_string()).await;
                            }
                            Err(e) => {
                                tracing::debug!(error = %e, "Discovery receive error");
                            }
                        }
                    }
                }
            }
        });

        Self {
            servers,
            stale_after,
            local_port,
            cancel,
        }
    }

    /// The currently known, non-stale servers.
    pub async fn servers(&self) -> Vec<DiscoveredServer> {
        let cutoff = chrono::Utc::now() - self.stale_after;
        self.servers
            .read()
            .await
            .values()
            .filter(|s| s.last_seen > cutoff)
            .cloned()
            .collect()
    }

    /// The UDP port actually bound, or `None` when the browser is inert.
    pub fn local_port(&self) -> Option<u16> {
        self.local_port
    }

    /// Stop listening. Safe to call more than once.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }
}

impl Drop for ServerBrowser {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Parse one datagram and refresh the matching entry.
async fn handle_beacon(map: &RwLock<ServerMap>, payload: &[u8], src_ip: String) {
    let announcement: Announcement = match serde_json::from_slice(payload) {
        Ok(a) => a,
        Err(e) => {
            tracing::debug!(error = %e, "Ignoring malformed discovery beacon");
            return;
        }
    };

    // Beacons may carry an empty ip when the host does not know its own
    // address; fall back to the datagram source.
    let ip = if announcement.ip.is_empty() {
        src_ip
    } else {
        announcement.ip.clone()
    };

    let server = DiscoveredServer {
        hostname: announcement.hostname,
        ip: ip.clone(),
        port: announcement.port,
        last_seen: chrono::Utc::now(),
    };
    map.write().await.insert((ip, announcement.port), server);
}

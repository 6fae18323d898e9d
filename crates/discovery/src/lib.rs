//! Best-effort LAN discovery of collaboration hosts.
//!
//! Hosts advertise themselves with small JSON beacons over UDP broadcast;
//! clients listen and keep a time-windowed set of discovered servers so
//! users are not required to type IP addresses. Discovery is advisory UI
//! convenience only: connecting still goes through the normal WebSocket
//! handshake, which is authoritative, and every failure here degrades to
//! "no discovered servers" rather than blocking manual connection.

pub mod advertiser;
pub mod browser;

use std::net::SocketAddr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

pub use advertiser::start_advertiser;
pub use browser::{DiscoveredServer, ServerBrowser};

/// Default UDP port for discovery beacons.
pub const DEFAULT_DISCOVERY_PORT: u16 = 47800;

/// Default interval between beacon sends.
pub const DEFAULT_ADVERTISE_INTERVAL: Duration = Duration::from_secs(5);

/// Default window after which an unrefreshed server entry is evicted.
pub const DEFAULT_STALE_AFTER: Duration = Duration::from_secs(30);

/// One discovery beacon as sent on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Announcement {
    pub hostname: String,
    pub ip: String,
    pub port: u16,
}

/// Tuning knobs for both sides of discovery.
#[derive(Debug, Clone)]
pub struct DiscoveryConfig {
    /// UDP port beacons are sent to and listened on.
    pub port: u16,
    /// Override for the beacon destination. `None` means the limited
    /// broadcast address (`255.255.255.255:port`); tests point this at
    /// loopback.
    pub target: Option<SocketAddr>,
    pub advertise_interval: Duration,
    pub stale_after: Duration,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_DISCOVERY_PORT,
            target: None,
            advertise_interval: DEFAULT_ADVERTISE_INTERVAL,
            stale_after: DEFAULT_STALE_AFTER,
        }
    }
}

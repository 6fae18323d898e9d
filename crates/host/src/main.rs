//! `fieldlock-host` — standalone collaboration host daemon.
//!
//! Runs a field-locking host outside the desktop application, e.g. on a
//! shared office machine so editors can collaborate without one of them
//! hosting. Advertises itself on the LAN unless disabled.
//!
//! # Environment variables
//!
//! | Variable                   | Required | Default   | Description                        |
//! |----------------------------|----------|-----------|------------------------------------|
//! | `FIELDLOCK_BIND_IP`        | no       | `0.0.0.0` | Interface to bind                  |
//! | `FIELDLOCK_PORT`           | no       | `9400`    | WebSocket port                     |
//! | `FIELDLOCK_DISPLAY_NAME`   | no       | `Host`    | Name shown in presence lists       |
//! | `FIELDLOCK_HEARTBEAT_SECS` | no       | `30`      | Seconds between heartbeat pings    |
//! | `FIELDLOCK_ADVERTISE`      | no       | `true`    | Send LAN discovery beacons         |
//! | `FIELDLOCK_DISCOVERY_PORT` | no       | `47800`   | UDP port for discovery beacons     |

use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use fieldlock_events::EventBus;
use fieldlock_host::{HostConfig, HostServer};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "fieldlock=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = HostConfig::from_env();
    tracing::info!(
        bind_ip = %config.bind_ip,
        port = config.port,
        advertise = config.advertise,
        "Loaded host configuration",
    );

    let bus = Arc::new(EventBus::default());

    let handle = match HostServer::start(config, bus).await {
        Ok(handle) => handle,
        Err(e) => {
            tracing::error!(error = %e, "Could not start collaboration host");
            std::process::exit(1);
        }
    };

    tracing::info!(addr = %handle.local_addr(), "Host running; press Ctrl-C to stop");

    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }

    handle.shutdown().await;
}

//! Host lifecycle: bind, serve, shut down.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;

use fieldlock_core::protocol::StateSnapshot;
use fieldlock_core::types::{ClientId, SessionStatus};
use fieldlock_discovery::{start_advertiser, Announcement, DiscoveryConfig};
use fieldlock_events::EventBus;

use crate::authority::{Authority, HostCommand};
use crate::config::HostConfig;
use crate::connections::ConnectionManager;
use crate::heartbeat::start_heartbeat;
use crate::ws::{ws_handler, WsState};

/// Command inbox depth; backpressure on pathological clients.
const COMMAND_BUFFER: usize = 256;

/// Host-domain error type.
#[derive(Debug, thiserror::Error)]
pub enum HostError {
    /// The listener could not be set up — typically the port is already in
    /// use or binding the interface is not permitted. The message carries
    /// the underlying reason so the user can pick another interface/port.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },
}

/// Entry point for running a collaboration host.
pub struct HostServer;

impl HostServer {
    /// Bind the configured interface and start all host tasks: the axum
    /// WebSocket endpoint, the authority loop, the heartbeat, and (when
    /// enabled) the discovery advertiser.
    ///
    /// Nothing is persisted: when the returned handle shuts down, every
    /// lock and presence entry is discarded.
    pub async fn start(config: HostConfig, bus: Arc<EventBus>) -> Result<HostHandle, HostError> {
        let addr = format!("{}:{}", config.bind_ip, config.port);
        let listener = TcpListener::bind(&addr).await.map_err(|e| HostError::Bind {
            addr: addr.clone(),
            source: e,
        })?;
        let local_addr = listener.local_addr().map_err(|e| HostError::Bind {
            addr: addr.clone(),
            source: e,
        })?;

        let self_id: ClientId = uuid::Uuid::new_v4().to_string();
        let connections = Arc::new(ConnectionManager::new());
        let cancel = CancellationToken::new();

        let (command_tx, command_rx) = mpsc::channel(COMMAND_BUFFER);
        let (snapshot_tx, snapshot_rx) = watch::channel(StateSnapshot::default());
        let (status_tx, status_rx) = watch::channel(SessionStatus::Connected);

        let authority = Authority::new(
            Arc::clone(&connections),
            Arc::clone(&bus),
            snapshot_tx,
            &self_id,
            &config.display_name,
        );
        let authority_task = tokio::spawn(authority.run(command_rx, cancel.clone()));

        let heartbeat_task = start_heartbeat(
            Arc::clone(&connections),
            Duration::from_secs(config.heartbeat_interval_secs),
        );

        let app = Router::new()
            .route("/ws", get(ws_handler))
            .with_state(WsState {
                connections: Arc::clone(&connections),
                commands: command_tx.clone(),
            });

        let serve_cancel = cancel.clone();
        let serve_task = tokio::spawn(async move {
            let shutdown = async move { serve_cancel.cancelled().await };
            if let Err(e) = axum::serve(listener, app)
                .with_graceful_shutdown(shutdown)
                .await
            {
                tracing::error!(error = %e, "Host server error");
            }
        });

        if config.advertise {
            start_advertiser(
                Announcement {
                    hostname: config.display_name.clone(),
                    // Left empty: browsers fall back to the datagram
                    // source address, which is the reachable one.
                    ip: String::new(),
                    port: local_addr.port(),
                },
                DiscoveryConfig {
                    port: config.discovery_port,
                    ..Default::default()
                },
                cancel.clone(),
            );
        }

        tracing::info!(addr = %local_addr, self_id = %self_id, "Collaboration host started");

        Ok(HostHandle {
            local_addr,
            self_id,
            command_tx,
            snapshot_rx,
            status_tx,
            status_rx,
            cancel,
            heartbeat_task,
            authority_task,
            serve_task,
        })
    }
}

/// Handle to a running host instance.
///
/// Dropping the handle does not stop the host; call
/// [`shutdown`](HostHandle::shutdown).
pub struct HostHandle {
    local_addr: SocketAddr,
    self_id: ClientId,
    command_tx: mpsc::Sender<HostCommand>,
    snapshot_rx: watch::Receiver<StateSnapshot>,
    status_tx: watch::Sender<SessionStatus>,
    status_rx: watch::Receiver<SessionStatus>,
    cancel: CancellationToken,
    heartbeat_task: tokio::task::JoinHandle<()>,
    authority_task: tokio::task::JoinHandle<()>,
    serve_task: tokio::task::JoinHandle<()>,
}

impl HostHandle {
    /// The address actually bound (useful with port `0`).
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// The host's own client id (its presence entry).
    pub fn self_id(&self) -> &str {
        &self.self_id
    }

    /// Sender for the authority inbox; the host-role facade submits its
    /// own lock requests here.
    pub fn commands(&self) -> mpsc::Sender<HostCommand> {
        self.command_tx.clone()
    }

    /// Watch over the last applied state snapshot.
    pub fn snapshot(&self) -> watch::Receiver<StateSnapshot> {
        self.snapshot_rx.clone()
    }

    /// Watch over the host session status.
    pub fn status(&self) -> watch::Receiver<SessionStatus> {
        self.status_rx.clone()
    }

    /// Stop the host: notify all clients, stop accepting connections, and
    /// discard all lock and presence state.
    pub async fn shutdown(self) {
        // Drain through the authority first so connected clients get Close
        // frames before the listener goes away.
        let _ = self.command_tx.send(HostCommand::Shutdown).await;
        let _ = self.authority_task.await;

        self.cancel.cancel();
        self.heartbeat_task.abort();
        let _ = self.serve_task.await;

        self.status_tx.send_replace(SessionStatus::Disconnected);
        tracing::info!("Collaboration host stopped");
    }
}

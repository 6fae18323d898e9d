//! WebSocket client session: handshake and broadcast-driven replica.

use std::sync::Arc;
use std::time::Duration;

use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;

use fieldlock_core::protocol::{ClientMessage, ServerMessage, StateSnapshot};
use fieldlock_core::types::{ClientId, SessionRole, SessionStatus};
use fieldlock_events::{CollabEvent, EventBus};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Default bound on the connection attempt, handshake included.
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Parameters for one connection attempt.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// WebSocket endpoint, e.g. `ws://192.168.1.20:9400/ws`.
    pub url: String,
    /// Name shown to other participants.
    pub display_name: String,
    pub connect_timeout: Duration,
}

impl ClientConfig {
    pub fn new(url: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            display_name: display_name.into(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }

    /// Build the endpoint URL from a host address.
    pub fn for_addr(ip: &str, port: u16, display_name: impl Into<String>) -> Self {
        Self::new(format!("ws://{ip}:{port}/ws"), display_name)
    }
}

/// Connection-domain error type. All variants are user-actionable; none
/// are retried silently.
#[derive(Debug, thiserror::Error)]
pub enum ConnectError {
    #[error("connection attempt timed out")]
    Timeout,

    #[error("connection failed: {0}")]
    Transport(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("host rejected the connection: {0}")]
    Rejected(String),

    #[error("handshake failed: {0}")]
    Handshake(String),
}

/// Handle to a live client session.
pub struct ClientHandle {
    client_id: ClientId,
    requests: mpsc::UnboundedSender<ClientMessage>,
    snapshot_rx: watch::Receiver<StateSnapshot>,
    status_rx: watch::Receiver<SessionStatus>,
    error_rx: watch::Receiver<Option<String>>,
    cancel: CancellationToken,
    task: tokio::task::JoinHandle<()>,
}

impl ClientHandle {
    /// The id the host assigned to this process.
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Sender for lock requests; frames are pushed to the host as-is.
    pub fn requests(&self) -> mpsc::UnboundedSender<ClientMessage> {
        self.requests.clone()
    }

    /// Watch over the replica of the authoritative state. Stale by at most
    /// one broadcast round trip.
    pub fn snapshot(&self) -> watch::Receiver<StateSnapshot> {
        self.snapshot_rx.clone()
    }

    /// Watch over the session status. Flips to `Error` on any transport
    /// drop; reconnection is an explicit caller action.
    pub fn status(&self) -> watch::Receiver<SessionStatus> {
        self.status_rx.clone()
    }

    /// The human-readable reason the session failed, once the status is
    /// `Error`. `None` while the session is healthy.
    pub fn last_error(&self) -> Option<String> {
        self.error_rx.borrow().clone()
    }

    /// Close the session deliberately (status ends `Disconnected`, not
    /// `Error`). The host sweeps this client's locks on its side.
    pub async fn close(self) {
        self.cancel.cancel();
        let _ = self.task.await;
    }
}

/// Connect to a host and complete the handshake.
///
/// On success the returned handle's snapshot already contains the lock
/// table and presence list the host sent in `welcome`, so the caller
/// starts consistent.
pub async fn connect(config: ClientConfig, bus: Arc<EventBus>) -> Result<ClientHandle, ConnectError> {
    tracing::info!(url = %config.url, "Connecting to collaboration host");

    let (ws_stream, _response) =
        tokio::time::timeout(config.connect_timeout, connect_async(&config.url))
            .await
            .map_err(|_| ConnectError::Timeout)??;

    let (mut sink, mut stream) = ws_stream.split();

    let hello = serde_json::to_string(&ClientMessage::Hello {
        display_name: config.display_name.clone(),
    })
    .expect("ClientMessage is always serialisable");
    sink.send(Message::Text(hello)).await?;

    let reply = tokio::time::timeout(config.connect_timeout, await_handshake_reply(&mut stream))
        .await
        .map_err(|_| ConnectError::Timeout)??;

    let (client_id, snapshot) = match reply {
        ServerMessage::Welcome {
            client_id,
            locks,
            presence,
        } => (client_id, StateSnapshot { locks, presence }),
        ServerMessage::Rejected { reason } => return Err(ConnectError::Rejected(reason)),
        other => {
            return Err(ConnectError::Handshake(format!(
                "unexpected handshake reply: {other:?}"
            )))
        }
    };

    tracing::info!(client_id = %client_id, "Handshake complete");

    let (request_tx, request_rx) = mpsc::unbounded_channel();
    let (snapshot_tx, snapshot_rx) = watch::channel(snapshot.clone());
    let (status_tx, status_rx) = watch::channel(SessionStatus::Connected);
    let (error_tx, error_rx) = watch::channel(None);
    let cancel = CancellationToken::new();

    bus.publish(CollabEvent::State(snapshot));

    let task = tokio::spawn(run_session(
        sink,
        stream,
        request_rx,
        snapshot_tx,
        status_tx,
        error_tx,
        bus,
        cancel.clone(),
    ));

    Ok(ClientHandle {
        client_id,
        requests: request_tx,
        snapshot_rx,
        status_rx,
        error_rx,
        cancel,
        task,
    })
}

/// Read frames until the handshake reply arrives.
///
/// The host registers a connection before its join is adjudicated, so a
/// broadcast triggered by another participant's command can land ahead of
/// our `welcome`; such `state` frames are skipped (the welcome carries the
/// full state anyway), never treated as a handshake failure.
async fn await_handshake_reply(
    stream: &mut SplitStream<WsStream>,
) -> Result<ServerMessage, ConnectError> {
    loop {
        match next_server_message(stream).await? {
            ServerMessage::State { .. } => continue,
            other => return Ok(other),
        }
    }
}

/// Read frames until a parseable server message arrives.
async fn next_server_message(stream: &mut SplitStream<WsStream>) -> Result<ServerMessage, ConnectError> {
    while let Some(frame) = stream.next().await {
        match frame? {
            Message::Text(text) => {
                return serde_json::from_str(&text)
                    .map_err(|e| ConnectError::Handshake(e.to_string()))
            }
            Message::Ping(_) | Message::Pong(_) => continue,
            Message::Close(_) => {
                return Err(ConnectError::Handshake(
                    "host closed the connection during handshake".into(),
                ))
            }
            _ => continue,
        }
    }
    Err(ConnectError::Handshake(
        "connection ended during handshake".into(),
    ))
}

/// Drive the session: push outbound requests, apply inbound broadcasts in
/// receipt order, and surface the terminal status.
async fn run_session(
    mut sink: SplitSink<WsStream, Message>,
    mut stream: SplitStream<WsStream>,
    mut requests: mpsc::UnboundedReceiver<ClientMessage>,
    snapshot_tx: watch::Sender<StateSnapshot>,
    status_tx: watch::Sender<SessionStatus>,
    error_tx: watch::Sender<Option<String>>,
    bus: Arc<EventBus>,
    cancel: CancellationToken,
) {
    let fail = |message: String| {
        error_tx.send_replace(Some(message.clone()));
        status_tx.send_replace(SessionStatus::Error);
        bus.publish(CollabEvent::Status {
            status: SessionStatus::Error,
            role: SessionRole::Client,
            message: Some(message),
        });
    };

    let mut requests_open = true;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                let _ = sink.send(Message::Close(None)).await;
                status_tx.send_replace(SessionStatus::Disconnected);
                bus.publish(CollabEvent::Status {
                    status: SessionStatus::Disconnected,
                    role: SessionRole::Client,
                    message: None,
                });
                tracing::info!("Client session closed");
                return;
            }
            req = requests.recv(), if requests_open => {
                let Some(msg) = req else {
                    // Every request sender is gone; keep applying
                    // broadcasts but stop polling the closed channel.
                    requests_open = false;
                    continue;
                };
                let json = serde_json::to_string(&msg)
                    .expect("ClientMessage is always serialisable");
                if let Err(e) = sink.send(Message::Text(json)).await {
                    tracing::warn!(error = %e, "Failed to send request to host");
                    fail(format!("connection to host lost: {e}"));
                    return;
                }
            }
            frame = stream.next() => {
                match frame {
                    Some(Ok(Message::Text(text))) => {
                        handle_broadcast(&text, &snapshot_tx, &bus);
                    }
                    Some(Ok(Message::Ping(_) | Message::Pong(_))) => {
                        // Handled automatically by tungstenite.
                    }
                    Some(Ok(Message::Close(frame))) => {
                        tracing::info!(?frame, "Host closed the connection");
                        fail("host closed the connection".into());
                        return;
                    }
                    Some(Ok(_)) => {
                        // Binary / Frame — ignore.
                    }
                    Some(Err(e)) => {
                        tracing::warn!(error = %e, "WebSocket receive error");
                        fail(format!("connection to host lost: {e}"));
                        return;
                    }
                    None => {
                        tracing::info!("WebSocket stream exhausted");
                        fail("connection to host lost".into());
                        return;
                    }
                }
            }
        }
    }
}

/// Apply one broadcast frame to the local replica.
fn handle_broadcast(
    text: &str,
    snapshot_tx: &watch::Sender<StateSnapshot>,
    bus: &Arc<EventBus>,
) {
    match serde_json::from_str::<ServerMessage>(text) {
        Ok(ServerMessage::State { locks, presence }) => {
            let snapshot = StateSnapshot { locks, presence };
            snapshot_tx.send_replace(snapshot.clone());
            bus.publish(CollabEvent::State(snapshot));
        }
        Ok(other) => {
            tracing::warn!(?other, "Unexpected mid-session frame ignored");
        }
        Err(e) => {
            tracing::warn!(error = %e, raw = %text, "Malformed broadcast ignored");
        }
    }
}

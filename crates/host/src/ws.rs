//! WebSocket endpoint for client connections.
//!
//! After the upgrade, a connection must open with a `hello` frame carrying
//! its display name. The handler then assigns a client id, registers the
//! connection, and forwards every subsequent frame to the authority loop
//! as a command. Any disconnect path — clean close, transport error,
//! stream end — funnels into the same `Leave` command, so the authority
//! sweeps the client's locks exactly once.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;

use fieldlock_core::protocol::ClientMessage;

use crate::authority::HostCommand;
use crate::connections::ConnectionManager;

/// How long a fresh connection gets to send its `hello` frame.
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// State shared with the WebSocket handlers.
#[derive(Clone)]
pub struct WsState {
    pub connections: Arc<ConnectionManager>,
    pub commands: mpsc::Sender<HostCommand>,
}

/// HTTP handler that upgrades the connection to WebSocket.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<WsState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Manage a single client connection after upgrade.
async fn handle_socket(socket: WebSocket, state: WsState) {
    let (mut sink, mut stream) = socket.split();

    // Handshake: the first frame must be `hello` within the timeout.
    let display_name = match await_hello(&mut stream).await {
        Some(name) => name,
        None => {
            let _ = sink.send(Message::Close(None)).await;
            return;
        }
    };

    // The host assigns the client id; the client learns it from `welcome`.
    let client_id = uuid::Uuid::new_v4().to_string();
    tracing::info!(client_id = %client_id, name = %display_name, "WebSocket connected");

    // Register and get the receiver for outbound messages.
    let mut rx = state.connections.add(client_id.clone()).await;

    // Sender task: forward channel messages to the WebSocket sink.
    let sender_client_id = client_id.clone();
    let send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if sink.send(msg).await.is_err() {
                tracing::debug!(client_id = %sender_client_id, "WebSocket sink closed");
                break;
            }
        }
    });

    if state
        .commands
        .send(HostCommand::Join {
            client_id: client_id.clone(),
            display_name,
        })
        .await
        .is_err()
    {
        // Authority loop already gone (host shutting down).
        state.connections.remove(&client_id).await;
        send_task.abort();
        return;
    }

    // Receiver loop: translate inbound frames into commands.
    while let Some(result) = stream.next().await {
        match result {
            Ok(Message::Text(text)) => {
                dispatch_frame(&state.commands, &client_id, &text).await;
            }
            Ok(Message::Close(_)) => break,
            Ok(Message::Pong(_)) => {
                tracing::trace!(client_id = %client_id, "Pong received");
            }
            Ok(_) => {
                // Binary / Ping — ignore.
            }
            Err(e) => {
                tracing::debug!(client_id = %client_id, error = %e, "WebSocket receive error");
                break;
            }
        }
    }

    // Clean up: one Leave regardless of how the connection ended.
    let _ = state
        .commands
        .send(HostCommand::Leave {
            client_id: client_id.clone(),
        })
        .await;
    state.connections.remove(&client_id).await;
    send_task.abort();
    tracing::info!(client_id = %client_id, "WebSocket disconnected");
}

/// Wait for the opening `hello` frame; `None` means the handshake failed.
async fn await_hello(
    stream: &mut (impl StreamExt<Item = Result<Message, axum::Error>> + Unpin),
) -> Option<String> {
    let frame = match tokio::time::timeout(HANDSHAKE_TIMEOUT, stream.next()).await {
        Ok(Some(Ok(Message::Text(text)))) => text,
        Ok(_) => {
            tracing::debug!("Connection closed before handshake");
            return None;
        }
        Err(_) => {
            tracing::debug!("Handshake timed out");
            return None;
        }
    };

    match serde_json::from_str::<ClientMessage>(&frame) {
        Ok(ClientMessage::Hello { display_name }) => Some(display_name),
        Ok(other) => {
            tracing::warn!(?other, "First frame was not hello");
            None
        }
        Err(e) => {
            tracing::warn!(error = %e, "Malformed handshake frame");
            None
        }
    }
}

/// Parse one inbound frame and forward it to the authority loop.
///
/// The client id baked into the frame is ignored in favor of the id this
/// connection was assigned, so a client cannot speak for another.
async fn dispatch_frame(commands: &mpsc::Sender<HostCommand>, client_id: &str, text: &str) {
    let command = match serde_json::from_str::<ClientMessage>(text) {
        Ok(ClientMessage::Acquire { field_id, .. }) => HostCommand::Acquire {
            client_id: client_id.to_string(),
            field_id,
        },
        Ok(ClientMessage::Release { field_id, .. }) => HostCommand::Release {
            client_id: client_id.to_string(),
            field_id,
        },
        Ok(ClientMessage::Hello { .. }) => {
            tracing::warn!(client_id = %client_id, "Duplicate hello ignored");
            return;
        }
        Err(e) => {
            tracing::warn!(client_id = %client_id, error = %e, raw = %text, "Unknown or malformed frame");
            return;
        }
    };

    if commands.send(command).await.is_err() {
        tracing::debug!(client_id = %client_id, "Authority loop gone; dropping frame");
    }
}

//! The authority loop: the single serialization point of a collaboration
//! instance.
//!
//! One task exclusively owns the [`LockRegistry`] and [`PresenceTracker`]
//! and consumes [`HostCommand`]s from a single inbox, one at a time. Remote
//! clients never mutate host state directly — every mutation arrives here
//! as a command, is adjudicated, and the resulting state is broadcast to
//! every connection in application order. That makes the total order of
//! lock mutations equal to the order this loop applies them, with no
//! internal mutex.

use std::sync::Arc;

use axum::extract::ws::Message;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;

use fieldlock_core::protocol::{ServerMessage, StateSnapshot};
use fieldlock_core::registry::{AcquireResult, ReleaseResult};
use fieldlock_core::types::{ClientId, FieldId};
use fieldlock_core::{LockRegistry, PresenceTracker};
use fieldlock_events::{CollabEvent, EventBus};

use crate::connections::ConnectionManager;

/// A unit of work for the authority loop.
#[derive(Debug)]
pub enum HostCommand {
    /// A connection completed its handshake and wants onto the roster.
    Join {
        client_id: ClientId,
        display_name: String,
    },
    /// Lock acquisition request (remote client or the host's own facade).
    Acquire {
        client_id: ClientId,
        field_id: FieldId,
    },
    /// Lock release request.
    Release {
        client_id: ClientId,
        field_id: FieldId,
    },
    /// Host-local administrative force release. Deliberately has no wire
    /// representation; only the host process can issue it.
    ForceRelease { field_id: FieldId },
    /// A connection went away (clean close or transport drop — treated
    /// identically).
    Leave { client_id: ClientId },
    /// Tear the instance down: close every connection and exit the loop.
    Shutdown,
}

/// Owns the authoritative state and processes commands serially.
pub struct Authority {
    registry: LockRegistry,
    presence: PresenceTracker,
    connections: Arc<ConnectionManager>,
    bus: Arc<EventBus>,
    snapshot_tx: watch::Sender<StateSnapshot>,
}

impl Authority {
    /// Build an authority with the host's own presence entry already on
    /// the roster.
    pub fn new(
        connections: Arc<ConnectionManager>,
        bus: Arc<EventBus>,
        snapshot_tx: watch::Sender<StateSnapshot>,
        host_id: &str,
        host_name: &str,
    ) -> Self {
        let mut presence = PresenceTracker::new();
        presence
            .add_client(host_id, host_name, true)
            .expect("fresh roster cannot contain the host id");

        Self {
            registry: LockRegistry::new(),
            presence,
            connections,
            bus,
            snapshot_tx,
        }
    }

    /// Run until shutdown. Consumes commands one at a time; the inbox is
    /// the only way in, so processing order is the authoritative order.
    pub async fn run(mut self, mut inbox: mpsc::Receiver<HostCommand>, cancel: CancellationToken) {
        // Seed observers with the initial state (host presence, no locks).
        self.publish_state().await;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                cmd = inbox.recv() => match cmd {
                    Some(cmd) => {
                        if !self.handle(cmd).await {
                            break;
                        }
                    }
                    None => break,
                },
            }
        }

        self.connections.shutdown_all().await;
        tracing::info!("Authority loop stopped; all lock state discarded");
    }

    /// Apply one command. Returns `false` when the loop should exit.
    async fn handle(&mut self, cmd: HostCommand) -> bool {
        match cmd {
            HostCommand::Join {
                client_id,
                display_name,
            } => self.handle_join(client_id, display_name).await,
            HostCommand::Acquire {
                client_id,
                field_id,
            } => self.handle_acquire(client_id, field_id).await,
            HostCommand::Release {
                client_id,
                field_id,
            } => self.handle_release(client_id, field_id).await,
            HostCommand::ForceRelease { field_id } => {
                match self.registry.force_release(&field_id) {
                    ReleaseResult::Released => {
                        tracing::info!(field_id = %field_id, "Force-released lock");
                        self.publish_state().await;
                    }
                    _ => {
                        tracing::debug!(field_id = %field_id, "Force release on unlocked field");
                    }
                }
            }
            HostCommand::Leave { client_id } => self.handle_leave(client_id).await,
            HostCommand::Shutdown => return false,
        }
        true
    }

    async fn handle_join(&mut self, client_id: ClientId, display_name: String) {
        match self.presence.add_client(&client_id, &display_name, false) {
            Ok(()) => {
                tracing::info!(client_id = %client_id, name = %display_name, "Client joined");
                let welcome = ServerMessage::Welcome {
                    client_id: client_id.clone(),
                    locks: self.registry.snapshot(),
                    presence: self.presence.list(),
                };
                self.send_to(&client_id, &welcome).await;
                self.publish_state().await;
            }
            Err(e) => {
                tracing::warn!(client_id = %client_id, error = %e, "Rejecting connection");
                let rejected = ServerMessage::Rejected {
                    reason: e.to_string(),
                };
                self.send_to(&client_id, &rejected).await;
                self.connections.remove(&client_id).await;
            }
        }
    }

    async fn handle_acquire(&mut self, client_id: ClientId, field_id: FieldId) {
        // Requests from clients that never made it onto the roster (e.g. a
        // rejected connection still draining) are dropped.
        if !self.presence.contains(&client_id) {
            tracing::debug!(client_id = %client_id, "Acquire from unknown client ignored");
            return;
        }

        let name = self
            .presence
            .list()
            .into_iter()
            .find(|c| c.id == client_id)
            .map(|c| c.name)
            .unwrap_or_default();

        match self.registry.acquire(&field_id, &client_id, &name) {
            AcquireResult::Granted => {
                tracing::debug!(field_id = %field_id, client_id = %client_id, "Lock granted");
                self.publish_state().await;
            }
            AcquireResult::Denied { holder_name } => {
                // Not an error and not a mutation: nothing to broadcast.
                // Refresh only the requester so its replica corrects itself.
                tracing::debug!(
                    field_id = %field_id,
                    client_id = %client_id,
                    holder = %holder_name,
                    "Lock denied",
                );
                let state = self.state_message();
                self.send_to(&client_id, &state).await;
            }
        }
    }

    async fn handle_release(&mut self, client_id: ClientId, field_id: FieldId) {
        match self.registry.release(&field_id, &client_id) {
            ReleaseResult::Released => {
                tracing::debug!(field_id = %field_id, client_id = %client_id, "Lock released");
                self.publish_state().await;
            }
            _ => {
                // Wrong holder or not locked: silent no-op so teardown
                // races cannot clear someone else's lock.
                tracing::trace!(field_id = %field_id, client_id = %client_id, "Release ignored");
            }
        }
    }

    async fn handle_leave(&mut self, client_id: ClientId) {
        self.connections.remove(&client_id).await;
        if self.presence.remove_client(&client_id).is_some() {
            let swept = self.registry.release_all_for(&client_id);
            tracing::info!(client_id = %client_id, swept, "Client left");
            self.publish_state().await;
        }
    }

    fn state_message(&self) -> ServerMessage {
        ServerMessage::State {
            locks: self.registry.snapshot(),
            presence: self.presence.list(),
        }
    }

    /// Broadcast the current state to every connection (origin included)
    /// and to in-process observers.
    async fn publish_state(&self) {
        let snapshot = StateSnapshot {
            locks: self.registry.snapshot(),
            presence: self.presence.list(),
        };

        let frame = serde_json::to_string(&self.state_message())
            .expect("ServerMessage is always serialisable");
        self.connections.broadcast(Message::Text(frame.into())).await;

        let _ = self.snapshot_tx.send(snapshot.clone());
        self.bus.publish(CollabEvent::State(snapshot));
    }

    async fn send_to(&self, client_id: &str, message: &ServerMessage) {
        let frame = serde_json::to_string(message).expect("ServerMessage is always serialisable");
        if !self
            .connections
            .send_to(client_id, Message::Text(frame.into()))
            .await
        {
            tracing::debug!(client_id = %client_id, "Dropping message for vanished connection");
        }
    }
}

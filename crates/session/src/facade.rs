//! The object handed to UI code.
//!
//! A facade hides the host-vs-client distinction: on the host it feeds the
//! authority inbox directly, on a client it pushes request frames over the
//! socket. Either way, lock calls are fire-and-forget — the UI observes
//! outcomes through the snapshot watch, which always reflects the next
//! authoritative broadcast.

use tokio::sync::{mpsc, watch};

use fieldlock_client::session::ClientHandle;
use fieldlock_core::protocol::{ClientMessage, StateSnapshot};
use fieldlock_core::registry::Lock;
use fieldlock_core::types::{ClientId, SessionRole, SessionStatus};
use fieldlock_core::Client;
use fieldlock_host::{HostCommand, HostHandle};

#[derive(Clone)]
enum Transport {
    Host(mpsc::Sender<HostCommand>),
    Client(mpsc::UnboundedSender<ClientMessage>),
}

/// Role-agnostic handle for field-editing widgets.
#[derive(Clone)]
pub struct LockFacade {
    self_id: ClientId,
    role: SessionRole,
    transport: Transport,
    snapshot: watch::Receiver<StateSnapshot>,
    status: watch::Receiver<SessionStatus>,
}

impl LockFacade {
    pub(crate) fn for_host(handle: &HostHandle) -> Self {
        Self {
            self_id: handle.self_id().to_string(),
            role: SessionRole::Host,
            transport: Transport::Host(handle.commands()),
            snapshot: handle.snapshot(),
            status: handle.status(),
        }
    }

    pub(crate) fn for_client(handle: &ClientHandle) -> Self {
        Self {
            self_id: handle.client_id().to_string(),
            role: SessionRole::Client,
            transport: Transport::Client(handle.requests()),
            snapshot: handle.snapshot(),
            status: handle.status(),
        }
    }

    /// Ask the host for the lock on `field_id`.
    ///
    /// The grant (or denial) arrives with the next snapshot update; there
    /// is no direct return value by design.
    pub fn request_lock(&self, field_id: &str) {
        match &self.transport {
            Transport::Host(commands) => {
                if let Err(e) = commands.try_send(HostCommand::Acquire {
                    client_id: self.self_id.clone(),
                    field_id: field_id.to_string(),
                }) {
                    tracing::debug!(error = %e, field_id, "Dropping lock request");
                }
            }
            Transport::Client(requests) => {
                let _ = requests.send(ClientMessage::Acquire {
                    field_id: field_id.to_string(),
                    client_id: self.self_id.clone(),
                });
            }
        }
    }

    /// Give up the lock on `field_id`. Always safe to call: releasing a
    /// lock this process does not hold is a no-op on the host.
    pub fn release_lock(&self, field_id: &str) {
        match &self.transport {
            Transport::Host(commands) => {
                if let Err(e) = commands.try_send(HostCommand::Release {
                    client_id: self.self_id.clone(),
                    field_id: field_id.to_string(),
                }) {
                    tracing::debug!(error = %e, field_id, "Dropping lock release");
                }
            }
            Transport::Client(requests) => {
                let _ = requests.send(ClientMessage::Release {
                    field_id: field_id.to_string(),
                    client_id: self.self_id.clone(),
                });
            }
        }
    }

    /// Administratively clear a lock regardless of holder.
    ///
    /// Host-only. On a client facade this is a usage error: loud in
    /// development, a logged no-op in production.
    pub fn force_release_lock(&self, field_id: &str) {
        match &self.transport {
            Transport::Host(commands) => {
                if let Err(e) = commands.try_send(HostCommand::ForceRelease {
                    field_id: field_id.to_string(),
                }) {
                    tracing::debug!(error = %e, field_id, "Dropping force release");
                }
            }
            Transport::Client(_) => {
                debug_assert!(false, "force_release_lock called on a client-role facade");
                tracing::warn!(field_id, "force_release_lock ignored: not the host");
            }
        }
    }

    /// The last received lock table.
    pub fn active_locks(&self) -> Vec<Lock> {
        self.snapshot.borrow().locks.clone()
    }

    /// The last received presence roster.
    pub fn presence(&self) -> Vec<Client> {
        self.snapshot.borrow().presence.clone()
    }

    /// This process's own client id; "is this my lock" is a comparison
    /// against this value, never inferred.
    pub fn client_id(&self) -> &str {
        &self.self_id
    }

    pub fn role(&self) -> SessionRole {
        self.role
    }

    pub fn status(&self) -> SessionStatus {
        *self.status.borrow()
    }

    /// Whether this process currently holds the lock on `field_id`.
    pub fn is_held_by_self(&self, field_id: &str) -> bool {
        self.snapshot.borrow().held_by(field_id, &self.self_id)
    }

    /// Watch handle for UI layers that subscribe to state updates.
    pub fn snapshot_watch(&self) -> watch::Receiver<StateSnapshot> {
        self.snapshot.clone()
    }

    /// Watch handle over the session status.
    pub fn status_watch(&self) -> watch::Receiver<SessionStatus> {
        self.status.clone()
    }

    /// Clone of the current snapshot (locks + presence together).
    pub fn snapshot(&self) -> StateSnapshot {
        self.snapshot.borrow().clone()
    }
}

//! The process-wide collaboration state machine.
//!
//! Exactly one `CollabSession` exists per running application instance. It
//! owns whichever role handle is live and is the only place that starts or
//! stops hosting and connecting. Status transitions are published on the
//! event bus so the UI can render banners without polling.

use std::net::SocketAddr;
use std::sync::Arc;

use fieldlock_client::session::{connect, ClientConfig, ClientHandle, ConnectError};
use fieldlock_core::types::{ClientId, SessionRole, SessionStatus};
use fieldlock_events::{CollabEvent, EventBus};
use fieldlock_host::{HostConfig, HostError, HostHandle, HostServer};

use crate::facade::LockFacade;
use crate::profiles::ProfileStore;

/// Session-domain error type.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// `start_as_host`/`connect_as_client` called while not disconnected.
    /// A benign usage race in production (e.g. a double click), loud in
    /// development.
    #[error("session is not disconnected")]
    NotDisconnected,

    #[error(transparent)]
    Host(#[from] HostError),

    #[error(transparent)]
    Connect(#[from] ConnectError),
}

/// Snapshot of the state machine for rendering.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionState {
    pub role: SessionRole,
    pub status: SessionStatus,
    pub self_id: Option<ClientId>,
    pub error_message: Option<String>,
}

enum Link {
    Idle,
    Host(HostHandle),
    Client(ClientHandle),
}

/// The one collaboration session of this process.
pub struct CollabSession {
    role: SessionRole,
    status: SessionStatus,
    self_id: Option<ClientId>,
    error_message: Option<String>,
    link: Link,
    bus: Arc<EventBus>,
    profiles: Option<ProfileStore>,
}

impl CollabSession {
    pub fn new(bus: Arc<EventBus>) -> Self {
        Self {
            role: SessionRole::None,
            status: SessionStatus::Disconnected,
            self_id: None,
            error_message: None,
            link: Link::Idle,
            bus,
            profiles: None,
        }
    }

    /// Like [`new`](Self::new), but records successful connections in the
    /// given profile store.
    pub fn with_profiles(bus: Arc<EventBus>, profiles: ProfileStore) -> Self {
        Self {
            profiles: Some(profiles),
            ..Self::new(bus)
        }
    }

    /// Begin hosting a collaboration instance on this machine.
    pub async fn start_as_host(&mut self, config: HostConfig) -> Result<(), SessionError> {
        self.guard_disconnected()?;

        self.role = SessionRole::Host;
        self.set_status(SessionStatus::Connecting, None);

        match HostServer::start(config, Arc::clone(&self.bus)).await {
            Ok(handle) => {
                self.self_id = Some(handle.self_id().to_string());
                self.link = Link::Host(handle);
                self.set_status(SessionStatus::Connected, None);
                Ok(())
            }
            Err(e) => {
                self.set_status(SessionStatus::Error, Some(e.to_string()));
                Err(e.into())
            }
        }
    }

    /// Connect to a remote host.
    pub async fn connect_as_client(
        &mut self,
        ip: &str,
        port: u16,
        display_name: &str,
    ) -> Result<(), SessionError> {
        self.guard_disconnected()?;

        self.role = SessionRole::Client;
        self.set_status(SessionStatus::Connecting, None);

        let config = ClientConfig::for_addr(ip, port, display_name);
        match connect(config, Arc::clone(&self.bus)).await {
            Ok(handle) => {
                self.self_id = Some(handle.client_id().to_string());
                self.record_profile(ip, port, &handle);
                self.link = Link::Client(handle);
                self.set_status(SessionStatus::Connected, None);
                Ok(())
            }
            Err(e) => {
                self.set_status(SessionStatus::Error, Some(e.to_string()));
                Err(e.into())
            }
        }
    }

    /// Leave the collaboration instance.
    ///
    /// As host this tears the whole instance down: every client gets a
    /// Close frame and all lock state is discarded. As client the host
    /// sweeps this process's locks once the disconnect is observed.
    /// Calling this while already disconnected is a no-op.
    pub async fn disconnect(&mut self) {
        match std::mem::replace(&mut self.link, Link::Idle) {
            Link::Host(handle) => handle.shutdown().await,
            Link::Client(handle) => handle.close().await,
            Link::Idle => {
                tracing::debug!("Disconnect while already disconnected; ignoring");
            }
        }
        self.role = SessionRole::None;
        self.self_id = None;
        self.set_status(SessionStatus::Disconnected, None);
    }

    /// User acknowledged an error banner: return to `Disconnected` so a
    /// fresh attempt can start. Reconnecting remains an explicit action.
    pub fn acknowledge_error(&mut self) {
        if self.status() != SessionStatus::Error {
            return;
        }
        self.link = Link::Idle;
        self.role = SessionRole::None;
        self.self_id = None;
        self.set_status(SessionStatus::Disconnected, None);
    }

    /// Live status: while a link is up this reflects its watch (a client
    /// session may have flipped to `Error` on a transport drop).
    pub fn status(&self) -> SessionStatus {
        match &self.link {
            Link::Host(handle) => *handle.status().borrow(),
            Link::Client(handle) => *handle.status().borrow(),
            Link::Idle => self.status,
        }
    }

    pub fn role(&self) -> SessionRole {
        self.role
    }

    /// Current state machine snapshot.
    ///
    /// When a client link failed mid-session the failure reason lives on
    /// the link, not in this struct; surface it so the error banner has
    /// something to render.
    pub fn state(&self) -> SessionState {
        let status = self.status();
        let error_message = match &self.link {
            Link::Client(handle) if status == SessionStatus::Error => {
                handle.last_error().or_else(|| self.error_message.clone())
            }
            _ => self.error_message.clone(),
        };
        SessionState {
            role: self.role,
            status,
            self_id: self.self_id.clone(),
            error_message,
        }
    }

    /// The facade UI widgets talk to; `None` unless connected.
    pub fn facade(&self) -> Option<LockFacade> {
        if self.status() != SessionStatus::Connected {
            return None;
        }
        match &self.link {
            Link::Host(handle) => Some(LockFacade::for_host(handle)),
            Link::Client(handle) => Some(LockFacade::for_client(handle)),
            Link::Idle => None,
        }
    }

    /// The address a hosting session is bound to; `None` in other roles.
    pub fn host_addr(&self) -> Option<SocketAddr> {
        match &self.link {
            Link::Host(handle) => Some(handle.local_addr()),
            _ => None,
        }
    }

    /// Read access to the profile store, when one was attached.
    pub fn profiles(&self) -> Option<&ProfileStore> {
        self.profiles.as_ref()
    }

    /// Mutable access for explicit user actions (remove, favorite).
    pub fn profiles_mut(&mut self) -> Option<&mut ProfileStore> {
        self.profiles.as_mut()
    }

    fn guard_disconnected(&self) -> Result<(), SessionError> {
        if self.status() != SessionStatus::Disconnected {
            debug_assert!(false, "session must be disconnected first");
            return Err(SessionError::NotDisconnected);
        }
        Ok(())
    }

    /// Name the connected host from the welcome presence list and record
    /// the server in the profile store.
    fn record_profile(&mut self, ip: &str, port: u16, handle: &ClientHandle) {
        let Some(store) = self.profiles.as_mut() else {
            return;
        };
        let host_name = handle
            .snapshot()
            .borrow()
            .presence
            .iter()
            .find(|c| c.is_host)
            .map(|c| c.name.clone())
            .unwrap_or_default();
        if let Err(e) = store.record_connection(ip, port, &host_name) {
            tracing::warn!(error = %e, "Failed to persist connection profile");
        }
    }

    fn set_status(&mut self, status: SessionStatus, message: Option<String>) {
        self.status = status;
        self.error_message = message.clone();
        self.bus.publish(CollabEvent::Status {
            status,
            role: self.role,
            message,
        });
    }
}

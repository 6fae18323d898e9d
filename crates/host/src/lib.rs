//! Collaboration host: the authoritative side of the fieldlock protocol.
//!
//! Exposes the building blocks (config, connection manager, authority loop,
//! WebSocket endpoint) so integration tests and the binary entrypoint can
//! both access them. A host owns the lock registry and presence roster for
//! one collaboration instance; everything clients observe flows out of the
//! single-consumer authority loop in [`authority`].

pub mod authority;
pub mod config;
pub mod connections;
pub mod heartbeat;
pub mod server;
pub mod ws;

pub use authority::HostCommand;
pub use config::HostConfig;
pub use connections::ConnectionManager;
pub use server::{HostError, HostHandle, HostServer};

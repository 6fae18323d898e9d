//! Core domain logic for the fieldlock collaboration protocol.
//!
//! This crate holds the pieces that do not touch the network: the
//! authoritative [`LockRegistry`], the [`PresenceTracker`] roster, the wire
//! protocol message types, and the shared type aliases. The host and client
//! crates wrap these in transport; callers pass data in and get explicit
//! result values back — nothing in here performs I/O.

pub mod presence;
pub mod protocol;
pub mod registry;
pub mod types;

pub use presence::{Client, PresenceError, PresenceTracker};
pub use protocol::{ClientMessage, ServerMessage, StateSnapshot};
pub use registry::{AcquireResult, Lock, LockRegistry, ReleaseResult};
pub use types::{ClientId, FieldId, SessionRole, SessionStatus, Timestamp};

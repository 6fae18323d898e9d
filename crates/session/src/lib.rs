//! Process-wide collaboration session for the desktop admin application.
//!
//! This crate ties the host and client roles together behind one state
//! machine ([`CollabSession`]), hands UI code a role-agnostic
//! [`LockFacade`], and provides the [`LockedField`] wrapper contract that
//! individual form inputs use to participate in locking without knowing
//! anything about transport.

pub mod facade;
pub mod field;
pub mod profiles;
pub mod session;

pub use facade::LockFacade;
pub use field::{field_display, FieldDisplay, LockedField};
pub use profiles::{ConnectionProfile, ProfileStore};
pub use session::{CollabSession, SessionError, SessionState};

// Re-exported so the application layer can populate its "join a session"
// picker without depending on the discovery crate directly.
pub use fieldlock_discovery::{DiscoveredServer, ServerBrowser};

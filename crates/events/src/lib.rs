//! In-process collaboration event bus.
//!
//! [`EventBus`] is the publish/subscribe hub the UI layer listens on: every
//! authoritative state change (lock table, presence) and every session
//! status transition is published here, in both the host and client roles.
//! Shared via `Arc<EventBus>` across the application.

pub mod bus;

pub use bus::{CollabEvent, EventBus};

//! Host-side roster of connected clients.
//!
//! Owned by the same authority loop as the lock registry; mutations are
//! serialized by construction and the struct carries no interior
//! mutability.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::types::{ClientId, Timestamp};

/// One connected participant as seen by the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Client {
    pub id: ClientId,
    pub name: String,
    pub is_host: bool,
    pub connected_at: Timestamp,
}

/// Presence-domain error type.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PresenceError {
    /// A connection presented an id that is already on the roster. The
    /// connection is rejected; the existing entry is never overwritten.
    #[error("client id already connected: {0}")]
    DuplicateId(ClientId),
}

/// Ordered roster of connected clients (join order).
#[derive(Debug, Default)]
pub struct PresenceTracker {
    clients: Vec<Client>,
}

impl PresenceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a client to the roster.
    pub fn add_client(&mut self, id: &str, name: &str, is_host: bool) -> Result<(), PresenceError> {
        if self.contains(id) {
            return Err(PresenceError::DuplicateId(id.to_string()));
        }
        self.clients.push(Client {
            id: id.to_string(),
            name: name.to_string(),
            is_host,
            connected_at: chrono::Utc::now(),
        });
        Ok(())
    }

    /// Remove a client; returns the removed entry if it was present.
    ///
    /// The caller is responsible for sweeping the lock registry
    /// (`LockRegistry::release_all_for`) alongside this.
    pub fn remove_client(&mut self, id: &str) -> Option<Client> {
        let index = self.clients.iter().position(|c| c.id == id)?;
        Some(self.clients.remove(index))
    }

    /// Roster snapshot in join order.
    pub fn list(&self) -> Vec<Client> {
        self.clients.clone()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.clients.iter().any(|c| c.id == id)
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_and_list_preserves_join_order() {
        let mut presence = PresenceTracker::new();

        presence.add_client("h", "Host", true).unwrap();
        presence.add_client("a", "Alice", false).unwrap();
        presence.add_client("b", "Bob", false).unwrap();

        let names: Vec<String> = presence.list().into_iter().map(|c| c.name).collect();
        assert_eq!(names, vec!["Host", "Alice", "Bob"]);
        assert!(presence.list()[0].is_host);
    }

    #[test]
    fn test_duplicate_id_is_rejected_not_overwritten() {
        let mut presence = PresenceTracker::new();

        presence.add_client("a", "Alice", false).unwrap();
        let err = presence.add_client("a", "Impostor", false).unwrap_err();

        assert_eq!(err, PresenceError::DuplicateId("a".to_string()));
        assert_eq!(presence.len(), 1);
        assert_eq!(presence.list()[0].name, "Alice");
    }

    #[test]
    fn test_remove_client_returns_entry() {
        let mut presence = PresenceTracker::new();

        presence.add_client("a", "Alice", false).unwrap();
        let removed = presence.remove_client("a").expect("was present");

        assert_eq!(removed.name, "Alice");
        assert!(presence.is_empty());
    }

    #[test]
    fn test_remove_unknown_client_is_none() {
        let mut presence = PresenceTracker::new();
        assert!(presence.remove_client("ghost").is_none());
    }
}

//! Authoritative field-lock table.
//!
//! The registry is the single source of truth for which field is locked by
//! whom. It is owned exclusively by the host's authority loop: all mutations
//! arrive serialized on one logical thread of control, so the struct itself
//! carries no interior mutability. Every operation returns an explicit
//! result value; none of them can fail.

use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::types::{ClientId, FieldId, Timestamp};

/// A mutual-exclusion claim on one field by one client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Lock {
    pub field_id: FieldId,
    pub holder_id: ClientId,
    pub holder_name: String,
    pub acquired_at: Timestamp,
}

/// Outcome of an acquisition request.
#[derive(Debug, Clone, PartialEq)]
pub enum AcquireResult {
    Granted,
    /// Someone else holds the field; carries their display name so the UI
    /// can render an "Editing: X" badge.
    Denied { holder_name: String },
}

/// Outcome of a release request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseResult {
    Released,
    /// The lock exists but belongs to someone else, or does not exist.
    /// Intentionally silent so a stale teardown-race call cannot clear
    /// another holder's lock.
    Ignored,
    /// Force-release target was not locked.
    NotLocked,
}

/// Mapping of field identifiers to their current lock holder.
///
/// Keyed by field id, so at most one [`Lock`] can exist per field and
/// snapshots come out in a stable order.
#[derive(Debug, Default)]
pub struct LockRegistry {
    locks: BTreeMap<FieldId, Lock>,
}

impl LockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Try to lock `field_id` for `client_id`.
    ///
    /// Re-acquiring a field the client already holds is idempotent: the
    /// grant is repeated and `acquired_at` refreshed. A field held by
    /// another client is denied without mutation. Empty field ids are a
    /// caller bug and are never granted.
    pub fn acquire(&mut self, field_id: &str, client_id: &str, client_name: &str) -> AcquireResult {
        debug_assert!(!field_id.is_empty(), "field id must be non-empty");
        if field_id.is_empty() {
            return AcquireResult::Denied {
                holder_name: String::new(),
            };
        }

        match self.locks.entry(field_id.to_string()) {
            Entry::Occupied(mut entry) => {
                if entry.get().holder_id == client_id {
                    entry.get_mut().acquired_at = chrono::Utc::now();
                    AcquireResult::Granted
                } else {
                    AcquireResult::Denied {
                        holder_name: entry.get().holder_name.clone(),
                    }
                }
            }
            Entry::Vacant(entry) => {
                entry.insert(Lock {
                    field_id: field_id.to_string(),
                    holder_id: client_id.to_string(),
                    holder_name: client_name.to_string(),
                    acquired_at: chrono::Utc::now(),
                });
                AcquireResult::Granted
            }
        }
    }

    /// Release `field_id` if and only if `client_id` holds it.
    ///
    /// Wrong-holder and not-locked calls both come back as
    /// [`ReleaseResult::Ignored`] — releasing is always safe to call.
    pub fn release(&mut self, field_id: &str, client_id: &str) -> ReleaseResult {
        match self.locks.get(field_id) {
            Some(lock) if lock.holder_id == client_id => {}
            _ => return ReleaseResult::Ignored,
        }
        self.locks.remove(field_id);
        ReleaseResult::Released
    }

    /// Unconditionally delete the lock on `field_id`, whoever holds it.
    ///
    /// Host-local administrative action; this is deliberately not reachable
    /// through any network message.
    pub fn force_release(&mut self, field_id: &str) -> ReleaseResult {
        match self.locks.remove(field_id) {
            Some(_) => ReleaseResult::Released,
            None => ReleaseResult::NotLocked,
        }
    }

    /// Delete every lock held by `client_id`; returns how many were swept.
    ///
    /// Called when that client's session ends so no lock outlives a
    /// vanished participant.
    pub fn release_all_for(&mut self, client_id: &str) -> usize {
        let before = self.locks.len();
        self.locks.retain(|_, lock| lock.holder_id != client_id);
        before - self.locks.len()
    }

    /// Current lock table, ordered by field id.
    pub fn snapshot(&self) -> Vec<Lock> {
        self.locks.values().cloned().collect()
    }

    /// The lock currently on `field_id`, if any.
    pub fn holder_of(&self, field_id: &str) -> Option<&Lock> {
        self.locks.get(field_id)
    }

    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_acquire_vacant_field_is_granted() {
        let mut registry = LockRegistry::new();

        let result = registry.acquire("page-1-title", "client-a", "Alice");
        assert_eq!(result, AcquireResult::Granted);

        let lock = registry.holder_of("page-1-title").expect("lock exists");
        assert_eq!(lock.holder_id, "client-a");
        assert_eq!(lock.holder_name, "Alice");
    }

    #[test]
    fn test_reacquire_same_holder_is_idempotent() {
        let mut registry = LockRegistry::new();

        assert_eq!(
            registry.acquire("f", "client-a", "Alice"),
            AcquireResult::Granted
        );
        assert_eq!(
            registry.acquire("f", "client-a", "Alice"),
            AcquireResult::Granted
        );

        // Still exactly one lock, same holder.
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.holder_of("f").unwrap().holder_id, "client-a");
    }

    #[test]
    fn test_acquire_held_field_is_denied_with_holder_name() {
        let mut registry = LockRegistry::new();

        registry.acquire("f", "client-a", "Alice");
        let result = registry.acquire("f", "client-b", "Bob");

        assert_eq!(
            result,
            AcquireResult::Denied {
                holder_name: "Alice".to_string()
            }
        );
        // Denial mutates nothing.
        assert_eq!(registry.holder_of("f").unwrap().holder_id, "client-a");
    }

    #[test]
    fn test_deny_then_release_then_acquire() {
        let mut registry = LockRegistry::new();

        assert_eq!(
            registry.acquire("f", "client-a", "Alice"),
            AcquireResult::Granted
        );
        assert_eq!(
            registry.acquire("f", "client-b", "Bob"),
            AcquireResult::Denied {
                holder_name: "Alice".to_string()
            }
        );
        assert_eq!(registry.release("f", "client-a"), ReleaseResult::Released);
        assert_eq!(
            registry.acquire("f", "client-b", "Bob"),
            AcquireResult::Granted
        );
    }

    #[test]
    fn test_release_by_wrong_holder_is_ignored() {
        let mut registry = LockRegistry::new();

        registry.acquire("f", "client-a", "Alice");
        assert_eq!(registry.release("f", "client-b"), ReleaseResult::Ignored);

        // The lock was not stolen or cleared.
        assert_eq!(
            registry.acquire("f", "client-b", "Bob"),
            AcquireResult::Denied {
                holder_name: "Alice".to_string()
            }
        );
    }

    #[test]
    fn test_release_unlocked_field_is_ignored() {
        let mut registry = LockRegistry::new();
        assert_eq!(
            registry.release("nothing-here", "client-a"),
            ReleaseResult::Ignored
        );
    }

    #[test]
    fn test_force_release_is_holder_agnostic() {
        let mut registry = LockRegistry::new();

        registry.acquire("f", "client-a", "Alice");
        assert_eq!(registry.force_release("f"), ReleaseResult::Released);
        assert_eq!(
            registry.acquire("f", "client-b", "Bob"),
            AcquireResult::Granted
        );
    }

    #[test]
    fn test_force_release_unlocked_field() {
        let mut registry = LockRegistry::new();
        assert_eq!(registry.force_release("f"), ReleaseResult::NotLocked);
    }

    #[test]
    fn test_release_all_for_sweeps_every_lock_of_client() {
        let mut registry = LockRegistry::new();

        registry.acquire("f1", "client-a", "Alice");
        registry.acquire("f2", "client-a", "Alice");
        registry.acquire("f3", "client-b", "Bob");

        let swept = registry.release_all_for("client-a");
        assert_eq!(swept, 2);

        assert!(registry.holder_of("f1").is_none());
        assert!(registry.holder_of("f2").is_none());
        assert_eq!(registry.holder_of("f3").unwrap().holder_id, "client-b");
    }

    #[test]
    fn test_at_most_one_lock_per_field() {
        let mut registry = LockRegistry::new();

        registry.acquire("f", "client-a", "Alice");
        registry.acquire("f", "client-b", "Bob");
        registry.acquire("f", "client-a", "Alice");

        let snapshot = registry.snapshot();
        let count = snapshot.iter().filter(|l| l.field_id == "f").count();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_snapshot_is_ordered_by_field_id() {
        let mut registry = LockRegistry::new();

        registry.acquire("zulu", "client-a", "Alice");
        registry.acquire("alpha", "client-a", "Alice");
        registry.acquire("mike", "client-b", "Bob");

        let snapshot = registry.snapshot();
        let ids: Vec<&str> = snapshot.iter().map(|l| l.field_id.as_str()).collect();
        assert_eq!(ids, vec!["alpha", "mike", "zulu"]);
    }

    #[test]
    fn test_empty_registry_snapshot() {
        let registry = LockRegistry::new();
        assert!(registry.is_empty());
        assert!(registry.snapshot().is_empty());
    }
}

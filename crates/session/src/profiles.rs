//! Persisted connection profiles.
//!
//! Every successful connection records the server so the "join a session"
//! picker can offer it again later, independent of discovery. Profiles are
//! stored as a small JSON file next to the rest of the application data
//! and are only ever removed by explicit user action.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use fieldlock_core::types::Timestamp;

/// A previously used server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionProfile {
    pub ip: String,
    pub port: u16,
    /// The host's display name as of the last connection.
    pub name: String,
    pub last_connected_at: Timestamp,
    pub is_favorite: bool,
}

/// File-backed profile collection.
pub struct ProfileStore {
    path: PathBuf,
    profiles: Vec<ConnectionProfile>,
}

impl ProfileStore {
    /// Load profiles from `path`. A missing file yields an empty store; a
    /// corrupt file is logged and treated as empty rather than aborting
    /// startup.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let profiles = match std::fs::read_to_string(&path) {
            Ok(raw) => match serde_json::from_str(&raw) {
                Ok(profiles) => profiles,
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Corrupt profile store; starting empty");
                    Vec::new()
                }
            },
            Err(_) => Vec::new(),
        };
        Self { path, profiles }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Record a successful connection: refresh the existing entry for
    /// `(ip, port)` or create one.
    pub fn record_connection(&mut self, ip: &str, port: u16, name: &str) -> std::io::Result<()> {
        match self.find_mut(ip, port) {
            Some(profile) => {
                profile.name = name.to_string();
                profile.last_connected_at = chrono::Utc::now();
            }
            None => self.profiles.push(ConnectionProfile {
                ip: ip.to_string(),
                port,
                name: name.to_string(),
                last_connected_at: chrono::Utc::now(),
                is_favorite: false,
            }),
        }
        self.save()
    }

    /// Explicit user removal; returns whether the entry existed.
    pub fn remove(&mut self, ip: &str, port: u16) -> std::io::Result<bool> {
        let before = self.profiles.len();
        self.profiles.retain(|p| !(p.ip == ip && p.port == port));
        let removed = self.profiles.len() != before;
        if removed {
            self.save()?;
        }
        Ok(removed)
    }

    /// Mark or unmark a profile as favorite; returns whether it existed.
    pub fn set_favorite(&mut self, ip: &str, port: u16, is_favorite: bool) -> std::io::Result<bool> {
        match self.find_mut(ip, port) {
            Some(profile) => {
                profile.is_favorite = is_favorite;
                self.save()?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Profiles for display: favorites first, then most recently used.
    pub fn list(&self) -> Vec<ConnectionProfile> {
        let mut profiles = self.profiles.clone();
        profiles.sort_by(|a, b| {
            b.is_favorite
                .cmp(&a.is_favorite)
                .then(b.last_connected_at.cmp(&a.last_connected_at))
        });
        profiles
    }

    fn find_mut(&mut self, ip: &str, port: u16) -> Option<&mut ConnectionProfile> {
        self.profiles
            .iter_mut()
            .find(|p| p.ip == ip && p.port == port)
    }

    fn save(&self) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(&self.profiles)
            .expect("ConnectionProfile is always serialisable");
        std::fs::write(&self.path, json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_in(dir: &tempfile::TempDir) -> ProfileStore {
        ProfileStore::load(dir.path().join("servers.json"))
    }

    #[test]
    fn test_missing_file_is_empty_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        assert!(store.list().is_empty());
    }

    #[test]
    fn test_record_persists_across_reload() {
        let dir = tempfile::tempdir().unwrap();

        let mut store = store_in(&dir);
        store.record_connection("192.168.1.20", 9400, "Studio PC").unwrap();

        let reloaded = store_in(&dir);
        let profiles = reloaded.list();
        assert_eq!(profiles.len(), 1);
        assert_eq!(profiles[0].ip, "192.168.1.20");
        assert_eq!(profiles[0].port, 9400);
        assert_eq!(profiles[0].name, "Studio PC");
        assert!(!profiles[0].is_favorite);
    }

    #[test]
    fn test_record_same_server_updates_instead_of_duplicating() {
        let dir = tempfile::tempdir().unwrap();

        let mut store = store_in(&dir);
        store.record_connection("10.0.0.5", 9400, "Old Name").unwrap();
        let first_ts = store.list()[0].last_connected_at;

        store.record_connection("10.0.0.5", 9400, "New Name").unwrap();

        let profiles = store.list();
        assert_eq!(profiles.len(), 1);
        assert_eq!(profiles[0].name, "New Name");
        assert!(profiles[0].last_connected_at >= first_ts);
    }

    #[test]
    fn test_favorites_sort_first() {
        let dir = tempfile::tempdir().unwrap();

        let mut store = store_in(&dir);
        store.record_connection("10.0.0.1", 9400, "First").unwrap();
        store.record_connection("10.0.0.2", 9400, "Second").unwrap();
        store.set_favorite("10.0.0.1", 9400, true).unwrap();

        let profiles = store.list();
        assert_eq!(profiles[0].name, "First");
        assert!(profiles[0].is_favorite);
        assert_eq!(profiles[1].name, "Second");
    }

    #[test]
    fn test_remove_only_on_explicit_call() {
        let dir = tempfile::tempdir().unwrap();

        let mut store = store_in(&dir);
        store.record_connection("10.0.0.1", 9400, "Keeper").unwrap();

        assert!(store.remove("10.0.0.1", 9400).unwrap());
        assert!(!store.remove("10.0.0.1", 9400).unwrap());
        assert!(store.list().is_empty());

        let reloaded = store_in(&dir);
        assert!(reloaded.list().is_empty());
    }

    #[test]
    fn test_corrupt_file_degrades_to_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("servers.json");
        std::fs::write(&path, "{ not json").unwrap();

        let store = ProfileStore::load(path);
        assert!(store.list().is_empty());
    }
}

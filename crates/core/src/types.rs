use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Clients are identified by opaque UUID strings assigned at handshake.
pub type ClientId = String;

/// An opaque string naming one editable input across the whole document set
/// (e.g. `page-42-slug`). Callers own uniqueness; the core derives no
/// structure from it.
pub type FieldId = String;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Which side of the collaboration this process is playing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum SessionRole {
    /// Not participating in any collaboration instance.
    None,
    /// Owns the authoritative lock registry and presence roster.
    Host,
    /// Connected to a remote host; holds only a cached replica.
    Client,
}

/// Connection state of the process-wide collaboration session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum SessionStatus {
    Disconnected,
    Connecting,
    Connected,
    /// A transport or handshake failure; recovered only by explicit user
    /// acknowledgement, never by silent retry.
    Error,
}

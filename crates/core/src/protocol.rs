//! Wire protocol between a collaboration host and its clients.
//!
//! All frames are JSON text messages with a `type` tag, mirroring what the
//! Electron admin shell consumes. There is deliberately no force-release
//! variant in [`ClientMessage`]: forced release is a host-local
//! administrative action, not something a remote client can request.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::presence::Client;
use crate::registry::Lock;
use crate::types::{ClientId, FieldId};

/// Messages a client sends to the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(tag = "type", rename_all = "snake_case")]
#[ts(export)]
pub enum ClientMessage {
    /// Handshake opener; must be the first frame on a new connection.
    Hello { display_name: String },
    Acquire {
        field_id: FieldId,
        client_id: ClientId,
    },
    Release {
        field_id: FieldId,
        client_id: ClientId,
    },
}

/// Messages the host sends to a client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(tag = "type", rename_all = "snake_case")]
#[ts(export)]
pub enum ServerMessage {
    /// Handshake reply: the assigned id plus the full current state so the
    /// new client starts consistent.
    Welcome {
        client_id: ClientId,
        locks: Vec<Lock>,
        presence: Vec<Client>,
    },
    /// Handshake refusal; the connection is closed afterwards.
    Rejected { reason: String },
    /// Broadcast after every registry/presence mutation, in the order the
    /// host applied them.
    State {
        locks: Vec<Lock>,
        presence: Vec<Client>,
    },
}

/// The last authoritative state a participant has observed.
///
/// On a client this is a read replica that may be stale by at most one
/// broadcast round trip; on the host it is always current.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct StateSnapshot {
    pub locks: Vec<Lock>,
    pub presence: Vec<Client>,
}

impl StateSnapshot {
    /// The lock on `field_id`, if any.
    pub fn lock_on(&self, field_id: &str) -> Option<&Lock> {
        self.locks.iter().find(|l| l.field_id == field_id)
    }

    /// Whether `client_id` holds the lock on `field_id`.
    pub fn held_by(&self, field_id: &str, client_id: &str) -> bool {
        self.lock_on(field_id)
            .is_some_and(|l| l.holder_id == client_id)
    }
}

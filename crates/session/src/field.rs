//! Per-field locking contract for editable controls.
//!
//! The desktop UI wraps each editable input in a `LockedInput` component;
//! this module is the logic behind it. Focus requests the lock, blur
//! releases a self-held lock, and rendering is a pure function of the
//! snapshot plus this process's own client id.

use fieldlock_core::protocol::StateSnapshot;
use fieldlock_core::types::{FieldId, SessionStatus};

use crate::facade::LockFacade;

/// What the wrapped control should render.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldDisplay {
    /// Session not connected: the control is disabled outright so offline
    /// edits cannot diverge from the shared state.
    Offline,
    /// Unlocked; control enabled, no affordance.
    Editable,
    /// Locked by this process; control enabled, flagged (green border).
    EditingBySelf,
    /// Locked by someone else; control disabled, flagged (red border),
    /// badge shows the holder's display name.
    EditingByOther { holder_name: String },
}

/// Pure rendering rule: snapshot + own id + status in, display state out.
pub fn field_display(
    status: SessionStatus,
    snapshot: &StateSnapshot,
    self_id: &str,
    field_id: &str,
) -> FieldDisplay {
    if status != SessionStatus::Connected {
        return FieldDisplay::Offline;
    }
    match snapshot.lock_on(field_id) {
        Some(lock) if lock.holder_id == self_id => FieldDisplay::EditingBySelf,
        Some(lock) => FieldDisplay::EditingByOther {
            holder_name: lock.holder_name.clone(),
        },
        None => FieldDisplay::Editable,
    }
}

/// Wraps one editable control identified by `field_id`.
pub struct LockedField {
    field_id: FieldId,
    facade: LockFacade,
}

impl LockedField {
    pub fn new(field_id: impl Into<FieldId>, facade: LockFacade) -> Self {
        Self {
            field_id: field_id.into(),
            facade,
        }
    }

    pub fn field_id(&self) -> &str {
        &self.field_id
    }

    /// Focus handler: request the lock, but only while connected.
    pub fn focus(&self) {
        if self.facade.status() == SessionStatus::Connected {
            self.facade.request_lock(&self.field_id);
        }
    }

    /// Blur handler: release only a lock this process actually holds, so a
    /// blur racing another user's grant cannot clear their lock.
    pub fn blur(&self) {
        if self.facade.is_held_by_self(&self.field_id) {
            self.facade.release_lock(&self.field_id);
        }
    }

    /// Unmount handler: best-effort release; a no-op if already released.
    pub fn detach(&self) {
        self.blur();
    }

    /// Current display state for the wrapped control.
    pub fn display(&self) -> FieldDisplay {
        field_display(
            self.facade.status(),
            &self.facade.snapshot(),
            self.facade.client_id(),
            &self.field_id,
        )
    }
}

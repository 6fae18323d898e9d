//! Event bus backed by a `tokio::sync::broadcast` channel.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use fieldlock_core::protocol::StateSnapshot;
use fieldlock_core::types::{SessionRole, SessionStatus};

/// A collaboration event observed by this process.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum CollabEvent {
    /// A new authoritative state snapshot (lock table + presence roster)
    /// was applied. On the host this fires after every mutation; on a
    /// client it fires for every received broadcast, in receipt order.
    State(StateSnapshot),

    /// The session state machine changed status.
    Status {
        status: SessionStatus,
        role: SessionRole,
        /// Human-readable reason, set when `status` is `Error`.
        message: Option<String>,
    },
}

/// Default buffer capacity for the broadcast channel.
const DEFAULT_CAPACITY: usize = 256;

/// In-process fan-out bus for [`CollabEvent`]s.
///
/// Any number of subscribers independently receive every published event.
/// Slow receivers that fall more than the buffer capacity behind observe a
/// `RecvError::Lagged` and can resynchronize from the next snapshot.
pub struct EventBus {
    sender: broadcast::Sender<CollabEvent>,
}

impl EventBus {
    /// Create a bus with a specific channel capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all current subscribers.
    ///
    /// If there are no active subscribers the event is silently dropped;
    /// the authoritative state lives in the registry, not on this bus.
    pub fn publish(&self, event: CollabEvent) {
        // SendError only means there are zero receivers.
        let _ = self.sender.send(event);
    }

    /// Subscribe to all events published on this bus.
    pub fn subscribe(&self) -> broadcast::Receiver<CollabEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publish_and_receive_single_subscriber() {
        let bus = EventBus::default();
        let mut rx = bus.subscribe();

        bus.publish(CollabEvent::Status {
            status: SessionStatus::Connecting,
            role: SessionRole::Client,
            message: None,
        });

        let received = rx.recv().await.expect("should receive the event");
        match received {
            CollabEvent::Status { status, role, .. } => {
                assert_eq!(status, SessionStatus::Connecting);
                assert_eq!(role, SessionRole::Client);
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn multiple_subscribers_receive_same_event() {
        let bus = EventBus::default();
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();

        bus.publish(CollabEvent::State(StateSnapshot::default()));

        assert!(matches!(rx1.recv().await.unwrap(), CollabEvent::State(_)));
        assert!(matches!(rx2.recv().await.unwrap(), CollabEvent::State(_)));
    }

    #[test]
    fn publish_with_no_subscribers_does_not_panic() {
        let bus = EventBus::default();
        bus.publish(CollabEvent::State(StateSnapshot::default()));
    }
}

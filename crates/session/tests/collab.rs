//! End-to-end lock flow over a real host and real WebSocket clients.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{sleep, timeout};

use fieldlock_core::protocol::StateSnapshot;
use fieldlock_core::types::{SessionRole, SessionStatus};
use fieldlock_events::{CollabEvent, EventBus};
use fieldlock_host::HostConfig;
use fieldlock_session::{CollabSession, FieldDisplay, LockFacade, LockedField, ProfileStore};

const WAIT: Duration = Duration::from_secs(2);

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn loopback_config(display_name: &str) -> HostConfig {
    HostConfig {
        bind_ip: "127.0.0.1".into(),
        port: 0,
        display_name: display_name.into(),
        advertise: false,
        ..HostConfig::default()
    }
}

async fn start_host(display_name: &str) -> CollabSession {
    let mut session = CollabSession::new(Arc::new(EventBus::default()));
    session
        .start_as_host(loopback_config(display_name))
        .await
        .expect("host should start on an ephemeral loopback port");
    session
}

async fn join(host: &CollabSession, display_name: &str) -> CollabSession {
    let addr = host.host_addr().expect("host must be bound");
    let mut session = CollabSession::new(Arc::new(EventBus::default()));
    session
        .connect_as_client(&addr.ip().to_string(), addr.port(), display_name)
        .await
        .expect("client should connect to the local host");
    session
}

/// Block until the facade's snapshot satisfies `pred`, or panic after WAIT.
async fn wait_state(facade: &LockFacade, pred: impl FnMut(&StateSnapshot) -> bool) -> StateSnapshot {
    let mut rx = facade.snapshot_watch();
    let snapshot = timeout(WAIT, rx.wait_for(pred))
        .await
        .expect("timed out waiting for a state snapshot")
        .expect("state channel closed")
        .clone();
    snapshot
}

async fn wait_status(facade: &LockFacade, wanted: SessionStatus) {
    let mut rx = facade.status_watch();
    timeout(WAIT, rx.wait_for(|s| *s == wanted))
        .await
        .expect("timed out waiting for a status change")
        .expect("status channel closed");
}

// ---------------------------------------------------------------------------
// Lock flow across two clients
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_focus_blur_flow_between_two_clients() {
    let host = start_host("Studio PC").await;

    let carol = join(&host, "Carol").await;
    let dave = join(&host, "Dave").await;

    let carol_facade = carol.facade().expect("carol is connected");
    let dave_facade = dave.facade().expect("dave is connected");

    let carol_field = LockedField::new("page-1-title", carol_facade.clone());
    let dave_field = LockedField::new("page-1-title", dave_facade.clone());

    // Both joins were broadcast: everyone sees host + Carol + Dave.
    wait_state(&carol_facade, |s| s.presence.len() == 3).await;
    wait_state(&dave_facade, |s| s.presence.len() == 3).await;

    // Carol focuses the field and is granted the lock.
    carol_field.focus();
    wait_state(&carol_facade, |s| {
        s.held_by("page-1-title", carol_facade.client_id())
    })
    .await;
    assert_eq!(carol_field.display(), FieldDisplay::EditingBySelf);

    // Dave observes the grant and renders it with Carol's display name.
    wait_state(&dave_facade, |s| s.lock_on("page-1-title").is_some()).await;
    assert_eq!(
        dave_field.display(),
        FieldDisplay::EditingByOther {
            holder_name: "Carol".to_string()
        }
    );

    // Dave focusing the same field is denied: the lock stays Carol's.
    dave_field.focus();
    sleep(Duration::from_millis(100)).await;
    let snapshot = dave_facade.snapshot();
    let lock = snapshot.lock_on("page-1-title").expect("still locked");
    assert_eq!(lock.holder_id, carol_facade.client_id());
    assert_eq!(
        dave_field.display(),
        FieldDisplay::EditingByOther {
            holder_name: "Carol".to_string()
        }
    );

    // Carol blurs; the field frees up everywhere.
    carol_field.blur();
    wait_state(&dave_facade, |s| s.lock_on("page-1-title").is_none()).await;
    assert_eq!(dave_field.display(), FieldDisplay::Editable);

    // Now Dave can take it.
    dave_field.focus();
    wait_state(&dave_facade, |s| {
        s.held_by("page-1-title", dave_facade.client_id())
    })
    .await;
    assert_eq!(dave_field.display(), FieldDisplay::EditingBySelf);
}

#[tokio::test]
async fn test_host_participates_through_its_own_facade() {
    let mut host = start_host("Studio PC").await;
    let carol = join(&host, "Carol").await;

    let host_facade = host.facade().expect("host is connected");
    let carol_facade = carol.facade().expect("carol is connected");
    assert_eq!(host_facade.role(), SessionRole::Host);

    // The host locks a field like any other participant.
    host_facade.request_lock("customer-3-email");
    let snapshot = wait_state(&carol_facade, |s| s.lock_on("customer-3-email").is_some()).await;
    assert_eq!(
        snapshot.lock_on("customer-3-email").unwrap().holder_id,
        host_facade.client_id()
    );

    // And can administratively clear any lock.
    carol_facade.request_lock("page-1-title");
    wait_state(&host_facade, |s| s.lock_on("page-1-title").is_some()).await;
    host_facade.force_release_lock("page-1-title");
    wait_state(&carol_facade, |s| s.lock_on("page-1-title").is_none()).await;

    host.disconnect().await;
}

#[tokio::test]
async fn test_client_disconnect_sweeps_its_locks() {
    let host = start_host("Studio PC").await;
    let mut carol = join(&host, "Carol").await;
    let dave = join(&host, "Dave").await;

    let carol_facade = carol.facade().expect("carol is connected");
    let dave_facade = dave.facade().expect("dave is connected");
    wait_state(&dave_facade, |s| s.presence.len() == 3).await;

    carol_facade.request_lock("page-1-title");
    carol_facade.request_lock("customer-3-email");
    wait_state(&dave_facade, |s| s.locks.len() == 2).await;

    carol.disconnect().await;

    // Both of Carol's locks go away along with her presence entry.
    let snapshot = wait_state(&dave_facade, |s| s.presence.len() == 2).await;
    assert!(snapshot.locks.is_empty());
}

// ---------------------------------------------------------------------------
// Host teardown and recovery
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_host_shutdown_puts_clients_in_error() {
    let mut host = start_host("Studio PC").await;
    let mut carol = join(&host, "Carol").await;

    let carol_facade = carol.facade().expect("carol is connected");
    let carol_field = LockedField::new("page-1-title", carol_facade.clone());
    carol_field.focus();
    wait_state(&carol_facade, |s| s.lock_on("page-1-title").is_some()).await;

    host.disconnect().await;

    // The drop surfaces as an error, never as a silent reconnect, and the
    // state snapshot carries the reason for the banner to render.
    wait_status(&carol_facade, SessionStatus::Error).await;
    let state = carol.state();
    assert_eq!(state.status, SessionStatus::Error);
    assert!(
        state.error_message.is_some(),
        "a mid-session drop must surface its reason"
    );
    assert_eq!(carol_field.display(), FieldDisplay::Offline);
    assert!(carol.facade().is_none());

    // Acknowledging the error returns to a clean disconnected state, from
    // which a fresh manual connection is possible.
    carol.acknowledge_error();
    assert_eq!(carol.state().status, SessionStatus::Disconnected);
    assert_eq!(carol.state().role, SessionRole::None);

    let fresh_host = start_host("Studio PC").await;
    let addr = fresh_host.host_addr().unwrap();
    carol
        .connect_as_client(&addr.ip().to_string(), addr.port(), "Carol")
        .await
        .expect("reconnect after acknowledging the error");

    // The old session's locks did not survive the restart.
    let facade = carol.facade().expect("carol reconnected");
    assert!(facade.active_locks().is_empty());
}

// ---------------------------------------------------------------------------
// Session state machine and bus events
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_status_events_published_during_connect() {
    let host = start_host("Studio PC").await;
    let addr = host.host_addr().unwrap();

    let bus = Arc::new(EventBus::default());
    let mut events = bus.subscribe();

    let mut carol = CollabSession::new(Arc::clone(&bus));
    carol
        .connect_as_client(&addr.ip().to_string(), addr.port(), "Carol")
        .await
        .unwrap();

    let mut statuses = Vec::new();
    let mut saw_state = false;
    while statuses.last() != Some(&SessionStatus::Connected) {
        match timeout(WAIT, events.recv()).await.unwrap().unwrap() {
            CollabEvent::Status { status, role, .. } => {
                assert_eq!(role, SessionRole::Client);
                statuses.push(status);
            }
            CollabEvent::State(_) => saw_state = true,
        }
    }
    assert_eq!(
        statuses,
        vec![SessionStatus::Connecting, SessionStatus::Connected]
    );
    assert!(saw_state, "the welcome snapshot must reach the bus");
}

#[tokio::test]
async fn test_failed_connect_reports_error_state() {
    let mut session = CollabSession::new(Arc::new(EventBus::default()));

    // Port 1 on loopback is closed; the connection is refused.
    let result = session.connect_as_client("127.0.0.1", 1, "Carol").await;
    assert!(result.is_err());

    let state = session.state();
    assert_eq!(state.status, SessionStatus::Error);
    assert!(state.error_message.is_some());
    assert!(session.facade().is_none());

    session.acknowledge_error();
    assert_eq!(session.state().status, SessionStatus::Disconnected);
}

#[tokio::test]
async fn test_successful_connect_records_a_profile() {
    let host = start_host("Studio PC").await;
    let addr = host.host_addr().unwrap();

    let dir = tempfile::tempdir().unwrap();
    let store = ProfileStore::load(dir.path().join("servers.json"));

    let mut carol = CollabSession::with_profiles(Arc::new(EventBus::default()), store);
    carol
        .connect_as_client(&addr.ip().to_string(), addr.port(), "Carol")
        .await
        .unwrap();

    let profiles = carol.profiles().unwrap().list();
    assert_eq!(profiles.len(), 1);
    assert_eq!(profiles[0].ip, addr.ip().to_string());
    assert_eq!(profiles[0].port, addr.port());
    assert_eq!(profiles[0].name, "Studio PC");
}

#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::indexing_slicing
)]
//! Connection lifecycle tests on tokio's paused clock.
//!
//! The clock only advances when every task is idle, so sleeps below jump
//! straight to the next timer and the intervals asserted here are exact.

mod common;

use std::time::Duration;

use serde_json::json;
use tokio::sync::mpsc;
use tokio::time::Instant;
use werewolf_client::{
    ClientError, ClientMessage, ConnectionConfig, ConnectionManager, ConnectionState, FixedDelay,
    GameEvent,
};

use common::{frame, pong_frame, Dial, MockConnector, MockTransport};

fn start(
    connector: MockConnector,
    config: ConnectionConfig,
) -> (ConnectionManager, mpsc::UnboundedReceiver<GameEvent>) {
    common::init_tracing();
    let (tx, rx) = mpsc::unbounded_channel::<GameEvent>();
    (ConnectionManager::start(connector, config, tx), rx)
}

fn config() -> ConnectionConfig {
    ConnectionConfig::new("ws://test/ws")
}

async fn wait_for_state(manager: &ConnectionManager, target: ConnectionState) {
    manager
        .state_changes()
        .wait_for(|s| *s == target)
        .await
        .expect("driver exited");
}

// ════════════════════════════════════════════════════════════════════
// Connect / disconnect
// ════════════════════════════════════════════════════════════════════

#[tokio::test(start_paused = true)]
async fn connect_transitions_to_connected() {
    let (connector, _remote) = MockConnector::accepting();
    let (mut manager, _events) = start(connector.clone(), config());

    assert_eq!(manager.state(), ConnectionState::Disconnected);
    manager.connect().unwrap();
    manager.wait_connected().await.unwrap();
    assert!(manager.is_connected());
    assert_eq!(connector.attempt_count(), 1);

    manager.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn connect_is_idempotent_while_connected() {
    let (connector, _remote) = MockConnector::accepting();
    let (mut manager, _events) = start(connector.clone(), config());

    manager.connect().unwrap();
    manager.wait_connected().await.unwrap();
    manager.connect().unwrap();
    manager.connect().unwrap();
    tokio::time::sleep(Duration::from_millis(10)).await;

    assert_eq!(connector.attempt_count(), 1);
    assert!(manager.is_connected());
    manager.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn disconnect_closes_transport_and_is_repeatable() {
    let (connector, remote) = MockConnector::accepting();
    let (mut manager, _events) = start(connector, config());

    manager.connect().unwrap();
    manager.wait_connected().await.unwrap();

    manager.disconnect().unwrap();
    wait_for_state(&manager, ConnectionState::Disconnected).await;
    assert!(remote.was_closed());

    manager.disconnect().unwrap();
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(manager.state(), ConnectionState::Disconnected);
    manager.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn connect_timeout_gives_up_on_hung_dial() {
    let connector = MockConnector::new(vec![Dial::Hang]);
    let (mut manager, _events) = start(
        connector.clone(),
        config().with_connect_timeout(Duration::from_secs(2)),
    );

    let began = Instant::now();
    manager.connect().unwrap();
    wait_for_state(&manager, ConnectionState::Connecting).await;
    wait_for_state(&manager, ConnectionState::Disconnected).await;
    assert_eq!(began.elapsed(), Duration::from_secs(2));

    // An explicit connect that fails is not retried.
    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(connector.attempt_count(), 1);
    manager.shutdown().await;
}

// ════════════════════════════════════════════════════════════════════
// Heartbeat
// ════════════════════════════════════════════════════════════════════

#[tokio::test(start_paused = true)]
async fn heartbeat_pings_every_thirty_seconds() {
    let (connector, remote) = MockConnector::accepting();
    let (mut manager, _events) = start(connector, config());

    manager.connect().unwrap();
    manager.wait_connected().await.unwrap();

    tokio::time::sleep(Duration::from_secs(29)).await;
    assert_eq!(remote.sent_count("ping"), 0);

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(remote.sent_count("ping"), 1);

    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(remote.sent_count("ping"), 2);
    assert_eq!(remote.sent_json()[0], json!({"type": "ping"}));

    manager.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn heartbeat_stops_after_disconnect() {
    let (connector, remote) = MockConnector::accepting();
    let (mut manager, _events) = start(connector, config());

    manager.connect().unwrap();
    manager.wait_connected().await.unwrap();
    manager.disconnect().unwrap();
    wait_for_state(&manager, ConnectionState::Disconnected).await;

    tokio::time::sleep(Duration::from_secs(120)).await;
    assert_eq!(remote.sent_count("ping"), 0);
    manager.shutdown().await;
}

// ════════════════════════════════════════════════════════════════════
// Reconnect
// ════════════════════════════════════════════════════════════════════

#[tokio::test(start_paused = true)]
async fn unexpected_close_reconnects_after_exactly_five_seconds() {
    let (connector, remote) = MockConnector::accepting();
    let (second, _second_remote) = MockTransport::pair();
    connector.then(Dial::Accept(second));
    let (mut manager, _events) = start(connector.clone(), config());

    manager.connect().unwrap();
    manager.wait_connected().await.unwrap();

    remote.hang_up();
    wait_for_state(&manager, ConnectionState::Disconnected).await;
    let dropped_at = Instant::now();

    manager.wait_connected().await.unwrap();
    let attempts = connector.attempts();
    assert_eq!(attempts.len(), 2);
    assert_eq!(attempts[1] - dropped_at, Duration::from_secs(5));

    manager.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn receive_error_also_triggers_reconnect() {
    let (connector, remote) = MockConnector::accepting();
    let (second, _second_remote) = MockTransport::pair();
    connector.then(Dial::Accept(second));
    let (mut manager, _events) = start(connector.clone(), config());

    manager.connect().unwrap();
    manager.wait_connected().await.unwrap();
    remote.fail("connection reset by peer");
    wait_for_state(&manager, ConnectionState::Disconnected).await;

    tokio::time::sleep(Duration::from_secs(6)).await;
    assert!(manager.is_connected());
    assert_eq!(connector.attempt_count(), 2);
    manager.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn failed_reconnect_keeps_retrying_without_cap() {
    let (connector, remote) = MockConnector::accepting();
    for _ in 0..3 {
        connector.then(Dial::Refuse);
    }
    let (last, _last_remote) = MockTransport::pair();
    connector.then(Dial::Accept(last));
    let (mut manager, _events) = start(connector.clone(), config());

    manager.connect().unwrap();
    manager.wait_connected().await.unwrap();
    remote.hang_up();
    wait_for_state(&manager, ConnectionState::Disconnected).await;
    let dropped_at = Instant::now();

    manager.wait_connected().await.unwrap();
    let offsets: Vec<_> = connector.attempts()[1..]
        .iter()
        .map(|at| (*at - dropped_at).as_secs())
        .collect();
    assert_eq!(offsets, vec![5, 10, 15, 20]);

    manager.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn capped_policy_stops_retrying() {
    let (connector, remote) = MockConnector::accepting();
    let (mut manager, _events) = start(
        connector.clone(),
        config().with_reconnect_policy(FixedDelay::new(Duration::from_secs(1)).with_max_attempts(2)),
    );

    manager.connect().unwrap();
    manager.wait_connected().await.unwrap();
    remote.hang_up();

    tokio::time::sleep(Duration::from_secs(60)).await;
    // The first connect plus two refused reconnects.
    assert_eq!(connector.attempt_count(), 3);
    assert_eq!(manager.state(), ConnectionState::Disconnected);
    manager.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn disconnect_cancels_pending_reconnect() {
    let (connector, remote) = MockConnector::accepting();
    let (mut manager, _events) = start(connector.clone(), config());

    manager.connect().unwrap();
    manager.wait_connected().await.unwrap();
    remote.hang_up();
    wait_for_state(&manager, ConnectionState::Disconnected).await;

    tokio::time::sleep(Duration::from_secs(3)).await;
    manager.disconnect().unwrap();
    tokio::time::sleep(Duration::from_secs(60)).await;

    assert_eq!(connector.attempt_count(), 1);
    manager.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn explicit_connect_supersedes_pending_reconnect() {
    let (connector, remote) = MockConnector::accepting();
    let (second, _second_remote) = MockTransport::pair();
    connector.then(Dial::Accept(second));
    let (mut manager, _events) = start(connector.clone(), config());

    manager.connect().unwrap();
    manager.wait_connected().await.unwrap();
    remote.hang_up();
    wait_for_state(&manager, ConnectionState::Disconnected).await;

    tokio::time::sleep(Duration::from_secs(1)).await;
    manager.connect().unwrap();
    manager.wait_connected().await.unwrap();

    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(connector.attempt_count(), 2);
    assert!(manager.is_connected());
    manager.shutdown().await;
}

// ════════════════════════════════════════════════════════════════════
// Teardown during a dial
// ════════════════════════════════════════════════════════════════════

#[tokio::test(start_paused = true)]
async fn disconnect_interrupts_hung_dial() {
    let connector = MockConnector::new(vec![Dial::Hang]);
    let (mut manager, _events) = start(connector.clone(), config());

    manager.connect().unwrap();
    wait_for_state(&manager, ConnectionState::Connecting).await;

    let began = Instant::now();
    manager.disconnect().unwrap();
    wait_for_state(&manager, ConnectionState::Disconnected).await;
    assert_eq!(began.elapsed(), Duration::ZERO);

    tokio::time::sleep(Duration::from_secs(600)).await;
    assert_eq!(manager.state(), ConnectionState::Disconnected);
    assert_eq!(connector.attempt_count(), 1);
    manager.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn late_reconnect_dial_never_overrides_disconnect() {
    let (connector, remote) = MockConnector::accepting();
    let (slow, _slow_remote) = MockTransport::pair();
    connector.then(Dial::Delayed(Duration::from_secs(10), slow));
    let (mut manager, _events) = start(connector.clone(), config());

    manager.connect().unwrap();
    manager.wait_connected().await.unwrap();
    remote.hang_up();
    wait_for_state(&manager, ConnectionState::Disconnected).await;

    // The reconnect dial starts at 5 s and would land at 15 s.
    tokio::time::sleep(Duration::from_secs(6)).await;
    assert_eq!(manager.state(), ConnectionState::Connecting);
    assert_eq!(connector.attempt_count(), 2);

    let mut changes = manager.state_changes();
    manager.disconnect().unwrap();
    changes
        .wait_for(|s| *s == ConnectionState::Disconnected)
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_secs(60)).await;
    assert!(!changes.has_changed().unwrap());
    assert_eq!(manager.state(), ConnectionState::Disconnected);
    assert_eq!(connector.attempt_count(), 2);
    manager.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn commands_during_dial_are_served() {
    let connector = MockConnector::new(vec![Dial::Hang]);
    let (mut manager, _events) = start(connector.clone(), config());

    manager.connect().unwrap();
    wait_for_state(&manager, ConnectionState::Connecting).await;
    manager.connect().unwrap();
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(connector.attempt_count(), 1);
    assert!(matches!(
        manager.send(ClientMessage::StartGame),
        Err(ClientError::NotConnected)
    ));

    manager.disconnect().unwrap();
    wait_for_state(&manager, ConnectionState::Disconnected).await;
    manager.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn shutdown_during_hung_dial_is_graceful() {
    let connector = MockConnector::new(vec![Dial::Hang]);
    let (mut manager, _events) = start(connector, config());

    manager.connect().unwrap();
    wait_for_state(&manager, ConnectionState::Connecting).await;

    let began = Instant::now();
    manager.shutdown().await;
    assert!(began.elapsed() < Duration::from_secs(1));
    assert_eq!(manager.state(), ConnectionState::Disconnected);
}

// ════════════════════════════════════════════════════════════════════
// Send gate
// ════════════════════════════════════════════════════════════════════

#[tokio::test(start_paused = true)]
async fn send_while_disconnected_is_refused() {
    let (connector, remote) = MockConnector::accepting();
    let (mut manager, _events) = start(connector, config());

    let err = manager.send(ClientMessage::StartGame).unwrap_err();
    assert!(matches!(err, ClientError::NotConnected));

    manager.connect().unwrap();
    manager.wait_connected().await.unwrap();
    manager.send(ClientMessage::StartGame).unwrap();
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(remote.sent_json(), vec![json!({"type": "start_game"})]);

    manager.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn commands_are_dropped_not_queued_across_reconnect() {
    let (connector, remote) = MockConnector::accepting();
    let (second, second_remote) = MockTransport::pair();
    connector.then(Dial::Accept(second));
    let (mut manager, _events) = start(connector, config());

    manager.connect().unwrap();
    manager.wait_connected().await.unwrap();
    remote.hang_up();
    wait_for_state(&manager, ConnectionState::Disconnected).await;

    assert!(manager.send(ClientMessage::StartGame).is_err());
    manager.wait_connected().await.unwrap();
    tokio::time::sleep(Duration::from_millis(10)).await;

    assert!(second_remote.sent().is_empty());
    manager.shutdown().await;
}

// ════════════════════════════════════════════════════════════════════
// Inbound frames
// ════════════════════════════════════════════════════════════════════

#[tokio::test(start_paused = true)]
async fn pong_is_consumed_and_malformed_frames_dropped() {
    let (connector, remote) = MockConnector::accepting();
    let (mut manager, mut events) = start(connector, config());

    manager.connect().unwrap();
    manager.wait_connected().await.unwrap();

    remote.push(pong_frame());
    remote.push("this is not json");
    remote.push(r#"{"data": {"missing": "type"}}"#);
    remote.push(frame("announcement", json!({"content": "天亮了"})));

    let event = events.recv().await.unwrap();
    assert_eq!(event.kind, "announcement");
    assert_eq!(event.payload["content"], "天亮了");
    assert!(events.try_recv().is_err());
    assert!(manager.is_connected());

    manager.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn events_are_forwarded_in_arrival_order() {
    let (connector, remote) = MockConnector::accepting();
    let (mut manager, mut events) = start(connector, config());

    manager.connect().unwrap();
    manager.wait_connected().await.unwrap();

    let kinds = ["phase_change", "announcement", "speaker_turn", "sheriff_elected"];
    for kind in kinds {
        remote.event(kind, json!({}));
    }

    let mut received = Vec::new();
    for _ in kinds {
        received.push(events.recv().await.unwrap().kind);
    }
    assert_eq!(received, kinds);

    manager.shutdown().await;
}

// ════════════════════════════════════════════════════════════════════
// Shutdown
// ════════════════════════════════════════════════════════════════════

#[tokio::test(start_paused = true)]
async fn shutdown_closes_transport_and_stops_driver() {
    let (connector, remote) = MockConnector::accepting();
    let (mut manager, _events) = start(connector, config());

    manager.connect().unwrap();
    manager.wait_connected().await.unwrap();
    manager.shutdown().await;

    assert!(remote.was_closed());
    assert_eq!(manager.state(), ConnectionState::Disconnected);
    assert!(matches!(manager.connect(), Err(ClientError::SessionClosed)));
}

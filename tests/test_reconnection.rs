mod common;

use std::sync::mpsc::channel;
use std::time::Duration;

use graphql_subscription_manager::{
    ConnectionState, StartingReason, SubscriptionManager, ThreadStatus, WorkerError,
};
use serde_json::json;

use common::{handle_websocket, handle_websocket_error, read_json, send_json, wait_for_state, WAIT};

fn manager(url: &str) -> SubscriptionManager {
    SubscriptionManager::builder(url)
        .init_payload(json!({"token": "secret"}))
        .poll_interval(Duration::from_millis(20))
        .reconnect_delay(Duration::from_millis(50))
        .build()
        .unwrap()
}

#[test]
fn test_server_closes_connection() {
    common::init_logging();
    let (server, url) = common::bind();
    let manager = manager(&url);
    manager.start().unwrap();

    let (mut websocket, _) = handle_websocket(&server);
    read_json(&mut websocket); // init
    let (tx, rx) = channel();
    let id = manager
        .subscribe("subscription { a }", move |data| tx.send(data).unwrap())
        .unwrap()
        .unwrap();
    read_json(&mut websocket); // subscription_start

    websocket.close(None).unwrap();
    let _ = websocket.read();

    // Same init and same subscription id on the new connection
    let (mut websocket, _) = handle_websocket(&server);
    assert_eq!(
        read_json(&mut websocket),
        json!({"type": "init", "payload": {"token": "secret"}})
    );
    assert_eq!(
        read_json(&mut websocket),
        json!({"type": "subscription_start", "query": "subscription { a }", "id": id})
    );
    assert!(manager.wait_until_running(WAIT).unwrap());

    send_json(&mut websocket, json!({"id": id, "payload": "again"}));
    assert_eq!(rx.recv_timeout(WAIT).unwrap(), json!("again"));
}

#[test]
fn test_handshake_fails() {
    common::init_logging();
    let (server, url) = common::bind();
    let manager = manager(&url);
    manager.start().unwrap();

    handle_websocket_error(&server);
    wait_for_state(&manager, |state| {
        *state == ConnectionState::Starting(StartingReason::ConnectionFailed)
    });
    assert!(!manager.is_running().unwrap());
    assert_eq!(
        manager.get_thread_status().unwrap(),
        Some(ThreadStatus::Running)
    );

    // Next attempt succeeds
    let (mut websocket, _) = handle_websocket(&server);
    assert_eq!(read_json(&mut websocket)["type"], "init");
    assert!(manager.wait_until_running(WAIT).unwrap());
}

#[test]
fn test_server_stops_answering_pings() {
    common::init_logging();
    let (server, url) = common::bind();
    let manager = SubscriptionManager::builder(&url)
        .poll_interval(Duration::from_millis(20))
        .idle_timeout(Duration::from_millis(100))
        .pong_timeout(Duration::from_millis(300))
        .reconnect_delay(Duration::from_millis(10))
        .build()
        .unwrap();
    manager.start().unwrap();

    let (mut websocket, _) = handle_websocket(&server);
    read_json(&mut websocket); // init
    assert!(matches!(
        websocket.read().unwrap(),
        tungstenite::Message::Ping(_)
    ));

    // The first connection is left unanswered
    let (mut websocket, _) = handle_websocket(&server);
    assert_eq!(read_json(&mut websocket)["type"], "init");
}

#[test]
fn test_invalid_user_agent_is_unrecoverable() {
    common::init_logging();
    let (_server, url) = common::bind();
    let manager = SubscriptionManager::builder(&url)
        .user_agent("bad\nagent")
        .build()
        .unwrap();
    manager.start().unwrap();

    let expected = Err(WorkerError::UnrecoverableError(
        "Invalid header value for 'User-Agent'".to_string(),
    ));
    let state = wait_for_state(&manager, |state| matches!(state, ConnectionState::Defunct(_)));
    assert_eq!(state, ConnectionState::Defunct(expected.clone()));

    let deadline = std::time::Instant::now() + WAIT;
    while manager.get_thread_status().unwrap() == Some(ThreadStatus::Running) {
        assert!(std::time::Instant::now() < deadline);
        std::thread::sleep(Duration::from_millis(10));
    }
    assert_eq!(
        manager.get_thread_status().unwrap(),
        Some(ThreadStatus::Finished(expected))
    );
}

use std::sync::mpsc::channel;
use std::time::Duration;

use graphql_subscription_manager::test_utils::mock_connector;
use graphql_subscription_manager::{ManagerOptions, SubscriptionManager};
use serde_json::json;

#[test]
fn test_manager_over_custom_connector() {
    let (connector, control) = mock_connector();
    let manager = SubscriptionManager::with_connector(
        connector,
        json!({"token": "abc"}),
        ManagerOptions {
            reconnect_delay: Duration::from_millis(10),
            ..ManagerOptions::default()
        },
    );
    manager.start().unwrap();

    let server = control.accept();
    assert_eq!(
        server.next_json(),
        json!({"type": "init", "payload": {"token": "abc"}})
    );
    assert!(manager.wait_until_running(Duration::from_secs(5)).unwrap());

    let (tx, rx) = channel();
    let id = manager
        .subscribe("subscription { a }", move |data| tx.send(data).unwrap())
        .unwrap()
        .unwrap();
    assert_eq!(server.next_json()["type"], "subscription_start");

    server.send_json(json!({"id": id, "payload": [1, 2, 3]}));
    assert_eq!(
        rx.recv_timeout(Duration::from_secs(5)).unwrap(),
        json!([1, 2, 3])
    );

    manager.stop().unwrap();
    assert_eq!(
        server.next_json(),
        json!({"type": "subscription_end", "id": id})
    );
}

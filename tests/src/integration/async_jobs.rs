//! Poll-by-ticket flow: submit, fetch as owner, retention and shutdown.

use std::time::Duration;

use aim_01_protocol::RequestSigner;
use aim_02_dispatcher::RetentionPolicy;
use serde_json::{json, Value};

use super::harness::{alice, bob, test_config, TestAim};

async fn submit(aim: &TestAim, signer: &RequestSigner) -> u64 {
    let call = aim.sign(signer, "post", "/model/async", Some(br#"{"text": "hi."}"#));
    let response = aim.deliver(&call).await;
    assert_eq!(response.status(), 202);
    let body: Value = response.json().await.unwrap();
    body["ticket_number"].as_u64().unwrap()
}

async fn fetch(aim: &TestAim, signer: &RequestSigner, number: u64) -> reqwest::Response {
    let call = aim.sign(signer, "get", &format!("/jobs/{number}"), None);
    aim.deliver(&call).await
}

/// Poll as `signer` until the ticket reports completion.
async fn poll_completed(aim: &TestAim, signer: &RequestSigner, number: u64) -> Value {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
    loop {
        let response = fetch(aim, signer, number).await;
        assert_eq!(response.status(), 200);
        let view: Value = response.json().await.unwrap();
        if view["completed"] == json!(true) {
            return view;
        }
        assert!(tokio::time::Instant::now() < deadline, "ticket {number} never completed");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_ticket_visible_to_owner_only() {
    let mut config = test_config();
    config.example.work_duration = Duration::from_millis(200);
    let aim = TestAim::start_with(config).await;
    let (alice, bob) = (alice(), bob());

    let number = submit(&aim, &alice).await;
    assert_eq!(number, 1);

    let stranger = fetch(&aim, &bob, number).await;
    assert_eq!(stranger.status(), 403);

    let view = poll_completed(&aim, &alice, number).await;
    assert_eq!(view["ticket_number"], json!(number));
    assert_eq!(view["owner"], json!(alice.address().to_string()));
    assert_eq!(view["state"], "completed");
    assert_eq!(view["result"], json!({"ok": true, "value": {"result": "done"}}));

    // Default retention drops the ticket once its result was read.
    assert_eq!(fetch(&aim, &alice, number).await.status(), 404);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_clear_completed_ticket() {
    let mut config = test_config();
    config.dispatcher.retention = RetentionPolicy::Unbounded;
    let aim = TestAim::start_with(config).await;
    let alice = alice();

    let number = submit(&aim, &alice).await;
    aim.wait_completed(1).await;

    // Unbounded retention survives a fetch.
    poll_completed(&aim, &alice, number).await;
    assert_eq!(fetch(&aim, &alice, number).await.status(), 200);

    let forbidden = aim.sign(&bob(), "delete", &format!("/jobs/{number}"), None);
    assert_eq!(aim.deliver(&forbidden).await.status(), 403);

    let clear = aim.sign(&alice, "delete", &format!("/jobs/{number}"), None);
    assert_eq!(aim.deliver(&clear).await.status(), 204);
    assert_eq!(fetch(&aim, &alice, number).await.status(), 404);
    assert_eq!(aim.dispatcher.retained_tickets(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_unknown_ticket_not_found() {
    let aim = TestAim::start().await;
    let response = fetch(&aim, &alice(), 42).await;
    assert_eq!(response.status(), 404);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"]["code"], "ticket_not_found");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_shutdown_drains_admitted_tickets() {
    let mut config = test_config();
    config.example.work_duration = Duration::from_millis(100);
    let aim = TestAim::start_with(config).await;
    let dispatcher = aim.dispatcher.clone();
    let alice = alice();

    submit(&aim, &alice).await;
    submit(&aim, &alice).await;

    assert!(aim.stop().await);
    assert!(dispatcher.is_shut_down());
    assert_eq!(dispatcher.stats().completed, 2);
}

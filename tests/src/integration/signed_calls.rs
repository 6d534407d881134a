//! Signed synchronous calls: authentication, replay protection, cost
//! previews and queue order.

use std::time::Duration;

use aim_01_protocol::ProtocolVersion;
use aim_02_dispatcher::{JobDispatcher, QueueStatus};
use futures::future::join_all;
use serde_json::{json, Value};

use super::harness::{alice, bob, test_config, TestAim};

const BODY: &[u8] = br#"{"text": "hi."}"#;

async fn error_code(response: reqwest::Response) -> String {
    let body: Value = response.json().await.unwrap();
    body["error"]["code"].as_str().unwrap_or_default().to_string()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_signed_post_runs_model() {
    let aim = TestAim::start().await;
    let call = aim.sign(&alice(), "post", "/model", Some(BODY));

    let response = aim.deliver(&call).await;
    assert_eq!(response.status(), 200);
    assert_eq!(
        response
            .headers()
            .get("access-control-allow-origin")
            .and_then(|v| v.to_str().ok()),
        Some("*")
    );
    let body: Value = response.json().await.unwrap();
    assert_eq!(body, json!({"result": "done"}));

    // The synchronous waiter consumed the ticket.
    assert_eq!(aim.dispatcher.retained_tickets(), 0);
    assert!(aim.stop().await);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_tampered_body_rejected() {
    let aim = TestAim::start().await;
    let call = aim.sign(&alice(), "post", "/model", Some(BODY));

    let response = aim
        .deliver_with_body(&call, br#"{"text": "bye."}"#.to_vec())
        .await;
    assert_eq!(response.status(), 401);
    assert_eq!(error_code(response).await, "unauthenticated");
    assert_eq!(aim.dispatcher.stats().submitted, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_claimed_sender_must_match_signer() {
    let aim = TestAim::start().await;
    let mut call = aim.sign(&alice(), "get", "/model", None);
    let impostor = bob().address().to_string();
    for (name, value) in call.headers.iter_mut() {
        if name == "tx-sender" || name == "tx-origin" {
            *value = impostor.clone();
        }
    }

    let response = aim.deliver(&call).await;
    assert_eq!(response.status(), 401);
    assert_eq!(aim.dispatcher.stats().submitted, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_replayed_nonce_rejected() {
    let aim = TestAim::start().await;
    let call = aim.sign(&alice(), "get", "/model", None);

    assert_eq!(aim.deliver(&call).await.status(), 200);

    let replay = aim.deliver(&call).await;
    assert_eq!(replay.status(), 401);
    assert_eq!(error_code(replay).await, "replayed_nonce");
    assert_eq!(aim.dispatcher.stats().submitted, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_protocol_v1_rejected_unless_enabled() {
    let aim = TestAim::start().await;
    let call = aim.sign_with(&alice(), "get", "/model", None, |o| {
        o.version = ProtocolVersion::V1;
    });
    assert_eq!(aim.deliver(&call).await.status(), 401);
    drop(aim);

    let mut config = test_config();
    config.gateway.auth.accept_protocol_v1 = true;
    let aim = TestAim::start_with(config).await;
    let call = aim.sign_with(&alice(), "get", "/model", None, |o| {
        o.version = ProtocolVersion::V1;
    });
    assert_eq!(aim.deliver(&call).await.status(), 200);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_cost_preview_skips_queue() {
    let aim = TestAim::start().await;
    let call = aim.sign_with(&alice(), "post", "/model", Some(BODY), |o| {
        o.cost_only = true;
    });

    let response = aim.deliver(&call).await;
    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["min"], json!(0.0));
    assert_eq!(body["max"], json!(0.1));
    assert_eq!(body["estimated_cost"], json!(0.0));
    assert_eq!(body["currency"], "USD");
    assert_eq!(aim.dispatcher.stats().submitted, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_public_queue_status() {
    let aim = TestAim::start().await;

    let response = aim.public_get("/queue").await;
    assert_eq!(response.status(), 200);
    let headers = response.headers().clone();
    assert_eq!(headers.get("cost_used").unwrap(), "0");
    assert_eq!(headers.get("currency").unwrap(), "nullpay");

    let status: QueueStatus = response.json().await.unwrap();
    assert_eq!(status.pending_length, 0);
    assert_eq!(status.next_number, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_unsigned_call_rejected() {
    let aim = TestAim::start().await;
    let response = reqwest::Client::new()
        .post(format!("{}/model", aim.base_url))
        .body(BODY.to_vec())
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 401);
    assert_eq!(error_code(response).await, "unauthenticated");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_calls_share_one_worker() {
    let mut config = test_config();
    config.example.work_duration = Duration::from_millis(30);
    let aim = TestAim::start_with(config).await;

    let signer = alice();
    let calls: Vec<_> = (0..3)
        .map(|_| aim.sign(&signer, "post", "/model", Some(BODY)))
        .collect();
    let responses = join_all(calls.iter().map(|call| aim.deliver(call))).await;

    for response in responses {
        assert_eq!(response.status(), 200);
    }
    let status = aim.dispatcher.status();
    assert_eq!(status.current_number, 3);
    assert_eq!(status.next_number, 4);
    assert_eq!(status.pending_length, 0);
    assert_eq!(aim.dispatcher.stats().completed, 3);
}

//! The bundled example AIM.
//!
//! `/model` stands in for slow synchronous inference: each call occupies a
//! worker for `work_duration` and the caller waits for the result.
//! `/model/async` queues the same work and hands back a ticket number to
//! poll at `/jobs/:number`.

use std::sync::Arc;
use std::time::Duration;

use aim_02_dispatcher::{
    CompletionSink, Dispatcher, JobDispatcher, JobOutcome, TicketNumber, Work,
};
use aim_03_gateway::{
    cost_only_requested, cost_preview, outcome_response, ApiError, CallerIdentity, CostEstimate,
    Endpoint, EndpointManifest, EndpointRegistry, ExampleCall, PriceRange, RegistryError,
    ServiceManifest,
};
use axum::http::{HeaderMap, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::{json, Value};
use tracing::info;

use crate::config::ExampleConfig;

/// Currency the example endpoints price in.
pub const MODEL_CURRENCY: &str = "USD";

/// Per-call price quoted in the manifest and in cost previews.
pub const MODEL_PRICE: PriceRange = PriceRange {
    estimated_cost: 0.0,
    min: 0.0,
    max: 0.1,
};

struct ExampleService {
    dispatcher: Dispatcher,
    work_duration: Duration,
}

impl ExampleService {
    fn work(&self) -> Work {
        let duration = self.work_duration;
        Work::blocking(move || {
            std::thread::sleep(duration);
            Ok(json!({"result": "done"}))
        })
    }
}

pub fn service_manifest() -> ServiceManifest {
    ServiceManifest {
        documentation_url: "...".into(),
        license: "Open".into(),
        author: "AIM Contributors".into(),
        ..ServiceManifest::new("Example", "example", "0.1")
    }
}

fn model_manifest(documentation: &str, output: Value) -> EndpointManifest {
    EndpointManifest::new(documentation, MODEL_CURRENCY)
        .input_headers(json!({}))
        .input_body(json!({"text": "<Text>"}))
        .output(json!("<JSON>"))
        .price_per_call(MODEL_PRICE)
        .price_per_mb(MODEL_PRICE)
        .example(ExampleCall {
            method: "POST".into(),
            query: json!(""),
            headers: json!(""),
            body: Some(json!({"text": "hi."})),
            output,
        })
}

/// Endpoints of the example service.
pub fn registry(
    dispatcher: Dispatcher,
    config: &ExampleConfig,
) -> Result<EndpointRegistry, RegistryError> {
    let service = Arc::new(ExampleService {
        dispatcher,
        work_duration: config.work_duration,
    });
    let sync_service = Arc::clone(&service);
    let async_service = service;

    EndpointRegistry::new(service_manifest())
        .endpoint(Endpoint::new(
            "/model",
            &[Method::GET, Method::POST],
            model_manifest("Take a call", json!({"result": "done"})),
            move |caller: CallerIdentity, headers: HeaderMap| {
                model(Arc::clone(&sync_service), caller, headers)
            },
        ))?
        .endpoint(Endpoint::new(
            "/model/async",
            &[Method::POST],
            model_manifest(
                "Queue a call and return its ticket number; \
                 poll /jobs/<ticket_number> for the result",
                json!({"ticket_number": 1}),
            ),
            move |caller: CallerIdentity, headers: HeaderMap| {
                model_async(Arc::clone(&async_service), caller, headers)
            },
        ))
}

fn model_price() -> Json<CostEstimate> {
    cost_preview(CostEstimate::from_range(&MODEL_PRICE, MODEL_CURRENCY))
}

async fn model(
    service: Arc<ExampleService>,
    caller: CallerIdentity,
    headers: HeaderMap,
) -> Response {
    if cost_only_requested(&headers) {
        return model_price().into_response();
    }

    let owner = caller.address().copied();
    match service.dispatcher.submit_and_wait(owner, service.work()).await {
        Ok(outcome) => outcome_response(outcome),
        Err(e) => ApiError::from(e).into_response(),
    }
}

async fn model_async(
    service: Arc<ExampleService>,
    caller: CallerIdentity,
    headers: HeaderMap,
) -> Response {
    if cost_only_requested(&headers) {
        return model_price().into_response();
    }

    let owner = caller.address().copied();
    let on_complete: CompletionSink = Box::new(|number: TicketNumber, outcome: &JobOutcome| {
        info!(ticket = %number, outcome = outcome.label(), "Async model call finished");
    });
    match service
        .dispatcher
        .submit_async(owner, service.work(), Some(on_complete))
    {
        Ok(number) => (
            StatusCode::ACCEPTED,
            Json(json!({"ticket_number": number})),
        )
            .into_response(),
        Err(e) => ApiError::from(e).into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aim_02_dispatcher::DispatcherConfig;
    use aim_03_gateway::{AimServer, GatewayConfig};
    use axum::body::Body;
    use axum::http::Request;
    use axum::Router;
    use tower::ServiceExt;

    fn app() -> (Dispatcher, Router) {
        let dispatcher = Dispatcher::start(DispatcherConfig {
            tick_interval: Duration::from_millis(10),
            ..Default::default()
        })
        .unwrap();
        let example = ExampleConfig {
            work_duration: Duration::from_millis(5),
        };
        let mut gateway = GatewayConfig::default();
        gateway.auth.enabled = false;

        let registry = registry(dispatcher.clone(), &example).unwrap();
        let server = AimServer::new(gateway, registry, Arc::new(dispatcher.clone())).unwrap();
        (dispatcher, server.router())
    }

    async fn json_body(response: Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_model_waits_for_result() {
        let (dispatcher, router) = app();
        let response = router
            .oneshot(
                Request::post("/model")
                    .body(Body::from(r#"{"text": "hi."}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await, json!({"result": "done"}));
        assert_eq!(dispatcher.status().current_number, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_model_cost_preview() {
        let (dispatcher, router) = app();
        let response = router
            .oneshot(
                Request::get("/model")
                    .header("cost_only", "1")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let body = json_body(response).await;
        assert_eq!(body["max"], json!(0.1));
        assert_eq!(body["currency"], "USD");
        assert_eq!(dispatcher.stats().submitted, 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_async_model_returns_ticket() {
        let (dispatcher, router) = app();
        let response = router
            .clone()
            .oneshot(Request::post("/model/async").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);
        let ticket = json_body(response).await["ticket_number"].as_u64().unwrap();
        assert_eq!(ticket, 1);

        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        while dispatcher.status().current_number < 1 {
            assert!(tokio::time::Instant::now() < deadline, "job never completed");
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        let response = router
            .oneshot(
                Request::get(format!("/jobs/{ticket}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["completed"], json!(true));
        assert_eq!(body["result"]["value"], json!({"result": "done"}));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_manifest_lists_example_endpoints() {
        let (_dispatcher, router) = app();
        let response = router
            .oneshot(Request::get("/manifest.json").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let manifest = json_body(response).await;
        let uris: Vec<_> = manifest["endpoints"]
            .as_array()
            .unwrap()
            .iter()
            .map(|e| e["uri"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(uris, vec!["/queue", "/model", "/model/async"]);
        assert_eq!(manifest["license"], "Open");
    }
}

//! AIM gateway service - main entry point.
//!
//! Combines the built-in endpoints with the service's registered endpoints,
//! wraps them in the middleware stack and serves them over HTTP.

use crate::domain::config::GatewayConfig;
use crate::domain::error::GatewayError;
use crate::handlers::{self, GatewayState};
use crate::middleware::{create_cors_layer, static_cors_headers, AuthLayer};
use crate::registry::{EndpointRegistry, MANIFEST_PATH};
use aim_02_dispatcher::JobDispatcher;
use axum::{extract::DefaultBodyLimit, routing::get, Router};
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{set_header::SetResponseHeaderLayer, trace::TraceLayer};
use tracing::info;

/// HTTP front door of an AIM service
pub struct AimServer {
    config: GatewayConfig,
    registry: EndpointRegistry,
    dispatcher: Arc<dyn JobDispatcher>,
}

impl AimServer {
    /// Create a new server
    pub fn new(
        config: GatewayConfig,
        registry: EndpointRegistry,
        dispatcher: Arc<dyn JobDispatcher>,
    ) -> Result<Self, GatewayError> {
        config.validate()?;
        Ok(Self {
            config,
            registry,
            dispatcher,
        })
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    pub fn registry(&self) -> &EndpointRegistry {
        &self.registry
    }

    /// The complete router, middleware included.
    pub fn router(&self) -> Router {
        let state = GatewayState {
            dispatcher: Arc::clone(&self.dispatcher),
            currency: self.config.service.currency.clone(),
            manifest: Arc::new(self.registry.manifest()),
        };

        let mut builtin = Router::new()
            .route("/queue", get(handlers::queue))
            .route(
                "/jobs/:number",
                get(handlers::get_job).delete(handlers::clear_job),
            )
            .route("/metrics", get(handlers::metrics));
        if !self.registry.overrides_manifest() {
            builtin = builtin.route(MANIFEST_PATH, get(handlers::manifest));
        }

        let middleware = ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(create_cors_layer(&self.config.cors))
            .layer(AuthLayer::new(
                self.config.auth.clone(),
                self.config.limits.max_body_bytes,
            ));

        let mut router = builtin
            .with_state(state)
            .merge(self.registry.router())
            .fallback(handlers::not_found)
            .layer(DefaultBodyLimit::max(self.config.limits.max_body_bytes))
            .layer(middleware);

        // Outermost, so they are present on errors and preflights alike
        for (name, value) in static_cors_headers(&self.config.cors) {
            router = router.layer(SetResponseHeaderLayer::if_not_present(name, value));
        }

        router
    }

    /// Bind `http.host:http.port` and serve until `shutdown` resolves.
    pub async fn serve<F>(self, shutdown: F) -> Result<(), GatewayError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = self.config.http_addr();
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| GatewayError::Bind(format!("{addr}: {e}")))?;
        self.serve_on(listener, shutdown).await
    }

    /// Serve on an already bound listener.
    pub async fn serve_on<F>(self, listener: TcpListener, shutdown: F) -> Result<(), GatewayError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let router = self.router();
        let addr = listener
            .local_addr()
            .map_err(|e| GatewayError::Bind(e.to_string()))?;

        info!(
            addr = %addr,
            endpoints = self.registry.endpoints().len(),
            auth = self.config.auth.enabled,
            "AIM gateway listening"
        );

        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|e| GatewayError::Serve(e.to_string()))?;

        info!("AIM gateway stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::config::AuthConfig;
    use crate::domain::cost::{cost_only_requested, cost_preview, CostEstimate};
    use crate::domain::error::ApiError;
    use crate::domain::manifest::{EndpointManifest, ServiceManifest};
    use crate::handlers::outcome_response;
    use crate::middleware::CallerIdentity;
    use crate::registry::Endpoint;
    use aim_01_protocol::{CallOptions, RequestSigner, SigningKey};
    use aim_02_dispatcher::{Dispatcher, DispatcherConfig, RetentionPolicy, Work};
    use axum::body::Body;
    use axum::http::{HeaderMap, Method, Request, StatusCode};
    use axum::response::{IntoResponse, Response};
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::time::Duration;
    use tower::ServiceExt;

    static NONCE: AtomicU64 = AtomicU64::new(1);

    fn dispatcher(retention: RetentionPolicy) -> Dispatcher {
        Dispatcher::start(DispatcherConfig {
            tick_interval: Duration::from_millis(10),
            retention,
            ..Default::default()
        })
        .unwrap()
    }

    fn registry(dispatcher: &Dispatcher) -> EndpointRegistry {
        let d = dispatcher.clone();
        EndpointRegistry::new(ServiceManifest::new("Example", "example", "0.1"))
            .endpoint(Endpoint::new(
                "/model",
                &[Method::GET, Method::POST],
                EndpointManifest::new("Take a call", "USD"),
                move |caller: CallerIdentity, headers: HeaderMap| {
                    let d = d.clone();
                    async move {
                        if cost_only_requested(&headers) {
                            return cost_preview(CostEstimate::free("USD")).into_response();
                        }
                        let work = Work::blocking(|| Ok(json!({"result": "done"})));
                        match d.submit_and_wait(caller.address().copied(), work).await {
                            Ok(outcome) => outcome_response(outcome),
                            Err(e) => ApiError::from(e).into_response(),
                        }
                    }
                },
            ))
            .unwrap()
    }

    fn config() -> GatewayConfig {
        let mut config = GatewayConfig::default();
        config.auth = AuthConfig {
            path_prefix: Some("/aim/7".into()),
            ..Default::default()
        };
        config
    }

    fn server(dispatcher: &Dispatcher) -> AimServer {
        AimServer::new(config(), registry(dispatcher), Arc::new(dispatcher.clone())).unwrap()
    }

    fn signer() -> RequestSigner {
        RequestSigner::new(SigningKey::random(&mut rand::thread_rng()))
    }

    fn signed(signer: &RequestSigner, method: &str, uri: &str, cost_only: bool) -> Request<Body> {
        let mut options = CallOptions::new(method, "7", uri);
        options.nonce = Some(NONCE.fetch_add(1, Ordering::SeqCst).to_string());
        options.cost_only = cost_only;
        let call = signer.sign_call(&options).unwrap();

        let mut builder = Request::builder().method(call.method.as_str()).uri(uri);
        for (name, value) in &call.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        builder.body(Body::empty()).unwrap()
    }

    fn public(method: Method, uri: &str) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header("isPublic", "1")
            .body(Body::empty())
            .unwrap()
    }

    async fn json_body(response: Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_manifest_lists_queue_first() {
        let d = dispatcher(RetentionPolicy::UntilFetched);
        let response = server(&d)
            .router()
            .oneshot(Request::get("/manifest.json").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let manifest = json_body(response).await;
        assert_eq!(manifest["name"], "Example");
        assert_eq!(manifest["endpoints"][0]["uri"], "/queue");
        assert_eq!(manifest["endpoints"][0]["currency"], "nullpay");
        assert_eq!(manifest["endpoints"][1]["uri"], "/model");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_manifest_override() {
        let d = dispatcher(RetentionPolicy::UntilFetched);
        let registry = EndpointRegistry::new(ServiceManifest::new("Custom", "custom", "1"))
            .endpoint(Endpoint::new(
                MANIFEST_PATH,
                &[Method::GET],
                EndpointManifest::new("hand-written manifest", "nullpay"),
                || async { axum::Json(json!({"custom": true})) },
            ))
            .unwrap();
        let server = AimServer::new(config(), registry, Arc::new(d)).unwrap();

        let response = server
            .router()
            .oneshot(Request::get("/manifest.json").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(json_body(response).await, json!({"custom": true}));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_queue_status_headers() {
        let d = dispatcher(RetentionPolicy::UntilFetched);
        let response = server(&d)
            .router()
            .oneshot(public(Method::GET, "/queue"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let headers = response.headers();
        assert_eq!(headers["cost_used"], "0");
        assert_eq!(headers["currency"], "nullpay");
        assert_eq!(headers["access-control-allow-origin"], "*");
        assert_eq!(headers["access-control-allow-methods"], "GET, POST");
        assert_eq!(headers["access-control-allow-headers"], "*");
        assert_eq!(headers["access-control-allow-credentials"], "false");

        let body = json_body(response).await;
        assert_eq!(body["queue_length"], 0);
        assert_eq!(body["current_job_number"], 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_queue_cost_preview() {
        let d = dispatcher(RetentionPolicy::UntilFetched);
        let mut request = public(Method::GET, "/queue");
        request
            .headers_mut()
            .insert("cost_only", "1".parse().unwrap());

        let response = server(&d).router().oneshot(request).await.unwrap();
        let body = json_body(response).await;
        assert_eq!(
            body,
            json!({"min": 0.0, "max": 0.0, "estimated_cost": 0.0, "currency": "USDC"})
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_unsigned_call_rejected_with_cors_headers() {
        let d = dispatcher(RetentionPolicy::UntilFetched);
        let request = Request::post("/model").body(Body::empty()).unwrap();
        let response = server(&d).router().oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(response.headers()["access-control-allow-origin"], "*");
        let body = json_body(response).await;
        assert_eq!(body["error"]["code"], "unauthenticated");
        assert_eq!(d.stats().submitted, 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_signed_model_call_runs_job() {
        let d = dispatcher(RetentionPolicy::UntilFetched);
        let signer = signer();
        let response = server(&d)
            .router()
            .oneshot(signed(&signer, "POST", "/model", false))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await, json!({"result": "done"}));
        assert_eq!(d.stats().submitted, 1);
        assert_eq!(d.status().current_number, 1);
        assert_eq!(d.retained_tickets(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_cost_preview_creates_no_ticket() {
        let d = dispatcher(RetentionPolicy::UntilFetched);
        let response = server(&d)
            .router()
            .oneshot(signed(&signer(), "POST", "/model", true))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["currency"], "USD");
        assert_eq!(d.stats().submitted, 0);
    }

    async fn completed_ticket(d: &Dispatcher, owner: &RequestSigner) -> u64 {
        let (tx, rx) = tokio::sync::oneshot::channel();
        let number = d
            .submit_async(
                Some(owner.address()),
                Work::blocking(|| Ok(json!(42))),
                Some(Box::new(move |_, _| {
                    let _ = tx.send(());
                })),
            )
            .unwrap();
        tokio::time::timeout(Duration::from_secs(5), rx)
            .await
            .unwrap()
            .unwrap();
        number.value()
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_job_retrieval_ownership() {
        let d = dispatcher(RetentionPolicy::UntilFetched);
        let router = server(&d).router();
        let owner = signer();
        let number = completed_ticket(&d, &owner).await;
        let uri = format!("/jobs/{number}");

        let response = router
            .clone()
            .oneshot(signed(&signer(), "GET", &uri, false))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let response = router
            .clone()
            .oneshot(signed(&owner, "GET", &uri, false))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["ticket_number"], json!(number));
        assert_eq!(body["completed"], json!(true));
        assert_eq!(body["result"], json!({"ok": true, "value": 42}));

        // Evicted by the first successful fetch
        let response = router
            .oneshot(signed(&owner, "GET", &uri, false))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(json_body(response).await["error"]["code"], "ticket_not_found");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_job_clear() {
        let d = dispatcher(RetentionPolicy::Unbounded);
        let router = server(&d).router();
        let owner = signer();
        let number = completed_ticket(&d, &owner).await;
        let uri = format!("/jobs/{number}");

        let response = router
            .clone()
            .oneshot(signed(&owner, "DELETE", &uri, false))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let response = router
            .clone()
            .oneshot(signed(&owner, "DELETE", &uri, false))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = router
            .oneshot(signed(&owner, "GET", "/jobs/zero", false))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_unknown_path_is_json_404() {
        let d = dispatcher(RetentionPolicy::UntilFetched);
        let response = server(&d)
            .router()
            .oneshot(public(Method::GET, "/nowhere"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(json_body(response).await["error"]["code"], "not_found");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_shut_down_dispatcher_returns_503() {
        let d = dispatcher(RetentionPolicy::UntilFetched);
        d.shutdown();
        let response = server(&d)
            .router()
            .oneshot(signed(&signer(), "POST", "/model", false))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_metrics_served_without_auth() {
        aim_telemetry::register_metrics().unwrap();
        let d = dispatcher(RetentionPolicy::UntilFetched);
        let response = server(&d)
            .router()
            .oneshot(Request::get("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_serve_on_stops_on_shutdown() {
        let d = dispatcher(RetentionPolicy::UntilFetched);
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();

        let handle = tokio::spawn(server(&d).serve_on(listener, async move {
            let _ = rx.await;
        }));
        tx.send(()).unwrap();

        let result = tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_invalid_config_rejected() {
        let d = dispatcher(RetentionPolicy::UntilFetched);

        let mut config = GatewayConfig::default();
        config.limits.max_body_bytes = 0;
        let result = AimServer::new(config, registry(&d), Arc::new(d.clone()));
        assert!(matches!(result, Err(GatewayError::Config(_))));
    }
}

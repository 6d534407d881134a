//! A running example AIM plus signing helpers.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use aim_01_protocol::{parse_signing_key, CallOptions, ProtocolVersion, RequestSigner, SignedCall};
use aim_02_dispatcher::Dispatcher;
use aim_runtime::config::RuntimeConfig;
use aim_runtime::AimRuntime;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

pub const SLOT: &str = "7";
pub const PREFIX: &str = "/aim/7";

pub const ALICE_KEY: &str = "4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318";
pub const BOB_KEY: &str = "8da4ef21b864d2cc526dbdb2a120bd2874c36c9d0a1fb7f8c63d7f7a8b41de8f";

static NONCE: AtomicU64 = AtomicU64::new(1);

pub fn alice() -> RequestSigner {
    RequestSigner::new(parse_signing_key(ALICE_KEY).unwrap())
}

pub fn bob() -> RequestSigner {
    RequestSigner::new(parse_signing_key(BOB_KEY).unwrap())
}

/// Defaults used by every flow: signed auth under `/aim/7`, a fast tick and
/// short model work.
pub fn test_config() -> RuntimeConfig {
    let mut config = RuntimeConfig::default();
    config.gateway.auth.path_prefix = Some(PREFIX.to_string());
    config.dispatcher.tick_interval = Duration::from_millis(10);
    config.example.work_duration = Duration::from_millis(20);
    config
}

pub struct TestAim {
    pub base_url: String,
    pub dispatcher: Dispatcher,
    http: reqwest::Client,
    shutdown: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<bool>>,
}

impl TestAim {
    pub async fn start() -> Self {
        Self::start_with(test_config()).await
    }

    pub async fn start_with(config: RuntimeConfig) -> Self {
        let runtime = AimRuntime::new(config).unwrap();
        let dispatcher = runtime.dispatcher().clone();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base_url = format!("http://{}", listener.local_addr().unwrap());

        let (tx, rx) = oneshot::channel::<()>();
        let handle = tokio::spawn(async move {
            runtime
                .run_on(listener, async move {
                    let _ = rx.await;
                })
                .await
                .is_ok()
        });

        Self {
            base_url,
            dispatcher,
            http: reqwest::Client::new(),
            shutdown: Some(tx),
            handle: Some(handle),
        }
    }

    /// Sign a V2 call for `uri` in the test slot.
    pub fn sign(
        &self,
        signer: &RequestSigner,
        method: &str,
        uri: &str,
        body: Option<&[u8]>,
    ) -> SignedCall {
        self.sign_with(signer, method, uri, body, |_| {})
    }

    pub fn sign_with(
        &self,
        signer: &RequestSigner,
        method: &str,
        uri: &str,
        body: Option<&[u8]>,
        customize: impl FnOnce(&mut CallOptions),
    ) -> SignedCall {
        let mut options = CallOptions::new(method, SLOT, uri);
        options.version = ProtocolVersion::V2;
        options.nonce = Some(NONCE.fetch_add(1, Ordering::SeqCst).to_string());
        options.body = body.map(<[u8]>::to_vec);
        customize(&mut options);
        signer.sign_call(&options).unwrap()
    }

    /// Deliver `call` the way a node proxy would: slot prefix stripped.
    pub async fn deliver(&self, call: &SignedCall) -> reqwest::Response {
        let body = call.body.clone().unwrap_or_default();
        self.deliver_with_body(call, body).await
    }

    /// Deliver `call` with a body other than the one that was signed.
    pub async fn deliver_with_body(&self, call: &SignedCall, body: Vec<u8>) -> reqwest::Response {
        let uri = call.path.strip_prefix(PREFIX).unwrap_or(&call.path);
        let method = reqwest::Method::from_bytes(call.method.as_bytes()).unwrap();

        let mut request = self
            .http
            .request(method, format!("{}{}", self.base_url, uri))
            .body(body);
        for (name, value) in &call.headers {
            request = request.header(name.as_str(), value.as_str());
        }
        request.send().await.unwrap()
    }

    /// Unsigned GET marked `isPublic`.
    pub async fn public_get(&self, uri: &str) -> reqwest::Response {
        self.http
            .get(format!("{}{}", self.base_url, uri))
            .header("isPublic", "1")
            .send()
            .await
            .unwrap()
    }

    /// Wait until `n` tickets have completed.
    pub async fn wait_completed(&self, n: u64) {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
        while self.dispatcher.stats().completed < n {
            assert!(
                tokio::time::Instant::now() < deadline,
                "only {} of {} tickets completed",
                self.dispatcher.stats().completed,
                n
            );
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    /// Trigger graceful shutdown and wait for the runtime to return.
    pub async fn stop(mut self) -> bool {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        match self.handle.take() {
            Some(handle) => handle.await.unwrap_or(false),
            None => false,
        }
    }
}

impl Drop for TestAim {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}

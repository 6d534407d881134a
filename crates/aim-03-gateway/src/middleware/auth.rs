//! Signature authentication middleware.
//!
//! Every request except `/manifest.json`, `/metrics` and `OPTIONS` must either
//! declare itself public (`ispublic` header) or carry a valid wallet
//! signature. The body is buffered (bounded) so the canonical message can be
//! rebuilt, then handed on untouched. Handlers read the outcome through the
//! [`CallerIdentity`] extractor.

use crate::domain::config::AuthConfig;
use crate::domain::error::ApiError;
use crate::middleware::replay::NonceCache;
use aim_01_protocol::{
    header_value, is_public_request, verify_request, Address, ProtocolError, RequestParts,
    VerifyOptions, HEADER_SENDER,
};
use axum::{
    body::Body,
    extract::FromRequestParts,
    http::{request::Parts, HeaderMap, Method, Request, Uri},
    response::{IntoResponse, Response},
};
use std::convert::Infallible;
use std::sync::Arc;
use tower::{Layer, Service};
use tracing::{debug, warn};

/// Paths served without authentication.
pub const OPEN_PATHS: [&str; 2] = ["/manifest.json", "/metrics"];

/// Who is calling.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CallerIdentity {
    /// Unauthenticated (`ispublic`, open paths, or auth disabled).
    Public,
    /// A wallet whose signature was verified.
    Wallet(Address),
}

impl CallerIdentity {
    pub fn address(&self) -> Option<&Address> {
        match self {
            Self::Public => None,
            Self::Wallet(address) => Some(address),
        }
    }

    pub fn is_public(&self) -> bool {
        matches!(self, Self::Public)
    }
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for CallerIdentity
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts
            .extensions
            .get::<CallerIdentity>()
            .cloned()
            .unwrap_or(CallerIdentity::Public))
    }
}

struct AuthState {
    config: AuthConfig,
    max_body_bytes: usize,
    replay: Option<NonceCache>,
}

/// Authentication layer
#[derive(Clone)]
pub struct AuthLayer {
    state: Arc<AuthState>,
}

impl AuthLayer {
    pub fn new(config: AuthConfig, max_body_bytes: usize) -> Self {
        let replay = config
            .reject_replayed_nonces
            .then(|| NonceCache::new(config.nonce_cache_capacity));
        Self {
            state: Arc::new(AuthState {
                config,
                max_body_bytes,
                replay,
            }),
        }
    }
}

impl<S> Layer<S> for AuthLayer {
    type Service = AuthService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        AuthService {
            inner,
            state: Arc::clone(&self.state),
        }
    }
}

/// Authentication service
#[derive(Clone)]
pub struct AuthService<S> {
    inner: S,
    state: Arc<AuthState>,
}

impl<S> Service<Request<Body>> for AuthService<S>
where
    S: Service<Request<Body>, Response = Response> + Clone + Send + 'static,
    S::Future: Send,
{
    type Response = Response;
    type Error = S::Error;
    type Future = std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>> + Send>,
    >;

    fn poll_ready(
        &mut self,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<Body>) -> Self::Future {
        let state = Arc::clone(&self.state);
        let mut inner = self.inner.clone();

        Box::pin(async move {
            if bypasses_auth(req.method(), req.uri()) {
                req.extensions_mut().insert(CallerIdentity::Public);
                return inner.call(req).await;
            }

            let headers = header_pairs(req.headers());

            if is_public_request(&headers) {
                debug!(path = %req.uri().path(), "Public call");
                req.extensions_mut().insert(CallerIdentity::Public);
                return inner.call(req).await;
            }

            if !state.config.enabled {
                let identity = header_value(&headers, HEADER_SENDER)
                    .and_then(|sender| sender.parse().ok())
                    .map_or(CallerIdentity::Public, CallerIdentity::Wallet);
                req.extensions_mut().insert(identity);
                return inner.call(req).await;
            }

            let (mut parts, body) = req.into_parts();
            let bytes = match axum::body::to_bytes(body, state.max_body_bytes).await {
                Ok(bytes) => bytes,
                Err(e) => {
                    warn!(error = %e, limit = state.max_body_bytes, "Request body rejected");
                    return Ok(ApiError::payload_too_large(state.max_body_bytes).into_response());
                }
            };

            let path = signed_path(state.config.path_prefix.as_deref(), &parts.uri);
            let options = VerifyOptions {
                accept_protocol_v1: state.config.accept_protocol_v1,
            };
            let verified = verify_request(
                &RequestParts {
                    method: parts.method.as_str(),
                    path: &path,
                    headers: &headers,
                    body: &bytes,
                },
                &options,
            );

            let caller = match verified {
                Ok(caller) => caller,
                Err(err) => {
                    let reason = failure_reason(&err);
                    aim_telemetry::AUTH_FAILURES
                        .with_label_values(&[reason])
                        .inc();
                    warn!(path = %path, reason, error = %err, "Authentication failed");
                    return Ok(ApiError::unauthenticated(err.to_string()).into_response());
                }
            };

            if let Some(cache) = &state.replay {
                if !cache.check_and_insert(caller.address, &caller.nonce) {
                    aim_telemetry::AUTH_FAILURES
                        .with_label_values(&["replayed_nonce"])
                        .inc();
                    warn!(sender = %caller.address, nonce = %caller.nonce, "Replayed nonce");
                    return Ok(ApiError::replayed_nonce().into_response());
                }
            }

            parts
                .extensions
                .insert(CallerIdentity::Wallet(caller.address));
            inner.call(Request::from_parts(parts, Body::from(bytes))).await
        })
    }
}

fn bypasses_auth(method: &Method, uri: &Uri) -> bool {
    *method == Method::OPTIONS || OPEN_PATHS.contains(&uri.path())
}

/// Headers as string pairs. Values that are not visible ASCII are skipped.
fn header_pairs(headers: &HeaderMap) -> Vec<(String, String)> {
    headers
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_string(), v.to_string()))
        })
        .collect()
}

/// The path the caller signed: the node-side prefix plus what reached us.
fn signed_path(prefix: Option<&str>, uri: &Uri) -> String {
    let tail = uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or_else(|| uri.path());
    match prefix {
        Some(prefix) => format!("{prefix}{tail}"),
        None => tail.to_string(),
    }
}

/// Metric label for a verification failure.
fn failure_reason(err: &ProtocolError) -> &'static str {
    match err {
        ProtocolError::MissingNonce => "missing_nonce",
        ProtocolError::MissingHeader(_) => "missing_signature",
        ProtocolError::UnsupportedVersion(_) => "unsupported_version",
        ProtocolError::VersionDisabled => "version_disabled",
        ProtocolError::InvalidSignatureEncoding
        | ProtocolError::InvalidFormat
        | ProtocolError::InvalidRecoveryId(_) => "bad_signature",
        ProtocolError::MalleableSignature => "malleable_signature",
        ProtocolError::RecoveryFailed => "recovery_failed",
        ProtocolError::InvalidAddress(_) => "bad_sender",
        ProtocolError::SignerMismatch { .. } => "signer_mismatch",
        ProtocolError::SigningFailed | ProtocolError::InvalidPrivateKey => "internal",
    }
}

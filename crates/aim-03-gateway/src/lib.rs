//! # AIM Gateway (AIM-03)
//!
//! HTTP front door of an AIM service: publishes the manifest, authenticates
//! callers by wallet signature and exposes the job queue.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                        AIM GATEWAY (aim-03)                      │
//! ├──────────────────────────────────────────────────────────────────┤
//! │  ┌────────────────────────────────────────────────────────┐      │
//! │  │                  Middleware Stack                      │      │
//! │  │   CORS headers → Trace → CORS → Auth (V2 signature)     │      │
//! │  └──────────────────────────┬─────────────────────────────┘      │
//! │                             │                                    │
//! │  ┌──────────────────────────┴─────────────────────────────┐      │
//! │  │ Built-in: /queue  /jobs/:n  /manifest.json  /metrics   │      │
//! │  │ Registered: service endpoints (EndpointRegistry)       │      │
//! │  └──────────────────────────┬─────────────────────────────┘      │
//! └─────────────────────────────┼────────────────────────────────────┘
//!                               │
//!                     JobDispatcher (aim-02)
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use aim_03_gateway::{AimServer, Endpoint, EndpointRegistry, GatewayConfig, ServiceManifest};
//!
//! let registry = EndpointRegistry::new(ServiceManifest::new("Example", "example", "0.1"))
//!     .endpoint(Endpoint::new("/model", &[Method::POST], manifest, handler))?;
//! let server = AimServer::new(GatewayConfig::default(), registry, Arc::new(dispatcher))?;
//! server.serve(shutdown_signal()).await?;
//! ```
//!
//! # Security
//!
//! - Signatures are checked over the canonical message rebuilt from the
//!   received request, never over caller-supplied summaries
//! - `(sender, nonce)` pairs are accepted once
//! - Request bodies are bounded before buffering

#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod domain;
pub mod handlers;
pub mod middleware;
pub mod registry;
pub mod service;

pub use domain::{
    codes, cost_only_requested, cost_preview, publish, queue_manifest, ApiError, AuthConfig,
    ConfigError, CorsConfig, CostEstimate, EndpointManifest, ExampleCall, GatewayConfig,
    GatewayError, HttpConfig, LimitsConfig, PriceRange, ServiceConfig, ServiceManifest,
    QUEUE_CURRENCY,
};
pub use handlers::{outcome_response, GatewayState};
pub use middleware::{AuthLayer, CallerIdentity, NonceCache};
pub use registry::{Endpoint, EndpointRegistry, RegistryError, MANIFEST_PATH};
pub use service::AimServer;

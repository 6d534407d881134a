//! Domain layer for the gateway.

pub mod config;
pub mod cost;
pub mod error;
pub mod manifest;

pub use config::{
    AuthConfig, ConfigError, CorsConfig, GatewayConfig, HttpConfig, LimitsConfig, ServiceConfig,
};
pub use cost::{cost_only_requested, cost_preview, CostEstimate, COST_ONLY_HEADERS};
pub use error::{codes, ApiError, GatewayError};
pub use manifest::{
    publish, queue_manifest, EndpointManifest, ExampleCall, PriceRange, ServiceManifest,
    QUEUE_CURRENCY,
};

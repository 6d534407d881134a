//! Gateway configuration with validation.

use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};

/// Main gateway configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// HTTP listener
    pub http: HttpConfig,
    /// CORS policy
    pub cors: CorsConfig,
    /// Request limits
    pub limits: LimitsConfig,
    /// Signature authentication
    pub auth: AuthConfig,
    /// Service-level settings
    pub service: ServiceConfig,
}

impl GatewayConfig {
    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.limits.max_body_bytes == 0 {
            return Err(ConfigError::InvalidLimit(
                "max_body_bytes cannot be 0".into(),
            ));
        }

        if self.auth.reject_replayed_nonces && self.auth.nonce_cache_capacity == 0 {
            return Err(ConfigError::InvalidLimit(
                "nonce_cache_capacity cannot be 0 while replay protection is on".into(),
            ));
        }

        if let Some(prefix) = &self.auth.path_prefix {
            if !prefix.starts_with('/') || prefix.ends_with('/') {
                return Err(ConfigError::Invalid(format!(
                    "path_prefix must start with '/' and not end with one: {prefix:?}"
                )));
            }
        }

        if self.service.currency.trim().is_empty() {
            return Err(ConfigError::Invalid("currency cannot be empty".into()));
        }

        if self.cors.enabled && self.cors.allow_credentials {
            let wildcard = |list: &[String]| list.iter().any(|v| v == "*");
            if wildcard(&self.cors.allowed_origins) || wildcard(&self.cors.allowed_headers) {
                return Err(ConfigError::Invalid(
                    "CORS credentials cannot be combined with wildcard origins or headers".into(),
                ));
            }
        }

        Ok(())
    }

    /// Get HTTP server bind address
    pub fn http_addr(&self) -> SocketAddr {
        SocketAddr::new(self.http.host, self.http.port)
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Bind address
    pub host: IpAddr,
    /// Port (default: 4000)
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0)),
            port: 4000,
        }
    }
}

/// Request limits
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Max request body size in bytes (default: 10MB)
    pub max_body_bytes: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_body_bytes: 10 * 1024 * 1024,
        }
    }
}

/// Signature authentication settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Verify signatures. When off, `tx-sender` is taken at face value.
    pub enabled: bool,
    /// Prefix the node strips before forwarding, e.g. `/aim/7`.
    /// Signatures cover the path the caller saw, so it is prepended again.
    pub path_prefix: Option<String>,
    /// Accept signatures over the bare nonce
    pub accept_protocol_v1: bool,
    /// Reject a `(sender, nonce)` pair seen before
    pub reject_replayed_nonces: bool,
    /// Remembered pairs before the oldest is forgotten
    pub nonce_cache_capacity: usize,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path_prefix: None,
            accept_protocol_v1: false,
            reject_replayed_nonces: true,
            nonce_cache_capacity: 100_000,
        }
    }
}

/// Service-level settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Currency quoted in cost previews
    pub currency: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            currency: "USDC".to_string(),
        }
    }
}

/// CORS configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CorsConfig {
    /// Enable CORS
    pub enabled: bool,
    /// Allowed origins ("*" for all)
    pub allowed_origins: Vec<String>,
    /// Allowed methods
    pub allowed_methods: Vec<String>,
    /// Allowed headers ("*" for all)
    pub allowed_headers: Vec<String>,
    /// Expose headers
    pub expose_headers: Vec<String>,
    /// Max age for preflight cache
    pub max_age: u64,
    /// Allow credentials
    pub allow_credentials: bool,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            allowed_origins: vec!["*".to_string()],
            allowed_methods: vec!["GET".to_string(), "POST".to_string()],
            allowed_headers: vec!["*".to_string()],
            expose_headers: vec!["cost_used".to_string(), "currency".to_string()],
            max_age: 86400, // 24 hours
            allow_credentials: false,
        }
    }
}

/// Configuration errors
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    /// Invalid size or count limit
    #[error("invalid limit: {0}")]
    InvalidLimit(String),
    /// General configuration error
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

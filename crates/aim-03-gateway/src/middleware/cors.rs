//! CORS middleware.
//!
//! Wrapper around tower-http CORS with gateway configuration. Clients of the
//! service read the CORS headers from every response, not only from requests
//! carrying an `Origin`, so [`static_cors_headers`] lists the fixed headers
//! the router stamps on all responses.

use crate::domain::config::CorsConfig;
use axum::http::{header, HeaderName, HeaderValue, Method};
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer as TowerCorsLayer};

/// Create CORS layer from gateway config
pub fn create_cors_layer(config: &CorsConfig) -> TowerCorsLayer {
    if !config.enabled {
        return TowerCorsLayer::new();
    }

    let mut cors = TowerCorsLayer::new();

    if config.allowed_origins.iter().any(|o| o == "*") {
        cors = cors.allow_origin(Any);
    } else {
        let origins: Vec<HeaderValue> = config
            .allowed_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        cors = cors.allow_origin(origins);
    }

    let methods: Vec<Method> = config
        .allowed_methods
        .iter()
        .filter_map(|m| m.parse().ok())
        .collect();
    cors = cors.allow_methods(methods);

    if config.allowed_headers.iter().any(|h| h == "*") {
        cors = cors.allow_headers(Any);
    } else {
        let headers: Vec<HeaderName> = config
            .allowed_headers
            .iter()
            .filter_map(|h| h.parse().ok())
            .collect();
        cors = cors.allow_headers(headers);
    }

    if !config.expose_headers.is_empty() {
        let expose: Vec<HeaderName> = config
            .expose_headers
            .iter()
            .filter_map(|h| h.parse().ok())
            .collect();
        cors = cors.expose_headers(expose);
    }

    cors = cors.max_age(Duration::from_secs(config.max_age));

    if config.allow_credentials {
        cors = cors.allow_credentials(true);
    }

    cors
}

/// Fixed CORS headers for every response.
///
/// A multi-origin allow-list has no single static value, so the origin header
/// is only included for `*` or a single origin.
pub fn static_cors_headers(config: &CorsConfig) -> Vec<(HeaderName, HeaderValue)> {
    if !config.enabled {
        return Vec::new();
    }

    let mut headers = Vec::with_capacity(4);

    let origin = match config.allowed_origins.as_slice() {
        list if list.iter().any(|o| o == "*") => Some("*".to_string()),
        [single] => Some(single.clone()),
        _ => None,
    };
    if let Some(value) = origin.and_then(|o| HeaderValue::from_str(&o).ok()) {
        headers.push((header::ACCESS_CONTROL_ALLOW_ORIGIN, value));
    }

    if let Ok(value) = HeaderValue::from_str(&config.allowed_methods.join(", ")) {
        headers.push((header::ACCESS_CONTROL_ALLOW_METHODS, value));
    }

    if let Ok(value) = HeaderValue::from_str(&config.allowed_headers.join(", ")) {
        headers.push((header::ACCESS_CONTROL_ALLOW_HEADERS, value));
    }

    headers.push((
        header::ACCESS_CONTROL_ALLOW_CREDENTIALS,
        HeaderValue::from_static(if config.allow_credentials { "true" } else { "false" }),
    ));

    headers
}

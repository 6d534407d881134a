//! Explicit endpoint registry.
//!
//! Services list their endpoints up front; the registry validates them,
//! builds the routes and assembles the published manifest. The built-in
//! `/queue` manifest always comes first.

use axum::handler::Handler;
use axum::http::Method;
use axum::routing::{on, MethodFilter, MethodRouter};
use axum::Router;
use serde_json::Value;
use thiserror::Error;

use crate::domain::manifest::{publish, queue_manifest, EndpointManifest, ServiceManifest};

/// Path that replaces the generated manifest when registered.
pub const MANIFEST_PATH: &str = "/manifest.json";

/// Paths owned by the gateway itself.
pub const RESERVED_PATHS: [&str; 3] = ["/metrics", "/queue", "/jobs"];

/// Route patterns the gateway mounts next to service endpoints.
const BUILTIN_ROUTES: [&str; 4] = ["/queue", "/jobs/:number", "/metrics", MANIFEST_PATH];

/// Registration errors. These are configuration mistakes and fatal at build time.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("invalid endpoint uri: {0:?}")]
    InvalidUri(String),

    #[error("endpoint {0} lists no methods")]
    NoMethods(String),

    #[error("endpoint {uri} lists unsupported method {method}")]
    UnsupportedMethod { uri: String, method: String },

    #[error("endpoint {0} is registered twice")]
    Duplicate(String),

    #[error("endpoint {0} collides with a built-in path")]
    Reserved(String),

    #[error("endpoint {uri} overlaps route {existing}")]
    Conflict { uri: String, existing: String },
}

/// A service endpoint: uri, methods, manifest entry and handler.
pub struct Endpoint {
    uri: String,
    methods: Vec<Method>,
    manifest: EndpointManifest,
    route: Result<MethodRouter, RegistryError>,
}

impl Endpoint {
    pub fn new<H, T>(
        uri: impl Into<String>,
        methods: &[Method],
        mut manifest: EndpointManifest,
        handler: H,
    ) -> Self
    where
        H: Handler<T, ()>,
        T: 'static,
    {
        let uri = uri.into();
        manifest.uri = uri.clone();
        let route = method_filter(&uri, methods).map(|filter| on(filter, handler));
        Self {
            uri,
            methods: methods.to_vec(),
            manifest,
            route,
        }
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn methods(&self) -> &[Method] {
        &self.methods
    }

    pub fn manifest(&self) -> &EndpointManifest {
        &self.manifest
    }
}

impl std::fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Endpoint")
            .field("uri", &self.uri)
            .field("methods", &self.methods)
            .finish_non_exhaustive()
    }
}

fn method_filter(uri: &str, methods: &[Method]) -> Result<MethodFilter, RegistryError> {
    let mut combined: Option<MethodFilter> = None;
    for method in methods {
        let filter =
            MethodFilter::try_from(method.clone()).map_err(|_| RegistryError::UnsupportedMethod {
                uri: uri.to_string(),
                method: method.to_string(),
            })?;
        combined = Some(match combined {
            Some(acc) => acc.or(filter),
            None => filter,
        });
    }
    combined.ok_or_else(|| RegistryError::NoMethods(uri.to_string()))
}

/// One `/`-separated piece of a route pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Segment<'a> {
    Static(&'a str),
    Param(&'a str),
    CatchAll(&'a str),
}

/// Split `uri` into route segments, or `None` if the router would reject it.
///
/// Captures (`:name`, `*name`) must fill a whole segment and a catch-all
/// must be last.
fn parse_route(uri: &str) -> Option<Vec<Segment<'_>>> {
    let rest = uri.strip_prefix('/')?;
    let pieces: Vec<&str> = rest.split('/').collect();
    let last = pieces.len() - 1;

    let mut segments = Vec::with_capacity(pieces.len());
    for (i, piece) in pieces.into_iter().enumerate() {
        let segment = if let Some(name) = piece.strip_prefix(':') {
            Segment::Param(name)
        } else if let Some(name) = piece.strip_prefix('*') {
            if i != last {
                return None;
            }
            Segment::CatchAll(name)
        } else {
            if piece.is_empty() && i != last {
                return None;
            }
            Segment::Static(piece)
        };
        match segment {
            Segment::Static(text) if text.contains([':', '*']) => return None,
            Segment::Param(name) | Segment::CatchAll(name)
                if name.is_empty() || name.contains([':', '*']) =>
            {
                return None
            }
            _ => {}
        }
        segments.push(segment);
    }
    Some(segments)
}

/// Whether two route patterns could claim the same request path.
///
/// Static segments that differ separate the routes; a capture next to
/// anything but an identically named capture does not.
fn routes_overlap(a: &[Segment<'_>], b: &[Segment<'_>]) -> bool {
    for (x, y) in a.iter().zip(b) {
        match (x, y) {
            (Segment::Static(l), Segment::Static(r)) if l == r => {}
            (Segment::Static(_), Segment::Static(_)) => return false,
            (Segment::Param(l), Segment::Param(r)) if l == r => {}
            _ => return true,
        }
    }
    a.len() == b.len()
}

fn is_reserved(uri: &str) -> bool {
    RESERVED_PATHS
        .iter()
        .any(|reserved| uri == *reserved || uri.starts_with(&format!("{reserved}/")))
}

/// The set of service endpoints plus the service manifest.
#[derive(Debug)]
pub struct EndpointRegistry {
    service: ServiceManifest,
    endpoints: Vec<Endpoint>,
}

impl EndpointRegistry {
    pub fn new(service: ServiceManifest) -> Self {
        Self {
            service,
            endpoints: Vec::new(),
        }
    }

    /// Builder-style [`register`](Self::register).
    pub fn endpoint(mut self, endpoint: Endpoint) -> Result<Self, RegistryError> {
        self.register(endpoint)?;
        Ok(self)
    }

    /// Add an endpoint.
    ///
    /// # Errors
    /// - `InvalidUri`: not a route pattern the router accepts
    /// - `NoMethods` / `UnsupportedMethod`
    /// - `Duplicate`: uri already registered
    /// - `Reserved`: collides with `/queue`, `/jobs/...` or `/metrics`
    /// - `Conflict`: captures overlap a built-in or registered route
    pub fn register(&mut self, endpoint: Endpoint) -> Result<(), RegistryError> {
        let Some(segments) = parse_route(&endpoint.uri) else {
            return Err(RegistryError::InvalidUri(endpoint.uri.clone()));
        };
        if is_reserved(&endpoint.uri) {
            return Err(RegistryError::Reserved(endpoint.uri.clone()));
        }
        if self.endpoints.iter().any(|e| e.uri == endpoint.uri) {
            return Err(RegistryError::Duplicate(endpoint.uri.clone()));
        }

        let builtin = BUILTIN_ROUTES
            .into_iter()
            .filter(|route| *route != endpoint.uri);
        let registered = self.endpoints.iter().map(|e| e.uri.as_str());
        for existing in builtin.chain(registered) {
            let overlaps = parse_route(existing)
                .is_some_and(|other| routes_overlap(&segments, &other));
            if overlaps {
                return Err(RegistryError::Conflict {
                    uri: endpoint.uri.clone(),
                    existing: existing.to_string(),
                });
            }
        }

        if let Err(err) = &endpoint.route {
            return Err(err.clone());
        }

        tracing::debug!(uri = %endpoint.uri, methods = ?endpoint.methods, "Endpoint registered");
        self.endpoints.push(endpoint);
        Ok(())
    }

    pub fn service(&self) -> &ServiceManifest {
        &self.service
    }

    pub fn endpoints(&self) -> &[Endpoint] {
        &self.endpoints
    }

    /// Whether the service serves its own `/manifest.json`.
    pub fn overrides_manifest(&self) -> bool {
        self.endpoints.iter().any(|e| e.uri == MANIFEST_PATH)
    }

    /// The published manifest document.
    pub fn manifest(&self) -> Value {
        let queue = queue_manifest();
        let mut entries = Vec::with_capacity(self.endpoints.len() + 1);
        entries.push(&queue);
        entries.extend(self.endpoints.iter().map(|e| &e.manifest));
        publish(&self.service, &entries)
    }

    /// Routes for every registered endpoint.
    pub fn router(&self) -> Router {
        self.endpoints
            .iter()
            .fold(Router::new(), |router, endpoint| match &endpoint.route {
                Ok(route) => router.route(&endpoint.uri, route.clone()),
                Err(_) => router,
            })
    }
}

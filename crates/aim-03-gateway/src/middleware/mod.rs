//! Middleware stack for the gateway.
//!
//! Layer order: Request → CORS headers → Tracing → CORS → Auth → Handler

pub mod auth;
pub mod cors;
pub mod replay;

pub use auth::{AuthLayer, CallerIdentity, OPEN_PATHS};
pub use cors::{create_cors_layer, static_cors_headers};
pub use replay::NonceCache;

//! Ports layer: the dispatcher API and its clock dependency.

pub mod inbound;
pub mod outbound;

pub use inbound::JobDispatcher;
pub use outbound::{SystemTimeSource, TimeSource};

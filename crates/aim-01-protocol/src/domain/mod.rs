//! # Domain Layer
//!
//! Pure protocol logic with no I/O dependencies.

pub mod canonical;
pub mod client;
pub mod entities;
pub mod errors;
pub mod signer;
pub mod verifier;

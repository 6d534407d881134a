//! # AIM Test Suite
//!
//! End-to-end flows over a real listener: signed request → gateway →
//! dispatcher → result.
//!
//! ## Structure
//!
//! ```text
//! tests/
//! ├── src/integration/   # Cross-crate flows against a running AIM
//! └── benches/           # Signing and verification throughput
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p aim-tests
//! cargo bench -p aim-tests
//! ```

pub mod integration;

//! # AIM Protocol (AIM-01)
//!
//! Request authentication for metered AIM endpoints.
//!
//! ## Architecture
//!
//! Everything in this crate is pure: no I/O, no clocks, no randomness outside
//! of key generation in tests.
//!
//! - **Canonical Message Builder** (`domain/canonical.rs`): derives the exact
//!   byte sequence a caller signs from `(method, path, headers, body)`.
//! - **Signer** (`domain/signer.rs`): personal-message signing and address
//!   recovery on secp256k1, compatible with wallet `personal_sign`.
//! - **Request signing** (`domain/client.rs`): assembles the `tx-*` header set
//!   a caller sends with a Protocol V1 or V2 call.
//! - **Request verification** (`domain/verifier.rs`): the server-side mirror,
//!   recomputing the canonical message from a received request.
//!
//! ## Protocol V2 message layout
//!
//! ```text
//! AIM ProtocolV2 Signature:
//! <METHOD>
//! <path>
//! <name>: <value>        (one line per signed header, sorted by name)
//! hash-body: <sha256>    (only when a non-empty body is present, no newline)
//! ```
//!
//! ## Security Notes
//!
//! - A message without a `tx-nonce` header can never be built.
//! - `tx-signature` and `tx-signed-headers` are never part of the signed text.
//! - High-S (malleable) signatures are rejected on recovery.

pub mod domain;

pub use domain::canonical::{
    build_canonical_message, hash_body, is_signed_header, CanonicalMessage, EXCLUDED_HEADERS,
    PREAMBLE,
};
pub use domain::client::{CallOptions, RequestSigner, SignedCall};
pub use domain::entities::{Address, ProtocolVersion, WalletSignature};
pub use domain::errors::ProtocolError;
pub use domain::signer::{
    address_from_verifying_key, address_of, keccak256, parse_signing_key, personal_message_hash,
    recover_address, recover_address_hex, sign_message,
};
pub use domain::verifier::{
    header_value, is_public_request, verify_request, RequestParts, VerifiedCaller,
    VerifyOptions,
};

/// Re-exported so callers can hold keys without naming `k256` themselves.
pub use k256::ecdsa::SigningKey;

/// Header carrying the caller-supplied replay nonce.
pub const HEADER_NONCE: &str = "tx-nonce";
/// Header carrying the hex signature.
pub const HEADER_SIGNATURE: &str = "tx-signature";
/// Header carrying the caller's claimed address.
pub const HEADER_SENDER: &str = "tx-sender";
/// Header selecting the protocol version (`"1"` or `"2"`).
pub const HEADER_PROTOCOL: &str = "tx-protocol";
/// Header that marks a call as public (no signature required).
pub const HEADER_PUBLIC: &str = "ispublic";

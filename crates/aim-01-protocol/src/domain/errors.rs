//! # Protocol Errors

use thiserror::Error;

use super::entities::Address;

/// Errors raised while building, signing or verifying protocol messages.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProtocolError {
    /// No `tx-nonce` header was among the signed headers.
    #[error("canonical message requires a tx-nonce header")]
    MissingNonce,

    /// A header the operation depends on was absent.
    #[error("missing required header: {0}")]
    MissingHeader(&'static str),

    /// The `tx-protocol` header named a version this crate does not speak.
    #[error("unsupported protocol version: {0}")]
    UnsupportedVersion(String),

    /// Protocol V1 signatures were presented but are not accepted.
    #[error("protocol version 1 signatures are disabled")]
    VersionDisabled,

    /// The signature was not 65 bytes of valid hex.
    #[error("invalid signature encoding")]
    InvalidSignatureEncoding,

    /// R or S outside `[1, n-1]`.
    #[error("invalid signature format")]
    InvalidFormat,

    /// High-S signature (EIP-2).
    #[error("malleable signature (high S value)")]
    MalleableSignature,

    /// Recovery byte was not 0, 1, 27 or 28.
    #[error("invalid recovery id: {0}")]
    InvalidRecoveryId(u8),

    /// Public key recovery failed.
    #[error("failed to recover signer")]
    RecoveryFailed,

    /// Signing produced an error.
    #[error("signing failed")]
    SigningFailed,

    /// Private key bytes did not form a valid secp256k1 scalar.
    #[error("invalid private key")]
    InvalidPrivateKey,

    /// Address string was not 20 bytes of hex.
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    /// The recovered signer differs from the claimed `tx-sender`.
    #[error("signer mismatch: claimed {claimed}, recovered {recovered}")]
    SignerMismatch {
        claimed: Address,
        recovered: Address,
    },
}

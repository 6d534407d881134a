//! # Request Verification (service side)
//!
//! Recomputes the canonical message from a received request and recovers the
//! wallet that signed it.
//!
//! ## Verification steps
//!
//! 1. Parse `tx-protocol` (absent means V2; V1 only when enabled)
//! 2. Require `tx-nonce` and `tx-signature`
//! 3. Rebuild the signed text from method, path, headers and body
//! 4. Recover the signer; if `tx-sender` is present it must match

use tracing::debug;

use super::canonical::build_canonical_message;
use super::entities::{Address, ProtocolVersion};
use super::errors::ProtocolError;
use super::signer::recover_address_hex;
use crate::{HEADER_NONCE, HEADER_PROTOCOL, HEADER_PUBLIC, HEADER_SENDER, HEADER_SIGNATURE};

/// The pieces of a received request that authentication reads.
#[derive(Clone, Copy, Debug)]
pub struct RequestParts<'a> {
    /// HTTP method as received.
    pub method: &'a str,
    /// Full path the caller signed, e.g. `/aim/7/model`.
    pub path: &'a str,
    /// Header pairs as received.
    pub headers: &'a [(String, String)],
    /// Raw body bytes (empty when there is no body).
    pub body: &'a [u8],
}

/// Verification switches.
#[derive(Clone, Copy, Debug, Default)]
pub struct VerifyOptions {
    /// Accept signatures over the bare nonce.
    pub accept_protocol_v1: bool,
}

/// A caller whose signature checked out.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VerifiedCaller {
    pub address: Address,
    pub nonce: String,
    pub version: ProtocolVersion,
}

/// Case-insensitive header lookup.
pub fn header_value<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}

/// Whether the caller marked the request as public.
pub fn is_public_request(headers: &[(String, String)]) -> bool {
    header_value(headers, HEADER_PUBLIC).is_some()
}

/// Verify the signature on a received request.
pub fn verify_request(
    parts: &RequestParts<'_>,
    options: &VerifyOptions,
) -> Result<VerifiedCaller, ProtocolError> {
    let version = ProtocolVersion::from_header(header_value(parts.headers, HEADER_PROTOCOL))?;
    let nonce = header_value(parts.headers, HEADER_NONCE).ok_or(ProtocolError::MissingNonce)?;
    let signature = header_value(parts.headers, HEADER_SIGNATURE)
        .ok_or(ProtocolError::MissingHeader(HEADER_SIGNATURE))?;

    let recovered = match version {
        ProtocolVersion::V1 => {
            if !options.accept_protocol_v1 {
                return Err(ProtocolError::VersionDisabled);
            }
            recover_address_hex(nonce.as_bytes(), signature)?
        }
        ProtocolVersion::V2 => {
            let message = build_canonical_message(
                parts.method,
                parts.path,
                parts.headers.iter().map(|(k, v)| (k.as_str(), v.as_str())),
                Some(parts.body),
            )?;
            recover_address_hex(message.as_bytes(), signature)?
        }
    };

    if let Some(claimed) = header_value(parts.headers, HEADER_SENDER) {
        let claimed: Address = claimed.parse()?;
        if claimed != recovered {
            return Err(ProtocolError::SignerMismatch { claimed, recovered });
        }
    }

    debug!(address = %recovered, version = version.as_str(), "Request signature verified");
    Ok(VerifiedCaller {
        address: recovered,
        nonce: nonce.to_string(),
        version,
    })
}

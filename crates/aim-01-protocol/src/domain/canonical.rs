//! # Canonical Message Builder
//!
//! Derives, byte for byte, the Protocol V2 message a caller signs and a
//! receiving service reconstructs. The function is pure: identical
//! `(method, path, headers, body)` inputs always produce identical output,
//! whatever order the headers arrive in.

use sha2::{Digest, Sha256};

use super::errors::ProtocolError;

/// First line of every Protocol V2 message.
pub const PREAMBLE: &str = "AIM ProtocolV2 Signature:\n";

/// Headers starting with this prefix are signed.
const SIGNED_HEADER_PREFIX: &str = "tx-";

/// Headers signed by exact (lower-cased) name.
const SIGNED_HEADER_NAMES: [&str; 4] = ["currency-type", "cost_only", "cost-only", "ispublic"];

/// Never signed, even though they match the `tx-` prefix.
pub const EXCLUDED_HEADERS: [&str; 2] = ["tx-signature", "tx-signed-headers"];

/// The signable message plus the headers that went into it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CanonicalMessage {
    text: String,
    signed_headers: Vec<String>,
}

impl CanonicalMessage {
    /// Message text.
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Message bytes as fed to the signer.
    pub fn as_bytes(&self) -> &[u8] {
        self.text.as_bytes()
    }

    /// Lower-cased names of the signed headers, in message order.
    pub fn signed_headers(&self) -> &[String] {
        &self.signed_headers
    }

    /// Consume into the message text.
    pub fn into_string(self) -> String {
        self.text
    }
}

/// Whether a lower-cased header name belongs in the signed message.
pub fn is_signed_header(name_lc: &str) -> bool {
    if EXCLUDED_HEADERS.contains(&name_lc) {
        return false;
    }
    name_lc.starts_with(SIGNED_HEADER_PREFIX) || SIGNED_HEADER_NAMES.contains(&name_lc)
}

/// SHA-256 of the raw body, lowercase hex.
pub fn hash_body(body: &[u8]) -> String {
    hex::encode(Sha256::digest(body))
}

/// Build the Protocol V2 canonical message.
///
/// # Errors
///
/// Returns [`ProtocolError::MissingNonce`] when no `tx-nonce` header survives
/// the allow-list.
pub fn build_canonical_message<I, K, V>(
    method: &str,
    path: &str,
    headers: I,
    body: Option<&[u8]>,
) -> Result<CanonicalMessage, ProtocolError>
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: AsRef<str>,
{
    let mut selected: Vec<(String, String)> = headers
        .into_iter()
        .map(|(name, value)| (name.as_ref().to_ascii_lowercase(), value.as_ref().to_string()))
        .filter(|(name, _)| is_signed_header(name))
        .collect();

    // Ties on name are broken by value so repeated headers stay deterministic.
    selected.sort();

    if !selected.iter().any(|(name, _)| name == "tx-nonce") {
        return Err(ProtocolError::MissingNonce);
    }

    let mut text = String::with_capacity(PREAMBLE.len() + path.len() + 64 * (selected.len() + 1));
    text.push_str(PREAMBLE);
    text.push_str(&method.to_ascii_uppercase());
    text.push('\n');
    text.push_str(path);
    text.push('\n');

    for (name, value) in &selected {
        text.push_str(name);
        text.push_str(": ");
        text.push_str(value);
        text.push('\n');
    }

    if let Some(body) = body.filter(|b| !b.is_empty()) {
        text.push_str("hash-body: ");
        text.push_str(&hash_body(body));
    }

    Ok(CanonicalMessage {
        text,
        signed_headers: selected.into_iter().map(|(name, _)| name).collect(),
    })
}

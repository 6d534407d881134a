//! # Request Signing (caller side)
//!
//! Builds the header set a caller attaches to an AIM call, in the layout
//! existing AIM nodes expect.

use k256::ecdsa::SigningKey;

use super::canonical::{build_canonical_message, CanonicalMessage};
use super::entities::{Address, ProtocolVersion, WalletSignature};
use super::errors::ProtocolError;
use super::signer::{address_of, sign_message};

/// Spend order sent with every call.
pub const DEFAULT_SPEND_ORDER: &str = "USDC,HyPC";

/// What to call and how.
#[derive(Clone, Debug)]
pub struct CallOptions {
    /// HTTP method, any case.
    pub method: String,
    /// AIM slot on the node.
    pub slot: String,
    /// Endpoint uri inside the slot, starting with `/`.
    pub uri: String,
    /// Signature scheme.
    pub version: ProtocolVersion,
    /// Replay nonce; required unless `is_public`.
    pub nonce: Option<String>,
    /// Payment driver name.
    pub driver: String,
    /// Currency announced in `currency-type`.
    pub currency: String,
    /// Ask for a price estimate instead of running the endpoint.
    pub cost_only: bool,
    /// Skip signing entirely.
    pub is_public: bool,
    /// Additional caller headers. Protocol headers take precedence on clashes.
    pub extra_headers: Vec<(String, String)>,
    /// Raw request body.
    pub body: Option<Vec<u8>>,
}

impl CallOptions {
    /// GET/POST to `uri` in `slot` with client defaults.
    pub fn new(method: impl Into<String>, slot: impl Into<String>, uri: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            slot: slot.into(),
            uri: uri.into(),
            version: ProtocolVersion::V2,
            nonce: None,
            driver: "ethereum".to_string(),
            currency: "USDC".to_string(),
            cost_only: false,
            is_public: false,
            extra_headers: Vec::new(),
            body: None,
        }
    }

    /// Request path on the node: `/aim/<slot><uri>`.
    pub fn path(&self) -> String {
        format!("/aim/{}{}", self.slot, self.uri)
    }
}

/// A fully prepared call.
#[derive(Clone, Debug)]
pub struct SignedCall {
    /// Upper-cased HTTP method.
    pub method: String,
    /// Request path on the node.
    pub path: String,
    /// Headers in send order.
    pub headers: Vec<(String, String)>,
    /// V2 canonical message, when one was signed.
    pub message: Option<CanonicalMessage>,
    /// Signature, absent for public calls.
    pub signature: Option<WalletSignature>,
    /// Body to send.
    pub body: Option<Vec<u8>>,
}

impl SignedCall {
    /// First header value matching `name` case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Holds a wallet key and signs calls with it.
pub struct RequestSigner {
    key: SigningKey,
    address: Address,
}

impl RequestSigner {
    /// Wrap a signing key.
    pub fn new(key: SigningKey) -> Self {
        let address = address_of(&key);
        Self { key, address }
    }

    /// Address that signatures recover to.
    pub fn address(&self) -> Address {
        self.address
    }

    /// Prepare the headers (and signature) for `options`.
    ///
    /// # Errors
    ///
    /// [`ProtocolError::MissingHeader`] when a non-public call has no nonce.
    pub fn sign_call(&self, options: &CallOptions) -> Result<SignedCall, ProtocolError> {
        let sender = self.address.to_string();
        let path = options.path();

        let mut headers = HeaderList::default();
        for (name, value) in &options.extra_headers {
            headers.set(name, value);
        }
        headers.set("tx-id", "");
        headers.set("tx-sender", &sender);
        headers.set("tx-origin", &sender);
        headers.set("currency-type", &options.currency);
        headers.set("spend_order", DEFAULT_SPEND_ORDER);
        headers.set("tx-driver", &options.driver);
        headers.set("tx-protocol", options.version.as_str());

        if options.cost_only {
            headers.set("cost_only", "1");
            headers.set("cost-only", "1");
        }

        let mut message = None;
        let mut signature = None;

        if options.is_public {
            headers.set("isPublic", "1");
        } else {
            let nonce = options
                .nonce
                .as_deref()
                .ok_or(ProtocolError::MissingHeader("tx-nonce"))?;
            headers.set("tx-nonce", nonce);

            let sig = match options.version {
                ProtocolVersion::V1 => sign_message(nonce.as_bytes(), &self.key)?,
                ProtocolVersion::V2 => {
                    let canonical = build_canonical_message(
                        &options.method,
                        &path,
                        headers.0.iter().map(|(k, v)| (k.as_str(), v.as_str())),
                        options.body.as_deref(),
                    )?;
                    let sig = sign_message(canonical.as_bytes(), &self.key)?;
                    message = Some(canonical);
                    sig
                }
            };
            headers.set("tx-signature", &sig.to_hex());
            signature = Some(sig);
        }

        Ok(SignedCall {
            method: options.method.to_ascii_uppercase(),
            path,
            headers: headers.0,
            message,
            signature,
            body: options.body.clone(),
        })
    }
}

impl std::fmt::Debug for RequestSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestSigner")
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}

/// Ordered headers with case-insensitive replacement.
#[derive(Default)]
struct HeaderList(Vec<(String, String)>);

impl HeaderList {
    fn set(&mut self, name: &str, value: &str) {
        match self.0.iter_mut().find(|(k, _)| k.eq_ignore_ascii_case(name)) {
            Some(entry) => {
                entry.0 = name.to_string();
                entry.1 = value.to_string();
            }
            None => self.0.push((name.to_string(), value.to_string())),
        }
    }
}

//! Client configuration file (`--config`).
//!
//! ```json
//! { "seed_hosts": ["127.0.0.1:8000"], "driver": "ethereum", "pk": "0x..." }
//! ```
//!
//! Every field is optional. Command-line flags win over the file.

use std::path::Path;

use serde::Deserialize;

use crate::client::ClientError;

/// Payment driver announced when neither a flag nor the file names one.
pub const DEFAULT_DRIVER: &str = "ethereum";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Nodes asked for the node list, in order
    pub seed_hosts: Vec<String>,
    /// Payment driver for `tx-driver`
    pub driver: String,
    /// Hex private key used when `--pk` is absent
    pub pk: Option<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            seed_hosts: vec!["127.0.0.1:8000".to_string()],
            driver: DEFAULT_DRIVER.to_string(),
            pk: None,
        }
    }
}

impl ClientConfig {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ClientError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| ClientError::Config(format!("{}: {e}", path.display())))?;
        serde_json::from_str(&raw)
            .map_err(|e| ClientError::Config(format!("{}: {e}", path.display())))
    }

    /// The file at `path`, or defaults when no file was given.
    pub fn load(path: Option<&Path>) -> Result<Self, ClientError> {
        match path {
            Some(path) => Self::from_file(path),
            None => Ok(Self::default()),
        }
    }
}

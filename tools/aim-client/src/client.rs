//! HTTP client for AIM nodes.

use std::time::Duration;

use aim_01_protocol::{Address, SignedCall};
use reqwest::{Client, Method};
use serde_json::Value;
use thiserror::Error;

/// Errors that can occur when talking to a node.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Connection failed: {0}")]
    Connection(String),
    #[error("Invalid method: {0}")]
    Method(String),
    #[error("Failed to parse response: {0}")]
    Parse(String),
    #[error("Invalid headers: {0}")]
    Headers(String),
    #[error("Invalid client config: {0}")]
    Config(String),
    #[error("No seed host answered: {0}")]
    NoSeed(String),
}

/// Status, headers and body of a node response.
#[derive(Debug)]
pub struct NodeResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl NodeResponse {
    /// Body as JSON, when it is JSON.
    pub fn json(&self) -> Option<Value> {
        serde_json::from_str(&self.body).ok()
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Client for one node.
pub struct AimClient {
    client: Client,
    base_url: String,
}

impl AimClient {
    /// `node` is `host:port`, with or without a scheme.
    pub fn new(node: &str) -> Result<Self, ClientError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .connect_timeout(Duration::from_secs(5))
            .build()?;

        let node = node.trim_end_matches('/');
        let base_url = if node.starts_with("http://") || node.starts_with("https://") {
            node.to_string()
        } else {
            format!("http://{node}")
        };

        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Ask the node for the next nonce to use as `sender`.
    pub async fn fetch_nonce(&self, sender: &Address) -> Result<String, ClientError> {
        let url = format!("{}/nonce", self.base_url);
        let response = self
            .client
            .get(&url)
            .header("sender", sender.to_string())
            .send()
            .await
            .map_err(|e| self.connection_error(e))?;

        let body: Value = response
            .json()
            .await
            .map_err(|e| ClientError::Parse(e.to_string()))?;

        match &body["nonce"] {
            Value::String(s) => Ok(s.clone()),
            Value::Number(n) => Ok(n.to_string()),
            _ => Err(ClientError::Parse(format!("no nonce in {body}"))),
        }
    }

    /// Nodes this node knows about (`GET /nodes`).
    pub async fn list_nodes(&self) -> Result<Vec<Value>, ClientError> {
        let response = self.get_plain("/nodes").await?;
        if !response.is_success() {
            return Err(ClientError::Parse(format!(
                "/nodes answered {}",
                response.status
            )));
        }
        match response.json() {
            Some(Value::Object(mut body)) => match body.remove("nodes") {
                Some(Value::Array(nodes)) => Ok(nodes),
                _ => Err(ClientError::Parse("no nodes list in response".into())),
            },
            _ => Err(ClientError::Parse(format!("unexpected body: {}", response.body))),
        }
    }

    /// Node description (`GET /info`).
    pub async fn node_info(&self) -> Result<NodeResponse, ClientError> {
        self.get_plain("/info").await
    }

    /// Balance held by `address` on the node (`GET /balance`).
    pub async fn balance(
        &self,
        address: &Address,
        driver: &str,
    ) -> Result<NodeResponse, ClientError> {
        let url = format!("{}/balance", self.base_url);
        let response = self
            .client
            .get(&url)
            .header("tx-sender", address.to_string())
            .header("tx-driver", driver)
            .send()
            .await
            .map_err(|e| self.connection_error(e))?;
        read_response(response).await
    }

    /// Send a prepared call.
    pub async fn send(&self, call: &SignedCall) -> Result<NodeResponse, ClientError> {
        let method = Method::from_bytes(call.method.as_bytes())
            .map_err(|_| ClientError::Method(call.method.clone()))?;
        let url = format!("{}{}", self.base_url, call.path);

        let mut request = self.client.request(method, &url);
        for (name, value) in &call.headers {
            request = request.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &call.body {
            request = request.body(body.clone());
        }

        let response = request.send().await.map_err(|e| self.connection_error(e))?;
        read_response(response).await
    }

    /// Unsigned GET of `path` on the node, marked `isPublic`.
    pub async fn get(&self, path: &str) -> Result<NodeResponse, ClientError> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .client
            .get(&url)
            .header("isPublic", "1")
            .send()
            .await
            .map_err(|e| self.connection_error(e))?;
        read_response(response).await
    }

    /// Node-level GET, outside any AIM slot.
    async fn get_plain(&self, path: &str) -> Result<NodeResponse, ClientError> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| self.connection_error(e))?;
        read_response(response).await
    }

    fn connection_error(&self, e: reqwest::Error) -> ClientError {
        if e.is_connect() {
            ClientError::Connection(format!("Cannot connect to {}", self.base_url))
        } else {
            ClientError::Http(e)
        }
    }
}

async fn read_response(response: reqwest::Response) -> Result<NodeResponse, ClientError> {
    let status = response.status().as_u16();
    let headers = response
        .headers()
        .iter()
        .map(|(k, v)| {
            (
                k.as_str().to_string(),
                String::from_utf8_lossy(v.as_bytes()).into_owned(),
            )
        })
        .collect();
    let body = response.text().await?;
    Ok(NodeResponse {
        status,
        headers,
        body,
    })
}

/// Ask each seed host in turn for its node list; the first answer wins.
pub async fn discover_nodes(seed_hosts: &[String]) -> Result<Vec<Value>, ClientError> {
    let mut last_error = String::from("no seed hosts configured");
    for seed in seed_hosts {
        match AimClient::new(seed)?.list_nodes().await {
            Ok(nodes) => return Ok(nodes),
            Err(e) => last_error = format!("{seed}: {e}"),
        }
    }
    Err(ClientError::NoSeed(last_error))
}

/// Parse a `--headers` JSON object into header pairs. Non-string values are
/// sent in their JSON form.
pub fn parse_header_json(raw: &str) -> Result<Vec<(String, String)>, ClientError> {
    let value: Value =
        serde_json::from_str(raw).map_err(|e| ClientError::Headers(e.to_string()))?;
    let Value::Object(map) = value else {
        return Err(ClientError::Headers("expected a JSON object".into()));
    };
    Ok(map
        .into_iter()
        .map(|(k, v)| match v {
            Value::String(s) => (k, s),
            other => (k, other.to_string()),
        })
        .collect())
}

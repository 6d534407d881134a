//! Service and endpoint manifests published at `/manifest.json`.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Currency the built-in queue endpoint advertises (it never charges).
pub const QUEUE_CURRENCY: &str = "nullpay";

/// Service-level manifest. Unknown fields are kept and published as-is.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServiceManifest {
    pub name: String,
    pub short_name: String,
    pub version: String,
    #[serde(default)]
    pub documentation_url: String,
    #[serde(default)]
    pub license: String,
    #[serde(default)]
    pub terms_of_service: String,
    #[serde(default)]
    pub author: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ServiceManifest {
    pub fn new(
        name: impl Into<String>,
        short_name: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            short_name: short_name.into(),
            version: version.into(),
            ..Default::default()
        }
    }
}

/// Cost range quoted for a call or per megabyte.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PriceRange {
    pub estimated_cost: f64,
    pub min: f64,
    pub max: f64,
}

/// One documented example invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExampleCall {
    pub method: String,
    #[serde(default)]
    pub query: Value,
    #[serde(default)]
    pub headers: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
    pub output: Value,
}

/// Manifest entry describing one endpoint.
///
/// `uri` is filled in at registration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EndpointManifest {
    #[serde(default)]
    pub uri: String,
    pub input_query: Value,
    pub input_headers: Value,
    pub input_body: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,
    pub currency: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price_per_call: Option<PriceRange>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price_per_mb: Option<PriceRange>,
    pub documentation: String,
    #[serde(default)]
    pub example_calls: Vec<ExampleCall>,
}

impl EndpointManifest {
    /// Empty-input manifest with the given documentation and currency.
    pub fn new(documentation: impl Into<String>, currency: impl Into<String>) -> Self {
        Self {
            uri: String::new(),
            input_query: Value::String(String::new()),
            input_headers: Value::String(String::new()),
            input_body: Value::String(String::new()),
            output: None,
            currency: currency.into(),
            price_per_call: None,
            price_per_mb: None,
            documentation: documentation.into(),
            example_calls: Vec::new(),
        }
    }

    pub fn input_query(mut self, value: Value) -> Self {
        self.input_query = value;
        self
    }

    pub fn input_headers(mut self, value: Value) -> Self {
        self.input_headers = value;
        self
    }

    pub fn input_body(mut self, value: Value) -> Self {
        self.input_body = value;
        self
    }

    pub fn output(mut self, value: Value) -> Self {
        self.output = Some(value);
        self
    }

    pub fn price_per_call(mut self, price: PriceRange) -> Self {
        self.price_per_call = Some(price);
        self
    }

    pub fn price_per_mb(mut self, price: PriceRange) -> Self {
        self.price_per_mb = Some(price);
        self
    }

    pub fn example(mut self, call: ExampleCall) -> Self {
        self.example_calls.push(call);
        self
    }
}

/// Manifest for the built-in `/queue` endpoint.
pub fn queue_manifest() -> EndpointManifest {
    let mut manifest = EndpointManifest::new(
        "Returns the next job number to be worked on, and the current length of the job \
         queue. Jobs are served first-come first-serve. Call /queue before submitting to see \
         the current length, current job number and next job number; the next job number \
         approximates your own. While waiting, call /queue again to watch the current job \
         number advance.",
        QUEUE_CURRENCY,
    )
    .example(ExampleCall {
        method: "GET".into(),
        query: Value::String(String::new()),
        headers: Value::String(String::new()),
        body: None,
        output: serde_json::json!({
            "current_job_number": 0,
            "next_job_number": 0,
            "queue_length": 0
        }),
    });
    manifest.uri = "/queue".into();
    manifest
}

/// Assemble the published document: service fields plus `endpoints`.
pub fn publish(service: &ServiceManifest, endpoints: &[&EndpointManifest]) -> Value {
    let mut document = match serde_json::to_value(service) {
        Ok(Value::Object(map)) => map,
        _ => Map::new(),
    };
    let endpoints = endpoints
        .iter()
        .filter_map(|e| serde_json::to_value(e).ok())
        .collect();
    document.insert("endpoints".into(), Value::Array(endpoints));
    Value::Object(document)
}

//! Runtime configuration: optional JSON file, then environment overrides.

use std::net::IpAddr;
use std::path::Path;
use std::time::Duration;

use aim_02_dispatcher::DispatcherConfig;
use aim_03_gateway::GatewayConfig;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Settings for the bundled example endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExampleConfig {
    /// How long one `/model` job keeps a worker busy (default: 4s)
    #[serde(with = "humantime_serde")]
    pub work_duration: Duration,
}

impl Default for ExampleConfig {
    fn default() -> Self {
        Self {
            work_duration: Duration::from_secs(4),
        }
    }
}

/// Complete runtime configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    pub dispatcher: DispatcherConfig,
    pub gateway: GatewayConfig,
    pub example: ExampleConfig,
}

impl RuntimeConfig {
    /// Read a JSON configuration file. Missing sections keep their defaults.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    /// Apply `AIM_*` overrides. Unparseable values are logged and ignored.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(host) = parsed::<IpAddr>(&lookup, "AIM_HOST") {
            self.gateway.http.host = host;
        }
        if let Some(port) = parsed::<u16>(&lookup, "AIM_PORT") {
            self.gateway.http.port = port;
        }
        if let Some(concurrency) = parsed::<usize>(&lookup, "AIM_CONCURRENCY") {
            self.dispatcher.concurrency = concurrency;
        }
        if let Some(tick_ms) = parsed::<u64>(&lookup, "AIM_TICK_MS") {
            self.dispatcher.tick_interval = Duration::from_millis(tick_ms);
        }
        if let Some(secs) = parsed::<u64>(&lookup, "AIM_JOB_TIMEOUT_SECS") {
            // 0 switches the deadline off
            self.dispatcher.job_timeout = (secs > 0).then(|| Duration::from_secs(secs));
        }
        if let Some(prefix) = lookup("AIM_PATH_PREFIX") {
            let prefix = prefix.trim();
            self.gateway.auth.path_prefix = (!prefix.is_empty()).then(|| prefix.to_string());
        }
        if let Some(ms) = parsed::<u64>(&lookup, "AIM_MODEL_WORK_MS") {
            self.example.work_duration = Duration::from_millis(ms);
        }
    }

    /// Validate every section. Failures are fatal at startup.
    pub fn validate(&self) -> Result<()> {
        self.dispatcher
            .validate()
            .context("Invalid dispatcher configuration")?;
        self.gateway
            .validate()
            .context("Invalid gateway configuration")?;
        Ok(())
    }
}

fn parsed<T: std::str::FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(key, value = %raw, "Ignoring unparseable environment override");
            None
        }
    }
}

/// Load configuration from `AIM_CONFIG` (if set) and the environment.
pub fn load_config() -> Result<RuntimeConfig> {
    let mut config = match std::env::var("AIM_CONFIG") {
        Ok(path) => {
            info!(path = %path, "Loading configuration file");
            RuntimeConfig::from_file(&path)?
        }
        Err(_) => RuntimeConfig::default(),
    };
    config.apply_overrides(|key| std::env::var(key).ok());
    config.validate()?;
    Ok(config)
}

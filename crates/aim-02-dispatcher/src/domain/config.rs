//! Dispatcher configuration with validation.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::errors::ConfigError;

/// What happens to completed tickets nobody is waiting on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum RetentionPolicy {
    /// Evict on the first successful fetch after completion.
    #[default]
    UntilFetched,
    /// Evict once completed for longer than `ttl`.
    Ttl {
        #[serde(with = "humantime_serde")]
        ttl: Duration,
    },
    /// Keep until the owner clears it.
    Unbounded,
}

/// Dispatcher configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatcherConfig {
    /// Tickets allowed in `Running` at once (default: 1)
    pub concurrency: usize,
    /// Scheduling cycle period (default: 250ms)
    #[serde(with = "humantime_serde")]
    pub tick_interval: Duration,
    /// Blocking work items allowed on pool threads at once (default: 4)
    pub blocking_threads: usize,
    /// Per-job deadline; overruns complete as `timed_out`. Async work is
    /// cancelled, but a blocking closure cannot be: its thread keeps one of
    /// the `blocking_threads` permits until it returns (see
    /// `StatsSnapshot::stranded_blocking`).
    #[serde(with = "humantime_serde")]
    pub job_timeout: Option<Duration>,
    /// Completed-ticket retention
    pub retention: RetentionPolicy,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            concurrency: 1,
            tick_interval: Duration::from_millis(250),
            blocking_threads: 4,
            job_timeout: None,
            retention: RetentionPolicy::default(),
        }
    }
}

impl DispatcherConfig {
    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.concurrency == 0 {
            return Err(ConfigError::InvalidLimit("concurrency cannot be 0".into()));
        }

        if self.blocking_threads == 0 {
            return Err(ConfigError::InvalidLimit(
                "blocking_threads cannot be 0".into(),
            ));
        }

        if self.tick_interval.is_zero() {
            return Err(ConfigError::InvalidTimeout(
                "tick_interval cannot be 0".into(),
            ));
        }

        if matches!(self.job_timeout, Some(limit) if limit.is_zero()) {
            return Err(ConfigError::InvalidTimeout("job_timeout cannot be 0".into()));
        }

        if let RetentionPolicy::Ttl { ttl } = self.retention {
            if ttl.is_zero() {
                return Err(ConfigError::InvalidTimeout("retention ttl cannot be 0".into()));
            }
        }

        Ok(())
    }
}

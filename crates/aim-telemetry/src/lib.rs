//! # AIM Telemetry
//!
//! Structured logging and Prometheus metrics shared by every AIM crate.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use aim_telemetry::{init_telemetry, TelemetryConfig};
//!
//! fn main() -> anyhow::Result<()> {
//!     init_telemetry(&TelemetryConfig::from_env())?;
//!     // Logs and metrics are now being collected
//!     Ok(())
//! }
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `AIM_SERVICE_NAME` | `aim` | Service name attached to startup logs |
//! | `AIM_LOG_LEVEL` / `RUST_LOG` | `info` | Log filter directives |
//! | `AIM_JSON_LOGS` | `false` (`true` in containers) | JSON log lines |

mod config;
mod logging;
pub mod metrics;

pub use config::TelemetryConfig;
pub use logging::init_logging;
pub use metrics::{
    encode_metrics, register_metrics, AUTH_FAILURES, COST_PREVIEWS, JOBS_COMPLETED,
    JOBS_SUBMITTED, JOB_DURATION, PENDING_JOBS, RUNNING_JOBS,
};

use thiserror::Error;

/// Telemetry initialization errors
#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("Failed to initialize logging: {0}")]
    LoggingInit(String),

    #[error("Failed to initialize Prometheus metrics: {0}")]
    MetricsInit(String),
}

/// Register metrics and install the global log subscriber.
pub fn init_telemetry(config: &TelemetryConfig) -> Result<(), TelemetryError> {
    register_metrics()?;
    init_logging(config)?;
    tracing::info!(
        service = %config.service_name,
        json_logs = config.json_logs,
        "Telemetry initialized"
    );
    Ok(())
}

//! # AIM Runtime
//!
//! Wires the job dispatcher (aim-02) behind the gateway (aim-03) and serves
//! the bundled example endpoints.
//!
//! ## Startup Sequence
//!
//! 1. Load configuration (file from `AIM_CONFIG`, then `AIM_*` overrides)
//! 2. Initialize logging and metrics
//! 3. Start the dispatcher's scheduling cycle
//! 4. Register endpoints and bind the HTTP listener
//!
//! ## Shutdown Sequence
//!
//! 1. Stop accepting connections, finish in-flight requests
//! 2. Stop dispatcher admission
//! 3. Drain admitted tickets (bounded by [`SHUTDOWN_DRAIN_TIMEOUT`])

pub mod config;
pub mod example;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use aim_02_dispatcher::Dispatcher;
use aim_03_gateway::AimServer;
use anyhow::{Context, Result};
use axum::Router;
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::config::RuntimeConfig;

/// Upper bound on how long shutdown waits for admitted tickets.
pub const SHUTDOWN_DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

pub struct AimRuntime {
    dispatcher: Dispatcher,
    server: AimServer,
}

impl AimRuntime {
    /// Start the dispatcher and build the gateway. Must run inside a Tokio
    /// runtime.
    pub fn new(config: RuntimeConfig) -> Result<Self> {
        info!("Creating AIM runtime");

        let dispatcher = Dispatcher::start(config.dispatcher.clone())
            .context("Failed to start dispatcher")?;
        let registry = example::registry(dispatcher.clone(), &config.example)
            .context("Failed to register example endpoints")?;
        let server = AimServer::new(config.gateway, registry, Arc::new(dispatcher.clone()))
            .context("Failed to build gateway")?;

        Ok(Self { dispatcher, server })
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// The fully layered router, for in-process callers.
    pub fn router(&self) -> Router {
        self.server.router()
    }

    /// Bind the configured address and serve until `shutdown` resolves.
    pub async fn run<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let Self { dispatcher, server } = self;
        let served = server.serve(shutdown).await;
        drain(&dispatcher).await;
        served.context("Gateway stopped with an error")
    }

    /// Serve on an already bound listener until `shutdown` resolves.
    pub async fn run_on<F>(self, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let Self { dispatcher, server } = self;
        let served = server.serve_on(listener, shutdown).await;
        drain(&dispatcher).await;
        served.context("Gateway stopped with an error")
    }
}

async fn drain(dispatcher: &Dispatcher) {
    info!("Initiating graceful shutdown...");
    dispatcher.shutdown();

    match tokio::time::timeout(SHUTDOWN_DRAIN_TIMEOUT, dispatcher.closed()).await {
        Ok(()) => {
            let stats = dispatcher.stats();
            info!(
                submitted = stats.submitted,
                completed = stats.completed,
                failed = stats.failed,
                timed_out = stats.timed_out,
                "Shutdown complete"
            );
        }
        Err(_) => warn!(
            timeout = ?SHUTDOWN_DRAIN_TIMEOUT,
            "Dispatcher did not drain in time, abandoning remaining tickets"
        ),
    }
}

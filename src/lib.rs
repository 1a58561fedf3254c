//! Modelwatch - model serving with continuous operational monitoring.
//!
//! Modelwatch loads model artifacts into a bounded in-memory cache, serves
//! predictions against them, and watches the result: latency, error rates,
//! statistical drift of the inputs, and host resources. Crossed thresholds
//! become alerts on the configured channels.
//!
//! # Features
//!
//! - **Model Server**: LRU cache with a hard instance cap, warmup, batch prediction.
//! - **Drift Detection**: PSI, Gaussian KL divergence, and Wasserstein distance.
//! - **Metrics**: Prometheus exposition on `/metrics`.
//! - **Alerting**: log, Slack, email relay, and webhook channels.
//! - **A/B Testing**: traffic splits across dedicated model servers.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        Modelwatch                           │
//! ├─────────────────────────────────────────────────────────────┤
//! │  HTTP: /metrics | /health | /models/health | predict        │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Monitor: events -> metrics | drift | threshold alerts      │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Model Server: LRU cache | backends | A/B router            │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Registry: artifact catalog                                 │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Quick Start
//!
//! ```no_run
//! use modelwatch::config::ModelwatchConfig;
//!
//! #[tokio::main]
//! async fn main() -> modelwatch::Result<()> {
//!     let config = ModelwatchConfig::development();
//!     modelwatch::run(config).await
//! }
//! ```

pub mod config;
pub mod error;
pub mod types;

pub mod cli;
pub mod compute;
pub mod monitoring;
pub mod observability;
pub mod shutdown;

// Re-exports
pub use error::{ModelwatchError, Result};
pub use types::*;

use compute::{DefaultBackends, ModelServer, StaticRegistry};
use config::ModelwatchConfig;
use monitoring::ModelMonitor;
use observability::{AlertManager, MetricsCollector};
use shutdown::{ShutdownCoordinator, SignalHandler};
use std::sync::Arc;
use tracing::{error, info, warn};

/// Run the model server and monitor until SIGINT or SIGTERM.
pub async fn run(config: ModelwatchConfig) -> Result<()> {
    observability::init(&config.observability)?;
    config.validate()?;

    let registry = match &config.registry.catalog_path {
        Some(path) => StaticRegistry::from_file(path)?,
        None => {
            warn!("No model catalog configured, registry is empty");
            StaticRegistry::new()
        }
    };

    let server = Arc::new(ModelServer::new(
        config.serving.clone(),
        Arc::new(registry),
        Arc::new(DefaultBackends::new()?),
    ));

    let metrics = MetricsCollector::new()?;
    let alerts = Arc::new(AlertManager::from_config(&config.alerting)?);
    let coordinator = ShutdownCoordinator::new();

    let monitor = Arc::new(
        ModelMonitor::new(
            config.monitoring.clone(),
            config.drift.clone(),
            metrics,
            alerts,
        )
        .with_server(server.clone())
        .with_shutdown(coordinator.clone()),
    );

    // Subscribe before preloading so load events reach the metrics
    let addr = monitor.start().await?;
    server.start().await;
    info!(addr = %addr, "Modelwatch running");

    let signals = SignalHandler::new(coordinator.clone());
    tokio::spawn(async move {
        if let Err(e) = signals.run().await {
            error!(error = %e, "Signal handler failed");
        }
    });

    coordinator.signalled().await;

    let stopping = async {
        monitor.stop().await;
        server.stop().await;
    };
    if tokio::time::timeout(coordinator.timeout(), stopping).await.is_err() {
        error!("Shutdown timed out after {:?}", coordinator.timeout());
    } else {
        info!("Modelwatch stopped");
    }

    Ok(())
}

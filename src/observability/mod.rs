//! Observability module for Modelwatch.
//!
//! Provides logging, Prometheus metrics, system sampling, alert delivery,
//! and the metrics/health HTTP surface.

pub mod alerting;
pub mod histograms;
pub mod http;
pub mod metrics;
pub mod system;

pub use self::alerting::{
    Alert, AlertEvent, AlertManager, AlertSeverity, DispatchReport, NotificationChannel,
};
pub use self::metrics::MetricsCollector;
pub use self::system::{SystemMetrics, SystemSampler};

use crate::config::ObservabilityConfig;
use crate::error::{ModelwatchError, Result};
use ::tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initialize logging.
pub fn init(config: &ObservabilityConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let subscriber = tracing_subscriber::registry().with(filter);

    if config.json_logs {
        subscriber
            .with(fmt::layer().json())
            .try_init()
            .map_err(|e| ModelwatchError::Internal(format!("Failed to init logging: {}", e)))?;
    } else {
        subscriber
            .with(fmt::layer())
            .try_init()
            .map_err(|e| ModelwatchError::Internal(format!("Failed to init logging: {}", e)))?;
    }

    info!(level = %config.log_level, json = config.json_logs, "Logging initialized");
    Ok(())
}

//! Configuration module for Modelwatch.

use crate::error::{ModelwatchError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration for a Modelwatch process.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelwatchConfig {
    /// Model server configuration.
    pub serving: ServingConfig,
    /// Monitoring loop and exposition configuration.
    pub monitoring: MonitoringConfig,
    /// Drift detection configuration.
    pub drift: DriftConfig,
    /// Alert delivery configuration.
    pub alerting: AlertingConfig,
    /// Model catalog configuration.
    pub registry: RegistryConfig,
    /// Logging configuration.
    pub observability: ObservabilityConfig,
}

impl ModelwatchConfig {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ModelwatchError::Configuration(format!("Failed to read config file: {}", e))
        })?;

        let config: Self = serde_json::from_str(&content).map_err(|e| {
            ModelwatchError::Configuration(format!("Failed to parse config: {}", e))
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<()> {
        if self.serving.max_models_in_memory == 0 {
            return Err(invalid(
                "serving.max_models_in_memory",
                "At least one model must fit in memory",
            ));
        }

        if self.serving.event_buffer == 0 {
            return Err(invalid("serving.event_buffer", "Event buffer must be non-zero"));
        }

        if self.monitoring.collect_interval_seconds == 0 {
            return Err(invalid(
                "monitoring.collect_interval_seconds",
                "Collection interval must be non-zero",
            ));
        }

        let thresholds = &self.monitoring.thresholds;
        if !(0.0..=1.0).contains(&thresholds.error_rate) {
            return Err(invalid(
                "monitoring.thresholds.error_rate",
                "Error rate threshold must be between 0 and 1",
            ));
        }
        if !(0.0..=100.0).contains(&thresholds.memory_percent) {
            return Err(invalid(
                "monitoring.thresholds.memory_percent",
                "Memory threshold must be a percentage",
            ));
        }

        if self.drift.window_size == 0 {
            return Err(invalid("drift.window_size", "Window size must be non-zero"));
        }
        if !self.drift.threshold.is_finite() || self.drift.threshold < 0.0 {
            return Err(invalid("drift.threshold", "Threshold must be a non-negative number"));
        }

        if self.alerting.enabled {
            for channel in &self.alerting.channels {
                match channel {
                    AlertChannelKind::Slack if self.alerting.slack_webhook_url.is_none() => {
                        return Err(invalid(
                            "alerting.slack_webhook_url",
                            "Slack channel requires a webhook URL",
                        ));
                    }
                    AlertChannelKind::Email if self.alerting.email.is_none() => {
                        return Err(invalid("alerting.email", "Email channel requires email settings"));
                    }
                    AlertChannelKind::Webhook if self.alerting.webhook_url.is_none() => {
                        return Err(invalid(
                            "alerting.webhook_url",
                            "Webhook channel requires a URL",
                        ));
                    }
                    _ => {}
                }
            }
        }

        Ok(())
    }

    /// Create a local development configuration.
    pub fn development() -> Self {
        Self {
            serving: ServingConfig {
                max_models_in_memory: 3,
                health_check_interval_seconds: 10,
                ..ServingConfig::default()
            },
            monitoring: MonitoringConfig {
                metrics_port: 9464,
                collect_interval_seconds: 5,
                ..MonitoringConfig::default()
            },
            drift: DriftConfig {
                window_size: 50,
                ..DriftConfig::default()
            },
            alerting: AlertingConfig {
                enabled: true,
                channels: vec![AlertChannelKind::Log],
                ..AlertingConfig::default()
            },
            registry: RegistryConfig {
                catalog_path: Some(PathBuf::from("./models/catalog.json")),
            },
            observability: ObservabilityConfig {
                log_level: "debug".to_string(),
                json_logs: false,
            },
        }
    }
}

fn invalid(field: &str, reason: &str) -> ModelwatchError {
    ModelwatchError::InvalidConfig {
        field: field.to_string(),
        reason: reason.to_string(),
    }
}

/// Model server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServingConfig {
    /// Hard cap on resident model instances.
    pub max_models_in_memory: usize,
    /// Model ids loaded (latest version) on start.
    pub preload_models: Vec<String>,
    /// Run one synthetic prediction after each load.
    pub warmup_on_load: bool,
    /// Seconds between `healthCheck` events; 0 disables the timer.
    pub health_check_interval_seconds: u64,
    /// Capacity of the server event channel.
    pub event_buffer: usize,
}

impl Default for ServingConfig {
    fn default() -> Self {
        Self {
            max_models_in_memory: 5,
            preload_models: Vec::new(),
            warmup_on_load: true,
            health_check_interval_seconds: 30,
            event_buffer: 1024,
        }
    }
}

impl ServingConfig {
    /// Health check interval, if the timer is enabled.
    pub fn health_check_interval(&self) -> Option<Duration> {
        match self.health_check_interval_seconds {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }
}

/// Monitoring loop configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitoringConfig {
    /// Port of the `/metrics` and `/health` endpoint.
    pub metrics_port: u16,
    /// Address the endpoint binds to.
    pub bind_host: String,
    /// Seconds between monitoring cycles.
    pub collect_interval_seconds: u64,
    /// Thresholds checked at the end of each cycle.
    pub thresholds: AlertThresholds,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            metrics_port: 9090,
            bind_host: "0.0.0.0".to_string(),
            collect_interval_seconds: 30,
            thresholds: AlertThresholds::default(),
        }
    }
}

impl MonitoringConfig {
    /// The monitoring cycle interval.
    pub fn collect_interval(&self) -> Duration {
        Duration::from_secs(self.collect_interval_seconds)
    }
}

/// Operational alert thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertThresholds {
    /// Mean prediction latency per model above which a warning fires.
    pub latency_ms: f64,
    /// Fraction of failed predictions per model above which an error fires.
    pub error_rate: f64,
    /// System memory usage percentage above which a critical alert fires.
    pub memory_percent: f64,
}

impl Default for AlertThresholds {
    fn default() -> Self {
        Self {
            latency_ms: 1000.0,
            error_rate: 0.05,
            memory_percent: 90.0,
        }
    }
}

/// Drift scoring method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DriftMethod {
    /// Population stability index over 10 equal-width bins.
    #[default]
    Psi,
    /// Closed-form KL divergence between Gaussian fits.
    KlDivergence,
    /// Sample-based first Wasserstein distance.
    Wasserstein,
}

/// Drift detection configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DriftConfig {
    /// Run drift checks after successful predictions.
    pub enabled: bool,
    /// Sliding window capacity.
    pub window_size: usize,
    /// Scoring method.
    pub method: DriftMethod,
    /// Score above which a drift warning is raised.
    pub threshold: f64,
}

impl Default for DriftConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            window_size: 100,
            method: DriftMethod::Psi,
            threshold: 0.1,
        }
    }
}

/// Alert notification channel kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertChannelKind {
    /// Write the alert to the log.
    Log,
    /// Slack-compatible chat webhook.
    Slack,
    /// Email through an HTTP mail relay.
    Email,
    /// Generic JSON webhook.
    Webhook,
}

/// Email delivery settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailConfig {
    /// HTTP endpoint of the mail relay that accepts rendered messages.
    pub relay_url: String,
    /// Sender address.
    pub from: String,
    /// Recipient addresses.
    pub to: Vec<String>,
}

/// Alert delivery configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertingConfig {
    /// Deliver alerts at all.
    pub enabled: bool,
    /// Channels, dispatched in order.
    pub channels: Vec<AlertChannelKind>,
    /// Slack webhook URL.
    pub slack_webhook_url: Option<String>,
    /// Email settings.
    pub email: Option<EmailConfig>,
    /// Generic webhook URL.
    pub webhook_url: Option<String>,
    /// Per-request timeout for HTTP channels.
    pub request_timeout_seconds: u64,
    /// Number of sent alerts kept in memory.
    pub max_history: usize,
}

impl Default for AlertingConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            channels: Vec::new(),
            slack_webhook_url: None,
            email: None,
            webhook_url: None,
            request_timeout_seconds: 10,
            max_history: 500,
        }
    }
}

/// Model catalog configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// JSON catalog file listing the available model artifacts.
    pub catalog_path: Option<PathBuf>,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level.
    pub log_level: String,
    /// Enable JSON logging.
    pub json_logs: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ModelwatchConfig::default();
        assert_eq!(config.serving.max_models_in_memory, 5);
        assert!(config.serving.warmup_on_load);
        assert_eq!(config.drift.method, DriftMethod::Psi);
        assert!(!config.alerting.enabled);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_development_config_is_valid() {
        let config = ModelwatchConfig::development();
        assert!(config.validate().is_ok());
        assert_eq!(config.alerting.channels, vec![AlertChannelKind::Log]);
    }

    #[test]
    fn test_zero_cache_rejected() {
        let mut config = ModelwatchConfig::default();
        config.serving.max_models_in_memory = 0;
        let err = config.validate().unwrap_err();
        assert!(matches!(err, ModelwatchError::InvalidConfig { ref field, .. } if field == "serving.max_models_in_memory"));
    }

    #[test]
    fn test_enabled_channel_requires_url() {
        let mut config = ModelwatchConfig::default();
        config.alerting.enabled = true;
        config.alerting.channels = vec![AlertChannelKind::Slack];
        assert!(config.validate().is_err());

        config.alerting.slack_webhook_url = Some("https://hooks.example.com/x".to_string());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let json = r#"{
            "serving": { "max_models_in_memory": 2 },
            "drift": { "method": "kl-divergence", "window_size": 20 }
        }"#;
        let config: ModelwatchConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.serving.max_models_in_memory, 2);
        assert!(config.serving.warmup_on_load);
        assert_eq!(config.drift.method, DriftMethod::KlDivergence);
        assert_eq!(config.drift.window_size, 20);
        assert_eq!(config.monitoring.metrics_port, 9090);
    }

    #[test]
    fn test_drift_method_names() {
        assert_eq!(serde_json::to_string(&DriftMethod::Psi).unwrap(), "\"psi\"");
        assert_eq!(
            serde_json::to_string(&DriftMethod::KlDivergence).unwrap(),
            "\"kl-divergence\""
        );
        assert_eq!(
            serde_json::to_string(&DriftMethod::Wasserstein).unwrap(),
            "\"wasserstein\""
        );
    }

    #[test]
    fn test_health_check_interval_disabled() {
        let mut serving = ServingConfig::default();
        assert_eq!(serving.health_check_interval(), Some(Duration::from_secs(30)));
        serving.health_check_interval_seconds = 0;
        assert_eq!(serving.health_check_interval(), None);
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("modelwatch.json");
        std::fs::write(&path, r#"{ "monitoring": { "metrics_port": 9999 } }"#).unwrap();

        let config = ModelwatchConfig::from_file(&path).unwrap();
        assert_eq!(config.monitoring.metrics_port, 9999);

        std::fs::write(&path, r#"{ "drift": { "window_size": 0 } }"#).unwrap();
        assert!(ModelwatchConfig::from_file(&path).is_err());
    }
}

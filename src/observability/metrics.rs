//! Prometheus metrics for model serving and monitoring.

use super::alerting::AlertSeverity;
use super::histograms::{ms_to_seconds, LATENCY_BUCKETS, LOAD_TIME_BUCKETS};
use super::system::SystemMetrics;
use crate::error::{ModelwatchError, Result};
use prometheus::proto::MetricFamily;
use prometheus::{
    CounterVec, Encoder, Gauge, GaugeVec, HistogramOpts, HistogramVec, Opts, Registry,
    TextEncoder,
};
use std::sync::Arc;

/// Serving and monitoring metrics on an explicit registry.
#[derive(Clone)]
pub struct MetricsCollector {
    registry: Arc<Registry>,
    /// Predictions attempted by model and version.
    pub predictions_total: CounterVec,
    /// Failed predictions by model, version and error type.
    pub prediction_errors_total: CounterVec,
    /// Prediction latency by model, version and status.
    pub prediction_latency_seconds: HistogramVec,
    /// Model load time by model and version.
    pub model_load_seconds: HistogramVec,
    /// Resident model footprint in bytes.
    pub model_memory_bytes: GaugeVec,
    /// Drift score per input feature.
    pub feature_drift_score: GaugeVec,
    /// Aggregate drift score per model.
    pub prediction_drift_score: GaugeVec,
    /// System CPU usage percent.
    pub system_cpu_percent: Gauge,
    /// System memory usage percent.
    pub system_memory_percent: Gauge,
    /// System disk usage percent.
    pub system_disk_percent: Gauge,
    /// Alerts raised by severity.
    pub alerts_total: CounterVec,
}

impl MetricsCollector {
    /// Create a collector and register every metric on a fresh registry.
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let predictions_total = CounterVec::new(
            Opts::new("modelwatch_predictions_total", "Total predictions by model"),
            &["model_id", "version"],
        )?;

        let prediction_errors_total = CounterVec::new(
            Opts::new(
                "modelwatch_prediction_errors_total",
                "Failed predictions by model and error type",
            ),
            &["model_id", "version", "error_type"],
        )?;

        let prediction_latency_seconds = HistogramVec::new(
            HistogramOpts::new(
                "modelwatch_prediction_latency_seconds",
                "Prediction latency in seconds",
            )
            .buckets(LATENCY_BUCKETS.to_vec()),
            &["model_id", "version", "status"],
        )?;

        let model_load_seconds = HistogramVec::new(
            HistogramOpts::new("modelwatch_model_load_seconds", "Model load time in seconds")
                .buckets(LOAD_TIME_BUCKETS.to_vec()),
            &["model_id", "version"],
        )?;

        let model_memory_bytes = GaugeVec::new(
            Opts::new("modelwatch_model_memory_bytes", "Resident model memory in bytes"),
            &["model_id", "version"],
        )?;

        let feature_drift_score = GaugeVec::new(
            Opts::new("modelwatch_feature_drift_score", "Drift score per input feature"),
            &["model_id", "version", "feature"],
        )?;

        let prediction_drift_score = GaugeVec::new(
            Opts::new(
                "modelwatch_prediction_drift_score",
                "Aggregate input drift score per model",
            ),
            &["model_id", "version"],
        )?;

        let system_cpu_percent =
            Gauge::new("modelwatch_system_cpu_percent", "System CPU usage percent")?;
        let system_memory_percent =
            Gauge::new("modelwatch_system_memory_percent", "System memory usage percent")?;
        let system_disk_percent =
            Gauge::new("modelwatch_system_disk_percent", "System disk usage percent")?;

        let alerts_total = CounterVec::new(
            Opts::new("modelwatch_alerts_total", "Alerts raised by severity"),
            &["severity"],
        )?;

        registry.register(Box::new(predictions_total.clone()))?;
        registry.register(Box::new(prediction_errors_total.clone()))?;
        registry.register(Box::new(prediction_latency_seconds.clone()))?;
        registry.register(Box::new(model_load_seconds.clone()))?;
        registry.register(Box::new(model_memory_bytes.clone()))?;
        registry.register(Box::new(feature_drift_score.clone()))?;
        registry.register(Box::new(prediction_drift_score.clone()))?;
        registry.register(Box::new(system_cpu_percent.clone()))?;
        registry.register(Box::new(system_memory_percent.clone()))?;
        registry.register(Box::new(system_disk_percent.clone()))?;
        registry.register(Box::new(alerts_total.clone()))?;

        Ok(Self {
            registry: Arc::new(registry),
            predictions_total,
            prediction_errors_total,
            prediction_latency_seconds,
            model_load_seconds,
            model_memory_bytes,
            feature_drift_score,
            prediction_drift_score,
            system_cpu_percent,
            system_memory_percent,
            system_disk_percent,
            alerts_total,
        })
    }

    /// The underlying registry.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Record one prediction; `error_type` is set for failures.
    pub fn record_prediction(
        &self,
        model_id: &str,
        version: &str,
        latency_ms: f64,
        error_type: Option<&str>,
    ) {
        self.predictions_total
            .with_label_values(&[model_id, version])
            .inc();

        let status = match error_type {
            Some(kind) => {
                self.prediction_errors_total
                    .with_label_values(&[model_id, version, kind])
                    .inc();
                "error"
            }
            None => "success",
        };

        self.prediction_latency_seconds
            .with_label_values(&[model_id, version, status])
            .observe(ms_to_seconds(latency_ms));
    }

    /// Observe one model load time.
    pub fn record_model_load(&self, model_id: &str, version: &str, load_time_ms: f64) {
        self.model_load_seconds
            .with_label_values(&[model_id, version])
            .observe(ms_to_seconds(load_time_ms));
    }

    /// Set the memory gauge of a resident model.
    pub fn update_model_memory(&self, model_id: &str, version: &str, bytes: u64) {
        self.model_memory_bytes
            .with_label_values(&[model_id, version])
            .set(bytes as f64);
    }

    /// Drop the memory gauge of an evicted model.
    pub fn remove_model_memory(&self, model_id: &str, version: &str) {
        // Absent labels are fine
        let _ = self.model_memory_bytes.remove_label_values(&[model_id, version]);
    }

    /// Set a drift gauge: per feature when named, else the aggregate prediction gauge.
    pub fn update_drift_score(
        &self,
        model_id: &str,
        version: &str,
        score: f64,
        feature: Option<&str>,
    ) {
        match feature {
            Some(name) => self
                .feature_drift_score
                .with_label_values(&[model_id, version, name])
                .set(score),
            None => self
                .prediction_drift_score
                .with_label_values(&[model_id, version])
                .set(score),
        }
    }

    /// Set the system CPU, memory and disk gauges.
    pub fn update_system_metrics(&self, system: &SystemMetrics) {
        self.system_cpu_percent.set(system.cpu_percent);
        self.system_memory_percent.set(system.memory_percent);
        self.system_disk_percent.set(system.disk_percent);
    }

    /// Count one alert by severity.
    pub fn record_alert(&self, severity: AlertSeverity) {
        self.alerts_total
            .with_label_values(&[severity.as_str()])
            .inc();
    }

    /// Prometheus text exposition of every registered metric.
    pub fn render(&self) -> Result<String> {
        let families = self.registry.gather();
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&families, &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| ModelwatchError::Internal(e.to_string()))
    }

    /// Liveness probe: the registry can be gathered and encoded.
    pub fn is_healthy(&self) -> bool {
        self.render().is_ok()
    }

    /// Predictions recorded for a model version, failures included.
    pub fn prediction_count(&self, model_id: &str, version: &str) -> u64 {
        self.predictions_total
            .get_metric_with_label_values(&[model_id, version])
            .map(|c| c.get() as u64)
            .unwrap_or(0)
    }

    /// Failed predictions recorded for a model version and error type.
    pub fn error_count(&self, model_id: &str, version: &str, error_type: &str) -> u64 {
        self.prediction_errors_total
            .get_metric_with_label_values(&[model_id, version, error_type])
            .map(|c| c.get() as u64)
            .unwrap_or(0)
    }

    /// Current drift gauge value, per feature when named.
    pub fn drift_score(&self, model_id: &str, version: &str, feature: Option<&str>) -> f64 {
        let gauge = match feature {
            Some(name) => self
                .feature_drift_score
                .get_metric_with_label_values(&[model_id, version, name]),
            None => self
                .prediction_drift_score
                .get_metric_with_label_values(&[model_id, version]),
        };
        gauge.map(|g| g.get()).unwrap_or(0.0)
    }

    /// Memory gauge of a model, if it is currently exported.
    pub fn model_memory(&self, model_id: &str, version: &str) -> Option<f64> {
        let families = self.registry.gather();
        let family = find_family(&families, "modelwatch_model_memory_bytes")?;
        family
            .get_metric()
            .iter()
            .find(|m| {
                let labels = m.get_label();
                labels.iter().any(|l| l.get_name() == "model_id" && l.get_value() == model_id)
                    && labels.iter().any(|l| l.get_name() == "version" && l.get_value() == version)
            })
            .map(|m| m.get_gauge().get_value())
    }

    /// Alerts recorded with a severity.
    pub fn alert_count(&self, severity: AlertSeverity) -> u64 {
        self.alerts_total
            .get_metric_with_label_values(&[severity.as_str()])
            .map(|c| c.get() as u64)
            .unwrap_or(0)
    }
}

fn find_family<'a>(families: &'a [MetricFamily], name: &str) -> Option<&'a MetricFamily> {
    families.iter().find(|f| f.get_name() == name)
}

//! Wires model server events into metrics, drift and alerts.

use super::drift::DriftDetector;
use crate::compute::serving::{ModelServer, PredictionObserver, ServerEvent};
use crate::config::{AlertThresholds, DriftConfig, MonitoringConfig};
use crate::error::{ModelwatchError, Result};
use crate::observability::alerting::{Alert, AlertManager, AlertSeverity};
use crate::observability::histograms::LatencyStats;
use crate::observability::http::{self, HttpState};
use crate::observability::metrics::MetricsCollector;
use crate::observability::system::SystemSampler;
use crate::shutdown::ShutdownCoordinator;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Per-model outcomes within one monitoring cycle
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CycleTally {
    /// Predictions attempted
    pub requests: u64,
    /// Predictions that failed
    pub errors: u64,
    /// Latency of all attempts
    pub latency: LatencyStats,
}

impl CycleTally {
    /// Failed fraction of the cycle's requests, 0 when there were none
    pub fn error_rate(&self) -> f64 {
        if self.requests == 0 {
            0.0
        } else {
            self.errors as f64 / self.requests as f64
        }
    }
}

/// Model monitoring orchestrator
///
/// Prediction counts and tallies arrive through [`PredictionObserver`] on the
/// request path; the event stream feeds drift and lifecycle gauges.
pub struct ModelMonitor {
    monitoring: MonitoringConfig,
    drift_config: DriftConfig,
    metrics: MetricsCollector,
    drift: Arc<DriftDetector>,
    alerts: Arc<AlertManager>,
    sampler: SystemSampler,
    server: Option<Arc<ModelServer>>,
    tallies: Mutex<HashMap<(String, String), CycleTally>>,
    /// Models already warned about a missing drift reference
    unseeded: Mutex<HashSet<String>>,
    shutdown: ShutdownCoordinator,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl ModelMonitor {
    /// Create a monitor; nothing runs until `start`.
    pub fn new(
        monitoring: MonitoringConfig,
        drift_config: DriftConfig,
        metrics: MetricsCollector,
        alerts: Arc<AlertManager>,
    ) -> Self {
        Self {
            drift: Arc::new(DriftDetector::from_config(&drift_config)),
            monitoring,
            drift_config,
            metrics,
            alerts,
            sampler: SystemSampler::new(),
            server: None,
            tallies: Mutex::new(HashMap::new()),
            unseeded: Mutex::new(HashSet::new()),
            shutdown: ShutdownCoordinator::new(),
            tasks: Mutex::new(Vec::new()),
        }
    }

    /// Bind a model server whose events drive the monitor.
    pub fn with_server(mut self, server: Arc<ModelServer>) -> Self {
        self.server = Some(server);
        self
    }

    /// Share an externally owned shutdown coordinator.
    pub fn with_shutdown(mut self, shutdown: ShutdownCoordinator) -> Self {
        self.shutdown = shutdown;
        self
    }

    /// Metrics collector fed by this monitor.
    pub fn metrics(&self) -> &MetricsCollector {
        &self.metrics
    }

    /// Drift detector holding the per-model references.
    pub fn drift(&self) -> &DriftDetector {
        &self.drift
    }

    /// Alert manager used for drift and threshold alerts.
    pub fn alerts(&self) -> &AlertManager {
        &self.alerts
    }

    /// Thresholds checked at the end of each cycle.
    pub fn thresholds(&self) -> &AlertThresholds {
        &self.monitoring.thresholds
    }

    /// Copy of the current cycle's tallies.
    pub fn tallies(&self) -> HashMap<(String, String), CycleTally> {
        self.tallies.lock().clone()
    }

    /// Start the HTTP surface, the event loop, and the cycle timer.
    ///
    /// Returns the address the endpoint is bound to.
    pub async fn start(self: &Arc<Self>) -> Result<SocketAddr> {
        let bind = format!("{}:{}", self.monitoring.bind_host, self.monitoring.metrics_port);
        let listener = TcpListener::bind(&bind).await.map_err(|e| {
            ModelwatchError::Network(format!("Failed to bind metrics endpoint {}: {}", bind, e))
        })?;
        let addr = listener.local_addr()?;

        let state = HttpState {
            metrics: self.metrics.clone(),
            server: self.server.clone(),
            drift: Some(self.drift.clone()),
        };
        let signalled = self.shutdown.signalled();
        let http_task = tokio::spawn(async move {
            if let Err(e) = http::serve(listener, state, signalled).await {
                error!(error = %e, "Metrics endpoint failed");
            }
        });

        let mut tasks = vec![http_task];

        if let Some(server) = &self.server {
            let observer: Arc<dyn PredictionObserver> = self.clone();
            server.set_observer(Arc::downgrade(&observer));

            let mut events = server.subscribe();
            let mut shutdown = self.shutdown.subscribe();
            let monitor = Arc::clone(self);
            tasks.push(tokio::spawn(async move {
                loop {
                    tokio::select! {
                        received = events.recv() => match received {
                            Ok(event) => monitor.handle_event(event),
                            Err(RecvError::Lagged(skipped)) => {
                                warn!(skipped, "Monitor lagged behind server events, drift samples skipped");
                            }
                            Err(RecvError::Closed) => break,
                        },
                        _ = shutdown.recv() => break,
                    }
                }
                debug!("Monitor event loop stopped");
            }));
        }

        let monitor = Arc::clone(self);
        let mut shutdown = self.shutdown.subscribe();
        let period = self.monitoring.collect_interval();
        tasks.push(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = ticker.tick() => monitor.run_cycle().await,
                    _ = shutdown.recv() => break,
                }
            }
            debug!("Monitor cycle loop stopped");
        }));

        self.tasks.lock().extend(tasks);
        info!(addr = %addr, interval_secs = period.as_secs(), "Model monitor started");
        Ok(addr)
    }

    /// Cancel the timers and stop the endpoint.
    pub async fn stop(&self) {
        self.shutdown.shutdown();
        let tasks: Vec<JoinHandle<()>> = self.tasks.lock().drain(..).collect();
        for task in tasks {
            if tokio::time::timeout(self.shutdown.timeout(), task).await.is_err() {
                warn!("Monitor task did not stop in time");
            }
        }
        info!("Model monitor stopped");
    }

    /// React to one server event.
    ///
    /// Drift is scored inline so the window sees inputs in event order; only
    /// the alert dispatch is spawned.
    pub fn handle_event(self: &Arc<Self>, event: ServerEvent) {
        match event {
            ServerEvent::Prediction {
                model_id,
                version,
                input,
                ..
            } => {
                if !self.drift_config.enabled {
                    return;
                }
                if !self.drift.has_reference(&model_id) {
                    if self.unseeded.lock().insert(model_id.clone()) {
                        warn!(
                            model_id = %model_id,
                            "Drift enabled but no reference set, skipping drift checks"
                        );
                    }
                    return;
                }
                match self.score_drift(&model_id, &version, &input) {
                    Ok((_, Some(alert))) => {
                        let monitor = Arc::clone(self);
                        tokio::spawn(async move { monitor.raise(alert).await });
                    }
                    Ok((_, None)) => {}
                    Err(e) => warn!(model_id = %model_id, error = %e, "Drift check failed"),
                }
            }
            ServerEvent::PredictionError { .. } => {}
            ServerEvent::ModelLoaded {
                model_id,
                version,
                load_time_ms,
                memory_usage,
            } => {
                self.metrics.record_model_load(&model_id, &version, load_time_ms);
                self.metrics.update_model_memory(&model_id, &version, memory_usage);
            }
            ServerEvent::ModelEvicted { model_id, version } => {
                self.metrics.remove_model_memory(&model_id, &version);
            }
            ServerEvent::HealthCheck(report) => {
                for model in &report.models {
                    self.metrics
                        .update_model_memory(&model.model_id, &model.version, model.memory_usage);
                }
            }
        }
    }

    fn tally(&self, model_id: &str, version: &str, latency_ms: f64, failed: bool) {
        let mut tallies = self.tallies.lock();
        let tally = tallies
            .entry((model_id.to_string(), version.to_string()))
            .or_default();
        tally.requests += 1;
        if failed {
            tally.errors += 1;
        }
        tally.latency.record_ms(latency_ms);
    }

    /// Score one input and build the drift alert when it crosses the threshold.
    pub fn score_drift(
        &self,
        model_id: &str,
        version: &str,
        input: &serde_json::Value,
    ) -> Result<(f64, Option<Alert>)> {
        let score = self.drift.detect_drift(model_id, input)?;
        self.metrics.update_drift_score(model_id, version, score, None);

        let threshold = self.drift_config.threshold;
        if score <= threshold {
            return Ok((score, None));
        }
        let alert = Alert::new(
            AlertSeverity::Warning,
            "Data drift detected",
            format!(
                "Input drift for {} is {:.4}, above threshold {}",
                model_id, score, threshold
            ),
        )
        .for_model(model_id, version)
        .with_metric("drift_score", score)
        .with_metric("threshold", threshold);
        Ok((score, Some(alert)))
    }

    /// Score one input for drift and warn when it crosses the threshold.
    pub async fn check_drift(
        &self,
        model_id: &str,
        version: &str,
        input: &serde_json::Value,
    ) -> Result<f64> {
        let (score, alert) = self.score_drift(model_id, version, input)?;
        if let Some(alert) = alert {
            self.raise(alert).await;
        }
        Ok(score)
    }

    async fn raise(&self, alert: Alert) {
        // Dropped alerts are not counted
        if self.alerts.is_enabled() {
            self.metrics.record_alert(alert.severity);
        }
        self.alerts.send_alert(alert).await;
    }

    /// One monitoring cycle: system sample, server health, threshold checks.
    pub async fn run_cycle(&self) {
        let system = self.sampler.sample();
        self.metrics.update_system_metrics(&system);

        if let Some(server) = &self.server {
            let report = server.get_health();
            for model in &report.models {
                self.metrics
                    .update_model_memory(&model.model_id, &model.version, model.memory_usage);
            }
        }

        let tallies = std::mem::take(&mut *self.tallies.lock());
        for alert in threshold_alerts(&self.monitoring.thresholds, &tallies, system.memory_percent) {
            self.raise(alert).await;
        }
        debug!(
            models = tallies.len(),
            cpu_percent = system.cpu_percent,
            memory_percent = system.memory_percent,
            "Monitoring cycle complete"
        );
    }
}

impl PredictionObserver for ModelMonitor {
    fn observe(&self, model_id: &str, version: &str, latency_ms: f64, error_type: Option<&str>) {
        self.metrics
            .record_prediction(model_id, version, latency_ms, error_type);
        self.tally(model_id, version, latency_ms, error_type.is_some());
    }
}

/// Alerts due for one cycle's tallies and the current memory usage.
pub fn threshold_alerts(
    thresholds: &AlertThresholds,
    tallies: &HashMap<(String, String), CycleTally>,
    memory_percent: f64,
) -> Vec<Alert> {
    let mut keys: Vec<&(String, String)> = tallies.keys().collect();
    keys.sort();

    let mut alerts = Vec::new();
    for key in keys {
        let (model_id, version) = key;
        let tally = &tallies[key];

        let error_rate = tally.error_rate();
        if error_rate > thresholds.error_rate {
            alerts.push(
                Alert::new(
                    AlertSeverity::Error,
                    "High error rate",
                    format!(
                        "{} of {} predictions failed for {}",
                        tally.errors, tally.requests, model_id
                    ),
                )
                .for_model(model_id, version)
                .with_metric("error_rate", error_rate)
                .with_metric("threshold", thresholds.error_rate),
            );
        }

        if let Some(avg) = tally.latency.avg_ms() {
            if avg > thresholds.latency_ms {
                alerts.push(
                    Alert::new(
                        AlertSeverity::Warning,
                        "High prediction latency",
                        format!("Mean latency for {} is {:.1}ms", model_id, avg),
                    )
                    .for_model(model_id, version)
                    .with_metric("latency_ms", avg)
                    .with_metric("threshold", thresholds.latency_ms),
                );
            }
        }
    }

    if memory_percent > thresholds.memory_percent {
        alerts.push(
            Alert::new(
                AlertSeverity::Critical,
                "High memory usage",
                format!("System memory usage is {:.1}%", memory_percent),
            )
            .with_metric("memory_percent", memory_percent)
            .with_metric("threshold", thresholds.memory_percent),
        );
    }

    alerts
}

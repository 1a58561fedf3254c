//! Alert delivery for Modelwatch.
//!
//! An [`AlertManager`] fans each alert out to its notification channels in
//! order. Every channel is attempted; a failing channel is logged and the
//! remaining channels still run. Once all attempts finish an
//! [`AlertEvent::Sent`] is published.

use crate::config::{AlertChannelKind, AlertingConfig, EmailConfig};
use crate::error::{ModelwatchError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

/// Alert severity levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertSeverity {
    /// Should be investigated.
    Warning,
    /// Something is failing.
    Error,
    /// Requires immediate attention.
    Critical,
}

impl AlertSeverity {
    /// Get the string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertSeverity::Warning => "warning",
            AlertSeverity::Error => "error",
            AlertSeverity::Critical => "critical",
        }
    }

    /// Attachment color used in chat payloads.
    pub fn color(&self) -> &'static str {
        match self {
            AlertSeverity::Warning => "#ffa500",
            AlertSeverity::Error => "#ff0000",
            AlertSeverity::Critical => "#8b0000",
        }
    }
}

/// An alert raised by the monitor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    /// Unique id.
    pub id: String,
    /// Severity level.
    pub severity: AlertSeverity,
    /// Short title.
    pub title: String,
    /// Human-readable detail.
    pub message: String,
    /// Model the alert concerns.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_id: Option<String>,
    /// Version the alert concerns.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_version: Option<String>,
    /// Metric values behind the alert.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metrics: BTreeMap<String, f64>,
    /// When the alert was raised.
    pub created_at: DateTime<Utc>,
}

impl Alert {
    /// Create a new alert.
    pub fn new(severity: AlertSeverity, title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            severity,
            title: title.into(),
            message: message.into(),
            model_id: None,
            model_version: None,
            metrics: BTreeMap::new(),
            created_at: Utc::now(),
        }
    }

    /// Attach the model the alert concerns.
    pub fn for_model(mut self, model_id: &str, version: &str) -> Self {
        self.model_id = Some(model_id.to_string());
        self.model_version = Some(version.to_string());
        self
    }

    /// Add a metric value.
    pub fn with_metric(mut self, name: impl Into<String>, value: f64) -> Self {
        self.metrics.insert(name.into(), value);
        self
    }
}

/// Outcome of one dispatch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DispatchReport {
    /// Channels that accepted the alert.
    pub delivered: Vec<String>,
    /// Channels that failed.
    pub failed: Vec<String>,
}

/// Events published by the alert manager.
#[derive(Debug, Clone)]
pub enum AlertEvent {
    /// All channels were attempted for an alert.
    Sent {
        alert: Alert,
        report: DispatchReport,
    },
}

/// A destination for alerts.
#[async_trait]
pub trait NotificationChannel: Send + Sync {
    /// Channel name used in logs and reports.
    fn name(&self) -> &str;

    /// Deliver one alert.
    async fn send(&self, alert: &Alert) -> Result<()>;
}

/// Writes alerts to the log.
pub struct LogChannel;

#[async_trait]
impl NotificationChannel for LogChannel {
    fn name(&self) -> &str {
        "log"
    }

    async fn send(&self, alert: &Alert) -> Result<()> {
        match alert.severity {
            AlertSeverity::Warning => warn!(
                alert_id = %alert.id,
                title = %alert.title,
                model_id = alert.model_id.as_deref().unwrap_or("-"),
                metrics = ?alert.metrics,
                "ALERT {}", alert.message
            ),
            AlertSeverity::Error | AlertSeverity::Critical => error!(
                alert_id = %alert.id,
                severity = alert.severity.as_str(),
                title = %alert.title,
                model_id = alert.model_id.as_deref().unwrap_or("-"),
                metrics = ?alert.metrics,
                "ALERT {}", alert.message
            ),
        }
        Ok(())
    }
}

/// Slack-compatible chat webhook.
pub struct SlackChannel {
    webhook_url: String,
    http: reqwest::Client,
}

impl SlackChannel {
    pub fn new(webhook_url: &str, http: reqwest::Client) -> Self {
        Self {
            webhook_url: webhook_url.to_string(),
            http,
        }
    }
}

#[async_trait]
impl NotificationChannel for SlackChannel {
    fn name(&self) -> &str {
        "slack"
    }

    async fn send(&self, alert: &Alert) -> Result<()> {
        post_json(&self.http, self.name(), &self.webhook_url, &slack_payload(alert)).await
    }
}

/// Email through an HTTP mail relay.
pub struct EmailChannel {
    config: EmailConfig,
    http: reqwest::Client,
}

impl EmailChannel {
    pub fn new(config: EmailConfig, http: reqwest::Client) -> Self {
        Self { config, http }
    }
}

#[async_trait]
impl NotificationChannel for EmailChannel {
    fn name(&self) -> &str {
        "email"
    }

    async fn send(&self, alert: &Alert) -> Result<()> {
        let message = email_message(&self.config, alert);
        post_json(&self.http, self.name(), &self.config.relay_url, &message).await
    }
}

/// Generic JSON webhook.
pub struct WebhookChannel {
    url: String,
    http: reqwest::Client,
}

impl WebhookChannel {
    pub fn new(url: &str, http: reqwest::Client) -> Self {
        Self {
            url: url.to_string(),
            http,
        }
    }
}

#[async_trait]
impl NotificationChannel for WebhookChannel {
    fn name(&self) -> &str {
        "webhook"
    }

    async fn send(&self, alert: &Alert) -> Result<()> {
        post_json(&self.http, self.name(), &self.url, &webhook_payload(alert)).await
    }
}

async fn post_json(
    http: &reqwest::Client,
    channel: &str,
    url: &str,
    payload: &serde_json::Value,
) -> Result<()> {
    let dispatch_error = |reason: String| ModelwatchError::AlertDispatch {
        channel: channel.to_string(),
        reason,
    };

    let response = http
        .post(url)
        .json(payload)
        .send()
        .await
        .map_err(|e| dispatch_error(e.to_string()))?;
    response
        .error_for_status()
        .map_err(|e| dispatch_error(e.to_string()))?;
    debug!(channel, url, "Alert delivered");
    Ok(())
}

/// Chat webhook payload: one attachment coloured by severity.
pub fn slack_payload(alert: &Alert) -> serde_json::Value {
    let mut fields = Vec::new();
    if let Some(model_id) = &alert.model_id {
        let model = match &alert.model_version {
            Some(version) => format!("{}:{}", model_id, version),
            None => model_id.clone(),
        };
        fields.push(serde_json::json!({"title": "Model", "value": model, "short": true}));
    }
    for (name, value) in &alert.metrics {
        fields.push(serde_json::json!({
            "title": name,
            "value": format!("{:.4}", value),
            "short": true
        }));
    }

    serde_json::json!({
        "attachments": [{
            "color": alert.severity.color(),
            "title": format!("[{}] {}", alert.severity.as_str().to_uppercase(), alert.title),
            "text": alert.message,
            "fields": fields,
            "footer": "Modelwatch",
            "timestamp": alert.created_at.timestamp()
        }]
    })
}

/// Generic webhook payload: the alert plus a dispatch timestamp.
pub fn webhook_payload(alert: &Alert) -> serde_json::Value {
    let mut payload = serde_json::to_value(alert).unwrap_or_else(|_| serde_json::json!({}));
    if let Some(object) = payload.as_object_mut() {
        object.insert(
            "timestamp".to_string(),
            serde_json::Value::String(Utc::now().to_rfc3339()),
        );
    }
    payload
}

/// Rendered message posted to the mail relay.
pub fn email_message(config: &EmailConfig, alert: &Alert) -> serde_json::Value {
    let mut text = alert.message.clone();
    if let Some(model_id) = &alert.model_id {
        text.push_str(&format!(
            "\n\nModel: {} (version {})",
            model_id,
            alert.model_version.as_deref().unwrap_or("latest")
        ));
    }
    for (name, value) in &alert.metrics {
        text.push_str(&format!("\n{}: {}", name, value));
    }

    serde_json::json!({
        "from": config.from,
        "to": config.to,
        "subject": format!("[{}] {}", alert.severity.as_str().to_uppercase(), alert.title),
        "text": text
    })
}

/// Fans alerts out to notification channels.
pub struct AlertManager {
    enabled: bool,
    channels: Vec<Arc<dyn NotificationChannel>>,
    history: Mutex<VecDeque<Alert>>,
    max_history: usize,
    events: broadcast::Sender<AlertEvent>,
}

impl AlertManager {
    /// Create a manager over explicit channels.
    pub fn new(enabled: bool, channels: Vec<Arc<dyn NotificationChannel>>, max_history: usize) -> Self {
        let (events, _) = broadcast::channel(256);
        Self {
            enabled,
            channels,
            history: Mutex::new(VecDeque::new()),
            max_history,
            events,
        }
    }

    /// Build the configured channels.
    pub fn from_config(config: &AlertingConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_seconds))
            .build()?;

        let mut channels: Vec<Arc<dyn NotificationChannel>> = Vec::new();
        for kind in &config.channels {
            let channel: Arc<dyn NotificationChannel> = match kind {
                AlertChannelKind::Log => Arc::new(LogChannel),
                AlertChannelKind::Slack => {
                    let url = required(config.slack_webhook_url.as_deref(), "alerting.slack_webhook_url")?;
                    Arc::new(SlackChannel::new(url, http.clone()))
                }
                AlertChannelKind::Email => {
                    let email = config.email.clone().ok_or_else(|| ModelwatchError::InvalidConfig {
                        field: "alerting.email".to_string(),
                        reason: "Email channel requires email settings".to_string(),
                    })?;
                    Arc::new(EmailChannel::new(email, http.clone()))
                }
                AlertChannelKind::Webhook => {
                    let url = required(config.webhook_url.as_deref(), "alerting.webhook_url")?;
                    Arc::new(WebhookChannel::new(url, http.clone()))
                }
            };
            channels.push(channel);
        }

        info!(
            enabled = config.enabled,
            channels = channels.len(),
            "Alert manager configured"
        );
        Ok(Self::new(config.enabled, channels, config.max_history))
    }

    /// Whether alerts are delivered at all.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Subscribe to dispatch events.
    pub fn subscribe(&self) -> broadcast::Receiver<AlertEvent> {
        self.events.subscribe()
    }

    /// Deliver an alert to every channel.
    pub async fn send_alert(&self, alert: Alert) -> DispatchReport {
        let mut report = DispatchReport::default();
        if !self.enabled {
            debug!(title = %alert.title, "Alerting disabled, dropping alert");
            return report;
        }

        for channel in &self.channels {
            match channel.send(&alert).await {
                Ok(()) => report.delivered.push(channel.name().to_string()),
                Err(e) => {
                    error!(channel = channel.name(), error = %e, "Failed to send alert");
                    report.failed.push(channel.name().to_string());
                }
            }
        }

        {
            let mut history = self.history.lock();
            history.push_back(alert.clone());
            while history.len() > self.max_history {
                history.pop_front();
            }
        }

        let _ = self.events.send(AlertEvent::Sent {
            alert,
            report: report.clone(),
        });
        report
    }

    /// Recent alerts, oldest first.
    pub fn history(&self) -> Vec<Alert> {
        self.history.lock().iter().cloned().collect()
    }
}

fn required<'a>(value: Option<&'a str>, field: &str) -> Result<&'a str> {
    value.ok_or_else(|| ModelwatchError::InvalidConfig {
        field: field.to_string(),
        reason: "URL is required for this channel".to_string(),
    })
}

// Shared test support for integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use modelwatch::compute::{
    ArtifactLocation, BackendFactory, ModelArtifact, ModelFramework, ModelInstance,
    ModelMetadata, ModelServer, StaticRegistry,
};
use modelwatch::config::ServingConfig;
use modelwatch::observability::{Alert, NotificationChannel};
use modelwatch::{ModelwatchError, Result};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::HashSet;
use std::net::TcpListener;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Finds an available local port
pub fn find_available_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").expect("Failed to bind");
    listener.local_addr().expect("no local addr").port()
}

/// Ordered record of backend lifecycle calls, e.g. `load:a:v1`
#[derive(Default)]
pub struct LifecycleLog {
    entries: Mutex<Vec<String>>,
}

impl LifecycleLog {
    pub fn push(&self, entry: String) {
        self.entries.lock().push(entry);
    }

    pub fn entries(&self) -> Vec<String> {
        self.entries.lock().clone()
    }

    /// Entries starting with `prefix`
    pub fn matching(&self, prefix: &str) -> Vec<String> {
        self.entries
            .lock()
            .iter()
            .filter(|e| e.starts_with(prefix))
            .cloned()
            .collect()
    }
}

/// Backend factory producing recording mock instances
pub struct MockBackends {
    pub log: Arc<LifecycleLog>,
    load_delay: Duration,
    failing_loads: HashSet<String>,
    failing_warmup: bool,
}

impl MockBackends {
    pub fn new() -> Self {
        Self {
            log: Arc::new(LifecycleLog::default()),
            load_delay: Duration::ZERO,
            failing_loads: HashSet::new(),
            failing_warmup: false,
        }
    }

    /// Every load sleeps this long before completing
    pub fn with_load_delay(mut self, delay: Duration) -> Self {
        self.load_delay = delay;
        self
    }

    /// Loads of this model id fail
    pub fn with_failing_load(mut self, model_id: &str) -> Self {
        self.failing_loads.insert(model_id.to_string());
        self
    }

    /// The first prediction of each instance fails
    pub fn with_failing_warmup(mut self) -> Self {
        self.failing_warmup = true;
        self
    }
}

impl BackendFactory for MockBackends {
    fn create(&self, artifact: &ModelArtifact) -> Result<Box<dyn ModelInstance>> {
        if artifact.metadata.framework == ModelFramework::Onnx {
            return Err(ModelwatchError::Configuration(
                "onnx backend not implemented".to_string(),
            ));
        }
        Ok(Box::new(MockModel {
            metadata: artifact.metadata.clone(),
            log: self.log.clone(),
            load_delay: self.load_delay,
            fail_load: self.failing_loads.contains(&artifact.metadata.model_id),
            fail_first_predict: AtomicBool::new(self.failing_warmup),
        }))
    }
}

/// Model that echoes the sum of its numeric input
pub struct MockModel {
    metadata: ModelMetadata,
    log: Arc<LifecycleLog>,
    load_delay: Duration,
    fail_load: bool,
    fail_first_predict: AtomicBool,
}

impl MockModel {
    fn label(&self) -> String {
        format!("{}:{}", self.metadata.model_id, self.metadata.version)
    }
}

#[async_trait]
impl ModelInstance for MockModel {
    fn metadata(&self) -> &ModelMetadata {
        &self.metadata
    }

    async fn load(&mut self) -> Result<()> {
        self.log.push(format!("load:{}", self.label()));
        if !self.load_delay.is_zero() {
            tokio::time::sleep(self.load_delay).await;
        }
        if self.fail_load {
            return Err(ModelwatchError::Load(format!("{} is corrupt", self.label())));
        }
        Ok(())
    }

    async fn predict(&self, input: &Value) -> Result<Value> {
        self.log.push(format!("predict:{}", self.label()));
        if self.fail_first_predict.swap(false, Ordering::SeqCst) {
            return Err(ModelwatchError::Prediction("warmup rejected".to_string()));
        }
        let sum: f64 = modelwatch::numeric_leaves(input).iter().sum();
        Ok(json!([sum]))
    }

    async fn unload(&self) -> Result<()> {
        self.log.push(format!("unload:{}", self.label()));
        Ok(())
    }

    fn memory_usage(&self) -> u64 {
        1024
    }
}

/// Inline artifact for the mock backends
pub fn artifact(model_id: &str, version: &str) -> ModelArtifact {
    ModelArtifact {
        location: ArtifactLocation::Inline(json!({})),
        metadata: ModelMetadata::new(model_id, version, ModelFramework::Custom)
            .with_input_shape(vec![2]),
    }
}

/// Registry holding `artifact(id, version)` for each pair
pub fn registry(models: &[(&str, &str)]) -> StaticRegistry {
    StaticRegistry::with_artifacts(models.iter().map(|(id, v)| artifact(id, v)))
}

/// Serving config without the health timer
pub fn serving_config(max_models: usize) -> ServingConfig {
    ServingConfig {
        max_models_in_memory: max_models,
        health_check_interval_seconds: 0,
        ..ServingConfig::default()
    }
}

/// Server over the given registry and mock backends
pub fn server(
    config: ServingConfig,
    registry: StaticRegistry,
    backends: MockBackends,
) -> (Arc<ModelServer>, Arc<LifecycleLog>) {
    let log = backends.log.clone();
    let server = Arc::new(ModelServer::new(
        config,
        Arc::new(registry),
        Arc::new(backends),
    ));
    (server, log)
}

/// Channel that records what it delivers
#[derive(Default)]
pub struct RecordingChannel {
    pub delivered: Mutex<Vec<Alert>>,
}

#[async_trait]
impl NotificationChannel for RecordingChannel {
    fn name(&self) -> &str {
        "recording"
    }

    async fn send(&self, alert: &Alert) -> Result<()> {
        self.delivered.lock().push(alert.clone());
        Ok(())
    }
}

/// Channel that always fails
pub struct FailingChannel;

#[async_trait]
impl NotificationChannel for FailingChannel {
    fn name(&self) -> &str {
        "failing"
    }

    async fn send(&self, _alert: &Alert) -> Result<()> {
        Err(ModelwatchError::AlertDispatch {
            channel: "failing".to_string(),
            reason: "unreachable".to_string(),
        })
    }
}

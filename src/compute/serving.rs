// Model serving with a bounded LRU cache

use super::inference::{BackendFactory, ModelInstance};
use super::registry::ModelRegistry;
use crate::config::ServingConfig;
use crate::error::{ModelwatchError, Result};
use crate::types::{numeric_leaves, CacheKey, LATEST_VERSION};
use chrono::{DateTime, Utc};
use lru::LruCache;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Instant;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Per-request options; `timeout_ms` and `batch_size` are advisory
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PredictionOptions {
    /// Requested timeout in milliseconds
    pub timeout_ms: Option<u64>,
    /// Requested batch size
    pub batch_size: Option<usize>,
    /// Compute a confidence score from the output
    pub return_metadata: bool,
}

/// Prediction request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionRequest {
    /// Model id
    pub model_id: String,
    /// Version (None for latest)
    #[serde(default)]
    pub version: Option<String>,
    /// Opaque model input
    pub input: serde_json::Value,
    /// Options
    #[serde(default)]
    pub options: PredictionOptions,
}

impl PredictionRequest {
    /// Creates a request against the latest version
    pub fn new(model_id: &str, input: serde_json::Value) -> Self {
        Self {
            model_id: model_id.to_string(),
            version: None,
            input,
            options: PredictionOptions::default(),
        }
    }

    /// Pins a version
    pub fn with_version(mut self, version: &str) -> Self {
        self.version = Some(version.to_string());
        self
    }

    /// Requests a confidence score
    pub fn with_metadata(mut self) -> Self {
        self.options.return_metadata = true;
        self
    }

    /// Cache key this request resolves to
    pub fn cache_key(&self) -> CacheKey {
        CacheKey::new(&self.model_id, self.version.as_deref())
    }
}

/// Prediction response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResponse {
    /// Raw model output
    pub predictions: serde_json::Value,
    /// Model id
    pub model_id: String,
    /// Resolved version
    pub model_version: String,
    /// Server-side processing time
    pub processing_time_ms: f64,
    /// Maximum numeric output, when requested
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    /// A/B variant label, set by the router
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ab_test_variant: Option<String>,
}

/// Health of one resident model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelHealth {
    /// Model id
    pub model_id: String,
    /// Resolved version
    pub version: String,
    /// Approximate footprint in bytes
    pub memory_usage: u64,
    /// Accesses since load
    pub use_count: u64,
    /// Last access
    pub last_used: DateTime<Utc>,
}

/// Snapshot of the server's cache
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthReport {
    /// Server has not been stopped
    pub healthy: bool,
    /// Resident instance count
    pub resident_models: usize,
    /// Configured cap
    pub max_models: usize,
    /// Sum of resident footprints
    pub total_memory_usage: u64,
    /// Per-model detail, most recently used first
    pub models: Vec<ModelHealth>,
    /// When the snapshot was taken
    pub timestamp: DateTime<Utc>,
}

/// Lifecycle events published by the server
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEvent {
    /// A prediction succeeded
    Prediction {
        model_id: String,
        version: String,
        input: serde_json::Value,
        latency_ms: f64,
        confidence: Option<f64>,
    },
    /// A prediction failed
    PredictionError {
        model_id: String,
        version: String,
        error_type: String,
        message: String,
        latency_ms: f64,
    },
    /// A model was loaded into the cache
    ModelLoaded {
        model_id: String,
        version: String,
        load_time_ms: f64,
        memory_usage: u64,
    },
    /// A model left the cache
    ModelEvicted { model_id: String, version: String },
    /// Periodic health snapshot
    HealthCheck(HealthReport),
}

/// Observes every prediction outcome on the request path.
///
/// Unlike the event channel this never drops outcomes, so counters fed from
/// it advance exactly once per `predict` call.
pub trait PredictionObserver: Send + Sync {
    /// Called once per prediction; `error_type` is set on failure.
    fn observe(&self, model_id: &str, version: &str, latency_ms: f64, error_type: Option<&str>);
}

/// Server statistics
#[derive(Debug, Default)]
pub struct ServerStats {
    /// Predictions attempted
    pub predictions: AtomicU64,
    /// Failed predictions
    pub errors: AtomicU64,
    /// Cache hits
    pub cache_hits: AtomicU64,
    /// Backend loads completed
    pub loads: AtomicU64,
    /// Instances removed from the cache
    pub evictions: AtomicU64,
}

struct CacheEntry {
    instance: Arc<dyn ModelInstance>,
    last_used: DateTime<Utc>,
    use_count: u64,
}

/// Bounded cache of model instances serving predictions
pub struct ModelServer {
    config: ServingConfig,
    registry: Arc<dyn ModelRegistry>,
    backends: Arc<dyn BackendFactory>,
    cache: Mutex<LruCache<CacheKey, CacheEntry>>,
    /// In-flight load gates, one per missing key
    loading: Mutex<HashMap<CacheKey, Arc<tokio::sync::Mutex<()>>>>,
    events: broadcast::Sender<ServerEvent>,
    stats: ServerStats,
    stopped: AtomicBool,
    health_task: Mutex<Option<JoinHandle<()>>>,
    observer: Mutex<Option<Weak<dyn PredictionObserver>>>,
}

impl ModelServer {
    /// Creates a server; nothing is loaded until `start` or the first request
    pub fn new(
        config: ServingConfig,
        registry: Arc<dyn ModelRegistry>,
        backends: Arc<dyn BackendFactory>,
    ) -> Self {
        let capacity = NonZeroUsize::new(config.max_models_in_memory).unwrap_or(NonZeroUsize::MIN);
        let (events, _) = broadcast::channel(config.event_buffer.max(1));
        Self {
            config,
            registry,
            backends,
            cache: Mutex::new(LruCache::new(capacity)),
            loading: Mutex::new(HashMap::new()),
            events,
            stats: ServerStats::default(),
            stopped: AtomicBool::new(false),
            health_task: Mutex::new(None),
            observer: Mutex::new(None),
        }
    }

    /// Attaches the prediction observer, replacing any previous one
    pub fn set_observer(&self, observer: Weak<dyn PredictionObserver>) {
        *self.observer.lock() = Some(observer);
    }

    fn notify(&self, model_id: &str, version: &str, latency_ms: f64, error_type: Option<&str>) {
        let observer = self.observer.lock().as_ref().and_then(Weak::upgrade);
        if let Some(observer) = observer {
            observer.observe(model_id, version, latency_ms, error_type);
        }
    }

    /// Serving configuration
    pub fn config(&self) -> &ServingConfig {
        &self.config
    }

    /// Statistics
    pub fn stats(&self) -> &ServerStats {
        &self.stats
    }

    /// Subscribes to server events
    pub fn subscribe(&self) -> broadcast::Receiver<ServerEvent> {
        self.events.subscribe()
    }

    /// Number of resident instances
    pub fn resident_count(&self) -> usize {
        self.cache.lock().len()
    }

    /// Whether a key is resident, without touching its recency
    pub fn is_resident(&self, model_id: &str, version: Option<&str>) -> bool {
        self.cache.lock().contains(&CacheKey::new(model_id, version))
    }

    fn emit(&self, event: ServerEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    /// Preloads configured models and starts the health timer
    pub async fn start(self: &Arc<Self>) {
        self.stopped.store(false, Ordering::SeqCst);

        for model_id in &self.config.preload_models {
            match self.get_or_load_model(model_id, None).await {
                Ok(instance) => info!(
                    model_id = %model_id,
                    version = %instance.metadata().version,
                    "Preloaded model"
                ),
                Err(e) => warn!(model_id = %model_id, error = %e, "Failed to preload model"),
            }
        }

        if let Some(interval) = self.config.health_check_interval() {
            let server: Weak<Self> = Arc::downgrade(self);
            let handle = tokio::spawn(async move {
                let mut ticker = tokio::time::interval(interval);
                ticker.tick().await;
                loop {
                    ticker.tick().await;
                    let Some(server) = server.upgrade() else { break };
                    let report = server.get_health();
                    debug!(resident = report.resident_models, "Health check");
                    server.emit(ServerEvent::HealthCheck(report));
                }
            });
            if let Some(previous) = self.health_task.lock().replace(handle) {
                previous.abort();
            }
        }

        info!(
            max_models = self.config.max_models_in_memory,
            preloaded = self.resident_count(),
            "Model server started"
        );
    }

    /// Stops the health timer and unloads every resident instance
    pub async fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
        if let Some(handle) = self.health_task.lock().take() {
            handle.abort();
        }

        let drained: Vec<(CacheKey, CacheEntry)> = {
            let mut cache = self.cache.lock();
            let mut drained = Vec::with_capacity(cache.len());
            while let Some(entry) = cache.pop_lru() {
                drained.push(entry);
            }
            drained
        };

        let count = drained.len();
        for (key, entry) in drained {
            self.release(&key, entry).await;
        }
        info!(unloaded = count, "Model server stopped");
    }

    /// Runs one prediction; emits `Prediction` or `PredictionError`
    pub async fn predict(&self, request: PredictionRequest) -> Result<PredictionResponse> {
        let started = Instant::now();
        self.stats.predictions.fetch_add(1, Ordering::Relaxed);

        // Failures after a successful load carry the resolved version
        let (version, outcome) = match self
            .get_or_load_model(&request.model_id, request.version.as_deref())
            .await
        {
            Ok(instance) => (
                instance.metadata().version.clone(),
                infer(instance.as_ref(), &request.input).await,
            ),
            Err(e) => (
                request
                    .version
                    .clone()
                    .unwrap_or_else(|| LATEST_VERSION.to_string()),
                Err(e),
            ),
        };
        let latency_ms = started.elapsed().as_secs_f64() * 1000.0;

        match outcome {
            Ok(predictions) => {
                let confidence = if request.options.return_metadata {
                    confidence_of(&predictions)
                } else {
                    None
                };

                self.notify(&request.model_id, &version, latency_ms, None);
                self.emit(ServerEvent::Prediction {
                    model_id: request.model_id.clone(),
                    version: version.clone(),
                    input: request.input,
                    latency_ms,
                    confidence,
                });

                Ok(PredictionResponse {
                    predictions,
                    model_id: request.model_id,
                    model_version: version,
                    processing_time_ms: latency_ms,
                    confidence,
                    ab_test_variant: None,
                })
            }
            Err(e) => {
                self.stats.errors.fetch_add(1, Ordering::Relaxed);
                warn!(
                    model_id = %request.model_id,
                    version = %version,
                    error = %e,
                    "Prediction failed"
                );
                self.notify(&request.model_id, &version, latency_ms, Some(e.kind()));
                self.emit(ServerEvent::PredictionError {
                    model_id: request.model_id,
                    version,
                    error_type: e.kind().to_string(),
                    message: e.to_string(),
                    latency_ms,
                });
                Err(e)
            }
        }
    }

    /// Predicts a batch grouped by cache key
    ///
    /// Responses come back grouped: keys in order of first appearance, input
    /// order within a key. The first failure aborts the batch.
    pub async fn batch_predict(
        &self,
        requests: Vec<PredictionRequest>,
    ) -> Result<Vec<PredictionResponse>> {
        let mut order: HashMap<CacheKey, usize> = HashMap::new();
        let mut groups: Vec<Vec<PredictionRequest>> = Vec::new();
        for request in requests {
            let key = request.cache_key();
            let slot = *order.entry(key).or_insert_with(|| {
                groups.push(Vec::new());
                groups.len() - 1
            });
            groups[slot].push(request);
        }

        let mut responses = Vec::new();
        for group in groups {
            for request in group {
                responses.push(self.predict(request).await?);
            }
        }
        Ok(responses)
    }

    /// Returns the resident instance for a key, loading it on a miss
    pub async fn get_or_load_model(
        &self,
        model_id: &str,
        version: Option<&str>,
    ) -> Result<Arc<dyn ModelInstance>> {
        let key = CacheKey::new(model_id, version);
        if let Some(instance) = self.touch(&key) {
            return Ok(instance);
        }

        let gate = self.load_gate(&key);
        let result = {
            let _loading = gate.lock().await;
            match self.touch(&key) {
                Some(instance) => Ok(instance),
                None => self.load_into_cache(&key).await,
            }
        };
        self.release_gate(&key, gate);
        result
    }

    fn touch(&self, key: &CacheKey) -> Option<Arc<dyn ModelInstance>> {
        let mut cache = self.cache.lock();
        let entry = cache.get_mut(key)?;
        entry.last_used = Utc::now();
        entry.use_count += 1;
        self.stats.cache_hits.fetch_add(1, Ordering::Relaxed);
        Some(entry.instance.clone())
    }

    fn load_gate(&self, key: &CacheKey) -> Arc<tokio::sync::Mutex<()>> {
        self.loading
            .lock()
            .entry(key.clone())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }

    fn release_gate(&self, key: &CacheKey, gate: Arc<tokio::sync::Mutex<()>>) {
        let mut loading = self.loading.lock();
        // Map entry plus ours: nobody else is waiting
        if Arc::strong_count(&gate) == 2 {
            loading.remove(key);
        }
    }

    async fn load_into_cache(&self, key: &CacheKey) -> Result<Arc<dyn ModelInstance>> {
        if self.resident_count() >= self.config.max_models_in_memory {
            self.evict_least_used_model().await;
        }

        let started = Instant::now();
        let artifact = self
            .registry
            .get_model(&key.model_id, key.requested_version())
            .await
            .map_err(|e| match e {
                ModelwatchError::Load(_) => e,
                other => ModelwatchError::Load(format!("registry lookup for {}: {}", key, other)),
            })?;

        let mut instance = self.backends.create(&artifact)?;
        instance.load().await?;
        let instance: Arc<dyn ModelInstance> = Arc::from(instance);

        if self.config.warmup_on_load {
            let warmup = instance.metadata().warmup_input();
            if let Err(e) = instance.predict(&warmup).await {
                warn!(model = %key, error = %e, "Warmup prediction failed");
            }
        }

        let load_time_ms = started.elapsed().as_secs_f64() * 1000.0;
        let memory_usage = instance.memory_usage();
        let version = instance.metadata().version.clone();
        self.stats.loads.fetch_add(1, Ordering::Relaxed);

        let pushed_out = self.cache.lock().push(
            key.clone(),
            CacheEntry {
                instance: instance.clone(),
                last_used: Utc::now(),
                use_count: 1,
            },
        );
        if let Some((old_key, old_entry)) = pushed_out {
            self.release(&old_key, old_entry).await;
        }

        info!(
            model = %key,
            version = %version,
            load_time_ms,
            memory_usage,
            "Model loaded"
        );
        self.emit(ServerEvent::ModelLoaded {
            model_id: key.model_id.clone(),
            version,
            load_time_ms,
            memory_usage,
        });

        Ok(instance)
    }

    /// Evicts the least recently used instance, if any
    pub async fn evict_least_used_model(&self) -> Option<CacheKey> {
        let popped = self.cache.lock().pop_lru();
        let (key, entry) = popped?;
        self.release(&key, entry).await;
        Some(key)
    }

    async fn release(&self, key: &CacheKey, entry: CacheEntry) {
        let version = entry.instance.metadata().version.clone();
        if let Err(e) = entry.instance.unload().await {
            warn!(model = %key, error = %e, "Failed to unload model");
        }
        self.stats.evictions.fetch_add(1, Ordering::Relaxed);
        info!(model = %key, use_count = entry.use_count, "Model evicted");
        self.emit(ServerEvent::ModelEvicted {
            model_id: key.model_id.clone(),
            version,
        });
    }

    /// Snapshot of resident models
    pub fn get_health(&self) -> HealthReport {
        let cache = self.cache.lock();
        let models: Vec<ModelHealth> = cache
            .iter()
            .map(|(key, entry)| ModelHealth {
                model_id: key.model_id.clone(),
                version: entry.instance.metadata().version.clone(),
                memory_usage: entry.instance.memory_usage(),
                use_count: entry.use_count,
                last_used: entry.last_used,
            })
            .collect();

        HealthReport {
            healthy: !self.stopped.load(Ordering::SeqCst),
            resident_models: models.len(),
            max_models: self.config.max_models_in_memory,
            total_memory_usage: models.iter().map(|m| m.memory_usage).sum(),
            models,
            timestamp: Utc::now(),
        }
    }
}

/// Runs inference, folding backend failures into `Prediction`
async fn infer(instance: &dyn ModelInstance, input: &serde_json::Value) -> Result<serde_json::Value> {
    instance.predict(input).await.map_err(|e| match e {
        ModelwatchError::Prediction(_) | ModelwatchError::InvalidInput(_) => e,
        other => ModelwatchError::Prediction(other.to_string()),
    })
}

/// Maximum numeric value anywhere in a model output
fn confidence_of(output: &serde_json::Value) -> Option<f64> {
    numeric_leaves(output).into_iter().reduce(f64::max)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compute::inference::DefaultBackends;
    use crate::compute::model::{ArtifactLocation, ModelArtifact, ModelFramework, ModelMetadata};
    use crate::compute::registry::StaticRegistry;
    use serde_json::json;

    fn linear(id: &str, version: &str) -> ModelArtifact {
        ModelArtifact {
            location: ArtifactLocation::Inline(json!({
                "weights": [[1.0, 1.0]],
                "bias": [0.0]
            })),
            metadata: ModelMetadata::new(id, version, ModelFramework::Linear)
                .with_input_shape(vec![2]),
        }
    }

    fn server(max_models: usize) -> ModelServer {
        let registry = StaticRegistry::with_artifacts(vec![
            linear("a", "v1"),
            linear("b", "v1"),
            linear("c", "v1"),
        ]);
        let config = ServingConfig {
            max_models_in_memory: max_models,
            health_check_interval_seconds: 0,
            ..ServingConfig::default()
        };
        ModelServer::new(
            config,
            Arc::new(registry),
            Arc::new(DefaultBackends::new().unwrap()),
        )
    }

    #[tokio::test]
    async fn test_predict_resolves_version() {
        let server = server(2);
        let response = server
            .predict(PredictionRequest::new("a", json!([1.0, 2.0])).with_metadata())
            .await
            .unwrap();

        assert_eq!(response.model_version, "v1");
        assert_eq!(response.predictions, json!([3.0]));
        assert_eq!(response.confidence, Some(3.0));
        assert!(response.ab_test_variant.is_none());
    }

    #[tokio::test]
    async fn test_confidence_only_when_requested() {
        let server = server(2);
        let response = server
            .predict(PredictionRequest::new("a", json!([1.0, 2.0])))
            .await
            .unwrap();
        assert!(response.confidence.is_none());
    }

    #[tokio::test]
    async fn test_lru_order() {
        let server = server(2);
        server.get_or_load_model("a", None).await.unwrap();
        server.get_or_load_model("b", None).await.unwrap();
        server.get_or_load_model("a", None).await.unwrap();
        server.get_or_load_model("c", None).await.unwrap();

        assert!(server.is_resident("a", None));
        assert!(!server.is_resident("b", None));
        assert!(server.is_resident("c", None));
        assert_eq!(server.resident_count(), 2);
    }

    #[tokio::test]
    async fn test_unknown_model_is_load_error() {
        let server = server(2);
        let mut events = server.subscribe();

        let err = server
            .predict(PredictionRequest::new("missing", json!([1.0, 1.0])))
            .await
            .unwrap_err();
        assert!(matches!(err, ModelwatchError::Load(_)));

        match events.recv().await.unwrap() {
            ServerEvent::PredictionError { version, error_type, .. } => {
                assert_eq!(version, "latest");
                assert_eq!(error_type, "load");
            }
            other => panic!("unexpected event {:?}", other),
        }
        assert_eq!(server.stats().errors.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn test_events_on_load_and_predict() {
        let server = server(1);
        let mut events = server.subscribe();

        server
            .predict(PredictionRequest::new("a", json!([0.0, 1.0])))
            .await
            .unwrap();

        assert!(matches!(
            events.recv().await.unwrap(),
            ServerEvent::ModelLoaded { ref model_id, .. } if model_id == "a"
        ));
        assert!(matches!(
            events.recv().await.unwrap(),
            ServerEvent::Prediction { ref version, .. } if version == "v1"
        ));
    }

    #[tokio::test]
    async fn test_health_report() {
        let server = server(2);
        server.get_or_load_model("a", Some("v1")).await.unwrap();
        server.get_or_load_model("a", Some("v1")).await.unwrap();

        let report = server.get_health();
        assert!(report.healthy);
        assert_eq!(report.resident_models, 1);
        assert_eq!(report.models[0].use_count, 2);
        assert_eq!(report.total_memory_usage, 3 * 8);

        server.stop().await;
        let report = server.get_health();
        assert!(!report.healthy);
        assert_eq!(report.resident_models, 0);
    }

    #[tokio::test]
    async fn test_explicit_eviction() {
        let server = server(2);
        assert!(server.evict_least_used_model().await.is_none());

        server.get_or_load_model("a", None).await.unwrap();
        let evicted = server.evict_least_used_model().await.unwrap();
        assert_eq!(evicted, CacheKey::new("a", None));
        assert_eq!(server.resident_count(), 0);
    }

    #[tokio::test]
    async fn test_inference_failure_uses_resolved_version() {
        let server = server(2);
        let mut events = server.subscribe();

        server
            .predict(PredictionRequest::new("a", json!([1.0, 2.0])))
            .await
            .unwrap();
        let err = server
            .predict(PredictionRequest::new("a", json!([1.0])))
            .await
            .unwrap_err();
        assert!(matches!(err, ModelwatchError::InvalidInput(_)));

        let mut labels = Vec::new();
        while let Ok(event) = events.try_recv() {
            match event {
                ServerEvent::Prediction { version, .. } => labels.push(format!("ok:{}", version)),
                ServerEvent::PredictionError { version, .. } => {
                    labels.push(format!("err:{}", version))
                }
                _ => {}
            }
        }
        assert_eq!(labels, vec!["ok:v1", "err:v1"]);
    }

    #[derive(Default)]
    struct CountingObserver {
        seen: Mutex<Vec<(String, String, Option<String>)>>,
    }

    impl PredictionObserver for CountingObserver {
        fn observe(&self, model_id: &str, version: &str, _latency_ms: f64, error_type: Option<&str>) {
            self.seen.lock().push((
                model_id.to_string(),
                version.to_string(),
                error_type.map(str::to_string),
            ));
        }
    }

    #[tokio::test]
    async fn test_observer_sees_every_outcome() {
        let server = server(2);
        let observer = Arc::new(CountingObserver::default());
        let weak: Weak<dyn PredictionObserver> =
            Arc::downgrade(&(observer.clone() as Arc<dyn PredictionObserver>));
        server.set_observer(weak);

        for _ in 0..3 {
            server
                .predict(PredictionRequest::new("a", json!([1.0, 1.0])))
                .await
                .unwrap();
        }
        server
            .predict(PredictionRequest::new("missing", json!([1.0])))
            .await
            .unwrap_err();

        let seen = observer.seen.lock().clone();
        assert_eq!(seen.len(), 4);
        assert_eq!(seen[0], ("a".to_string(), "v1".to_string(), None));
        assert_eq!(
            seen[3],
            ("missing".to_string(), "latest".to_string(), Some("load".to_string()))
        );
    }

    #[test]
    fn test_confidence_of_nested_output() {
        assert_eq!(confidence_of(&json!([[0.1, 0.7], [0.2]])), Some(0.7));
        assert_eq!(confidence_of(&json!("label")), None);
    }

    #[test]
    fn test_request_deserializes_with_defaults() {
        let request: PredictionRequest =
            serde_json::from_value(json!({"model_id": "a", "input": [1, 2]})).unwrap();
        assert_eq!(request.version, None);
        assert!(!request.options.return_metadata);
        assert_eq!(request.cache_key().to_string(), "a:latest");
    }
}

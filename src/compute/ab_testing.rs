// A/B traffic splitting across dedicated model servers

use super::inference::BackendFactory;
use super::registry::ModelRegistry;
use super::serving::{ModelServer, PredictionRequest, PredictionResponse};
use crate::config::ServingConfig;
use crate::error::{ModelwatchError, Result};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// One arm of an experiment
struct Variant {
    label: String,
    model_id: String,
    version: Option<String>,
    traffic_percentage: f64,
    server: Arc<ModelServer>,
    requests: AtomicU64,
}

/// Public view of a variant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariantSummary {
    /// Label (A, B, C...)
    pub label: String,
    /// Bound model id
    pub model_id: String,
    /// Bound version (None for latest)
    pub version: Option<String>,
    /// Share of traffic in percent
    pub traffic_percentage: f64,
    /// Requests routed so far
    pub requests: u64,
}

/// Routes predictions of one experiment across its variants
///
/// Variants are labelled in registration order. A request draws a uniform
/// number in `[0, 100)` and walks the cumulative split; the last variant takes
/// whatever the others leave.
pub struct AbTestRouter {
    experiment_id: String,
    serving: ServingConfig,
    registry: Arc<dyn ModelRegistry>,
    backends: Arc<dyn BackendFactory>,
    variants: RwLock<Vec<Variant>>,
}

impl AbTestRouter {
    /// Creates an empty experiment; variant servers share the registry and factory
    pub fn new(
        experiment_id: &str,
        serving: ServingConfig,
        registry: Arc<dyn ModelRegistry>,
        backends: Arc<dyn BackendFactory>,
    ) -> Self {
        Self {
            experiment_id: experiment_id.to_string(),
            serving,
            registry,
            backends,
            variants: RwLock::new(Vec::new()),
        }
    }

    /// Experiment id
    pub fn experiment_id(&self) -> &str {
        &self.experiment_id
    }

    /// Starts a dedicated server for a variant and records its split
    pub async fn add_variant(
        &self,
        model_id: &str,
        version: Option<&str>,
        traffic_percentage: f64,
    ) -> Result<String> {
        if !traffic_percentage.is_finite() || traffic_percentage < 0.0 {
            return Err(ModelwatchError::InvalidConfig {
                field: "traffic_percentage".to_string(),
                reason: format!("{} is not a valid percentage", traffic_percentage),
            });
        }

        let mut variants = self.variants.write().await;
        let allocated: f64 = variants.iter().map(|v| v.traffic_percentage).sum();
        if allocated + traffic_percentage > 100.0 {
            return Err(ModelwatchError::InvalidConfig {
                field: "traffic_percentage".to_string(),
                reason: format!(
                    "total allocation {} exceeds 100",
                    allocated + traffic_percentage
                ),
            });
        }

        let server = Arc::new(ModelServer::new(
            self.serving.clone(),
            self.registry.clone(),
            self.backends.clone(),
        ));
        server.start().await;

        let label = variant_label(variants.len());
        info!(
            experiment = %self.experiment_id,
            variant = %label,
            model_id = %model_id,
            traffic_percentage,
            "Added A/B variant"
        );
        variants.push(Variant {
            label: label.clone(),
            model_id: model_id.to_string(),
            version: version.map(str::to_string),
            traffic_percentage,
            server,
            requests: AtomicU64::new(0),
        });
        Ok(label)
    }

    /// Routes one request and tags the response with the chosen label
    pub async fn predict(&self, mut request: PredictionRequest) -> Result<PredictionResponse> {
        let draw = rand::random::<f64>() * 100.0;

        let (label, server) = {
            let variants = self.variants.read().await;
            let variant = select_variant(&variants, draw).ok_or_else(|| {
                ModelwatchError::Configuration(format!(
                    "experiment {} has no variants",
                    self.experiment_id
                ))
            })?;
            variant.requests.fetch_add(1, Ordering::Relaxed);
            request.model_id = variant.model_id.clone();
            request.version = variant.version.clone();
            (variant.label.clone(), variant.server.clone())
        };

        debug!(experiment = %self.experiment_id, variant = %label, draw, "Routed request");
        let mut response = server.predict(request).await?;
        response.ab_test_variant = Some(label);
        Ok(response)
    }

    /// Variant server by label
    pub async fn server(&self, label: &str) -> Option<Arc<ModelServer>> {
        self.variants
            .read()
            .await
            .iter()
            .find(|v| v.label == label)
            .map(|v| v.server.clone())
    }

    /// Current variants in label order
    pub async fn variants(&self) -> Vec<VariantSummary> {
        self.variants
            .read()
            .await
            .iter()
            .map(|v| VariantSummary {
                label: v.label.clone(),
                model_id: v.model_id.clone(),
                version: v.version.clone(),
                traffic_percentage: v.traffic_percentage,
                requests: v.requests.load(Ordering::Relaxed),
            })
            .collect()
    }

    /// Stops every variant server
    pub async fn stop(&self) {
        let servers: Vec<Arc<ModelServer>> = self
            .variants
            .read()
            .await
            .iter()
            .map(|v| v.server.clone())
            .collect();
        futures::future::join_all(servers.iter().map(|server| server.stop())).await;
    }
}

fn variant_label(index: usize) -> String {
    let mut n = index;
    let mut label = Vec::new();
    loop {
        label.push(b'A' + (n % 26) as u8);
        if n < 26 {
            break;
        }
        n = n / 26 - 1;
    }
    label.reverse();
    String::from_utf8_lossy(&label).into_owned()
}

fn select_variant(variants: &[Variant], draw: f64) -> Option<&Variant> {
    let mut cumulative = 0.0;
    for variant in variants {
        cumulative += variant.traffic_percentage;
        if draw < cumulative {
            return Some(variant);
        }
    }
    variants.last()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compute::inference::DefaultBackends;
    use crate::compute::model::{ArtifactLocation, ModelArtifact, ModelFramework, ModelMetadata};
    use crate::compute::registry::StaticRegistry;
    use serde_json::json;

    fn router() -> AbTestRouter {
        let artifacts = ["control", "candidate"].map(|id| ModelArtifact {
            location: ArtifactLocation::Inline(json!({"weights": [[1.0]], "bias": [0.0]})),
            metadata: ModelMetadata::new(id, "v1", ModelFramework::Linear).with_input_shape(vec![1]),
        });
        AbTestRouter::new(
            "threat-scoring",
            ServingConfig {
                health_check_interval_seconds: 0,
                ..ServingConfig::default()
            },
            Arc::new(StaticRegistry::with_artifacts(artifacts)),
            Arc::new(DefaultBackends::new().unwrap()),
        )
    }

    #[test]
    fn test_variant_labels() {
        assert_eq!(variant_label(0), "A");
        assert_eq!(variant_label(2), "C");
        assert_eq!(variant_label(25), "Z");
        assert_eq!(variant_label(26), "AA");
    }

    #[tokio::test]
    async fn test_allocation_limits() {
        let router = router();
        assert_eq!(router.add_variant("control", None, 70.0).await.unwrap(), "A");
        assert!(router.add_variant("candidate", None, 40.0).await.is_err());
        assert!(router.add_variant("candidate", None, -1.0).await.is_err());
        assert_eq!(router.add_variant("candidate", None, 30.0).await.unwrap(), "B");
        assert_eq!(router.variants().await.len(), 2);
    }

    #[tokio::test]
    async fn test_no_variants_is_configuration_error() {
        let router = router();
        let err = router
            .predict(PredictionRequest::new("anything", json!([1.0])))
            .await
            .unwrap_err();
        assert!(matches!(err, ModelwatchError::Configuration(_)));
    }

    #[tokio::test]
    async fn test_request_rewritten_to_variant_binding() {
        let router = router();
        router.add_variant("candidate", Some("v1"), 100.0).await.unwrap();

        let response = router
            .predict(PredictionRequest::new("ignored", json!([2.0])))
            .await
            .unwrap();
        assert_eq!(response.model_id, "candidate");
        assert_eq!(response.ab_test_variant.as_deref(), Some("A"));

        let server = router.server("A").await.unwrap();
        assert!(server.is_resident("candidate", Some("v1")));
        router.stop().await;
        assert_eq!(server.resident_count(), 0);
    }

    #[tokio::test]
    async fn test_last_variant_absorbs_remainder() {
        let router = router();
        router.add_variant("control", None, 10.0).await.unwrap();
        router.add_variant("candidate", None, 10.0).await.unwrap();

        let variants = router.variants.read().await;
        assert_eq!(select_variant(&variants, 5.0).map(|v| v.label.as_str()), Some("A"));
        assert_eq!(select_variant(&variants, 15.0).map(|v| v.label.as_str()), Some("B"));
        assert_eq!(select_variant(&variants, 95.0).map(|v| v.label.as_str()), Some("B"));
    }
}

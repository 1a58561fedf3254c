// Inference backends

use super::model::{ArtifactLocation, ModelArtifact, ModelFramework, ModelMetadata};
use crate::error::{ModelwatchError, Result};
use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info};

/// A loaded (or loadable) model behind one cache entry.
///
/// `load` runs once before the instance is shared; everything afterwards goes
/// through `&self` so the server can hold instances in an `Arc`.
#[async_trait]
pub trait ModelInstance: Send + Sync {
    /// Metadata the instance was created from.
    fn metadata(&self) -> &ModelMetadata;

    /// Fetches and initializes the artifact.
    async fn load(&mut self) -> Result<()>;

    /// Runs inference on an opaque input.
    async fn predict(&self, input: &Value) -> Result<Value>;

    /// Releases backend resources.
    async fn unload(&self) -> Result<()>;

    /// Approximate resident footprint in bytes.
    fn memory_usage(&self) -> u64;
}

/// Builds backend instances from registry artifacts.
pub trait BackendFactory: Send + Sync {
    /// Creates an unloaded instance for the artifact's framework.
    fn create(&self, artifact: &ModelArtifact) -> Result<Box<dyn ModelInstance>>;
}

/// Factory shipping the built-in backends
pub struct DefaultBackends {
    http: reqwest::Client,
}

impl DefaultBackends {
    /// Creates the factory with a shared HTTP client for URL artifacts
    pub fn new() -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self { http })
    }
}

impl BackendFactory for DefaultBackends {
    fn create(&self, artifact: &ModelArtifact) -> Result<Box<dyn ModelInstance>> {
        match artifact.metadata.framework {
            ModelFramework::Linear => Ok(Box::new(LinearModel::new(
                artifact.clone(),
                self.http.clone(),
            ))),
            ModelFramework::Onnx => Err(ModelwatchError::Configuration(
                "onnx backend not implemented".to_string(),
            )),
            other => Err(ModelwatchError::Configuration(format!(
                "unsupported model framework: {}",
                other
            ))),
        }
    }
}

/// Output activation of a linear model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Activation {
    /// Raw scores
    #[default]
    Identity,
    /// Elementwise logistic
    Sigmoid,
    /// Normalized over the output row
    Softmax,
}

impl Activation {
    fn apply(&self, scores: &mut [f64]) {
        match self {
            Activation::Identity => {}
            Activation::Sigmoid => {
                for s in scores.iter_mut() {
                    *s = 1.0 / (1.0 + (-*s).exp());
                }
            }
            Activation::Softmax => {
                let max = scores.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
                let mut sum = 0.0;
                for s in scores.iter_mut() {
                    *s = (*s - max).exp();
                    sum += *s;
                }
                if sum > 0.0 {
                    for s in scores.iter_mut() {
                        *s /= sum;
                    }
                }
            }
        }
    }
}

/// On-disk artifact of a linear model: `weights` is outputs × inputs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearWeights {
    /// Weight matrix, one row per output
    pub weights: Vec<Vec<f64>>,
    /// Bias per output
    pub bias: Vec<f64>,
    /// Output activation
    #[serde(default)]
    pub activation: Activation,
}

impl LinearWeights {
    fn validate(&self) -> Result<()> {
        let width = match self.weights.first() {
            Some(row) if !row.is_empty() => row.len(),
            _ => {
                return Err(ModelwatchError::Load(
                    "linear model has no weights".to_string(),
                ))
            }
        };
        if self.weights.iter().any(|row| row.len() != width) {
            return Err(ModelwatchError::Load(
                "weight rows have different lengths".to_string(),
            ));
        }
        if self.bias.len() != self.weights.len() {
            return Err(ModelwatchError::Load(format!(
                "bias length {} does not match {} outputs",
                self.bias.len(),
                self.weights.len()
            )));
        }
        Ok(())
    }

    /// Number of input features
    pub fn input_width(&self) -> usize {
        self.weights.first().map(|row| row.len()).unwrap_or(0)
    }

    fn forward(&self, features: &[f64]) -> Vec<f64> {
        let mut scores: Vec<f64> = self
            .weights
            .iter()
            .zip(&self.bias)
            .map(|(row, b)| row.iter().zip(features).map(|(w, x)| w * x).sum::<f64>() + b)
            .collect();
        self.activation.apply(&mut scores);
        scores
    }

    fn byte_size(&self) -> u64 {
        let params: usize = self.weights.iter().map(Vec::len).sum::<usize>() + self.bias.len();
        (params * std::mem::size_of::<f64>()) as u64
    }
}

/// Built-in dense linear / logistic model
pub struct LinearModel {
    artifact: ModelArtifact,
    http: reqwest::Client,
    weights: RwLock<Option<LinearWeights>>,
}

impl LinearModel {
    /// Creates an unloaded model
    pub fn new(artifact: ModelArtifact, http: reqwest::Client) -> Self {
        Self {
            artifact,
            http,
            weights: RwLock::new(None),
        }
    }

    /// Whether weights are resident
    pub fn is_loaded(&self) -> bool {
        self.weights.read().is_some()
    }

    async fn fetch(&self) -> Result<LinearWeights> {
        let weights = match &self.artifact.location {
            ArtifactLocation::Inline(body) => serde_json::from_value(body.clone())?,
            ArtifactLocation::File(path) => {
                let content = tokio::fs::read(path).await.map_err(|e| {
                    ModelwatchError::Load(format!("Failed to read {}: {}", path.display(), e))
                })?;
                serde_json::from_slice(&content)?
            }
            ArtifactLocation::Url(url) => {
                let response = self.http.get(url).send().await?.error_for_status()?;
                response.json().await?
            }
        };
        Ok(weights)
    }
}

#[async_trait]
impl ModelInstance for LinearModel {
    fn metadata(&self) -> &ModelMetadata {
        &self.artifact.metadata
    }

    async fn load(&mut self) -> Result<()> {
        let weights = self.fetch().await.map_err(|e| match e {
            ModelwatchError::Load(_) => e,
            other => ModelwatchError::Load(format!(
                "{} from {}: {}",
                self.artifact.metadata.model_id, self.artifact.location, other
            )),
        })?;
        weights.validate()?;

        info!(
            model_id = %self.artifact.metadata.model_id,
            version = %self.artifact.metadata.version,
            inputs = weights.input_width(),
            outputs = weights.weights.len(),
            "Linear model loaded"
        );
        *self.weights.write() = Some(weights);
        Ok(())
    }

    async fn predict(&self, input: &Value) -> Result<Value> {
        let guard = self.weights.read();
        let weights = guard.as_ref().ok_or_else(|| {
            ModelwatchError::Prediction(format!(
                "model {} is not loaded",
                self.artifact.metadata.model_id
            ))
        })?;

        let rows = input.as_array().ok_or_else(|| {
            ModelwatchError::InvalidInput("expected an array of features".to_string())
        })?;

        if rows.first().map(Value::is_array).unwrap_or(false) {
            let outputs = rows
                .iter()
                .map(|row| features(row, weights.input_width()).map(|f| weights.forward(&f)))
                .collect::<Result<Vec<_>>>()?;
            Ok(serde_json::json!(outputs))
        } else {
            let f = features(input, weights.input_width())?;
            Ok(serde_json::json!(weights.forward(&f)))
        }
    }

    async fn unload(&self) -> Result<()> {
        if self.weights.write().take().is_some() {
            debug!(model_id = %self.artifact.metadata.model_id, "Linear model unloaded");
        }
        Ok(())
    }

    fn memory_usage(&self) -> u64 {
        self.weights.read().as_ref().map(LinearWeights::byte_size).unwrap_or(0)
    }
}

fn features(value: &Value, width: usize) -> Result<Vec<f64>> {
    let items = value.as_array().ok_or_else(|| {
        ModelwatchError::InvalidInput("expected a feature vector".to_string())
    })?;
    if items.len() != width {
        return Err(ModelwatchError::InvalidInput(format!(
            "expected {} features, got {}",
            width,
            items.len()
        )));
    }
    items
        .iter()
        .map(|v| {
            v.as_f64().ok_or_else(|| {
                ModelwatchError::InvalidInput(format!("feature {} is not a number", v))
            })
        })
        .collect()
}

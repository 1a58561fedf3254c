// Model metadata and artifact descriptors

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Inference backend / framework tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelFramework {
    /// Built-in dense linear / logistic model (JSON weights)
    Linear,
    /// ONNX Runtime
    Onnx,
    /// TensorFlow SavedModel
    TensorFlow,
    /// PyTorch TorchScript
    PyTorch,
    /// Custom/other, requires a custom backend factory
    Custom,
}

impl ModelFramework {
    /// Gets the tag used in configs and logs
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelFramework::Linear => "linear",
            ModelFramework::Onnx => "onnx",
            ModelFramework::TensorFlow => "tensorflow",
            ModelFramework::PyTorch => "pytorch",
            ModelFramework::Custom => "custom",
        }
    }
}

impl fmt::Display for ModelFramework {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the model predicts; shapes warmup input
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelType {
    /// Class probabilities for one feature vector
    #[default]
    Classification,
    /// Continuous output for one feature vector
    Regression,
    /// Scores a batch of observations
    AnomalyDetection,
    /// Anything else
    Custom,
}

/// Default feature width when metadata carries no input shape
const DEFAULT_INPUT_WIDTH: usize = 10;

impl ModelType {
    /// Builds a synthetic input used to warm up a freshly loaded model
    pub fn warmup_input(&self, input_shape: Option<&[usize]>) -> serde_json::Value {
        let width = input_shape
            .and_then(|shape| shape.last().copied())
            .filter(|&w| w > 0)
            .unwrap_or(DEFAULT_INPUT_WIDTH);
        let zeros = vec![0.0f64; width];

        match self {
            ModelType::Classification | ModelType::Regression => serde_json::json!(zeros),
            ModelType::AnomalyDetection => serde_json::json!([zeros]),
            ModelType::Custom => serde_json::json!([0.0]),
        }
    }
}

/// Model metadata as issued by the registry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMetadata {
    /// Model id
    pub model_id: String,
    /// Concrete version
    pub version: String,
    /// Backend tag
    pub framework: ModelFramework,
    /// Model type
    #[serde(default)]
    pub model_type: ModelType,
    /// Input shape (-1 free dimensions are omitted)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_shape: Option<Vec<usize>>,
    /// Created timestamp
    pub created_at: DateTime<Utc>,
    /// Updated timestamp
    pub updated_at: DateTime<Utc>,
}

impl ModelMetadata {
    /// Creates metadata stamped with the current time
    pub fn new(model_id: &str, version: &str, framework: ModelFramework) -> Self {
        let now = Utc::now();
        Self {
            model_id: model_id.to_string(),
            version: version.to_string(),
            framework,
            model_type: ModelType::default(),
            input_shape: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Sets model type
    pub fn with_model_type(mut self, model_type: ModelType) -> Self {
        self.model_type = model_type;
        self
    }

    /// Sets input shape
    pub fn with_input_shape(mut self, shape: Vec<usize>) -> Self {
        self.input_shape = Some(shape);
        self
    }

    /// Synthetic warmup input for this model
    pub fn warmup_input(&self) -> serde_json::Value {
        self.model_type.warmup_input(self.input_shape.as_deref())
    }
}

/// Where an artifact lives
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "location", rename_all = "lowercase")]
pub enum ArtifactLocation {
    /// Local filesystem path
    File(PathBuf),
    /// Remote URL; fetching is the backend's concern
    Url(String),
    /// Artifact body carried inline
    Inline(serde_json::Value),
}

impl fmt::Display for ArtifactLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArtifactLocation::File(path) => write!(f, "file:{}", path.display()),
            ArtifactLocation::Url(url) => f.write_str(url),
            ArtifactLocation::Inline(_) => f.write_str("inline"),
        }
    }
}

/// Registry answer for one model version
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelArtifact {
    /// Artifact location
    pub location: ArtifactLocation,
    /// Metadata
    pub metadata: ModelMetadata,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_warmup_input_shapes() {
        let classification = ModelType::Classification.warmup_input(Some(&[1, 4]));
        assert_eq!(classification, serde_json::json!([0.0, 0.0, 0.0, 0.0]));

        let anomaly = ModelType::AnomalyDetection.warmup_input(Some(&[3]));
        assert_eq!(anomaly, serde_json::json!([[0.0, 0.0, 0.0]]));

        let default_width = ModelType::Regression.warmup_input(None);
        assert_eq!(default_width.as_array().map(|a| a.len()), Some(DEFAULT_INPUT_WIDTH));
    }

    #[test]
    fn test_framework_serde() {
        assert_eq!(ModelFramework::TensorFlow.as_str(), "tensorflow");
        let parsed: ModelFramework = serde_json::from_str("\"onnx\"").unwrap();
        assert_eq!(parsed, ModelFramework::Onnx);
    }

    #[test]
    fn test_metadata_builder() {
        let metadata = ModelMetadata::new("threat-classifier", "v1", ModelFramework::Linear)
            .with_model_type(ModelType::AnomalyDetection)
            .with_input_shape(vec![2]);

        assert_eq!(metadata.model_id, "threat-classifier");
        assert_eq!(metadata.warmup_input(), serde_json::json!([[0.0, 0.0]]));
    }

    #[test]
    fn test_artifact_location_serde() {
        let location = ArtifactLocation::File(PathBuf::from("/models/a.json"));
        let json = serde_json::to_value(&location).unwrap();
        assert_eq!(json["kind"], "file");
        assert_eq!(location.to_string(), "file:/models/a.json");
    }
}

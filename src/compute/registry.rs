// Model registry collaborator

use super::model::{ArtifactLocation, ModelArtifact};
use crate::error::{ModelwatchError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Resolves `(model_id, version?)` to an artifact and its metadata.
///
/// The catalog behind this trait is external to the server; a `None` version
/// means "latest" as the registry defines it.
#[async_trait]
pub trait ModelRegistry: Send + Sync {
    /// Looks up one model version.
    async fn get_model(&self, model_id: &str, version: Option<&str>) -> Result<ModelArtifact>;
}

/// Catalog file layout
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegistryCatalog {
    /// Known artifacts
    pub models: Vec<ModelArtifact>,
}

/// Registry backed by a fixed in-memory catalog
pub struct StaticRegistry {
    /// Versions by model id
    models: RwLock<HashMap<String, Vec<ModelArtifact>>>,
    /// Lookups served
    lookups: AtomicU64,
}

impl Default for StaticRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl StaticRegistry {
    /// Creates an empty registry
    pub fn new() -> Self {
        Self {
            models: RwLock::new(HashMap::new()),
            lookups: AtomicU64::new(0),
        }
    }

    /// Creates a registry pre-populated with artifacts
    pub fn with_artifacts(artifacts: impl IntoIterator<Item = ModelArtifact>) -> Self {
        let mut models: HashMap<String, Vec<ModelArtifact>> = HashMap::new();
        for artifact in artifacts {
            models
                .entry(artifact.metadata.model_id.clone())
                .or_default()
                .push(artifact);
        }
        Self {
            models: RwLock::new(models),
            lookups: AtomicU64::new(0),
        }
    }

    /// Loads a JSON catalog; relative file locations resolve against the catalog's directory
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ModelwatchError::Configuration(format!(
                "Failed to read catalog {}: {}",
                path.display(),
                e
            ))
        })?;
        let mut catalog: RegistryCatalog = serde_json::from_str(&content)?;

        let base = path.parent().unwrap_or_else(|| Path::new("."));
        for artifact in &mut catalog.models {
            if let ArtifactLocation::File(file) = &mut artifact.location {
                if file.is_relative() {
                    *file = base.join(&*file);
                }
            }
        }

        info!(path = %path.display(), models = catalog.models.len(), "Loaded model catalog");
        Ok(Self::with_artifacts(catalog.models))
    }

    /// Registers (or replaces) an artifact version
    pub async fn register(&self, artifact: ModelArtifact) {
        let mut models = self.models.write().await;
        let versions = models.entry(artifact.metadata.model_id.clone()).or_default();
        versions.retain(|existing| existing.metadata.version != artifact.metadata.version);
        debug!(
            model_id = %artifact.metadata.model_id,
            version = %artifact.metadata.version,
            "Registered model artifact"
        );
        versions.push(artifact);
    }

    /// Number of lookups served
    pub fn lookups(&self) -> u64 {
        self.lookups.load(Ordering::Relaxed)
    }

    /// Lists `(model_id, version)` pairs
    pub async fn list(&self) -> Vec<(String, String)> {
        let models = self.models.read().await;
        let mut pairs: Vec<(String, String)> = models
            .values()
            .flatten()
            .map(|a| (a.metadata.model_id.clone(), a.metadata.version.clone()))
            .collect();
        pairs.sort();
        pairs
    }
}

#[async_trait]
impl ModelRegistry for StaticRegistry {
    async fn get_model(&self, model_id: &str, version: Option<&str>) -> Result<ModelArtifact> {
        self.lookups.fetch_add(1, Ordering::Relaxed);

        let models = self.models.read().await;
        let versions = models
            .get(model_id)
            .ok_or_else(|| ModelwatchError::NotFound(format!("Model {} not registered", model_id)))?;

        let found = match version {
            Some(v) => versions.iter().find(|a| a.metadata.version == v),
            None => versions.iter().max_by_key(|a| a.metadata.updated_at),
        };

        found.cloned().ok_or_else(|| {
            ModelwatchError::NotFound(format!(
                "Model {} version {} not registered",
                model_id,
                version.unwrap_or("latest")
            ))
        })
    }
}

//! Model serving for Modelwatch
//!
//! Provides model management and inference capabilities:
//! - Model metadata and artifact descriptors
//! - Registry lookups of model versions
//! - Pluggable inference backends
//! - Bounded LRU model cache with prediction events
//! - A/B testing and traffic splitting

pub mod ab_testing;
pub mod inference;
pub mod model;
pub mod registry;
pub mod serving;

pub use ab_testing::{AbTestRouter, VariantSummary};
pub use inference::{Activation, BackendFactory, DefaultBackends, LinearModel, ModelInstance};
pub use model::{ArtifactLocation, ModelArtifact, ModelFramework, ModelMetadata, ModelType};
pub use registry::{ModelRegistry, RegistryCatalog, StaticRegistry};
pub use serving::{
    HealthReport, ModelHealth, ModelServer, PredictionObserver, PredictionOptions,
    PredictionRequest, PredictionResponse, ServerEvent,
};

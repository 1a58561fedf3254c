//! Error types for Modelwatch.
//!
//! This module provides a unified error type [`ModelwatchError`] for all serving and
//! monitoring operations, along with a convenient [`Result`] type alias.
//!
//! # Error Categories
//!
//! - **Load**: artifact fetch, parse, or backend initialization failed
//! - **Prediction**: inference failed or the input could not be handled
//! - **Configuration**: unsupported backend or invalid settings
//! - **Alert dispatch**: a notification channel failed (logged, never escalated)
//!
//! # Example
//!
//! ```rust
//! use modelwatch::error::{ModelwatchError, Result};
//!
//! fn check_window(size: usize) -> Result<()> {
//!     if size == 0 {
//!         return Err(ModelwatchError::InvalidConfig {
//!             field: "drift.window_size".into(),
//!             reason: "must be non-zero".into(),
//!         });
//!     }
//!     Ok(())
//! }
//!
//! let err = check_window(0).unwrap_err();
//! assert_eq!(err.kind(), "invalid_config");
//! ```

use std::io;
use thiserror::Error;

/// Main error type for Modelwatch operations.
#[derive(Error, Debug)]
pub enum ModelwatchError {
    // Model lifecycle
    #[error("Model load failed: {0}")]
    Load(String),

    #[error("Prediction failed: {0}")]
    Prediction(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Invalid configuration: {field}: {reason}")]
    InvalidConfig { field: String, reason: String },

    // Alerting
    #[error("Alert dispatch failed on channel {channel}: {reason}")]
    AlertDispatch { channel: String, reason: String },

    // Lookup and state
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Already exists: {0}")]
    AlreadyExists(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    // External errors
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ModelwatchError {
    /// Stable label for this error, used as the `error_type` metric label.
    pub fn kind(&self) -> &'static str {
        match self {
            ModelwatchError::Load(_) => "load",
            ModelwatchError::Prediction(_) => "prediction",
            ModelwatchError::Configuration(_) => "configuration",
            ModelwatchError::InvalidConfig { .. } => "invalid_config",
            ModelwatchError::AlertDispatch { .. } => "alert_dispatch",
            ModelwatchError::NotFound(_) => "not_found",
            ModelwatchError::AlreadyExists(_) => "already_exists",
            ModelwatchError::InvalidInput(_) => "invalid_input",
            ModelwatchError::Io(_) => "io",
            ModelwatchError::Serialization(_) => "serialization",
            ModelwatchError::Network(_) => "network",
            ModelwatchError::Internal(_) => "internal",
        }
    }

    /// Whether the failure happened while bringing a model into memory.
    pub fn is_load_failure(&self) -> bool {
        matches!(
            self,
            ModelwatchError::Load(_) | ModelwatchError::Configuration(_) | ModelwatchError::Io(_)
        )
    }
}

impl From<serde_json::Error> for ModelwatchError {
    fn from(e: serde_json::Error) -> Self {
        ModelwatchError::Serialization(e.to_string())
    }
}

impl From<reqwest::Error> for ModelwatchError {
    fn from(e: reqwest::Error) -> Self {
        ModelwatchError::Network(e.to_string())
    }
}

impl From<prometheus::Error> for ModelwatchError {
    fn from(e: prometheus::Error) -> Self {
        ModelwatchError::Internal(format!("metrics registry: {}", e))
    }
}

/// Result type alias for Modelwatch operations.
pub type Result<T> = std::result::Result<T, ModelwatchError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        assert_eq!(ModelwatchError::Load("x".into()).kind(), "load");
        assert_eq!(ModelwatchError::Prediction("x".into()).kind(), "prediction");
        assert_eq!(
            ModelwatchError::AlertDispatch {
                channel: "slack".into(),
                reason: "timeout".into()
            }
            .kind(),
            "alert_dispatch"
        );
    }

    #[test]
    fn test_load_failure_classification() {
        assert!(ModelwatchError::Load("missing".into()).is_load_failure());
        assert!(ModelwatchError::Configuration("onnx".into()).is_load_failure());
        assert!(!ModelwatchError::Prediction("bad".into()).is_load_failure());
    }

    #[test]
    fn test_json_error_conversion() {
        let err: ModelwatchError = serde_json::from_str::<serde_json::Value>("{")
            .unwrap_err()
            .into();
        assert!(matches!(err, ModelwatchError::Serialization(_)));
    }
}

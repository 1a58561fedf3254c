//! Core type definitions shared across Modelwatch.
//!
//! # Key Types
//!
//! - [`CacheKey`]: composite `(model_id, version)` address of a resident model
//! - [`numeric_leaves`]: flattens an opaque JSON payload into its numbers
//!
//! # Examples
//!
//! ```rust
//! use modelwatch::types::{numeric_leaves, CacheKey};
//!
//! let latest = CacheKey::new("threat-classifier", None);
//! assert_eq!(latest.to_string(), "threat-classifier:latest");
//!
//! let values = numeric_leaves(&serde_json::json!({"a": [1, 2], "b": true}));
//! assert_eq!(values, vec![1.0, 2.0, 1.0]);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

/// Version label used when a request does not pin a version.
pub const LATEST_VERSION: &str = "latest";

/// Composite key addressing at most one resident model instance.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CacheKey {
    /// Model identifier.
    pub model_id: String,
    /// Requested version, or [`LATEST_VERSION`].
    pub version: String,
}

impl CacheKey {
    /// Build a key from a request's model id and optional version.
    pub fn new(model_id: &str, version: Option<&str>) -> Self {
        Self {
            model_id: model_id.to_string(),
            version: version.unwrap_or(LATEST_VERSION).to_string(),
        }
    }

    /// Whether this key floats to the registry's latest version.
    pub fn is_latest(&self) -> bool {
        self.version == LATEST_VERSION
    }

    /// The version to ask the registry for.
    pub fn requested_version(&self) -> Option<&str> {
        if self.is_latest() {
            None
        } else {
            Some(&self.version)
        }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.model_id, self.version)
    }
}

/// Collect every numeric leaf of a JSON value in document order.
///
/// Booleans count as 0/1; strings and nulls contribute nothing.
pub fn numeric_leaves(value: &serde_json::Value) -> Vec<f64> {
    let mut out = Vec::new();
    collect_numbers(value, &mut out);
    out
}

fn collect_numbers(value: &serde_json::Value, out: &mut Vec<f64>) {
    match value {
        serde_json::Value::Number(n) => {
            if let Some(v) = n.as_f64() {
                out.push(v);
            }
        }
        serde_json::Value::Bool(b) => out.push(if *b { 1.0 } else { 0.0 }),
        serde_json::Value::Array(items) => {
            for item in items {
                collect_numbers(item, out);
            }
        }
        serde_json::Value::Object(map) => {
            for item in map.values() {
                collect_numbers(item, out);
            }
        }
        serde_json::Value::String(_) | serde_json::Value::Null => {}
    }
}

//! Model monitoring: drift scoring and the monitoring orchestrator.

pub mod drift;
pub mod orchestrator;

pub use drift::{reduce_to_scalar, DriftDetector, Distribution};
pub use orchestrator::{threshold_alerts, CycleTally, ModelMonitor};

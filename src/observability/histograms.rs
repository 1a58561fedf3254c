//! Histogram buckets and running latency statistics for Modelwatch.
//!
//! Bucket boundaries are in seconds, as Prometheus expects.

use std::time::Duration;

/// Prediction latency buckets, 1ms to 5s.
pub const LATENCY_BUCKETS: [f64; 11] = [
    0.001, // 1ms
    0.005, // 5ms
    0.01,  // 10ms
    0.025, // 25ms
    0.05,  // 50ms
    0.1,   // 100ms
    0.25,  // 250ms
    0.5,   // 500ms
    1.0,   // 1s
    2.5,   // 2.5s
    5.0,   // 5s
];

/// Model load time buckets; loads include artifact fetch and warmup.
pub const LOAD_TIME_BUCKETS: [f64; 8] = [0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 10.0, 30.0];

/// Running statistics over a stream of latency observations.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LatencyStats {
    /// Total number of observations.
    pub count: u64,
    /// Sum of all latencies in milliseconds.
    pub sum_ms: f64,
    /// Minimum latency observed.
    pub min_ms: Option<f64>,
    /// Maximum latency observed.
    pub max_ms: Option<f64>,
}

impl LatencyStats {
    /// Add one observation in milliseconds.
    pub fn record_ms(&mut self, latency_ms: f64) {
        self.count += 1;
        self.sum_ms += latency_ms;
        self.min_ms = Some(self.min_ms.map_or(latency_ms, |m| m.min(latency_ms)));
        self.max_ms = Some(self.max_ms.map_or(latency_ms, |m| m.max(latency_ms)));
    }

    /// Add one observation.
    pub fn record(&mut self, latency: Duration) {
        self.record_ms(latency.as_secs_f64() * 1000.0);
    }

    /// Calculate average latency.
    pub fn avg_ms(&self) -> Option<f64> {
        if self.count > 0 {
            Some(self.sum_ms / self.count as f64)
        } else {
            None
        }
    }
}

/// Milliseconds to the seconds unit used by the histograms.
pub fn ms_to_seconds(ms: f64) -> f64 {
    ms / 1000.0
}

//! Input drift detection.
//!
//! Each model gets a reference distribution, set once, and a FIFO window of
//! recent scalar-reduced inputs. Scores stay at 0 until the window is full.

use crate::config::{DriftConfig, DriftMethod};
use crate::error::{ModelwatchError, Result};
use crate::types::numeric_leaves;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{HashMap, VecDeque};
use tracing::{debug, info};

/// Number of equal-width PSI bins
pub const PSI_BINS: usize = 10;

/// Floor applied to PSI bin percentages
const PSI_MIN_PERCENT: f64 = 1e-4;

/// Floor applied to variances in the KL closed form
const MIN_VARIANCE: f64 = 1e-10;

/// Sample summary used on both sides of a comparison
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Distribution {
    /// Arithmetic mean
    pub mean: f64,
    /// Population variance
    pub variance: f64,
    /// Sample values
    pub values: Vec<f64>,
}

impl Distribution {
    /// Summarize a sample with its mean and population variance.
    pub fn from_values(values: Vec<f64>) -> Self {
        let n = values.len().max(1) as f64;
        let mean = values.iter().sum::<f64>() / n;
        let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
        Self {
            mean,
            variance,
            values,
        }
    }
}

struct DriftState {
    reference: Distribution,
    window: VecDeque<f64>,
}

/// Per-model drift scoring
pub struct DriftDetector {
    method: DriftMethod,
    window_size: usize,
    states: Mutex<HashMap<String, DriftState>>,
}

impl DriftDetector {
    /// Create a detector with no references.
    pub fn new(method: DriftMethod, window_size: usize) -> Self {
        Self {
            method,
            window_size: window_size.max(1),
            states: Mutex::new(HashMap::new()),
        }
    }

    /// Create a detector from the drift configuration.
    pub fn from_config(config: &DriftConfig) -> Self {
        Self::new(config.method, config.window_size)
    }

    /// Configured scoring method.
    pub fn method(&self) -> DriftMethod {
        self.method
    }

    /// Window capacity; scores stay 0 until it is full.
    pub fn window_size(&self) -> usize {
        self.window_size
    }

    /// Store a model's reference distribution; it can only be set once.
    pub fn initialize_reference(
        &self,
        model_id: &str,
        batch: &[serde_json::Value],
    ) -> Result<Distribution> {
        if batch.is_empty() {
            return Err(ModelwatchError::InvalidInput(format!(
                "reference batch for {} is empty",
                model_id
            )));
        }
        let values = batch.iter().map(reduce_to_scalar).collect::<Result<Vec<_>>>()?;
        let reference = Distribution::from_values(values);

        let mut states = self.states.lock();
        if states.contains_key(model_id) {
            return Err(ModelwatchError::AlreadyExists(format!(
                "drift reference for {}",
                model_id
            )));
        }

        info!(
            model_id,
            samples = reference.values.len(),
            mean = reference.mean,
            variance = reference.variance,
            "Drift reference initialized"
        );
        states.insert(
            model_id.to_string(),
            DriftState {
                reference: reference.clone(),
                window: VecDeque::with_capacity(self.window_size),
            },
        );
        Ok(reference)
    }

    /// Whether a model's reference has been set.
    pub fn has_reference(&self, model_id: &str) -> bool {
        self.states.lock().contains_key(model_id)
    }

    /// A model's reference distribution, if set.
    pub fn reference(&self, model_id: &str) -> Option<Distribution> {
        self.states.lock().get(model_id).map(|s| s.reference.clone())
    }

    /// Entries currently in a model's window.
    pub fn window_len(&self, model_id: &str) -> usize {
        self.states.lock().get(model_id).map_or(0, |s| s.window.len())
    }

    /// Append a datum to the window and score it against the reference.
    pub fn detect_drift(&self, model_id: &str, datum: &serde_json::Value) -> Result<f64> {
        let value = reduce_to_scalar(datum)?;

        let mut states = self.states.lock();
        let state = states.get_mut(model_id).ok_or_else(|| {
            ModelwatchError::NotFound(format!("no drift reference for {}", model_id))
        })?;

        if state.window.len() == self.window_size {
            state.window.pop_front();
        }
        state.window.push_back(value);

        if state.window.len() < self.window_size {
            return Ok(0.0);
        }

        let current = Distribution::from_values(state.window.iter().copied().collect());
        let score = match self.method {
            DriftMethod::Psi => psi(&state.reference, &current),
            DriftMethod::KlDivergence => kl_divergence(&state.reference, &current),
            DriftMethod::Wasserstein => wasserstein(&state.reference, &current),
        };
        debug!(model_id, method = ?self.method, score, "Drift scored");
        Ok(score)
    }
}

/// Reduce an opaque datum to one number.
///
/// Numbers pass through, booleans become 0/1, and containers become the mean
/// of their numeric leaves.
pub fn reduce_to_scalar(datum: &serde_json::Value) -> Result<f64> {
    let leaves = numeric_leaves(datum);
    if leaves.is_empty() {
        return Err(ModelwatchError::InvalidInput(format!(
            "no numeric values in drift input {}",
            datum
        )));
    }
    Ok(leaves.iter().sum::<f64>() / leaves.len() as f64)
}

/// Population stability index over bins spanning the current window.
pub fn psi(reference: &Distribution, current: &Distribution) -> f64 {
    let (min, max) = current
        .values
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
    if !min.is_finite() || !max.is_finite() {
        return 0.0;
    }

    let ref_pct = bin_percentages(&reference.values, min, max);
    let cur_pct = bin_percentages(&current.values, min, max);

    ref_pct
        .iter()
        .zip(&cur_pct)
        .map(|(&r, &c)| (c - r) * (c / r).ln())
        .sum::<f64>()
        .abs()
}

fn bin_percentages(values: &[f64], min: f64, max: f64) -> [f64; PSI_BINS] {
    let mut counts = [0usize; PSI_BINS];
    let width = (max - min) / PSI_BINS as f64;
    for &v in values {
        let bin = if width > 0.0 {
            (((v - min) / width).floor().max(0.0) as usize).min(PSI_BINS - 1)
        } else {
            0
        };
        counts[bin] += 1;
    }

    let n = values.len().max(1) as f64;
    let mut pct = [0.0; PSI_BINS];
    for (p, &c) in pct.iter_mut().zip(&counts) {
        *p = (c as f64 / n).max(PSI_MIN_PERCENT);
    }
    pct
}

/// KL divergence between Gaussian fits of current and reference.
pub fn kl_divergence(reference: &Distribution, current: &Distribution) -> f64 {
    let var_r = reference.variance.max(MIN_VARIANCE);
    let var_c = current.variance.max(MIN_VARIANCE);
    let kl = (var_r.sqrt() / var_c.sqrt()).ln()
        + (var_c + (current.mean - reference.mean).powi(2)) / (2.0 * var_r)
        - 0.5;
    kl.abs()
}

/// First Wasserstein distance between two samples.
pub fn wasserstein(reference: &Distribution, current: &Distribution) -> f64 {
    let mut a = reference.values.clone();
    let mut b = current.values.clone();
    a.sort_by(|x, y| x.partial_cmp(y).unwrap_or(Ordering::Equal));
    b.sort_by(|x, y| x.partial_cmp(y).unwrap_or(Ordering::Equal));

    let n = a.len().min(b.len());
    if n == 0 {
        return 0.0;
    }
    a.iter().zip(&b).map(|(x, y)| (x - y).abs()).sum::<f64>() / n as f64
}

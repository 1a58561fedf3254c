//! HTTP surface: metrics exposition, liveness, model health and predictions.

use super::metrics::MetricsCollector;
use crate::compute::serving::{ModelServer, PredictionOptions, PredictionRequest, PredictionResponse};
use crate::error::{ModelwatchError, Result};
use crate::monitoring::DriftDetector;
use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info};

/// Prometheus text exposition content type.
const METRICS_CONTENT_TYPE: &str = "text/plain; version=0.0.4";

/// Shared handler state
#[derive(Clone)]
pub struct HttpState {
    pub metrics: MetricsCollector,
    pub server: Option<Arc<ModelServer>>,
    pub drift: Option<Arc<DriftDetector>>,
}

/// Body of `POST /v1/models/:model_id/drift/reference`
#[derive(Debug, Deserialize)]
pub struct ReferenceBody {
    pub data: Vec<serde_json::Value>,
}

/// Body of `POST /v1/models/:model_id/predict`
#[derive(Debug, Deserialize)]
pub struct PredictBody {
    pub input: serde_json::Value,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub options: PredictionOptions,
}

impl IntoResponse for ModelwatchError {
    fn into_response(self) -> Response {
        let status = match &self {
            ModelwatchError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            ModelwatchError::Prediction(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ModelwatchError::Load(_) | ModelwatchError::Configuration(_) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            ModelwatchError::NotFound(_) => StatusCode::NOT_FOUND,
            ModelwatchError::AlreadyExists(_) => StatusCode::CONFLICT,
            _ => {
                error!(error = %self, "Internal server error");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let body = Json(json!({
            "error": self.kind(),
            "message": self.to_string(),
        }));

        (status, body).into_response()
    }
}

pub fn router(state: HttpState) -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .route("/health", get(health_handler))
        .route("/models/health", get(models_health_handler))
        .route("/v1/models/:model_id/predict", post(predict_handler))
        .route(
            "/v1/models/:model_id/drift/reference",
            post(drift_reference_handler),
        )
        .with_state(state)
}

async fn metrics_handler(State(state): State<HttpState>) -> Response {
    match state.metrics.render() {
        Ok(text) => ([(header::CONTENT_TYPE, METRICS_CONTENT_TYPE)], text).into_response(),
        Err(e) => e.into_response(),
    }
}

async fn health_handler(State(state): State<HttpState>) -> Response {
    if state.metrics.is_healthy() {
        Json(json!({"status": "healthy"})).into_response()
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({"status": "unhealthy"})),
        )
            .into_response()
    }
}

async fn models_health_handler(State(state): State<HttpState>) -> Response {
    match &state.server {
        Some(server) => Json(server.get_health()).into_response(),
        None => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({"error": "no_server", "message": "No model server is bound"})),
        )
            .into_response(),
    }
}

async fn predict_handler(
    State(state): State<HttpState>,
    Path(model_id): Path<String>,
    Json(body): Json<PredictBody>,
) -> std::result::Result<Json<PredictionResponse>, ModelwatchError> {
    let server = state
        .server
        .ok_or_else(|| ModelwatchError::Configuration("No model server is bound".to_string()))?;

    let request = PredictionRequest {
        model_id,
        version: body.version,
        input: body.input,
        options: body.options,
    };
    Ok(Json(server.predict(request).await?))
}

async fn drift_reference_handler(
    State(state): State<HttpState>,
    Path(model_id): Path<String>,
    Json(body): Json<ReferenceBody>,
) -> std::result::Result<Response, ModelwatchError> {
    let drift = state
        .drift
        .ok_or_else(|| ModelwatchError::Configuration("No drift detector is bound".to_string()))?;

    let reference = drift.initialize_reference(&model_id, &body.data)?;
    let body = Json(json!({
        "model_id": model_id,
        "samples": reference.values.len(),
        "mean": reference.mean,
        "variance": reference.variance,
    }));
    Ok((StatusCode::CREATED, body).into_response())
}

/// Serve the router until `shutdown` resolves.
pub async fn serve(
    listener: TcpListener,
    state: HttpState,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<()> {
    let addr = listener.local_addr()?;
    info!(addr = %addr, "Metrics server listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| ModelwatchError::Network(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status_of(err: ModelwatchError) -> StatusCode {
        err.into_response().status()
    }

    #[test]
    fn test_error_status_mapping() {
        assert_eq!(
            status_of(ModelwatchError::InvalidInput("x".into())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(ModelwatchError::Prediction("x".into())),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            status_of(ModelwatchError::Load("x".into())),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            status_of(ModelwatchError::Configuration("onnx".into())),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            status_of(ModelwatchError::AlreadyExists("ref".into())),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_of(ModelwatchError::Internal("x".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}

use crate::coalesce::{CoalesceError, Coalescer};
use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Shared state for the ingress API
pub struct IngressState {
    pub coalescer: Coalescer,
}

/// Body of `POST /log`. Every field is optional here so that a missing one is
/// reported as a 400 rather than a deserialization failure.
#[derive(Debug, Default, Deserialize)]
pub struct LogRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub camera_id: Option<String>,
    #[serde(default)]
    pub timestamp: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct LogResponse {
    pub message: String,
}

/// POST /log
pub async fn create_log(
    State(state): State<Arc<IngressState>>,
    payload: Result<Json<LogRequest>, JsonRejection>,
) -> Result<Json<LogResponse>, ApiError> {
    let Json(request) = payload.map_err(|e| ApiError::BadRequest(e.body_text()))?;

    state
        .coalescer
        .submit(request.name, request.camera_id, request.timestamp)
        .await?;

    Ok(Json(LogResponse {
        message: "Log received and compressed".to_string(),
    }))
}

/// GET /health
pub async fn health_check() -> &'static str {
    "OK"
}

// Error handling
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    InternalError(String),
}

impl From<CoalesceError> for ApiError {
    fn from(err: CoalesceError) -> Self {
        match err {
            CoalesceError::Validation(e) => ApiError::BadRequest(e.to_string()),
            CoalesceError::Store(e) => {
                tracing::error!(error = %e, "Failed to record log");
                ApiError::InternalError("Server error".to_string())
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::InternalError(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

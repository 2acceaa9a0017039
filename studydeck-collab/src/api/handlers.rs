//! HTTP request handlers
//!
//! Expected outcomes (NotFound, NotImplemented, PreconditionFailed)
//! surface verbatim to the caller; faults are logged with detail and
//! surfaced generically.

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use serde::{Deserialize, Serialize};
use studydeck_common::Error;
use tracing::error;
use uuid::Uuid;

use crate::api::server::AppContext;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    status: String,
    module: String,
    version: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    error: String,
}

#[derive(Debug, Deserialize)]
pub struct NewAttemptRequest {
    assignment_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct NewAttemptResponse {
    submission_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct SubmitResponse {
    status: String,
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /health
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        module: "studydeck-collab".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// POST /collab/attempts - start a new attempt seeded from the caller's
/// latest submitted submission
pub async fn new_attempt(
    State(ctx): State<AppContext>,
    headers: HeaderMap,
    Json(request): Json<NewAttemptRequest>,
) -> Result<Json<NewAttemptResponse>, (StatusCode, Json<ErrorResponse>)> {
    let caller_id = caller_id(&headers)?;

    let submission_id = ctx
        .engine
        .initialize_attempt(request.assignment_id, &caller_id)
        .await
        .map_err(error_response)?;

    Ok(Json(NewAttemptResponse { submission_id }))
}

/// POST /collab/submissions/:submission_id/submit - merge a draft
/// submission into its study set
pub async fn submit_attempt(
    State(ctx): State<AppContext>,
    Path(submission_id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<Json<SubmitResponse>, (StatusCode, Json<ErrorResponse>)> {
    let caller_id = caller_id(&headers)?;

    ctx.engine
        .submit_attempt(submission_id, &caller_id)
        .await
        .map_err(error_response)?;

    Ok(Json(SubmitResponse {
        status: "submitted".to_string(),
    }))
}

// ============================================================================
// Helpers
// ============================================================================

/// Caller identity, resolved upstream and forwarded as a header
fn caller_id(headers: &HeaderMap) -> Result<String, (StatusCode, Json<ErrorResponse>)> {
    headers
        .get("x-user-id")
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(|v| v.to_string())
        .ok_or((
            StatusCode::UNAUTHORIZED,
            Json(ErrorResponse {
                error: "missing X-User-Id header".to_string(),
            }),
        ))
}

/// Map engine errors onto HTTP status codes
fn error_response(err: Error) -> (StatusCode, Json<ErrorResponse>) {
    let (status, message) = match err {
        Error::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
        Error::NotImplemented(msg) => (StatusCode::NOT_IMPLEMENTED, msg),
        Error::PreconditionFailed(msg) => (StatusCode::PRECONDITION_FAILED, msg),
        other => {
            error!("Request failed: {}", other);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal server error".to_string(),
            )
        }
    };
    (status, Json(ErrorResponse { error: message }))
}

//! REST API route handlers.
//!
//! Authentication happens in front of these handlers (see [`crate::auth`]);
//! by the time one runs, the caller has been accepted by its route's gate.

use std::future::Future;
use std::sync::Arc;

use axum::Json;
use axum::body::Bytes;
use axum::extract::rejection::{BytesRejection, JsonRejection};
use axum::extract::{Extension, State};
use axum::http::{HeaderMap, StatusCode};
use chrono::{SecondsFormat, Utc};
use raincheck_protocol::{AnalysisResponse, ApiKeyResponse, CodeRequest, Stats, USER_ID_HEADER};
use raincheck_store::{StoreError, StoreResult};
use serde_json::{Value, json};
use tracing::{info, warn};

use crate::analysis::AnalysisError;
use crate::auth::AuthenticatedIdentity;
use crate::error::ApiError;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// GET /health
// ---------------------------------------------------------------------------

pub async fn health() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "time": Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
    }))
}

// ---------------------------------------------------------------------------
// POST /api/analyze-code
// ---------------------------------------------------------------------------

/// Review the submitted code.
///
/// The body limit is enforced by the router; an oversized body surfaces
/// here as a rejection and is answered with 413.
pub async fn analyze_code(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<AuthenticatedIdentity>,
    body: Result<Bytes, BytesRejection>,
) -> Result<Json<AnalysisResponse>, ApiError> {
    let body = body.map_err(|rejection| {
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            ApiError::PayloadTooLarge
        } else {
            ApiError::BadRequest("Failed to read request body".into())
        }
    })?;

    let req: CodeRequest = serde_json::from_slice(&body)
        .map_err(|_| ApiError::BadRequest("Invalid JSON input".into()))?;
    if req.code.trim().is_empty() {
        return Err(ApiError::BadRequest("Code cannot be empty".into()));
    }

    let analysis = state.analysis.analyze(&req.code).await.map_err(|err| {
        warn!(error = %err, "analysis failed");
        match err {
            AnalysisError::NotConfigured | AnalysisError::Request(_) | AnalysisError::Status(_) => {
                ApiError::UpstreamUnavailable("Analysis service unavailable")
            }
            AnalysisError::Empty | AnalysisError::Malformed(_) | AnalysisError::Incomplete => {
                ApiError::AnalysisFailed
            }
        }
    })?;

    state.counters.record_analysis();
    info!(
        user_id = identity.user_id().unwrap_or("-"),
        bytes = req.code.len(),
        issues = analysis.issue_count(),
        "analysis complete"
    );
    Ok(Json(analysis))
}

// ---------------------------------------------------------------------------
// /api/stats
// ---------------------------------------------------------------------------

pub async fn get_stats(State(state): State<Arc<AppState>>) -> Json<Stats> {
    Json(state.counters.snapshot())
}

pub async fn set_stats(
    State(state): State<Arc<AppState>>,
    body: Result<Json<Stats>, JsonRejection>,
) -> Result<Json<Stats>, ApiError> {
    let Json(stats) = body.map_err(|_| ApiError::BadRequest("Invalid JSON input".into()))?;
    state.counters.set(stats);
    Ok(Json(stats))
}

// ---------------------------------------------------------------------------
// /api/apikey
// ---------------------------------------------------------------------------

/// Issue a fresh token, replacing any the user already holds.
pub async fn issue_api_key(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<ApiKeyResponse>, ApiError> {
    let user_id = user_id(&headers)?;
    let token = bounded(&state, state.credentials.issue(user_id)).await?;
    Ok(Json(ApiKeyResponse { api_key: token }))
}

/// The user's current token, or an empty key when there is none.
pub async fn get_api_key(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<ApiKeyResponse>, ApiError> {
    let user_id = user_id(&headers)?;
    let api_key = match bounded(&state, state.credentials.lookup(user_id)).await {
        Ok(record) => record.token,
        Err(BoundedError::Store(StoreError::NotFound { .. })) => String::new(),
        Err(err) => return Err(err.into()),
    };
    Ok(Json(ApiKeyResponse { api_key }))
}

pub async fn revoke_api_key(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<StatusCode, ApiError> {
    let user_id = user_id(&headers)?;
    bounded(&state, state.credentials.revoke(user_id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// The subject the federated gate wrote into `X-User-ID`.
fn user_id(headers: &HeaderMap) -> Result<&str, ApiError> {
    headers
        .get(USER_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .ok_or(ApiError::Unauthenticated("User ID is required"))
}

// ---------------------------------------------------------------------------
// Store calls
// ---------------------------------------------------------------------------

enum BoundedError {
    Store(StoreError),
    TimedOut,
}

impl From<BoundedError> for ApiError {
    fn from(err: BoundedError) -> Self {
        match err {
            BoundedError::Store(err) => err.into(),
            BoundedError::TimedOut => ApiError::UpstreamUnavailable("Credential store unavailable"),
        }
    }
}

/// Run a store call under the configured timeout.
async fn bounded<T>(
    state: &AppState,
    call: impl Future<Output = StoreResult<T>>,
) -> Result<T, BoundedError> {
    match tokio::time::timeout(state.store_timeout, call).await {
        Ok(result) => result.map_err(BoundedError::Store),
        Err(_) => {
            warn!(timeout_ms = state.store_timeout.as_millis() as u64, "credential store timed out");
            Err(BoundedError::TimedOut)
        }
    }
}

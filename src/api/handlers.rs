use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::analysis::binder::{BindValue, Params};
use crate::cache::{Cache, CacheStats};
use crate::model::{CacheKey, Classification, ParamValue, TableAccess};

/// Application state shared across handlers.
pub struct AppState {
    pub cache: Arc<Cache>,
    pub started_at: Instant,
}

// ============================================================================
// Health
// ============================================================================

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub uptime_seconds: u64,
    pub timestamp: i64,
}

pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        uptime_seconds: state.started_at.elapsed().as_secs(),
        timestamp: chrono::Utc::now().timestamp(),
    })
}

// ============================================================================
// Shared request/response shapes
// ============================================================================

/// Parameters as sent over the wire: either a positional list or a named
/// map, mirroring `analysis::binder::Params`'s two binding styles.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum WireParams {
    Positional(Vec<WireBindValue>),
    Named(std::collections::HashMap<String, WireBindValue>),
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum WireBindValue {
    Scalar(ParamValue),
    List(Vec<ParamValue>),
}

impl From<WireBindValue> for BindValue {
    fn from(v: WireBindValue) -> Self {
        match v {
            WireBindValue::Scalar(v) => BindValue::Scalar(v),
            WireBindValue::List(vs) => BindValue::List(vs),
        }
    }
}

impl From<WireParams> for Params {
    fn from(v: WireParams) -> Self {
        match v {
            WireParams::Positional(values) => {
                Params::Positional(values.into_iter().map(Into::into).collect())
            }
            WireParams::Named(map) => {
                Params::Named(map.into_iter().map(|(k, v)| (k, v.into())).collect())
            }
        }
    }
}

// ============================================================================
// POST /analyze
// ============================================================================

#[derive(Deserialize)]
pub struct AnalyzeRequest {
    pub sql: String,
    pub params: Option<WireParams>,
}

#[derive(Serialize)]
pub struct AnalyzeResponse {
    pub fingerprint: String,
    pub classification: Classification,
    pub tables: Vec<TableAccess>,
    pub normalized_sql: String,
}

impl From<CacheKey> for AnalyzeResponse {
    fn from(key: CacheKey) -> Self {
        Self {
            fingerprint: key.fingerprint.as_str().to_string(),
            classification: key.classification,
            tables: key.tables,
            normalized_sql: key.normalized_sql,
        }
    }
}

pub async fn analyze(
    State(state): State<Arc<AppState>>,
    Json(request): Json<AnalyzeRequest>,
) -> Result<Json<AnalyzeResponse>, ApiError> {
    let params: Option<Params> = request.params.map(Into::into);
    let cache_key = state
        .cache
        .analyze(&request.sql, params.as_ref())
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;
    Ok(Json(cache_key.into()))
}

// ============================================================================
// POST /register
// ============================================================================

#[derive(Deserialize)]
pub struct RegisterRequest {
    pub sql: String,
    pub params: Option<WireParams>,
    /// Base64-encoded opaque result payload.
    pub result: String,
}

#[derive(Serialize)]
pub struct RegisterResponse {
    pub success: bool,
    pub fingerprint: String,
}

pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(request): Json<RegisterRequest>,
) -> Result<Json<RegisterResponse>, ApiError> {
    let params: Option<Params> = request.params.map(Into::into);
    let blob = base64::engine::general_purpose::STANDARD
        .decode(request.result)
        .map_err(|e| ApiError::BadRequest(format!("invalid base64 result: {}", e)))?;

    let fingerprint = state
        .cache
        .register(&request.sql, params.as_ref(), blob)
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;

    Ok(Json(RegisterResponse {
        success: true,
        fingerprint: fingerprint.as_str().to_string(),
    }))
}

// ============================================================================
// GET /cache/:fingerprint
// ============================================================================

#[derive(Serialize)]
pub struct CacheEntryResponse {
    pub result: Option<String>,
}

pub async fn get_cache_entry(
    State(state): State<Arc<AppState>>,
    Path(fingerprint): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let blob = state
        .cache
        .get(&fingerprint)
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    match blob {
        Some(blob) => Ok((
            StatusCode::OK,
            Json(CacheEntryResponse {
                result: Some(base64::engine::general_purpose::STANDARD.encode(blob)),
            }),
        )),
        None => Ok((StatusCode::NOT_FOUND, Json(CacheEntryResponse { result: None }))),
    }
}

// ============================================================================
// POST /invalidate
// ============================================================================

#[derive(Deserialize)]
pub struct InvalidateRequest {
    pub sql: String,
    pub params: Option<WireParams>,
}

#[derive(Serialize)]
pub struct InvalidateResponse {
    pub success: bool,
    pub invalidated: usize,
}

pub async fn invalidate(
    State(state): State<Arc<AppState>>,
    Json(request): Json<InvalidateRequest>,
) -> Result<Json<InvalidateResponse>, ApiError> {
    let params: Option<Params> = request.params.map(Into::into);
    let invalidated = state
        .cache
        .invalidate(&request.sql, params.as_ref())
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;
    Ok(Json(InvalidateResponse {
        success: true,
        invalidated,
    }))
}

// ============================================================================
// POST /should-invalidate
// ============================================================================

#[derive(Deserialize)]
pub struct ShouldInvalidateRequest {
    pub cache_key: CacheKey,
    pub write_sql: String,
    pub params: Option<WireParams>,
}

#[derive(Serialize)]
pub struct ShouldInvalidateResponse {
    pub should_invalidate: bool,
}

pub async fn should_invalidate(
    Json(request): Json<ShouldInvalidateRequest>,
) -> Result<Json<ShouldInvalidateResponse>, ApiError> {
    let params: Option<Params> = request.params.map(Into::into);
    let decision = Cache::should_invalidate(&request.cache_key, &request.write_sql, params.as_ref())
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;
    Ok(Json(ShouldInvalidateResponse {
        should_invalidate: decision,
    }))
}

// ============================================================================
// DELETE /table/:name
// ============================================================================

#[derive(Serialize)]
pub struct ClearTableResponse {
    pub success: bool,
    pub table: String,
    pub removed: usize,
}

pub async fn clear_table(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Json<ClearTableResponse>, ApiError> {
    let removed = state
        .cache
        .clear_table(&name)
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    Ok(Json(ClearTableResponse {
        success: true,
        table: name,
        removed,
    }))
}

// ============================================================================
// GET /stats
// ============================================================================

#[derive(Serialize)]
pub struct StatsResponse {
    pub cache: CacheStats,
}

pub async fn stats(State(state): State<Arc<AppState>>) -> Json<StatsResponse> {
    Json(StatsResponse {
        cache: state.cache.stats(),
    })
}

// ============================================================================
// GET /metrics
// ============================================================================

pub async fn metrics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let body = crate::metrics::render(&state.cache.stats());
    (
        StatusCode::OK,
        [(axum::http::header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        body,
    )
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    NotFound(String),
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        let body = serde_json::json!({ "error": message });
        (status, Json(body)).into_response()
    }
}

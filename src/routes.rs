use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use tracing::{info, info_span, Instrument};
use uuid::Uuid;

use crate::{
    error::{ApiError, ValidationFailure},
    fingerprint::is_fingerprint,
    models::{GenerateRequestBody, GenerateResponse},
    pipeline::Orchestrator,
};

#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/generate", post(generate_model))
        .route("/api/models/:id", get(get_model).delete(invalidate_model))
        .with_state(state)
}

/// Key a rate limiter would count requests under. Nothing here enforces a limit.
pub fn rate_limit_key(headers: &HeaderMap) -> String {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty());
    let real_ip = headers
        .get("x-real-ip")
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty());

    format!("ratelimit:{}", forwarded.or(real_ip).unwrap_or("anonymous"))
}

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

pub async fn generate_model(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<GenerateRequestBody>, JsonRejection>,
) -> Result<Json<GenerateResponse>, ApiError> {
    let request_id = Uuid::new_v4();
    let client = rate_limit_key(&headers);
    let span = info_span!("generate", %request_id, %client);

    generate_in_span(state, payload).instrument(span).await
}

async fn generate_in_span(
    state: AppState,
    payload: Result<Json<GenerateRequestBody>, JsonRejection>,
) -> Result<Json<GenerateResponse>, ApiError> {
    let Json(body) =
        payload.map_err(|rejection| ValidationFailure::single("body", rejection.body_text()))?;
    let request = body.into_request()?;

    // Dropping the handler future (client went away) cancels the generation.
    let cancel = CancellationToken::new();
    let _cancel_on_drop = cancel.clone().drop_guard();

    let artifact = state.orchestrator.generate_model(&request, &cancel).await?;
    info!(model_id = %artifact.model_id, "📦 Returning model");
    Ok(Json(GenerateResponse::from(artifact)))
}

pub async fn get_model(
    Path(id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<GenerateResponse>, ApiError> {
    if !is_fingerprint(&id) {
        return Err(ApiError::NotFound(id));
    }
    match state.orchestrator.cached(&id).await {
        Some(artifact) => Ok(Json(GenerateResponse::from(artifact))),
        None => Err(ApiError::NotFound(id)),
    }
}

pub async fn invalidate_model(Path(id): Path<String>, State(state): State<AppState>) -> StatusCode {
    if is_fingerprint(&id) {
        state.orchestrator.invalidate(&id).await;
    }
    StatusCode::NO_CONTENT
}

//! Public (unauthenticated) endpoints.

use axum::{
    extract::{rejection::JsonRejection, State},
    http::HeaderMap,
    response::{IntoResponse, Response},
    Extension, Json,
};
use serde_json::{json, Value};

use crate::analytics::TrackRequest;
use crate::gateway::{ActionRequest, ClientContext, SensitiveAction};
use crate::http::request::X_VISITOR_ID;
use crate::http::response::ApiError;
use crate::http::server::AppState;

pub async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Limits the browser client needs to know about.
pub async fn public_config(State(state): State<AppState>) -> Json<Value> {
    let config = &state.config;
    Json(json!({
        "maxFileSize": config.security.max_file_size,
        "rateLimit": {
            "windowMs": config.rate_limit.window_ms,
            "maxRequests": config.rate_limit.max_requests,
        },
    }))
}

pub async fn track(
    State(state): State<AppState>,
    Extension(client): Extension<ClientContext>,
    headers: HeaderMap,
    payload: Result<Json<TrackRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(request) = payload?;
    let visitor = headers
        .get(X_VISITOR_ID)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .unwrap_or(client.ip.as_str());

    let event = request.into_event(visitor)?;
    state.analytics.ingest(event).await?;
    Ok(Json(json!({ "success": true })))
}

pub async fn challenge(State(state): State<AppState>) -> Json<Value> {
    let challenge = state.actions.challenges().issue();
    Json(json!({ "success": true, "challenge": challenge }))
}

pub async fn verify_action(
    State(state): State<AppState>,
    Extension(client): Extension<ClientContext>,
    payload: Result<Json<ActionRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(request) = payload?;
    let action = request
        .action
        .parse::<SensitiveAction>()
        .map_err(|e| ApiError::validation("action", e.to_string()))?;

    match state.actions.check_action(&client.ip, action, &request) {
        Ok(approval) => Ok(Json(json!({ "success": true, "approval": approval })).into_response()),
        Err(rejection) => Ok(rejection.into_response()),
    }
}

pub async fn not_found() -> ApiError {
    ApiError::NotFound
}

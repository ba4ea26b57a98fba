//! Admin endpoints: session management, security dashboard, analytics.

use std::net::Ipv4Addr;

use axum::{
    body::Bytes,
    extract::{
        rejection::{BytesRejection, JsonRejection},
        Query, State,
    },
    http::header,
    response::IntoResponse,
    Extension, Json,
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::admin::auth::SessionClaims;
use crate::clock::datetime_from_ms;
use crate::http::response::ApiError;
use crate::http::server::AppState;

const DEFAULT_LOG_LIMIT: usize = 100;
const MAX_LOG_LIMIT: usize = 500;
const DEFAULT_BLOCK_MS: u64 = 300_000;

fn body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    payload
        .map(|Json(value)| value)
        .map_err(ApiError::from)
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub password: String,
}

pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let request = body(payload)?;
    if request.password.is_empty() {
        return Err(ApiError::validation("password", "is required"));
    }
    let session = state.auth.login(&request.password).await?;
    Ok(Json(json!({
        "success": true,
        "token": session.token,
        "expiresAt": session.expires_at,
    })))
}

pub async fn verify_session(Extension(claims): Extension<SessionClaims>) -> Json<Value> {
    Json(json!({
        "success": true,
        "valid": true,
        "expiresAt": datetime_from_ms(claims.exp),
    }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    #[serde(default)]
    pub current_password: String,
    #[serde(default)]
    pub new_password: String,
}

pub async fn change_password(
    State(state): State<AppState>,
    payload: Result<Json<ChangePasswordRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let request = body(payload)?;
    state
        .auth
        .change_password(&request.current_password, &request.new_password)
        .await?;
    Ok(Json(json!({ "success": true, "message": "Password changed" })))
}

pub async fn security_status(State(state): State<AppState>) -> Json<Value> {
    let audit = state.gateway.audit();
    let stats = audit.stats();
    let blocked: Vec<String> = state
        .gateway
        .blocklist()
        .list()
        .into_iter()
        .map(|entry| entry.ip)
        .collect();

    Json(json!({
        "success": true,
        "security": {
            "status": audit.security_level(),
            "blockedIPs": blocked.len(),
            "blockedIPList": blocked,
            "recentRequests": stats.last_hour,
            "uniqueVisitors": stats.unique_ips,
            "suspiciousRequests": audit.suspicious_count(),
            "avgResponseTime": stats.avg_response_time_ms,
            "statusCodes": stats.status_codes,
        },
    }))
}

#[derive(Debug, Deserialize)]
pub struct LogsQuery {
    pub limit: Option<usize>,
}

pub async fn security_logs(
    State(state): State<AppState>,
    Query(query): Query<LogsQuery>,
) -> Json<Value> {
    let limit = query.limit.unwrap_or(DEFAULT_LOG_LIMIT).min(MAX_LOG_LIMIT);
    let audit = state.gateway.audit();
    let logs = audit.recent(limit);
    Json(json!({
        "success": true,
        "count": logs.len(),
        "total": audit.len(),
        "logs": logs,
    }))
}

#[derive(Debug, Deserialize)]
pub struct BlockRequest {
    #[serde(default)]
    pub ip: String,
    pub duration: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct UnblockRequest {
    #[serde(default)]
    pub ip: String,
}

/// Accept dotted IPv4 addresses and the IPv6 loopback.
fn validate_ip(raw: &str) -> Result<String, ApiError> {
    let ip = raw.trim();
    if ip.is_empty() {
        return Err(ApiError::validation("ip", "is required"));
    }
    if ip == "::1" || ip.parse::<Ipv4Addr>().is_ok() {
        return Ok(ip.to_string());
    }
    Err(ApiError::validation("ip", "must be an IPv4 address"))
}

pub async fn block_ip(
    State(state): State<AppState>,
    payload: Result<Json<BlockRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let request = body(payload)?;
    let ip = validate_ip(&request.ip)?;
    let duration = request.duration.unwrap_or(DEFAULT_BLOCK_MS);
    if duration == 0 {
        return Err(ApiError::validation("duration", "must be > 0"));
    }

    let until = state.gateway.blocklist().block(&ip, duration);
    Ok(Json(json!({
        "success": true,
        "message": format!("IP {} blocked", ip),
        "blockedUntil": datetime_from_ms(until),
    })))
}

pub async fn unblock_ip(
    State(state): State<AppState>,
    payload: Result<Json<UnblockRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let request = body(payload)?;
    let ip = validate_ip(&request.ip)?;
    let was_blocked = state.gateway.unblock(&ip);
    Ok(Json(json!({
        "success": true,
        "message": format!("IP {} unblocked", ip),
        "wasBlocked": was_blocked,
    })))
}

pub async fn security_threats(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "success": true,
        "threats": state.gateway.audit().threats(),
    }))
}

pub async fn analytics_overview(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let snapshot = state.analytics.snapshot().await?;
    Ok(Json(json!({
        "success": true,
        "analytics": snapshot,
        "requests": state.gateway.audit().stats(),
    })))
}

pub async fn analytics_export(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, ApiError> {
    let data = state.analytics.export_all().await?;
    let disposition = format!(
        "attachment; filename=\"analytics-{}.json\"",
        state.clock.today()
    );
    Ok(([(header::CONTENT_DISPOSITION, disposition)], Json(data)))
}

pub async fn analytics_import(
    State(state): State<AppState>,
    payload: Result<Bytes, BytesRejection>,
) -> Result<Json<Value>, ApiError> {
    let days = state.analytics.import_json(&payload?).await?;
    Ok(Json(json!({
        "success": true,
        "message": format!("Imported {} days of analytics", days),
    })))
}

pub async fn analytics_clear(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    state.analytics.clear().await?;
    Ok(Json(json!({ "success": true, "message": "Analytics cleared" })))
}

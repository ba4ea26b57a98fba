//! Admin surface: login plus the authenticated security and analytics endpoints.

pub mod auth;
pub mod handlers;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use crate::http::server::AppState;
use self::auth::require_admin;
use self::handlers::*;

pub use auth::{AdminAuth, AdminCredential, AuthError, SessionClaims, SessionSigner};

pub fn router(state: AppState) -> Router<AppState> {
    let protected = Router::new()
        .route("/api/auth/verify", get(verify_session))
        .route("/api/auth/change-password", post(change_password))
        .route("/api/security/status", get(security_status))
        .route("/api/security/logs", get(security_logs))
        .route("/api/security/block", post(block_ip))
        .route("/api/security/unblock", post(unblock_ip))
        .route("/api/security/threats", get(security_threats))
        .route(
            "/api/analytics",
            get(analytics_overview).delete(analytics_clear),
        )
        .route("/api/analytics/export", get(analytics_export))
        .route("/api/analytics/import", post(analytics_import))
        .route_layer(middleware::from_fn_with_state(state, require_admin));

    Router::new()
        .route("/api/auth/login", post(login))
        .merge(protected)
}

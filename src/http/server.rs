//! HTTP server setup.
//!
//! # Responsibilities
//! - Hold the shared service objects handed to every handler
//! - Build the Axum router with the public and admin surfaces
//! - Wire middleware (request ID, tracing, CORS, limits, timeout, gateway)
//! - Serve until the shutdown broadcast fires

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::DefaultBodyLimit,
    http::{HeaderName, HeaderValue},
    middleware,
    routing::{get, post},
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::admin::{self, AdminAuth};
use crate::analytics::AnalyticsStore;
use crate::clock::SharedClock;
use crate::config::TrustConfig;
use crate::gateway::{gateway_middleware, ActionGuard, SecurityGateway};
use crate::http::handlers;
use crate::http::request::X_REQUEST_ID;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<TrustConfig>,
    pub gateway: Arc<SecurityGateway>,
    pub actions: Arc<ActionGuard>,
    pub analytics: Arc<AnalyticsStore>,
    pub auth: Arc<AdminAuth>,
    pub clock: SharedClock,
}

/// HTTP server for the trust gateway.
pub struct HttpServer {
    router: Router,
}

impl HttpServer {
    pub fn new(state: AppState) -> Self {
        Self {
            router: build_router(state),
        }
    }

    /// Serve on `listener` until `shutdown` fires.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let app = self
            .router
            .into_make_service_with_connect_info::<SocketAddr>();
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("HTTP server draining");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Build the Axum router with all middleware layers.
#[allow(deprecated)]
pub fn build_router(state: AppState) -> Router {
    let config = state.config.clone();
    let body_limit = config.security.max_file_size as usize;
    let request_id = HeaderName::from_static(X_REQUEST_ID);

    Router::new()
        .route("/health", get(handlers::health))
        .route("/api/config", get(handlers::public_config))
        .route("/api/analytics/track", post(handlers::track))
        .route("/api/security/challenge", get(handlers::challenge))
        .route("/api/security/verify-action", post(handlers::verify_action))
        .merge(admin::router(state.clone()))
        .fallback(handlers::not_found)
        .layer(middleware::from_fn_with_state(state.clone(), gateway_middleware))
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(request_id.clone(), MakeRequestUuid))
                .layer(PropagateRequestIdLayer::new(request_id))
                .layer(TraceLayer::new_for_http())
                .layer(cors_layer(&config.server.cors_origin))
                .layer(DefaultBodyLimit::max(body_limit))
                .layer(TimeoutLayer::new(Duration::from_secs(
                    config.server.request_timeout_secs,
                ))),
        )
}

fn cors_layer(origin: &str) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if origin == "*" {
        return layer.allow_origin(Any);
    }
    match HeaderValue::from_str(origin) {
        Ok(value) => layer.allow_origin(AllowOrigin::exact(value)),
        Err(_) => {
            tracing::warn!(origin = %origin, "Invalid CORS origin, cross-origin requests disabled");
            layer
        }
    }
}

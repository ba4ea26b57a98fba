//! Axum middleware running every request through the gateway.

use std::net::SocketAddr;
use std::time::Instant;

use axum::{
    body::HttpBody,
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::audit::LogEntry;
use crate::http::request::{client_ip, request_id};
use crate::http::server::AppState;
use crate::observability::metrics;
use crate::security::{BotVerdict, RequestMetadata};

/// Attached to requests that passed the gateway.
#[derive(Debug, Clone)]
pub struct ClientContext {
    pub ip: String,
    pub verdict: BotVerdict,
}

pub async fn gateway_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let started = Instant::now();

    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|info| info.0);
    let ip = client_ip(request.headers(), peer, state.config.server.trust_proxy);
    let meta = RequestMetadata::from_headers(request.uri().path(), request.headers());
    let method = request.method().to_string();
    let query = LogEntry::parse_query(request.uri().query());
    let request_id = request_id(request.headers());

    let response = match state.gateway.evaluate(&ip, &meta) {
        Ok(verdict) => {
            request.extensions_mut().insert(ClientContext {
                ip: ip.clone(),
                verdict,
            });
            next.run(request).await
        }
        Err(rejection) => rejection.into_response(),
    };

    let timestamp = state.clock.now();
    let elapsed = started.elapsed();
    let status = response.status().as_u16();
    metrics::record_request(&method, status, elapsed);
    tracing::debug!(
        request_id = %request_id,
        ip = %ip,
        method = %method,
        path = %meta.path,
        status,
        elapsed = ?elapsed,
        "Request finished"
    );

    state.gateway.finalize(LogEntry {
        timestamp,
        method,
        path: meta.path,
        query,
        ip,
        user_agent: meta.user_agent,
        referer: meta.referer,
        request_id,
        status_code: status,
        response_time_ms: elapsed.as_millis() as u64,
        content_length: response.body().size_hint().exact(),
    });

    response
}

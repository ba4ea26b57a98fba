//! JSON error responses for the HTTP surface.

use axum::{
    extract::rejection::{BytesRejection, JsonRejection},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::analytics::{AnalyticsError, EventError};

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{field}: {message}")]
    Validation { field: &'static str, message: String },
    /// Covers missing, malformed and expired sessions alike.
    #[error("Authentication required")]
    Unauthorized,
    #[error("{0}")]
    Forbidden(&'static str),
    #[error("Too many failed login attempts")]
    LockedOut { retry_after_secs: u64 },
    #[error("Not found")]
    NotFound,
    #[error("Request body too large")]
    PayloadTooLarge,
    #[error("Internal server error")]
    Internal,
}

impl ApiError {
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        ApiError::Validation {
            field,
            message: message.into(),
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation { .. } => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) | ApiError::LockedOut { .. } => StatusCode::FORBIDDEN,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    success: bool,
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    field: Option<&'static str>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let (error, field) = match &self {
            ApiError::Validation { field, message } => (message.clone(), Some(*field)),
            other => (other.to_string(), None),
        };

        let mut response = (
            status,
            Json(ErrorBody {
                success: false,
                error,
                field,
            }),
        )
            .into_response();
        if let ApiError::LockedOut { retry_after_secs } = self {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(retry_after_secs));
        }
        response
    }
}

impl From<EventError> for ApiError {
    fn from(err: EventError) -> Self {
        ApiError::Validation {
            field: err.field,
            message: err.message,
        }
    }
}

impl From<AnalyticsError> for ApiError {
    fn from(err: AnalyticsError) -> Self {
        match err {
            AnalyticsError::Import(_) => ApiError::validation("data", err.to_string()),
            AnalyticsError::Io(_) | AnalyticsError::Serialize(_) => {
                tracing::error!(error = %err, "Analytics operation failed");
                ApiError::Internal
            }
        }
    }
}

/// Body rejections keep the 413 for oversized payloads; anything else is a bad body.
fn body_rejection(status: StatusCode, text: String) -> ApiError {
    if status == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::PayloadTooLarge
    } else {
        ApiError::validation("body", text)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        body_rejection(rejection.status(), rejection.body_text())
    }
}

impl From<BytesRejection> for ApiError {
    fn from(rejection: BytesRejection) -> Self {
        body_rejection(rejection.status(), rejection.body_text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn body(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_validation_names_field() {
        let response = ApiError::validation("ip", "must be an IPv4 address").into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body(response).await;
        assert_eq!(body["success"], false);
        assert_eq!(body["field"], "ip");
        assert_eq!(body["error"], "must be an IPv4 address");
    }

    #[tokio::test]
    async fn test_locked_out_sets_retry_after() {
        let response = ApiError::LockedOut {
            retry_after_secs: 900,
        }
        .into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(response.headers()[header::RETRY_AFTER], "900");
        assert!(body(response).await.get("field").is_none());
    }

    #[tokio::test]
    async fn test_import_error_is_field_error() {
        let parse = serde_json::from_str::<u64>("nope").unwrap_err();
        let response = ApiError::from(AnalyticsError::Import(parse)).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body(response).await["field"], "data");

        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        assert!(matches!(ApiError::from(AnalyticsError::Io(io)), ApiError::Internal));
    }

    #[tokio::test]
    async fn test_payload_too_large_status() {
        let response = ApiError::PayloadTooLarge.into_response();
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(body(response).await["error"], "Request body too large");
    }
}

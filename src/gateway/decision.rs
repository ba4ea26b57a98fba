//! Structured rejections produced by the gateway.
//!
//! A rejection is a normal outcome, not an error: it carries a machine-readable
//! reason and, where waiting helps, a retry hint.

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::security::Challenge;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectionReason {
    Blocked,
    RapidRequests,
    RateLimited,
    BadBot,
    Honeypot,
    ChallengeRequired,
    ChallengeFailed,
}

impl RejectionReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            RejectionReason::Blocked => "blocked",
            RejectionReason::RapidRequests => "rapid_requests",
            RejectionReason::RateLimited => "rate_limited",
            RejectionReason::BadBot => "bad_bot",
            RejectionReason::Honeypot => "honeypot",
            RejectionReason::ChallengeRequired => "challenge_required",
            RejectionReason::ChallengeFailed => "challenge_failed",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            RejectionReason::RapidRequests | RejectionReason::RateLimited => {
                StatusCode::TOO_MANY_REQUESTS
            }
            _ => StatusCode::FORBIDDEN,
        }
    }

    fn message(&self) -> &'static str {
        match self {
            RejectionReason::Blocked => "Access denied",
            RejectionReason::RapidRequests => "Too many requests in a short period",
            RejectionReason::RateLimited => "Too many requests, please try again later",
            RejectionReason::BadBot => "Automated access is not allowed",
            RejectionReason::Honeypot => "Request rejected",
            RejectionReason::ChallengeRequired => "Human verification required",
            RejectionReason::ChallengeFailed => "Verification failed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectionDecision {
    pub reason: RejectionReason,
    pub retry_after_secs: Option<u64>,
    /// Fresh challenge for the client to answer before retrying.
    pub challenge: Option<Challenge>,
}

impl RejectionDecision {
    pub fn new(reason: RejectionReason) -> Self {
        Self {
            reason,
            retry_after_secs: None,
            challenge: None,
        }
    }

    pub fn retry_after(mut self, secs: u64) -> Self {
        self.retry_after_secs = Some(secs);
        self
    }

    pub fn with_challenge(mut self, challenge: Challenge) -> Self {
        self.challenge = Some(challenge);
        self
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RejectionBody {
    success: bool,
    error: &'static str,
    reason: RejectionReason,
    #[serde(skip_serializing_if = "Option::is_none")]
    retry_after: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    challenge: Option<Challenge>,
}

impl IntoResponse for RejectionDecision {
    fn into_response(self) -> Response {
        let status = self.reason.status();
        let retry_after = self.retry_after_secs;
        let body = RejectionBody {
            success: false,
            error: self.reason.message(),
            reason: self.reason,
            retry_after,
            challenge: self.challenge,
        };

        let mut response = (status, Json(body)).into_response();
        if let Some(secs) = retry_after {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(secs));
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_rate_limited_response_shape() {
        let response = RejectionDecision::new(RejectionReason::RateLimited)
            .retry_after(300)
            .into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()[header::RETRY_AFTER], "300");

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["success"], false);
        assert_eq!(body["reason"], "rate_limited");
        assert_eq!(body["retryAfter"], 300);
        assert!(body.get("challenge").is_none());
    }

    #[test]
    fn test_statuses() {
        assert_eq!(RejectionReason::Blocked.status(), StatusCode::FORBIDDEN);
        assert_eq!(RejectionReason::BadBot.status(), StatusCode::FORBIDDEN);
        assert_eq!(
            RejectionReason::RapidRequests.status(),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(RejectionReason::ChallengeFailed.as_str(), "challenge_failed");
    }
}

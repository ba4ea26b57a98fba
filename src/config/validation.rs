//! Configuration validation.
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: TrustConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::fmt;
use std::net::SocketAddr;

use axum::http::HeaderValue;

use crate::config::schema::TrustConfig;

/// Minimum length for an explicitly configured session secret.
pub const MIN_SECRET_LEN: usize = 16;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

pub fn validate_config(config: &TrustConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.server.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "server.bind_address",
            format!("{:?} is not a socket address", config.server.bind_address),
        ));
    }
    if config.server.request_timeout_secs == 0 {
        errors.push(ValidationError::new("server.request_timeout_secs", "must be > 0"));
    }
    if config.server.cors_origin != "*"
        && HeaderValue::from_str(&config.server.cors_origin).is_err()
    {
        errors.push(ValidationError::new(
            "server.cors_origin",
            "must be `*` or a valid origin",
        ));
    }

    let limits = &config.rate_limit;
    if limits.window_ms == 0 {
        errors.push(ValidationError::new("rate_limit.window_ms", "must be > 0"));
    }
    if limits.max_requests == 0 {
        errors.push(ValidationError::new("rate_limit.max_requests", "must be > 0"));
    }
    if limits.action_max_requests == 0 {
        errors.push(ValidationError::new("rate_limit.action_max_requests", "must be > 0"));
    }
    if limits.block_duration_ms < limits.window_ms {
        errors.push(ValidationError::new(
            "rate_limit.block_duration_ms",
            "must not be shorter than the window",
        ));
    }

    if config.rapid.threshold == 0 || config.rapid.window_ms == 0 {
        errors.push(ValidationError::new("rapid", "threshold and window_ms must be > 0"));
    }
    if config.audit.capacity == 0 {
        errors.push(ValidationError::new("audit.capacity", "must be > 0"));
    }
    if config.audit.channel_capacity == 0 {
        errors.push(ValidationError::new("audit.channel_capacity", "must be > 0"));
    }
    if config.analytics.retention_days == 0 {
        errors.push(ValidationError::new("analytics.retention_days", "must be > 0"));
    }
    if config.analytics.write_attempts == 0 {
        errors.push(ValidationError::new("analytics.write_attempts", "must be > 0"));
    }

    let secret = &config.admin.session_secret;
    if !secret.is_empty() && secret.len() < MIN_SECRET_LEN {
        errors.push(ValidationError::new(
            "admin.session_secret",
            format!("must be at least {} characters", MIN_SECRET_LEN),
        ));
    }
    if config.admin.max_login_attempts == 0 {
        errors.push(ValidationError::new("admin.max_login_attempts", "must be > 0"));
    }
    if config.security.human_threshold > 100 {
        errors.push(ValidationError::new("security.human_threshold", "must be within 0..=100"));
    }
    if config.sweep_interval_secs == 0 {
        errors.push(ValidationError::new("sweep_interval_secs", "must be > 0"));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(validate_config(&TrustConfig::default()).is_ok());
    }

    #[test]
    fn test_collects_every_error() {
        let mut config = TrustConfig::default();
        config.server.bind_address = "nowhere".into();
        config.rate_limit.max_requests = 0;
        config.admin.session_secret = "short".into();

        let errors = validate_config(&config).unwrap_err();
        let fields: Vec<_> = errors.iter().map(|e| e.field).collect();
        assert_eq!(
            fields,
            vec!["server.bind_address", "rate_limit.max_requests", "admin.session_secret"]
        );
    }

    #[test]
    fn test_block_shorter_than_window_rejected() {
        let mut config = TrustConfig::default();
        config.rate_limit.block_duration_ms = 1_000;
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors[0].field, "rate_limit.block_duration_ms");
    }
}

//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration for the trust gateway.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TrustConfig {
    /// Listener and HTTP hosting settings.
    pub server: ServerConfig,

    /// Sliding window limiter settings.
    pub rate_limit: RateLimitConfig,

    /// Rapid-request IP defense layered in front of the limiter.
    pub rapid: RapidConfig,

    /// Request audit log settings.
    pub audit: AuditConfig,

    /// Analytics store settings.
    pub analytics: AnalyticsConfig,

    /// Admin credential and session settings.
    pub admin: AdminConfig,

    /// Request size and human verification settings.
    pub security: SecurityConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Directory holding every persisted file with a relative path.
    pub data_dir: PathBuf,

    /// Interval between expiry sweeps in seconds.
    pub sweep_interval_secs: u64,
}

impl Default for TrustConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            rate_limit: RateLimitConfig::default(),
            rapid: RapidConfig::default(),
            audit: AuditConfig::default(),
            analytics: AnalyticsConfig::default(),
            admin: AdminConfig::default(),
            security: SecurityConfig::default(),
            observability: ObservabilityConfig::default(),
            data_dir: PathBuf::from("data"),
            sweep_interval_secs: 60,
        }
    }
}

impl TrustConfig {
    /// Resolve a configured file path against `data_dir`.
    pub fn data_path(&self, file: &str) -> PathBuf {
        let path = PathBuf::from(file);
        if path.is_absolute() {
            path
        } else {
            self.data_dir.join(path)
        }
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0:3001").
    pub bind_address: String,

    /// Take the client IP from `X-Forwarded-For` (behind a reverse proxy).
    pub trust_proxy: bool,

    /// Request timeout in seconds.
    pub request_timeout_secs: u64,

    /// Allowed CORS origin, `*` for any.
    pub cors_origin: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:3001".to_string(),
            trust_proxy: false,
            request_timeout_secs: 30,
            cors_origin: "*".to_string(),
        }
    }
}

/// What the limiter answers when its counter table cannot be used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    #[default]
    Open,
    Closed,
}

/// Sliding window rate limiting configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Window length in milliseconds.
    pub window_ms: u64,

    /// Requests per window per client on the HTTP layer.
    pub max_requests: u32,

    /// Requests per window per client for sensitive bulk actions.
    pub action_max_requests: u32,

    /// Punitive cooldown after a window violation, in milliseconds.
    pub block_duration_ms: u64,

    pub failure_policy: FailurePolicy,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            window_ms: 60_000,
            max_requests: 100,
            action_max_requests: 30,
            block_duration_ms: 300_000,
            failure_policy: FailurePolicy::Open,
        }
    }
}

/// Rapid-request detection configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RapidConfig {
    /// Requests tolerated inside one rapid window.
    pub threshold: u32,

    /// Rapid window length in milliseconds.
    pub window_ms: u64,

    /// How long an offending IP is blocked, in milliseconds.
    pub block_duration_ms: u64,
}

impl Default for RapidConfig {
    fn default() -> Self {
        Self {
            threshold: 20,
            window_ms: 10_000,
            block_duration_ms: 300_000,
        }
    }
}

/// Request audit log configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AuditConfig {
    /// Ring buffer capacity.
    pub capacity: usize,

    /// Append-only request log, one JSON record per line.
    pub log_file: String,

    /// Pending appends held before new ones are dropped.
    pub channel_capacity: usize,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            capacity: 10_000,
            log_file: "requests.log".to_string(),
            channel_capacity: 1024,
        }
    }
}

/// Analytics store configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AnalyticsConfig {
    pub data_file: String,

    /// Dated buckets kept by the retention sweep.
    pub retention_days: usize,

    /// Length of the tool ranking in snapshots.
    pub top_tools: usize,

    /// Attempts per save before the error is surfaced.
    pub write_attempts: u32,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            data_file: "analytics.json".to_string(),
            retention_days: 30,
            top_tools: 10,
            write_attempts: 3,
        }
    }
}

/// Admin authentication configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Initial password, used only when no credential file exists yet.
    pub password: String,

    /// HMAC secret for session tokens. Empty means a random per-process secret.
    pub session_secret: String,

    pub credential_file: String,

    pub session_ttl_secs: u64,

    /// Consecutive failed logins before lockout.
    pub max_login_attempts: u32,

    pub lockout_secs: u64,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            password: String::new(),
            session_secret: String::new(),
            credential_file: "admin.json".to_string(),
            session_ttl_secs: 24 * 3600,
            max_login_attempts: 5,
            lockout_secs: 15 * 60,
        }
    }
}

/// Security hardening configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Maximum body size in bytes.
    pub max_file_size: usize,

    /// Humanness score at or above which no challenge is demanded.
    pub human_threshold: u32,

    pub challenge_ttl_secs: u64,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            max_file_size: 50 * 1024 * 1024, // 50MB
            human_threshold: 35,
            challenge_ttl_secs: 300,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    pub log_format: LogFormat,

    /// Enable the Prometheus exporter.
    pub metrics_enabled: bool,

    /// Prometheus scrape address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9091".to_string(),
        }
    }
}

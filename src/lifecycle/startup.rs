//! Startup orchestration.
//!
//! # Design Decisions
//! - Only an unusable data directory (or credential store) is fatal
//! - Services are built once here and shared through [`AppState`]
//! - The audit ring is reseeded from the tail of the durable log

use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::admin::{AdminAuth, AuthError};
use crate::analytics::AnalyticsStore;
use crate::audit::{writer, AuditWriter, RequestAuditLog};
use crate::clock::SharedClock;
use crate::config::{ConfigError, TrustConfig};
use crate::gateway::{ActionGuard, SecurityGateway};
use crate::http::server::AppState;
use crate::observability::metrics;
use crate::security::{
    BotSignatureClassifier, ChallengeStore, IpBlockRegistry, RapidRequestDetector,
    SlidingWindowLimiter,
};

#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("cannot create data directory {path:?}: {source}")]
    DataDir { path: PathBuf, source: io::Error },
    #[error("cannot open admin credentials: {0}")]
    Auth(#[from] AuthError),
    #[error("cannot bind {address}: {source}")]
    Bind { address: String, source: io::Error },
}

/// Build every service. Must run inside a Tokio runtime (spawns the audit writer).
pub async fn build_state(config: TrustConfig, clock: SharedClock) -> Result<AppState, StartupError> {
    tokio::fs::create_dir_all(&config.data_dir)
        .await
        .map_err(|source| StartupError::DataDir {
            path: config.data_dir.clone(),
            source,
        })?;

    let classifier = Arc::new(BotSignatureClassifier::new().with_bad_bot_hook(|meta, verdict| {
        metrics::record_bad_bot();
        tracing::warn!(
            path = %meta.path,
            user_agent = %meta.user_agent,
            score = verdict.suspicious_score,
            "Bad bot detected"
        );
    }));

    let log_path = config.data_path(&config.audit.log_file);
    let sink = AuditWriter::spawn(log_path.clone(), config.audit.channel_capacity);
    let audit = Arc::new(RequestAuditLog::new(
        config.audit.capacity,
        classifier.clone(),
        Some(sink),
        clock.clone(),
    ));
    match writer::read_tail(&log_path, config.audit.capacity) {
        Ok(entries) => {
            if !entries.is_empty() {
                tracing::info!(restored = entries.len(), "Audit log restored");
            }
            audit.restore(entries);
        }
        Err(e) => tracing::warn!(path = ?log_path, error = %e, "Could not read audit log tail"),
    }

    let gateway = Arc::new(SecurityGateway::new(
        Arc::new(IpBlockRegistry::new(clock.clone())),
        Arc::new(RapidRequestDetector::new(&config.rapid, clock.clone())),
        Arc::new(SlidingWindowLimiter::for_requests(&config.rate_limit, clock.clone())),
        classifier,
        audit,
        config.rapid.block_duration_ms,
        clock.clone(),
    ));

    let actions = Arc::new(ActionGuard::new(
        SlidingWindowLimiter::for_actions(&config.rate_limit, clock.clone()),
        Arc::new(ChallengeStore::new(
            Duration::from_secs(config.security.challenge_ttl_secs),
            clock.clone(),
        )),
        config.security.human_threshold,
    ));

    let analytics = Arc::new(AnalyticsStore::new(
        config.data_path(&config.analytics.data_file),
        &config.analytics,
        clock.clone(),
    ));

    let auth = Arc::new(
        AdminAuth::open(
            &config.admin,
            config.data_path(&config.admin.credential_file),
            clock.clone(),
        )
        .await?,
    );

    Ok(AppState {
        config: Arc::new(config),
        gateway,
        actions,
        analytics,
        auth,
        clock,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    #[tokio::test]
    async fn test_data_dir_failure_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, b"x").unwrap();

        let config = TrustConfig {
            data_dir: blocker.join("data"),
            ..TrustConfig::default()
        };
        let result = build_state(config, Arc::new(ManualClock::new(0))).await;
        assert!(matches!(result, Err(StartupError::DataDir { .. })));
    }

    #[tokio::test]
    async fn test_builds_in_fresh_directory() {
        let dir = tempfile::tempdir().unwrap();
        let config = TrustConfig {
            data_dir: dir.path().join("data"),
            ..TrustConfig::default()
        };
        let state = build_state(config, Arc::new(ManualClock::new(0))).await.unwrap();
        assert!(state.gateway.audit().is_empty());
        assert!(dir.path().join("data").is_dir());
    }
}

//! File-backed analytics aggregator.
//!
//! Every mutation is a full read-modify-write of one JSON document, serialized
//! by a single async mutex. Saves go to a temporary file that is renamed over
//! the original, so readers never observe a partial document.

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tokio::sync::Mutex;

use crate::analytics::event::AnalyticsEvent;
use crate::analytics::model::GlobalAnalytics;
use crate::analytics::snapshot::AnalyticsSnapshot;
use crate::clock::SharedClock;
use crate::config::AnalyticsConfig;
use crate::observability::metrics;
use crate::resilience::retry_delay;

const RETRY_BASE_MS: u64 = 50;
const RETRY_MAX_MS: u64 = 1_000;

#[derive(Debug, Error)]
pub enum AnalyticsError {
    #[error("analytics storage error: {0}")]
    Io(#[from] io::Error),
    #[error("analytics serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
    /// An imported document did not decode as an analytics export.
    #[error("not an analytics export: {0}")]
    Import(serde_json::Error),
}

pub struct AnalyticsStore {
    path: PathBuf,
    write_lock: Mutex<()>,
    retention_days: usize,
    top_tools: usize,
    write_attempts: u32,
    clock: SharedClock,
}

impl AnalyticsStore {
    pub fn new(path: PathBuf, config: &AnalyticsConfig, clock: SharedClock) -> Self {
        Self {
            path,
            write_lock: Mutex::new(()),
            retention_days: config.retention_days,
            top_tools: config.top_tools,
            write_attempts: config.write_attempts.max(1),
            clock,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn ingest(&self, event: AnalyticsEvent) -> Result<(), AnalyticsError> {
        let _guard = self.write_lock.lock().await;
        let mut data = self.load().await?;
        data.apply(&event, self.clock.today());
        self.save(&data).await?;

        metrics::record_analytics_event(event.name());
        tracing::debug!(event = event.name(), "Analytics event ingested");
        Ok(())
    }

    pub async fn snapshot(&self) -> Result<AnalyticsSnapshot, AnalyticsError> {
        let data = self.load().await?;
        Ok(AnalyticsSnapshot::build(&data, self.clock.today(), self.top_tools))
    }

    pub async fn export_all(&self) -> Result<GlobalAnalytics, AnalyticsError> {
        self.load().await
    }

    /// Replace the whole document.
    pub async fn import_all(&self, data: GlobalAnalytics) -> Result<(), AnalyticsError> {
        let _guard = self.write_lock.lock().await;
        self.save(&data).await?;
        tracing::info!(
            days = data.daily_stats.len(),
            visitors = data.unique_visitors.len(),
            "Analytics imported"
        );
        Ok(())
    }

    /// Decode an exported document straight from its bytes and install it.
    /// Returns the number of dated buckets imported.
    pub async fn import_json(&self, bytes: &[u8]) -> Result<usize, AnalyticsError> {
        let data: GlobalAnalytics = serde_json::from_slice(bytes).map_err(AnalyticsError::Import)?;
        let days = data.daily_stats.len();
        self.import_all(data).await?;
        Ok(days)
    }

    pub async fn clear(&self) -> Result<(), AnalyticsError> {
        let _guard = self.write_lock.lock().await;
        self.save(&GlobalAnalytics::new(self.clock.now())).await?;
        tracing::info!("Analytics cleared");
        Ok(())
    }

    /// Drop the oldest dated buckets beyond the retention horizon.
    pub async fn prune_retention(&self) -> Result<usize, AnalyticsError> {
        let _guard = self.write_lock.lock().await;
        let mut data = self.load().await?;
        let removed = data.prune(self.retention_days);
        if removed > 0 {
            self.save(&data).await?;
            tracing::info!(removed, kept = data.daily_stats.len(), "Analytics retention applied");
        }
        Ok(removed)
    }

    /// Read the document. A missing file is a fresh store; a corrupted one is reset.
    async fn load(&self) -> Result<GlobalAnalytics, AnalyticsError> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Ok(GlobalAnalytics::new(self.clock.now()))
            }
            Err(e) => return Err(e.into()),
        };

        match serde_json::from_slice(&bytes) {
            Ok(data) => Ok(data),
            Err(e) => {
                tracing::warn!(
                    path = ?self.path,
                    error = %e,
                    "Analytics file corrupted, starting from an empty store"
                );
                Ok(GlobalAnalytics::new(self.clock.now()))
            }
        }
    }

    async fn save(&self, data: &GlobalAnalytics) -> Result<(), AnalyticsError> {
        let bytes = serde_json::to_vec_pretty(data)?;
        let mut attempt = 1;
        loop {
            match self.write_atomic(&bytes).await {
                Ok(()) => return Ok(()),
                Err(e) if attempt < self.write_attempts => {
                    let delay = retry_delay(attempt, RETRY_BASE_MS, RETRY_MAX_MS);
                    tracing::warn!(
                        path = ?self.path,
                        attempt,
                        delay = ?delay,
                        error = %e,
                        "Analytics write failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    tracing::error!(path = ?self.path, attempt, error = %e, "Analytics write failed");
                    return Err(e.into());
                }
            }
        }
    }

    async fn write_atomic(&self, bytes: &[u8]) -> io::Result<()> {
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, &self.path).await
    }
}

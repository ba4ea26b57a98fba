//! Bounded in-memory request log with a durable twin.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use tokio::sync::mpsc::error::TrySendError;

use crate::audit::entry::LogEntry;
use crate::audit::stats::{self, RequestStats, ThreatReport};
use crate::audit::writer::AuditSink;
use crate::clock::SharedClock;
use crate::observability::metrics;
use crate::security::{BotSignatureClassifier, SuspiciousPatterns, ThreatCategory};

/// Records examined by the security status check.
pub const STATUS_WINDOW: usize = 20;
/// More rejections than this inside the status window raise a warning.
pub const STATUS_REJECTION_LIMIT: usize = 5;
/// Records examined by the threat report.
pub const THREAT_WINDOW: usize = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SecurityLevel {
    Secure,
    Warning,
}

/// A buffered record and whether it matched any attack pattern when recorded.
struct Recorded {
    entry: LogEntry,
    suspicious: bool,
}

pub struct RequestAuditLog {
    entries: Mutex<VecDeque<Recorded>>,
    capacity: usize,
    patterns: SuspiciousPatterns,
    classifier: Arc<BotSignatureClassifier>,
    sink: Option<AuditSink>,
    clock: SharedClock,
}

impl RequestAuditLog {
    pub fn new(
        capacity: usize,
        classifier: Arc<BotSignatureClassifier>,
        sink: Option<AuditSink>,
        clock: SharedClock,
    ) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: Mutex::new(VecDeque::with_capacity(capacity.min(1024))),
            capacity,
            patterns: SuspiciousPatterns::new(),
            classifier,
            sink,
            clock,
        }
    }

    /// Seed the ring buffer, e.g. with the tail of the durable log after a restart.
    pub fn restore(&self, entries: Vec<LogEntry>) {
        let scanned: Vec<Recorded> = entries
            .into_iter()
            .map(|entry| Recorded {
                suspicious: !self.scan(&entry).is_empty(),
                entry,
            })
            .collect();
        let mut ring = self.lock();
        for recorded in scanned {
            push_bounded(&mut ring, recorded, self.capacity);
        }
    }

    /// Store a finished request. Returns the threat categories it matched.
    pub fn record(&self, entry: LogEntry) -> Vec<ThreatCategory> {
        let threats = self.scan(&entry);
        if !threats.is_empty() {
            for category in &threats {
                metrics::record_suspicious(category.as_str());
            }
            tracing::warn!(
                ip = %entry.ip,
                method = %entry.method,
                path = %entry.path,
                user_agent = %entry.user_agent,
                request_id = %entry.request_id,
                threats = ?threats,
                "Suspicious request detected"
            );
        }

        if let Some(sink) = &self.sink {
            match sink.try_send(entry.clone()) {
                Ok(()) => {}
                Err(TrySendError::Full(dropped)) => {
                    metrics::record_audit_dropped();
                    tracing::warn!(request_id = %dropped.request_id, "Audit channel full, record not persisted");
                }
                Err(TrySendError::Closed(dropped)) => {
                    metrics::record_audit_dropped();
                    tracing::warn!(request_id = %dropped.request_id, "Audit writer gone, record not persisted");
                }
            }
        }

        let recorded = Recorded {
            entry,
            suspicious: !threats.is_empty(),
        };
        push_bounded(&mut self.lock(), recorded, self.capacity);
        threats
    }

    /// Most recent first.
    pub fn recent(&self, limit: usize) -> Vec<LogEntry> {
        self.lock()
            .iter()
            .rev()
            .take(limit)
            .map(|r| r.entry.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn stats(&self) -> RequestStats {
        let now = self.clock.now_ms();
        let entries: Vec<LogEntry> = self.lock().iter().map(|r| r.entry.clone()).collect();
        stats::request_stats(&entries, now)
    }

    pub fn threats(&self) -> ThreatReport {
        let recent = self.recent(THREAT_WINDOW);
        stats::threat_report(&recent, &self.patterns, &self.classifier)
    }

    /// Buffered records matching at least one attack pattern.
    pub fn suspicious_count(&self) -> u64 {
        self.lock().iter().filter(|r| r.suspicious).count() as u64
    }

    pub fn security_level(&self) -> SecurityLevel {
        let ring = self.lock();
        let rejected = ring
            .iter()
            .rev()
            .take(STATUS_WINDOW)
            .filter(|r| r.entry.is_rejection())
            .count();
        if rejected > STATUS_REJECTION_LIMIT {
            SecurityLevel::Warning
        } else {
            SecurityLevel::Secure
        }
    }

    fn scan(&self, entry: &LogEntry) -> Vec<ThreatCategory> {
        self.patterns
            .scan(&entry.path, &entry.serialized_query(), &entry.user_agent)
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<Recorded>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn push_bounded(ring: &mut VecDeque<Recorded>, recorded: Recorded, capacity: usize) {
    while ring.len() >= capacity {
        ring.pop_front();
    }
    ring.push_back(recorded);
}

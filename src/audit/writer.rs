//! Durable append-only request log.
//!
//! # Design Decisions
//! - Appends leave the request path through a bounded channel
//! - A full channel or failed write is logged and the record dropped; no retries
//! - The file handle is reopened after any write error

use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};

use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;

use crate::audit::entry::LogEntry;
use crate::observability::metrics;

/// Producer side handed to the audit log.
pub type AuditSink = mpsc::Sender<LogEntry>;

/// Background task owning the log file.
pub struct AuditWriter {
    path: PathBuf,
    rx: mpsc::Receiver<LogEntry>,
    file: Option<File>,
}

impl AuditWriter {
    pub fn new(path: PathBuf, capacity: usize) -> (Self, AuditSink) {
        let (tx, rx) = mpsc::channel(capacity);
        (
            Self {
                path,
                rx,
                file: None,
            },
            tx,
        )
    }

    /// Spawn the writer on the current runtime. It stops once every sink is dropped.
    pub fn spawn(path: PathBuf, capacity: usize) -> AuditSink {
        let (writer, sink) = Self::new(path, capacity);
        tokio::spawn(writer.run());
        sink
    }

    pub async fn run(mut self) {
        tracing::debug!(path = ?self.path, "Audit writer started");
        while let Some(entry) = self.rx.recv().await {
            if let Err(e) = self.append(&entry).await {
                self.file = None;
                metrics::record_audit_dropped();
                tracing::warn!(
                    path = ?self.path,
                    request_id = %entry.request_id,
                    error = %e,
                    "Failed to append audit record"
                );
            }
        }
        tracing::debug!("Audit writer stopped");
    }

    async fn append(&mut self, entry: &LogEntry) -> io::Result<()> {
        let mut line = serde_json::to_vec(entry)?;
        line.push(b'\n');

        if self.file.is_none() {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&self.path)
                .await?;
            self.file = Some(file);
        }
        match self.file.as_mut() {
            Some(file) => {
                file.write_all(&line).await?;
                file.flush().await
            }
            None => Ok(()),
        }
    }
}

/// Read the newest `limit` records back from a log file.
///
/// Malformed lines are skipped. A missing file yields nothing.
pub fn read_tail(path: &Path, limit: usize) -> io::Result<Vec<LogEntry>> {
    let file = match std::fs::File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e),
    };

    let mut tail = std::collections::VecDeque::with_capacity(limit.min(1024));
    let mut skipped = 0usize;
    for line in BufReader::new(file).lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<LogEntry>(&line) {
            Ok(entry) => {
                if tail.len() == limit {
                    tail.pop_front();
                }
                tail.push_back(entry);
            }
            Err(_) => skipped += 1,
        }
    }
    if skipped > 0 {
        tracing::warn!(path = ?path, skipped, "Skipped malformed audit records");
    }
    Ok(tail.into_iter().collect())
}

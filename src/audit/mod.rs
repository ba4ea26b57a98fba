//! Request audit subsystem.
//!
//! # Data Flow
//! ```text
//! finished request (status + response time known)
//!     → log.rs (pattern scan, ring buffer push)
//!     → writer.rs (channel → append-only file, off the request path)
//!
//! queries:
//!     → log.rs recent / security level
//!     → stats.rs (hourly/daily aggregates, threat report) computed on demand
//! ```
//!
//! # Design Decisions
//! - Ring buffer and file are independent copies; the file is never read on the hot path
//! - Durable appends are best-effort and never surface to the client

pub mod entry;
pub mod log;
pub mod stats;
pub mod writer;

pub use entry::LogEntry;
pub use log::{RequestAuditLog, SecurityLevel};
pub use stats::{RequestStats, ThreatReport};
pub use writer::{AuditSink, AuditWriter};

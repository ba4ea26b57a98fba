//! The audit record of one finished request.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Immutable once written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub method: String,
    pub path: String,
    #[serde(default)]
    pub query: BTreeMap<String, String>,
    pub ip: String,
    #[serde(default)]
    pub user_agent: String,
    #[serde(default)]
    pub referer: Option<String>,
    pub request_id: String,
    pub status_code: u16,
    pub response_time_ms: u64,
    #[serde(default)]
    pub content_length: Option<u64>,
}

impl LogEntry {
    /// Decode a raw query string into key/value pairs. Later keys win.
    pub fn parse_query(raw: Option<&str>) -> BTreeMap<String, String> {
        raw.map(|q| url::form_urlencoded::parse(q.as_bytes()).into_owned().collect())
            .unwrap_or_default()
    }

    /// The query as it is fed to the pattern matcher.
    pub fn serialized_query(&self) -> String {
        if self.query.is_empty() {
            return String::new();
        }
        serde_json::to_string(&self.query).unwrap_or_default()
    }

    pub fn timestamp_ms(&self) -> u64 {
        self.timestamp.timestamp_millis().max(0) as u64
    }

    pub fn is_rejection(&self) -> bool {
        matches!(self.status_code, 403 | 429)
    }
}

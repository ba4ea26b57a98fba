//! Application-level analytics events.

use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

const MAX_LABEL_LEN: usize = 200;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnalyticsEvent {
    PageView { page: String },
    ToolUse { tool: String },
    FileProcessed { size: u64 },
    Error { message: Option<String> },
    SessionStart { visitor_id: String },
}

impl AnalyticsEvent {
    pub fn name(&self) -> &'static str {
        match self {
            AnalyticsEvent::PageView { .. } => "pageview",
            AnalyticsEvent::ToolUse { .. } => "tool_use",
            AnalyticsEvent::FileProcessed { .. } => "file_processed",
            AnalyticsEvent::Error { .. } => "error",
            AnalyticsEvent::SessionStart { .. } => "session_start",
        }
    }
}

/// Body of the public tracking endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct TrackRequest {
    pub event: String,
    #[serde(default)]
    pub data: Value,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct EventError {
    pub field: &'static str,
    pub message: String,
}

impl EventError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl TrackRequest {
    /// Validate the payload. `visitor_id` keys session starts.
    pub fn into_event(self, visitor_id: &str) -> Result<AnalyticsEvent, EventError> {
        match self.event.as_str() {
            "pageview" => Ok(AnalyticsEvent::PageView {
                page: label(&self.data, "page")?,
            }),
            "tool_use" => Ok(AnalyticsEvent::ToolUse {
                tool: label(&self.data, "tool")?,
            }),
            "file_processed" => {
                let size = self
                    .data
                    .get("size")
                    .and_then(Value::as_u64)
                    .ok_or_else(|| EventError::new("data.size", "must be a non-negative integer"))?;
                Ok(AnalyticsEvent::FileProcessed { size })
            }
            "error" => Ok(AnalyticsEvent::Error {
                message: self
                    .data
                    .get("message")
                    .and_then(Value::as_str)
                    .map(|m| m.chars().take(MAX_LABEL_LEN).collect()),
            }),
            "session_start" => {
                if visitor_id.is_empty() {
                    return Err(EventError::new("visitorId", "is required"));
                }
                Ok(AnalyticsEvent::SessionStart {
                    visitor_id: visitor_id.chars().take(MAX_LABEL_LEN).collect(),
                })
            }
            other => Err(EventError::new("event", format!("unknown event {:?}", other))),
        }
    }
}

fn label(data: &Value, key: &'static str) -> Result<String, EventError> {
    let field = match key {
        "page" => "data.page",
        _ => "data.tool",
    };
    let value = data
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| EventError::new(field, "is required"))?;
    if value.len() > MAX_LABEL_LEN {
        return Err(EventError::new(field, format!("longer than {} bytes", MAX_LABEL_LEN)));
    }
    Ok(value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request(event: &str, data: Value) -> TrackRequest {
        TrackRequest {
            event: event.into(),
            data,
        }
    }

    #[test]
    fn test_parses_each_event() {
        assert_eq!(
            request("tool_use", json!({"tool": "merge"})).into_event("v"),
            Ok(AnalyticsEvent::ToolUse { tool: "merge".into() })
        );
        assert_eq!(
            request("pageview", json!({"page": "/compress"})).into_event("v"),
            Ok(AnalyticsEvent::PageView { page: "/compress".into() })
        );
        assert_eq!(
            request("file_processed", json!({"size": 1024})).into_event("v"),
            Ok(AnalyticsEvent::FileProcessed { size: 1024 })
        );
        assert_eq!(
            request("error", Value::Null).into_event("v"),
            Ok(AnalyticsEvent::Error { message: None })
        );
        assert_eq!(
            request("session_start", json!({})).into_event("visitor-1"),
            Ok(AnalyticsEvent::SessionStart { visitor_id: "visitor-1".into() })
        );
    }

    #[test]
    fn test_field_level_errors() {
        let err = request("tool_use", json!({})).into_event("v").unwrap_err();
        assert_eq!(err.field, "data.tool");
        let err = request("file_processed", json!({"size": -1})).into_event("v").unwrap_err();
        assert_eq!(err.field, "data.size");
        let err = request("launch", json!({})).into_event("v").unwrap_err();
        assert_eq!(err.field, "event");
        let err = request("session_start", json!({})).into_event("").unwrap_err();
        assert_eq!(err.field, "visitorId");
    }
}

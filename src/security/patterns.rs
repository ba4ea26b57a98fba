//! Suspicious request pattern library.
//!
//! Matches attack signatures against the concatenation of path, serialized
//! query and user-agent. A match is a signal for logging and threat reports;
//! it never blocks by itself.

use regex::{Regex, RegexBuilder};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ThreatCategory {
    PathTraversal,
    XssAttempt,
    SqlInjection,
    CodeInjection,
    Probe,
}

impl ThreatCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ThreatCategory::PathTraversal => "path_traversal",
            ThreatCategory::XssAttempt => "xss_attempt",
            ThreatCategory::SqlInjection => "sql_injection",
            ThreatCategory::CodeInjection => "code_injection",
            ThreatCategory::Probe => "probe",
        }
    }
}

const PATTERNS: &[(ThreatCategory, &str)] = &[
    (ThreatCategory::PathTraversal, r"\.\./|\.\.\\|%2e%2e(%2f|/)"),
    (ThreatCategory::XssAttempt, r"<script|javascript:"),
    (ThreatCategory::SqlInjection, r"union(\s|\+|%20)+.*select|'?\s*or\s+1\s*=\s*1"),
    (ThreatCategory::CodeInjection, r"eval\("),
    (ThreatCategory::Probe, r"wp-admin|phpmyadmin|\.php\b|\.exe\b"),
];

pub struct SuspiciousPatterns {
    rules: Vec<(ThreatCategory, Regex)>,
}

impl SuspiciousPatterns {
    pub fn new() -> Self {
        let rules = PATTERNS
            .iter()
            .map(|(category, pattern)| {
                let regex = RegexBuilder::new(pattern)
                    .case_insensitive(true)
                    .build()
                    .expect("threat pattern is valid");
                (*category, regex)
            })
            .collect();
        Self { rules }
    }

    /// Every category matching `path + query + user_agent`.
    pub fn scan(&self, path: &str, query: &str, user_agent: &str) -> Vec<ThreatCategory> {
        let haystack = format!("{}{}{}", path, query, user_agent);
        self.rules
            .iter()
            .filter(|(_, regex)| regex.is_match(&haystack))
            .map(|(category, _)| *category)
            .collect()
    }
}

impl Default for SuspiciousPatterns {
    fn default() -> Self {
        Self::new()
    }
}

//! Query-time aggregates over audit records.
//!
//! Nothing here is maintained incrementally: every figure is recomputed from
//! the records handed in, so eviction can never leave a counter stale.

use std::collections::{BTreeMap, HashMap, HashSet};

use serde::Serialize;

use crate::audit::entry::LogEntry;
use crate::security::{BotSignatureClassifier, SuspiciousPatterns, ThreatCategory};

const HOUR_MS: u64 = 60 * 60 * 1000;
const DAY_MS: u64 = 24 * HOUR_MS;
const TOP_N: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PathCount {
    pub path: String,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IpCount {
    pub ip: String,
    pub count: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestStats {
    pub total_requests: u64,
    pub last_hour: u64,
    pub last_day: u64,
    pub unique_ips: u64,
    pub top_paths: Vec<PathCount>,
    pub status_codes: BTreeMap<u16, u64>,
    pub avg_response_time_ms: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ThreatReport {
    pub path_traversal: u64,
    pub sql_injection: u64,
    pub xss_attempt: u64,
    pub code_injection: u64,
    pub probes: u64,
    pub brute_force: u64,
    pub bot_activity: u64,
    pub rate_limited: u64,
    pub analyzed: u64,
    pub top_ips: Vec<IpCount>,
}

pub fn request_stats<'a, I>(entries: I, now_ms: u64) -> RequestStats
where
    I: IntoIterator<Item = &'a LogEntry>,
{
    let mut stats = RequestStats::default();
    let mut paths: HashMap<&str, u64> = HashMap::new();
    let mut day_ips: HashSet<&str> = HashSet::new();
    let mut total_time = 0u64;

    for entry in entries {
        stats.total_requests += 1;
        let age = now_ms.saturating_sub(entry.timestamp_ms());
        if age < HOUR_MS {
            stats.last_hour += 1;
        }
        if age < DAY_MS {
            stats.last_day += 1;
            day_ips.insert(entry.ip.as_str());
        }
        *paths.entry(entry.path.as_str()).or_default() += 1;
        *stats.status_codes.entry(entry.status_code).or_default() += 1;
        total_time += entry.response_time_ms;
    }

    stats.unique_ips = day_ips.len() as u64;
    stats.top_paths = top_n(paths)
        .into_iter()
        .map(|(path, count)| PathCount {
            path: path.to_string(),
            count,
        })
        .collect();
    if stats.total_requests > 0 {
        let avg = total_time as f64 / stats.total_requests as f64;
        stats.avg_response_time_ms = (avg * 100.0).round() / 100.0;
    }
    stats
}

pub fn threat_report<'a, I>(
    entries: I,
    patterns: &SuspiciousPatterns,
    classifier: &BotSignatureClassifier,
) -> ThreatReport
where
    I: IntoIterator<Item = &'a LogEntry>,
{
    let mut report = ThreatReport::default();
    let mut by_ip: HashMap<&str, u64> = HashMap::new();

    for entry in entries {
        report.analyzed += 1;
        let matches = patterns.scan(&entry.path, &entry.serialized_query(), &entry.user_agent);
        for category in &matches {
            match category {
                ThreatCategory::PathTraversal => report.path_traversal += 1,
                ThreatCategory::SqlInjection => report.sql_injection += 1,
                ThreatCategory::XssAttempt => report.xss_attempt += 1,
                ThreatCategory::CodeInjection => report.code_injection += 1,
                ThreatCategory::Probe => report.probes += 1,
            }
        }
        if !matches.is_empty() {
            *by_ip.entry(entry.ip.as_str()).or_default() += 1;
        }
        if entry.status_code == 401 {
            report.brute_force += 1;
        }
        if entry.status_code == 429 {
            report.rate_limited += 1;
        }
        if classifier.is_known_bad(&entry.user_agent) {
            report.bot_activity += 1;
        }
    }

    report.top_ips = top_n(by_ip)
        .into_iter()
        .map(|(ip, count)| IpCount {
            ip: ip.to_string(),
            count,
        })
        .collect();
    report
}

/// Highest counts first, ties by key.
fn top_n(counts: HashMap<&str, u64>) -> Vec<(&str, u64)> {
    let mut ranked: Vec<_> = counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
    ranked.truncate(TOP_N);
    ranked
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::datetime_from_ms;

    const NOW: u64 = 1_700_000_000_000;

    fn entry(path: &str, ip: &str, status: u16, age_ms: u64, ms: u64) -> LogEntry {
        LogEntry {
            timestamp: datetime_from_ms(NOW - age_ms),
            method: "GET".into(),
            path: path.into(),
            query: Default::default(),
            ip: ip.into(),
            user_agent: "Mozilla/5.0 Gecko Firefox".into(),
            referer: None,
            request_id: "r".into(),
            status_code: status,
            response_time_ms: ms,
            content_length: None,
        }
    }

    #[test]
    fn test_windows_and_histogram() {
        let entries = vec![
            entry("/a", "1.1.1.1", 200, 1_000, 10),
            entry("/a", "2.2.2.2", 200, 2 * HOUR_MS, 20),
            entry("/b", "3.3.3.3", 404, 2 * DAY_MS, 30),
            entry("/a", "1.1.1.1", 429, 0, 0),
        ];
        let stats = request_stats(&entries, NOW);
        assert_eq!(stats.total_requests, 4);
        assert_eq!(stats.last_hour, 2);
        assert_eq!(stats.last_day, 3);
        assert_eq!(stats.unique_ips, 2);
        assert_eq!(stats.top_paths[0], PathCount { path: "/a".into(), count: 3 });
        assert_eq!(stats.status_codes.get(&200), Some(&2));
        assert_eq!(stats.status_codes.get(&429), Some(&1));
        assert_eq!(stats.avg_response_time_ms, 15.0);
    }

    #[test]
    fn test_empty_stats() {
        let stats = request_stats(std::iter::empty(), NOW);
        assert_eq!(stats, RequestStats::default());
    }

    #[test]
    fn test_top_paths_capped() {
        let entries: Vec<_> = (0..15)
            .map(|i| entry(&format!("/p{:02}", i), "1.1.1.1", 200, 0, 1))
            .collect();
        let stats = request_stats(&entries, NOW);
        assert_eq!(stats.top_paths.len(), 10);
        assert_eq!(stats.top_paths[0].path, "/p00");
    }

    #[test]
    fn test_threat_report() {
        let mut bot = entry("/", "9.9.9.9", 200, 0, 1);
        bot.user_agent = "python-requests/2.31".into();
        let entries = vec![
            entry("/../etc/passwd", "6.6.6.6", 404, 0, 1),
            entry("/wp-admin/index.php", "6.6.6.6", 404, 0, 1),
            entry("/api/auth/login", "7.7.7.7", 401, 0, 1),
            entry("/api/tools", "8.8.8.8", 429, 0, 1),
            bot,
        ];
        let report = threat_report(
            &entries,
            &SuspiciousPatterns::new(),
            &BotSignatureClassifier::new(),
        );
        assert_eq!(report.path_traversal, 1);
        assert_eq!(report.probes, 1);
        assert_eq!(report.brute_force, 1);
        assert_eq!(report.rate_limited, 1);
        assert_eq!(report.bot_activity, 1);
        assert_eq!(report.analyzed, 5);
        assert_eq!(report.top_ips, vec![IpCount { ip: "6.6.6.6".into(), count: 2 }]);
    }
}

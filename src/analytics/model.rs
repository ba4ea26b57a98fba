//! Persisted analytics document.
//!
//! ```text
//! {
//!   "created": "...",
//!   "dailyStats": { "2024-03-09": { "pageViews": 3, "tools": { "merge": 2 }, ... } },
//!   "toolUsage": { "merge": 2, "split": 1 },      // insertion ordered
//!   "sessions": 4,
//!   "totalPageViews": 3,
//!   "totalToolUses": 3,
//!   "uniqueVisitors": ["v1", "v2"]               // set, stored as an array
//! }
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::analytics::event::AnalyticsEvent;

/// Counters for one calendar day.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DailyStat {
    pub page_views: u64,
    pub tool_uses: u64,
    pub unique_visitors: u64,
    pub files_processed: u64,
    pub bytes_processed: u64,
    pub errors: u64,
    pub pages: BTreeMap<String, u64>,
    pub tools: BTreeMap<String, u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolCount {
    pub tool: String,
    pub count: u64,
}

/// Lifetime per-tool counters that remember first-use order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolCounts(Vec<(String, u64)>);

impl ToolCounts {
    pub fn increment(&mut self, tool: &str, by: u64) {
        match self.0.iter_mut().find(|(name, _)| name == tool) {
            Some((_, count)) => *count += by,
            None => self.0.push((tool.to_string(), by)),
        }
    }

    pub fn get(&self, tool: &str) -> u64 {
        self.0
            .iter()
            .find(|(name, _)| name == tool)
            .map(|(_, count)| *count)
            .unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Highest usage first; equal counts keep first-use order.
    pub fn ranked(&self, n: usize) -> Vec<ToolCount> {
        let mut ranked: Vec<_> = self.0.iter().collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1));
        ranked
            .into_iter()
            .take(n)
            .map(|(tool, count)| ToolCount {
                tool: tool.clone(),
                count: *count,
            })
            .collect()
    }
}

impl Serialize for ToolCounts {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (tool, count) in &self.0 {
            map.serialize_entry(tool, count)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for ToolCounts {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct OrderedVisitor;

        impl<'de> Visitor<'de> for OrderedVisitor {
            type Value = ToolCounts;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of tool id to usage count")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<ToolCounts, A::Error> {
                let mut counts = ToolCounts::default();
                while let Some((tool, count)) = access.next_entry::<String, u64>()? {
                    counts.increment(&tool, count);
                }
                Ok(counts)
            }
        }

        deserializer.deserialize_map(OrderedVisitor)
    }
}

/// Every visitor id ever seen. Persisted as a JSON array.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VisitorSet(BTreeSet<String>);

impl VisitorSet {
    /// Returns true the first time `id` is seen.
    pub fn insert(&mut self, id: &str) -> bool {
        if self.0.contains(id) {
            return false;
        }
        self.0.insert(id.to_string())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.0.contains(id)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GlobalAnalytics {
    pub created: DateTime<Utc>,
    #[serde(default)]
    pub daily_stats: BTreeMap<NaiveDate, DailyStat>,
    #[serde(default)]
    pub tool_usage: ToolCounts,
    #[serde(default)]
    pub sessions: u64,
    #[serde(default)]
    pub total_page_views: u64,
    #[serde(default)]
    pub total_tool_uses: u64,
    #[serde(default)]
    pub unique_visitors: VisitorSet,
}

impl GlobalAnalytics {
    pub fn new(created: DateTime<Utc>) -> Self {
        Self {
            created,
            daily_stats: BTreeMap::new(),
            tool_usage: ToolCounts::default(),
            sessions: 0,
            total_page_views: 0,
            total_tool_uses: 0,
            unique_visitors: VisitorSet::default(),
        }
    }

    /// Fold one event into the bucket for `date` and the lifetime counters.
    pub fn apply(&mut self, event: &AnalyticsEvent, date: NaiveDate) {
        let day = self.daily_stats.entry(date).or_default();
        match event {
            AnalyticsEvent::PageView { page } => {
                day.page_views += 1;
                *day.pages.entry(page.clone()).or_default() += 1;
                self.total_page_views += 1;
            }
            AnalyticsEvent::ToolUse { tool } => {
                day.tool_uses += 1;
                *day.tools.entry(tool.clone()).or_default() += 1;
                self.tool_usage.increment(tool, 1);
                self.total_tool_uses += 1;
            }
            AnalyticsEvent::FileProcessed { size } => {
                day.files_processed += 1;
                day.bytes_processed = day.bytes_processed.saturating_add(*size);
            }
            AnalyticsEvent::Error { .. } => {
                day.errors += 1;
            }
            AnalyticsEvent::SessionStart { visitor_id } => {
                self.sessions += 1;
                if self.unique_visitors.insert(visitor_id) {
                    day.unique_visitors += 1;
                }
            }
        }
    }

    /// Keep only the newest `keep` dated buckets. Returns how many were removed.
    pub fn prune(&mut self, keep: usize) -> usize {
        let mut removed = 0;
        while self.daily_stats.len() > keep {
            if self.daily_stats.pop_first().is_none() {
                break;
            }
            removed += 1;
        }
        removed
    }
}

//! Derived dashboard view of the analytics document.

use std::collections::BTreeMap;

use chrono::{DateTime, Days, NaiveDate, Utc};
use serde::Serialize;

use crate::analytics::model::{DailyStat, GlobalAnalytics, ToolCount};

const ROLLUP_DAYS: u64 = 7;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DayTotals {
    pub date: NaiveDate,
    pub page_views: u64,
    pub tool_uses: u64,
    pub files_processed: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WeekRollup {
    pub page_views: u64,
    pub tool_uses: u64,
    pub files_processed: u64,
    /// Oldest first, one entry per calendar day including empty ones.
    pub days: Vec<DayTotals>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Totals {
    pub page_views: u64,
    pub tool_uses: u64,
    pub unique_visitors: u64,
    pub sessions: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsSnapshot {
    pub created: DateTime<Utc>,
    pub date: NaiveDate,
    pub today: DailyStat,
    pub last7_days: WeekRollup,
    pub top_tools: Vec<ToolCount>,
    pub totals: Totals,
    pub daily_stats: BTreeMap<NaiveDate, DailyStat>,
}

impl AnalyticsSnapshot {
    pub fn build(data: &GlobalAnalytics, today: NaiveDate, top_n: usize) -> Self {
        let mut week = WeekRollup::default();
        for back in (0..ROLLUP_DAYS).rev() {
            let Some(date) = today.checked_sub_days(Days::new(back)) else {
                continue;
            };
            let day = data.daily_stats.get(&date).cloned().unwrap_or_default();
            week.page_views += day.page_views;
            week.tool_uses += day.tool_uses;
            week.files_processed += day.files_processed;
            week.days.push(DayTotals {
                date,
                page_views: day.page_views,
                tool_uses: day.tool_uses,
                files_processed: day.files_processed,
            });
        }

        Self {
            created: data.created,
            date: today,
            today: data.daily_stats.get(&today).cloned().unwrap_or_default(),
            last7_days: week,
            top_tools: data.tool_usage.ranked(top_n),
            totals: Totals {
                page_views: data.total_page_views,
                tool_uses: data.total_tool_uses,
                unique_visitors: data.unique_visitors.len() as u64,
                sessions: data.sessions,
            },
            daily_stats: data.daily_stats.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::event::AnalyticsEvent;

    #[test]
    fn test_rollup_includes_empty_days() {
        let today = NaiveDate::from_ymd_opt(2024, 3, 9).unwrap();
        let mut data = GlobalAnalytics::new(Utc::now());
        let view = AnalyticsEvent::PageView { page: "/".into() };
        data.apply(&view, today);
        data.apply(&view, today - Days::new(3));
        data.apply(&view, today - Days::new(7));
        data.apply(&AnalyticsEvent::ToolUse { tool: "merge".into() }, today - Days::new(6));

        let snapshot = AnalyticsSnapshot::build(&data, today, 10);
        assert_eq!(snapshot.last7_days.days.len(), 7);
        assert_eq!(snapshot.last7_days.days[0].date, today - Days::new(6));
        assert_eq!(snapshot.last7_days.page_views, 2);
        assert_eq!(snapshot.last7_days.tool_uses, 1);
        assert_eq!(snapshot.today.page_views, 1);
        assert_eq!(snapshot.totals.page_views, 3);
        assert_eq!(snapshot.top_tools[0].tool, "merge");
    }

    #[test]
    fn test_empty_today_is_zeroed() {
        let today = NaiveDate::from_ymd_opt(2024, 3, 9).unwrap();
        let snapshot = AnalyticsSnapshot::build(&GlobalAnalytics::new(Utc::now()), today, 10);
        assert_eq!(snapshot.today, DailyStat::default());
        assert!(snapshot.top_tools.is_empty());
        assert_eq!(snapshot.last7_days.page_views, 0);
    }
}

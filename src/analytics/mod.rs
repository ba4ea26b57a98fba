//! Application analytics: daily buckets, rolling totals, and the JSON store.

pub mod event;
pub mod model;
pub mod snapshot;
pub mod store;

pub use event::{AnalyticsEvent, EventError, TrackRequest};
pub use model::{DailyStat, GlobalAnalytics, ToolCount};
pub use snapshot::AnalyticsSnapshot;
pub use store::{AnalyticsError, AnalyticsStore};

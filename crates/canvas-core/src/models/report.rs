//! Weekly report model

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Length of a reporting window in days
pub const REPORT_WINDOW_DAYS: i64 = 7;

/// Half-open aggregation window `[start, end)` over request creation time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl ReportWindow {
    /// The seven days ending at `now`
    pub fn trailing_week(now: DateTime<Utc>) -> Self {
        Self {
            start: now - Duration::days(REPORT_WINDOW_DAYS),
            end: now,
        }
    }

    /// Check whether `ts` falls inside the window
    #[inline]
    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        ts >= self.start && ts < self.end
    }

    /// Date-keyed report identifier, `report_YYYY-MM-DD` of the window end
    pub fn report_id(&self) -> String {
        format!("report_{}", self.end.format("%Y-%m-%d"))
    }
}

/// Per-category counters
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryStats {
    pub total: u64,
    pub completed: u64,
    pub failed: u64,
    /// `failed / total * 100`, filled in once the scan is finished
    #[serde(default)]
    pub failure_rate: f64,
}

impl CategoryStats {
    /// Percentage of failed requests, 0 when the category is empty
    pub fn compute_failure_rate(&self) -> f64 {
        percentage(self.failed, self.total)
    }
}

/// Breakdown keyed by category value (model, style or size)
pub type Breakdown = BTreeMap<String, CategoryStats>;

/// Weekly aggregate, immutable once written
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    /// `report_YYYY-MM-DD`
    pub id: String,

    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,

    pub total_requests: u64,

    /// Sum of `cost` over completed requests
    pub total_credits_spent: i64,

    /// Sum of `cost` over failed requests
    pub total_credits_refunded: i64,

    /// `completed / total * 100`
    pub success_rate: f64,

    pub by_model: Breakdown,
    pub by_style: Breakdown,
    pub by_size: Breakdown,

    pub anomalies: Vec<String>,

    pub generated_at: DateTime<Utc>,
}

impl Report {
    pub fn window(&self) -> ReportWindow {
        ReportWindow {
            start: self.window_start,
            end: self.window_end,
        }
    }
}

/// `part / whole * 100`, 0 when `whole` is 0
pub fn percentage(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64 * 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_trailing_week_is_half_open() {
        let now = Utc.with_ymd_and_hms(2024, 3, 11, 9, 0, 0).unwrap();
        let window = ReportWindow::trailing_week(now);

        assert_eq!(window.start, Utc.with_ymd_and_hms(2024, 3, 4, 9, 0, 0).unwrap());
        assert!(window.contains(window.start));
        assert!(!window.contains(now));
        assert!(window.contains(now - Duration::seconds(1)));
        assert!(!window.contains(window.start - Duration::seconds(1)));
    }

    #[test]
    fn test_report_id_uses_window_end_date() {
        let now = Utc.with_ymd_and_hms(2024, 3, 11, 23, 59, 0).unwrap();
        assert_eq!(ReportWindow::trailing_week(now).report_id(), "report_2024-03-11");
    }

    #[test]
    fn test_failure_rate() {
        let stats = CategoryStats {
            total: 4,
            completed: 3,
            failed: 1,
            failure_rate: 0.0,
        };
        assert_eq!(stats.compute_failure_rate(), 25.0);
        assert_eq!(CategoryStats::default().compute_failure_rate(), 0.0);
    }
}

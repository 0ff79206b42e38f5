//! Weekly report schedule
//!
//! Every Monday at 09:00 UTC.

use canvas_core::traits::LedgerStore;
use chrono::{DateTime, Datelike, Duration, NaiveTime, TimeZone, Utc, Weekday};
use std::sync::Arc;
use tracing::{error, info};

use crate::reporting::ReportService;

/// Fixed weekly trigger in UTC
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WeeklySchedule {
    pub weekday: Weekday,
    pub time: NaiveTime,
}

impl Default for WeeklySchedule {
    fn default() -> Self {
        Self {
            weekday: Weekday::Mon,
            time: NaiveTime::from_hms_opt(9, 0, 0).unwrap_or_default(),
        }
    }
}

impl WeeklySchedule {
    /// First trigger strictly after `now`
    pub fn next_after(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let today = now.date_naive();
        let days_ahead = (7 + self.weekday.num_days_from_monday() as i64
            - today.weekday().num_days_from_monday() as i64)
            % 7;

        let candidate =
            Utc.from_utc_datetime(&(today + Duration::days(days_ahead)).and_time(self.time));

        if candidate > now {
            candidate
        } else {
            candidate + Duration::days(7)
        }
    }

    /// Generate a report at every trigger, forever
    ///
    /// Failed runs are logged and the loop moves on to the next trigger.
    pub async fn run<S: LedgerStore>(self, reports: Arc<ReportService<S>>) {
        loop {
            let now = Utc::now();
            let next = self.next_after(now);
            info!(next_run = %next, "Weekly report scheduled");

            let wait = (next - now).to_std().unwrap_or_default();
            tokio::time::sleep(wait).await;

            match reports.generate_weekly(Utc::now()).await {
                Ok(report) => info!(report_id = %report.id, "Scheduled weekly report stored"),
                Err(e) => error!("Scheduled weekly report failed: {}", e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    #[test]
    fn test_next_monday_morning() {
        let schedule = WeeklySchedule::default();

        // Wednesday
        assert_eq!(schedule.next_after(at(2024, 3, 13, 15, 0)), at(2024, 3, 18, 9, 0));
        // Monday before the trigger
        assert_eq!(schedule.next_after(at(2024, 3, 11, 8, 59)), at(2024, 3, 11, 9, 0));
        // exactly at the trigger moves to the following week
        assert_eq!(schedule.next_after(at(2024, 3, 11, 9, 0)), at(2024, 3, 18, 9, 0));
        // Sunday night
        assert_eq!(schedule.next_after(at(2024, 3, 17, 23, 30)), at(2024, 3, 18, 9, 0));
    }

    #[test]
    fn test_custom_weekday() {
        let schedule = WeeklySchedule {
            weekday: Weekday::Fri,
            time: NaiveTime::from_hms_opt(18, 30, 0).unwrap(),
        };
        assert_eq!(schedule.next_after(at(2024, 3, 11, 9, 0)), at(2024, 3, 15, 18, 30));
    }
}

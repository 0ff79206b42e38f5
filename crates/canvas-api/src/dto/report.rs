//! Weekly report DTOs

use chrono::{DateTime, Utc};
use serde::Deserialize;

/// Query for the manual report trigger
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WeeklyReportQuery {
    /// End of the reporting window, defaults to now
    #[serde(rename = "asOf")]
    pub as_of: Option<DateTime<Utc>>,
}

impl WeeklyReportQuery {
    /// Window end to report on
    pub fn window_end(&self) -> DateTime<Utc> {
        self.as_of.unwrap_or_else(Utc::now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_window_end_defaults_to_now() {
        let before = Utc::now();
        let end = WeeklyReportQuery::default().window_end();
        assert!(end >= before);
    }

    #[test]
    fn test_explicit_window_end() {
        let query: WeeklyReportQuery =
            serde_json::from_str(r#"{"asOf":"2024-03-11T09:00:00Z"}"#).unwrap();
        assert_eq!(
            query.window_end(),
            Utc.with_ymd_and_hms(2024, 3, 11, 9, 0, 0).unwrap()
        );
    }
}

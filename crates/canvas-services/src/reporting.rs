//! Weekly report service
//!
//! Aggregates the trailing week, compares it against the most recent earlier
//! report and persists the result under a date-keyed id. Re-running on the
//! same day overwrites that day's report.

use canvas_core::{
    config::AnomalyThresholds,
    models::{Report, ReportWindow},
    traits::{LedgerStore, ReportRepository},
    AppError, AppResult,
};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{info, instrument};

use crate::aggregator::aggregate;
use crate::anomaly::detect_anomalies;

/// Report generation and lookup
pub struct ReportService<S: LedgerStore> {
    store: Arc<S>,
    thresholds: AnomalyThresholds,
}

impl<S: LedgerStore> ReportService<S> {
    pub fn new(store: Arc<S>, thresholds: AnomalyThresholds) -> Self {
        Self { store, thresholds }
    }

    /// Build, persist and return the report for the week ending at `now`
    #[instrument(skip(self))]
    pub async fn generate_weekly(&self, now: DateTime<Utc>) -> AppResult<Report> {
        let window = ReportWindow::trailing_week(now);
        let mut report = aggregate(self.store.as_ref(), window).await?.finish(Utc::now());

        let previous = self
            .store
            .report_before(report.window_end, &report.id)
            .await?;
        report.anomalies = detect_anomalies(&report, previous.as_ref(), &self.thresholds);

        self.store.save_report(&report).await?;

        info!(
            report_id = %report.id,
            total_requests = report.total_requests,
            success_rate = report.success_rate,
            credits_spent = report.total_credits_spent,
            credits_refunded = report.total_credits_refunded,
            baseline = previous.as_ref().map(|p| p.id.as_str()).unwrap_or("none"),
            "Weekly report generated"
        );
        for anomaly in &report.anomalies {
            info!(report_id = %report.id, "{}", anomaly);
        }

        Ok(report)
    }

    /// Report covering the latest reporting period
    pub async fn latest(&self) -> AppResult<Report> {
        self.store
            .latest_report()
            .await?
            .ok_or_else(|| AppError::NotFound("No report has been generated yet".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::anomaly::{BASELINE_MESSAGE, NO_ANOMALIES_MESSAGE};
    use canvas_core::models::{
        Breakdown, GenerationRequest, GenerationStatus, ImageModel,
    };
    use canvas_db::MemoryStore;
    use chrono::{Duration, TimeZone};

    fn monday() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 11, 9, 0, 0).unwrap()
    }

    async fn import(store: &MemoryStore, count: usize, status: GenerationStatus, at: DateTime<Utc>) {
        for _ in 0..count {
            let mut request = GenerationRequest::pending(
                "u1",
                ImageModel::ModelA,
                "anime",
                "vibrant",
                "512x512",
                None,
                1,
            );
            request.status = status;
            request.created_at = at;
            store.import_generation_request(request).await;
        }
    }

    fn previous_report(success_rate: f64, total_requests: u64) -> Report {
        Report {
            id: "report_2024-03-04".to_string(),
            window_start: monday() - Duration::days(14),
            window_end: monday() - Duration::days(7),
            total_requests,
            total_credits_spent: 0,
            total_credits_refunded: 0,
            success_rate,
            by_model: Breakdown::new(),
            by_style: Breakdown::new(),
            by_size: Breakdown::new(),
            anomalies: vec![],
            generated_at: monday() - Duration::days(7),
        }
    }

    #[tokio::test]
    async fn test_first_report_is_baseline() {
        let store = Arc::new(MemoryStore::new());
        import(&store, 3, GenerationStatus::Completed, monday() - Duration::days(1)).await;
        let service = ReportService::new(store.clone(), AnomalyThresholds::default());

        let report = service.generate_weekly(monday()).await.unwrap();

        assert_eq!(report.id, "report_2024-03-11");
        assert_eq!(report.total_requests, 3);
        assert_eq!(report.anomalies, vec![BASELINE_MESSAGE.to_string()]);
        assert_eq!(service.latest().await.unwrap(), report);
    }

    #[tokio::test]
    async fn test_compares_against_previous_report() {
        let store = Arc::new(MemoryStore::new());
        store.save_report(&previous_report(80.0, 11)).await.unwrap();
        import(&store, 12, GenerationStatus::Completed, monday() - Duration::days(2)).await;
        import(&store, 28, GenerationStatus::Failed, monday() - Duration::days(2)).await;
        let service = ReportService::new(store.clone(), AnomalyThresholds::default());

        let report = service.generate_weekly(monday()).await.unwrap();

        assert_eq!(report.total_requests, 40);
        assert_eq!(report.success_rate, 30.0);
        assert!(report.anomalies.iter().any(|a| a.starts_with("Success rate dropped")));
        assert!(report.anomalies.iter().any(|a| a.starts_with("Request volume spiked")));
    }

    #[tokio::test]
    async fn test_rerun_overwrites_and_ignores_itself() {
        let store = Arc::new(MemoryStore::new());
        store.save_report(&previous_report(50.0, 4)).await.unwrap();
        import(&store, 4, GenerationStatus::Completed, monday() - Duration::days(1)).await;
        import(&store, 4, GenerationStatus::Failed, monday() - Duration::days(1)).await;
        let service = ReportService::new(store.clone(), AnomalyThresholds::default());

        let first = service.generate_weekly(monday()).await.unwrap();
        let second = service
            .generate_weekly(monday() + Duration::hours(2))
            .await
            .unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(second.anomalies, vec![NO_ANOMALIES_MESSAGE.to_string()]);
        assert_eq!(service.latest().await.unwrap().id, "report_2024-03-11");
    }

    #[tokio::test]
    async fn test_backfilled_week_compares_against_earlier_periods_only() {
        let store = Arc::new(MemoryStore::new());
        let service = ReportService::new(store.clone(), AnomalyThresholds::default());
        let next_monday = monday() + Duration::days(7);

        let later = service.generate_weekly(next_monday).await.unwrap();
        let earlier = service.generate_weekly(monday()).await.unwrap();

        assert_eq!(later.id, "report_2024-03-18");
        assert_eq!(earlier.id, "report_2024-03-11");
        assert_eq!(earlier.anomalies, vec![BASELINE_MESSAGE.to_string()]);
        assert_eq!(service.latest().await.unwrap().id, "report_2024-03-18");

        // the next regular run picks the backfilled week as its baseline
        let rerun = service.generate_weekly(next_monday).await.unwrap();
        assert_eq!(rerun.anomalies, vec![NO_ANOMALIES_MESSAGE.to_string()]);
    }

    #[tokio::test]
    async fn test_latest_without_reports() {
        let service = ReportService::new(Arc::new(MemoryStore::new()), AnomalyThresholds::default());
        assert!(matches!(
            service.latest().await.unwrap_err(),
            AppError::NotFound(_)
        ));
    }
}

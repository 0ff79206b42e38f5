//! Weekly usage aggregation
//!
//! Single pass over the requests of a window, keeping running counters and
//! per-model/style/size breakdowns. Rates are derived once the scan ends.

use canvas_core::{
    models::{percentage, Breakdown, GenerationRequest, GenerationStatus, Report, ReportWindow},
    traits::GenerationRequestRepository,
    AppResult,
};
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use tracing::{debug, instrument};

/// Running counters for one window
#[derive(Debug, Clone)]
pub struct ReportAccumulator {
    window: ReportWindow,
    total: u64,
    completed: u64,
    credits_spent: i64,
    credits_refunded: i64,
    by_model: Breakdown,
    by_style: Breakdown,
    by_size: Breakdown,
}

impl ReportAccumulator {
    pub fn new(window: ReportWindow) -> Self {
        Self {
            window,
            total: 0,
            completed: 0,
            credits_spent: 0,
            credits_refunded: 0,
            by_model: Breakdown::new(),
            by_style: Breakdown::new(),
            by_size: Breakdown::new(),
        }
    }

    /// Fold one request into the counters
    ///
    /// Pending requests count toward totals only.
    pub fn observe(&mut self, request: &GenerationRequest) {
        self.total += 1;

        match request.status {
            GenerationStatus::Completed => {
                self.completed += 1;
                self.credits_spent += request.cost;
            }
            GenerationStatus::Failed => self.credits_refunded += request.cost,
            GenerationStatus::Pending => {}
        }

        for (breakdown, key) in [
            (&mut self.by_model, request.model.as_str()),
            (&mut self.by_style, request.style.as_str()),
            (&mut self.by_size, request.size.as_str()),
        ] {
            let stats = breakdown.entry(key.to_string()).or_default();
            stats.total += 1;
            match request.status {
                GenerationStatus::Completed => stats.completed += 1,
                GenerationStatus::Failed => stats.failed += 1,
                GenerationStatus::Pending => {}
            }
        }
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    /// Derive rates and build the report, without anomalies
    pub fn finish(mut self, generated_at: DateTime<Utc>) -> Report {
        for breakdown in [&mut self.by_model, &mut self.by_style, &mut self.by_size] {
            for stats in breakdown.values_mut() {
                stats.failure_rate = stats.compute_failure_rate();
            }
        }

        Report {
            id: self.window.report_id(),
            window_start: self.window.start,
            window_end: self.window.end,
            total_requests: self.total,
            total_credits_spent: self.credits_spent,
            total_credits_refunded: self.credits_refunded,
            success_rate: percentage(self.completed, self.total),
            by_model: self.by_model,
            by_style: self.by_style,
            by_size: self.by_size,
            anomalies: Vec::new(),
            generated_at,
        }
    }
}

/// Stream every request of `window` from `store` into an accumulator
#[instrument(skip(store))]
pub async fn aggregate<S: GenerationRequestRepository + ?Sized>(
    store: &S,
    window: ReportWindow,
) -> AppResult<ReportAccumulator> {
    let mut accumulator = ReportAccumulator::new(window);
    let mut requests = store.requests_in_window(window);

    while let Some(request) = requests.try_next().await? {
        accumulator.observe(&request);
    }

    debug!(total = accumulator.total(), "Aggregated window");
    Ok(accumulator)
}

#[cfg(test)]
mod tests {
    use super::*;
    use canvas_core::models::ImageModel;
    use canvas_db::MemoryStore;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 11, 9, 0, 0).unwrap()
    }

    fn finished(
        model: ImageModel,
        style: &str,
        size: &str,
        cost: i64,
        status: GenerationStatus,
        age: Duration,
    ) -> GenerationRequest {
        let mut request =
            GenerationRequest::pending("u1", model, style, "neon", size, None, cost);
        request.status = status;
        request.created_at = now() - age;
        request
    }

    async fn seeded_store() -> MemoryStore {
        let store = MemoryStore::new();
        let hour = Duration::hours(1);
        for request in [
            finished(ImageModel::ModelA, "anime", "512x512", 1, GenerationStatus::Completed, hour),
            finished(ImageModel::ModelA, "anime", "1024x1024", 3, GenerationStatus::Completed, hour * 2),
            finished(ImageModel::ModelA, "sketch", "1024x1024", 3, GenerationStatus::Failed, hour * 3),
            finished(ImageModel::ModelB, "sketch", "1024x1792", 4, GenerationStatus::Pending, hour * 4),
            // outside the window
            finished(ImageModel::ModelB, "anime", "512x512", 1, GenerationStatus::Completed, Duration::days(8)),
        ] {
            store.import_generation_request(request).await;
        }
        store
    }

    #[tokio::test]
    async fn test_totals_and_breakdowns() {
        let store = seeded_store().await;
        let window = ReportWindow::trailing_week(now());

        let report = aggregate(&store, window).await.unwrap().finish(now());

        assert_eq!(report.id, "report_2024-03-11");
        assert_eq!(report.total_requests, 4);
        assert_eq!(report.total_credits_spent, 4);
        assert_eq!(report.total_credits_refunded, 3);
        assert_eq!(report.success_rate, 50.0);

        let model_a = &report.by_model["Model A"];
        assert_eq!((model_a.total, model_a.completed, model_a.failed), (3, 2, 1));
        assert!((model_a.failure_rate - 100.0 / 3.0).abs() < 1e-9);

        let model_b = &report.by_model["Model B"];
        assert_eq!((model_b.total, model_b.completed, model_b.failed), (1, 0, 0));
        assert_eq!(model_b.failure_rate, 0.0);

        assert_eq!(report.by_style["sketch"].failed, 1);
        assert_eq!(report.by_size["1024x1024"].total, 2);
        assert!(report.anomalies.is_empty());
    }

    #[tokio::test]
    async fn test_empty_window() {
        let store = MemoryStore::new();
        let report = aggregate(&store, ReportWindow::trailing_week(now()))
            .await
            .unwrap()
            .finish(now());

        assert_eq!(report.total_requests, 0);
        assert_eq!(report.success_rate, 0.0);
        assert!(report.by_model.is_empty());
    }

    #[tokio::test]
    async fn test_aggregation_is_deterministic() {
        let store = seeded_store().await;
        let window = ReportWindow::trailing_week(now());

        let first = aggregate(&store, window).await.unwrap().finish(now());
        let second = aggregate(&store, window).await.unwrap().finish(now());

        assert_eq!(first, second);
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
    }
}

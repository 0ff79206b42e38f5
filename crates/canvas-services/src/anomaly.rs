//! Anomaly detection
//!
//! Compares a fresh report against the previous one. Each check needs a
//! large enough previous sample before it may fire.

use canvas_core::{
    config::AnomalyThresholds,
    models::{Breakdown, Report},
};

/// Reported when there is nothing to compare against
pub const BASELINE_MESSAGE: &str =
    "No previous report available for comparison; this report establishes the baseline.";

/// Reported when no check fired
pub const NO_ANOMALIES_MESSAGE: &str = "No significant anomalies detected this week.";

/// Human-readable anomalies of `current` relative to `previous`
///
/// Always returns at least one message.
pub fn detect_anomalies(
    current: &Report,
    previous: Option<&Report>,
    thresholds: &AnomalyThresholds,
) -> Vec<String> {
    let Some(previous) = previous else {
        return vec![BASELINE_MESSAGE.to_string()];
    };

    let mut anomalies = Vec::new();

    if previous.success_rate > 0.0
        && current.success_rate < previous.success_rate * thresholds.success_rate_drop_ratio
    {
        anomalies.push(format!(
            "Success rate dropped from {:.1}% to {:.1}%.",
            previous.success_rate, current.success_rate
        ));
    }

    if previous.total_requests > thresholds.min_samples
        && current.total_requests as f64
            > previous.total_requests as f64 * thresholds.usage_spike_multiplier
    {
        anomalies.push(format!(
            "Request volume spiked from {} to {} requests.",
            previous.total_requests, current.total_requests
        ));
    }

    if previous.total_credits_spent > thresholds.min_samples as i64
        && current.total_credits_spent as f64
            > previous.total_credits_spent as f64 * thresholds.usage_spike_multiplier
    {
        anomalies.push(format!(
            "Credit spend spiked from {} to {} credits.",
            previous.total_credits_spent, current.total_credits_spent
        ));
    }

    for (dimension, current_stats, previous_stats) in [
        ("model", &current.by_model, &previous.by_model),
        ("style", &current.by_style, &previous.by_style),
        ("size", &current.by_size, &previous.by_size),
    ] {
        failure_spikes(
            dimension,
            current_stats,
            previous_stats,
            thresholds,
            &mut anomalies,
        );
    }

    if anomalies.is_empty() {
        anomalies.push(NO_ANOMALIES_MESSAGE.to_string());
    }
    anomalies
}

fn failure_spikes(
    dimension: &str,
    current: &Breakdown,
    previous: &Breakdown,
    thresholds: &AnomalyThresholds,
    anomalies: &mut Vec<String>,
) {
    for (key, now) in current {
        let Some(before) = previous.get(key) else {
            continue;
        };
        if before.total <= thresholds.min_samples {
            continue;
        }
        if now.failure_rate > before.failure_rate * thresholds.failure_rate_spike_multiplier
            && now.failure_rate > thresholds.significant_failure_rate
        {
            anomalies.push(format!(
                "Failure rate for {} '{}' rose from {:.1}% to {:.1}%.",
                dimension, key, before.failure_rate, now.failure_rate
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use canvas_core::models::CategoryStats;
    use chrono::Utc;

    fn report(success_rate: f64, total_requests: u64, credits_spent: i64) -> Report {
        Report {
            id: "report_test".to_string(),
            window_start: Utc::now(),
            window_end: Utc::now(),
            total_requests,
            total_credits_spent: credits_spent,
            total_credits_refunded: 0,
            success_rate,
            by_model: Breakdown::new(),
            by_style: Breakdown::new(),
            by_size: Breakdown::new(),
            anomalies: vec![],
            generated_at: Utc::now(),
        }
    }

    fn stats(total: u64, failed: u64) -> CategoryStats {
        let mut s = CategoryStats {
            total,
            completed: total - failed,
            failed,
            failure_rate: 0.0,
        };
        s.failure_rate = s.compute_failure_rate();
        s
    }

    fn detect(current: &Report, previous: Option<&Report>) -> Vec<String> {
        detect_anomalies(current, previous, &AnomalyThresholds::default())
    }

    #[test]
    fn test_no_previous_report_is_baseline() {
        let anomalies = detect(&report(90.0, 5, 5), None);
        assert_eq!(anomalies, vec![BASELINE_MESSAGE.to_string()]);
    }

    #[test]
    fn test_stable_week_has_no_anomalies() {
        let anomalies = detect(&report(80.0, 12, 20), Some(&report(82.0, 11, 18)));
        assert_eq!(anomalies, vec![NO_ANOMALIES_MESSAGE.to_string()]);
    }

    #[test]
    fn test_success_drop_and_volume_spike() {
        // previous needs more than 10 requests for the volume check
        let previous = report(80.0, 11, 0);
        let current = report(30.0, 40, 0);

        let anomalies = detect(&current, Some(&previous));

        assert_eq!(anomalies.len(), 2);
        assert!(anomalies[0].starts_with("Success rate dropped"));
        assert!(anomalies[1].starts_with("Request volume spiked"));
        assert!(!anomalies.contains(&NO_ANOMALIES_MESSAGE.to_string()));
    }

    #[test]
    fn test_ten_previous_requests_is_not_enough_for_volume() {
        let anomalies = detect(&report(30.0, 40, 0), Some(&report(80.0, 10, 0)));
        assert_eq!(anomalies.len(), 1);
        assert!(anomalies[0].starts_with("Success rate dropped"));
    }

    #[test]
    fn test_zero_previous_success_rate_never_drops() {
        let anomalies = detect(&report(0.0, 5, 0), Some(&report(0.0, 5, 0)));
        assert_eq!(anomalies, vec![NO_ANOMALIES_MESSAGE.to_string()]);
    }

    #[test]
    fn test_credit_spend_spike() {
        let anomalies = detect(&report(80.0, 5, 100), Some(&report(80.0, 5, 20)));
        assert_eq!(anomalies.len(), 1);
        assert!(anomalies[0].starts_with("Credit spend spiked"));
    }

    #[test]
    fn test_category_failure_spike_needs_both_conditions() {
        let mut previous = report(90.0, 5, 5);
        let mut current = report(90.0, 5, 5);

        // 5% -> 30%: doubled and above 20%
        previous.by_model.insert("Model A".to_string(), stats(20, 1));
        current.by_model.insert("Model A".to_string(), stats(10, 3));
        // 10% -> 15%: below both thresholds
        previous.by_style.insert("anime".to_string(), stats(20, 2));
        current.by_style.insert("anime".to_string(), stats(20, 3));
        // 20% -> 100% but only 5 previous samples
        previous.by_size.insert("512x512".to_string(), stats(5, 1));
        current.by_size.insert("512x512".to_string(), stats(5, 5));
        // new key without a previous entry
        current.by_size.insert("1024x1792".to_string(), stats(20, 20));

        let anomalies = detect(&current, Some(&previous));

        assert_eq!(anomalies.len(), 1);
        assert_eq!(
            anomalies[0],
            "Failure rate for model 'Model A' rose from 5.0% to 30.0%."
        );
    }

    #[test]
    fn test_thresholds_are_configurable() {
        let thresholds = AnomalyThresholds {
            usage_spike_multiplier: 1.5,
            min_samples: 2,
            ..Default::default()
        };
        let anomalies =
            detect_anomalies(&report(80.0, 8, 0), Some(&report(80.0, 4, 0)), &thresholds);
        assert_eq!(anomalies.len(), 1);
        assert!(anomalies[0].starts_with("Request volume spiked"));
    }
}

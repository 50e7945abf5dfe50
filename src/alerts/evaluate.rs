use serde::Serialize;
use tracing::warn;
use utoipa::ToSchema;

use crate::db::models::{AlertLevel, Metric, Reading, Severity, ThresholdSet};

/// One out-of-range metric, in evaluation order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThresholdBreach {
    pub metric: Metric,
    pub level: AlertLevel,
    /// The reading that crossed the bound.
    pub value: f64,
    /// The bound that was crossed (min for low, max for high).
    pub limit: f64,
}

/// Transient per-evaluation status shown on the dashboard. Never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct AlertStatus {
    pub severity: Severity,
    pub message: String,
}

/// Compare every metric present in `reading` against its bounds, in the
/// fixed `Metric::ORDERED` order.
///
/// Values inside `[min, max]` (inclusive) produce nothing. NaN never
/// compares true against either bound, so a NaN reading would silently
/// suppress its alert; such values are treated as invalid input and
/// excluded from evaluation instead.
pub fn find_breaches(reading: &Reading, thresholds: &ThresholdSet) -> Vec<ThresholdBreach> {
    let mut breaches = Vec::new();

    for metric in Metric::ORDERED {
        let Some(value) = reading.value(metric) else {
            continue;
        };
        if value.is_nan() {
            warn!(metric = %metric, "NaN sensor value, excluding from threshold evaluation");
            continue;
        }

        let range = thresholds.range(metric);
        if value < range.min {
            breaches.push(ThresholdBreach {
                metric,
                level: AlertLevel::Low,
                value,
                limit: range.min,
            });
        } else if value > range.max {
            breaches.push(ThresholdBreach {
                metric,
                level: AlertLevel::High,
                value,
                limit: range.max,
            });
        }
    }

    breaches
}

/// Dashboard statuses for a reading: one entry per breach, or exactly one
/// `success` entry when everything is in range.
///
/// A TDS reading below minimum is non-urgent (`info`); every other breach
/// is a `warning`.
pub fn statuses(reading: &Reading, thresholds: &ThresholdSet) -> Vec<AlertStatus> {
    let breaches = find_breaches(reading, thresholds);

    if breaches.is_empty() {
        return vec![AlertStatus {
            severity: Severity::Success,
            message: "All Parameters Normal".to_owned(),
        }];
    }

    breaches.iter().map(status_for).collect()
}

fn status_for(breach: &ThresholdBreach) -> AlertStatus {
    let (severity, message) = match (breach.metric, breach.level) {
        (Metric::Ph, AlertLevel::Low) => (Severity::Warning, "pH Too Low"),
        (Metric::Ph, AlertLevel::High) => (Severity::Warning, "pH Too High"),
        (Metric::Temperature, AlertLevel::Low) => (Severity::Warning, "Temperature Too Low"),
        (Metric::Temperature, AlertLevel::High) => (Severity::Warning, "Temperature Too High"),
        (Metric::Tds, AlertLevel::Low) => (Severity::Info, "TDS Below Threshold"),
        (Metric::Tds, AlertLevel::High) => (Severity::Warning, "Needs Water Change"),
    };
    AlertStatus { severity, message: message.to_owned() }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::ThresholdRange;

    fn default_thresholds() -> ThresholdSet {
        ThresholdSet {
            ph: ThresholdRange { min: 6.5, max: 8.0 },
            temperature: ThresholdRange { min: 22.0, max: 28.0 },
            tds: ThresholdRange { min: 150.0, max: 400.0 },
        }
    }

    fn reading(ph: f64, temperature: f64, tds: f64) -> Reading {
        Reading { ph: Some(ph), temperature: Some(temperature), tds: Some(tds) }
    }

    #[test]
    fn all_in_range_yields_single_success() {
        let s = statuses(&reading(7.0, 25.0, 300.0), &default_thresholds());
        assert_eq!(s.len(), 1);
        assert_eq!(s[0].severity, Severity::Success);
        assert_eq!(s[0].message, "All Parameters Normal");
    }

    #[test]
    fn high_ph_scenario() {
        let breaches = find_breaches(&reading(9.0, 25.0, 300.0), &default_thresholds());
        assert_eq!(
            breaches,
            vec![ThresholdBreach {
                metric: Metric::Ph,
                level: AlertLevel::High,
                value: 9.0,
                limit: 8.0,
            }]
        );

        let s = statuses(&reading(9.0, 25.0, 300.0), &default_thresholds());
        assert_eq!(s.len(), 1);
        assert_eq!(s[0].severity, Severity::Warning);
        assert_eq!(s[0].message, "pH Too High");
    }

    #[test]
    fn low_breach_carries_min_as_limit() {
        let breaches = find_breaches(&reading(7.0, 18.5, 300.0), &default_thresholds());
        assert_eq!(breaches.len(), 1);
        assert_eq!(breaches[0].metric, Metric::Temperature);
        assert_eq!(breaches[0].level, AlertLevel::Low);
        assert_eq!(breaches[0].limit, 22.0);
    }

    #[test]
    fn bounds_are_inclusive() {
        assert!(find_breaches(&reading(6.5, 22.0, 400.0), &default_thresholds()).is_empty());
        assert!(find_breaches(&reading(8.0, 28.0, 150.0), &default_thresholds()).is_empty());
    }

    #[test]
    fn tds_low_is_info() {
        let s = statuses(&reading(7.0, 25.0, 100.0), &default_thresholds());
        assert_eq!(s.len(), 1);
        assert_eq!(s[0].severity, Severity::Info);
        assert_eq!(s[0].message, "TDS Below Threshold");
    }

    #[test]
    fn breaches_follow_fixed_metric_order() {
        let breaches = find_breaches(&reading(9.0, 18.0, 500.0), &default_thresholds());
        let metrics: Vec<Metric> = breaches.iter().map(|b| b.metric).collect();
        assert_eq!(metrics, vec![Metric::Ph, Metric::Temperature, Metric::Tds]);
    }

    #[test]
    fn absent_metrics_are_skipped() {
        let partial = Reading { ph: Some(9.0), temperature: None, tds: None };
        let breaches = find_breaches(&partial, &default_thresholds());
        assert_eq!(breaches.len(), 1);
        assert_eq!(breaches[0].metric, Metric::Ph);
    }

    #[test]
    fn nan_is_excluded_not_silently_in_range() {
        let r = Reading { ph: Some(f64::NAN), temperature: Some(25.0), tds: Some(300.0) };
        assert!(find_breaches(&r, &default_thresholds()).is_empty());
        // Statuses still report success for the remaining valid metrics
        let s = statuses(&r, &default_thresholds());
        assert_eq!(s[0].severity, Severity::Success);
    }
}

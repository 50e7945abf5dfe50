use crate::db::models::{AlertLevel, Metric};

/// Formatted notification text for one threshold breach.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertMessage {
    pub title: String,
    pub body: String,
}

/// Build the notification title and body for a breach.
///
/// The body states the direction and both values, then appends a fixed
/// per-metric remediation hint.
pub fn alert_message(
    metric: Metric,
    level: AlertLevel,
    current_value: f64,
    threshold_value: f64,
) -> AlertMessage {
    let title = format!("Alert: {} {}", metric.label(), level.label());

    let direction = match level {
        AlertLevel::Low => "below",
        AlertLevel::High => "above",
    };
    let body = format!(
        "{} is {direction} threshold. Current: {current_value}, Threshold: {threshold_value}{}",
        metric.label(),
        remediation(metric, level),
    );

    AlertMessage { title, body }
}

/// Remediation hints, one per metric × level combination.
fn remediation(metric: Metric, level: AlertLevel) -> &'static str {
    match (metric, level) {
        (Metric::Ph, AlertLevel::Low) => ". Consider adding a pH buffer to raise alkalinity.",
        (Metric::Ph, AlertLevel::High) => ". Consider partial water changes to bring pH down.",
        (Metric::Temperature, AlertLevel::Low) => {
            ". Check the heater and raise the setpoint gradually."
        }
        (Metric::Temperature, AlertLevel::High) => {
            ". Improve aeration and check the heater for malfunction."
        }
        (Metric::Tds, AlertLevel::Low) => ". Consider water changes to increase mineral content.",
        (Metric::Tds, AlertLevel::High) => ". Consider water changes to reduce mineral buildup.",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn title_uses_uppercase_metric_and_capitalised_level() {
        let m = alert_message(Metric::Ph, AlertLevel::Low, 6.0, 6.5);
        assert_eq!(m.title, "Alert: PH Low");

        let m = alert_message(Metric::Temperature, AlertLevel::High, 30.0, 28.0);
        assert_eq!(m.title, "Alert: TEMPERATURE High");
    }

    #[test]
    fn body_states_direction_and_values() {
        let m = alert_message(Metric::Tds, AlertLevel::High, 450.0, 400.0);
        assert!(m.body.starts_with("TDS is above threshold. Current: 450, Threshold: 400"));

        let m = alert_message(Metric::Tds, AlertLevel::Low, 100.0, 150.0);
        assert!(m.body.starts_with("TDS is below threshold. Current: 100, Threshold: 150"));
    }

    #[test]
    fn tds_bodies_carry_mineral_hints() {
        let low = alert_message(Metric::Tds, AlertLevel::Low, 100.0, 150.0);
        assert!(low.body.ends_with("increase mineral content."));

        let high = alert_message(Metric::Tds, AlertLevel::High, 450.0, 400.0);
        assert!(high.body.ends_with("reduce mineral buildup."));
    }

    #[test]
    fn every_combination_has_a_distinct_remediation() {
        let mut seen = std::collections::HashSet::new();
        for metric in Metric::ORDERED {
            for level in [AlertLevel::Low, AlertLevel::High] {
                assert!(seen.insert(remediation(metric, level)));
            }
        }
        assert_eq!(seen.len(), 6);
    }

    #[test]
    fn fractional_values_render_plainly() {
        let m = alert_message(Metric::Ph, AlertLevel::High, 8.25, 8.0);
        assert!(m.body.contains("Current: 8.25, Threshold: 8"));
    }
}

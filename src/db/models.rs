use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

/// The three monitored water parameters.
///
/// `ORDERED` fixes the evaluation order so alert output is deterministic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    Ph,
    Temperature,
    Tds,
}

impl Metric {
    pub const ORDERED: [Metric; 3] = [Metric::Ph, Metric::Temperature, Metric::Tds];

    pub fn as_str(&self) -> &'static str {
        match self {
            Metric::Ph => "ph",
            Metric::Temperature => "temperature",
            Metric::Tds => "tds",
        }
    }

    /// Upper-cased form used in notification titles and bodies.
    pub fn label(&self) -> &'static str {
        match self {
            Metric::Ph => "PH",
            Metric::Temperature => "TEMPERATURE",
            Metric::Tds => "TDS",
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Metric {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s {
            "ph" => Ok(Self::Ph),
            "temperature" => Ok(Self::Temperature),
            "tds" => Ok(Self::Tds),
            other => Err(anyhow::anyhow!("unknown metric: {other:?}")),
        }
    }
}

/// Which bound was crossed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum AlertLevel {
    Low,
    High,
}

impl AlertLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertLevel::Low => "low",
            AlertLevel::High => "high",
        }
    }

    /// Capitalised form used in notification titles.
    pub fn label(&self) -> &'static str {
        match self {
            AlertLevel::Low => "Low",
            AlertLevel::High => "High",
        }
    }
}

impl fmt::Display for AlertLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Dashboard status severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Success,
    Warning,
    Info,
}

/// Latest sensor snapshot. A `None` field means the feed has not reported
/// that metric; partial readings are valid for threshold checks but not
/// for archival.
#[derive(Debug, Clone, Copy, Default, PartialEq, FromRow, Serialize, Deserialize, ToSchema)]
pub struct Reading {
    pub ph: Option<f64>,
    pub temperature: Option<f64>,
    pub tds: Option<f64>,
}

impl Reading {
    pub fn value(&self, metric: Metric) -> Option<f64> {
        match metric {
            Metric::Ph => self.ph,
            Metric::Temperature => self.temperature,
            Metric::Tds => self.tds,
        }
    }

    /// All three metrics present — required before archiving.
    pub fn is_complete(&self) -> bool {
        self.ph.is_some() && self.temperature.is_some() && self.tds.is_some()
    }
}

/// Inclusive acceptable range for one metric.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ThresholdRange {
    pub min: f64,
    pub max: f64,
}

impl ThresholdRange {
    pub fn is_valid(&self) -> bool {
        self.min < self.max
    }
}

/// The full threshold configuration, one range per metric.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ThresholdSet {
    pub ph: ThresholdRange,
    pub temperature: ThresholdRange,
    pub tds: ThresholdRange,
}

impl ThresholdSet {
    pub fn range(&self, metric: Metric) -> ThresholdRange {
        match metric {
            Metric::Ph => self.ph,
            Metric::Temperature => self.temperature,
            Metric::Tds => self.tds,
        }
    }
}

/// One archived reading, written by the periodic archiver.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct SensorLogEntry {
    pub id: Uuid,
    pub ph: f64,
    pub temperature: f64,
    pub tds: f64,
    pub recorded_at: DateTime<Utc>,
}

/// A registered push subscriber. Deactivated (never deleted) when the
/// transport reports its token permanently invalid.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct SubscriberEndpoint {
    pub id: Uuid,
    pub token: String,
    pub active: bool,
    pub last_error: Option<String>,
    pub last_error_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metric_from_str_roundtrip() {
        for m in Metric::ORDERED {
            assert_eq!(m.as_str().parse::<Metric>().unwrap(), m);
        }
    }

    #[test]
    fn metric_from_str_unknown_errors() {
        let err = "salinity".parse::<Metric>().unwrap_err();
        assert!(err.to_string().contains("unknown metric"));
    }

    #[test]
    fn reading_completeness() {
        let full = Reading { ph: Some(7.0), temperature: Some(25.0), tds: Some(300.0) };
        assert!(full.is_complete());

        let partial = Reading { tds: None, ..full };
        assert!(!partial.is_complete());
        assert_eq!(partial.value(Metric::Ph), Some(7.0));
        assert_eq!(partial.value(Metric::Tds), None);
    }

    #[test]
    fn threshold_range_validity() {
        assert!(ThresholdRange { min: 6.5, max: 8.0 }.is_valid());
        assert!(!ThresholdRange { min: 8.0, max: 8.0 }.is_valid());
        assert!(!ThresholdRange { min: 9.0, max: 8.0 }.is_valid());
    }
}

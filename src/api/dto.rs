use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::db::models::{AlertLevel, Metric, SensorLogEntry};

/// Request body for `POST /notifications/send`.
///
/// Every field is optional at the serde layer so that a missing field is a
/// 400 "Invalid alert payload" instead of a deserialisation rejection.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SendNotificationRequest {
    #[serde(rename = "type")]
    pub metric: Option<Metric>,
    pub level: Option<AlertLevel>,
    pub current_value: Option<f64>,
    pub threshold_value: Option<f64>,
}

/// Response for `POST /notifications/send`.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SendNotificationResponse {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    /// Present on throttle rejections: the configured cooldown window.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cooldown_minutes: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sent: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed: Option<usize>,
}

/// Request body for `POST /notifications/subscribe`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct SubscribeRequest {
    pub token: Option<String>,
}

/// Response for `POST /notifications/subscribe`.
#[derive(Debug, Serialize, ToSchema)]
pub struct SubscribeResponse {
    pub success: bool,
    pub message: String,
    /// Set when no real gateway is configured and the token was accepted
    /// without an outbound call.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub emulated: Option<bool>,
}

/// Query parameters for `GET /logs`.
#[derive(Debug, Deserialize)]
pub struct LogsQuery {
    /// Maximum number of entries, newest first. Defaults to 100.
    pub limit: Option<i64>,
}

/// One archived reading as served to clients.
#[derive(Debug, Serialize, ToSchema)]
pub struct SensorLogDto {
    pub id: Uuid,
    pub ph: f64,
    pub temperature: f64,
    pub tds: f64,
    pub timestamp: DateTime<Utc>,
}

impl From<SensorLogEntry> for SensorLogDto {
    fn from(entry: SensorLogEntry) -> Self {
        Self {
            id: entry.id,
            ph: entry.ph,
            temperature: entry.temperature,
            tds: entry.tds,
            timestamp: entry.recorded_at,
        }
    }
}

/// Response for `DELETE /logs`.
#[derive(Debug, Serialize, ToSchema)]
pub struct ClearLogsResponse {
    pub deleted: u64,
}

/// Query parameters for `GET /logs/export`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct ExportQuery {
    pub format: ExportFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Csv,
    Xlsx,
}

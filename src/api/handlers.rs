use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use utoipa::OpenApi;

use super::{
    dto::{
        ClearLogsResponse, ExportFormat, ExportQuery, LogsQuery, SendNotificationRequest,
        SendNotificationResponse, SensorLogDto, SubscribeRequest, SubscribeResponse,
    },
    errors::AppError,
    AppState,
};
use crate::alerts::evaluate::{self, AlertStatus};
use crate::alerts::fanout::FanoutReport;
use crate::alerts::service::BreachDispatch;
use crate::db::{
    self,
    models::{
        AlertLevel, Metric, Reading, SensorLogEntry, Severity, ThresholdRange, ThresholdSet,
    },
};
use crate::export;

// ---------------------------------------------------------------------------
// Sensors
// ---------------------------------------------------------------------------

/// Latest reading snapshot. Fields are null until the feed reports them.
#[utoipa::path(
    get,
    path = "/sensors/current",
    responses(
        (status = 200, description = "Latest reading snapshot", body = Reading),
        (status = 500, description = "Internal server error"),
    ),
    tag = "sensors"
)]
pub async fn get_current_reading(
    State(state): State<AppState>,
) -> Result<Json<Reading>, AppError> {
    let snapshot = db::load_snapshot(&state.pool).await?.unwrap_or_default();
    Ok(Json(snapshot))
}

/// The reading-updated trigger: persists the snapshot and runs threshold
/// evaluation, cooldown gating and notification fan-out for every breach.
#[utoipa::path(
    post,
    path = "/sensors/reading",
    request_body = Reading,
    responses(
        (status = 200, description = "Per-breach dispatch outcomes", body = Vec<BreachDispatch>),
        (status = 500, description = "Internal server error"),
    ),
    tag = "sensors"
)]
pub async fn post_reading(
    State(state): State<AppState>,
    Json(reading): Json<Reading>,
) -> Result<Json<Vec<BreachDispatch>>, AppError> {
    let dispatches = state.alerts.process_reading(&reading).await?;
    Ok(Json(dispatches))
}

/// Dashboard status strip: the current snapshot evaluated against the
/// current thresholds.
#[utoipa::path(
    get,
    path = "/status",
    responses(
        (status = 200, description = "Alert statuses for the current snapshot", body = Vec<AlertStatus>),
        (status = 500, description = "Internal server error"),
    ),
    tag = "sensors"
)]
pub async fn get_status(
    State(state): State<AppState>,
) -> Result<Json<Vec<AlertStatus>>, AppError> {
    let snapshot = db::load_snapshot(&state.pool).await?.unwrap_or_default();
    let thresholds = db::load_thresholds(&state.pool).await?;
    Ok(Json(evaluate::statuses(&snapshot, &thresholds)))
}

// ---------------------------------------------------------------------------
// Thresholds
// ---------------------------------------------------------------------------

/// Current threshold configuration.
#[utoipa::path(
    get,
    path = "/thresholds",
    responses(
        (status = 200, description = "Threshold configuration", body = ThresholdSet),
        (status = 500, description = "Internal server error"),
    ),
    tag = "thresholds"
)]
pub async fn get_thresholds(
    State(state): State<AppState>,
) -> Result<Json<ThresholdSet>, AppError> {
    Ok(Json(db::load_thresholds(&state.pool).await?))
}

/// Replace the threshold configuration. Each range must satisfy min < max;
/// a violation rejects the whole request and nothing is persisted.
#[utoipa::path(
    put,
    path = "/thresholds",
    request_body = ThresholdSet,
    responses(
        (status = 200, description = "Updated threshold configuration", body = ThresholdSet),
        (status = 400, description = "A range has min >= max"),
        (status = 500, description = "Internal server error"),
    ),
    tag = "thresholds"
)]
pub async fn put_thresholds(
    State(state): State<AppState>,
    Json(thresholds): Json<ThresholdSet>,
) -> Result<Json<ThresholdSet>, AppError> {
    for metric in Metric::ORDERED {
        if !thresholds.range(metric).is_valid() {
            return Err(AppError::BadRequest(format!(
                "{metric}: minimum must be less than maximum"
            )));
        }
    }

    db::save_thresholds(&state.pool, &thresholds).await?;
    Ok(Json(thresholds))
}

// ---------------------------------------------------------------------------
// Notifications
// ---------------------------------------------------------------------------

/// Manually send an alert notification (used by the dashboard's test
/// button). Throttled per metric+level key.
#[utoipa::path(
    post,
    path = "/notifications/send",
    request_body = SendNotificationRequest,
    responses(
        (status = 200, description = "Notification fanned out", body = SendNotificationResponse),
        (status = 400, description = "Invalid alert payload"),
        (status = 429, description = "Throttled — cooldown not elapsed", body = SendNotificationResponse),
        (status = 500, description = "Every delivery failed", body = SendNotificationResponse),
    ),
    tag = "notifications"
)]
pub async fn send_notification(
    State(state): State<AppState>,
    Json(request): Json<SendNotificationRequest>,
) -> Result<(StatusCode, Json<SendNotificationResponse>), AppError> {
    let (Some(metric), Some(level), Some(current_value), Some(threshold_value)) = (
        request.metric,
        request.level,
        request.current_value,
        request.threshold_value,
    ) else {
        tracing::error!("Invalid alert payload");
        return Err(AppError::BadRequest("Invalid alert payload".to_owned()));
    };

    let cooldown = state.alerts.cooldown();
    if !cooldown.can_send(metric, level).await {
        tracing::info!(
            metric = %metric,
            level = %level,
            cooldown_minutes = cooldown.cooldown_minutes(),
            "Notification throttled - cooldown period not elapsed"
        );
        return Ok((
            StatusCode::TOO_MANY_REQUESTS,
            Json(SendNotificationResponse {
                success: false,
                message: "Notification throttled - please wait before sending again".to_owned(),
                message_id: None,
                cooldown_minutes: Some(cooldown.cooldown_minutes()),
                sent: None,
                failed: None,
            }),
        ));
    }

    let report: FanoutReport = state
        .alerts
        .send_alert(metric, level, current_value, threshold_value)
        .await?;

    let response = if report.sent > 0 {
        (
            StatusCode::OK,
            SendNotificationResponse {
                success: true,
                message: "Notification sent!".to_owned(),
                message_id: report.message_id,
                cooldown_minutes: None,
                sent: Some(report.sent),
                failed: Some(report.failed),
            },
        )
    } else if report.failed == 0 {
        // Nobody registered — a no-op, not an error
        (
            StatusCode::OK,
            SendNotificationResponse {
                success: true,
                message: "No active subscriber endpoints".to_owned(),
                message_id: None,
                cooldown_minutes: None,
                sent: Some(0),
                failed: Some(0),
            },
        )
    } else {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            SendNotificationResponse {
                success: false,
                message: "Error sending notification".to_owned(),
                message_id: None,
                cooldown_minutes: None,
                sent: Some(0),
                failed: Some(report.failed),
            },
        )
    };

    Ok((response.0, Json(response.1)))
}

/// Register a push token. The endpoint row is created (or reactivated)
/// only after the gateway accepts the token.
#[utoipa::path(
    post,
    path = "/notifications/subscribe",
    request_body = SubscribeRequest,
    responses(
        (status = 200, description = "Token registered", body = SubscribeResponse),
        (status = 400, description = "Missing registration token"),
        (status = 500, description = "Gateway rejected the registration", body = SubscribeResponse),
    ),
    tag = "notifications"
)]
pub async fn subscribe(
    State(state): State<AppState>,
    Json(request): Json<SubscribeRequest>,
) -> Result<(StatusCode, Json<SubscribeResponse>), AppError> {
    let Some(token) = request.token.filter(|t| !t.is_empty()) else {
        return Err(AppError::BadRequest("Missing registration token".to_owned()));
    };

    let transport = state.alerts.transport();
    if let Err(e) = transport.register(&token).await {
        tracing::error!(error = %e, "Error registering push token");
        return Ok((
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(SubscribeResponse {
                success: false,
                message: "Error registering token".to_owned(),
                emulated: None,
            }),
        ));
    }

    // Re-registration of a deactivated token brings it back to life
    sqlx::query(
        "INSERT INTO subscriber_endpoints (token) VALUES ($1) \
         ON CONFLICT (token) DO UPDATE \
         SET active = TRUE, last_error = NULL, last_error_at = NULL",
    )
    .bind(&token)
    .execute(&state.pool)
    .await?;

    let response = if transport.is_emulated() {
        SubscribeResponse {
            success: true,
            message: "Token received (emulator mode)".to_owned(),
            emulated: Some(true),
        }
    } else {
        SubscribeResponse {
            success: true,
            message: "Successfully subscribed to alerts".to_owned(),
            emulated: None,
        }
    };
    Ok((StatusCode::OK, Json(response)))
}

// ---------------------------------------------------------------------------
// Archive
// ---------------------------------------------------------------------------

/// Archived readings, newest first.
#[utoipa::path(
    get,
    path = "/logs",
    params(
        ("limit" = Option<i64>, Query, description = "Maximum entries to return (default 100)"),
    ),
    responses(
        (status = 200, description = "Archived readings", body = Vec<SensorLogDto>),
        (status = 500, description = "Internal server error"),
    ),
    tag = "logs"
)]
pub async fn get_logs(
    State(state): State<AppState>,
    Query(params): Query<LogsQuery>,
) -> Result<Json<Vec<SensorLogDto>>, AppError> {
    let limit = params.limit.unwrap_or(100);
    let entries: Vec<SensorLogEntry> = sqlx::query_as(
        "SELECT id, ph, temperature, tds, recorded_at \
         FROM sensor_logs \
         ORDER BY recorded_at DESC \
         LIMIT $1",
    )
    .bind(limit)
    .fetch_all(&state.pool)
    .await?;

    Ok(Json(entries.into_iter().map(Into::into).collect()))
}

/// Bulk-delete the whole archive. The only way `sensor_logs` rows go away.
#[utoipa::path(
    delete,
    path = "/logs",
    responses(
        (status = 200, description = "Archive cleared", body = ClearLogsResponse),
        (status = 500, description = "Internal server error"),
    ),
    tag = "logs"
)]
pub async fn clear_logs(
    State(state): State<AppState>,
) -> Result<Json<ClearLogsResponse>, AppError> {
    let result = sqlx::query("DELETE FROM sensor_logs")
        .execute(&state.pool)
        .await?;
    tracing::info!(deleted = result.rows_affected(), "Sensor logs cleared");
    Ok(Json(ClearLogsResponse { deleted: result.rows_affected() }))
}

/// Download the archive as CSV or spreadsheet XML. An empty archive
/// produces no file (204).
#[utoipa::path(
    get,
    path = "/logs/export",
    params(
        ("format" = ExportFormat, Query, description = "Export format"),
    ),
    responses(
        (status = 200, description = "File download"),
        (status = 204, description = "Archive is empty, no file produced"),
        (status = 500, description = "Internal server error"),
    ),
    tag = "logs"
)]
pub async fn export_logs(
    State(state): State<AppState>,
    Query(params): Query<ExportQuery>,
) -> Result<Response, AppError> {
    let entries: Vec<SensorLogEntry> = sqlx::query_as(
        "SELECT id, ph, temperature, tds, recorded_at \
         FROM sensor_logs \
         ORDER BY recorded_at ASC",
    )
    .fetch_all(&state.pool)
    .await?;

    let (content, content_type, extension) = match params.format {
        ExportFormat::Csv => (export::to_csv(&entries), "text/csv; charset=utf-8", "csv"),
        ExportFormat::Xlsx => (
            export::to_spreadsheet_xml(&entries),
            "application/vnd.ms-excel; charset=utf-8",
            "xlsx",
        ),
    };

    let Some(content) = content else {
        return Ok(StatusCode::NO_CONTENT.into_response());
    };

    let filename = export::export_filename(extension, Utc::now());
    Ok((
        [
            (header::CONTENT_TYPE, content_type.to_owned()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{filename}\""),
            ),
        ],
        content,
    )
        .into_response())
}

// ---------------------------------------------------------------------------
// Health check
// ---------------------------------------------------------------------------

/// Returns `200 OK` with `{"status":"ok"}` when the server is running.
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is healthy"),
    ),
    tag = "system"
)]
pub async fn health() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({ "status": "ok" }))
}

// ---------------------------------------------------------------------------
// OpenAPI spec
// ---------------------------------------------------------------------------

#[derive(OpenApi)]
#[openapi(
    paths(
        get_current_reading,
        post_reading,
        get_status,
        get_thresholds,
        put_thresholds,
        send_notification,
        subscribe,
        get_logs,
        clear_logs,
        export_logs,
        health,
    ),
    components(schemas(
        Reading,
        Metric,
        AlertLevel,
        Severity,
        AlertStatus,
        ThresholdRange,
        ThresholdSet,
        FanoutReport,
        BreachDispatch,
        SendNotificationRequest,
        SendNotificationResponse,
        SubscribeRequest,
        SubscribeResponse,
        SensorLogDto,
        ClearLogsResponse,
        ExportFormat,
    )),
    tags(
        (name = "sensors",       description = "Reading snapshot and evaluation endpoints"),
        (name = "thresholds",    description = "Threshold configuration"),
        (name = "notifications", description = "Push notification endpoints"),
        (name = "logs",          description = "Archived readings and exports"),
        (name = "system",        description = "System endpoints"),
    ),
    info(
        title = "Aquarium Monitor API",
        version = "0.1.0",
        description = "REST API for aquarium sensor monitoring and alerting"
    )
)]
pub struct ApiDoc;

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

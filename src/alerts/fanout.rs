use anyhow::{Context, Result};
use futures::future::join_all;
use serde::Serialize;
use sqlx::PgPool;
use tracing::{info, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::db::models::SubscriberEndpoint;
use crate::push::{PushError, PushMessage, PushTransport};

/// Aggregate outcome of one notification batch. Diagnostic only — callers
/// never branch on the counts beyond reporting them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, ToSchema)]
pub struct FanoutReport {
    pub sent: usize,
    pub failed: usize,
    /// Gateway message ID of one successful delivery, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
}

/// Deliver `message` to every active subscriber endpoint.
///
/// Deliveries run concurrently and the batch waits for all of them to
/// settle; one endpoint failing never cancels or blocks its siblings.
/// Endpoints whose token the transport reports as permanently invalid are
/// deactivated as a side effect. Transient failures leave the endpoint
/// active — the next natural trigger is the retry.
pub async fn broadcast(
    pool: &PgPool,
    transport: &dyn PushTransport,
    message: &PushMessage,
) -> Result<FanoutReport> {
    let endpoints: Vec<SubscriberEndpoint> = sqlx::query_as(
        "SELECT id, token, active, last_error, last_error_at, created_at \
         FROM subscriber_endpoints \
         WHERE active \
         ORDER BY created_at",
    )
    .fetch_all(pool)
    .await
    .context("failed to load active subscriber endpoints")?;

    if endpoints.is_empty() {
        info!("No active subscriber endpoints, skipping notification fan-out");
        return Ok(FanoutReport::default());
    }

    let attempts = join_all(endpoints.iter().map(|endpoint| async move {
        let outcome = transport.send(&endpoint.token, message).await;
        (endpoint, outcome)
    }))
    .await;

    let mut report = FanoutReport::default();
    for (endpoint, outcome) in attempts {
        match outcome {
            Ok(message_id) => {
                report.sent += 1;
                report.message_id.get_or_insert(message_id);
            }
            Err(e) if e.is_permanent() => {
                report.failed += 1;
                warn!(
                    endpoint_id = %endpoint.id,
                    error = %e,
                    "Subscriber token permanently invalid, deactivating endpoint"
                );
                deactivate(pool, endpoint.id, &e).await;
            }
            Err(e) => {
                report.failed += 1;
                warn!(
                    endpoint_id = %endpoint.id,
                    error = %e,
                    "Push delivery failed, endpoint stays active"
                );
            }
        }
    }

    info!(sent = report.sent, failed = report.failed, "Notification fan-out settled");
    Ok(report)
}

/// Mark an endpoint inactive and record the error that killed it. A failure
/// here is logged and swallowed so it cannot taint the batch report.
async fn deactivate(pool: &PgPool, endpoint_id: Uuid, error: &PushError) {
    let result = sqlx::query(
        "UPDATE subscriber_endpoints \
         SET active = FALSE, last_error = $2, last_error_at = now() \
         WHERE id = $1",
    )
    .bind(endpoint_id)
    .bind(error.to_string())
    .execute(pool)
    .await;

    if let Err(e) = result {
        warn!(endpoint_id = %endpoint_id, error = %e, "Failed to deactivate subscriber endpoint");
    }
}

use std::sync::Arc;

use anyhow::Result;
use serde::Serialize;
use serde_json::json;
use sqlx::PgPool;
use tracing::info;
use utoipa::ToSchema;

use crate::db::{self, models::{AlertLevel, Metric, Reading}};
use crate::push::{PushMessage, PushTransport};

use super::cooldown::CooldownGate;
use super::evaluate::find_breaches;
use super::fanout::{broadcast, FanoutReport};
use super::message::alert_message;

/// Per-breach outcome of one reading-updated event, returned for
/// diagnostics.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct BreachDispatch {
    pub metric: Metric,
    pub level: AlertLevel,
    pub throttled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<FanoutReport>,
}

/// Orchestrates the alert pipeline: evaluate → cooldown gate → format →
/// fan-out → record cooldown.
#[derive(Clone)]
pub struct AlertService {
    pool: PgPool,
    transport: Arc<dyn PushTransport>,
    cooldown: CooldownGate,
}

impl AlertService {
    pub fn new(pool: PgPool, transport: Arc<dyn PushTransport>, cooldown: CooldownGate) -> Self {
        Self { pool, transport, cooldown }
    }

    pub fn cooldown(&self) -> &CooldownGate {
        &self.cooldown
    }

    pub fn transport(&self) -> &dyn PushTransport {
        self.transport.as_ref()
    }

    /// Handle a reading-updated event: persist the new snapshot, then run
    /// the notification pipeline for every threshold breach.
    ///
    /// Thresholds are fetched once per invocation and passed by value; no
    /// component reads them ambiently.
    pub async fn process_reading(&self, reading: &Reading) -> Result<Vec<BreachDispatch>> {
        info!(?reading, "Sensor data changed, checking thresholds");
        db::save_snapshot(&self.pool, reading).await?;

        let thresholds = db::load_thresholds(&self.pool).await?;
        let mut dispatches = Vec::new();

        for breach in find_breaches(reading, &thresholds) {
            if !self.cooldown.can_send(breach.metric, breach.level).await {
                info!(metric = %breach.metric, level = %breach.level, "Notification throttled");
                dispatches.push(BreachDispatch {
                    metric: breach.metric,
                    level: breach.level,
                    throttled: true,
                    report: None,
                });
                continue;
            }

            let report = self
                .send_alert(breach.metric, breach.level, breach.value, breach.limit)
                .await?;
            dispatches.push(BreachDispatch {
                metric: breach.metric,
                level: breach.level,
                throttled: false,
                report: Some(report),
            });
        }

        info!(breaches = dispatches.len(), "Threshold check completed");
        Ok(dispatches)
    }

    /// Format and fan out one alert, then arm the cooldown.
    ///
    /// `record_sent` runs once per batch, after all deliveries settle, and
    /// only when at least one of them succeeded — so a fully failed batch
    /// does not suppress the next trigger.
    pub async fn send_alert(
        &self,
        metric: Metric,
        level: AlertLevel,
        current_value: f64,
        threshold_value: f64,
    ) -> Result<FanoutReport> {
        let message = build_push_message(metric, level, current_value, threshold_value);
        let report = broadcast(&self.pool, self.transport.as_ref(), &message).await?;

        if report.sent > 0 {
            self.cooldown.record_sent(metric, level).await;
            info!(
                metric = %metric,
                level = %level,
                message_id = ?report.message_id,
                "Notification sent"
            );
        }

        Ok(report)
    }
}

/// Assemble the transport payload: formatted text plus the structured data
/// fields clients use to deep-link into the dashboard.
pub fn build_push_message(
    metric: Metric,
    level: AlertLevel,
    current_value: f64,
    threshold_value: f64,
) -> PushMessage {
    let text = alert_message(metric, level, current_value, threshold_value);
    PushMessage {
        title: text.title,
        body: text.body,
        data: json!({
            "type": metric.as_str(),
            "level": level.as_str(),
            "currentValue": current_value.to_string(),
            "thresholdValue": threshold_value.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::push::PushError;

    /// Transport double that can be switched to fail every delivery.
    #[derive(Default)]
    struct FakeTransport {
        fail_all_transient: bool,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl PushTransport for FakeTransport {
        async fn send(&self, _token: &str, _message: &PushMessage) -> Result<String, PushError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_all_transient {
                Err(PushError::Transient("gateway unavailable".into()))
            } else {
                Ok("msg-1".into())
            }
        }

        async fn register(&self, _token: &str) -> Result<(), PushError> {
            Ok(())
        }
    }

    fn service(pool: PgPool, transport: FakeTransport) -> (AlertService, Arc<FakeTransport>) {
        let transport = Arc::new(transport);
        let svc = AlertService::new(
            pool.clone(),
            transport.clone(),
            CooldownGate::new(pool, 30),
        );
        (svc, transport)
    }

    async fn insert_endpoint(pool: &PgPool, token: &str) {
        sqlx::query("INSERT INTO subscriber_endpoints (token) VALUES ($1)")
            .bind(token)
            .execute(pool)
            .await
            .unwrap();
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn normal_reading_produces_no_dispatches(pool: PgPool) {
        let (svc, transport) = service(pool.clone(), FakeTransport::default());
        let reading = Reading { ph: Some(7.0), temperature: Some(25.0), tds: Some(300.0) };

        let dispatches = svc.process_reading(&reading).await.unwrap();

        assert!(dispatches.is_empty());
        assert_eq!(transport.calls.load(Ordering::SeqCst), 0);
        // Snapshot was still persisted
        assert_eq!(db::load_snapshot(&pool).await.unwrap(), Some(reading));
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn breach_sends_then_second_trigger_is_throttled(pool: PgPool) {
        insert_endpoint(&pool, "tok-1").await;
        let (svc, transport) = service(pool.clone(), FakeTransport::default());
        let reading = Reading { ph: Some(9.0), temperature: Some(25.0), tds: Some(300.0) };

        let first = svc.process_reading(&reading).await.unwrap();
        assert_eq!(first.len(), 1);
        assert!(!first[0].throttled);
        assert_eq!(first[0].report.as_ref().unwrap().sent, 1);
        assert_eq!(transport.calls.load(Ordering::SeqCst), 1);

        // Same breach straight away: gated, no transport call
        let second = svc.process_reading(&reading).await.unwrap();
        assert_eq!(second.len(), 1);
        assert!(second[0].throttled);
        assert_eq!(transport.calls.load(Ordering::SeqCst), 1);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn fully_failed_batch_does_not_arm_the_cooldown(pool: PgPool) {
        insert_endpoint(&pool, "tok-1").await;
        let (svc, _) = service(
            pool.clone(),
            FakeTransport { fail_all_transient: true, ..Default::default() },
        );
        let reading = Reading { ph: Some(9.0), temperature: Some(25.0), tds: Some(300.0) };

        let dispatches = svc.process_reading(&reading).await.unwrap();
        assert_eq!(dispatches[0].report.as_ref().unwrap().sent, 0);
        assert_eq!(dispatches[0].report.as_ref().unwrap().failed, 1);

        // Nothing succeeded, so the gate must still be open
        assert!(svc.cooldown().can_send(Metric::Ph, AlertLevel::High).await);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn multiple_breaches_each_get_their_own_batch(pool: PgPool) {
        insert_endpoint(&pool, "tok-1").await;
        let (svc, transport) = service(pool.clone(), FakeTransport::default());
        // ph high and temperature low at once
        let reading = Reading { ph: Some(9.0), temperature: Some(18.0), tds: Some(300.0) };

        let dispatches = svc.process_reading(&reading).await.unwrap();

        assert_eq!(dispatches.len(), 2);
        assert_eq!(dispatches[0].metric, Metric::Ph);
        assert_eq!(dispatches[1].metric, Metric::Temperature);
        assert_eq!(transport.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn push_message_carries_structured_data() {
        let msg = build_push_message(Metric::Ph, AlertLevel::High, 9.0, 8.0);
        assert_eq!(msg.title, "Alert: PH High");
        assert_eq!(msg.data["type"], "ph");
        assert_eq!(msg.data["level"], "high");
        assert_eq!(msg.data["currentValue"], "9");
        assert_eq!(msg.data["thresholdValue"], "8");
    }
}

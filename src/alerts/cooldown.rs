use chrono::Utc;
use sqlx::PgPool;
use tracing::error;

use crate::db::models::{AlertLevel, Metric};

/// Per-`{metric}-{level}` notification throttle backed by the
/// `notification_throttle` table.
///
/// The gate deliberately **fails open**: if the timestamp lookup itself
/// fails, sending is allowed. Losing an alert is worse than an occasional
/// duplicate. For the same reason there is no locking around check-then-set;
/// two concurrent evaluations of the same key can both pass and produce one
/// duplicate notification inside the window. Accepted behavior.
#[derive(Debug, Clone)]
pub struct CooldownGate {
    pool: PgPool,
    cooldown_minutes: i64,
}

impl CooldownGate {
    pub fn new(pool: PgPool, cooldown_minutes: i64) -> Self {
        Self { pool, cooldown_minutes }
    }

    /// The configured window, reported back to throttled callers.
    pub fn cooldown_minutes(&self) -> i64 {
        self.cooldown_minutes
    }

    fn window_ms(&self) -> i64 {
        self.cooldown_minutes * 60_000
    }

    fn key(metric: Metric, level: AlertLevel) -> String {
        format!("{metric}-{level}")
    }

    /// True when no notification for this key was ever recorded, or the
    /// last one is older than the cooldown window.
    pub async fn can_send(&self, metric: Metric, level: AlertLevel) -> bool {
        let key = Self::key(metric, level);
        let row: Result<Option<(i64,)>, sqlx::Error> = sqlx::query_as(
            "SELECT last_sent_ms FROM notification_throttle WHERE throttle_key = $1",
        )
        .bind(&key)
        .fetch_optional(&self.pool)
        .await;

        match row {
            Ok(None) => true,
            Ok(Some((last_sent_ms,))) => {
                Utc::now().timestamp_millis() - last_sent_ms >= self.window_ms()
            }
            Err(e) => {
                error!(throttle_key = %key, error = %e, "Cooldown lookup failed, failing open");
                true
            }
        }
    }

    /// Overwrite the last-sent timestamp for this key with the current time.
    /// Failures are logged and swallowed; they must never block the caller.
    pub async fn record_sent(&self, metric: Metric, level: AlertLevel) {
        let key = Self::key(metric, level);
        let now_ms = Utc::now().timestamp_millis();

        let result = sqlx::query(
            "INSERT INTO notification_throttle (throttle_key, last_sent_ms) \
             VALUES ($1, $2) \
             ON CONFLICT (throttle_key) DO UPDATE SET last_sent_ms = EXCLUDED.last_sent_ms",
        )
        .bind(&key)
        .bind(now_ms)
        .execute(&self.pool)
        .await;

        if let Err(e) = result {
            error!(throttle_key = %key, error = %e, "Failed to record notification timestamp");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_format() {
        assert_eq!(CooldownGate::key(Metric::Ph, AlertLevel::Low), "ph-low");
        assert_eq!(CooldownGate::key(Metric::Tds, AlertLevel::High), "tds-high");
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn first_send_is_allowed(pool: PgPool) {
        let gate = CooldownGate::new(pool, 30);
        assert!(gate.can_send(Metric::Ph, AlertLevel::Low).await);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn record_then_immediate_check_is_blocked(pool: PgPool) {
        let gate = CooldownGate::new(pool, 30);
        gate.record_sent(Metric::Ph, AlertLevel::Low).await;
        assert!(!gate.can_send(Metric::Ph, AlertLevel::Low).await);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn keys_are_independent(pool: PgPool) {
        let gate = CooldownGate::new(pool, 30);
        gate.record_sent(Metric::Ph, AlertLevel::Low).await;

        assert!(gate.can_send(Metric::Ph, AlertLevel::High).await);
        assert!(gate.can_send(Metric::Temperature, AlertLevel::Low).await);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn elapsed_window_reopens_the_gate(pool: PgPool) {
        let gate = CooldownGate::new(pool.clone(), 30);
        gate.record_sent(Metric::Tds, AlertLevel::High).await;
        assert!(!gate.can_send(Metric::Tds, AlertLevel::High).await);

        // Age the stored timestamp past the window instead of sleeping
        let aged = Utc::now().timestamp_millis() - 31 * 60_000;
        sqlx::query("UPDATE notification_throttle SET last_sent_ms = $1 WHERE throttle_key = $2")
            .bind(aged)
            .bind("tds-high")
            .execute(&pool)
            .await
            .unwrap();

        assert!(gate.can_send(Metric::Tds, AlertLevel::High).await);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn record_overwrites_previous_timestamp(pool: PgPool) {
        let gate = CooldownGate::new(pool.clone(), 30);

        // Seed an aged row, then record again: the row must be overwritten,
        // closing the gate once more.
        let aged = Utc::now().timestamp_millis() - 60 * 60_000;
        sqlx::query(
            "INSERT INTO notification_throttle (throttle_key, last_sent_ms) VALUES ($1, $2)",
        )
        .bind("ph-high")
        .bind(aged)
        .execute(&pool)
        .await
        .unwrap();
        assert!(gate.can_send(Metric::Ph, AlertLevel::High).await);

        gate.record_sent(Metric::Ph, AlertLevel::High).await;
        assert!(!gate.can_send(Metric::Ph, AlertLevel::High).await);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn lookup_failure_fails_open(pool: PgPool) {
        let gate = CooldownGate::new(pool.clone(), 30);
        gate.record_sent(Metric::Ph, AlertLevel::Low).await;
        assert!(!gate.can_send(Metric::Ph, AlertLevel::Low).await);

        // With the store unreachable the gate must allow sending
        pool.close().await;
        assert!(gate.can_send(Metric::Ph, AlertLevel::Low).await);
    }
}

use std::time::Duration;

use anyhow::{Context, Result};
use sqlx::PgPool;
use tokio::time;
use tracing::{error, info, warn};

use crate::db::{self, models::SensorLogEntry};

/// Periodically copies the latest reading snapshot into the append-only
/// `sensor_logs` archive.
///
/// The loop is the in-process stand-in for an external scheduler; its
/// minimum granularity is one minute and each tick is an independent unit
/// of work.
pub struct ArchiverService {
    pool: PgPool,
    interval: Duration,
}

impl ArchiverService {
    pub fn new(pool: PgPool, interval_secs: u64) -> Self {
        Self {
            pool,
            interval: Duration::from_secs(interval_secs),
        }
    }

    /// Runs the archival loop indefinitely.
    /// Spawn this via `tokio::spawn`.
    pub async fn run(self) {
        info!(interval_secs = self.interval.as_secs(), "Archiver loop started");
        let mut ticker = time::interval(self.interval);

        loop {
            ticker.tick().await;
            if let Err(e) = self.run_once().await {
                error!(error = %e, "Archiver tick failed");
            }
        }
    }

    /// One archival tick. An incomplete (or absent) snapshot is a skip with
    /// a warning, not an error; a store failure during the append
    /// propagates.
    pub async fn run_once(&self) -> Result<Option<SensorLogEntry>> {
        let snapshot = db::load_snapshot(&self.pool).await?;

        let Some(reading) = snapshot.filter(|r| r.is_complete()) else {
            warn!("Incomplete sensor data, skipping log entry");
            return Ok(None);
        };

        let entry: SensorLogEntry = sqlx::query_as(
            "INSERT INTO sensor_logs (ph, temperature, tds) \
             VALUES ($1, $2, $3) \
             RETURNING id, ph, temperature, tds, recorded_at",
        )
        .bind(reading.ph)
        .bind(reading.temperature)
        .bind(reading.tds)
        .fetch_one(&self.pool)
        .await
        .context("failed to append sensor log entry")?;

        info!(entry_id = %entry.id, "Sensor data logged successfully");
        Ok(Some(entry))
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::db::models::Reading;

    async fn log_count(pool: &PgPool) -> i64 {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM sensor_logs")
            .fetch_one(pool)
            .await
            .unwrap();
        count
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn missing_snapshot_skips_the_tick(pool: PgPool) {
        let archiver = ArchiverService::new(pool.clone(), 60);
        assert!(archiver.run_once().await.unwrap().is_none());
        assert_eq!(log_count(&pool).await, 0);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn partial_reading_skips_the_tick(pool: PgPool) {
        let reading = Reading { ph: Some(7.0), temperature: Some(25.0), tds: None };
        db::save_snapshot(&pool, &reading).await.unwrap();

        let archiver = ArchiverService::new(pool.clone(), 60);
        assert!(archiver.run_once().await.unwrap().is_none());
        assert_eq!(log_count(&pool).await, 0);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn complete_reading_is_archived_with_server_timestamp(pool: PgPool) {
        let reading = Reading { ph: Some(7.2), temperature: Some(25.5), tds: Some(310.0) };
        db::save_snapshot(&pool, &reading).await.unwrap();

        let archiver = ArchiverService::new(pool.clone(), 60);
        let entry = archiver.run_once().await.unwrap().unwrap();

        assert_eq!(entry.ph, 7.2);
        assert_eq!(entry.temperature, 25.5);
        assert_eq!(entry.tds, 310.0);
        assert!((Utc::now() - entry.recorded_at).num_seconds().abs() < 5);
        assert_eq!(log_count(&pool).await, 1);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn each_tick_appends_a_new_row(pool: PgPool) {
        let reading = Reading { ph: Some(7.2), temperature: Some(25.5), tds: Some(310.0) };
        db::save_snapshot(&pool, &reading).await.unwrap();

        let archiver = ArchiverService::new(pool.clone(), 60);
        archiver.run_once().await.unwrap();
        archiver.run_once().await.unwrap();

        assert_eq!(log_count(&pool).await, 2);
    }
}

pub mod models;

use anyhow::{Context, Result};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use models::{Metric, Reading, ThresholdRange, ThresholdSet};

pub async fn create_pool(database_url: &str) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await?;
    Ok(pool)
}

pub async fn run_migrations(pool: &PgPool) -> Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

/// Load the full threshold configuration. Every evaluation fetches this
/// once and passes it by value — there is no ambient threshold state.
pub async fn load_thresholds(pool: &PgPool) -> Result<ThresholdSet> {
    let rows: Vec<(String, f64, f64)> =
        sqlx::query_as("SELECT metric, min_value, max_value FROM thresholds")
            .fetch_all(pool)
            .await
            .context("failed to load thresholds")?;

    let range_for = |metric: Metric| -> Result<ThresholdRange> {
        rows.iter()
            .find(|(m, _, _)| m == metric.as_str())
            .map(|&(_, min, max)| ThresholdRange { min, max })
            .with_context(|| format!("no threshold row for metric {metric}"))
    };

    Ok(ThresholdSet {
        ph: range_for(Metric::Ph)?,
        temperature: range_for(Metric::Temperature)?,
        tds: range_for(Metric::Tds)?,
    })
}

/// Replace the threshold configuration. Callers must have validated
/// `min < max` already; the table CHECK is the last line of defence.
pub async fn save_thresholds(pool: &PgPool, thresholds: &ThresholdSet) -> Result<()> {
    let mut tx = pool.begin().await?;
    for metric in Metric::ORDERED {
        let range = thresholds.range(metric);
        sqlx::query(
            "INSERT INTO thresholds (metric, min_value, max_value, updated_at) \
             VALUES ($1, $2, $3, now()) \
             ON CONFLICT (metric) DO UPDATE \
             SET min_value = EXCLUDED.min_value, \
                 max_value = EXCLUDED.max_value, \
                 updated_at = now()",
        )
        .bind(metric.as_str())
        .bind(range.min)
        .bind(range.max)
        .execute(&mut *tx)
        .await
        .with_context(|| format!("failed to save threshold for {metric}"))?;
    }
    tx.commit().await?;
    Ok(())
}

/// Latest reading snapshot, or `None` if the feed has never reported.
pub async fn load_snapshot(pool: &PgPool) -> Result<Option<Reading>> {
    let reading = sqlx::query_as::<_, Reading>(
        "SELECT ph, temperature, tds FROM sensor_state WHERE id = TRUE",
    )
    .fetch_optional(pool)
    .await
    .context("failed to load sensor snapshot")?;
    Ok(reading)
}

/// Overwrite the latest reading snapshot with the full payload of a
/// reading-updated event.
pub async fn save_snapshot(pool: &PgPool, reading: &Reading) -> Result<()> {
    sqlx::query(
        "INSERT INTO sensor_state (id, ph, temperature, tds, updated_at) \
         VALUES (TRUE, $1, $2, $3, now()) \
         ON CONFLICT (id) DO UPDATE \
         SET ph = EXCLUDED.ph, \
             temperature = EXCLUDED.temperature, \
             tds = EXCLUDED.tds, \
             updated_at = now()",
    )
    .bind(reading.ph)
    .bind(reading.temperature)
    .bind(reading.tds)
    .execute(pool)
    .await
    .context("failed to save sensor snapshot")?;
    Ok(())
}

use anyhow::Result;
use sqlx::PgPool;
use time::OffsetDateTime;

use crate::domain::UsageRecord;

/// Fetch a user's usage records within a half-open time window, time-ordered.
pub async fn usage_in_window(
    pool: &PgPool,
    user_id: &str,
    start: OffsetDateTime,
    end: OffsetDateTime,
) -> Result<Vec<UsageRecord>> {
    let rows = sqlx::query_as::<_, UsageRecord>(
        r#"
        SELECT
            user_id,
            appliance_id,
            ts,
            duration_minutes,
            power_consumed
        FROM usage_records
        WHERE user_id = $1
          AND ts >= $2
          AND ts <  $3
        ORDER BY ts
        "#,
    )
    .bind(user_id)
    .bind(start)
    .bind(end)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

pub async fn insert_usage(pool: &PgPool, record: &UsageRecord) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO usage_records (user_id, appliance_id, ts, duration_minutes, power_consumed)
        VALUES ($1, $2, $3, $4, $5)
        "#,
    )
    .bind(&record.user_id)
    .bind(&record.appliance_id)
    .bind(record.ts)
    .bind(record.duration_minutes)
    .bind(record.power_consumed)
    .execute(pool)
    .await?;

    Ok(())
}

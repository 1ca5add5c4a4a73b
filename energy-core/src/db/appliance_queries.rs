use anyhow::Result;
use sqlx::PgPool;
use time::OffsetDateTime;

use crate::domain::{Appliance, ApplianceStatus};

const APPLIANCE_COLUMNS: &str =
    "id, user_id, name, power_rating, location, status, last_switched_on, created_at";

/// Map of appliance id to display name for one user, used by the dashboard
/// aggregator to resolve breakdown labels.
pub async fn appliance_names(pool: &PgPool, user_id: &str) -> Result<Vec<(String, String)>> {
    let rows = sqlx::query_as::<_, (String, String)>(
        "SELECT id, name FROM appliances WHERE user_id = $1",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

pub async fn appliance_by_id(pool: &PgPool, id: &str) -> Result<Option<Appliance>> {
    let sql = format!("SELECT {APPLIANCE_COLUMNS} FROM appliances WHERE id = $1");
    let row = sqlx::query_as::<_, Appliance>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?;

    Ok(row)
}

pub async fn appliances_for_user(pool: &PgPool, user_id: &str) -> Result<Vec<Appliance>> {
    let sql = format!(
        "SELECT {APPLIANCE_COLUMNS} FROM appliances WHERE user_id = $1 ORDER BY created_at"
    );
    let rows = sqlx::query_as::<_, Appliance>(&sql)
        .bind(user_id)
        .fetch_all(pool)
        .await?;

    Ok(rows)
}

pub async fn insert_appliance(pool: &PgPool, appliance: &Appliance) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO appliances (id, user_id, name, power_rating, location, status, last_switched_on, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        "#,
    )
    .bind(&appliance.id)
    .bind(&appliance.user_id)
    .bind(&appliance.name)
    .bind(appliance.power_rating)
    .bind(&appliance.location)
    .bind(appliance.status.as_str())
    .bind(appliance.last_switched_on)
    .bind(appliance.created_at)
    .execute(pool)
    .await?;

    Ok(())
}

/// Returns the number of rows updated (0 when the appliance does not exist).
pub async fn set_appliance_status(
    pool: &PgPool,
    id: &str,
    status: ApplianceStatus,
    last_switched_on: Option<OffsetDateTime>,
) -> Result<u64> {
    let result = sqlx::query(
        "UPDATE appliances SET status = $2, last_switched_on = $3 WHERE id = $1",
    )
    .bind(id)
    .bind(status.as_str())
    .bind(last_switched_on)
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}

pub async fn delete_appliance(pool: &PgPool, id: &str) -> Result<u64> {
    let result = sqlx::query("DELETE FROM appliances WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected())
}

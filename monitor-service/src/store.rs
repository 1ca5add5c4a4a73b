use std::collections::HashMap;

use anyhow::Result;
use sqlx::PgPool;
use time::OffsetDateTime;

use energy_core::db::{appliance_queries, usage_queries};
use energy_core::domain::{Appliance, ApplianceStatus, UsageRecord};

/// Persistence seam for the service. The core engine never touches this
/// directly; the service queries through it and hands plain slices to the
/// pure functions. An in-memory implementation backs the service tests.
#[async_trait::async_trait]
pub trait Storage: Send + Sync {
    async fn usage_in_window(
        &self,
        user_id: &str,
        start: OffsetDateTime,
        end: OffsetDateTime,
    ) -> Result<Vec<UsageRecord>>;

    async fn insert_usage(&self, record: &UsageRecord) -> Result<()>;

    /// Appliance id -> display name for one user.
    async fn appliance_names(&self, user_id: &str) -> Result<HashMap<String, String>>;

    async fn appliance_by_id(&self, id: &str) -> Result<Option<Appliance>>;

    async fn appliances_for_user(&self, user_id: &str) -> Result<Vec<Appliance>>;

    async fn insert_appliance(&self, appliance: &Appliance) -> Result<()>;

    /// Returns the number of rows updated (0 when the id is unknown).
    async fn set_appliance_status(
        &self,
        id: &str,
        status: ApplianceStatus,
        last_switched_on: Option<OffsetDateTime>,
    ) -> Result<u64>;

    /// Returns the number of rows deleted (0 when the id is unknown).
    async fn delete_appliance(&self, id: &str) -> Result<u64>;
}

/// Postgres-backed storage over the `energy-core` query layer.
#[derive(Clone)]
pub struct PgStorage {
    pool: PgPool,
}

impl PgStorage {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl Storage for PgStorage {
    async fn usage_in_window(
        &self,
        user_id: &str,
        start: OffsetDateTime,
        end: OffsetDateTime,
    ) -> Result<Vec<UsageRecord>> {
        usage_queries::usage_in_window(&self.pool, user_id, start, end).await
    }

    async fn insert_usage(&self, record: &UsageRecord) -> Result<()> {
        usage_queries::insert_usage(&self.pool, record).await
    }

    async fn appliance_names(&self, user_id: &str) -> Result<HashMap<String, String>> {
        let pairs = appliance_queries::appliance_names(&self.pool, user_id).await?;
        Ok(pairs.into_iter().collect())
    }

    async fn appliance_by_id(&self, id: &str) -> Result<Option<Appliance>> {
        appliance_queries::appliance_by_id(&self.pool, id).await
    }

    async fn appliances_for_user(&self, user_id: &str) -> Result<Vec<Appliance>> {
        appliance_queries::appliances_for_user(&self.pool, user_id).await
    }

    async fn insert_appliance(&self, appliance: &Appliance) -> Result<()> {
        appliance_queries::insert_appliance(&self.pool, appliance).await
    }

    async fn set_appliance_status(
        &self,
        id: &str,
        status: ApplianceStatus,
        last_switched_on: Option<OffsetDateTime>,
    ) -> Result<u64> {
        appliance_queries::set_appliance_status(&self.pool, id, status, last_switched_on).await
    }

    async fn delete_appliance(&self, id: &str) -> Result<u64> {
        appliance_queries::delete_appliance(&self.pool, id).await
    }
}

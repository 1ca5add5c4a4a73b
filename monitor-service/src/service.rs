use std::sync::Arc;

use time::macros::datetime;
use time::OffsetDateTime;

use energy_core::domain::{
    Appliance, ApplianceStatus, CostBreakdown, Tariff, TariffError, UsageRecord,
};

use crate::engine::{self, BillResult, DashboardAggregate, ForecastResult, ForecastWindow, Window};
use crate::store::Storage;

/// Lower bound used when the forecast policy is all-history; matches the
/// record-validation sanity window, so no valid record predates it.
const HISTORY_FLOOR: OffsetDateTime = datetime!(2000-01-01 00:00:00 UTC);

#[derive(thiserror::Error, Debug)]
pub enum ServiceError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("{0} not found")]
    NotFound(String),
    #[error("storage unavailable: {0}")]
    Storage(anyhow::Error),
}

impl From<engine::EngineError> for ServiceError {
    fn from(e: engine::EngineError) -> Self {
        match e {
            engine::EngineError::InvalidInput(msg) => ServiceError::InvalidInput(msg),
        }
    }
}

impl From<TariffError> for ServiceError {
    fn from(e: TariffError) -> Self {
        ServiceError::InvalidInput(e.to_string())
    }
}

/// Request-scoped operations over injected collaborators. Holds no mutable
/// state of its own; every operation is independent of every other in-flight
/// one, so many may run concurrently without locking here. Storage failures
/// propagate as [`ServiceError::Storage`] without retries.
pub struct MonitorService<S> {
    store: Arc<S>,
    tariff: Tariff,
    forecast_window: ForecastWindow,
}

impl<S: Storage> MonitorService<S> {
    pub fn new(store: Arc<S>, tariff: Tariff, forecast_window: ForecastWindow) -> Self {
        Self {
            store,
            tariff,
            forecast_window,
        }
    }

    pub fn tariff(&self) -> &Tariff {
        &self.tariff
    }

    /// Dashboard aggregates for one user over a validated window.
    pub async fn dashboard(
        &self,
        user_id: &str,
        window: Window,
    ) -> Result<DashboardAggregate, ServiceError> {
        let records = self
            .store
            .usage_in_window(user_id, window.start, window.end)
            .await
            .map_err(ServiceError::Storage)?;
        let names = self
            .store
            .appliance_names(user_id)
            .await
            .map_err(ServiceError::Storage)?;

        metrics::counter!("dashboard_requests_total").increment(1);
        Ok(engine::aggregate(&records, window, &names))
    }

    /// Month-to-date bill under the active tariff.
    pub async fn bill(
        &self,
        user_id: &str,
        now: OffsetDateTime,
    ) -> Result<BillResult, ServiceError> {
        let period = engine::billing_period(now);
        let records = self
            .store
            .usage_in_window(user_id, period.start, period.end)
            .await
            .map_err(ServiceError::Storage)?;

        metrics::counter!("bill_requests_total").increment(1);
        Ok(engine::calculate_bill(&records, &self.tariff)?)
    }

    /// 30-day consumption and cost projection from the configured history
    /// window.
    pub async fn forecast(
        &self,
        user_id: &str,
        now: OffsetDateTime,
    ) -> Result<ForecastResult, ServiceError> {
        let start = self.forecast_window.query_start(now).unwrap_or(HISTORY_FLOOR);
        let records = self
            .store
            .usage_in_window(user_id, start, now)
            .await
            .map_err(ServiceError::Storage)?;

        metrics::counter!("forecast_requests_total").increment(1);
        Ok(engine::predict(&records, &self.tariff)?)
    }

    /// Evaluate the active tariff for an arbitrary consumption quantity.
    pub fn evaluate_tariff(&self, units: f64) -> Result<CostBreakdown, ServiceError> {
        Ok(self.tariff.cost_of(units)?)
    }

    pub async fn register_appliance(
        &self,
        user_id: &str,
        name: &str,
        power_rating: f64,
        location: &str,
        now: OffsetDateTime,
    ) -> Result<Appliance, ServiceError> {
        if name.trim().is_empty() {
            return Err(ServiceError::InvalidInput(
                "appliance name must not be empty".to_string(),
            ));
        }
        if !power_rating.is_finite() || power_rating <= 0.0 {
            return Err(ServiceError::InvalidInput(format!(
                "power_rating must be positive, got {power_rating}"
            )));
        }

        let appliance = Appliance {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            name: name.trim().to_string(),
            power_rating,
            location: location.to_string(),
            status: ApplianceStatus::Off,
            last_switched_on: None,
            created_at: now,
        };
        self.store
            .insert_appliance(&appliance)
            .await
            .map_err(ServiceError::Storage)?;

        tracing::info!(appliance_id = %appliance.id, user_id, "appliance registered");
        Ok(appliance)
    }

    pub async fn appliances(&self, user_id: &str) -> Result<Vec<Appliance>, ServiceError> {
        self.store
            .appliances_for_user(user_id)
            .await
            .map_err(ServiceError::Storage)
    }

    /// Flip an appliance ON or OFF. The ON->OFF transition derives a usage
    /// record from the rated draw and elapsed time; that write policy lives
    /// here, outside the aggregation core. A request for the current status
    /// is a no-op.
    pub async fn toggle_appliance(
        &self,
        appliance_id: &str,
        status: ApplianceStatus,
        now: OffsetDateTime,
    ) -> Result<Appliance, ServiceError> {
        let mut appliance = self
            .store
            .appliance_by_id(appliance_id)
            .await
            .map_err(ServiceError::Storage)?
            .ok_or_else(|| ServiceError::NotFound(format!("appliance {appliance_id}")))?;

        if appliance.status == status {
            return Ok(appliance);
        }

        let last_switched_on = match status {
            ApplianceStatus::On => Some(now),
            ApplianceStatus::Off => {
                if let Some(record) = usage_for_off_transition(&appliance, now) {
                    record.validate().map_err(|e| {
                        ServiceError::InvalidInput(e.to_string())
                    })?;
                    self.store
                        .insert_usage(&record)
                        .await
                        .map_err(ServiceError::Storage)?;
                    metrics::counter!("usage_records_created_total").increment(1);
                    tracing::info!(
                        appliance_id,
                        kwh = record.power_consumed,
                        "usage record derived from OFF transition"
                    );
                }
                None
            }
        };

        let updated = self
            .store
            .set_appliance_status(appliance_id, status, last_switched_on)
            .await
            .map_err(ServiceError::Storage)?;
        if updated == 0 {
            return Err(ServiceError::NotFound(format!("appliance {appliance_id}")));
        }

        appliance.status = status;
        appliance.last_switched_on = last_switched_on;
        Ok(appliance)
    }

    pub async fn remove_appliance(&self, appliance_id: &str) -> Result<(), ServiceError> {
        let deleted = self
            .store
            .delete_appliance(appliance_id)
            .await
            .map_err(ServiceError::Storage)?;
        if deleted == 0 {
            return Err(ServiceError::NotFound(format!("appliance {appliance_id}")));
        }
        Ok(())
    }
}

/// Derive the usage record emitted by an ON->OFF transition, if any time
/// elapsed since the appliance was switched on. Energy is rated watts
/// converted to kW times elapsed hours; the record's timestamp is the end of
/// the interval (the moment of switch-off).
fn usage_for_off_transition(appliance: &Appliance, now: OffsetDateTime) -> Option<UsageRecord> {
    let on_at = appliance.last_switched_on?;
    let elapsed = now - on_at;
    if !elapsed.is_positive() {
        return None;
    }

    let hours = elapsed.as_seconds_f64() / 3600.0;
    Some(UsageRecord {
        user_id: appliance.user_id.clone(),
        appliance_id: appliance.id.clone(),
        ts: now,
        duration_minutes: Some(elapsed.as_seconds_f64() / 60.0),
        power_consumed: appliance.power_rating / 1000.0 * hours,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use time::macros::datetime;

    /// In-memory storage for service tests.
    #[derive(Default)]
    struct MemStorage {
        appliances: Mutex<HashMap<String, Appliance>>,
        usage: Mutex<Vec<UsageRecord>>,
    }

    #[async_trait::async_trait]
    impl Storage for MemStorage {
        async fn usage_in_window(
            &self,
            user_id: &str,
            start: OffsetDateTime,
            end: OffsetDateTime,
        ) -> anyhow::Result<Vec<UsageRecord>> {
            let mut records: Vec<UsageRecord> = self
                .usage
                .lock()
                .unwrap()
                .iter()
                .filter(|r| r.user_id == user_id && r.ts >= start && r.ts < end)
                .cloned()
                .collect();
            records.sort_by_key(|r| r.ts);
            Ok(records)
        }

        async fn insert_usage(&self, record: &UsageRecord) -> anyhow::Result<()> {
            self.usage.lock().unwrap().push(record.clone());
            Ok(())
        }

        async fn appliance_names(&self, user_id: &str) -> anyhow::Result<HashMap<String, String>> {
            Ok(self
                .appliances
                .lock()
                .unwrap()
                .values()
                .filter(|a| a.user_id == user_id)
                .map(|a| (a.id.clone(), a.name.clone()))
                .collect())
        }

        async fn appliance_by_id(&self, id: &str) -> anyhow::Result<Option<Appliance>> {
            Ok(self.appliances.lock().unwrap().get(id).cloned())
        }

        async fn appliances_for_user(&self, user_id: &str) -> anyhow::Result<Vec<Appliance>> {
            let mut out: Vec<Appliance> = self
                .appliances
                .lock()
                .unwrap()
                .values()
                .filter(|a| a.user_id == user_id)
                .cloned()
                .collect();
            out.sort_by_key(|a| a.created_at);
            Ok(out)
        }

        async fn insert_appliance(&self, appliance: &Appliance) -> anyhow::Result<()> {
            self.appliances
                .lock()
                .unwrap()
                .insert(appliance.id.clone(), appliance.clone());
            Ok(())
        }

        async fn set_appliance_status(
            &self,
            id: &str,
            status: ApplianceStatus,
            last_switched_on: Option<OffsetDateTime>,
        ) -> anyhow::Result<u64> {
            let mut appliances = self.appliances.lock().unwrap();
            match appliances.get_mut(id) {
                Some(a) => {
                    a.status = status;
                    a.last_switched_on = last_switched_on;
                    Ok(1)
                }
                None => Ok(0),
            }
        }

        async fn delete_appliance(&self, id: &str) -> anyhow::Result<u64> {
            Ok(self.appliances.lock().unwrap().remove(id).map_or(0, |_| 1))
        }
    }

    fn service() -> (Arc<MemStorage>, MonitorService<MemStorage>) {
        let store = Arc::new(MemStorage::default());
        let svc = MonitorService::new(
            store.clone(),
            Tariff::bescom_lt2a(),
            ForecastWindow::TrailingDays(30),
        );
        (store, svc)
    }

    #[tokio::test]
    async fn toggle_off_emits_usage_record_from_rating_and_elapsed() {
        let (store, svc) = service();
        let registered = svc
            .register_appliance(
                "u-1",
                "Air Conditioner",
                1500.0,
                "Bedroom",
                datetime!(2024-06-01 00:00:00 UTC),
            )
            .await
            .unwrap();

        svc.toggle_appliance(
            &registered.id,
            ApplianceStatus::On,
            datetime!(2024-06-01 10:00:00 UTC),
        )
        .await
        .unwrap();
        let off = svc
            .toggle_appliance(
                &registered.id,
                ApplianceStatus::Off,
                datetime!(2024-06-01 12:00:00 UTC),
            )
            .await
            .unwrap();
        assert_eq!(off.status, ApplianceStatus::Off);
        assert_eq!(off.last_switched_on, None);

        let usage = store.usage.lock().unwrap();
        assert_eq!(usage.len(), 1);
        // 1.5 kW for 2 hours.
        assert!((usage[0].power_consumed - 3.0).abs() < 1e-9);
        assert_eq!(usage[0].duration_minutes, Some(120.0));
        assert_eq!(usage[0].ts, datetime!(2024-06-01 12:00:00 UTC));
    }

    #[tokio::test]
    async fn toggle_same_status_is_a_noop() {
        let (store, svc) = service();
        let registered = svc
            .register_appliance("u-1", "Heater", 800.0, "Hall", datetime!(2024-06-01 00:00:00 UTC))
            .await
            .unwrap();

        let unchanged = svc
            .toggle_appliance(
                &registered.id,
                ApplianceStatus::Off,
                datetime!(2024-06-01 10:00:00 UTC),
            )
            .await
            .unwrap();
        assert_eq!(unchanged.status, ApplianceStatus::Off);
        assert!(store.usage.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn toggle_unknown_appliance_is_not_found() {
        let (_, svc) = service();
        let res = svc
            .toggle_appliance("missing", ApplianceStatus::On, datetime!(2024-06-01 10:00:00 UTC))
            .await;
        assert!(matches!(res, Err(ServiceError::NotFound(_))));
    }

    #[tokio::test]
    async fn register_rejects_non_positive_rating() {
        let (_, svc) = service();
        let res = svc
            .register_appliance("u-1", "Lamp", 0.0, "Desk", datetime!(2024-06-01 00:00:00 UTC))
            .await;
        assert!(matches!(res, Err(ServiceError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn dashboard_resolves_names_and_sums_consumption() {
        let (store, svc) = service();
        let fridge = svc
            .register_appliance(
                "u-1",
                "Refrigerator",
                200.0,
                "Kitchen",
                datetime!(2024-06-01 00:00:00 UTC),
            )
            .await
            .unwrap();

        store
            .insert_usage(&UsageRecord {
                user_id: "u-1".to_string(),
                appliance_id: fridge.id.clone(),
                ts: datetime!(2024-06-01 03:00:00 UTC),
                duration_minutes: Some(60.0),
                power_consumed: 0.2,
            })
            .await
            .unwrap();
        store
            .insert_usage(&UsageRecord {
                user_id: "u-1".to_string(),
                appliance_id: "deleted".to_string(),
                ts: datetime!(2024-06-01 04:00:00 UTC),
                duration_minutes: Some(60.0),
                power_consumed: 0.8,
            })
            .await
            .unwrap();

        let window = Window::new(
            datetime!(2024-06-01 00:00:00 UTC),
            datetime!(2024-06-02 00:00:00 UTC),
        )
        .unwrap();
        let agg = svc.dashboard("u-1", window).await.unwrap();
        assert!((agg.total_consumption - 1.0).abs() < 1e-9);
        assert_eq!(agg.appliance_breakdown["Refrigerator"], 0.2);
        assert_eq!(agg.appliance_breakdown["Unknown"], 0.8);
    }

    #[tokio::test]
    async fn bill_covers_month_to_date_only() {
        let (store, svc) = service();
        for (ts, kwh) in [
            (datetime!(2024-05-28 10:00:00 UTC), 100.0), // previous month
            (datetime!(2024-06-03 10:00:00 UTC), 70.0),
            (datetime!(2024-06-10 10:00:00 UTC), 50.0),
        ] {
            store
                .insert_usage(&UsageRecord {
                    user_id: "u-1".to_string(),
                    appliance_id: "a-1".to_string(),
                    ts,
                    duration_minutes: None,
                    power_consumed: kwh,
                })
                .await
                .unwrap();
        }

        let bill = svc.bill("u-1", datetime!(2024-06-15 00:00:00 UTC)).await.unwrap();
        assert!((bill.total_units - 120.0).abs() < 1e-9);
        assert!((bill.total_payable - 730.5).abs() < 1e-9);
    }

    #[tokio::test]
    async fn forecast_uses_trailing_window() {
        let (store, svc) = service();
        for (ts, kwh) in [
            (datetime!(2024-04-01 10:00:00 UTC), 500.0), // outside trailing 30 days
            (datetime!(2024-06-10 10:00:00 UTC), 3.0),
        ] {
            store
                .insert_usage(&UsageRecord {
                    user_id: "u-1".to_string(),
                    appliance_id: "a-1".to_string(),
                    ts,
                    duration_minutes: None,
                    power_consumed: kwh,
                })
                .await
                .unwrap();
        }

        let forecast = svc
            .forecast("u-1", datetime!(2024-06-15 00:00:00 UTC))
            .await
            .unwrap();
        assert_eq!(forecast.avg_daily_usage, 3.0);
        assert_eq!(forecast.predicted_units, 90.0);
    }

    #[tokio::test]
    async fn forecast_without_history_is_zero_valued() {
        let (_, svc) = service();
        let forecast = svc
            .forecast("u-1", datetime!(2024-06-15 00:00:00 UTC))
            .await
            .unwrap();
        assert_eq!(forecast, ForecastResult::default());
    }

    #[tokio::test]
    async fn evaluate_tariff_rejects_negative_units() {
        let (_, svc) = service();
        assert!(matches!(
            svc.evaluate_tariff(-5.0),
            Err(ServiceError::InvalidInput(_))
        ));
        let cost = svc.evaluate_tariff(120.0).unwrap();
        assert!((cost.total - 730.5).abs() < 1e-9);
    }

    #[tokio::test]
    async fn remove_unknown_appliance_is_not_found() {
        let (_, svc) = service();
        assert!(matches!(
            svc.remove_appliance("missing").await,
            Err(ServiceError::NotFound(_))
        ));
    }
}

use std::collections::BTreeSet;

use time::{Date, Duration, OffsetDateTime, UtcOffset};

use energy_core::domain::{Tariff, UsageRecord};

use crate::engine::EngineError;

/// Days projected forward by the forecast.
pub const FORECAST_HORIZON_DAYS: f64 = 30.0;

/// How much history feeds the forecast. Trailing 30 days is the default
/// policy; all-history is available for deployments with sparse data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForecastWindow {
    TrailingDays(u16),
    AllHistory,
}

impl Default for ForecastWindow {
    fn default() -> Self {
        ForecastWindow::TrailingDays(30)
    }
}

impl ForecastWindow {
    /// Start of the history query, `None` meaning unbounded.
    pub fn query_start(&self, now: OffsetDateTime) -> Option<OffsetDateTime> {
        match self {
            ForecastWindow::TrailingDays(days) => Some(now - Duration::days(i64::from(*days))),
            ForecastWindow::AllHistory => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ForecastResult {
    pub avg_daily_usage: f64,
    pub predicted_units: f64,
    pub predicted_cost: f64,
}

/// Naive linear extrapolation: average daily consumption over the distinct
/// calendar dates (UTC) present in the history, projected over the next 30
/// days and priced through the tariff. No seasonality, trend fitting, or
/// confidence interval; that is a stated limitation of this model.
///
/// An empty history yields the all-zero forecast rather than an error.
pub fn predict(records: &[UsageRecord], tariff: &Tariff) -> Result<ForecastResult, EngineError> {
    if records.is_empty() {
        return Ok(ForecastResult::default());
    }

    let total_units: f64 = records.iter().map(|r| r.power_consumed).sum();
    let unique_days: BTreeSet<Date> = records
        .iter()
        .map(|r| r.ts.to_offset(UtcOffset::UTC).date())
        .collect();

    // max(..., 1) guards the division; with records present the set is
    // non-empty, but the guard keeps the expression total.
    let avg_daily_usage = total_units / unique_days.len().max(1) as f64;
    let predicted_units = avg_daily_usage * FORECAST_HORIZON_DAYS;
    let predicted_cost = tariff.cost_of(predicted_units)?.total;

    Ok(ForecastResult {
        avg_daily_usage,
        predicted_units,
        predicted_cost,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn record(ts: OffsetDateTime, kwh: f64) -> UsageRecord {
        UsageRecord {
            user_id: "u-1".to_string(),
            appliance_id: "a-1".to_string(),
            ts,
            duration_minutes: None,
            power_consumed: kwh,
        }
    }

    #[test]
    fn empty_history_yields_zero_forecast() {
        let forecast = predict(&[], &Tariff::bescom_lt2a()).unwrap();
        assert_eq!(forecast, ForecastResult::default());
    }

    #[test]
    fn single_day_single_record() {
        let tariff = Tariff::bescom_lt2a();
        let records = vec![record(datetime!(2024-06-01 12:00:00 UTC), 3.0)];

        let forecast = predict(&records, &tariff).unwrap();
        assert_eq!(forecast.avg_daily_usage, 3.0);
        assert_eq!(forecast.predicted_units, 90.0);
        assert!((forecast.predicted_cost - tariff.cost_of(90.0).unwrap().total).abs() < 1e-9);
    }

    #[test]
    fn same_day_records_count_one_distinct_day() {
        let records = vec![
            record(datetime!(2024-06-01 08:00:00 UTC), 1.0),
            record(datetime!(2024-06-01 20:00:00 UTC), 2.0),
        ];
        let forecast = predict(&records, &Tariff::bescom_lt2a()).unwrap();
        assert_eq!(forecast.avg_daily_usage, 3.0);
    }

    #[test]
    fn averages_across_distinct_days() {
        let records = vec![
            record(datetime!(2024-06-01 08:00:00 UTC), 2.0),
            record(datetime!(2024-06-02 08:00:00 UTC), 4.0),
            record(datetime!(2024-06-03 08:00:00 UTC), 6.0),
        ];
        let forecast = predict(&records, &Tariff::bescom_lt2a()).unwrap();
        assert!((forecast.avg_daily_usage - 4.0).abs() < 1e-9);
        assert!((forecast.predicted_units - 120.0).abs() < 1e-9);
    }

    #[test]
    fn distinct_days_use_utc_dates() {
        // 01:00 at +05:30 on June 2nd is still June 1st in UTC, so both
        // records land on the same day.
        let records = vec![
            record(datetime!(2024-06-01 12:00:00 UTC), 1.0),
            record(datetime!(2024-06-02 01:00:00 +05:30), 1.0),
        ];
        let forecast = predict(&records, &Tariff::bescom_lt2a()).unwrap();
        assert_eq!(forecast.avg_daily_usage, 2.0);
    }

    #[test]
    fn trailing_window_query_start() {
        let now = datetime!(2024-06-30 00:00:00 UTC);
        assert_eq!(
            ForecastWindow::TrailingDays(30).query_start(now),
            Some(datetime!(2024-05-31 00:00:00 UTC)),
        );
        assert_eq!(ForecastWindow::AllHistory.query_start(now), None);
    }
}

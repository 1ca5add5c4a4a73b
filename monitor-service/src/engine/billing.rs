use time::{OffsetDateTime, Time, UtcOffset};

use energy_core::domain::{Tariff, UsageRecord};

use crate::engine::{EngineError, Window};

/// A computed bill for one user's billing period.
#[derive(Debug, Clone)]
pub struct BillResult {
    pub total_units: f64,
    pub fixed_charge: f64,
    pub variable_charge: f64,
    pub total_payable: f64,
    pub tariff_name: String,
}

/// Calendar-month-to-date billing period in UTC: from 00:00 on day 1 of the
/// current month through `now`. No proration; a user who starts mid-month is
/// billed for whatever records exist since day 1.
pub fn billing_period(now: OffsetDateTime) -> Window {
    let now = now.to_offset(UtcOffset::UTC);
    let start = now
        .replace_time(Time::MIDNIGHT)
        .replace_day(1)
        .expect("day 1 is valid in every month");
    Window { start, end: now }
}

/// Compute the bill for records already restricted to the billing period.
///
/// The monetary arithmetic is delegated entirely to the tariff model; an
/// empty record set produces the `cost_of(0)` base bill rather than an
/// error, so the bill is always renderable.
pub fn calculate_bill(records: &[UsageRecord], tariff: &Tariff) -> Result<BillResult, EngineError> {
    let total_units: f64 = records.iter().map(|r| r.power_consumed).sum();
    let cost = tariff.cost_of(total_units)?;

    Ok(BillResult {
        total_units,
        fixed_charge: cost.fixed_charge,
        variable_charge: cost.variable_charge,
        total_payable: cost.total,
        tariff_name: tariff.name().to_string(),
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
            duration_minutes: Some(30.0),
            power_consumed: kwh,
        }
    }

    #[test]
    fn billing_period_starts_on_day_one_utc() {
        let w = billing_period(datetime!(2024-06-17 15:30:00 UTC));
        assert_eq!(w.start, datetime!(2024-06-01 00:00:00 UTC));
        assert_eq!(w.end, datetime!(2024-06-17 15:30:00 UTC));
    }

    #[test]
    fn billing_period_normalizes_offset_inputs() {
        // 03:00 on July 1st at +05:30 is still June 30th in UTC.
        let w = billing_period(datetime!(2024-07-01 03:00:00 +05:30));
        assert_eq!(w.start, datetime!(2024-06-01 00:00:00 UTC));
    }

    #[test]
    fn empty_period_bills_the_base_charge() {
        let tariff = Tariff::bescom_lt2a();
        let bill = calculate_bill(&[], &tariff).unwrap();
        assert_eq!(bill.total_units, 0.0);
        assert_eq!(bill.variable_charge, 0.0);
        assert_eq!(bill.fixed_charge, 60.0);
        assert_eq!(bill.total_payable, 60.0);
        assert_eq!(bill.tariff_name, "BESCOM LT2A");
    }

    #[test]
    fn bill_matches_tariff_evaluation_of_summed_units() {
        let tariff = Tariff::bescom_lt2a();
        let records = vec![
            record(datetime!(2024-06-02 10:00:00 UTC), 40.0),
            record(datetime!(2024-06-10 10:00:00 UTC), 50.0),
            record(datetime!(2024-06-15 10:00:00 UTC), 30.0),
        ];

        let bill = calculate_bill(&records, &tariff).unwrap();
        assert!((bill.total_units - 120.0).abs() < 1e-9);

        let cost = tariff.cost_of(120.0).unwrap();
        assert!((bill.variable_charge - cost.variable_charge).abs() < 1e-9);
        assert_eq!(bill.fixed_charge, cost.fixed_charge);
        assert!((bill.total_payable - cost.total).abs() < 1e-9);
    }
}

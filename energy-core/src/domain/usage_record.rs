use time::OffsetDateTime;

/// One logged interval of energy consumption by one appliance.
///
/// Records are written once (on an ON->OFF appliance transition, or by the
/// demo-data seeder) and never mutated. `appliance_id` may reference an
/// appliance that has since been deleted.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct UsageRecord {
    pub user_id: String,
    pub appliance_id: String,
    pub ts: OffsetDateTime,
    pub duration_minutes: Option<f64>,
    /// Energy consumed over the interval, in kWh.
    pub power_consumed: f64,
}

#[derive(thiserror::Error, Debug)]
pub enum InvalidRecord {
    #[error("power_consumed must be non-negative, got {0}")]
    NegativeConsumption(f64),
    #[error("duration_minutes must be positive, got {0}")]
    NonPositiveDuration(f64),
    #[error("timestamp out of allowed range")]
    TimestampOutOfRange,
}

impl UsageRecord {
    /// Validate a record before it is written.
    ///
    /// Rules:
    /// - power_consumed must be non-negative.
    /// - duration_minutes, when present, must be positive.
    /// - ts must be within a broad sanity window [2000-01-01, 2100-01-01].
    pub fn validate(&self) -> Result<(), InvalidRecord> {
        if !self.power_consumed.is_finite() || self.power_consumed < 0.0 {
            return Err(InvalidRecord::NegativeConsumption(self.power_consumed));
        }

        if let Some(minutes) = self.duration_minutes {
            if !minutes.is_finite() || minutes <= 0.0 {
                return Err(InvalidRecord::NonPositiveDuration(minutes));
            }
        }

        let min_ts = time::macros::datetime!(2000-01-01 00:00:00 UTC);
        let max_ts = time::macros::datetime!(2100-01-01 00:00:00 UTC);
        if self.ts < min_ts || self.ts > max_ts {
            return Err(InvalidRecord::TimestampOutOfRange);
        }

        Ok(())
    }
}

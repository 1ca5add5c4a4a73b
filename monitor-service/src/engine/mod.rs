pub mod aggregate;
pub mod billing;
pub mod forecast;

pub use aggregate::{aggregate, DashboardAggregate};
pub use billing::{billing_period, calculate_bill, BillResult};
pub use forecast::{predict, ForecastResult, ForecastWindow};

use time::{OffsetDateTime, UtcOffset};

use energy_core::domain::TariffError;

#[derive(thiserror::Error, Debug)]
pub enum EngineError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl From<TariffError> for EngineError {
    fn from(e: TariffError) -> Self {
        EngineError::InvalidInput(e.to_string())
    }
}

/// A half-open time window `[start, end)`, normalized to UTC.
#[derive(Debug, Clone, Copy)]
pub struct Window {
    pub start: OffsetDateTime,
    pub end: OffsetDateTime,
}

impl Window {
    /// Build a validated window. `start == end` is permitted and denotes an
    /// empty window; `start > end` is rejected.
    pub fn new(start: OffsetDateTime, end: OffsetDateTime) -> Result<Self, EngineError> {
        if start > end {
            return Err(EngineError::InvalidInput(
                "window start must not be after window end".to_string(),
            ));
        }
        Ok(Window {
            start: start.to_offset(UtcOffset::UTC),
            end: end.to_offset(UtcOffset::UTC),
        })
    }

    pub fn contains(&self, ts: OffsetDateTime) -> bool {
        ts >= self.start && ts < self.end
    }
}

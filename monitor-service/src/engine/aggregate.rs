use std::collections::{BTreeMap, HashMap};

use time::{OffsetDateTime, UtcOffset};

use energy_core::domain::UsageRecord;

use crate::engine::Window;

/// Label used when a record's appliance id no longer resolves to a name
/// (the appliance was deleted after the usage was logged).
pub const UNKNOWN_APPLIANCE: &str = "Unknown";

/// Time-bucketed dashboard aggregates for one user and window.
///
/// Both maps are `BTreeMap` so iteration order is deterministic; hour-bucket
/// keys sort lexicographically in chronological order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DashboardAggregate {
    /// Total kWh over the window.
    pub total_consumption: f64,
    /// Appliance display name -> summed kWh.
    pub appliance_breakdown: BTreeMap<String, f64>,
    /// Hour bucket label -> summed kWh.
    pub hourly_data: BTreeMap<String, f64>,
}

/// Truncate a timestamp to its UTC hour and render a sortable bucket label,
/// e.g. `2024-06-01T13:00:00`.
pub fn hour_bucket(ts: OffsetDateTime) -> String {
    let ts = ts.to_offset(UtcOffset::UTC);
    format!(
        "{:04}-{:02}-{:02}T{:02}:00:00",
        ts.year(),
        u8::from(ts.month()),
        ts.day(),
        ts.hour()
    )
}

/// Aggregate usage records over a half-open window.
///
/// Records outside the window are ignored, so callers may pass either a
/// pre-filtered set or a superset. `names` is the appliance-id -> name
/// lookup supplied by the caller; ids missing from it are grouped under
/// [`UNKNOWN_APPLIANCE`]. An empty input yields the zero aggregate.
pub fn aggregate(
    records: &[UsageRecord],
    window: Window,
    names: &HashMap<String, String>,
) -> DashboardAggregate {
    let mut agg = DashboardAggregate::default();

    for record in records.iter().filter(|r| window.contains(r.ts)) {
        agg.total_consumption += record.power_consumed;

        let name = names
            .get(&record.appliance_id)
            .map(String::as_str)
            .unwrap_or(UNKNOWN_APPLIANCE);
        *agg.appliance_breakdown.entry(name.to_string()).or_insert(0.0) +=
            record.power_consumed;

        *agg.hourly_data.entry(hour_bucket(record.ts)).or_insert(0.0) +=
            record.power_consumed;
    }

    agg
}

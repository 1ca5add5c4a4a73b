pub mod appliance;
pub mod tariff;
pub mod usage_record;

pub use appliance::{Appliance, ApplianceStatus, InvalidStatus};
pub use tariff::{CostBreakdown, Slab, Tariff, TariffError};
pub use usage_record::{InvalidRecord, UsageRecord};

pub mod appliance_queries;
pub mod usage_queries;

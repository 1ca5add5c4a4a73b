use serde::Deserialize;
use std::fs;

use energy_core::domain::Tariff;

use crate::engine::ForecastWindow;

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub uri: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    pub bind_addr: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    pub bind_addr: String,
}

/// Active tariff selection. The slabbed policy is the hard-coded BESCOM
/// LT2A constant; a flat tariff takes its parameters from the file.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TariffConfig {
    Slabbed,
    Flat {
        name: String,
        fixed_charge: f64,
        per_unit_charge: f64,
    },
}

impl Default for TariffConfig {
    fn default() -> Self {
        TariffConfig::Slabbed
    }
}

impl TariffConfig {
    pub fn to_tariff(&self) -> Tariff {
        match self {
            TariffConfig::Slabbed => Tariff::bescom_lt2a(),
            TariffConfig::Flat {
                name,
                fixed_charge,
                per_unit_charge,
            } => Tariff::Flat {
                name: name.clone(),
                fixed_charge: *fixed_charge,
                per_unit_charge: *per_unit_charge,
            },
        }
    }
}

/// Forecast history policy; trailing 30 days when not configured.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum ForecastConfig {
    TrailingDays { days: u16 },
    AllHistory,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        ForecastConfig::TrailingDays { days: 30 }
    }
}

impl ForecastConfig {
    pub fn window(&self) -> ForecastWindow {
        match self {
            ForecastConfig::TrailingDays { days } => ForecastWindow::TrailingDays(*days),
            ForecastConfig::AllHistory => ForecastWindow::AllHistory,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AssistantConfig {
    pub api_key: Option<String>,
    #[serde(default = "default_assistant_model")]
    pub model: String,
}

fn default_assistant_model() -> String {
    "gemini-1.5-flash".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub http: HttpConfig,
    pub metrics: Option<MetricsConfig>,
    #[serde(default)]
    pub tariff: TariffConfig,
    #[serde(default)]
    pub forecast: ForecastConfig,
    pub assistant: Option<AssistantConfig>,
}

impl AppConfig {
    pub fn load() -> anyhow::Result<Self> {
        use std::env;

        let path = env::var("MONITOR_CONFIG").unwrap_or_else(|_| "monitor-config.toml".to_string());
        let contents = fs::read_to_string(&path)?;
        let cfg: AppConfig = toml::from_str(&contents)?;
        Ok(cfg)
    }
}

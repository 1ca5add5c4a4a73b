use std::fmt;
use std::str::FromStr;

use time::OffsetDateTime;

#[derive(thiserror::Error, Debug)]
#[error("invalid appliance status '{0}', expected ON or OFF")]
pub struct InvalidStatus(String);

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ApplianceStatus {
    On,
    Off,
}

impl ApplianceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApplianceStatus::On => "ON",
            ApplianceStatus::Off => "OFF",
        }
    }
}

impl fmt::Display for ApplianceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ApplianceStatus {
    type Err = InvalidStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ON" => Ok(ApplianceStatus::On),
            "OFF" => Ok(ApplianceStatus::Off),
            other => Err(InvalidStatus(other.to_string())),
        }
    }
}

// Stored as TEXT; sqlx decodes through this conversion.
impl TryFrom<String> for ApplianceStatus {
    type Error = InvalidStatus;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

/// A named power-consuming device owned by a user.
///
/// `last_switched_on` is set on the OFF->ON transition and cleared on
/// ON->OFF; the elapsed time between the two derives a usage record.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Appliance {
    pub id: String,
    pub user_id: String,
    pub name: String,
    /// Rated draw in watts.
    pub power_rating: f64,
    pub location: String,
    #[sqlx(try_from = "String")]
    pub status: ApplianceStatus,
    pub last_switched_on: Option<OffsetDateTime>,
    pub created_at: OffsetDateTime,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_through_text() {
        assert_eq!("ON".parse::<ApplianceStatus>().unwrap(), ApplianceStatus::On);
        assert_eq!("OFF".parse::<ApplianceStatus>().unwrap(), ApplianceStatus::Off);
        assert_eq!(ApplianceStatus::On.as_str(), "ON");
    }

    #[test]
    fn status_rejects_unknown_text() {
        assert!("on".parse::<ApplianceStatus>().is_err());
        assert!("STANDBY".parse::<ApplianceStatus>().is_err());
    }
}

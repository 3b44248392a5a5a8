//! The canonical brew session: one realized attempt at brewing a recipe.

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::types::wire_enum;
use crate::wire;

wire_enum! {
    /// Progress of a brew session.
    ///
    /// `Completed` is never read from a local store: it is derived from the
    /// conditioning start and duration by [`Brew::effective_status`].
    #[derive(Default)]
    BrewStatus {
        #[default]
        BrewDay = 10,
        Fermentation = 20,
        Conditioning = 30,
        Completed = 40,
    }
}

/// Priming or force-carbonation targets and the amounts derived from them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Carbonation {
    /// Target dissolved CO2 in volumes.
    pub co2_volumes: f64,
    /// Beer temperature in degrees Celsius.
    pub beer_temperature: f64,
    /// Sucrose needed for bottle conditioning, in grams.
    pub priming_sugar: f64,
    /// Keg head pressure for force carbonation, in psi.
    pub keg_pressure: f64,
}

/// A gravity measurement taken during fermentation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GravityReading {
    #[serde(with = "wire::timestamp")]
    pub recorded_at: Option<DateTime<Utc>>,
    pub gravity: f64,
}

/// One brew session of a recipe.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Brew {
    #[serde(default, deserialize_with = "wire::opt_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,

    #[serde(default, deserialize_with = "wire::opt_id", skip_serializing_if = "Option::is_none")]
    pub recipe_id: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default)]
    pub status: BrewStatus,

    #[serde(default, with = "wire::timestamp", skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, with = "wire::timestamp", skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default, with = "wire::timestamp", skip_serializing_if = "Option::is_none")]
    pub fermentation_start: Option<DateTime<Utc>>,
    #[serde(default, with = "wire::timestamp", skip_serializing_if = "Option::is_none")]
    pub conditioning_start: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "wire::opt_number", skip_serializing_if = "Option::is_none")]
    pub conditioning_days: Option<f64>,

    #[serde(default, deserialize_with = "wire::opt_number", skip_serializing_if = "Option::is_none")]
    pub og: Option<f64>,
    #[serde(default, deserialize_with = "wire::opt_number", skip_serializing_if = "Option::is_none")]
    pub fg: Option<f64>,
    #[serde(default, deserialize_with = "wire::opt_number", skip_serializing_if = "Option::is_none")]
    pub abv: Option<f64>,

    /// Liters.
    #[serde(default, deserialize_with = "wire::opt_number", skip_serializing_if = "Option::is_none")]
    pub mash_water: Option<f64>,
    #[serde(default, deserialize_with = "wire::opt_number", skip_serializing_if = "Option::is_none")]
    pub sparge_water: Option<f64>,
    /// Degrees Celsius.
    #[serde(default, deserialize_with = "wire::opt_number", skip_serializing_if = "Option::is_none")]
    pub mash_start_temperature: Option<f64>,
    #[serde(default, deserialize_with = "wire::opt_number", skip_serializing_if = "Option::is_none")]
    pub mash_end_temperature: Option<f64>,
    /// Minutes, heat-up included.
    #[serde(default, deserialize_with = "wire::opt_number", skip_serializing_if = "Option::is_none")]
    pub mash_duration: Option<f64>,

    /// Hot volumes at boiling temperature, liters.
    #[serde(default, deserialize_with = "wire::opt_number", skip_serializing_if = "Option::is_none")]
    pub boil_start_volume: Option<f64>,
    #[serde(default, deserialize_with = "wire::opt_number", skip_serializing_if = "Option::is_none")]
    pub boil_end_volume: Option<f64>,
    /// Cold volumes at 20 °C, liters.
    #[serde(default, deserialize_with = "wire::opt_number", skip_serializing_if = "Option::is_none")]
    pub post_boil_volume: Option<f64>,
    #[serde(default, deserialize_with = "wire::opt_number", skip_serializing_if = "Option::is_none")]
    pub fermenter_volume: Option<f64>,
    #[serde(default, deserialize_with = "wire::opt_number", skip_serializing_if = "Option::is_none")]
    pub bottling_volume: Option<f64>,
    #[serde(default, deserialize_with = "wire::opt_number", skip_serializing_if = "Option::is_none")]
    pub kettle_losses: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub carbonation: Option<Carbonation>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub gravity_readings: Vec<GravityReading>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,

    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Brew {
    /// Status as of `now`, turning finished conditioning into completion.
    pub fn effective_status(&self, now: DateTime<Utc>) -> BrewStatus {
        if self.status != BrewStatus::Conditioning {
            return self.status;
        }
        match (self.conditioning_start, self.conditioning_days) {
            (Some(start), Some(days)) => {
                let end = Duration::try_seconds((days * 86_400.0).round() as i64)
                    .and_then(|length| start.checked_add_signed(length));
                match end {
                    Some(end) if end <= now => BrewStatus::Completed,
                    // out-of-range durations never end
                    _ => BrewStatus::Conditioning,
                }
            }
            _ => BrewStatus::Conditioning,
        }
    }

    /// Whether the brew has a server-side representation.
    pub fn is_bound(&self) -> bool {
        self.id.is_some()
    }

    /// Bind to a remote brew session id.
    pub fn bind(&mut self, id: u64) {
        self.id = Some(id);
    }

    /// Parse a remote JSON object.
    pub fn from_value(value: serde_json::Value) -> crate::Result<Self> {
        serde_json::from_value(value)
            .map_err(|e| crate::BrewSyncError::parse(format!("invalid brew session payload: {e}")))
    }
}

impl fmt::Display for Brew {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{:?} Brew", self.status)?;
        if let Some(id) = self.id {
            write!(f, " id {id}")?;
        }
        if let Some(created) = self.created_at {
            write!(f, " of {}", created.format("%Y-%m-%d"))?;
        }
        write!(f, ">")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn conditioning_brew() -> Brew {
        Brew {
            status: BrewStatus::Conditioning,
            conditioning_start: Some(Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()),
            conditioning_days: Some(28.0),
            ..Brew::default()
        }
    }

    #[test]
    fn conditioning_turns_complete_after_duration() {
        let brew = conditioning_brew();
        let before = Utc.with_ymd_and_hms(2024, 3, 20, 0, 0, 0).unwrap();
        let after = Utc.with_ymd_and_hms(2024, 3, 29, 12, 0, 0).unwrap();
        assert_eq!(brew.effective_status(before), BrewStatus::Conditioning);
        assert_eq!(brew.effective_status(after), BrewStatus::Completed);
    }

    #[test]
    fn conditioning_without_duration_stays() {
        let brew = Brew {
            conditioning_days: None,
            ..conditioning_brew()
        };
        assert_eq!(brew.effective_status(Utc::now()), BrewStatus::Conditioning);
    }

    #[test]
    fn extreme_duration_stays_conditioning() {
        let later = Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap();
        for days in [1e300, f64::INFINITY, -1e300] {
            let brew = Brew {
                conditioning_days: Some(days),
                ..conditioning_brew()
            };
            assert_eq!(brew.effective_status(later), BrewStatus::Conditioning, "{days}");
        }
    }

    #[test]
    fn string_status_parses() {
        let brew = Brew::from_value(serde_json::json!({"id": 1, "status": "30"})).unwrap();
        assert_eq!(brew.status, BrewStatus::Conditioning);
        let brew = Brew::from_value(serde_json::json!({"id": 1, "status": 50})).unwrap();
        assert_eq!(brew.status, BrewStatus::Other(50));
    }

    #[test]
    fn fermentation_is_never_promoted() {
        let brew = Brew {
            status: BrewStatus::Fermentation,
            ..conditioning_brew()
        };
        let later = Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(brew.effective_status(later), BrewStatus::Fermentation);
    }

    #[test]
    fn status_travels_as_id() {
        let brew = Brew {
            status: BrewStatus::Fermentation,
            ..Brew::default()
        };
        let json = serde_json::to_value(&brew).unwrap();
        assert_eq!(json["status"], 20);
        let back = Brew::from_value(json).unwrap();
        assert_eq!(back.status, BrewStatus::Fermentation);
    }
}

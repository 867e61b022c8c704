//! Row types, create payloads and partial-update payloads for every table.
//!
//! Update payloads follow one rule: a field absent from the request is left
//! untouched. Nullable columns use `Option<Option<T>>` so an explicit JSON
//! `null` can still clear them.

use crate::error::{AgriTechError, AgriTechResult};
use serde::{Deserialize, Deserializer};

pub mod crop;
pub mod farm;
pub mod satellite;
pub mod sensor;
pub mod user;
pub mod weather;

pub use crop::{Crop, CropStatus, CropType, CropUpdate, NewCrop};
pub use farm::{Farm, FarmStatus, FarmUpdate, FarmZone, NewFarm, NewZone, ZoneUpdate};
pub use satellite::{
    DataType, NewSatelliteAnalysis, NewSatelliteData, NewVegetationIndex, SatelliteAnalysis,
    SatelliteData, SatelliteDataUpdate, SatelliteType, VegetationIndex,
};
pub use sensor::{
    AlertSeverity, NewSensor, NewSensorAlert, NewSensorReading, Sensor, SensorAlert,
    SensorReading, SensorStatus, SensorType, SensorUpdate,
};
pub use user::{NewUser, User, UserUpdate};
pub use weather::{NewWeatherData, WeatherData};

pub const DEFAULT_PAGE_LIMIT: i64 = 100;
pub const MAX_PAGE_LIMIT: i64 = 1000;

/// Distinguishes "field absent" (`None`) from "field set to null" (`Some(None)`).
pub fn double_option<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Copies every present field of a patch onto the target row.
macro_rules! apply_patch {
    ($patch:expr => $target:expr; $($field:ident),* $(,)?) => {
        $(
            if let Some(value) = $patch.$field {
                $target.$field = value;
            }
        )*
    };
}
pub(crate) use apply_patch;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub skip: i64,
    pub limit: i64,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            skip: 0,
            limit: DEFAULT_PAGE_LIMIT,
        }
    }
}

impl Pagination {
    pub fn new(skip: Option<i64>, limit: Option<i64>) -> AgriTechResult<Self> {
        let skip = skip.unwrap_or(0);
        let limit = limit.unwrap_or(DEFAULT_PAGE_LIMIT);
        if skip < 0 {
            return Err(AgriTechError::Validation("skip must be >= 0".to_string()));
        }
        if !(1..=MAX_PAGE_LIMIT).contains(&limit) {
            return Err(AgriTechError::Validation(format!(
                "limit must be between 1 and {}",
                MAX_PAGE_LIMIT
            )));
        }
        Ok(Self { skip, limit })
    }
}

/// A bounded lookback window such as "last 24 hours" or "last 30 days".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Lookback(chrono::Duration);

impl Lookback {
    pub fn hours(value: Option<i64>, default: i64, max: i64) -> AgriTechResult<Self> {
        let hours = bounded("hours", value.unwrap_or(default), max)?;
        Ok(Self(chrono::Duration::hours(hours)))
    }

    pub fn days(value: Option<i64>, default: i64, max: i64) -> AgriTechResult<Self> {
        let days = bounded("days", value.unwrap_or(default), max)?;
        Ok(Self(chrono::Duration::days(days)))
    }

    pub fn duration(&self) -> chrono::Duration {
        self.0
    }

    /// `(start, end)` ending at `now`.
    pub fn range_ending(
        &self,
        now: chrono::DateTime<chrono::Utc>,
    ) -> (chrono::DateTime<chrono::Utc>, chrono::DateTime<chrono::Utc>) {
        (now - self.0, now)
    }
}

fn bounded(name: &str, value: i64, max: i64) -> AgriTechResult<i64> {
    if (1..=max).contains(&value) {
        Ok(value)
    } else {
        Err(AgriTechError::Validation(format!(
            "{} must be between 1 and {}",
            name, max
        )))
    }
}

pub(crate) fn require_text(field: &str, value: &str) -> AgriTechResult<()> {
    if value.trim().is_empty() {
        return Err(AgriTechError::Validation(format!("{} must not be empty", field)));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pagination_bounds() {
        assert_eq!(Pagination::new(None, None).unwrap(), Pagination::default());
        assert!(Pagination::new(Some(0), Some(1)).is_ok());
        assert!(Pagination::new(Some(5), Some(1000)).is_ok());
        assert!(Pagination::new(Some(-1), None).is_err());
        assert!(Pagination::new(None, Some(0)).is_err());
        assert!(Pagination::new(None, Some(1001)).is_err());
    }

    #[test]
    fn test_lookback_bounds() {
        assert_eq!(
            Lookback::hours(None, 24, 168).unwrap().duration(),
            chrono::Duration::hours(24)
        );
        assert!(Lookback::hours(Some(168), 24, 168).is_ok());
        assert!(Lookback::hours(Some(169), 24, 168).is_err());
        assert!(Lookback::days(Some(0), 30, 365).is_err());
        assert_eq!(
            Lookback::days(Some(7), 30, 365).unwrap().duration(),
            chrono::Duration::days(7)
        );
    }

    #[derive(Debug, Deserialize)]
    struct Probe {
        #[serde(default, deserialize_with = "double_option")]
        note: Option<Option<String>>,
    }

    #[test]
    fn test_double_option_separates_absent_from_null() {
        let absent: Probe = serde_json::from_str("{}").unwrap();
        let null: Probe = serde_json::from_str(r#"{"note": null}"#).unwrap();
        let set: Probe = serde_json::from_str(r#"{"note": "dry"}"#).unwrap();

        assert_eq!(absent.note, None);
        assert_eq!(null.note, Some(None));
        assert_eq!(set.note, Some(Some("dry".to_string())));
    }
}

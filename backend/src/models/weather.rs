use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::error::{AgriTechError, AgriTechResult};

/// One observation (`forecast_hours == 0`) or forecast point (`forecast_hours > 0`).
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct WeatherData {
    pub id: i64,
    pub farm_id: i64,
    pub latitude: f64,
    pub longitude: f64,
    pub temperature_celsius: Option<f64>,
    pub humidity_percent: Option<f64>,
    pub pressure_hpa: Option<f64>,
    pub wind_speed_kmh: Option<f64>,
    pub wind_direction_degrees: Option<f64>,
    pub rainfall_mm: Option<f64>,
    pub solar_radiation_wm2: Option<f64>,
    pub data_source: Option<String>,
    pub forecast_hours: Option<i64>,
    pub measurement_time: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewWeatherData {
    pub farm_id: i64,
    pub latitude: f64,
    pub longitude: f64,
    pub temperature_celsius: Option<f64>,
    pub humidity_percent: Option<f64>,
    pub pressure_hpa: Option<f64>,
    pub wind_speed_kmh: Option<f64>,
    pub wind_direction_degrees: Option<f64>,
    pub rainfall_mm: Option<f64>,
    pub solar_radiation_wm2: Option<f64>,
    pub data_source: Option<String>,
    #[serde(default)]
    pub forecast_hours: i64,
    pub measurement_time: DateTime<Utc>,
}

impl NewWeatherData {
    pub fn validate(&self) -> AgriTechResult<()> {
        if self.forecast_hours < 0 {
            return Err(AgriTechError::Validation(
                "forecast_hours must be >= 0".to_string(),
            ));
        }
        Ok(())
    }
}

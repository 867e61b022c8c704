use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::types::Json;
use sqlx::FromRow;

use super::{double_option, require_text};
use crate::error::AgriTechResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum SensorType {
    Temperature,
    Humidity,
    SoilMoisture,
    SoilPh,
    Light,
    Pressure,
    WindSpeed,
    WindDirection,
    Rainfall,
    NutrientLevel,
    PestDetection,
    Camera,
    Other,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum SensorStatus {
    #[default]
    Active,
    Inactive,
    Maintenance,
    Error,
    Offline,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum AlertSeverity {
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Sensor {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub device_id: String,
    pub sensor_type: SensorType,
    pub manufacturer: Option<String>,
    pub model: Option<String>,
    pub farm_id: i64,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub altitude: Option<f64>,
    pub installation_date: Option<DateTime<Utc>>,
    pub measurement_unit: Option<String>,
    pub min_value: Option<f64>,
    pub max_value: Option<f64>,
    pub accuracy: Option<f64>,
    pub calibration_date: Option<DateTime<Utc>>,
    pub status: SensorStatus,
    pub is_online: bool,
    pub last_reading_time: Option<DateTime<Utc>>,
    pub battery_level: Option<f64>,
    pub signal_strength: Option<f64>,
    pub communication_protocol: Option<String>,
    pub data_transmission_interval: Option<i64>,
    pub configuration: Option<Json<Value>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewSensor {
    pub name: String,
    pub description: Option<String>,
    pub device_id: String,
    pub sensor_type: SensorType,
    pub manufacturer: Option<String>,
    pub model: Option<String>,
    pub farm_id: i64,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub altitude: Option<f64>,
    pub installation_date: Option<DateTime<Utc>>,
    pub measurement_unit: Option<String>,
    pub min_value: Option<f64>,
    pub max_value: Option<f64>,
    pub accuracy: Option<f64>,
    pub communication_protocol: Option<String>,
    pub data_transmission_interval: Option<i64>,
    pub configuration: Option<Json<Value>>,
}

impl NewSensor {
    pub fn validate(&self) -> AgriTechResult<()> {
        require_text("name", &self.name)?;
        require_text("device_id", &self.device_id)
    }
}

/// Device identity, type and farm are fixed at registration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SensorUpdate {
    pub name: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub description: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub manufacturer: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub model: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub latitude: Option<Option<f64>>,
    #[serde(default, deserialize_with = "double_option")]
    pub longitude: Option<Option<f64>>,
    #[serde(default, deserialize_with = "double_option")]
    pub altitude: Option<Option<f64>>,
    #[serde(default, deserialize_with = "double_option")]
    pub measurement_unit: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub min_value: Option<Option<f64>>,
    #[serde(default, deserialize_with = "double_option")]
    pub max_value: Option<Option<f64>>,
    #[serde(default, deserialize_with = "double_option")]
    pub accuracy: Option<Option<f64>>,
    #[serde(default, deserialize_with = "double_option")]
    pub installation_date: Option<Option<DateTime<Utc>>>,
    #[serde(default, deserialize_with = "double_option")]
    pub calibration_date: Option<Option<DateTime<Utc>>>,
    pub status: Option<SensorStatus>,
    pub is_online: Option<bool>,
    #[serde(default, deserialize_with = "double_option")]
    pub battery_level: Option<Option<f64>>,
    #[serde(default, deserialize_with = "double_option")]
    pub signal_strength: Option<Option<f64>>,
    #[serde(default, deserialize_with = "double_option")]
    pub communication_protocol: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub data_transmission_interval: Option<Option<i64>>,
    #[serde(default, deserialize_with = "double_option")]
    pub configuration: Option<Option<Json<Value>>>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct SensorReading {
    pub id: i64,
    pub value: f64,
    pub unit: Option<String>,
    pub quality_score: Option<f64>,
    pub reading_timestamp: DateTime<Utc>,
    pub received_timestamp: DateTime<Utc>,
    pub temperature: Option<f64>,
    pub humidity: Option<f64>,
    pub sensor_id: i64,
    pub user_id: Option<i64>,
    pub metadata: Option<Json<Value>>,
}

/// A reading posted against `/sensors/:id/readings`. The timestamp defaults to receipt time.
#[derive(Debug, Clone, Deserialize)]
pub struct NewSensorReading {
    pub value: f64,
    pub unit: Option<String>,
    pub quality_score: Option<f64>,
    pub reading_timestamp: Option<DateTime<Utc>>,
    pub temperature: Option<f64>,
    pub humidity: Option<f64>,
    pub metadata: Option<Json<Value>>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct SensorAlert {
    pub id: i64,
    pub alert_type: String,
    pub severity: AlertSeverity,
    pub message: String,
    pub threshold_value: Option<f64>,
    pub actual_value: Option<f64>,
    pub is_resolved: bool,
    pub resolved_at: Option<DateTime<Utc>>,
    pub resolved_by: Option<i64>,
    pub sensor_id: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewSensorAlert {
    pub alert_type: String,
    pub severity: AlertSeverity,
    pub message: String,
    pub threshold_value: Option<f64>,
    pub actual_value: Option<f64>,
    pub sensor_id: i64,
}

impl NewSensorAlert {
    pub fn validate(&self) -> AgriTechResult<()> {
        require_text("alert_type", &self.alert_type)?;
        require_text("message", &self.message)
    }
}

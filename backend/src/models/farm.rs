use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::types::Json;
use sqlx::FromRow;

use super::{double_option, require_text};
use crate::error::AgriTechResult;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum FarmStatus {
    #[default]
    Active,
    Inactive,
    Maintenance,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Farm {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub location: Option<String>,
    pub area_hectares: Option<f64>,
    pub soil_type: Option<String>,
    pub climate_zone: Option<String>,
    pub irrigation_system: Option<String>,
    pub status: FarmStatus,
    pub metadata: Option<Json<Value>>,
    pub owner_id: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewFarm {
    pub name: String,
    pub description: Option<String>,
    pub location: Option<String>,
    pub area_hectares: Option<f64>,
    pub soil_type: Option<String>,
    pub climate_zone: Option<String>,
    pub irrigation_system: Option<String>,
    #[serde(default)]
    pub status: FarmStatus,
    pub metadata: Option<Json<Value>>,
    /// Defaults to the caller when omitted.
    pub owner_id: Option<i64>,
}

impl NewFarm {
    pub fn validate(&self) -> AgriTechResult<()> {
        require_text("name", &self.name)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FarmUpdate {
    pub name: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub description: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub location: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub area_hectares: Option<Option<f64>>,
    #[serde(default, deserialize_with = "double_option")]
    pub soil_type: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub climate_zone: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub irrigation_system: Option<Option<String>>,
    pub status: Option<FarmStatus>,
    #[serde(default, deserialize_with = "double_option")]
    pub metadata: Option<Option<Json<Value>>>,
}

impl FarmUpdate {
    pub fn validate(&self) -> AgriTechResult<()> {
        match &self.name {
            Some(name) => require_text("name", name),
            None => Ok(()),
        }
    }
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct FarmZone {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub area_hectares: Option<f64>,
    pub soil_ph: Option<f64>,
    pub soil_moisture: Option<f64>,
    pub fertility_level: Option<String>,
    pub farm_id: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// The owning farm comes from the route, not the body.
#[derive(Debug, Clone, Deserialize)]
pub struct NewZone {
    pub name: String,
    pub description: Option<String>,
    pub area_hectares: Option<f64>,
    pub soil_ph: Option<f64>,
    pub soil_moisture: Option<f64>,
    pub fertility_level: Option<String>,
}

impl NewZone {
    pub fn validate(&self) -> AgriTechResult<()> {
        require_text("name", &self.name)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ZoneUpdate {
    pub name: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub description: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub area_hectares: Option<Option<f64>>,
    #[serde(default, deserialize_with = "double_option")]
    pub soil_ph: Option<Option<f64>>,
    #[serde(default, deserialize_with = "double_option")]
    pub soil_moisture: Option<Option<f64>>,
    #[serde(default, deserialize_with = "double_option")]
    pub fertility_level: Option<Option<String>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_farm_defaults_to_active() {
        let farm: NewFarm = serde_json::from_str(r#"{"name": "F1"}"#).unwrap();
        assert_eq!(farm.status, FarmStatus::Active);
        assert!(farm.owner_id.is_none());
    }

    #[test]
    fn test_unknown_status_is_rejected() {
        let result: Result<NewFarm, _> =
            serde_json::from_str(r#"{"name": "F1", "status": "abandoned"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_update_null_clears_nullable_field() {
        let patch: FarmUpdate =
            serde_json::from_str(r#"{"description": null, "status": "maintenance"}"#).unwrap();
        assert_eq!(patch.description, Some(None));
        assert_eq!(patch.status, Some(FarmStatus::Maintenance));
        assert!(patch.name.is_none());
        assert!(patch.location.is_none());
    }
}

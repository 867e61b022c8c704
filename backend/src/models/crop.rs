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
pub enum CropType {
    Cereals,
    Vegetables,
    Fruits,
    Legumes,
    Herbs,
    Spices,
    Other,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum CropStatus {
    #[default]
    Planned,
    Planted,
    Germinated,
    Vegetative,
    Flowering,
    Fruiting,
    Mature,
    Harvested,
    Failed,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Crop {
    pub id: i64,
    pub name: String,
    pub variety: Option<String>,
    pub description: Option<String>,
    pub crop_type: CropType,
    pub scientific_name: Option<String>,
    pub planting_date: Option<DateTime<Utc>>,
    pub expected_harvest_date: Option<DateTime<Utc>>,
    pub actual_harvest_date: Option<DateTime<Utc>>,
    pub status: CropStatus,
    pub planted_area_hectares: Option<f64>,
    pub expected_yield_kg: Option<f64>,
    pub actual_yield_kg: Option<f64>,
    pub growth_stage_days: Option<i64>,
    pub maturity_days: Option<i64>,
    pub optimal_temperature_min: Option<f64>,
    pub optimal_temperature_max: Option<f64>,
    pub optimal_humidity_min: Option<f64>,
    pub optimal_humidity_max: Option<f64>,
    pub water_requirements_mm: Option<f64>,
    pub farm_id: i64,
    pub zone_id: Option<i64>,
    pub metadata: Option<Json<Value>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewCrop {
    pub name: String,
    pub variety: Option<String>,
    pub description: Option<String>,
    pub crop_type: CropType,
    pub scientific_name: Option<String>,
    pub planting_date: Option<DateTime<Utc>>,
    pub expected_harvest_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub status: CropStatus,
    pub planted_area_hectares: Option<f64>,
    pub expected_yield_kg: Option<f64>,
    pub maturity_days: Option<i64>,
    pub optimal_temperature_min: Option<f64>,
    pub optimal_temperature_max: Option<f64>,
    pub optimal_humidity_min: Option<f64>,
    pub optimal_humidity_max: Option<f64>,
    pub water_requirements_mm: Option<f64>,
    pub farm_id: i64,
    pub zone_id: Option<i64>,
    pub metadata: Option<Json<Value>>,
}

impl NewCrop {
    pub fn validate(&self) -> AgriTechResult<()> {
        require_text("name", &self.name)
    }
}

/// Type, farm and zone are fixed once a crop is recorded.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CropUpdate {
    pub name: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub variety: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub description: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub scientific_name: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub planting_date: Option<Option<DateTime<Utc>>>,
    #[serde(default, deserialize_with = "double_option")]
    pub expected_harvest_date: Option<Option<DateTime<Utc>>>,
    #[serde(default, deserialize_with = "double_option")]
    pub actual_harvest_date: Option<Option<DateTime<Utc>>>,
    pub status: Option<CropStatus>,
    #[serde(default, deserialize_with = "double_option")]
    pub planted_area_hectares: Option<Option<f64>>,
    #[serde(default, deserialize_with = "double_option")]
    pub expected_yield_kg: Option<Option<f64>>,
    #[serde(default, deserialize_with = "double_option")]
    pub actual_yield_kg: Option<Option<f64>>,
    #[serde(default, deserialize_with = "double_option")]
    pub growth_stage_days: Option<Option<i64>>,
    #[serde(default, deserialize_with = "double_option")]
    pub maturity_days: Option<Option<i64>>,
    #[serde(default, deserialize_with = "double_option")]
    pub optimal_temperature_min: Option<Option<f64>>,
    #[serde(default, deserialize_with = "double_option")]
    pub optimal_temperature_max: Option<Option<f64>>,
    #[serde(default, deserialize_with = "double_option")]
    pub optimal_humidity_min: Option<Option<f64>>,
    #[serde(default, deserialize_with = "double_option")]
    pub optimal_humidity_max: Option<Option<f64>>,
    #[serde(default, deserialize_with = "double_option")]
    pub water_requirements_mm: Option<Option<f64>>,
    #[serde(default, deserialize_with = "double_option")]
    pub metadata: Option<Option<Json<Value>>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crop_type_labels() {
        let parsed: CropType = serde_json::from_str(r#""legumes""#).unwrap();
        assert_eq!(parsed, CropType::Legumes);
        assert!(serde_json::from_str::<CropType>(r#""trees""#).is_err());
    }

    #[test]
    fn test_new_crop_starts_planned() {
        let crop: NewCrop =
            serde_json::from_str(r#"{"name": "Maize", "crop_type": "cereals", "farm_id": 3}"#)
                .unwrap();
        assert_eq!(crop.status, CropStatus::Planned);
        assert_eq!(crop.zone_id, None);
    }
}

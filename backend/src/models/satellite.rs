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
pub enum SatelliteType {
    #[serde(rename = "sentinel_2")]
    #[sqlx(rename = "sentinel_2")]
    Sentinel2,
    #[serde(rename = "sentinel_1")]
    #[sqlx(rename = "sentinel_1")]
    Sentinel1,
    #[serde(rename = "landsat_8")]
    #[sqlx(rename = "landsat_8")]
    Landsat8,
    #[serde(rename = "landsat_9")]
    #[sqlx(rename = "landsat_9")]
    Landsat9,
    Modis,
    Spot,
    Pleiades,
    Worldview,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum DataType {
    Optical,
    Radar,
    Thermal,
    Multispectral,
    Hyperspectral,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct SatelliteData {
    pub id: i64,
    pub satellite_type: SatelliteType,
    pub data_type: DataType,
    pub acquisition_date: DateTime<Utc>,
    pub cloud_coverage: Option<f64>,
    pub sun_elevation: Option<f64>,
    pub sun_azimuth: Option<f64>,
    pub farm_id: i64,
    pub center_latitude: Option<f64>,
    pub center_longitude: Option<f64>,
    pub image_url: Option<String>,
    pub thumbnail_url: Option<String>,
    pub metadata_url: Option<String>,
    pub local_file_path: Option<String>,
    pub is_processed: bool,
    pub processing_date: Option<DateTime<Utc>>,
    pub processing_status: Option<String>,
    pub quality_score: Option<f64>,
    pub resolution_meters: Option<f64>,
    pub metadata: Option<Json<Value>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewSatelliteData {
    pub satellite_type: SatelliteType,
    pub data_type: DataType,
    pub acquisition_date: DateTime<Utc>,
    pub cloud_coverage: Option<f64>,
    pub sun_elevation: Option<f64>,
    pub sun_azimuth: Option<f64>,
    pub farm_id: i64,
    pub center_latitude: Option<f64>,
    pub center_longitude: Option<f64>,
    pub image_url: Option<String>,
    pub thumbnail_url: Option<String>,
    pub metadata_url: Option<String>,
    pub resolution_meters: Option<f64>,
    pub metadata: Option<Json<Value>>,
}

/// Processing results attached after acquisition.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SatelliteDataUpdate {
    #[serde(default, deserialize_with = "double_option")]
    pub cloud_coverage: Option<Option<f64>>,
    #[serde(default, deserialize_with = "double_option")]
    pub image_url: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub thumbnail_url: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub metadata_url: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub local_file_path: Option<Option<String>>,
    pub is_processed: Option<bool>,
    #[serde(default, deserialize_with = "double_option")]
    pub processing_date: Option<Option<DateTime<Utc>>>,
    #[serde(default, deserialize_with = "double_option")]
    pub processing_status: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub quality_score: Option<Option<f64>>,
    #[serde(default, deserialize_with = "double_option")]
    pub resolution_meters: Option<Option<f64>>,
    #[serde(default, deserialize_with = "double_option")]
    pub metadata: Option<Option<Json<Value>>>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct SatelliteAnalysis {
    pub id: i64,
    pub analysis_type: String,
    pub algorithm_used: Option<String>,
    pub version: Option<String>,
    pub result_data: Option<Json<Value>>,
    pub confidence_score: Option<f64>,
    pub result_image_url: Option<String>,
    pub heatmap_url: Option<String>,
    pub crop_id: Option<i64>,
    pub satellite_data_id: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewSatelliteAnalysis {
    pub analysis_type: String,
    pub algorithm_used: Option<String>,
    pub version: Option<String>,
    pub result_data: Option<Json<Value>>,
    pub confidence_score: Option<f64>,
    pub result_image_url: Option<String>,
    pub heatmap_url: Option<String>,
    pub crop_id: Option<i64>,
    pub satellite_data_id: i64,
}

impl NewSatelliteAnalysis {
    pub fn validate(&self) -> AgriTechResult<()> {
        require_text("analysis_type", &self.analysis_type)
    }
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct VegetationIndex {
    pub id: i64,
    pub index_name: String,
    pub index_value: f64,
    pub index_range_min: Option<f64>,
    pub index_range_max: Option<f64>,
    pub latitude: f64,
    pub longitude: f64,
    pub satellite_data_id: i64,
    pub farm_id: i64,
    pub calculated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewVegetationIndex {
    pub index_name: String,
    pub index_value: f64,
    pub index_range_min: Option<f64>,
    pub index_range_max: Option<f64>,
    pub latitude: f64,
    pub longitude: f64,
    pub satellite_data_id: i64,
    pub farm_id: i64,
    pub calculated_at: Option<DateTime<Utc>>,
}

impl NewVegetationIndex {
    pub fn validate(&self) -> AgriTechResult<()> {
        require_text("index_name", &self.index_name)
    }
}

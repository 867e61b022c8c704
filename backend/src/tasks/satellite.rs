use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::commands::analytics::Pending;
use crate::commands::ensure_exists;
use crate::db::DbPool;
use crate::error::{AgriTechError, AgriTechResult};
use crate::models::SatelliteType;

#[derive(Debug, Serialize)]
pub struct FetchOutcome {
    pub farm_id: i64,
    pub satellite_type: SatelliteType,
    pub known_images: i64,
    pub new_images: Pending,
}

#[derive(Debug, Serialize)]
pub struct ImageOutcome {
    pub image_id: i64,
    pub already_processed: bool,
    pub analysis: Pending,
}

#[derive(Debug, Serialize)]
pub struct VegetationMapOutcome {
    pub farm_id: i64,
    pub index_points: i64,
    pub map: Pending,
}

#[derive(Debug, Serialize)]
pub struct WeatherRefreshOutcome {
    pub farm_id: i64,
    pub latest_observation: Option<DateTime<Utc>>,
    pub refreshed: Pending,
}

/// Provider download is not wired up; reports what is already on file.
pub async fn fetch_satellite_data(
    pool: &DbPool,
    farm_id: i64,
    satellite_type: SatelliteType,
) -> AgriTechResult<FetchOutcome> {
    ensure_exists(pool, "fetch_satellite_data", "farms", "farm", farm_id).await?;
    let (known_images,): (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM satellite_data WHERE farm_id = $1 AND satellite_type = $2")
            .bind(farm_id)
            .bind(satellite_type)
            .fetch_one(pool)
            .await?;

    tracing::info!(farm_id, ?satellite_type, known_images, "Checked satellite imagery");
    Ok(FetchOutcome {
        farm_id,
        satellite_type,
        known_images,
        new_images: Pending::NotYetSpecified,
    })
}

pub async fn process_satellite_image(pool: &DbPool, image_id: i64) -> AgriTechResult<ImageOutcome> {
    let already_processed: bool = sqlx::query_scalar("SELECT is_processed FROM satellite_data WHERE id = $1")
        .bind(image_id)
        .fetch_optional(pool)
        .await?
        .ok_or(AgriTechError::NotFound("satellite data"))?;

    Ok(ImageOutcome {
        image_id,
        already_processed,
        analysis: Pending::NotYetSpecified,
    })
}

pub async fn generate_vegetation_map(pool: &DbPool, farm_id: i64) -> AgriTechResult<VegetationMapOutcome> {
    ensure_exists(pool, "generate_vegetation_map", "farms", "farm", farm_id).await?;
    let (index_points,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM vegetation_indices WHERE farm_id = $1")
        .bind(farm_id)
        .fetch_one(pool)
        .await?;

    Ok(VegetationMapOutcome {
        farm_id,
        index_points,
        map: Pending::NotYetSpecified,
    })
}

pub async fn update_weather_data(pool: &DbPool, farm_id: i64) -> AgriTechResult<WeatherRefreshOutcome> {
    ensure_exists(pool, "update_weather_data", "farms", "farm", farm_id).await?;
    let latest_observation: Option<DateTime<Utc>> = sqlx::query_scalar(
        "SELECT MAX(measurement_time) FROM weather_data WHERE farm_id = $1 AND COALESCE(forecast_hours, 0) = 0",
    )
    .bind(farm_id)
    .fetch_one(pool)
    .await?;

    Ok(WeatherRefreshOutcome {
        farm_id,
        latest_observation,
        refreshed: Pending::NotYetSpecified,
    })
}

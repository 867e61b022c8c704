use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::commands::analytics::Pending;
use crate::commands::ensure_exists;
use crate::db::DbPool;
use crate::error::{AgriTechError, AgriTechResult};

#[derive(Debug, Serialize)]
pub struct DailyOutcome {
    pub farms: i64,
    pub readings_last_day: i64,
    pub alerts_last_day: i64,
    pub images_last_day: i64,
    pub insights: Pending,
}

#[derive(Debug, Serialize)]
pub struct ReportOutcome {
    pub farm_id: i64,
    pub crops: i64,
    pub sensors: i64,
    pub document: Pending,
}

#[derive(Debug, Serialize)]
pub struct YieldOutcome {
    pub crop_id: i64,
    pub expected_yield_kg: Option<f64>,
    pub predicted_yield_kg: Pending,
}

pub async fn generate_daily_analytics(pool: &DbPool, now: DateTime<Utc>) -> AgriTechResult<DailyOutcome> {
    let since = now - Duration::hours(24);
    let (farms, readings_last_day, alerts_last_day, images_last_day): (i64, i64, i64, i64) = sqlx::query_as(
        "SELECT (SELECT COUNT(*) FROM farms), \
                (SELECT COUNT(*) FROM sensor_readings WHERE reading_timestamp >= $1 AND reading_timestamp <= $2), \
                (SELECT COUNT(*) FROM sensor_alerts WHERE created_at >= $1 AND created_at <= $2), \
                (SELECT COUNT(*) FROM satellite_data WHERE acquisition_date >= $1 AND acquisition_date <= $2)",
    )
    .bind(since)
    .bind(now)
    .fetch_one(pool)
    .await?;

    tracing::info!(farms, readings_last_day, alerts_last_day, images_last_day, "Generated daily analytics");
    Ok(DailyOutcome {
        farms,
        readings_last_day,
        alerts_last_day,
        images_last_day,
        insights: Pending::NotYetSpecified,
    })
}

pub async fn generate_farm_report(pool: &DbPool, farm_id: i64) -> AgriTechResult<ReportOutcome> {
    ensure_exists(pool, "generate_farm_report", "farms", "farm", farm_id).await?;
    let (crops, sensors): (i64, i64) = sqlx::query_as(
        "SELECT (SELECT COUNT(*) FROM crops WHERE farm_id = $1), (SELECT COUNT(*) FROM sensors WHERE farm_id = $1)",
    )
    .bind(farm_id)
    .fetch_one(pool)
    .await?;

    Ok(ReportOutcome {
        farm_id,
        crops,
        sensors,
        document: Pending::NotYetSpecified,
    })
}

pub async fn predict_crop_yield(pool: &DbPool, crop_id: i64) -> AgriTechResult<YieldOutcome> {
    let expected_yield_kg: Option<f64> = sqlx::query_scalar("SELECT expected_yield_kg FROM crops WHERE id = $1")
        .bind(crop_id)
        .fetch_optional(pool)
        .await?
        .ok_or(AgriTechError::NotFound("crop"))?;

    Ok(YieldOutcome {
        crop_id,
        expected_yield_kg,
        predicted_yield_kg: Pending::NotYetSpecified,
    })
}

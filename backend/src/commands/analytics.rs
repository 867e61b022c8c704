use axum::extract::{Json, Path, Query, State};
use axum::Extension;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{QueryBuilder, Sqlite};

use super::ensure_exists;
use crate::db::DbPool;
use crate::error::{AgriTechError, AgriTechResult};
use crate::middleware::CurrentUser;
use crate::models::{AlertSeverity, CropStatus, Lookback, SensorAlert, SensorType};
use crate::tasks::{Job, TaskQueue, TaskReceipt};

pub const DEFAULT_ANALYTICS_DAYS: i64 = 30;
pub const MAX_ANALYTICS_DAYS: i64 = 365;
pub const DEFAULT_SENSOR_DAYS: i64 = 7;
pub const MAX_SENSOR_DAYS: i64 = 30;
const RECENT_ALERTS: i64 = 5;

/// Figures that need a model nobody has written yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Pending {
    NotYetSpecified,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Serialize)]
pub struct WeatherSummary {
    pub avg_temperature: Option<f64>,
    pub total_rainfall: Option<f64>,
    pub avg_humidity: Option<f64>,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AlertsSummary {
    pub critical: i64,
    pub high: i64,
    pub medium: i64,
    pub low: i64,
}

impl AlertsSummary {
    fn total(&self) -> i64 {
        self.critical + self.high + self.medium + self.low
    }
}

#[derive(Debug, Serialize)]
pub struct FarmAnalytics {
    pub farm_id: i64,
    pub period_days: i64,
    pub total_crops: i64,
    pub active_sensors: i64,
    pub satellite_images_count: i64,
    pub alerts_count: i64,
    pub weather_summary: WeatherSummary,
    pub average_ndvi: Pending,
    pub soil_health_score: Pending,
    pub crop_health: Pending,
    pub generated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct CropAnalytics {
    pub crop_id: i64,
    pub period_days: i64,
    pub status: CropStatus,
    pub expected_yield_kg: Option<f64>,
    pub actual_yield_kg: Option<f64>,
    pub environmental_conditions: WeatherSummary,
    pub health_score: Pending,
    pub growth_rate: Pending,
    pub satellite_analysis: Pending,
    pub generated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct SensorTypeCount {
    pub sensor_type: SensorType,
    pub count: i64,
}

#[derive(Debug, Serialize)]
pub struct SensorAnalytics {
    pub farm_id: i64,
    pub period_days: i64,
    pub total_sensors: i64,
    pub active_sensors: i64,
    pub offline_sensors: i64,
    pub sensor_types: Vec<SensorTypeCount>,
    pub readings_count: i64,
    pub data_quality_score: Option<f64>,
    pub alerts_summary: AlertsSummary,
    pub trends: Pending,
    pub generated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct SatelliteAnalytics {
    pub farm_id: i64,
    pub period_days: i64,
    pub total_images: i64,
    pub cloud_coverage_avg: Option<f64>,
    pub vegetation_indices: Pending,
    pub crop_health_analysis: Pending,
    pub change_detection: Pending,
    pub generated_at: DateTime<Utc>,
}

#[derive(Debug, Default, Serialize)]
pub struct CurrentConditions {
    pub current_temperature: Option<f64>,
    pub current_humidity: Option<f64>,
    pub measured_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
pub struct SatelliteSummary {
    pub last_image_date: Option<DateTime<Utc>>,
    pub average_ndvi: Pending,
}

#[derive(Debug, Serialize)]
pub struct Dashboard {
    pub user_id: i64,
    pub farms_count: i64,
    pub total_crops: i64,
    pub active_sensors: i64,
    pub recent_alerts: Vec<SensorAlert>,
    pub weather_summary: CurrentConditions,
    pub satellite_summary: SatelliteSummary,
    pub generated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct WindowQuery {
    pub days: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct DashboardQuery {
    pub farm_id: Option<i64>,
}

async fn count(pool: &DbPool, sql: &str, id: i64) -> AgriTechResult<i64> {
    let (n,): (i64,) = sqlx::query_as(sql).bind(id).fetch_one(pool).await?;
    Ok(n)
}

async fn weather_summary(
    pool: &DbPool,
    farm_id: i64,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> AgriTechResult<WeatherSummary> {
    let (avg_temperature, total_rainfall, avg_humidity): (Option<f64>, Option<f64>, Option<f64>) =
        sqlx::query_as(
            "SELECT AVG(temperature_celsius), SUM(rainfall_mm), AVG(humidity_percent) FROM weather_data \
             WHERE farm_id = $1 AND COALESCE(forecast_hours, 0) = 0 AND measurement_time >= $2 AND measurement_time <= $3",
        )
        .bind(farm_id)
        .bind(start)
        .bind(end)
        .fetch_one(pool)
        .await?;
    Ok(WeatherSummary {
        avg_temperature,
        total_rainfall,
        avg_humidity,
    })
}

async fn unresolved_alerts(pool: &DbPool, farm_id: i64) -> AgriTechResult<AlertsSummary> {
    let rows: Vec<(AlertSeverity, i64)> = sqlx::query_as(
        "SELECT sensor_alerts.severity, COUNT(*) FROM sensor_alerts \
         JOIN sensors ON sensors.id = sensor_alerts.sensor_id \
         WHERE sensors.farm_id = $1 AND sensor_alerts.is_resolved = FALSE \
         GROUP BY sensor_alerts.severity",
    )
    .bind(farm_id)
    .fetch_all(pool)
    .await?;

    let mut summary = AlertsSummary::default();
    for (severity, n) in rows {
        match severity {
            AlertSeverity::Critical => summary.critical = n,
            AlertSeverity::High => summary.high = n,
            AlertSeverity::Medium => summary.medium = n,
            AlertSeverity::Low => summary.low = n,
        }
    }
    Ok(summary)
}

pub async fn farm_analytics(
    pool: &DbPool,
    farm_id: i64,
    window: Lookback,
    now: DateTime<Utc>,
) -> AgriTechResult<FarmAnalytics> {
    ensure_exists(pool, "farm_analytics", "farms", "farm", farm_id).await?;
    let (start, end) = window.range_ending(now);

    let total_crops = count(pool, "SELECT COUNT(*) FROM crops WHERE farm_id = $1", farm_id).await?;
    let active_sensors = count(
        pool,
        "SELECT COUNT(*) FROM sensors WHERE farm_id = $1 AND status = 'active'",
        farm_id,
    )
    .await?;
    let (satellite_images_count,): (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM satellite_data WHERE farm_id = $1 AND acquisition_date >= $2 AND acquisition_date <= $3",
    )
    .bind(farm_id)
    .bind(start)
    .bind(end)
    .fetch_one(pool)
    .await?;
    let alerts_count = unresolved_alerts(pool, farm_id).await?.total();
    let weather_summary = weather_summary(pool, farm_id, start, end).await?;

    tracing::info!(farm_id, "Generated farm analytics");
    Ok(FarmAnalytics {
        farm_id,
        period_days: window.duration().num_days(),
        total_crops,
        active_sensors,
        satellite_images_count,
        alerts_count,
        weather_summary,
        average_ndvi: Pending::NotYetSpecified,
        soil_health_score: Pending::NotYetSpecified,
        crop_health: Pending::NotYetSpecified,
        generated_at: now,
    })
}

pub async fn crop_analytics(
    pool: &DbPool,
    crop_id: i64,
    window: Lookback,
    now: DateTime<Utc>,
) -> AgriTechResult<CropAnalytics> {
    let row: Option<(i64, CropStatus, Option<f64>, Option<f64>)> = sqlx::query_as(
        "SELECT farm_id, status, expected_yield_kg, actual_yield_kg FROM crops WHERE id = $1",
    )
    .bind(crop_id)
    .fetch_optional(pool)
    .await?;
    let (farm_id, status, expected_yield_kg, actual_yield_kg) =
        row.ok_or(AgriTechError::NotFound("crop"))?;

    let (start, end) = window.range_ending(now);
    let environmental_conditions = weather_summary(pool, farm_id, start, end).await?;

    tracing::info!(crop_id, "Generated crop analytics");
    Ok(CropAnalytics {
        crop_id,
        period_days: window.duration().num_days(),
        status,
        expected_yield_kg,
        actual_yield_kg,
        environmental_conditions,
        health_score: Pending::NotYetSpecified,
        growth_rate: Pending::NotYetSpecified,
        satellite_analysis: Pending::NotYetSpecified,
        generated_at: now,
    })
}

pub async fn sensor_analytics(
    pool: &DbPool,
    farm_id: i64,
    window: Lookback,
    now: DateTime<Utc>,
) -> AgriTechResult<SensorAnalytics> {
    ensure_exists(pool, "sensor_analytics", "farms", "farm", farm_id).await?;
    let (start, end) = window.range_ending(now);

    let (total_sensors, active_sensors, offline_sensors): (i64, i64, i64) = sqlx::query_as(
        "SELECT COUNT(*), \
                COALESCE(SUM(CASE WHEN status = 'active' THEN 1 ELSE 0 END), 0), \
                COALESCE(SUM(CASE WHEN is_online THEN 0 ELSE 1 END), 0) \
         FROM sensors WHERE farm_id = $1",
    )
    .bind(farm_id)
    .fetch_one(pool)
    .await?;

    let sensor_types: Vec<SensorTypeCount> = sqlx::query_as(
        "SELECT sensor_type, COUNT(*) AS count FROM sensors WHERE farm_id = $1 GROUP BY sensor_type ORDER BY sensor_type",
    )
    .bind(farm_id)
    .fetch_all(pool)
    .await?;

    let (readings_count, data_quality_score): (i64, Option<f64>) = sqlx::query_as(
        "SELECT COUNT(*), AVG(sensor_readings.quality_score) FROM sensor_readings \
         JOIN sensors ON sensors.id = sensor_readings.sensor_id \
         WHERE sensors.farm_id = $1 AND sensor_readings.reading_timestamp >= $2 AND sensor_readings.reading_timestamp <= $3",
    )
    .bind(farm_id)
    .bind(start)
    .bind(end)
    .fetch_one(pool)
    .await?;

    let alerts_summary = unresolved_alerts(pool, farm_id).await?;

    tracing::info!(farm_id, "Generated sensor analytics");
    Ok(SensorAnalytics {
        farm_id,
        period_days: window.duration().num_days(),
        total_sensors,
        active_sensors,
        offline_sensors,
        sensor_types,
        readings_count,
        data_quality_score,
        alerts_summary,
        trends: Pending::NotYetSpecified,
        generated_at: now,
    })
}

pub async fn satellite_analytics(
    pool: &DbPool,
    farm_id: i64,
    window: Lookback,
    now: DateTime<Utc>,
) -> AgriTechResult<SatelliteAnalytics> {
    ensure_exists(pool, "satellite_analytics", "farms", "farm", farm_id).await?;
    let (start, end) = window.range_ending(now);

    let (total_images, cloud_coverage_avg): (i64, Option<f64>) = sqlx::query_as(
        "SELECT COUNT(*), AVG(cloud_coverage) FROM satellite_data \
         WHERE farm_id = $1 AND acquisition_date >= $2 AND acquisition_date <= $3",
    )
    .bind(farm_id)
    .bind(start)
    .bind(end)
    .fetch_one(pool)
    .await?;

    tracing::info!(farm_id, "Generated satellite analytics");
    Ok(SatelliteAnalytics {
        farm_id,
        period_days: window.duration().num_days(),
        total_images,
        cloud_coverage_avg,
        vegetation_indices: Pending::NotYetSpecified,
        crop_health_analysis: Pending::NotYetSpecified,
        change_detection: Pending::NotYetSpecified,
        generated_at: now,
    })
}

/// `AND <column> IN (...)`, or a clause matching nothing for an empty set.
fn push_farm_scope(qb: &mut QueryBuilder<'_, Sqlite>, column: &str, farm_ids: &[i64]) {
    if farm_ids.is_empty() {
        qb.push(" AND 0");
        return;
    }
    qb.push(" AND ").push(column).push(" IN (");
    let mut ids = qb.separated(", ");
    for id in farm_ids {
        ids.push_bind(*id);
    }
    ids.push_unseparated(")");
}

async fn scoped_count(pool: &DbPool, base: &str, column: &str, farm_ids: &[i64]) -> AgriTechResult<i64> {
    let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(base);
    push_farm_scope(&mut qb, column, farm_ids);
    let (n,): (i64,) = qb.build_query_as().fetch_one(pool).await?;
    Ok(n)
}

/// Summary over the caller's farms, or over one farm when `farm_id` is given.
pub async fn dashboard(pool: &DbPool, user_id: i64, farm_id: Option<i64>, now: DateTime<Utc>) -> AgriTechResult<Dashboard> {
    let farm_ids: Vec<i64> = match farm_id {
        Some(id) => {
            ensure_exists(pool, "dashboard", "farms", "farm", id).await?;
            vec![id]
        }
        None => sqlx::query_scalar("SELECT id FROM farms WHERE owner_id = $1 ORDER BY id")
            .bind(user_id)
            .fetch_all(pool)
            .await?,
    };

    let total_crops = scoped_count(pool, "SELECT COUNT(*) FROM crops WHERE 1 = 1", "farm_id", &farm_ids).await?;
    let active_sensors = scoped_count(
        pool,
        "SELECT COUNT(*) FROM sensors WHERE status = 'active'",
        "farm_id",
        &farm_ids,
    )
    .await?;

    let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
        "SELECT sensor_alerts.* FROM sensor_alerts JOIN sensors ON sensors.id = sensor_alerts.sensor_id \
         WHERE sensor_alerts.is_resolved = FALSE",
    );
    push_farm_scope(&mut qb, "sensors.farm_id", &farm_ids);
    qb.push(" ORDER BY sensor_alerts.created_at DESC, sensor_alerts.id DESC LIMIT ")
        .push_bind(RECENT_ALERTS);
    let recent_alerts = qb.build_query_as::<SensorAlert>().fetch_all(pool).await?;

    let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
        "SELECT temperature_celsius, humidity_percent, measurement_time FROM weather_data \
         WHERE COALESCE(forecast_hours, 0) = 0 AND measurement_time <= ",
    );
    qb.push_bind(now);
    push_farm_scope(&mut qb, "farm_id", &farm_ids);
    qb.push(" ORDER BY measurement_time DESC LIMIT 1");
    let latest: Option<(Option<f64>, Option<f64>, DateTime<Utc>)> =
        qb.build_query_as().fetch_optional(pool).await?;
    let weather_summary = latest
        .map(|(current_temperature, current_humidity, measured_at)| CurrentConditions {
            current_temperature,
            current_humidity,
            measured_at: Some(measured_at),
        })
        .unwrap_or_default();

    let mut qb: QueryBuilder<Sqlite> =
        QueryBuilder::new("SELECT acquisition_date FROM satellite_data WHERE 1 = 1");
    push_farm_scope(&mut qb, "farm_id", &farm_ids);
    qb.push(" ORDER BY acquisition_date DESC LIMIT 1");
    let last_image_date: Option<DateTime<Utc>> = qb.build_query_scalar().fetch_optional(pool).await?;

    tracing::info!(user_id, farms = farm_ids.len(), "Generated dashboard data");
    Ok(Dashboard {
        user_id,
        farms_count: farm_ids.len() as i64,
        total_crops,
        active_sensors,
        recent_alerts,
        weather_summary,
        satellite_summary: SatelliteSummary {
            last_image_date,
            average_ndvi: Pending::NotYetSpecified,
        },
        generated_at: now,
    })
}

pub async fn request_farm_report(pool: &DbPool, tasks: &TaskQueue, farm_id: i64) -> AgriTechResult<TaskReceipt> {
    ensure_exists(pool, "request_farm_report", "farms", "farm", farm_id).await?;
    let receipt = tasks.enqueue(Job::GenerateFarmReport { farm_id })?;
    tracing::info!(farm_id, task_id = %receipt.task_id, "Farm report queued");
    Ok(receipt)
}

pub async fn request_yield_prediction(pool: &DbPool, tasks: &TaskQueue, crop_id: i64) -> AgriTechResult<TaskReceipt> {
    ensure_exists(pool, "request_yield_prediction", "crops", "crop", crop_id).await?;
    let receipt = tasks.enqueue(Job::PredictCropYield { crop_id })?;
    tracing::info!(crop_id, task_id = %receipt.task_id, "Yield prediction queued");
    Ok(receipt)
}

pub async fn farm_analytics_axum(
    State(pool): State<DbPool>,
    Path(farm_id): Path<i64>,
    Query(params): Query<WindowQuery>,
) -> AgriTechResult<Json<FarmAnalytics>> {
    let window = Lookback::days(params.days, DEFAULT_ANALYTICS_DAYS, MAX_ANALYTICS_DAYS)?;
    Ok(Json(farm_analytics(&pool, farm_id, window, Utc::now()).await?))
}

pub async fn crop_analytics_axum(
    State(pool): State<DbPool>,
    Path(crop_id): Path<i64>,
    Query(params): Query<WindowQuery>,
) -> AgriTechResult<Json<CropAnalytics>> {
    let window = Lookback::days(params.days, DEFAULT_ANALYTICS_DAYS, MAX_ANALYTICS_DAYS)?;
    Ok(Json(crop_analytics(&pool, crop_id, window, Utc::now()).await?))
}

pub async fn sensor_analytics_axum(
    State(pool): State<DbPool>,
    Path(farm_id): Path<i64>,
    Query(params): Query<WindowQuery>,
) -> AgriTechResult<Json<SensorAnalytics>> {
    let window = Lookback::days(params.days, DEFAULT_SENSOR_DAYS, MAX_SENSOR_DAYS)?;
    Ok(Json(sensor_analytics(&pool, farm_id, window, Utc::now()).await?))
}

pub async fn satellite_analytics_axum(
    State(pool): State<DbPool>,
    Path(farm_id): Path<i64>,
    Query(params): Query<WindowQuery>,
) -> AgriTechResult<Json<SatelliteAnalytics>> {
    let window = Lookback::days(params.days, DEFAULT_ANALYTICS_DAYS, MAX_ANALYTICS_DAYS)?;
    Ok(Json(satellite_analytics(&pool, farm_id, window, Utc::now()).await?))
}

pub async fn dashboard_axum(
    State(pool): State<DbPool>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Query(params): Query<DashboardQuery>,
) -> AgriTechResult<Json<Dashboard>> {
    Ok(Json(dashboard(&pool, user.id, params.farm_id, Utc::now()).await?))
}

pub async fn request_farm_report_axum(
    State(pool): State<DbPool>,
    State(tasks): State<TaskQueue>,
    Path(farm_id): Path<i64>,
) -> AgriTechResult<Json<TaskReceipt>> {
    Ok(Json(request_farm_report(&pool, &tasks, farm_id).await?))
}

pub async fn request_yield_prediction_axum(
    State(pool): State<DbPool>,
    State(tasks): State<TaskQueue>,
    Path(crop_id): Path<i64>,
) -> AgriTechResult<Json<TaskReceipt>> {
    Ok(Json(request_yield_prediction(&pool, &tasks, crop_id).await?))
}

use axum::extract::{Json, Path, Query, State};
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use sqlx::{QueryBuilder, Sqlite};

use super::{ensure_exists, Deleted};
use crate::db::DbPool;
use crate::error::{AgriTechError, AgriTechResult, StoreResultExt};
use crate::models::{Lookback, NewWeatherData, Pagination, WeatherData};
use crate::tasks::{Job, TaskQueue, TaskReceipt};

/// Half-width of the lat/lon box used for "near this point" lookups.
pub const PROXIMITY_DEGREES: f64 = 0.1;
pub const CURRENT_LIMIT: i64 = 10;
pub const DEFAULT_FORECAST_HOURS: i64 = 24;
pub const MAX_FORECAST_HOURS: i64 = 168;
pub const DEFAULT_HISTORY_DAYS: i64 = 7;
pub const MAX_HISTORY_DAYS: i64 = 30;

/// Optional farm plus optional point; a point needs both coordinates.
#[derive(Debug, Default, Clone, Copy, Deserialize)]
pub struct WeatherLocation {
    pub farm_id: Option<i64>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

impl WeatherLocation {
    fn point(&self) -> AgriTechResult<Option<(f64, f64)>> {
        match (self.latitude, self.longitude) {
            (Some(lat), Some(lon)) => Ok(Some((lat, lon))),
            (None, None) => Ok(None),
            _ => Err(AgriTechError::Validation(
                "latitude and longitude must be given together".to_string(),
            )),
        }
    }

    fn push_filters(&self, qb: &mut QueryBuilder<'_, Sqlite>) -> AgriTechResult<()> {
        if let Some(farm_id) = self.farm_id {
            qb.push(" AND farm_id = ").push_bind(farm_id);
        }
        if let Some((lat, lon)) = self.point()? {
            qb.push(" AND latitude BETWEEN ")
                .push_bind(lat - PROXIMITY_DEGREES)
                .push(" AND ")
                .push_bind(lat + PROXIMITY_DEGREES)
                .push(" AND longitude BETWEEN ")
                .push_bind(lon - PROXIMITY_DEGREES)
                .push(" AND ")
                .push_bind(lon + PROXIMITY_DEGREES);
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
pub struct LocationQuery {
    pub farm_id: Option<i64>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub struct ForecastQuery {
    pub farm_id: Option<i64>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub hours: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub farm_id: Option<i64>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub days: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct RecordsQuery {
    pub farm_id: Option<i64>,
    pub skip: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct WeatherUpdateRequest {
    pub farm_id: i64,
}

/// Observations from the last hour, newest first.
pub async fn current_weather(
    pool: &DbPool,
    location: WeatherLocation,
    now: DateTime<Utc>,
) -> AgriTechResult<Vec<WeatherData>> {
    let mut qb: QueryBuilder<Sqlite> =
        QueryBuilder::new("SELECT * FROM weather_data WHERE forecast_hours = 0 AND measurement_time >= ");
    qb.push_bind(now - Duration::hours(1));
    location.push_filters(&mut qb)?;
    qb.push(" ORDER BY measurement_time DESC, id DESC LIMIT ")
        .push_bind(CURRENT_LIMIT);

    let data = qb.build_query_as::<WeatherData>().fetch_all(pool).await?;
    tracing::info!(count = data.len(), "Retrieved current weather data");
    Ok(data)
}

/// Future forecast points up to `hours` ahead, oldest first.
pub async fn weather_forecast(
    pool: &DbPool,
    location: WeatherLocation,
    hours: i64,
    now: DateTime<Utc>,
) -> AgriTechResult<Vec<WeatherData>> {
    let mut qb: QueryBuilder<Sqlite> =
        QueryBuilder::new("SELECT * FROM weather_data WHERE forecast_hours > 0 AND forecast_hours <= ");
    qb.push_bind(hours)
        .push(" AND measurement_time >= ")
        .push_bind(now);
    location.push_filters(&mut qb)?;
    qb.push(" ORDER BY measurement_time ASC, id ASC");

    let data = qb.build_query_as::<WeatherData>().fetch_all(pool).await?;
    tracing::info!(count = data.len(), hours, "Retrieved weather forecast");
    Ok(data)
}

/// Observations inside `window`, newest first.
pub async fn weather_history(
    pool: &DbPool,
    location: WeatherLocation,
    window: Lookback,
    now: DateTime<Utc>,
) -> AgriTechResult<Vec<WeatherData>> {
    let (start, end) = window.range_ending(now);
    let mut qb: QueryBuilder<Sqlite> =
        QueryBuilder::new("SELECT * FROM weather_data WHERE forecast_hours = 0 AND measurement_time >= ");
    qb.push_bind(start)
        .push(" AND measurement_time <= ")
        .push_bind(end);
    location.push_filters(&mut qb)?;
    qb.push(" ORDER BY measurement_time DESC, id DESC");

    let data = qb.build_query_as::<WeatherData>().fetch_all(pool).await?;
    tracing::info!(count = data.len(), "Retrieved weather history");
    Ok(data)
}

pub async fn list_weather_records(
    pool: &DbPool,
    farm_id: Option<i64>,
    page: Pagination,
) -> AgriTechResult<Vec<WeatherData>> {
    let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new("SELECT * FROM weather_data WHERE 1 = 1");
    if let Some(farm_id) = farm_id {
        qb.push(" AND farm_id = ").push_bind(farm_id);
    }
    qb.push(" ORDER BY measurement_time DESC, id DESC LIMIT ")
        .push_bind(page.limit)
        .push(" OFFSET ")
        .push_bind(page.skip);

    Ok(qb.build_query_as::<WeatherData>().fetch_all(pool).await?)
}

pub async fn get_weather_record(pool: &DbPool, id: i64) -> AgriTechResult<WeatherData> {
    sqlx::query_as("SELECT * FROM weather_data WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or(AgriTechError::NotFound("weather record"))
}

pub async fn create_weather_record(pool: &DbPool, payload: NewWeatherData) -> AgriTechResult<WeatherData> {
    payload.validate()?;

    let mut tx = pool.begin().await.or_internal("create_weather_record", None)?;
    ensure_exists(&mut *tx, "create_weather_record", "farms", "farm", payload.farm_id).await?;

    let record: WeatherData = sqlx::query_as(
        "INSERT INTO weather_data (farm_id, latitude, longitude, temperature_celsius, humidity_percent, pressure_hpa, wind_speed_kmh, \
         wind_direction_degrees, rainfall_mm, solar_radiation_wm2, data_source, forecast_hours, measurement_time, created_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14) RETURNING *",
    )
    .bind(payload.farm_id)
    .bind(payload.latitude)
    .bind(payload.longitude)
    .bind(payload.temperature_celsius)
    .bind(payload.humidity_percent)
    .bind(payload.pressure_hpa)
    .bind(payload.wind_speed_kmh)
    .bind(payload.wind_direction_degrees)
    .bind(payload.rainfall_mm)
    .bind(payload.solar_radiation_wm2)
    .bind(&payload.data_source)
    .bind(payload.forecast_hours)
    .bind(payload.measurement_time)
    .bind(Utc::now())
    .fetch_one(&mut *tx)
    .await
    .or_internal("create_weather_record", None)?;
    tx.commit().await.or_internal("create_weather_record", Some(record.id))?;

    tracing::info!(weather_id = record.id, farm_id = record.farm_id, "Stored weather record");
    Ok(record)
}

pub async fn delete_weather_record(pool: &DbPool, id: i64) -> AgriTechResult<()> {
    let mut tx = pool.begin().await.or_internal("delete_weather_record", Some(id))?;
    let result = sqlx::query("DELETE FROM weather_data WHERE id = $1")
        .bind(id)
        .execute(&mut *tx)
        .await
        .or_internal("delete_weather_record", Some(id))?;
    if result.rows_affected() == 0 {
        return Err(AgriTechError::NotFound("weather record"));
    }
    tx.commit().await.or_internal("delete_weather_record", Some(id))?;

    tracing::info!(weather_id = id, "Deleted weather record");
    Ok(())
}

pub async fn request_weather_update(
    pool: &DbPool,
    tasks: &TaskQueue,
    farm_id: i64,
) -> AgriTechResult<TaskReceipt> {
    ensure_exists(pool, "request_weather_update", "farms", "farm", farm_id).await?;
    let receipt = tasks.enqueue(Job::UpdateWeatherData { farm_id })?;
    tracing::info!(farm_id, task_id = %receipt.task_id, "Weather update requested");
    Ok(receipt)
}

pub async fn current_weather_axum(
    State(pool): State<DbPool>,
    Query(q): Query<LocationQuery>,
) -> AgriTechResult<Json<Vec<WeatherData>>> {
    let location = WeatherLocation {
        farm_id: q.farm_id,
        latitude: q.latitude,
        longitude: q.longitude,
    };
    Ok(Json(current_weather(&pool, location, Utc::now()).await?))
}

pub async fn weather_forecast_axum(
    State(pool): State<DbPool>,
    Query(q): Query<ForecastQuery>,
) -> AgriTechResult<Json<Vec<WeatherData>>> {
    let hours = q.hours.unwrap_or(DEFAULT_FORECAST_HOURS);
    if !(1..=MAX_FORECAST_HOURS).contains(&hours) {
        return Err(AgriTechError::Validation(format!(
            "hours must be between 1 and {}",
            MAX_FORECAST_HOURS
        )));
    }
    let location = WeatherLocation {
        farm_id: q.farm_id,
        latitude: q.latitude,
        longitude: q.longitude,
    };
    Ok(Json(weather_forecast(&pool, location, hours, Utc::now()).await?))
}

pub async fn weather_history_axum(
    State(pool): State<DbPool>,
    Query(q): Query<HistoryQuery>,
) -> AgriTechResult<Json<Vec<WeatherData>>> {
    let window = Lookback::days(q.days, DEFAULT_HISTORY_DAYS, MAX_HISTORY_DAYS)?;
    let location = WeatherLocation {
        farm_id: q.farm_id,
        latitude: q.latitude,
        longitude: q.longitude,
    };
    Ok(Json(weather_history(&pool, location, window, Utc::now()).await?))
}

pub async fn list_weather_records_axum(
    State(pool): State<DbPool>,
    Query(q): Query<RecordsQuery>,
) -> AgriTechResult<Json<Vec<WeatherData>>> {
    let page = Pagination::new(q.skip, q.limit)?;
    Ok(Json(list_weather_records(&pool, q.farm_id, page).await?))
}

pub async fn create_weather_record_axum(
    State(pool): State<DbPool>,
    Json(payload): Json<NewWeatherData>,
) -> AgriTechResult<Json<WeatherData>> {
    Ok(Json(create_weather_record(&pool, payload).await?))
}

pub async fn get_weather_record_axum(
    State(pool): State<DbPool>,
    Path(id): Path<i64>,
) -> AgriTechResult<Json<WeatherData>> {
    Ok(Json(get_weather_record(&pool, id).await?))
}

pub async fn delete_weather_record_axum(
    State(pool): State<DbPool>,
    Path(id): Path<i64>,
) -> AgriTechResult<Json<Deleted>> {
    delete_weather_record(&pool, id).await?;
    Ok(Json(Deleted::new(id)))
}

pub async fn request_weather_update_axum(
    State(pool): State<DbPool>,
    State(tasks): State<TaskQueue>,
    Query(q): Query<WeatherUpdateRequest>,
) -> AgriTechResult<Json<TaskReceipt>> {
    Ok(Json(request_weather_update(&pool, &tasks, q.farm_id).await?))
}

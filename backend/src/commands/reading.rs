use axum::extract::{Json, Path, Query, State};
use axum::Extension;
use chrono::{DateTime, Utc};
use serde::Deserialize;

use super::{ensure_exists, Deleted};
use crate::db::DbPool;
use crate::error::{AgriTechError, AgriTechResult, StoreResultExt};
use crate::middleware::CurrentUser;
use crate::models::{Lookback, NewSensorReading, Pagination, SensorReading};

pub const DEFAULT_READING_HOURS: i64 = 24;
pub const MAX_READING_HOURS: i64 = 168;

#[derive(Debug, Deserialize)]
pub struct ReadingListQuery {
    pub hours: Option<i64>,
    pub skip: Option<i64>,
    pub limit: Option<i64>,
}

/// Readings inside `window` ending at `now`, newest first.
pub async fn list_readings(
    pool: &DbPool,
    sensor_id: i64,
    window: Lookback,
    page: Pagination,
    now: DateTime<Utc>,
) -> AgriTechResult<Vec<SensorReading>> {
    ensure_exists(pool, "list_readings", "sensors", "sensor", sensor_id).await?;
    let (start, end) = window.range_ending(now);

    let readings: Vec<SensorReading> = sqlx::query_as(
        "SELECT * FROM sensor_readings WHERE sensor_id = $1 AND reading_timestamp >= $2 AND reading_timestamp <= $3 \
         ORDER BY reading_timestamp DESC, id DESC LIMIT $4 OFFSET $5",
    )
    .bind(sensor_id)
    .bind(start)
    .bind(end)
    .bind(page.limit)
    .bind(page.skip)
    .fetch_all(pool)
    .await?;

    tracing::info!(sensor_id, count = readings.len(), "Retrieved sensor readings");
    Ok(readings)
}

pub async fn get_reading(pool: &DbPool, id: i64) -> AgriTechResult<SensorReading> {
    sqlx::query_as("SELECT * FROM sensor_readings WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or(AgriTechError::NotFound("reading"))
}

/// Stores the reading and advances the sensor's `last_reading_time`.
pub async fn create_reading(
    pool: &DbPool,
    sensor_id: i64,
    payload: NewSensorReading,
    recorded_by: Option<i64>,
) -> AgriTechResult<SensorReading> {
    let received = Utc::now();
    let taken_at = payload.reading_timestamp.unwrap_or(received);

    let mut tx = pool.begin().await.or_internal("create_reading", Some(sensor_id))?;
    ensure_exists(&mut *tx, "create_reading", "sensors", "sensor", sensor_id).await?;

    let reading: SensorReading = sqlx::query_as(
        "INSERT INTO sensor_readings (value, unit, quality_score, reading_timestamp, received_timestamp, temperature, humidity, \
         sensor_id, user_id, metadata) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) RETURNING *",
    )
    .bind(payload.value)
    .bind(&payload.unit)
    .bind(payload.quality_score)
    .bind(taken_at)
    .bind(received)
    .bind(payload.temperature)
    .bind(payload.humidity)
    .bind(sensor_id)
    .bind(recorded_by)
    .bind(&payload.metadata)
    .fetch_one(&mut *tx)
    .await
    .or_internal("create_reading", Some(sensor_id))?;

    sqlx::query(
        "UPDATE sensors SET last_reading_time = $1 WHERE id = $2 AND (last_reading_time IS NULL OR last_reading_time < $1)",
    )
    .bind(taken_at)
    .bind(sensor_id)
    .execute(&mut *tx)
    .await
    .or_internal("create_reading", Some(sensor_id))?;
    tx.commit().await.or_internal("create_reading", Some(reading.id))?;

    tracing::info!(sensor_id, reading_id = reading.id, "Recorded sensor reading");
    Ok(reading)
}

pub async fn delete_reading(pool: &DbPool, id: i64) -> AgriTechResult<()> {
    let mut tx = pool.begin().await.or_internal("delete_reading", Some(id))?;
    let result = sqlx::query("DELETE FROM sensor_readings WHERE id = $1")
        .bind(id)
        .execute(&mut *tx)
        .await
        .or_internal("delete_reading", Some(id))?;
    if result.rows_affected() == 0 {
        return Err(AgriTechError::NotFound("reading"));
    }
    tx.commit().await.or_internal("delete_reading", Some(id))?;

    tracing::info!(reading_id = id, "Deleted sensor reading");
    Ok(())
}

pub async fn list_readings_axum(
    State(pool): State<DbPool>,
    Path(sensor_id): Path<i64>,
    Query(params): Query<ReadingListQuery>,
) -> AgriTechResult<Json<Vec<SensorReading>>> {
    let window = Lookback::hours(params.hours, DEFAULT_READING_HOURS, MAX_READING_HOURS)?;
    let page = Pagination::new(params.skip, params.limit)?;
    Ok(Json(
        list_readings(&pool, sensor_id, window, page, Utc::now()).await?,
    ))
}

pub async fn create_reading_axum(
    State(pool): State<DbPool>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(sensor_id): Path<i64>,
    Json(payload): Json<NewSensorReading>,
) -> AgriTechResult<Json<SensorReading>> {
    Ok(Json(
        create_reading(&pool, sensor_id, payload, Some(user.id)).await?,
    ))
}

pub async fn get_reading_axum(
    State(pool): State<DbPool>,
    Path(id): Path<i64>,
) -> AgriTechResult<Json<SensorReading>> {
    Ok(Json(get_reading(&pool, id).await?))
}

pub async fn delete_reading_axum(
    State(pool): State<DbPool>,
    Path(id): Path<i64>,
) -> AgriTechResult<Json<Deleted>> {
    delete_reading(&pool, id).await?;
    Ok(Json(Deleted::new(id)))
}

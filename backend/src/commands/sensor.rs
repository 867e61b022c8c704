use axum::extract::{Json, Path, Query, State};
use chrono::Utc;
use serde::Deserialize;
use sqlx::{QueryBuilder, Sqlite};

use super::{ensure_exists, Deleted};
use crate::db::DbPool;
use crate::error::{is_unique_violation, AgriTechError, AgriTechResult, StoreResultExt};
use crate::models::{
    apply_patch, require_text, NewSensor, Pagination, Sensor, SensorStatus, SensorType, SensorUpdate,
};
use crate::tasks::{Job, TaskQueue, TaskReceipt};

#[derive(Debug, Default, Deserialize)]
pub struct SensorFilter {
    pub farm_id: Option<i64>,
    pub sensor_type: Option<SensorType>,
    pub status: Option<SensorStatus>,
}

#[derive(Debug, Deserialize)]
pub struct SensorListQuery {
    pub skip: Option<i64>,
    pub limit: Option<i64>,
    pub farm_id: Option<i64>,
    pub sensor_type: Option<SensorType>,
    pub status: Option<SensorStatus>,
}

pub async fn list_sensors(
    pool: &DbPool,
    filter: &SensorFilter,
    page: Pagination,
) -> AgriTechResult<Vec<Sensor>> {
    let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new("SELECT * FROM sensors WHERE 1 = 1");
    if let Some(farm_id) = filter.farm_id {
        qb.push(" AND farm_id = ").push_bind(farm_id);
    }
    if let Some(sensor_type) = filter.sensor_type {
        qb.push(" AND sensor_type = ").push_bind(sensor_type);
    }
    if let Some(status) = filter.status {
        qb.push(" AND status = ").push_bind(status);
    }
    qb.push(" ORDER BY id LIMIT ")
        .push_bind(page.limit)
        .push(" OFFSET ")
        .push_bind(page.skip);

    let sensors = qb.build_query_as::<Sensor>().fetch_all(pool).await?;
    tracing::info!(count = sensors.len(), "Retrieved sensors");
    Ok(sensors)
}

pub async fn get_sensor(pool: &DbPool, id: i64) -> AgriTechResult<Sensor> {
    sqlx::query_as("SELECT * FROM sensors WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or(AgriTechError::NotFound("sensor"))
}

fn duplicate_device(device_id: &str) -> AgriTechError {
    AgriTechError::Validation(format!("device_id {} is already registered", device_id))
}

pub async fn create_sensor(pool: &DbPool, payload: NewSensor) -> AgriTechResult<Sensor> {
    payload.validate()?;

    let mut tx = pool.begin().await.or_internal("create_sensor", None)?;
    ensure_exists(&mut *tx, "create_sensor", "farms", "farm", payload.farm_id).await?;

    let (taken,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM sensors WHERE device_id = $1")
        .bind(&payload.device_id)
        .fetch_one(&mut *tx)
        .await
        .or_internal("create_sensor", None)?;
    if taken > 0 {
        return Err(duplicate_device(&payload.device_id));
    }

    let inserted = sqlx::query_as::<_, Sensor>(
        "INSERT INTO sensors (name, description, device_id, sensor_type, manufacturer, model, farm_id, latitude, longitude, altitude, \
         installation_date, measurement_unit, min_value, max_value, accuracy, status, is_online, communication_protocol, \
         data_transmission_interval, configuration, created_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, TRUE, $17, $18, $19, $20) RETURNING *",
    )
    .bind(&payload.name)
    .bind(&payload.description)
    .bind(&payload.device_id)
    .bind(payload.sensor_type)
    .bind(&payload.manufacturer)
    .bind(&payload.model)
    .bind(payload.farm_id)
    .bind(payload.latitude)
    .bind(payload.longitude)
    .bind(payload.altitude)
    .bind(payload.installation_date)
    .bind(&payload.measurement_unit)
    .bind(payload.min_value)
    .bind(payload.max_value)
    .bind(payload.accuracy)
    .bind(SensorStatus::Active)
    .bind(&payload.communication_protocol)
    .bind(payload.data_transmission_interval)
    .bind(&payload.configuration)
    .bind(Utc::now())
    .fetch_one(&mut *tx)
    .await;

    let sensor = match inserted {
        Ok(sensor) => sensor,
        Err(e) if is_unique_violation(&e) => return Err(duplicate_device(&payload.device_id)),
        Err(e) => return Err(e).or_internal("create_sensor", None),
    };
    tx.commit().await.or_internal("create_sensor", Some(sensor.id))?;

    tracing::info!(sensor_id = sensor.id, device_id = %sensor.device_id, "Created sensor");
    Ok(sensor)
}

pub async fn update_sensor(pool: &DbPool, id: i64, patch: SensorUpdate) -> AgriTechResult<Sensor> {
    if let Some(name) = &patch.name {
        require_text("name", name)?;
    }

    let mut tx = pool.begin().await.or_internal("update_sensor", Some(id))?;
    let mut sensor: Sensor = sqlx::query_as("SELECT * FROM sensors WHERE id = $1")
        .bind(id)
        .fetch_optional(&mut *tx)
        .await
        .or_internal("update_sensor", Some(id))?
        .ok_or(AgriTechError::NotFound("sensor"))?;

    apply_patch!(patch => sensor;
        name, description, manufacturer, model, latitude, longitude, altitude, measurement_unit,
        min_value, max_value, accuracy, installation_date, calibration_date, status, is_online, battery_level,
        signal_strength, communication_protocol, data_transmission_interval, configuration,
    );
    sensor.updated_at = Some(Utc::now());

    let sensor: Sensor = sqlx::query_as(
        "UPDATE sensors SET name = $1, description = $2, manufacturer = $3, model = $4, latitude = $5, longitude = $6, \
         altitude = $7, measurement_unit = $8, min_value = $9, max_value = $10, accuracy = $11, installation_date = $12, \
         calibration_date = $13, status = $14, is_online = $15, battery_level = $16, signal_strength = $17, \
         communication_protocol = $18, data_transmission_interval = $19, configuration = $20, updated_at = $21 \
         WHERE id = $22 RETURNING *",
    )
    .bind(&sensor.name)
    .bind(&sensor.description)
    .bind(&sensor.manufacturer)
    .bind(&sensor.model)
    .bind(sensor.latitude)
    .bind(sensor.longitude)
    .bind(sensor.altitude)
    .bind(&sensor.measurement_unit)
    .bind(sensor.min_value)
    .bind(sensor.max_value)
    .bind(sensor.accuracy)
    .bind(sensor.installation_date)
    .bind(sensor.calibration_date)
    .bind(sensor.status)
    .bind(sensor.is_online)
    .bind(sensor.battery_level)
    .bind(sensor.signal_strength)
    .bind(&sensor.communication_protocol)
    .bind(sensor.data_transmission_interval)
    .bind(&sensor.configuration)
    .bind(sensor.updated_at)
    .bind(id)
    .fetch_one(&mut *tx)
    .await
    .or_internal("update_sensor", Some(id))?;
    tx.commit().await.or_internal("update_sensor", Some(id))?;

    tracing::info!(sensor_id = id, "Updated sensor");
    Ok(sensor)
}

/// Readings and alerts go with the sensor.
pub async fn delete_sensor(pool: &DbPool, id: i64) -> AgriTechResult<()> {
    let mut tx = pool.begin().await.or_internal("delete_sensor", Some(id))?;
    let result = sqlx::query("DELETE FROM sensors WHERE id = $1")
        .bind(id)
        .execute(&mut *tx)
        .await
        .or_internal("delete_sensor", Some(id))?;
    if result.rows_affected() == 0 {
        return Err(AgriTechError::NotFound("sensor"));
    }
    tx.commit().await.or_internal("delete_sensor", Some(id))?;

    tracing::info!(sensor_id = id, "Deleted sensor");
    Ok(())
}

pub async fn request_calibration(
    pool: &DbPool,
    tasks: &TaskQueue,
    sensor_id: i64,
) -> AgriTechResult<TaskReceipt> {
    ensure_exists(pool, "request_calibration", "sensors", "sensor", sensor_id).await?;
    let receipt = tasks.enqueue(Job::CalibrateSensor { sensor_id })?;
    tracing::info!(sensor_id, task_id = %receipt.task_id, "Sensor calibration requested");
    Ok(receipt)
}

pub async fn list_sensors_axum(
    State(pool): State<DbPool>,
    Query(params): Query<SensorListQuery>,
) -> AgriTechResult<Json<Vec<Sensor>>> {
    let page = Pagination::new(params.skip, params.limit)?;
    let filter = SensorFilter {
        farm_id: params.farm_id,
        sensor_type: params.sensor_type,
        status: params.status,
    };
    Ok(Json(list_sensors(&pool, &filter, page).await?))
}

pub async fn get_sensor_axum(
    State(pool): State<DbPool>,
    Path(id): Path<i64>,
) -> AgriTechResult<Json<Sensor>> {
    Ok(Json(get_sensor(&pool, id).await?))
}

pub async fn create_sensor_axum(
    State(pool): State<DbPool>,
    Json(payload): Json<NewSensor>,
) -> AgriTechResult<Json<Sensor>> {
    Ok(Json(create_sensor(&pool, payload).await?))
}

pub async fn update_sensor_axum(
    State(pool): State<DbPool>,
    Path(id): Path<i64>,
    Json(patch): Json<SensorUpdate>,
) -> AgriTechResult<Json<Sensor>> {
    Ok(Json(update_sensor(&pool, id, patch).await?))
}

pub async fn delete_sensor_axum(
    State(pool): State<DbPool>,
    Path(id): Path<i64>,
) -> AgriTechResult<Json<Deleted>> {
    delete_sensor(&pool, id).await?;
    Ok(Json(Deleted::new(id)))
}

pub async fn calibrate_sensor_axum(
    State(pool): State<DbPool>,
    State(tasks): State<TaskQueue>,
    Path(id): Path<i64>,
) -> AgriTechResult<Json<TaskReceipt>> {
    Ok(Json(request_calibration(&pool, &tasks, id).await?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{new_sensor, seed_farm, seed_user, test_pool};

    #[tokio::test]
    async fn test_device_id_is_unique() {
        let pool = test_pool().await;
        let owner = seed_user(&pool, "alice").await;
        let farm = seed_farm(&pool, owner.id, "F1").await;

        create_sensor(&pool, new_sensor(farm.id, "dev-1")).await.unwrap();
        assert!(matches!(
            create_sensor(&pool, new_sensor(farm.id, "dev-1")).await,
            Err(AgriTechError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_sensor_requires_farm() {
        let pool = test_pool().await;
        assert!(matches!(
            create_sensor(&pool, new_sensor(5, "dev-1")).await,
            Err(AgriTechError::NotFound("farm"))
        ));
    }

    #[tokio::test]
    async fn test_update_status_and_filter() {
        let pool = test_pool().await;
        let owner = seed_user(&pool, "alice").await;
        let farm = seed_farm(&pool, owner.id, "F1").await;
        let s1 = create_sensor(&pool, new_sensor(farm.id, "dev-1")).await.unwrap();
        create_sensor(&pool, new_sensor(farm.id, "dev-2")).await.unwrap();
        assert_eq!(s1.status, SensorStatus::Active);
        assert!(s1.is_online);

        let patch: SensorUpdate =
            serde_json::from_str(r#"{"status": "offline", "is_online": false, "battery_level": 12.0}"#)
                .unwrap();
        let updated = update_sensor(&pool, s1.id, patch).await.unwrap();
        assert_eq!(updated.status, SensorStatus::Offline);
        assert!(!updated.is_online);
        assert_eq!(updated.device_id, "dev-1");
        assert_eq!(updated.sensor_type, SensorType::SoilMoisture);

        let offline = list_sensors(
            &pool,
            &SensorFilter {
                farm_id: Some(farm.id),
                status: Some(SensorStatus::Offline),
                ..SensorFilter::default()
            },
            Pagination::default(),
        )
        .await
        .unwrap();
        assert_eq!(offline.len(), 1);
        assert_eq!(offline[0].id, s1.id);
    }

    #[tokio::test]
    async fn test_installation_date_patch_is_applied() {
        let pool = test_pool().await;
        let owner = seed_user(&pool, "alice").await;
        let farm = seed_farm(&pool, owner.id, "F1").await;
        let sensor = create_sensor(&pool, new_sensor(farm.id, "dev-1")).await.unwrap();
        assert!(sensor.installation_date.is_none());

        let patch: SensorUpdate =
            serde_json::from_str(r#"{"installation_date": "2025-03-01T00:00:00Z"}"#).unwrap();
        let updated = update_sensor(&pool, sensor.id, patch).await.unwrap();
        let installed = chrono::DateTime::parse_from_rfc3339("2025-03-01T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(updated.installation_date, Some(installed));
        assert_eq!(updated.name, sensor.name);

        let cleared: SensorUpdate = serde_json::from_str(r#"{"installation_date": null}"#).unwrap();
        let updated = update_sensor(&pool, sensor.id, cleared).await.unwrap();
        assert!(updated.installation_date.is_none());
    }
}

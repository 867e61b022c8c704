use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::commands::analytics::Pending;
use crate::db::DbPool;
use crate::error::{AgriTechError, AgriTechResult};

/// Matches the periodic schedule for sensor processing.
pub const SENSOR_BATCH_MINUTES: i64 = 5;

#[derive(Debug, Serialize)]
pub struct BatchOutcome {
    pub readings_in_batch: i64,
    pub sensors_reporting: i64,
    pub anomalies: Pending,
}

#[derive(Debug, Serialize)]
pub struct HealthOutcome {
    pub online: i64,
    pub offline: i64,
    pub low_battery: i64,
}

#[derive(Debug, Serialize)]
pub struct CalibrationOutcome {
    pub sensor_id: i64,
    pub last_calibrated: Option<DateTime<Utc>>,
    pub offsets: Pending,
}

/// Battery level (percent) below which a sensor is reported as low.
const LOW_BATTERY_PERCENT: f64 = 20.0;

pub async fn process_sensor_data(pool: &DbPool, now: DateTime<Utc>) -> AgriTechResult<BatchOutcome> {
    let since = now - Duration::minutes(SENSOR_BATCH_MINUTES);
    let (readings_in_batch, sensors_reporting): (i64, i64) = sqlx::query_as(
        "SELECT COUNT(*), COUNT(DISTINCT sensor_id) FROM sensor_readings \
         WHERE reading_timestamp >= $1 AND reading_timestamp <= $2",
    )
    .bind(since)
    .bind(now)
    .fetch_one(pool)
    .await?;

    tracing::info!(readings_in_batch, sensors_reporting, "Processed sensor batch");
    Ok(BatchOutcome {
        readings_in_batch,
        sensors_reporting,
        anomalies: Pending::NotYetSpecified,
    })
}

pub async fn check_sensor_health(pool: &DbPool) -> AgriTechResult<HealthOutcome> {
    let (online, offline, low_battery): (i64, i64, i64) = sqlx::query_as(
        "SELECT COALESCE(SUM(CASE WHEN is_online THEN 1 ELSE 0 END), 0), \
                COALESCE(SUM(CASE WHEN is_online THEN 0 ELSE 1 END), 0), \
                COALESCE(SUM(CASE WHEN battery_level < $1 THEN 1 ELSE 0 END), 0) \
         FROM sensors",
    )
    .bind(LOW_BATTERY_PERCENT)
    .fetch_one(pool)
    .await?;

    if offline > 0 || low_battery > 0 {
        tracing::warn!(offline, low_battery, "Sensors need attention");
    }
    Ok(HealthOutcome {
        online,
        offline,
        low_battery,
    })
}

pub async fn calibrate_sensor(pool: &DbPool, sensor_id: i64) -> AgriTechResult<CalibrationOutcome> {
    let last_calibrated: Option<DateTime<Utc>> =
        sqlx::query_scalar("SELECT calibration_date FROM sensors WHERE id = $1")
            .bind(sensor_id)
            .fetch_optional(pool)
            .await?
            .ok_or(AgriTechError::NotFound("sensor"))?;

    Ok(CalibrationOutcome {
        sensor_id,
        last_calibrated,
        offsets: Pending::NotYetSpecified,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::reading::create_reading;
    use crate::commands::sensor::{create_sensor, update_sensor};
    use crate::models::{NewSensorReading, SensorUpdate};
    use crate::test_support::{new_sensor, seed_farm, seed_user, test_pool};

    fn reading_at(value: f64, at: DateTime<Utc>) -> NewSensorReading {
        NewSensorReading {
            value,
            unit: Some("%".into()),
            quality_score: None,
            reading_timestamp: Some(at),
            temperature: None,
            humidity: None,
            metadata: None,
        }
    }

    #[tokio::test]
    async fn test_batch_only_counts_recent_readings() {
        let pool = test_pool().await;
        let owner = seed_user(&pool, "alice").await;
        let farm = seed_farm(&pool, owner.id, "F1").await;
        let a = create_sensor(&pool, new_sensor(farm.id, "dev-a")).await.unwrap();
        let b = create_sensor(&pool, new_sensor(farm.id, "dev-b")).await.unwrap();
        let now = Utc::now();

        create_reading(&pool, a.id, reading_at(10.0, now - Duration::minutes(1)), None).await.unwrap();
        create_reading(&pool, a.id, reading_at(11.0, now - Duration::minutes(2)), None).await.unwrap();
        create_reading(&pool, b.id, reading_at(12.0, now - Duration::minutes(3)), None).await.unwrap();
        create_reading(&pool, b.id, reading_at(13.0, now - Duration::minutes(30)), None).await.unwrap();

        let batch = process_sensor_data(&pool, now).await.unwrap();
        assert_eq!(batch.readings_in_batch, 3);
        assert_eq!(batch.sensors_reporting, 2);
    }

    #[tokio::test]
    async fn test_health_counts_offline_sensors() {
        let pool = test_pool().await;
        let owner = seed_user(&pool, "alice").await;
        let farm = seed_farm(&pool, owner.id, "F1").await;
        create_sensor(&pool, new_sensor(farm.id, "dev-a")).await.unwrap();
        let b = create_sensor(&pool, new_sensor(farm.id, "dev-b")).await.unwrap();
        let patch = SensorUpdate {
            is_online: Some(false),
            battery_level: Some(Some(5.0)),
            ..SensorUpdate::default()
        };
        update_sensor(&pool, b.id, patch).await.unwrap();

        let health = check_sensor_health(&pool).await.unwrap();
        assert_eq!(health.online, 1);
        assert_eq!(health.offline, 1);
        assert_eq!(health.low_battery, 1);
    }

    #[tokio::test]
    async fn test_calibration_of_missing_sensor() {
        let pool = test_pool().await;
        assert!(matches!(
            calibrate_sensor(&pool, 7).await,
            Err(AgriTechError::NotFound("sensor"))
        ));
    }
}

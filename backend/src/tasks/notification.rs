use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::commands::analytics::Pending;
use crate::db::DbPool;
use crate::error::{AgriTechError, AgriTechResult};

/// How far ahead forecasts are scanned for weather alerts.
const WEATHER_ALERT_HORIZON_HOURS: i64 = 24;

#[derive(Debug, Serialize)]
pub struct DailyReportsOutcome {
    pub recipients: i64,
    pub delivery: Pending,
}

#[derive(Debug, Serialize)]
pub struct AlertOutcome {
    pub user_id: i64,
    pub alert_type: String,
    pub delivery: Pending,
}

#[derive(Debug, Serialize)]
pub struct WeatherAlertsOutcome {
    pub forecasts_checked: i64,
    pub delivery: Pending,
}

pub async fn send_daily_reports(pool: &DbPool) -> AgriTechResult<DailyReportsOutcome> {
    let (recipients,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users WHERE is_active = TRUE")
        .fetch_one(pool)
        .await?;

    tracing::info!(recipients, "Daily reports prepared");
    Ok(DailyReportsOutcome {
        recipients,
        delivery: Pending::NotYetSpecified,
    })
}

pub async fn send_alert_notification(
    pool: &DbPool,
    user_id: i64,
    alert_type: &str,
    message: &str,
) -> AgriTechResult<AlertOutcome> {
    let email: String = sqlx::query_scalar("SELECT email FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_optional(pool)
        .await?
        .ok_or(AgriTechError::NotFound("user"))?;

    tracing::info!(user_id, %email, alert_type, message, "Alert notification prepared");
    Ok(AlertOutcome {
        user_id,
        alert_type: alert_type.to_string(),
        delivery: Pending::NotYetSpecified,
    })
}

pub async fn send_weather_alerts(pool: &DbPool, now: DateTime<Utc>) -> AgriTechResult<WeatherAlertsOutcome> {
    let (forecasts_checked,): (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM weather_data WHERE forecast_hours > 0 AND forecast_hours <= $1 AND measurement_time >= $2",
    )
    .bind(WEATHER_ALERT_HORIZON_HOURS)
    .bind(now)
    .fetch_one(pool)
    .await?;

    Ok(WeatherAlertsOutcome {
        forecasts_checked,
        delivery: Pending::NotYetSpecified,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::weather::create_weather_record;
    use crate::test_support::{seed_farm, seed_user, test_pool, weather_at};
    use chrono::Duration;

    #[tokio::test]
    async fn test_alert_notification_requires_recipient() {
        let pool = test_pool().await;
        let alice = seed_user(&pool, "alice").await;

        let outcome = send_alert_notification(&pool, alice.id, "threshold", "dry soil")
            .await
            .unwrap();
        assert_eq!(outcome.alert_type, "threshold");
        assert!(matches!(
            send_alert_notification(&pool, alice.id + 1, "threshold", "dry soil").await,
            Err(AgriTechError::NotFound("user"))
        ));
    }

    #[tokio::test]
    async fn test_weather_alerts_scan_upcoming_forecasts() {
        let pool = test_pool().await;
        let owner = seed_user(&pool, "alice").await;
        let farm = seed_farm(&pool, owner.id, "F1").await;
        let now = Utc::now();
        create_weather_record(&pool, weather_at(farm.id, now + Duration::hours(6), 6)).await.unwrap();
        create_weather_record(&pool, weather_at(farm.id, now + Duration::hours(48), 48)).await.unwrap();
        create_weather_record(&pool, weather_at(farm.id, now - Duration::hours(1), 0)).await.unwrap();

        let outcome = send_weather_alerts(&pool, now).await.unwrap();
        assert_eq!(outcome.forecasts_checked, 1);

        let reports = send_daily_reports(&pool).await.unwrap();
        assert_eq!(reports.recipients, 1);
    }
}

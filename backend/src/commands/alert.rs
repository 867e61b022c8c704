use axum::extract::{Json, Path, Query, State};
use axum::Extension;
use chrono::Utc;
use serde::Deserialize;
use sqlx::{QueryBuilder, Sqlite};

use super::Deleted;
use crate::db::DbPool;
use crate::error::{AgriTechError, AgriTechResult, StoreResultExt};
use crate::middleware::CurrentUser;
use crate::models::{AlertSeverity, NewSensorAlert, Pagination, SensorAlert};
use crate::tasks::{Job, TaskQueue};

#[derive(Debug, Default, Deserialize)]
pub struct AlertFilter {
    pub sensor_id: Option<i64>,
    pub severity: Option<AlertSeverity>,
    pub is_resolved: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct AlertListQuery {
    pub skip: Option<i64>,
    pub limit: Option<i64>,
    pub sensor_id: Option<i64>,
    pub severity: Option<AlertSeverity>,
    pub is_resolved: Option<bool>,
}

/// Newest first.
pub async fn list_alerts(
    pool: &DbPool,
    filter: &AlertFilter,
    page: Pagination,
) -> AgriTechResult<Vec<SensorAlert>> {
    let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new("SELECT * FROM sensor_alerts WHERE 1 = 1");
    if let Some(sensor_id) = filter.sensor_id {
        qb.push(" AND sensor_id = ").push_bind(sensor_id);
    }
    if let Some(severity) = filter.severity {
        qb.push(" AND severity = ").push_bind(severity);
    }
    if let Some(is_resolved) = filter.is_resolved {
        qb.push(" AND is_resolved = ").push_bind(is_resolved);
    }
    qb.push(" ORDER BY created_at DESC, id DESC LIMIT ")
        .push_bind(page.limit)
        .push(" OFFSET ")
        .push_bind(page.skip);

    let alerts = qb.build_query_as::<SensorAlert>().fetch_all(pool).await?;
    tracing::info!(count = alerts.len(), "Retrieved sensor alerts");
    Ok(alerts)
}

pub async fn get_alert(pool: &DbPool, id: i64) -> AgriTechResult<SensorAlert> {
    sqlx::query_as("SELECT * FROM sensor_alerts WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or(AgriTechError::NotFound("alert"))
}

/// Returns the alert and the id of the owner of the sensor's farm.
pub async fn create_alert(pool: &DbPool, payload: NewSensorAlert) -> AgriTechResult<(SensorAlert, i64)> {
    payload.validate()?;

    let mut tx = pool.begin().await.or_internal("create_alert", Some(payload.sensor_id))?;
    let owner: Option<(i64,)> = sqlx::query_as(
        "SELECT farms.owner_id FROM sensors JOIN farms ON farms.id = sensors.farm_id WHERE sensors.id = $1",
    )
    .bind(payload.sensor_id)
    .fetch_optional(&mut *tx)
    .await
    .or_internal("create_alert", Some(payload.sensor_id))?;
    let (owner_id,) = owner.ok_or(AgriTechError::NotFound("sensor"))?;

    let alert: SensorAlert = sqlx::query_as(
        "INSERT INTO sensor_alerts (alert_type, severity, message, threshold_value, actual_value, is_resolved, sensor_id, created_at) \
         VALUES ($1, $2, $3, $4, $5, FALSE, $6, $7) RETURNING *",
    )
    .bind(&payload.alert_type)
    .bind(payload.severity)
    .bind(&payload.message)
    .bind(payload.threshold_value)
    .bind(payload.actual_value)
    .bind(payload.sensor_id)
    .bind(Utc::now())
    .fetch_one(&mut *tx)
    .await
    .or_internal("create_alert", Some(payload.sensor_id))?;
    tx.commit().await.or_internal("create_alert", Some(alert.id))?;

    tracing::info!(alert_id = alert.id, sensor_id = alert.sensor_id, severity = ?alert.severity, "Raised sensor alert");
    Ok((alert, owner_id))
}

/// Resolving twice keeps the first resolution.
pub async fn resolve_alert(pool: &DbPool, id: i64, resolved_by: i64) -> AgriTechResult<SensorAlert> {
    let mut tx = pool.begin().await.or_internal("resolve_alert", Some(id))?;
    let alert: SensorAlert = sqlx::query_as("SELECT * FROM sensor_alerts WHERE id = $1")
        .bind(id)
        .fetch_optional(&mut *tx)
        .await
        .or_internal("resolve_alert", Some(id))?
        .ok_or(AgriTechError::NotFound("alert"))?;
    if alert.is_resolved {
        return Ok(alert);
    }

    let alert: SensorAlert = sqlx::query_as(
        "UPDATE sensor_alerts SET is_resolved = TRUE, resolved_at = $1, resolved_by = $2 WHERE id = $3 RETURNING *",
    )
    .bind(Utc::now())
    .bind(resolved_by)
    .bind(id)
    .fetch_one(&mut *tx)
    .await
    .or_internal("resolve_alert", Some(id))?;
    tx.commit().await.or_internal("resolve_alert", Some(id))?;

    tracing::info!(alert_id = id, resolved_by, "Resolved sensor alert");
    Ok(alert)
}

pub async fn delete_alert(pool: &DbPool, id: i64) -> AgriTechResult<()> {
    let mut tx = pool.begin().await.or_internal("delete_alert", Some(id))?;
    let result = sqlx::query("DELETE FROM sensor_alerts WHERE id = $1")
        .bind(id)
        .execute(&mut *tx)
        .await
        .or_internal("delete_alert", Some(id))?;
    if result.rows_affected() == 0 {
        return Err(AgriTechError::NotFound("alert"));
    }
    tx.commit().await.or_internal("delete_alert", Some(id))?;

    tracing::info!(alert_id = id, "Deleted sensor alert");
    Ok(())
}

pub async fn list_alerts_axum(
    State(pool): State<DbPool>,
    Query(params): Query<AlertListQuery>,
) -> AgriTechResult<Json<Vec<SensorAlert>>> {
    let page = Pagination::new(params.skip, params.limit)?;
    let filter = AlertFilter {
        sensor_id: params.sensor_id,
        severity: params.severity,
        is_resolved: params.is_resolved,
    };
    Ok(Json(list_alerts(&pool, &filter, page).await?))
}

pub async fn get_alert_axum(
    State(pool): State<DbPool>,
    Path(id): Path<i64>,
) -> AgriTechResult<Json<SensorAlert>> {
    Ok(Json(get_alert(&pool, id).await?))
}

/// The farm owner is notified in the background.
pub async fn create_alert_axum(
    State(pool): State<DbPool>,
    State(tasks): State<TaskQueue>,
    Json(payload): Json<NewSensorAlert>,
) -> AgriTechResult<Json<SensorAlert>> {
    let (alert, owner_id) = create_alert(&pool, payload).await?;
    let notify = Job::SendAlertNotification {
        user_id: owner_id,
        alert_type: alert.alert_type.clone(),
        message: alert.message.clone(),
    };
    if let Err(e) = tasks.enqueue(notify) {
        tracing::error!(alert_id = alert.id, error = %e, "Alert stored but notification was not queued");
    }
    Ok(Json(alert))
}

pub async fn resolve_alert_axum(
    State(pool): State<DbPool>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(id): Path<i64>,
) -> AgriTechResult<Json<SensorAlert>> {
    Ok(Json(resolve_alert(&pool, id, user.id).await?))
}

pub async fn delete_alert_axum(
    State(pool): State<DbPool>,
    Path(id): Path<i64>,
) -> AgriTechResult<Json<Deleted>> {
    delete_alert(&pool, id).await?;
    Ok(Json(Deleted::new(id)))
}

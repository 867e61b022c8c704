use axum::extract::{Json, Path, Query, State};
use axum::Extension;
use chrono::Utc;
use serde::Deserialize;
use sqlx::{QueryBuilder, Sqlite};

use super::{ensure_exists, Deleted};
use crate::db::DbPool;
use crate::error::{AgriTechError, AgriTechResult, StoreResultExt};
use crate::middleware::CurrentUser;
use crate::models::{apply_patch, Farm, FarmStatus, FarmUpdate, NewFarm, Pagination};

#[derive(Debug, Default, Deserialize)]
pub struct FarmFilter {
    pub owner_id: Option<i64>,
    pub status: Option<FarmStatus>,
}

#[derive(Debug, Deserialize)]
pub struct FarmListQuery {
    pub skip: Option<i64>,
    pub limit: Option<i64>,
    pub owner_id: Option<i64>,
    pub status: Option<FarmStatus>,
}

pub async fn list_farms(pool: &DbPool, filter: &FarmFilter, page: Pagination) -> AgriTechResult<Vec<Farm>> {
    let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new("SELECT * FROM farms WHERE 1 = 1");
    if let Some(owner_id) = filter.owner_id {
        qb.push(" AND owner_id = ").push_bind(owner_id);
    }
    if let Some(status) = filter.status {
        qb.push(" AND status = ").push_bind(status);
    }
    qb.push(" ORDER BY id LIMIT ")
        .push_bind(page.limit)
        .push(" OFFSET ")
        .push_bind(page.skip);

    let farms = qb.build_query_as::<Farm>().fetch_all(pool).await?;
    tracing::info!(count = farms.len(), "Retrieved farms");
    Ok(farms)
}

pub async fn get_farm(pool: &DbPool, id: i64) -> AgriTechResult<Farm> {
    sqlx::query_as("SELECT * FROM farms WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or(AgriTechError::NotFound("farm"))
}

pub async fn create_farm(pool: &DbPool, payload: NewFarm, owner_id: i64) -> AgriTechResult<Farm> {
    payload.validate()?;
    let owner_id = payload.owner_id.unwrap_or(owner_id);
    let now = Utc::now();

    let mut tx = pool.begin().await.or_internal("create_farm", None)?;
    ensure_exists(&mut *tx, "create_farm", "users", "owner", owner_id).await?;

    let farm: Farm = sqlx::query_as(
        "INSERT INTO farms (name, description, location, area_hectares, soil_type, climate_zone, irrigation_system, status, metadata, owner_id, created_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11) RETURNING *",
    )
    .bind(&payload.name)
    .bind(&payload.description)
    .bind(&payload.location)
    .bind(payload.area_hectares)
    .bind(&payload.soil_type)
    .bind(&payload.climate_zone)
    .bind(&payload.irrigation_system)
    .bind(payload.status)
    .bind(&payload.metadata)
    .bind(owner_id)
    .bind(now)
    .fetch_one(&mut *tx)
    .await
    .or_internal("create_farm", None)?;
    tx.commit().await.or_internal("create_farm", Some(farm.id))?;

    tracing::info!(farm_id = farm.id, owner_id, "Created farm");
    Ok(farm)
}

pub async fn update_farm(pool: &DbPool, id: i64, patch: FarmUpdate) -> AgriTechResult<Farm> {
    patch.validate()?;

    let mut tx = pool.begin().await.or_internal("update_farm", Some(id))?;
    let mut farm: Farm = sqlx::query_as("SELECT * FROM farms WHERE id = $1")
        .bind(id)
        .fetch_optional(&mut *tx)
        .await
        .or_internal("update_farm", Some(id))?
        .ok_or(AgriTechError::NotFound("farm"))?;

    apply_patch!(patch => farm;
        name, description, location, area_hectares, soil_type,
        climate_zone, irrigation_system, status, metadata,
    );
    farm.updated_at = Some(Utc::now());

    let farm: Farm = sqlx::query_as(
        "UPDATE farms SET name = $1, description = $2, location = $3, area_hectares = $4, soil_type = $5, climate_zone = $6, \
         irrigation_system = $7, status = $8, metadata = $9, updated_at = $10 WHERE id = $11 RETURNING *",
    )
    .bind(&farm.name)
    .bind(&farm.description)
    .bind(&farm.location)
    .bind(farm.area_hectares)
    .bind(&farm.soil_type)
    .bind(&farm.climate_zone)
    .bind(&farm.irrigation_system)
    .bind(farm.status)
    .bind(&farm.metadata)
    .bind(farm.updated_at)
    .bind(id)
    .fetch_one(&mut *tx)
    .await
    .or_internal("update_farm", Some(id))?;
    tx.commit().await.or_internal("update_farm", Some(id))?;

    tracing::info!(farm_id = id, "Updated farm");
    Ok(farm)
}

/// Zones, crops, sensors, imagery and weather go with the farm.
pub async fn delete_farm(pool: &DbPool, id: i64) -> AgriTechResult<()> {
    let mut tx = pool.begin().await.or_internal("delete_farm", Some(id))?;
    let result = sqlx::query("DELETE FROM farms WHERE id = $1")
        .bind(id)
        .execute(&mut *tx)
        .await
        .or_internal("delete_farm", Some(id))?;
    if result.rows_affected() == 0 {
        return Err(AgriTechError::NotFound("farm"));
    }
    tx.commit().await.or_internal("delete_farm", Some(id))?;

    tracing::info!(farm_id = id, "Deleted farm");
    Ok(())
}

pub async fn list_farms_axum(
    State(pool): State<DbPool>,
    Query(params): Query<FarmListQuery>,
) -> AgriTechResult<Json<Vec<Farm>>> {
    let page = Pagination::new(params.skip, params.limit)?;
    let filter = FarmFilter {
        owner_id: params.owner_id,
        status: params.status,
    };
    Ok(Json(list_farms(&pool, &filter, page).await?))
}

pub async fn get_farm_axum(
    State(pool): State<DbPool>,
    Path(id): Path<i64>,
) -> AgriTechResult<Json<Farm>> {
    Ok(Json(get_farm(&pool, id).await?))
}

pub async fn create_farm_axum(
    State(pool): State<DbPool>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Json(payload): Json<NewFarm>,
) -> AgriTechResult<Json<Farm>> {
    Ok(Json(create_farm(&pool, payload, user.id).await?))
}

pub async fn update_farm_axum(
    State(pool): State<DbPool>,
    Path(id): Path<i64>,
    Json(patch): Json<FarmUpdate>,
) -> AgriTechResult<Json<Farm>> {
    Ok(Json(update_farm(&pool, id, patch).await?))
}

pub async fn delete_farm_axum(
    State(pool): State<DbPool>,
    Path(id): Path<i64>,
) -> AgriTechResult<Json<Deleted>> {
    delete_farm(&pool, id).await?;
    Ok(Json(Deleted::new(id)))
}

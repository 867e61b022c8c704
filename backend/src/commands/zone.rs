use axum::extract::{Json, Path, State};
use chrono::Utc;

use super::{ensure_exists, Deleted};
use crate::db::DbPool;
use crate::error::{AgriTechError, AgriTechResult, StoreResultExt};
use crate::models::{apply_patch, FarmZone, NewZone, ZoneUpdate};

pub async fn list_zones(pool: &DbPool, farm_id: i64) -> AgriTechResult<Vec<FarmZone>> {
    ensure_exists(pool, "list_zones", "farms", "farm", farm_id).await?;
    let zones: Vec<FarmZone> = sqlx::query_as("SELECT * FROM farm_zones WHERE farm_id = $1 ORDER BY id")
        .bind(farm_id)
        .fetch_all(pool)
        .await?;
    tracing::info!(farm_id, count = zones.len(), "Retrieved farm zones");
    Ok(zones)
}

pub async fn get_zone(pool: &DbPool, id: i64) -> AgriTechResult<FarmZone> {
    sqlx::query_as("SELECT * FROM farm_zones WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or(AgriTechError::NotFound("zone"))
}

pub async fn create_zone(pool: &DbPool, farm_id: i64, payload: NewZone) -> AgriTechResult<FarmZone> {
    payload.validate()?;

    let mut tx = pool.begin().await.or_internal("create_zone", Some(farm_id))?;
    ensure_exists(&mut *tx, "create_zone", "farms", "farm", farm_id).await?;

    let zone: FarmZone = sqlx::query_as(
        "INSERT INTO farm_zones (name, description, area_hectares, soil_ph, soil_moisture, fertility_level, farm_id, created_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8) RETURNING *",
    )
    .bind(&payload.name)
    .bind(&payload.description)
    .bind(payload.area_hectares)
    .bind(payload.soil_ph)
    .bind(payload.soil_moisture)
    .bind(&payload.fertility_level)
    .bind(farm_id)
    .bind(Utc::now())
    .fetch_one(&mut *tx)
    .await
    .or_internal("create_zone", Some(farm_id))?;
    tx.commit().await.or_internal("create_zone", Some(zone.id))?;

    tracing::info!(farm_id, zone_id = zone.id, "Created farm zone");
    Ok(zone)
}

pub async fn update_zone(pool: &DbPool, id: i64, patch: ZoneUpdate) -> AgriTechResult<FarmZone> {
    if let Some(name) = &patch.name {
        crate::models::require_text("name", name)?;
    }

    let mut tx = pool.begin().await.or_internal("update_zone", Some(id))?;
    let mut zone: FarmZone = sqlx::query_as("SELECT * FROM farm_zones WHERE id = $1")
        .bind(id)
        .fetch_optional(&mut *tx)
        .await
        .or_internal("update_zone", Some(id))?
        .ok_or(AgriTechError::NotFound("zone"))?;

    apply_patch!(patch => zone;
        name, description, area_hectares, soil_ph, soil_moisture, fertility_level,
    );
    zone.updated_at = Some(Utc::now());

    let zone: FarmZone = sqlx::query_as(
        "UPDATE farm_zones SET name = $1, description = $2, area_hectares = $3, soil_ph = $4, soil_moisture = $5, \
         fertility_level = $6, updated_at = $7 WHERE id = $8 RETURNING *",
    )
    .bind(&zone.name)
    .bind(&zone.description)
    .bind(zone.area_hectares)
    .bind(zone.soil_ph)
    .bind(zone.soil_moisture)
    .bind(&zone.fertility_level)
    .bind(zone.updated_at)
    .bind(id)
    .fetch_one(&mut *tx)
    .await
    .or_internal("update_zone", Some(id))?;
    tx.commit().await.or_internal("update_zone", Some(id))?;

    tracing::info!(zone_id = id, "Updated farm zone");
    Ok(zone)
}

/// Crops planted in the zone stay on the farm with no zone.
pub async fn delete_zone(pool: &DbPool, id: i64) -> AgriTechResult<()> {
    let mut tx = pool.begin().await.or_internal("delete_zone", Some(id))?;
    let result = sqlx::query("DELETE FROM farm_zones WHERE id = $1")
        .bind(id)
        .execute(&mut *tx)
        .await
        .or_internal("delete_zone", Some(id))?;
    if result.rows_affected() == 0 {
        return Err(AgriTechError::NotFound("zone"));
    }
    tx.commit().await.or_internal("delete_zone", Some(id))?;

    tracing::info!(zone_id = id, "Deleted farm zone");
    Ok(())
}

pub async fn list_zones_axum(
    State(pool): State<DbPool>,
    Path(farm_id): Path<i64>,
) -> AgriTechResult<Json<Vec<FarmZone>>> {
    Ok(Json(list_zones(&pool, farm_id).await?))
}

pub async fn create_zone_axum(
    State(pool): State<DbPool>,
    Path(farm_id): Path<i64>,
    Json(payload): Json<NewZone>,
) -> AgriTechResult<Json<FarmZone>> {
    Ok(Json(create_zone(&pool, farm_id, payload).await?))
}

pub async fn get_zone_axum(
    State(pool): State<DbPool>,
    Path(id): Path<i64>,
) -> AgriTechResult<Json<FarmZone>> {
    Ok(Json(get_zone(&pool, id).await?))
}

pub async fn update_zone_axum(
    State(pool): State<DbPool>,
    Path(id): Path<i64>,
    Json(patch): Json<ZoneUpdate>,
) -> AgriTechResult<Json<FarmZone>> {
    Ok(Json(update_zone(&pool, id, patch).await?))
}

pub async fn delete_zone_axum(
    State(pool): State<DbPool>,
    Path(id): Path<i64>,
) -> AgriTechResult<Json<Deleted>> {
    delete_zone(&pool, id).await?;
    Ok(Json(Deleted::new(id)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{seed_farm, seed_user, test_pool};

    fn zone(name: &str) -> NewZone {
        serde_json::from_value(serde_json::json!({ "name": name, "soil_ph": 6.5 })).unwrap()
    }

    #[tokio::test]
    async fn test_zone_needs_existing_farm() {
        let pool = test_pool().await;
        assert!(matches!(
            create_zone(&pool, 77, zone("north")).await,
            Err(AgriTechError::NotFound("farm"))
        ));
        assert!(matches!(
            list_zones(&pool, 77).await,
            Err(AgriTechError::NotFound("farm"))
        ));
    }

    #[tokio::test]
    async fn test_zone_lifecycle() {
        let pool = test_pool().await;
        let owner = seed_user(&pool, "alice").await;
        let farm = seed_farm(&pool, owner.id, "F1").await;

        let north = create_zone(&pool, farm.id, zone("north")).await.unwrap();
        create_zone(&pool, farm.id, zone("south")).await.unwrap();
        assert_eq!(list_zones(&pool, farm.id).await.unwrap().len(), 2);

        let patch: ZoneUpdate = serde_json::from_str(r#"{"soil_moisture": 31.0}"#).unwrap();
        let updated = update_zone(&pool, north.id, patch).await.unwrap();
        assert_eq!(updated.soil_moisture, Some(31.0));
        assert_eq!(updated.soil_ph, Some(6.5));
        assert_eq!(updated.name, "north");

        delete_zone(&pool, north.id).await.unwrap();
        assert!(matches!(
            get_zone(&pool, north.id).await,
            Err(AgriTechError::NotFound("zone"))
        ));
        assert_eq!(list_zones(&pool, farm.id).await.unwrap().len(), 1);
    }
}

use axum::extract::{Json, Path, Query, State};
use chrono::Utc;
use serde::Deserialize;
use sqlx::{QueryBuilder, Sqlite};

use super::{ensure_exists, Deleted};
use crate::db::DbPool;
use crate::error::{AgriTechError, AgriTechResult, StoreResultExt};
use crate::models::{apply_patch, require_text, Crop, CropStatus, CropType, CropUpdate, NewCrop, Pagination};

#[derive(Debug, Default, Deserialize)]
pub struct CropFilter {
    pub farm_id: Option<i64>,
    pub status: Option<CropStatus>,
    pub crop_type: Option<CropType>,
}

#[derive(Debug, Deserialize)]
pub struct CropListQuery {
    pub skip: Option<i64>,
    pub limit: Option<i64>,
    pub farm_id: Option<i64>,
    pub status: Option<CropStatus>,
    pub crop_type: Option<CropType>,
}

pub async fn list_crops(pool: &DbPool, filter: &CropFilter, page: Pagination) -> AgriTechResult<Vec<Crop>> {
    let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new("SELECT * FROM crops WHERE 1 = 1");
    if let Some(farm_id) = filter.farm_id {
        qb.push(" AND farm_id = ").push_bind(farm_id);
    }
    if let Some(status) = filter.status {
        qb.push(" AND status = ").push_bind(status);
    }
    if let Some(crop_type) = filter.crop_type {
        qb.push(" AND crop_type = ").push_bind(crop_type);
    }
    qb.push(" ORDER BY id LIMIT ")
        .push_bind(page.limit)
        .push(" OFFSET ")
        .push_bind(page.skip);

    let crops = qb.build_query_as::<Crop>().fetch_all(pool).await?;
    tracing::info!(count = crops.len(), "Retrieved crops");
    Ok(crops)
}

pub async fn get_crop(pool: &DbPool, id: i64) -> AgriTechResult<Crop> {
    sqlx::query_as("SELECT * FROM crops WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or(AgriTechError::NotFound("crop"))
}

pub async fn create_crop(pool: &DbPool, payload: NewCrop) -> AgriTechResult<Crop> {
    payload.validate()?;

    let mut tx = pool.begin().await.or_internal("create_crop", None)?;
    ensure_exists(&mut *tx, "create_crop", "farms", "farm", payload.farm_id).await?;

    if let Some(zone_id) = payload.zone_id {
        let zone_farm: Option<(i64,)> = sqlx::query_as("SELECT farm_id FROM farm_zones WHERE id = $1")
            .bind(zone_id)
            .fetch_optional(&mut *tx)
            .await
            .or_internal("create_crop", Some(zone_id))?;
        match zone_farm {
            None => return Err(AgriTechError::NotFound("zone")),
            Some((farm_id,)) if farm_id != payload.farm_id => {
                return Err(AgriTechError::Validation(format!(
                    "zone {} does not belong to farm {}",
                    zone_id, payload.farm_id
                )));
            }
            Some(_) => {}
        }
    }

    let crop: Crop = sqlx::query_as(
        "INSERT INTO crops (name, variety, description, crop_type, scientific_name, planting_date, expected_harvest_date, status, \
         planted_area_hectares, expected_yield_kg, maturity_days, optimal_temperature_min, optimal_temperature_max, \
         optimal_humidity_min, optimal_humidity_max, water_requirements_mm, farm_id, zone_id, metadata, created_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19, $20) RETURNING *",
    )
    .bind(&payload.name)
    .bind(&payload.variety)
    .bind(&payload.description)
    .bind(payload.crop_type)
    .bind(&payload.scientific_name)
    .bind(payload.planting_date)
    .bind(payload.expected_harvest_date)
    .bind(payload.status)
    .bind(payload.planted_area_hectares)
    .bind(payload.expected_yield_kg)
    .bind(payload.maturity_days)
    .bind(payload.optimal_temperature_min)
    .bind(payload.optimal_temperature_max)
    .bind(payload.optimal_humidity_min)
    .bind(payload.optimal_humidity_max)
    .bind(payload.water_requirements_mm)
    .bind(payload.farm_id)
    .bind(payload.zone_id)
    .bind(&payload.metadata)
    .bind(Utc::now())
    .fetch_one(&mut *tx)
    .await
    .or_internal("create_crop", None)?;
    tx.commit().await.or_internal("create_crop", Some(crop.id))?;

    tracing::info!(crop_id = crop.id, farm_id = crop.farm_id, "Created crop");
    Ok(crop)
}

pub async fn update_crop(pool: &DbPool, id: i64, patch: CropUpdate) -> AgriTechResult<Crop> {
    if let Some(name) = &patch.name {
        require_text("name", name)?;
    }

    let mut tx = pool.begin().await.or_internal("update_crop", Some(id))?;
    let mut crop: Crop = sqlx::query_as("SELECT * FROM crops WHERE id = $1")
        .bind(id)
        .fetch_optional(&mut *tx)
        .await
        .or_internal("update_crop", Some(id))?
        .ok_or(AgriTechError::NotFound("crop"))?;

    apply_patch!(patch => crop;
        name, variety, description, scientific_name, planting_date, expected_harvest_date,
        actual_harvest_date, status, planted_area_hectares, expected_yield_kg, actual_yield_kg,
        growth_stage_days, maturity_days, optimal_temperature_min, optimal_temperature_max,
        optimal_humidity_min, optimal_humidity_max, water_requirements_mm, metadata,
    );
    crop.updated_at = Some(Utc::now());

    let crop: Crop = sqlx::query_as(
        "UPDATE crops SET name = $1, variety = $2, description = $3, scientific_name = $4, planting_date = $5, \
         expected_harvest_date = $6, actual_harvest_date = $7, status = $8, planted_area_hectares = $9, expected_yield_kg = $10, \
         actual_yield_kg = $11, growth_stage_days = $12, maturity_days = $13, optimal_temperature_min = $14, \
         optimal_temperature_max = $15, optimal_humidity_min = $16, optimal_humidity_max = $17, water_requirements_mm = $18, \
         metadata = $19, updated_at = $20 WHERE id = $21 RETURNING *",
    )
    .bind(&crop.name)
    .bind(&crop.variety)
    .bind(&crop.description)
    .bind(&crop.scientific_name)
    .bind(crop.planting_date)
    .bind(crop.expected_harvest_date)
    .bind(crop.actual_harvest_date)
    .bind(crop.status)
    .bind(crop.planted_area_hectares)
    .bind(crop.expected_yield_kg)
    .bind(crop.actual_yield_kg)
    .bind(crop.growth_stage_days)
    .bind(crop.maturity_days)
    .bind(crop.optimal_temperature_min)
    .bind(crop.optimal_temperature_max)
    .bind(crop.optimal_humidity_min)
    .bind(crop.optimal_humidity_max)
    .bind(crop.water_requirements_mm)
    .bind(&crop.metadata)
    .bind(crop.updated_at)
    .bind(id)
    .fetch_one(&mut *tx)
    .await
    .or_internal("update_crop", Some(id))?;
    tx.commit().await.or_internal("update_crop", Some(id))?;

    tracing::info!(crop_id = id, "Updated crop");
    Ok(crop)
}

pub async fn delete_crop(pool: &DbPool, id: i64) -> AgriTechResult<()> {
    let mut tx = pool.begin().await.or_internal("delete_crop", Some(id))?;
    let result = sqlx::query("DELETE FROM crops WHERE id = $1")
        .bind(id)
        .execute(&mut *tx)
        .await
        .or_internal("delete_crop", Some(id))?;
    if result.rows_affected() == 0 {
        return Err(AgriTechError::NotFound("crop"));
    }
    tx.commit().await.or_internal("delete_crop", Some(id))?;

    tracing::info!(crop_id = id, "Deleted crop");
    Ok(())
}

pub async fn list_crops_axum(
    State(pool): State<DbPool>,
    Query(params): Query<CropListQuery>,
) -> AgriTechResult<Json<Vec<Crop>>> {
    let page = Pagination::new(params.skip, params.limit)?;
    let filter = CropFilter {
        farm_id: params.farm_id,
        status: params.status,
        crop_type: params.crop_type,
    };
    Ok(Json(list_crops(&pool, &filter, page).await?))
}

pub async fn get_crop_axum(
    State(pool): State<DbPool>,
    Path(id): Path<i64>,
) -> AgriTechResult<Json<Crop>> {
    Ok(Json(get_crop(&pool, id).await?))
}

pub async fn create_crop_axum(
    State(pool): State<DbPool>,
    Json(payload): Json<NewCrop>,
) -> AgriTechResult<Json<Crop>> {
    Ok(Json(create_crop(&pool, payload).await?))
}

pub async fn update_crop_axum(
    State(pool): State<DbPool>,
    Path(id): Path<i64>,
    Json(patch): Json<CropUpdate>,
) -> AgriTechResult<Json<Crop>> {
    Ok(Json(update_crop(&pool, id, patch).await?))
}

pub async fn delete_crop_axum(
    State(pool): State<DbPool>,
    Path(id): Path<i64>,
) -> AgriTechResult<Json<Deleted>> {
    delete_crop(&pool, id).await?;
    Ok(Json(Deleted::new(id)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::zone::{create_zone, delete_zone};
    use crate::test_support::{seed_farm, seed_user, test_pool};

    fn new_crop(farm_id: i64, zone_id: Option<i64>) -> NewCrop {
        serde_json::from_value(serde_json::json!({
            "name": "Wheat",
            "crop_type": "cereals",
            "farm_id": farm_id,
            "zone_id": zone_id,
            "expected_yield_kg": 4200.0,
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn test_crop_parent_checks() {
        let pool = test_pool().await;
        let owner = seed_user(&pool, "alice").await;
        let f1 = seed_farm(&pool, owner.id, "F1").await;
        let f2 = seed_farm(&pool, owner.id, "F2").await;
        let zone = create_zone(
            &pool,
            f2.id,
            serde_json::from_value(serde_json::json!({ "name": "east" })).unwrap(),
        )
        .await
        .unwrap();

        assert!(matches!(
            create_crop(&pool, new_crop(999, None)).await,
            Err(AgriTechError::NotFound("farm"))
        ));
        assert!(matches!(
            create_crop(&pool, new_crop(f1.id, Some(999))).await,
            Err(AgriTechError::NotFound("zone"))
        ));
        assert!(matches!(
            create_crop(&pool, new_crop(f1.id, Some(zone.id))).await,
            Err(AgriTechError::Validation(_))
        ));
        assert!(create_crop(&pool, new_crop(f2.id, Some(zone.id))).await.is_ok());
    }

    #[tokio::test]
    async fn test_zone_delete_detaches_crop() {
        let pool = test_pool().await;
        let owner = seed_user(&pool, "alice").await;
        let farm = seed_farm(&pool, owner.id, "F1").await;
        let zone = create_zone(
            &pool,
            farm.id,
            serde_json::from_value(serde_json::json!({ "name": "east" })).unwrap(),
        )
        .await
        .unwrap();
        let crop = create_crop(&pool, new_crop(farm.id, Some(zone.id))).await.unwrap();

        delete_zone(&pool, zone.id).await.unwrap();
        let crop = get_crop(&pool, crop.id).await.unwrap();
        assert_eq!(crop.zone_id, None);
        assert_eq!(crop.farm_id, farm.id);
    }

    #[tokio::test]
    async fn test_harvest_update_and_filters() {
        let pool = test_pool().await;
        let owner = seed_user(&pool, "alice").await;
        let farm = seed_farm(&pool, owner.id, "F1").await;
        let crop = create_crop(&pool, new_crop(farm.id, None)).await.unwrap();
        assert_eq!(crop.status, CropStatus::Planned);

        let patch: CropUpdate =
            serde_json::from_str(r#"{"status": "harvested", "actual_yield_kg": 3900.5}"#).unwrap();
        let harvested = update_crop(&pool, crop.id, patch).await.unwrap();
        assert_eq!(harvested.status, CropStatus::Harvested);
        assert_eq!(harvested.actual_yield_kg, Some(3900.5));
        assert_eq!(harvested.expected_yield_kg, Some(4200.0));

        let filter = CropFilter {
            farm_id: Some(farm.id),
            status: Some(CropStatus::Harvested),
            crop_type: Some(CropType::Cereals),
        };
        assert_eq!(list_crops(&pool, &filter, Pagination::default()).await.unwrap().len(), 1);

        let filter = CropFilter {
            crop_type: Some(CropType::Fruits),
            ..CropFilter::default()
        };
        assert!(list_crops(&pool, &filter, Pagination::default()).await.unwrap().is_empty());
    }
}

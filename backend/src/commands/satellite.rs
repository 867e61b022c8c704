use axum::extract::{Json, Path, Query, State};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use sqlx::{QueryBuilder, Sqlite};

use super::{ensure_exists, Deleted};
use crate::db::DbPool;
use crate::error::{AgriTechError, AgriTechResult, StoreResultExt};
use crate::models::{
    apply_patch, Lookback, NewSatelliteAnalysis, NewSatelliteData, NewVegetationIndex, Pagination,
    SatelliteAnalysis, SatelliteData, SatelliteDataUpdate, SatelliteType, VegetationIndex,
};
use crate::tasks::{Job, TaskQueue, TaskReceipt};

pub const DEFAULT_SATELLITE_DAYS: i64 = 30;
pub const MAX_SATELLITE_DAYS: i64 = 365;

#[derive(Debug, Default, Deserialize)]
pub struct SatelliteDataFilter {
    pub farm_id: Option<i64>,
    pub satellite_type: Option<SatelliteType>,
}

#[derive(Debug, Deserialize)]
pub struct SatelliteDataQuery {
    pub skip: Option<i64>,
    pub limit: Option<i64>,
    pub days: Option<i64>,
    pub farm_id: Option<i64>,
    pub satellite_type: Option<SatelliteType>,
}

#[derive(Debug, Default, Deserialize)]
pub struct AnalysisFilter {
    pub farm_id: Option<i64>,
    pub analysis_type: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AnalysisQuery {
    pub skip: Option<i64>,
    pub limit: Option<i64>,
    pub days: Option<i64>,
    pub farm_id: Option<i64>,
    pub analysis_type: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct VegetationFilter {
    pub farm_id: Option<i64>,
    pub index_name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct VegetationQuery {
    pub skip: Option<i64>,
    pub limit: Option<i64>,
    pub days: Option<i64>,
    pub farm_id: Option<i64>,
    pub index_name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ImageryRequest {
    pub farm_id: i64,
    #[serde(default = "default_satellite")]
    pub satellite_type: SatelliteType,
}

fn default_satellite() -> SatelliteType {
    SatelliteType::Sentinel2
}

fn days_window(days: Option<i64>) -> AgriTechResult<Lookback> {
    Lookback::days(days, DEFAULT_SATELLITE_DAYS, MAX_SATELLITE_DAYS)
}

// --- Imagery ---

pub async fn list_satellite_data(
    pool: &DbPool,
    filter: &SatelliteDataFilter,
    window: Lookback,
    page: Pagination,
    now: DateTime<Utc>,
) -> AgriTechResult<Vec<SatelliteData>> {
    let (start, end) = window.range_ending(now);
    let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new("SELECT * FROM satellite_data WHERE acquisition_date >= ");
    qb.push_bind(start).push(" AND acquisition_date <= ").push_bind(end);
    if let Some(farm_id) = filter.farm_id {
        qb.push(" AND farm_id = ").push_bind(farm_id);
    }
    if let Some(satellite_type) = filter.satellite_type {
        qb.push(" AND satellite_type = ").push_bind(satellite_type);
    }
    qb.push(" ORDER BY acquisition_date DESC, id DESC LIMIT ")
        .push_bind(page.limit)
        .push(" OFFSET ")
        .push_bind(page.skip);

    let data = qb.build_query_as::<SatelliteData>().fetch_all(pool).await?;
    tracing::info!(count = data.len(), "Retrieved satellite data");
    Ok(data)
}

pub async fn get_satellite_data(pool: &DbPool, id: i64) -> AgriTechResult<SatelliteData> {
    sqlx::query_as("SELECT * FROM satellite_data WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or(AgriTechError::NotFound("satellite data"))
}

pub async fn create_satellite_data(pool: &DbPool, payload: NewSatelliteData) -> AgriTechResult<SatelliteData> {
    let mut tx = pool.begin().await.or_internal("create_satellite_data", None)?;
    ensure_exists(&mut *tx, "create_satellite_data", "farms", "farm", payload.farm_id).await?;

    let data: SatelliteData = sqlx::query_as(
        "INSERT INTO satellite_data (satellite_type, data_type, acquisition_date, cloud_coverage, sun_elevation, sun_azimuth, farm_id, \
         center_latitude, center_longitude, image_url, thumbnail_url, metadata_url, is_processed, resolution_meters, metadata, created_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, FALSE, $13, $14, $15) RETURNING *",
    )
    .bind(payload.satellite_type)
    .bind(payload.data_type)
    .bind(payload.acquisition_date)
    .bind(payload.cloud_coverage)
    .bind(payload.sun_elevation)
    .bind(payload.sun_azimuth)
    .bind(payload.farm_id)
    .bind(payload.center_latitude)
    .bind(payload.center_longitude)
    .bind(&payload.image_url)
    .bind(&payload.thumbnail_url)
    .bind(&payload.metadata_url)
    .bind(payload.resolution_meters)
    .bind(&payload.metadata)
    .bind(Utc::now())
    .fetch_one(&mut *tx)
    .await
    .or_internal("create_satellite_data", None)?;
    tx.commit().await.or_internal("create_satellite_data", Some(data.id))?;

    tracing::info!(satellite_data_id = data.id, farm_id = data.farm_id, "Stored satellite data");
    Ok(data)
}

pub async fn update_satellite_data(
    pool: &DbPool,
    id: i64,
    patch: SatelliteDataUpdate,
) -> AgriTechResult<SatelliteData> {
    let mut tx = pool.begin().await.or_internal("update_satellite_data", Some(id))?;
    let mut data: SatelliteData = sqlx::query_as("SELECT * FROM satellite_data WHERE id = $1")
        .bind(id)
        .fetch_optional(&mut *tx)
        .await
        .or_internal("update_satellite_data", Some(id))?
        .ok_or(AgriTechError::NotFound("satellite data"))?;

    apply_patch!(patch => data;
        cloud_coverage, image_url, thumbnail_url, metadata_url, local_file_path, is_processed,
        processing_date, processing_status, quality_score, resolution_meters, metadata,
    );
    data.updated_at = Some(Utc::now());

    let data: SatelliteData = sqlx::query_as(
        "UPDATE satellite_data SET cloud_coverage = $1, image_url = $2, thumbnail_url = $3, metadata_url = $4, local_file_path = $5, \
         is_processed = $6, processing_date = $7, processing_status = $8, quality_score = $9, resolution_meters = $10, \
         metadata = $11, updated_at = $12 WHERE id = $13 RETURNING *",
    )
    .bind(data.cloud_coverage)
    .bind(&data.image_url)
    .bind(&data.thumbnail_url)
    .bind(&data.metadata_url)
    .bind(&data.local_file_path)
    .bind(data.is_processed)
    .bind(data.processing_date)
    .bind(&data.processing_status)
    .bind(data.quality_score)
    .bind(data.resolution_meters)
    .bind(&data.metadata)
    .bind(data.updated_at)
    .bind(id)
    .fetch_one(&mut *tx)
    .await
    .or_internal("update_satellite_data", Some(id))?;
    tx.commit().await.or_internal("update_satellite_data", Some(id))?;

    tracing::info!(satellite_data_id = id, "Updated satellite data");
    Ok(data)
}

/// Analyses and vegetation indices derived from the image go with it.
pub async fn delete_satellite_data(pool: &DbPool, id: i64) -> AgriTechResult<()> {
    let mut tx = pool.begin().await.or_internal("delete_satellite_data", Some(id))?;
    let result = sqlx::query("DELETE FROM satellite_data WHERE id = $1")
        .bind(id)
        .execute(&mut *tx)
        .await
        .or_internal("delete_satellite_data", Some(id))?;
    if result.rows_affected() == 0 {
        return Err(AgriTechError::NotFound("satellite data"));
    }
    tx.commit().await.or_internal("delete_satellite_data", Some(id))?;

    tracing::info!(satellite_data_id = id, "Deleted satellite data");
    Ok(())
}

pub async fn request_imagery(
    pool: &DbPool,
    tasks: &TaskQueue,
    request: ImageryRequest,
) -> AgriTechResult<TaskReceipt> {
    ensure_exists(pool, "request_imagery", "farms", "farm", request.farm_id).await?;
    let receipt = tasks.enqueue(Job::FetchSatelliteData {
        farm_id: request.farm_id,
        satellite_type: request.satellite_type,
    })?;
    tracing::info!(
        farm_id = request.farm_id,
        satellite_type = ?request.satellite_type,
        task_id = %receipt.task_id,
        "Satellite imagery requested"
    );
    Ok(receipt)
}

// --- Analyses ---

pub async fn list_analyses(
    pool: &DbPool,
    filter: &AnalysisFilter,
    window: Lookback,
    page: Pagination,
    now: DateTime<Utc>,
) -> AgriTechResult<Vec<SatelliteAnalysis>> {
    let (start, end) = window.range_ending(now);
    let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
        "SELECT a.* FROM satellite_analyses a JOIN satellite_data d ON d.id = a.satellite_data_id WHERE a.created_at >= ",
    );
    qb.push_bind(start).push(" AND a.created_at <= ").push_bind(end);
    if let Some(farm_id) = filter.farm_id {
        qb.push(" AND d.farm_id = ").push_bind(farm_id);
    }
    if let Some(analysis_type) = &filter.analysis_type {
        qb.push(" AND a.analysis_type = ").push_bind(analysis_type.clone());
    }
    qb.push(" ORDER BY a.created_at DESC, a.id DESC LIMIT ")
        .push_bind(page.limit)
        .push(" OFFSET ")
        .push_bind(page.skip);

    let analyses = qb.build_query_as::<SatelliteAnalysis>().fetch_all(pool).await?;
    tracing::info!(count = analyses.len(), "Retrieved satellite analyses");
    Ok(analyses)
}

pub async fn get_analysis(pool: &DbPool, id: i64) -> AgriTechResult<SatelliteAnalysis> {
    sqlx::query_as("SELECT * FROM satellite_analyses WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or(AgriTechError::NotFound("satellite analysis"))
}

pub async fn create_analysis(
    pool: &DbPool,
    payload: NewSatelliteAnalysis,
) -> AgriTechResult<SatelliteAnalysis> {
    payload.validate()?;

    let mut tx = pool.begin().await.or_internal("create_analysis", None)?;
    ensure_exists(
        &mut *tx,
        "create_analysis",
        "satellite_data",
        "satellite data",
        payload.satellite_data_id,
    )
    .await?;
    if let Some(crop_id) = payload.crop_id {
        ensure_exists(&mut *tx, "create_analysis", "crops", "crop", crop_id).await?;
    }

    let analysis: SatelliteAnalysis = sqlx::query_as(
        "INSERT INTO satellite_analyses (analysis_type, algorithm_used, version, result_data, confidence_score, result_image_url, \
         heatmap_url, crop_id, satellite_data_id, created_at) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) RETURNING *",
    )
    .bind(&payload.analysis_type)
    .bind(&payload.algorithm_used)
    .bind(&payload.version)
    .bind(&payload.result_data)
    .bind(payload.confidence_score)
    .bind(&payload.result_image_url)
    .bind(&payload.heatmap_url)
    .bind(payload.crop_id)
    .bind(payload.satellite_data_id)
    .bind(Utc::now())
    .fetch_one(&mut *tx)
    .await
    .or_internal("create_analysis", None)?;
    tx.commit().await.or_internal("create_analysis", Some(analysis.id))?;

    tracing::info!(analysis_id = analysis.id, satellite_data_id = analysis.satellite_data_id, "Stored satellite analysis");
    Ok(analysis)
}

pub async fn delete_analysis(pool: &DbPool, id: i64) -> AgriTechResult<()> {
    let mut tx = pool.begin().await.or_internal("delete_analysis", Some(id))?;
    let result = sqlx::query("DELETE FROM satellite_analyses WHERE id = $1")
        .bind(id)
        .execute(&mut *tx)
        .await
        .or_internal("delete_analysis", Some(id))?;
    if result.rows_affected() == 0 {
        return Err(AgriTechError::NotFound("satellite analysis"));
    }
    tx.commit().await.or_internal("delete_analysis", Some(id))?;

    tracing::info!(analysis_id = id, "Deleted satellite analysis");
    Ok(())
}

// --- Vegetation indices ---

pub async fn list_vegetation_indices(
    pool: &DbPool,
    filter: &VegetationFilter,
    window: Lookback,
    page: Pagination,
    now: DateTime<Utc>,
) -> AgriTechResult<Vec<VegetationIndex>> {
    let (start, end) = window.range_ending(now);
    let mut qb: QueryBuilder<Sqlite> =
        QueryBuilder::new("SELECT * FROM vegetation_indices WHERE calculated_at >= ");
    qb.push_bind(start).push(" AND calculated_at <= ").push_bind(end);
    if let Some(farm_id) = filter.farm_id {
        qb.push(" AND farm_id = ").push_bind(farm_id);
    }
    if let Some(index_name) = &filter.index_name {
        qb.push(" AND index_name = ").push_bind(index_name.clone());
    }
    qb.push(" ORDER BY calculated_at DESC, id DESC LIMIT ")
        .push_bind(page.limit)
        .push(" OFFSET ")
        .push_bind(page.skip);

    let indices = qb.build_query_as::<VegetationIndex>().fetch_all(pool).await?;
    tracing::info!(count = indices.len(), "Retrieved vegetation indices");
    Ok(indices)
}

pub async fn get_vegetation_index(pool: &DbPool, id: i64) -> AgriTechResult<VegetationIndex> {
    sqlx::query_as("SELECT * FROM vegetation_indices WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or(AgriTechError::NotFound("vegetation index"))
}

/// The source image must belong to the same farm.
pub async fn create_vegetation_index(
    pool: &DbPool,
    payload: NewVegetationIndex,
) -> AgriTechResult<VegetationIndex> {
    payload.validate()?;

    let mut tx = pool.begin().await.or_internal("create_vegetation_index", None)?;
    ensure_exists(&mut *tx, "create_vegetation_index", "farms", "farm", payload.farm_id).await?;
    let source: Option<(i64,)> = sqlx::query_as("SELECT farm_id FROM satellite_data WHERE id = $1")
        .bind(payload.satellite_data_id)
        .fetch_optional(&mut *tx)
        .await
        .or_internal("create_vegetation_index", Some(payload.satellite_data_id))?;
    match source {
        None => return Err(AgriTechError::NotFound("satellite data")),
        Some((farm_id,)) if farm_id != payload.farm_id => {
            return Err(AgriTechError::Validation(format!(
                "satellite data {} does not belong to farm {}",
                payload.satellite_data_id, payload.farm_id
            )));
        }
        Some(_) => {}
    }

    let index: VegetationIndex = sqlx::query_as(
        "INSERT INTO vegetation_indices (index_name, index_value, index_range_min, index_range_max, latitude, longitude, \
         satellite_data_id, farm_id, calculated_at) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) RETURNING *",
    )
    .bind(&payload.index_name)
    .bind(payload.index_value)
    .bind(payload.index_range_min)
    .bind(payload.index_range_max)
    .bind(payload.latitude)
    .bind(payload.longitude)
    .bind(payload.satellite_data_id)
    .bind(payload.farm_id)
    .bind(payload.calculated_at.unwrap_or_else(Utc::now))
    .fetch_one(&mut *tx)
    .await
    .or_internal("create_vegetation_index", None)?;
    tx.commit().await.or_internal("create_vegetation_index", Some(index.id))?;

    tracing::info!(index_id = index.id, farm_id = index.farm_id, index_name = %index.index_name, "Stored vegetation index");
    Ok(index)
}

pub async fn delete_vegetation_index(pool: &DbPool, id: i64) -> AgriTechResult<()> {
    let mut tx = pool.begin().await.or_internal("delete_vegetation_index", Some(id))?;
    let result = sqlx::query("DELETE FROM vegetation_indices WHERE id = $1")
        .bind(id)
        .execute(&mut *tx)
        .await
        .or_internal("delete_vegetation_index", Some(id))?;
    if result.rows_affected() == 0 {
        return Err(AgriTechError::NotFound("vegetation index"));
    }
    tx.commit().await.or_internal("delete_vegetation_index", Some(id))?;

    tracing::info!(index_id = id, "Deleted vegetation index");
    Ok(())
}

// --- Handlers ---

pub async fn list_satellite_data_axum(
    State(pool): State<DbPool>,
    Query(params): Query<SatelliteDataQuery>,
) -> AgriTechResult<Json<Vec<SatelliteData>>> {
    let window = days_window(params.days)?;
    let page = Pagination::new(params.skip, params.limit)?;
    let filter = SatelliteDataFilter {
        farm_id: params.farm_id,
        satellite_type: params.satellite_type,
    };
    Ok(Json(
        list_satellite_data(&pool, &filter, window, page, Utc::now()).await?,
    ))
}

pub async fn get_satellite_data_axum(
    State(pool): State<DbPool>,
    Path(id): Path<i64>,
) -> AgriTechResult<Json<SatelliteData>> {
    Ok(Json(get_satellite_data(&pool, id).await?))
}

pub async fn create_satellite_data_axum(
    State(pool): State<DbPool>,
    Json(payload): Json<NewSatelliteData>,
) -> AgriTechResult<Json<SatelliteData>> {
    Ok(Json(create_satellite_data(&pool, payload).await?))
}

pub async fn update_satellite_data_axum(
    State(pool): State<DbPool>,
    Path(id): Path<i64>,
    Json(patch): Json<SatelliteDataUpdate>,
) -> AgriTechResult<Json<SatelliteData>> {
    Ok(Json(update_satellite_data(&pool, id, patch).await?))
}

pub async fn delete_satellite_data_axum(
    State(pool): State<DbPool>,
    Path(id): Path<i64>,
) -> AgriTechResult<Json<Deleted>> {
    delete_satellite_data(&pool, id).await?;
    Ok(Json(Deleted::new(id)))
}

pub async fn request_imagery_axum(
    State(pool): State<DbPool>,
    State(tasks): State<TaskQueue>,
    Query(request): Query<ImageryRequest>,
) -> AgriTechResult<Json<TaskReceipt>> {
    Ok(Json(request_imagery(&pool, &tasks, request).await?))
}

pub async fn list_analyses_axum(
    State(pool): State<DbPool>,
    Query(params): Query<AnalysisQuery>,
) -> AgriTechResult<Json<Vec<SatelliteAnalysis>>> {
    let window = days_window(params.days)?;
    let page = Pagination::new(params.skip, params.limit)?;
    let filter = AnalysisFilter {
        farm_id: params.farm_id,
        analysis_type: params.analysis_type,
    };
    Ok(Json(
        list_analyses(&pool, &filter, window, page, Utc::now()).await?,
    ))
}

pub async fn get_analysis_axum(
    State(pool): State<DbPool>,
    Path(id): Path<i64>,
) -> AgriTechResult<Json<SatelliteAnalysis>> {
    Ok(Json(get_analysis(&pool, id).await?))
}

pub async fn create_analysis_axum(
    State(pool): State<DbPool>,
    Json(payload): Json<NewSatelliteAnalysis>,
) -> AgriTechResult<Json<SatelliteAnalysis>> {
    Ok(Json(create_analysis(&pool, payload).await?))
}

pub async fn delete_analysis_axum(
    State(pool): State<DbPool>,
    Path(id): Path<i64>,
) -> AgriTechResult<Json<Deleted>> {
    delete_analysis(&pool, id).await?;
    Ok(Json(Deleted::new(id)))
}

pub async fn list_vegetation_indices_axum(
    State(pool): State<DbPool>,
    Query(params): Query<VegetationQuery>,
) -> AgriTechResult<Json<Vec<VegetationIndex>>> {
    let window = days_window(params.days)?;
    let page = Pagination::new(params.skip, params.limit)?;
    let filter = VegetationFilter {
        farm_id: params.farm_id,
        index_name: params.index_name,
    };
    Ok(Json(
        list_vegetation_indices(&pool, &filter, window, page, Utc::now()).await?,
    ))
}

pub async fn get_vegetation_index_axum(
    State(pool): State<DbPool>,
    Path(id): Path<i64>,
) -> AgriTechResult<Json<VegetationIndex>> {
    Ok(Json(get_vegetation_index(&pool, id).await?))
}

pub async fn create_vegetation_index_axum(
    State(pool): State<DbPool>,
    Json(payload): Json<NewVegetationIndex>,
) -> AgriTechResult<Json<VegetationIndex>> {
    Ok(Json(create_vegetation_index(&pool, payload).await?))
}

pub async fn delete_vegetation_index_axum(
    State(pool): State<DbPool>,
    Path(id): Path<i64>,
) -> AgriTechResult<Json<Deleted>> {
    delete_vegetation_index(&pool, id).await?;
    Ok(Json(Deleted::new(id)))
}

//! Fixtures shared by the unit and integration tests.

use axum::Router;
use chrono::{DateTime, Utc};

use crate::auth::PasswordHasher;
use crate::config::Settings;
use crate::db::{init_database, init_memory_pool, DbPool};
use crate::models::{
    DataType, Farm, FarmStatus, NewFarm, NewSatelliteData, NewSensor, NewWeatherData, SatelliteType,
    SensorType, User,
};
use crate::routes::build_app;
use crate::state::AppState;

pub const TEST_PASSWORD: &str = "password123";
pub const TEST_BCRYPT_COST: u32 = 4;

pub async fn test_pool() -> DbPool {
    let pool = init_memory_pool().await.unwrap();
    init_database(&pool).await.unwrap();
    pool
}

pub fn test_settings() -> Settings {
    Settings {
        secret_key: "test-secret".to_string(),
        bcrypt_cost: TEST_BCRYPT_COST,
        task_workers: 1,
        enable_scheduler: false,
        ..Settings::default()
    }
}

pub async fn test_app() -> (Router, AppState) {
    let state = AppState::new(test_pool().await, test_settings());
    (build_app(state.clone()), state)
}

/// Inserts an active user named `name` with `TEST_PASSWORD`.
pub async fn seed_user(pool: &DbPool, name: &str) -> User {
    insert_user(pool, name, false).await
}

pub async fn seed_superuser(pool: &DbPool, name: &str) -> User {
    insert_user(pool, name, true).await
}

async fn insert_user(pool: &DbPool, name: &str, superuser: bool) -> User {
    let hashed = PasswordHasher::new(TEST_BCRYPT_COST).hash(TEST_PASSWORD).unwrap();
    sqlx::query_as(
        "INSERT INTO users (email, username, full_name, hashed_password, is_active, is_verified, is_superuser, created_at) \
         VALUES ($1, $2, $3, $4, TRUE, FALSE, $5, $6) RETURNING *",
    )
    .bind(format!("{}@farm.test", name))
    .bind(name)
    .bind(format!("{} Tester", name))
    .bind(hashed)
    .bind(superuser)
    .bind(Utc::now())
    .fetch_one(pool)
    .await
    .unwrap()
}

/// An in-memory user, never stored.
pub fn user_fixture(name: &str, superuser: bool) -> User {
    User {
        id: 1,
        email: format!("{}@farm.test", name),
        username: name.to_string(),
        full_name: format!("{} Tester", name),
        hashed_password: String::new(),
        phone: None,
        bio: None,
        avatar_url: None,
        location: None,
        is_active: true,
        is_verified: false,
        is_superuser: superuser,
        created_at: Utc::now(),
        updated_at: None,
        last_login: None,
    }
}

pub fn new_farm(name: &str) -> NewFarm {
    NewFarm {
        name: name.to_string(),
        description: None,
        location: Some("Nile Delta".to_string()),
        area_hectares: Some(12.5),
        soil_type: Some("clay".to_string()),
        climate_zone: None,
        irrigation_system: None,
        status: FarmStatus::Active,
        metadata: None,
        owner_id: None,
    }
}

pub async fn seed_farm(pool: &DbPool, owner_id: i64, name: &str) -> Farm {
    crate::commands::farm::create_farm(pool, new_farm(name), owner_id)
        .await
        .unwrap()
}

pub fn new_sensor(farm_id: i64, device_id: &str) -> NewSensor {
    NewSensor {
        name: format!("Probe {}", device_id),
        description: None,
        device_id: device_id.to_string(),
        sensor_type: SensorType::SoilMoisture,
        manufacturer: None,
        model: None,
        farm_id,
        latitude: None,
        longitude: None,
        altitude: None,
        installation_date: None,
        measurement_unit: Some("%".to_string()),
        min_value: Some(0.0),
        max_value: Some(100.0),
        accuracy: None,
        communication_protocol: None,
        data_transmission_interval: None,
        configuration: None,
    }
}

pub fn new_image(farm_id: i64, acquisition_date: DateTime<Utc>) -> NewSatelliteData {
    NewSatelliteData {
        satellite_type: SatelliteType::Sentinel2,
        data_type: DataType::Multispectral,
        acquisition_date,
        cloud_coverage: Some(12.0),
        sun_elevation: None,
        sun_azimuth: None,
        farm_id,
        center_latitude: Some(30.0),
        center_longitude: Some(31.2),
        image_url: None,
        thumbnail_url: None,
        metadata_url: None,
        resolution_meters: Some(10.0),
        metadata: None,
    }
}

/// A record at (30.0, 31.2); `forecast_hours == 0` makes it an observation.
pub fn weather_at(farm_id: i64, measurement_time: DateTime<Utc>, forecast_hours: i64) -> NewWeatherData {
    NewWeatherData {
        farm_id,
        latitude: 30.0,
        longitude: 31.2,
        temperature_celsius: Some(24.0),
        humidity_percent: Some(55.0),
        pressure_hpa: None,
        wind_speed_kmh: None,
        wind_direction_degrees: None,
        rainfall_mm: None,
        solar_radiation_wm2: None,
        data_source: Some("station".to_string()),
        forecast_hours,
        measurement_time,
    }
}

use crate::commands;
use crate::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/analytics/farm/:id",
            get(commands::analytics::farm_analytics_axum),
        )
        .route(
            "/analytics/crop/:id",
            get(commands::analytics::crop_analytics_axum),
        )
        .route(
            "/analytics/sensors/:farm_id",
            get(commands::analytics::sensor_analytics_axum),
        )
        .route(
            "/analytics/satellite/:farm_id",
            get(commands::analytics::satellite_analytics_axum),
        )
        .route("/analytics/dashboard", get(commands::analytics::dashboard_axum))
        .route(
            "/analytics/reports/:farm_id",
            post(commands::analytics::request_farm_report_axum),
        )
        .route(
            "/analytics/yield/:crop_id",
            post(commands::analytics::request_yield_prediction_axum),
        )
}

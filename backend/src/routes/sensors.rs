use crate::commands;
use crate::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/sensors",
            get(commands::sensor::list_sensors_axum).post(commands::sensor::create_sensor_axum),
        )
        .route(
            "/sensors/:id",
            get(commands::sensor::get_sensor_axum)
                .put(commands::sensor::update_sensor_axum)
                .delete(commands::sensor::delete_sensor_axum),
        )
        .route(
            "/sensors/:id/readings",
            get(commands::reading::list_readings_axum).post(commands::reading::create_reading_axum),
        )
        .route(
            "/sensors/:id/calibrate",
            post(commands::sensor::calibrate_sensor_axum),
        )
        .route(
            "/readings/:id",
            get(commands::reading::get_reading_axum).delete(commands::reading::delete_reading_axum),
        )
}

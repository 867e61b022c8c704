use crate::commands;
use crate::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/weather/current", get(commands::weather::current_weather_axum))
        .route("/weather/forecast", get(commands::weather::weather_forecast_axum))
        .route("/weather/history", get(commands::weather::weather_history_axum))
        .route(
            "/weather/records",
            get(commands::weather::list_weather_records_axum)
                .post(commands::weather::create_weather_record_axum),
        )
        .route(
            "/weather/records/:id",
            get(commands::weather::get_weather_record_axum)
                .delete(commands::weather::delete_weather_record_axum),
        )
        .route(
            "/weather/update",
            post(commands::weather::request_weather_update_axum),
        )
}

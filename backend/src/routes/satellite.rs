use crate::commands;
use crate::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/satellite/data",
            get(commands::satellite::list_satellite_data_axum)
                .post(commands::satellite::create_satellite_data_axum),
        )
        .route(
            "/satellite/data/:id",
            get(commands::satellite::get_satellite_data_axum)
                .put(commands::satellite::update_satellite_data_axum)
                .delete(commands::satellite::delete_satellite_data_axum),
        )
        .route(
            "/satellite/analyses",
            get(commands::satellite::list_analyses_axum)
                .post(commands::satellite::create_analysis_axum),
        )
        .route(
            "/satellite/analyses/:id",
            get(commands::satellite::get_analysis_axum)
                .delete(commands::satellite::delete_analysis_axum),
        )
        .route(
            "/satellite/vegetation-indices",
            get(commands::satellite::list_vegetation_indices_axum)
                .post(commands::satellite::create_vegetation_index_axum),
        )
        .route(
            "/satellite/vegetation-indices/:id",
            get(commands::satellite::get_vegetation_index_axum)
                .delete(commands::satellite::delete_vegetation_index_axum),
        )
        .route(
            "/satellite/request-imagery",
            post(commands::satellite::request_imagery_axum),
        )
}

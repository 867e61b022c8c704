use crate::commands;
use crate::state::AppState;
use axum::{routing::get, Router};

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/crops",
            get(commands::crop::list_crops_axum).post(commands::crop::create_crop_axum),
        )
        .route(
            "/crops/:id",
            get(commands::crop::get_crop_axum)
                .put(commands::crop::update_crop_axum)
                .delete(commands::crop::delete_crop_axum),
        )
}

use crate::commands;
use crate::state::AppState;
use axum::{routing::get, Router};

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/farms",
            get(commands::farm::list_farms_axum).post(commands::farm::create_farm_axum),
        )
        .route(
            "/farms/:id",
            get(commands::farm::get_farm_axum)
                .put(commands::farm::update_farm_axum)
                .delete(commands::farm::delete_farm_axum),
        )
        .route(
            "/farms/:id/zones",
            get(commands::zone::list_zones_axum).post(commands::zone::create_zone_axum),
        )
        .route(
            "/zones/:id",
            get(commands::zone::get_zone_axum)
                .put(commands::zone::update_zone_axum)
                .delete(commands::zone::delete_zone_axum),
        )
}

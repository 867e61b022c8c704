use crate::commands;
use crate::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/alerts",
            get(commands::alert::list_alerts_axum).post(commands::alert::create_alert_axum),
        )
        .route(
            "/alerts/:id",
            get(commands::alert::get_alert_axum).delete(commands::alert::delete_alert_axum),
        )
        .route(
            "/alerts/:id/resolve",
            post(commands::alert::resolve_alert_axum),
        )
}

use crate::commands;
use crate::state::AppState;
use axum::{routing::post, Router};

/// Reachable without a token.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/auth/login", post(commands::auth::login_axum))
        .route("/auth/register", post(commands::auth::register_axum))
}

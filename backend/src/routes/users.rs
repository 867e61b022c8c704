use crate::commands;
use crate::state::AppState;
use axum::{
    routing::{delete, get},
    Router,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/users/me",
            get(commands::user::read_me_axum).put(commands::user::update_me_axum),
        )
        .route("/users", get(commands::user::list_users_axum))
        .route("/users/:id", delete(commands::user::delete_user_axum))
}

use axum::extract::{Form, Json, State};
use serde::Deserialize;

use crate::auth::AccessToken;
use crate::error::AgriTechResult;
use crate::models::{NewUser, User};
use crate::state::AppState;

/// OAuth2 password-flow form fields.
#[derive(Deserialize)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
}

pub async fn login_axum(
    State(state): State<AppState>,
    Form(form): Form<LoginForm>,
) -> AgriTechResult<Json<AccessToken>> {
    let token = state.auth.login(&form.username, &form.password).await?;
    Ok(Json(token))
}

pub async fn register_axum(
    State(state): State<AppState>,
    Json(candidate): Json<NewUser>,
) -> AgriTechResult<Json<User>> {
    Ok(Json(state.auth.register(candidate).await?))
}

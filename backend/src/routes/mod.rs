use crate::middleware::{auth_middleware, log_requests, wrap_response_middleware};
use crate::state::AppState;
use axum::{
    http::{header, HeaderValue, Method},
    middleware,
    routing::get,
    Json, Router,
};
use serde_json::{json, Value};
use tower_http::cors::{AllowOrigin, CorsLayer};

pub mod alerts;
pub mod analytics;
pub mod auth;
pub mod crops;
pub mod farms;
pub mod satellite;
pub mod sensors;
pub mod users;
pub mod weather;

/// API routes relative to the version prefix. Everything except `/auth/*`
/// requires a bearer token.
pub fn create_router(state: AppState) -> Router<AppState> {
    let protected = Router::new()
        .merge(users::router())
        .merge(farms::router())
        .merge(crops::router())
        .merge(sensors::router())
        .merge(alerts::router())
        .merge(satellite::router())
        .merge(weather::router())
        .merge(analytics::router())
        .route_layer(middleware::from_fn_with_state(state, auth_middleware));

    Router::new().merge(auth::router()).merge(protected)
}

/// The whole service: unversioned probes plus the enveloped API under the prefix.
pub fn build_app(state: AppState) -> Router {
    let api = create_router(state.clone()).layer(middleware::from_fn(wrap_response_middleware));

    let probes = Router::new()
        .route("/", get(root))
        .route("/health", get(health));
    let routed = if state.settings.api_prefix.is_empty() {
        probes.merge(api)
    } else {
        probes.nest(&state.settings.api_prefix, api)
    };

    routed
        .layer(cors_layer(&state.settings.allowed_origins))
        .layer(middleware::from_fn(log_requests))
        .with_state(state)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(%origin, "Ignoring malformed CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE, header::ACCEPT])
}

async fn root() -> Json<Value> {
    Json(json!({
        "message": "AgriTech backend is running",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "active",
    }))
}

async fn health() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().timestamp(),
        "service": "agritech-backend",
    }))
}

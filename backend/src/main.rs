use std::net::SocketAddr;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod auth;
mod commands;
mod config;
mod db;
mod error;
mod middleware;
mod models;
mod routes;
mod state;
mod tasks;

#[cfg(test)]
mod integration_tests;
#[cfg(test)]
mod test_support;

use config::{LogFormat, Settings};
use state::AppState;

fn init_tracing(format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

#[tokio::main]
async fn main() {
    let settings = match Settings::from_env() {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Invalid configuration: {}", e);
            std::process::exit(1);
        }
    };
    init_tracing(settings.log_format);
    if settings.uses_insecure_secret() {
        tracing::warn!("SECRET_KEY not set, using insecure default!");
    }

    tracing::info!(
        project = %settings.project_name,
        environment = %settings.environment,
        "Starting AgriTech backend..."
    );

    let pool = match db::init_pool(&settings.database_url).await {
        Ok(pool) => {
            tracing::info!("Database connection established");
            pool
        }
        Err(e) => {
            tracing::error!("Failed to connect to database: {}", e);
            return;
        }
    };
    if let Err(e) = db::init_database(&pool).await {
        tracing::error!("Failed to run migrations: {}", e);
        return;
    }

    let port = settings.port;
    let enable_scheduler = settings.enable_scheduler;
    let app_state = AppState::new(pool.clone(), settings);

    if let Err(e) = db::ensure_seeds(&pool, app_state.settings.admin.as_ref(), app_state.auth.hasher()).await {
        tracing::error!("Failed to seed bootstrap superuser: {}", e);
        return;
    }
    if enable_scheduler {
        tasks::spawn_scheduler(pool.clone(), app_state.tasks.clone());
    }

    let app = routes::build_app(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!("Failed to bind {}: {}", addr, e);
            return;
        }
    };

    tracing::info!("listening on {}", addr);
    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        tracing::error!("Server error: {}", e);
    }
    pool.close().await;
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

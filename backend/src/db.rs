use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::str::FromStr;
use std::time::Duration;

use crate::auth::password::PasswordHasher;
use crate::config::AdminSeed;
use crate::error::{AgriTechError, AgriTechResult};

pub type DbPool = Pool<Sqlite>;

pub async fn init_pool_with_options(opts: SqliteConnectOptions) -> AgriTechResult<DbPool> {
    Ok(SqlitePoolOptions::new()
        .max_connections(20)
        .acquire_timeout(Duration::from_secs(30))
        .idle_timeout(Duration::from_secs(120))
        .max_lifetime(Duration::from_secs(300))
        .connect_with(opts)
        .await?)
}

pub async fn init_pool(database_url: &str) -> AgriTechResult<DbPool> {
    let opts = SqliteConnectOptions::from_str(database_url)
        .map_err(|e| AgriTechError::Internal(format!("Invalid DB URL: {}", e)))?
        .foreign_keys(true)
        .journal_mode(SqliteJournalMode::Wal)
        .create_if_missing(true);

    init_pool_with_options(opts).await
}

/// Single-connection in-memory pool. The database lives as long as the
/// connection does, so idle reaping is disabled.
pub async fn init_memory_pool() -> AgriTechResult<DbPool> {
    let opts = SqliteConnectOptions::from_str("sqlite::memory:")
        .map_err(|e| AgriTechError::Internal(format!("Invalid DB URL: {}", e)))?
        .foreign_keys(true);

    Ok(SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(opts)
        .await?)
}

pub async fn init_database(pool: &DbPool) -> AgriTechResult<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    tracing::info!("Database schema is up to date");
    Ok(())
}

/// Creates the bootstrap superuser if it does not exist yet.
pub async fn ensure_seeds(
    pool: &DbPool,
    admin: Option<&AdminSeed>,
    hasher: &PasswordHasher,
) -> AgriTechResult<()> {
    let Some(admin) = admin else {
        return Ok(());
    };

    let admin_exists: (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM users WHERE username = $1 OR email = $2")
            .bind(&admin.username)
            .bind(&admin.email)
            .fetch_one(pool)
            .await?;
    if admin_exists.0 > 0 {
        return Ok(());
    }

    let hashed = hasher.hash(&admin.password)?;
    let now = chrono::Utc::now();
    sqlx::query(
        "INSERT INTO users (email, username, full_name, hashed_password, is_active, is_verified, is_superuser, created_at) VALUES ($1, $2, $3, $4, TRUE, TRUE, TRUE, $5)",
    )
    .bind(&admin.email)
    .bind(&admin.username)
    .bind("Administrator")
    .bind(hashed)
    .bind(now)
    .execute(pool)
    .await?;

    tracing::info!(username = %admin.username, "Seeded bootstrap superuser");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AdminSeed;

    #[tokio::test]
    async fn test_migrations_create_all_tables() {
        let pool = init_memory_pool().await.unwrap();
        init_database(&pool).await.unwrap();

        let tables: Vec<(String,)> = sqlx::query_as(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE '_sqlx%' AND name NOT LIKE 'sqlite_%' ORDER BY name",
        )
        .fetch_all(&pool)
        .await
        .unwrap();
        let names: Vec<&str> = tables.iter().map(|t| t.0.as_str()).collect();

        assert_eq!(
            names,
            vec![
                "crops",
                "farm_zones",
                "farms",
                "satellite_analyses",
                "satellite_data",
                "sensor_alerts",
                "sensor_readings",
                "sensors",
                "users",
                "vegetation_indices",
                "weather_data",
            ]
        );
    }

    #[tokio::test]
    async fn test_seed_superuser_is_idempotent() {
        let pool = init_memory_pool().await.unwrap();
        init_database(&pool).await.unwrap();
        let hasher = PasswordHasher::new(4);
        let seed = AdminSeed {
            username: "root".into(),
            email: "root@farm.test".into(),
            password: "changeme".into(),
        };

        ensure_seeds(&pool, Some(&seed), &hasher).await.unwrap();
        ensure_seeds(&pool, Some(&seed), &hasher).await.unwrap();

        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users WHERE username = 'root'")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 1);

        let (superuser,): (bool,) =
            sqlx::query_as("SELECT is_superuser FROM users WHERE username = 'root'")
                .fetch_one(&pool)
                .await
                .unwrap();
        assert!(superuser);
    }
}

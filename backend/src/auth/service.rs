use chrono::Utc;
use serde::Serialize;

use super::password::PasswordHasher;
use super::token::{TokenError, TokenService};
use crate::config::Settings;
use crate::db::DbPool;
use crate::error::{is_unique_violation, AgriTechError, AgriTechResult, StoreResultExt};
use crate::models::{NewUser, User};

#[derive(Debug, Serialize)]
pub struct AccessToken {
    pub access_token: String,
    pub token_type: &'static str,
}

/// Credential checks, registration and bearer-token resolution.
#[derive(Debug, Clone)]
pub struct AuthService {
    pool: DbPool,
    hasher: PasswordHasher,
    tokens: TokenService,
}

impl AuthService {
    pub fn new(pool: DbPool, hasher: PasswordHasher, tokens: TokenService) -> Self {
        Self {
            pool,
            hasher,
            tokens,
        }
    }

    pub fn from_settings(pool: DbPool, settings: &Settings) -> Self {
        Self::new(
            pool,
            PasswordHasher::new(settings.bcrypt_cost),
            TokenService::new(&settings.secret_key, settings.access_token_ttl),
        )
    }

    pub fn hasher(&self) -> &PasswordHasher {
        &self.hasher
    }

    pub fn tokens(&self) -> &TokenService {
        &self.tokens
    }

    /// `None` for an unknown user, a wrong password or a disabled account.
    /// The three cases are only distinguishable in the log.
    pub async fn authenticate(&self, username: &str, password: &str) -> AgriTechResult<Option<User>> {
        let user: Option<User> = sqlx::query_as("SELECT * FROM users WHERE username = $1")
            .bind(username)
            .fetch_optional(&self.pool)
            .await?;

        let Some(user) = user else {
            tracing::warn!(username, "Login rejected: unknown user");
            return Ok(None);
        };

        if !self.verify_password(password, &user.hashed_password).await? {
            tracing::warn!(username, "Login rejected: wrong password");
            return Ok(None);
        }

        if !user.is_active {
            tracing::warn!(username, "Login rejected: account inactive");
            return Ok(None);
        }

        let now = Utc::now();
        let mut tx = self.pool.begin().await.or_internal("record_login", Some(user.id))?;
        let user: User =
            sqlx::query_as("UPDATE users SET last_login = $1 WHERE id = $2 RETURNING *")
                .bind(now)
                .bind(user.id)
                .fetch_one(&mut *tx)
                .await
                .or_internal("record_login", Some(user.id))?;
        tx.commit().await.or_internal("record_login", Some(user.id))?;

        tracing::info!(user_id = user.id, username, "User authenticated");
        Ok(Some(user))
    }

    pub async fn login(&self, username: &str, password: &str) -> AgriTechResult<AccessToken> {
        let user = self
            .authenticate(username, password)
            .await?
            .ok_or(AgriTechError::Unauthenticated)?;

        let access_token = self
            .tokens
            .issue(&user.username)
            .map_err(|e| AgriTechError::Internal(format!("token issue failed: {}", e)))?;

        Ok(AccessToken {
            access_token,
            token_type: "bearer",
        })
    }

    pub async fn register(&self, candidate: NewUser) -> AgriTechResult<User> {
        candidate.validate()?;

        let (email_taken,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users WHERE email = $1")
            .bind(&candidate.email)
            .fetch_one(&self.pool)
            .await?;
        if email_taken > 0 {
            return Err(AgriTechError::DuplicateEmail);
        }

        let (username_taken,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM users WHERE username = $1")
                .bind(&candidate.username)
                .fetch_one(&self.pool)
                .await?;
        if username_taken > 0 {
            return Err(AgriTechError::DuplicateUsername);
        }

        let hashed = self.hash_password(candidate.password.clone()).await?;
        let now = Utc::now();

        let mut tx = self.pool.begin().await.or_internal("register_user", None)?;
        let inserted = sqlx::query_as::<_, User>(
            "INSERT INTO users (email, username, full_name, hashed_password, phone, bio, location, is_active, is_verified, is_superuser, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, TRUE, FALSE, FALSE, $8) RETURNING *",
        )
        .bind(&candidate.email)
        .bind(&candidate.username)
        .bind(&candidate.full_name)
        .bind(hashed)
        .bind(&candidate.phone)
        .bind(&candidate.bio)
        .bind(&candidate.location)
        .bind(now)
        .fetch_one(&mut *tx)
        .await;

        let user = match inserted {
            Ok(user) => user,
            Err(e) if is_unique_violation(&e) => {
                return Err(duplicate_from_constraint(&e));
            }
            Err(e) => return Err(e).or_internal("register_user", None),
        };
        tx.commit().await.or_internal("register_user", Some(user.id))?;

        tracing::info!(user_id = user.id, username = %user.username, "User registered");
        Ok(user)
    }

    /// Maps a bearer token to its user. Any failure is `Unauthenticated`.
    pub async fn resolve(&self, token: &str) -> AgriTechResult<User> {
        let username = self.tokens.decode(token).map_err(|e| {
            match e {
                TokenError::TokenExpired => tracing::debug!("Rejected expired token"),
                TokenError::InvalidToken => tracing::debug!("Rejected invalid token"),
            }
            AgriTechError::Unauthenticated
        })?;

        let user: Option<User> = sqlx::query_as("SELECT * FROM users WHERE username = $1")
            .bind(&username)
            .fetch_optional(&self.pool)
            .await?;

        user.ok_or_else(|| {
            tracing::warn!(username = %username, "Token subject no longer exists");
            AgriTechError::Unauthenticated
        })
    }

    async fn hash_password(&self, password: String) -> AgriTechResult<String> {
        let hasher = self.hasher;
        tokio::task::spawn_blocking(move || hasher.hash(&password))
            .await
            .map_err(|e| AgriTechError::Internal(format!("hash task failed: {}", e)))?
    }

    async fn verify_password(&self, password: &str, digest: &str) -> AgriTechResult<bool> {
        let hasher = self.hasher;
        let password = password.to_string();
        let digest = digest.to_string();
        tokio::task::spawn_blocking(move || hasher.verify(&password, &digest))
            .await
            .map_err(|e| AgriTechError::Internal(format!("verify task failed: {}", e)))
    }
}

/// A concurrent registration can slip past the pre-checks; the unique index decides.
fn duplicate_from_constraint(err: &sqlx::Error) -> AgriTechError {
    let message = match err {
        sqlx::Error::Database(db) => db.message().to_string(),
        _ => String::new(),
    };
    if message.contains("users.username") {
        AgriTechError::DuplicateUsername
    } else {
        AgriTechError::DuplicateEmail
    }
}

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Serialize, Serializer};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AgriTechError {
    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("email is already registered")]
    DuplicateEmail,

    #[error("username is already taken")]
    DuplicateUsername,

    #[error("could not validate credentials")]
    Unauthenticated,

    #[error("not enough privileges")]
    Forbidden,

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Bcrypt error: {0}")]
    Bcrypt(#[from] bcrypt::BcryptError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Serialize for AgriTechError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.to_string().as_ref())
    }
}

pub type AgriTechResult<T> = Result<T, AgriTechError>;

/// Converts store faults inside a mutation into `Internal`, logging the
/// operation and entity id. The driver's message stays in the log.
pub trait StoreResultExt<T> {
    fn or_internal(self, operation: &'static str, entity_id: Option<i64>) -> AgriTechResult<T>;
}

impl<T> StoreResultExt<T> for Result<T, sqlx::Error> {
    fn or_internal(self, operation: &'static str, entity_id: Option<i64>) -> AgriTechResult<T> {
        self.map_err(|e| {
            tracing::error!(operation, entity_id = ?entity_id, error = %e, "Store operation failed, rolled back");
            AgriTechError::Internal(format!("{} failed", operation))
        })
    }
}

pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

impl IntoResponse for AgriTechError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AgriTechError::NotFound(entity) => (StatusCode::NOT_FOUND, format!("{} not found", entity)),
            AgriTechError::DuplicateEmail | AgriTechError::DuplicateUsername => {
                (StatusCode::BAD_REQUEST, self.to_string())
            }
            AgriTechError::Validation(msg) => (StatusCode::BAD_REQUEST, msg),
            AgriTechError::Unauthenticated => {
                let body = Json(json!({
                    "success": false,
                    "error": "Could not validate credentials",
                }));
                let mut response = (StatusCode::UNAUTHORIZED, body).into_response();
                response
                    .headers_mut()
                    .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
                return response;
            }
            AgriTechError::Forbidden => (StatusCode::FORBIDDEN, "Not enough privileges".to_string()),
            AgriTechError::Internal(msg) => {
                tracing::error!("Internal Error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error. Please try again.".to_string(),
                )
            }
            AgriTechError::Database(ref e) => {
                tracing::error!("Database Error: {:?}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error. Please try again.".to_string(),
                )
            }
            _ => {
                tracing::error!("Unhandled Error: {:?}", self);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error. Please try again.".to_string(),
                )
            }
        };

        let body = Json(json!({
            "success": false,
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

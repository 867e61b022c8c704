//! Store operations and their axum handlers, one module per area.
//!
//! Plain functions take `&DbPool` so they can be driven from tests and
//! background jobs; the `_axum` wrappers adapt them to HTTP.

use serde::Serialize;
use sqlx::{Executor, Sqlite};

use crate::error::{AgriTechError, AgriTechResult, StoreResultExt};

pub mod alert;
pub mod analytics;
pub mod auth;
pub mod crop;
pub mod farm;
pub mod reading;
pub mod satellite;
pub mod sensor;
pub mod user;
pub mod weather;
pub mod zone;

#[derive(Debug, Serialize)]
pub struct Deleted {
    pub id: i64,
    pub deleted: bool,
}

impl Deleted {
    pub fn new(id: i64) -> Self {
        Self { id, deleted: true }
    }
}

/// `Ok(())` when a row with `id` exists in `table`, `NotFound(entity)` otherwise.
pub(crate) async fn ensure_exists<'e, E>(
    executor: E,
    operation: &'static str,
    table: &'static str,
    entity: &'static str,
    id: i64,
) -> AgriTechResult<()>
where
    E: Executor<'e, Database = Sqlite>,
{
    let sql = format!("SELECT COUNT(*) FROM {} WHERE id = $1", table);
    let (count,): (i64,) = sqlx::query_as(&sql)
        .bind(id)
        .fetch_one(executor)
        .await
        .or_internal(operation, Some(id))?;
    if count == 0 {
        return Err(AgriTechError::NotFound(entity));
    }
    Ok(())
}

use axum::extract::{Json, Path, Query, State};
use axum::Extension;
use chrono::Utc;
use serde::Deserialize;

use super::Deleted;
use crate::db::DbPool;
use crate::error::{is_unique_violation, AgriTechError, AgriTechResult, StoreResultExt};
use crate::middleware::CurrentUser;
use crate::models::{apply_patch, Pagination, User, UserUpdate};

#[derive(Debug, Deserialize)]
pub struct UserListQuery {
    pub skip: Option<i64>,
    pub limit: Option<i64>,
}

pub async fn list_users(pool: &DbPool, page: Pagination) -> AgriTechResult<Vec<User>> {
    let users: Vec<User> = sqlx::query_as("SELECT * FROM users ORDER BY id LIMIT $1 OFFSET $2")
        .bind(page.limit)
        .bind(page.skip)
        .fetch_all(pool)
        .await?;
    tracing::info!(count = users.len(), "Retrieved users");
    Ok(users)
}

/// Profile fields only; credentials and flags are not editable here.
pub async fn update_user(pool: &DbPool, id: i64, patch: UserUpdate) -> AgriTechResult<User> {
    patch.validate()?;

    let mut tx = pool.begin().await.or_internal("update_user", Some(id))?;
    let mut user: User = sqlx::query_as("SELECT * FROM users WHERE id = $1")
        .bind(id)
        .fetch_optional(&mut *tx)
        .await
        .or_internal("update_user", Some(id))?
        .ok_or(AgriTechError::NotFound("user"))?;

    if let Some(email) = &patch.email {
        if *email != user.email {
            let (taken,): (i64,) =
                sqlx::query_as("SELECT COUNT(*) FROM users WHERE email = $1 AND id != $2")
                    .bind(email)
                    .bind(id)
                    .fetch_one(&mut *tx)
                    .await
                    .or_internal("update_user", Some(id))?;
            if taken > 0 {
                return Err(AgriTechError::DuplicateEmail);
            }
        }
    }

    apply_patch!(patch => user; email, full_name, phone, bio, avatar_url, location);
    user.updated_at = Some(Utc::now());

    let updated = sqlx::query_as::<_, User>(
        "UPDATE users SET email = $1, full_name = $2, phone = $3, bio = $4, avatar_url = $5, location = $6, updated_at = $7 \
         WHERE id = $8 RETURNING *",
    )
    .bind(&user.email)
    .bind(&user.full_name)
    .bind(&user.phone)
    .bind(&user.bio)
    .bind(&user.avatar_url)
    .bind(&user.location)
    .bind(user.updated_at)
    .bind(id)
    .fetch_one(&mut *tx)
    .await;

    let user = match updated {
        Ok(user) => user,
        Err(e) if is_unique_violation(&e) => return Err(AgriTechError::DuplicateEmail),
        Err(e) => return Err(e).or_internal("update_user", Some(id)),
    };
    tx.commit().await.or_internal("update_user", Some(id))?;

    tracing::info!(user_id = id, "Updated user profile");
    Ok(user)
}

/// Farms owned by the user go with them.
pub async fn delete_user(pool: &DbPool, id: i64) -> AgriTechResult<()> {
    let mut tx = pool.begin().await.or_internal("delete_user", Some(id))?;
    let result = sqlx::query("DELETE FROM users WHERE id = $1")
        .bind(id)
        .execute(&mut *tx)
        .await
        .or_internal("delete_user", Some(id))?;
    if result.rows_affected() == 0 {
        return Err(AgriTechError::NotFound("user"));
    }
    tx.commit().await.or_internal("delete_user", Some(id))?;

    tracing::info!(user_id = id, "Deleted user");
    Ok(())
}

pub async fn read_me_axum(Extension(CurrentUser(user)): Extension<CurrentUser>) -> Json<User> {
    Json(user)
}

pub async fn update_me_axum(
    State(pool): State<DbPool>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Json(patch): Json<UserUpdate>,
) -> AgriTechResult<Json<User>> {
    Ok(Json(update_user(&pool, user.id, patch).await?))
}

pub async fn list_users_axum(
    State(pool): State<DbPool>,
    Extension(current): Extension<CurrentUser>,
    Query(params): Query<UserListQuery>,
) -> AgriTechResult<Json<Vec<User>>> {
    current.require_superuser()?;
    let page = Pagination::new(params.skip, params.limit)?;
    Ok(Json(list_users(&pool, page).await?))
}

pub async fn delete_user_axum(
    State(pool): State<DbPool>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<i64>,
) -> AgriTechResult<Json<Deleted>> {
    current.require_superuser()?;
    if current.0.id == id {
        return Err(AgriTechError::Validation(
            "superusers cannot delete their own account".to_string(),
        ));
    }
    delete_user(&pool, id).await?;
    Ok(Json(Deleted::new(id)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::farm::get_farm;
    use crate::test_support::{seed_farm, seed_user, test_pool};

    #[tokio::test]
    async fn test_profile_update_is_partial() {
        let pool = test_pool().await;
        let alice = seed_user(&pool, "alice").await;

        let patch: UserUpdate = serde_json::from_str(r#"{"bio": "grows dates"}"#).unwrap();
        let updated = update_user(&pool, alice.id, patch).await.unwrap();
        assert_eq!(updated.bio.as_deref(), Some("grows dates"));
        assert_eq!(updated.email, alice.email);
        assert_eq!(updated.full_name, alice.full_name);
        assert_eq!(updated.hashed_password, alice.hashed_password);
    }

    #[tokio::test]
    async fn test_email_change_must_stay_unique() {
        let pool = test_pool().await;
        let alice = seed_user(&pool, "alice").await;
        let bob = seed_user(&pool, "bob").await;

        let patch = UserUpdate {
            email: Some(bob.email.clone()),
            ..UserUpdate::default()
        };
        assert!(matches!(
            update_user(&pool, alice.id, patch).await,
            Err(AgriTechError::DuplicateEmail)
        ));

        let same = UserUpdate {
            email: Some(alice.email.clone()),
            ..UserUpdate::default()
        };
        assert!(update_user(&pool, alice.id, same).await.is_ok());
    }

    #[tokio::test]
    async fn test_deleting_user_removes_their_farms() {
        let pool = test_pool().await;
        let alice = seed_user(&pool, "alice").await;
        let farm = seed_farm(&pool, alice.id, "F1").await;

        delete_user(&pool, alice.id).await.unwrap();
        assert!(matches!(
            get_farm(&pool, farm.id).await,
            Err(AgriTechError::NotFound("farm"))
        ));
        assert!(matches!(
            delete_user(&pool, alice.id).await,
            Err(AgriTechError::NotFound("user"))
        ));
    }

    #[test]
    fn test_superuser_gate() {
        let regular = CurrentUser(crate::test_support::user_fixture("alice", false));
        let admin = CurrentUser(crate::test_support::user_fixture("root", true));
        assert!(matches!(regular.require_superuser(), Err(AgriTechError::Forbidden)));
        assert!(admin.require_superuser().is_ok());
    }
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::{double_option, require_text};
use crate::error::{AgriTechError, AgriTechResult};

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub username: String,
    pub full_name: String,
    #[serde(skip_serializing)]
    pub hashed_password: String,
    pub phone: Option<String>,
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
    pub location: Option<String>,
    pub is_active: bool,
    pub is_verified: bool,
    pub is_superuser: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    pub last_login: Option<DateTime<Utc>>,
}

/// Registration candidate. The plaintext password only lives as long as the request.
#[derive(Clone, Deserialize)]
pub struct NewUser {
    pub email: String,
    pub username: String,
    pub full_name: String,
    pub password: String,
    pub phone: Option<String>,
    pub bio: Option<String>,
    pub location: Option<String>,
}

impl std::fmt::Debug for NewUser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NewUser")
            .field("email", &self.email)
            .field("username", &self.username)
            .field("full_name", &self.full_name)
            .finish_non_exhaustive()
    }
}

impl NewUser {
    pub fn validate(&self) -> AgriTechResult<()> {
        validate_email(&self.email)?;
        require_text("username", &self.username)?;
        require_text("full_name", &self.full_name)?;
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserUpdate {
    pub email: Option<String>,
    pub full_name: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub phone: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub bio: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub avatar_url: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub location: Option<Option<String>>,
}

impl UserUpdate {
    pub fn validate(&self) -> AgriTechResult<()> {
        if let Some(email) = &self.email {
            validate_email(email)?;
        }
        if let Some(full_name) = &self.full_name {
            require_text("full_name", full_name)?;
        }
        Ok(())
    }
}

pub(crate) fn validate_email(email: &str) -> AgriTechResult<()> {
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !email.chars().any(char::is_whitespace)
        }
        None => false,
    };
    if valid {
        Ok(())
    } else {
        Err(AgriTechError::Validation(format!(
            "{} is not a valid email address",
            email
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_email_shape() {
        assert!(validate_email("alice@example.com").is_ok());
        assert!(validate_email("alice@example").is_err());
        assert!(validate_email("@example.com").is_err());
        assert!(validate_email("alice example@x.com").is_err());
        assert!(validate_email("alice.example.com").is_err());
    }

    #[test]
    fn test_new_user_debug_hides_password() {
        let candidate = NewUser {
            email: "alice@example.com".into(),
            username: "alice".into(),
            full_name: "Alice".into(),
            password: "pw1-secret".into(),
            phone: None,
            bio: None,
            location: None,
        };
        assert!(!format!("{:?}", candidate).contains("pw1-secret"));
    }
}

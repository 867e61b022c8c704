use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum TokenError {
    #[error("token is invalid")]
    InvalidToken,
    #[error("token has expired")]
    TokenExpired,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
}

/// HS256 access tokens signed with the server secret.
#[derive(Clone)]
pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    default_ttl: Duration,
}

impl std::fmt::Debug for TokenService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenService")
            .field("default_ttl", &self.default_ttl)
            .finish_non_exhaustive()
    }
}

impl TokenService {
    pub fn new(secret: &str, default_ttl: Duration) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            default_ttl,
        }
    }

    pub fn issue(&self, subject: &str) -> Result<String, TokenError> {
        self.issue_at(subject, self.default_ttl, Utc::now())
    }

    pub fn issue_at(
        &self,
        subject: &str,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> Result<String, TokenError> {
        let claims = Claims {
            sub: subject.to_string(),
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding).map_err(|e| {
            tracing::error!("Failed to sign access token: {}", e);
            TokenError::InvalidToken
        })
    }

    pub fn decode(&self, token: &str) -> Result<String, TokenError> {
        self.decode_at(token, Utc::now())
    }

    /// Returns the subject. Expiry is checked against `now` with no leeway.
    pub fn decode_at(&self, token: &str, now: DateTime<Utc>) -> Result<String, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        let data = decode::<Claims>(token, &self.decoding, &validation)
            .map_err(|_| TokenError::InvalidToken)?;

        if now.timestamp() >= data.claims.exp {
            return Err(TokenError::TokenExpired);
        }
        if data.claims.sub.is_empty() {
            return Err(TokenError::InvalidToken);
        }
        Ok(data.claims.sub)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> TokenService {
        TokenService::new("test-secret", Duration::days(8))
    }

    #[test]
    fn test_token_round_trips_subject() {
        let svc = service();
        let token = svc.issue("alice").unwrap();
        assert_eq!(svc.decode(&token).unwrap(), "alice");
    }

    #[test]
    fn test_expiry_boundary_is_exclusive() {
        let svc = service();
        let issued = Utc::now();
        let ttl = Duration::minutes(30);
        let token = svc.issue_at("alice", ttl, issued).unwrap();

        let just_before = issued + ttl - Duration::seconds(1);
        assert_eq!(svc.decode_at(&token, just_before).unwrap(), "alice");
        assert_eq!(
            svc.decode_at(&token, issued + ttl),
            Err(TokenError::TokenExpired)
        );
        assert_eq!(
            svc.decode_at(&token, issued + ttl + Duration::hours(1)),
            Err(TokenError::TokenExpired)
        );
    }

    #[test]
    fn test_other_secret_is_rejected() {
        let token = service().issue("alice").unwrap();
        let other = TokenService::new("rotated-secret", Duration::days(8));
        assert_eq!(other.decode(&token), Err(TokenError::InvalidToken));
    }

    #[test]
    fn test_garbage_is_invalid() {
        assert_eq!(service().decode("abc.def.ghi"), Err(TokenError::InvalidToken));
        assert_eq!(service().decode(""), Err(TokenError::InvalidToken));
    }

    #[test]
    fn test_missing_subject_is_invalid() {
        #[derive(Serialize)]
        struct NoSub {
            exp: i64,
        }
        let token = encode(
            &Header::new(Algorithm::HS256),
            &NoSub {
                exp: (Utc::now() + Duration::hours(1)).timestamp(),
            },
            &EncodingKey::from_secret(b"test-secret"),
        )
        .unwrap();
        assert_eq!(service().decode(&token), Err(TokenError::InvalidToken));
    }
}

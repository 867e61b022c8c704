use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};

use crate::error::{AgriTechError, AgriTechResult};
use crate::models::User;
use crate::state::AppState;

/// The authenticated caller, attached to every protected request.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

impl CurrentUser {
    pub fn require_superuser(&self) -> AgriTechResult<()> {
        if self.0.is_superuser {
            Ok(())
        } else {
            tracing::warn!(user_id = self.0.id, "Superuser route refused");
            Err(AgriTechError::Forbidden)
        }
    }
}

pub fn bearer_token(request: &Request) -> Option<&str> {
    let value = request.headers().get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AgriTechError> {
    let token = bearer_token(&request).ok_or(AgriTechError::Unauthenticated)?;
    let user = state.auth.resolve(token).await?;

    request.extensions_mut().insert(CurrentUser(user));
    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;

    fn request_with(header_value: Option<&str>) -> Request {
        let mut builder = Request::builder().uri("/api/v1/farms");
        if let Some(v) = header_value {
            builder = builder.header(header::AUTHORIZATION, v);
        }
        builder.body(Body::empty()).unwrap()
    }

    #[test]
    fn test_bearer_token_extraction() {
        assert_eq!(bearer_token(&request_with(Some("Bearer abc"))), Some("abc"));
        assert_eq!(bearer_token(&request_with(Some("bearer abc"))), Some("abc"));
        assert_eq!(bearer_token(&request_with(Some("Basic abc"))), None);
        assert_eq!(bearer_token(&request_with(Some("Bearer "))), None);
        assert_eq!(bearer_token(&request_with(None)), None);
    }
}

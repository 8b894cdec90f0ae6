use crate::core::error::ApiError;
use crate::core::state::AppState;
use crate::models::user::Principal;
use axum::{
    body::Body,
    extract::State,
    http::{header::AUTHORIZATION, HeaderMap, Request},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;

/// Raw bearer token of the current request, kept so it can be revoked
#[derive(Clone, Debug)]
pub struct BearerToken(pub String);

pub fn extract_bearer(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

/// Resolve the bearer token into a [`Principal`] and attach it to the request.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let token = extract_bearer(request.headers())
        .ok_or_else(|| {
            tracing::debug!(path = %request.uri().path(), "No bearer token");
            ApiError::Unauthorized
        })?
        .to_string();

    let principal = state.tokens.resolve(&token).ok_or_else(|| {
        tracing::warn!(path = %request.uri().path(), "Unknown or expired bearer token");
        ApiError::Unauthorized
    })?;

    request.extensions_mut().insert(principal);
    request.extensions_mut().insert(BearerToken(token));
    Ok(next.run(request).await)
}

pub fn require_teacher(principal: &Principal) -> Result<(), ApiError> {
    if principal.can_teach() {
        return Ok(());
    }
    tracing::warn!(usn = %principal.usn, "Teacher route refused");
    Err(ApiError::Forbidden("teacher access required".to_string()))
}

pub fn require_student(principal: &Principal) -> Result<(), ApiError> {
    if principal.is_student() {
        return Ok(());
    }
    tracing::warn!(usn = %principal.usn, "Student route refused");
    Err(ApiError::Forbidden("student access required".to_string()))
}

pub fn require_admin(principal: &Principal) -> Result<(), ApiError> {
    if principal.is_admin {
        return Ok(());
    }
    tracing::warn!(usn = %principal.usn, "Admin route refused");
    Err(ApiError::Forbidden("admin access required".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    fn principal(is_teacher: bool, is_admin: bool) -> Principal {
        Principal {
            usn: "X1".to_string(),
            email: "x1@example.edu".to_string(),
            is_teacher,
            is_admin,
            section: None,
            department: None,
            year: None,
        }
    }

    #[test]
    fn test_extract_bearer() {
        assert_eq!(extract_bearer(&headers("Bearer abc123")), Some("abc123"));
        assert_eq!(extract_bearer(&headers("bearer abc123")), Some("abc123"));
        assert_eq!(extract_bearer(&headers("Basic abc123")), None);
        assert_eq!(extract_bearer(&headers("Bearer ")), None);
        assert_eq!(extract_bearer(&headers("abc123")), None);
        assert_eq!(extract_bearer(&HeaderMap::new()), None);
    }

    #[test]
    fn test_role_guards() {
        let student = principal(false, false);
        let teacher = principal(true, false);
        let admin = principal(false, true);

        assert!(require_student(&student).is_ok());
        assert!(require_student(&teacher).is_err());
        assert!(require_student(&admin).is_err());

        assert!(require_teacher(&teacher).is_ok());
        assert!(require_teacher(&admin).is_ok());
        assert!(require_teacher(&student).is_err());

        assert!(require_admin(&admin).is_ok());
        assert!(require_admin(&teacher).is_err());
    }
}

//! Resolve the acting user from the `Authorization` header.

use crate::{
    AppState,
    api::models::users::CurrentUser,
    auth::session,
    db::handlers::Users,
    errors::{AuthFailure, Error, Result},
};
use axum::{
    extract::FromRequestParts,
    http::{HeaderMap, header::AUTHORIZATION, request::Parts},
};
use tracing::{debug, instrument, trace};

/// Pull the token out of `Authorization: Bearer <token>`.
///
/// A missing header, or one without the bearer scheme, is `MISSING_TOKEN`. Undecodable header
/// bytes are `INVALID_TOKEN`.
pub(crate) fn bearer_token(headers: &HeaderMap) -> Result<&str> {
    let missing = || Error::Unauthenticated {
        reason: AuthFailure::MissingToken,
        message: None,
    };

    let value = headers.get(AUTHORIZATION).ok_or_else(missing)?;
    let value = value.to_str().map_err(|_| Error::Unauthenticated {
        reason: AuthFailure::InvalidToken,
        message: None,
    })?;

    let (scheme, token) = value.split_once(' ').ok_or_else(missing)?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return Err(missing());
    }
    match token.trim() {
        "" => Err(missing()),
        token => Ok(token),
    }
}

/// Resolution order:
/// 1. a [`CurrentUser`] already placed in the request extensions by the auth middleware;
/// 2. otherwise verify the bearer token and load identity, role and permissions from the
///    database. Users that are missing or not ACTIVE are rejected with `INVALID_USER`.
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = Error;

    #[instrument(skip(parts, state))]
    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self> {
        if let Some(user) = parts.extensions.get::<CurrentUser>() {
            trace!("Using user resolved by middleware: {}", user.id);
            return Ok(user.clone());
        }

        let token = bearer_token(&parts.headers)?;
        let claims = session::verify_session_token(token, &state.config)?;

        let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
        let context = Users::new(&mut conn).get_auth_context(claims.sub).await?.ok_or(Error::Unauthenticated {
            reason: AuthFailure::InvalidUser,
            message: None,
        })?;

        let user = CurrentUser::from(context);
        debug!("Authenticated user {} with role {}", user.id, user.role);
        parts.extensions.insert(user.clone());
        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(value: Option<&str>) -> HeaderMap {
        let mut headers = HeaderMap::new();
        if let Some(value) = value {
            headers.insert(AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        }
        headers
    }

    fn reason(result: Result<&str>) -> Option<AuthFailure> {
        match result {
            Err(Error::Unauthenticated { reason, .. }) => Some(reason),
            _ => None,
        }
    }

    #[test]
    fn test_bearer_token_extraction() {
        assert_eq!(bearer_token(&headers(Some("Bearer abc.def.ghi"))).unwrap(), "abc.def.ghi");
        assert_eq!(bearer_token(&headers(Some("bearer abc"))).unwrap(), "abc");
    }

    #[test]
    fn test_missing_and_malformed_headers() {
        assert_eq!(reason(bearer_token(&headers(None))), Some(AuthFailure::MissingToken));
        assert_eq!(reason(bearer_token(&headers(Some("Bearer ")))), Some(AuthFailure::MissingToken));
        assert_eq!(reason(bearer_token(&headers(Some("Basic dXNlcjpwYXNz")))), Some(AuthFailure::MissingToken));
        assert_eq!(reason(bearer_token(&headers(Some("token")))), Some(AuthFailure::MissingToken));
    }
}

use crate::{AppState, api::models::users::CurrentUser, errors::Error};
use axum::{
    extract::{FromRequestParts, Request, State},
    middleware::Next,
    response::Response,
};
use tracing::trace;

/// Implementation for require_authentication_middleware. Resolves the user once and stores it
/// in the request extensions, where the `CurrentUser` and `Requires*` extractors pick it up.
pub(crate) async fn authenticate(state: &AppState, request: Request) -> Result<Request, Error> {
    let (mut parts, body) = request.into_parts();
    let current_user = CurrentUser::from_request_parts(&mut parts, state).await?;
    trace!("Authenticated {} for {}", current_user.email, parts.uri.path());
    Ok(Request::from_parts(parts, body))
}

/// Middleware that rejects any request without a valid bearer token for an ACTIVE user.
pub async fn require_authentication(State(state): State<AppState>, request: Request, next: Next) -> Result<Response, Error> {
    let request = authenticate(&state, request).await?;
    Ok(next.run(request).await)
}

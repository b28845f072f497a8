use std::future::Future;
use std::pin::Pin;

use axum::{
    async_trait,
    body::Body,
    extract::{FromRef, FromRequestParts, State},
    http::{header::AUTHORIZATION, request::Parts, Request},
    middleware::Next,
    response::Response,
};
use tracing::warn;

use crate::auth::jwt::JwtKeys;
use crate::auth::permissions::{self, ANY};
use crate::auth::repo_types::User;
use crate::error::ApiError;
use crate::state::AppState;

/// The authenticated user, attached to request extensions by the gate.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CurrentUser>()
            .cloned()
            .ok_or_else(|| ApiError::Configuration("Authentication context missing.".into()))
    }
}

/// Build the middleware closure for `axum::middleware::from_fn_with_state`,
/// gating a route behind the given permissions.
pub fn guard(
    required: &'static [&'static str],
) -> impl Fn(
    State<AppState>,
    Request<Body>,
    Next,
) -> Pin<Box<dyn Future<Output = Result<Response, ApiError>> + Send>>
       + Clone {
    move |state, req, next| Box::pin(require_permissions(state, req, next, required))
}

/// One pass of the auth gate. The permission check runs before the user
/// lookup and short-circuits the request on failure.
async fn require_permissions(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
    required: &'static [&'static str],
) -> Result<Response, ApiError> {
    if required.iter().any(|p| *p == ANY) {
        return Ok(next.run(req).await);
    }

    let header = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok());
    let token = parse_bearer(header)?;

    let keys = JwtKeys::from_ref(&state);
    let claims = keys.verify(token).map_err(|e| {
        warn!(error = %e, "token verification failed");
        ApiError::Authentication("Invalid or expired token.".into())
    })?;

    permissions::check(claims.role, required)?;

    let user = User::find_by_id(&state.db, claims.sub)
        .await?
        .ok_or_else(|| {
            ApiError::Authentication(
                "The user belonging to this token does no longer exist.".into(),
            )
        })?;

    if user.changed_password_after(claims.iat) {
        return Err(ApiError::Authentication(
            "User recently changed password! Please log in again.".into(),
        ));
    }

    req.extensions_mut().insert(CurrentUser(user));
    Ok(next.run(req).await)
}

/// Extract the token from an `Authorization: Bearer <token>` header value.
fn parse_bearer(header: Option<&str>) -> Result<&str, ApiError> {
    let header =
        header.ok_or_else(|| ApiError::Authentication("No authorization headers.".into()))?;

    let mut parts = header.split_whitespace();
    match (parts.next(), parts.next(), parts.next()) {
        (Some("Bearer"), Some(token), None) => Ok(token),
        _ => Err(ApiError::Authentication("Malformed token.".into())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_header_is_rejected() {
        let err = parse_bearer(None).unwrap_err();
        assert_eq!(err.to_string(), "No authorization headers.");
    }

    #[test]
    fn single_token_is_malformed() {
        let err = parse_bearer(Some("Bad")).unwrap_err();
        assert_eq!(err.to_string(), "Malformed token.");
    }

    #[test]
    fn three_tokens_are_malformed() {
        let err = parse_bearer(Some("Bearer a b")).unwrap_err();
        assert_eq!(err.to_string(), "Malformed token.");
    }

    #[test]
    fn wrong_scheme_is_malformed() {
        let err = parse_bearer(Some("Basic dXNlcjpwYXNz")).unwrap_err();
        assert_eq!(err.to_string(), "Malformed token.");
    }

    #[test]
    fn well_formed_header_yields_token() {
        let token = parse_bearer(Some("Bearer abc.def.ghi")).unwrap();
        assert_eq!(token, "abc.def.ghi");
    }
}

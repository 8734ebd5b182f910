use axum::{
    extract::{FromRequestParts, Request, State},
    http::{HeaderMap, header, request::Parts},
    middleware::Next,
    response::Response,
};
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};

use super::jwt;
use crate::errors::ApiError;
use crate::models::user::{self, Role};
use crate::state::AppState;

pub const JWT_COOKIE: &str = "jwt";

const NOT_LOGGED_IN: &str = "You are not logged in! Please log in to get access";

/// The authenticated user, inserted into request extensions by [`protect`].
#[derive(Debug, Clone)]
pub struct CurrentUser(pub user::Model);

impl<S: Send + Sync> FromRequestParts<S> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Self>()
            .cloned()
            .ok_or_else(|| ApiError::unauthorized(NOT_LOGGED_IN))
    }
}

/// Bearer token first, then the `jwt` cookie.
fn token_from_headers(headers: &HeaderMap) -> Option<String> {
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty());
    if let Some(token) = bearer {
        return Some(token.to_string());
    }

    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|cookies| cookies.split(';'))
        .filter_map(|cookie| cookie.trim().split_once('='))
        .find(|(name, _)| *name == JWT_COOKIE)
        .map(|(_, value)| value.to_string())
        .filter(|token| !token.is_empty())
}

/// Reject requests without a valid session and expose the user as
/// [`CurrentUser`].
///
/// # Errors
///
/// `401` for missing or invalid tokens, users that no longer exist and
/// tokens issued before the last password change.
pub async fn protect(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token =
        token_from_headers(request.headers()).ok_or_else(|| ApiError::unauthorized(NOT_LOGGED_IN))?;
    let claims = jwt::verify(&token, &state.config)?;

    let current = user::Entity::find_by_id(claims.sub)
        .filter(user::Column::Active.eq(true))
        .one(&state.db)
        .await?
        .ok_or_else(|| ApiError::unauthorized("The user belonging to this token no longer exists"))?;

    if current.changed_password_after(claims.iat) {
        return Err(ApiError::unauthorized(
            "User recently changed password! Please log in again",
        ));
    }

    tracing::debug!(user_id = %current.id, "Authenticated request");
    request.extensions_mut().insert(CurrentUser(current));
    Ok(next.run(request).await)
}

/// Allow only the listed roles. Must run after [`protect`].
///
/// ```rust,ignore
/// router.route_layer(middleware::from_fn(|req: Request, next: Next| {
///     restrict_to(&[Role::Admin, Role::LeadGuide], req, next)
/// }))
/// ```
///
/// # Errors
///
/// `403` when the current user's role is not listed.
pub async fn restrict_to(
    roles: &'static [Role],
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let role = request
        .extensions()
        .get::<CurrentUser>()
        .map(|CurrentUser(user)| user.role())
        .ok_or_else(|| ApiError::unauthorized(NOT_LOGGED_IN))?;

    if !roles.contains(&role) {
        return Err(ApiError::forbidden(
            "You do not have permission to perform this action",
        ));
    }
    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_bearer_token() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc.def"));
        assert_eq!(token_from_headers(&headers).as_deref(), Some("abc.def"));
    }

    #[test]
    fn test_cookie_token() {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("theme=dark; jwt=abc.def"));
        assert_eq!(token_from_headers(&headers).as_deref(), Some("abc.def"));
    }

    #[test]
    fn test_bearer_wins_over_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer header"));
        headers.insert(header::COOKIE, HeaderValue::from_static("jwt=cookie"));
        assert_eq!(token_from_headers(&headers).as_deref(), Some("header"));
    }

    #[test]
    fn test_no_token() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert_eq!(token_from_headers(&headers), None);
    }
}

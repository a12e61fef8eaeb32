use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts},
};
use cookie::Cookie;
use uuid::Uuid;

use crate::{
    error::AppError,
    models::User,
    routes::AppState,
    services::auth::{current_user, AUTH_COOKIE},
};

/// Id of the user behind a valid session token
///
/// The token is taken from an `Authorization: Bearer` header, falling back to
/// the session cookie.
#[derive(Debug, Clone, Copy)]
pub struct AuthUser(pub Uuid);

/// A signed-in user whose account has the admin role
#[derive(Debug, Clone)]
pub struct AdminUser(pub User);

fn bearer_token(parts: &Parts) -> Option<String> {
    parts
        .headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(|token| token.trim().to_string())
        .filter(|token| !token.is_empty())
}

fn cookie_token(parts: &Parts) -> Option<String> {
    parts
        .headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(Cookie::split_parse)
        .filter_map(Result::ok)
        .find(|cookie| cookie.name() == AUTH_COOKIE)
        .map(|cookie| cookie.value().to_string())
        .filter(|token| !token.is_empty())
}

#[axum::async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)
            .or_else(|| cookie_token(parts))
            .ok_or_else(|| AppError::Unauthorized("Not authorized, no token".to_string()))?;

        state.auth.verify_token(&token).map(AuthUser)
    }
}

#[axum::async_trait]
impl FromRequestParts<AppState> for AdminUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let AuthUser(user_id) = AuthUser::from_request_parts(parts, state).await?;
        let user = current_user(state.store.as_ref(), user_id)
            .await
            .map_err(|e| match e {
                AppError::NotFound(_) => {
                    AppError::Unauthorized("Not authorized, user not found".to_string())
                }
                other => other,
            })?;

        if !user.is_admin() {
            return Err(AppError::Forbidden("Not authorized as an admin".to_string()));
        }
        Ok(AdminUser(user))
    }
}

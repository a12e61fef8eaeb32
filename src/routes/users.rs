use axum::{
    extract::State,
    http::{header, HeaderMap, HeaderValue, StatusCode},
    Json,
};
use cookie::Cookie;

use crate::{
    error::{AppError, AppResult},
    middleware::AuthUser,
    models::{
        AuthResponse, Library, LoginRequest, MessageResponse, ReadingGoalRequest,
        RegisterRequest, ShelfRequest, User, UserProfile,
    },
    routes::{extract::JsonBody, AppState},
    services::{auth, shelves},
};

fn set_cookie(cookie: Cookie<'static>) -> AppResult<HeaderMap> {
    let value = HeaderValue::from_str(&cookie.to_string())
        .map_err(|e| AppError::Internal(format!("Invalid cookie header: {}", e)))?;
    let mut headers = HeaderMap::new();
    headers.insert(header::SET_COOKIE, value);
    Ok(headers)
}

fn session(state: &AppState, user: &User) -> AppResult<(HeaderMap, Json<AuthResponse>)> {
    let token = state.auth.issue_token(user.id)?;
    let headers = set_cookie(state.auth.session_cookie(token.clone()))?;
    Ok((
        headers,
        Json(AuthResponse {
            profile: UserProfile::from(user),
            token,
        }),
    ))
}

/// Handler for account registration
pub async fn register(
    State(state): State<AppState>,
    JsonBody(request): JsonBody<RegisterRequest>,
) -> AppResult<(StatusCode, HeaderMap, Json<AuthResponse>)> {
    let user = auth::register(state.store(), &state.auth, request).await?;
    let (headers, body) = session(&state, &user)?;
    Ok((StatusCode::CREATED, headers, body))
}

/// Handler for signing in
pub async fn login(
    State(state): State<AppState>,
    JsonBody(request): JsonBody<LoginRequest>,
) -> AppResult<(HeaderMap, Json<AuthResponse>)> {
    let user = auth::login(state.store(), request).await?;
    session(&state, &user)
}

/// Handler for signing out
pub async fn logout(
    State(state): State<AppState>,
) -> AppResult<(HeaderMap, Json<MessageResponse>)> {
    let headers = set_cookie(state.auth.logout_cookie())?;
    Ok((headers, Json(MessageResponse::new("Logged out successfully"))))
}

pub async fn profile(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> AppResult<Json<UserProfile>> {
    let user = auth::current_user(state.store(), user_id).await?;
    Ok(Json(UserProfile::from(&user)))
}

/// Handler for moving a book between shelves
pub async fn update_shelf(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    JsonBody(request): JsonBody<ShelfRequest>,
) -> AppResult<Json<User>> {
    let user = shelves::update_shelf(state.store(), user_id, request).await?;
    Ok(Json(user))
}

pub async fn library(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> AppResult<Json<Library>> {
    let library = shelves::library(state.store(), user_id).await?;
    Ok(Json(library))
}

pub async fn set_reading_goal(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    JsonBody(request): JsonBody<ReadingGoalRequest>,
) -> AppResult<Json<UserProfile>> {
    let user = shelves::set_reading_goal(state.store(), user_id, request.goal).await?;
    Ok(Json(UserProfile::from(&user)))
}

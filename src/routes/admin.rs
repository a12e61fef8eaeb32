use axum::{extract::State, http::StatusCode, Json};
use uuid::Uuid;

use crate::{
    error::AppResult,
    middleware::AdminUser,
    models::{AdminStats, Genre, MessageResponse, NewGenre, RoleUpdateRequest, User},
    routes::{
        extract::{JsonBody, PathParam},
        AppState,
    },
    services::{admin, genres},
};

/// Handler for dashboard counters
pub async fn stats(
    State(state): State<AppState>,
    _admin: AdminUser,
) -> AppResult<Json<AdminStats>> {
    let stats = admin::stats(state.store(), state.cache.as_ref()).await?;
    Ok(Json(stats))
}

pub async fn users(
    State(state): State<AppState>,
    _admin: AdminUser,
) -> AppResult<Json<Vec<User>>> {
    let users = admin::list_users(state.store()).await?;
    Ok(Json(users))
}

pub async fn set_role(
    State(state): State<AppState>,
    _admin: AdminUser,
    PathParam(id): PathParam<Uuid>,
    JsonBody(request): JsonBody<RoleUpdateRequest>,
) -> AppResult<Json<MessageResponse>> {
    admin::set_role(state.store(), id, &request.role).await?;
    Ok(Json(MessageResponse::new("User role updated")))
}

pub async fn delete_user(
    State(state): State<AppState>,
    AdminUser(acting): AdminUser,
    PathParam(id): PathParam<Uuid>,
) -> AppResult<Json<MessageResponse>> {
    admin::delete_user(state.store(), acting.id, id).await?;
    Ok(Json(MessageResponse::new("User removed")))
}

pub async fn genres(
    State(state): State<AppState>,
    _admin: AdminUser,
) -> AppResult<Json<Vec<Genre>>> {
    let genres = genres::list_genres(state.store(), state.cache.as_ref()).await?;
    Ok(Json(genres))
}

pub async fn create_genre(
    State(state): State<AppState>,
    _admin: AdminUser,
    JsonBody(input): JsonBody<NewGenre>,
) -> AppResult<(StatusCode, Json<Genre>)> {
    let genre = genres::create_genre(state.store(), state.cache.as_ref(), input).await?;
    Ok((StatusCode::CREATED, Json(genre)))
}

pub async fn delete_genre(
    State(state): State<AppState>,
    _admin: AdminUser,
    PathParam(id): PathParam<Uuid>,
) -> AppResult<Json<MessageResponse>> {
    genres::delete_genre(state.store(), state.cache.as_ref(), id).await?;
    Ok(Json(MessageResponse::new("Genre removed")))
}

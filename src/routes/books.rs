use axum::{extract::State, http::StatusCode, Json};
use uuid::Uuid;

use crate::{
    error::AppResult,
    middleware::AdminUser,
    models::{Book, BookPage, BookUpdate, Genre, MessageResponse, NewBook},
    routes::{
        extract::{JsonBody, PathParam, QueryParams},
        AppState,
    },
    services::{
        books::{self, ListParams},
        genres,
    },
};

/// Handler for catalog search and browsing
pub async fn list(
    State(state): State<AppState>,
    QueryParams(params): QueryParams<ListParams>,
) -> AppResult<Json<BookPage>> {
    let page = books::list_books(state.store(), params).await?;
    Ok(Json(page))
}

pub async fn get(State(state): State<AppState>, PathParam(id): PathParam<Uuid>) -> AppResult<Json<Book>> {
    let book = books::get_book(state.store(), id).await?;
    Ok(Json(book))
}

pub async fn genres(State(state): State<AppState>) -> AppResult<Json<Vec<Genre>>> {
    let genres = genres::list_genres(state.store(), state.cache.as_ref()).await?;
    Ok(Json(genres))
}

pub async fn create(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    JsonBody(input): JsonBody<NewBook>,
) -> AppResult<(StatusCode, Json<Book>)> {
    let book = books::create_book(state.store(), input, admin.id).await?;
    Ok((StatusCode::CREATED, Json(book)))
}

pub async fn update(
    State(state): State<AppState>,
    _admin: AdminUser,
    PathParam(id): PathParam<Uuid>,
    JsonBody(update): JsonBody<BookUpdate>,
) -> AppResult<Json<Book>> {
    let book = books::update_book(state.store(), id, update).await?;
    Ok(Json(book))
}

pub async fn delete(
    State(state): State<AppState>,
    _admin: AdminUser,
    PathParam(id): PathParam<Uuid>,
) -> AppResult<Json<MessageResponse>> {
    books::delete_book(state.store(), id).await?;
    Ok(Json(MessageResponse::new("Book removed")))
}

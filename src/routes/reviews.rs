use axum::{extract::State, http::StatusCode, Json};
use uuid::Uuid;

use crate::{
    error::AppResult,
    middleware::{AdminUser, AuthUser},
    models::{MessageResponse, NewReview, Review, ReviewView},
    routes::{
        extract::{JsonBody, PathParam},
        AppState,
    },
    services::reviews,
};

/// Handler for submitting a review
pub async fn create(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    JsonBody(input): JsonBody<NewReview>,
) -> AppResult<(StatusCode, Json<Review>)> {
    let review = reviews::create_review(state.store(), user_id, input).await?;
    Ok((StatusCode::CREATED, Json(review)))
}

pub async fn for_book(
    State(state): State<AppState>,
    PathParam(book_id): PathParam<Uuid>,
) -> AppResult<Json<Vec<ReviewView>>> {
    let reviews = reviews::book_reviews(state.store(), book_id).await?;
    Ok(Json(reviews))
}

pub async fn pending(
    State(state): State<AppState>,
    _admin: AdminUser,
) -> AppResult<Json<Vec<ReviewView>>> {
    let reviews = reviews::pending_reviews(state.store()).await?;
    Ok(Json(reviews))
}

pub async fn approve(
    State(state): State<AppState>,
    _admin: AdminUser,
    PathParam(id): PathParam<Uuid>,
) -> AppResult<Json<MessageResponse>> {
    reviews::approve_review(state.store(), id).await?;
    Ok(Json(MessageResponse::new("Review approved")))
}

pub async fn delete(
    State(state): State<AppState>,
    _admin: AdminUser,
    PathParam(id): PathParam<Uuid>,
) -> AppResult<Json<MessageResponse>> {
    reviews::delete_review(state.store(), id).await?;
    Ok(Json(MessageResponse::new("Review removed")))
}

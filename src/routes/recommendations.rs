use axum::{extract::State, Json};

use crate::{
    error::AppResult, middleware::AuthUser, models::Recommendation, routes::AppState,
    services::recommendations,
};

/// Handler for the signed-in user's recommendations
pub async fn recommend(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> AppResult<Json<Vec<Recommendation>>> {
    let recommendations = recommendations::get_recommendations(state.store(), user_id).await?;
    Ok(Json(recommendations))
}

use axum::{extract::State, Json};

use crate::{
    error::AppResult, middleware::AuthUser, models::ActivityView, routes::AppState,
    services::activities,
};

/// Handler for the community activity feed
pub async fn feed(
    State(state): State<AppState>,
    _user: AuthUser,
) -> AppResult<Json<Vec<ActivityView>>> {
    let feed = activities::feed(state.store()).await?;
    Ok(Json(feed))
}

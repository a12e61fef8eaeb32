use axum::{
    http::StatusCode,
    middleware,
    routing::{delete, get, post, put},
    Json, Router,
};
use serde_json::{json, Value};
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::middleware::{make_span_with_request_id, request_id_middleware};

pub mod activities;
pub mod admin;
pub mod books;
pub mod extract;
pub mod recommendations;
pub mod reviews;
pub mod state;
pub mod users;

pub use state::AppState;

/// Creates the application router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .nest("/api", api_routes())
        .layer(
            ServiceBuilder::new()
                .layer(middleware::from_fn(request_id_middleware))
                .layer(TraceLayer::new_for_http().make_span_with(make_span_with_request_id))
                .layer(
                    CorsLayer::new()
                        .allow_origin(Any)
                        .allow_methods(Any)
                        .allow_headers(Any),
                ),
        )
        .with_state(state)
}

/// API routes under /api
fn api_routes() -> Router<AppState> {
    Router::new()
        // Accounts and shelves
        .route("/users", post(users::register))
        .route("/users/login", post(users::login))
        .route("/users/logout", post(users::logout))
        .route("/users/profile", get(users::profile))
        .route("/users/shelf", post(users::update_shelf))
        .route("/users/library", get(users::library))
        .route("/users/goal", put(users::set_reading_goal))
        // Catalog
        .route("/books", get(books::list).post(books::create))
        .route("/books/genres", get(books::genres))
        .route("/books/recommendations", get(recommendations::recommend))
        .route(
            "/books/:id",
            get(books::get).put(books::update).delete(books::delete),
        )
        // Reviews
        .route("/reviews", post(reviews::create))
        .route("/reviews/book/:book_id", get(reviews::for_book))
        .route("/reviews/pending", get(reviews::pending))
        .route("/reviews/:id/approve", put(reviews::approve))
        .route("/reviews/:id", delete(reviews::delete))
        // Administration
        .route("/admin/stats", get(admin::stats))
        .route("/admin/users", get(admin::users))
        .route("/admin/users/:id/role", put(admin::set_role))
        .route("/admin/users/:id", delete(admin::delete_user))
        .route("/admin/genres", get(admin::genres).post(admin::create_genre))
        .route("/admin/genres/:id", delete(admin::delete_genre))
        // Community
        .route("/activities", get(activities::feed))
}

/// Health check endpoint
async fn health_check() -> (StatusCode, Json<Value>) {
    (StatusCode::OK, Json(json!({ "status": "healthy" })))
}

use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{delete, post, put},
};

/// Admin Router Module
///
/// Moderation of categories, locations and post publication. Handlers check
/// the `admin` role themselves after the `AuthUser` extractor has authenticated
/// the request, and answer 403 to everyone else.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        // POST /admin/categories
        .route("/categories", post(handlers::create_category))
        // PUT /admin/categories/{id}/status
        // Hiding a category hides its feed and every post filed under it.
        .route(
            "/categories/{id}/status",
            put(handlers::set_category_status),
        )
        // DELETE /admin/categories/{id}
        // Posts in the category survive with the reference cleared.
        .route("/categories/{id}", delete(handlers::delete_category))
        // POST /admin/locations
        .route("/locations", post(handlers::create_location))
        // DELETE /admin/locations/{id}
        .route("/locations/{id}", delete(handlers::delete_location))
        // PUT /admin/posts/{id}/status
        // Publish or unpublish any post.
        .route("/posts/{id}/status", put(handlers::set_post_status))
}

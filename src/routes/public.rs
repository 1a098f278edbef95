use crate::{AppState, handlers};
use axum::{Router, routing::get};

/// Public Router Module
///
/// Endpoints open to anonymous and logged-in clients alike. Handlers here take
/// an optional identity (`MaybeUser`) and let the visibility policy decide what
/// each requester may see; nothing hidden is ever reported as forbidden.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /health
        // Liveness probe for monitoring and load balancers.
        .route("/health", get(|| async { "ok" }))
        // GET /?page=N
        // Home feed: publicly visible posts, newest publication first.
        .route("/", get(handlers::index))
        // GET /posts/{post_id}
        // Post detail with comments. Authors also see their drafts and scheduled posts.
        .route("/posts/{post_id}", get(handlers::get_post_detail))
        // GET /category/{category_slug}?page=N
        // Feed of a published category. Unpublished categories answer 404.
        .route(
            "/category/{category_slug}",
            get(handlers::get_category_posts),
        )
        // GET /profile/{username}?page=N
        // A user's posts: everything for the owner, the public subset for visitors.
        .route("/profile/{username}", get(handlers::get_profile))
}

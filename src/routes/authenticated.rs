use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post, put},
};

/// Authenticated Router Module
///
/// Routes that require a validated identity. Every handler receives an
/// `AuthUser`, and ownership of the target post or comment is then decided by
/// the visibility policy.
pub fn authenticated_routes() -> Router<AppState> {
    Router::<AppState>::new()
        // GET /me, PUT /me
        // The requester's own account and the profile edit form.
        .route("/me", get(handlers::get_me).put(handlers::update_me))
        // POST /posts
        // Publishes a post authored by the requester.
        .route("/posts", post(handlers::create_post))
        // PUT/DELETE /posts/{post_id}
        // Owner-only. A refused edit redirects to the detail page; a refused delete is a 404.
        .route(
            "/posts/{post_id}",
            put(handlers::update_post).delete(handlers::delete_post),
        )
        // POST /posts/{post_id}/comments
        .route("/posts/{post_id}/comments", post(handlers::add_comment))
        // PUT/DELETE /posts/{post_id}/comments/{comment_id}
        // Owner-only; anyone else gets 404.
        .route(
            "/posts/{post_id}/comments/{comment_id}",
            put(handlers::update_comment).delete(handlers::delete_comment),
        )
}

use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{post, put},
};

/// Authenticated Router Module
///
/// Every mutation of user content. The `AuthUser` middleware layered over this router
/// redirects anonymous requests to the login URL; ownership is then checked per handler,
/// with non-owners redirected back to the post.
pub fn authenticated_routes() -> Router<AppState> {
    Router::<AppState>::new()
        // POST /posts
        .route("/posts", post(handlers::create_post))
        // PUT/DELETE /posts/{id}
        // Author only.
        .route(
            "/posts/{id}",
            put(handlers::update_post).delete(handlers::delete_post),
        )
        // POST /posts/{id}/comments
        // Only on posts the viewer can see.
        .route("/posts/{id}/comments", post(handlers::add_comment))
        // PUT/DELETE /posts/{id}/comments/{comment_id}
        // Comment author only.
        .route(
            "/posts/{id}/comments/{comment_id}",
            put(handlers::update_comment).delete(handlers::delete_comment),
        )
        // PUT /profile
        // Edit the viewer's own profile.
        .route("/profile", put(handlers::update_profile))
        // POST /uploads/post-image
        // Presigned URL for uploading a post image directly to object storage.
        .route("/uploads/post-image", post(handlers::get_presigned_url))
}

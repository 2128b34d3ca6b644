use crate::{AppState, handlers};
use axum::{Router, routing::get};

/// Public Router Module
///
/// Read-only endpoints reachable without credentials. Every handler here resolves an
/// optional `Viewer` and filters content through the visibility policy.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /health
        // Liveness probe for load balancers.
        .route("/health", get(|| async { "ok" }))
        // GET /posts?page=N
        // Home feed: publicly visible posts, newest first, ten per page.
        .route("/posts", get(handlers::get_home_feed))
        // GET /posts/{id}
        // Post detail with comments. Hidden posts answer 404 unless the viewer is the author.
        .route("/posts/{id}", get(handlers::get_post))
        // GET /category/{slug}?page=N
        // Feed of one published category.
        .route("/category/{slug}", get(handlers::get_category_feed))
        // GET /profile/{username}?page=N
        // Profile feed. Includes unpublished posts only for the profile owner.
        .route("/profile/{username}", get(handlers::get_profile_feed))
}

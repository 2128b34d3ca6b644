use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{post, put},
};

/// Admin Router Module
///
/// Reference data management. Mounted under `/admin` behind the authentication layer; the
/// 'admin' role itself is checked inside each handler (403 otherwise).
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        // POST /admin/categories
        .route("/categories", post(handlers::create_category))
        // PUT /admin/categories/{slug}/status
        // Publishing toggles the visibility of every post in the category.
        .route(
            "/categories/{slug}/status",
            put(handlers::update_category_status),
        )
        // POST /admin/locations
        .route("/locations", post(handlers::create_location))
}

use super::handlers::{healthz_handler, readyz_handler, view_handler};
use crate::AppState;
use axum::{routing::get, Router};

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(view_handler))
        .route("/profile", get(view_handler))
        .route("/api", get(view_handler))
        .route("/users", get(view_handler))
        .route("/users/{id}", get(view_handler))
        .route("/applications", get(view_handler))
        .route("/applications/{id}", get(view_handler))
        .route("/healthz", get(healthz_handler))
        .route("/readyz", get(readyz_handler))
        // Unregistered paths still go through the verdict gate and resolve
        // to the explicit NotFound view
        .fallback(view_handler)
        .with_state(state)
}

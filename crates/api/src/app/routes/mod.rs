use axum::{routing::get, Router};

pub mod jobs;
pub mod reports;
pub mod system;

/// Router for every endpoint.
pub fn router() -> Router {
    Router::new()
        .route("/health", get(system::health))
        .route("/stats", get(system::stats))
        .nest("/jobs", jobs::router())
        .nest("/reports", reports::router())
}

//! HTTP API application wiring (Axum router + service wiring).
//!
//! - `services.rs`: job subsystem wiring (registry, runner, sweeper, report store)
//! - `routes/`: HTTP routes + handlers (one file per area)
//! - `dto.rs`: request/response DTOs and JSON mapping helpers
//! - `errors.rs`: consistent error responses

use std::sync::Arc;

use axum::{Extension, Router};
use tower::ServiceBuilder;

use assessly_infra::JobsConfig;

use crate::middleware;

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

/// Build the full HTTP router (public entrypoint used by `main.rs` and tests).
///
/// Spawns the retention sweeper, so it must run inside a Tokio runtime.
pub async fn build_app(config: JobsConfig) -> Router {
    let services = Arc::new(services::build_services(&config));
    router(services)
}

/// Router over already-built services.
pub fn router(services: Arc<services::AppServices>) -> Router {
    routes::router()
        .layer(Extension(services))
        .layer(
            ServiceBuilder::new().layer(axum::middleware::from_fn(middleware::trace_requests)),
        )
}

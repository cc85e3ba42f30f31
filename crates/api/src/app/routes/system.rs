use std::sync::Arc;

use axum::{extract::Extension, http::StatusCode, response::IntoResponse, Json};

use crate::app::errors;
use crate::app::services::AppServices;

pub async fn health() -> StatusCode {
    StatusCode::OK
}

pub async fn stats(Extension(services): Extension<Arc<AppServices>>) -> axum::response::Response {
    let jobs = match services.jobs().stats() {
        Ok(stats) => stats,
        Err(e) => return errors::job_error_to_response(e),
    };
    let stored_bytes = match services.jobs().stored_bytes() {
        Ok(bytes) => bytes,
        Err(e) => return errors::job_error_to_response(e),
    };

    (
        StatusCode::OK,
        Json(serde_json::json!({
            "jobs": jobs,
            "reports": services.reports().len(),
            "stored_bytes": stored_bytes,
        })),
    )
        .into_response()
}

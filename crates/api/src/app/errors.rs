use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use assessly_core::DomainError;
use assessly_infra::jobs::JobError;

pub fn job_error_to_response(err: JobError) -> axum::response::Response {
    match err {
        JobError::NotFound(id) => {
            json_error(StatusCode::NOT_FOUND, "not_found", format!("job {id} not found"))
        }
        JobError::Conflict(msg) => json_error(StatusCode::CONFLICT, "conflict", msg),
        e @ JobError::Gone(_) => json_error(StatusCode::GONE, "gone", e.to_string()),
        JobError::Validation(msg) => json_error(StatusCode::BAD_REQUEST, "validation_error", msg),
        e @ JobError::InvalidTransition { .. } => {
            json_error(StatusCode::CONFLICT, "invalid_transition", e.to_string())
        }
        e @ JobError::NoExecutor(_) => {
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "no_executor", e.to_string())
        }
        JobError::Artifact(e) => json_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "artifact_error",
            e.to_string(),
        ),
        JobError::Storage(msg) => json_error(StatusCode::INTERNAL_SERVER_ERROR, "storage_error", msg),
    }
}

pub fn domain_error_to_response(err: DomainError) -> axum::response::Response {
    match err {
        DomainError::Validation(msg) => json_error(StatusCode::BAD_REQUEST, "validation_error", msg),
        DomainError::InvalidId(msg) => json_error(StatusCode::BAD_REQUEST, "invalid_id", msg),
    }
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query},
    http::{header, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};

use assessly_core::ReportId;
use assessly_infra::jobs::{JobKind, JobOptions, JobRecord};

use crate::app::{dto, errors};
use crate::app::services::{self, AppServices};

pub fn router() -> Router {
    Router::new()
        .route("/bulk-update", post(start_bulk_update))
        .route("/bulk-export", post(start_bulk_export))
        .route("/active", get(list_active))
        .route("/:id", get(get_job))
        .route("/:id/cancel", post(cancel_job))
        .route("/:id/download", get(download_bundle))
        .route("/:id/events", get(job_events))
}

pub async fn start_bulk_update(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<dto::BulkUpdateRequest>,
) -> axum::response::Response {
    let report_ids = match dto::parse_report_ids(&body.report_ids) {
        Ok(ids) => ids,
        Err(resp) => return resp,
    };
    let options = JobOptions::BulkUpdate {
        sections: body.sections,
    };
    start_job(&services, options, report_ids)
}

pub async fn start_bulk_export(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<dto::BulkExportRequest>,
) -> axum::response::Response {
    let report_ids = match dto::parse_report_ids(&body.report_ids) {
        Ok(ids) => ids,
        Err(resp) => return resp,
    };
    let format = match dto::parse_export_format(&body.format) {
        Ok(format) => format,
        Err(resp) => return resp,
    };
    let report_type = match dto::parse_report_type(body.report_type.as_deref()) {
        Ok(report_type) => report_type,
        Err(resp) => return resp,
    };
    start_job(&services, JobOptions::bulk_export(format, report_type), report_ids)
}

fn start_job(services: &AppServices, options: JobOptions, report_ids: Vec<ReportId>) -> axum::response::Response {
    match services.jobs().start(options, report_ids) {
        Ok(job) => (
            StatusCode::ACCEPTED,
            Json(dto::JobAccepted {
                job_id: job.id,
                poll_interval_ms: services.jobs().poll_interval().as_millis() as u64,
            }),
        )
            .into_response(),
        Err(e) => errors::job_error_to_response(e),
    }
}

pub async fn list_active(
    Extension(services): Extension<Arc<AppServices>>,
    Query(query): Query<dto::ActiveJobsQuery>,
) -> axum::response::Response {
    let kinds = match query.kind.as_deref() {
        Some(raw) => match dto::parse_kind(raw) {
            Ok(kind) => vec![kind],
            Err(resp) => return resp,
        },
        None => JobKind::ALL.to_vec(),
    };

    let mut jobs: Vec<JobRecord> = Vec::new();
    for kind in kinds {
        match services.jobs().list_active(kind) {
            Ok(mut found) => jobs.append(&mut found),
            Err(e) => return errors::job_error_to_response(e),
        }
    }

    let items = jobs
        .into_iter()
        .map(dto::JobStatusPayload::from)
        .collect::<Vec<_>>();
    (StatusCode::OK, Json(serde_json::json!({ "items": items }))).into_response()
}

pub async fn get_job(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id = match dto::parse_job_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    match services.jobs().status(id) {
        Ok(job) => (StatusCode::OK, Json(dto::JobStatusPayload::from(job))).into_response(),
        Err(e) => errors::job_error_to_response(e),
    }
}

pub async fn cancel_job(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id = match dto::parse_job_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    match services.jobs().cancel(id) {
        Ok(job) => (StatusCode::OK, Json(dto::JobStatusPayload::from(job))).into_response(),
        Err(e) => errors::job_error_to_response(e),
    }
}

pub async fn download_bundle(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id = match dto::parse_job_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    match services.jobs().download(id) {
        Ok(bundle) => (
            StatusCode::OK,
            [
                (header::CONTENT_TYPE, bundle.content_type),
                (
                    header::CONTENT_DISPOSITION,
                    format!("attachment; filename=\"{}\"", bundle.file_name),
                ),
            ],
            bundle.bytes,
        )
            .into_response(),
        Err(e) => errors::job_error_to_response(e),
    }
}

pub async fn job_events(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id = match dto::parse_job_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    let current = match services.jobs().status(id) {
        Ok(job) => job,
        Err(e) => return errors::job_error_to_response(e),
    };
    services::job_sse_stream(services, current).into_response()
}

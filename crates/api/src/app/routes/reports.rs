use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};

use assessly_infra::reports::NewReport;
use assessly_work::ReportReader;

use crate::app::{dto, errors};
use crate::app::services::AppServices;

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_report).get(list_reports))
        .route("/:id", get(get_report))
}

pub async fn create_report(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<dto::CreateReportRequest>,
) -> axum::response::Response {
    let mut input = NewReport::new(body.company_name);
    if let Some(sector) = body.sector {
        input = input.with_sector(sector);
    }
    for (criterion, score) in body.scores {
        input = input.with_score(criterion, score);
    }

    match services.reports().create(input) {
        Ok(report) => (StatusCode::CREATED, Json(dto::report_to_json(report))).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

pub async fn list_reports(Extension(services): Extension<Arc<AppServices>>) -> axum::response::Response {
    let items = services
        .reports()
        .list()
        .into_iter()
        .map(dto::report_to_json)
        .collect::<Vec<_>>();
    (StatusCode::OK, Json(serde_json::json!({ "items": items }))).into_response()
}

pub async fn get_report(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id = match dto::parse_report_id(&id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match services.reports().get_report(id) {
        Some(report) => (StatusCode::OK, Json(dto::report_to_json(report))).into_response(),
        None => errors::json_error(StatusCode::NOT_FOUND, "not_found", format!("report {id} not found")),
    }
}

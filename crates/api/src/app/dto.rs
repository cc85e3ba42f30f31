use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use assessly_core::{ArtifactRef, JobId, ReportId};
use assessly_infra::jobs::{ExportPhase, JobKind, JobRecord, JobStatus};
use assessly_work::{ExportFormat, ReportSnapshot, ReportType};

use crate::app::errors;

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct BulkUpdateRequest {
    pub report_ids: Vec<String>,
    #[serde(default)]
    pub sections: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
pub struct BulkExportRequest {
    pub report_ids: Vec<String>,
    pub format: String,
    #[serde(default)]
    pub report_type: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ActiveJobsQuery {
    pub kind: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateReportRequest {
    pub company_name: String,
    #[serde(default)]
    pub sector: Option<String>,
    #[serde(default)]
    pub scores: BTreeMap<String, f64>,
}

// -------------------------
// Response DTOs
// -------------------------

#[derive(Debug, Serialize)]
pub struct JobAccepted {
    pub job_id: JobId,
    pub poll_interval_ms: u64,
}

#[derive(Debug, Serialize)]
pub struct CompletedItemPayload {
    pub item_id: ReportId,
    pub display_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifact_ref: Option<ArtifactRef>,
}

#[derive(Debug, Serialize)]
pub struct FailedItemPayload {
    pub item_id: ReportId,
    pub display_name: String,
    pub reason: String,
}

/// Job status as seen by polling clients.
#[derive(Debug, Serialize)]
pub struct JobStatusPayload {
    pub id: JobId,
    pub kind: JobKind,
    pub status: JobStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phase: Option<ExportPhase>,
    pub progress_percent: u8,
    pub current_item_id: Option<ReportId>,
    pub input_ids: Vec<ReportId>,
    pub completed_items: Vec<CompletedItemPayload>,
    pub failed_items: Vec<FailedItemPayload>,
    pub cancel_requested: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<ExportFormat>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report_type: Option<ReportType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bundle_size_bytes: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

impl From<JobRecord> for JobStatusPayload {
    fn from(job: JobRecord) -> Self {
        Self {
            id: job.id,
            kind: job.kind,
            status: job.status,
            phase: job.phase,
            progress_percent: job.progress_percent(),
            current_item_id: job.current_item_id(),
            input_ids: job.input_ids(),
            format: job.format(),
            report_type: job.report_type(),
            bundle_size_bytes: job.bundle.as_ref().map(|b| b.size_bytes),
            expires_at: job.bundle.as_ref().map(|b| b.expires_at),
            completed_items: job
                .completed_items
                .iter()
                .map(|o| CompletedItemPayload {
                    item_id: o.item_id,
                    display_name: o.display_name.clone(),
                    artifact_ref: o.artifact_ref(),
                })
                .collect(),
            failed_items: job
                .failed_items
                .iter()
                .map(|o| FailedItemPayload {
                    item_id: o.item_id,
                    display_name: o.display_name.clone(),
                    reason: o.reason().unwrap_or_default().to_string(),
                })
                .collect(),
            cancel_requested: job.cancel_requested,
            error: job.error,
            created_at: job.created_at,
            started_at: job.started_at,
            finished_at: job.finished_at,
        }
    }
}

pub fn report_to_json(report: ReportSnapshot) -> serde_json::Value {
    serde_json::json!({
        "id": report.id.to_string(),
        "company_name": report.company_name,
        "sector": report.sector,
        "scores": report.scores,
        "analysis": report.analysis.map(|a| serde_json::json!({
            "summary": a.summary,
            "overall_score": a.overall_score,
            "confidence": a.confidence,
            "generated_at": a.generated_at.to_rfc3339(),
        })),
        "updated_at": report.updated_at.to_rfc3339(),
    })
}

// -------------------------
// Parsing helpers
// -------------------------

pub fn parse_job_id(raw: &str) -> Result<JobId, axum::response::Response> {
    raw.parse().map_err(errors::domain_error_to_response)
}

pub fn parse_report_id(raw: &str) -> Result<ReportId, axum::response::Response> {
    raw.parse().map_err(errors::domain_error_to_response)
}

pub fn parse_report_ids(raw: &[String]) -> Result<Vec<ReportId>, axum::response::Response> {
    raw.iter().map(|id| parse_report_id(id)).collect()
}

pub fn parse_kind(raw: &str) -> Result<JobKind, axum::response::Response> {
    raw.parse().map_err(errors::job_error_to_response)
}

pub fn parse_export_format(raw: &str) -> Result<ExportFormat, axum::response::Response> {
    raw.parse().map_err(errors::domain_error_to_response)
}

pub fn parse_report_type(raw: Option<&str>) -> Result<ReportType, axum::response::Response> {
    match raw {
        None => Ok(ReportType::Full),
        Some(raw) => raw.parse().map_err(errors::domain_error_to_response),
    }
}

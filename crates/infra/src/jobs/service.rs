//! Status/control operations over bulk jobs.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::broadcast;
use tracing::info;

use assessly_core::{JobId, ReportId};
use assessly_work::ReportReader;

use super::error::{JobError, JobResult};
use super::events::JobEvent;
use super::registry::{JobRegistry, JobStats};
use super::runner::JobRunner;
use super::types::{JobItem, JobKind, JobOptions, JobRecord, JobStatus};

/// Bytes of a ready export bundle.
#[derive(Debug, Clone)]
pub struct BundleDownload {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// Entry point for starting and observing bulk jobs.
///
/// Every operation is a short synchronous critical section on the registry; the
/// long-running part happens on the runner's background task.
pub struct BulkJobService<R: JobRegistry> {
    runner: Arc<JobRunner<R>>,
    reports: Arc<dyn ReportReader>,
    poll_interval: Duration,
}

impl<R: JobRegistry + 'static> BulkJobService<R> {
    pub fn new(runner: Arc<JobRunner<R>>, reports: Arc<dyn ReportReader>, poll_interval: Duration) -> Self {
        Self {
            runner,
            reports,
            poll_interval,
        }
    }

    pub fn runner(&self) -> &Arc<JobRunner<R>> {
        &self.runner
    }

    /// Recommended delay between status polls.
    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Validate inputs, create a `pending` job and hand it to the runner.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(&self, options: JobOptions, report_ids: Vec<ReportId>) -> JobResult<JobRecord> {
        if report_ids.is_empty() {
            return Err(JobError::Validation(
                "at least one report id is required".to_string(),
            ));
        }

        let mut seen = HashSet::with_capacity(report_ids.len());
        let mut items = Vec::with_capacity(report_ids.len());
        let mut unknown = Vec::new();
        for id in report_ids {
            if !seen.insert(id) {
                continue;
            }
            match self.reports.get_report(id) {
                Some(report) => items.push(JobItem::new(id, report.company_name)),
                None => unknown.push(id.to_string()),
            }
        }
        if !unknown.is_empty() {
            return Err(JobError::Validation(format!(
                "unknown report ids: {}",
                unknown.join(", ")
            )));
        }

        let record = self.runner.registry().create(JobRecord::new(options, items)?)?;
        self.runner.events().publish(&record);
        info!(
            job_id = %record.id,
            kind = %record.kind,
            items = record.total_items(),
            "job accepted"
        );

        self.runner.spawn(record.id);
        Ok(record)
    }

    pub fn status(&self, job_id: JobId) -> JobResult<JobRecord> {
        self.runner.registry().get(job_id)
    }

    /// Request cooperative cancellation. The job stops before its next item.
    pub fn cancel(&self, job_id: JobId) -> JobResult<JobRecord> {
        let record = self.runner.registry().request_cancel(job_id)?;
        info!(job_id = %job_id, status = %record.status, "job cancellation requested");
        Ok(record)
    }

    pub fn list_active(&self, kind: JobKind) -> JobResult<Vec<JobRecord>> {
        self.runner.registry().list_active(kind)
    }

    /// Fetch the bundle of a `ready` export job.
    pub fn download(&self, job_id: JobId) -> JobResult<BundleDownload> {
        let record = self.runner.registry().get(job_id)?;

        if record.kind != JobKind::BulkExport {
            return Err(JobError::Conflict(format!(
                "job {job_id} is a {} job and has nothing to download",
                record.kind
            )));
        }

        let bundle = match (record.status, record.bundle) {
            (JobStatus::Ready, Some(bundle)) if bundle.is_expired_at(Utc::now()) => {
                return Err(JobError::Gone(job_id));
            }
            (JobStatus::Ready, Some(bundle)) => bundle,
            (JobStatus::Expired, _) => return Err(JobError::Gone(job_id)),
            (status, _) => {
                return Err(JobError::Conflict(format!(
                    "job {job_id} is {status}; the export can be downloaded once it is ready"
                )));
            }
        };

        let stored = self
            .runner
            .artifacts()
            .get(bundle.bundle_ref)?
            .ok_or(JobError::Gone(job_id))?;

        Ok(BundleDownload {
            file_name: bundle.file_name,
            content_type: bundle.content_type,
            bytes: stored.bytes,
        })
    }

    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.runner.events().subscribe()
    }

    pub fn stats(&self) -> JobResult<JobStats> {
        self.runner.registry().stats()
    }

    /// Bytes currently held by the artifact store.
    pub fn stored_bytes(&self) -> JobResult<u64> {
        Ok(self.runner.artifacts().total_bytes()?)
    }
}

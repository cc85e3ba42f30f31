//! Core job types and lifecycle rules.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use assessly_core::{ArtifactRef, JobId, ReportId};
use assessly_work::{ExportFormat, ExportOptions, RegenerateOptions, ReportType, WorkTask};

use super::error::{JobError, JobResult};

/// Kind of bulk job. At most one active job per kind (single-flight).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    /// Regenerate the AI analysis of every selected report.
    BulkUpdate,
    /// Render every selected report and bundle the files.
    BulkExport,
}

impl JobKind {
    pub const ALL: [JobKind; 2] = [JobKind::BulkUpdate, JobKind::BulkExport];

    pub fn as_str(&self) -> &'static str {
        match self {
            JobKind::BulkUpdate => "bulk_update",
            JobKind::BulkExport => "bulk_export",
        }
    }
}

impl core::fmt::Display for JobKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl core::str::FromStr for JobKind {
    type Err = JobError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "bulk_update" => Ok(JobKind::BulkUpdate),
            "bulk_export" => Ok(JobKind::BulkExport),
            other => Err(JobError::Validation(format!(
                "unknown job kind '{other}' (expected bulk_update or bulk_export)"
            ))),
        }
    }
}

/// Job lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Created, not yet claimed by the runner
    Pending,
    /// Items are being processed
    InProgress,
    /// Bulk update finished (possibly with failed items)
    Completed,
    /// Stopped at an item boundary after a cancel request
    Cancelled,
    /// Every item failed, or the orchestration itself failed
    Failed,
    /// Export bundle is downloadable
    Ready,
    /// Export bundle passed its TTL and was released
    Expired,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::InProgress => "in_progress",
            JobStatus::Completed => "completed",
            JobStatus::Cancelled => "cancelled",
            JobStatus::Failed => "failed",
            JobStatus::Ready => "ready",
            JobStatus::Expired => "expired",
        }
    }

    /// Sink states: no transition leaves them.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Cancelled | JobStatus::Failed | JobStatus::Expired
        )
    }

    /// Counts against single-flight.
    pub fn is_active(&self) -> bool {
        matches!(self, JobStatus::Pending | JobStatus::InProgress)
    }

    /// No more item work will happen (terminal or `ready`).
    pub fn is_finished(&self) -> bool {
        self.is_terminal() || *self == JobStatus::Ready
    }
}

impl core::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl core::str::FromStr for JobStatus {
    type Err = JobError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(JobStatus::Pending),
            "in_progress" => Ok(JobStatus::InProgress),
            "completed" => Ok(JobStatus::Completed),
            "cancelled" => Ok(JobStatus::Cancelled),
            "failed" => Ok(JobStatus::Failed),
            "ready" => Ok(JobStatus::Ready),
            "expired" => Ok(JobStatus::Expired),
            other => Err(JobError::Validation(format!("unknown job status '{other}'"))),
        }
    }
}

/// Sub-phase of an in-progress export job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportPhase {
    Generating,
    Bundling,
}

/// One input of a job, labelled at creation time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobItem {
    pub id: ReportId,
    pub display_name: String,
}

impl JobItem {
    pub fn new(id: ReportId, display_name: impl Into<String>) -> Self {
        Self {
            id,
            display_name: display_name.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum ItemResult {
    Completed {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        artifact_ref: Option<ArtifactRef>,
    },
    Failed {
        reason: String,
    },
}

impl ItemResult {
    pub fn completed() -> Self {
        ItemResult::Completed { artifact_ref: None }
    }

    pub fn completed_with(artifact_ref: ArtifactRef) -> Self {
        ItemResult::Completed {
            artifact_ref: Some(artifact_ref),
        }
    }

    pub fn failed(reason: impl Into<String>) -> Self {
        ItemResult::Failed {
            reason: reason.into(),
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, ItemResult::Completed { .. })
    }
}

/// Ledger entry for one processed item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemOutcome {
    pub item_id: ReportId,
    pub display_name: String,
    #[serde(flatten)]
    pub result: ItemResult,
    pub finished_at: DateTime<Utc>,
}

impl ItemOutcome {
    pub fn artifact_ref(&self) -> Option<ArtifactRef> {
        match &self.result {
            ItemResult::Completed { artifact_ref } => *artifact_ref,
            ItemResult::Failed { .. } => None,
        }
    }

    pub fn reason(&self) -> Option<&str> {
        match &self.result {
            ItemResult::Failed { reason } => Some(reason),
            ItemResult::Completed { .. } => None,
        }
    }
}

/// Kind-specific job options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum JobOptions {
    BulkUpdate {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        sections: Option<Vec<String>>,
    },
    BulkExport {
        format: ExportFormat,
        report_type: ReportType,
    },
}

impl JobOptions {
    pub fn bulk_update() -> Self {
        JobOptions::BulkUpdate { sections: None }
    }

    pub fn bulk_export(format: ExportFormat, report_type: ReportType) -> Self {
        JobOptions::BulkExport {
            format,
            report_type,
        }
    }

    pub fn kind(&self) -> JobKind {
        match self {
            JobOptions::BulkUpdate { .. } => JobKind::BulkUpdate,
            JobOptions::BulkExport { .. } => JobKind::BulkExport,
        }
    }

    /// The per-item task handed to the work executor.
    pub fn to_task(&self) -> WorkTask {
        match self {
            JobOptions::BulkUpdate { sections } => WorkTask::Regenerate(RegenerateOptions {
                sections: sections.clone(),
            }),
            JobOptions::BulkExport {
                format,
                report_type,
            } => WorkTask::Export(ExportOptions {
                format: *format,
                report_type: *report_type,
            }),
        }
    }
}

/// Location and lifetime of an assembled export bundle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BundleInfo {
    pub bundle_ref: ArtifactRef,
    pub file_name: String,
    pub content_type: String,
    pub size_bytes: u64,
    pub ready_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl BundleInfo {
    /// The expiry boundary is inclusive.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

/// Mutable state of one bulk job.
///
/// Only the runner and the sweeper move a record through its lifecycle, always via
/// the transition methods below; the cancel flag is the one field callers set
/// directly (through [`JobRecord::request_cancel`]).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    pub id: JobId,
    pub kind: JobKind,
    pub options: JobOptions,
    /// Ordered inputs; never modified after creation.
    pub items: Vec<JobItem>,
    /// Index of the next item to process.
    pub cursor: usize,
    pub status: JobStatus,
    pub phase: Option<ExportPhase>,
    pub completed_items: Vec<ItemOutcome>,
    pub failed_items: Vec<ItemOutcome>,
    pub cancel_requested: bool,
    pub bundle: Option<BundleInfo>,
    /// Set when the orchestration (not an item) failed.
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl JobRecord {
    /// Create a `pending` job.
    ///
    /// Duplicate inputs are dropped, keeping the first occurrence. Empty input is a
    /// validation error.
    pub fn new(options: JobOptions, items: Vec<JobItem>) -> JobResult<Self> {
        let mut seen = HashSet::with_capacity(items.len());
        let items: Vec<JobItem> = items
            .into_iter()
            .filter(|item| seen.insert(item.id))
            .collect();

        if items.is_empty() {
            return Err(JobError::Validation(
                "at least one report id is required".to_string(),
            ));
        }

        let now = Utc::now();
        Ok(Self {
            id: JobId::new(),
            kind: options.kind(),
            options,
            items,
            cursor: 0,
            status: JobStatus::Pending,
            phase: None,
            completed_items: Vec::new(),
            failed_items: Vec::new(),
            cancel_requested: false,
            bundle: None,
            error: None,
            created_at: now,
            started_at: None,
            finished_at: None,
            updated_at: now,
        })
    }

    pub fn input_ids(&self) -> Vec<ReportId> {
        self.items.iter().map(|item| item.id).collect()
    }

    pub fn total_items(&self) -> usize {
        self.items.len()
    }

    pub fn processed_items(&self) -> usize {
        self.completed_items.len() + self.failed_items.len()
    }

    /// `floor(100 * processed / total)`.
    pub fn progress_percent(&self) -> u8 {
        let total = self.items.len();
        if total == 0 {
            return 0;
        }
        ((self.processed_items() * 100) / total) as u8
    }

    /// The item the runner is working on (or about to), while in progress.
    pub fn current_item_id(&self) -> Option<ReportId> {
        if self.status != JobStatus::InProgress {
            return None;
        }
        self.items.get(self.cursor).map(|item| item.id)
    }

    pub fn next_item(&self) -> Option<&JobItem> {
        self.items.get(self.cursor)
    }

    pub fn has_remaining_items(&self) -> bool {
        self.cursor < self.items.len()
    }

    pub fn all_items_failed(&self) -> bool {
        !self.items.is_empty() && self.failed_items.len() == self.items.len()
    }

    pub fn format(&self) -> Option<ExportFormat> {
        match &self.options {
            JobOptions::BulkExport { format, .. } => Some(*format),
            JobOptions::BulkUpdate { .. } => None,
        }
    }

    pub fn report_type(&self) -> Option<ReportType> {
        match &self.options {
            JobOptions::BulkExport { report_type, .. } => Some(*report_type),
            JobOptions::BulkUpdate { .. } => None,
        }
    }

    /// Artifacts produced by completed items, in input order.
    pub fn item_artifact_refs(&self) -> Vec<ArtifactRef> {
        self.completed_items
            .iter()
            .filter_map(ItemOutcome::artifact_ref)
            .collect()
    }

    /// Set the cancel flag. Never changes status.
    pub fn request_cancel(&mut self) -> JobResult<()> {
        if self.status.is_finished() {
            return Err(JobError::Conflict(format!(
                "job {} is already {}",
                self.id, self.status
            )));
        }
        if !self.cancel_requested {
            self.cancel_requested = true;
            self.updated_at = Utc::now();
        }
        Ok(())
    }

    pub fn mark_in_progress(&mut self, now: DateTime<Utc>) -> JobResult<()> {
        self.guard(&[JobStatus::Pending], JobStatus::InProgress)?;
        self.status = JobStatus::InProgress;
        if self.kind == JobKind::BulkExport {
            self.phase = Some(ExportPhase::Generating);
        }
        self.started_at = Some(now);
        self.updated_at = now;
        Ok(())
    }

    /// Append the outcome of the item at `cursor` and advance.
    pub fn record_outcome(&mut self, result: ItemResult, now: DateTime<Utc>) -> JobResult<()> {
        if self.status != JobStatus::InProgress {
            return Err(JobError::Conflict(format!(
                "job {} is {}; outcomes can only be recorded while in_progress",
                self.id, self.status
            )));
        }
        let item = self.items.get(self.cursor).ok_or_else(|| {
            JobError::Conflict(format!("job {} has no item left to record", self.id))
        })?;

        let outcome = ItemOutcome {
            item_id: item.id,
            display_name: item.display_name.clone(),
            result,
            finished_at: now,
        };
        if outcome.result.is_completed() {
            self.completed_items.push(outcome);
        } else {
            self.failed_items.push(outcome);
        }
        self.cursor += 1;
        self.updated_at = now;
        Ok(())
    }

    pub fn mark_bundling(&mut self, now: DateTime<Utc>) -> JobResult<()> {
        self.guard(&[JobStatus::InProgress], JobStatus::InProgress)?;
        if self.kind != JobKind::BulkExport {
            return Err(JobError::Conflict(format!(
                "job {} is not an export job",
                self.id
            )));
        }
        self.phase = Some(ExportPhase::Bundling);
        self.updated_at = now;
        Ok(())
    }

    pub fn mark_completed(&mut self, now: DateTime<Utc>) -> JobResult<()> {
        self.guard(&[JobStatus::InProgress], JobStatus::Completed)?;
        self.finish(JobStatus::Completed, now);
        Ok(())
    }

    pub fn mark_ready(&mut self, bundle: BundleInfo, now: DateTime<Utc>) -> JobResult<()> {
        self.guard(&[JobStatus::InProgress], JobStatus::Ready)?;
        self.bundle = Some(bundle);
        self.finish(JobStatus::Ready, now);
        Ok(())
    }

    pub fn mark_cancelled(&mut self, now: DateTime<Utc>) -> JobResult<()> {
        self.guard(
            &[JobStatus::Pending, JobStatus::InProgress],
            JobStatus::Cancelled,
        )?;
        self.finish(JobStatus::Cancelled, now);
        Ok(())
    }

    /// `error` is set for orchestration failures; `None` means every item failed.
    pub fn mark_failed(&mut self, error: Option<String>, now: DateTime<Utc>) -> JobResult<()> {
        self.guard(
            &[JobStatus::Pending, JobStatus::InProgress],
            JobStatus::Failed,
        )?;
        self.error = error;
        self.finish(JobStatus::Failed, now);
        Ok(())
    }

    /// `ready -> expired`. Returns the bundle whose storage must now be released.
    pub fn mark_expired(&mut self, now: DateTime<Utc>) -> JobResult<Option<BundleInfo>> {
        self.guard(&[JobStatus::Ready], JobStatus::Expired)?;
        self.status = JobStatus::Expired;
        self.updated_at = now;
        Ok(self.bundle.take())
    }

    fn finish(&mut self, status: JobStatus, now: DateTime<Utc>) {
        self.status = status;
        self.phase = None;
        self.finished_at = Some(now);
        self.updated_at = now;
    }

    fn guard(&self, allowed: &[JobStatus], to: JobStatus) -> JobResult<()> {
        if allowed.contains(&self.status) {
            Ok(())
        } else {
            Err(JobError::InvalidTransition {
                from: self.status,
                to,
            })
        }
    }
}


#[cfg(test)]
mod proptests {
    use proptest::prelude::*;

    use super::*;

    proptest! {
        /// Ledger accounting holds after every step, and progress never goes back.
        #[test]
        fn ledger_accounts_for_every_input(
            outcomes in proptest::collection::vec(any::<bool>(), 1..40),
            cancel_at in proptest::option::of(0usize..40),
        ) {
            let items: Vec<JobItem> = outcomes
                .iter()
                .enumerate()
                .map(|(i, _)| JobItem::new(ReportId::new(), format!("C{i}")))
                .collect();
            let total = items.len();
            let mut job = JobRecord::new(JobOptions::bulk_update(), items).unwrap();
            let now = Utc::now();
            job.mark_in_progress(now).unwrap();

            let mut last_progress = 0u8;
            let mut last_cursor = 0usize;
            for (i, ok) in outcomes.iter().enumerate() {
                if cancel_at == Some(i) {
                    job.request_cancel().unwrap();
                }
                if job.cancel_requested && job.has_remaining_items() {
                    job.mark_cancelled(now).unwrap();
                    break;
                }
                let result = if *ok { ItemResult::completed() } else { ItemResult::failed("x") };
                job.record_outcome(result, now).unwrap();

                prop_assert!(job.cursor > last_cursor);
                prop_assert!(job.progress_percent() >= last_progress);
                last_cursor = job.cursor;
                last_progress = job.progress_percent();
                prop_assert_eq!(
                    job.completed_items.len() + job.failed_items.len() + (total - job.cursor),
                    total
                );
            }

            let processed: Vec<ReportId> = job
                .completed_items
                .iter()
                .chain(job.failed_items.iter())
                .map(|o| o.item_id)
                .collect();
            let unique: HashSet<_> = processed.iter().collect();
            prop_assert_eq!(unique.len(), processed.len());
            prop_assert_eq!(processed.len(), job.cursor);
        }
    }
}

//! Lossy broadcast of job progress (realtime push channel).

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;

use assessly_core::{JobId, ReportId};

use super::types::{ExportPhase, JobKind, JobRecord, JobStatus};

const DEFAULT_CAPACITY: usize = 256;

/// Progress notification emitted after every record change made by the runner or
/// the sweeper.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobEvent {
    pub job_id: JobId,
    pub kind: JobKind,
    pub status: JobStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phase: Option<ExportPhase>,
    pub progress_percent: u8,
    pub current_item_id: Option<ReportId>,
    pub at: DateTime<Utc>,
}

impl JobEvent {
    pub fn from_record(record: &JobRecord) -> Self {
        Self {
            job_id: record.id,
            kind: record.kind,
            status: record.status,
            phase: record.phase,
            progress_percent: record.progress_percent(),
            current_item_id: record.current_item_id(),
            at: record.updated_at,
        }
    }

    /// SSE event name, e.g. `job.in_progress`.
    pub fn event_name(&self) -> String {
        format!("job.{}", self.status)
    }
}

/// Broadcast channel for [`JobEvent`]s. Slow subscribers miss events; polling the
/// status endpoint remains authoritative.
#[derive(Debug, Clone)]
pub struct JobEvents {
    tx: broadcast::Sender<JobEvent>,
}

impl JobEvents {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn publish(&self, record: &JobRecord) {
        // No subscribers is not an error.
        let _ = self.tx.send(JobEvent::from_record(record));
    }

    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.tx.subscribe()
    }
}

impl Default for JobEvents {
    fn default() -> Self {
        Self::new()
    }
}

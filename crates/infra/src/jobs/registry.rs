//! Job registry implementations.

use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::Utc;
use serde::Serialize;

use assessly_core::JobId;

use super::error::{JobError, JobResult};
use super::types::{JobKind, JobRecord, JobStatus};

/// Mutation applied by [`JobRegistry::modify`].
pub type JobMutation<'a> = &'a mut (dyn FnMut(&mut JobRecord) -> JobResult<()> + Send);

/// Process-wide store of job records.
///
/// Every read returns a snapshot copy; records are only changed through `modify`
/// (runner, sweeper) and `request_cancel` (callers).
pub trait JobRegistry: Send + Sync {
    /// Insert a new record. Fails with `Conflict` if single-flight is enabled and a
    /// job of the same kind is still active.
    fn create(&self, record: JobRecord) -> JobResult<JobRecord>;

    fn get(&self, job_id: JobId) -> JobResult<JobRecord>;

    /// Pending/in-progress jobs of `kind`, plus not-yet-expired ready exports,
    /// oldest first.
    fn list_active(&self, kind: JobKind) -> JobResult<Vec<JobRecord>>;

    /// All jobs with the given status, oldest first.
    fn list_by_status(&self, status: JobStatus) -> JobResult<Vec<JobRecord>>;

    /// Set the cancel flag. `Conflict` once the job is finished.
    fn request_cancel(&self, job_id: JobId) -> JobResult<JobRecord>;

    /// Atomic read-modify-write. The mutation runs on a copy under the write lock and
    /// is committed only if it returns `Ok`.
    fn modify(&self, job_id: JobId, f: JobMutation<'_>) -> JobResult<JobRecord>;

    /// Returns whether a record was removed.
    fn remove(&self, job_id: JobId) -> JobResult<bool>;

    fn stats(&self) -> JobResult<JobStats>;
}

/// Per-status job counts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct JobStats {
    pub pending: usize,
    pub in_progress: usize,
    pub completed: usize,
    pub cancelled: usize,
    pub failed: usize,
    pub ready: usize,
    pub expired: usize,
    pub total: usize,
}

impl JobStats {
    fn count(&mut self, status: JobStatus) {
        self.total += 1;
        match status {
            JobStatus::Pending => self.pending += 1,
            JobStatus::InProgress => self.in_progress += 1,
            JobStatus::Completed => self.completed += 1,
            JobStatus::Cancelled => self.cancelled += 1,
            JobStatus::Failed => self.failed += 1,
            JobStatus::Ready => self.ready += 1,
            JobStatus::Expired => self.expired += 1,
        }
    }
}

/// In-memory job registry.
#[derive(Debug)]
pub struct InMemoryJobRegistry {
    jobs: RwLock<HashMap<JobId, JobRecord>>,
    single_flight: bool,
}

impl InMemoryJobRegistry {
    pub fn new() -> Self {
        Self {
            jobs: RwLock::new(HashMap::new()),
            single_flight: true,
        }
    }

    pub fn arc() -> Arc<Self> {
        Arc::new(Self::new())
    }

    pub fn with_single_flight(mut self, enabled: bool) -> Self {
        self.single_flight = enabled;
        self
    }

    pub fn single_flight(&self) -> bool {
        self.single_flight
    }

    fn read(&self) -> JobResult<RwLockReadGuard<'_, HashMap<JobId, JobRecord>>> {
        self.jobs
            .read()
            .map_err(|_| JobError::Storage("job registry lock poisoned".to_string()))
    }

    fn write(&self) -> JobResult<RwLockWriteGuard<'_, HashMap<JobId, JobRecord>>> {
        self.jobs
            .write()
            .map_err(|_| JobError::Storage("job registry lock poisoned".to_string()))
    }

    fn sorted(mut records: Vec<JobRecord>) -> Vec<JobRecord> {
        records.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        records
    }
}

impl Default for InMemoryJobRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl JobRegistry for InMemoryJobRegistry {
    fn create(&self, record: JobRecord) -> JobResult<JobRecord> {
        let mut jobs = self.write()?;

        if jobs.contains_key(&record.id) {
            return Err(JobError::Conflict(format!("job {} already exists", record.id)));
        }
        if self.single_flight {
            if let Some(active) = jobs
                .values()
                .find(|j| j.kind == record.kind && j.status.is_active())
            {
                return Err(JobError::Conflict(format!(
                    "a {} job is already running ({})",
                    record.kind, active.id
                )));
            }
        }

        jobs.insert(record.id, record.clone());
        Ok(record)
    }

    fn get(&self, job_id: JobId) -> JobResult<JobRecord> {
        self.read()?
            .get(&job_id)
            .cloned()
            .ok_or(JobError::NotFound(job_id))
    }

    fn list_active(&self, kind: JobKind) -> JobResult<Vec<JobRecord>> {
        let now = Utc::now();
        let jobs = self.read()?;
        let active = jobs
            .values()
            .filter(|j| {
                // Ready bundles past their expiry are hidden before the sweeper gets to them.
                let downloadable = j.status == JobStatus::Ready
                    && j.bundle.as_ref().is_some_and(|b| !b.is_expired_at(now));
                j.kind == kind && (j.status.is_active() || downloadable)
            })
            .cloned()
            .collect();
        Ok(Self::sorted(active))
    }

    fn list_by_status(&self, status: JobStatus) -> JobResult<Vec<JobRecord>> {
        let jobs = self.read()?;
        let matching = jobs
            .values()
            .filter(|j| j.status == status)
            .cloned()
            .collect();
        Ok(Self::sorted(matching))
    }

    fn request_cancel(&self, job_id: JobId) -> JobResult<JobRecord> {
        let mut jobs = self.write()?;
        let job = jobs.get_mut(&job_id).ok_or(JobError::NotFound(job_id))?;
        job.request_cancel()?;
        Ok(job.clone())
    }

    fn modify(&self, job_id: JobId, f: JobMutation<'_>) -> JobResult<JobRecord> {
        let mut jobs = self.write()?;
        let current = jobs.get(&job_id).ok_or(JobError::NotFound(job_id))?;

        let mut next = current.clone();
        f(&mut next)?;
        jobs.insert(job_id, next.clone());
        Ok(next)
    }

    fn remove(&self, job_id: JobId) -> JobResult<bool> {
        Ok(self.write()?.remove(&job_id).is_some())
    }

    fn stats(&self) -> JobResult<JobStats> {
        let jobs = self.read()?;
        let mut stats = JobStats::default();
        for job in jobs.values() {
            stats.count(job.status);
        }
        Ok(stats)
    }
}

impl<R: JobRegistry + ?Sized> JobRegistry for Arc<R> {
    fn create(&self, record: JobRecord) -> JobResult<JobRecord> {
        (**self).create(record)
    }

    fn get(&self, job_id: JobId) -> JobResult<JobRecord> {
        (**self).get(job_id)
    }

    fn list_active(&self, kind: JobKind) -> JobResult<Vec<JobRecord>> {
        (**self).list_active(kind)
    }

    fn list_by_status(&self, status: JobStatus) -> JobResult<Vec<JobRecord>> {
        (**self).list_by_status(status)
    }

    fn request_cancel(&self, job_id: JobId) -> JobResult<JobRecord> {
        (**self).request_cancel(job_id)
    }

    fn modify(&self, job_id: JobId, f: JobMutation<'_>) -> JobResult<JobRecord> {
        (**self).modify(job_id, f)
    }

    fn remove(&self, job_id: JobId) -> JobResult<bool> {
        (**self).remove(job_id)
    }

    fn stats(&self) -> JobResult<JobStats> {
        (**self).stats()
    }
}

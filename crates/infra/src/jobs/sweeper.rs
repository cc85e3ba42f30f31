//! Background expiry of export bundles and pruning of finished jobs.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use assessly_core::JobId;

use super::error::JobResult;
use super::events::JobEvents;
use super::registry::JobRegistry;
use super::types::{BundleInfo, JobStatus};
use crate::artifacts::ArtifactStore;
use crate::config::JobsConfig;

const PRUNABLE: [JobStatus; 4] = [
    JobStatus::Completed,
    JobStatus::Cancelled,
    JobStatus::Failed,
    JobStatus::Expired,
];

/// What one sweep changed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub expired: Vec<JobId>,
    pub pruned: Vec<JobId>,
}

impl SweepReport {
    pub fn is_empty(&self) -> bool {
        self.expired.is_empty() && self.pruned.is_empty()
    }
}

pub struct RetentionSweeper<R: JobRegistry> {
    registry: R,
    artifacts: Arc<dyn ArtifactStore>,
    events: JobEvents,
    finished_job_retention: Duration,
}

impl<R: JobRegistry + 'static> RetentionSweeper<R> {
    pub fn new(registry: R, artifacts: Arc<dyn ArtifactStore>, events: JobEvents) -> Self {
        Self {
            registry,
            artifacts,
            events,
            finished_job_retention: JobsConfig::default().finished_job_retention,
        }
    }

    pub fn with_finished_job_retention(mut self, retention: Duration) -> Self {
        self.finished_job_retention = retention;
        self
    }

    /// Expire due bundles and prune finished jobs past retention.
    ///
    /// Safe to call repeatedly: jobs that are already expired or already removed are
    /// skipped.
    pub fn sweep_once(&self, now: DateTime<Utc>) -> JobResult<SweepReport> {
        let mut report = SweepReport::default();

        for job in self.registry.list_by_status(JobStatus::Ready)? {
            let due = job.bundle.as_ref().is_some_and(|b| b.is_expired_at(now));
            if !due {
                continue;
            }

            let mut released: Option<BundleInfo> = None;
            let record = self.registry.modify(job.id, &mut |job| {
                if job.status != JobStatus::Ready {
                    return Ok(());
                }
                released = job.mark_expired(now)?;
                Ok(())
            })?;

            if let Some(bundle) = released {
                if let Err(e) = self.artifacts.remove(bundle.bundle_ref) {
                    warn!(job_id = %record.id, error = %e, "could not release expired bundle");
                }
                self.events.publish(&record);
                info!(job_id = %record.id, size_bytes = bundle.size_bytes, "export bundle expired");
                report.expired.push(record.id);
            }
        }

        let cutoff = chrono::Duration::from_std(self.finished_job_retention)
            .ok()
            .and_then(|retention| now.checked_sub_signed(retention))
            .unwrap_or(DateTime::<Utc>::MIN_UTC);

        for status in PRUNABLE {
            for job in self.registry.list_by_status(status)? {
                let past_retention = job.finished_at.unwrap_or(job.updated_at) <= cutoff;
                if past_retention && self.registry.remove(job.id)? {
                    debug!(job_id = %job.id, status = %status, "pruned finished job");
                    report.pruned.push(job.id);
                }
            }
        }

        Ok(report)
    }

    /// Sweep every `interval` on a background task until the handle is shut down.
    pub fn spawn(self: Arc<Self>, interval: Duration) -> SweeperHandle {
        let shutdown = Arc::new(Notify::new());
        let signal = Arc::clone(&shutdown);

        let join = tokio::spawn(async move {
            info!(interval_secs = interval.as_secs(), "retention sweeper started");
            // tokio panics on a zero period.
            let mut ticker = tokio::time::interval(interval.max(Duration::from_millis(1)));
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = signal.notified() => break,
                    _ = ticker.tick() => {
                        match self.sweep_once(Utc::now()) {
                            Ok(report) if !report.is_empty() => {
                                info!(
                                    expired = report.expired.len(),
                                    pruned = report.pruned.len(),
                                    "retention sweep finished"
                                );
                            }
                            Ok(_) => {}
                            Err(e) => warn!(error = %e, "retention sweep failed"),
                        }
                    }
                }
            }

            info!("retention sweeper stopped");
        });

        SweeperHandle {
            shutdown,
            join: Some(join),
        }
    }
}

/// Handle to stop a running sweeper.
#[derive(Debug)]
pub struct SweeperHandle {
    shutdown: Arc<Notify>,
    join: Option<JoinHandle<()>>,
}

impl SweeperHandle {
    /// Request shutdown and wait for the sweeper task to stop.
    pub async fn shutdown(mut self) {
        self.shutdown.notify_one();
        if let Some(join) = self.join.take() {
            let _ = join.await;
        }
    }
}

impl Drop for SweeperHandle {
    fn drop(&mut self) {
        if let Some(join) = self.join.take() {
            join.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use assessly_core::{ArtifactRef, ReportId};
    use assessly_work::{ExportFormat, ReportType};

    use super::*;
    use crate::artifacts::{InMemoryArtifactStore, StoredArtifact};
    use crate::jobs::registry::InMemoryJobRegistry;
    use crate::jobs::types::{ItemResult, JobItem, JobOptions, JobRecord};

    struct Fixture {
        registry: Arc<InMemoryJobRegistry>,
        artifacts: Arc<InMemoryArtifactStore>,
        sweeper: RetentionSweeper<Arc<InMemoryJobRegistry>>,
    }

    fn fixture(retention: Duration) -> Fixture {
        let registry = Arc::new(InMemoryJobRegistry::new().with_single_flight(false));
        let artifacts = InMemoryArtifactStore::arc();
        let sweeper = RetentionSweeper::new(registry.clone(), artifacts.clone(), JobEvents::new())
            .with_finished_job_retention(retention);
        Fixture {
            registry,
            artifacts,
            sweeper,
        }
    }

    fn item() -> Vec<JobItem> {
        vec![JobItem::new(ReportId::new(), "Acme")]
    }

    fn ready_export(fx: &Fixture, ready_at: DateTime<Utc>, ttl: chrono::Duration) -> (JobId, ArtifactRef) {
        let job = fx
            .registry
            .create(
                JobRecord::new(
                    JobOptions::bulk_export(ExportFormat::Csv, ReportType::Full),
                    item(),
                )
                .unwrap(),
            )
            .unwrap();
        let bundle_ref = fx
            .artifacts
            .put(StoredArtifact::new("b.bundle", "application/octet-stream", vec![1, 2, 3]))
            .unwrap();
        fx.registry
            .modify(job.id, &mut |job| {
                job.mark_in_progress(ready_at)?;
                job.record_outcome(ItemResult::completed(), ready_at)?;
                job.mark_ready(
                    BundleInfo {
                        bundle_ref,
                        file_name: "b.bundle".into(),
                        content_type: "application/octet-stream".into(),
                        size_bytes: 3,
                        ready_at,
                        expires_at: ready_at + ttl,
                    },
                    ready_at,
                )
            })
            .unwrap();
        (job.id, bundle_ref)
    }

    fn completed_update(fx: &Fixture, finished_at: DateTime<Utc>) -> JobId {
        let job = fx
            .registry
            .create(JobRecord::new(JobOptions::bulk_update(), item()).unwrap())
            .unwrap();
        fx.registry
            .modify(job.id, &mut |job| {
                job.mark_in_progress(finished_at)?;
                job.record_outcome(ItemResult::completed(), finished_at)?;
                job.mark_completed(finished_at)
            })
            .unwrap();
        job.id
    }

    #[test]
    fn due_bundles_expire_and_storage_is_released() {
        let fx = fixture(Duration::from_secs(24 * 3600));
        let t0 = Utc::now();
        let (due, due_ref) = ready_export(&fx, t0, chrono::Duration::minutes(10));
        let (fresh, fresh_ref) = ready_export(&fx, t0, chrono::Duration::hours(2));

        let report = fx.sweeper.sweep_once(t0 + chrono::Duration::hours(1)).unwrap();

        assert_eq!(report.expired, vec![due]);
        let expired = fx.registry.get(due).unwrap();
        assert_eq!(expired.status, JobStatus::Expired);
        assert!(expired.bundle.is_none());
        assert!(fx.artifacts.get(due_ref).unwrap().is_none());

        assert_eq!(fx.registry.get(fresh).unwrap().status, JobStatus::Ready);
        assert!(fx.artifacts.get(fresh_ref).unwrap().is_some());
    }

    #[test]
    fn expiry_boundary_is_inclusive() {
        let fx = fixture(Duration::from_secs(24 * 3600));
        let t0 = Utc::now();
        let (job, _) = ready_export(&fx, t0, chrono::Duration::minutes(1));

        let report = fx.sweeper.sweep_once(t0 + chrono::Duration::minutes(1)).unwrap();
        assert_eq!(report.expired, vec![job]);
    }

    #[test]
    fn sweeping_twice_is_a_no_op() {
        let fx = fixture(Duration::from_secs(24 * 3600));
        let t0 = Utc::now();
        ready_export(&fx, t0, chrono::Duration::minutes(1));
        let later = t0 + chrono::Duration::minutes(5);

        assert_eq!(fx.sweeper.sweep_once(later).unwrap().expired.len(), 1);
        assert!(fx.sweeper.sweep_once(later).unwrap().is_empty());
    }

    #[test]
    fn pruning_removes_only_finished_jobs_past_retention() {
        let fx = fixture(Duration::from_secs(3600));
        let now = Utc::now();

        let old = completed_update(&fx, now - chrono::Duration::hours(2));
        let recent = completed_update(&fx, now - chrono::Duration::minutes(5));
        let running = fx
            .registry
            .create(JobRecord::new(JobOptions::bulk_update(), item()).unwrap())
            .unwrap()
            .id;
        let (ready, _) = ready_export(&fx, now - chrono::Duration::hours(3), chrono::Duration::hours(10));

        let report = fx.sweeper.sweep_once(now).unwrap();

        assert_eq!(report.pruned, vec![old]);
        assert!(fx.registry.get(old).is_err());
        assert!(fx.registry.get(recent).is_ok());
        assert!(fx.registry.get(running).is_ok());
        assert_eq!(fx.registry.get(ready).unwrap().status, JobStatus::Ready);
    }

    #[tokio::test(start_paused = true)]
    async fn spawned_sweeper_runs_until_shutdown() {
        let fx = fixture(Duration::from_secs(24 * 3600));
        let (job, _) = ready_export(
            &fx,
            Utc::now() - chrono::Duration::hours(2),
            chrono::Duration::hours(1),
        );

        let Fixture {
            registry, sweeper, ..
        } = fx;
        let handle = Arc::new(sweeper).spawn(Duration::from_secs(30));
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert_eq!(registry.get(job).unwrap().status, JobStatus::Expired);
        handle.shutdown().await;
    }
}

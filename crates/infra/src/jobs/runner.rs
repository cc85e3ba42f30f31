//! Drives a bulk job through its items.
//!
//! One runner task per job, one item in flight at a time. Each item executes in its
//! own child task so a panicking or hanging worker only costs that item.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use assessly_core::{ArtifactRef, JobId};
use assessly_work::{WorkExecutor, WorkTask};

use super::error::{JobError, JobResult};
use super::events::JobEvents;
use super::registry::JobRegistry;
use super::types::{BundleInfo, ItemResult, JobItem, JobKind, JobRecord};
use crate::artifacts::{ArtifactError, ArtifactStore, BundleAssembler, ManifestBundler};
use crate::config::JobsConfig;

/// Failure reason recorded when an item's worker panics.
pub const PANIC_REASON: &str = "worker crashed while processing this item";

pub struct JobRunner<R: JobRegistry> {
    registry: R,
    artifacts: Arc<dyn ArtifactStore>,
    bundler: Arc<dyn BundleAssembler>,
    executors: HashMap<JobKind, Arc<dyn WorkExecutor>>,
    events: JobEvents,
    item_timeout: Option<Duration>,
    export_ttl: Duration,
}

impl<R: JobRegistry + 'static> JobRunner<R> {
    pub fn new(registry: R, artifacts: Arc<dyn ArtifactStore>, events: JobEvents) -> Self {
        let defaults = JobsConfig::default();
        Self {
            registry,
            artifacts,
            bundler: Arc::new(ManifestBundler::new()),
            executors: HashMap::new(),
            events,
            item_timeout: defaults.item_timeout,
            export_ttl: defaults.export_ttl,
        }
    }

    /// Apply the runner-relevant settings of `config`.
    pub fn configured(mut self, config: &JobsConfig) -> Self {
        self.item_timeout = config.item_timeout;
        self.export_ttl = config.export_ttl;
        self
    }

    pub fn with_bundler(mut self, bundler: Arc<dyn BundleAssembler>) -> Self {
        self.bundler = bundler;
        self
    }

    pub fn with_item_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.item_timeout = timeout;
        self
    }

    pub fn with_export_ttl(mut self, ttl: Duration) -> Self {
        self.export_ttl = ttl;
        self
    }

    /// Register the work executor for a job kind, replacing any previous one.
    pub fn register_executor(&mut self, kind: JobKind, executor: Arc<dyn WorkExecutor>) {
        self.executors.insert(kind, executor);
    }

    pub fn with_executor(mut self, kind: JobKind, executor: Arc<dyn WorkExecutor>) -> Self {
        self.register_executor(kind, executor);
        self
    }

    pub fn registry(&self) -> &R {
        &self.registry
    }

    pub fn artifacts(&self) -> &Arc<dyn ArtifactStore> {
        &self.artifacts
    }

    pub fn events(&self) -> &JobEvents {
        &self.events
    }

    /// Run the job on a background task.
    ///
    /// The runner itself executes on a nested task so that even a defect in the
    /// orchestration (a panic outside per-item isolation) ends with the job `failed`
    /// instead of stuck `in_progress`.
    pub fn spawn(self: &Arc<Self>, job_id: JobId) -> JoinHandle<()> {
        let runner = Arc::clone(self);
        tokio::spawn(async move {
            let inner = {
                let runner = Arc::clone(&runner);
                tokio::spawn(async move { runner.run(job_id).await })
            };

            match inner.await {
                Ok(Ok(record)) => {
                    debug!(job_id = %job_id, status = %record.status, "job runner finished");
                }
                Ok(Err(e)) => {
                    error!(job_id = %job_id, error = %e, "job runner could not finalize job");
                }
                Err(join_err) => {
                    error!(job_id = %job_id, error = %join_err, "job runner task crashed");
                    runner.fail_job(job_id, "job runner crashed unexpectedly".to_string());
                }
            }
        })
    }

    /// Run a `pending` job to completion and return its final snapshot.
    ///
    /// Item failures never surface here; an `Err` means the job could not even be
    /// claimed or marked failed.
    pub async fn run(&self, job_id: JobId) -> JobResult<JobRecord> {
        let record = self
            .registry
            .modify(job_id, &mut |job| job.mark_in_progress(Utc::now()))?;
        self.events.publish(&record);
        info!(
            job_id = %job_id,
            kind = %record.kind,
            items = record.total_items(),
            "job started"
        );

        match self.drive(record).await {
            Ok(record) => Ok(record),
            Err(e) => {
                error!(job_id = %job_id, error = %e, "job orchestration failed");
                self.fail_job(job_id, e.to_string())
                    .ok_or_else(|| JobError::Storage(format!("could not mark job {job_id} failed")))
            }
        }
    }

    async fn drive(&self, record: JobRecord) -> JobResult<JobRecord> {
        let job_id = record.id;
        let executor = self
            .executors
            .get(&record.kind)
            .cloned()
            .ok_or(JobError::NoExecutor(record.kind))?;
        let task = record.options.to_task();

        loop {
            let snapshot = self.registry.get(job_id)?;
            let Some(item) = snapshot.next_item().cloned() else {
                break;
            };

            if snapshot.cancel_requested {
                return self.cancel_job(job_id);
            }

            debug!(
                job_id = %job_id,
                item_id = %item.id,
                position = snapshot.cursor + 1,
                of = snapshot.total_items(),
                executor = executor.name(),
                "processing item"
            );
            let result = self
                .execute_item(Arc::clone(&executor), task.clone(), &item)
                .await;
            if let ItemResult::Failed { reason } = &result {
                warn!(job_id = %job_id, item_id = %item.id, reason = %reason, "item failed");
            }

            let recorded = self
                .registry
                .modify(job_id, &mut |job| job.record_outcome(result.clone(), Utc::now()));
            let record = match recorded {
                Ok(record) => record,
                Err(e) => {
                    if let ItemResult::Completed {
                        artifact_ref: Some(orphan),
                    } = result
                    {
                        self.release(job_id, [orphan]);
                    }
                    return Err(e);
                }
            };
            self.events.publish(&record);
        }

        self.finalize(job_id)
    }

    /// Execute one item on its own task, converting every failure mode into an
    /// [`ItemResult::Failed`].
    async fn execute_item(
        &self,
        executor: Arc<dyn WorkExecutor>,
        task: WorkTask,
        item: &JobItem,
    ) -> ItemResult {
        let report_id = item.id;
        let handle = tokio::spawn(async move { executor.execute(report_id, &task).await });
        let abort = handle.abort_handle();

        let joined = match self.item_timeout {
            Some(limit) => match tokio::time::timeout(limit, handle).await {
                Ok(joined) => joined,
                Err(_) => {
                    abort.abort();
                    return ItemResult::failed(format!("timed out after {limit:?}"));
                }
            },
            None => handle.await,
        };

        match joined {
            Ok(Ok(output)) => match output.artifact {
                Some(artifact) => match self.artifacts.put(artifact.into()) {
                    Ok(artifact_ref) => ItemResult::completed_with(artifact_ref),
                    Err(e) => ItemResult::failed(format!("could not store output: {e}")),
                },
                None => ItemResult::completed(),
            },
            Ok(Err(work_err)) => ItemResult::failed(work_err.to_string()),
            Err(join_err) if join_err.is_panic() => ItemResult::failed(PANIC_REASON),
            Err(_) => ItemResult::failed("worker task was aborted"),
        }
    }

    fn finalize(&self, job_id: JobId) -> JobResult<JobRecord> {
        let snapshot = self.registry.get(job_id)?;

        if snapshot.all_items_failed() {
            let record = self
                .registry
                .modify(job_id, &mut |job| job.mark_failed(None, Utc::now()))?;
            self.events.publish(&record);
            self.release(job_id, record.item_artifact_refs());
            info!(job_id = %job_id, failed = record.failed_items.len(), "job failed: every item failed");
            return Ok(record);
        }

        match snapshot.kind {
            JobKind::BulkUpdate => {
                let record = self
                    .registry
                    .modify(job_id, &mut |job| job.mark_completed(Utc::now()))?;
                self.events.publish(&record);
                info!(
                    job_id = %job_id,
                    completed = record.completed_items.len(),
                    failed = record.failed_items.len(),
                    "job completed"
                );
                Ok(record)
            }
            JobKind::BulkExport => self.bundle(job_id),
        }
    }

    fn bundle(&self, job_id: JobId) -> JobResult<JobRecord> {
        let record = self
            .registry
            .modify(job_id, &mut |job| job.mark_bundling(Utc::now()))?;
        self.events.publish(&record);

        let item_refs = record.item_artifact_refs();
        let mut parts = Vec::with_capacity(item_refs.len());
        for artifact_ref in &item_refs {
            let part = self
                .artifacts
                .get(*artifact_ref)?
                .ok_or(ArtifactError::NotFound(*artifact_ref))?;
            parts.push(part);
        }

        let bundle_name = bundle_name(&record);
        let assembled = self.bundler.assemble(&bundle_name, &parts)?;
        let size_bytes = assembled.artifact.size_bytes();
        let content_type = assembled.artifact.content_type.clone();
        let bundle_ref = self.artifacts.put(assembled.artifact)?;

        let ready_at = Utc::now();
        let info = BundleInfo {
            bundle_ref,
            file_name: assembled.file_name,
            content_type,
            size_bytes,
            ready_at,
            expires_at: expiry(ready_at, self.export_ttl),
        };

        let record = match self
            .registry
            .modify(job_id, &mut |job| job.mark_ready(info.clone(), ready_at))
        {
            Ok(record) => record,
            Err(e) => {
                self.release(job_id, [bundle_ref]);
                return Err(e);
            }
        };
        self.release(job_id, item_refs);
        self.events.publish(&record);

        info!(
            job_id = %job_id,
            completed = record.completed_items.len(),
            failed = record.failed_items.len(),
            size_bytes,
            expires_at = %info.expires_at,
            "export bundle ready"
        );
        Ok(record)
    }

    fn cancel_job(&self, job_id: JobId) -> JobResult<JobRecord> {
        let record = self
            .registry
            .modify(job_id, &mut |job| job.mark_cancelled(Utc::now()))?;
        self.events.publish(&record);
        self.release(job_id, record.item_artifact_refs());
        info!(
            job_id = %job_id,
            processed = record.processed_items(),
            remaining = record.total_items() - record.cursor,
            "job cancelled"
        );
        Ok(record)
    }

    /// Mark the job failed with an orchestration error, keeping its ledger. Returns
    /// `None` if the registry refused the update (already finished, or gone).
    fn fail_job(&self, job_id: JobId, reason: String) -> Option<JobRecord> {
        match self
            .registry
            .modify(job_id, &mut |job| job.mark_failed(Some(reason.clone()), Utc::now()))
        {
            Ok(record) => {
                self.events.publish(&record);
                self.release(job_id, record.item_artifact_refs());
                Some(record)
            }
            Err(e) => {
                error!(job_id = %job_id, error = %e, "could not mark job failed");
                None
            }
        }
    }

    fn release(&self, job_id: JobId, refs: impl IntoIterator<Item = ArtifactRef>) {
        for artifact_ref in refs {
            if let Err(e) = self.artifacts.remove(artifact_ref) {
                warn!(job_id = %job_id, artifact = %artifact_ref, error = %e, "could not release artifact");
            }
        }
    }
}

fn bundle_name(record: &JobRecord) -> String {
    let rendition = record
        .report_type()
        .map(|t| t.as_str().replace('_', "-"))
        .unwrap_or_else(|| "reports".to_string());
    format!(
        "assessly-{}-{}",
        rendition,
        record.created_at.format("%Y%m%d-%H%M%S")
    )
}

/// `ready_at + ttl`, saturating at the largest representable instant.
pub(crate) fn expiry(ready_at: DateTime<Utc>, ttl: Duration) -> DateTime<Utc> {
    chrono::Duration::from_std(ttl)
        .ok()
        .and_then(|ttl| ready_at.checked_add_signed(ttl))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use async_trait::async_trait;

    use assessly_core::ReportId;
    use assessly_work::{ExportFormat, ProducedArtifact, ReportType, WorkError, WorkOutput};

    use super::*;
    use crate::artifacts::{AssembledBundle, InMemoryArtifactStore, StoredArtifact};
    use crate::jobs::registry::InMemoryJobRegistry;
    use crate::jobs::types::{ExportPhase, JobOptions, JobStatus};

    #[derive(Debug, Clone)]
    pub(crate) enum Behavior {
        Succeed,
        Fail(&'static str),
        Panic,
        Hang,
        /// Request cancellation of the job, then succeed.
        CancelJob,
    }

    /// Executor whose per-report behavior is scripted by the test.
    pub(crate) struct ScriptedExecutor {
        behaviors: HashMap<ReportId, Behavior>,
        calls: Mutex<Vec<ReportId>>,
        registry: Arc<InMemoryJobRegistry>,
        job: Mutex<Option<JobId>>,
        produce_artifacts: bool,
    }

    impl ScriptedExecutor {
        pub(crate) fn new(registry: Arc<InMemoryJobRegistry>, produce_artifacts: bool) -> Self {
            Self {
                behaviors: HashMap::new(),
                calls: Mutex::new(Vec::new()),
                registry,
                job: Mutex::new(None),
                produce_artifacts,
            }
        }

        pub(crate) fn on(mut self, id: ReportId, behavior: Behavior) -> Self {
            self.behaviors.insert(id, behavior);
            self
        }

        pub(crate) fn watch(&self, job_id: JobId) {
            *self.job.lock().unwrap() = Some(job_id);
        }

        pub(crate) fn calls(&self) -> Vec<ReportId> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl WorkExecutor for ScriptedExecutor {
        fn name(&self) -> &'static str {
            "scripted"
        }

        async fn execute(&self, report_id: ReportId, _task: &WorkTask) -> Result<WorkOutput, WorkError> {
            self.calls.lock().unwrap().push(report_id);
            match self.behaviors.get(&report_id).cloned().unwrap_or(Behavior::Succeed) {
                Behavior::Succeed => {}
                Behavior::Fail(reason) => return Err(WorkError::Upstream(reason.to_string())),
                Behavior::Panic => panic!("scripted panic"),
                Behavior::Hang => std::future::pending::<()>().await,
                Behavior::CancelJob => {
                    let job_id = self.job.lock().unwrap().expect("watched job");
                    self.registry.request_cancel(job_id).unwrap();
                }
            }
            if self.produce_artifacts {
                Ok(WorkOutput::with_artifact(ProducedArtifact::new(
                    format!("{report_id}.md"),
                    "text/markdown",
                    format!("# {report_id}"),
                )))
            } else {
                Ok(WorkOutput::empty())
            }
        }
    }

    struct BrokenBundler;

    impl BundleAssembler for BrokenBundler {
        fn assemble(&self, _: &str, _: &[StoredArtifact]) -> Result<AssembledBundle, ArtifactError> {
            Err(ArtifactError::Assembly("disk full".to_string()))
        }
    }

    struct Fixture {
        registry: Arc<InMemoryJobRegistry>,
        artifacts: Arc<InMemoryArtifactStore>,
        ids: Vec<ReportId>,
    }

    impl Fixture {
        fn new(n: usize) -> Self {
            Self {
                registry: InMemoryJobRegistry::arc(),
                artifacts: InMemoryArtifactStore::arc(),
                ids: (0..n).map(|_| ReportId::new()).collect(),
            }
        }

        fn runner(&self, kind: JobKind, executor: Arc<ScriptedExecutor>) -> JobRunner<Arc<InMemoryJobRegistry>> {
            JobRunner::new(self.registry.clone(), self.artifacts.clone(), JobEvents::new())
                .with_executor(kind, executor)
        }

        fn create(&self, options: JobOptions) -> JobRecord {
            let items = self
                .ids
                .iter()
                .enumerate()
                .map(|(i, id)| JobItem::new(*id, ["A", "B", "C", "D", "E"][i % 5]))
                .collect();
            self.registry
                .create(JobRecord::new(options, items).unwrap())
                .unwrap()
        }
    }

    fn export() -> JobOptions {
        JobOptions::bulk_export(ExportFormat::Markdown, ReportType::Full)
    }

    fn ids_of(outcomes: &[crate::jobs::types::ItemOutcome]) -> Vec<ReportId> {
        outcomes.iter().map(|o| o.item_id).collect()
    }

    #[tokio::test]
    async fn one_failing_item_does_not_stop_the_job() {
        let fx = Fixture::new(3);
        let (a, b, c) = (fx.ids[0], fx.ids[1], fx.ids[2]);
        let executor = Arc::new(
            ScriptedExecutor::new(fx.registry.clone(), false).on(b, Behavior::Fail("provider down")),
        );
        let runner = fx.runner(JobKind::BulkUpdate, executor.clone());
        let job = fx.create(JobOptions::bulk_update());

        let done = runner.run(job.id).await.unwrap();

        assert_eq!(done.status, JobStatus::Completed);
        assert_eq!(ids_of(&done.completed_items), vec![a, c]);
        assert_eq!(ids_of(&done.failed_items), vec![b]);
        assert_eq!(done.failed_items[0].reason(), Some("analysis provider failed: provider down"));
        assert_eq!(done.progress_percent(), 100);
        assert_eq!(done.current_item_id(), None);
        assert!(done.finished_at.is_some());
        assert_eq!(executor.calls(), vec![a, b, c]);
    }

    #[tokio::test]
    async fn cancel_is_observed_at_the_next_item_boundary() {
        let fx = Fixture::new(3);
        let a = fx.ids[0];
        let executor = Arc::new(ScriptedExecutor::new(fx.registry.clone(), false).on(a, Behavior::CancelJob));
        let runner = fx.runner(JobKind::BulkUpdate, executor.clone());
        let job = fx.create(JobOptions::bulk_update());
        executor.watch(job.id);

        let done = runner.run(job.id).await.unwrap();

        assert_eq!(done.status, JobStatus::Cancelled);
        assert_eq!(ids_of(&done.completed_items), vec![a]);
        assert!(done.failed_items.is_empty());
        assert_eq!(done.cursor, 1);
        assert_eq!(executor.calls(), vec![a]);
    }

    #[tokio::test]
    async fn cancel_during_last_item_still_completes() {
        let fx = Fixture::new(2);
        let b = fx.ids[1];
        let executor = Arc::new(ScriptedExecutor::new(fx.registry.clone(), false).on(b, Behavior::CancelJob));
        let runner = fx.runner(JobKind::BulkUpdate, executor.clone());
        let job = fx.create(JobOptions::bulk_update());
        executor.watch(job.id);

        let done = runner.run(job.id).await.unwrap();

        assert_eq!(done.status, JobStatus::Completed);
        assert!(done.cancel_requested);
        assert_eq!(done.completed_items.len(), 2);
    }

    #[tokio::test]
    async fn every_item_failing_fails_the_job() {
        let fx = Fixture::new(2);
        let executor = Arc::new(
            ScriptedExecutor::new(fx.registry.clone(), false)
                .on(fx.ids[0], Behavior::Fail("x"))
                .on(fx.ids[1], Behavior::Fail("y")),
        );
        let runner = fx.runner(JobKind::BulkUpdate, executor);
        let job = fx.create(JobOptions::bulk_update());

        let done = runner.run(job.id).await.unwrap();

        assert_eq!(done.status, JobStatus::Failed);
        assert_eq!(done.failed_items.len(), 2);
        assert_eq!(done.error, None);
    }

    #[tokio::test(start_paused = true)]
    async fn hanging_item_times_out_and_job_continues() {
        let fx = Fixture::new(2);
        let (a, b) = (fx.ids[0], fx.ids[1]);
        let executor = Arc::new(ScriptedExecutor::new(fx.registry.clone(), false).on(a, Behavior::Hang));
        let runner = fx
            .runner(JobKind::BulkUpdate, executor)
            .with_item_timeout(Some(Duration::from_secs(5)));
        let job = fx.create(JobOptions::bulk_update());

        let done = runner.run(job.id).await.unwrap();

        assert_eq!(done.status, JobStatus::Completed);
        assert_eq!(ids_of(&done.failed_items), vec![a]);
        assert_eq!(done.failed_items[0].reason(), Some("timed out after 5s"));
        assert_eq!(ids_of(&done.completed_items), vec![b]);
    }

    #[tokio::test]
    async fn panicking_item_fails_only_that_item() {
        let fx = Fixture::new(2);
        let (a, b) = (fx.ids[0], fx.ids[1]);
        let executor = Arc::new(ScriptedExecutor::new(fx.registry.clone(), false).on(a, Behavior::Panic));
        let runner = fx.runner(JobKind::BulkUpdate, executor);
        let job = fx.create(JobOptions::bulk_update());

        let done = runner.run(job.id).await.unwrap();

        assert_eq!(done.status, JobStatus::Completed);
        assert_eq!(done.failed_items[0].reason(), Some(PANIC_REASON));
        assert_eq!(ids_of(&done.completed_items), vec![b]);
    }

    #[tokio::test]
    async fn export_bundles_completed_artifacts_and_releases_them() {
        let fx = Fixture::new(3);
        let executor = Arc::new(
            ScriptedExecutor::new(fx.registry.clone(), true).on(fx.ids[1], Behavior::Fail("render")),
        );
        let runner = fx
            .runner(JobKind::BulkExport, executor)
            .with_export_ttl(Duration::from_secs(60));
        let job = fx.create(export());

        let done = runner.run(job.id).await.unwrap();

        assert_eq!(done.status, JobStatus::Ready);
        assert_eq!(done.phase, None);
        let bundle = done.bundle.clone().unwrap();
        assert_eq!(bundle.expires_at - bundle.ready_at, chrono::Duration::seconds(60));
        assert!(bundle.file_name.starts_with("assessly-full-"));

        // Only the bundle remains stored.
        assert_eq!(fx.artifacts.len(), 1);
        let stored = fx.artifacts.get(bundle.bundle_ref).unwrap().unwrap();
        assert_eq!(stored.size_bytes(), bundle.size_bytes);
        let (manifest, _) = ManifestBundler::read_manifest(&stored.bytes).unwrap();
        assert_eq!(manifest.entries.len(), 2);
    }

    #[tokio::test]
    async fn bundle_failure_fails_job_with_ledger_intact() {
        let fx = Fixture::new(2);
        let executor = Arc::new(ScriptedExecutor::new(fx.registry.clone(), true));
        let runner = fx
            .runner(JobKind::BulkExport, executor)
            .with_bundler(Arc::new(BrokenBundler));
        let job = fx.create(export());

        let done = runner.run(job.id).await.unwrap();

        assert_eq!(done.status, JobStatus::Failed);
        assert_eq!(done.completed_items.len(), 2);
        assert!(done.error.as_deref().unwrap().contains("disk full"));
        assert!(done.bundle.is_none());
        assert!(fx.artifacts.is_empty());
    }

    #[tokio::test]
    async fn cancelled_export_releases_item_artifacts() {
        let fx = Fixture::new(3);
        let executor = Arc::new(ScriptedExecutor::new(fx.registry.clone(), true).on(fx.ids[0], Behavior::CancelJob));
        let runner = fx.runner(JobKind::BulkExport, executor.clone());
        let job = fx.create(export());
        executor.watch(job.id);

        let done = runner.run(job.id).await.unwrap();

        assert_eq!(done.status, JobStatus::Cancelled);
        assert_eq!(done.completed_items.len(), 1);
        assert!(fx.artifacts.is_empty());
    }

    #[tokio::test]
    async fn missing_executor_fails_the_job() {
        let fx = Fixture::new(1);
        let executor = Arc::new(ScriptedExecutor::new(fx.registry.clone(), false));
        let runner = fx.runner(JobKind::BulkUpdate, executor);
        let job = fx.create(export());

        let done = runner.run(job.id).await.unwrap();

        assert_eq!(done.status, JobStatus::Failed);
        assert_eq!(done.error.as_deref(), Some("no executor registered for bulk_export jobs"));
        assert_eq!(done.cursor, 0);
    }

    #[tokio::test]
    async fn run_refuses_jobs_that_are_not_pending() {
        let fx = Fixture::new(1);
        let executor = Arc::new(ScriptedExecutor::new(fx.registry.clone(), false));
        let runner = fx.runner(JobKind::BulkUpdate, executor.clone());
        let job = fx.create(JobOptions::bulk_update());

        runner.run(job.id).await.unwrap();
        let err = runner.run(job.id).await.unwrap_err();

        assert!(matches!(err, JobError::InvalidTransition { .. }));
        assert_eq!(executor.calls().len(), 1);
    }

    #[tokio::test]
    async fn spawned_runner_publishes_progress() {
        let fx = Fixture::new(2);
        let executor = Arc::new(ScriptedExecutor::new(fx.registry.clone(), true));
        let runner = Arc::new(fx.runner(JobKind::BulkExport, executor));
        let mut rx = runner.events().subscribe();
        let job = fx.create(export());

        runner.spawn(job.id).await.unwrap();

        let mut seen = Vec::new();
        while let Ok(event) = rx.try_recv() {
            seen.push((event.status, event.phase, event.progress_percent));
        }
        assert_eq!(seen.first(), Some(&(JobStatus::InProgress, Some(ExportPhase::Generating), 0)));
        assert!(seen.contains(&(JobStatus::InProgress, Some(ExportPhase::Generating), 50)));
        assert!(seen.contains(&(JobStatus::InProgress, Some(ExportPhase::Bundling), 100)));
        assert_eq!(seen.last(), Some(&(JobStatus::Ready, None, 100)));
        assert_eq!(fx.registry.get(job.id).unwrap().status, JobStatus::Ready);
    }
}

use std::convert::Infallible;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::response::sse::{Event as SseEvent, KeepAlive, Sse};
use tokio_stream::{StreamExt, wrappers::BroadcastStream};

use assessly_core::JobId;
use assessly_infra::JobsConfig;
use assessly_infra::artifacts::{ArtifactStore, InMemoryArtifactStore};
use assessly_infra::jobs::{
    BulkJobService, InMemoryJobRegistry, JobEvent, JobEvents, JobKind, JobRecord, JobRunner,
    RetentionSweeper, SweeperHandle,
};
use assessly_infra::reports::InMemoryReportStore;
use assessly_work::{LocalAnalysisWorker, LocalExportWorker};

pub type Registry = Arc<InMemoryJobRegistry>;

/// Everything the handlers need, shared behind an `Arc`.
pub struct AppServices {
    reports: Arc<InMemoryReportStore>,
    jobs: BulkJobService<Registry>,
    sweeper: Mutex<Option<SweeperHandle>>,
}

/// In-memory wiring (dev/test): report store, job registry, runner with the local
/// workers, and the retention sweeper.
pub fn build_services(config: &JobsConfig) -> AppServices {
    let reports = InMemoryReportStore::arc();
    let registry: Registry = Arc::new(InMemoryJobRegistry::new().with_single_flight(config.single_flight));
    let artifacts: Arc<dyn ArtifactStore> = InMemoryArtifactStore::arc();
    let events = JobEvents::new();

    let analysis = LocalAnalysisWorker::new(reports.clone(), reports.clone())
        .with_latency(config.worker_latency);
    let export = LocalExportWorker::new(reports.clone()).with_latency(config.worker_latency);

    let runner = JobRunner::new(registry.clone(), artifacts.clone(), events.clone())
        .configured(config)
        .with_executor(JobKind::BulkUpdate, Arc::new(analysis))
        .with_executor(JobKind::BulkExport, Arc::new(export));

    let sweeper = RetentionSweeper::new(registry, artifacts, events)
        .with_finished_job_retention(config.finished_job_retention);
    let sweeper = Arc::new(sweeper).spawn(config.sweep_interval);

    tracing::info!(
        single_flight = config.single_flight,
        poll_interval_ms = config.poll_interval.as_millis() as u64,
        export_ttl_secs = config.export_ttl.as_secs(),
        "job services ready"
    );

    AppServices {
        jobs: BulkJobService::new(Arc::new(runner), reports.clone(), config.poll_interval),
        reports,
        sweeper: Mutex::new(Some(sweeper)),
    }
}

impl AppServices {
    pub fn jobs(&self) -> &BulkJobService<Registry> {
        &self.jobs
    }

    pub fn reports(&self) -> &Arc<InMemoryReportStore> {
        &self.reports
    }

    /// Stop background tasks. Idempotent.
    pub async fn shutdown(&self) {
        let handle = self.sweeper.lock().ok().and_then(|mut guard| guard.take());
        if let Some(handle) = handle {
            handle.shutdown().await;
        }
    }
}

/// SSE stream of progress events for one job (used by `/jobs/:id/events`).
///
/// The current snapshot is sent first so a late subscriber never starts blind.
pub fn job_sse_stream(
    services: Arc<AppServices>,
    current: JobRecord,
) -> Sse<impl tokio_stream::Stream<Item = Result<SseEvent, Infallible>>> {
    let job_id: JobId = current.id;
    let rx = services.jobs().subscribe();

    let initial = tokio_stream::once(Ok::<_, Infallible>(to_sse(&JobEvent::from_record(&current))));
    let updates = BroadcastStream::new(rx).filter_map(move |msg| match msg {
        Ok(event) if event.job_id == job_id => Some(Ok::<_, Infallible>(to_sse(&event))),
        _ => None,
    });

    Sse::new(initial.chain(updates)).keep_alive(KeepAlive::new().interval(Duration::from_secs(15)))
}

fn to_sse(event: &JobEvent) -> SseEvent {
    let data = serde_json::to_string(event).unwrap_or_else(|_| "{}".to_string());
    SseEvent::default().event(event.event_name()).data(data)
}

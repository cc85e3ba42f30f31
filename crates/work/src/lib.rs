//! `assessly-work`
//!
//! **Responsibility:** the per-item unit of work behind a bulk job.
//!
//! The job engine treats everything here as an opaque async operation:
//! - It receives one report id and a [`WorkTask`].
//! - It returns a [`WorkOutput`] (optionally carrying an artifact) or a [`WorkError`]
//!   whose display string is safe to show to users.
//! - It must not touch job state; progress bookkeeping belongs to the runner.

pub mod executor;
pub mod local;
pub mod outcome;
pub mod report;
pub mod task;

pub use executor::WorkExecutor;
pub use local::{LocalAnalysisWorker, LocalExportWorker};
pub use outcome::{ProducedArtifact, WorkError, WorkOutput};
pub use report::{Analysis, AnalysisSink, ReportReader, ReportSnapshot};
pub use task::{ExportFormat, ExportOptions, RegenerateOptions, ReportType, WorkTask};

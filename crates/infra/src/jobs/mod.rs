//! Asynchronous bulk jobs over many reports.
//!
//! ## Design
//!
//! - A job is a tracked batch of per-item work (regenerate analyses, export files)
//! - Items run one at a time; each failure is isolated to its item
//! - Cancellation is cooperative and observed between items
//! - Export bundles expire after a TTL and finished jobs are pruned
//!
//! ## Components
//!
//! - `JobRecord`: mutable job state and its lifecycle rules
//! - `JobRegistry`: process-wide store with single-flight per kind
//! - `JobRunner`: drives one job through its items
//! - `RetentionSweeper`: expires bundles and prunes finished jobs
//! - `BulkJobService`: start/status/cancel/list/download

pub mod error;
pub mod events;
pub mod registry;
pub mod runner;
pub mod service;
pub mod sweeper;
pub mod types;

pub use error::{JobError, JobResult};
pub use events::{JobEvent, JobEvents};
pub use registry::{InMemoryJobRegistry, JobRegistry, JobStats};
pub use runner::JobRunner;
pub use service::{BulkJobService, BundleDownload};
pub use sweeper::{RetentionSweeper, SweepReport, SweeperHandle};
pub use types::{
    BundleInfo, ExportPhase, ItemOutcome, ItemResult, JobItem, JobKind, JobOptions, JobRecord,
    JobStatus,
};

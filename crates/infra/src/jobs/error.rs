use assessly_core::{DomainError, JobId};

use super::types::{JobKind, JobStatus};
use crate::artifacts::ArtifactError;

/// Job subsystem error.
#[derive(Debug, Clone, thiserror::Error)]
pub enum JobError {
    #[error("job not found: {0}")]
    NotFound(JobId),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("job {0} has expired; its export is no longer available")]
    Gone(JobId),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("invalid transition from {from} to {to}")]
    InvalidTransition { from: JobStatus, to: JobStatus },

    #[error("no executor registered for {0} jobs")]
    NoExecutor(JobKind),

    #[error(transparent)]
    Artifact(#[from] ArtifactError),

    #[error("storage error: {0}")]
    Storage(String),
}

impl From<DomainError> for JobError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::Validation(msg) | DomainError::InvalidId(msg) => JobError::Validation(msg),
        }
    }
}

pub type JobResult<T> = Result<T, JobError>;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use assessly_core::ReportId;

/// Bytes produced by a worker for one item (e.g. a rendered report file).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProducedArtifact {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl ProducedArtifact {
    pub fn new(
        file_name: impl Into<String>,
        content_type: impl Into<String>,
        bytes: impl Into<Vec<u8>>,
    ) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: content_type.into(),
            bytes: bytes.into(),
        }
    }

    pub fn size_bytes(&self) -> u64 {
        self.bytes.len() as u64
    }
}

/// Successful result of one unit of work.
///
/// Regeneration usually produces no artifact; exports always do.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkOutput {
    pub artifact: Option<ProducedArtifact>,
}

impl WorkOutput {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_artifact(artifact: ProducedArtifact) -> Self {
        Self {
            artifact: Some(artifact),
        }
    }
}

/// Failure of one unit of work.
///
/// The display string is recorded verbatim as the item's failure reason, so keep
/// messages short and user-readable.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum WorkError {
    #[error("report {0} no longer exists")]
    ReportNotFound(ReportId),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("not supported: {0}")]
    Unsupported(String),

    #[error("analysis provider failed: {0}")]
    Upstream(String),

    #[error("rendering failed: {0}")]
    Render(String),

    #[error("internal error: {0}")]
    Internal(String),
}

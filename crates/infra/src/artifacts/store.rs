//! Artifact storage implementations.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};

use assessly_core::ArtifactRef;
use assessly_work::ProducedArtifact;

/// Bytes held by an [`ArtifactStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredArtifact {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
    pub stored_at: DateTime<Utc>,
}

impl StoredArtifact {
    pub fn new(
        file_name: impl Into<String>,
        content_type: impl Into<String>,
        bytes: Vec<u8>,
    ) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: content_type.into(),
            bytes,
            stored_at: Utc::now(),
        }
    }

    pub fn size_bytes(&self) -> u64 {
        self.bytes.len() as u64
    }
}

impl From<ProducedArtifact> for StoredArtifact {
    fn from(value: ProducedArtifact) -> Self {
        Self::new(value.file_name, value.content_type, value.bytes)
    }
}

/// Artifact store error.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ArtifactError {
    #[error("artifact not found: {0}")]
    NotFound(ArtifactRef),
    #[error("bundle assembly failed: {0}")]
    Assembly(String),
    #[error("storage error: {0}")]
    Storage(String),
}

/// Keyed byte storage.
///
/// `remove` must be idempotent: releasing an already released artifact is not an
/// error.
pub trait ArtifactStore: Send + Sync {
    fn put(&self, artifact: StoredArtifact) -> Result<ArtifactRef, ArtifactError>;

    fn get(&self, artifact_ref: ArtifactRef) -> Result<Option<StoredArtifact>, ArtifactError>;

    /// Release an artifact. Returns whether anything was removed.
    fn remove(&self, artifact_ref: ArtifactRef) -> Result<bool, ArtifactError>;

    /// Total bytes currently held.
    fn total_bytes(&self) -> Result<u64, ArtifactError>;
}

/// In-memory artifact store for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryArtifactStore {
    inner: RwLock<HashMap<ArtifactRef, StoredArtifact>>,
}

impl InMemoryArtifactStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arc() -> Arc<Self> {
        Arc::new(Self::new())
    }

    pub fn len(&self) -> usize {
        self.inner.read().map(|m| m.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn poisoned<T>(_: T) -> ArtifactError {
    ArtifactError::Storage("artifact store lock poisoned".to_string())
}

impl ArtifactStore for InMemoryArtifactStore {
    fn put(&self, artifact: StoredArtifact) -> Result<ArtifactRef, ArtifactError> {
        let artifact_ref = ArtifactRef::new();
        self.inner
            .write()
            .map_err(poisoned)?
            .insert(artifact_ref, artifact);
        Ok(artifact_ref)
    }

    fn get(&self, artifact_ref: ArtifactRef) -> Result<Option<StoredArtifact>, ArtifactError> {
        Ok(self.inner.read().map_err(poisoned)?.get(&artifact_ref).cloned())
    }

    fn remove(&self, artifact_ref: ArtifactRef) -> Result<bool, ArtifactError> {
        Ok(self
            .inner
            .write()
            .map_err(poisoned)?
            .remove(&artifact_ref)
            .is_some())
    }

    fn total_bytes(&self) -> Result<u64, ArtifactError> {
        Ok(self
            .inner
            .read()
            .map_err(poisoned)?
            .values()
            .map(StoredArtifact::size_bytes)
            .sum())
    }
}

impl<S: ArtifactStore + ?Sized> ArtifactStore for Arc<S> {
    fn put(&self, artifact: StoredArtifact) -> Result<ArtifactRef, ArtifactError> {
        (**self).put(artifact)
    }

    fn get(&self, artifact_ref: ArtifactRef) -> Result<Option<StoredArtifact>, ArtifactError> {
        (**self).get(artifact_ref)
    }

    fn remove(&self, artifact_ref: ArtifactRef) -> Result<bool, ArtifactError> {
        (**self).remove(artifact_ref)
    }

    fn total_bytes(&self) -> Result<u64, ArtifactError> {
        (**self).total_bytes()
    }
}

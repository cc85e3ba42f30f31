//! `assessly-core`: shared identifiers and error primitives.
//!
//! This crate has no infrastructure concerns; every other crate in the workspace
//! depends on it for the ids that cross crate boundaries.

pub mod error;
pub mod id;

pub use error::{DomainError, DomainResult};
pub use id::{ArtifactRef, JobId, ReportId};

//! Infrastructure layer: job orchestration, artifact storage, report storage, config.

pub mod artifacts;
pub mod config;
pub mod jobs;
pub mod reports;

pub use config::JobsConfig;

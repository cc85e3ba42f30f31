//! Report records backing the local work executors.

pub mod store;

pub use store::{InMemoryReportStore, NewReport};

//! Storage for per-item artifacts and assembled export bundles.

pub mod bundle;
pub mod store;

pub use bundle::{AssembledBundle, BundleAssembler, BundleEntry, BundleManifest, ManifestBundler};
pub use store::{ArtifactError, ArtifactStore, InMemoryArtifactStore, StoredArtifact};

//! Bundling of per-item export artifacts into one downloadable file.
//!
//! The default [`ManifestBundler`] writes a single JSON manifest line followed by the
//! concatenated artifact bytes. Each manifest entry records the byte offset (relative
//! to the end of the manifest line) and length of one file, so clients can split the
//! payload without a streaming parser.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use super::store::{ArtifactError, StoredArtifact};

pub const MANIFEST_FORMAT: &str = "assessly-bundle/1";
pub const BUNDLE_CONTENT_TYPE: &str = "application/vnd.assessly.bundle";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BundleEntry {
    pub file_name: String,
    pub content_type: String,
    pub offset: u64,
    pub length: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BundleManifest {
    pub format: String,
    pub entries: Vec<BundleEntry>,
}

/// A bundle ready to be handed to an [`super::ArtifactStore`].
#[derive(Debug, Clone)]
pub struct AssembledBundle {
    pub file_name: String,
    pub manifest: BundleManifest,
    pub artifact: StoredArtifact,
}

/// Combines several artifacts into one.
pub trait BundleAssembler: Send + Sync {
    /// `bundle_name` is the stem of the produced file (no extension).
    fn assemble(
        &self,
        bundle_name: &str,
        parts: &[StoredArtifact],
    ) -> Result<AssembledBundle, ArtifactError>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ManifestBundler;

impl ManifestBundler {
    pub fn new() -> Self {
        Self
    }

    /// Split a bundle produced by [`ManifestBundler`] back into its manifest and
    /// payload section.
    pub fn read_manifest(bytes: &[u8]) -> Result<(BundleManifest, &[u8]), ArtifactError> {
        let newline = bytes
            .iter()
            .position(|b| *b == b'\n')
            .ok_or_else(|| ArtifactError::Assembly("bundle has no manifest line".to_string()))?;
        let manifest: BundleManifest = serde_json::from_slice(&bytes[..newline])
            .map_err(|e| ArtifactError::Assembly(format!("invalid bundle manifest: {e}")))?;
        Ok((manifest, &bytes[newline + 1..]))
    }
}

impl BundleAssembler for ManifestBundler {
    fn assemble(
        &self,
        bundle_name: &str,
        parts: &[StoredArtifact],
    ) -> Result<AssembledBundle, ArtifactError> {
        if parts.is_empty() {
            return Err(ArtifactError::Assembly(
                "nothing to bundle: no artifacts were produced".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        let mut entries = Vec::with_capacity(parts.len());
        let mut payload = Vec::with_capacity(parts.iter().map(|p| p.bytes.len()).sum());

        for part in parts {
            let file_name = unique_name(&mut seen, &part.file_name);
            entries.push(BundleEntry {
                file_name,
                content_type: part.content_type.clone(),
                offset: payload.len() as u64,
                length: part.size_bytes(),
            });
            payload.extend_from_slice(&part.bytes);
        }

        let manifest = BundleManifest {
            format: MANIFEST_FORMAT.to_string(),
            entries,
        };
        let mut bytes = serde_json::to_vec(&manifest)
            .map_err(|e| ArtifactError::Assembly(format!("manifest serialization: {e}")))?;
        bytes.push(b'\n');
        bytes.extend_from_slice(&payload);

        let file_name = format!("{bundle_name}.bundle");
        Ok(AssembledBundle {
            artifact: StoredArtifact::new(file_name.clone(), BUNDLE_CONTENT_TYPE, bytes),
            file_name,
            manifest,
        })
    }
}

fn unique_name(seen: &mut HashSet<String>, name: &str) -> String {
    if seen.insert(name.to_string()) {
        return name.to_string();
    }

    let (stem, ext) = match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => (stem, Some(ext)),
        _ => (name, None),
    };
    let mut n = 2;
    loop {
        let candidate = match ext {
            Some(ext) => format!("{stem}-{n}.{ext}"),
            None => format!("{stem}-{n}"),
        };
        if seen.insert(candidate.clone()) {
            return candidate;
        }
        n += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn part(name: &str, body: &str) -> StoredArtifact {
        StoredArtifact::new(name, "text/markdown", body.as_bytes().to_vec())
    }

    #[test]
    fn manifest_offsets_locate_each_file() {
        let bundle = ManifestBundler
            .assemble("export", &[part("a.md", "# A"), part("b.md", "# Bee")])
            .unwrap();
        assert_eq!(bundle.file_name, "export.bundle");

        let (manifest, payload) = ManifestBundler::read_manifest(&bundle.artifact.bytes).unwrap();
        assert_eq!(manifest, bundle.manifest);
        assert_eq!(manifest.entries.len(), 2);

        let b = &manifest.entries[1];
        let start = b.offset as usize;
        let end = start + b.length as usize;
        assert_eq!(&payload[start..end], b"# Bee");
    }

    #[test]
    fn duplicate_file_names_are_disambiguated() {
        let bundle = ManifestBundler
            .assemble(
                "export",
                &[part("acme-full.md", "1"), part("acme-full.md", "2"), part("acme-full.md", "3")],
            )
            .unwrap();
        let names: Vec<_> = bundle
            .manifest
            .entries
            .iter()
            .map(|e| e.file_name.as_str())
            .collect();
        assert_eq!(names, vec!["acme-full.md", "acme-full-2.md", "acme-full-3.md"]);
    }

    #[test]
    fn empty_input_is_an_assembly_error() {
        let err = ManifestBundler.assemble("export", &[]).unwrap_err();
        assert!(matches!(err, ArtifactError::Assembly(_)));
    }
}

//! Build artifact fingerprints and change detection.

mod diff;
mod kind;
mod store;

pub use diff::diff;
pub use kind::ResourceKind;
pub use store::{hash_file, normalize_resource_path, ArtifactStore, FingerprintAlgorithm};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// One compiled output file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildArtifact {
    pub engine_resource_path: String,
    pub compiled_file_path: String,
    pub fingerprint: String,
}

impl BuildArtifact {
    pub fn kind(&self) -> ResourceKind {
        ResourceKind::from_path(&self.engine_resource_path)
    }
}

/// Every artifact found under a build root, keyed by engine resource path.
/// Iteration follows insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArtifactSnapshot {
    entries: IndexMap<String, BuildArtifact>,
}

impl ArtifactSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an artifact, replacing any previous entry with the same resource path.
    /// The replaced entry is returned; it keeps its original position.
    pub fn insert(&mut self, artifact: BuildArtifact) -> Option<BuildArtifact> {
        self.entries.insert(artifact.engine_resource_path.clone(), artifact)
    }

    pub fn get(&self, engine_resource_path: &str) -> Option<&BuildArtifact> {
        self.entries.get(engine_resource_path)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &BuildArtifact> {
        self.entries.values()
    }
}

impl FromIterator<BuildArtifact> for ArtifactSnapshot {
    fn from_iter<I: IntoIterator<Item = BuildArtifact>>(iter: I) -> Self {
        let mut snap = ArtifactSnapshot::new();
        for a in iter {
            snap.insert(a);
        }
        snap
    }
}

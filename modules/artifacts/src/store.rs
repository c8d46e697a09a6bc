use crate::{ArtifactSnapshot, BuildArtifact};
use reload_core::ReloadError;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Build target directory that the engine addresses without a prefix.
const DEFAULT_TARGET_SEGMENT: &str = "default";

/// Content hash used for artifact fingerprints.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FingerprintAlgorithm {
    #[default]
    Blake3,
    Sha256,
}

/// Lowercase hex digest of the file's bytes.
pub fn hash_file(path: &Path, algorithm: FingerprintAlgorithm) -> std::io::Result<String> {
    let f = File::open(path)?;
    let mut reader = BufReader::new(f);
    let mut buf = [0u8; 8192];
    match algorithm {
        FingerprintAlgorithm::Blake3 => {
            let mut h = blake3::Hasher::new();
            loop {
                let n = reader.read(&mut buf)?;
                if n == 0 { break; }
                h.update(&buf[..n]);
            }
            Ok(h.finalize().to_hex().to_string())
        }
        FingerprintAlgorithm::Sha256 => {
            let mut h = Sha256::new();
            loop {
                let n = reader.read(&mut buf)?;
                if n == 0 { break; }
                h.update(&buf[..n]);
            }
            Ok(hex::encode(h.finalize()))
        }
    }
}

/// Turn a build-relative path into the engine-facing resource path.
///
/// Only a bare `default` first segment is dropped; platform qualified
/// variants such as `/x86_64-osx/default/...` keep their prefix.
pub fn normalize_resource_path(path: &str) -> String {
    let trimmed = path.trim_start_matches('/');
    let rest = match trimmed.split_once('/') {
        Some((first, rest)) if first == DEFAULT_TARGET_SEGMENT => rest,
        _ => trimmed,
    };
    format!("/{}", rest)
}

/// Scans a build output directory into an [`ArtifactSnapshot`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ArtifactStore {
    algorithm: FingerprintAlgorithm,
}

impl ArtifactStore {
    pub fn new(algorithm: FingerprintAlgorithm) -> Self {
        ArtifactStore { algorithm }
    }

    /// Fingerprint every regular file under `build_root`.
    ///
    /// Files that cannot be read are skipped with a warning; a missing root
    /// produces an empty snapshot.
    pub fn refresh(&self, build_root: &Path) -> ArtifactSnapshot {
        let mut snap = ArtifactSnapshot::new();
        if !build_root.is_dir() {
            warn!(root = %build_root.display(), "build output directory does not exist");
            return snap;
        }
        for entry in WalkDir::new(build_root).follow_links(false).sort_by_file_name() {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    warn!(error = %e, "skipping unreadable build entry");
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            let Ok(rel) = entry.path().strip_prefix(build_root) else { continue };
            let compiled = rel.components().map(|c| c.as_os_str().to_string_lossy()).collect::<Vec<_>>().join("/");
            let fingerprint = match hash_file(entry.path(), self.algorithm) {
                Ok(fp) => fp,
                Err(source) => {
                    let err = ReloadError::PartialRead { path: entry.path().to_path_buf(), source };
                    warn!("{}", err);
                    continue;
                }
            };
            let replaced = snap.insert(BuildArtifact {
                engine_resource_path: normalize_resource_path(&compiled),
                compiled_file_path: compiled,
                fingerprint,
            });
            if let Some(old) = replaced {
                let kept = snap.get(&old.engine_resource_path).map(|a| a.compiled_file_path.as_str()).unwrap_or_default();
                warn!(
                    resource = %old.engine_resource_path,
                    dropped = %old.compiled_file_path,
                    kept,
                    "two compiled files map to the same resource path"
                );
            }
        }
        debug!(root = %build_root.display(), artifacts = snap.len(), "build output scanned");
        snap
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write(root: &Path, rel: &str, body: &[u8]) {
        let p = root.join(rel);
        fs::create_dir_all(p.parent().unwrap()).unwrap();
        fs::write(p, body).unwrap();
    }

    #[test]
    fn normalization_strips_only_bare_default() {
        assert_eq!(normalize_resource_path("/default/stars/factory.scriptc"), "/stars/factory.scriptc");
        assert_eq!(normalize_resource_path("default/stars/factory.scriptc"), "/stars/factory.scriptc");
        assert_eq!(
            normalize_resource_path("/x86_64-osx/default/stars/factory.scriptc"),
            "/x86_64-osx/default/stars/factory.scriptc"
        );
        assert_eq!(normalize_resource_path("/assets/tiles/tilemap.gui_scriptc"), "/assets/tiles/tilemap.gui_scriptc");
        assert_eq!(normalize_resource_path("/defaults/a.lua"), "/defaults/a.lua");
    }

    #[test]
    fn normalization_is_stable_on_normalized_paths() {
        for p in ["/default/stars/factory.scriptc", "/x86_64-osx/default/stars/factory.scriptc", "/assets/tiles/tilemap.gui_scriptc"] {
            let once = normalize_resource_path(p);
            assert_eq!(normalize_resource_path(&once), once);
        }
    }

    #[test]
    fn hashes_are_stable_and_content_sensitive() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "a.bin", b"hello");
        write(dir.path(), "b.bin", b"hello");
        write(dir.path(), "c.bin", b"hellp");
        for algo in [FingerprintAlgorithm::Blake3, FingerprintAlgorithm::Sha256] {
            let a = hash_file(&dir.path().join("a.bin"), algo).unwrap();
            let b = hash_file(&dir.path().join("b.bin"), algo).unwrap();
            let c = hash_file(&dir.path().join("c.bin"), algo).unwrap();
            assert_eq!(a, b);
            assert_ne!(a, c);
            assert!(a.chars().all(|ch| ch.is_ascii_hexdigit() && !ch.is_ascii_uppercase()));
        }
    }

    #[test]
    fn sha256_matches_known_digest() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "x", b"abc");
        let fp = hash_file(&dir.path().join("x"), FingerprintAlgorithm::Sha256).unwrap();
        assert_eq!(fp, "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad");
    }

    #[test]
    fn refresh_maps_compiled_files_to_resource_paths() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "default/stars/factory.scriptc", b"s1");
        write(dir.path(), "default/main/atlas.texturec", b"t1");
        write(dir.path(), "x86_64-osx/default/stars/factory.scriptc", b"s1");
        let snap = ArtifactStore::default().refresh(dir.path());
        assert_eq!(snap.len(), 3);
        let a = snap.get("/stars/factory.scriptc").unwrap();
        assert_eq!(a.compiled_file_path, "default/stars/factory.scriptc");
        assert!(snap.get("/main/atlas.texturec").is_some());
        assert!(snap.get("/x86_64-osx/default/stars/factory.scriptc").is_some());
    }

    #[test]
    fn refresh_order_is_deterministic() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "default/b.lua", b"b");
        write(dir.path(), "default/a.lua", b"a");
        let store = ArtifactStore::default();
        let first: Vec<_> = store.refresh(dir.path()).iter().map(|a| a.engine_resource_path.clone()).collect();
        let second: Vec<_> = store.refresh(dir.path()).iter().map(|a| a.engine_resource_path.clone()).collect();
        assert_eq!(first, vec!["/a.lua", "/b.lua"]);
        assert_eq!(first, second);
    }

    #[test]
    fn colliding_resource_paths_keep_the_later_file() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "a.lua", b"top");
        write(dir.path(), "default/a.lua", b"nested");
        let snap = ArtifactStore::default().refresh(dir.path());
        assert_eq!(snap.len(), 1);
        assert_eq!(snap.get("/a.lua").unwrap().compiled_file_path, "default/a.lua");
    }

    #[test]
    fn missing_root_gives_empty_snapshot() {
        let dir = TempDir::new().unwrap();
        let snap = ArtifactStore::default().refresh(&dir.path().join("build"));
        assert!(snap.is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn unreadable_file_is_skipped() {
        use std::os::unix::fs::PermissionsExt;
        let dir = TempDir::new().unwrap();
        write(dir.path(), "default/ok.scriptc", b"ok");
        write(dir.path(), "default/locked.scriptc", b"no");
        let locked = dir.path().join("default/locked.scriptc");
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();
        // root ignores permission bits
        if File::open(&locked).is_ok() {
            return;
        }
        let snap = ArtifactStore::default().refresh(dir.path());
        assert!(snap.get("/ok.scriptc").is_some());
        assert!(snap.get("/locked.scriptc").is_none());
    }
}

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

use crate::api::Snapshot;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("invalid node name {0:?}")]
    InvalidNode(String),
    #[error("no snapshot stored for node {0:?}")]
    NotFound(String),
    #[error("i/o error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("invalid snapshot in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Directory of `<node>.json` snapshots with an optional fallback file.
///
/// The fallback is served for nodes that have no file of their own.
#[derive(Debug, Clone)]
pub struct FileSnapshotStore {
    dir: PathBuf,
    fallback: Option<PathBuf>,
}

impl FileSnapshotStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            fallback: None,
        }
    }

    pub fn with_fallback(mut self, fallback: impl Into<PathBuf>) -> Self {
        self.fallback = Some(fallback.into());
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the snapshot file for `node_name`.
    pub fn path_for(&self, node_name: &str) -> Result<PathBuf, StoreError> {
        let node = validate_node(node_name)?;
        Ok(self.dir.join(format!("{}.json", node)))
    }

    /// Loads the snapshot stored for `node_name`, or the fallback.
    pub fn load(&self, node_name: &str) -> Result<Snapshot, StoreError> {
        let path = self.path_for(node_name)?;
        match fs::read(&path) {
            Ok(bytes) => return parse(&path, &bytes),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(source) => return Err(StoreError::Io { path, source }),
        }

        let Some(fallback) = &self.fallback else {
            return Err(StoreError::NotFound(node_name.trim().to_string()));
        };
        debug!(node = node_name, fallback = %fallback.display(), "serving fallback snapshot");
        let bytes = fs::read(fallback).map_err(|source| StoreError::Io {
            path: fallback.clone(),
            source,
        })?;
        parse(fallback, &bytes)
    }

    /// Writes `snapshot` as `<dir>/<nodeName>.json`, replacing any previous
    /// file atomically.
    pub fn save(&self, snapshot: &Snapshot) -> Result<PathBuf, StoreError> {
        let path = self.path_for(&snapshot.metadata.node_name)?;
        fs::create_dir_all(&self.dir).map_err(io_err(&self.dir))?;

        let json = serde_json::to_vec_pretty(snapshot).map_err(|source| StoreError::Json {
            path: path.clone(),
            source,
        })?;

        let tmp_path = path.with_extension("json.tmp");
        {
            let mut file = fs::File::create(&tmp_path).map_err(io_err(&tmp_path))?;
            file.write_all(&json).map_err(io_err(&tmp_path))?;
            file.sync_all().map_err(io_err(&tmp_path))?;
        }
        fs::rename(&tmp_path, &path).map_err(io_err(&path))?;

        debug!(path = %path.display(), bytes = json.len(), "snapshot saved");
        Ok(path)
    }
}

fn io_err(path: &Path) -> impl FnOnce(io::Error) -> StoreError {
    let path = path.to_path_buf();
    move |source| StoreError::Io { path, source }
}

fn validate_node(node_name: &str) -> Result<&str, StoreError> {
    let node = node_name.trim();
    if node.is_empty()
        || node == "."
        || node.contains("..")
        || node.contains('/')
        || node.contains('\\')
        || node.contains('\0')
    {
        return Err(StoreError::InvalidNode(node_name.to_string()));
    }
    Ok(node)
}

fn parse(path: &Path, bytes: &[u8]) -> Result<Snapshot, StoreError> {
    serde_json::from_slice(bytes).map_err(|source| StoreError::Json {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use tempfile::TempDir;

    use super::*;
    use crate::api::{Metadata, SCHEMA_VERSION, SourceHealth};

    fn snapshot(node: &str) -> Snapshot {
        Snapshot {
            metadata: Metadata {
                schema_version: SCHEMA_VERSION.to_string(),
                generated_at: Utc::now(),
                source_health: SourceHealth::Healthy,
                node_name: node.to_string(),
            },
            nodes: Vec::new(),
            edges: Vec::new(),
            groups: Vec::new(),
            warnings: Vec::new(),
        }
    }

    #[test]
    fn test_save_then_load() {
        let dir = TempDir::new().unwrap();
        let store = FileSnapshotStore::new(dir.path().join("fixtures"));

        let saved = snapshot("worker-1");
        let path = store.save(&saved).unwrap();
        assert_eq!(path, dir.path().join("fixtures").join("worker-1.json"));
        assert!(!path.with_extension("json.tmp").exists());

        assert_eq!(store.load("worker-1").unwrap(), saved);
        // Surrounding whitespace is not part of the name.
        assert_eq!(store.load(" worker-1 ").unwrap(), saved);
    }

    #[test]
    fn test_unknown_node_without_fallback() {
        let dir = TempDir::new().unwrap();
        let store = FileSnapshotStore::new(dir.path());
        assert!(matches!(store.load("worker-2"), Err(StoreError::NotFound(_))));
    }

    #[test]
    fn test_unknown_node_uses_fallback() {
        let dir = TempDir::new().unwrap();
        let fallback = dir.path().join("default.json");
        fs::write(&fallback, serde_json::to_vec(&snapshot("sample")).unwrap()).unwrap();

        let store = FileSnapshotStore::new(dir.path()).with_fallback(&fallback);
        let loaded = store.load("worker-2").unwrap();
        assert_eq!(loaded.metadata.node_name, "sample");
    }

    #[test]
    fn test_node_file_preferred_over_fallback() {
        let dir = TempDir::new().unwrap();
        let fallback = dir.path().join("default.json");
        fs::write(&fallback, serde_json::to_vec(&snapshot("sample")).unwrap()).unwrap();

        let store = FileSnapshotStore::new(dir.path()).with_fallback(&fallback);
        store.save(&snapshot("worker-1")).unwrap();
        assert_eq!(store.load("worker-1").unwrap().metadata.node_name, "worker-1");
    }

    #[test]
    fn test_path_traversal_rejected() {
        let dir = TempDir::new().unwrap();
        let store = FileSnapshotStore::new(dir.path());

        for node in ["../etc/passwd", "a/b", "..", "a\\b", "  "] {
            assert!(
                matches!(store.load(node), Err(StoreError::InvalidNode(_))),
                "{node:?} accepted"
            );
        }
        assert!(matches!(
            store.save(&snapshot("../escape")),
            Err(StoreError::InvalidNode(_))
        ));
    }

    #[test]
    fn test_corrupt_file_reports_json_error() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("worker-1.json"), b"{not json").unwrap();

        let store = FileSnapshotStore::new(dir.path());
        assert!(matches!(store.load("worker-1"), Err(StoreError::Json { .. })));
    }
}

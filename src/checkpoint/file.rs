//! JSON file checkpoint store

use crate::checkpoint::{
    Checkpoint, CheckpointError, CheckpointResult, CheckpointStore, CHECKPOINT_SCHEMA_VERSION,
};
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Stores the checkpoint as pretty-printed JSON
///
/// Writes go to a temporary file in the same directory which is synced and
/// then renamed over the checkpoint, so readers see either the old or the new
/// content.
#[derive(Debug, Clone)]
pub struct FileCheckpointStore {
    path: PathBuf,
}

impl FileCheckpointStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn display_path(&self) -> String {
        self.path.display().to_string()
    }

    fn parent_dir(&self) -> PathBuf {
        match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            _ => PathBuf::from("."),
        }
    }
}

impl CheckpointStore for FileCheckpointStore {
    fn load(&self) -> CheckpointResult<Option<Checkpoint>> {
        let content = match std::fs::read(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("No checkpoint at {}", self.path.display());
                return Ok(None);
            }
            Err(source) => {
                return Err(CheckpointError::Io {
                    path: self.display_path(),
                    source,
                })
            }
        };

        let checkpoint: Checkpoint = match serde_json::from_slice(&content) {
            Ok(checkpoint) => checkpoint,
            Err(e) => {
                tracing::warn!(
                    "Ignoring unreadable checkpoint {}: {}",
                    self.path.display(),
                    e
                );
                return Ok(None);
            }
        };

        if checkpoint.schema_version != CHECKPOINT_SCHEMA_VERSION {
            tracing::warn!(
                "Ignoring checkpoint {} with schema version {} (expected {})",
                self.path.display(),
                checkpoint.schema_version,
                CHECKPOINT_SCHEMA_VERSION
            );
            return Ok(None);
        }

        Ok(Some(checkpoint))
    }

    fn save(&self, checkpoint: &Checkpoint) -> CheckpointResult<()> {
        let dir = self.parent_dir();
        std::fs::create_dir_all(&dir).map_err(|source| CheckpointError::Io {
            path: dir.display().to_string(),
            source,
        })?;

        let json = serde_json::to_string_pretty(checkpoint)?;
        let io_err = |source: std::io::Error| CheckpointError::Io {
            path: self.display_path(),
            source,
        };

        let mut temp = NamedTempFile::new_in(&dir).map_err(io_err)?;
        temp.write_all(json.as_bytes()).map_err(io_err)?;
        temp.write_all(b"\n").map_err(io_err)?;
        temp.as_file().sync_all().map_err(io_err)?;

        temp.persist(&self.path)
            .map_err(|e| CheckpointError::Persist {
                path: self.display_path(),
                source: e.error,
            })?;

        tracing::debug!(
            "Checkpoint saved at {}: {}",
            self.path.display(),
            checkpoint.position
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crawler::CrawlPosition;
    use tempfile::TempDir;

    fn store(dir: &TempDir) -> FileCheckpointStore {
        FileCheckpointStore::new(dir.path().join("state.json"))
    }

    #[test]
    fn test_missing_file_is_none() {
        let dir = TempDir::new().unwrap();
        assert!(store(&dir).load().unwrap().is_none());
    }

    #[test]
    fn test_save_then_load() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        let checkpoint = Checkpoint::new(CrawlPosition::new(2, 7, 3), Some("abc123".to_string()));

        store.save(&checkpoint).unwrap();
        let loaded = store.load().unwrap().unwrap();

        assert_eq!(loaded.position, CrawlPosition::new(2, 7, 3));
        assert_eq!(loaded.config_hash.as_deref(), Some("abc123"));
    }

    #[test]
    fn test_file_layout() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        store
            .save(&Checkpoint::new(CrawlPosition::new(1, 4, 2), None))
            .unwrap();

        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(store.path()).unwrap()).unwrap();
        assert_eq!(raw["schemaVersion"], 1);
        assert_eq!(raw["regionIndex"], 1);
        assert_eq!(raw["filterValue"], 4);
        assert_eq!(raw["page"], 2);
        assert!(raw.get("configHash").is_none());
        assert!(raw["savedAt"].is_string());
    }

    #[test]
    fn test_overwrite_keeps_latest() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        store
            .save(&Checkpoint::new(CrawlPosition::new(0, 1, 2), None))
            .unwrap();
        store
            .save(&Checkpoint::new(CrawlPosition::new(0, 2, 1), None))
            .unwrap();

        assert_eq!(
            store.load().unwrap().unwrap().position,
            CrawlPosition::new(0, 2, 1)
        );
        let leftovers = std::fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(leftovers, 1);
    }

    #[test]
    fn test_corrupt_file_is_none() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        std::fs::write(store.path(), "{\"regionIndex\": 1, \"filterV").unwrap();
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn test_binary_garbage_is_none() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        std::fs::write(store.path(), [0xff, 0xfe, 0x00, 0x7b]).unwrap();
        assert!(store.load().unwrap().is_none());
    }

    #[cfg(unix)]
    #[test]
    fn test_unreadable_path_is_error() {
        let dir = TempDir::new().unwrap();
        // reading a directory fails with EISDIR, not NotFound
        let store = store(&dir);
        std::fs::create_dir(store.path()).unwrap();
        assert!(matches!(store.load(), Err(CheckpointError::Io { .. })));
    }

    #[test]
    fn test_unknown_schema_version_is_none() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        std::fs::write(
            store.path(),
            r#"{"schemaVersion":9,"regionIndex":0,"filterValue":1,"page":1,"savedAt":"2024-01-01T00:00:00Z"}"#,
        )
        .unwrap();
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn test_creates_missing_directory() {
        let dir = TempDir::new().unwrap();
        let store = FileCheckpointStore::new(dir.path().join("nested/deeper/state.json"));
        store
            .save(&Checkpoint::new(CrawlPosition::initial(), None))
            .unwrap();
        assert!(store.load().unwrap().is_some());
    }
}

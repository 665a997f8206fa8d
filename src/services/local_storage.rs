//! Filesystem storage backend.
//!
//! Each file is two entries under the root directory: `<id>` holding the
//! content and `<id>.json` holding its record. The record is written last on
//! save and removed first on delete, so it marks whether a file exists.

use std::{
    io::{ErrorKind, Write},
    path::{Path, PathBuf},
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    application::services::StorageService,
    domain::{config::LocalStoreConfig, models::file::FileInfo},
    services::error::StorageError,
};

const RECORD_SUFFIX: &str = ".json";

#[derive(Debug, Serialize, Deserialize)]
struct LocalRecord {
    id: String,
    name: String,
    size: u64,
    #[serde(rename = "uploadedAt")]
    uploaded_at: DateTime<Utc>,
}

impl From<LocalRecord> for FileInfo {
    fn from(record: LocalRecord) -> Self {
        Self {
            id: record.id,
            name: record.name,
            size: record.size,
            uploaded_at: Some(record.uploaded_at),
        }
    }
}

pub struct LocalStorageService {
    root: PathBuf,
}

impl LocalStorageService {
    pub async fn new(config: LocalStoreConfig) -> Result<Self, StorageError> {
        let root = config.root_path;

        fs::create_dir_all(&root).await.map_err(|e| {
            StorageError::InvalidConfig(format!(
                "cannot create local root {}: {}",
                root.display(),
                e
            ))
        })?;

        let service = Self { root };
        let removed = service.remove_leftovers().await.map_err(|e| {
            StorageError::InvalidConfig(format!(
                "cannot scan local root {}: {}",
                service.root.display(),
                e
            ))
        })?;

        info!(path = %service.root.display(), removed, "Initialized local file store");

        Ok(service)
    }

    /// Deletes temp files and content without a record, left by a process
    /// that stopped mid-save.
    async fn remove_leftovers(&self) -> std::io::Result<usize> {
        let mut entries = fs::read_dir(&self.root).await?;
        let mut removed = 0;

        while let Some(entry) = entries.next_entry().await? {
            let file_name = entry.file_name();
            let Some(name) = file_name.to_str() else {
                continue;
            };

            let leftover = if name.starts_with('.') {
                name.ends_with(".tmp")
            } else {
                Uuid::try_parse(name).is_ok() && !fs::try_exists(self.record_path(name)).await?
            };

            if leftover {
                fs::remove_file(entry.path()).await?;
                debug!(file = %name, "Removed leftover from interrupted save");
                removed += 1;
            }
        }

        Ok(removed)
    }

    /// Ids are UUIDs; hyphenated input resolves to the same file as the
    /// simple form.
    fn parse_id(op: &'static str, id: &str) -> Result<String, StorageError> {
        Uuid::try_parse(id)
            .map(|uid| uid.simple().to_string())
            .map_err(|_| StorageError::invalid_input(op, format!("malformed file id '{}'", id)))
    }

    fn content_path(&self, id: &str) -> PathBuf {
        self.root.join(id)
    }

    fn record_path(&self, id: &str) -> PathBuf {
        self.root.join(format!("{}{}", id, RECORD_SUFFIX))
    }

    async fn read_record(&self, op: &'static str, id: &str) -> Result<LocalRecord, StorageError> {
        let raw = fs::read(self.record_path(id)).await.map_err(|e| {
            if e.kind() == ErrorKind::NotFound {
                StorageError::not_found(op, id)
            } else {
                StorageError::read_failure(op, e)
            }
        })?;

        serde_json::from_slice(&raw)
            .map_err(|e| StorageError::read_failure(op, format!("corrupt record {}: {}", id, e)))
    }
}

fn tmp_path(path: &Path) -> PathBuf {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{}.tmp", file_name))
}

/// Writes through a hidden temp file and renames it into place.
fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let tmp = tmp_path(path);

    let result = std::fs::File::create(&tmp)
        .and_then(|mut file| {
            file.write_all(bytes)?;
            file.sync_all()
        })
        .and_then(|()| std::fs::rename(&tmp, path));

    if result.is_err() {
        let _ = std::fs::remove_file(&tmp);
    }
    result
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SaveState {
    Writing,
    Committed,
    Abandoned,
}

fn lock(state: &Mutex<SaveState>) -> MutexGuard<'_, SaveState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// The two entries a save creates. Written on the blocking pool so an
/// abandoned save cannot leave a half-finished step running behind it.
struct SaveFiles {
    content: PathBuf,
    record: PathBuf,
}

impl SaveFiles {
    fn remove(&self) {
        for path in [&self.record, &self.content] {
            if let Err(e) = std::fs::remove_file(path) {
                if e.kind() != ErrorKind::NotFound {
                    warn!(path = %path.display(), error = %e, "Failed to remove uncommitted file");
                }
            }
        }
    }

    /// Writes content then record. Rolls back on failure or when the caller
    /// gave up while the write was running.
    fn write(
        &self,
        content: &[u8],
        record: &[u8],
        state: &Mutex<SaveState>,
    ) -> std::io::Result<()> {
        if *lock(state) == SaveState::Abandoned {
            return Err(std::io::Error::new(ErrorKind::Interrupted, "save abandoned"));
        }

        let result = write_atomic(&self.content, content)
            .and_then(|()| write_atomic(&self.record, record));

        let mut state = lock(state);
        match result {
            Ok(()) if *state == SaveState::Abandoned => {
                self.remove();
                Err(std::io::Error::new(ErrorKind::Interrupted, "save abandoned"))
            }
            Ok(()) => {
                *state = SaveState::Committed;
                Ok(())
            }
            Err(e) => {
                self.remove();
                Err(e)
            }
        }
    }
}

/// Held by the save future. Dropping it before the result was taken marks the
/// save abandoned, or rolls it back if the writer already committed.
struct PendingSave {
    files: Arc<SaveFiles>,
    state: Arc<Mutex<SaveState>>,
    settled: bool,
}

impl Drop for PendingSave {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        let mut state = lock(&self.state);
        if *state == SaveState::Committed {
            self.files.remove();
        } else {
            *state = SaveState::Abandoned;
        }
    }
}

#[async_trait]
impl StorageService for LocalStorageService {
    async fn save(&self, name: &str, content: Vec<u8>) -> Result<String, StorageError> {
        if content.is_empty() {
            return Err(StorageError::invalid_input("save", "empty content"));
        }
        if name.is_empty() {
            return Err(StorageError::invalid_input("save", "empty filename"));
        }

        fs::create_dir_all(&self.root)
            .await
            .map_err(|e| StorageError::write_failure("save", e))?;

        let id = Uuid::new_v4().simple().to_string();
        let record = LocalRecord {
            id: id.clone(),
            name: name.to_string(),
            size: content.len() as u64,
            uploaded_at: Utc::now(),
        };
        let record =
            serde_json::to_vec(&record).map_err(|e| StorageError::write_failure("save", e))?;

        let files = Arc::new(SaveFiles {
            content: self.content_path(&id),
            record: self.record_path(&id),
        });
        let state = Arc::new(Mutex::new(SaveState::Writing));
        let mut pending = PendingSave {
            files: files.clone(),
            state: state.clone(),
            settled: false,
        };

        let size = content.len();
        let written =
            tokio::task::spawn_blocking(move || files.write(&content, &record, &state)).await;
        pending.settled = true;

        written
            .map_err(|e| StorageError::write_failure("save", e))?
            .map_err(|e| StorageError::write_failure("save", e))?;

        debug!(id = %id, size, "Saved file to {:?}", pending.files.content);
        Ok(id)
    }

    async fn get(&self, id: &str) -> Result<Vec<u8>, StorageError> {
        let id = Self::parse_id("get", id)?;
        self.read_record("get", &id).await?;

        fs::read(self.content_path(&id)).await.map_err(|e| {
            if e.kind() == ErrorKind::NotFound {
                StorageError::not_found("get", id.as_str())
            } else {
                StorageError::read_failure("get", e)
            }
        })
    }

    async fn delete(&self, id: &str) -> Result<(), StorageError> {
        let id = Self::parse_id("delete", id)?;

        fs::remove_file(self.record_path(&id)).await.map_err(|e| {
            if e.kind() == ErrorKind::NotFound {
                StorageError::not_found("delete", id.as_str())
            } else {
                StorageError::write_failure("delete", e)
            }
        })?;

        if let Err(e) = fs::remove_file(self.content_path(&id)).await {
            if e.kind() != ErrorKind::NotFound {
                warn!(id = %id, error = %e, "Failed to remove content of deleted file");
            }
        }

        debug!(id = %id, "Deleted file");
        Ok(())
    }

    async fn info(&self, id: &str) -> Result<FileInfo, StorageError> {
        let id = Self::parse_id("info", id)?;
        Ok(self.read_record("info", &id).await?.into())
    }

    async fn list(&self) -> Result<Vec<FileInfo>, StorageError> {
        let mut entries = fs::read_dir(&self.root)
            .await
            .map_err(|e| StorageError::read_failure("list", e))?;

        let mut files = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| StorageError::read_failure("list", e))?
        {
            let file_name = entry.file_name();
            let Some(id) = file_name
                .to_str()
                .filter(|n| !n.starts_with('.'))
                .and_then(|n| n.strip_suffix(RECORD_SUFFIX))
            else {
                continue;
            };

            match self.read_record("list", id).await {
                Ok(record) => files.push(record.into()),
                // removed after the directory was read
                Err(StorageError::NotFound { .. }) => continue,
                Err(e) => return Err(e),
            }
        }

        Ok(files)
    }

    async fn ping(&self) -> Result<(), StorageError> {
        let metadata = fs::metadata(&self.root).await.map_err(|e| {
            StorageError::Unavailable(format!("{}: {}", self.root.display(), e))
        })?;

        if !metadata.is_dir() {
            return Err(StorageError::Unavailable(format!(
                "{} is not a directory",
                self.root.display()
            )));
        }
        if metadata.permissions().readonly() {
            return Err(StorageError::Unavailable(format!(
                "{} is read-only",
                self.root.display()
            )));
        }

        Ok(())
    }
}

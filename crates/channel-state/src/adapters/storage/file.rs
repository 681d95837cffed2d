use crate::domain::errors::StoreError;
use crate::ports::outbound::{PersistentStore, StoreHandle};
use async_trait::async_trait;
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use uuid::Uuid;

type Table = HashMap<String, Vec<u8>>;

/// File-backed durable store.
///
/// Each named store is one file under `root` (the hex encoding of the name
/// plus `.kv`) holding a bincode-encoded key/value map. Writes go through a
/// temp file and a rename so a reader never sees a torn file.
#[derive(Debug, Clone)]
pub struct FileBackedPersistentStore {
    root: PathBuf,
}

impl FileBackedPersistentStore {
    /// Create a store rooted at `root`. The directory is created on first open.
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// File holding the store called `name`.
    #[must_use]
    pub fn path_for(&self, name: &str) -> PathBuf {
        self.root.join(format!("{}.kv", hex::encode(name)))
    }
}

#[async_trait]
impl PersistentStore for FileBackedPersistentStore {
    async fn open(&self, name: &str) -> Result<Box<dyn StoreHandle>, StoreError> {
        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|e| StoreError::Open {
                name: name.to_string(),
                message: e.to_string(),
            })?;

        let path = self.path_for(name);
        match tokio::fs::metadata(&path).await {
            Ok(metadata) => tracing::info!(
                store = name,
                path = %path.display(),
                bytes = metadata.len(),
                "Found existing storage file"
            ),
            Err(_) => tracing::debug!(store = name, path = %path.display(), "No existing storage file"),
        }

        Ok(Box::new(FileStoreHandle {
            path,
            write_lock: Mutex::new(()),
            closed: AtomicBool::new(false),
        }))
    }
}

/// Handle returned by [`FileBackedPersistentStore::open`].
pub struct FileStoreHandle {
    path: PathBuf,
    /// Serializes read-modify-write cycles from this handle.
    write_lock: Mutex<()>,
    closed: AtomicBool,
}

impl FileStoreHandle {
    fn ensure_open(&self) -> Result<(), StoreError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(StoreError::Closed);
        }
        Ok(())
    }

    async fn load_table(&self, key: &str) -> Result<Table, StoreError> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Table::new()),
            Err(e) => {
                return Err(StoreError::Read {
                    key: key.to_string(),
                    message: e.to_string(),
                })
            }
        };

        if bytes.is_empty() {
            return Ok(Table::new());
        }

        bincode::deserialize(&bytes).map_err(|e| StoreError::Encoding {
            message: e.to_string(),
        })
    }

    async fn save_table(&self, key: &str, table: &Table) -> Result<(), StoreError> {
        let write_err = |e: std::io::Error| StoreError::Write {
            key: key.to_string(),
            message: e.to_string(),
        };

        let bytes = bincode::serialize(table).map_err(|e| StoreError::Encoding {
            message: e.to_string(),
        })?;

        // Unique temp name: other handles may be writing the same store
        let temp_path = self
            .path
            .with_extension(format!("{}.tmp", Uuid::new_v4().simple()));

        let mut file = tokio::fs::File::create(&temp_path).await.map_err(write_err)?;
        file.write_all(&bytes).await.map_err(write_err)?;
        file.sync_all().await.map_err(write_err)?;
        drop(file);

        tokio::fs::rename(&temp_path, &self.path)
            .await
            .map_err(write_err)
    }
}

#[async_trait]
impl StoreHandle for FileStoreHandle {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        self.ensure_open()?;
        let mut table = self.load_table(key).await?;
        Ok(table.remove(key))
    }

    async fn put(&self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        self.ensure_open()?;
        let _guard = self.write_lock.lock().await;
        let mut table = self.load_table(key).await?;
        table.insert(key.to_string(), value.to_vec());
        self.save_table(key, &table).await
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_round_trip_across_handles() {
        let dir = tempdir().unwrap();
        let store = FileBackedPersistentStore::new(dir.path().join("origin"));

        let writer = store.open("channel-state__count").await.unwrap();
        writer.put("state", b"41").await.unwrap();
        writer.put("state", b"42").await.unwrap();
        writer.close().await;

        let reader = store.open("channel-state__count").await.unwrap();
        assert_eq!(reader.get("state").await.unwrap(), Some(b"42".to_vec()));
        assert!(store.path_for("channel-state__count").exists());
    }

    #[tokio::test]
    async fn test_missing_file_reads_empty() {
        let dir = tempdir().unwrap();
        let store = FileBackedPersistentStore::new(dir.path());

        let handle = store.open("fresh").await.unwrap();
        assert_eq!(handle.get("state").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_names_map_to_distinct_files() {
        let dir = tempdir().unwrap();
        let store = FileBackedPersistentStore::new(dir.path());

        assert_ne!(store.path_for("a/b"), store.path_for("a_b"));
        assert_eq!(store.path_for("ab").file_name().unwrap(), "6162.kv");
    }

    #[tokio::test]
    async fn test_corrupt_file_is_an_encoding_error() {
        let dir = tempdir().unwrap();
        let store = FileBackedPersistentStore::new(dir.path());
        std::fs::write(store.path_for("broken"), [0xFF; 3]).unwrap();

        let handle = store.open("broken").await.unwrap();
        assert!(matches!(
            handle.get("state").await,
            Err(StoreError::Encoding { .. })
        ));
    }

    #[tokio::test]
    async fn test_closed_handle_rejects_io() {
        let dir = tempdir().unwrap();
        let store = FileBackedPersistentStore::new(dir.path());
        let handle = store.open("x").await.unwrap();
        handle.close().await;

        assert_eq!(handle.put("state", b"1").await, Err(StoreError::Closed));
    }
}

//! Crash-atomic local filesystem storage for [`BlobRecord`]s.
//!
//! Each record lives at `<root>/<bucket>/<ref[0:2]>/<ref>.json`. Writes
//! never modify a file in place: the previous primary is renamed to a
//! `.backup` sidecar, the new content is written and fsynced, and only
//! then is the sidecar removed. A read that finds a leftover sidecar knows
//! the prior write crashed after the rename but before the sidecar was
//! removed, so it restores the sidecar first.

use async_trait::async_trait;
use blob_core::{BlobRecord, Key, ServiceError};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

/// Crash-atomic read/write of a blob record identified by `(bucket, ref)`.
#[async_trait]
pub trait Store: Send + Sync + 'static {
    /// Never fails for a missing or corrupt file; only for I/O errors.
    async fn read(&self, key: &Key) -> Result<Option<BlobRecord>, ServiceError>;
    /// Fails only on I/O errors; returns once the backup sidecar is gone.
    async fn write(&self, key: &Key, record: &BlobRecord) -> Result<(), ServiceError>;
}

#[derive(Debug, Clone)]
pub struct LocalStore {
    root: PathBuf,
}

impl LocalStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        LocalStore { root: root.into() }
    }

    fn primary_path(&self, key: &Key) -> PathBuf {
        self.root.join(format!("{}.json", key.relative_path()))
    }

    fn backup_path(primary: &Path) -> PathBuf {
        let mut name = primary.as_os_str().to_owned();
        name.push(".backup");
        PathBuf::from(name)
    }
}

#[async_trait]
impl Store for LocalStore {
    async fn read(&self, key: &Key) -> Result<Option<BlobRecord>, ServiceError> {
        let primary = self.primary_path(key);
        let backup = Self::backup_path(&primary);

        if tokio::fs::try_exists(&backup).await? {
            tracing::warn!(path = %primary.display(), "restoring blob from backup sidecar");
            tokio::fs::rename(&backup, &primary).await?;
        }

        let bytes = match tokio::fs::read(&primary).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };

        match serde_json::from_slice::<BlobRecord>(&bytes) {
            Ok(record) => Ok(Some(record)),
            Err(err) => {
                tracing::warn!(
                    path = %primary.display(),
                    %err,
                    "blob file is not parseable, treating as absent",
                );
                Ok(None)
            }
        }
    }

    async fn write(&self, key: &Key, record: &BlobRecord) -> Result<(), ServiceError> {
        let primary = self.primary_path(key);
        let backup = Self::backup_path(&primary);

        if let Some(parent) = primary.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let existed = tokio::fs::try_exists(&primary).await?;
        if existed {
            tokio::fs::rename(&primary, &backup).await?;
        }

        let bytes = serde_json::to_vec(record).expect("BlobRecord always serializes");
        let mut file = tokio::fs::File::create(&primary).await?;
        file.write_all(&bytes).await?;
        file.sync_all().await?;

        if existed {
            tokio::fs::remove_file(&backup).await?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use blob_core::{Bucket, Reference};
    use tempfile::TempDir;

    fn key() -> Key {
        Key::new(
            Bucket::parse("b1").unwrap(),
            Reference::parse("aa0000000000000000000000000000000000000000000000000000000000000a")
                .unwrap(),
        )
    }

    fn record(version: u64) -> BlobRecord {
        BlobRecord {
            data: "AAAA".to_string(),
            version,
            created: 1,
            updated: None,
            ip: "unknown".to_string(),
        }
    }

    #[tokio::test]
    async fn absent_key_reads_as_none() {
        let dir = TempDir::new().unwrap();
        let store = LocalStore::new(dir.path());
        assert!(store.read(&key()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn write_then_read_round_trips() {
        let dir = TempDir::new().unwrap();
        let store = LocalStore::new(dir.path());
        store.write(&key(), &record(1)).await.unwrap();
        let got = store.read(&key()).await.unwrap().unwrap();
        assert_eq!(got, record(1));

        let path = dir
            .path()
            .join("b1")
            .join("aa")
            .join(format!("{}.json", key().reference));
        assert!(path.exists());
        assert!(!Path::new(&format!("{}.backup", path.display())).exists());
    }

    #[tokio::test]
    async fn corrupt_primary_with_no_backup_reads_as_absent() {
        let dir = TempDir::new().unwrap();
        let store = LocalStore::new(dir.path());
        let primary = dir
            .path()
            .join("b1")
            .join("aa")
            .join(format!("{}.json", key().reference));
        tokio::fs::create_dir_all(primary.parent().unwrap())
            .await
            .unwrap();
        tokio::fs::write(&primary, b"not json").await.unwrap();

        assert!(store.read(&key()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn leftover_backup_is_recovered_on_read() {
        let dir = TempDir::new().unwrap();
        let store = LocalStore::new(dir.path());

        // Simulate a crash: v3 exists, write of v4 renamed it to .backup and
        // then stopped before the new primary was written.
        store.write(&key(), &record(3)).await.unwrap();
        let primary = dir
            .path()
            .join("b1")
            .join("aa")
            .join(format!("{}.json", key().reference));
        let backup = PathBuf::from(format!("{}.backup", primary.display()));
        tokio::fs::rename(&primary, &backup).await.unwrap();
        assert!(!primary.exists());

        let recovered = store.read(&key()).await.unwrap().unwrap();
        assert_eq!(recovered, record(3));
        assert!(primary.exists());
        assert!(!backup.exists());
    }

    #[tokio::test]
    async fn second_write_removes_backup_sidecar() {
        let dir = TempDir::new().unwrap();
        let store = LocalStore::new(dir.path());
        store.write(&key(), &record(1)).await.unwrap();
        store.write(&key(), &record(2)).await.unwrap();

        let primary = dir
            .path()
            .join("b1")
            .join("aa")
            .join(format!("{}.json", key().reference));
        let backup = PathBuf::from(format!("{}.backup", primary.display()));
        assert!(!backup.exists());
        assert_eq!(store.read(&key()).await.unwrap().unwrap(), record(2));
    }
}

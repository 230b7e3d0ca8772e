use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::io::AsyncWriteExt;

use super::{PutOptions, StorageError};

/// Storage rooted at a directory on the local filesystem. Keys are
/// `/`-separated paths relative to the root.
#[derive(Clone, Debug)]
pub struct LocalStorage {
    root: PathBuf,
}

impl LocalStorage {
    pub fn new(root: impl AsRef<Path>) -> LocalStorage {
        LocalStorage {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StorageError> {
        let relative = Path::new(key);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if key.is_empty() || escapes {
            return Err(StorageError::InvalidPath {
                path: key.to_string(),
                reason: "keys must be non-empty relative paths".to_string(),
            });
        }
        Ok(self.root.join(relative))
    }

    pub async fn get(&self, key: &str) -> Result<Arc<Vec<u8>>, StorageError> {
        let path = self.path_for(key)?;
        tracing::debug!("Reading from path: {}", path.display());
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Arc::new(bytes)),
            Err(e) => Err(StorageError::from_io(key, e)),
        }
    }

    pub async fn exists(&self, key: &str) -> Result<bool, StorageError> {
        let path = self.path_for(key)?;
        match tokio::fs::metadata(&path).await {
            Ok(meta) => Ok(meta.is_file()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StorageError::from_io(key, e)),
        }
    }

    /// Writes `bytes` to a temporary file next to the target and then
    /// publishes it, so a failed write never leaves a partial blob under
    /// `key`. Conditional puts publish with a hard link, which fails if the
    /// target exists.
    pub async fn put_bytes(
        &self,
        key: &str,
        bytes: &[u8],
        options: PutOptions,
    ) -> Result<(), StorageError> {
        let path = self.path_for(key)?;
        tracing::debug!("Writing to path: {}", path.display());
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| StorageError::from_io(key, e))?;
        }
        let staging = staging_path(&path);
        let result = Self::stage_and_publish(&staging, &path, bytes, options).await;
        if result.is_err() || options.if_not_exists {
            if let Err(e) = tokio::fs::remove_file(&staging).await {
                if e.kind() != ErrorKind::NotFound {
                    tracing::warn!(
                        path = %staging.display(),
                        error = %e,
                        "Failed to remove staging file"
                    );
                }
            }
        }
        result.map_err(|e| StorageError::from_io(key, e))
    }

    async fn stage_and_publish(
        staging: &Path,
        path: &Path,
        bytes: &[u8],
        options: PutOptions,
    ) -> std::io::Result<()> {
        let mut file = tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(staging)
            .await?;
        file.write_all(bytes).await?;
        file.flush().await?;
        file.sync_all().await?;
        drop(file);
        if options.if_not_exists {
            tokio::fs::hard_link(staging, path).await
        } else {
            tokio::fs::rename(staging, path).await
        }
    }

    /// Every key below `prefix`, treating `prefix` as a directory.
    pub async fn list_prefix(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        let start = if prefix.is_empty() {
            self.root.clone()
        } else {
            self.path_for(prefix)?
        };
        let mut keys = Vec::new();
        let mut pending = vec![start];
        while let Some(dir) = pending.pop() {
            let mut entries = match tokio::fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => return Err(StorageError::from_io(prefix, e)),
            };
            while let Some(entry) = entries
                .next_entry()
                .await
                .map_err(|e| StorageError::from_io(prefix, e))?
            {
                let file_type = entry
                    .file_type()
                    .await
                    .map_err(|e| StorageError::from_io(prefix, e))?;
                let path = entry.path();
                if file_type.is_dir() {
                    pending.push(path);
                } else if is_staging_file(&path) {
                    continue;
                } else if let Ok(relative) = path.strip_prefix(&self.root) {
                    let key = relative
                        .components()
                        .map(|c| c.as_os_str().to_string_lossy())
                        .collect::<Vec<_>>()
                        .join("/");
                    keys.push(key);
                }
            }
        }
        keys.sort();
        Ok(keys)
    }

    pub async fn delete(&self, key: &str) -> Result<(), StorageError> {
        let path = self.path_for(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::from_io(key, e)),
        }
    }
}

const STAGING_SUFFIX: &str = ".dumbvec-staging";

static STAGING_COUNTER: AtomicU64 = AtomicU64::new(0);

fn staging_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let unique = STAGING_COUNTER.fetch_add(1, Ordering::Relaxed);
    path.with_file_name(format!(
        ".{name}.{}.{unique}{STAGING_SUFFIX}",
        std::process::id()
    ))
}

fn is_staging_file(path: &Path) -> bool {
    path.file_name()
        .map(|n| n.to_string_lossy().ends_with(STAGING_SUFFIX))
        .unwrap_or(false)
}

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use dumbvec_config::Configurable;
use dumbvec_error::{DumbvecError, ErrorCodes};
use tempfile::TempDir;
use thiserror::Error;

pub mod config;
pub mod local;
pub mod object_store;

use config::StorageConfig;
use local::LocalStorage;
use self::object_store::{ObjectStore, StorageConfigError};

#[derive(Error, Debug, Clone)]
pub enum StorageError {
    #[error("Object at location {path} not found: {source}")]
    NotFound {
        path: String,
        source: Arc<dyn std::error::Error + Send + Sync + 'static>,
    },
    #[error("Object at location {path} already exists: {source}")]
    AlreadyExists {
        path: String,
        source: Arc<dyn std::error::Error + Send + Sync + 'static>,
    },
    #[error("The operation lacked the necessary privileges to complete for path {path}: {source}")]
    PermissionDenied {
        path: String,
        source: Arc<dyn std::error::Error + Send + Sync + 'static>,
    },
    #[error("Invalid key {path:?}: {reason}")]
    InvalidPath { path: String, reason: String },
    #[error("Operation not supported: {source}")]
    NotSupported {
        source: Arc<dyn std::error::Error + Send + Sync + 'static>,
    },
    #[error("Generic error: {source}")]
    Generic {
        source: Arc<dyn std::error::Error + Send + Sync + 'static>,
    },
}

impl StorageError {
    pub(crate) fn from_io(key: &str, err: std::io::Error) -> Self {
        let path = key.to_string();
        match err.kind() {
            std::io::ErrorKind::NotFound => StorageError::NotFound {
                path,
                source: Arc::new(err),
            },
            std::io::ErrorKind::AlreadyExists => StorageError::AlreadyExists {
                path,
                source: Arc::new(err),
            },
            std::io::ErrorKind::PermissionDenied => StorageError::PermissionDenied {
                path,
                source: Arc::new(err),
            },
            _ => StorageError::Generic {
                source: Arc::new(err),
            },
        }
    }
}

impl DumbvecError for StorageError {
    fn code(&self) -> ErrorCodes {
        match self {
            StorageError::NotFound { .. } => ErrorCodes::NotFound,
            StorageError::AlreadyExists { .. } => ErrorCodes::AlreadyExists,
            StorageError::PermissionDenied { .. } => ErrorCodes::PermissionDenied,
            StorageError::InvalidPath { .. } => ErrorCodes::InvalidArgument,
            StorageError::NotSupported { .. } => ErrorCodes::Unimplemented,
            StorageError::Generic { .. } => ErrorCodes::Internal,
        }
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct PutOptions {
    /// Fail with `AlreadyExists` instead of replacing an existing key.
    pub if_not_exists: bool,
}

impl PutOptions {
    pub fn if_not_exists() -> Self {
        PutOptions {
            if_not_exists: true,
        }
    }
}

/// A cloneable handle to a blob store.
#[derive(Clone, Debug)]
pub enum Storage {
    Local(LocalStorage),
    ObjectStore(ObjectStore),
}

impl Storage {
    pub fn local<P: AsRef<Path>>(root: P) -> Self {
        Storage::Local(LocalStorage::new(root))
    }

    pub fn in_memory() -> Self {
        Storage::ObjectStore(ObjectStore::in_memory())
    }

    #[tracing::instrument(skip(self))]
    pub async fn get(&self, key: &str) -> Result<Arc<Vec<u8>>, StorageError> {
        let res = match self {
            Storage::Local(local) => local.get(key).await,
            Storage::ObjectStore(object_store) => object_store.get(key).await,
        };
        match &res {
            Ok(bytes) => tracing::debug!(key, size = bytes.len(), "Read object"),
            Err(e) => tracing::debug!(key, error = %e, "Failed to read object"),
        }
        res
    }

    pub async fn exists(&self, key: &str) -> Result<bool, StorageError> {
        match self {
            Storage::Local(local) => local.exists(key).await,
            Storage::ObjectStore(object_store) => object_store.exists(key).await,
        }
    }

    #[tracing::instrument(skip(self, bytes))]
    pub async fn put_bytes(
        &self,
        key: &str,
        bytes: Vec<u8>,
        options: PutOptions,
    ) -> Result<(), StorageError> {
        let size = bytes.len();
        let res = match self {
            Storage::Local(local) => local.put_bytes(key, &bytes, options).await,
            Storage::ObjectStore(object_store) => {
                object_store.put_bytes(key, bytes, options).await
            }
        };
        match &res {
            Ok(()) => tracing::debug!(key, size, "Wrote object"),
            Err(e) => tracing::debug!(key, error = %e, "Failed to write object"),
        }
        res
    }

    #[tracing::instrument(skip(self))]
    pub async fn list_prefix(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        match self {
            Storage::Local(local) => local.list_prefix(prefix).await,
            Storage::ObjectStore(object_store) => object_store.list_prefix(prefix).await,
        }
    }

    pub async fn delete(&self, key: &str) -> Result<(), StorageError> {
        tracing::info!(key, "Deleting object");
        match self {
            Storage::Local(local) => local.delete(key).await,
            Storage::ObjectStore(object_store) => object_store.delete(key).await,
        }
    }
}

#[async_trait]
impl Configurable<StorageConfig> for Storage {
    async fn try_from_config(config: &StorageConfig) -> Result<Self, Box<dyn DumbvecError>> {
        match config {
            StorageConfig::Local(local_config) => {
                tracing::info!("Using local storage rooted at {}", local_config.root);
                Ok(Storage::local(&local_config.root))
            }
            StorageConfig::ObjectStore(object_store_config) => {
                let object_store = ObjectStore::try_from_config(object_store_config)
                    .map_err(StorageConfigError::boxed)?;
                Ok(Storage::ObjectStore(object_store))
            }
        }
    }
}

/// Local storage in a fresh temporary directory. The directory lives as long
/// as the returned `TempDir`.
pub fn test_storage() -> (TempDir, Storage) {
    let dir = TempDir::new().expect("Should be able to create a temporary directory.");
    let storage = Storage::local(dir.path());
    (dir, storage)
}

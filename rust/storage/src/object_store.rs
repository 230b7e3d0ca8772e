use std::sync::Arc;

use dumbvec_error::{DumbvecError, ErrorCodes};
use futures::StreamExt;
use object_store::path::Path;
use object_store::{ObjectStore as ObjectStoreTrait, PutMode};
use thiserror::Error;

use super::config::{ObjectStoreConfig, ObjectStoreType};
use super::{PutOptions, StorageError};

#[derive(Error, Debug)]
pub enum StorageConfigError {
    #[error("Invalid storage config: {0}")]
    InvalidStorageConfig(String),
}

impl DumbvecError for StorageConfigError {
    fn code(&self) -> ErrorCodes {
        match self {
            StorageConfigError::InvalidStorageConfig(_) => ErrorCodes::InvalidArgument,
        }
    }
}

impl From<object_store::Error> for StorageError {
    fn from(err: object_store::Error) -> Self {
        match err {
            object_store::Error::Generic { store: _, source } => StorageError::Generic {
                source: source.into(),
            },
            object_store::Error::NotFound { path, source } => StorageError::NotFound {
                path,
                source: source.into(),
            },
            object_store::Error::InvalidPath { source } => StorageError::InvalidPath {
                path: String::new(),
                reason: source.to_string(),
            },
            object_store::Error::NotSupported { source } => StorageError::NotSupported {
                source: source.into(),
            },
            object_store::Error::AlreadyExists { path, source } => StorageError::AlreadyExists {
                path,
                source: source.into(),
            },
            object_store::Error::PermissionDenied { path, source } => {
                StorageError::PermissionDenied {
                    path,
                    source: source.into(),
                }
            }
            err => StorageError::Generic {
                source: Arc::new(err),
            },
        }
    }
}

/// Storage over any `object_store` backend.
#[derive(Clone)]
pub struct ObjectStore {
    object_store: Arc<dyn ObjectStoreTrait>,
}

impl std::fmt::Debug for ObjectStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectStore")
            .field("object_store", &self.object_store.to_string())
            .finish()
    }
}

impl ObjectStore {
    pub fn new(object_store: Arc<dyn ObjectStoreTrait>) -> Self {
        ObjectStore { object_store }
    }

    /// A process-local store, mostly useful for tests.
    pub fn in_memory() -> Self {
        ObjectStore::new(Arc::new(object_store::memory::InMemory::new()))
    }

    pub fn try_from_config(config: &ObjectStoreConfig) -> Result<Self, StorageConfigError> {
        let object_store: Arc<dyn ObjectStoreTrait> = match &config.bucket.r#type {
            ObjectStoreType::Minio => {
                tracing::info!(
                    "Creating Minio object store with bucket: {}",
                    config.bucket.name
                );
                let object_store = object_store::aws::AmazonS3Builder::new()
                    .with_region("us-east-1")
                    .with_endpoint(&config.minio_endpoint)
                    .with_bucket_name(&config.bucket.name)
                    .with_access_key_id("minio")
                    .with_secret_access_key("minio123")
                    .with_allow_http(true)
                    .build()
                    .map_err(|err| {
                        tracing::error!("Failed to create object store: {:?}", err);
                        StorageConfigError::InvalidStorageConfig(err.to_string())
                    })?;
                Arc::new(object_store::limit::LimitStore::new(
                    object_store,
                    config.max_concurrent_requests,
                ))
            }
            ObjectStoreType::S3 => {
                tracing::info!(
                    "Creating S3 object store with bucket: {}",
                    config.bucket.name
                );
                let object_store = object_store::aws::AmazonS3Builder::from_env()
                    .with_bucket_name(&config.bucket.name)
                    .build()
                    .map_err(|err| {
                        tracing::error!("Failed to create object store: {:?}", err);
                        StorageConfigError::InvalidStorageConfig(err.to_string())
                    })?;
                Arc::new(object_store::limit::LimitStore::new(
                    object_store,
                    config.max_concurrent_requests,
                ))
            }
            ObjectStoreType::Memory => {
                tracing::info!("Creating in-memory object store");
                Arc::new(object_store::memory::InMemory::new())
            }
        };
        Ok(ObjectStore { object_store })
    }

    pub async fn get(&self, key: &str) -> Result<Arc<Vec<u8>>, StorageError> {
        Ok(self
            .object_store
            .get(&Path::from(key))
            .await?
            .bytes()
            .await?
            .to_vec()
            .into())
    }

    pub async fn exists(&self, key: &str) -> Result<bool, StorageError> {
        match self.object_store.head(&Path::from(key)).await {
            Ok(_) => Ok(true),
            Err(object_store::Error::NotFound { .. }) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn put_bytes(
        &self,
        key: &str,
        bytes: Vec<u8>,
        options: PutOptions,
    ) -> Result<(), StorageError> {
        let mut object_store_put_options = object_store::PutOptions::default();
        if options.if_not_exists {
            object_store_put_options.mode = PutMode::Create;
        }
        self.object_store
            .put_opts(&Path::from(key), bytes.into(), object_store_put_options)
            .await?;
        Ok(())
    }

    pub async fn delete(&self, key: &str) -> Result<(), StorageError> {
        match self.object_store.delete(&Path::from(key)).await {
            Ok(_) => Ok(()),
            Err(object_store::Error::NotFound { .. }) => Ok(()),
            Err(e) => {
                tracing::error!(error = %e, key = %key, "Failed to delete object");
                Err(e.into())
            }
        }
    }

    pub async fn list_prefix(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        let prefix = (!prefix.is_empty()).then(|| Path::from(prefix));
        let mut files = Vec::new();
        let mut stream = self.object_store.list(prefix.as_ref());

        while let Some(obj) = stream.next().await {
            match obj {
                Ok(obj) => {
                    files.push(obj.location.to_string());
                }
                Err(e) => {
                    return Err(e.into());
                }
            }
        }
        files.sort();
        Ok(files)
    }
}

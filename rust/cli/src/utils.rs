use crate::config::RootConfig;
use dumbvec_error::{DumbvecError, ErrorCodes};
use dumbvec_index::{
    sanitize_name, BuildError, CacheTier, Chain, ChunkError, DimensionMask, FormatError,
    IndexChain, ResolveError, SearchError, StorageTier, StoreError, VectorType,
};
use dumbvec_storage::{PutOptions, Storage, StorageError};
use dumbvec_types::DumbIndex;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("Failed to load config: {0}")]
    Config(#[from] Box<figment::Error>),
    #[error("Failed to read {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("Invalid {what}: {source}")]
    InvalidJson {
        what: String,
        source: serde_json::Error,
    },
    #[error("Index {0} not found")]
    IndexNotFound(String),
    #[error(transparent)]
    Component(#[from] Box<dyn DumbvecError>),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Chunk(#[from] ChunkError),
    #[error(transparent)]
    Build(#[from] BuildError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Format(#[from] FormatError),
    #[error(transparent)]
    Search(#[from] SearchError),
    #[error(transparent)]
    Resolve(#[from] ResolveError),
}

impl DumbvecError for CliError {
    fn code(&self) -> ErrorCodes {
        match self {
            CliError::Config(_) => ErrorCodes::InvalidArgument,
            CliError::Io { source, .. } => source.code(),
            CliError::InvalidJson { .. } => ErrorCodes::InvalidArgument,
            CliError::IndexNotFound(_) => ErrorCodes::NotFound,
            CliError::Component(e) => e.code(),
            CliError::Storage(e) => e.code(),
            CliError::Chunk(e) => e.code(),
            CliError::Build(e) => e.code(),
            CliError::Store(e) => e.code(),
            CliError::Format(e) => e.code(),
            CliError::Search(e) => e.code(),
            CliError::Resolve(e) => e.code(),
        }
    }
}

impl CliError {
    /// Process exit status for this error.
    pub fn exit_code(&self) -> i32 {
        match self.code() {
            ErrorCodes::InvalidArgument | ErrorCodes::OutOfRange => 2,
            ErrorCodes::NotFound => 3,
            ErrorCodes::DataLoss | ErrorCodes::VersionMismatch => 4,
            _ => 1,
        }
    }
}

/// Everything a command needs: the loaded configuration and the storage it
/// points at.
#[derive(Clone, Debug)]
pub struct CliContext {
    pub config: RootConfig,
    pub storage: Storage,
}

impl CliContext {
    pub fn new(config: RootConfig, storage: Storage) -> Self {
        CliContext { config, storage }
    }

    fn index_prefix(&self) -> &str {
        &self.config.index.index_prefix
    }

    pub fn index_tier(&self, vector_type: VectorType) -> StorageTier<DumbIndex> {
        StorageTier::new(
            "storage",
            self.storage.clone(),
            self.index_prefix(),
            vector_type,
        )
    }

    /// The configured cache in front of storage. Writes encode with
    /// `vector_type`; reads take the type from the stored header.
    pub async fn index_chain(&self, vector_type: VectorType) -> Result<IndexChain, CliError> {
        let cache = dumbvec_cache::from_config::<String, DumbIndex>(&self.config.cache).await?;
        Ok(Chain::default()
            .with_tier(Arc::new(CacheTier::<DumbIndex>::new("cache", Arc::from(cache))))
            .with_tier(Arc::new(self.index_tier(vector_type))))
    }

    /// Key of the mask stored next to index `name`.
    pub fn mask_key(&self, name: &str) -> String {
        let file = format!("{}.mask.json", sanitize_name(name));
        let prefix = self.index_prefix().trim_end_matches('/');
        if prefix.is_empty() {
            file
        } else {
            format!("{prefix}/{file}")
        }
    }

    /// Returns false when the mask was already stored and `overwrite` is off.
    pub async fn write_mask(
        &self,
        name: &str,
        mask: &DimensionMask,
        overwrite: bool,
    ) -> Result<bool, CliError> {
        let key = self.mask_key(name);
        let bytes = serde_json::to_vec(mask).map_err(|source| CliError::InvalidJson {
            what: format!("mask {key}"),
            source,
        })?;
        let options = if overwrite {
            PutOptions::default()
        } else {
            PutOptions::if_not_exists()
        };
        match self.storage.put_bytes(&key, bytes, options).await {
            Ok(()) => Ok(true),
            Err(StorageError::AlreadyExists { .. }) => {
                tracing::info!(key = %key, "Mask already stored, skipping write");
                Ok(false)
            }
            Err(e) => Err(e.into()),
        }
    }

    pub async fn delete_mask(&self, name: &str) -> Result<(), CliError> {
        Ok(self.storage.delete(&self.mask_key(name)).await?)
    }

    pub async fn read_mask(&self, name: &str) -> Result<Option<DimensionMask>, CliError> {
        let key = self.mask_key(name);
        match self.storage.get(&key).await {
            Ok(bytes) => serde_json::from_slice(&bytes)
                .map(Some)
                .map_err(|source| CliError::InvalidJson {
                    what: format!("mask {key}"),
                    source,
                }),
            Err(StorageError::NotFound { .. }) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
pub(crate) fn test_context() -> (tempfile::TempDir, CliContext) {
    let (dir, storage) = dumbvec_storage::test_storage();
    (dir, CliContext::new(RootConfig::default(), storage))
}

//! Named persistence of indexes and doc sets across ordered tiers.
//!
//! A [`Chain`] reads from the first tier that has a value and copies it into
//! every tier before that one, so a cache-then-local-then-remote chain warms
//! itself. Writes go to every tier.

use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use dumbvec_cache::{Cache, CacheError, Weighted};
use dumbvec_error::{DumbvecError, ErrorCodes};
use dumbvec_storage::{PutOptions, Storage, StorageError};
use dumbvec_types::{DocSet, DumbIndex};
use thiserror::Error;

use crate::codec::VectorType;
use crate::format::{deserialize, serialize, FormatError};

pub const INDEX_EXTENSION: &str = ".dumb_index";
pub const DOCSET_EXTENSION: &str = ".docs";

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Nothing stored under {0:?}")]
    NotFound(String),
    #[error("Unsupported doc set version {0}")]
    UnsupportedDocSetVersion(f64),
    #[error("Invalid doc set {name:?}: {source}")]
    InvalidDocSet {
        name: String,
        source: serde_json::Error,
    },
    #[error(transparent)]
    Format(#[from] FormatError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Cache(#[from] CacheError),
}

impl DumbvecError for StoreError {
    fn code(&self) -> ErrorCodes {
        match self {
            StoreError::NotFound(_) => ErrorCodes::NotFound,
            StoreError::UnsupportedDocSetVersion(_) => ErrorCodes::VersionMismatch,
            StoreError::InvalidDocSet { .. } => ErrorCodes::DataLoss,
            StoreError::Format(e) => e.code(),
            StoreError::Storage(e) => e.code(),
            StoreError::Cache(e) => e.code(),
        }
    }
}

/// Replaces characters that are unsafe in file and object names with `_`.
pub fn sanitize_name(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c => c,
        })
        .collect()
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WriteOutcome {
    Written,
    /// The tier already held a value and overwrite was not requested.
    Skipped,
}

/// One place a named value can live.
#[async_trait]
pub trait Tier<T>: Send + Sync {
    fn name(&self) -> &str;
    async fn read(&self, name: &str) -> Result<Option<T>, StoreError>;
    async fn exists(&self, name: &str) -> Result<bool, StoreError>;
    async fn write(&self, name: &str, value: &T, overwrite: bool)
        -> Result<WriteOutcome, StoreError>;
}

/// A tier backed by a caller-owned cache.
pub struct CacheTier<T>
where
    T: Clone + Send + Sync + Weighted + 'static,
{
    name: String,
    cache: Arc<dyn Cache<String, T>>,
}

impl<T> CacheTier<T>
where
    T: Clone + Send + Sync + Weighted + 'static,
{
    pub fn new(name: impl Into<String>, cache: Arc<dyn Cache<String, T>>) -> Self {
        CacheTier {
            name: name.into(),
            cache,
        }
    }
}

#[async_trait]
impl<T> Tier<T> for CacheTier<T>
where
    T: Clone + Send + Sync + Weighted + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn read(&self, name: &str) -> Result<Option<T>, StoreError> {
        Ok(self.cache.get(&name.to_string()).await?)
    }

    async fn exists(&self, name: &str) -> Result<bool, StoreError> {
        Ok(self.cache.get(&name.to_string()).await?.is_some())
    }

    async fn write(
        &self,
        name: &str,
        value: &T,
        overwrite: bool,
    ) -> Result<WriteOutcome, StoreError> {
        if !overwrite && self.exists(name).await? {
            return Ok(WriteOutcome::Skipped);
        }
        self.cache.insert(name.to_string(), value.clone()).await;
        Ok(WriteOutcome::Written)
    }
}

/// How a value is laid out in a blob.
pub trait Persist: Sized {
    const EXTENSION: &'static str;
    type Options: Clone + Send + Sync;

    fn to_bytes(&self, name: &str, options: &Self::Options) -> Result<Vec<u8>, StoreError>;
    fn from_bytes(name: &str, bytes: &[u8]) -> Result<Self, StoreError>;
}

impl Persist for DumbIndex {
    const EXTENSION: &'static str = INDEX_EXTENSION;
    type Options = VectorType;

    fn to_bytes(&self, _: &str, vector_type: &VectorType) -> Result<Vec<u8>, StoreError> {
        Ok(serialize(self, *vector_type)?)
    }

    fn from_bytes(_: &str, bytes: &[u8]) -> Result<Self, StoreError> {
        Ok(deserialize(bytes)?)
    }
}

impl Persist for DocSet {
    const EXTENSION: &'static str = DOCSET_EXTENSION;
    type Options = ();

    fn to_bytes(&self, name: &str, _: &()) -> Result<Vec<u8>, StoreError> {
        serde_json::to_vec(self).map_err(|source| StoreError::InvalidDocSet {
            name: name.to_string(),
            source,
        })
    }

    fn from_bytes(name: &str, bytes: &[u8]) -> Result<Self, StoreError> {
        let docs: DocSet =
            serde_json::from_slice(bytes).map_err(|source| StoreError::InvalidDocSet {
                name: name.to_string(),
                source,
            })?;
        if !docs.is_supported_version() {
            return Err(StoreError::UnsupportedDocSetVersion(docs.version));
        }
        Ok(docs)
    }
}

/// A tier that persists values as blobs under
/// `{prefix}/{sanitized name}{extension}`.
pub struct StorageTier<T: Persist> {
    name: String,
    storage: Storage,
    prefix: String,
    options: T::Options,
    _value: PhantomData<fn() -> T>,
}

impl<T: Persist> StorageTier<T> {
    pub fn new(
        name: impl Into<String>,
        storage: Storage,
        prefix: impl Into<String>,
        options: T::Options,
    ) -> Self {
        StorageTier {
            name: name.into(),
            storage,
            prefix: prefix.into(),
            options,
            _value: PhantomData,
        }
    }

    pub fn key(&self, name: &str) -> String {
        let file = format!("{}{}", sanitize_name(name), T::EXTENSION);
        let prefix = self.prefix.trim_end_matches('/');
        if prefix.is_empty() {
            file
        } else {
            format!("{prefix}/{file}")
        }
    }
}

#[async_trait]
impl<T> Tier<T> for StorageTier<T>
where
    T: Persist + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn read(&self, name: &str) -> Result<Option<T>, StoreError> {
        let key = self.key(name);
        match self.storage.get(&key).await {
            Ok(bytes) => T::from_bytes(name, &bytes).map(Some).inspect_err(|e| {
                tracing::error!(key = %key, error = %e, "Failed to decode stored value");
            }),
            Err(StorageError::NotFound { .. }) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn exists(&self, name: &str) -> Result<bool, StoreError> {
        Ok(self.storage.exists(&self.key(name)).await?)
    }

    async fn write(
        &self,
        name: &str,
        value: &T,
        overwrite: bool,
    ) -> Result<WriteOutcome, StoreError> {
        let key = self.key(name);
        let bytes = value.to_bytes(name, &self.options)?;
        let options = if overwrite {
            PutOptions::default()
        } else {
            PutOptions::if_not_exists()
        };
        match self.storage.put_bytes(&key, bytes, options).await {
            Ok(()) => Ok(WriteOutcome::Written),
            Err(StorageError::AlreadyExists { .. }) => {
                tracing::info!(tier = %self.name, key = %key, "Already stored, skipping write");
                Ok(WriteOutcome::Skipped)
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// Tiers tried in order.
pub struct Chain<T> {
    tiers: Vec<Arc<dyn Tier<T>>>,
}

impl<T> Default for Chain<T> {
    fn default() -> Self {
        Chain { tiers: Vec::new() }
    }
}

impl<T> Chain<T>
where
    T: Send + Sync,
{
    pub fn new(tiers: Vec<Arc<dyn Tier<T>>>) -> Self {
        Chain { tiers }
    }

    pub fn with_tier(mut self, tier: Arc<dyn Tier<T>>) -> Self {
        self.tiers.push(tier);
        self
    }

    pub fn tiers(&self) -> impl Iterator<Item = &str> {
        self.tiers.iter().map(|t| t.name())
    }

    /// Reads `name` from the first tier that has it and back-fills every
    /// tier before it. A failed back-fill is logged and does not fail the
    /// read.
    pub async fn read(&self, name: &str) -> Result<Option<T>, StoreError> {
        for (depth, tier) in self.tiers.iter().enumerate() {
            let Some(value) = tier.read(name).await? else {
                continue;
            };
            tracing::debug!(name, tier = tier.name(), "Read from tier");
            for earlier in &self.tiers[..depth] {
                if let Err(e) = earlier.write(name, &value, false).await {
                    tracing::warn!(name, tier = earlier.name(), error = %e, "Back-fill failed");
                }
            }
            return Ok(Some(value));
        }
        Ok(None)
    }

    pub async fn read_required(&self, name: &str) -> Result<T, StoreError> {
        self.read(name)
            .await?
            .ok_or_else(|| StoreError::NotFound(name.to_string()))
    }

    pub async fn exists(&self, name: &str) -> Result<bool, StoreError> {
        for tier in &self.tiers {
            if tier.exists(name).await? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Writes `value` to every tier. Without `overwrite`, tiers that already
    /// hold `name` keep their value.
    pub async fn write(
        &self,
        name: &str,
        value: &T,
        overwrite: bool,
    ) -> Result<Vec<(String, WriteOutcome)>, StoreError> {
        let mut outcomes = Vec::with_capacity(self.tiers.len());
        for tier in &self.tiers {
            let outcome = tier.write(name, value, overwrite).await?;
            outcomes.push((tier.name().to_string(), outcome));
        }
        Ok(outcomes)
    }
}

pub type IndexChain = Chain<DumbIndex>;
pub type DocSetChain = Chain<DocSet>;

use std::hash::Hash;
use std::sync::Arc;

use dumbvec_config::Configurable;
use dumbvec_error::{DumbvecError, ErrorCodes};
use serde::{Deserialize, Serialize};
use thiserror::Error;

mod foyer;
mod nop;
mod unbounded;

pub use foyer::{FoyerCacheConfig, FoyerPlainCache};
pub use nop::NopCache;
pub use unbounded::{UnboundedCache, UnboundedCacheConfig};

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Invalid cache config: {0}")]
    InvalidCacheConfig(String),
}

impl DumbvecError for CacheError {
    fn code(&self) -> ErrorCodes {
        match self {
            CacheError::InvalidCacheConfig(_) => ErrorCodes::InvalidArgument,
        }
    }
}

/// Which cache to build. Caches are always owned by whoever builds them;
/// there is no process-wide instance.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheConfig {
    Unbounded(UnboundedCacheConfig),
    Memory(FoyerCacheConfig),
    #[default]
    Nop,
}

/// A cache offers async access to a map of keys to values.
///
/// Values are cloned out on `get`, so cheap-to-clone values (or values behind
/// an `Arc`) are preferred.
#[async_trait::async_trait]
pub trait Cache<K, V>: Send + Sync
where
    K: Clone + Send + Sync + Eq + PartialEq + Hash + 'static,
    V: Clone + Send + Sync + Weighted + 'static,
{
    async fn get(&self, key: &K) -> Result<Option<V>, CacheError>;
    async fn insert(&self, key: K, value: V);
    async fn remove(&self, key: &K);
    async fn clear(&self) -> Result<(), CacheError>;
}

/// The approximate cost of keeping a value in memory, in bytes.
pub trait Weighted {
    fn weight(&self) -> usize;
}

impl Weighted for String {
    fn weight(&self) -> usize {
        self.len()
    }
}

impl<T: Weighted> Weighted for Vec<T> {
    fn weight(&self) -> usize {
        self.iter().map(Weighted::weight).sum::<usize>() + std::mem::size_of::<Self>()
    }
}

impl<T: Weighted> Weighted for Arc<T> {
    fn weight(&self) -> usize {
        self.as_ref().weight()
    }
}

pub async fn from_config<K, V>(
    config: &CacheConfig,
) -> Result<Box<dyn Cache<K, V>>, Box<dyn DumbvecError>>
where
    K: Clone + Send + Sync + Eq + PartialEq + Hash + 'static,
    V: Clone + Send + Sync + Weighted + 'static,
{
    match config {
        CacheConfig::Unbounded(unbounded) => Ok(Box::new(unbounded.build::<K, V>())),
        CacheConfig::Memory(foyer) => Ok(Box::new(
            FoyerPlainCache::<K, V>::try_from_config(foyer).await?,
        )),
        CacheConfig::Nop => Ok(Box::new(NopCache)),
    }
}

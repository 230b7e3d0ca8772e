use std::fmt::Debug;
use std::hash::Hash;

use async_trait::async_trait;
use dumbvec_config::Configurable;
use dumbvec_error::DumbvecError;
use foyer::CacheBuilder;
use serde::{Deserialize, Serialize};

use super::{CacheError, Weighted};

const fn default_capacity() -> usize {
    64 * 1024 * 1024
}

const fn default_shards() -> usize {
    16
}

fn default_name() -> String {
    String::from("foyer")
}

#[derive(Deserialize, Debug, Clone, Serialize)]
pub struct FoyerCacheConfig {
    /// Name of the cache, used in log lines.
    #[serde(default = "default_name")]
    pub name: String,

    /// In-memory cache capacity. (weighted units)
    #[serde(default = "default_capacity")]
    pub capacity: usize,

    /// Number of shards the in-memory cache is split into.
    #[serde(default = "default_shards")]
    pub shards: usize,
}

impl Default for FoyerCacheConfig {
    fn default() -> Self {
        FoyerCacheConfig {
            name: default_name(),
            capacity: default_capacity(),
            shards: default_shards(),
        }
    }
}

/// A weighted in-memory cache backed by foyer. Once `capacity` weight units
/// are in use, inserts evict the least recently used entries.
#[derive(Clone)]
pub struct FoyerPlainCache<K, V>
where
    K: Clone + Send + Sync + Eq + PartialEq + Hash + 'static,
    V: Clone + Send + Sync + Weighted + 'static,
{
    name: String,
    cache: foyer::Cache<K, V>,
}

impl<K, V> Debug for FoyerPlainCache<K, V>
where
    K: Clone + Send + Sync + Eq + PartialEq + Hash + 'static,
    V: Clone + Send + Sync + Weighted + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FoyerPlainCache")
            .field("name", &self.name)
            .finish()
    }
}

impl<K, V> FoyerPlainCache<K, V>
where
    K: Clone + Send + Sync + Eq + PartialEq + Hash + 'static,
    V: Clone + Send + Sync + Weighted + 'static,
{
    /// Build an in-memory cache.
    pub fn memory(config: &FoyerCacheConfig) -> Result<FoyerPlainCache<K, V>, CacheError> {
        if config.capacity == 0 || config.shards == 0 {
            return Err(CacheError::InvalidCacheConfig(format!(
                "cache {} needs a non-zero capacity and shard count",
                config.name
            )));
        }
        let cache = CacheBuilder::new(config.capacity)
            .with_name(config.name.clone())
            .with_shards(config.shards)
            .with_weighter(|_: &_, v: &V| v.weight())
            .build();
        tracing::debug!(
            name = %config.name,
            capacity = config.capacity,
            shards = config.shards,
            "Built in-memory cache"
        );
        Ok(FoyerPlainCache {
            name: config.name.clone(),
            cache,
        })
    }
}

#[async_trait]
impl<K, V> Configurable<FoyerCacheConfig> for FoyerPlainCache<K, V>
where
    K: Clone + Send + Sync + Eq + PartialEq + Hash + 'static,
    V: Clone + Send + Sync + Weighted + 'static,
{
    async fn try_from_config(
        config: &FoyerCacheConfig,
    ) -> Result<Self, Box<dyn DumbvecError>> {
        FoyerPlainCache::memory(config).map_err(|e| e.boxed())
    }
}

#[async_trait]
impl<K, V> super::Cache<K, V> for FoyerPlainCache<K, V>
where
    K: Clone + Send + Sync + Eq + PartialEq + Hash + 'static,
    V: Clone + Send + Sync + Weighted + 'static,
{
    async fn get(&self, key: &K) -> Result<Option<V>, CacheError> {
        let res = self.cache.get(key).map(|v| v.value().clone());
        tracing::trace!(name = %self.name, hit = res.is_some(), "cache get");
        Ok(res)
    }

    async fn insert(&self, key: K, value: V) {
        self.cache.insert(key, value);
    }

    async fn remove(&self, key: &K) {
        self.cache.remove(key);
    }

    async fn clear(&self) -> Result<(), CacheError> {
        self.cache.clear();
        Ok(())
    }
}

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;

use parking_lot::RwLock;

use super::{CacheError, Weighted};

/// A zero-configuration cache that doesn't evict.
/// Mostly useful for tests and one-shot command line runs.
#[derive(Debug, Default, Clone, serde::Deserialize, serde::Serialize)]
pub struct UnboundedCacheConfig {}

impl UnboundedCacheConfig {
    pub fn build<K, V>(&self) -> UnboundedCache<K, V>
    where
        K: Clone + Send + Sync + Eq + PartialEq + Hash + 'static,
        V: Clone + Send + Sync + Weighted + 'static,
    {
        UnboundedCache::new(self)
    }
}

/// A zero-configuration cache that doesn't evict.
#[derive(Clone)]
pub struct UnboundedCache<K, V>
where
    K: Clone + Send + Sync + Eq + PartialEq + Hash + 'static,
    V: Clone + Send + Sync + Weighted + 'static,
{
    cache: Arc<RwLock<HashMap<K, V>>>,
}

impl<K, V> UnboundedCache<K, V>
where
    K: Clone + Send + Sync + Eq + PartialEq + Hash + 'static,
    V: Clone + Send + Sync + Weighted + 'static,
{
    pub fn new(_: &UnboundedCacheConfig) -> Self {
        Self {
            cache: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn len(&self) -> usize {
        self.cache.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.read().is_empty()
    }
}

#[async_trait::async_trait]
impl<K, V> super::Cache<K, V> for UnboundedCache<K, V>
where
    K: Clone + Send + Sync + Eq + PartialEq + Hash + 'static,
    V: Clone + Send + Sync + Weighted + 'static,
{
    async fn get(&self, key: &K) -> Result<Option<V>, CacheError> {
        let read_guard = self.cache.read();
        let value = read_guard.get(key);
        Ok(value.cloned())
    }

    async fn insert(&self, key: K, value: V) {
        self.cache.write().insert(key, value);
    }

    async fn remove(&self, key: &K) {
        self.cache.write().remove(key);
    }

    async fn clear(&self) -> Result<(), CacheError> {
        self.cache.write().clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Cache;

    #[tokio::test]
    async fn test_clones_share_state() {
        let cache = UnboundedCacheConfig {}.build::<String, String>();
        let other = cache.clone();
        cache.insert("a".to_string(), "1".to_string()).await;
        assert_eq!(other.get(&"a".to_string()).await.unwrap(), Some("1".to_string()));
        other.remove(&"a".to_string()).await;
        assert!(cache.is_empty());
    }
}

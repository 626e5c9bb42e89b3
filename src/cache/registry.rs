//! Cache registry - Central management for all caches.

use std::any::Any;
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, warn};

use super::{CacheConfig, TypedCache};

/// Type-erased view of a registered cache, enough for stats and logging.
trait CacheStats: Send + Sync {
    fn entry_count(&self) -> u64;
    fn as_any(&self) -> &dyn Any;
}

impl<K, V> CacheStats for TypedCache<K, V>
where
    K: Hash + Eq + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn entry_count(&self) -> u64 {
        TypedCache::entry_count(self)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Central registry of named caches.
///
/// ## Example
///
/// ```rust,ignore
/// let registry = CacheRegistry::new();
/// let members: TypedCache<(i64, u64), MemberStatus> =
///     registry.get_or_create("membership", CacheConfig::membership());
/// ```
#[derive(Clone, Default)]
pub struct CacheRegistry {
    caches: Arc<RwLock<HashMap<String, Box<dyn CacheStats>>>>,
}

impl CacheRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get an existing cache or create a new one if it doesn't exist.
    ///
    /// Re-registering a name with different key/value types replaces the old
    /// cache rather than panicking.
    pub fn get_or_create<K, V>(&self, name: &str, config: CacheConfig) -> TypedCache<K, V>
    where
        K: Hash + Eq + Send + Sync + 'static,
        V: Clone + Send + Sync + 'static,
    {
        let mut caches = self.caches.write();

        if let Some(existing) = caches.get(name) {
            if let Some(cache) = existing.as_any().downcast_ref::<TypedCache<K, V>>() {
                return cache.clone();
            }
            warn!(
                "Cache '{}' re-registered as {}, replacing it",
                name,
                std::any::type_name::<TypedCache<K, V>>()
            );
        }

        debug!("Creating cache: {}", name);
        let cache = TypedCache::new(name, config);
        caches.insert(name.to_string(), Box::new(cache.clone()));
        cache
    }

    /// Entry counts per cache, sorted by name.
    pub fn stats(&self) -> Vec<(String, u64)> {
        let mut stats: Vec<_> = self
            .caches
            .read()
            .iter()
            .map(|(name, cache)| (name.clone(), cache.entry_count()))
            .collect();
        stats.sort();
        stats
    }
}

impl std::fmt::Debug for CacheRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let caches = self.caches.read();
        f.debug_struct("CacheRegistry")
            .field("cache_count", &caches.len())
            .field("cache_names", &caches.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_name_returns_same_cache() {
        let registry = CacheRegistry::new();

        let a: TypedCache<u64, u8> = registry.get_or_create("welcomes", CacheConfig::default());
        a.insert(1, 1);
        let b: TypedCache<u64, u8> = registry.get_or_create("welcomes", CacheConfig::default());

        assert_eq!(b.get(&1), Some(1));
        assert_eq!(registry.stats().len(), 1);
    }

    #[test]
    fn test_type_mismatch_replaces() {
        let registry = CacheRegistry::new();

        let a: TypedCache<u64, u8> = registry.get_or_create("shared", CacheConfig::default());
        a.insert(1, 1);
        let b: TypedCache<u64, String> = registry.get_or_create("shared", CacheConfig::default());

        assert_eq!(b.get(&1), None);
        assert_eq!(registry.stats().len(), 1);
    }
}

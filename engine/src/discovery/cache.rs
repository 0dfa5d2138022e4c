//! Auto-discovery's one shared mutable resource: a label -> `NodeableConfig`
//! cache. Reads are concurrent, writes are exclusive per entry, invalidation
//! is explicit (a `clear`/`invalidate` call) or TTL-based — `dashmap::DashMap`
//! gives per-shard locking instead of a crate-wide `RwLock<HashMap<_>>`, the
//! same trade the teacher's `CacheManager` makes for its own hot read path.

use dashmap::DashMap;
use raqe_models::NodeableConfig;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

struct Entry {
    config: NodeableConfig,
    cached_at: Instant,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

pub struct DiscoveryCache {
    entries: DashMap<String, Entry>,
    ttl: Option<Duration>,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl DiscoveryCache {
    pub fn new(ttl: Option<Duration>) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    pub fn get(&self, label: &str) -> Option<NodeableConfig> {
        if let Some(entry) = self.entries.get(label) {
            if let Some(ttl) = self.ttl {
                if entry.cached_at.elapsed() > ttl {
                    drop(entry);
                    self.entries.remove(label);
                    self.evictions.fetch_add(1, Ordering::Relaxed);
                    self.misses.fetch_add(1, Ordering::Relaxed);
                    return None;
                }
            }
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Some(entry.config.clone());
        }
        self.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    pub fn insert(&self, label: String, config: NodeableConfig) {
        self.entries.insert(label, Entry { config, cached_at: Instant::now() });
    }

    /// Manual invalidation on schema change, per distilled §4.1, "Cache
    /// invalidation is manual ... or TTL-based".
    pub fn invalidate(&self, label: &str) {
        if self.entries.remove(label).is_some() {
            self.evictions.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn clear(&self) {
        self.evictions.fetch_add(self.entries.len() as u64, Ordering::Relaxed);
        self.entries.clear();
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
        }
    }
}

impl Default for DiscoveryCache {
    fn default() -> Self {
        Self::new(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use raqe_models::NodeableConfig;

    #[test]
    fn hits_and_misses_are_tracked() {
        let cache = DiscoveryCache::new(None);
        assert!(cache.get("Person").is_none());
        cache.insert("Person".to_string(), NodeableConfig::stub("Person"));
        assert!(cache.get("Person").is_some());
        let stats = cache.stats();
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.hits, 1);
    }

    #[test]
    fn ttl_expires_entries() {
        let cache = DiscoveryCache::new(Some(Duration::from_millis(5)));
        cache.insert("Person".to_string(), NodeableConfig::stub("Person"));
        std::thread::sleep(Duration::from_millis(15));
        assert!(cache.get("Person").is_none());
        assert_eq!(cache.stats().evictions, 1);
    }

    #[test]
    fn invalidate_removes_single_entry() {
        let cache = DiscoveryCache::new(None);
        cache.insert("Person".to_string(), NodeableConfig::stub("Person"));
        cache.insert("Team".to_string(), NodeableConfig::stub("Team"));
        cache.invalidate("Person");
        assert!(cache.get("Person").is_none());
        assert!(cache.get("Team").is_some());
    }
}

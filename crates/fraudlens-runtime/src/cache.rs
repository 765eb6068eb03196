//! TTL cache with single-flight computation
//!
//! Backs the rule cache, the per-user behavioral profile cache and the IP
//! reputation cache. Concurrent `get_or_compute` calls for the same key share
//! one computation: the first caller computes, the others wait and then read
//! the stored value. Failed computations are not cached.
//!
//! Every `invalidate` and `clear` bumps an epoch. A computation that started
//! before the bump returns its value to its caller but does not store it.

use dashmap::DashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Cache entry with value and expiration time
#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    expires_at: Instant,
}

impl<V> CacheEntry<V> {
    fn new(value: V, ttl: Duration) -> Self {
        Self {
            value,
            expires_at: Instant::now() + ttl,
        }
    }

    fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }
}

/// Cache hit/miss statistics
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    /// Computations actually run (misses that were not coalesced)
    pub computations: u64,
    pub entries: usize,
}

impl CacheStats {
    /// Hit rate in [0, 1]
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

#[derive(Debug, Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    computations: AtomicU64,
}

/// Expired entries are purged every this many `get_or_compute` calls
const DEFAULT_PURGE_INTERVAL: u64 = 1024;

/// Concurrent TTL cache
pub struct TtlCache<K, V> {
    ttl: Duration,
    entries: DashMap<K, CacheEntry<V>>,
    in_flight: DashMap<K, Arc<Mutex<()>>>,
    counters: Counters,
    epoch: AtomicU64,
    operations: AtomicU64,
    purge_interval: u64,
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    /// Create a cache whose entries live for `ttl`
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: DashMap::new(),
            in_flight: DashMap::new(),
            counters: Counters::default(),
            epoch: AtomicU64::new(0),
            operations: AtomicU64::new(0),
            purge_interval: DEFAULT_PURGE_INTERVAL,
        }
    }

    /// Purge expired entries every `interval` calls to `get_or_compute`
    pub fn with_purge_interval(mut self, interval: u64) -> Self {
        self.purge_interval = interval.max(1);
        self
    }

    /// Entry lifetime
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Fresh value for the key, if any
    pub fn get(&self, key: &K) -> Option<V> {
        let value = self.fresh(key);
        if value.is_some() {
            self.counters.hits.fetch_add(1, Ordering::Relaxed);
        }
        value
    }

    /// Store a value, replacing any previous entry
    pub fn insert(&self, key: K, value: V) {
        self.entries.insert(key, CacheEntry::new(value, self.ttl));
    }

    /// Return the cached value or compute it, running at most one
    /// computation per key at a time
    pub async fn get_or_compute<F, Fut, E>(&self, key: K, compute: F) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        let operation = self.operations.fetch_add(1, Ordering::Relaxed) + 1;
        if operation % self.purge_interval == 0 {
            self.purge_expired();
        }

        if let Some(value) = self.fresh(&key) {
            self.counters.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(value);
        }
        self.counters.misses.fetch_add(1, Ordering::Relaxed);

        let lock = self
            .in_flight
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let _guard = lock.lock().await;

        // Another caller may have finished while we waited
        if let Some(value) = self.fresh(&key) {
            return Ok(value);
        }

        self.counters.computations.fetch_add(1, Ordering::Relaxed);
        let epoch = self.epoch.load(Ordering::SeqCst);
        let result = compute().await;

        if let Ok(value) = &result {
            // The shard stays locked until the insert, so an invalidation
            // that bumps the epoch after this check removes the new entry.
            let entry = self.entries.entry(key.clone());
            if self.epoch.load(Ordering::SeqCst) == epoch {
                entry.insert(CacheEntry::new(value.clone(), self.ttl));
            }
        }
        self.in_flight
            .remove_if(&key, |_, current| Arc::ptr_eq(current, &lock));

        result
    }

    /// Drop the entry for a key
    pub fn invalidate(&self, key: &K) {
        self.epoch.fetch_add(1, Ordering::SeqCst);
        self.entries.remove(key);
    }

    /// Drop every entry
    pub fn clear(&self) {
        self.epoch.fetch_add(1, Ordering::SeqCst);
        self.entries.clear();
    }

    /// Drop expired entries
    pub fn purge_expired(&self) {
        self.entries.retain(|_, entry| !entry.is_expired());
    }

    /// Number of stored entries, including expired ones not yet purged
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing is stored
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Snapshot of the statistics
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            computations: self.counters.computations.load(Ordering::Relaxed),
            entries: self.entries.len(),
        }
    }

    fn fresh(&self, key: &K) -> Option<V> {
        let entry = self.entries.get(key)?;
        if entry.is_expired() {
            drop(entry);
            self.entries.remove_if(key, |_, e| e.is_expired());
            return None;
        }
        Some(entry.value.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[tokio::test]
    async fn test_get_or_compute_caches_value() {
        let cache: TtlCache<String, u32> = TtlCache::new(Duration::from_secs(60));

        let v1: Result<u32, ()> = cache.get_or_compute("k".to_string(), || async { Ok(7) }).await;
        let v2: Result<u32, ()> = cache.get_or_compute("k".to_string(), || async { Ok(8) }).await;

        assert_eq!(v1, Ok(7));
        assert_eq!(v2, Ok(7));
        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.computations, 1);
    }

    #[tokio::test]
    async fn test_errors_are_not_cached() {
        let cache: TtlCache<&'static str, u32> = TtlCache::new(Duration::from_secs(60));

        let failed: Result<u32, String> = cache
            .get_or_compute("k", || async { Err("boom".to_string()) })
            .await;
        assert!(failed.is_err());
        assert!(cache.get(&"k").is_none());

        let ok: Result<u32, String> = cache.get_or_compute("k", || async { Ok(1) }).await;
        assert_eq!(ok, Ok(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_entries_expire() {
        let cache: TtlCache<&'static str, u32> = TtlCache::new(Duration::from_secs(30));
        cache.insert("k", 1);
        assert_eq!(cache.get(&"k"), Some(1));

        tokio::time::advance(Duration::from_secs(31)).await;
        assert_eq!(cache.get(&"k"), None);
    }

    #[tokio::test]
    async fn test_invalidate() {
        let cache: TtlCache<&'static str, u32> = TtlCache::new(Duration::from_secs(30));
        cache.insert("a", 1);
        cache.insert("b", 2);
        cache.invalidate(&"a");
        assert!(cache.get(&"a").is_none());
        assert_eq!(cache.get(&"b"), Some(2));
        cache.clear();
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_invalidate_during_computation_is_not_overwritten() {
        let cache: Arc<TtlCache<&'static str, u32>> =
            Arc::new(TtlCache::new(Duration::from_secs(60)));
        let (started_tx, started_rx) = tokio::sync::oneshot::channel();
        let (release_tx, release_rx) = tokio::sync::oneshot::channel::<()>();

        let worker = {
            let cache = Arc::clone(&cache);
            tokio::spawn(async move {
                cache
                    .get_or_compute("rules", || async move {
                        let _ = started_tx.send(());
                        let _ = release_rx.await;
                        Ok::<u32, ()>(1)
                    })
                    .await
            })
        };

        started_rx.await.unwrap();
        cache.invalidate(&"rules");
        release_tx.send(()).unwrap();

        // The caller still gets its value, but the stale result is not stored
        assert_eq!(worker.await.unwrap(), Ok(1));
        assert!(cache.get(&"rules").is_none());

        let fresh: Result<u32, ()> = cache.get_or_compute("rules", || async { Ok(2) }).await;
        assert_eq!(fresh, Ok(2));
        assert_eq!(cache.get(&"rules"), Some(2));
    }

    #[tokio::test]
    async fn test_clear_during_computation_is_not_overwritten() {
        let cache: Arc<TtlCache<&'static str, u32>> =
            Arc::new(TtlCache::new(Duration::from_secs(60)));
        let (started_tx, started_rx) = tokio::sync::oneshot::channel();
        let (release_tx, release_rx) = tokio::sync::oneshot::channel::<()>();

        let worker = {
            let cache = Arc::clone(&cache);
            tokio::spawn(async move {
                cache
                    .get_or_compute("user_1", || async move {
                        let _ = started_tx.send(());
                        let _ = release_rx.await;
                        Ok::<u32, ()>(1)
                    })
                    .await
            })
        };

        started_rx.await.unwrap();
        cache.clear();
        release_tx.send(()).unwrap();

        assert_eq!(worker.await.unwrap(), Ok(1));
        assert!(cache.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_entries_are_purged_without_reads() {
        let cache: TtlCache<&'static str, u32> =
            TtlCache::new(Duration::from_secs(30)).with_purge_interval(2);
        cache.insert("ip_1", 1);
        cache.insert("ip_2", 2);

        tokio::time::advance(Duration::from_secs(31)).await;
        assert_eq!(cache.len(), 2);

        let _: Result<u32, ()> = cache.get_or_compute("ip_3", || async { Ok(3) }).await;
        let _: Result<u32, ()> = cache.get_or_compute("ip_3", || async { Ok(3) }).await;

        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get(&"ip_3"), Some(3));
    }

    #[tokio::test]
    async fn test_single_flight() {
        let cache: Arc<TtlCache<&'static str, usize>> =
            Arc::new(TtlCache::new(Duration::from_secs(60)));
        let calls = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..10 {
            let cache = Arc::clone(&cache);
            let calls = Arc::clone(&calls);
            handles.push(tokio::spawn(async move {
                cache
                    .get_or_compute("user", || async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(20)).await;
                        Ok::<usize, ()>(42)
                    })
                    .await
            }));
        }

        for handle in handles {
            assert_eq!(handle.await.unwrap(), Ok(42));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}

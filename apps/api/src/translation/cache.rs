//! In-memory TTL cache with a bounded entry count.
//!
//! Expiry is lazy (checked on `get`); `purge_expired` exists for the optional
//! background sweeper. When the cache grows past `max_entries` the
//! oldest-inserted entries are evicted first. Nothing survives a restart.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Longest lifetime an entry can get; larger TTLs are clamped to it.
pub const MAX_TTL: Duration = Duration::from_secs(365 * 24 * 60 * 60);

struct Entry<V> {
    value: V,
    expires_at: Instant,
    seq: u64,
}

struct Inner<V> {
    entries: HashMap<String, Entry<V>>,
    /// Insertion order. May hold stale `(seq, key)` pairs for keys that were
    /// overwritten or deleted; those are skipped on eviction.
    order: VecDeque<(u64, String)>,
    next_seq: u64,
}

pub struct TtlCache<V> {
    inner: Mutex<Inner<V>>,
    max_entries: usize,
    default_ttl: Duration,
}

impl<V: Clone> TtlCache<V> {
    pub fn new(max_entries: usize, default_ttl: Duration) -> Self {
        Self {
            inner: Mutex::new(Inner {
                entries: HashMap::new(),
                order: VecDeque::new(),
                next_seq: 0,
            }),
            max_entries: max_entries.max(1),
            default_ttl,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner<V>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn get(&self, key: &str) -> Option<V> {
        let mut inner = self.lock();
        let expired = match inner.entries.get(key) {
            Some(entry) if entry.expires_at > Instant::now() => return Some(entry.value.clone()),
            Some(_) => true,
            None => false,
        };
        if expired {
            inner.entries.remove(key);
        }
        None
    }

    pub fn set(&self, key: impl Into<String>, value: V, ttl: Duration) {
        let key = key.into();
        let now = Instant::now();
        let expires_at = now.checked_add(ttl.min(MAX_TTL)).unwrap_or(now);
        let mut inner = self.lock();
        let seq = inner.next_seq;
        inner.next_seq += 1;

        inner.entries.insert(
            key.clone(),
            Entry {
                value,
                expires_at,
                seq,
            },
        );
        inner.order.push_back((seq, key));

        while inner.entries.len() > self.max_entries {
            let Some((seq, key)) = inner.order.pop_front() else {
                break;
            };
            if inner.entries.get(&key).is_some_and(|e| e.seq == seq) {
                inner.entries.remove(&key);
                debug!("cache full, evicted oldest entry");
            }
        }

        // Keep the order queue from growing without bound under overwrites.
        if inner.order.len() > self.max_entries.saturating_mul(2) + 16 {
            let Inner { entries, order, .. } = &mut *inner;
            order.retain(|(seq, key)| entries.get(key).is_some_and(|e| e.seq == *seq));
        }
    }

    /// `set` with the cache's default TTL.
    pub fn insert(&self, key: impl Into<String>, value: V) {
        self.set(key, value, self.default_ttl);
    }

    #[cfg(test)]
    pub fn delete(&self, key: &str) -> bool {
        self.lock().entries.remove(key).is_some()
    }

    /// Drops every expired entry and returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut inner = self.lock();
        let before = inner.entries.len();
        inner.entries.retain(|_, e| e.expires_at > now);
        let Inner { entries, order, .. } = &mut *inner;
        order.retain(|(seq, key)| entries.get(key).is_some_and(|e| e.seq == *seq));
        before - entries.len()
    }

    /// Number of stored entries, including expired ones not yet purged.
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Periodically purges expired entries until `shutdown` is cancelled.
pub fn spawn_sweeper<V>(
    name: &'static str,
    cache: Arc<TtlCache<V>>,
    every: Duration,
    shutdown: CancellationToken,
) -> JoinHandle<()>
where
    V: Clone + Send + 'static,
{
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.tick().await;
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    let removed = cache.purge_expired();
                    if removed > 0 {
                        debug!(
                            "{name} cache sweep removed {removed} expired entries, {} left",
                            cache.len()
                        );
                    }
                }
            }
        }
        debug!("{name} cache sweeper stopped");
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const HOUR: Duration = Duration::from_secs(3600);

    #[tokio::test(start_paused = true)]
    async fn test_get_before_and_after_expiry() {
        let cache = TtlCache::new(10, HOUR);
        cache.set("k", "v".to_string(), Duration::from_secs(60));
        assert_eq!(cache.get("k").as_deref(), Some("v"));

        tokio::time::advance(Duration::from_secs(61)).await;
        assert_eq!(cache.get("k"), None);
        // Lazy expiry removed it on access.
        assert_eq!(cache.len(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_insert_uses_default_ttl() {
        let cache = TtlCache::new(10, Duration::from_secs(5));
        cache.insert("k", 1);
        tokio::time::advance(Duration::from_secs(4)).await;
        assert_eq!(cache.get("k"), Some(1));
        tokio::time::advance(Duration::from_secs(2)).await;
        assert_eq!(cache.get("k"), None);
    }

    #[test]
    fn test_evicts_oldest_inserted_first() {
        let cache = TtlCache::new(2, HOUR);
        cache.insert("a", 1);
        cache.insert("b", 2);
        cache.insert("c", 3);
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get("a"), None);
        assert_eq!(cache.get("b"), Some(2));
        assert_eq!(cache.get("c"), Some(3));
    }

    #[test]
    fn test_overwrite_refreshes_insertion_order() {
        let cache = TtlCache::new(2, HOUR);
        cache.insert("a", 1);
        cache.insert("b", 2);
        cache.insert("a", 10);
        cache.insert("c", 3);
        assert_eq!(cache.get("a"), Some(10));
        assert_eq!(cache.get("b"), None);
        assert_eq!(cache.get("c"), Some(3));
    }

    #[test]
    fn test_reads_do_not_affect_eviction_order() {
        let cache = TtlCache::new(2, HOUR);
        cache.insert("a", 1);
        cache.insert("b", 2);
        assert_eq!(cache.get("a"), Some(1));
        cache.insert("c", 3);
        assert_eq!(cache.get("a"), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_huge_ttl_is_clamped_instead_of_overflowing() {
        let cache = TtlCache::new(10, Duration::from_secs(u64::MAX));
        cache.insert("k", 1);
        cache.set("m", 2, Duration::MAX);
        assert_eq!(cache.get("k"), Some(1));

        tokio::time::advance(MAX_TTL - Duration::from_secs(1)).await;
        assert_eq!(cache.get("m"), Some(2));
        tokio::time::advance(Duration::from_secs(2)).await;
        assert_eq!(cache.get("m"), None);
    }

    #[test]
    fn test_delete() {
        let cache = TtlCache::new(4, HOUR);
        cache.insert("a", 1);
        assert!(cache.delete("a"));
        assert!(!cache.delete("a"));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_order_queue_stays_bounded_under_overwrites() {
        let cache = TtlCache::new(2, HOUR);
        for i in 0..1000 {
            cache.insert("same", i);
        }
        assert_eq!(cache.get("same"), Some(999));
        assert!(cache.lock().order.len() <= 2 * 2 + 17);
    }

    #[tokio::test(start_paused = true)]
    async fn test_purge_expired() {
        let cache = TtlCache::new(10, HOUR);
        cache.set("short", 1, Duration::from_secs(1));
        cache.set("long", 2, Duration::from_secs(100));
        tokio::time::advance(Duration::from_secs(2)).await;

        assert_eq!(cache.purge_expired(), 1);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("long"), Some(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweeper_purges_and_stops() {
        let cache = Arc::new(TtlCache::new(10, HOUR));
        cache.set("k", 1, Duration::from_secs(1));
        let shutdown = CancellationToken::new();
        let handle = spawn_sweeper(
            "test",
            Arc::clone(&cache),
            Duration::from_secs(10),
            shutdown.clone(),
        );

        tokio::time::sleep(Duration::from_secs(11)).await;
        assert_eq!(cache.len(), 0);

        shutdown.cancel();
        handle.await.unwrap();
    }
}

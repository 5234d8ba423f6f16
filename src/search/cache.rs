//! Two-level resolve cache plus the unfiltered snapshot.
//!
//! Both levels evict in insertion order: entries are read with `peek`, which leaves
//! the LRU ordering untouched, so the least-recently-*inserted* entry goes first.

use fxhash::FxBuildHasher;
use lru::LruCache;
use std::hash::Hash;
use std::num::NonZeroUsize;

use crate::config::DEFAULT_CACHE_CAPACITY;
use crate::search::query::{DateKey, FullKey, ResolvedList};

/// Bounded map that evicts its oldest insertion once over capacity.
pub struct InsertionOrderCache<K: Hash + Eq, V> {
    inner: LruCache<K, V, FxBuildHasher>,
}

impl<K: Hash + Eq, V> InsertionOrderCache<K, V> {
    pub fn new(capacity: usize) -> Self {
        let cap = NonZeroUsize::new(capacity)
            .or(NonZeroUsize::new(DEFAULT_CACHE_CAPACITY))
            .unwrap_or(NonZeroUsize::MIN);
        Self {
            inner: LruCache::with_hasher(cap, FxBuildHasher::default()),
        }
    }

    /// Lookup without refreshing the entry's position.
    pub fn get(&self, key: &K) -> Option<&V> {
        self.inner.peek(key)
    }

    /// Insert, returning `true` if an older entry was evicted to make room.
    pub fn insert(&mut self, key: K, value: V) -> bool {
        let replacing = self.inner.contains(&key);
        let displaced = self.inner.push(key, value);
        !replacing && displaced.is_some()
    }

    pub fn clear(&mut self) {
        self.inner.clear();
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.inner.cap().get()
    }
}

/// Counters for observing how resolves were served.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub full_hits: u64,
    pub date_hits: u64,
    pub snapshot_hits: u64,
    /// Resolves that had to scan the message store.
    pub scans: u64,
    pub evictions: u64,
    pub invalidations: u64,
}

pub struct ResolveCache {
    full: InsertionOrderCache<FullKey, ResolvedList>,
    dated: InsertionOrderCache<DateKey, ResolvedList>,
    unfiltered: Option<ResolvedList>,
    /// Store epoch the entries were computed against.
    epoch: u64,
    stats: CacheStats,
}

impl ResolveCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            full: InsertionOrderCache::new(capacity),
            dated: InsertionOrderCache::new(capacity),
            unfiltered: None,
            epoch: 0,
            stats: CacheStats::default(),
        }
    }

    /// Drop every entry (both levels and the snapshot).
    pub fn invalidate(&mut self) {
        self.full.clear();
        self.dated.clear();
        self.unfiltered = None;
        self.stats.invalidations += 1;
    }

    /// Invalidate if the store has been reloaded since the entries were computed.
    pub fn sync_epoch(&mut self, epoch: u64) {
        if self.epoch != epoch {
            tracing::debug!(from = self.epoch, to = epoch, "cache_epoch_changed");
            self.invalidate();
            self.epoch = epoch;
        }
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn get_full(&mut self, key: &FullKey) -> Option<ResolvedList> {
        let hit = self.full.get(key).cloned();
        if hit.is_some() {
            self.stats.full_hits += 1;
        }
        hit
    }

    pub fn get_dated(&mut self, key: &DateKey) -> Option<ResolvedList> {
        let hit = self.dated.get(key).cloned();
        if hit.is_some() {
            self.stats.date_hits += 1;
        }
        hit
    }

    pub fn snapshot(&mut self) -> Option<ResolvedList> {
        let hit = self.unfiltered.clone();
        if hit.is_some() {
            self.stats.snapshot_hits += 1;
        }
        hit
    }

    pub fn has_snapshot(&self) -> bool {
        self.unfiltered.is_some()
    }

    pub fn put_full(&mut self, key: FullKey, list: ResolvedList) {
        if self.full.insert(key, list) {
            self.stats.evictions += 1;
        }
    }

    pub fn put_dated(&mut self, key: DateKey, list: ResolvedList) {
        if self.dated.insert(key, list) {
            self.stats.evictions += 1;
        }
    }

    pub fn set_snapshot(&mut self, list: ResolvedList) {
        self.unfiltered = Some(list);
    }

    pub fn record_scan(&mut self) {
        self.stats.scans += 1;
    }

    pub fn stats(&self) -> CacheStats {
        self.stats
    }

    /// Entries in (full, date-filtered) levels.
    pub fn sizes(&self) -> (usize, usize) {
        (self.full.len(), self.dated.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::query::FilterParams;

    #[test]
    fn evicts_oldest_insertion_even_if_recently_read() {
        let mut cache = InsertionOrderCache::new(2);
        assert!(!cache.insert("a", 1));
        assert!(!cache.insert("b", 2));
        // Reading "a" must not protect it.
        assert_eq!(cache.get(&"a"), Some(&1));
        assert!(cache.insert("c", 3));
        assert_eq!(cache.get(&"a"), None);
        assert_eq!(cache.get(&"b"), Some(&2));
        assert_eq!(cache.get(&"c"), Some(&3));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn replacing_a_key_is_not_an_eviction() {
        let mut cache = InsertionOrderCache::new(2);
        cache.insert("a", 1);
        cache.insert("b", 2);
        assert!(!cache.insert("a", 10));
        assert_eq!(cache.get(&"a"), Some(&10));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn zero_capacity_falls_back_to_default() {
        let cache: InsertionOrderCache<u8, u8> = InsertionOrderCache::new(0);
        assert_eq!(cache.capacity(), DEFAULT_CACHE_CAPACITY);
    }

    #[test]
    fn epoch_change_clears_everything() {
        let mut cache = ResolveCache::new(4);
        let params = FilterParams::new().with_text("x");
        cache.put_full(params.full_key(), ResolvedList::empty());
        cache.put_dated(params.date_key(), ResolvedList::empty());
        cache.set_snapshot(ResolvedList::empty());

        cache.sync_epoch(0);
        assert_eq!(cache.sizes(), (1, 1));

        cache.sync_epoch(1);
        assert_eq!(cache.sizes(), (0, 0));
        assert!(!cache.has_snapshot());
        assert_eq!(cache.stats().invalidations, 1);
    }

    #[test]
    fn stats_track_levels() {
        let mut cache = ResolveCache::new(1);
        let a = FilterParams::new().with_text("a");
        let b = FilterParams::new().with_text("b");
        assert!(cache.get_full(&a.full_key()).is_none());
        cache.put_full(a.full_key(), ResolvedList::empty());
        assert!(cache.get_full(&a.full_key()).is_some());
        cache.put_full(b.full_key(), ResolvedList::empty());
        let stats = cache.stats();
        assert_eq!(stats.full_hits, 1);
        assert_eq!(stats.evictions, 1);
    }
}

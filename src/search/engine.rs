//! Cache-aware resolve orchestration.
//!
//! Lookup order for a request: full-result cache, unfiltered snapshot, date-level
//! cache (text re-applied with [`refilter`]), then a store scan. A scan computes the
//! date-level list first and derives the full result from it, so a later text
//! change over the same dates never scans again.

use parking_lot::Mutex;
use std::time::Instant;
use tracing::{debug, info};

use crate::search::cache::{CacheStats, ResolveCache};
use crate::search::query::{FilterParams, ResolvedList};
use crate::search::resolve::{CancelCheck, NeverCancel, refilter, resolve_with};
use crate::store::MessageStore;

/// Where a resolution came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolveSource {
    FullCache,
    Snapshot,
    DateCache,
    Scan,
}

impl ResolveSource {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::FullCache => "full_cache",
            Self::Snapshot => "snapshot",
            Self::DateCache => "date_cache",
            Self::Scan => "scan",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Resolution {
    pub list: ResolvedList,
    pub source: ResolveSource,
    /// Store epoch the list was computed against.
    pub epoch: u64,
}

/// Owns the result cache. Shared by reference between the interactive thread and
/// resolve workers; the cache lock is never held across a store scan.
pub struct SearchEngine {
    cache: Mutex<ResolveCache>,
}

impl SearchEngine {
    pub fn new(capacity: usize) -> Self {
        Self {
            cache: Mutex::new(ResolveCache::new(capacity)),
        }
    }

    /// Compute the unfiltered snapshot. Call once after ingestion or reload.
    pub fn prime(&self, store: &MessageStore) -> ResolvedList {
        let started = Instant::now();
        let list = crate::search::resolve::resolve(store, &FilterParams::new());
        let mut cache = self.cache.lock();
        cache.sync_epoch(store.epoch());
        cache.record_scan();
        cache.set_snapshot(list.clone());
        info!(
            messages = list.count(),
            rows = list.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "snapshot_ready"
        );
        list
    }

    pub fn resolve(&self, store: &MessageStore, params: &FilterParams) -> Resolution {
        // Cannot be cancelled, so a result is always produced.
        self.resolve_cancellable(store, params, &NeverCancel)
            .unwrap_or_else(|| Resolution {
                list: ResolvedList::empty(),
                source: ResolveSource::Scan,
                epoch: store.epoch(),
            })
    }

    /// Resolve `params`, returning `None` if `cancel` fired during a scan.
    pub fn resolve_cancellable(
        &self,
        store: &MessageStore,
        params: &FilterParams,
        cancel: &dyn CancelCheck,
    ) -> Option<Resolution> {
        let epoch = store.epoch();
        let full_key = params.full_key();
        let date_key = params.date_key();

        let cached = {
            let mut cache = self.cache.lock();
            cache.sync_epoch(epoch);
            if let Some(list) = cache.get_full(&full_key) {
                Some((list, ResolveSource::FullCache))
            } else if params.is_unfiltered()
                && let Some(list) = cache.snapshot()
            {
                Some((list, ResolveSource::Snapshot))
            } else {
                cache
                    .get_dated(&date_key)
                    .map(|list| (list, ResolveSource::DateCache))
            }
        };

        let (list, source) = match cached {
            Some((list, ResolveSource::FullCache)) => {
                return Some(self.finish(params, list, ResolveSource::FullCache, epoch));
            }
            Some((list, ResolveSource::Snapshot)) => {
                self.cache.lock().put_full(full_key, list.clone());
                return Some(self.finish(params, list, ResolveSource::Snapshot, epoch));
            }
            Some((dated, _)) => (
                refilter(&dated, store, params.text(), params.whole_word),
                ResolveSource::DateCache,
            ),
            None => {
                let date_only = params.clone().with_text("").keyword_list(None);
                let dated = resolve_with(store, &date_only, cancel)?;
                let list = refilter(&dated, store, params.text(), params.whole_word);
                let mut cache = self.cache.lock();
                cache.record_scan();
                cache.put_dated(date_key, dated);
                (list, ResolveSource::Scan)
            }
        };

        {
            let mut cache = self.cache.lock();
            // A reload between lookup and insert leaves this result unkeyed.
            if cache.epoch() == epoch {
                cache.put_full(full_key, list.clone());
            }
        }
        Some(self.finish(params, list, source, epoch))
    }

    /// Return the unfiltered baseline, computing it if it was never primed.
    pub fn clear_filters(&self, store: &MessageStore) -> ResolvedList {
        let snapshot = {
            let mut cache = self.cache.lock();
            cache.sync_epoch(store.epoch());
            cache.snapshot()
        };
        snapshot.unwrap_or_else(|| self.prime(store))
    }

    /// Drop every cached list.
    pub fn invalidate(&self) {
        self.cache.lock().invalidate();
    }

    pub fn stats(&self) -> CacheStats {
        self.cache.lock().stats()
    }

    pub fn cache_sizes(&self) -> (usize, usize) {
        self.cache.lock().sizes()
    }

    fn finish(
        &self,
        params: &FilterParams,
        list: ResolvedList,
        source: ResolveSource,
        epoch: u64,
    ) -> Resolution {
        debug!(
            scope = %params.scope.label(),
            text = params.text(),
            whole_word = params.whole_word,
            search_all = params.search_all,
            source = source.as_str(),
            count = list.count(),
            "resolve_done"
        );
        Resolution {
            list,
            source,
            epoch,
        }
    }
}

use std::any::Any;
use std::time::{Duration, Instant};

/// Type-erased cache value as stored by the query client.
pub(crate) type ErasedEntry = CacheEntry<Box<dyn Any + Send + Sync>>;

/// A cached query result with the time it was fetched.
#[derive(Debug, Clone)]
pub struct CacheEntry<T> {
    pub data: T,
    pub fetched_at: Instant,
    pub is_stale: bool,
}

impl<T> CacheEntry<T> {
    /// Creates a fresh entry.
    pub fn new(data: T) -> Self {
        Self {
            data,
            fetched_at: Instant::now(),
            is_stale: false,
        }
    }

    /// Marks the entry stale once it is older than `stale_time`, and reports staleness.
    pub fn check_staleness(&mut self, stale_time: Duration) -> bool {
        if self.fetched_at.elapsed() > stale_time {
            self.is_stale = true;
        }
        self.is_stale
    }

    /// Marks this entry as stale.
    pub const fn mark_stale(&mut self) {
        self.is_stale = true;
    }

    /// Returns `true` once the entry has outlived `cache_time`.
    pub fn should_gc(&self, cache_time: Duration) -> bool {
        self.fetched_at.elapsed() > cache_time
    }
}

impl ErasedEntry {
    /// Erases the data type so entries of any query can share one map.
    pub(crate) fn erase<V: Send + Sync + 'static>(entry: CacheEntry<V>) -> Self {
        CacheEntry {
            data: Box::new(entry.data),
            fetched_at: entry.fetched_at,
            is_stale: entry.is_stale,
        }
    }

    /// Recovers a typed copy, or `None` if the entry holds another type.
    pub(crate) fn typed<V: Clone + 'static>(&self) -> Option<CacheEntry<V>> {
        self.data.downcast_ref::<V>().map(|data| CacheEntry {
            data: data.clone(),
            fetched_at: self.fetched_at,
            is_stale: self.is_stale,
        })
    }
}

use std::time::Duration;

/// Configuration for the query cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryConfig {
    /// How long fetched data counts as fresh.
    ///
    /// Fresh data is served from the cache without a request. Stale data is still
    /// served, but a subscription refetches it in the background.
    pub stale_time: Duration,

    /// How long an entry is kept before [`collect_garbage`] may evict it.
    ///
    /// [`collect_garbage`]: super::QueryClient::collect_garbage
    pub cache_time: Duration,

    /// Capacity of the invalidation and notice broadcast channels.
    pub channel_capacity: usize,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            stale_time: Duration::ZERO,              // immediately stale
            cache_time: Duration::from_secs(5 * 60), // 5 minutes
            channel_capacity: 64,
        }
    }
}

impl QueryConfig {
    /// Creates a configuration with the given stale and cache times.
    #[must_use]
    pub fn new(stale_time: Duration, cache_time: Duration) -> Self {
        Self {
            stale_time,
            cache_time,
            ..Self::default()
        }
    }

    #[must_use]
    pub const fn with_stale_time(mut self, stale_time: Duration) -> Self {
        self.stale_time = stale_time;
        self
    }

    #[must_use]
    pub const fn with_cache_time(mut self, cache_time: Duration) -> Self {
        self.cache_time = cache_time;
        self
    }

    #[must_use]
    pub const fn with_channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity;
        self
    }
}

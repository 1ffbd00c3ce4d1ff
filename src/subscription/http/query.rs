//! Keyed reads with caching and in-flight de-duplication.
//!
//! A [`Query`] is identified by its [`QueryKey`] (a name plus optional parameters).
//! All queries built against the same [`QueryClient`] share one cache:
//!
//! 1. Concurrent fetches of the same key are coalesced into one request. Every
//!    caller receives a clone of the same result.
//! 2. The single in-flight request for a key is the only writer of that key's cache
//!    entry, and the only publisher of a network notice for that request.
//! 3. A disabled query never issues a request, whatever the cache holds.
//!
//! Queries can be awaited directly ([`Query::fetch`], [`Query::refetch`]) or run as
//! subscriptions, in which case they emit `Loading`, then `Success`/`Error`, and fetch
//! again whenever their key is invalidated.
//!
//! # Example
//!
//! ```rust,ignore
//! use recipebook::subscription::Subscription;
//! use recipebook::subscription::http::{Query, QueryClient, QueryKey};
//! use std::sync::Arc;
//!
//! let client = Arc::new(QueryClient::new());
//!
//! let categories = Query::new(
//!     QueryKey::new("READ_CATEGORY_LIST"),
//!     || Box::pin(fetch_categories()),
//!     client.clone(),
//! );
//!
//! let sub = Subscription::new(categories).map(Message::Categories);
//! ```

use std::any::Any;
use std::borrow::Cow;
use std::fmt;
use std::hash::{DefaultHasher, Hash, Hasher};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use futures::future::{BoxFuture, FutureExt, Shared};
use futures::stream::{self, BoxStream, StreamExt};
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tokio_stream::wrappers::BroadcastStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::command::Command;
use crate::subscription::{SubscriptionId, SubscriptionSource};
use crate::transport::Params;

use super::cache::{CacheEntry, ErasedEntry};
use super::config::QueryConfig;
use super::error::{ErrorRes, Notice, QueryError};

/// Caller-supplied handler for business errors.
pub type ErrorHandler = Arc<dyn Fn(ErrorRes) + Send + Sync>;

type Fetcher<V> = Arc<dyn Fn() -> BoxFuture<'static, Result<V, QueryError>> + Send + Sync>;
type SharedFetch<V> = Shared<BoxFuture<'static, Result<V, QueryError>>>;

/// The request currently registered for a key, tagged so a detached one can be told apart.
#[derive(Debug)]
struct InFlight {
    id: u64,
    fetch: Box<dyn Any + Send + Sync>,
}

/// Identity of a cached read: a name plus the parameters it was issued with.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryKey {
    name: Cow<'static, str>,
    params: Option<Params>,
}

impl QueryKey {
    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self {
            name: name.into(),
            params: None,
        }
    }

    #[must_use]
    pub fn with_params(mut self, params: impl Into<Params>) -> Self {
        self.params = Some(params.into());
        self
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub const fn params(&self) -> Option<&Params> {
        self.params.as_ref()
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.params {
            Some(params) => write!(f, "{}?{params}", self.name),
            None => f.write_str(&self.name),
        }
    }
}

#[derive(Debug, Clone)]
enum Invalidation {
    Key(QueryKey),
    All,
}

impl Invalidation {
    fn matches(&self, key: &QueryKey) -> bool {
        match self {
            Self::Key(invalidated) => invalidated == key,
            Self::All => true,
        }
    }
}

/// The state of a query result.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryState<T> {
    /// Query is disabled; nothing was requested.
    Idle,
    /// Query is loading (fetching data).
    Loading,
    /// Query succeeded with data.
    Success {
        /// The data returned by the query.
        data: T,
        /// Whether the data is stale and should be refetched.
        is_stale: bool,
    },
    /// Query failed with an error.
    Error(QueryError),
}

/// A query result containing the current state.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryResult<T> {
    /// The current state of the query.
    pub state: QueryState<T>,
}

impl<T> QueryResult<T> {
    const fn idle() -> Self {
        Self {
            state: QueryState::Idle,
        }
    }

    const fn loading() -> Self {
        Self {
            state: QueryState::Loading,
        }
    }

    const fn success(data: T, is_stale: bool) -> Self {
        Self {
            state: QueryState::Success { data, is_stale },
        }
    }

    /// Returns the data if the query succeeded, otherwise `None`.
    pub const fn data(&self) -> Option<&T> {
        match &self.state {
            QueryState::Success { data, .. } => Some(data),
            _ => None,
        }
    }

    /// Returns the error if the query failed, otherwise `None`.
    pub const fn error(&self) -> Option<&QueryError> {
        match &self.state {
            QueryState::Error(err) => Some(err),
            _ => None,
        }
    }

    pub const fn is_idle(&self) -> bool {
        matches!(self.state, QueryState::Idle)
    }

    pub const fn is_loading(&self) -> bool {
        matches!(self.state, QueryState::Loading)
    }

    pub const fn is_success(&self) -> bool {
        matches!(self.state, QueryState::Success { .. })
    }

    pub const fn is_error(&self) -> bool {
        matches!(self.state, QueryState::Error(_))
    }

    pub const fn is_stale(&self) -> bool {
        matches!(self.state, QueryState::Success { is_stale: true, .. })
    }
}

/// The shared query cache.
///
/// One client is created at process start and passed (as `Arc<QueryClient>`) to every
/// query and mutation. Tests create their own to get an isolated cache.
///
/// # Example
///
/// ```rust
/// use recipebook::subscription::http::{QueryClient, QueryConfig};
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// let config = QueryConfig::new(
///     Duration::from_secs(30),  // stale_time
///     Duration::from_secs(300), // cache_time
/// );
///
/// let client = Arc::new(QueryClient::with_config(config));
/// ```
#[derive(Debug, Clone)]
pub struct QueryClient {
    cache: Arc<DashMap<QueryKey, ErasedEntry>>,
    in_flight: Arc<DashMap<QueryKey, InFlight>>,
    next_fetch_id: Arc<AtomicU64>,
    invalidation_tx: broadcast::Sender<Invalidation>,
    notice_tx: broadcast::Sender<Notice>,
    config: QueryConfig,
}

impl QueryClient {
    /// Creates a new query client with default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(QueryConfig::default())
    }

    /// Creates a new query client with the given configuration.
    #[must_use]
    pub fn with_config(config: QueryConfig) -> Self {
        let capacity = config.channel_capacity.max(1);
        let (invalidation_tx, _) = broadcast::channel(capacity);
        let (notice_tx, _) = broadcast::channel(capacity);
        Self {
            cache: Arc::new(DashMap::new()),
            in_flight: Arc::new(DashMap::new()),
            next_fetch_id: Arc::new(AtomicU64::new(0)),
            invalidation_tx,
            notice_tx,
            config,
        }
    }

    /// Gets the query configuration.
    #[must_use]
    pub const fn config(&self) -> &QueryConfig {
        &self.config
    }

    /// Marks `key` stale and makes every active query for it refetch.
    ///
    /// A request for `key` that is already running is detached: later fetches start a new
    /// one, and its result is no longer written to the cache.
    ///
    /// The returned command performs the invalidation when run and produces no messages.
    pub fn invalidate<Msg>(&self, key: &QueryKey) -> Command<Msg>
    where
        Msg: Send + 'static,
    {
        let client = self.clone();
        let key = key.clone();
        Command::effect(async move {
            client.in_flight.remove(&key);
            if let Some(mut entry) = client.cache.get_mut(&key) {
                entry.mark_stale();
            }
            debug!(%key, "invalidating query");
            let _ = client.invalidation_tx.send(Invalidation::Key(key));
        })
    }

    /// Drops every cached entry and makes every active query refetch.
    ///
    /// This is what a full reload after a successful mutation amounts to.
    pub fn reload<Msg>(&self) -> Command<Msg>
    where
        Msg: Send + 'static,
    {
        let client = self.clone();
        Command::effect(async move { client.reload_now() })
    }

    pub(crate) fn reload_now(&self) {
        // In-flight first, so a request finishing in between cannot refill the cache.
        self.in_flight.clear();
        self.cache.clear();
        debug!("reloading all queries");
        let _ = self.invalidation_tx.send(Invalidation::All);
    }

    /// Returns the cached data for `key`, if present and of type `V`.
    #[must_use]
    pub fn get_query_data<V: Clone + 'static>(&self, key: &QueryKey) -> Option<V> {
        self.get_cache::<V>(key).map(|entry| entry.data)
    }

    /// Removes the cached entry for `key`. Returns `true` if one existed.
    pub fn remove_query(&self, key: &QueryKey) -> bool {
        self.cache.remove(key).is_some()
    }

    /// Returns the number of cached entries.
    #[must_use]
    pub fn cached_len(&self) -> usize {
        self.cache.len()
    }

    /// Returns `true` while a request for `key` is in flight.
    #[must_use]
    pub fn is_fetching(&self, key: &QueryKey) -> bool {
        self.in_flight.contains_key(key)
    }

    /// Evicts entries older than the configured cache time. Returns how many went.
    pub fn collect_garbage(&self) -> usize {
        let before = self.cache.len();
        let cache_time = self.config.cache_time;
        self.cache.retain(|_, entry| !entry.should_gc(cache_time));
        before.saturating_sub(self.cache.len())
    }

    /// Streams process-wide notices (network failures) from now on.
    pub fn notices(&self) -> BoxStream<'static, Notice> {
        BroadcastStream::new(self.notice_tx.subscribe())
            .filter_map(|notice| async move { notice.ok() })
            .boxed()
    }

    /// Publishes a notice to every notice subscriber.
    pub(crate) fn notify(&self, notice: Notice) {
        publish(&self.notice_tx, notice);
    }

    /// Fetches `key`, joining the in-flight request for it if there is one.
    ///
    /// A new request is spawned, so it runs to completion and fills the cache even if
    /// every caller stops waiting for it.
    pub async fn fetch<V, F>(&self, key: &QueryKey, fetcher: F) -> Result<V, QueryError>
    where
        V: Clone + Send + Sync + 'static,
        F: FnOnce() -> BoxFuture<'static, Result<V, QueryError>>,
    {
        let joined = match self.in_flight.entry(key.clone()) {
            Entry::Occupied(entry) => {
                debug!(%key, "joining in-flight query");
                entry
                    .get()
                    .fetch
                    .downcast_ref::<SharedFetch<V>>()
                    .cloned()
                    .ok_or(fetcher)
            }
            Entry::Vacant(entry) => {
                debug!(%key, "fetching query");
                let id = self.next_fetch_id.fetch_add(1, Ordering::Relaxed);
                let shared = self.start_fetch(key.clone(), id, fetcher());
                entry.insert(InFlight {
                    id,
                    fetch: Box::new(shared.clone()),
                });
                tokio::spawn(shared.clone());
                Ok(shared)
            }
        };

        match joined {
            Ok(shared) => shared.await,
            Err(fetcher) => {
                warn!(%key, "in-flight query has a different type; fetching separately");
                fetcher().await
            }
        }
    }

    fn start_fetch<V>(
        &self,
        key: QueryKey,
        id: u64,
        request: BoxFuture<'static, Result<V, QueryError>>,
    ) -> SharedFetch<V>
    where
        V: Clone + Send + Sync + 'static,
    {
        let cache = self.cache.clone();
        let in_flight = self.in_flight.clone();
        let notice_tx = self.notice_tx.clone();

        async move {
            let result = request.await;

            // Only the request still registered for the key may write its entry.
            match in_flight.entry(key.clone()) {
                Entry::Occupied(slot) if slot.get().id == id => {
                    if let Ok(data) = &result {
                        cache.insert(key.clone(), ErasedEntry::erase(CacheEntry::new(data.clone())));
                    }
                    slot.remove();
                }
                _ => debug!(%key, "dropping result of superseded query"),
            }

            if let Err(QueryError::Network { message }) = &result {
                publish(
                    &notice_tx,
                    Notice::NetworkUnreachable {
                        message: message.clone(),
                    },
                );
            }
            result
        }
        .boxed()
        .shared()
    }

    fn subscribe_invalidation(&self) -> broadcast::Receiver<Invalidation> {
        self.invalidation_tx.subscribe()
    }

    fn get_cache<V: Clone + 'static>(&self, key: &QueryKey) -> Option<CacheEntry<V>> {
        self.cache.get(key).and_then(|entry| entry.typed::<V>())
    }

    #[cfg(test)]
    fn set_cache<V: Send + Sync + 'static>(&self, key: QueryKey, entry: CacheEntry<V>) {
        self.cache.insert(key, ErasedEntry::erase(entry));
    }
}

impl Default for QueryClient {
    fn default() -> Self {
        Self::new()
    }
}

fn publish(tx: &broadcast::Sender<Notice>, notice: Notice) {
    warn!(?notice, "publishing notice");
    // No subscribers is fine; the warning above is the fallback channel.
    let _ = tx.send(notice);
}

/// A keyed read bound to a [`QueryClient`].
///
/// # Example
///
/// ```rust,ignore
/// let query = Query::new(
///     QueryKey::new("READ_RECIPE_INFO").with_params(Params::flat([("id", "5")])),
///     || Box::pin(async { fetch_recipe(5).await }),
///     client.clone(),
/// )
/// .enabled(id_is_known)
/// .on_error(|err| eprintln!("{}", err.user_message()));
/// ```
pub struct Query<V> {
    key: QueryKey,
    fetcher: Fetcher<V>,
    client: Arc<QueryClient>,
    enabled: bool,
    on_error: Option<ErrorHandler>,
    liveness: Option<CancellationToken>,
}

impl<V> Clone for Query<V> {
    fn clone(&self) -> Self {
        Self {
            key: self.key.clone(),
            fetcher: self.fetcher.clone(),
            client: self.client.clone(),
            enabled: self.enabled,
            on_error: self.on_error.clone(),
            liveness: self.liveness.clone(),
        }
    }
}

impl<V> Query<V>
where
    V: Clone + Send + Sync + 'static,
{
    /// Creates an enabled query with the given key, fetcher, and client.
    pub fn new<F>(key: QueryKey, fetcher: F, client: Arc<QueryClient>) -> Self
    where
        F: Fn() -> BoxFuture<'static, Result<V, QueryError>> + Send + Sync + 'static,
    {
        Self {
            key,
            fetcher: Arc::new(fetcher),
            client,
            enabled: true,
            on_error: None,
            liveness: None,
        }
    }

    /// Enables or disables the query. A disabled query never issues a request.
    #[must_use]
    pub const fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Sets the handler for business errors.
    ///
    /// Network failures never reach it; they are published as a [`Notice`].
    #[must_use]
    pub fn on_error(mut self, handler: impl Fn(ErrorRes) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Arc::new(handler));
        self
    }

    /// Skips callbacks once `token` is cancelled.
    #[must_use]
    pub fn bind(mut self, token: CancellationToken) -> Self {
        self.liveness = Some(token);
        self
    }

    #[must_use]
    pub const fn key(&self) -> &QueryKey {
        &self.key
    }

    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Returns fresh cached data, or fetches it.
    pub async fn fetch(&self) -> QueryResult<V> {
        if !self.enabled {
            return QueryResult::idle();
        }

        if let Some(mut cached) = self.client.get_cache::<V>(&self.key) {
            if !cached.check_staleness(self.client.config().stale_time) {
                return QueryResult::success(cached.data, false);
            }
        }

        self.run().await
    }

    /// Fetches regardless of what the cache holds. Still joins an in-flight request.
    pub async fn refetch(&self) -> QueryResult<V> {
        if !self.enabled {
            return QueryResult::idle();
        }
        self.run().await
    }

    async fn run(&self) -> QueryResult<V> {
        let fetcher = self.fetcher.clone();
        match self.client.fetch(&self.key, move || fetcher()).await {
            Ok(data) => QueryResult::success(data, false),
            Err(err) => {
                self.report(&err);
                QueryResult {
                    state: QueryState::Error(err),
                }
            }
        }
    }

    fn report(&self, err: &QueryError) {
        warn!(key = %self.key, code = %err.code(), error = %err, "query failed");

        let QueryError::Response(res) = err else {
            return;
        };
        if !self.is_alive() {
            return;
        }
        if let Some(handler) = &self.on_error {
            handler(res.clone());
        }
    }

    fn is_alive(&self) -> bool {
        self.liveness
            .as_ref()
            .is_none_or(|token| !token.is_cancelled())
    }

    async fn step(&self, state: State) -> Option<(QueryResult<V>, State)> {
        match state {
            State::Initial => {
                // Subscribe before fetching so an invalidation during the fetch is kept.
                let rx = self.client.subscribe_invalidation();

                match self.client.get_cache::<V>(&self.key) {
                    Some(mut cached) => {
                        let is_stale = cached.check_staleness(self.client.config().stale_time);
                        let next = if is_stale {
                            State::Fetching { rx }
                        } else {
                            State::Watching { rx }
                        };
                        Some((QueryResult::success(cached.data, is_stale), next))
                    }
                    None => Some((QueryResult::loading(), State::Fetching { rx })),
                }
            }

            State::Fetching { rx } => Some((self.run().await, State::Watching { rx })),

            State::Watching { mut rx } => loop {
                match rx.recv().await {
                    Ok(invalidation) if invalidation.matches(&self.key) => {
                        return Some((QueryResult::loading(), State::Fetching { rx }));
                    }
                    Ok(_) => {}
                    // Missed notifications may have included ours.
                    Err(RecvError::Lagged(_)) => {
                        return Some((QueryResult::loading(), State::Fetching { rx }));
                    }
                    Err(RecvError::Closed) => return None,
                }
            },
        }
    }
}

impl<V> SubscriptionSource for Query<V>
where
    V: Clone + Send + Sync + 'static,
{
    type Output = QueryResult<V>;

    fn stream(&self) -> BoxStream<'static, Self::Output> {
        if !self.enabled {
            return stream::pending().boxed();
        }

        let query = self.clone();
        stream::unfold(State::Initial, move |state| {
            let query = query.clone();
            async move { query.step(state).await }
        })
        .boxed()
    }

    fn id(&self) -> SubscriptionId {
        let mut hasher = DefaultHasher::new();
        self.hash(&mut hasher);
        SubscriptionId::of::<Self>(hasher.finish())
    }
}

impl<V> Hash for Query<V> {
    fn hash<H>(&self, hasher: &mut H)
    where
        H: Hasher,
    {
        self.key.hash(hasher);
        self.enabled.hash(hasher);
    }
}

/// Internal state machine for the Query subscription.
enum State {
    Initial,
    Fetching {
        rx: broadcast::Receiver<Invalidation>,
    },
    Watching {
        rx: broadcast::Receiver<Invalidation>,
    },
}

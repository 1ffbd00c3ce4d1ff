//! Long-lived event sources and their lifecycle.
//!
//! A [`Subscription`] wraps a [`SubscriptionSource`] (for example an HTTP
//! [`Query`](http::Query)) and forwards everything it emits into a message channel.
//! The [`SubscriptionManager`] keeps the set of running subscriptions in sync with
//! what the view currently needs: new ids are started, ids that disappear are
//! cancelled. Once cancelled, nothing the source produces reaches the channel.

pub mod http;

use std::any::TypeId;
use std::collections::HashMap;

use futures::StreamExt;
use futures::stream::BoxStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Identity of a subscription: the source type plus a hash of its configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId {
    type_id: TypeId,
    hash: u64,
}

impl SubscriptionId {
    /// Creates an id for source type `T` with the given configuration hash.
    #[must_use]
    pub fn of<T: 'static>(hash: u64) -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            hash,
        }
    }
}

/// A source of events that runs until cancelled.
pub trait SubscriptionSource: Send + 'static {
    /// The type of item the source emits.
    type Output;

    /// Creates the event stream.
    fn stream(&self) -> BoxStream<'static, Self::Output>;

    /// Returns the id used to decide whether two sources are the same subscription.
    fn id(&self) -> SubscriptionId;
}

/// A type-erased subscription producing messages of type `Msg`.
pub struct Subscription<Msg> {
    id: SubscriptionId,
    stream: BoxStream<'static, Msg>,
}

impl<Msg: Send + 'static> Subscription<Msg> {
    /// Creates a subscription from a source.
    pub fn new<S>(source: S) -> Self
    where
        S: SubscriptionSource<Output = Msg>,
    {
        Self {
            id: source.id(),
            stream: source.stream(),
        }
    }

    /// Converts every message the subscription produces.
    #[must_use]
    pub fn map<T: Send + 'static>(self, f: impl Fn(Msg) -> T + Send + 'static) -> Subscription<T> {
        Subscription {
            id: self.id,
            stream: self.stream.map(f).boxed(),
        }
    }

    /// Returns the subscription id.
    #[must_use]
    pub const fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Spawns the subscription, forwarding messages into `tx` until cancelled.
    pub fn spawn(self, tx: mpsc::UnboundedSender<Msg>) -> Handle {
        let token = CancellationToken::new();
        let cancelled = token.clone();
        let mut stream = self.stream;

        let join = tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    () = cancelled.cancelled() => break,
                    item = stream.next() => match item {
                        Some(msg) => {
                            if cancelled.is_cancelled() || tx.send(msg).is_err() {
                                break;
                            }
                        }
                        None => break,
                    },
                }
            }
        });

        Handle::new(token, join)
    }
}

/// Handle for a running subscription task.
pub struct Handle {
    token: CancellationToken,
    join: JoinHandle<()>,
}

impl Handle {
    #[must_use]
    pub const fn new(token: CancellationToken, join: JoinHandle<()>) -> Self {
        Self { token, join }
    }

    /// Returns the token that marks this subscription as torn down.
    #[must_use]
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Returns `true` while the subscription has not been cancelled.
    #[must_use]
    pub fn is_active(&self) -> bool {
        !self.token.is_cancelled()
    }

    /// Signals cancellation without waiting for the task to stop.
    pub fn stop(&self) {
        self.token.cancel();
    }

    /// Cancel the subscription and wait for task completion.
    pub async fn cancel(self) {
        self.token.cancel();
        let _ = self.join.await;
    }
}

/// Keeps running subscriptions in sync with the desired set.
pub struct SubscriptionManager<Msg> {
    tx: mpsc::UnboundedSender<Msg>,
    running: HashMap<SubscriptionId, Handle>,
}

impl<Msg: Send + 'static> SubscriptionManager<Msg> {
    #[must_use]
    pub fn new(tx: mpsc::UnboundedSender<Msg>) -> Self {
        Self {
            tx,
            running: HashMap::new(),
        }
    }

    /// Starts subscriptions that are not running yet and cancels those no longer wanted.
    ///
    /// Subscriptions whose id is already running are left untouched.
    pub fn update(&mut self, subscriptions: impl IntoIterator<Item = Subscription<Msg>>) {
        let mut wanted = HashMap::new();
        for subscription in subscriptions {
            wanted.entry(subscription.id()).or_insert(subscription);
        }

        self.running.retain(|id, handle| {
            let keep = wanted.contains_key(id);
            if !keep {
                debug!(?id, "cancelling subscription");
                handle.stop();
            }
            keep
        });

        for (id, subscription) in wanted {
            if !self.running.contains_key(&id) {
                debug!(?id, "starting subscription");
                self.running.insert(id, subscription.spawn(self.tx.clone()));
            }
        }
    }

    /// Returns the number of running subscriptions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.running.len()
    }

    /// Returns `true` if no subscription is running.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.running.is_empty()
    }

    /// Cancels every running subscription and waits for them to stop.
    pub async fn shutdown(&mut self) {
        for (_, handle) in self.running.drain() {
            handle.cancel().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;
    use std::hash::{DefaultHasher, Hash, Hasher};
    use tokio::time::{Duration, timeout};

    struct Numbers {
        values: Vec<u32>,
    }

    impl SubscriptionSource for Numbers {
        type Output = u32;

        fn stream(&self) -> BoxStream<'static, u32> {
            stream::iter(self.values.clone()).boxed()
        }

        fn id(&self) -> SubscriptionId {
            let mut hasher = DefaultHasher::new();
            self.values.hash(&mut hasher);
            SubscriptionId::of::<Self>(hasher.finish())
        }
    }

    struct Forever;

    impl SubscriptionSource for Forever {
        type Output = u32;

        fn stream(&self) -> BoxStream<'static, u32> {
            stream::pending().boxed()
        }

        fn id(&self) -> SubscriptionId {
            SubscriptionId::of::<Self>(0)
        }
    }

    #[test]
    fn test_id_depends_on_type() {
        assert_eq!(SubscriptionId::of::<Numbers>(1), SubscriptionId::of::<Numbers>(1));
        assert_ne!(SubscriptionId::of::<Numbers>(1), SubscriptionId::of::<Forever>(1));
    }

    #[tokio::test]
    async fn test_spawn_forwards_mapped_messages() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let handle = Subscription::new(Numbers {
            values: vec![1, 2, 3],
        })
        .map(|n| n * 2)
        .spawn(tx);

        let mut received = Vec::new();
        while let Ok(Some(msg)) = timeout(Duration::from_millis(200), rx.recv()).await {
            received.push(msg);
        }
        assert_eq!(received, vec![2, 4, 6]);
        handle.cancel().await;
    }

    #[tokio::test]
    async fn test_manager_starts_and_cancels() {
        let (tx, _rx) = mpsc::unbounded_channel::<u32>();
        let mut manager = SubscriptionManager::new(tx);

        manager.update(vec![Subscription::new(Forever)]);
        assert_eq!(manager.len(), 1);

        // Same id again: nothing restarts.
        manager.update(vec![Subscription::new(Forever)]);
        assert_eq!(manager.len(), 1);

        manager.update(Vec::new());
        assert!(manager.is_empty());
    }

    #[tokio::test]
    async fn test_cancelled_handle_is_inactive() {
        let (tx, _rx) = mpsc::unbounded_channel::<u32>();
        let handle = Subscription::new(Forever).spawn(tx);
        assert!(handle.is_active());

        let token = handle.token();
        handle.cancel().await;
        assert!(token.is_cancelled());
    }

    #[tokio::test]
    async fn test_shutdown_cancels_everything() {
        let (tx, _rx) = mpsc::unbounded_channel::<u32>();
        let mut manager = SubscriptionManager::new(tx);
        manager.update(vec![
            Subscription::new(Forever),
            Subscription::new(Numbers { values: vec![1] }),
        ]);
        assert_eq!(manager.len(), 2);

        manager.shutdown().await;
        assert!(manager.is_empty());
    }
}

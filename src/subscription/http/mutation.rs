//! Writes (create, update, delete) with tracked state and callbacks.
//!
//! A [`Mutation`] wraps an async mutator and moves through
//! `Idle → Pending → Success | Error` on every invocation. Mutations are not cached and
//! not coalesced: each call issues its own request, and overlapping calls are not
//! ordered against each other.
//!
//! Failures are split the same way as for queries. Business errors go to the mutation's
//! `on_error` handler; network failures are published on the [`QueryClient`] notice
//! channel and never reach `on_error`.
//!
//! # Example
//!
//! ```rust,ignore
//! use recipebook::subscription::http::{Mutation, QueryClient};
//! use std::sync::Arc;
//!
//! let client = Arc::new(QueryClient::new());
//!
//! let create = Mutation::new(client.clone(), |name: String, _progress| {
//!     Box::pin(async move { create_category_api(name).await })
//! })
//! .on_success(|_| println!("created"))
//! .on_error(|err| eprintln!("{}", err.user_message()))
//! .reload_on_success();
//!
//! let result = create.mutate("Korean".to_string()).await;
//! ```

use std::panic;
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::stream::{BoxStream, StreamExt};
use tokio::sync::watch;
use tokio::task::JoinError;
use tokio_stream::wrappers::WatchStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::command::Command;
use crate::transport::{ProgressFn, UploadProgress};

use super::error::{ErrorRes, Notice, QueryError};
use super::query::{ErrorHandler, QueryClient};

/// Caller-supplied handler for a successful response.
pub type SuccessHandler<O> = Arc<dyn Fn(O) + Send + Sync>;

type Mutator<I, O> =
    Arc<dyn Fn(I, Option<ProgressFn>) -> BoxFuture<'static, Result<O, QueryError>> + Send + Sync>;

/// The state of a mutation result.
#[derive(Debug, Clone, PartialEq)]
pub enum MutationState<T> {
    /// Mutation is idle (not yet started).
    Idle,
    /// Mutation is in progress.
    Pending,
    /// Mutation succeeded with a result.
    Success(T),
    /// Mutation failed with an error.
    Error(QueryError),
}

/// A mutation result containing the current state.
#[derive(Debug, Clone, PartialEq)]
pub struct MutationResult<T> {
    /// The current state of the mutation.
    pub state: MutationState<T>,
}

impl<T> MutationResult<T> {
    /// Returns the result data if the mutation succeeded, otherwise `None`.
    pub const fn data(&self) -> Option<&T> {
        match &self.state {
            MutationState::Success(data) => Some(data),
            _ => None,
        }
    }

    /// Returns the error if the mutation failed, otherwise `None`.
    pub const fn error(&self) -> Option<&QueryError> {
        match &self.state {
            MutationState::Error(err) => Some(err),
            _ => None,
        }
    }

    pub const fn is_idle(&self) -> bool {
        matches!(self.state, MutationState::Idle)
    }

    /// Returns `true` if the mutation is currently pending.
    pub const fn is_pending(&self) -> bool {
        matches!(self.state, MutationState::Pending)
    }

    /// Returns `true` if the mutation succeeded.
    pub const fn is_success(&self) -> bool {
        matches!(self.state, MutationState::Success(_))
    }

    /// Returns `true` if the mutation failed.
    pub const fn is_error(&self) -> bool {
        matches!(self.state, MutationState::Error(_))
    }
}

/// A write operation with optional success, error, and progress callbacks.
///
/// All callbacks are optional; a missing one is simply not called. Once the token given
/// to [`Mutation::bind`] is cancelled, callbacks and state updates are skipped, but a
/// request already sent still runs to completion.
pub struct Mutation<I, O> {
    mutator: Mutator<I, O>,
    client: Arc<QueryClient>,
    on_success: Option<SuccessHandler<O>>,
    on_error: Option<ErrorHandler>,
    on_progress: Option<ProgressFn>,
    liveness: Option<CancellationToken>,
    reload_on_success: bool,
    state: Arc<watch::Sender<MutationState<O>>>,
}

impl<I, O> Clone for Mutation<I, O> {
    fn clone(&self) -> Self {
        Self {
            mutator: self.mutator.clone(),
            client: self.client.clone(),
            on_success: self.on_success.clone(),
            on_error: self.on_error.clone(),
            on_progress: self.on_progress.clone(),
            liveness: self.liveness.clone(),
            reload_on_success: self.reload_on_success,
            state: self.state.clone(),
        }
    }
}

impl<I, O> Mutation<I, O>
where
    I: Send + 'static,
    O: Clone + Send + Sync + 'static,
{
    /// Creates an idle mutation.
    ///
    /// The mutator receives the input and, when an `on_progress` callback is set, a
    /// progress function to hand to the transport.
    pub fn new<F>(client: Arc<QueryClient>, mutator: F) -> Self
    where
        F: Fn(I, Option<ProgressFn>) -> BoxFuture<'static, Result<O, QueryError>>
            + Send
            + Sync
            + 'static,
    {
        let (state, _) = watch::channel(MutationState::Idle);
        Self {
            mutator: Arc::new(mutator),
            client,
            on_success: None,
            on_error: None,
            on_progress: None,
            liveness: None,
            reload_on_success: false,
            state: Arc::new(state),
        }
    }

    #[must_use]
    pub fn on_success(mut self, handler: impl Fn(O) + Send + Sync + 'static) -> Self {
        self.on_success = Some(Arc::new(handler));
        self
    }

    /// Sets the handler for business errors. Network failures never reach it.
    #[must_use]
    pub fn on_error(mut self, handler: impl Fn(ErrorRes) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Arc::new(handler));
        self
    }

    /// Sets the upload progress callback. Events are forwarded unchanged.
    #[must_use]
    pub fn on_progress(mut self, handler: impl Fn(UploadProgress) + Send + Sync + 'static) -> Self {
        self.on_progress = Some(Arc::new(handler));
        self
    }

    /// Skips callbacks and state updates once `token` is cancelled.
    #[must_use]
    pub fn bind(mut self, token: CancellationToken) -> Self {
        self.liveness = Some(token);
        self
    }

    /// Drops the whole query cache and refetches every active query after a success.
    #[must_use]
    pub const fn reload_on_success(mut self) -> Self {
        self.reload_on_success = true;
        self
    }

    /// Returns the state of the latest invocation.
    #[must_use]
    pub fn state(&self) -> MutationState<O> {
        self.state.borrow().clone()
    }

    #[must_use]
    pub fn is_pending(&self) -> bool {
        matches!(*self.state.borrow(), MutationState::Pending)
    }

    /// Streams the current state, then every change.
    pub fn states(&self) -> BoxStream<'static, MutationState<O>> {
        WatchStream::new(self.state.subscribe()).boxed()
    }

    /// Runs the mutation and returns its final state.
    ///
    /// The request runs on its own task, so dropping the returned future does not
    /// cancel it.
    pub async fn mutate(&self, input: I) -> MutationResult<O> {
        let this = self.clone();
        let joined = tokio::spawn(async move { this.run(input).await }).await;
        MutationResult {
            state: self.settle(joined),
        }
    }

    /// Wraps [`Mutation::mutate`] in a [`Command`].
    pub fn command(&self, input: I) -> Command<MutationResult<O>> {
        let this = self.clone();
        Command::future(async move { this.mutate(input).await })
    }

    async fn run(&self, input: I) -> MutationState<O> {
        self.set_state(MutationState::Pending);

        let state = match (self.mutator)(input, self.progress_callback()).await {
            Ok(output) => {
                debug!("mutation succeeded");
                if self.is_alive() {
                    if let Some(handler) = &self.on_success {
                        handler(output.clone());
                    }
                }
                if self.reload_on_success {
                    self.client.reload_now();
                }
                MutationState::Success(output)
            }
            Err(err) => {
                self.report(&err);
                MutationState::Error(err)
            }
        };

        self.set_state(state.clone());
        state
    }

    fn settle(&self, joined: Result<MutationState<O>, JoinError>) -> MutationState<O> {
        match joined {
            Ok(state) => state,
            Err(err) if err.is_panic() => panic::resume_unwind(err.into_panic()),
            Err(err) => {
                // Cancelled by runtime shutdown; no response will arrive.
                let err = QueryError::Network {
                    message: err.to_string(),
                };
                self.report(&err);
                let state = MutationState::Error(err);
                self.set_state(state.clone());
                state
            }
        }
    }

    fn report(&self, err: &QueryError) {
        warn!(code = %err.code(), error = %err, "mutation failed");

        match err {
            QueryError::Network { message } => self.client.notify(Notice::NetworkUnreachable {
                message: message.clone(),
            }),
            QueryError::Response(res) => {
                if !self.is_alive() {
                    return;
                }
                if let Some(handler) = &self.on_error {
                    handler(res.clone());
                }
            }
        }
    }

    fn progress_callback(&self) -> Option<ProgressFn> {
        let on_progress = self.on_progress.clone()?;
        let liveness = self.liveness.clone();
        let callback: ProgressFn = Arc::new(move |progress: UploadProgress| {
            if liveness.as_ref().is_none_or(|token| !token.is_cancelled()) {
                on_progress(progress);
            }
        });
        Some(callback)
    }

    fn set_state(&self, state: MutationState<O>) {
        if self.is_alive() {
            self.state.send_replace(state);
        }
    }

    fn is_alive(&self) -> bool {
        self.liveness
            .as_ref()
            .is_none_or(|token| !token.is_cancelled())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subscription::http::QueryKey;
    use futures::FutureExt;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::time::sleep;

    fn not_valid() -> ErrorRes {
        ErrorRes::new("NOT_VALID_ERROR", "카테고리 명을 입력해 주세요.")
    }

    fn echo(client: Arc<QueryClient>) -> Mutation<String, String> {
        Mutation::new(client, |input: String, _| {
            async move {
                sleep(Duration::from_millis(30)).await;
                Ok(format!("created {input}"))
            }
            .boxed()
        })
    }

    fn failing(client: Arc<QueryClient>, err: QueryError) -> Mutation<String, String> {
        Mutation::new(client, move |_, _| {
            let err = err.clone();
            async move { Err(err) }.boxed()
        })
    }

    #[test]
    fn test_mutation_result_predicates() {
        let idle: MutationResult<i32> = MutationResult {
            state: MutationState::Idle,
        };
        assert!(idle.is_idle());
        assert!(!idle.is_pending());

        let pending: MutationResult<i32> = MutationResult {
            state: MutationState::Pending,
        };
        assert!(pending.is_pending());
        assert_eq!(pending.data(), None);

        let success = MutationResult {
            state: MutationState::Success(42),
        };
        assert!(success.is_success());
        assert_eq!(success.data(), Some(&42));

        let error: MutationResult<i32> = MutationResult {
            state: MutationState::Error(QueryError::Response(not_valid())),
        };
        assert!(error.is_error());
        assert_eq!(error.error(), Some(&QueryError::Response(not_valid())));
    }

    #[tokio::test]
    async fn test_success_calls_on_success_once() {
        let client = Arc::new(QueryClient::new());
        let successes = Arc::new(Mutex::new(Vec::new()));
        let errors = Arc::new(AtomicUsize::new(0));

        let sink = successes.clone();
        let error_count = errors.clone();
        let mutation = echo(client)
            .on_success(move |out| sink.lock().expect("lock").push(out))
            .on_error(move |_| {
                error_count.fetch_add(1, Ordering::SeqCst);
            });

        assert_eq!(mutation.state(), MutationState::Idle);
        let result = mutation.mutate("Korean".to_string()).await;

        assert_eq!(result.data(), Some(&"created Korean".to_string()));
        assert_eq!(*successes.lock().expect("lock"), vec!["created Korean".to_string()]);
        assert_eq!(errors.load(Ordering::SeqCst), 0);
        assert_eq!(mutation.state(), MutationState::Success("created Korean".to_string()));
    }

    #[tokio::test]
    async fn test_states_go_through_pending() {
        let client = Arc::new(QueryClient::new());
        let mutation = echo(client);
        let mut states = mutation.states();

        assert_eq!(states.next().await, Some(MutationState::Idle));

        let running = mutation.clone();
        let task = tokio::spawn(async move { running.mutate("x".to_string()).await });

        assert_eq!(states.next().await, Some(MutationState::Pending));
        assert!(mutation.is_pending());
        assert_eq!(
            states.next().await,
            Some(MutationState::Success("created x".to_string()))
        );
        assert!(task.await.expect("join").is_success());
    }

    #[tokio::test]
    async fn test_business_error_calls_on_error_once() {
        let client = Arc::new(QueryClient::new());
        let errors = Arc::new(Mutex::new(Vec::new()));
        let successes = Arc::new(AtomicUsize::new(0));

        let sink = errors.clone();
        let success_count = successes.clone();
        let mutation = failing(client.clone(), QueryError::Response(not_valid()))
            .on_success(move |_| {
                success_count.fetch_add(1, Ordering::SeqCst);
            })
            .on_error(move |err| sink.lock().expect("lock").push(err));

        let mut notices = client.notices();
        let result = mutation.mutate("Korean".to_string()).await;

        assert!(result.is_error());
        assert_eq!(*errors.lock().expect("lock"), vec![not_valid()]);
        assert_eq!(successes.load(Ordering::SeqCst), 0);
        assert!(notices.next().now_or_never().is_none());
    }

    #[tokio::test]
    async fn test_network_error_goes_to_notice() {
        let client = Arc::new(QueryClient::new());
        let errors = Arc::new(AtomicUsize::new(0));
        let error_count = errors.clone();

        let mutation = failing(
            client.clone(),
            QueryError::Network {
                message: "connection refused".to_string(),
            },
        )
        .on_error(move |_| {
            error_count.fetch_add(1, Ordering::SeqCst);
        });

        let mut notices = client.notices();
        let result = mutation.mutate("Korean".to_string()).await;

        assert!(result.error().is_some_and(QueryError::is_network));
        assert_eq!(errors.load(Ordering::SeqCst), 0);
        assert_eq!(
            notices.next().now_or_never().flatten().expect("notice"),
            Notice::NetworkUnreachable {
                message: "connection refused".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_cancelled_task_settles_as_network_error() {
        let client = Arc::new(QueryClient::new());
        let errors = Arc::new(AtomicUsize::new(0));
        let error_count = errors.clone();
        let mutation = echo(client.clone()).on_error(move |_| {
            error_count.fetch_add(1, Ordering::SeqCst);
        });
        let mut notices = client.notices();

        let task = tokio::spawn(futures::future::pending::<MutationState<String>>());
        task.abort();
        let state = mutation.settle(task.await);

        assert!(matches!(&state, MutationState::Error(err) if err.is_network()));
        assert_eq!(mutation.state(), state);
        assert!(matches!(
            notices.next().now_or_never().flatten(),
            Some(Notice::NetworkUnreachable { .. })
        ));
        assert_eq!(errors.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_progress_is_forwarded() {
        let client = Arc::new(QueryClient::new());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();

        let mutation: Mutation<u64, ()> = Mutation::new(client, |total, progress| {
            async move {
                if let Some(progress) = progress {
                    for loaded in [total / 2, total] {
                        progress(UploadProgress {
                            loaded,
                            total: Some(total),
                        });
                    }
                }
                Ok(())
            }
            .boxed()
        })
        .on_progress(move |p| sink.lock().expect("lock").push(p));

        mutation.mutate(100).await;

        assert_eq!(
            *seen.lock().expect("lock"),
            vec![
                UploadProgress {
                    loaded: 50,
                    total: Some(100)
                },
                UploadProgress {
                    loaded: 100,
                    total: Some(100)
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_no_progress_callback_means_no_progress_fn() {
        let client = Arc::new(QueryClient::new());
        let mutation: Mutation<(), bool> =
            Mutation::new(client, |(), progress| async move { Ok(progress.is_some()) }.boxed());

        assert_eq!(mutation.mutate(()).await.data(), Some(&false));
    }

    #[tokio::test]
    async fn test_cancelled_mutation_skips_callbacks_and_state() {
        let client = Arc::new(QueryClient::new());
        let calls = Arc::new(AtomicUsize::new(0));
        let token = CancellationToken::new();

        let on_success = calls.clone();
        let on_error = calls.clone();
        let ok = echo(client.clone())
            .on_success(move |_| {
                on_success.fetch_add(1, Ordering::SeqCst);
            })
            .bind(token.clone());
        let err = failing(client, QueryError::Response(not_valid()))
            .on_error(move |_| {
                on_error.fetch_add(1, Ordering::SeqCst);
            })
            .bind(token.clone());

        token.cancel();
        assert!(ok.mutate("a".to_string()).await.is_success());
        assert!(err.mutate("b".to_string()).await.is_error());

        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(ok.state(), MutationState::Idle);
    }

    #[tokio::test]
    async fn test_command_produces_result() {
        let client = Arc::new(QueryClient::new());
        let results: Vec<MutationResult<String>> = echo(client)
            .command("soup".to_string())
            .into_stream()
            .collect()
            .await;

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].data(), Some(&"created soup".to_string()));
    }

    #[tokio::test]
    async fn test_reload_on_success_clears_cache() {
        let client = Arc::new(QueryClient::new());
        let key = QueryKey::new("READ_CATEGORY_LIST");
        client
            .fetch(&key, || async { Ok::<_, QueryError>(vec![1u32]) }.boxed())
            .await
            .expect("seeded");
        assert_eq!(client.cached_len(), 1);

        echo(client.clone())
            .reload_on_success()
            .mutate("x".to_string())
            .await;
        assert_eq!(client.cached_len(), 0);
    }

    #[tokio::test]
    async fn test_failed_mutation_keeps_cache() {
        let client = Arc::new(QueryClient::new());
        let key = QueryKey::new("READ_CATEGORY_LIST");
        client
            .fetch(&key, || async { Ok::<_, QueryError>(vec![1u32]) }.boxed())
            .await
            .expect("seeded");

        failing(client.clone(), QueryError::Response(not_valid()))
            .reload_on_success()
            .mutate("x".to_string())
            .await;
        assert_eq!(client.get_query_data::<Vec<u32>>(&key), Some(vec![1]));
    }
}

use futures::{
    FutureExt, StreamExt,
    stream::{self, BoxStream},
};

/// A command that performs an asynchronous side effect and reports back with messages.
///
/// Commands are how one-off operations (mutations, cache invalidation) hand their outcome
/// to the message loop that owns the view state. A command is inert until its stream is
/// consumed, so building one never performs I/O by itself.
///
/// # Examples
///
/// ```
/// use recipebook::command::Command;
///
/// enum Message {
///     Saved(i32),
/// }
///
/// let cmd = Command::future(async { 42 }).map(Message::Saved);
/// assert!(!cmd.is_none());
/// ```
pub struct Command<Msg: Send + 'static> {
    stream: Option<BoxStream<'static, Msg>>,
}

impl<Msg: Send + 'static> Command<Msg> {
    /// Create a command that does nothing.
    ///
    /// ```
    /// use recipebook::command::Command;
    ///
    /// let cmd: Command<i32> = Command::none();
    /// assert!(cmd.is_none());
    /// ```
    pub fn none() -> Self {
        Self { stream: None }
    }

    /// Create a command from a future that produces a message.
    pub fn future(future: impl Future<Output = Msg> + Send + 'static) -> Self {
        Self {
            stream: Some(future.into_stream().boxed()),
        }
    }

    /// Create a command that runs a side effect and produces no messages.
    pub fn effect(future: impl Future<Output = ()> + Send + 'static) -> Self {
        Self {
            stream: Some(
                future
                    .into_stream()
                    .filter_map(|()| async { None })
                    .boxed(),
            ),
        }
    }

    /// Convert every message this command produces.
    pub fn map<T: Send + 'static>(self, f: impl Fn(Msg) -> T + Send + 'static) -> Command<T> {
        Command {
            stream: self.stream.map(|stream| stream.map(f).boxed()),
        }
    }

    /// Returns `true` if this command has nothing to run.
    #[must_use]
    pub const fn is_none(&self) -> bool {
        self.stream.is_none()
    }

    /// Consume the command as a stream of messages.
    ///
    /// `Command::none()` yields an empty stream.
    pub fn into_stream(self) -> BoxStream<'static, Msg> {
        self.stream.unwrap_or_else(|| stream::empty().boxed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[tokio::test]
    async fn test_future_yields_one_message() {
        let results: Vec<i32> = Command::future(async { 21 * 2 }).into_stream().collect().await;
        assert_eq!(results, vec![42]);
    }

    #[tokio::test]
    async fn test_map() {
        #[derive(Debug, PartialEq)]
        enum Message {
            Number(i32),
        }

        let cmd = Command::future(async { 4 }).map(|x| Message::Number(x * 10));
        let results: Vec<Message> = cmd.into_stream().collect().await;
        assert_eq!(results, vec![Message::Number(40)]);
    }

    #[tokio::test]
    async fn test_map_none_stays_none() {
        let cmd = Command::<i32>::none().map(|x| x + 1);
        assert!(cmd.is_none());
    }

    #[tokio::test]
    async fn test_effect_runs_without_messages() {
        let ran = Arc::new(AtomicBool::new(false));
        let flag = ran.clone();
        let cmd: Command<i32> = Command::effect(async move {
            flag.store(true, Ordering::SeqCst);
        });

        let results: Vec<i32> = cmd.into_stream().collect().await;
        assert!(results.is_empty());
        assert!(ran.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_none_into_stream_is_empty() {
        let results: Vec<i32> = Command::<i32>::none().into_stream().collect().await;
        assert!(results.is_empty());
    }
}

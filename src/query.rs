//! Async query: the channel between a cache fetch and the view awaiting it.
//!
//! A `Query<T>` owns a fetcher closure and the receiving end of a oneshot
//! channel. `fetch()` spawns the fetcher on the runtime; the view calls
//! `poll()` on every tick and re-renders when it returns `true`.
//!
//! A query has exactly one observer, its owner. Starting a new request while
//! one is in flight *replaces* it: the old task is aborted and its channel
//! dropped, so its result can never be observed. Requests are never queued.
//!
//! ```ignore
//! let books = client.clone();
//! let mut query = Query::new(move || {
//!     let books = books.clone();
//!     async move { books.new_books().await.map_err(|e| e.to_string()) }
//! });
//!
//! query.fetch();
//!
//! // In event loop tick
//! if query.poll() {
//!     // State changed, trigger re-render
//! }
//! ```

use std::future::Future;
use std::pin::Pin;
use std::time::Instant;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

/// The state of a query
#[derive(Debug, Clone)]
pub enum QueryState<T> {
  /// Query has not been started
  Idle,
  /// Query is currently fetching data
  Loading,
  /// Query completed successfully
  Success(T),
  /// Query failed with an error
  Error(String),
}

impl<T> QueryState<T> {
  pub fn is_loading(&self) -> bool {
    matches!(self, QueryState::Loading)
  }

  pub fn data(&self) -> Option<&T> {
    match self {
      QueryState::Success(data) => Some(data),
      _ => None,
    }
  }

  pub fn error(&self) -> Option<&str> {
    match self {
      QueryState::Error(e) => Some(e),
      _ => None,
    }
  }
}

type BoxFuture<T> = Pin<Box<dyn Future<Output = Result<T, String>> + Send>>;

type FetcherFn<T> = Box<dyn Fn() -> BoxFuture<T> + Send + Sync>;

/// The request currently in flight.
struct Pending<T> {
  receiver: oneshot::Receiver<Result<T, String>>,
  task: JoinHandle<()>,
}

/// Async query for data fetching with state management.
pub struct Query<T> {
  state: QueryState<T>,
  fetcher: FetcherFn<T>,
  pending: Option<Pending<T>>,
  fetched_at: Option<Instant>,
}

impl<T: Send + 'static> Query<T> {
  /// Create a new query with the given fetcher function.
  ///
  /// The fetcher is called each time `fetch()` or `refetch()` starts a
  /// request.
  pub fn new<F, Fut>(fetcher: F) -> Self
  where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, String>> + Send + 'static,
  {
    Self {
      state: QueryState::Idle,
      fetcher: Box::new(move || Box::pin(fetcher())),
      pending: None,
      fetched_at: None,
    }
  }

  pub fn state(&self) -> &QueryState<T> {
    &self.state
  }

  pub fn data(&self) -> Option<&T> {
    self.state.data()
  }

  pub fn is_loading(&self) -> bool {
    self.state.is_loading()
  }

  pub fn is_error(&self) -> bool {
    matches!(self.state, QueryState::Error(_))
  }

  pub fn error(&self) -> Option<&str> {
    self.state.error()
  }

  /// When the current data arrived.
  #[cfg(test)]
  pub fn fetched_at(&self) -> Option<Instant> {
    self.fetched_at
  }

  /// Start fetching unless a request is already in flight.
  pub fn fetch(&mut self) {
    if self.pending.is_some() {
      return;
    }
    self.start_fetch();
  }

  /// Start a new request, replacing the one in flight if any.
  pub fn refetch(&mut self) {
    self.cancel();
    self.start_fetch();
  }

  /// Abort the request in flight. The state stays as it was before it began.
  pub fn cancel(&mut self) {
    if let Some(pending) = self.pending.take() {
      pending.task.abort();
      if self.state.is_loading() {
        self.state = QueryState::Idle;
      }
    }
  }

  /// Poll for the result of the request in flight.
  ///
  /// Returns `true` if the state changed. Call this on every tick.
  pub fn poll(&mut self) -> bool {
    let Some(pending) = &mut self.pending else {
      return false;
    };

    let outcome = match pending.receiver.try_recv() {
      Ok(outcome) => outcome,
      Err(oneshot::error::TryRecvError::Empty) => return false,
      // The task ended without sending: it panicked
      Err(oneshot::error::TryRecvError::Closed) => Err("Query task failed".to_string()),
    };

    self.pending = None;
    self.state = match outcome {
      Ok(data) => {
        self.fetched_at = Some(Instant::now());
        QueryState::Success(data)
      }
      Err(error) => QueryState::Error(error),
    };
    true
  }

  fn start_fetch(&mut self) {
    let (tx, receiver) = oneshot::channel();
    let future = (self.fetcher)();
    let task = tokio::spawn(async move {
      // The receiver is gone if the query was replaced or dropped
      let _ = tx.send(future.await);
    });

    self.pending = Some(Pending { receiver, task });
    self.state = QueryState::Loading;
  }
}

impl<T> Drop for Query<T> {
  fn drop(&mut self) {
    if let Some(pending) = self.pending.take() {
      pending.task.abort();
    }
  }
}

impl<T: std::fmt::Debug> std::fmt::Debug for Query<T> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Query")
      .field("state", &self.state)
      .field("fetched_at", &self.fetched_at)
      .field("pending", &self.pending.is_some())
      .finish_non_exhaustive()
  }
}

//! Request coalescing for network fetches.
//!
//! When several callers ask for the same key while a request for it is
//! already in flight, only the first (the leader) talks to the network and
//! writes the disk tier. Everyone else waits for the leader's outcome.
//!
//! ```text
//! resolve(a.png) ─┐
//!                 ├──► RequestCoalescer ──► one GET + one disk write
//! resolve(a.png) ─┘          │
//!                            ▼
//!                  both receive the same result
//! ```
//!
//! The shared outcome type is chosen by the pipeline: raw bytes for records
//! (each caller decodes into its own type), the decoded image for images.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::broadcast;
use tracing::debug;

use super::key::CacheKey;

/// Statistics for monitoring coalescing effectiveness.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CoalescerStats {
  /// Total requests received
  pub total_requests: u64,
  /// Requests that waited for an in-flight leader
  pub coalesced_requests: u64,
  /// Requests that became leaders
  pub new_requests: u64,
}

/// Tracks in-flight requests by cache key.
pub struct RequestCoalescer<T> {
  in_flight: DashMap<CacheKey, broadcast::Sender<T>>,
  total_requests: AtomicU64,
  coalesced_requests: AtomicU64,
  new_requests: AtomicU64,
}

/// What a caller should do after registering.
pub enum Registration<'a, T> {
  /// Perform the fetch and hand the result to [`Leader::complete`].
  Leader(Leader<'a, T>),
  /// Wait for the leader's result.
  Follower(broadcast::Receiver<T>),
}

/// Obligation to publish a result for a key.
///
/// Dropping it without completing (e.g. the leader's future was dropped)
/// closes the channel, and followers fall back to fetching on their own.
pub struct Leader<'a, T> {
  coalescer: &'a RequestCoalescer<T>,
  key: Option<CacheKey>,
}

impl<T: Clone> RequestCoalescer<T> {
  pub fn new() -> Self {
    Self {
      in_flight: DashMap::new(),
      total_requests: AtomicU64::new(0),
      coalesced_requests: AtomicU64::new(0),
      new_requests: AtomicU64::new(0),
    }
  }

  /// Run `work` for `key` unless another caller is already running it, in
  /// which case wait for and return that caller's result.
  ///
  /// If the leader goes away without publishing, `work` runs here instead.
  pub async fn run<F, Fut>(&self, key: &CacheKey, work: F) -> T
  where
    F: FnOnce() -> Fut,
    Fut: Future<Output = T>,
  {
    match self.register(key) {
      Registration::Leader(leader) => {
        let result = work().await;
        leader.complete(result.clone());
        result
      }
      Registration::Follower(mut rx) => match rx.recv().await {
        Ok(result) => result,
        Err(_) => {
          debug!(key = %key, "In-flight fetch vanished, fetching independently");
          work().await
        }
      },
    }
  }

  /// Register interest in `key`.
  pub fn register(&self, key: &CacheKey) -> Registration<'_, T> {
    self.total_requests.fetch_add(1, Ordering::Relaxed);

    match self.in_flight.entry(key.clone()) {
      Entry::Occupied(entry) => {
        let rx = entry.get().subscribe();
        self.coalesced_requests.fetch_add(1, Ordering::Relaxed);
        debug!(key = %key, "Coalescing request with in-flight fetch");
        Registration::Follower(rx)
      }
      Entry::Vacant(entry) => {
        // Typical case is a handful of concurrent requests per key
        let (tx, _rx) = broadcast::channel(1);
        entry.insert(tx);
        self.new_requests.fetch_add(1, Ordering::Relaxed);
        Registration::Leader(Leader {
          coalescer: self,
          key: Some(key.clone()),
        })
      }
    }
  }
}

impl<T> RequestCoalescer<T> {
  /// Number of keys with a fetch in flight.
  pub fn in_flight(&self) -> usize {
    self.in_flight.len()
  }

  /// Returns a snapshot of the current statistics.
  pub fn stats(&self) -> CoalescerStats {
    CoalescerStats {
      total_requests: self.total_requests.load(Ordering::Relaxed),
      coalesced_requests: self.coalesced_requests.load(Ordering::Relaxed),
      new_requests: self.new_requests.load(Ordering::Relaxed),
    }
  }
}

impl<T: Clone> Default for RequestCoalescer<T> {
  fn default() -> Self {
    Self::new()
  }
}

impl<T> Leader<'_, T> {
  /// Publish `result` to every follower and retire the key.
  pub fn complete(mut self, result: T) {
    if let Some(key) = self.key.take() {
      if let Some((_, tx)) = self.coalescer.in_flight.remove(&key) {
        let waiters = tx.receiver_count();
        // No receivers is fine: nobody coalesced onto this fetch
        let _ = tx.send(result);
        let stats = self.coalescer.stats();
        debug!(
          key = %key,
          waiters,
          in_flight = self.coalescer.in_flight(),
          total = stats.total_requests,
          coalesced = stats.coalesced_requests,
          new = stats.new_requests,
          "Fetch completed"
        );
      }
    }
  }
}

impl<T> Drop for Leader<'_, T> {
  fn drop(&mut self) {
    if let Some(key) = self.key.take() {
      debug!(key = %key, "Leader dropped before completing, releasing waiters");
      self.coalescer.in_flight.remove(&key);
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::error::TransportError;
  use std::sync::atomic::AtomicUsize;
  use std::sync::Arc;
  use std::time::Duration;

  type Shared = Result<Arc<Vec<u8>>, TransportError>;

  fn key() -> CacheKey {
    CacheKey::raw("cover.png")
  }

  #[tokio::test]
  async fn test_second_request_is_follower() {
    let coalescer = RequestCoalescer::<Shared>::new();

    let Registration::Leader(leader) = coalescer.register(&key()) else {
      panic!("first request must lead");
    };
    let Registration::Follower(mut rx) = coalescer.register(&key()) else {
      panic!("second request must follow");
    };

    leader.complete(Ok(Arc::new(b"png".to_vec())));

    let shared = rx.recv().await.unwrap().unwrap();
    assert_eq!(shared.as_slice(), b"png");
    assert_eq!(coalescer.in_flight(), 0);
    assert_eq!(
      coalescer.stats(),
      CoalescerStats {
        total_requests: 2,
        coalesced_requests: 1,
        new_requests: 1,
      }
    );
  }

  #[tokio::test]
  async fn test_errors_are_shared() {
    let coalescer = RequestCoalescer::<Shared>::new();
    let Registration::Leader(leader) = coalescer.register(&key()) else {
      panic!("first request must lead");
    };
    let Registration::Follower(mut rx) = coalescer.register(&key()) else {
      panic!("second request must follow");
    };

    leader.complete(Err(TransportError::Status {
      url: "https://example.com/cover.png".to_string(),
      status: 500,
    }));

    let err = rx.recv().await.unwrap().unwrap_err();
    assert!(matches!(err, TransportError::Status { status: 500, .. }));
  }

  #[tokio::test]
  async fn test_dropped_leader_closes_channel() {
    let coalescer = RequestCoalescer::<Shared>::new();
    let Registration::Leader(leader) = coalescer.register(&key()) else {
      panic!("first request must lead");
    };
    let Registration::Follower(mut rx) = coalescer.register(&key()) else {
      panic!("second request must follow");
    };

    drop(leader);

    assert!(rx.recv().await.is_err());
    assert_eq!(coalescer.in_flight(), 0);
    // The next request starts fresh
    assert!(matches!(
      coalescer.register(&key()),
      Registration::Leader(_)
    ));
  }

  #[tokio::test]
  async fn test_run_executes_work_once_for_overlapping_callers() {
    let coalescer = RequestCoalescer::<u32>::new();
    let runs = AtomicUsize::new(0);
    let counter = &runs;

    let work = move || async move {
      counter.fetch_add(1, Ordering::SeqCst);
      tokio::time::sleep(Duration::from_millis(50)).await;
      7
    };

    let k = key();
    let (a, b, c) = tokio::join!(
      coalescer.run(&k, work),
      coalescer.run(&k, work),
      coalescer.run(&k, work),
    );

    assert_eq!((a, b, c), (7, 7, 7));
    assert_eq!(runs.load(Ordering::SeqCst), 1);
    assert_eq!(coalescer.stats().coalesced_requests, 2);
  }

  #[tokio::test]
  async fn test_sequential_runs_each_execute() {
    let coalescer = RequestCoalescer::<u32>::new();
    let runs = AtomicUsize::new(0);
    let counter = &runs;

    for _ in 0..3 {
      coalescer
        .run(&key(), move || async move {
          counter.fetch_add(1, Ordering::SeqCst);
          1
        })
        .await;
    }

    assert_eq!(runs.load(Ordering::SeqCst), 3);
    assert_eq!(coalescer.in_flight(), 0);
  }
}

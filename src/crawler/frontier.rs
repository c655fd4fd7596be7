//! Crawl frontier: FIFO queue plus dedup set, bounded by the page budget
//!
//! The frontier is the sole dedup authority for a crawl run. A URL is
//! accepted into the queue at most once per run; the check-and-mark against
//! the visited set happens under one lock so two workers discovering the same
//! link "simultaneously" can never both enqueue it.

use std::collections::{HashSet, VecDeque};
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;

/// How often a blocked dequeue re-checks the queue
const POLL_INTERVAL: Duration = Duration::from_millis(20);

struct FrontierState {
    /// Every URL ever accepted this run (grow-only until the next seed)
    visited: HashSet<String>,
    /// Discovered-but-unfetched URLs in FIFO order
    pending: VecDeque<String>,
    /// URLs dequeued by a worker but not yet marked done
    in_flight: usize,
}

/// Shared work queue for the worker pool
pub struct Frontier {
    budget: usize,
    state: Mutex<FrontierState>,
}

impl Frontier {
    /// Creates a frontier that accepts at most `budget` URLs per run
    pub fn new(budget: usize) -> Self {
        Self {
            budget,
            state: Mutex::new(FrontierState {
                visited: HashSet::new(),
                pending: VecDeque::new(),
                in_flight: 0,
            }),
        }
    }

    /// Starts a new run: clears all state and enqueues the seed URL
    pub fn seed(&self, url: &str) {
        let mut state = self.state.lock().unwrap();
        state.visited.clear();
        state.pending.clear();
        state.in_flight = 0;
        state.visited.insert(url.to_string());
        state.pending.push_back(url.to_string());
    }

    /// Atomically checks, marks, and enqueues a URL
    ///
    /// Returns `false` without effect when the URL was already accepted this
    /// run or the page budget is reached. The visited insert and the queue
    /// append happen under the same lock; this is the dedup boundary.
    pub fn try_enqueue(&self, url: &str) -> bool {
        let mut state = self.state.lock().unwrap();
        if state.visited.contains(url) || state.visited.len() >= self.budget {
            return false;
        }
        state.visited.insert(url.to_string());
        state.pending.push_back(url.to_string());
        true
    }

    /// Pops the next URL, waiting up to `timeout` for one to appear
    ///
    /// A successful dequeue takes an in-flight slot; the caller must pair it
    /// with exactly one [`task_done`](Self::task_done). `None` on timeout is
    /// how workers probe for completion.
    pub async fn dequeue(&self, timeout: Duration) -> Option<String> {
        let deadline = Instant::now() + timeout;
        loop {
            {
                let mut state = self.state.lock().unwrap();
                if let Some(url) = state.pending.pop_front() {
                    state.in_flight += 1;
                    return Some(url);
                }
            }
            if Instant::now() >= deadline {
                return None;
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    /// Releases the in-flight slot taken by a dequeue
    pub fn task_done(&self) {
        let mut state = self.state.lock().unwrap();
        state.in_flight = state.in_flight.saturating_sub(1);
    }

    /// True once the queue is drained and no worker holds an in-flight item
    ///
    /// While any item is in flight its fetch may still discover new links,
    /// so an empty queue alone does not mean the crawl is over.
    pub fn is_exhausted(&self) -> bool {
        let state = self.state.lock().unwrap();
        state.pending.is_empty() && state.in_flight == 0
    }

    /// Number of URLs waiting in the queue
    pub fn pending_len(&self) -> usize {
        self.state.lock().unwrap().pending.len()
    }

    /// Number of URLs accepted so far this run
    pub fn visited_len(&self) -> usize {
        self.state.lock().unwrap().visited.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seed_resets_previous_run() {
        let frontier = Frontier::new(10);
        frontier.seed("http://a/");
        assert!(frontier.try_enqueue("http://b/"));

        frontier.seed("http://c/");
        assert_eq!(frontier.visited_len(), 1);
        assert_eq!(frontier.pending_len(), 1);
        // URLs from the previous run are enqueueable again.
        assert!(frontier.try_enqueue("http://a/"));
    }

    #[test]
    fn test_try_enqueue_dedups() {
        let frontier = Frontier::new(10);
        frontier.seed("http://a/");

        assert!(frontier.try_enqueue("http://b/"));
        assert!(!frontier.try_enqueue("http://b/"));
        assert!(!frontier.try_enqueue("http://a/"));
        assert_eq!(frontier.pending_len(), 2);
    }

    #[test]
    fn test_try_enqueue_respects_budget() {
        let frontier = Frontier::new(2);
        frontier.seed("http://a/");

        assert!(frontier.try_enqueue("http://b/"));
        assert!(!frontier.try_enqueue("http://c/"));
        assert_eq!(frontier.visited_len(), 2);
    }

    #[tokio::test]
    async fn test_dequeue_fifo_order() {
        let frontier = Frontier::new(10);
        frontier.seed("http://a/");
        frontier.try_enqueue("http://b/");
        frontier.try_enqueue("http://c/");

        let timeout = Duration::from_millis(50);
        assert_eq!(frontier.dequeue(timeout).await.unwrap(), "http://a/");
        assert_eq!(frontier.dequeue(timeout).await.unwrap(), "http://b/");
        assert_eq!(frontier.dequeue(timeout).await.unwrap(), "http://c/");
    }

    #[tokio::test]
    async fn test_dequeue_times_out_on_empty_queue() {
        let frontier = Frontier::new(10);
        let started = std::time::Instant::now();
        let result = frontier.dequeue(Duration::from_millis(60)).await;
        assert!(result.is_none());
        assert!(started.elapsed() >= Duration::from_millis(60));
    }

    #[tokio::test]
    async fn test_exhaustion_waits_for_in_flight_items() {
        let frontier = Frontier::new(10);
        frontier.seed("http://a/");
        assert!(!frontier.is_exhausted());

        let url = frontier.dequeue(Duration::from_millis(50)).await.unwrap();
        // Queue is empty but the item is still being processed.
        assert!(!frontier.is_exhausted());

        assert_eq!(url, "http://a/");
        frontier.task_done();
        assert!(frontier.is_exhausted());
    }

    #[tokio::test]
    async fn test_dequeue_picks_up_concurrent_enqueue() {
        use std::sync::Arc;

        let frontier = Arc::new(Frontier::new(10));
        frontier.seed("http://a/");
        let _ = frontier.dequeue(Duration::from_millis(50)).await.unwrap();

        let producer = Arc::clone(&frontier);
        let handle = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(30)).await;
            producer.try_enqueue("http://b/");
            producer.task_done();
        });

        let url = frontier.dequeue(Duration::from_millis(500)).await;
        assert_eq!(url.as_deref(), Some("http://b/"));
        handle.await.unwrap();
    }
}

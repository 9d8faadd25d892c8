//! Deduplicating work queue over unit identities
//!
//! The queue carries keys, not tasks: workers always re-derive state from
//! the latest known snapshot pair, so stale cached work is impossible.
//! Guarantees:
//! - at most one worker holds a given key at any instant
//! - rapid enqueues of one key collapse into a single pending entry
//! - the stored snapshot pair is last-write-wins (latest enqueue)
//! - no accepted key is lost between enqueue and a done cycle

use crate::models::TaskId;
use k8s_openapi::api::core::v1::Pod;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;
use tracing::debug;

/// The old/new snapshot pair associated with a key
///
/// `old` absent means the unit was never seen before (addition); `new`
/// absent means the unit is gone (deletion).
#[derive(Debug, Clone, Default)]
pub struct SnapshotPair {
    pub old: Option<Pod>,
    pub new: Option<Pod>,
}

impl SnapshotPair {
    pub fn new(old: Option<Pod>, new: Option<Pod>) -> Self {
        Self { old, new }
    }
}

/// Retry policy for re-admitted keys
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Delay before the first retry
    pub base_delay: Duration,
    /// Cap for the exponential backoff
    pub max_delay: Duration,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(60),
        }
    }
}

#[derive(Default)]
struct State {
    /// Dispatch order of pending keys
    order: VecDeque<TaskId>,
    /// Keys pending dispatch (mirror of `order` for O(1) dedup)
    dirty: HashSet<TaskId>,
    /// Keys currently held by a worker
    processing: HashSet<TaskId>,
    /// Latest snapshot pair per key
    pairs: HashMap<TaskId, SnapshotPair>,
    /// Keys with a scheduled backoff re-admission
    retry_pending: HashSet<TaskId>,
    /// Consecutive failure count per key, reset by forget
    failures: HashMap<TaskId, u32>,
    shutdown: bool,
}

/// Key-deduplicating queue with per-key in-flight exclusivity and
/// exponential backoff re-admission
pub struct WorkQueue {
    state: Mutex<State>,
    notify: Notify,
    config: QueueConfig,
}

impl WorkQueue {
    pub fn new(config: QueueConfig) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(State::default()),
            notify: Notify::new(),
            config,
        })
    }

    pub fn with_defaults() -> Arc<Self> {
        Self::new(QueueConfig::default())
    }

    /// Record the latest snapshot pair for `key` and mark it pending.
    ///
    /// Non-blocking. The stored pair is replaced wholesale (last-write-wins);
    /// a key already pending or in flight gains no second queue entry. A key
    /// in flight becomes dispatchable again at `done`.
    pub fn enqueue(&self, key: TaskId, old: Option<Pod>, new: Option<Pod>) {
        {
            let mut state = self.state.lock().unwrap();
            if state.shutdown {
                debug!(key = %key, "Queue shut down, dropping event");
                return;
            }
            state.pairs.insert(key.clone(), SnapshotPair::new(old, new));
            if !state.dirty.insert(key.clone()) {
                // Already pending; the replaced pair is all that changes
                return;
            }
            if state.processing.contains(&key) {
                // Re-admitted when the current holder calls done
                return;
            }
            state.order.push_back(key);
        }
        self.notify.notify_one();
    }

    /// Wait for the next key and its latest snapshot pair.
    ///
    /// Marks the key in flight: concurrent enqueues for it are accepted but
    /// not dispatched to a second worker. Returns `None` once the queue has
    /// shut down and drained.
    pub async fn dequeue(&self) -> Option<(TaskId, SnapshotPair)> {
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            // Register for wakeups before inspecting state, so a
            // notification between the check and the await is not lost.
            notified.as_mut().enable();

            {
                let mut state = self.state.lock().unwrap();
                if let Some(key) = state.order.pop_front() {
                    state.dirty.remove(&key);
                    state.processing.insert(key.clone());
                    let pair = state.pairs.get(&key).cloned().unwrap_or_default();
                    if !state.order.is_empty() {
                        // Chain the wakeup for sibling workers
                        self.notify.notify_one();
                    }
                    return Some((key, pair));
                }
                if state.shutdown {
                    return None;
                }
            }

            notified.as_mut().await;
        }
    }

    /// Release a key after processing.
    ///
    /// If an enqueue arrived while the key was in flight it becomes
    /// immediately dispatchable; otherwise its stored pair is dropped
    /// (unless a backoff re-admission still needs it).
    pub fn done(&self, key: &TaskId) {
        let readmitted = {
            let mut state = self.state.lock().unwrap();
            state.processing.remove(key);
            if state.dirty.contains(key) {
                state.order.push_back(key.clone());
                true
            } else {
                if !state.retry_pending.contains(key) {
                    state.pairs.remove(key);
                }
                false
            }
        };
        if readmitted {
            self.notify.notify_one();
        }
    }

    /// Re-admit `key` after an increasing per-key delay (exponential,
    /// capped). The stored pair is retained until the retry runs.
    pub fn requeue_with_backoff(self: &Arc<Self>, key: TaskId) {
        let delay = {
            let mut state = self.state.lock().unwrap();
            if state.shutdown {
                return;
            }
            let failures = state.failures.entry(key.clone()).or_insert(0);
            *failures += 1;
            let attempt = *failures;
            state.retry_pending.insert(key.clone());
            backoff_delay(&self.config, attempt)
        };

        let queue = Arc::clone(self);
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            queue.readmit(key);
        });
    }

    /// Reset the backoff state for `key` (called on success and on
    /// permanent drops).
    pub fn forget(&self, key: &TaskId) {
        let mut state = self.state.lock().unwrap();
        state.failures.remove(key);
    }

    /// Stop accepting work and wake all blocked consumers. Keys accepted
    /// before shutdown still drain; retries scheduled afterwards do not run.
    pub fn shutdown(&self) {
        {
            let mut state = self.state.lock().unwrap();
            state.shutdown = true;
        }
        self.notify.notify_waiters();
    }

    /// Number of keys pending dispatch (excluding in-flight keys).
    pub fn len(&self) -> usize {
        self.state.lock().unwrap().order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn readmit(&self, key: TaskId) {
        let admitted = {
            let mut state = self.state.lock().unwrap();
            state.retry_pending.remove(&key);
            if state.shutdown || !state.pairs.contains_key(&key) {
                return;
            }
            if !state.dirty.insert(key.clone()) {
                false
            } else if state.processing.contains(&key) {
                false
            } else {
                state.order.push_back(key);
                true
            }
        };
        if admitted {
            self.notify.notify_one();
        }
    }
}

/// Exponential backoff: base * 2^(attempt-1), capped at the configured max.
fn backoff_delay(config: &QueueConfig, attempt: u32) -> Duration {
    let exponent = attempt.saturating_sub(1).min(16);
    config
        .base_delay
        .saturating_mul(1u32 << exponent)
        .min(config.max_delay)
}

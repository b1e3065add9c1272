//! Single-flight work queue.
//!
//! `dirty` holds keys that need work; `processing` holds keys a worker owns.
//! A key in both sets waits outside the FIFO until its owner calls
//! [`WorkQueue::done`]. `waiting` holds the earliest pending deadline per
//! delayed key; later deadlines for the same key are dropped.

use crate::BackoffPolicy;
use rctl_schemas::ResourceKey;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::Instant;

#[derive(Default)]
struct QueueState {
    fifo: VecDeque<ResourceKey>,
    dirty: HashSet<ResourceKey>,
    processing: HashSet<ResourceKey>,
    waiting: HashMap<ResourceKey, Instant>,
    failures: HashMap<ResourceKey, u32>,
    shutting_down: bool,
}

pub struct WorkQueue {
    state: Mutex<QueueState>,
    ready: Notify,
    backoff: BackoffPolicy,
}

impl WorkQueue {
    pub fn new(backoff: BackoffPolicy) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(QueueState::default()),
            ready: Notify::new(),
            backoff,
        })
    }

    fn lock(&self) -> MutexGuard<'_, QueueState> {
        // Every critical section leaves the sets consistent.
        self.state.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Mark `key` as needing work. Ignored after shutdown.
    pub fn add(&self, key: ResourceKey) {
        let mut st = self.lock();
        if st.shutting_down || st.dirty.contains(&key) {
            return;
        }
        st.dirty.insert(key.clone());
        if st.processing.contains(&key) {
            return;
        }
        st.fifo.push_back(key);
        drop(st);
        self.ready.notify_one();
    }

    /// Add `key` once `delay` has elapsed. Needs a tokio runtime.
    ///
    /// If `key` already has a deadline at or before the new one, nothing is
    /// scheduled; an earlier deadline replaces a later one.
    pub fn add_after(self: &Arc<Self>, key: ResourceKey, delay: Duration) {
        if delay.is_zero() {
            self.add(key);
            return;
        }
        let ready_at = Instant::now() + delay;
        {
            let mut st = self.lock();
            if st.shutting_down {
                return;
            }
            match st.waiting.get(&key) {
                Some(existing) if *existing <= ready_at => return,
                _ => {
                    st.waiting.insert(key.clone(), ready_at);
                }
            }
        }
        let queue = Arc::clone(self);
        tokio::spawn(async move {
            tokio::time::sleep_until(ready_at).await;
            queue.fire(key, ready_at);
        });
    }

    /// Timer expiry. Only the timer owning the current deadline enqueues.
    fn fire(&self, key: ResourceKey, ready_at: Instant) {
        {
            let mut st = self.lock();
            if st.waiting.get(&key) != Some(&ready_at) {
                return;
            }
            st.waiting.remove(&key);
        }
        self.add(key);
    }

    /// Keys with a pending delayed add.
    pub fn delayed(&self) -> usize {
        self.lock().waiting.len()
    }

    /// Record a failure for `key` and schedule a retry after its backoff.
    /// Returns the delay chosen.
    pub fn add_rate_limited(self: &Arc<Self>, key: ResourceKey) -> Duration {
        let delay = {
            let mut st = self.lock();
            let failures = st.failures.entry(key.clone()).or_insert(0);
            let delay = self.backoff.delay(*failures);
            *failures = failures.saturating_add(1);
            delay
        };
        self.add_after(key, delay);
        delay
    }

    /// Clear the failure history of `key`.
    pub fn forget(&self, key: &ResourceKey) {
        self.lock().failures.remove(key);
    }

    pub fn failures(&self, key: &ResourceKey) -> u32 {
        self.lock().failures.get(key).copied().unwrap_or(0)
    }

    /// Wait for the next key. `None` once the queue is shut down.
    ///
    /// The caller owns the returned key until it calls [`WorkQueue::done`].
    pub async fn get(&self) -> Option<ResourceKey> {
        loop {
            // Registered before the check so a concurrent shutdown is not missed.
            let notified = self.ready.notified();
            {
                let mut st = self.lock();
                if st.shutting_down {
                    return None;
                }
                if let Some(key) = st.fifo.pop_front() {
                    st.dirty.remove(&key);
                    st.processing.insert(key.clone());
                    if !st.fifo.is_empty() {
                        self.ready.notify_one();
                    }
                    return Some(key);
                }
            }
            notified.await;
        }
    }

    /// Release ownership of `key`. A re-add that arrived meanwhile is queued now.
    pub fn done(&self, key: &ResourceKey) {
        let mut st = self.lock();
        st.processing.remove(key);
        if !st.shutting_down && st.dirty.contains(key) {
            st.fifo.push_back(key.clone());
            drop(st);
            self.ready.notify_one();
        }
    }

    /// Stop accepting keys, drop every queued or delayed key and wake every
    /// waiting worker. Keys a worker already owns stay owned until `done`.
    pub fn shutdown(&self) {
        {
            let mut st = self.lock();
            st.shutting_down = true;
            st.fifo.clear();
            st.dirty.clear();
            st.waiting.clear();
        }
        self.ready.notify_waiters();
    }

    pub fn is_shutting_down(&self) -> bool {
        self.lock().shutting_down
    }

    /// Keys waiting for a worker.
    pub fn len(&self) -> usize {
        self.lock().fifo.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Keys currently owned by a worker.
    pub fn in_flight(&self) -> usize {
        self.lock().processing.len()
    }
}

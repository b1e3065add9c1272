use crate::{BackoffPolicy, WorkQueue};
use rctl_reconcile::{dependents_of, Outcome, Reconciler};
use rctl_schemas::ResourceKey;
use rctl_store::{ChangeType, StoreError, StoreEvent};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinSet;

// ---------------------------------------------------------------------------
// Settings / events
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RuntimeSettings {
    pub workers: usize,
    pub backoff: BackoffPolicy,
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        Self {
            workers: 4,
            backoff: BackoffPolicy::default(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum ReconcileResult {
    Ok {
        outcome: Outcome,
        requeue_after_ms: Option<u64>,
    },
    Error {
        stage: &'static str,
        message: String,
        retry_after_ms: u64,
    },
}

/// One finished reconciliation, as published on the controller's bus.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ReconcileEvent {
    pub resource: ResourceKey,
    #[serde(flatten)]
    pub result: ReconcileResult,
}

impl ReconcileEvent {
    pub fn is_error(&self) -> bool {
        matches!(self.result, ReconcileResult::Error { .. })
    }
}

/// Counters since start.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ControllerStats {
    pub reconciles: u64,
    pub errors: u64,
    pub requeues: u64,
}

#[derive(Default)]
struct Counters {
    reconciles: AtomicU64,
    errors: AtomicU64,
    requeues: AtomicU64,
}

fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

// ---------------------------------------------------------------------------
// Controller
// ---------------------------------------------------------------------------

/// Watch-driven worker pool around a [`Reconciler`].
pub struct Controller {
    engine: Reconciler,
    queue: Arc<WorkQueue>,
    events: broadcast::Sender<ReconcileEvent>,
    counters: Counters,
    workers: usize,
}

impl Controller {
    pub fn new(engine: Reconciler, settings: RuntimeSettings) -> Arc<Self> {
        let (events, _rx) = broadcast::channel(1024);
        Arc::new(Self {
            engine,
            queue: WorkQueue::new(settings.backoff),
            events,
            counters: Counters::default(),
            workers: settings.workers.max(1),
        })
    }

    pub fn queue(&self) -> &Arc<WorkQueue> {
        &self.queue
    }

    pub fn engine(&self) -> &Reconciler {
        &self.engine
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ReconcileEvent> {
        self.events.subscribe()
    }

    pub fn stats(&self) -> ControllerStats {
        ControllerStats {
            reconciles: self.counters.reconciles.load(Ordering::Relaxed),
            errors: self.counters.errors.load(Ordering::Relaxed),
            requeues: self.counters.requeues.load(Ordering::Relaxed),
        }
    }

    /// Queue every stored object. Returns how many were queued.
    pub fn enqueue_all(&self) -> Result<usize, StoreError> {
        let objects = self.engine.store().list(None, None)?;
        let n = objects.len();
        for obj in objects {
            self.queue.add(obj.key());
        }
        Ok(n)
    }

    /// Run until `shutdown` flips to true (or its sender is dropped).
    ///
    /// In-flight reconciliations finish before this returns; queued keys
    /// that no worker has picked up are dropped.
    pub async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) -> Result<(), StoreError> {
        let mut changes = self.engine.store().watch();
        let queued = self.enqueue_all()?;
        tracing::info!(queued, workers = self.workers, "controller_start");

        let mut workers = JoinSet::new();
        for id in 0..self.workers {
            let me = Arc::clone(&self);
            workers.spawn(async move { me.worker(id).await });
        }

        while !*shutdown.borrow() {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                msg = changes.recv() => match msg {
                    Ok(ev) => self.on_change(&ev),
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        tracing::warn!(missed, "store_watch_lagged; resyncing");
                        if let Err(e) = self.enqueue_all() {
                            tracing::warn!(error = %e, "resync_failed");
                        }
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        tracing::warn!("store_watch_closed");
                        break;
                    }
                },
            }
        }

        // Queued keys are dropped; in-flight keys finish.
        self.queue.shutdown();
        while workers.join_next().await.is_some() {}
        tracing::info!(stats = ?self.stats(), "controller_stopped");
        Ok(())
    }

    fn on_change(&self, ev: &StoreEvent) {
        match ev.change {
            ChangeType::Created => self.queue.add(ev.key.clone()),
            ChangeType::StatusUpdated if ev.done => {}
            ChangeType::StatusUpdated | ChangeType::Deleted => return,
        }
        // New objects and completions may unblock others.
        match dependents_of(self.engine.store().as_ref(), &ev.key) {
            Ok(keys) => {
                for key in keys {
                    self.queue.add(key);
                }
            }
            Err(e) => {
                tracing::warn!(resource = %ev.key, error = %e, "dependents_lookup_failed")
            }
        }
    }

    async fn worker(&self, id: usize) {
        while let Some(key) = self.queue.get().await {
            self.process(&key).await;
            self.queue.done(&key);
        }
        tracing::debug!(worker = id, "worker_exit");
    }

    async fn process(&self, key: &ResourceKey) {
        let engine = self.engine.clone();
        let k = key.clone();
        let joined = tokio::task::spawn_blocking(move || engine.reconcile(&k)).await;
        self.counters.reconciles.fetch_add(1, Ordering::Relaxed);

        let result = match joined {
            Ok(Ok(r)) => {
                self.queue.forget(key);
                if let Some(delay) = r.requeue_after {
                    self.counters.requeues.fetch_add(1, Ordering::Relaxed);
                    self.queue.add_after(key.clone(), delay);
                }
                ReconcileResult::Ok {
                    outcome: r.outcome,
                    requeue_after_ms: r.requeue_after.map(millis),
                }
            }
            Ok(Err(e)) => {
                self.counters.errors.fetch_add(1, Ordering::Relaxed);
                let delay = self.queue.add_rate_limited(key.clone());
                ReconcileResult::Error {
                    stage: e.stage(),
                    message: e.to_string(),
                    retry_after_ms: millis(delay),
                }
            }
            Err(join) => {
                self.counters.errors.fetch_add(1, Ordering::Relaxed);
                tracing::error!(resource = %key, error = %join, "reconcile_panicked");
                let delay = self.queue.add_rate_limited(key.clone());
                ReconcileResult::Error {
                    stage: "panic",
                    message: join.to_string(),
                    retry_after_ms: millis(delay),
                }
            }
        };

        let _ = self.events.send(ReconcileEvent {
            resource: key.clone(),
            result,
        });
    }
}

//! Shared runtime state for rctl-daemon.
//!
//! Handlers receive `State<Arc<AppState>>` from Axum. The controller runs
//! on its own task; this module only holds handles to it.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use rctl_runtime::{Controller, ControllerStats, ReconcileEvent};
use rctl_schemas::Phase;
use rctl_store::{ResourceStore, StoreError};
use serde::Serialize;
use tokio::sync::broadcast;

// ---------------------------------------------------------------------------
// BusMsg: SSE event bus payload
// ---------------------------------------------------------------------------

/// Messages broadcast over the internal event bus and surfaced as SSE events.
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BusMsg {
    Heartbeat { ts_millis: i64 },
    Status(StatusSnapshot),
    Reconcile(ReconcileEvent),
    LogLine { level: String, msg: String },
}

impl BusMsg {
    /// SSE event name.
    pub fn event_name(&self) -> &'static str {
        match self {
            BusMsg::Heartbeat { .. } => "heartbeat",
            BusMsg::Status(_) => "status",
            BusMsg::Reconcile(_) => "reconcile",
            BusMsg::LogLine { .. } => "log",
        }
    }
}

// ---------------------------------------------------------------------------
// BuildInfo
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, Serialize)]
pub struct BuildInfo {
    pub service: &'static str,
    pub version: &'static str,
}

// ---------------------------------------------------------------------------
// StatusSnapshot
// ---------------------------------------------------------------------------

/// Point-in-time view returned by GET /v1/status and carried inside SSE
/// `status` events.
#[derive(Clone, Debug, Serialize)]
pub struct StatusSnapshot {
    pub daemon_uptime_secs: u64,
    pub config_hash: Option<String>,
    /// Keys waiting for a worker.
    pub queue_depth: usize,
    /// Keys being reconciled right now.
    pub in_flight: usize,
    pub stats: ControllerStats,
    /// Object count per phase; the empty phase is reported as "NONE".
    pub phases: BTreeMap<String, usize>,
    pub resources: usize,
}

// ---------------------------------------------------------------------------
// AppState
// ---------------------------------------------------------------------------

/// Cloneable (Arc) handle shared across all Axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// Broadcast bus for SSE.
    pub bus: broadcast::Sender<BusMsg>,
    pub build: BuildInfo,
    pub store: Arc<dyn ResourceStore>,
    pub controller: Arc<Controller>,
    /// Hash of the effective config, when one was loaded.
    pub config_hash: Option<String>,
}

impl AppState {
    pub fn new(store: Arc<dyn ResourceStore>, controller: Arc<Controller>) -> Self {
        let (bus, _rx) = broadcast::channel::<BusMsg>(1024);
        Self {
            bus,
            build: BuildInfo {
                service: "rctl-daemon",
                version: env!("CARGO_PKG_VERSION"),
            },
            store,
            controller,
            config_hash: None,
        }
    }

    pub fn with_config_hash(mut self, hash: impl Into<String>) -> Self {
        self.config_hash = Some(hash.into());
        self
    }

    pub fn snapshot(&self) -> Result<StatusSnapshot, StoreError> {
        let objects = self.store.list(None, None)?;
        let mut phases = BTreeMap::new();
        for obj in &objects {
            let phase = match obj.phase() {
                Phase::None => "NONE",
                p => p.as_str(),
            };
            *phases.entry(phase.to_string()).or_insert(0) += 1;
        }
        let queue = self.controller.queue();
        Ok(StatusSnapshot {
            daemon_uptime_secs: uptime_secs(),
            config_hash: self.config_hash.clone(),
            queue_depth: queue.len(),
            in_flight: queue.in_flight(),
            stats: self.controller.stats(),
            phases,
            resources: objects.len(),
        })
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Monotonically increasing uptime since first call (process lifetime).
pub fn uptime_secs() -> u64 {
    static START: std::sync::OnceLock<std::time::Instant> = std::sync::OnceLock::new();
    START
        .get_or_init(std::time::Instant::now)
        .elapsed()
        .as_secs()
}

/// Spawn a background task that emits a heartbeat SSE every `interval`.
pub fn spawn_heartbeat(bus: broadcast::Sender<BusMsg>, interval: Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            let ts = chrono::Utc::now().timestamp_millis();
            let _ = bus.send(BusMsg::Heartbeat { ts_millis: ts });
        }
    });
}

/// Spawn a background task that republishes controller events on the bus.
/// Failed reconciliations are also surfaced as WARN log lines.
pub fn spawn_event_forwarder(controller: &Controller, bus: broadcast::Sender<BusMsg>) {
    let mut rx = controller.subscribe();
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(ev) => {
                    if let rctl_runtime::ReconcileResult::Error { message, .. } = &ev.result {
                        let _ = bus.send(BusMsg::LogLine {
                            level: "WARN".to_string(),
                            msg: message.clone(),
                        });
                    }
                    let _ = bus.send(BusMsg::Reconcile(ev));
                }
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    let _ = bus.send(BusMsg::LogLine {
                        level: "WARN".to_string(),
                        msg: format!("event stream lagged; {missed} reconcile events dropped"),
                    });
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });
}

//! rctl-runtime
//!
//! Drives the reconciliation engine: a work queue that never hands the same
//! key to two workers at once, and a controller that feeds it from the
//! store's change feed and runs a pool of workers over it.
//!
//! # Invariants
//! - At most one in-flight reconciliation per key. A key re-added while it
//!   is being processed is delivered again only after `done`.
//! - A key queued several times before a worker picks it up is delivered
//!   once. Delayed adds of one key keep only the earliest deadline.
//! - Shutdown drops queued and delayed keys; owned keys finish.
//! - Errors are retried with per-key exponential backoff; a successful pass
//!   resets the key's failure count.

mod backoff;
pub mod bootstrap;
mod controller;
mod queue;

pub use backoff::BackoffPolicy;
pub use controller::{Controller, ControllerStats, ReconcileEvent, ReconcileResult, RuntimeSettings};
pub use queue::WorkQueue;

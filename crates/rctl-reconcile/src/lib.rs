//! rctl-reconcile
//!
//! The dependency-aware reconciliation engine.
//!
//! One generic driver ([`Reconciler`]) runs the same skeleton for every
//! resource kind:
//!
//! ```text
//! load ─► settled? ─► requires ready? ─► content ready? ─► RUNNING ─► host ─► key ─► exec ─► persist
//!            │              │                  │
//!            ▼              ▼                  ▼
//!          no-op     WAITING + poll     WAITING + poll / FAILED (unsupported source)
//! ```
//!
//! Kind-specific behaviour (the command to run and how its output lands in
//! status) lives behind [`Reconcilable`], implemented once per kind in
//! [`kinds`].
//!
//! # Invariants
//! - A resource that is done, or FAILED, is never acted on again.
//! - A missing dependency is a pending condition, never an error. Any other
//!   dependency lookup failure is an error and aborts the check.
//! - Phase moves forward only; WAITING may repeat.
//! - A non-zero remote exit is recorded in status and returned as a normal
//!   outcome. Everything that prevents the action from running, or its
//!   result from being recorded, is a [`ReconcileError`].
//! - The engine keeps no state between calls. Every call re-reads the store.
//!
//! # Contract with the caller
//! The caller must not run two reconciliations of the same key at once.

pub mod deps;
mod engine;
mod error;
pub mod kinds;
mod outcome;

pub use deps::{dependents_of, evaluate, ready, DependencyError, Readiness};
pub use engine::{EngineSettings, Reconciler};
pub use error::ReconcileError;
pub use kinds::{ContentGate, ContentSources, Reconcilable, Verdict};
pub use outcome::{Outcome, Reconciled, WaitReason};

/// Fixed poll interval for unmet dependencies and unavailable content.
pub const DEFAULT_DEPENDENCY_POLL: std::time::Duration = std::time::Duration::from_secs(5);

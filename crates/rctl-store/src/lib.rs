//! rctl-store
//!
//! The declarative object store seen by the controller.
//!
//! The engine needs only four things from a store: get-by-key, list,
//! update-status and a change feed. [`ResourceStore`] is that boundary.
//! [`MemoryStore`] is the in-process implementation used by the daemon and
//! the CLI, optionally persisted to a JSON snapshot file.
//!
//! # Invariants
//! - `get` distinguishes "does not exist" ([`StoreError::NotFound`]) from
//!   every other failure. Callers rely on this to tell a pending dependency
//!   apart from a broken store.
//! - `update_status` never touches `spec`, and refuses stale writes
//!   ([`StoreError::Conflict`]) using the object's `resource_version`.
//! - `spec` is immutable once stored: re-applying a different spec fails.

mod error;
mod memory;
mod snapshot;

pub use error::StoreError;
pub use memory::MemoryStore;
pub use snapshot::{load_snapshot, write_snapshot, SnapshotFile};

use rctl_schemas::{Kind, KindResource, Object, ResourceKey};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

// ---------------------------------------------------------------------------
// Change feed
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeType {
    Created,
    StatusUpdated,
    Deleted,
}

/// One change observed by the store.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreEvent {
    pub key: ResourceKey,
    pub change: ChangeType,
    /// Whether the object was done after the change (false for deletes).
    pub done: bool,
}

/// Result of [`ResourceStore::apply`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Applied {
    Created(Object),
    Unchanged(Object),
}

impl Applied {
    pub fn object(&self) -> &Object {
        match self {
            Applied::Created(o) | Applied::Unchanged(o) => o,
        }
    }
}

// ---------------------------------------------------------------------------
// Store boundary
// ---------------------------------------------------------------------------

/// Object store consumed by the reconciliation engine.
///
/// Calls are blocking and short; implementations must be safe to share
/// across worker threads.
pub trait ResourceStore: Send + Sync {
    /// Fetch one object. Absence is `Err(StoreError::NotFound)`.
    fn get(&self, key: &ResourceKey) -> Result<Object, StoreError>;

    /// List objects, optionally filtered. Ordered by key.
    fn list(&self, namespace: Option<&str>, kind: Option<Kind>) -> Result<Vec<Object>, StoreError>;

    /// Persist `obj.status`. The stored spec is kept; a stale
    /// `resource_version` fails with `Conflict`. Returns the stored object.
    fn update_status(&self, obj: &Object) -> Result<Object, StoreError>;

    /// Create `obj`, or accept an identical re-apply. A different spec for an
    /// existing key fails with `SpecImmutable`.
    fn apply(&self, obj: Object) -> Result<Applied, StoreError>;

    /// Remove an object. Removing a missing object is `NotFound`.
    fn delete(&self, key: &ResourceKey) -> Result<(), StoreError>;

    /// Subscribe to the change feed.
    fn watch(&self) -> broadcast::Receiver<StoreEvent>;
}

/// Typed get: fetch `(namespace, name)` as resource type `R`.
///
/// The key's kind comes from `R`, so a stored object of another kind under
/// the same name is never returned.
pub fn get_as<R: KindResource>(
    store: &dyn ResourceStore,
    namespace: &str,
    name: &str,
) -> Result<R, StoreError> {
    let key = ResourceKey::new(namespace, name, R::KIND);
    let obj = store.get(&key)?;
    R::from_object(obj).ok_or_else(|| StoreError::Backend {
        op: "get",
        reason: format!("object stored under {key} has the wrong kind"),
    })
}

/// Typed status update; returns the stored resource with its new version.
pub fn update_status_as<R: KindResource>(
    store: &dyn ResourceStore,
    resource: &R,
) -> Result<R, StoreError> {
    let key = resource.key();
    let stored = store.update_status(&resource.clone().into_object())?;
    R::from_object(stored).ok_or_else(|| StoreError::Backend {
        op: "update_status",
        reason: format!("object stored under {key} has the wrong kind"),
    })
}

/// Apply every object in order, stopping at the first failure.
pub fn apply_all(
    store: &dyn ResourceStore,
    objects: impl IntoIterator<Item = Object>,
) -> Result<Vec<Applied>, StoreError> {
    objects.into_iter().map(|o| store.apply(o)).collect()
}

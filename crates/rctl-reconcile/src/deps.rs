//! Dependency readiness.
//!
//! A `Requires` list is ready iff every reference names an existing resource
//! whose `status.done` is true. Order does not matter.

use rctl_schemas::{Kind, Object, Require, ResourceKey};
use rctl_store::{ResourceStore, StoreError};
use std::fmt;

/// Outcome of scanning a `Requires` list.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Readiness {
    /// References that are missing or not yet done, in declaration order.
    pub pending: Vec<Require>,
}

impl Readiness {
    pub fn is_ready(&self) -> bool {
        self.pending.is_empty()
    }
}

/// A dependency lookup failed for a reason other than absence.
#[derive(Debug)]
pub struct DependencyError {
    pub reference: Require,
    pub source: StoreError,
}

impl fmt::Display for DependencyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "lookup of dependency {} failed: {}", self.reference, self.source)
    }
}

impl std::error::Error for DependencyError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.source)
    }
}

/// Scan every reference in `requires`.
///
/// Absent or empty `requires` is ready. A not-found reference is pending.
/// Any other lookup failure returns immediately; readiness gathered so far
/// is discarded. Pending references never stop the scan, so a later hard
/// error is still reported.
pub fn evaluate(
    store: &dyn ResourceStore,
    namespace: &str,
    requires: Option<&[Require]>,
) -> Result<Readiness, DependencyError> {
    let mut readiness = Readiness::default();
    for reference in requires.unwrap_or_default() {
        let key = ResourceKey::new(namespace, reference.name(), reference.kind());
        match store.get(&key) {
            Ok(obj) if obj.is_done() => {}
            Ok(_) => readiness.pending.push(reference.clone()),
            Err(e) if e.is_not_found() => readiness.pending.push(reference.clone()),
            Err(source) => {
                return Err(DependencyError {
                    reference: reference.clone(),
                    source,
                })
            }
        }
    }
    Ok(readiness)
}

/// Boolean form of [`evaluate`].
pub fn ready(
    store: &dyn ResourceStore,
    namespace: &str,
    requires: Option<&[Require]>,
) -> Result<bool, DependencyError> {
    evaluate(store, namespace, requires).map(|r| r.is_ready())
}

/// Keys of resources in `key`'s namespace that may be unblocked by a change
/// to `key`: those that require it, or, for a Host, those that run on it.
pub fn dependents_of(
    store: &dyn ResourceStore,
    key: &ResourceKey,
) -> Result<Vec<ResourceKey>, StoreError> {
    let objects = store.list(Some(&key.namespace), None)?;
    Ok(objects
        .iter()
        .filter(|o| depends_on(o, key))
        .map(Object::key)
        .collect())
}

fn depends_on(obj: &Object, key: &ResourceKey) -> bool {
    if key.kind == Kind::Host {
        return obj.host_name() == Some(key.name.as_str());
    }
    obj.requires()
        .map_or(false, |reqs| reqs.iter().any(|r| r.targets(key.kind, &key.name)))
}

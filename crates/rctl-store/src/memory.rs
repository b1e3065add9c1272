use crate::snapshot::{load_snapshot, write_snapshot, SnapshotFile};
use crate::{Applied, ChangeType, ResourceStore, StoreError, StoreEvent};
use rctl_schemas::{Kind, Object, ResourceKey};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use tokio::sync::broadcast;

const EVENT_CAPACITY: usize = 1024;

struct Inner {
    objects: BTreeMap<ResourceKey, Object>,
    last_version: u64,
}

/// In-process store. Every successful write bumps a store-wide version
/// counter and stamps it on the written object.
///
/// With a state file configured, the full object set is rewritten after each
/// mutation (atomically, via temp file + rename).
pub struct MemoryStore {
    inner: RwLock<Inner>,
    events: broadcast::Sender<StoreEvent>,
    state_file: Option<PathBuf>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            inner: RwLock::new(Inner {
                objects: BTreeMap::new(),
                last_version: 0,
            }),
            events,
            state_file: None,
        }
    }

    /// Open a store persisted at `path`. A missing file starts empty.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let mut store = Self::new();
        store.state_file = Some(path.clone());

        if path.exists() {
            let snap = load_snapshot(&path)?;
            let mut inner = store.write_lock("open")?;
            for obj in snap.objects {
                inner.last_version = inner.last_version.max(obj.meta().resource_version);
                inner.objects.insert(obj.key(), obj);
            }
            tracing::info!(
                path = %path.display(),
                objects = inner.objects.len(),
                "store_snapshot_loaded"
            );
        }
        Ok(store)
    }

    pub fn state_file(&self) -> Option<&Path> {
        self.state_file.as_deref()
    }

    pub fn len(&self) -> usize {
        self.inner.read().map(|i| i.objects.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn write_lock(&self, op: &'static str) -> Result<std::sync::RwLockWriteGuard<'_, Inner>, StoreError> {
        self.inner
            .write()
            .map_err(|_| StoreError::backend(op, "store lock poisoned"))
    }

    fn read_lock(&self, op: &'static str) -> Result<std::sync::RwLockReadGuard<'_, Inner>, StoreError> {
        self.inner
            .read()
            .map_err(|_| StoreError::backend(op, "store lock poisoned"))
    }

    fn persist(&self, op: &'static str, inner: &Inner) -> Result<(), StoreError> {
        let Some(path) = &self.state_file else {
            return Ok(());
        };
        let snap = SnapshotFile::from_objects(inner.objects.values().cloned());
        write_snapshot(path, &snap).map_err(|e| StoreError::backend(op, e.to_string()))
    }

    /// Put `next` (or remove, for `None`) at `key` and persist. If the
    /// snapshot write fails, memory is restored to its prior state so a
    /// failed write is never observable.
    fn stage(
        &self,
        op: &'static str,
        inner: &mut Inner,
        key: &ResourceKey,
        next: Option<Object>,
    ) -> Result<(), StoreError> {
        let prior_version = inner.last_version;
        let prior = match next {
            Some(obj) => {
                inner.last_version = inner.last_version.max(obj.meta().resource_version);
                inner.objects.insert(key.clone(), obj)
            }
            None => inner.objects.remove(key),
        };

        if let Err(e) = self.persist(op, inner) {
            match prior {
                Some(obj) => {
                    inner.objects.insert(key.clone(), obj);
                }
                None => {
                    inner.objects.remove(key);
                }
            }
            inner.last_version = prior_version;
            tracing::warn!(resource = %key, op, error = %e, "store_write_rolled_back");
            return Err(e);
        }
        Ok(())
    }

    fn publish(&self, key: ResourceKey, change: ChangeType, done: bool) {
        // No subscribers is not an error.
        let _ = self.events.send(StoreEvent { key, change, done });
    }
}

impl ResourceStore for MemoryStore {
    fn get(&self, key: &ResourceKey) -> Result<Object, StoreError> {
        let inner = self.read_lock("get")?;
        inner
            .objects
            .get(key)
            .cloned()
            .ok_or_else(|| StoreError::NotFound { key: key.clone() })
    }

    fn list(&self, namespace: Option<&str>, kind: Option<Kind>) -> Result<Vec<Object>, StoreError> {
        let inner = self.read_lock("list")?;
        Ok(inner
            .objects
            .iter()
            .filter(|(k, _)| namespace.map_or(true, |ns| k.namespace == ns))
            .filter(|(k, _)| kind.map_or(true, |kd| k.kind == kd))
            .map(|(_, o)| o.clone())
            .collect())
    }

    fn update_status(&self, obj: &Object) -> Result<Object, StoreError> {
        let key = obj.key();
        let mut inner = self.write_lock("update_status")?;
        let next_version = inner.last_version + 1;

        let stored = inner
            .objects
            .get(&key)
            .ok_or_else(|| StoreError::NotFound { key: key.clone() })?;

        let actual = stored.meta().resource_version;
        let expected = obj.meta().resource_version;
        if actual != expected {
            return Err(StoreError::Conflict {
                key,
                expected,
                actual,
            });
        }

        // Keep the stored spec; take only the status half of `obj`.
        let updated = with_status_of(stored, obj);
        let mut updated = updated.ok_or_else(|| {
            StoreError::backend("update_status", format!("kind mismatch writing {key}"))
        })?;
        updated.meta_mut().resource_version = next_version;

        self.stage("update_status", &mut inner, &key, Some(updated.clone()))?;
        drop(inner);

        self.publish(key, ChangeType::StatusUpdated, updated.is_done());
        Ok(updated)
    }

    fn apply(&self, mut obj: Object) -> Result<Applied, StoreError> {
        let key = obj.key();
        let mut inner = self.write_lock("apply")?;

        if let Some(existing) = inner.objects.get(&key) {
            if existing.same_spec(&obj) {
                return Ok(Applied::Unchanged(existing.clone()));
            }
            return Err(StoreError::SpecImmutable { key });
        }

        obj.meta_mut().resource_version = inner.last_version + 1;
        self.stage("apply", &mut inner, &key, Some(obj.clone()))?;
        drop(inner);

        tracing::debug!(resource = %key, "resource_created");
        self.publish(key, ChangeType::Created, obj.is_done());
        Ok(Applied::Created(obj))
    }

    fn delete(&self, key: &ResourceKey) -> Result<(), StoreError> {
        let mut inner = self.write_lock("delete")?;
        if !inner.objects.contains_key(key) {
            return Err(StoreError::NotFound { key: key.clone() });
        }
        self.stage("delete", &mut inner, key, None)?;
        drop(inner);

        self.publish(key.clone(), ChangeType::Deleted, false);
        Ok(())
    }

    fn watch(&self) -> broadcast::Receiver<StoreEvent> {
        self.events.subscribe()
    }
}

/// `stored` with its status replaced by `incoming`'s. `None` on kind mismatch.
fn with_status_of(stored: &Object, incoming: &Object) -> Option<Object> {
    let mut out = stored.clone();
    match (&mut out, incoming) {
        (Object::Host(a), Object::Host(b)) => a.status = b.status.clone(),
        (Object::Command(a), Object::Command(b)) => a.status = b.status.clone(),
        (Object::File(a), Object::File(b)) => a.status = b.status.clone(),
        (Object::FileContent(a), Object::FileContent(b)) => a.status = b.status.clone(),
        _ => return None,
    }
    Some(out)
}

use rctl_schemas::{Kind, Object, ResourceKey};
use rctl_store::{Applied, ResourceStore, StoreError, StoreEvent};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;

#[derive(Default)]
struct Faults {
    get: HashMap<ResourceKey, usize>,
    status_writes: usize,
    settled_status_writes: usize,
    status_write_attempts: usize,
}

/// Store wrapper that injects backend failures on demand.
pub struct FlakyStore {
    inner: Arc<dyn ResourceStore>,
    faults: Mutex<Faults>,
}

impl FlakyStore {
    pub fn new(inner: Arc<dyn ResourceStore>) -> Self {
        Self {
            inner,
            faults: Mutex::new(Faults::default()),
        }
    }

    pub fn inner(&self) -> &Arc<dyn ResourceStore> {
        &self.inner
    }

    /// The next `times` gets of `key` fail.
    pub fn fail_gets(&self, key: ResourceKey, times: usize) {
        self.lock().get.insert(key, times);
    }

    /// The next `times` status writes fail, whatever they carry.
    pub fn fail_status_writes(&self, times: usize) {
        self.lock().status_writes = times;
    }

    /// The next `times` status writes that would mark an object done or
    /// failed fail; intermediate phase writes go through.
    pub fn fail_settled_status_writes(&self, times: usize) {
        self.lock().settled_status_writes = times;
    }

    /// Status writes attempted so far, including injected failures.
    pub fn status_write_attempts(&self) -> usize {
        self.lock().status_write_attempts
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Faults> {
        self.faults.lock().unwrap_or_else(|p| p.into_inner())
    }
}

fn injected(op: &'static str) -> StoreError {
    StoreError::backend(op, "injected fault")
}

impl ResourceStore for FlakyStore {
    fn get(&self, key: &ResourceKey) -> Result<Object, StoreError> {
        {
            let mut f = self.lock();
            if let Some(n) = f.get.get_mut(key) {
                if *n > 0 {
                    *n -= 1;
                    return Err(injected("get"));
                }
            }
        }
        self.inner.get(key)
    }

    fn list(&self, namespace: Option<&str>, kind: Option<Kind>) -> Result<Vec<Object>, StoreError> {
        self.inner.list(namespace, kind)
    }

    fn update_status(&self, obj: &Object) -> Result<Object, StoreError> {
        {
            let mut f = self.lock();
            f.status_write_attempts += 1;
            if f.status_writes > 0 {
                f.status_writes -= 1;
                return Err(injected("update_status"));
            }
            if f.settled_status_writes > 0 && obj.is_settled() {
                f.settled_status_writes -= 1;
                return Err(injected("update_status"));
            }
        }
        self.inner.update_status(obj)
    }

    fn apply(&self, obj: Object) -> Result<Applied, StoreError> {
        self.inner.apply(obj)
    }

    fn delete(&self, key: &ResourceKey) -> Result<(), StoreError> {
        self.inner.delete(key)
    }

    fn watch(&self) -> broadcast::Receiver<StoreEvent> {
        self.inner.watch()
    }
}

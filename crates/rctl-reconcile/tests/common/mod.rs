//! Shared rig for the engine scenarios: in-memory store behind a fault
//! injector, scripted executor, static credentials.
#![allow(dead_code)]

use rctl_reconcile::{EngineSettings, ReconcileError, Reconciled, Reconciler};
use rctl_schemas::{Kind, Object, Phase, ResourceKey};
use rctl_store::{MemoryStore, ResourceStore};
use rctl_testkit::{fixtures, test_credentials, FakeExecutor, FlakyStore};
use std::sync::Arc;

pub const NS: &str = "default";

pub struct Rig {
    pub store: Arc<MemoryStore>,
    pub flaky: Arc<FlakyStore>,
    pub exec: Arc<FakeExecutor>,
    pub engine: Reconciler,
}

pub fn rig() -> Rig {
    rig_with(EngineSettings::default())
}

pub fn rig_with(settings: EngineSettings) -> Rig {
    let store = Arc::new(MemoryStore::new());
    let flaky = Arc::new(FlakyStore::new(store.clone()));
    let exec = Arc::new(FakeExecutor::new());
    let engine = Reconciler::new(
        flaky.clone(),
        Arc::new(test_credentials(&[NS])),
        exec.clone(),
        settings,
    );
    Rig {
        store,
        flaky,
        exec,
        engine,
    }
}

pub fn key(kind: Kind, name: &str) -> ResourceKey {
    ResourceKey::new(NS, name, kind)
}

impl Rig {
    pub fn seed(&self, objects: impl IntoIterator<Item = Object>) {
        fixtures::seed(self.store.as_ref(), objects);
    }

    pub fn reconcile(&self, key: &ResourceKey) -> Result<Reconciled, ReconcileError> {
        self.engine.reconcile(key)
    }

    pub fn object(&self, key: &ResourceKey) -> Object {
        self.store
            .get(key)
            .unwrap_or_else(|e| panic!("{key}: {e}"))
    }

    pub fn phase(&self, key: &ResourceKey) -> Phase {
        self.object(key).phase()
    }

    pub fn version(&self, key: &ResourceKey) -> u64 {
        self.object(key).meta().resource_version
    }
}

//! Process wiring shared by the daemon and the CLI: config in, store and
//! controller out.

use crate::{BackoffPolicy, Controller, RuntimeSettings};
use anyhow::{Context, Result};
use rctl_config::{ControllerConfig, CredentialResolver, DirCredentialResolver};
use rctl_exec::{executor_from_settings, RemoteExecutor};
use rctl_reconcile::{EngineSettings, Reconciler};
use rctl_store::{MemoryStore, ResourceStore};
use std::path::Path;
use std::sync::Arc;

impl RuntimeSettings {
    pub fn from_config(cfg: &ControllerConfig) -> Self {
        Self {
            workers: cfg.controller.workers,
            backoff: BackoffPolicy::new(
                cfg.controller.backoff.base(),
                cfg.controller.backoff.max(),
            ),
        }
    }
}

pub fn engine_settings(cfg: &ControllerConfig) -> EngineSettings {
    EngineSettings {
        dependency_poll: cfg.controller.dependency_poll(),
        default_user: cfg.ssh.user.clone(),
    }
}

/// Open the configured store, or `override_path` when given. In-memory when
/// neither names a state file.
pub fn open_store(cfg: &ControllerConfig, override_path: Option<&Path>) -> Result<Arc<MemoryStore>> {
    let path = override_path.or(cfg.store.state_file.as_deref());
    let store = match path {
        Some(p) => MemoryStore::open(p)
            .with_context(|| format!("open state file {}", p.display()))?,
        None => MemoryStore::new(),
    };
    tracing::info!(
        state_file = ?store.state_file(),
        objects = store.len(),
        "store_opened"
    );
    Ok(Arc::new(store))
}

/// Controller over `store` with the configured credentials directory and
/// SSH transport.
pub fn build_controller(cfg: &ControllerConfig, store: Arc<dyn ResourceStore>) -> Result<Arc<Controller>> {
    let credentials: Arc<dyn CredentialResolver> =
        Arc::new(DirCredentialResolver::new(cfg.credentials.dir.clone()));
    let executor = executor_from_settings(&cfg.ssh)?;
    Ok(build_controller_with(cfg, store, credentials, executor))
}

/// [`build_controller`] with explicit collaborators.
pub fn build_controller_with(
    cfg: &ControllerConfig,
    store: Arc<dyn ResourceStore>,
    credentials: Arc<dyn CredentialResolver>,
    executor: Arc<dyn RemoteExecutor>,
) -> Arc<Controller> {
    let engine = Reconciler::new(store, credentials, executor, engine_settings(cfg));
    Controller::new(engine, RuntimeSettings::from_config(cfg))
}

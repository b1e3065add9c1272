use crate::deps;
use crate::kinds::{ContentGate, ContentSources, Reconcilable, Verdict};
use crate::{Outcome, ReconcileError, Reconciled, WaitReason, DEFAULT_DEPENDENCY_POLL};
use rctl_config::CredentialResolver;
use rctl_exec::{RemoteExecutor, Target};
use rctl_schemas::{Command, File, FileContent, Host, Kind, Phase, ResourceKey};
use rctl_store::{get_as, update_status_as, ResourceStore, StoreError};
use std::sync::Arc;
use std::time::Duration;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EngineSettings {
    /// Requeue delay while dependencies or content are unavailable.
    pub dependency_poll: Duration,
    /// Login for Hosts that do not set `spec.user`.
    pub default_user: String,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            dependency_poll: DEFAULT_DEPENDENCY_POLL,
            default_user: "root".to_string(),
        }
    }
}

/// Generic reconciliation driver.
///
/// Cheap to clone; all collaborators are shared.
#[derive(Clone)]
pub struct Reconciler {
    store: Arc<dyn ResourceStore>,
    credentials: Arc<dyn CredentialResolver>,
    executor: Arc<dyn RemoteExecutor>,
    settings: EngineSettings,
}

impl Reconciler {
    pub fn new(
        store: Arc<dyn ResourceStore>,
        credentials: Arc<dyn CredentialResolver>,
        executor: Arc<dyn RemoteExecutor>,
        settings: EngineSettings,
    ) -> Self {
        Self {
            store,
            credentials,
            executor,
            settings,
        }
    }

    pub fn store(&self) -> &Arc<dyn ResourceStore> {
        &self.store
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// One pass of load, check, act and persist for `key`. Blocking.
    pub fn reconcile(&self, key: &ResourceKey) -> Result<Reconciled, ReconcileError> {
        let result = match key.kind {
            Kind::Host => self.reconcile_kind::<Host>(key),
            Kind::Command => self.reconcile_kind::<Command>(key),
            Kind::File => self.reconcile_kind::<File>(key),
            Kind::FileContent => self.reconcile_kind::<FileContent>(key),
        };
        match &result {
            Ok(r) => tracing::debug!(
                namespace = %key.namespace,
                name = %key.name,
                kind = %key.kind,
                outcome = ?r.outcome,
                requeue_after_ms = r.requeue_after.map(|d| d.as_millis() as u64),
                "reconcile_ok"
            ),
            Err(e) => tracing::warn!(
                namespace = %key.namespace,
                name = %key.name,
                kind = %key.kind,
                stage = e.stage(),
                error = %e,
                "reconcile_error"
            ),
        }
        result
    }

    fn reconcile_kind<R: Reconcilable>(&self, key: &ResourceKey) -> Result<Reconciled, ReconcileError> {
        let store = self.store.as_ref();

        // 1. Load. Absence means it was deleted; nothing to do.
        let mut res: R = match get_as::<R>(store, &key.namespace, &key.name) {
            Ok(r) => r,
            Err(e) if e.is_not_found() => return Ok(Reconciled::finished(Outcome::Absent)),
            Err(source) => {
                return Err(ReconcileError::Load {
                    key: key.clone(),
                    source,
                })
            }
        };

        // 2. Settled resources are never acted on again.
        if res.is_done() || res.phase() == Phase::Failed {
            return Ok(Reconciled::finished(Outcome::AlreadySettled));
        }

        // 3-4. Requires.
        let readiness = deps::evaluate(store, &key.namespace, res.requires().map(Vec::as_slice))
            .map_err(|source| ReconcileError::Dependency {
                key: key.clone(),
                source,
            })?;
        if !readiness.is_ready() {
            return self.wait(res, WaitReason::dependencies(&readiness.pending));
        }

        // Content gate (File sources).
        let sources = ContentSources {
            store,
            credentials: self.credentials.as_ref(),
        };
        let content = match res.resolve_content(&sources)? {
            ContentGate::Ready(content) => content,
            ContentGate::Pending(detail) => {
                return self.wait(res, WaitReason::Content { detail });
            }
            ContentGate::Rejected(message) => {
                res.reject(message.clone());
                self.write_status(&res)?;
                tracing::warn!(resource = %key, message = %message, "reconcile_rejected");
                return Ok(Reconciled::finished(Outcome::Rejected { message }));
            }
        };

        // 5. Mark the attempt before any side effect.
        if res.phase() != Phase::Running {
            res.set_phase(Phase::Running);
            res = self.write_status(&res)?;
        }

        let host_name = res.host_name().to_string();
        let host: Host = get_as(store, &key.namespace, &host_name).map_err(|source| {
            ReconcileError::Host {
                key: key.clone(),
                host: host_name.clone(),
                source,
            }
        })?;

        // 6. Credential.
        let private_key = self
            .credentials
            .ssh_private_key(&host.metadata.namespace, &host.spec.ssh_key_secret)
            .map_err(|source| ReconcileError::Credential {
                key: key.clone(),
                host: host_name.clone(),
                secret: host.spec.ssh_key_secret.clone(),
                source,
            })?;

        // 7. Act.
        let target = Target::new(
            host.spec.ip_address.clone(),
            host.spec.port,
            host.spec
                .user
                .clone()
                .unwrap_or_else(|| self.settings.default_user.clone()),
        );
        let command = res.build_command(content.as_deref());
        tracing::info!(resource = %key, host = %host_name, target = %target, "remote_action_start");
        let output = self
            .executor
            .execute(&target, &private_key, &command)
            .map_err(|source| ReconcileError::Transport {
                key: key.clone(),
                host: host_name.clone(),
                source,
            })?;

        // 8. Persist.
        match res.apply_result(output) {
            Verdict::Done => {
                self.write_status(&res)?;
                tracing::info!(resource = %key, "reconcile_done");
                Ok(Reconciled::finished(Outcome::Done))
            }
            Verdict::Failed { exit_code } => {
                self.write_status(&res)?;
                tracing::warn!(resource = %key, exit_code, "reconcile_failed");
                Ok(Reconciled::finished(Outcome::Failed { exit_code }))
            }
            Verdict::Rejected { message } => {
                self.write_status(&res)?;
                tracing::warn!(resource = %key, message = %message, "reconcile_rejected");
                Ok(Reconciled::finished(Outcome::Rejected { message }))
            }
            Verdict::Retry { exit_code, stderr } => Err(ReconcileError::HostProbe {
                key: key.clone(),
                exit_code,
                stderr,
            }),
        }
    }

    /// Blocked: record WAITING once and poll. A resource already past
    /// WAITING keeps its phase.
    fn wait<R: Reconcilable>(&self, mut res: R, reason: WaitReason) -> Result<Reconciled, ReconcileError> {
        let phase = res.phase();
        if phase != Phase::Waiting && phase.can_advance_to(Phase::Waiting) {
            res.set_phase(Phase::Waiting);
            self.write_status(&res)?;
        }
        tracing::debug!(resource = %res.key(), reason = ?reason, "reconcile_waiting");
        Ok(Reconciled::requeue(
            Outcome::Waiting(reason),
            self.settings.dependency_poll,
        ))
    }

    fn write_status<R: Reconcilable>(&self, res: &R) -> Result<R, ReconcileError> {
        update_status_as(self.store.as_ref(), res).map_err(|source: StoreError| {
            ReconcileError::StatusWrite {
                key: res.key(),
                phase: res.phase(),
                source,
            }
        })
    }
}

use crate::deps::DependencyError;
use rctl_config::CredentialError;
use rctl_exec::TransportError;
use rctl_schemas::{Phase, ResourceKey};
use rctl_store::StoreError;
use std::fmt;

/// Infrastructure failures. Each names the resource and the step that
/// failed; all are retryable by the driving queue.
#[derive(Debug)]
pub enum ReconcileError {
    /// Loading the resource itself failed (not absence).
    Load { key: ResourceKey, source: StoreError },
    Dependency {
        key: ResourceKey,
        source: DependencyError,
    },
    /// The Host named by the resource is missing or could not be read.
    Host {
        key: ResourceKey,
        host: String,
        source: StoreError,
    },
    Credential {
        key: ResourceKey,
        host: String,
        secret: String,
        source: CredentialError,
    },
    Transport {
        key: ResourceKey,
        host: String,
        source: TransportError,
    },
    /// The host facts probe ran but exited non-zero.
    HostProbe {
        key: ResourceKey,
        exit_code: i32,
        stderr: String,
    },
    /// A File content source could not be read (not absence).
    ContentSource {
        key: ResourceKey,
        source_ref: String,
        reason: String,
    },
    /// Persisting status failed. When `phase` is terminal the remote action
    /// already ran and will run again on the next attempt.
    StatusWrite {
        key: ResourceKey,
        phase: Phase,
        source: StoreError,
    },
}

impl ReconcileError {
    pub fn key(&self) -> &ResourceKey {
        match self {
            ReconcileError::Load { key, .. }
            | ReconcileError::Dependency { key, .. }
            | ReconcileError::Host { key, .. }
            | ReconcileError::Credential { key, .. }
            | ReconcileError::Transport { key, .. }
            | ReconcileError::HostProbe { key, .. }
            | ReconcileError::ContentSource { key, .. }
            | ReconcileError::StatusWrite { key, .. } => key,
        }
    }

    /// Every variant may heal on its own (a host or secret appears, the
    /// network recovers), so all are retried.
    pub fn is_retryable(&self) -> bool {
        true
    }

    /// Short stable label for logs and metrics.
    pub fn stage(&self) -> &'static str {
        match self {
            ReconcileError::Load { .. } => "load",
            ReconcileError::Dependency { .. } => "dependency",
            ReconcileError::Host { .. } => "host",
            ReconcileError::Credential { .. } => "credential",
            ReconcileError::Transport { .. } => "transport",
            ReconcileError::HostProbe { .. } => "host_probe",
            ReconcileError::ContentSource { .. } => "content_source",
            ReconcileError::StatusWrite { .. } => "status_write",
        }
    }
}

impl fmt::Display for ReconcileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReconcileError::Load { key, source } => write!(f, "{key}: load failed: {source}"),
            ReconcileError::Dependency { key, source } => write!(f, "{key}: {source}"),
            ReconcileError::Host { key, host, source } => {
                write!(f, "{key}: host '{host}' unavailable: {source}")
            }
            ReconcileError::Credential {
                key,
                host,
                secret,
                source,
            } => write!(f, "{key}: credential '{secret}' for host '{host}': {source}"),
            ReconcileError::Transport { key, host, source } => {
                write!(f, "{key}: remote exec on host '{host}' failed: {source}")
            }
            ReconcileError::HostProbe {
                key,
                exit_code,
                stderr,
            } => write!(
                f,
                "{key}: facts probe exited {exit_code}: {}",
                stderr.trim()
            ),
            ReconcileError::ContentSource {
                key,
                source_ref,
                reason,
            } => write!(f, "{key}: content source {source_ref}: {reason}"),
            ReconcileError::StatusWrite { key, phase, source } => {
                write!(f, "{key}: writing phase {phase} failed: {source}")
            }
        }
    }
}

impl std::error::Error for ReconcileError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ReconcileError::Load { source, .. }
            | ReconcileError::Host { source, .. }
            | ReconcileError::StatusWrite { source, .. } => Some(source),
            ReconcileError::Dependency { source, .. } => Some(source),
            ReconcileError::Credential { source, .. } => Some(source),
            ReconcileError::Transport { source, .. } => Some(source),
            ReconcileError::HostProbe { .. } | ReconcileError::ContentSource { .. } => None,
        }
    }
}

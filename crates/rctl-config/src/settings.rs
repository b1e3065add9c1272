//! Typed view of the merged config document.
//!
//! Every section and key is optional; absent values take the defaults
//! below. Unknown keys are not an error here: that is what
//! [`crate::report_unused_keys`] is for.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackoffSettings {
    /// First retry delay after a failed reconcile.
    pub base_ms: u64,
    /// Upper bound for the per-key exponential delay.
    pub max_secs: u64,
}

impl Default for BackoffSettings {
    fn default() -> Self {
        Self {
            base_ms: 500,
            max_secs: 300,
        }
    }
}

impl BackoffSettings {
    pub fn base(&self) -> Duration {
        Duration::from_millis(self.base_ms)
    }

    pub fn max(&self) -> Duration {
        Duration::from_secs(self.max_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerSettings {
    pub workers: usize,
    /// Delay before re-checking a resource whose dependencies are pending.
    pub dependency_poll_secs: u64,
    pub backoff: BackoffSettings,
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            workers: 4,
            dependency_poll_secs: 5,
            backoff: BackoffSettings::default(),
        }
    }
}

impl ControllerSettings {
    pub fn dependency_poll(&self) -> Duration {
        Duration::from_secs(self.dependency_poll_secs)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    /// Shell out to the system `ssh` client.
    #[default]
    Openssh,
    /// In-process libssh2 session (requires the `ssh2` build feature).
    Ssh2,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SshSettings {
    /// Login used when a Host does not name one.
    pub user: String,
    pub connect_timeout_secs: u64,
    /// Path or name of the OpenSSH client binary.
    pub binary: String,
    pub transport: TransportKind,
}

impl Default for SshSettings {
    fn default() -> Self {
        Self {
            user: "root".to_string(),
            connect_timeout_secs: 10,
            binary: "ssh".to_string(),
            transport: TransportKind::Openssh,
        }
    }
}

impl SshSettings {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CredentialSettings {
    /// Root of the `<namespace>/<secret>/<field>` credential tree.
    pub dir: PathBuf,
}

impl Default for CredentialSettings {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("./secrets"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct StoreSettings {
    /// JSON snapshot file. `None` keeps the store in memory only.
    pub state_file: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DaemonSettings {
    pub addr: String,
    pub heartbeat_secs: u64,
}

impl Default for DaemonSettings {
    fn default() -> Self {
        Self {
            addr: "127.0.0.1:8787".to_string(),
            heartbeat_secs: 5,
        }
    }
}

/// Effective controller configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ControllerConfig {
    pub controller: ControllerSettings,
    pub ssh: SshSettings,
    pub credentials: CredentialSettings,
    pub store: StoreSettings,
    pub daemon: DaemonSettings,
}

impl ControllerConfig {
    /// Build from a merged config document and validate ranges.
    pub fn from_config_json(config_json: &Value) -> Result<Self> {
        let cfg: ControllerConfig = serde_json::from_value(config_json.clone())
            .context("config does not match the controller schema")?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        if self.controller.workers == 0 {
            bail!("CONFIG_INVALID /controller/workers must be >= 1");
        }
        if self.controller.dependency_poll_secs == 0 {
            bail!("CONFIG_INVALID /controller/dependency_poll_secs must be >= 1");
        }
        if self.controller.backoff.base_ms == 0 {
            bail!("CONFIG_INVALID /controller/backoff/base_ms must be >= 1");
        }
        if self.controller.backoff.base() > self.controller.backoff.max() {
            bail!("CONFIG_INVALID /controller/backoff: base_ms exceeds max_secs");
        }
        if self.ssh.user.trim().is_empty() {
            bail!("CONFIG_INVALID /ssh/user must not be blank");
        }
        if self.ssh.binary.trim().is_empty() {
            bail!("CONFIG_INVALID /ssh/binary must not be blank");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn empty_document_yields_defaults() {
        let cfg = ControllerConfig::from_config_json(&json!({})).unwrap();
        assert_eq!(cfg.controller.workers, 4);
        assert_eq!(cfg.controller.dependency_poll(), Duration::from_secs(5));
        assert_eq!(cfg.ssh.user, "root");
        assert_eq!(cfg.ssh.transport, TransportKind::Openssh);
        assert_eq!(cfg.daemon.addr, "127.0.0.1:8787");
        assert!(cfg.store.state_file.is_none());
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let cfg = ControllerConfig::from_config_json(&json!({
            "controller": { "workers": 8, "backoff": { "max_secs": 60 } },
            "ssh": { "transport": "ssh2" }
        }))
        .unwrap();
        assert_eq!(cfg.controller.workers, 8);
        assert_eq!(cfg.controller.backoff.base_ms, 500);
        assert_eq!(cfg.controller.backoff.max_secs, 60);
        assert_eq!(cfg.ssh.transport, TransportKind::Ssh2);
        assert_eq!(cfg.ssh.connect_timeout_secs, 10);
    }

    #[test]
    fn zero_workers_is_rejected() {
        let err = ControllerConfig::from_config_json(&json!({"controller": {"workers": 0}}))
            .unwrap_err();
        assert!(err.to_string().contains("/controller/workers"));
    }

    #[test]
    fn wrong_type_is_rejected() {
        assert!(
            ControllerConfig::from_config_json(&json!({"controller": {"workers": "many"}}))
                .is_err()
        );
    }
}

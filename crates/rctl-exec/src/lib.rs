//! rctl-exec
//!
//! Remote command execution on managed hosts.
//!
//! # Contract
//! - One call to [`RemoteExecutor::execute`] opens a session, runs one shell
//!   command, and reports stdout, stderr and the exit code.
//! - A command that ran and exited non-zero is a *result*
//!   (`Ok(ExecOutput { exit_code: n, .. })`), not an error. Errors are
//!   reserved for failures to reach, authenticate to, or talk to the host;
//!   callers treat those as retryable.
//! - Host keys are not verified.

pub mod commands;
mod openssh;
#[cfg(feature = "ssh2-backend")]
mod ssh2_backend;

pub use openssh::{classify_ssh_exit, OpenSshExecutor};
#[cfg(feature = "ssh2-backend")]
pub use ssh2_backend::Ssh2Executor;

use rctl_config::{PrivateKey, SshSettings, TransportKind};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Where and as whom to run.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Target {
    pub address: String,
    pub port: u16,
    pub user: String,
}

impl Target {
    pub fn new(address: impl Into<String>, port: u16, user: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            port,
            user: user.into(),
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}:{}", self.user, self.address, self.port)
    }
}

/// Captured result of a command that ran to completion.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
    /// Remote stdout was not valid UTF-8; `stdout` holds a lossy decoding.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub stdout_lossy: bool,
}

impl ExecOutput {
    /// Decode raw channel output. Invalid UTF-8 in stdout is flagged, not
    /// hidden.
    pub fn from_raw(stdout: &[u8], stderr: &[u8], exit_code: i32) -> Self {
        let (stdout, stdout_lossy) = match std::str::from_utf8(stdout) {
            Ok(text) => (text.to_string(), false),
            Err(_) => (String::from_utf8_lossy(stdout).into_owned(), true),
        };
        Self {
            stdout,
            stderr: String::from_utf8_lossy(stderr).into_owned(),
            exit_code,
            stdout_lossy,
        }
    }

    pub fn success(stdout: impl Into<String>) -> Self {
        Self {
            stdout: stdout.into(),
            ..Self::default()
        }
    }

    pub fn exited(exit_code: i32, stderr: impl Into<String>) -> Self {
        Self {
            stderr: stderr.into(),
            exit_code,
            ..Self::default()
        }
    }

    pub fn is_success(&self) -> bool {
        self.exit_code == 0
    }
}

#[derive(Debug)]
pub enum TransportError {
    /// TCP connect or SSH handshake failed.
    Dial { target: String, reason: String },
    /// The server refused the key.
    Auth { target: String, reason: String },
    /// Session opened but the command could not be run or its status read.
    Session { target: String, reason: String },
    /// Local failure (spawning the client, staging the key file).
    Io {
        context: &'static str,
        source: std::io::Error,
    },
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportError::Dial { target, reason } => write!(f, "dial {target}: {reason}"),
            TransportError::Auth { target, reason } => {
                write!(f, "authenticate to {target}: {reason}")
            }
            TransportError::Session { target, reason } => {
                write!(f, "session on {target}: {reason}")
            }
            TransportError::Io { context, source } => write!(f, "{context}: {source}"),
        }
    }
}

impl std::error::Error for TransportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TransportError::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Executor boundary
// ---------------------------------------------------------------------------

/// Runs one command on a remote host. Blocking.
pub trait RemoteExecutor: Send + Sync {
    fn execute(
        &self,
        target: &Target,
        key: &PrivateKey,
        command: &str,
    ) -> Result<ExecOutput, TransportError>;
}

impl<T: RemoteExecutor + ?Sized> RemoteExecutor for Arc<T> {
    fn execute(
        &self,
        target: &Target,
        key: &PrivateKey,
        command: &str,
    ) -> Result<ExecOutput, TransportError> {
        (**self).execute(target, key, command)
    }
}

/// Build the executor selected by `ssh.transport`.
pub fn executor_from_settings(ssh: &SshSettings) -> anyhow::Result<Arc<dyn RemoteExecutor>> {
    match ssh.transport {
        TransportKind::Openssh => Ok(Arc::new(OpenSshExecutor::new(
            ssh.binary.clone(),
            ssh.connect_timeout(),
        ))),
        #[cfg(feature = "ssh2-backend")]
        TransportKind::Ssh2 => Ok(Arc::new(Ssh2Executor::new(ssh.connect_timeout()))),
        #[cfg(not(feature = "ssh2-backend"))]
        TransportKind::Ssh2 => anyhow::bail!(
            "CONFIG_INVALID /ssh/transport=ssh2 but this build lacks the ssh2-backend feature"
        ),
    }
}

use crate::{ExecOutput, RemoteExecutor, Target, TransportError};
use rctl_config::PrivateKey;
use std::io::Write;
use std::process::{Command, Stdio};
use std::time::Duration;

/// Exit status the OpenSSH client reserves for its own failures.
const SSH_CLIENT_ERROR: i32 = 255;

/// Runs commands through the system OpenSSH client.
///
/// The key is staged in a private temp file (mode 0600) for the duration of
/// one call.
#[derive(Debug, Clone)]
pub struct OpenSshExecutor {
    binary: String,
    connect_timeout: Duration,
}

impl OpenSshExecutor {
    pub fn new(binary: impl Into<String>, connect_timeout: Duration) -> Self {
        Self {
            binary: binary.into(),
            connect_timeout,
        }
    }

    fn configure(&self, cmd: &mut Command, target: &Target, identity: &std::path::Path) {
        cmd.arg("-p").arg(target.port.to_string());
        cmd.arg("-i").arg(identity);
        cmd.arg("-o").arg("BatchMode=yes");
        cmd.arg("-o").arg("IdentitiesOnly=yes");
        cmd.arg("-o").arg("StrictHostKeyChecking=no");
        cmd.arg("-o").arg("UserKnownHostsFile=/dev/null");
        cmd.arg("-o").arg("LogLevel=ERROR");
        cmd.arg("-o").arg(format!(
            "ConnectTimeout={}",
            self.connect_timeout.as_secs().max(1)
        ));
        cmd.arg("-l").arg(&target.user);
    }
}

impl RemoteExecutor for OpenSshExecutor {
    fn execute(
        &self,
        target: &Target,
        key: &PrivateKey,
        command: &str,
    ) -> Result<ExecOutput, TransportError> {
        let mut identity = tempfile::NamedTempFile::new().map_err(|source| TransportError::Io {
            context: "stage ssh identity",
            source,
        })?;
        identity
            .write_all(key.pem().as_bytes())
            .and_then(|_| identity.flush())
            .map_err(|source| TransportError::Io {
                context: "stage ssh identity",
                source,
            })?;

        let mut cmd = Command::new(&self.binary);
        self.configure(&mut cmd, target, identity.path());
        cmd.arg(&target.address).arg("--").arg(command);
        cmd.stdin(Stdio::null());

        tracing::debug!(target = %target, "ssh_exec_start");
        let out = cmd.output().map_err(|source| TransportError::Io {
            context: "spawn ssh client",
            source,
        })?;

        classify_ssh_exit(target, out.status.code(), &out.stdout, &out.stderr)
    }
}

/// Map an OpenSSH client exit to a command result or a transport error.
///
/// `255` is the client's own failure; no code means it was killed. Any other
/// code belongs to the remote command.
pub fn classify_ssh_exit(
    target: &Target,
    code: Option<i32>,
    stdout: &[u8],
    stderr: &[u8],
) -> Result<ExecOutput, TransportError> {
    match code {
        Some(SSH_CLIENT_ERROR) => {
            let reason = String::from_utf8_lossy(stderr).trim().to_string();
            let target = target.to_string();
            if reason.contains("Permission denied") {
                Err(TransportError::Auth { target, reason })
            } else {
                Err(TransportError::Dial { target, reason })
            }
        }
        Some(exit_code) => Ok(ExecOutput::from_raw(stdout, stderr, exit_code)),
        None => Err(TransportError::Session {
            target: target.to_string(),
            reason: "ssh client terminated by signal".to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target() -> Target {
        Target::new("10.0.0.5", 22, "root")
    }

    #[test]
    fn remote_exit_codes_are_results() {
        let out = classify_ssh_exit(&target(), Some(7), b"", b"boom").unwrap();
        assert_eq!(out.exit_code, 7);
        assert_eq!(out.stderr, "boom");
        assert!(!out.is_success());
    }

    #[test]
    fn non_utf8_stdout_is_flagged() {
        let out = classify_ssh_exit(&target(), Some(0), b"\x89PNG\xff\xfe", b"").unwrap();
        assert!(out.stdout_lossy);
        assert!(out.stdout.contains('\u{FFFD}'));

        let text = classify_ssh_exit(&target(), Some(0), "caf\u{e9}\n".as_bytes(), b"").unwrap();
        assert!(!text.stdout_lossy);
        assert_eq!(text.stdout, "caf\u{e9}\n");
    }

    #[test]
    fn client_failures_are_transport_errors() {
        let auth = classify_ssh_exit(
            &target(),
            Some(255),
            b"",
            b"root@10.0.0.5: Permission denied (publickey).",
        )
        .unwrap_err();
        assert!(matches!(auth, TransportError::Auth { .. }));

        let dial = classify_ssh_exit(
            &target(),
            Some(255),
            b"",
            b"ssh: connect to host 10.0.0.5 port 22: Connection refused",
        )
        .unwrap_err();
        assert!(matches!(dial, TransportError::Dial { .. }));
        assert!(dial.to_string().contains("root@10.0.0.5:22"));

        let killed = classify_ssh_exit(&target(), None, b"", b"").unwrap_err();
        assert!(matches!(killed, TransportError::Session { .. }));
    }

    #[test]
    fn command_line_carries_target_options() {
        let exec = OpenSshExecutor::new("ssh", Duration::from_secs(10));
        let mut cmd = Command::new("ssh");
        exec.configure(&mut cmd, &Target::new("h", 2222, "deploy"), std::path::Path::new("/k"));
        let args: Vec<String> = cmd
            .get_args()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        assert!(args.windows(2).any(|w| w == ["-p", "2222"]));
        assert!(args.windows(2).any(|w| w == ["-l", "deploy"]));
        assert!(args.windows(2).any(|w| w == ["-o", "ConnectTimeout=10"]));
        assert!(args.contains(&"StrictHostKeyChecking=no".to_string()));
    }
}

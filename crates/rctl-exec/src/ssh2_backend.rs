use crate::{ExecOutput, RemoteExecutor, Target, TransportError};
use rctl_config::PrivateKey;
use ssh2::Session;
use std::io::Read;
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

/// Runs commands over an in-process libssh2 session.
#[derive(Debug, Clone)]
pub struct Ssh2Executor {
    connect_timeout: Duration,
}

impl Ssh2Executor {
    pub fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }

    fn connect(&self, target: &Target) -> Result<Session, TransportError> {
        let dial = |reason: String| TransportError::Dial {
            target: target.to_string(),
            reason,
        };

        let addr = (target.address.as_str(), target.port)
            .to_socket_addrs()
            .map_err(|e| dial(e.to_string()))?
            .next()
            .ok_or_else(|| dial("address did not resolve".to_string()))?;
        let tcp = TcpStream::connect_timeout(&addr, self.connect_timeout)
            .map_err(|e| dial(e.to_string()))?;

        let mut sess = Session::new().map_err(|e| dial(e.to_string()))?;
        sess.set_tcp_stream(tcp);
        sess.set_timeout(u32::try_from(self.connect_timeout.as_millis()).unwrap_or(u32::MAX));
        sess.handshake().map_err(|e| dial(e.to_string()))?;
        Ok(sess)
    }
}

impl RemoteExecutor for Ssh2Executor {
    fn execute(
        &self,
        target: &Target,
        key: &PrivateKey,
        command: &str,
    ) -> Result<ExecOutput, TransportError> {
        let session_err = |e: ssh2::Error| TransportError::Session {
            target: target.to_string(),
            reason: e.to_string(),
        };

        let sess = self.connect(target)?;
        sess.userauth_pubkey_memory(&target.user, None, key.pem(), None)
            .map_err(|e| TransportError::Auth {
                target: target.to_string(),
                reason: e.to_string(),
            })?;
        if !sess.authenticated() {
            return Err(TransportError::Auth {
                target: target.to_string(),
                reason: "server did not accept the key".to_string(),
            });
        }
        // Session timeout covered the handshake; the command itself may run long.
        sess.set_timeout(0);

        let mut channel = sess.channel_session().map_err(session_err)?;
        channel.exec(command).map_err(session_err)?;

        // Both streams share one channel window: drain them together or a
        // chatty stderr stalls stdout.
        sess.set_blocking(false);
        let mut stdout = Vec::new();
        let mut stderr = Vec::new();
        let mut buf = [0u8; READ_CHUNK];
        loop {
            let out = read_some(&mut channel, &mut buf, &mut stdout)?;
            let err = read_some(&mut channel.stderr(), &mut buf, &mut stderr)?;
            if out || err {
                continue;
            }
            if channel.eof() {
                break;
            }
            std::thread::sleep(IDLE_POLL);
        }
        sess.set_blocking(true);

        channel.wait_close().map_err(session_err)?;
        let exit_code = channel.exit_status().map_err(session_err)?;

        Ok(ExecOutput::from_raw(&stdout, &stderr, exit_code))
    }
}

const READ_CHUNK: usize = 16 * 1024;
const IDLE_POLL: Duration = Duration::from_millis(10);

/// One non-blocking read into `sink`. `true` if any bytes arrived.
fn read_some(
    stream: &mut impl Read,
    buf: &mut [u8],
    sink: &mut Vec<u8>,
) -> Result<bool, TransportError> {
    match stream.read(buf) {
        Ok(0) => Ok(false),
        Ok(n) => {
            sink.extend_from_slice(&buf[..n]);
            Ok(true)
        }
        Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => Ok(false),
        Err(source) => Err(TransportError::Io {
            context: "read ssh channel",
            source,
        }),
    }
}

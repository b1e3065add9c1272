//! Credential lookup for remote hosts.
//!
//! # Contract
//! - A Host names a secret (`spec.sshkeysecret`); the private key is the
//!   secret's [`SSH_PRIVATE_KEY_FIELD`] field, looked up in the Host's
//!   namespace.
//! - Resolution happens through [`CredentialResolver`]; the engine never
//!   touches the filesystem or environment for secrets directly.
//! - `Debug` on [`PrivateKey`] is redacted. Errors name the secret and
//!   field, never the material.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

/// Field of a Host's key secret that holds the PEM-encoded private key.
pub const SSH_PRIVATE_KEY_FIELD: &str = "ssh-privatekey";

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub enum CredentialError {
    /// The secret, or the field within it, does not exist.
    NotFound {
        namespace: String,
        secret: String,
        field: String,
    },
    /// The field exists but is not a usable private key.
    Malformed { secret: String, reason: String },
    Io { secret: String, source: std::io::Error },
}

impl CredentialError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, CredentialError::NotFound { .. })
    }
}

impl fmt::Display for CredentialError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CredentialError::NotFound {
                namespace,
                secret,
                field,
            } => write!(f, "secret {namespace}/{secret} has no field '{field}'"),
            CredentialError::Malformed { secret, reason } => {
                write!(f, "secret {secret} is malformed: {reason}")
            }
            CredentialError::Io { secret, source } => {
                write!(f, "reading secret {secret} failed: {source}")
            }
        }
    }
}

impl std::error::Error for CredentialError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CredentialError::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// PrivateKey
// ---------------------------------------------------------------------------

/// PEM-encoded SSH private key. Contents are never printed.
#[derive(Clone, PartialEq, Eq)]
pub struct PrivateKey {
    pem: String,
}

impl PrivateKey {
    /// Accepts PEM-framed keys (`-----BEGIN ... PRIVATE KEY-----`), including
    /// the OpenSSH format. Surrounding whitespace is trimmed; a trailing
    /// newline is restored since OpenSSH refuses keys without one.
    pub fn from_pem_bytes(secret: &str, bytes: &[u8]) -> Result<Self, CredentialError> {
        let text = std::str::from_utf8(bytes).map_err(|_| CredentialError::Malformed {
            secret: secret.to_string(),
            reason: "not valid UTF-8".to_string(),
        })?;
        let trimmed = text.trim();
        let first = trimmed.lines().next().unwrap_or_default();
        if !(first.starts_with("-----BEGIN") && first.ends_with("PRIVATE KEY-----")) {
            return Err(CredentialError::Malformed {
                secret: secret.to_string(),
                reason: "expected a PEM private key".to_string(),
            });
        }
        Ok(Self {
            pem: format!("{trimmed}\n"),
        })
    }

    pub fn pem(&self) -> &str {
        &self.pem
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrivateKey").field("pem", &"<REDACTED>").finish()
    }
}

// ---------------------------------------------------------------------------
// Resolvers
// ---------------------------------------------------------------------------

/// Source of named secrets.
pub trait CredentialResolver: Send + Sync {
    /// Raw bytes of `field` in secret `secret` of `namespace`.
    fn resolve(&self, namespace: &str, secret: &str, field: &str)
        -> Result<Vec<u8>, CredentialError>;

    /// The SSH private key held by `secret`.
    fn ssh_private_key(&self, namespace: &str, secret: &str) -> Result<PrivateKey, CredentialError> {
        let raw = self.resolve(namespace, secret, SSH_PRIVATE_KEY_FIELD)?;
        PrivateKey::from_pem_bytes(secret, &raw)
    }
}

/// Secrets laid out on disk as `<root>/<namespace>/<secret>/<field>`.
#[derive(Debug, Clone)]
pub struct DirCredentialResolver {
    root: PathBuf,
}

impl DirCredentialResolver {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, namespace: &str, secret: &str, field: &str) -> Option<PathBuf> {
        // Names are single path segments; anything else cannot exist.
        let ok = |s: &str| !s.is_empty() && s != "." && s != ".." && !s.contains(['/', '\\']);
        if ok(namespace) && ok(secret) && ok(field) {
            Some(self.root.join(namespace).join(secret).join(field))
        } else {
            None
        }
    }
}

impl CredentialResolver for DirCredentialResolver {
    fn resolve(
        &self,
        namespace: &str,
        secret: &str,
        field: &str,
    ) -> Result<Vec<u8>, CredentialError> {
        let not_found = || CredentialError::NotFound {
            namespace: namespace.to_string(),
            secret: secret.to_string(),
            field: field.to_string(),
        };
        let path = self.path_for(namespace, secret, field).ok_or_else(not_found)?;
        match std::fs::read(&path) {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(not_found()),
            Err(source) => Err(CredentialError::Io {
                secret: format!("{namespace}/{secret}"),
                source,
            }),
        }
    }
}

/// In-memory secrets keyed by `(namespace, secret, field)`.
#[derive(Clone, Default)]
pub struct StaticCredentialResolver {
    entries: HashMap<(String, String, String), Vec<u8>>,
}

impl StaticCredentialResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(
        mut self,
        namespace: &str,
        secret: &str,
        field: &str,
        value: impl Into<Vec<u8>>,
    ) -> Self {
        self.insert(namespace, secret, field, value);
        self
    }

    pub fn insert(&mut self, namespace: &str, secret: &str, field: &str, value: impl Into<Vec<u8>>) {
        self.entries.insert(
            (namespace.to_string(), secret.to_string(), field.to_string()),
            value.into(),
        );
    }
}

impl fmt::Debug for StaticCredentialResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StaticCredentialResolver")
            .field("entries", &self.entries.len())
            .finish()
    }
}

impl CredentialResolver for StaticCredentialResolver {
    fn resolve(
        &self,
        namespace: &str,
        secret: &str,
        field: &str,
    ) -> Result<Vec<u8>, CredentialError> {
        self.entries
            .get(&(namespace.to_string(), secret.to_string(), field.to_string()))
            .cloned()
            .ok_or_else(|| CredentialError::NotFound {
                namespace: namespace.to_string(),
                secret: secret.to_string(),
                field: field.to_string(),
            })
    }
}

use crate::{Kind, Phase, Requires, ResourceKey, DEFAULT_NAMESPACE};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ---------------------------------------------------------------------------
// Metadata + generic envelope
// ---------------------------------------------------------------------------

fn default_namespace() -> String {
    DEFAULT_NAMESPACE.to_string()
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectMeta {
    pub name: String,
    #[serde(default = "default_namespace")]
    pub namespace: String,
    /// Assigned by the store on every write; `0` means "never stored".
    #[serde(default, rename = "resourceVersion")]
    pub resource_version: u64,
}

impl ObjectMeta {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
            resource_version: 0,
        }
    }
}

/// A resource of one kind: metadata, immutable spec, engine-owned status.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource<S, St> {
    pub metadata: ObjectMeta,
    pub spec: S,
    #[serde(default)]
    pub status: St,
}

impl<S, St: Default> Resource<S, St> {
    /// New resource with an empty status, as created by a user.
    pub fn new(namespace: impl Into<String>, name: impl Into<String>, spec: S) -> Self {
        Self {
            metadata: ObjectMeta::new(namespace, name),
            spec,
            status: St::default(),
        }
    }
}

impl<S, St> Resource<S, St> {
    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    pub fn namespace(&self) -> &str {
        &self.metadata.namespace
    }

    pub fn key_for(&self, kind: Kind) -> ResourceKey {
        ResourceKey::new(&self.metadata.namespace, &self.metadata.name, kind)
    }
}

// ---------------------------------------------------------------------------
// Host
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostSpec {
    /// Name of the secret holding the SSH private key (field `ssh-privatekey`).
    #[serde(rename = "sshkeysecret")]
    pub ssh_key_secret: String,
    #[serde(rename = "ipaddress")]
    pub ip_address: String,
    #[serde(default = "default_ssh_port")]
    pub port: u16,
    /// Remote login; the controller-wide default applies when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
}

fn default_ssh_port() -> u16 {
    22
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostStatus {
    #[serde(default)]
    pub ready: bool,
    #[serde(default)]
    pub facts: BTreeMap<String, String>,
    #[serde(default)]
    pub status_string: Phase,
}

pub type Host = Resource<HostSpec, HostStatus>;

// ---------------------------------------------------------------------------
// Command
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandSpec {
    pub host: String,
    pub command: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requires: Option<Requires>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandStatus {
    #[serde(default)]
    pub done: bool,
    #[serde(default)]
    pub status_string: Phase,
    #[serde(default)]
    pub stdout: String,
    #[serde(default)]
    pub stderr: String,
    #[serde(default, rename = "exitcode")]
    pub exit_code: i32,
}

pub type Command = Resource<CommandSpec, CommandStatus>;

// ---------------------------------------------------------------------------
// FileContent
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileContentSpec {
    pub host: String,
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requires: Option<Requires>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileContentStatus {
    #[serde(default)]
    pub done: bool,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub status_string: Phase,
    #[serde(default, rename = "exitcode", skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub stderr: String,
    /// Why a read that exited 0 was still not accepted as content.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

pub type FileContent = Resource<FileContentSpec, FileContentStatus>;

// ---------------------------------------------------------------------------
// File
// ---------------------------------------------------------------------------

/// `{ name, key }` reference into a ConfigMap or Secret.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyRef {
    pub name: String,
    pub key: String,
}

/// Where a `File` takes its content from when `spec.content` is absent.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileSource {
    #[serde(default, rename = "filecontent", skip_serializing_if = "Option::is_none")]
    pub file_content: Option<crate::NameRef>,
    #[serde(default, rename = "configmap", skip_serializing_if = "Option::is_none")]
    pub config_map: Option<KeyRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret: Option<KeyRef>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileSpec {
    pub host: String,
    pub path: String,
    /// Literal content. `Some("")` is a valid empty file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<FileSource>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requires: Option<Requires>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileStatus {
    #[serde(default)]
    pub done: bool,
    #[serde(default)]
    pub status_string: Phase,
    #[serde(default, rename = "exitcode", skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub stderr: String,
    /// Human-readable reason for a terminal failure that did not come from
    /// the remote command (e.g. an unsupported content source).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

pub type File = Resource<FileSpec, FileStatus>;

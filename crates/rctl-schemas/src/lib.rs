//! rctl-schemas
//!
//! Resource data model for the provisioning controller.
//!
//! Four resource kinds exist: `Host`, `Command`, `File` and `FileContent`.
//! Every resource is identified by `(namespace, name, kind)` and carries an
//! immutable `spec` (desired state) and a mutable `status` owned exclusively
//! by the reconciliation engine.
//!
//! Field names on the wire (`sshkeysecret`, `status_string`, `exitcode`, ...)
//! are stable: they are what existing manifests and persisted snapshots use.
//!
//! Pure data. No IO beyond `serde` parsing of manifest text.

mod key;
mod object;
mod phase;
mod requires;
mod resources;

pub use key::{Kind, ResourceKey, UnknownKind, DEFAULT_NAMESPACE};
pub use object::{parse_manifest_json, parse_manifest_yaml, KindResource, Object};
pub use phase::Phase;
pub use requires::{InvalidRequire, NameRef, Require, Requires};
pub use resources::*;

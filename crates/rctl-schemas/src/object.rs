//! Kind-tagged manifest objects and typed access to them.

use crate::{
    Command, File, FileContent, Host, Kind, ObjectMeta, Phase, Requires, ResourceKey,
};
use serde::{Deserialize, Serialize};

/// Any stored resource, tagged by `kind` on the wire:
///
/// ```yaml
/// kind: Command
/// metadata: { name: install-nginx, namespace: web }
/// spec: { host: web-1, command: "apt-get install -y nginx" }
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum Object {
    Host(Host),
    Command(Command),
    File(File),
    FileContent(FileContent),
}

impl Object {
    pub fn kind(&self) -> Kind {
        match self {
            Object::Host(_) => Kind::Host,
            Object::Command(_) => Kind::Command,
            Object::File(_) => Kind::File,
            Object::FileContent(_) => Kind::FileContent,
        }
    }

    pub fn meta(&self) -> &ObjectMeta {
        match self {
            Object::Host(r) => &r.metadata,
            Object::Command(r) => &r.metadata,
            Object::File(r) => &r.metadata,
            Object::FileContent(r) => &r.metadata,
        }
    }

    pub fn meta_mut(&mut self) -> &mut ObjectMeta {
        match self {
            Object::Host(r) => &mut r.metadata,
            Object::Command(r) => &mut r.metadata,
            Object::File(r) => &mut r.metadata,
            Object::FileContent(r) => &mut r.metadata,
        }
    }

    pub fn key(&self) -> ResourceKey {
        let m = self.meta();
        ResourceKey::new(&m.namespace, &m.name, self.kind())
    }

    /// Current phase. Hosts report theirs like every other kind.
    pub fn phase(&self) -> Phase {
        match self {
            Object::Host(r) => r.status.status_string,
            Object::Command(r) => r.status.status_string,
            Object::File(r) => r.status.status_string,
            Object::FileContent(r) => r.status.status_string,
        }
    }

    /// Terminal-success marker. For a Host this is `status.ready`.
    pub fn is_done(&self) -> bool {
        match self {
            Object::Host(r) => r.status.ready,
            Object::Command(r) => r.status.done,
            Object::File(r) => r.status.done,
            Object::FileContent(r) => r.status.done,
        }
    }

    /// Done, or failed with a business outcome. Nothing more will happen.
    pub fn is_settled(&self) -> bool {
        self.is_done() || self.phase() == Phase::Failed
    }

    /// Dependency list; always `None` for hosts.
    pub fn requires(&self) -> Option<&Requires> {
        match self {
            Object::Host(_) => None,
            Object::Command(r) => r.spec.requires.as_ref(),
            Object::File(r) => r.spec.requires.as_ref(),
            Object::FileContent(r) => r.spec.requires.as_ref(),
        }
    }

    /// Name of the Host this resource acts on; `None` for hosts themselves.
    pub fn host_name(&self) -> Option<&str> {
        match self {
            Object::Host(_) => None,
            Object::Command(r) => Some(&r.spec.host),
            Object::File(r) => Some(&r.spec.host),
            Object::FileContent(r) => Some(&r.spec.host),
        }
    }

    /// Reset status and version to what a freshly submitted object carries.
    /// Status belongs to the controller; clients cannot seed it.
    pub fn clear_status(&mut self) {
        match self {
            Object::Host(r) => r.status = Default::default(),
            Object::Command(r) => r.status = Default::default(),
            Object::File(r) => r.status = Default::default(),
            Object::FileContent(r) => r.status = Default::default(),
        }
        self.meta_mut().resource_version = 0;
    }

    /// Whether both objects declare the same desired state.
    pub fn same_spec(&self, other: &Object) -> bool {
        match (self, other) {
            (Object::Host(a), Object::Host(b)) => a.spec == b.spec,
            (Object::Command(a), Object::Command(b)) => a.spec == b.spec,
            (Object::File(a), Object::File(b)) => a.spec == b.spec,
            (Object::FileContent(a), Object::FileContent(b)) => a.spec == b.spec,
            _ => false,
        }
    }
}

// ---------------------------------------------------------------------------
// Typed access
// ---------------------------------------------------------------------------

/// Implemented by each concrete resource type so generic code can move
/// between `Object` and the typed resource.
pub trait KindResource: Clone + Send + Sync + Sized + 'static {
    const KIND: Kind;

    fn from_object(obj: Object) -> Option<Self>;
    fn into_object(self) -> Object;
    fn meta(&self) -> &ObjectMeta;

    fn key(&self) -> ResourceKey {
        let m = self.meta();
        ResourceKey::new(&m.namespace, &m.name, Self::KIND)
    }
}

macro_rules! kind_resource {
    ($ty:ident) => {
        impl KindResource for $ty {
            const KIND: Kind = Kind::$ty;

            fn from_object(obj: Object) -> Option<Self> {
                match obj {
                    Object::$ty(r) => Some(r),
                    _ => None,
                }
            }

            fn into_object(self) -> Object {
                Object::$ty(self)
            }

            fn meta(&self) -> &ObjectMeta {
                &self.metadata
            }
        }
    };
}

kind_resource!(Host);
kind_resource!(Command);
kind_resource!(File);
kind_resource!(FileContent);

// ---------------------------------------------------------------------------
// Manifest parsing
// ---------------------------------------------------------------------------

/// Parse a (possibly multi-document) YAML manifest.
///
/// Each document may be a single object or a list of objects. Empty
/// documents are skipped.
pub fn parse_manifest_yaml(text: &str) -> Result<Vec<Object>, serde_yaml::Error> {
    let mut out = Vec::new();
    for doc in serde_yaml::Deserializer::from_str(text) {
        let value = serde_yaml::Value::deserialize(doc)?;
        match value {
            serde_yaml::Value::Null => {}
            serde_yaml::Value::Sequence(items) => {
                for item in items {
                    out.push(serde_yaml::from_value(item)?);
                }
            }
            other => out.push(serde_yaml::from_value(other)?),
        }
    }
    Ok(out)
}

/// Parse a JSON manifest: one object or an array of objects.
pub fn parse_manifest_json(text: &str) -> Result<Vec<Object>, serde_json::Error> {
    let value: serde_json::Value = serde_json::from_str(text)?;
    match value {
        serde_json::Value::Array(items) => items
            .into_iter()
            .map(serde_json::from_value)
            .collect(),
        other => Ok(vec![serde_json::from_value(other)?]),
    }
}

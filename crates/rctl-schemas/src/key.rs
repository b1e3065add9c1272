use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Namespace assigned to objects whose metadata omits one.
pub const DEFAULT_NAMESPACE: &str = "default";

/// The four resource kinds the controller reconciles.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Kind {
    Host,
    Command,
    File,
    FileContent,
}

impl Kind {
    pub const ALL: [Kind; 4] = [Kind::Host, Kind::Command, Kind::File, Kind::FileContent];

    pub fn as_str(&self) -> &'static str {
        match self {
            Kind::Host => "Host",
            Kind::Command => "Command",
            Kind::File => "File",
            Kind::FileContent => "FileContent",
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a string does not name one of the four kinds.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UnknownKind(pub String);

impl fmt::Display for UnknownKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "unknown resource kind '{}'; expected one of: Host | Command | File | FileContent",
            self.0
        )
    }
}

impl std::error::Error for UnknownKind {}

impl FromStr for Kind {
    type Err = UnknownKind;

    /// Case-insensitive; accepts the plural-free lowercase forms used in URLs
    /// (`host`, `command`, `file`, `filecontent`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "host" => Ok(Kind::Host),
            "command" => Ok(Kind::Command),
            "file" => Ok(Kind::File),
            "filecontent" => Ok(Kind::FileContent),
            _ => Err(UnknownKind(s.to_string())),
        }
    }
}

/// Identity of one resource: `(namespace, name, kind)`.
///
/// Ordering is `(namespace, kind, name)` so listings group naturally.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceKey {
    pub namespace: String,
    pub name: String,
    pub kind: Kind,
}

impl ResourceKey {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>, kind: Kind) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
            kind,
        }
    }
}

impl PartialOrd for ResourceKey {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ResourceKey {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        (&self.namespace, self.kind, &self.name).cmp(&(&other.namespace, other.kind, &other.name))
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.kind, self.namespace, self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_parses_url_forms() {
        assert_eq!("filecontent".parse::<Kind>().unwrap(), Kind::FileContent);
        assert_eq!("Command".parse::<Kind>().unwrap(), Kind::Command);
        assert!("configmap".parse::<Kind>().is_err());
    }

    #[test]
    fn keys_sort_by_namespace_then_kind() {
        let mut keys = vec![
            ResourceKey::new("b", "a", Kind::Host),
            ResourceKey::new("a", "z", Kind::Command),
            ResourceKey::new("a", "y", Kind::Host),
        ];
        keys.sort();
        assert_eq!(keys[0].name, "y");
        assert_eq!(keys[1].name, "z");
        assert_eq!(keys[2].namespace, "b");
    }
}

//! Dependency references (`requires`).
//!
//! On the wire a reference is `{command: {name}}`, `{file: {name}}` or
//! `{filecontent: {name}}`. Exactly one key must be present; anything else
//! is rejected while parsing so the engine only ever sees well-formed
//! references. `Host` can never be a dependency.

use crate::Kind;
use serde::{Deserialize, Serialize};
use std::fmt;

/// `{ name: ... }` reference to another object in the same namespace.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NameRef {
    pub name: String,
}

impl NameRef {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// One dependency of a resource.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RequireWire", into = "RequireWire")]
pub enum Require {
    Command(String),
    File(String),
    FileContent(String),
}

/// Ordered list of dependencies. Order carries no meaning.
pub type Requires = Vec<Require>;

impl Require {
    pub fn command(name: impl Into<String>) -> Self {
        Require::Command(name.into())
    }

    pub fn file(name: impl Into<String>) -> Self {
        Require::File(name.into())
    }

    pub fn file_content(name: impl Into<String>) -> Self {
        Require::FileContent(name.into())
    }

    pub fn kind(&self) -> Kind {
        match self {
            Require::Command(_) => Kind::Command,
            Require::File(_) => Kind::File,
            Require::FileContent(_) => Kind::FileContent,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Require::Command(n) | Require::File(n) | Require::FileContent(n) => n,
        }
    }

    /// Whether this reference points at `(kind, name)`.
    pub fn targets(&self, kind: Kind, name: &str) -> bool {
        self.kind() == kind && self.name() == name
    }
}

impl fmt::Display for Require {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.kind(), self.name())
    }
}

// ---------------------------------------------------------------------------
// Wire shape
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
struct RequireWire {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    command: Option<NameRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    file: Option<NameRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    filecontent: Option<NameRef>,
}

/// A `requires` entry that does not name exactly one dependency.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InvalidRequire {
    Empty,
    Ambiguous { kinds: Vec<Kind> },
    BlankName { kind: Kind },
}

impl fmt::Display for InvalidRequire {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InvalidRequire::Empty => write!(
                f,
                "requires entry names no dependency; expected one of command | file | filecontent"
            ),
            InvalidRequire::Ambiguous { kinds } => {
                let names: Vec<&str> = kinds.iter().map(Kind::as_str).collect();
                write!(
                    f,
                    "requires entry names {} dependencies ({}); exactly one is allowed",
                    kinds.len(),
                    names.join(", ")
                )
            }
            InvalidRequire::BlankName { kind } => {
                write!(f, "requires entry for {kind} has a blank name")
            }
        }
    }
}

impl std::error::Error for InvalidRequire {}

impl TryFrom<RequireWire> for Require {
    type Error = InvalidRequire;

    fn try_from(w: RequireWire) -> Result<Self, Self::Error> {
        let mut found: Vec<Require> = Vec::new();
        if let Some(r) = w.command {
            found.push(Require::Command(r.name));
        }
        if let Some(r) = w.file {
            found.push(Require::File(r.name));
        }
        if let Some(r) = w.filecontent {
            found.push(Require::FileContent(r.name));
        }

        match found.len() {
            0 => Err(InvalidRequire::Empty),
            1 => {
                let r = found.remove(0);
                if r.name().trim().is_empty() {
                    Err(InvalidRequire::BlankName { kind: r.kind() })
                } else {
                    Ok(r)
                }
            }
            _ => Err(InvalidRequire::Ambiguous {
                kinds: found.iter().map(Require::kind).collect(),
            }),
        }
    }
}

impl From<Require> for RequireWire {
    fn from(r: Require) -> Self {
        match r {
            Require::Command(name) => RequireWire {
                command: Some(NameRef { name }),
                ..Default::default()
            },
            Require::File(name) => RequireWire {
                file: Some(NameRef { name }),
                ..Default::default()
            },
            Require::FileContent(name) => RequireWire {
                filecontent: Some(NameRef { name }),
                ..Default::default()
            },
        }
    }
}

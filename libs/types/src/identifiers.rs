//! # Node-Scoped Identifiers
//!
//! Atoms, process identities and references. Every identifier that can cross a
//! node boundary carries the name of the node that minted it, so a receiver can
//! route a reply without any registry lookup.
//!
//! ```rust
//! use types::{Atom, Pid};
//!
//! let node = Atom::from("gonode@localhost");
//! let pid = Pid::new(node.clone(), 1, 0, 1);
//! assert_eq!(pid.node(), &node);
//! assert_eq!(pid.to_string(), "<gonode@localhost.1.0>");
//! ```

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;

/// Symbolic constant, compared by value
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Atom(String);

impl Atom {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Atom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let plain = self
            .0
            .chars()
            .next()
            .map_or(false, |c| c.is_ascii_lowercase())
            && self
                .0
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '@');

        if plain {
            f.write_str(&self.0)
        } else {
            write!(f, "'{}'", self.0.replace('\'', "\\'"))
        }
    }
}

impl From<&str> for Atom {
    fn from(name: &str) -> Self {
        Self(name.to_string())
    }
}

impl From<String> for Atom {
    fn from(name: String) -> Self {
        Self(name)
    }
}

impl Borrow<str> for Atom {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl PartialEq<str> for Atom {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for Atom {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

/// Network-unique handle to a single mailbox
///
/// Allocated by the owning node at spawn time. `creation` distinguishes
/// incarnations of a node that reuse the same name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Pid {
    node: Atom,
    id: u32,
    serial: u32,
    creation: u32,
}

impl Pid {
    pub fn new(node: Atom, id: u32, serial: u32, creation: u32) -> Self {
        Self {
            node,
            id,
            serial,
            creation,
        }
    }

    /// Node that owns the mailbox
    pub fn node(&self) -> &Atom {
        &self.node
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn serial(&self) -> u32 {
        self.serial
    }

    pub fn creation(&self) -> u32 {
        self.creation
    }
}

impl fmt::Display for Pid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}.{}.{}>", self.node.as_str(), self.id, self.serial)
    }
}

/// Unique correlation token minted by a node
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Reference {
    node: Atom,
    creation: u32,
    id: [u32; 3],
}

impl Reference {
    pub fn new(node: Atom, creation: u32, id: [u32; 3]) -> Self {
        Self { node, creation, id }
    }

    pub fn node(&self) -> &Atom {
        &self.node
    }

    pub fn creation(&self) -> u32 {
        self.creation
    }

    pub fn id(&self) -> [u32; 3] {
        self.id
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "#Ref<{}.{}.{}.{}>",
            self.node.as_str(),
            self.id[0],
            self.id[1],
            self.id[2]
        )
    }
}

//! Node Wire Protocol
//!
//! Frames exchanged between published nodes. A connection starts with a
//! `Hello`/`Welcome` handshake and afterwards carries only `Send` frames.
//!
//! Each frame is a bincode body behind a 4-byte big-endian length prefix.

pub mod envelope;

pub use envelope::{decode_frame, encode_frame, WireFormat};

use serde::{Deserialize, Serialize};
use std::fmt;
use types::{Atom, Pid, Term};

/// Where a `Send` frame is addressed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Destination {
    /// A specific mailbox, local or remote
    Pid(Pid),
    /// A name registered on the receiving node
    Name(Atom),
    /// A name registered on a named node
    Remote { name: Atom, node: Atom },
}

impl Destination {
    pub fn remote(name: impl Into<Atom>, node: impl Into<Atom>) -> Self {
        Destination::Remote {
            name: name.into(),
            node: node.into(),
        }
    }

    /// Node that must receive the message, when the address names one
    pub fn node(&self) -> Option<&Atom> {
        match self {
            Destination::Pid(pid) => Some(pid.node()),
            Destination::Name(_) => None,
            Destination::Remote { node, .. } => Some(node),
        }
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Destination::Pid(pid) => write!(f, "{}", pid),
            Destination::Name(name) => write!(f, "{}", name),
            Destination::Remote { name, node } => write!(f, "{{{},{}}}", name, node),
        }
    }
}

impl From<Pid> for Destination {
    fn from(pid: Pid) -> Self {
        Destination::Pid(pid)
    }
}

impl From<&Pid> for Destination {
    fn from(pid: &Pid) -> Self {
        Destination::Pid(pid.clone())
    }
}

impl From<Atom> for Destination {
    fn from(name: Atom) -> Self {
        Destination::Name(name)
    }
}

impl From<&str> for Destination {
    fn from(name: &str) -> Self {
        Destination::Name(Atom::from(name))
    }
}

/// A single message on a node-to-node connection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Frame {
    /// Dialer greeting
    Hello { node: Atom, cookie: String },
    /// Acceptor accepted the greeting
    Welcome { node: Atom },
    /// Acceptor refused the greeting; the connection is closed afterwards
    Rejected { reason: String },
    /// Deliver a term to a mailbox on the receiving node
    Send { to: Destination, message: Term },
}

impl Frame {
    pub fn kind(&self) -> &'static str {
        match self {
            Frame::Hello { .. } => "hello",
            Frame::Welcome { .. } => "welcome",
            Frame::Rejected { .. } => "rejected",
            Frame::Send { .. } => "send",
        }
    }
}

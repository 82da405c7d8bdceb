//! Node Error Types

use network::TransportError;
use thiserror::Error;
use types::{Atom, Pid};

/// Errors raised by the node handle and the process runtime
#[derive(Error, Debug)]
pub enum NodeError {
    /// Framing, handshake or socket failure
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Registered names are unique per node
    #[error("Name '{name}' is already registered to {pid}")]
    NameTaken { name: Atom, pid: Pid },

    /// Destination does not resolve to a live mailbox
    #[error("No process for {destination}")]
    NoProcess { destination: String },

    /// Remote destination on a node with no established link
    #[error("Node {node} is not connected")]
    NotConnected { node: Atom },

    /// RPC names are unique per node
    #[error("RPC {module}:{function} is already provided")]
    RpcAlreadyProvided { module: Atom, function: Atom },

    /// A node listens on at most one port
    #[error("Node {node} is already published on port {port}")]
    AlreadyPublished { node: Atom, port: u16 },

    /// No reply arrived for a request in time
    #[error("Call to {destination} timed out after {timeout_ms}ms")]
    CallTimeout {
        destination: String,
        timeout_ms: u64,
    },
}

/// Result type alias for node operations
pub type Result<T> = std::result::Result<T, NodeError>;

impl NodeError {
    pub fn no_process(destination: impl ToString) -> Self {
        Self::NoProcess {
            destination: destination.to_string(),
        }
    }

    /// Get error category for log fields
    pub fn category(&self) -> &'static str {
        match self {
            NodeError::Transport(e) => e.category(),
            NodeError::NameTaken { .. } => "name_taken",
            NodeError::NoProcess { .. } => "no_process",
            NodeError::NotConnected { .. } => "not_connected",
            NodeError::RpcAlreadyProvided { .. } => "rpc_already_provided",
            NodeError::AlreadyPublished { .. } => "already_published",
            NodeError::CallTimeout { .. } => "call_timeout",
        }
    }
}

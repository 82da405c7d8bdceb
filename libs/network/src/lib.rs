//! Network Infrastructure
//!
//! Wire protocol and TCP transport used by published nodes to exchange terms.
//! Routing decisions (which mailbox, which peer) belong to the node handle in
//! `messaging-actors`; this crate only moves frames.

pub mod error;
pub mod protocol;
pub mod transports;

// Re-export commonly used types
pub use error::{Result, TransportError};
pub use protocol::{Destination, Frame, WireFormat};
pub use transports::{bind_listener, FrameReader, FrameWriter, TcpConnection};

// Constants for configuration
pub const DEFAULT_CONNECTION_TIMEOUT_SECS: u64 = 5;
pub const DEFAULT_HANDSHAKE_TIMEOUT_SECS: u64 = 5;

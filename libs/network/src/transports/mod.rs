//! Node Transports
//!
//! Node-to-node connections are TCP only; the framing lives in [`tcp`].

pub mod tcp;

pub use tcp::{bind_listener, FrameReader, FrameWriter, TcpConnection};

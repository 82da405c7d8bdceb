//! gonode
//!
//! A node that joins the network under a configured name, runs one gen-server
//! process and stays up until that process is told to stop.
//!
//! ```text
//! main ─► NodeConfig ─► NodeDriver::run
//!                         ├─ Node::publish(epmd_port)     fatal on failure
//!                         ├─ completion_signal()
//!                         ├─ spawn(GoServer, signal)      registers go_srv
//!                         ├─ provide_rpc(go_rpc, call)    only with --rpc
//!                         └─ wait for stop ─► "node finished"
//! ```

pub mod config;
pub mod driver;
pub mod logging;
pub mod pidfile;
pub mod rpc;
pub mod server;

pub use config::{Args, NodeConfig};
pub use driver::NodeDriver;
pub use rpc::{gonode_reply, RPC_FUNCTION, RPC_MODULE};
pub use server::{go_reply, GoServer, ServerCommand};

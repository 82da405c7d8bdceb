//! Node Runtime
//!
//! Mailbox processes, registered names, peer links and RPC for a node that
//! speaks the gen-server conventions.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────┐        ┌──────────────────────┐
//! │            Node              │        │      Peer node       │
//! │                              │        │                      │
//! │  ProcessRegistry             │  TCP   │                      │
//! │   pid  → mailbox             │◄──────►│  Hello / Welcome     │
//! │   name → pid                 │ frames │  Send{to, term}      │
//! │                              │        │                      │
//! │  GenServer processes         │        └──────────────────────┘
//! │   init → cast/call/info →    │
//! │   terminate                  │
//! │                              │
//! │  rex (RpcTable)              │
//! └──────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use messaging_actors::{CallFrom, GenServer, Node, ProcessContext, Result, Term};
//! use std::time::Duration;
//!
//! struct Echo;
//!
//! #[async_trait::async_trait]
//! impl GenServer for Echo {
//!     type Args = ();
//!
//!     async fn init(&mut self, ctx: &ProcessContext, _args: ()) -> Result<()> {
//!         ctx.node().register("echo", ctx.self_pid())
//!     }
//!
//!     async fn handle_call(&mut self, _ctx: &ProcessContext, message: Term, _from: &CallFrom) -> Term {
//!         message
//!     }
//! }
//!
//! # async fn run() -> Result<()> {
//! let node = Node::new("demo@localhost", "cookie");
//! node.publish(0).await?;
//! node.spawn(Echo, ()).await?;
//! let reply = node.call("echo", Term::atom("hello"), Duration::from_secs(1)).await?;
//! assert_eq!(reply, Term::atom("hello"));
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod messages;
pub mod node;
pub mod registry;
pub mod rpc;
pub mod signal;
pub mod system;
mod transport;

pub use error::{NodeError, Result};
pub use messages::{CallFrom, MailboxEvent};
pub use node::{Mailbox, Node, DEFAULT_CALL_TIMEOUT};
pub use registry::ProcessRegistry;
pub use rpc::{RexServer, RpcClosure, RpcTable, REX};
pub use signal::{completion_signal, CompletionSignal, CompletionWaiter};
pub use system::{ExitReason, GenServer, NodeMetrics, NodeStats, ProcessContext};

pub use network::Destination;
pub use types::{Atom, Pid, Reference, Term};

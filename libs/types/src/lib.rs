//! # Gonode Term Types
//!
//! Structured values exchanged between peers of the node network.
//!
//! ## Design Philosophy
//!
//! - **Closed Sum Type**: every payload is a [`Term`] variant, matched exhaustively
//! - **Node-Scoped Identity**: [`Pid`] and [`Reference`] carry the minting node
//! - **Serde Everywhere**: all types serialize, the wire layer picks the codec
//!
//! ## Quick Start
//!
//! ```rust
//! use types::Term;
//!
//! let reply = Term::tuple(vec![Term::atom("ok"), Term::atom("go_reply"), Term::Integer(1)]);
//! assert_eq!(reply.to_string(), "{ok,go_reply,1}");
//! ```

pub mod identifiers;
pub mod term;

pub use identifiers::{Atom, Pid, Reference};
pub use term::{Term, MAX_TERM_DEPTH, TERM_TOO_DEEP};

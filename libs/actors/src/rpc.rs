//! Remote Procedure Calls
//!
//! Closures registered under `module:function` and the `rex` server that
//! answers RPC requests from other nodes. Requests use the standard shapes:
//!
//! - `{call, Module, Function, Args, GroupLeader}` as a call, answered with
//!   the closure's result
//! - `{cast, Module, Function, Args, GroupLeader}` as a cast, result dropped
//!
//! An unknown function is answered with
//! `{badrpc, {'EXIT', {undef, [{Module, Function, Args, []}]}}}` and a request
//! that does not have the shape above with `{badrpc, badarg}`.

use crate::messages::CallFrom;
use crate::system::{GenServer, ProcessContext};
use crate::{NodeError, Result};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};
use types::{Atom, Term};

/// Registered name of the RPC server
pub const REX: &str = "rex";

/// Function reachable over RPC
pub type RpcClosure = Arc<dyn Fn(&[Term]) -> Term + Send + Sync>;

/// Closures by `(module, function)`
#[derive(Default)]
pub struct RpcTable {
    closures: RwLock<HashMap<(Atom, Atom), RpcClosure>>,
}

impl RpcTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, module: Atom, function: Atom, closure: RpcClosure) -> Result<()> {
        let mut closures = self.closures.write();
        let key = (module, function);
        if closures.contains_key(&key) {
            let (module, function) = key;
            return Err(NodeError::RpcAlreadyProvided { module, function });
        }
        info!(module = %key.0, function = %key.1, "RPC provided");
        closures.insert(key, closure);
        Ok(())
    }

    pub fn get(&self, module: &str, function: &str) -> Option<RpcClosure> {
        self.closures
            .read()
            .get(&(Atom::from(module), Atom::from(function)))
            .cloned()
    }

    pub fn remove(&self, module: &str, function: &str) -> bool {
        self.closures
            .write()
            .remove(&(Atom::from(module), Atom::from(function)))
            .is_some()
    }

    pub fn len(&self) -> usize {
        self.closures.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.closures.read().is_empty()
    }
}

impl std::fmt::Debug for RpcTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<String> = self
            .closures
            .read()
            .keys()
            .map(|(module, function)| format!("{}:{}", module, function))
            .collect();
        names.sort();
        f.debug_struct("RpcTable").field("closures", &names).finish()
    }
}

/// Decoded RPC request
#[derive(Debug, Clone, PartialEq)]
enum RpcRequest {
    Invoke {
        module: Atom,
        function: Atom,
        args: Vec<Term>,
    },
    Malformed(Term),
}

impl RpcRequest {
    fn parse(term: Term, kind: &str) -> Self {
        match term.as_tuple() {
            Some([tag, Term::Atom(module), Term::Atom(function), Term::List(args), _]) if tag.is_atom(kind) => {
                RpcRequest::Invoke {
                    module: module.clone(),
                    function: function.clone(),
                    args: args.clone(),
                }
            }
            _ => RpcRequest::Malformed(term),
        }
    }
}

fn badrpc(reason: Term) -> Term {
    Term::tuple(vec![Term::atom("badrpc"), reason])
}

fn undef(module: &Atom, function: &Atom, args: &[Term]) -> Term {
    let frame = Term::tuple(vec![
        Term::Atom(module.clone()),
        Term::Atom(function.clone()),
        Term::List(args.to_vec()),
        Term::nil(),
    ]);
    badrpc(Term::tuple(vec![
        Term::atom("EXIT"),
        Term::tuple(vec![Term::atom("undef"), Term::list(vec![frame])]),
    ]))
}

/// Answers RPC requests for the node, registered as `rex`
#[derive(Debug, Default)]
pub struct RexServer;

impl RexServer {
    fn invoke(ctx: &ProcessContext, module: &Atom, function: &Atom, args: &[Term]) -> Term {
        match ctx.node().rpc_table().get(module.as_str(), function.as_str()) {
            Some(closure) => {
                debug!(module = %module, function = %function, arity = args.len(), "Invoking RPC");
                closure(args)
            }
            None => {
                warn!(module = %module, function = %function, "Unknown RPC requested");
                undef(module, function, args)
            }
        }
    }
}

#[async_trait]
impl GenServer for RexServer {
    type Args = ();

    async fn init(&mut self, ctx: &ProcessContext, _args: ()) -> Result<()> {
        ctx.node().register(REX, ctx.self_pid())
    }

    async fn handle_cast(&mut self, ctx: &ProcessContext, message: Term) {
        match RpcRequest::parse(message, "cast") {
            RpcRequest::Invoke {
                module,
                function,
                args,
            } => {
                let _ = Self::invoke(ctx, &module, &function, &args);
            }
            RpcRequest::Malformed(term) => debug!(message = %term, "Ignoring malformed RPC cast"),
        }
    }

    async fn handle_call(&mut self, ctx: &ProcessContext, message: Term, from: &CallFrom) -> Term {
        match RpcRequest::parse(message, "call") {
            RpcRequest::Invoke {
                module,
                function,
                args,
            } => Self::invoke(ctx, &module, &function, &args),
            RpcRequest::Malformed(term) => {
                warn!(caller = %from, message = %term, "Malformed RPC call");
                badrpc(Term::atom("badarg"))
            }
        }
    }
}

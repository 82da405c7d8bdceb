//! The gonode gen-server
//!
//! Registers itself under the configured name during `init` and answers:
//!
//! - cast `{ping, From}`: sends `{pong, Self}` to `From`
//! - cast `stop`: fires the completion signal the driver is waiting on
//! - call `Msg`: replies `{ok, go_reply, Msg}`
//! - anything else is logged and dropped

use async_trait::async_trait;
use messaging_actors::{
    Atom, CallFrom, CompletionSignal, ExitReason, GenServer, Pid, ProcessContext, Result, Term,
};
use tracing::{debug, info, warn};

/// Cast payloads the server acts on
#[derive(Debug, Clone, PartialEq)]
pub enum ServerCommand {
    /// `{ping, From}`
    Ping(Pid),
    /// `stop`
    Stop,
    Unrecognized(Term),
}

impl ServerCommand {
    pub fn decode(message: Term) -> Self {
        if message.is_atom("stop") {
            return ServerCommand::Stop;
        }
        match message.tagged("ping") {
            Some([Term::Pid(from), ..]) => ServerCommand::Ping(from.clone()),
            _ => ServerCommand::Unrecognized(message),
        }
    }
}

/// Reply to any call: `{ok, go_reply, Msg}`
pub fn go_reply(message: Term) -> Term {
    Term::tuple(vec![Term::atom("ok"), Term::atom("go_reply"), message])
}

#[derive(Debug)]
pub struct GoServer {
    name: Atom,
    completion: Option<CompletionSignal>,
}

impl GoServer {
    pub fn new(name: impl Into<Atom>) -> Self {
        Self {
            name: name.into(),
            completion: None,
        }
    }

    fn stop(&mut self, ctx: &ProcessContext) {
        match self.completion.as_mut().map(|signal| signal.fire(true)) {
            Some(true) => {
                info!(pid = %ctx.self_pid(), "Stop requested");
            }
            _ => {
                info!(pid = %ctx.self_pid(), "Stop already requested, ignoring");
            }
        }
    }
}

#[async_trait]
impl GenServer for GoServer {
    type Args = CompletionSignal;

    async fn init(&mut self, ctx: &ProcessContext, completion: CompletionSignal) -> Result<()> {
        info!(pid = %ctx.self_pid(), name = %self.name, "Init");
        ctx.node().register(self.name.clone(), ctx.self_pid())?;
        self.completion = Some(completion);
        Ok(())
    }

    async fn handle_cast(&mut self, ctx: &ProcessContext, message: Term) {
        debug!(%message, "HandleCast");

        match ServerCommand::decode(message) {
            ServerCommand::Ping(from) => {
                let pong = Term::tuple(vec![Term::atom("pong"), Term::Pid(ctx.self_pid().clone())]);
                if let Err(e) = ctx.node().send(&from, pong) {
                    warn!(to = %from, error = %e, "Failed to send pong");
                }
            }
            ServerCommand::Stop => self.stop(ctx),
            ServerCommand::Unrecognized(message) => {
                debug!(%message, "Ignoring unrecognized cast");
            }
        }
    }

    async fn handle_call(&mut self, _ctx: &ProcessContext, message: Term, from: &CallFrom) -> Term {
        debug!(%message, %from, "HandleCall");
        go_reply(message)
    }

    async fn handle_info(&mut self, _ctx: &ProcessContext, message: Term) {
        info!(%message, "HandleInfo");
    }

    async fn terminate(&mut self, ctx: &ProcessContext, reason: ExitReason) {
        info!(pid = %ctx.self_pid(), %reason, "Terminate");
    }
}

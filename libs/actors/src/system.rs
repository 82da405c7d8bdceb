//! Process Runtime
//!
//! The gen-server contract and the loop that drives one process.
//!
//! A process moves through `init → running → terminate`. The runtime
//! guarantees that `init`, every handler and `terminate` run strictly one at a
//! time for a given process, so process state needs no locking. Different
//! processes run concurrently on the tokio runtime.
//!
//! # Failure isolation
//!
//! A handler that panics takes down only its own process: the loop catches the
//! unwind, calls `terminate` with [`ExitReason::Error`] and releases the
//! process' mailbox and names. The node and every other process keep running.

use crate::messages::{reply_envelope, CallFrom, Envelope, MailboxEvent};
use crate::node::Node;
use crate::registry::MailboxReceiver;
use crate::Result;
use async_trait::async_trait;
use futures::FutureExt;
use std::any::Any;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};
use types::{Pid, Term};

/// Exit code reported when a handler panics
pub const HANDLER_PANIC_CODE: i32 = 1;

/// Why a process stopped
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExitReason {
    /// Process finished on its own terms
    Normal,
    /// Node asked the process to stop
    Shutdown,
    /// Process failed
    Error { code: i32, message: String },
}

impl ExitReason {
    pub fn error(code: i32, message: impl Into<String>) -> Self {
        ExitReason::Error {
            code,
            message: message.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, ExitReason::Error { .. })
    }
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitReason::Normal => f.write_str("normal"),
            ExitReason::Shutdown => f.write_str("shutdown"),
            ExitReason::Error { code, message } => write!(f, "error({}): {}", code, message),
        }
    }
}

/// Handle a process uses to reach itself and its node
#[derive(Clone)]
pub struct ProcessContext {
    pid: Pid,
    node: Node,
}

impl ProcessContext {
    pub(crate) fn new(pid: Pid, node: Node) -> Self {
        Self { pid, node }
    }

    pub fn self_pid(&self) -> &Pid {
        &self.pid
    }

    pub fn node(&self) -> &Node {
        &self.node
    }

    /// Route `reply` back to the caller identified by `from`
    pub(crate) fn reply(&self, from: &CallFrom, reply: Term) {
        if let Err(e) = self.node.send(from.pid(), reply_envelope(from, reply)) {
            warn!(
                pid = %self.pid,
                caller = %from.pid(),
                error = %e,
                "Failed to deliver call reply"
            );
        }
    }
}

impl fmt::Debug for ProcessContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessContext")
            .field("pid", &self.pid)
            .field("node", self.node.name())
            .finish()
    }
}

/// Callbacks of a mailbox process
///
/// Handlers must return promptly: long work belongs on a separate task so the
/// mailbox keeps draining.
#[async_trait]
pub trait GenServer: Send + 'static {
    /// Spawn-time arguments handed to `init`
    type Args: Send + 'static;

    /// Called once, before the first message is handled
    async fn init(&mut self, ctx: &ProcessContext, args: Self::Args) -> Result<()>;

    /// Fire-and-forget request
    async fn handle_cast(&mut self, ctx: &ProcessContext, message: Term) {
        debug!(pid = %ctx.self_pid(), %message, "Unhandled cast");
    }

    /// Request that always produces a reply
    async fn handle_call(&mut self, ctx: &ProcessContext, message: Term, from: &CallFrom) -> Term;

    /// Message outside the gen-server convention
    async fn handle_info(&mut self, ctx: &ProcessContext, message: Term) {
        debug!(pid = %ctx.self_pid(), %message, "Unhandled info");
    }

    /// Called once when the process stops
    async fn terminate(&mut self, ctx: &ProcessContext, reason: ExitReason) {
        debug!(pid = %ctx.self_pid(), %reason, "Process terminating");
    }
}

/// Node-wide process counters
#[derive(Debug, Default)]
pub struct NodeMetrics {
    pub processes_spawned: AtomicU64,
    pub processes_stopped: AtomicU64,
    pub messages_processed: AtomicU64,
    pub total_processing_time_ns: AtomicU64,
    pub handler_panics: AtomicU64,
}

impl NodeMetrics {
    pub fn record_message_handled(&self, duration: Duration) {
        self.messages_processed.fetch_add(1, Ordering::Relaxed);
        self.total_processing_time_ns
            .fetch_add(duration.as_nanos() as u64, Ordering::Relaxed);
    }

    pub fn avg_processing_time_ns(&self) -> f64 {
        let count = self.messages_processed.load(Ordering::Relaxed);
        if count == 0 {
            return 0.0;
        }
        let total = self.total_processing_time_ns.load(Ordering::Relaxed);
        total as f64 / count as f64
    }

    pub fn snapshot(&self) -> NodeStats {
        NodeStats {
            processes_spawned: self.processes_spawned.load(Ordering::Relaxed),
            processes_stopped: self.processes_stopped.load(Ordering::Relaxed),
            messages_processed: self.messages_processed.load(Ordering::Relaxed),
            handler_panics: self.handler_panics.load(Ordering::Relaxed),
            avg_processing_time_ns: self.avg_processing_time_ns(),
        }
    }
}

/// Point-in-time copy of [`NodeMetrics`]
#[derive(Debug, Clone, PartialEq)]
pub struct NodeStats {
    pub processes_spawned: u64,
    pub processes_stopped: u64,
    pub messages_processed: u64,
    pub handler_panics: u64,
    pub avg_processing_time_ns: f64,
}

async fn dispatch<S: GenServer>(server: &mut S, ctx: &ProcessContext, event: MailboxEvent) {
    match event {
        MailboxEvent::Cast(message) => server.handle_cast(ctx, message).await,
        MailboxEvent::Call { from, message } => {
            let reply = server.handle_call(ctx, message, &from).await;
            ctx.reply(&from, reply);
        }
        MailboxEvent::Info(message) => server.handle_info(ctx, message).await,
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "handler panicked".to_string()
    }
}

/// Drive one process until it is told to exit or a handler fails
pub(crate) async fn run_process<S: GenServer>(
    mut server: S,
    ctx: ProcessContext,
    mut mailbox: MailboxReceiver,
) {
    let started = Instant::now();
    let metrics = ctx.node().metrics();

    debug!(
        pid = %ctx.self_pid(),
        process_type = std::any::type_name::<S>(),
        "Entering message loop"
    );

    let reason = loop {
        let envelope = match mailbox.recv().await {
            Some(envelope) => envelope,
            None => break ExitReason::Shutdown,
        };

        match envelope {
            Envelope::Exit(reason) => break reason,
            Envelope::Message(term) => {
                let event = MailboxEvent::classify(term);
                let kind = event.kind();
                let start = Instant::now();

                let outcome = AssertUnwindSafe(dispatch(&mut server, &ctx, event))
                    .catch_unwind()
                    .await;

                match outcome {
                    Ok(()) => metrics.record_message_handled(start.elapsed()),
                    Err(panic) => {
                        let message = panic_message(panic.as_ref());
                        metrics.handler_panics.fetch_add(1, Ordering::Relaxed);
                        error!(
                            pid = %ctx.self_pid(),
                            event = kind,
                            panic = %message,
                            "Handler panicked, isolating process"
                        );
                        break ExitReason::error(HANDLER_PANIC_CODE, message);
                    }
                }
            }
        }
    };

    if AssertUnwindSafe(server.terminate(&ctx, reason.clone()))
        .catch_unwind()
        .await
        .is_err()
    {
        error!(pid = %ctx.self_pid(), "terminate callback panicked");
    }

    ctx.node().release_process(ctx.self_pid());
    metrics.processes_stopped.fetch_add(1, Ordering::Relaxed);

    info!(
        pid = %ctx.self_pid(),
        reason = %reason,
        uptime_ms = started.elapsed().as_millis(),
        "Process stopped"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_reason_display() {
        assert_eq!(ExitReason::Normal.to_string(), "normal");
        assert_eq!(ExitReason::Shutdown.to_string(), "shutdown");
        assert_eq!(
            ExitReason::error(3, "boom").to_string(),
            "error(3): boom"
        );
        assert!(ExitReason::error(3, "boom").is_error());
        assert!(!ExitReason::Shutdown.is_error());
    }

    #[test]
    fn test_panic_message_extraction() {
        let static_str: Box<dyn Any + Send> = Box::new("static");
        let owned: Box<dyn Any + Send> = Box::new(String::from("owned"));
        let other: Box<dyn Any + Send> = Box::new(42u8);

        assert_eq!(panic_message(static_str.as_ref()), "static");
        assert_eq!(panic_message(owned.as_ref()), "owned");
        assert_eq!(panic_message(other.as_ref()), "handler panicked");
    }

    #[test]
    fn test_metrics_average() {
        let metrics = NodeMetrics::default();
        assert_eq!(metrics.avg_processing_time_ns(), 0.0);

        metrics.record_message_handled(Duration::from_nanos(100));
        metrics.record_message_handled(Duration::from_nanos(300));

        let stats = metrics.snapshot();
        assert_eq!(stats.messages_processed, 2);
        assert_eq!(stats.avg_processing_time_ns, 200.0);
    }
}

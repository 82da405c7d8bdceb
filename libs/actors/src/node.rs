//! Distributed Node Handle
//!
//! A [`Node`] is this process' membership in the network: it owns the local
//! mailboxes and registered names, the links to connected peers and the RPC
//! table. It is cheap to clone and safe to use from any task; every clone
//! refers to the same node.
//!
//! # Lock Ordering
//!
//! 1. `registry` (mailboxes, then names)
//! 2. `peers`
//! 3. `tasks`
//!
//! No lock is held across an `.await`.

use crate::messages::{call_envelope, cast_envelope, match_reply, CallFrom, Envelope};
use crate::registry::{MailboxReceiver, ProcessRegistry};
use crate::rpc::{RexServer, RpcClosure, RpcTable, REX};
use crate::system::{run_process, ExitReason, GenServer, NodeMetrics, NodeStats, ProcessContext};
use crate::transport::{self, PeerTable};
use crate::{NodeError, Result};
use network::{bind_listener, Destination};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use types::{Atom, Pid, Reference, Term};

/// Default wait for a call reply
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(5);

/// Grace period for processes to run `terminate` during shutdown
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Handle to this node
#[derive(Clone)]
pub struct Node {
    inner: Arc<NodeInner>,
}

struct NodeInner {
    name: Atom,
    cookie: String,
    creation: u32,

    /// Local mailboxes and registered names
    registry: ProcessRegistry,

    /// Links to connected peers
    peers: PeerTable,

    /// Closures reachable through `rex`
    rpc: RpcTable,

    /// Pid of the running `rex` server, spawned on first RPC registration
    rex: tokio::sync::Mutex<Option<Pid>>,

    next_pid: AtomicU32,
    next_ref: AtomicU32,

    /// Process tasks, joined on shutdown
    tasks: Mutex<HashMap<Pid, JoinHandle<()>>>,

    /// Accept loop and bound port once published
    listener: Mutex<Option<(u16, JoinHandle<()>)>>,

    /// Handshake and connection tasks, aborted on shutdown
    connection_tasks: Mutex<Vec<JoinHandle<()>>>,

    metrics: Arc<NodeMetrics>,
}

impl Node {
    /// Create a node that is not yet reachable from the network
    pub fn new(name: impl Into<Atom>, cookie: impl Into<String>) -> Self {
        let creation = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| (elapsed.as_secs() & 0xffff) as u32)
            .unwrap_or(1)
            .max(1);

        let node = Self {
            inner: Arc::new(NodeInner {
                name: name.into(),
                cookie: cookie.into(),
                creation,
                registry: ProcessRegistry::new(),
                peers: PeerTable::new(),
                rpc: RpcTable::new(),
                rex: tokio::sync::Mutex::new(None),
                next_pid: AtomicU32::new(1),
                next_ref: AtomicU32::new(1),
                tasks: Mutex::new(HashMap::new()),
                listener: Mutex::new(None),
                connection_tasks: Mutex::new(Vec::new()),
                metrics: Arc::new(NodeMetrics::default()),
            }),
        };

        debug!(node = %node.name(), creation, "Node created");
        node
    }

    pub fn name(&self) -> &Atom {
        &self.inner.name
    }

    pub(crate) fn cookie(&self) -> &str {
        &self.inner.cookie
    }

    pub(crate) fn peers(&self) -> &PeerTable {
        &self.inner.peers
    }

    pub(crate) fn rpc_table(&self) -> &RpcTable {
        &self.inner.rpc
    }

    pub fn metrics(&self) -> Arc<NodeMetrics> {
        Arc::clone(&self.inner.metrics)
    }

    pub fn stats(&self) -> NodeStats {
        self.inner.metrics.snapshot()
    }

    fn make_pid(&self) -> Pid {
        let id = self.inner.next_pid.fetch_add(1, Ordering::Relaxed);
        Pid::new(self.inner.name.clone(), id, 0, self.inner.creation)
    }

    /// Mint a reference unique to this node incarnation
    pub fn make_ref(&self) -> Reference {
        let id = self.inner.next_ref.fetch_add(1, Ordering::Relaxed);
        Reference::new(self.inner.name.clone(), self.inner.creation, [id, 0, 0])
    }

    /// Listen for peers on `port` (0 picks a free port)
    ///
    /// Returns the bound port. Failing to bind is an error; a node that cannot
    /// publish is unreachable.
    pub async fn publish(&self, port: u16) -> Result<u16> {
        if let Some((bound, _)) = self.inner.listener.lock().as_ref() {
            return Err(NodeError::AlreadyPublished {
                node: self.name().clone(),
                port: *bound,
            });
        }

        let address = SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), port);
        let listener = bind_listener(address).await?;
        let bound = listener
            .local_addr()
            .map_err(network::TransportError::from)?
            .port();

        let handle = tokio::spawn(transport::accept_loop(self.clone(), listener));
        *self.inner.listener.lock() = Some((bound, handle));

        info!(node = %self.name(), port = bound, "Node published");
        Ok(bound)
    }

    /// Port the node is published on
    pub fn published_port(&self) -> Option<u16> {
        self.inner.listener.lock().as_ref().map(|(port, _)| *port)
    }

    /// Dial a published node and return its name once the handshake succeeds
    pub async fn connect(&self, address: SocketAddr) -> Result<Atom> {
        transport::dial_peer(self, address).await
    }

    /// Names of connected peers
    pub fn connected_nodes(&self) -> Vec<Atom> {
        self.inner.peers.nodes()
    }

    pub(crate) fn track_connection_task(&self, handle: JoinHandle<()>) {
        let mut tasks = self.inner.connection_tasks.lock();
        tasks.retain(|task| !task.is_finished());
        tasks.push(handle);
    }

    /// Start a process and run its `init` callback
    ///
    /// `init` has completed when this returns, so anything it registered is
    /// already visible. Messages sent to the pid during `init` are queued.
    pub async fn spawn<S: GenServer>(&self, mut server: S, args: S::Args) -> Result<Pid> {
        let pid = self.make_pid();
        let (sender, receiver) = mpsc::unbounded_channel();
        self.inner.registry.insert_mailbox(pid.clone(), sender);

        let ctx = ProcessContext::new(pid.clone(), self.clone());
        if let Err(e) = server.init(&ctx, args).await {
            warn!(
                pid = %pid,
                process_type = std::any::type_name::<S>(),
                error = %e,
                "Process init failed"
            );
            self.inner.registry.remove_mailbox(&pid);
            return Err(e);
        }

        // Held across the spawn so a process that exits at once cannot
        // release its entry before it is inserted.
        let mut tasks = self.inner.tasks.lock();
        tasks.insert(pid.clone(), tokio::spawn(run_process(server, ctx, receiver)));
        drop(tasks);
        self.inner
            .metrics
            .processes_spawned
            .fetch_add(1, Ordering::Relaxed);

        info!(
            pid = %pid,
            process_type = std::any::type_name::<S>(),
            "Process spawned"
        );
        Ok(pid)
    }

    /// Called by the process loop once `terminate` has returned
    pub(crate) fn release_process(&self, pid: &Pid) {
        let released = self.inner.registry.remove_mailbox(pid);
        self.inner.tasks.lock().remove(pid);
        if !released.is_empty() {
            debug!(pid = %pid, names = ?released, "Released registered names");
        }
    }

    /// Ask a local process to stop; its `terminate` runs with `reason`
    pub fn stop_process(&self, pid: &Pid, reason: ExitReason) -> Result<()> {
        let mailbox = self
            .inner
            .registry
            .mailbox(pid)
            .ok_or_else(|| NodeError::no_process(pid))?;
        mailbox
            .send(Envelope::Exit(reason))
            .map_err(|_| NodeError::no_process(pid))
    }

    pub fn register(&self, name: impl Into<Atom>, pid: &Pid) -> Result<()> {
        let name = name.into();
        if pid.node() != self.name() {
            return Err(NodeError::no_process(pid));
        }
        self.inner.registry.register(name, pid.clone())
    }

    pub fn unregister(&self, name: &str) -> Option<Pid> {
        self.inner.registry.unregister(name)
    }

    pub fn whereis(&self, name: &str) -> Option<Pid> {
        self.inner.registry.whereis(name)
    }

    pub fn is_alive(&self, pid: &Pid) -> bool {
        self.inner.registry.contains(pid)
    }

    /// Number of live local mailboxes
    pub fn process_count(&self) -> usize {
        self.inner.registry.len()
    }

    /// Best-effort asynchronous delivery of `message` to `to`
    ///
    /// Local destinations go straight into the mailbox; remote ones are
    /// queued on the peer link. An error means the message was not queued.
    pub fn send(&self, to: impl Into<Destination>, message: Term) -> Result<()> {
        let to = to.into();
        match to.node() {
            Some(node) if node != self.name() => {
                let link = self.inner.peers.get(node).ok_or_else(|| NodeError::NotConnected {
                    node: node.clone(),
                })?;
                link.send(to, message)
            }
            _ => self.deliver_local(&to, message),
        }
    }

    pub(crate) fn deliver_local(&self, to: &Destination, message: Term) -> Result<()> {
        let pid = match to {
            Destination::Pid(pid) => pid.clone(),
            Destination::Name(name) | Destination::Remote { name, .. } => self
                .whereis(name.as_str())
                .ok_or_else(|| NodeError::no_process(to))?,
        };

        let mailbox = self
            .inner
            .registry
            .mailbox(&pid)
            .ok_or_else(|| NodeError::no_process(to))?;
        mailbox
            .send(Envelope::Message(message))
            .map_err(|_| NodeError::no_process(to))
    }

    /// Send `{'$gen_cast', message}`
    pub fn cast(&self, to: impl Into<Destination>, message: Term) -> Result<()> {
        self.send(to, cast_envelope(message))
    }

    /// Send `{'$gen_call', From, message}` and wait for the matching reply
    pub async fn call(
        &self,
        to: impl Into<Destination>,
        message: Term,
        timeout: Duration,
    ) -> Result<Term> {
        let to = to.into();
        let mut mailbox = self.open_mailbox();
        let from = CallFrom::new(mailbox.pid().clone(), self.make_ref());

        self.send(to.clone(), call_envelope(&from, message))?;

        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            let term = match tokio::time::timeout(remaining, mailbox.recv()).await {
                Ok(Some(term)) => term,
                Ok(None) => return Err(NodeError::no_process(mailbox.pid())),
                Err(_) => {
                    return Err(NodeError::CallTimeout {
                        destination: to.to_string(),
                        timeout_ms: timeout.as_millis() as u64,
                    })
                }
            };

            if let Some(reply) = match_reply(&term, from.tag()) {
                return Ok(reply.clone());
            }
            debug!(message = %term, "Dropping unrelated message while waiting for reply");
        }
    }

    /// Register `closure` as `module:function` for remote callers
    ///
    /// The first registration starts the `rex` server that answers RPC
    /// requests for this node.
    pub async fn provide_rpc<F>(
        &self,
        module: impl Into<Atom>,
        function: impl Into<Atom>,
        closure: F,
    ) -> Result<()>
    where
        F: Fn(&[Term]) -> Term + Send + Sync + 'static,
    {
        self.ensure_rex().await?;
        let closure: RpcClosure = Arc::new(closure);
        self.inner.rpc.insert(module.into(), function.into(), closure)
    }

    /// Remove a previously provided closure
    pub fn revoke_rpc(&self, module: &str, function: &str) -> bool {
        self.inner.rpc.remove(module, function)
    }

    async fn ensure_rex(&self) -> Result<()> {
        let mut rex = self.inner.rex.lock().await;
        if let Some(pid) = rex.as_ref() {
            if self.is_alive(pid) {
                return Ok(());
            }
        }
        let pid = self.spawn(RexServer, ()).await?;
        *rex = Some(pid);
        Ok(())
    }

    /// Call `module:function(args)` on `node` through its `rex` server
    pub async fn rpc_call(
        &self,
        node: impl Into<Atom>,
        module: impl Into<Atom>,
        function: impl Into<Atom>,
        args: Vec<Term>,
        timeout: Duration,
    ) -> Result<Term> {
        let request = Term::tuple(vec![
            Term::atom("call"),
            Term::Atom(module.into()),
            Term::Atom(function.into()),
            Term::List(args),
            Term::atom("user"),
        ]);
        self.call(Destination::remote(REX, node), request, timeout)
            .await
    }

    /// Receive-only mailbox with a fresh pid, released on drop
    pub fn open_mailbox(&self) -> Mailbox {
        let pid = self.make_pid();
        let (sender, receiver) = mpsc::unbounded_channel();
        self.inner.registry.insert_mailbox(pid.clone(), sender);
        Mailbox {
            pid,
            receiver,
            node: self.clone(),
        }
    }

    /// Stop every local process and stop accepting peers
    pub async fn shutdown(&self) {
        info!(node = %self.name(), "Shutting down node");

        if let Some((_, accept)) = self.inner.listener.lock().take() {
            accept.abort();
        }

        for pid in self.inner.registry.pids() {
            if let Some(mailbox) = self.inner.registry.mailbox(&pid) {
                let _ = mailbox.send(Envelope::Exit(ExitReason::Shutdown));
            }
        }

        let tasks: Vec<(Pid, JoinHandle<()>)> = self.inner.tasks.lock().drain().collect();
        for (pid, mut task) in tasks {
            match tokio::time::timeout(SHUTDOWN_GRACE, &mut task).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!(pid = %pid, error = %e, "Process task failed during shutdown"),
                Err(_) => {
                    warn!(pid = %pid, "Process did not stop in time, aborting");
                    task.abort();
                    self.inner.registry.remove_mailbox(&pid);
                }
            }
        }

        self.inner.peers.clear();
        for task in self.inner.connection_tasks.lock().drain(..) {
            task.abort();
        }

        info!(node = %self.name(), "Node shutdown complete");
    }
}

impl std::fmt::Debug for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Node")
            .field("name", &self.inner.name)
            .field("creation", &self.inner.creation)
            .field("processes", &self.inner.registry.len())
            .finish()
    }
}

/// Anonymous receive-only mailbox
pub struct Mailbox {
    pid: Pid,
    receiver: MailboxReceiver,
    node: Node,
}

impl Mailbox {
    pub fn pid(&self) -> &Pid {
        &self.pid
    }

    /// Next message, `None` once the node has asked the mailbox to close
    pub async fn recv(&mut self) -> Option<Term> {
        match self.receiver.recv().await? {
            Envelope::Message(term) => Some(term),
            Envelope::Exit(_) => None,
        }
    }

    pub async fn recv_timeout(&mut self, timeout: Duration) -> Option<Term> {
        tokio::time::timeout(timeout, self.recv()).await.ok().flatten()
    }
}

impl Drop for Mailbox {
    fn drop(&mut self) {
        self.node.inner.registry.remove_mailbox(&self.pid);
    }
}

//! Process Driver
//!
//! Owns startup order and the single point where the process waits for its
//! gen-server to ask for shutdown.

use crate::config::NodeConfig;
use crate::rpc;
use crate::server::GoServer;
use anyhow::{Context, Result};
use messaging_actors::{completion_signal, Node};
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct NodeDriver {
    config: NodeConfig,
}

impl NodeDriver {
    pub fn new(config: NodeConfig) -> Self {
        Self { config }
    }

    /// Create the node from the configuration and run until stopped
    pub async fn run(self) -> Result<()> {
        let node = Node::new(self.config.node_name.as_str(), self.config.cookie.as_str());
        self.run_on(node).await
    }

    /// Run on an existing node until the gen-server is told to stop
    ///
    /// Failing to publish aborts before anything is spawned.
    pub async fn run_on(self, node: Node) -> Result<()> {
        let port = node
            .publish(self.config.epmd_port)
            .await
            .with_context(|| format!("Cannot publish on port {}", self.config.epmd_port))?;
        info!(node = %node.name(), port, "Node published");

        let (signal, waiter) = completion_signal();

        let pid = node
            .spawn(GoServer::new(self.config.server_name.as_str()), signal)
            .await
            .with_context(|| format!("Cannot spawn {}", self.config.server_name))?;
        info!(pid = %pid, name = %self.config.server_name, "gen_server spawned");

        if self.config.enable_rpc {
            rpc::provide(&node).await;
        }

        match waiter.wait().await {
            Some(_) => info!("node finished"),
            None => warn!("gen_server stopped without a stop request; node finished"),
        }

        node.shutdown().await;
        Ok(())
    }
}

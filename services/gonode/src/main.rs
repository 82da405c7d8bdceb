//! gonode binary
//!
//! Usage:
//!   gonode --name gonode@localhost --cookie 123 --epmd-port 5588
//!   gonode --rpc --log /var/log/gonode.log --pid-file /run/gonode.pid

use anyhow::Result;
use clap::Parser;
use gonode::logging::init_logging;
use gonode::pidfile::record_pid;
use gonode::{Args, NodeConfig, NodeDriver};
use tracing::{debug, error, info};

#[tokio::main]
async fn main() {
    let args = Args::parse();

    if let Err(e) = run(args).await {
        error!("{:#}", e);
        eprintln!("gonode: {:#}", e);
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<()> {
    let config = NodeConfig::try_from(args)?;

    init_logging(&config)?;
    record_pid(&config)?;

    info!("node started");
    debug!(config = %serde_json::to_string(&config)?, "Configuration");

    let driver = NodeDriver::new(config);
    tokio::select! {
        result = driver.run() => result,
        _ = tokio::signal::ctrl_c() => {
            info!("Received shutdown signal");
            Ok(())
        }
    }
}

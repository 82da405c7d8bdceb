//! Command line flags and the immutable node configuration built from them

use anyhow::{bail, Result};
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub const DEFAULT_SERVER_NAME: &str = "go_srv";
pub const DEFAULT_NODE_NAME: &str = "gonode@localhost";
pub const DEFAULT_COOKIE: &str = "123";
pub const DEFAULT_EPMD_PORT: u16 = 5588;

#[derive(Parser, Debug, Clone)]
#[command(name = "gonode")]
#[command(about = "Named gen-server node")]
#[command(version)]
pub struct Args {
    /// Log file; output goes to the console when empty
    #[arg(long, default_value = "")]
    pub log: String,

    /// Name the gen-server registers under
    #[arg(long = "gen-server", visible_alias = "gen_server", default_value = DEFAULT_SERVER_NAME)]
    pub gen_server: String,

    /// Node name
    #[arg(long, default_value = DEFAULT_NODE_NAME)]
    pub name: String,

    /// Cookie peers must present
    #[arg(long, default_value = DEFAULT_COOKIE)]
    pub cookie: String,

    /// Port the node is published on
    #[arg(long = "epmd-port", visible_alias = "epmd_port", default_value_t = DEFAULT_EPMD_PORT)]
    pub epmd_port: u16,

    /// Provide go_rpc:call over RPC
    #[arg(long)]
    pub rpc: bool,

    /// Pid file path; no pid file when empty
    #[arg(long = "pid-file", visible_alias = "pid_file", default_value = "")]
    pub pid_file: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long = "log-level", default_value = "info")]
    pub log_level: String,
}

/// Node configuration, fixed for the lifetime of the process
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeConfig {
    pub node_name: String,
    pub cookie: String,
    pub server_name: String,
    pub epmd_port: u16,
    pub enable_rpc: bool,
    pub log_file: Option<PathBuf>,
    pub pid_file: Option<PathBuf>,
    pub log_level: String,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            node_name: DEFAULT_NODE_NAME.to_string(),
            cookie: DEFAULT_COOKIE.to_string(),
            server_name: DEFAULT_SERVER_NAME.to_string(),
            epmd_port: DEFAULT_EPMD_PORT,
            enable_rpc: false,
            log_file: None,
            pid_file: None,
            log_level: "info".to_string(),
        }
    }
}

fn optional_path(value: String) -> Option<PathBuf> {
    if value.is_empty() {
        None
    } else {
        Some(PathBuf::from(value))
    }
}

impl TryFrom<Args> for NodeConfig {
    type Error = anyhow::Error;

    fn try_from(args: Args) -> Result<Self> {
        if args.name.is_empty() {
            bail!("Node name must not be empty");
        }
        if args.gen_server.is_empty() {
            bail!("gen_server name must not be empty");
        }

        Ok(Self {
            node_name: args.name,
            cookie: args.cookie,
            server_name: args.gen_server,
            epmd_port: args.epmd_port,
            enable_rpc: args.rpc,
            log_file: optional_path(args.log),
            pid_file: optional_path(args.pid_file),
            log_level: args.log_level,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(flags: &[&str]) -> NodeConfig {
        let args = Args::try_parse_from(std::iter::once("gonode").chain(flags.iter().copied())).unwrap();
        NodeConfig::try_from(args).unwrap()
    }

    #[test]
    fn test_defaults_match_flags() {
        assert_eq!(parse(&[]), NodeConfig::default());
    }

    #[test]
    fn test_all_flags() {
        let config = parse(&[
            "--log",
            "/tmp/gonode.log",
            "--gen-server",
            "my_srv",
            "--name",
            "other@host",
            "--cookie",
            "secret",
            "--epmd-port",
            "6000",
            "--rpc",
            "--pid-file",
            "/tmp/gonode.pid",
            "--log-level",
            "debug",
        ]);

        assert_eq!(config.server_name, "my_srv");
        assert_eq!(config.node_name, "other@host");
        assert_eq!(config.cookie, "secret");
        assert_eq!(config.epmd_port, 6000);
        assert!(config.enable_rpc);
        assert_eq!(config.log_file, Some(PathBuf::from("/tmp/gonode.log")));
        assert_eq!(config.pid_file, Some(PathBuf::from("/tmp/gonode.pid")));
        assert_eq!(config.log_level, "debug");
    }

    #[test]
    fn test_underscore_aliases() {
        let config = parse(&["--gen_server", "alias_srv", "--epmd_port", "7000", "--pid_file", "x.pid"]);
        assert_eq!(config.server_name, "alias_srv");
        assert_eq!(config.epmd_port, 7000);
        assert_eq!(config.pid_file, Some(PathBuf::from("x.pid")));
    }

    #[test]
    fn test_empty_server_name_is_rejected() {
        let args = Args::try_parse_from(["gonode", "--gen-server", ""]).unwrap();
        assert!(NodeConfig::try_from(args).is_err());
    }

    #[test]
    fn test_invalid_port_is_rejected() {
        assert!(Args::try_parse_from(["gonode", "--epmd-port", "70000"]).is_err());
    }
}

//! Pid file

use crate::config::NodeConfig;
use anyhow::{Context, Result};
use std::fs;
use std::path::Path;
use tracing::info;

/// Write `pid` as plain decimal text with no trailing newline
pub fn write_pid_file(path: &Path, pid: u32) -> Result<()> {
    fs::write(path, pid.to_string())
        .with_context(|| format!("Cannot write pid file {}", path.display()))
}

/// Log this process' pid and write the pid file when one is configured
pub fn record_pid(config: &NodeConfig) -> Result<()> {
    let pid = std::process::id();
    info!("process pid: {}", pid);

    if let Some(path) = &config.pid_file {
        write_pid_file(path, pid)?;
        info!("write pid in {}", path.display());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pid_file_has_no_trailing_newline() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gonode.pid");

        write_pid_file(&path, 4242).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "4242");
    }

    #[test]
    fn test_record_pid_writes_own_pid() {
        let dir = tempfile::tempdir().unwrap();
        let config = NodeConfig {
            pid_file: Some(dir.path().join("gonode.pid")),
            ..NodeConfig::default()
        };

        record_pid(&config).unwrap();
        let written = fs::read_to_string(dir.path().join("gonode.pid")).unwrap();
        assert_eq!(written, std::process::id().to_string());
    }

    #[test]
    fn test_unwritable_pid_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let config = NodeConfig {
            pid_file: Some(dir.path().join("missing").join("gonode.pid")),
            ..NodeConfig::default()
        };
        assert!(record_pid(&config).is_err());
    }

    #[test]
    fn test_no_pid_file_configured() {
        record_pid(&NodeConfig::default()).unwrap();
    }
}

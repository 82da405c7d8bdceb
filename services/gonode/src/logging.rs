//! Log sink setup
//!
//! Console by default; with a log file configured everything goes to that
//! file instead, without ANSI colors. `RUST_LOG` overrides the level flag.

use crate::config::NodeConfig;
use anyhow::{anyhow, Context, Result};
use std::fs::File;
use std::path::Path;
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;

/// Create (or truncate) the log file
pub fn open_log_file(path: &Path) -> Result<File> {
    File::create(path).with_context(|| format!("Cannot create log file {}", path.display()))
}

fn env_filter(level: &str) -> Result<EnvFilter> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => EnvFilter::try_new(level).with_context(|| format!("Invalid log level '{}'", level)),
    }
}

/// Install the global subscriber
pub fn init_logging(config: &NodeConfig) -> Result<()> {
    let filter = env_filter(&config.log_level)?;

    let installed = match &config.log_file {
        Some(path) => {
            let file = open_log_file(path)?;
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .try_init()
        }
        None => tracing_subscriber::fmt().with_env_filter(filter).try_init(),
    };

    installed.map_err(|e| anyhow!("Failed to install log subscriber: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_file_is_created() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gonode.log");
        open_log_file(&path).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_log_file_in_missing_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("gonode.log");
        let err = open_log_file(&path).unwrap_err();
        assert!(err.to_string().contains("Cannot create log file"));
    }

    #[test]
    fn test_level_names_are_valid_filters() {
        for level in ["trace", "debug", "info", "warn", "error"] {
            assert!(EnvFilter::try_new(level).is_ok());
        }
    }
}

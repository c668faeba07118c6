//! Subscriber setup: console output plus an append-only event log file

use std::fs::{self, File, OpenOptions};
use std::path::Path;
use std::sync::Mutex;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::LoggingConfig;
use crate::error::AgentError;
use crate::Result;

/// Install the global subscriber
///
/// `RUST_LOG` takes precedence over `config.filter`. The file layer writes
/// plain text and keeps targets so `audit` entries stay greppable.
pub fn init(config: &LoggingConfig, file_override: Option<&Path>) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.filter).map_err(|e| {
            AgentError::InvalidConfiguration(format!(
                "invalid logging.filter {:?}: {}",
                config.filter, e
            ))
        })?,
    };

    let path = file_override.unwrap_or(&config.file);
    let file = open_log_file(path)?;

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .with(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
        .try_init()
        .map_err(|e| AgentError::InvalidConfiguration(format!("logging already initialised: {}", e)))
}

/// Open `path` for appending, creating it and its parent directory
pub fn open_log_file(path: &Path) -> Result<File> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| {
            AgentError::InvalidConfiguration(format!(
                "cannot create log directory {}: {}",
                parent.display(),
                e
            ))
        })?;
    }

    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| {
            AgentError::InvalidConfiguration(format!(
                "cannot open log file {}: {}",
                path.display(),
                e
            ))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_open_log_file_appends() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs").join("history.log");

        writeln!(open_log_file(&path).unwrap(), "first").unwrap();
        writeln!(open_log_file(&path).unwrap(), "second").unwrap();

        let contents = fs::read_to_string(&path).unwrap();
        assert_eq!(contents, "first\nsecond\n");
    }

    #[test]
    fn test_open_log_file_unwritable() {
        let dir = tempfile::tempdir().unwrap();
        // A directory cannot be opened as a log file
        let err = open_log_file(dir.path()).unwrap_err();
        assert!(err.is_fatal());
    }
}

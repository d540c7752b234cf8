//! Daemon process management.
//!
//! The daemon is started once with flags derived from `ARG_*` environment
//! variables and reloaded with `SIGHUP` after every configuration change.
//! [`ProcessRunner`] is the seam the HTTP layer reloads through, so tests can
//! substitute a recording fake.

use std::collections::BTreeMap;
use std::future::Future;
use std::path::Path;
use std::pin::Pin;
use std::process::Stdio;

use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::error::{Result, ServerError};

/// Prefix of environment variables turned into daemon flags.
pub const FLAG_ENV_PREFIX: &str = "ARG_";

/// Name of the daemon binary.
pub const DAEMON_BINARY: &str = "prometheus";

/// Flag renames applied to legacy names.
const FLAG_RENAMES: &[(&str, &str)] = &[
    ("storage.local.path", "storage.tsdb.path"),
    ("storage.local.retention", "storage.tsdb.retention"),
    ("query.staleness-delta", "query.lookback-delta"),
];

/// Starts and reloads the metrics daemon.
pub trait ProcessRunner: Send + Sync {
    /// Run the daemon until it exits.
    ///
    /// # Errors
    ///
    /// Returns error if the daemon cannot be started or exits unsuccessfully.
    fn run<'a>(&'a self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>>;

    /// Ask the running daemon to reload its configuration.
    ///
    /// # Errors
    ///
    /// Returns error if the reload signal cannot be delivered.
    fn reload<'a>(&'a self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>>;
}

/// Converts one `ARG_*` variable into a daemon flag.
///
/// Returns `None` for variables that are not flags or are suppressed.
#[must_use]
pub fn env_to_flag(key: &str, value: &str) -> Option<String> {
    let name = key.strip_prefix(FLAG_ENV_PREFIX)?;
    if name.is_empty() {
        return None;
    }
    let name = name.to_lowercase().replace('_', ".");

    let (name, value) = match name.as_str() {
        "alertmanager.url" => return None,
        "web.enable-remote-shutdown" if value == "true" => ("web.enable-lifecycle", ""),
        "web.enable-remote-shutdown" => return None,
        other => (
            FLAG_RENAMES
                .iter()
                .find(|(old, _)| *old == other)
                .map_or(other, |(_, renamed)| *renamed),
            value,
        ),
    };

    Some(if value.is_empty() {
        format!("--{name}")
    } else {
        format!("--{name}={value}")
    })
}

/// Builds the daemon's command line flags from environment variables.
///
/// `--config.file` pointing at `config_path` is added unless a variable
/// already sets it.
#[must_use]
pub fn daemon_flags(vars: &BTreeMap<String, String>, config_path: &Path) -> Vec<String> {
    let mut flags: Vec<String> = vars
        .iter()
        .filter_map(|(key, value)| env_to_flag(key, value))
        .collect();

    if !flags.iter().any(|flag| flag.starts_with("--config.file")) {
        flags.insert(0, format!("--config.file={}", config_path.display()));
    }
    flags
}

/// The metrics daemon run as a child process.
#[derive(Debug, Clone)]
pub struct DaemonProcess {
    binary: String,
    flags: Vec<String>,
}

impl DaemonProcess {
    /// Create a runner for [`DAEMON_BINARY`] with the given flags.
    #[must_use]
    pub fn new(flags: Vec<String>) -> Self {
        Self {
            binary: DAEMON_BINARY.to_string(),
            flags,
        }
    }

    /// Use a different binary name.
    #[must_use]
    pub fn with_binary(mut self, binary: impl Into<String>) -> Self {
        self.binary = binary.into();
        self
    }

    /// Returns the flags passed on start.
    #[must_use]
    pub fn flags(&self) -> &[String] {
        &self.flags
    }

    fn command_line(&self) -> String {
        std::iter::once(self.binary.as_str())
            .chain(self.flags.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl ProcessRunner for DaemonProcess {
    fn run<'a>(&'a self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(async move {
            let command = self.command_line();
            info!(command = %command, "starting daemon");

            let status = Command::new(&self.binary)
                .args(&self.flags)
                .stdout(Stdio::inherit())
                .stderr(Stdio::inherit())
                .status()
                .await
                .map_err(|e| ServerError::Process {
                    command: command.clone(),
                    reason: e.to_string(),
                })?;

            if !status.success() {
                return Err(ServerError::Process {
                    command,
                    reason: status.to_string(),
                });
            }
            info!("daemon exited");
            Ok(())
        })
    }

    fn reload<'a>(&'a self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(async move {
            let command = format!("pkill -HUP {}", self.binary);
            debug!(command = %command, "reloading daemon");

            let output = Command::new("pkill")
                .args(["-HUP", self.binary.as_str()])
                .stdout(Stdio::piped())
                .stderr(Stdio::piped())
                .output()
                .await
                .map_err(|e| ServerError::Process {
                    command: command.clone(),
                    reason: e.to_string(),
                })?;

            if !output.status.success() {
                let stderr = String::from_utf8_lossy(&output.stderr);
                let reason = if stderr.trim().is_empty() {
                    output.status.to_string()
                } else {
                    stderr.trim().to_string()
                };
                warn!(command = %command, reason = %reason, "daemon reload failed");
                return Err(ServerError::Process { command, reason });
            }

            info!("daemon reloaded");
            Ok(())
        })
    }
}

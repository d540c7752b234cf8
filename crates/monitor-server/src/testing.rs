//! Test doubles for the daemon runner.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::error::{Result, ServerError};
use crate::process::ProcessRunner;

/// A [`ProcessRunner`] that counts calls instead of running anything.
#[derive(Debug, Default)]
pub struct RecordingRunner {
    runs: AtomicUsize,
    reloads: AtomicUsize,
    fail: bool,
}

impl RecordingRunner {
    /// A runner whose every call fails.
    #[must_use]
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    /// Number of `run` calls so far.
    pub fn runs(&self) -> usize {
        self.runs.load(Ordering::SeqCst)
    }

    /// Number of `reload` calls so far.
    pub fn reloads(&self) -> usize {
        self.reloads.load(Ordering::SeqCst)
    }

    fn outcome(&self, command: &str) -> Result<()> {
        if self.fail {
            Err(ServerError::Process {
                command: command.to_string(),
                reason: "simulated failure".to_string(),
            })
        } else {
            Ok(())
        }
    }
}

impl ProcessRunner for RecordingRunner {
    fn run<'a>(&'a self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(async move {
            self.runs.fetch_add(1, Ordering::SeqCst);
            self.outcome("prometheus")
        })
    }

    fn reload<'a>(&'a self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(async move {
            self.reloads.fetch_add(1, Ordering::SeqCst);
            self.outcome("reload")
        })
    }
}

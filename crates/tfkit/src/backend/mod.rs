//! Command execution backends.
//!
//! The [`CommandRunner`] trait is the only place `terraform` processes are
//! started, so the step sequence in [`crate::TerraformEngine`] can be tested
//! against a scripted runner.

pub mod system;

use crate::error::Result;
use reconcile::{CancelFlag, EngineInvocationResult};
use std::path::Path;
use std::time::Duration;

/// One command to run.
#[derive(Debug)]
pub struct Invocation<'a> {
    /// Program to execute
    pub program: &'a Path,
    /// Arguments
    pub args: Vec<String>,
    /// Working directory
    pub cwd: &'a Path,
    /// Extra environment variables for the child
    pub env: &'a [(String, String)],
    /// Time left before the child must be killed
    pub timeout: Duration,
    /// Cancellation flag polled while the child runs
    pub cancel: &'a CancelFlag,
}

/// Runs commands to completion.
pub trait CommandRunner: Send + Sync {
    /// Run a command and capture its exit code, stdout and stderr.
    ///
    /// Returns [`crate::Error::Timeout`] or [`crate::Error::Cancelled`] after
    /// killing the child, and [`crate::Error::Spawn`] if it never started.
    fn run(&self, invocation: &Invocation<'_>) -> Result<EngineInvocationResult>;
}

/// Get the default runner (real child processes).
pub fn default_runner() -> system::SystemRunner {
    system::SystemRunner::new()
}

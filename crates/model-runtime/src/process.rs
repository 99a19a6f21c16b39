// SPDX-License-Identifier: PolyForm-Shield-1.0

use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;
use tracing::{info, warn};

use crate::error::FetchError;

/// Runs the runtime's CLI as a child process.
///
/// Three shapes of invocation are supported:
///
/// - [`CommandRunner::run`] captures stdout/stderr and enforces a timeout;
///   a timed-out child is killed.
/// - [`CommandRunner::run_attached`] inherits the terminal so progress bars
///   reach the operator, and turns Ctrl-C into [`FetchError::Interrupted`]
///   instead of letting the signal take the whole console down.
/// - [`CommandRunner::spawn_detached`] starts a long-lived process (the
///   daemon itself) and returns immediately.
///
/// Non-zero exit status is always an error; stderr is carried in the error
/// so callers can log it.
#[derive(Debug, Clone)]
pub struct CommandRunner {
    program: String,
}

impl Default for CommandRunner {
    fn default() -> Self {
        Self::new("ollama")
    }
}

impl CommandRunner {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn describe(&self, args: &[&str]) -> String {
        let mut parts = vec![self.program.as_str()];
        parts.extend_from_slice(args);
        parts.join(" ")
    }

    fn spawn_error(&self, source: std::io::Error) -> FetchError {
        FetchError::Spawn {
            program: self.program.clone(),
            source,
        }
    }

    /// Run to completion with captured output and return trimmed stdout.
    pub async fn run(&self, args: &[&str], timeout: Duration) -> Result<String, FetchError> {
        let description = self.describe(args);
        let mut command = Command::new(&self.program);
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let output = match tokio::time::timeout(timeout, command.output()).await {
            Ok(result) => result.map_err(|e| self.spawn_error(e))?,
            Err(_) => {
                warn!(
                    "model_runtime::process: `{}` timed out after {:?}",
                    description, timeout
                );
                return Err(FetchError::Timeout {
                    command: description,
                    timeout,
                });
            }
        };

        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
        } else {
            Err(FetchError::Exit {
                command: description,
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            })
        }
    }

    /// Run with stdout/stderr attached to the terminal.
    pub async fn run_attached(&self, args: &[&str], timeout: Duration) -> Result<(), FetchError> {
        let description = self.describe(args);
        info!("model_runtime::process: running `{}` attached", description);

        let mut child = Command::new(&self.program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| self.spawn_error(e))?;

        let status = tokio::select! {
            status = child.wait() => status.map_err(|e| self.spawn_error(e))?,
            _ = tokio::signal::ctrl_c() => {
                warn!("model_runtime::process: `{}` interrupted by user", description);
                if let Err(e) = child.kill().await {
                    warn!("model_runtime::process: failed to kill `{}`: {e}", description);
                }
                return Err(FetchError::Interrupted);
            }
            _ = tokio::time::sleep(timeout) => {
                warn!(
                    "model_runtime::process: `{}` timed out after {:?}",
                    description, timeout
                );
                if let Err(e) = child.kill().await {
                    warn!("model_runtime::process: failed to kill `{}`: {e}", description);
                }
                return Err(FetchError::Timeout { command: description, timeout });
            }
        };

        if status.success() {
            Ok(())
        } else {
            Err(FetchError::Exit {
                command: description,
                code: status.code(),
                stderr: String::new(),
            })
        }
    }

    /// Start a background process and return its PID without waiting.
    ///
    /// All stdio is nulled; the child outlives this handle.
    pub fn spawn_detached(&self, args: &[&str]) -> Result<Option<u32>, FetchError> {
        info!(
            "model_runtime::process: spawning `{}` in the background",
            self.describe(args)
        );
        let child = Command::new(&self.program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| self.spawn_error(e))?;
        Ok(child.id())
    }
}

// SPDX-License-Identifier: PolyForm-Shield-1.0

use std::time::Duration;

use thiserror::Error;

/// Errors produced by the runtime and catalog adapters.
///
/// These all describe the environment (daemon down, registry unreachable,
/// process missing), never a caller mistake.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("unexpected HTTP status {status} from {url}")]
    Status { status: u16, url: String },

    #[error("failed to decode response: {0}")]
    Decode(String),

    #[error("failed to spawn `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`{command}` exited with status {code:?}: {stderr}")]
    Exit {
        command: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("`{command}` timed out after {timeout:?}")]
    Timeout { command: String, timeout: Duration },

    #[error("interrupted by user")]
    Interrupted,
}

impl FetchError {
    pub fn decode(msg: impl Into<String>) -> Self {
        Self::Decode(msg.into())
    }

    /// Whether the operator cancelled the operation.
    pub fn is_interrupted(&self) -> bool {
        matches!(self, FetchError::Interrupted)
    }
}

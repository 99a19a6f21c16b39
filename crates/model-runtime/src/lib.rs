// SPDX-License-Identifier: PolyForm-Shield-1.0

//! Adapters between the lifecycle engine and the outside world.
//!
//! Two seams, both request/response with no persistent connections:
//!
//! - [`RuntimeInspector`] wraps the local inference daemon, partly through
//!   its CLI (`ollama list|pull|rm|stop`) and partly over HTTP
//!   (`/api/tags`, `/api/ps`, `/api/generate`, `/api/show`).
//! - [`RemoteCatalog`] wraps the read-only remote model registry.
//!
//! Every failure is reported as a [`FetchError`]; deciding whether a failure
//! collapses into "nothing found" is left to the engine.

use std::time::Duration;

use async_trait::async_trait;

use protocol::{InstalledModel, QualifiedName, ResidentSet};

pub mod catalog;
pub mod error;
pub mod ollama;
pub mod process;

pub use catalog::RegistryCatalog;
pub use error::FetchError;
pub use ollama::OllamaRuntime;
pub use process::CommandRunner;

/// How a pull reports progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PullMode {
    /// output captured, bounded by the regular pull timeout.
    Silent,
    /// output attached to the terminal so the operator sees progress;
    /// Ctrl-C aborts the pull and is reported as [`FetchError::Interrupted`].
    Progress,
}

/// Timeouts applied by [`OllamaRuntime`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuntimeTimeouts {
    /// liveness and resident-set queries.
    pub probe: Duration,
    /// short CLI commands (`list`, `rm`, `stop`, `--version`).
    pub command: Duration,
    pub generate: Duration,
    pub show: Duration,
    pub pull: Duration,
    pub pull_interactive: Duration,
}

impl Default for RuntimeTimeouts {
    fn default() -> Self {
        Self {
            probe: Duration::from_secs(5),
            command: Duration::from_secs(30),
            generate: Duration::from_secs(30),
            show: Duration::from_secs(10),
            pull: Duration::from_secs(300),
            pull_interactive: Duration::from_secs(3600),
        }
    }
}

/// Trait for the local inference daemon.
#[async_trait]
pub trait RuntimeInspector: Send + Sync {
    /// Version string reported by the CLI.
    async fn version(&self) -> Result<String, FetchError>;

    /// Ok when the daemon answers its HTTP API.
    async fn ping(&self) -> Result<(), FetchError>;

    /// Artifacts in local storage. `is_resident` is always `false` here;
    /// residency comes from [`RuntimeInspector::list_resident`].
    async fn list_installed(&self) -> Result<Vec<InstalledModel>, FetchError>;

    /// Models currently loaded in memory.
    async fn list_resident(&self) -> Result<ResidentSet, FetchError>;

    async fn pull(&self, name: &QualifiedName, mode: PullMode) -> Result<(), FetchError>;

    async fn remove(&self, name: &QualifiedName) -> Result<(), FetchError>;

    /// Unload a model from memory. Stopping a model that is not loaded is
    /// a success on the daemon side.
    async fn stop(&self, name: &QualifiedName) -> Result<(), FetchError>;

    /// Run a short non-streaming generation and return the response text.
    async fn generate(
        &self,
        name: &QualifiedName,
        prompt: &str,
        num_predict: u32,
    ) -> Result<String, FetchError>;

    /// Raw model metadata.
    async fn show(&self, name: &QualifiedName) -> Result<serde_json::Value, FetchError>;

    /// Launch the daemon in the background without waiting for it.
    async fn start_service(&self) -> Result<(), FetchError>;
}

/// Trait for the remote registry of publishable models.
#[async_trait]
pub trait RemoteCatalog: Send + Sync {
    /// Every qualified name the registry publishes, in registry order.
    async fn list_published(&self) -> Result<Vec<QualifiedName>, FetchError>;
}

// SPDX-License-Identifier: PolyForm-Shield-1.0

use std::time::Duration;

use tracing::{info, warn};

use model_runtime::{FetchError, PullMode};
use protocol::QualifiedName;

use crate::error::ActivationError;
use crate::LifecycleEngine;

/// Prompt sent by the readiness probe.
pub const PROBE_PROMPT: &str = "Hello, how are you?";
/// Token budget for the readiness probe.
pub const PROBE_NUM_PREDICT: u32 = 50;

const SERVICE_POLL_INTERVAL: Duration = Duration::from_secs(1);
const SERVICE_POLL_ATTEMPTS: u32 = 10;

impl LifecycleEngine {
    /// Make the model configured under `key` resident and verify it answers.
    ///
    /// Steps, in order:
    /// - resolve `key` (fails with [`ActivationError::UnknownModel`] before
    ///   touching the runtime),
    /// - pull the model if it is not installed; a failed pull ends the call,
    /// - run one admission-control pass,
    /// - send a short generation request; a non-empty answer means ready.
    ///
    /// A failure after the first step may leave a completed download or an
    /// eviction behind.
    pub async fn activate(&self, key: &str) -> Result<(), ActivationError> {
        let descriptor = self
            .config
            .get_model(key)
            .ok_or_else(|| ActivationError::UnknownModel(key.to_string()))?;
        let name = &descriptor.qualified_name;

        let installed = match self.runtime.list_installed().await {
            Ok(models) => models.iter().any(|m| m.name == *name),
            Err(e) => {
                warn!("lifecycle::activation: could not list installed models, will pull: {e}");
                false
            }
        };

        if !installed {
            info!("lifecycle::activation: {} not installed; downloading", name);
            self.runtime
                .pull(name, PullMode::Silent)
                .await
                .map_err(|source| ActivationError::DownloadFailed {
                    name: name.clone(),
                    source,
                })?;
        }

        let eviction = self.ensure_capacity_respected().await;
        info!("lifecycle::activation: admission pass -> {:?}", eviction);

        self.probe(name).await
    }

    async fn probe(&self, name: &QualifiedName) -> Result<(), ActivationError> {
        info!("lifecycle::activation: probing {}", name);
        match self
            .runtime
            .generate(name, PROBE_PROMPT, PROBE_NUM_PREDICT)
            .await
        {
            Ok(text) if !text.trim().is_empty() => {
                info!("lifecycle::activation: {} is ready", name);
                Ok(())
            }
            Ok(_) => Err(ActivationError::ProbeFailed {
                name: name.clone(),
                reason: "empty response".to_string(),
            }),
            Err(e) => Err(ActivationError::ProbeFailed {
                name: name.clone(),
                reason: e.to_string(),
            }),
        }
    }

    /// Unload a model. No residency check: stopping a model that is not
    /// loaded succeeds on the runtime side.
    pub async fn deactivate(&self, name: &QualifiedName) -> Result<(), FetchError> {
        self.runtime.stop(name).await
    }

    /// Delete an installed artifact.
    pub async fn remove(&self, name: &QualifiedName) -> Result<(), FetchError> {
        self.runtime.remove(name).await
    }

    /// Metadata for `name`, or `None` when the runtime cannot provide it.
    pub async fn model_info(&self, name: &QualifiedName) -> Option<serde_json::Value> {
        match self.runtime.show(name).await {
            Ok(info) => Some(info),
            Err(e) => {
                warn!("lifecycle::activation: no metadata for {}: {e}", name);
                None
            }
        }
    }

    /// Whether the runtime CLI is installed and identifies itself.
    pub async fn runtime_installed(&self) -> bool {
        match self.runtime.version().await {
            Ok(text) => text.to_lowercase().contains("ollama version"),
            Err(_) => false,
        }
    }

    pub async fn runtime_running(&self) -> bool {
        self.runtime.ping().await.is_ok()
    }

    /// Start the daemon if it is not answering and wait for it to come up.
    pub async fn ensure_runtime_running(&self) -> bool {
        self.ensure_runtime_running_with(SERVICE_POLL_INTERVAL, SERVICE_POLL_ATTEMPTS)
            .await
    }

    pub async fn ensure_runtime_running_with(&self, interval: Duration, attempts: u32) -> bool {
        if self.runtime_running().await {
            return true;
        }

        info!("lifecycle::activation: runtime not answering; starting it");
        if let Err(e) = self.runtime.start_service().await {
            warn!("lifecycle::activation: failed to start runtime: {e}");
            return false;
        }

        for _ in 0..attempts {
            tokio::time::sleep(interval).await;
            if self.runtime_running().await {
                info!("lifecycle::activation: runtime is up");
                return true;
            }
        }

        warn!(
            "lifecycle::activation: runtime still not answering after {} attempt(s)",
            attempts
        );
        false
    }
}

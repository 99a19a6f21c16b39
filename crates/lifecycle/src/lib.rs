// SPDX-License-Identifier: PolyForm-Shield-1.0

//! Model lifecycle and update reconciliation.
//!
//! [`LifecycleEngine`] decides which models may be resident at once, brings
//! models up behind a readiness probe, and swaps installed models for newer
//! registry versions. It owns no state of its own beyond the configuration
//! snapshot: the resident and installed sets are re-read from the runtime on
//! every operation, so the engine cannot drift from the daemon.
//!
//! Operations are meant to be awaited one at a time by a single caller.
//! There is no internal locking and no background reconciliation.

use std::sync::Arc;

use config::StackConfig;
use model_runtime::{RemoteCatalog, RuntimeInspector};

pub mod activation;
pub mod admission;
pub mod error;
pub mod status;
pub mod updates;

#[cfg(test)]
mod fakes;

pub use admission::{pick_eviction_candidate, Eviction};
pub use error::ActivationError;
pub use updates::{reconcile_updates, UpdateOutcome};

/// The engine, wired to a configuration snapshot and two adapters.
///
/// Cloning is cheap; clones share the same adapters.
#[derive(Clone)]
pub struct LifecycleEngine {
    config: Arc<StackConfig>,
    runtime: Arc<dyn RuntimeInspector>,
    catalog: Arc<dyn RemoteCatalog>,
}

impl LifecycleEngine {
    pub fn new(
        config: StackConfig,
        runtime: Arc<dyn RuntimeInspector>,
        catalog: Arc<dyn RemoteCatalog>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            runtime,
            catalog,
        }
    }

    pub fn config(&self) -> &StackConfig {
        &self.config
    }
}

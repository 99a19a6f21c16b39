// SPDX-License-Identifier: PolyForm-Shield-1.0

use std::collections::BTreeMap;

use tracing::warn;

use model_runtime::FetchError;
use protocol::{CapacityEstimate, InstalledModel, ResidentSet, StatusSummary};

use crate::LifecycleEngine;

impl LifecycleEngine {
    /// Memory estimate for a given resident count. Not telemetry.
    pub fn capacity_estimate(&self, loaded: usize) -> CapacityEstimate {
        let memory = self.config.memory;
        CapacityEstimate {
            loaded,
            max_loaded: self.config.max_loaded(),
            used_gb: (loaded as u32).saturating_mul(memory.per_model_gb),
            total_gb: memory.total_gb,
        }
    }

    /// Installed models, each marked with whether it is currently resident.
    /// A resident set that cannot be read marks nothing resident.
    pub async fn installed_models(&self) -> Result<Vec<InstalledModel>, FetchError> {
        let mut installed = self.runtime.list_installed().await?;
        let resident = self.runtime.list_resident().await.unwrap_or_default();
        mark_resident(&mut installed, &resident);
        Ok(installed)
    }

    /// Composite snapshot: liveness, installed and resident sets, pending
    /// updates and the capacity estimate.
    ///
    /// Each adapter is asked once. Any fact that cannot be fetched shows up
    /// empty rather than failing the whole summary.
    pub async fn status_summary(&self) -> StatusSummary {
        let runtime_running = self.runtime.ping().await.is_ok();

        let mut installed = self.runtime.list_installed().await.unwrap_or_else(|e| {
            warn!("lifecycle::status: could not list installed models: {e}");
            Vec::new()
        });

        let resident = self.runtime.list_resident().await.unwrap_or_else(|e| {
            warn!("lifecycle::status: could not read resident set: {e}");
            ResidentSet::default()
        });
        mark_resident(&mut installed, &resident);

        let available_updates = if installed.is_empty() {
            BTreeMap::new()
        } else {
            self.updates_for(&installed).await
        };

        StatusSummary {
            runtime_running,
            models_installed: installed.len(),
            models_running: resident.len(),
            running_models: resident.names(),
            installed_models: installed.iter().map(|m| m.name.to_string()).collect(),
            models_with_updates: available_updates.len(),
            available_updates,
            capacity: self.capacity_estimate(resident.len()),
        }
    }
}

fn mark_resident(installed: &mut [InstalledModel], resident: &ResidentSet) {
    for model in installed.iter_mut() {
        model.is_resident = resident.contains(model.name.as_str());
    }
}

#[cfg(test)]
mod tests {
    use crate::fakes::{descriptors, engine, Call, FakeCatalog, FakeRuntime};

    const QWEN: &str = "qwen2.5-coder:latest";

    #[tokio::test]
    async fn summary_reports_every_fact() {
        let runtime = FakeRuntime::new();
        runtime.set_installed(&[QWEN, "mistral:latest", "phi"]);
        runtime.set_resident(&[QWEN]);
        let catalog = FakeCatalog::with(&["qwen2.5-coder:7b", "mistral:latest"]);
        let engine = engine(descriptors(&[QWEN]), 2, &runtime, &catalog);

        let summary = engine.status_summary().await;
        assert!(summary.runtime_running);
        assert_eq!(summary.models_installed, 3);
        assert_eq!(summary.models_running, 1);
        assert_eq!(summary.running_models, vec![QWEN.to_string()]);
        assert_eq!(
            summary.installed_models,
            vec![QWEN.to_string(), "mistral:latest".to_string(), "phi".to_string()]
        );
        assert_eq!(summary.models_with_updates, 1);
        assert_eq!(summary.available_updates[QWEN].latest.as_str(), "qwen2.5-coder:7b");
        assert_eq!(summary.capacity.used_label(), "~5GB");
        assert_eq!(summary.capacity.total_label(), "8GB");
    }

    #[tokio::test]
    async fn summary_asks_each_adapter_once() {
        let runtime = FakeRuntime::new();
        runtime.set_installed(&[QWEN]);
        let catalog = FakeCatalog::with(&["qwen2.5-coder:7b"]);
        let engine = engine(Vec::new(), 2, &runtime, &catalog);

        engine.status_summary().await;
        assert_eq!(
            runtime.calls(),
            vec![Call::Ping, Call::ListInstalled, Call::ListResident]
        );
        assert_eq!(catalog.calls(), 1);
    }

    #[tokio::test]
    async fn summary_survives_a_dead_runtime() {
        let runtime = FakeRuntime::new();
        runtime.set_running(false);
        runtime.fail_installed(true);
        runtime.fail_resident(true);
        let engine = engine(Vec::new(), 2, &runtime, &FakeCatalog::unreachable());

        let summary = engine.status_summary().await;
        assert!(!summary.runtime_running);
        assert_eq!(summary.models_installed, 0);
        assert_eq!(summary.models_running, 0);
        assert!(summary.available_updates.is_empty());
        assert_eq!(summary.capacity.used_label(), "~0GB");
    }

    #[tokio::test]
    async fn capacity_scales_with_resident_count() {
        let runtime = FakeRuntime::new();
        let engine = engine(Vec::new(), 2, &runtime, &FakeCatalog::empty());

        let estimate = engine.capacity_estimate(3);
        assert_eq!(estimate.used_label(), "~15GB");
        assert!(estimate.over_ceiling());
        assert!(!engine.capacity_estimate(2).over_ceiling());
    }

    #[tokio::test]
    async fn installed_models_are_marked_resident() {
        let runtime = FakeRuntime::new();
        runtime.set_installed(&["a:1", "b:1"]);
        runtime.set_resident(&["b:1"]);
        let engine = engine(Vec::new(), 2, &runtime, &FakeCatalog::empty());

        let models = engine.installed_models().await.unwrap();
        let flags: Vec<(String, bool)> = models
            .into_iter()
            .map(|m| (m.name.to_string(), m.is_resident))
            .collect();
        assert_eq!(
            flags,
            vec![("a:1".to_string(), false), ("b:1".to_string(), true)]
        );
    }
}

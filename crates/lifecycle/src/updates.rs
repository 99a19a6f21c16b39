// SPDX-License-Identifier: PolyForm-Shield-1.0

//! Update detection and application.
//!
//! "Newer" means textually different: the registry entry for a base name is
//! compared to the installed qualified name by identity only. A registry
//! entry older than the pinned tag is still offered as an update.

use std::collections::{BTreeMap, HashMap};

use tracing::{info, warn};

use model_runtime::{FetchError, PullMode};
use protocol::{BulkReport, InstalledModel, QualifiedName, UpdateCandidate};

use crate::LifecycleEngine;

/// Result of [`LifecycleEngine::apply_update_if_available`].
///
/// Keeps "nothing to do" apart from "tried and failed".
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateOutcome {
    UpToDate,
    Updated {
        from: QualifiedName,
        to: QualifiedName,
    },
    Failed {
        from: QualifiedName,
        to: QualifiedName,
        reason: String,
    },
    /// the operator pressed Ctrl-C during the download.
    Interrupted {
        from: QualifiedName,
        to: QualifiedName,
    },
}

impl UpdateOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, UpdateOutcome::UpToDate | UpdateOutcome::Updated { .. })
    }
}

/// Pair installed models with registry entries sharing their base name.
///
/// Untagged names on either side are ignored. When the registry lists the
/// same base more than once, the last entry wins.
pub fn reconcile_updates(
    installed: &[InstalledModel],
    published: &[QualifiedName],
) -> BTreeMap<String, UpdateCandidate> {
    let latest_by_base: HashMap<&str, &QualifiedName> = published
        .iter()
        .filter(|name| name.is_tagged())
        .map(|name| (name.base(), name))
        .collect();

    installed
        .iter()
        .filter(|m| m.name.is_tagged())
        .filter_map(|m| {
            let latest = latest_by_base.get(m.name.base())?;
            UpdateCandidate::between(&m.name, latest)
        })
        .map(|candidate| (candidate.current.to_string(), candidate))
        .collect()
}

impl LifecycleEngine {
    /// Installed models with a differently named registry entry, keyed by
    /// the installed qualified name.
    ///
    /// Fails open: if either the installed listing or the registry cannot
    /// be read, the result is empty.
    pub async fn detect_updates(&self) -> BTreeMap<String, UpdateCandidate> {
        let installed = match self.runtime.list_installed().await {
            Ok(installed) => installed,
            Err(e) => {
                warn!("lifecycle::updates: could not list installed models: {e}");
                return BTreeMap::new();
            }
        };
        if installed.is_empty() {
            return BTreeMap::new();
        }
        self.updates_for(&installed).await
    }

    /// Registry half of detection, over an installed list the caller
    /// already holds.
    pub(crate) async fn updates_for(
        &self,
        installed: &[InstalledModel],
    ) -> BTreeMap<String, UpdateCandidate> {
        match self.catalog.list_published().await {
            Ok(published) => reconcile_updates(installed, &published),
            Err(e) => {
                warn!("lifecycle::updates: registry unavailable, assuming no updates: {e}");
                BTreeMap::new()
            }
        }
    }

    /// Replace `installed` with its newer registry version, if there is one.
    ///
    /// Detection is re-run first. A resident model is stopped before the
    /// pull; that stop is best effort and its failure does not abort the
    /// update. The new version is downloaded with progress attached to the
    /// terminal and is not probed afterwards.
    pub async fn apply_update_if_available(&self, installed: &str) -> UpdateOutcome {
        let updates = self.detect_updates().await;
        let Some(candidate) = updates.get(installed) else {
            info!("lifecycle::updates: {} is up to date", installed);
            return UpdateOutcome::UpToDate;
        };
        let UpdateCandidate { current, latest, .. } = candidate.clone();

        info!("lifecycle::updates: updating {} -> {}", current, latest);

        match self.runtime.list_resident().await {
            Ok(resident) if resident.contains(current.as_str()) => {
                if let Err(e) = self.runtime.stop(&current).await {
                    warn!("lifecycle::updates: failed to stop {} before update: {e}", current);
                }
            }
            Ok(_) => {}
            Err(e) => {
                warn!("lifecycle::updates: could not read resident set before update: {e}");
            }
        }

        match self.runtime.pull(&latest, PullMode::Progress).await {
            Ok(()) => {
                info!("lifecycle::updates: {} updated to {}", current, latest);
                UpdateOutcome::Updated {
                    from: current,
                    to: latest,
                }
            }
            Err(e) if e.is_interrupted() => {
                info!("lifecycle::updates: update of {} cancelled", current);
                UpdateOutcome::Interrupted {
                    from: current,
                    to: latest,
                }
            }
            Err(e) => {
                warn!("lifecycle::updates: pull of {} failed: {e}", latest);
                UpdateOutcome::Failed {
                    from: current,
                    to: latest,
                    reason: e.to_string(),
                }
            }
        }
    }

    /// Apply every pending update, one model at a time.
    ///
    /// Each item re-runs detection, so a model that became current in the
    /// meantime counts as a success. An interrupt ends the run; later items
    /// are reported as not attempted.
    pub async fn apply_all_updates(&self) -> BulkReport {
        let pending = self.detect_updates().await;
        let mut report = BulkReport::default();

        let mut names = pending.keys();
        while let Some(name) = names.next() {
            match self.apply_update_if_available(name).await {
                UpdateOutcome::Failed { reason, .. } => report.record_failure(name.as_str(), reason),
                UpdateOutcome::Interrupted { .. } => {
                    report.record_failure(name.as_str(), FetchError::Interrupted.to_string());
                    for rest in names.by_ref() {
                        report.record_not_attempted(rest.as_str());
                    }
                    break;
                }
                UpdateOutcome::UpToDate | UpdateOutcome::Updated { .. } => report.record_success(),
            }
        }

        info!("lifecycle::updates: bulk update finished, {}", report);
        report
    }

    /// Download every configured model, in catalog order. Already installed
    /// models are pulled again, which refreshes them in place. An interrupt
    /// ends the run.
    pub async fn pull_all_configured(&self) -> BulkReport {
        let mut report = BulkReport::default();

        let mut models = self.config.list_models().iter();
        while let Some(model) = models.next() {
            let name = &model.qualified_name;
            match self.runtime.pull(name, PullMode::Progress).await {
                Ok(()) => report.record_success(),
                Err(e) if e.is_interrupted() => {
                    info!("lifecycle::updates: refresh cancelled at {}", name);
                    report.record_failure(name.as_str(), e.to_string());
                    for rest in models.by_ref() {
                        report.record_not_attempted(rest.qualified_name.as_str());
                    }
                    break;
                }
                Err(e) => {
                    warn!("lifecycle::updates: pull of {} failed: {e}", name);
                    report.record_failure(name.as_str(), e.to_string());
                }
            }
        }

        info!("lifecycle::updates: refresh finished, {}", report);
        report
    }
}

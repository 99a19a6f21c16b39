// SPDX-License-Identifier: PolyForm-Shield-1.0

//! Capacity ceiling enforcement.
//!
//! Each call frees at most one slot. Draining down to the ceiling in one go
//! would act repeatedly on a single, possibly stale, read of the resident
//! set; callers that need the ceiling restored call again and re-read.

use tracing::{info, warn};

use protocol::{ModelDescriptor, QualifiedName, ResidentSet};

use crate::LifecycleEngine;

/// What a single admission-control pass did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Eviction {
    /// resident count is at or below the ceiling.
    WithinCapacity,
    /// over the ceiling, but no resident model sits in the low-priority
    /// tail of the catalog. Models loaded outside the catalog are never
    /// reclaimed here.
    NoEligibleCandidate,
    /// the resident set could not be read; nothing was stopped.
    ResidentSetUnavailable,
    Stopped(QualifiedName),
    /// a stop was issued for this model but the runtime refused it.
    StopFailed(QualifiedName),
}

/// Choose the model to evict, if any.
///
/// `by_priority` is the configured catalog, highest priority first. Only
/// models at index `max_loaded` or later are eligible, and among those the
/// first one in resident-set order wins.
pub fn pick_eviction_candidate<'a>(
    resident: &'a ResidentSet,
    by_priority: &[ModelDescriptor],
    max_loaded: u32,
) -> Option<&'a QualifiedName> {
    if resident.len() <= max_loaded as usize {
        return None;
    }

    let low_priority: Vec<&str> = by_priority
        .iter()
        .skip(max_loaded as usize)
        .map(|m| m.qualified_name.as_str())
        .collect();

    resident
        .iter()
        .find(|name| low_priority.contains(&name.as_str()))
}

impl LifecycleEngine {
    /// Stop at most one low-priority resident model when the resident set
    /// exceeds the configured ceiling.
    ///
    /// Never fails: stop errors are reported through the returned
    /// [`Eviction`] and logged.
    pub async fn ensure_capacity_respected(&self) -> Eviction {
        let resident = match self.runtime.list_resident().await {
            Ok(resident) => resident,
            Err(e) => {
                warn!("lifecycle::admission: could not read resident set: {e}");
                return Eviction::ResidentSetUnavailable;
            }
        };

        let max_loaded = self.config.max_loaded();
        if resident.len() <= max_loaded as usize {
            return Eviction::WithinCapacity;
        }

        warn!(
            "lifecycle::admission: {} models resident, ceiling is {}",
            resident.len(),
            max_loaded
        );

        let Some(victim) =
            pick_eviction_candidate(&resident, self.config.models_by_priority(), max_loaded)
        else {
            warn!(
                "lifecycle::admission: no low-priority resident model to evict; resident={:?}",
                resident.names()
            );
            return Eviction::NoEligibleCandidate;
        };

        let victim = victim.clone();
        info!("lifecycle::admission: evicting {}", victim);
        match self.runtime.stop(&victim).await {
            Ok(()) => Eviction::Stopped(victim),
            Err(e) => {
                warn!("lifecycle::admission: failed to stop {}: {e}", victim);
                Eviction::StopFailed(victim)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::{descriptors, engine, Call, FakeCatalog, FakeRuntime};

    fn resident(names: &[&str]) -> ResidentSet {
        names.iter().map(|n| QualifiedName::parse(*n)).collect()
    }

    #[test]
    fn picks_first_resident_from_low_priority_tail() {
        let catalog = descriptors(&["a", "b", "c", "d"]);
        let set = resident(&["a", "b", "c"]);
        let picked = pick_eviction_candidate(&set, &catalog, 2).unwrap();
        assert_eq!(picked.as_str(), "c");
    }

    #[test]
    fn resident_order_breaks_ties_within_the_tail() {
        let catalog = descriptors(&["a", "b", "c", "d"]);
        let set = resident(&["d", "a", "c"]);
        let picked = pick_eviction_candidate(&set, &catalog, 2).unwrap();
        assert_eq!(picked.as_str(), "d");
    }

    #[test]
    fn nothing_picked_at_or_below_ceiling() {
        let catalog = descriptors(&["a", "b", "c"]);
        assert!(pick_eviction_candidate(&resident(&["c", "b"]), &catalog, 2).is_none());
    }

    #[tokio::test]
    async fn stop_count_matches_occupancy_for_every_ceiling() {
        for max_loaded in 1u32..=4 {
            let names: Vec<String> = (0..max_loaded + 3).map(|i| format!("m{i}:latest")).collect();
            let keys: Vec<&str> = names.iter().map(String::as_str).collect();

            for count in 0..=(max_loaded + 1) {
                let runtime = FakeRuntime::new();
                runtime.set_resident(&keys[..count as usize]);
                let engine = engine(descriptors(&keys), max_loaded, &runtime, &FakeCatalog::empty());

                let outcome = engine.ensure_capacity_respected().await;
                let stops = runtime.stops();
                if count <= max_loaded {
                    assert_eq!(outcome, Eviction::WithinCapacity);
                    assert!(stops.is_empty(), "N={max_loaded} R={count}");
                } else {
                    assert_eq!(stops.len(), 1, "N={max_loaded} R={count}");
                    assert_eq!(stops[0], names[max_loaded as usize]);
                }
            }
        }
    }

    #[tokio::test]
    async fn evicts_only_the_low_priority_model() {
        let runtime = FakeRuntime::new();
        runtime.set_resident(&["a", "b", "c"]);
        let engine = engine(
            descriptors(&["a", "b", "c", "d"]),
            2,
            &runtime,
            &FakeCatalog::empty(),
        );

        let outcome = engine.ensure_capacity_respected().await;
        assert_eq!(outcome, Eviction::Stopped(QualifiedName::parse("c")));
        assert_eq!(runtime.stops(), vec!["c".to_string()]);
    }

    #[tokio::test]
    async fn frees_one_slot_per_call_even_when_far_over() {
        let runtime = FakeRuntime::new();
        runtime.set_resident(&["a", "b", "c", "d", "e"]);
        let engine = engine(
            descriptors(&["a", "b", "c", "d", "e"]),
            1,
            &runtime,
            &FakeCatalog::empty(),
        );

        engine.ensure_capacity_respected().await;
        assert_eq!(runtime.stops(), vec!["b".to_string()]);

        engine.ensure_capacity_respected().await;
        assert_eq!(runtime.stops(), vec!["b".to_string(), "c".to_string()]);
    }

    #[tokio::test]
    async fn unmanaged_resident_models_are_never_evicted() {
        let runtime = FakeRuntime::new();
        runtime.set_resident(&["a", "stray:1", "other:2"]);
        let engine = engine(descriptors(&["a", "b", "c"]), 1, &runtime, &FakeCatalog::empty());

        let outcome = engine.ensure_capacity_respected().await;
        assert_eq!(outcome, Eviction::NoEligibleCandidate);
        assert!(runtime.stops().is_empty());
    }

    #[tokio::test]
    async fn unreadable_resident_set_stops_nothing() {
        let runtime = FakeRuntime::new();
        runtime.fail_resident(true);
        let engine = engine(descriptors(&["a"]), 1, &runtime, &FakeCatalog::empty());

        assert_eq!(
            engine.ensure_capacity_respected().await,
            Eviction::ResidentSetUnavailable
        );
        assert!(!runtime.calls().iter().any(|c| matches!(c, Call::Stop(_))));
    }

    #[tokio::test]
    async fn stop_failure_is_reported_not_raised() {
        let runtime = FakeRuntime::new();
        runtime.set_resident(&["a", "b"]);
        runtime.fail_stops(true);
        let engine = engine(descriptors(&["a", "b"]), 1, &runtime, &FakeCatalog::empty());

        assert_eq!(
            engine.ensure_capacity_respected().await,
            Eviction::StopFailed(QualifiedName::parse("b"))
        );
    }
}

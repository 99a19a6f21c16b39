// SPDX-License-Identifier: PolyForm-Shield-1.0

//! Value types shared between the configuration store, the runtime adapters
//! and the lifecycle engine.
//!
//! Everything in here is plain data. Nothing is cached across engine
//! operations; these values are rebuilt from adapter responses every time.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// runtime identifier of a model artifact, e.g. `qwen2.5-coder:latest`.
///
/// The `base:tag` structure is parsed once, at the boundary where the string
/// enters the system, so call sites never split on `:` themselves. Equality
/// and hashing are defined on the full textual name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct QualifiedName {
    raw: String,
    base: String,
    tag: Option<String>,
}

impl QualifiedName {
    pub fn parse(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        let (base, tag) = match raw.split_once(':') {
            Some((base, tag)) => (base.to_string(), Some(tag.to_string())),
            None => (raw.clone(), None),
        };
        Self { raw, base, tag }
    }

    /// Full name as understood by the runtime.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Everything before the first `:`, or the whole name when untagged.
    pub fn base(&self) -> &str {
        &self.base
    }

    pub fn tag(&self) -> Option<&str> {
        self.tag.as_deref()
    }

    /// Whether the name carries a `base:tag` separator at all.
    pub fn is_tagged(&self) -> bool {
        self.tag.is_some()
    }
}

impl From<String> for QualifiedName {
    fn from(raw: String) -> Self {
        Self::parse(raw)
    }
}

impl From<&str> for QualifiedName {
    fn from(raw: &str) -> Self {
        Self::parse(raw)
    }
}

impl From<QualifiedName> for String {
    fn from(name: QualifiedName) -> Self {
        name.raw
    }
}

impl fmt::Display for QualifiedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&self.raw)
    }
}

/// a configured, addressable model.
///
/// Built once when the configuration is loaded and never mutated afterwards.
/// `max_context` and `temperature` are passed through untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelDescriptor {
    /// logical key used by the operator, e.g. `qwen`.
    pub key: String,
    /// name handed to the runtime.
    pub qualified_name: QualifiedName,
    pub description: String,
    pub max_context: Option<u32>,
    pub temperature: Option<f32>,
}

/// a model artifact present in local storage, as reported by the runtime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstalledModel {
    pub name: QualifiedName,
    /// human readable size, e.g. `4.7 GB`.
    pub size: String,
    /// human readable memory footprint when loaded; `unknown` when the
    /// listing does not report it.
    pub vram_footprint: String,
    pub content_digest: String,
    pub is_resident: bool,
}

/// names currently loaded into the runtime's memory, in the order the
/// runtime reported them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResidentSet(Vec<QualifiedName>);

impl ResidentSet {
    pub fn new(names: Vec<QualifiedName>) -> Self {
        Self(names)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.iter().any(|n| n.as_str() == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &QualifiedName> {
        self.0.iter()
    }

    pub fn names(&self) -> Vec<String> {
        self.0.iter().map(|n| n.as_str().to_string()).collect()
    }
}

impl FromIterator<QualifiedName> for ResidentSet {
    fn from_iter<I: IntoIterator<Item = QualifiedName>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// a pending upgrade for one installed model.
///
/// The engine builds these with [`UpdateCandidate::between`], which refuses
/// identical names and names with different bases. Fields stay public for
/// rendering and serde; a hand-built or deserialized value is not checked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateCandidate {
    pub current: QualifiedName,
    pub latest: QualifiedName,
    pub base_name: String,
}

impl UpdateCandidate {
    pub fn between(current: &QualifiedName, latest: &QualifiedName) -> Option<Self> {
        if current == latest || current.base() != latest.base() {
            return None;
        }
        Some(Self {
            current: current.clone(),
            latest: latest.clone(),
            base_name: current.base().to_string(),
        })
    }
}

/// count-based estimate of runtime memory usage.
///
/// This is not telemetry: it multiplies the resident count by a fixed
/// per-model figure from the configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapacityEstimate {
    pub loaded: usize,
    pub max_loaded: u32,
    pub used_gb: u32,
    pub total_gb: u32,
}

impl CapacityEstimate {
    /// e.g. `~10GB`
    pub fn used_label(&self) -> String {
        format!("~{}GB", self.used_gb)
    }

    /// e.g. `8GB`
    pub fn total_label(&self) -> String {
        format!("{}GB", self.total_gb)
    }

    pub fn over_ceiling(&self) -> bool {
        self.loaded > self.max_loaded as usize
    }
}

/// best-effort composite snapshot of the runtime.
///
/// The individual facts come from separate adapter calls and may describe
/// slightly different instants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusSummary {
    pub runtime_running: bool,
    pub models_installed: usize,
    pub models_running: usize,
    pub running_models: Vec<String>,
    pub installed_models: Vec<String>,
    pub models_with_updates: usize,
    pub available_updates: BTreeMap<String, UpdateCandidate>,
    pub capacity: CapacityEstimate,
}

/// one item that failed inside a bulk operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkFailure {
    pub name: String,
    pub reason: String,
}

/// per-item accounting for operations over several models.
///
/// A failing item never stops the remaining ones from being attempted. An
/// operator interrupt does: items left after it are listed in
/// `not_attempted`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkReport {
    pub attempted: usize,
    pub succeeded: usize,
    pub failures: Vec<BulkFailure>,
    #[serde(default)]
    pub not_attempted: Vec<String>,
}

impl BulkReport {
    pub fn record_success(&mut self) {
        self.attempted += 1;
        self.succeeded += 1;
    }

    pub fn record_failure(&mut self, name: impl Into<String>, reason: impl Into<String>) {
        self.attempted += 1;
        self.failures.push(BulkFailure {
            name: name.into(),
            reason: reason.into(),
        });
    }

    pub fn record_not_attempted(&mut self, name: impl Into<String>) {
        self.not_attempted.push(name.into());
    }

    pub fn all_succeeded(&self) -> bool {
        self.failures.is_empty() && self.not_attempted.is_empty()
    }
}

impl fmt::Display for BulkReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} of {} succeeded", self.succeeded, self.attempted)?;
        if !self.not_attempted.is_empty() {
            write!(f, ", {} not attempted", self.not_attempted.len())?;
        }
        Ok(())
    }
}

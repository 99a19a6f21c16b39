// SPDX-License-Identifier: PolyForm-Shield-1.0

//! In-memory adapters for engine tests.
//!
//! `FakeRuntime` behaves like a tiny daemon: pulls install, stops unload,
//! and every call is recorded so tests can assert on side effects.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use config::StackConfig;
use model_runtime::{FetchError, PullMode, RemoteCatalog, RuntimeInspector};
use protocol::{InstalledModel, ModelDescriptor, QualifiedName, ResidentSet};

use crate::LifecycleEngine;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Version,
    Ping,
    ListInstalled,
    ListResident,
    Pull(String, PullMode),
    Remove(String),
    Stop(String),
    Generate(String),
    Show(String),
    StartService,
}

#[derive(Debug, Default)]
struct RuntimeState {
    installed: Vec<String>,
    resident: Vec<String>,
    calls: Vec<Call>,
    running: bool,
    starts_on_demand: bool,
    version: Option<String>,
    probe_response: Option<String>,
    failing_pulls: HashSet<String>,
    interrupted_pulls: HashSet<String>,
    fail_installed: bool,
    fail_resident: bool,
    fail_stops: bool,
}

pub struct FakeRuntime {
    state: Mutex<RuntimeState>,
}

fn refused(what: &str) -> FetchError {
    FetchError::Status {
        status: 500,
        url: format!("fake://{what}"),
    }
}

impl FakeRuntime {
    /// A running daemon with nothing installed whose probe answers "ok".
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(RuntimeState {
                running: true,
                version: Some("ollama version is 0.5.7".to_string()),
                probe_response: Some("ok".to_string()),
                ..RuntimeState::default()
            }),
        })
    }

    fn with<T>(&self, f: impl FnOnce(&mut RuntimeState) -> T) -> T {
        let mut state = self.state.lock().unwrap();
        f(&mut state)
    }

    pub fn set_installed(&self, names: &[&str]) {
        self.with(|s| s.installed = names.iter().map(|n| n.to_string()).collect());
    }

    pub fn set_resident(&self, names: &[&str]) {
        self.with(|s| s.resident = names.iter().map(|n| n.to_string()).collect());
    }

    pub fn set_running(&self, running: bool) {
        self.with(|s| s.running = running);
    }

    pub fn starts_on_demand(&self, yes: bool) {
        self.with(|s| s.starts_on_demand = yes);
    }

    pub fn set_version(&self, version: Option<&str>) {
        self.with(|s| s.version = version.map(str::to_string));
    }

    /// `None` makes the probe fail at the transport level.
    pub fn set_probe_response(&self, response: Option<&str>) {
        self.with(|s| s.probe_response = response.map(str::to_string));
    }

    pub fn fail_pull_of(&self, name: &str) {
        self.with(|s| s.failing_pulls.insert(name.to_string()));
    }

    /// The pull of `name` behaves as if the operator pressed Ctrl-C.
    pub fn interrupt_pull_of(&self, name: &str) {
        self.with(|s| s.interrupted_pulls.insert(name.to_string()));
    }

    pub fn fail_installed(&self, fail: bool) {
        self.with(|s| s.fail_installed = fail);
    }

    pub fn fail_resident(&self, fail: bool) {
        self.with(|s| s.fail_resident = fail);
    }

    pub fn fail_stops(&self, fail: bool) {
        self.with(|s| s.fail_stops = fail);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.with(|s| s.calls.clone())
    }

    pub fn stops(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Stop(name) => Some(name),
                _ => None,
            })
            .collect()
    }

    pub fn pulls(&self) -> Vec<(String, PullMode)> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Pull(name, mode) => Some((name, mode)),
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, call: &Call) -> usize {
        self.calls().iter().filter(|c| *c == call).count()
    }
}

#[async_trait]
impl RuntimeInspector for FakeRuntime {
    async fn version(&self) -> Result<String, FetchError> {
        self.with(|s| {
            s.calls.push(Call::Version);
            s.version.clone().ok_or_else(|| refused("version"))
        })
    }

    async fn ping(&self) -> Result<(), FetchError> {
        self.with(|s| {
            s.calls.push(Call::Ping);
            if s.running {
                Ok(())
            } else {
                Err(refused("ping"))
            }
        })
    }

    async fn list_installed(&self) -> Result<Vec<InstalledModel>, FetchError> {
        self.with(|s| {
            s.calls.push(Call::ListInstalled);
            if s.fail_installed {
                return Err(refused("list"));
            }
            Ok(s.installed
                .iter()
                .map(|name| InstalledModel {
                    name: QualifiedName::parse(name.as_str()),
                    size: "4.7 GB".to_string(),
                    vram_footprint: "unknown".to_string(),
                    content_digest: format!("digest-{name}"),
                    is_resident: false,
                })
                .collect())
        })
    }

    async fn list_resident(&self) -> Result<ResidentSet, FetchError> {
        self.with(|s| {
            s.calls.push(Call::ListResident);
            if s.fail_resident {
                return Err(refused("ps"));
            }
            Ok(s.resident
                .iter()
                .map(|n| QualifiedName::parse(n.as_str()))
                .collect())
        })
    }

    async fn pull(&self, name: &QualifiedName, mode: PullMode) -> Result<(), FetchError> {
        self.with(|s| {
            s.calls.push(Call::Pull(name.to_string(), mode));
            if s.interrupted_pulls.contains(name.as_str()) {
                return Err(FetchError::Interrupted);
            }
            if s.failing_pulls.contains(name.as_str()) {
                return Err(refused("pull"));
            }
            if !s.installed.iter().any(|n| n == name.as_str()) {
                s.installed.push(name.to_string());
            }
            Ok(())
        })
    }

    async fn remove(&self, name: &QualifiedName) -> Result<(), FetchError> {
        self.with(|s| {
            s.calls.push(Call::Remove(name.to_string()));
            let before = s.installed.len();
            s.installed.retain(|n| n != name.as_str());
            if s.installed.len() == before {
                Err(refused("rm"))
            } else {
                Ok(())
            }
        })
    }

    async fn stop(&self, name: &QualifiedName) -> Result<(), FetchError> {
        self.with(|s| {
            s.calls.push(Call::Stop(name.to_string()));
            if s.fail_stops {
                return Err(refused("stop"));
            }
            s.resident.retain(|n| n != name.as_str());
            Ok(())
        })
    }

    async fn generate(
        &self,
        name: &QualifiedName,
        _prompt: &str,
        _num_predict: u32,
    ) -> Result<String, FetchError> {
        self.with(|s| {
            s.calls.push(Call::Generate(name.to_string()));
            let response = s.probe_response.clone().ok_or_else(|| refused("generate"))?;
            if !response.trim().is_empty() && !s.resident.iter().any(|n| n == name.as_str()) {
                s.resident.push(name.to_string());
            }
            Ok(response)
        })
    }

    async fn show(&self, name: &QualifiedName) -> Result<serde_json::Value, FetchError> {
        self.with(|s| {
            s.calls.push(Call::Show(name.to_string()));
            if s.installed.iter().any(|n| n == name.as_str()) {
                Ok(serde_json::json!({ "modelfile": format!("FROM {name}") }))
            } else {
                Err(refused("show"))
            }
        })
    }

    async fn start_service(&self) -> Result<(), FetchError> {
        self.with(|s| {
            s.calls.push(Call::StartService);
            if s.starts_on_demand {
                s.running = true;
                Ok(())
            } else {
                Err(refused("serve"))
            }
        })
    }
}

pub struct FakeCatalog {
    published: Mutex<Option<Vec<String>>>,
    calls: Mutex<usize>,
}

impl FakeCatalog {
    pub fn with(names: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            published: Mutex::new(Some(names.iter().map(|n| n.to_string()).collect())),
            calls: Mutex::new(0),
        })
    }

    pub fn empty() -> Arc<Self> {
        Self::with(&[])
    }

    pub fn unreachable() -> Arc<Self> {
        Arc::new(Self {
            published: Mutex::new(None),
            calls: Mutex::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        *self.calls.lock().unwrap()
    }
}

#[async_trait]
impl RemoteCatalog for FakeCatalog {
    async fn list_published(&self) -> Result<Vec<QualifiedName>, FetchError> {
        *self.calls.lock().unwrap() += 1;
        match self.published.lock().unwrap().as_ref() {
            Some(names) => Ok(names
                .iter()
                .map(|n| QualifiedName::parse(n.as_str()))
                .collect()),
            None => Err(refused("registry")),
        }
    }
}

pub fn descriptor(key: &str, name: &str) -> ModelDescriptor {
    ModelDescriptor {
        key: key.to_string(),
        qualified_name: QualifiedName::parse(name),
        description: String::new(),
        max_context: None,
        temperature: None,
    }
}

/// Descriptors whose key equals their qualified name.
pub fn descriptors(names: &[&str]) -> Vec<ModelDescriptor> {
    names.iter().map(|n| descriptor(n, n)).collect()
}

pub fn engine(
    models: Vec<ModelDescriptor>,
    max_loaded: u32,
    runtime: &Arc<FakeRuntime>,
    catalog: &Arc<FakeCatalog>,
) -> LifecycleEngine {
    LifecycleEngine::new(
        StackConfig::new(models, max_loaded),
        runtime.clone(),
        catalog.clone(),
    )
}

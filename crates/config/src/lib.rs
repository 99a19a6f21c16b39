// SPDX-License-Identifier: PolyForm-Shield-1.0

//! Configuration store for the model catalog and global policy values.
//!
//! The store is loaded once at process start and handed to the lifecycle
//! engine by value; nothing mutates it afterwards.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use directories::ProjectDirs;
use thiserror::Error;
use tracing::{info, warn};
use url::Url;

use protocol::{ModelDescriptor, QualifiedName};

mod file;
pub mod platform;

use file::{RawConfig, RawTimeouts, DEFAULT_MODELS_TOML, DEFAULT_MODELS_YAML};
pub use platform::PlatformProfile;

pub const DEFAULT_RUNTIME_ENDPOINT: &str = "http://localhost:11434";
pub const DEFAULT_REGISTRY_ENDPOINT: &str = "https://ollama.com";
pub const DEFAULT_MAX_LOADED: u32 = 2;
const DEFAULT_INACTIVE_TIMEOUT_MINUTES: u64 = 30;
const DEFAULT_MEMORY_TOTAL_GB: u32 = 8;
const DEFAULT_MEMORY_PER_MODEL_GB: u32 = 5;

/// File name looked up inside the configuration directory.
pub const MODELS_FILE: &str = "models.yml";

/// Errors callers may want to tell apart from generic I/O or parse failures.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to determine configuration directory")]
    NoConfigDir,
    #[error("unsupported configuration format for {0}; expected .yml, .yaml or .toml")]
    UnsupportedFormat(PathBuf),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    Yaml,
    Toml,
}

impl Format {
    fn for_path(path: &Path) -> Result<Self, ConfigError> {
        match path.extension().and_then(|e| e.to_str()) {
            Some("yml") | Some("yaml") => Ok(Format::Yaml),
            Some("toml") => Ok(Format::Toml),
            _ => Err(ConfigError::UnsupportedFormat(path.to_path_buf())),
        }
    }

    fn default_contents(self) -> &'static str {
        match self {
            Format::Yaml => DEFAULT_MODELS_YAML,
            Format::Toml => DEFAULT_MODELS_TOML,
        }
    }
}

/// Timeouts for the runtime and catalog adapters.
///
/// Listing and liveness calls are short so the console stays responsive;
/// pulls move large artifacts and get minutes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeoutSettings {
    pub probe: Duration,
    pub command: Duration,
    pub generate: Duration,
    pub show: Duration,
    pub catalog: Duration,
    pub pull: Duration,
    /// bound for operator-initiated pulls that show progress.
    pub pull_interactive: Duration,
}

impl Default for TimeoutSettings {
    fn default() -> Self {
        Self {
            probe: Duration::from_secs(5),
            command: Duration::from_secs(30),
            generate: Duration::from_secs(30),
            show: Duration::from_secs(10),
            catalog: Duration::from_secs(10),
            pull: Duration::from_secs(300),
            pull_interactive: Duration::from_secs(3600),
        }
    }
}

impl TimeoutSettings {
    fn from_raw(raw: &RawTimeouts) -> Self {
        let d = Self::default();
        let pick = |v: Option<u64>, fallback: Duration| v.map(Duration::from_secs).unwrap_or(fallback);
        Self {
            probe: pick(raw.probe_secs, d.probe),
            command: pick(raw.command_secs, d.command),
            generate: pick(raw.generate_secs, d.generate),
            show: pick(raw.show_secs, d.show),
            catalog: pick(raw.catalog_secs, d.catalog),
            pull: pick(raw.pull_secs, d.pull),
            pull_interactive: pick(raw.pull_interactive_secs, d.pull_interactive),
        }
    }
}

/// Figures used for the count-based memory estimate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryBudget {
    pub total_gb: u32,
    pub per_model_gb: u32,
}

/// Read-only configuration snapshot.
#[derive(Debug, Clone)]
pub struct StackConfig {
    models: Vec<ModelDescriptor>,
    runtime_endpoint: String,
    registry_endpoint: String,
    max_loaded: u32,
    max_loaded_explicit: bool,
    pub auto_stop_inactive: bool,
    pub inactive_timeout_minutes: u64,
    pub memory: MemoryBudget,
    pub timeouts: TimeoutSettings,
    platform: PlatformProfile,
    source: Option<PathBuf>,
}

impl StackConfig {
    /// Build a configuration directly from descriptors, with every other
    /// value defaulted and no host profile applied.
    pub fn new(models: Vec<ModelDescriptor>, max_loaded: u32) -> Self {
        Self {
            models,
            runtime_endpoint: DEFAULT_RUNTIME_ENDPOINT.to_string(),
            registry_endpoint: DEFAULT_REGISTRY_ENDPOINT.to_string(),
            max_loaded,
            max_loaded_explicit: true,
            auto_stop_inactive: true,
            inactive_timeout_minutes: DEFAULT_INACTIVE_TIMEOUT_MINUTES,
            memory: MemoryBudget {
                total_gb: DEFAULT_MEMORY_TOTAL_GB,
                per_model_gb: DEFAULT_MEMORY_PER_MODEL_GB,
            },
            timeouts: TimeoutSettings::default(),
            platform: PlatformProfile::resolve(Some("generic"), "", ""),
            source: None,
        }
    }

    pub fn with_runtime_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.runtime_endpoint = endpoint.into();
        self
    }

    pub fn with_registry_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.registry_endpoint = endpoint.into();
        self
    }

    /// Load the catalog from `path`, or from [`StackConfig::default_path`]
    /// when no path is given, and apply the detected host profile.
    ///
    /// A missing file is created with the default catalog.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => Self::default_path()?,
        };
        Self::load_from_file(&path, PlatformProfile::detect())
    }

    /// `./config/models.yml` when a local `config/` directory exists,
    /// otherwise `models.yml` under the platform config directory.
    pub fn default_path() -> Result<PathBuf> {
        let local = std::env::current_dir()
            .context("failed to read current directory")?
            .join("config");
        if local.is_dir() {
            return Ok(local.join(MODELS_FILE));
        }

        let dirs = ProjectDirs::from("", "", "llm-stack").ok_or(ConfigError::NoConfigDir)?;
        Ok(dirs.config_dir().join(MODELS_FILE))
    }

    pub fn load_from_file(path: &Path, platform: PlatformProfile) -> Result<Self> {
        let format = Format::for_path(path)?;

        if !path.exists() {
            warn!(
                "config: {} not found; writing default catalog",
                path.display()
            );
            write_default(path, format)?;
        }

        let data = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let mut config = Self::parse(&data, format, platform)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;
        config.source = Some(path.to_path_buf());

        info!(
            "config: loaded {} model(s) from {}",
            config.models.len(),
            path.display()
        );
        Ok(config)
    }

    pub fn from_yaml_str(data: &str, platform: PlatformProfile) -> Result<Self> {
        Self::parse(data, Format::Yaml, platform)
    }

    pub fn from_toml_str(data: &str, platform: PlatformProfile) -> Result<Self> {
        Self::parse(data, Format::Toml, platform)
    }

    fn parse(data: &str, format: Format, platform: PlatformProfile) -> Result<Self> {
        let raw: RawConfig = match format {
            Format::Yaml if data.trim().is_empty() => RawConfig::default(),
            Format::Yaml => serde_yaml::from_str(data).context("invalid YAML")?,
            Format::Toml => toml::from_str(data).context("invalid TOML")?,
        };
        Ok(Self::from_raw(raw, platform))
    }

    fn from_raw(raw: RawConfig, platform: PlatformProfile) -> Self {
        let global = raw.global;

        let models = raw
            .models
            .into_iter()
            .map(|(key, m)| ModelDescriptor {
                key,
                qualified_name: QualifiedName::parse(m.name),
                description: m.description,
                max_context: m.max_context,
                temperature: m.temperature,
            })
            .collect();

        let max_loaded_explicit = global.max_loaded_models.is_some();
        let mut max_loaded = global.max_loaded_models.unwrap_or(DEFAULT_MAX_LOADED);
        match (max_loaded_explicit, platform.max_loaded_models) {
            (false, Some(profile_max)) => {
                info!(
                    "config: detected platform {}; applying profile max_loaded_models={}",
                    platform.name, profile_max
                );
                max_loaded = profile_max;
            }
            (true, Some(_)) => {
                info!(
                    "config: detected platform {}; keeping explicit max_loaded_models={}",
                    platform.name, max_loaded
                );
            }
            _ => {}
        }

        Self {
            models,
            runtime_endpoint: global
                .ollama_host
                .unwrap_or_else(|| DEFAULT_RUNTIME_ENDPOINT.to_string()),
            registry_endpoint: global
                .registry_url
                .unwrap_or_else(|| DEFAULT_REGISTRY_ENDPOINT.to_string()),
            max_loaded,
            max_loaded_explicit,
            auto_stop_inactive: global.auto_stop_inactive.unwrap_or(true),
            inactive_timeout_minutes: global
                .inactive_timeout_minutes
                .unwrap_or(DEFAULT_INACTIVE_TIMEOUT_MINUTES),
            memory: MemoryBudget {
                total_gb: global.memory_total_gb.unwrap_or(DEFAULT_MEMORY_TOTAL_GB),
                per_model_gb: global
                    .memory_per_model_gb
                    .unwrap_or(DEFAULT_MEMORY_PER_MODEL_GB),
            },
            timeouts: TimeoutSettings::from_raw(&global.timeouts),
            platform,
            source: None,
        }
    }

    pub fn get_model(&self, key: &str) -> Option<&ModelDescriptor> {
        self.models.iter().find(|m| m.key == key)
    }

    pub fn list_models(&self) -> &[ModelDescriptor] {
        &self.models
    }

    /// Configured models, highest priority first.
    ///
    /// Priority is declaration order in the catalog file.
    pub fn models_by_priority(&self) -> &[ModelDescriptor] {
        &self.models
    }

    /// Capacity ceiling on simultaneously resident models.
    pub fn max_loaded(&self) -> u32 {
        self.max_loaded
    }

    /// Whether the ceiling came from the file rather than a default or profile.
    pub fn max_loaded_is_explicit(&self) -> bool {
        self.max_loaded_explicit
    }

    pub fn runtime_endpoint(&self) -> &str {
        &self.runtime_endpoint
    }

    pub fn registry_endpoint(&self) -> &str {
        &self.registry_endpoint
    }

    pub fn platform(&self) -> &PlatformProfile {
        &self.platform
    }

    pub fn source_path(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    /// Human-readable problems with the configuration; empty when valid.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.models.is_empty() {
            errors.push("no models configured".to_string());
        }

        for model in &self.models {
            if model.qualified_name.as_str().trim().is_empty() {
                errors.push(format!("model '{}' has no name", model.key));
            }
        }

        if self.max_loaded < 1 {
            errors.push("max_loaded_models must be at least 1".to_string());
        }

        if let Err(e) = Url::parse(&self.runtime_endpoint) {
            errors.push(format!(
                "ollama_host '{}' is not a valid URL: {e}",
                self.runtime_endpoint
            ));
        }

        if let Err(e) = Url::parse(&self.registry_endpoint) {
            errors.push(format!(
                "registry_url '{}' is not a valid URL: {e}",
                self.registry_endpoint
            ));
        }

        errors
    }
}

fn write_default(path: &Path, format: Format) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create config dir {}", parent.display()))?;
    }
    fs::write(path, format.default_contents())
        .with_context(|| format!("failed to write default config {}", path.display()))?;
    info!("config: default catalog written to {}", path.display());
    Ok(())
}

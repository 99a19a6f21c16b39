// SPDX-License-Identifier: PolyForm-Shield-1.0

//! Plain-text views of engine results. Everything here returns lines so the
//! caller decides where they go.

use std::collections::BTreeMap;

use config::StackConfig;
use protocol::{InstalledModel, ModelDescriptor, StatusSummary, UpdateCandidate};

pub fn status(summary: &StatusSummary) -> Vec<String> {
    let mut lines = vec![
        format!(
            "runtime:   {}",
            if summary.runtime_running { "running" } else { "stopped" }
        ),
        format!("installed: {}", summary.models_installed),
        format!(
            "loaded:    {} of {} ({} / {})",
            summary.models_running,
            summary.capacity.max_loaded,
            summary.capacity.used_label(),
            summary.capacity.total_label()
        ),
    ];
    for name in &summary.running_models {
        lines.push(format!("  * {name}"));
    }
    if summary.capacity.over_ceiling() {
        lines.push("warning:   resident models exceed the configured ceiling".to_string());
    }
    lines.push(format!("updates:   {}", summary.models_with_updates));
    lines.extend(updates(&summary.available_updates).into_iter().map(|l| format!("  {l}")));
    lines
}

pub fn catalog(models: &[ModelDescriptor]) -> Vec<String> {
    models
        .iter()
        .enumerate()
        .map(|(rank, m)| {
            let mut line = format!("{:>2}. {:<12} {}", rank + 1, m.key, m.qualified_name);
            if !m.description.is_empty() {
                line.push_str(&format!("  - {}", m.description));
            }
            line
        })
        .collect()
}

pub fn installed(models: &[InstalledModel]) -> Vec<String> {
    models
        .iter()
        .map(|m| {
            format!(
                "{} {:<32} {:>9}  vram {}",
                if m.is_resident { "*" } else { " " },
                m.name,
                m.size,
                m.vram_footprint
            )
        })
        .collect()
}

pub fn updates(available: &BTreeMap<String, UpdateCandidate>) -> Vec<String> {
    available
        .values()
        .map(|c| format!("{} -> {}", c.current, c.latest))
        .collect()
}

/// Effective policy values after the host profile has been applied.
pub fn config_view(config: &StackConfig) -> Vec<String> {
    let platform = config.platform();
    let mut lines = Vec::new();
    if let Some(path) = config.source_path() {
        lines.push(format!("config:        {}", path.display()));
    }
    lines.extend([
        format!("ollama host:   {}", config.runtime_endpoint()),
        format!("registry:      {}", config.registry_endpoint()),
        format!(
            "max loaded:    {}{}",
            config.max_loaded(),
            if config.max_loaded_is_explicit() { "" } else { " (platform default)" }
        ),
        format!(
            "auto-stop:     {}",
            if config.auto_stop_inactive { "on" } else { "off" }
        ),
        format!("idle timeout:  {} min", config.inactive_timeout_minutes),
        format!(
            "platform:      {}{}",
            platform.name,
            if platform.unified_memory { " (unified memory)" } else { "" }
        ),
        format!(
            "memory:        {}GB total, {}GB per model",
            config.memory.total_gb, config.memory.per_model_gb
        ),
        format!("models:        {}", config.list_models().len()),
    ]);
    lines
}

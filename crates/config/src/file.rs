// SPDX-License-Identifier: PolyForm-Shield-1.0

//! On-disk schema of the model catalog file.
//!
//! Every global key is optional; [`crate::StackConfig`] fills in defaults.
//! Keeping the raw `Option`s around lets the host profile tell an explicit
//! `max_loaded_models` apart from a defaulted one.

use std::fmt;

use serde::de::{self, Deserializer, MapAccess, Visitor};
use serde::Deserialize;

#[derive(Debug, Default, Deserialize)]
pub(crate) struct RawConfig {
    #[serde(default)]
    pub global: RawGlobal,
    #[serde(default, deserialize_with = "ordered_models")]
    pub models: Vec<(String, RawModel)>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct RawGlobal {
    pub ollama_host: Option<String>,
    pub registry_url: Option<String>,
    pub max_loaded_models: Option<u32>,
    pub auto_stop_inactive: Option<bool>,
    pub inactive_timeout_minutes: Option<u64>,
    pub memory_total_gb: Option<u32>,
    pub memory_per_model_gb: Option<u32>,
    #[serde(default)]
    pub timeouts: RawTimeouts,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct RawTimeouts {
    pub probe_secs: Option<u64>,
    pub command_secs: Option<u64>,
    pub generate_secs: Option<u64>,
    pub show_secs: Option<u64>,
    pub catalog_secs: Option<u64>,
    pub pull_secs: Option<u64>,
    pub pull_interactive_secs: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawModel {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub max_context: Option<u32>,
    pub temperature: Option<f32>,
}

/// Deserialize the `models` table as a list of entries in document order.
///
/// Declaration order is the eviction priority, so a hash map would lose
/// information here.
fn ordered_models<'de, D>(deserializer: D) -> Result<Vec<(String, RawModel)>, D::Error>
where
    D: Deserializer<'de>,
{
    struct OrderedModels;

    impl<'de> Visitor<'de> for OrderedModels {
        type Value = Vec<(String, RawModel)>;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a map of model keys to model entries")
        }

        fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
            Ok(Vec::new())
        }

        fn visit_none<E: de::Error>(self) -> Result<Self::Value, E> {
            Ok(Vec::new())
        }

        fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
        where
            A: MapAccess<'de>,
        {
            let mut entries: Vec<(String, RawModel)> =
                Vec::with_capacity(map.size_hint().unwrap_or(0));
            while let Some((key, model)) = map.next_entry::<String, RawModel>()? {
                if entries.iter().any(|(existing, _)| existing == &key) {
                    return Err(de::Error::custom(format!("duplicate model key `{key}`")));
                }
                entries.push((key, model));
            }
            Ok(entries)
        }
    }

    deserializer.deserialize_map(OrderedModels)
}

/// Catalog written when no configuration file exists yet.
pub(crate) const DEFAULT_MODELS_YAML: &str = r#"global:
  ollama_host: http://localhost:11434
  registry_url: https://ollama.com
  max_loaded_models: 2
  auto_stop_inactive: true
  inactive_timeout_minutes: 30
models:
  qwen:
    name: qwen2.5-coder:latest
    description: Code completion and programming
  deepseek:
    name: deepseek-coder:latest
    description: Technical reasoning and analysis
  mistral:
    name: mistral:latest
    description: Documentation and architecture
"#;

pub(crate) const DEFAULT_MODELS_TOML: &str = r#"[global]
ollama_host = "http://localhost:11434"
registry_url = "https://ollama.com"
max_loaded_models = 2
auto_stop_inactive = true
inactive_timeout_minutes = 30

[models.qwen]
name = "qwen2.5-coder:latest"
description = "Code completion and programming"

[models.deepseek]
name = "deepseek-coder:latest"
description = "Technical reasoning and analysis"

[models.mistral]
name = "mistral:latest"
description = "Documentation and architecture"
"#;

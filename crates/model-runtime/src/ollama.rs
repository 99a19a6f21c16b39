// SPDX-License-Identifier: PolyForm-Shield-1.0

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use protocol::{InstalledModel, QualifiedName, ResidentSet};

use crate::error::FetchError;
use crate::process::CommandRunner;
use crate::{PullMode, RuntimeInspector, RuntimeTimeouts};

const UNKNOWN: &str = "unknown";

/// Ollama-backed [`RuntimeInspector`].
///
/// Storage operations go through the `ollama` CLI; liveness, residency and
/// inference go through the daemon's HTTP API at `base_url`.
pub struct OllamaRuntime {
    base_url: String,
    client: Client,
    cli: CommandRunner,
    timeouts: RuntimeTimeouts,
}

impl OllamaRuntime {
    /// `base_url` should not include a path, e.g. `http://localhost:11434`.
    pub fn new(base_url: impl Into<String>, timeouts: RuntimeTimeouts) -> Self {
        Self::with_cli(base_url, CommandRunner::default(), timeouts)
    }

    pub fn with_cli(
        base_url: impl Into<String>,
        cli: CommandRunner,
        timeouts: RuntimeTimeouts,
    ) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            base_url,
            client: Client::new(),
            cli,
            timeouts,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get_json<T>(&self, path: &str) -> Result<T, FetchError>
    where
        T: for<'de> Deserialize<'de>,
    {
        let url = self.url(path);
        let response = self
            .client
            .get(&url)
            .timeout(self.timeouts.probe)
            .send()
            .await?;
        decode(response, url).await
    }

    async fn post_json<B, T>(
        &self,
        path: &str,
        body: &B,
        timeout: std::time::Duration,
    ) -> Result<T, FetchError>
    where
        B: Serialize + ?Sized,
        T: for<'de> Deserialize<'de>,
    {
        let url = self.url(path);
        let response = self
            .client
            .post(&url)
            .timeout(timeout)
            .json(body)
            .send()
            .await?;
        decode(response, url).await
    }
}

async fn decode<T>(response: reqwest::Response, url: String) -> Result<T, FetchError>
where
    T: for<'de> Deserialize<'de>,
{
    let status = response.status();
    if !status.is_success() {
        return Err(FetchError::Status {
            status: status.as_u16(),
            url,
        });
    }
    let bytes = response.bytes().await?;
    serde_json::from_slice(&bytes).map_err(|e| FetchError::decode(format!("{url}: {e}")))
}

#[derive(Debug, Deserialize)]
struct PsResponse {
    #[serde(default)]
    models: Vec<PsModel>,
}

#[derive(Debug, Deserialize)]
struct PsModel {
    name: String,
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Debug, Serialize)]
struct GenerateOptions {
    num_predict: u32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: String,
}

#[derive(Debug, Serialize)]
struct ShowRequest<'a> {
    name: &'a str,
}

#[async_trait]
impl RuntimeInspector for OllamaRuntime {
    async fn version(&self) -> Result<String, FetchError> {
        self.cli.run(&["--version"], self.timeouts.command).await
    }

    async fn ping(&self) -> Result<(), FetchError> {
        let url = self.url("/api/tags");
        let response = self
            .client
            .get(&url)
            .timeout(self.timeouts.probe)
            .send()
            .await?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(FetchError::Status {
                status: response.status().as_u16(),
                url,
            })
        }
    }

    async fn list_installed(&self) -> Result<Vec<InstalledModel>, FetchError> {
        let output = self.cli.run(&["list"], self.timeouts.command).await?;
        Ok(parse_installed_listing(&output))
    }

    async fn list_resident(&self) -> Result<ResidentSet, FetchError> {
        let ps: PsResponse = self.get_json("/api/ps").await?;
        Ok(ps
            .models
            .into_iter()
            .map(|m| QualifiedName::parse(m.name))
            .collect())
    }

    async fn pull(&self, name: &QualifiedName, mode: PullMode) -> Result<(), FetchError> {
        info!("model_runtime::ollama: pulling {} ({:?})", name, mode);
        let args = ["pull", name.as_str()];
        match mode {
            PullMode::Silent => self.cli.run(&args, self.timeouts.pull).await.map(|_| ()),
            PullMode::Progress => {
                self.cli
                    .run_attached(&args, self.timeouts.pull_interactive)
                    .await
            }
        }
    }

    async fn remove(&self, name: &QualifiedName) -> Result<(), FetchError> {
        info!("model_runtime::ollama: removing {}", name);
        self.cli
            .run(&["rm", name.as_str()], self.timeouts.command)
            .await
            .map(|_| ())
    }

    async fn stop(&self, name: &QualifiedName) -> Result<(), FetchError> {
        info!("model_runtime::ollama: stopping {}", name);
        self.cli
            .run(&["stop", name.as_str()], self.timeouts.command)
            .await
            .map(|_| ())
    }

    async fn generate(
        &self,
        name: &QualifiedName,
        prompt: &str,
        num_predict: u32,
    ) -> Result<String, FetchError> {
        let request = GenerateRequest {
            model: name.as_str(),
            prompt,
            stream: false,
            options: GenerateOptions { num_predict },
        };
        let response: GenerateResponse = self
            .post_json("/api/generate", &request, self.timeouts.generate)
            .await?;
        debug!(
            "model_runtime::ollama: {} answered with {} bytes",
            name,
            response.response.len()
        );
        Ok(response.response)
    }

    async fn show(&self, name: &QualifiedName) -> Result<serde_json::Value, FetchError> {
        self.post_json(
            "/api/show",
            &ShowRequest {
                name: name.as_str(),
            },
            self.timeouts.show,
        )
        .await
    }

    async fn start_service(&self) -> Result<(), FetchError> {
        let pid = self.cli.spawn_detached(&["serve"])?;
        info!("model_runtime::ollama: daemon launched, pid={:?}", pid);
        Ok(())
    }
}

/// Parse the tabular output of `ollama list`.
///
/// The first line is a header. Name and id are always the first two
/// whitespace-separated tokens, so no row with a name is dropped. Size and
/// VRAM cells may contain a space (`4.7 GB`); they are read from the
/// two-space column layout when the row has one, otherwise from the
/// single tokens after the id. The VRAM column is only present when the
/// row has five columns.
pub fn parse_installed_listing(output: &str) -> Vec<InstalledModel> {
    output
        .lines()
        .skip(1)
        .filter_map(parse_listing_row)
        .collect()
}

fn parse_listing_row(line: &str) -> Option<InstalledModel> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    let name = *tokens.first()?;
    let digest = tokens.get(1).copied().unwrap_or_default();

    let columns = split_columns(line);
    let (size, vram_footprint) =
        if columns.len() >= 3 && columns[0] == name && columns[1] == digest {
            let vram = if columns.len() >= 5 {
                columns[3].clone()
            } else {
                UNKNOWN.to_string()
            };
            (columns[2].clone(), vram)
        } else {
            (size_from_tokens(&tokens[1..]), UNKNOWN.to_string())
        };

    Some(InstalledModel {
        name: QualifiedName::parse(name),
        content_digest: digest.to_string(),
        size,
        vram_footprint,
        is_resident: false,
    })
}

/// Size from single-space tokens following the name: `[id, size, unit?, ..]`.
fn size_from_tokens(after_name: &[&str]) -> String {
    match after_name {
        [_, amount, unit, ..] if is_size_unit(unit) => format!("{amount} {unit}"),
        [_, amount, ..] => amount.to_string(),
        _ => UNKNOWN.to_string(),
    }
}

fn is_size_unit(token: &str) -> bool {
    matches!(token, "B" | "KB" | "MB" | "GB" | "TB")
}

fn split_columns(line: &str) -> Vec<String> {
    line.replace('\t', "  ")
        .split("  ")
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(str::to_string)
        .collect()
}

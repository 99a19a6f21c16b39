// SPDX-License-Identifier: PolyForm-Shield-1.0

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use protocol::QualifiedName;

use crate::error::FetchError;
use crate::RemoteCatalog;

/// HTTP client for the remote registry's `GET /api/models` listing.
pub struct RegistryCatalog {
    base_url: String,
    client: Client,
    timeout: Duration,
}

#[derive(Debug, Deserialize)]
struct CatalogEntry {
    #[serde(default)]
    name: String,
}

impl RegistryCatalog {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client: Client::new(),
            timeout,
        }
    }
}

#[async_trait]
impl RemoteCatalog for RegistryCatalog {
    async fn list_published(&self) -> Result<Vec<QualifiedName>, FetchError> {
        let url = format!("{}/api/models", self.base_url);
        let response = self
            .client
            .get(&url)
            .timeout(self.timeout)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
                url,
            });
        }

        let bytes = response.bytes().await?;
        let entries: Vec<CatalogEntry> = serde_json::from_slice(&bytes)
            .map_err(|e| FetchError::decode(format!("{url}: {e}")))?;

        let names: Vec<QualifiedName> = entries
            .into_iter()
            .filter(|e| !e.name.is_empty())
            .map(|e| QualifiedName::parse(e.name))
            .collect();
        debug!(
            "model_runtime::catalog: registry lists {} model(s)",
            names.len()
        );
        Ok(names)
    }
}

//! Backend Probe (HTTP)
//!
//! Read-only client for the RAG backend: health, configuration snapshots,
//! the model list and raw metrics text. The harness never writes
//! configuration through this client.

use std::time::Duration;

use async_trait::async_trait;
use control_sweep_core::{BackendProbe, ChatModel, CoreError, CoreResult};
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

const HEALTH_PATH: &str = "/health";
const CONFIG_PATH: &str = "/api/config";
const MODELS_PATH: &str = "/api/chat/models";
const METRICS_PATH: &str = "/metrics";

#[derive(Debug, Deserialize)]
struct ModelEntry {
    id: String,
    #[serde(default)]
    provider: String,
    #[serde(default)]
    source: String,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ModelsResponse {
    List(Vec<ModelEntry>),
    Wrapped { models: Vec<ModelEntry> },
}

impl ModelsResponse {
    fn into_models(self) -> Vec<ChatModel> {
        let entries = match self {
            ModelsResponse::List(entries) => entries,
            ModelsResponse::Wrapped { models } => models,
        };
        entries
            .into_iter()
            .map(|m| ChatModel::new(m.id, m.provider, m.source))
            .collect()
    }
}

/// `BackendProbe` over the backend's HTTP API.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: reqwest::Client,
    base_url: String,
}

impl HttpBackend {
    /// Create a client with a per-request timeout.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> CoreResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CoreError::backend(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self::with_reqwest_client(client, base_url))
    }

    /// Wrap an existing reqwest client.
    pub fn with_reqwest_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get(&self, path: &str, query: &[(&str, &str)]) -> CoreResult<reqwest::Response> {
        let response = self
            .client
            .get(self.url(path))
            .query(query)
            .send()
            .await
            .map_err(|e| CoreError::backend(format!("GET {} failed: {}", path, e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CoreError::backend(format!(
                "GET {} returned {}: {}",
                path,
                status.as_u16(),
                body.chars().take(200).collect::<String>()
            )));
        }
        Ok(response)
    }
}

#[async_trait]
impl BackendProbe for HttpBackend {
    async fn health(&self) -> CoreResult<()> {
        self.get(HEALTH_PATH, &[]).await?;
        debug!(base = %self.base_url, "backend healthy");
        Ok(())
    }

    async fn config_snapshot(&self, corpus: Option<&str>) -> CoreResult<Value> {
        let query: Vec<(&str, &str)> = corpus.map(|c| vec![("corpus", c)]).unwrap_or_default();
        let response = self.get(CONFIG_PATH, &query).await?;
        response
            .json::<Value>()
            .await
            .map_err(|e| CoreError::backend(format!("invalid config snapshot: {}", e)))
    }

    async fn list_models(&self) -> CoreResult<Vec<ChatModel>> {
        let response = self.get(MODELS_PATH, &[]).await?;
        let parsed = response
            .json::<ModelsResponse>()
            .await
            .map_err(|e| CoreError::backend(format!("invalid model list: {}", e)))?;
        Ok(parsed.into_models())
    }

    async fn metrics_text(&self) -> CoreResult<String> {
        let response = self.get(METRICS_PATH, &[]).await?;
        response
            .text()
            .await
            .map_err(|e| CoreError::backend(format!("unreadable metrics body: {}", e)))
    }
}

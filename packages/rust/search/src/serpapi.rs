//! SerpAPI client.

use std::time::Duration;

use async_trait::async_trait;
use outreach_shared::{AppConfig, OutreachError, Result, SearchResult, read_secret};
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, instrument};
use url::Url;

use crate::SearchProvider;

/// User-Agent string for search requests.
const USER_AGENT: &str = concat!("Outreach/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone)]
pub struct SerpApiOptions {
    pub base_url: String,
    pub timeout_secs: u64,
}

impl Default for SerpApiOptions {
    fn default() -> Self {
        Self {
            base_url: "https://serpapi.com".into(),
            timeout_secs: 30,
        }
    }
}

/// SerpAPI `google` engine client.
pub struct SerpApiClient {
    client: Client,
    endpoint: Url,
    api_key: String,
}

impl std::fmt::Debug for SerpApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerpApiClient")
            .field("endpoint", &self.endpoint.as_str())
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Deserialize)]
struct SerpResponse {
    #[serde(default)]
    organic_results: Option<Vec<OrganicResult>>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OrganicResult {
    #[serde(default)]
    title: String,
    #[serde(default)]
    link: String,
    #[serde(default)]
    snippet: String,
}

impl SerpApiClient {
    pub fn new(api_key: impl Into<String>, opts: &SerpApiOptions) -> Result<Self> {
        let base = Url::parse(&opts.base_url).map_err(|e| {
            OutreachError::config(format!("invalid SerpAPI base URL {}: {e}", opts.base_url))
        })?;
        let endpoint = base
            .join("search.json")
            .map_err(|e| OutreachError::config(format!("invalid SerpAPI base URL: {e}")))?;

        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(opts.timeout_secs))
            .build()
            .map_err(|e| OutreachError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint,
            api_key: api_key.into(),
        })
    }

    /// Build a client from config, reading the key from its env var.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let key = read_secret(&config.serpapi.api_key_env).ok_or_else(|| {
            OutreachError::config(format!(
                "SerpAPI key not set (expected env {})",
                config.serpapi.api_key_env
            ))
        })?;
        Self::new(
            key,
            &SerpApiOptions {
                base_url: config.serpapi.base_url.clone(),
                timeout_secs: config.http.timeout_secs,
            },
        )
    }
}

#[async_trait]
impl SearchProvider for SerpApiClient {
    #[instrument(skip_all, fields(start = start, num = num))]
    async fn search(&self, query: &str, start: u32, num: u32) -> Result<Vec<SearchResult>> {
        let num = num.to_string();
        let start = start.to_string();
        let response = self
            .client
            .get(self.endpoint.clone())
            .query(&[
                ("engine", "google"),
                ("q", query),
                ("api_key", self.api_key.as_str()),
                ("num", num.as_str()),
                ("start", start.as_str()),
            ])
            .send()
            .await
            .map_err(|e| OutreachError::Network(format!("SerpAPI request failed: {e}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| OutreachError::Network(format!("SerpAPI: failed to read body: {e}")))?;

        if body.trim().is_empty() {
            return Err(OutreachError::Provider(format!(
                "SerpAPI returned an empty response (HTTP {status})"
            )));
        }

        let parsed: SerpResponse = serde_json::from_str(&body).map_err(|e| {
            if status.is_success() {
                OutreachError::parse(format!("SerpAPI response: {e}"))
            } else {
                OutreachError::Provider(format!("SerpAPI HTTP {status}"))
            }
        })?;

        if let Some(error) = parsed.error {
            return Err(OutreachError::Provider(error));
        }
        if !status.is_success() {
            return Err(OutreachError::Provider(format!("SerpAPI HTTP {status}")));
        }

        let results: Vec<SearchResult> = parsed
            .organic_results
            .unwrap_or_default()
            .into_iter()
            .map(|r| SearchResult {
                title: r.title,
                url: r.link,
                snippet: r.snippet,
            })
            .collect();

        debug!(count = results.len(), "SerpAPI page fetched");
        Ok(results)
    }
}

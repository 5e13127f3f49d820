//! Gemini `generateContent` client.

use std::time::Duration;

use async_trait::async_trait;
use outreach_shared::{AppConfig, OutreachError, Result, read_secret};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::instrument;
use url::Url;

use crate::TextGenerator;

const USER_AGENT: &str = concat!("Outreach/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone)]
pub struct GeminiOptions {
    pub base_url: String,
    pub model: String,
    pub timeout_secs: u64,
}

impl Default for GeminiOptions {
    fn default() -> Self {
        Self {
            base_url: "https://generativelanguage.googleapis.com".into(),
            model: "gemini-2.5-flash".into(),
            timeout_secs: 30,
        }
    }
}

pub struct GeminiClient {
    client: Client,
    endpoint: Url,
    api_key: String,
}

impl std::fmt::Debug for GeminiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiClient")
            .field("endpoint", &self.endpoint.as_str())
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct GenerateRequest<'a> {
    contents: [Content<'a>; 1],
}

#[derive(Serialize)]
struct Content<'a> {
    parts: [Part<'a>; 1],
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

impl GeminiClient {
    pub fn new(api_key: impl Into<String>, opts: &GeminiOptions) -> Result<Self> {
        let base = Url::parse(&opts.base_url).map_err(|e| {
            OutreachError::config(format!("invalid Gemini base URL {}: {e}", opts.base_url))
        })?;
        let endpoint = base
            .join(&format!("v1beta/models/{}:generateContent", opts.model))
            .map_err(|e| OutreachError::config(format!("invalid Gemini model path: {e}")))?;

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
        let key = read_secret(&config.gemini.api_key_env).ok_or_else(|| {
            OutreachError::config(format!(
                "Gemini API key not set (expected env {})",
                config.gemini.api_key_env
            ))
        })?;
        Self::new(
            key,
            &GeminiOptions {
                base_url: config.gemini.base_url.clone(),
                model: config.gemini.model.clone(),
                timeout_secs: config.http.timeout_secs,
            },
        )
    }
}

#[async_trait]
impl TextGenerator for GeminiClient {
    #[instrument(skip_all)]
    async fn generate(&self, prompt: &str) -> Result<String> {
        let request = GenerateRequest {
            contents: [Content {
                parts: [Part { text: prompt }],
            }],
        };

        let response = self
            .client
            .post(self.endpoint.clone())
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| OutreachError::Network(format!("Gemini request failed: {e}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| OutreachError::Network(format!("Gemini: failed to read body: {e}")))?;

        if !status.is_success() {
            let message = serde_json::from_str::<ErrorEnvelope>(&body)
                .map(|e| e.error.message)
                .unwrap_or_default();
            return Err(OutreachError::Provider(format!("Gemini HTTP {status}: {message}")));
        }

        let parsed: GenerateResponse = serde_json::from_str(&body)
            .map_err(|e| OutreachError::parse(format!("Gemini response: {e}")))?;

        let text: String = parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(OutreachError::Provider("Gemini returned no text".into()));
        }
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> GeminiClient {
        GeminiClient::new(
            "gem-key",
            &GeminiOptions {
                base_url: server.uri(),
                model: "gemini-2.5-flash".into(),
                timeout_secs: 5,
            },
        )
        .expect("build client")
    }

    #[tokio::test]
    async fn returns_candidate_text() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1beta/models/gemini-2.5-flash:generateContent"))
            .and(header("x-goog-api-key", "gem-key"))
            .and(body_partial_json(serde_json::json!({
                "contents": [{ "parts": [{ "text": "hello prompt" }] }]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "candidates": [{
                    "content": { "parts": [{ "text": "SUBJECT: Hi\n" }, { "text": "BODY: There" }] }
                }]
            })))
            .mount(&server)
            .await;

        let text = client_for(&server).generate("hello prompt").await.unwrap();
        assert_eq!(text, "SUBJECT: Hi\nBODY: There");
    }

    #[tokio::test]
    async fn api_error_is_provider_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_json(serde_json::json!({
                "error": { "code": 429, "message": "Resource has been exhausted" }
            })))
            .mount(&server)
            .await;

        let err = client_for(&server).generate("p").await.unwrap_err();
        assert!(matches!(err, OutreachError::Provider(ref m) if m.contains("exhausted")));
    }

    #[tokio::test]
    async fn empty_candidates_is_provider_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({ "candidates": [] })),
            )
            .mount(&server)
            .await;

        let err = client_for(&server).generate("p").await.unwrap_err();
        assert!(matches!(err, OutreachError::Provider(_)));
    }
}

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use vedakb_core::config::ComposerSettings;
use vedakb_core::traits::Composer;
use vedakb_core::types::{Citation, Passage};

/// Returned by `OllamaComposer` when the model response has no text.
pub const NO_ANSWER_GENERATED: &str = "No answer generated.";

pub fn citations(passages: &[Passage]) -> Vec<Citation> {
    passages.iter().map(Citation::from).collect()
}

pub fn build_prompt(query: &str, passages: &[Passage]) -> String {
    let context = passages.iter().map(|p| p.text.as_str()).collect::<Vec<_>>().join("\n");
    format!("Based on this context: {context}\n\nAnswer the query: {query}")
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: Option<String>,
}

/// Non-streaming client for an Ollama `/api/generate` endpoint.
pub struct OllamaComposer {
    client: Client,
    url: String,
    model: String,
}

impl OllamaComposer {
    pub fn new(url: impl Into<String>, model: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build().context("building composer HTTP client")?;
        Ok(Self { client, url: url.into(), model: model.into() })
    }

    pub fn from_settings(settings: &ComposerSettings) -> Result<Self> {
        Self::new(settings.url.clone(), settings.model.clone(), settings.timeout())
    }
}

#[async_trait]
impl Composer for OllamaComposer {
    async fn compose(&self, query: &str, passages: &[Passage]) -> Result<String> {
        let prompt = build_prompt(query, passages);
        debug!(model = %self.model, passages = passages.len(), prompt_chars = prompt.len(), "composing answer");
        let response = self
            .client
            .post(&self.url)
            .json(&GenerateRequest { model: &self.model, prompt: &prompt, stream: false })
            .send()
            .await
            .with_context(|| format!("POST {}", self.url))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("composer returned HTTP {status}: {body}");
        }
        let body: GenerateResponse = response.json().await.context("decoding composer response")?;
        Ok(body.response.unwrap_or_else(|| NO_ANSWER_GENERATED.to_string()))
    }
}

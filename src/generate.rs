//! Answer generation backends.
//!
//! [`Generator`] is the seam the composer talks to. The production
//! backend is [`GeminiGenerator`], a thin client for the Generative
//! Language API. [`DisabledGenerator`] always fails, which the composer
//! turns into its fallback sentinel; it backs offline runs and the
//! `provider = "disabled"` configuration.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use crate::config::GenerationConfig;
use crate::error::PipelineError;

const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Produces a completion for a fully-built prompt.
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, PipelineError>;
}

/// Generator that refuses every request.
pub struct DisabledGenerator;

#[async_trait]
impl Generator for DisabledGenerator {
    async fn generate(&self, _prompt: &str) -> Result<String, PipelineError> {
        Err(PipelineError::GenerationFailed(
            "generation is disabled by configuration".to_string(),
        ))
    }
}

/// Build the generator selected by `[generation]` config.
///
/// A missing API key downgrades to [`DisabledGenerator`] with a warning
/// instead of failing startup; queries then get the composer's fallback
/// sentinel, same as the original service without its key.
pub fn build_generator(config: &GenerationConfig) -> Result<Arc<dyn Generator>, PipelineError> {
    match config.provider.as_str() {
        "disabled" => Ok(Arc::new(DisabledGenerator)),
        "gemini" => match std::env::var(&config.api_key_env) {
            Ok(key) if !key.trim().is_empty() => {
                Ok(Arc::new(GeminiGenerator::new(config, key)?))
            }
            _ => {
                tracing::warn!(
                    env = %config.api_key_env,
                    "API key not set; answer generation disabled"
                );
                Ok(Arc::new(DisabledGenerator))
            }
        },
        other => Err(PipelineError::GenerationFailed(format!(
            "unknown generation provider '{}'",
            other
        ))),
    }
}

/// Client for the Generative Language `generateContent` endpoint.
pub struct GeminiGenerator {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    max_retries: u32,
}

impl GeminiGenerator {
    pub fn new(config: &GenerationConfig, api_key: String) -> Result<Self, PipelineError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| PipelineError::GenerationFailed(e.to_string()))?;
        let base = config
            .url
            .as_deref()
            .unwrap_or(DEFAULT_API_BASE)
            .trim_end_matches('/');
        Ok(Self {
            client,
            endpoint: format!("{}/models/{}:generateContent", base, config.model),
            api_key,
            max_retries: config.max_retries.max(1),
        })
    }
}

#[async_trait]
impl Generator for GeminiGenerator {
    async fn generate(&self, prompt: &str) -> Result<String, PipelineError> {
        let body = serde_json::json!({
            "contents": [{ "parts": [{ "text": prompt }] }]
        });

        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            let response = self
                .client
                .post(&self.endpoint)
                .query(&[("key", self.api_key.as_str())])
                .json(&body)
                .send()
                .await;

            match response {
                Ok(resp) if resp.status().is_success() => {
                    let parsed: GenerateContentResponse = resp
                        .json()
                        .await
                        .map_err(|e| PipelineError::GenerationFailed(e.to_string()))?;
                    return Ok(response_text(parsed));
                }
                Ok(resp) => {
                    let status = resp.status();
                    let retryable = status.as_u16() == 429 || status.is_server_error();
                    let detail = resp.text().await.unwrap_or_default();
                    if !retryable || attempt >= self.max_retries {
                        return Err(PipelineError::GenerationFailed(format!(
                            "generation API returned {}: {}",
                            status, detail
                        )));
                    }
                    tracing::warn!(%status, attempt, "generation request failed, retrying");
                }
                Err(e) => {
                    if attempt >= self.max_retries {
                        return Err(PipelineError::GenerationFailed(format!(
                            "generation request failed: {}",
                            e
                        )));
                    }
                    tracing::warn!(error = %e, attempt, "generation request failed, retrying");
                }
            }

            tokio::time::sleep(retry_delay(attempt)).await;
        }
    }
}

/// Exponential backoff: 1s, 2s, 4s, ... capped at 32s.
fn retry_delay(attempt: u32) -> Duration {
    Duration::from_secs(1u64 << (attempt - 1).min(5))
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
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
    text: String,
}

/// Concatenate the text parts of the first candidate. A response with no
/// candidates or no parts (e.g. safety-blocked) yields an empty string,
/// which the composer maps to its empty-answer sentinel.
fn response_text(response: GenerateContentResponse) -> String {
    response
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .map(|content| {
            content
                .parts
                .into_iter()
                .map(|p| p.text)
                .collect::<Vec<_>>()
                .join("")
        })
        .unwrap_or_default()
}

//! Gemini API Client
//!
//! Minimal client for the Google Generative Language `generateContent`
//! endpoint. One prompt in, one completion out: no streaming, no retries.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::engine::{Completion, LanguageModel};

const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com";

/// Gemini API client
#[derive(Clone)]
pub struct GeminiClient {
    client: Client,
    api_key: String,
    model: String,
    api_base: String,
}

/// API request
#[derive(Debug, Serialize)]
struct GenerateContentRequest<'a> {
    contents: Vec<RequestContent<'a>>,
}

#[derive(Debug, Serialize)]
struct RequestContent<'a> {
    role: &'a str,
    parts: Vec<RequestPart<'a>>,
}

#[derive(Debug, Serialize)]
struct RequestPart<'a> {
    text: &'a str,
}

/// API response. Every field is optional: a blocked prompt comes back with
/// no candidates at all, a filtered candidate with no content.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<ResponseContent>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResponseContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

impl GenerateContentResponse {
    /// Joined text of the first candidate, `None` when it carries none.
    fn into_completion(self) -> Completion {
        let block_reason = self.prompt_feedback.and_then(|f| f.block_reason);
        let Some(candidate) = self.candidates.into_iter().next() else {
            return Completion {
                text: None,
                finish_reason: block_reason,
            };
        };

        let texts: Vec<String> = candidate
            .content
            .map(|c| c.parts)
            .unwrap_or_default()
            .into_iter()
            .filter_map(|p| p.text)
            .collect();

        Completion {
            text: if texts.is_empty() { None } else { Some(texts.concat()) },
            finish_reason: candidate.finish_reason.or(block_reason),
        }
    }
}

impl GeminiClient {
    pub fn new(api_key: &str, model: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            api_key: api_key.to_string(),
            model: model.to_string(),
            api_base: GEMINI_API_BASE.to_string(),
        })
    }

    /// Create from config
    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(&config.gemini_api_key, &config.gemini_model, config.gemini_timeout)
    }

    /// Point the client at a different API host (proxies, tests).
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn endpoint(&self) -> String {
        format!("{}/v1beta/models/{}:generateContent", self.api_base, self.model)
    }

    /// Send a single-turn prompt.
    ///
    /// Transport failures, non-2xx statuses and undecodable bodies are all
    /// errors; a well-formed response without text is not.
    pub async fn generate_content(&self, prompt: &str) -> Result<Completion> {
        let request = GenerateContentRequest {
            contents: vec![RequestContent {
                role: "user",
                parts: vec![RequestPart { text: prompt }],
            }],
        };

        debug!("Calling Gemini API: model={}, prompt_len={}", self.model, prompt.len());

        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()
            .await
            .context("Failed to send request to Gemini")?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            anyhow::bail!("Gemini API error {}: {}", status, text);
        }

        let result: GenerateContentResponse = response
            .json()
            .await
            .context("Failed to parse Gemini response")?;

        let completion = result.into_completion();
        match &completion.text {
            Some(text) => info!("Gemini response: model={}, len={}", self.model, text.len()),
            None => warn!(
                "Gemini returned no text: model={}, reason={}",
                self.model,
                completion.finish_reason.as_deref().unwrap_or("unknown")
            ),
        }

        Ok(completion)
    }
}

#[async_trait]
impl LanguageModel for GeminiClient {
    async fn generate(&self, prompt: &str) -> Result<Completion> {
        self.generate_content(prompt).await
    }
}

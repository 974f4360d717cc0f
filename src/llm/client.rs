//! Core `LanguageModel` trait and its REST backends.
//!
//! * [`GeminiClient`] calls Google's `generateContent` endpoint.
//! * [`OpenAiCompatibleClient`] calls any OpenAI-compatible
//!   `/v1/chat/completions` endpoint (OpenAI, Ollama, Groq, LM Studio …).
//! * [`DisabledModel`] is injected when the service is switched off; every
//!   call fails with [`LlmError::Disabled`].
//!
//! All connection details come from [`LlmConfig`]; nothing is hardcoded.
//! Each user action makes exactly one call and waits for it (no retry, no
//! client timeout).

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::config::{LlmConfig, LlmProvider};

// ---------------------------------------------------------------------------
// LlmError
// ---------------------------------------------------------------------------

/// Errors that can occur while talking to the generative-language service.
#[derive(Debug, Error)]
pub enum LlmError {
    /// HTTP transport or connection error.
    #[error("HTTP request failed: {0}")]
    Request(String),

    /// The service answered with a non-success status.
    #[error("service returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// The response could not be parsed as expected JSON.
    #[error("failed to parse model response: {0}")]
    Parse(String),

    /// The model returned no usable text.
    #[error("model returned an empty response")]
    EmptyResponse,

    /// The service is switched off in the configuration.
    #[error("generative-language service is disabled")]
    Disabled,
}

impl From<reqwest::Error> for LlmError {
    fn from(e: reqwest::Error) -> Self {
        LlmError::Request(e.to_string())
    }
}

// ---------------------------------------------------------------------------
// LanguageModel trait
// ---------------------------------------------------------------------------

/// Single-shot prompt → text completion.
///
/// Implementors must be `Send + Sync` so they can be shared as
/// `Arc<dyn LanguageModel>`.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, LlmError>;
}

/// Build the backend selected by `config`.
pub fn build_model(config: &LlmConfig) -> Arc<dyn LanguageModel> {
    if !config.enabled {
        log::info!("generative-language service disabled");
        return Arc::new(DisabledModel);
    }
    match config.provider {
        LlmProvider::Gemini => Arc::new(GeminiClient::from_config(config)),
        LlmProvider::OpenAiCompatible => Arc::new(OpenAiCompatibleClient::from_config(config)),
    }
}

async fn read_json(response: reqwest::Response) -> Result<serde_json::Value, LlmError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(LlmError::Status {
            status: status.as_u16(),
            body,
        });
    }
    response
        .json()
        .await
        .map_err(|e| LlmError::Parse(e.to_string()))
}

fn non_empty(text: Option<&str>) -> Result<String, LlmError> {
    let text = text.ok_or(LlmError::EmptyResponse)?.trim();
    if text.is_empty() {
        return Err(LlmError::EmptyResponse);
    }
    Ok(text.to_string())
}

// ---------------------------------------------------------------------------
// GeminiClient
// ---------------------------------------------------------------------------

/// Calls `POST {base_url}/v1beta/models/{model}:generateContent`.
///
/// The key is sent in the `x-goog-api-key` header.
pub struct GeminiClient {
    client: reqwest::Client,
    config: LlmConfig,
}

impl GeminiClient {
    pub fn from_config(config: &LlmConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config: config.clone(),
        }
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.config.base_url.trim_end_matches('/'),
            self.config.model
        )
    }
}

#[async_trait]
impl LanguageModel for GeminiClient {
    async fn generate(&self, prompt: &str) -> Result<String, LlmError> {
        let body = serde_json::json!({
            "contents": [
                { "role": "user", "parts": [ { "text": prompt } ] }
            ],
            "generationConfig": { "temperature": self.config.temperature }
        });

        let mut req = self.client.post(self.endpoint()).json(&body);
        if let Some(key) = self.config.api_key.as_deref().filter(|k| !k.is_empty()) {
            req = req.header("x-goog-api-key", key);
        }

        let json = read_json(req.send().await?).await?;
        non_empty(json["candidates"][0]["content"]["parts"][0]["text"].as_str())
    }
}

// ---------------------------------------------------------------------------
// OpenAiCompatibleClient
// ---------------------------------------------------------------------------

/// Calls an OpenAI-compatible `/v1/chat/completions` endpoint.
///
/// `Authorization: Bearer …` is attached only when an API key is configured.
pub struct OpenAiCompatibleClient {
    client: reqwest::Client,
    config: LlmConfig,
}

impl OpenAiCompatibleClient {
    pub fn from_config(config: &LlmConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config: config.clone(),
        }
    }
}

#[async_trait]
impl LanguageModel for OpenAiCompatibleClient {
    async fn generate(&self, prompt: &str) -> Result<String, LlmError> {
        let url = format!(
            "{}/v1/chat/completions",
            self.config.base_url.trim_end_matches('/')
        );

        let body = serde_json::json!({
            "model":       self.config.model,
            "messages": [
                { "role": "user", "content": prompt }
            ],
            "stream":      false,
            "temperature": self.config.temperature
        });

        let mut req = self.client.post(&url).json(&body);
        if let Some(key) = self.config.api_key.as_deref().filter(|k| !k.is_empty()) {
            req = req.bearer_auth(key);
        }

        let json = read_json(req.send().await?).await?;
        non_empty(json["choices"][0]["message"]["content"].as_str())
    }
}

// ---------------------------------------------------------------------------
// DisabledModel
// ---------------------------------------------------------------------------

/// Stand-in used when `llm.enabled = false`.
pub struct DisabledModel;

#[async_trait]
impl LanguageModel for DisabledModel {
    async fn generate(&self, _prompt: &str) -> Result<String, LlmError> {
        Err(LlmError::Disabled)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

//! Text-completion client for the classification fallback
//!
//! The router only sees the `LanguageModel` trait. `LlmClient` implements it
//! over HTTP for the Anthropic messages API and for OpenAI-compatible chat
//! completion endpoints (DeepSeek, OpenAI, local gateways).

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::core::error::{Result, TalkError};

const DEFAULT_API_URL: &str = "https://api.anthropic.com/v1/messages";
const DEFAULT_MODEL: &str = "claude-3-haiku-20240307";

/// Classification answers are a small JSON object; chat replies are short
const MAX_TOKENS: u32 = 1024;

/// Opaque text-completion function
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Complete `prompt` under the instructions in `system`
    async fn complete(&self, system: &str, prompt: &str) -> Result<String>;
}

/// API format type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiFormat {
    Anthropic,
    OpenAI,
}

impl ApiFormat {
    /// Detect API format from URL
    pub fn detect(url: &str) -> Self {
        if url.contains("anthropic.com") {
            ApiFormat::Anthropic
        } else {
            ApiFormat::OpenAI
        }
    }
}

/// HTTP language-model client
pub struct LlmClient {
    client: Client,
    api_key: String,
    api_url: String,
    model: String,
    api_format: ApiFormat,
}

impl LlmClient {
    pub fn new(api_key: String, api_url: String, model: String) -> Self {
        let api_format = ApiFormat::detect(&api_url);
        Self {
            client: Client::new(),
            api_key,
            api_url,
            model,
            api_format,
        }
    }

    /// Create a client from environment variables
    ///
    /// Required: LLM_API_KEY
    /// Optional: LLM_API_URL (defaults to Anthropic API)
    /// Optional: LLM_MODEL (defaults to claude-3-haiku-20240307)
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("LLM_API_KEY")
            .map_err(|_| TalkError::Config("LLM_API_KEY not set".into()))?;
        let api_url = std::env::var("LLM_API_URL").unwrap_or_else(|_| DEFAULT_API_URL.into());
        let model = std::env::var("LLM_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.into());

        Ok(Self::new(api_key, api_url, model))
    }

    pub fn api_format(&self) -> ApiFormat {
        self.api_format
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    async fn complete_anthropic(&self, system: &str, prompt: &str) -> Result<String> {
        let request = AnthropicRequest {
            model: &self.model,
            max_tokens: MAX_TOKENS,
            system,
            messages: vec![Message {
                role: "user",
                content: prompt,
            }],
        };

        let builder = self
            .client
            .post(&self.api_url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .json(&request);
        let completion: AnthropicResponse = send(builder).await?;

        completion
            .content
            .into_iter()
            .find_map(|block| block.text)
            .ok_or_else(|| TalkError::LlmError("Empty response".into()))
    }

    async fn complete_openai(&self, system: &str, prompt: &str) -> Result<String> {
        let request = OpenAIRequest {
            model: &self.model,
            max_tokens: MAX_TOKENS,
            messages: vec![
                Message {
                    role: "system",
                    content: system,
                },
                Message {
                    role: "user",
                    content: prompt,
                },
            ],
        };

        let builder = self
            .client
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(&request);
        let completion: OpenAIResponse = send(builder).await?;

        completion
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| TalkError::LlmError("Empty response".into()))
    }
}

#[async_trait]
impl LanguageModel for LlmClient {
    async fn complete(&self, system: &str, prompt: &str) -> Result<String> {
        tracing::debug!(model = %self.model, format = ?self.api_format, "LLM completion request");
        match self.api_format {
            ApiFormat::Anthropic => self.complete_anthropic(system, prompt).await,
            ApiFormat::OpenAI => self.complete_openai(system, prompt).await,
        }
    }
}

async fn send<T: DeserializeOwned>(builder: RequestBuilder) -> Result<T> {
    let response = builder
        .send()
        .await
        .map_err(|e| TalkError::LlmError(e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        let error_text = response.text().await.unwrap_or_default();
        return Err(TalkError::LlmError(format!("API error {}: {}", status, error_text)));
    }

    response
        .json()
        .await
        .map_err(|e| TalkError::LlmError(e.to_string()))
}

// Anthropic API format
#[derive(Serialize)]
struct AnthropicRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    messages: Vec<Message<'a>>,
}

#[derive(Deserialize)]
struct AnthropicResponse {
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(default)]
    text: Option<String>,
}

// OpenAI-compatible API format
#[derive(Serialize)]
struct OpenAIRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: Vec<Message<'a>>,
}

#[derive(Deserialize)]
struct OpenAIResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

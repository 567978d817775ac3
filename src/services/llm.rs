use async_trait::async_trait;
use serde_json::{Value, json};
use std::time::Duration;

use crate::config::LlmConfig;

/// Why a model call did not produce usable output.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum GenerationError {
    #[error("no LLM API key configured")]
    ConfigurationMissing,

    #[error("generation request failed: {0}")]
    GenerationFailed(String),

    #[error("malformed generation response: {0}")]
    MalformedResponse(String),
}

/// One prompt plus the sampling settings it should be sent with.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub prompt: String,
    pub temperature: f32,
}

/// Anything that can turn a prompt into raw (expected JSON) text.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, request: &CompletionRequest) -> Result<String, GenerationError>;
}

/// Client for OpenAI-compatible chat-completion endpoints.
pub struct LlmClient {
    client: reqwest::Client,
    api_url: String,
    api_key: Option<String>,
    model: String,
}

impl LlmClient {
    pub fn new(config: &LlmConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(LlmClient {
            client,
            api_url: config.api_url.clone(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
        })
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    fn request_body(&self, request: &CompletionRequest) -> Value {
        json!({
            "model": self.model,
            "messages": [{"role": "user", "content": request.prompt}],
            "response_format": {"type": "json_object"},
            "temperature": request.temperature
        })
    }
}

#[async_trait]
impl TextGenerator for LlmClient {
    async fn generate(&self, request: &CompletionRequest) -> Result<String, GenerationError> {
        let Some(api_key) = self.api_key.as_deref() else {
            return Err(GenerationError::ConfigurationMissing);
        };

        let response = self
            .client
            .post(&self.api_url)
            .header("Content-Type", "application/json")
            .header("Authorization", format!("Bearer {}", api_key))
            .json(&self.request_body(request))
            .send()
            .await
            .map_err(|e| GenerationError::GenerationFailed(e.to_string()))?;

        let status = response.status();
        let response_text = response
            .text()
            .await
            .map_err(|e| GenerationError::GenerationFailed(e.to_string()))?;

        if !status.is_success() {
            return Err(GenerationError::GenerationFailed(format!(
                "API returned {}",
                status
            )));
        }

        extract_message_content(&response_text)
    }
}

/// Pulls `choices[0].message.content` out of a chat-completion body.
fn extract_message_content(body: &str) -> Result<String, GenerationError> {
    let value: Value = serde_json::from_str(body)
        .map_err(|e| GenerationError::GenerationFailed(format!("unreadable API response: {}", e)))?;

    value["choices"][0]["message"]["content"]
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| {
            GenerationError::GenerationFailed("API response has no message content".to_string())
        })
}

use crate::domain::errors::ProviderError;
use crate::domain::ports::StrategyProvider;
use crate::domain::types::{GenerationOptions, ProviderCapabilities};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

// ===== Constants =====

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";
const API_VERSION: &str = "2023-06-01";
const REQUEST_TIMEOUT_SECS: u64 = 30;

// ===== Wire types =====

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f64,
    messages: Vec<Message<'a>>,
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: String,
}

// ===== Provider =====

/// Anthropic messages-API adapter. Same concurrency contract as the OpenAI
/// adapter: one pooled client, no per-request state.
pub struct AnthropicProvider {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl AnthropicProvider {
    pub fn builder() -> AnthropicProviderBuilder {
        AnthropicProviderBuilder::default()
    }
}

#[derive(Default)]
pub struct AnthropicProviderBuilder {
    api_key: Option<String>,
    base_url: Option<String>,
    model: Option<String>,
}

impl AnthropicProviderBuilder {
    pub fn api_key(mut self, api_key: String) -> Self {
        self.api_key = Some(api_key);
        self
    }

    pub fn base_url(mut self, base_url: String) -> Self {
        self.base_url = Some(base_url);
        self
    }

    pub fn model(mut self, model: String) -> Self {
        self.model = Some(model);
        self
    }

    pub fn build(self) -> AnthropicProvider {
        let api_key = self.api_key.expect("api_key is required");
        let base_url = self
            .base_url
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let model = self.model.unwrap_or_else(|| DEFAULT_MODEL.to_string());

        let client = Client::builder()
            .pool_max_idle_per_host(5)
            .timeout(std::time::Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .connect_timeout(std::time::Duration::from_secs(10))
            .build()
            .unwrap_or_else(|_| Client::new());

        AnthropicProvider {
            client,
            api_key,
            base_url,
            model,
        }
    }
}

#[async_trait]
impl StrategyProvider for AnthropicProvider {
    fn id(&self) -> &str {
        "anthropic"
    }

    fn capabilities(&self) -> ProviderCapabilities {
        ProviderCapabilities {
            supports_batching: false,
            supports_streaming: true,
            max_tokens: 8192,
        }
    }

    async fn generate(
        &self,
        prompt: &str,
        options: &GenerationOptions,
    ) -> Result<String, ProviderError> {
        let url = format!("{}/v1/messages", self.base_url);
        let model = options.model.as_deref().unwrap_or(&self.model);
        let request = MessagesRequest {
            model,
            max_tokens: options.max_tokens,
            temperature: options.temperature,
            messages: vec![Message {
                role: "user",
                content: prompt,
            }],
        };

        debug!("Anthropic: requesting completion from model {}", model);

        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .json(&request)
            .send()
            .await
            .map_err(|e| super::map_transport_error(e, REQUEST_TIMEOUT_SECS * 1000))?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN
        {
            let reason = response.text().await.unwrap_or_default();
            return Err(ProviderError::Auth { reason });
        }
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(ProviderError::RateLimited {
                retry_after_secs: super::parse_retry_after(response.headers()),
            });
        }
        if !status.is_success() {
            let reason = response.text().await.unwrap_or_default();
            return Err(ProviderError::Unknown {
                reason: format!("Anthropic returned {}: {}", status, reason),
            });
        }

        let body: MessagesResponse =
            response.json().await.map_err(|e| ProviderError::Unknown {
                reason: format!("Failed to decode Anthropic response: {}", e),
            })?;

        let text: String = body
            .content
            .iter()
            .filter(|block| block.kind == "text")
            .map(|block| block.text.as_str())
            .collect();
        if text.is_empty() {
            return Err(ProviderError::Unknown {
                reason: "Anthropic response contained no text blocks".to_string(),
            });
        }

        Ok(super::strip_code_fences(&text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults() {
        let provider = AnthropicProvider::builder()
            .api_key("key".to_string())
            .build();
        assert_eq!(provider.base_url, DEFAULT_BASE_URL);
        assert_eq!(provider.id(), "anthropic");
    }

    #[test]
    fn test_response_text_blocks_concatenated() {
        let raw = r#"{"content":[{"type":"text","text":"def initialize"},{"type":"text","text":"(context): pass"}]}"#;
        let decoded: MessagesResponse = serde_json::from_str(raw).unwrap();
        let text: String = decoded
            .content
            .iter()
            .filter(|b| b.kind == "text")
            .map(|b| b.text.as_str())
            .collect();
        assert_eq!(text, "def initialize(context): pass");
    }
}

use crate::domain::errors::ProviderError;
use crate::domain::ports::StrategyProvider;
use crate::domain::types::{GenerationOptions, ProviderCapabilities};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

// ===== Constants =====

const DEFAULT_BASE_URL: &str = "https://api.openai.com";
const DEFAULT_MODEL: &str = "gpt-4o";
const REQUEST_TIMEOUT_SECS: u64 = 30;

// ===== Wire types =====

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    temperature: f64,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: String,
}

// ===== Provider =====

/// OpenAI chat-completions adapter.
///
/// The owned `reqwest::Client` pools connections and is safe to share across
/// concurrent `generate` calls; the adapter itself holds no per-request state.
pub struct OpenAiProvider {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl OpenAiProvider {
    pub fn builder() -> OpenAiProviderBuilder {
        OpenAiProviderBuilder::default()
    }
}

#[derive(Default)]
pub struct OpenAiProviderBuilder {
    api_key: Option<String>,
    base_url: Option<String>,
    model: Option<String>,
}

impl OpenAiProviderBuilder {
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

    pub fn build(self) -> OpenAiProvider {
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

        OpenAiProvider {
            client,
            api_key,
            base_url,
            model,
        }
    }
}

#[async_trait]
impl StrategyProvider for OpenAiProvider {
    fn id(&self) -> &str {
        "openai"
    }

    fn capabilities(&self) -> ProviderCapabilities {
        ProviderCapabilities {
            supports_batching: false,
            supports_streaming: true,
            max_tokens: 16384,
        }
    }

    async fn generate(
        &self,
        prompt: &str,
        options: &GenerationOptions,
    ) -> Result<String, ProviderError> {
        let url = format!("{}/v1/chat/completions", self.base_url);
        let model = options.model.as_deref().unwrap_or(&self.model);
        let request = ChatCompletionRequest {
            model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            max_tokens: options.max_tokens,
            temperature: options.temperature,
        };

        debug!("OpenAI: requesting completion from model {}", model);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
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
                reason: format!("OpenAI returned {}: {}", status, reason),
            });
        }

        let body: ChatCompletionResponse =
            response.json().await.map_err(|e| ProviderError::Unknown {
                reason: format!("Failed to decode OpenAI response: {}", e),
            })?;

        let content = body
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| ProviderError::Unknown {
                reason: "OpenAI response contained no choices".to_string(),
            })?;

        Ok(super::strip_code_fences(&content))
    }
}

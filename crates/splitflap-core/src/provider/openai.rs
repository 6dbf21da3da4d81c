use async_trait::async_trait;
use reqwest::Client;
use secrecy::ExposeSecret;
use serde_json::json;

use crate::error::{CoreError, Result};
use crate::provider::{AIProvider, GenerateRequest, GenerateResponse, FinishReason, ProviderCapabilities, ProviderConfig};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Reference `AIProvider` adapter for OpenAI's Chat Completions API.
pub struct OpenAiProvider {
    config: ProviderConfig,
    model: String,
    client: Client,
}

impl OpenAiProvider {
    pub fn new(model: impl Into<String>, config: ProviderConfig) -> Self {
        let client = crate::provider::build_client(config.timeout_ms);
        Self {
            config,
            model: model.into(),
            client,
        }
    }

    fn base_url(&self) -> &str {
        self.config.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL)
    }
}

#[async_trait]
impl AIProvider for OpenAiProvider {
    fn name(&self) -> &str {
        "openai"
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn capabilities(&self) -> ProviderCapabilities {
        ProviderCapabilities {
            tool_use: true,
            structured_output: true,
            vision: false,
        }
    }

    async fn generate(&self, request: &GenerateRequest) -> Result<GenerateResponse> {
        let mut messages = Vec::new();
        if let Some(ref system) = request.system {
            messages.push(json!({"role": "system", "content": system}));
        }
        messages.push(json!({"role": "user", "content": request.user}));

        let mut body = json!({
            "model": self.model,
            "messages": messages,
        });
        if let Some(mt) = request.max_tokens {
            body["max_tokens"] = json!(mt);
        }
        if let Some(t) = request.temperature {
            body["temperature"] = json!(t);
        }

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url()))
            .bearer_auth(self.config.api_key.expose_secret())
            .json(&body)
            .send()
            .await
            .map_err(|e| CoreError::Transient {
                provider: self.name().to_string(),
                message: e.to_string(),
            })?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(CoreError::RateLimit {
                provider: self.name().to_string(),
                retry_after_ms: None,
            });
        }
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(CoreError::Authentication {
                provider: self.name().to_string(),
            });
        }
        if status.is_server_error() {
            return Err(CoreError::Overloaded {
                provider: self.name().to_string(),
            });
        }
        if status.is_client_error() {
            let message = response.text().await.unwrap_or_default();
            return Err(CoreError::InvalidRequest {
                provider: self.name().to_string(),
                message,
            });
        }

        let parsed: serde_json::Value = response.json().await.map_err(|e| CoreError::Transient {
            provider: self.name().to_string(),
            message: e.to_string(),
        })?;

        let text = parsed["choices"][0]["message"]["content"]
            .as_str()
            .unwrap_or_default()
            .to_string();
        let finish = parsed["choices"][0]["finish_reason"].as_str();

        Ok(GenerateResponse {
            text,
            model: self.model.clone(),
            tokens_used: parsed["usage"]["total_tokens"].as_u64().map(|n| n as u32),
            finish_reason: match finish {
                Some("stop") => Some(FinishReason::Stop),
                Some("length") => Some(FinishReason::Length),
                Some("tool_calls") => Some(FinishReason::ToolCalls),
                Some("content_filter") => Some(FinishReason::ContentFilter),
                _ => None,
            },
            tool_calls: Vec::new(),
        })
    }

    async fn validate_connection(&self) -> bool {
        self.client
            .get(format!("{}/models", self.base_url()))
            .bearer_auth(self.config.api_key.expose_secret())
            .send()
            .await
            .map(|r| r.status().is_success())
            .unwrap_or(false)
    }
}

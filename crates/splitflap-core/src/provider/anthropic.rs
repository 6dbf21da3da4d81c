use async_trait::async_trait;
use reqwest::Client;
use secrecy::ExposeSecret;
use serde_json::json;

use crate::error::{CoreError, Result};
use crate::provider::{AIProvider, GenerateRequest, GenerateResponse, FinishReason, ProviderCapabilities, ProviderConfig};

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com/v1";
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Reference `AIProvider` adapter for Anthropic's Messages API.
pub struct AnthropicProvider {
    config: ProviderConfig,
    model: String,
    client: Client,
}

impl AnthropicProvider {
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
impl AIProvider for AnthropicProvider {
    fn name(&self) -> &str {
        "anthropic"
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn capabilities(&self) -> ProviderCapabilities {
        ProviderCapabilities {
            tool_use: true,
            structured_output: false,
            vision: true,
        }
    }

    async fn generate(&self, request: &GenerateRequest) -> Result<GenerateResponse> {
        let mut body = json!({
            "model": self.model,
            "max_tokens": request.max_tokens.unwrap_or(1024),
            "messages": [{"role": "user", "content": request.user}],
        });
        if let Some(ref system) = request.system {
            body["system"] = json!(system);
        }
        if let Some(t) = request.temperature {
            body["temperature"] = json!(t);
        }

        let response = self
            .client
            .post(format!("{}/messages", self.base_url()))
            .header("x-api-key", self.config.api_key.expose_secret())
            .header("anthropic-version", ANTHROPIC_VERSION)
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

        let text = parsed["content"][0]["text"].as_str().unwrap_or_default().to_string();
        let stop_reason = parsed["stop_reason"].as_str();

        Ok(GenerateResponse {
            text,
            model: self.model.clone(),
            tokens_used: parsed["usage"]["output_tokens"].as_u64().map(|n| n as u32),
            finish_reason: match stop_reason {
                Some("end_turn") => Some(FinishReason::Stop),
                Some("max_tokens") => Some(FinishReason::Length),
                Some("tool_use") => Some(FinishReason::ToolCalls),
                _ => None,
            },
            tool_calls: Vec::new(),
        })
    }

    async fn validate_connection(&self) -> bool {
        let response = self
            .client
            .post(format!("{}/messages", self.base_url()))
            .header("x-api-key", self.config.api_key.expose_secret())
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&json!({
                "model": self.model,
                "max_tokens": 1,
                "messages": [{"role": "user", "content": "ping"}],
            }))
            .send()
            .await;
        matches!(response, Ok(r) if r.status().is_success() || r.status() == reqwest::StatusCode::BAD_REQUEST)
    }
}

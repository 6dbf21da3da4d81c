//! `AIProvider` port (spec §6) — the capability surface a generator uses
//! to call out to a remote model. Concrete HTTP SDKs are an external
//! collaborator; `openai.rs` and `anthropic.rs` are thin reference
//! adapters showing the shape, not the production clients.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// A single generation request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenerateRequest {
    pub system: Option<String>,
    pub user: String,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f64>,
    #[serde(default)]
    pub tools: Vec<serde_json::Value>,
    #[serde(default)]
    pub tool_results: Vec<serde_json::Value>,
}

/// Why the model stopped generating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    Stop,
    Length,
    ToolCalls,
    ContentFilter,
    Error,
}

/// Response from a single generation call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateResponse {
    pub text: String,
    pub model: String,
    pub tokens_used: Option<u32>,
    pub finish_reason: Option<FinishReason>,
    #[serde(default)]
    pub tool_calls: Vec<serde_json::Value>,
}

/// Capabilities supported by a provider/model combination — lets a
/// generator check before it asks for something the model can't do.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProviderCapabilities {
    pub tool_use: bool,
    pub structured_output: bool,
    pub vision: bool,
}

/// Configuration shared by all provider adapters.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub api_key: secrecy::SecretString,
    pub base_url: Option<String>,
    pub timeout_ms: u64,
}

impl ProviderConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: secrecy::SecretString::from(api_key.into()),
            base_url: None,
            timeout_ms: 30_000,
        }
    }

    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    pub fn timeout(mut self, ms: u64) -> Self {
        self.timeout_ms = ms;
        self
    }
}

/// Core trait for AI model providers.
#[async_trait]
pub trait AIProvider: Send + Sync {
    fn name(&self) -> &str;
    fn model(&self) -> &str;

    fn capabilities(&self) -> ProviderCapabilities {
        ProviderCapabilities::default()
    }

    async fn generate(&self, request: &GenerateRequest) -> Result<GenerateResponse>;

    /// Lightweight reachability/auth check, used at startup and by health
    /// reporting; never used on the generation hot path.
    async fn validate_connection(&self) -> bool;
}

/// Build an HTTP client with a bounded timeout, shared by every adapter.
pub fn build_client(timeout_ms: u64) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(std::time::Duration::from_millis(timeout_ms))
        .build()
        .expect("failed to build HTTP client")
}

pub mod anthropic;
pub mod openai;
pub mod retry;

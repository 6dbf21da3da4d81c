use async_trait::async_trait;
use std::time::Duration;
use tracing::warn;

use crate::error::{CoreError, Result};
use crate::provider::{AIProvider, GenerateRequest, GenerateResponse, ProviderCapabilities};

/// Configuration for provider-call retry behavior (distinct from the
/// generator-level `RetryEngine` in `crate::retry` — this wraps a single
/// `AIProvider`, used inside `resilient::resilient`).
#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay_ms: 500,
            max_delay_ms: 10_000,
            backoff_multiplier: 2.0,
        }
    }
}

/// Wraps an `AIProvider` with exponential-backoff retry on retryable
/// errors (spec §7: rate limit, overload, transient).
pub struct RetryProvider {
    inner: std::sync::Arc<dyn AIProvider>,
    config: RetryConfig,
}

impl RetryProvider {
    pub fn new(inner: std::sync::Arc<dyn AIProvider>, config: RetryConfig) -> Self {
        Self { inner, config }
    }

    pub fn wrap(inner: std::sync::Arc<dyn AIProvider>) -> Self {
        Self::new(inner, RetryConfig::default())
    }

    fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let delay = self.config.initial_delay_ms as f64
            * self.config.backoff_multiplier.powi(attempt as i32);
        Duration::from_millis(delay.min(self.config.max_delay_ms as f64) as u64)
    }
}

#[async_trait]
impl AIProvider for RetryProvider {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn model(&self) -> &str {
        self.inner.model()
    }

    fn capabilities(&self) -> ProviderCapabilities {
        self.inner.capabilities()
    }

    async fn generate(&self, request: &GenerateRequest) -> Result<GenerateResponse> {
        let mut last_error: Option<CoreError> = None;

        for attempt in 0..=self.config.max_retries {
            match self.inner.generate(request).await {
                Ok(result) => return Ok(result),
                Err(e) => {
                    if attempt < self.config.max_retries && e.is_retryable() {
                        let delay = self.delay_for_attempt(attempt);
                        warn!(
                            provider = self.inner.name(),
                            attempt = attempt + 1,
                            max = self.config.max_retries,
                            delay_ms = delay.as_millis() as u64,
                            error = %e,
                            "retrying provider call after error"
                        );
                        tokio::time::sleep(delay).await;
                        last_error = Some(e);
                    } else {
                        return Err(e);
                    }
                }
            }
        }

        Err(last_error.unwrap_or_else(|| {
            CoreError::Transient {
                provider: self.inner.name().to_string(),
                message: "max retries exceeded".to_string(),
            }
        }))
    }

    async fn validate_connection(&self) -> bool {
        self.inner.validate_connection().await
    }
}

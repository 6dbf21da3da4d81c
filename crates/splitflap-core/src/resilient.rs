//! Provider resilience — fallback chains and circuit gating, composed on
//! top of `RetryProvider`. Generalized from the teacher's single-provider
//! `CircuitBreaker` into a thin gate over the shared `CircuitBreakerService`
//! (`crate::circuit`), so breaker state stays canonical and persisted
//! across both provider-level gating and the operator-facing circuits
//! named in spec §4.1 (`MASTER`, `SLEEP_MODE`, ...).

use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use crate::circuit::CircuitBreakerService;
use crate::error::{CoreError, Result};
use crate::provider::retry::{RetryConfig, RetryProvider};
use crate::provider::{AIProvider, GenerateRequest, GenerateResponse, ProviderCapabilities};

/// Tries each provider in order, advancing to the next on a retryable or
/// circuit-open error. The last provider's error is returned verbatim if
/// every candidate fails.
pub struct FallbackProvider {
    providers: Vec<Arc<dyn AIProvider>>,
}

impl FallbackProvider {
    pub fn new(providers: Vec<Arc<dyn AIProvider>>) -> Self {
        assert!(!providers.is_empty(), "FallbackProvider needs at least one provider");
        Self { providers }
    }

    fn should_fall_back(error: &CoreError) -> bool {
        matches!(
            error,
            CoreError::RateLimit { .. }
                | CoreError::Overloaded { .. }
                | CoreError::Authentication { .. }
                | CoreError::Transient { .. }
                | CoreError::CircuitOpen { .. }
        )
    }
}

#[async_trait]
impl AIProvider for FallbackProvider {
    fn name(&self) -> &str {
        self.providers[0].name()
    }

    fn model(&self) -> &str {
        self.providers[0].model()
    }

    fn capabilities(&self) -> ProviderCapabilities {
        self.providers[0].capabilities()
    }

    async fn generate(&self, request: &GenerateRequest) -> Result<GenerateResponse> {
        let mut last_error: Option<CoreError> = None;

        for (index, provider) in self.providers.iter().enumerate() {
            match provider.generate(request).await {
                Ok(response) => return Ok(response),
                Err(e) => {
                    let is_last = index == self.providers.len() - 1;
                    if is_last || !Self::should_fall_back(&e) {
                        return Err(e);
                    }
                    warn!(
                        provider = provider.name(),
                        next = self.providers[index + 1].name(),
                        error = %e,
                        "falling back to next provider"
                    );
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| CoreError::internal("fallback chain exhausted with no providers")))
    }

    async fn validate_connection(&self) -> bool {
        for provider in &self.providers {
            if provider.validate_connection().await {
                return true;
            }
        }
        false
    }
}

/// Gates calls to a single provider behind a named breaker in the shared
/// `CircuitBreakerService`. Rejects with `CoreError::CircuitOpen` without
/// touching the network when the breaker is tripped, and reports
/// success/failure back to the service after every call.
pub struct ProviderCircuitGate {
    inner: Arc<dyn AIProvider>,
    breaker: Arc<CircuitBreakerService>,
    circuit_id: String,
}

impl ProviderCircuitGate {
    pub fn new(inner: Arc<dyn AIProvider>, breaker: Arc<CircuitBreakerService>, circuit_id: impl Into<String>) -> Self {
        Self {
            inner,
            breaker,
            circuit_id: circuit_id.into(),
        }
    }
}

#[async_trait]
impl AIProvider for ProviderCircuitGate {
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
        if self.breaker.is_circuit_open(&self.circuit_id) {
            return Err(CoreError::CircuitOpen {
                circuit_id: self.circuit_id.clone(),
            });
        }

        match self.inner.generate(request).await {
            Ok(response) => {
                self.breaker.record_success(&self.circuit_id).await;
                Ok(response)
            }
            Err(e) => {
                if e.is_retryable() {
                    self.breaker.record_failure(&self.circuit_id).await;
                }
                Err(e)
            }
        }
    }

    async fn validate_connection(&self) -> bool {
        self.inner.validate_connection().await
    }
}

/// Wraps a provider as: circuit gate (innermost) -> retry -> fallback
/// (outermost), matching the teacher's documented wrapping order so a
/// retry never bypasses the breaker and a fallback never retries a
/// provider that just tripped its own breaker internally.
pub struct ResilientProviderBuilder {
    breaker: Arc<CircuitBreakerService>,
    retry_config: RetryConfig,
    providers: Vec<Arc<dyn AIProvider>>,
}

impl ResilientProviderBuilder {
    pub fn new(breaker: Arc<CircuitBreakerService>) -> Self {
        Self {
            breaker,
            retry_config: RetryConfig::default(),
            providers: Vec::new(),
        }
    }

    pub fn retry_config(mut self, config: RetryConfig) -> Self {
        self.retry_config = config;
        self
    }

    /// Adds a provider to the fallback chain, wrapping it with a circuit
    /// gate named `circuit_id` and retry before it joins the chain.
    pub fn add_provider(mut self, provider: Arc<dyn AIProvider>, circuit_id: impl Into<String>) -> Self {
        let gated = ProviderCircuitGate::new(provider, Arc::clone(&self.breaker), circuit_id);
        let retried = RetryProvider::new(Arc::new(gated), self.retry_config.clone());
        self.providers.push(Arc::new(retried));
        self
    }

    pub fn build(self) -> Result<FallbackProvider> {
        if self.providers.is_empty() {
            return Err(CoreError::config("ResilientProviderBuilder requires at least one provider"));
        }
        Ok(FallbackProvider::new(self.providers))
    }
}

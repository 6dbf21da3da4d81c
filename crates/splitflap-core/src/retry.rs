//! Retry Engine (spec §4.8) — bounded retry across generator attempts
//! with output validation, distinct from the provider-level
//! `provider::retry::RetryProvider`. Generalized from that provider
//! retry loop: same exponential-backoff shape, but operating on a
//! `ContentGenerator` and folding in output validation and breaker
//! bookkeeping per attempt.

use std::time::Duration;

use tracing::warn;

use crate::circuit::CircuitBreakerService;
use crate::config::RetryLimits;
use crate::error::{CoreError, Result};
use crate::frame::is_valid_tile_code;
use crate::model::{GenerationContext, GeneratedContent, OutputMode};
use crate::registry::GeneratorRegistration;

const MAX_TEXT_CAPACITY: usize = 600;

fn validate_output(content: &GeneratedContent) -> Result<()> {
    match content.output_mode {
        OutputMode::Text => {
            if content.text.is_empty() {
                return Err(CoreError::ValidationFailed {
                    message: "generator returned empty text".to_string(),
                });
            }
            if content.text.chars().count() > MAX_TEXT_CAPACITY {
                return Err(CoreError::ValidationFailed {
                    message: format!("text length {} exceeds device capacity", content.text.chars().count()),
                });
            }
            Ok(())
        }
        OutputMode::Layout => {
            let Some(layout) = &content.layout else {
                return Err(CoreError::ValidationFailed {
                    message: "layout mode requires a layout".to_string(),
                });
            };
            for row in layout.character_codes.iter() {
                if row.len() != 22 {
                    return Err(CoreError::ValidationFailed {
                        message: "layout row is not 22 columns".to_string(),
                    });
                }
                if row.iter().any(|&c| !is_valid_tile_code(c)) {
                    return Err(CoreError::ValidationFailed {
                        message: "layout contains a tile code outside the device alphabet".to_string(),
                    });
                }
            }
            if layout.character_codes.len() != 6 {
                return Err(CoreError::ValidationFailed {
                    message: "layout is not 6 rows".to_string(),
                });
            }
            Ok(())
        }
    }
}

fn provider_circuit_id(provider: &str) -> String {
    format!("PROVIDER_{}", provider.to_uppercase())
}

pub struct RetryEngine {
    limits: RetryLimits,
}

impl RetryEngine {
    pub fn new(limits: RetryLimits) -> Self {
        Self { limits }
    }

    fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let delay = self.limits.initial_delay_ms as f64 * 2f64.powi(attempt as i32);
        Duration::from_millis(delay.min(self.limits.max_delay_ms as f64) as u64)
    }

    /// Runs `registration.generator.generate` up to `max_attempts` times,
    /// validating each attempt's output and bookkeeping the relevant
    /// provider breaker. Returns the first valid result, or the last
    /// error once attempts are exhausted.
    pub async fn generate_with_retry(
        &self,
        registration: &GeneratorRegistration,
        context: &GenerationContext,
        breaker: &CircuitBreakerService,
    ) -> Result<GeneratedContent> {
        let mut last_error: Option<CoreError> = None;

        for attempt in 0..self.limits.max_attempts {
            let outcome = registration.generator.generate(context).await.and_then(|content| {
                validate_output(&content)?;
                Ok(content)
            });

            match outcome {
                Ok(content) => {
                    if let Some(provider) = content.provider() {
                        breaker.record_success(&provider_circuit_id(provider)).await;
                    }
                    return Ok(content);
                }
                Err(e) => {
                    if let Some(provider) = e.provider_name() {
                        breaker.record_failure(&provider_circuit_id(provider)).await;
                    }

                    let attempts_remain = attempt + 1 < self.limits.max_attempts;
                    if attempts_remain && e.is_retryable() {
                        let delay = self.delay_for_attempt(attempt);
                        warn!(
                            generator = registration.id,
                            attempt = attempt + 1,
                            max = self.limits.max_attempts,
                            error = %e,
                            "retrying generator after error"
                        );
                        tokio::time::sleep(delay).await;
                        last_error = Some(e);
                    } else {
                        return Err(e);
                    }
                }
            }
        }

        Err(last_error.unwrap_or_else(|| CoreError::generator(&registration.id, "max attempts exceeded")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::circuit::InMemoryCircuitBreakerStore;
    use crate::model::{Grid, Layout};
    use crate::registry::ContentGenerator;
    use crate::tier::Tier;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    struct FlakyGenerator {
        attempts: AtomicU32,
        fail_until: u32,
    }

    #[async_trait]
    impl ContentGenerator for FlakyGenerator {
        fn id(&self) -> &str {
            "flaky"
        }

        async fn generate(&self, _context: &GenerationContext) -> Result<GeneratedContent> {
            let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);
            if attempt < self.fail_until {
                Err(CoreError::Transient {
                    provider: "openai".to_string(),
                    message: "connection reset".to_string(),
                })
            } else {
                let mut content = GeneratedContent::text("steady output");
                content.metadata.insert("provider".into(), serde_json::json!("openai"));
                Ok(content)
            }
        }
    }

    struct InvalidShapeGenerator;

    #[async_trait]
    impl ContentGenerator for InvalidShapeGenerator {
        fn id(&self) -> &str {
            "bad-shape"
        }

        async fn generate(&self, _context: &GenerationContext) -> Result<GeneratedContent> {
            let grid: Grid = [[99; 22]; 6];
            Ok(GeneratedContent {
                text: "x".to_string(),
                output_mode: OutputMode::Layout,
                layout: Some(Layout { character_codes: grid }),
                metadata: Default::default(),
            })
        }
    }

    fn registration_with(generator: Arc<dyn ContentGenerator>) -> GeneratorRegistration {
        GeneratorRegistration {
            id: "flaky".to_string(),
            name: "flaky".to_string(),
            priority: crate::model::Priority::P2,
            model_tier: Tier::Medium,
            apply_frame: true,
            format_options: None,
            event_pattern: None,
            gating_circuit: None,
            schedule_window: None,
            generator,
        }
    }

    fn breaker() -> CircuitBreakerService {
        CircuitBreakerService::new(Arc::new(InMemoryCircuitBreakerStore::default()))
    }

    #[tokio::test]
    async fn retries_transient_failures_until_success() {
        let generator = Arc::new(FlakyGenerator { attempts: AtomicU32::new(0), fail_until: 2 });
        let registration = registration_with(generator);
        let engine = RetryEngine::new(RetryLimits { max_attempts: 3, initial_delay_ms: 1, max_delay_ms: 2 });
        let breaker = breaker();

        let result = engine
            .generate_with_retry(&registration, &GenerationContext::major(chrono::Utc::now()), &breaker)
            .await
            .unwrap();
        assert_eq!(result.text, "steady output");
    }

    #[tokio::test]
    async fn exhausts_attempts_and_returns_last_error() {
        let generator = Arc::new(FlakyGenerator { attempts: AtomicU32::new(0), fail_until: 10 });
        let registration = registration_with(generator);
        let engine = RetryEngine::new(RetryLimits { max_attempts: 3, initial_delay_ms: 1, max_delay_ms: 2 });
        let breaker = breaker();

        let result = engine
            .generate_with_retry(&registration, &GenerationContext::major(chrono::Utc::now()), &breaker)
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn invalid_tile_codes_fail_validation() {
        let registration = registration_with(Arc::new(InvalidShapeGenerator));
        let engine = RetryEngine::new(RetryLimits { max_attempts: 1, initial_delay_ms: 1, max_delay_ms: 2 });
        let breaker = breaker();

        let result = engine
            .generate_with_retry(&registration, &GenerationContext::major(chrono::Utc::now()), &breaker)
            .await;
        assert!(matches!(result, Err(CoreError::ValidationFailed { .. })));
    }
}

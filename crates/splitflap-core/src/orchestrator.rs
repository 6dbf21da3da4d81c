//! Content Orchestrator (spec §4.7) — the end-to-end pipeline, owning
//! the single-entry cache and serializing invocations behind a mutex.
//! Sequential pipeline shape adapted from the teacher's
//! `team.rs::run_sequential` step-chaining.

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::circuit::CircuitBreakerService;
use crate::data_provider::ContentDataProvider;
use crate::error::{CoreError, Result};
use crate::frame;
use crate::model::{GeneratedContent, GenerationContext, OutputMode, UpdateType};
use crate::ports::DisplayTransport;
use crate::registry::ContentRegistry;
use crate::retry::RetryEngine;
use crate::selector::ContentSelector;
use crate::throttled_logger::ThrottledLogger;

const MASTER_CIRCUIT: &str = "MASTER";

pub struct ContentOrchestrator {
    circuit: Arc<CircuitBreakerService>,
    data_provider: Arc<ContentDataProvider>,
    registry: Arc<ContentRegistry>,
    selector: Arc<ContentSelector>,
    retry_engine: Arc<RetryEngine>,
    transport: Arc<dyn DisplayTransport>,
    logger: Arc<ThrottledLogger>,
    fallback_generator_id: String,
    cache: Mutex<Option<GeneratedContent>>,
}

impl ContentOrchestrator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        circuit: Arc<CircuitBreakerService>,
        data_provider: Arc<ContentDataProvider>,
        registry: Arc<ContentRegistry>,
        selector: Arc<ContentSelector>,
        retry_engine: Arc<RetryEngine>,
        transport: Arc<dyn DisplayTransport>,
        logger: Arc<ThrottledLogger>,
        fallback_generator_id: impl Into<String>,
    ) -> Self {
        Self {
            circuit,
            data_provider,
            registry,
            selector,
            retry_engine,
            transport,
            logger,
            fallback_generator_id: fallback_generator_id.into(),
            cache: Mutex::new(None),
        }
    }

    pub async fn get_cached_content(&self) -> Option<GeneratedContent> {
        self.cache.lock().await.clone()
    }

    pub async fn clear_cache(&self) {
        *self.cache.lock().await = None;
    }

    /// Runs the full pipeline for one refresh. Concurrent callers are
    /// serialized by the cache mutex, which is held for the duration of
    /// the call so pipeline steps stay strictly sequential.
    pub async fn generate_and_send(&self, mut context: GenerationContext) -> Result<()> {
        let mut cache = self.cache.lock().await;

        if self.circuit.is_circuit_open(MASTER_CIRCUIT) {
            self.logger.warn("master-circuit-open", "MASTER circuit is off, skipping refresh");
            return Ok(());
        }

        if context.update_type == UpdateType::Major {
            context.data = Some(self.data_provider.fetch_data().await);
        }

        if context.update_type == UpdateType::Minor {
            return self.handle_minor(&mut cache, &context).await;
        }

        self.handle_major(&mut cache, &context).await
    }

    async fn handle_minor(
        &self,
        cache: &mut Option<GeneratedContent>,
        context: &GenerationContext,
    ) -> Result<()> {
        let Some(cached) = cache.as_ref() else {
            return Err(CoreError::internal("no cached content for minor refresh"));
        };

        match cached.output_mode {
            OutputMode::Layout => {
                let layout = cached.layout.as_ref().expect("layout mode always has a layout").character_codes;
                self.transport.send_layout(&layout).await?;
            }
            OutputMode::Text => {
                let frame = frame::decorate(&cached.text, context.timestamp, context.data.as_ref(), None);
                self.transport.send_layout(&frame.layout).await?;
            }
        }
        Ok(())
    }

    async fn handle_major(
        &self,
        cache: &mut Option<GeneratedContent>,
        context: &GenerationContext,
    ) -> Result<()> {
        let selected = self
            .selector
            .select(&self.registry, context, &self.circuit)
            .ok_or_else(|| CoreError::internal("no eligible generator and no fallback registered"))?;

        let generated = match self
            .retry_engine
            .generate_with_retry(&selected, context, &self.circuit)
            .await
        {
            Ok(content) => Some((selected.id.clone(), selected.apply_frame, content)),
            Err(e) => {
                self.logger.warn(
                    "generator-exhausted",
                    &format!("generator '{}' exhausted retries: {e}", selected.id),
                );
                self.try_fallback(context).await?
            }
        };

        let Some((generator_id, apply_frame, content)) = generated else {
            self.logger.error("fallback-failed", "fallback generator also failed, no content sent");
            return Ok(());
        };

        self.decorate_and_send(context, apply_frame, &content).await?;

        self.selector.record_usage(&generator_id, context.timestamp);
        *cache = Some(content);
        Ok(())
    }

    async fn try_fallback(
        &self,
        context: &GenerationContext,
    ) -> Result<Option<(String, bool, GeneratedContent)>> {
        let Some(fallback) = self.registry.get_by_id(&self.fallback_generator_id) else {
            return Ok(None);
        };

        match self.retry_engine.generate_with_retry(&fallback, context, &self.circuit).await {
            Ok(content) => Ok(Some((fallback.id.clone(), fallback.apply_frame, content))),
            Err(e) => {
                warn!(error = %e, "fallback generator failed");
                Ok(None)
            }
        }
    }

    async fn decorate_and_send(
        &self,
        context: &GenerationContext,
        apply_frame: bool,
        content: &GeneratedContent,
    ) -> Result<()> {
        match content.output_mode {
            OutputMode::Layout => {
                let layout = content.layout.as_ref().expect("layout mode always has a layout");
                self.transport.send_layout(&layout.character_codes).await?;
            }
            OutputMode::Text if apply_frame => {
                let frame = frame::decorate(&content.text, context.timestamp, context.data.as_ref(), None);
                if !frame.warnings.is_empty() {
                    info!(warnings = ?frame.warnings, "frame decoration produced warnings");
                }
                self.transport.send_layout(&frame.layout).await?;
            }
            OutputMode::Text => {
                self.transport.send_text(&content.text).await?;
            }
        }
        Ok(())
    }
}

//! Content Selector (spec §4.6) — priority-tiered, history-aware, and
//! event-aware generator selection. Selection itself is side-effect
//! free; the orchestrator calls `record_usage` after a successful run.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Timelike, Utc};

use crate::circuit::CircuitBreakerService;
use crate::model::{GenerationContext, Priority};
use crate::registry::{ContentRegistry, GeneratorRegistration};

pub struct ContentSelector {
    last_used: Mutex<HashMap<String, DateTime<Utc>>>,
}

impl Default for ContentSelector {
    fn default() -> Self {
        Self::new()
    }
}

impl ContentSelector {
    pub fn new() -> Self {
        Self {
            last_used: Mutex::new(HashMap::new()),
        }
    }

    fn circuit_allows(&self, reg: &GeneratorRegistration, breaker: &CircuitBreakerService) -> bool {
        match &reg.gating_circuit {
            Some(circuit_id) => !breaker.is_circuit_open(circuit_id),
            None => true,
        }
    }

    fn in_schedule_window(reg: &GeneratorRegistration, timestamp: DateTime<Utc>) -> bool {
        let Some((start, end)) = reg.schedule_window else {
            return true;
        };
        let hour = timestamp.hour();
        if start <= end {
            hour >= start && hour < end
        } else {
            hour >= start || hour < end
        }
    }

    fn last_used_at(&self, id: &str) -> Option<DateTime<Utc>> {
        self.last_used.lock().expect("lock poisoned").get(id).copied()
    }

    /// Runs the priority cascade and returns the chosen registration, or
    /// `None` only if no P3 fallback is registered (a startup-validation
    /// error, since spec mandates a fallback always be present).
    pub fn select(
        &self,
        registry: &ContentRegistry,
        context: &GenerationContext,
        breaker: &CircuitBreakerService,
    ) -> Option<Arc<GeneratorRegistration>> {
        let registrations = registry.list();
        let eligible: Vec<_> = registrations
            .iter()
            .filter(|r| self.circuit_allows(r, breaker))
            .collect();

        if let Some(event) = &context.event_data {
            let p0 = eligible
                .iter()
                .filter(|r| r.priority == Priority::P0)
                .find(|r| {
                    r.event_pattern
                        .as_ref()
                        .is_some_and(|p| p.matches(&event.event_type))
                });
            if let Some(reg) = p0 {
                return Some(Arc::clone(reg));
            }
        }

        let p1_candidate = eligible
            .iter()
            .filter(|r| r.priority == Priority::P1)
            .filter(|r| Self::in_schedule_window(r, context.timestamp))
            .min_by_key(|r| self.last_used_at(&r.id).unwrap_or(DateTime::<Utc>::MIN_UTC));
        if let Some(reg) = p1_candidate {
            return Some(Arc::clone(reg));
        }

        let p2_candidate = eligible
            .iter()
            .filter(|r| r.priority == Priority::P2)
            .min_by_key(|r| self.last_used_at(&r.id).unwrap_or(DateTime::<Utc>::MIN_UTC));
        if let Some(reg) = p2_candidate {
            return Some(Arc::clone(reg));
        }

        eligible
            .iter()
            .find(|r| r.priority == Priority::P3)
            .map(|r| Arc::clone(r))
    }

    pub fn record_usage(&self, id: &str, timestamp: DateTime<Utc>) {
        self.last_used.lock().expect("lock poisoned").insert(id.to_string(), timestamp);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::circuit::InMemoryCircuitBreakerStore;
    use crate::error::Result;
    use crate::model::{EventData, GeneratedContent};
    use crate::pattern::Pattern;
    use crate::registry::ContentGenerator;
    use crate::tier::Tier;
    use async_trait::async_trait;

    struct Stub(&'static str);

    #[async_trait]
    impl ContentGenerator for Stub {
        fn id(&self) -> &str {
            self.0
        }

        async fn generate(&self, _context: &GenerationContext) -> Result<GeneratedContent> {
            Ok(GeneratedContent::text(self.0))
        }
    }

    fn reg(id: &'static str, priority: Priority) -> GeneratorRegistration {
        GeneratorRegistration {
            id: id.to_string(),
            name: id.to_string(),
            priority,
            model_tier: Tier::Medium,
            apply_frame: true,
            format_options: None,
            event_pattern: None,
            gating_circuit: None,
            schedule_window: None,
            generator: Arc::new(Stub(id)),
        }
    }

    fn breaker() -> CircuitBreakerService {
        CircuitBreakerService::new(Arc::new(InMemoryCircuitBreakerStore::default()))
    }

    #[tokio::test]
    async fn falls_back_to_p3_when_nothing_else_eligible() {
        let registry = ContentRegistry::new();
        registry.register(reg("fallback", Priority::P3)).await.unwrap();
        let selector = ContentSelector::new();
        let breaker = breaker();

        let context = GenerationContext::major(Utc::now());
        let chosen = selector.select(&registry, &context, &breaker).unwrap();
        assert_eq!(chosen.id, "fallback");
    }

    #[tokio::test]
    async fn p0_matches_event_pattern() {
        let registry = ContentRegistry::new();
        let mut p0 = reg("doorbell", Priority::P0);
        p0.event_pattern = Some(Pattern::compile("doorbell.pressed", "doorbell").unwrap());
        registry.register(p0).await.unwrap();
        registry.register(reg("fallback", Priority::P3)).await.unwrap();
        let selector = ContentSelector::new();
        let breaker = breaker();

        let context = GenerationContext::major(Utc::now()).with_event(EventData {
            event_type: "doorbell.pressed".to_string(),
            payload: serde_json::Value::Null,
        });
        let chosen = selector.select(&registry, &context, &breaker).unwrap();
        assert_eq!(chosen.id, "doorbell");
    }

    #[tokio::test]
    async fn p2_rotation_prefers_oldest_last_used() {
        let registry = ContentRegistry::new();
        registry.register(reg("a", Priority::P2)).await.unwrap();
        registry.register(reg("b", Priority::P2)).await.unwrap();
        registry.register(reg("fallback", Priority::P3)).await.unwrap();
        let selector = ContentSelector::new();
        let breaker = breaker();

        selector.record_usage("a", Utc::now());
        let context = GenerationContext::major(Utc::now());
        let chosen = selector.select(&registry, &context, &breaker).unwrap();
        assert_eq!(chosen.id, "b");
    }

    #[tokio::test]
    async fn gated_circuit_excludes_registration() {
        let registry = ContentRegistry::new();
        let mut bedtime = reg("bedtime", Priority::P2);
        bedtime.gating_circuit = Some("SLEEP_MODE".to_string());
        registry.register(bedtime).await.unwrap();
        registry.register(reg("fallback", Priority::P3)).await.unwrap();
        let selector = ContentSelector::new();
        let breaker = breaker();
        breaker
            .initialize_circuit(crate::circuit::CircuitBreakerDef {
                circuit_id: "SLEEP_MODE".to_string(),
                circuit_type: crate::circuit::CircuitType::Manual,
                default_state: crate::circuit::CircuitState::Off,
                failure_threshold: 1,
            })
            .await;

        let context = GenerationContext::major(Utc::now());
        let chosen = selector.select(&registry, &context, &breaker).unwrap();
        assert_eq!(chosen.id, "fallback");
    }
}

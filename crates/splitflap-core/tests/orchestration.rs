//! End-to-end scenarios across registry, selector, retry engine, circuit
//! breaker, and orchestrator — exercised only through public API, the
//! way the teacher's crate exercises cross-module behavior in
//! `tests/*_tests.rs`.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex as StdMutex};

use async_trait::async_trait;
use splitflap_core::circuit::{CircuitBreakerDef, CircuitBreakerService, CircuitState, CircuitType, InMemoryCircuitBreakerStore};
use splitflap_core::config::RetryLimits;
use splitflap_core::data_provider::{ColorBarService, ContentDataProvider, WeatherService};
use splitflap_core::model::{Grid, Priority};
use splitflap_core::pattern::Pattern;
use splitflap_core::ports::{DisplayTransport, TransportStatus};
use splitflap_core::registry::GeneratorRegistration;
use splitflap_core::tier::Tier;
use splitflap_core::trigger::{TriggerMatcher, TriggersConfig};
use splitflap_core::trigger::config::TriggerDef;
use splitflap_core::{CoreError, ContentGenerator, ContentOrchestrator, ContentRegistry, ContentSelector, GeneratedContent, GenerationContext, Result, RetryEngine};

struct NoWeather;
#[async_trait]
impl WeatherService for NoWeather {
    async fn get_weather(&self) -> Result<Option<splitflap_core::model::WeatherData>> {
        Ok(None)
    }
}

struct NoColors;
#[async_trait]
impl ColorBarService for NoColors {
    async fn get_colors(&self) -> Result<[i32; 6]> {
        Ok([60, 60, 60, 60, 60, 60])
    }
}

struct RecordingTransport {
    sent_layouts: StdMutex<Vec<Grid>>,
}

impl RecordingTransport {
    fn new() -> Self {
        Self { sent_layouts: StdMutex::new(Vec::new()) }
    }
}

#[async_trait]
impl DisplayTransport for RecordingTransport {
    async fn send_text(&self, _text: &str) -> Result<()> {
        Ok(())
    }
    async fn send_layout(&self, grid: &Grid) -> Result<()> {
        self.sent_layouts.lock().unwrap().push(*grid);
        Ok(())
    }
    async fn send_layout_with_animation(&self, grid: &Grid) -> Result<()> {
        self.send_layout(grid).await
    }
    async fn read_message(&self) -> Result<Grid> {
        Ok([[0; 22]; 6])
    }
    async fn validate_connection(&self) -> Result<TransportStatus> {
        Ok(TransportStatus { connected: true })
    }
}

/// Always fails with a retryable error, tagged to a provider name so the
/// retry engine can trip that provider's circuit.
struct AlwaysFailsGenerator {
    id: &'static str,
    provider: &'static str,
    calls: AtomicU32,
}

#[async_trait]
impl ContentGenerator for AlwaysFailsGenerator {
    fn id(&self) -> &str {
        self.id
    }
    async fn generate(&self, _context: &GenerationContext) -> Result<GeneratedContent> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(CoreError::Transient { provider: self.provider.to_string(), message: "simulated outage".to_string() })
    }
}

struct StaticGenerator(&'static str, &'static str);
#[async_trait]
impl ContentGenerator for StaticGenerator {
    fn id(&self) -> &str {
        self.0
    }
    async fn generate(&self, _context: &GenerationContext) -> Result<GeneratedContent> {
        Ok(GeneratedContent::text(self.1))
    }
}

fn registration(id: &'static str, priority: Priority, generator: Arc<dyn ContentGenerator>) -> GeneratorRegistration {
    GeneratorRegistration {
        id: id.to_string(),
        name: id.to_string(),
        priority,
        model_tier: Tier::Light,
        apply_frame: true,
        format_options: None,
        event_pattern: None,
        gating_circuit: None,
        schedule_window: None,
        generator,
    }
}

async fn master_circuit() -> Arc<CircuitBreakerService> {
    let circuit = Arc::new(CircuitBreakerService::new(Arc::new(InMemoryCircuitBreakerStore::default())));
    circuit
        .initialize_circuit(CircuitBreakerDef {
            circuit_id: "MASTER".to_string(),
            circuit_type: CircuitType::Manual,
            default_state: CircuitState::On,
            failure_threshold: 1,
        })
        .await;
    circuit
}

async fn with_provider_circuit(circuit: &CircuitBreakerService, name: &str, failure_threshold: u32) {
    circuit
        .initialize_circuit(CircuitBreakerDef {
            circuit_id: name.to_string(),
            circuit_type: CircuitType::Provider,
            default_state: CircuitState::On,
            failure_threshold,
        })
        .await;
}

/// A provider-backed generator that always fails should trip its own
/// provider circuit, and a failing P2 generator should fall through to
/// the registered P3 fallback rather than leaving the display dark.
#[tokio::test]
async fn failing_generator_falls_back_to_static_p3() {
    let circuit = master_circuit().await;
    with_provider_circuit(&circuit, "PROVIDER_OPENAI", 2).await;

    let registry = Arc::new(ContentRegistry::new());
    let flaky = Arc::new(AlwaysFailsGenerator { id: "flaky", provider: "openai", calls: AtomicU32::new(0) });
    registry.register(registration("flaky", Priority::P2, flaky.clone())).await.unwrap();
    registry
        .register(registration("fallback", Priority::P3, Arc::new(StaticGenerator("fallback", "STAY FOCUSED"))))
        .await
        .unwrap();

    let data_provider = Arc::new(ContentDataProvider::new(Arc::new(NoWeather), Arc::new(NoColors)));
    let selector = Arc::new(ContentSelector::new());
    let retry_engine = Arc::new(RetryEngine::new(RetryLimits { max_attempts: 2, initial_delay_ms: 1, max_delay_ms: 2 }));
    let transport = Arc::new(RecordingTransport::new());
    let logger = Arc::new(splitflap_core::throttled_logger::ThrottledLogger::default());

    let orchestrator = ContentOrchestrator::new(
        circuit.clone(),
        data_provider,
        registry,
        selector,
        retry_engine,
        transport.clone(),
        logger,
        "fallback",
    );

    orchestrator.generate_and_send(GenerationContext::major(chrono::Utc::now())).await.unwrap();

    assert_eq!(transport.sent_layouts.lock().unwrap().len(), 1);
    assert!(flaky.calls.load(Ordering::SeqCst) >= 1);
    assert!(circuit.is_circuit_open("PROVIDER_OPENAI"));

    let cached = orchestrator.get_cached_content().await.unwrap();
    assert_eq!(cached.text, "STAY FOCUSED");
}

/// Once a generator's gating circuit is off, the selector must skip it
/// even though it is otherwise the highest-priority eligible entry.
#[tokio::test]
async fn gated_circuit_routes_around_disabled_generator() {
    let circuit = master_circuit().await;
    circuit
        .initialize_circuit(CircuitBreakerDef {
            circuit_id: "SLEEP_MODE".to_string(),
            circuit_type: CircuitType::Manual,
            default_state: CircuitState::Off,
            failure_threshold: 1,
        })
        .await;

    let registry = ContentRegistry::new();
    let mut gated = registration("night-mode", Priority::P2, Arc::new(StaticGenerator("night-mode", "GOOD NIGHT")));
    gated.gating_circuit = Some("SLEEP_MODE".to_string());
    registry.register(gated).await.unwrap();
    registry
        .register(registration("fallback", Priority::P3, Arc::new(StaticGenerator("fallback", "STAY FOCUSED"))))
        .await
        .unwrap();

    let selector = ContentSelector::new();
    let context = GenerationContext::major(chrono::Utc::now());
    let selected = selector.select(&registry, &context, &circuit).expect("fallback always eligible");
    assert_eq!(selected.id, "fallback");
}

/// Matching entity, wrong state: no match. Matching entity, matching
/// state, then immediately again: the second call is debounced.
#[tokio::test]
async fn trigger_matcher_debounces_repeat_events() {
    let config = TriggersConfig {
        triggers: vec![TriggerDef {
            name: "front-door".to_string(),
            entity_pattern: "binary_sensor.front_door".to_string(),
            state_filter: Some(vec!["on".to_string()]),
            debounce_seconds: 300,
        }],
    };
    let matcher = TriggerMatcher::from_config(&config).unwrap();

    let wrong_state = matcher.match_event("binary_sensor.front_door", "off");
    assert!(!wrong_state.matched);

    let first = matcher.match_event("binary_sensor.front_door", "on");
    assert!(first.matched);
    assert!(!first.debounced);

    let second = matcher.match_event("binary_sensor.front_door", "on");
    assert!(second.matched);
    assert!(second.debounced);
}

/// P0 event-pattern generators take priority over P2/P3 regardless of
/// registration order, as long as their gating circuit (if any) allows it.
#[tokio::test]
async fn p0_event_pattern_preempts_lower_priority_generators() {
    let circuit = master_circuit().await;
    let registry = ContentRegistry::new();

    registry
        .register(registration("fallback", Priority::P3, Arc::new(StaticGenerator("fallback", "STAY FOCUSED"))))
        .await
        .unwrap();

    let mut doorbell = registration("doorbell", Priority::P0, Arc::new(StaticGenerator("doorbell", "SOMEONE IS HERE")));
    doorbell.event_pattern = Some(Pattern::compile("doorbell_pressed", "doorbell").unwrap());
    registry.register(doorbell).await.unwrap();

    let selector = ContentSelector::new();
    let context = GenerationContext::major(chrono::Utc::now())
        .with_event(splitflap_core::model::EventData { event_type: "doorbell_pressed".to_string(), payload: serde_json::Value::Null });

    let selected = selector.select(&registry, &context, &circuit).expect("doorbell should match");
    assert_eq!(selected.id, "doorbell");
}

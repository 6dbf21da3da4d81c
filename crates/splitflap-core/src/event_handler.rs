//! Event Handler (spec §4.10) — subscribes to the automation bus and
//! routes events to the orchestrator, trigger matcher, and circuit
//! breaker service. The bus callback is synchronous, so it only
//! forwards onto an internal channel; a background task does the actual
//! (suspending) work, decoupling the bus's callback from orchestration —
//! the same spawn-and-forward shape as the teacher's `team.rs` callback
//! handling.

use std::sync::{Arc, RwLock};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::warn;

use crate::circuit::{CircuitBreakerService, CircuitState};
use crate::model::{EventData, GenerationContext};
use crate::orchestrator::ContentOrchestrator;
use crate::ports::{AutomationBus, Unsubscribe};
use crate::throttled_logger::ThrottledLogger;
use crate::trigger::TriggerMatcher;

const MASTER_CIRCUIT: &str = "MASTER";

enum InboundEvent {
    Refresh,
    StateChanged { entity_id: String, new_state: String },
    CircuitControl { circuit_id: String, action: String },
}

pub struct EventHandler {
    bus: Arc<dyn AutomationBus>,
    circuit: Arc<CircuitBreakerService>,
    orchestrator: Arc<ContentOrchestrator>,
    trigger_matcher: RwLock<Arc<TriggerMatcher>>,
    logger: Arc<ThrottledLogger>,
    subscriptions: std::sync::Mutex<Vec<Box<dyn Unsubscribe>>>,
    worker: std::sync::Mutex<Option<JoinHandle<()>>>,
}

impl EventHandler {
    pub fn new(
        bus: Arc<dyn AutomationBus>,
        circuit: Arc<CircuitBreakerService>,
        orchestrator: Arc<ContentOrchestrator>,
        trigger_matcher: Arc<TriggerMatcher>,
        logger: Arc<ThrottledLogger>,
    ) -> Self {
        Self {
            bus,
            circuit,
            orchestrator,
            trigger_matcher: RwLock::new(trigger_matcher),
            logger,
            subscriptions: std::sync::Mutex::new(Vec::new()),
            worker: std::sync::Mutex::new(None),
        }
    }

    /// Atomically swaps in a freshly reloaded trigger config, per spec
    /// §4.10 "hot-reload rebinds the Trigger Matcher instance".
    pub fn rebind_trigger_matcher(&self, matcher: Arc<TriggerMatcher>) {
        *self.trigger_matcher.write().expect("lock poisoned") = matcher;
    }

    pub async fn start(self: &Arc<Self>) -> Result<(), crate::error::CoreError> {
        self.bus.connect().await?;

        let (tx, rx) = mpsc::channel(256);

        let refresh_tx = tx.clone();
        let refresh_unsub = self.bus.subscribe_to_events(
            "vestaboard_refresh",
            Box::new(move |_payload| {
                let _ = refresh_tx.try_send(InboundEvent::Refresh);
            }),
        );

        let state_tx = tx.clone();
        let state_unsub = self.bus.subscribe_to_events(
            "state_changed",
            Box::new(move |payload| {
                let entity_id = payload["entity_id"].as_str().unwrap_or_default().to_string();
                let new_state = payload["new_state"]["state"].as_str().unwrap_or_default().to_string();
                let _ = state_tx.try_send(InboundEvent::StateChanged { entity_id, new_state });
            }),
        );

        let circuit_tx = tx;
        let circuit_unsub = self.bus.subscribe_to_events(
            "vestaboard_circuit_control",
            Box::new(move |payload| {
                let circuit_id = payload["circuit_id"].as_str().unwrap_or_default().to_string();
                let action = payload["action"].as_str().unwrap_or_default().to_string();
                let _ = circuit_tx.try_send(InboundEvent::CircuitControl { circuit_id, action });
            }),
        );

        *self.subscriptions.lock().expect("lock poisoned") = vec![refresh_unsub, state_unsub, circuit_unsub];

        let handler = Arc::clone(self);
        let task = tokio::spawn(async move { handler.run(rx).await });
        *self.worker.lock().expect("lock poisoned") = Some(task);
        Ok(())
    }

    async fn run(&self, mut rx: mpsc::Receiver<InboundEvent>) {
        while let Some(event) = rx.recv().await {
            match event {
                InboundEvent::Refresh => self.handle_refresh(None).await,
                InboundEvent::StateChanged { entity_id, new_state } => {
                    self.handle_state_changed(&entity_id, &new_state).await
                }
                InboundEvent::CircuitControl { circuit_id, action } => {
                    self.handle_circuit_control(&circuit_id, &action).await
                }
            }
        }
    }

    async fn handle_refresh(&self, event_data: Option<EventData>) {
        if self.circuit.is_circuit_open(MASTER_CIRCUIT) {
            self.logger.warn("master-circuit-open", "MASTER circuit is off, dropping refresh event");
            return;
        }

        let mut context = GenerationContext::major(chrono::Utc::now());
        if let Some(event) = event_data {
            context = context.with_event(event);
        }

        if let Err(e) = self.orchestrator.generate_and_send(context).await {
            warn!(error = %e, "major refresh failed");
        }
    }

    async fn handle_state_changed(&self, entity_id: &str, new_state: &str) {
        let matcher = Arc::clone(&self.trigger_matcher.read().expect("lock poisoned"));
        let result = matcher.match_event(entity_id, new_state);
        if !result.matched || result.debounced {
            return;
        }

        self.handle_refresh(Some(EventData {
            event_type: "state_changed".to_string(),
            payload: serde_json::json!({"entity_id": entity_id, "new_state": new_state}),
        }))
        .await;
    }

    async fn handle_circuit_control(&self, circuit_id: &str, action: &str) {
        match action {
            "on" => self.circuit.set_circuit_state(circuit_id, CircuitState::On).await,
            "off" => self.circuit.set_circuit_state(circuit_id, CircuitState::Off).await,
            "reset" => self.circuit.reset_provider_circuit(circuit_id).await,
            other => {
                self.logger.warn("unknown-circuit-action", &format!("unknown circuit action '{other}' for {circuit_id}"));
            }
        }
    }

    pub async fn shutdown(&self) {
        if let Some(task) = self.worker.lock().expect("lock poisoned").take() {
            task.abort();
        }
        for sub in self.subscriptions.lock().expect("lock poisoned").drain(..) {
            sub.unsubscribe();
        }
        let _ = self.bus.disconnect().await;
    }
}

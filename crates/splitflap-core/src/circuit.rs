//! Circuit Breaker Service (spec §4.1) — named on/off/half-open breakers
//! gating either the whole pipeline (`MASTER`), a mode (`SLEEP_MODE`), or
//! a single upstream provider (`PROVIDER_OPENAI`). Shape generalized from
//! the teacher's single-provider `resilience::CircuitBreaker` into a
//! named-breaker registry, following the `RwLock<HashMap<String, ...>>`
//! pattern used for provider registries elsewhere in the pack.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitType {
    Manual,
    Provider,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    On,
    Off,
    HalfOpen,
}

/// Persisted shape of a breaker (spec §3). Keyed by `circuit_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CircuitBreakerState {
    pub circuit_id: String,
    pub circuit_type: CircuitType,
    pub state: CircuitState,
    pub default_state: CircuitState,
    pub failure_count: u32,
    pub success_count: u32,
    pub failure_threshold: u32,
    pub last_failure_at: Option<DateTime<Utc>>,
    pub last_success_at: Option<DateTime<Utc>>,
    pub state_changed_at: DateTime<Utc>,
}

/// Declares a breaker at `initialize_circuit` time.
#[derive(Debug, Clone)]
pub struct CircuitBreakerDef {
    pub circuit_id: String,
    pub circuit_type: CircuitType,
    pub default_state: CircuitState,
    pub failure_threshold: u32,
}

impl CircuitBreakerState {
    fn from_def(def: &CircuitBreakerDef, now: DateTime<Utc>) -> Self {
        Self {
            circuit_id: def.circuit_id.clone(),
            circuit_type: def.circuit_type,
            state: def.default_state,
            default_state: def.default_state,
            failure_count: 0,
            success_count: 0,
            failure_threshold: def.failure_threshold,
            last_failure_at: None,
            last_success_at: None,
            state_changed_at: now,
        }
    }
}

/// The `circuit_breaker_state` slice of the external `PersistenceStore`
/// port (spec §6) — the only persistence surface this core reads back.
#[async_trait]
pub trait CircuitBreakerStore: Send + Sync {
    async fn load_all(&self) -> Result<Vec<CircuitBreakerState>>;
    async fn upsert(&self, state: &CircuitBreakerState) -> Result<()>;
}

/// In-memory, no-op store — used when no persistence backend is wired
/// up (tests, or a deployment that accepts breaker state resetting on
/// restart). Reads/writes never fail, so it never exercises the
/// fail-open path itself.
#[derive(Default)]
pub struct InMemoryCircuitBreakerStore {
    rows: RwLock<HashMap<String, CircuitBreakerState>>,
}

#[async_trait]
impl CircuitBreakerStore for InMemoryCircuitBreakerStore {
    async fn load_all(&self) -> Result<Vec<CircuitBreakerState>> {
        Ok(self.rows.read().expect("lock poisoned").values().cloned().collect())
    }

    async fn upsert(&self, state: &CircuitBreakerState) -> Result<()> {
        self.rows
            .write()
            .expect("lock poisoned")
            .insert(state.circuit_id.clone(), state.clone());
        Ok(())
    }
}

/// Manages named breakers. Every read/write handles store failure
/// internally: reads fall back to conservative defaults, writes are
/// dropped with a warning — the application must keep running when the
/// persistence backend is unavailable (spec §4.1 "Failure semantics").
pub struct CircuitBreakerService {
    store: std::sync::Arc<dyn CircuitBreakerStore>,
    cache: RwLock<HashMap<String, CircuitBreakerState>>,
}

impl CircuitBreakerService {
    pub fn new(store: std::sync::Arc<dyn CircuitBreakerStore>) -> Self {
        Self {
            store,
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Populate the in-memory cache from the store at startup. Failure
    /// here just leaves the cache empty; subsequent `initialize_circuit`
    /// calls still succeed.
    pub async fn load(&self) {
        match self.store.load_all().await {
            Ok(rows) => {
                let mut cache = self.cache.write().expect("lock poisoned");
                for row in rows {
                    cache.insert(row.circuit_id.clone(), row);
                }
            }
            Err(e) => warn!(error = %e, "failed to load circuit breaker state at startup"),
        }
    }

    /// Idempotent insert keyed on `circuit_id` — never overwrites an
    /// existing row, even with a different `default_state`.
    pub async fn initialize_circuit(&self, def: CircuitBreakerDef) {
        let now = Utc::now();
        let already_present = self.cache.read().expect("lock poisoned").contains_key(&def.circuit_id);
        if already_present {
            return;
        }
        let state = CircuitBreakerState::from_def(&def, now);
        self.cache
            .write()
            .expect("lock poisoned")
            .insert(def.circuit_id.clone(), state.clone());
        if let Err(e) = self.store.upsert(&state).await {
            warn!(circuit_id = %def.circuit_id, error = %e, "failed to persist new circuit state");
        }
    }

    /// Returns true iff the stored state is `Off`. Fails open (returns
    /// false) on an uninitialized circuit or a store error, never
    /// blocking the pipeline on a missing breaker.
    pub fn is_circuit_open(&self, circuit_id: &str) -> bool {
        self.cache
            .read()
            .expect("lock poisoned")
            .get(circuit_id)
            .map(|s| s.state == CircuitState::Off)
            .unwrap_or(false)
    }

    pub fn get_state(&self, circuit_id: &str) -> Option<CircuitBreakerState> {
        self.cache.read().expect("lock poisoned").get(circuit_id).cloned()
    }

    pub async fn set_circuit_state(&self, circuit_id: &str, state: CircuitState) {
        let now = Utc::now();
        let updated = {
            let mut cache = self.cache.write().expect("lock poisoned");
            let Some(row) = cache.get_mut(circuit_id) else {
                warn!(circuit_id, "set_circuit_state on unknown circuit");
                return;
            };
            row.state = state;
            row.state_changed_at = now;
            row.clone()
        };
        self.persist(&updated).await;
    }

    /// Atomically increments `failure_count`. For a provider breaker in
    /// `On` state, trips to `Off` once the threshold is reached.
    pub async fn record_failure(&self, circuit_id: &str) -> u32 {
        let now = Utc::now();
        let Some(updated) = ({
            let mut cache = self.cache.write().expect("lock poisoned");
            cache.get_mut(circuit_id).map(|row| {
                row.failure_count += 1;
                row.last_failure_at = Some(now);
                if row.circuit_type == CircuitType::Provider
                    && row.state == CircuitState::On
                    && row.failure_count >= row.failure_threshold
                {
                    row.state = CircuitState::Off;
                    row.state_changed_at = now;
                }
                row.clone()
            })
        }) else {
            warn!(circuit_id, "record_failure on unknown circuit");
            return 0;
        };
        let count = updated.failure_count;
        self.persist(&updated).await;
        count
    }

    /// For provider breakers in `HalfOpen`, a success closes the breaker
    /// (`On`) and resets both counters.
    pub async fn record_success(&self, circuit_id: &str) -> u32 {
        let now = Utc::now();
        let Some(updated) = ({
            let mut cache = self.cache.write().expect("lock poisoned");
            cache.get_mut(circuit_id).map(|row| {
                row.success_count += 1;
                row.last_success_at = Some(now);
                if row.circuit_type == CircuitType::Provider && row.state == CircuitState::HalfOpen {
                    row.state = CircuitState::On;
                    row.failure_count = 0;
                    row.success_count = 0;
                    row.state_changed_at = now;
                }
                row.clone()
            })
        }) else {
            warn!(circuit_id, "record_success on unknown circuit");
            return 0;
        };
        let count = updated.success_count;
        self.persist(&updated).await;
        count
    }

    pub async fn reset_provider_circuit(&self, circuit_id: &str) {
        let now = Utc::now();
        let updated = {
            let mut cache = self.cache.write().expect("lock poisoned");
            let Some(row) = cache.get_mut(circuit_id) else {
                warn!(circuit_id, "reset_provider_circuit on unknown circuit");
                return;
            };
            row.state = CircuitState::On;
            row.failure_count = 0;
            row.success_count = 0;
            row.state_changed_at = now;
            row.clone()
        };
        self.persist(&updated).await;
    }

    async fn persist(&self, state: &CircuitBreakerState) {
        if let Err(e) = self.store.upsert(state).await {
            warn!(circuit_id = %state.circuit_id, error = %e, "failed to persist circuit breaker state, write dropped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> CircuitBreakerService {
        CircuitBreakerService::new(std::sync::Arc::new(InMemoryCircuitBreakerStore::default()))
    }

    async fn provider_circuit(svc: &CircuitBreakerService, id: &str, threshold: u32) {
        svc.initialize_circuit(CircuitBreakerDef {
            circuit_id: id.to_string(),
            circuit_type: CircuitType::Provider,
            default_state: CircuitState::On,
            failure_threshold: threshold,
        })
        .await;
    }

    #[tokio::test]
    async fn failures_at_threshold_trip_the_breaker() {
        let svc = service();
        provider_circuit(&svc, "PROVIDER_OPENAI", 3).await;
        assert!(!svc.is_circuit_open("PROVIDER_OPENAI"));

        svc.record_failure("PROVIDER_OPENAI").await;
        svc.record_failure("PROVIDER_OPENAI").await;
        assert!(!svc.is_circuit_open("PROVIDER_OPENAI"));
        svc.record_failure("PROVIDER_OPENAI").await;
        assert!(svc.is_circuit_open("PROVIDER_OPENAI"));
    }

    #[tokio::test]
    async fn initialize_circuit_is_idempotent() {
        let svc = service();
        provider_circuit(&svc, "PROVIDER_OPENAI", 5).await;
        svc.set_circuit_state("PROVIDER_OPENAI", CircuitState::Off).await;

        svc.initialize_circuit(CircuitBreakerDef {
            circuit_id: "PROVIDER_OPENAI".to_string(),
            circuit_type: CircuitType::Provider,
            default_state: CircuitState::On,
            failure_threshold: 5,
        })
        .await;

        assert_eq!(svc.get_state("PROVIDER_OPENAI").unwrap().state, CircuitState::Off);
    }

    #[tokio::test]
    async fn set_then_get_round_trips() {
        let svc = service();
        provider_circuit(&svc, "MASTER", 5).await;
        svc.set_circuit_state("MASTER", CircuitState::Off).await;
        assert_eq!(svc.get_state("MASTER").unwrap().state, CircuitState::Off);
    }

    #[tokio::test]
    async fn reset_clears_counters_and_closes() {
        let svc = service();
        provider_circuit(&svc, "PROVIDER_OPENAI", 2).await;
        svc.record_failure("PROVIDER_OPENAI").await;
        svc.record_failure("PROVIDER_OPENAI").await;
        assert!(svc.is_circuit_open("PROVIDER_OPENAI"));

        svc.reset_provider_circuit("PROVIDER_OPENAI").await;
        let state = svc.get_state("PROVIDER_OPENAI").unwrap();
        assert_eq!(state.state, CircuitState::On);
        assert_eq!(state.failure_count, 0);
        assert_eq!(state.success_count, 0);
    }

    #[tokio::test]
    async fn unknown_circuit_fails_open() {
        let svc = service();
        assert!(!svc.is_circuit_open("NEVER_REGISTERED"));
    }

    #[tokio::test]
    async fn half_open_success_closes_and_resets() {
        let svc = service();
        provider_circuit(&svc, "PROVIDER_ANTHROPIC", 1).await;
        svc.record_failure("PROVIDER_ANTHROPIC").await;
        assert!(svc.is_circuit_open("PROVIDER_ANTHROPIC"));

        svc.set_circuit_state("PROVIDER_ANTHROPIC", CircuitState::HalfOpen).await;
        svc.record_success("PROVIDER_ANTHROPIC").await;
        let state = svc.get_state("PROVIDER_ANTHROPIC").unwrap();
        assert_eq!(state.state, CircuitState::On);
        assert_eq!(state.failure_count, 0);
    }
}

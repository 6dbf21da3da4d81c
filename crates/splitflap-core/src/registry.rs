//! Content Registry (spec §4.5) — holds registered generator descriptors.
//! Shape generalized from the teacher's trait-object registries: a small
//! ordered `Vec` guarded by a lock (the collection is capped around 30
//! entries, so linear scans are fine), each entry pairing a descriptor
//! with a `dyn ContentGenerator` instance.

use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};
use crate::model::{FormatOptions, GeneratedContent, GenerationContext, Priority};
use crate::pattern::Pattern;
use crate::tier::Tier;

/// Anything that can produce `GeneratedContent` from a `GenerationContext`.
/// `validate` is async (spec §9 open question: awaited once, at
/// registration time, regardless of whether a concrete implementation
/// needs to suspend).
#[async_trait]
pub trait ContentGenerator: Send + Sync {
    fn id(&self) -> &str;

    async fn generate(&self, context: &GenerationContext) -> Result<GeneratedContent>;

    async fn validate(&self) -> Result<()> {
        Ok(())
    }
}

/// Static descriptor paired with a generator instance at registration.
pub struct GeneratorRegistration {
    pub id: String,
    pub name: String,
    pub priority: Priority,
    pub model_tier: Tier,
    pub apply_frame: bool,
    pub format_options: Option<FormatOptions>,
    pub event_pattern: Option<Pattern>,
    /// Named manual circuit that must be `on` for this registration to be
    /// eligible (e.g. `SLEEP_MODE` for bedtime-only generators).
    pub gating_circuit: Option<String>,
    /// P1-only: `[start_hour, end_hour)` in local time, wrapping past
    /// midnight if `start_hour > end_hour`. `None` matches any time.
    pub schedule_window: Option<(u32, u32)>,
    pub generator: Arc<dyn ContentGenerator>,
}

/// Serializable view of a registration, for admin/listing surfaces that
/// shouldn't see the generator trait object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratorDescriptor {
    pub id: String,
    pub name: String,
    pub priority: Priority,
    pub model_tier: Tier,
    pub apply_frame: bool,
}

impl From<&GeneratorRegistration> for GeneratorDescriptor {
    fn from(reg: &GeneratorRegistration) -> Self {
        Self {
            id: reg.id.clone(),
            name: reg.name.clone(),
            priority: reg.priority,
            model_tier: reg.model_tier,
            apply_frame: reg.apply_frame,
        }
    }
}

#[derive(Default)]
pub struct ContentRegistry {
    registrations: RwLock<Vec<Arc<GeneratorRegistration>>>,
}

impl ContentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validates the generator before inserting; an invalid generator is
    /// never registered and the validation error is surfaced to the
    /// caller unchanged.
    pub async fn register(&self, registration: GeneratorRegistration) -> Result<()> {
        registration
            .generator
            .validate()
            .await
            .map_err(|e| CoreError::generator(&registration.id, format!("failed validation: {e}")))?;

        let mut registrations = self.registrations.write().expect("lock poisoned");
        if registrations.iter().any(|r| r.id == registration.id) {
            return Err(CoreError::config(format!("generator id '{}' already registered", registration.id)));
        }
        registrations.push(Arc::new(registration));
        Ok(())
    }

    pub fn unregister(&self, id: &str) -> bool {
        let mut registrations = self.registrations.write().expect("lock poisoned");
        let before = registrations.len();
        registrations.retain(|r| r.id != id);
        registrations.len() != before
    }

    pub fn list(&self) -> Vec<Arc<GeneratorRegistration>> {
        self.registrations.read().expect("lock poisoned").clone()
    }

    pub fn get_by_id(&self, id: &str) -> Option<Arc<GeneratorRegistration>> {
        self.registrations
            .read()
            .expect("lock poisoned")
            .iter()
            .find(|r| r.id == id)
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct AlwaysOk;

    #[async_trait]
    impl ContentGenerator for AlwaysOk {
        fn id(&self) -> &str {
            "always-ok"
        }

        async fn generate(&self, _context: &GenerationContext) -> Result<GeneratedContent> {
            Ok(GeneratedContent::text("hi"))
        }
    }

    struct AlwaysInvalid;

    #[async_trait]
    impl ContentGenerator for AlwaysInvalid {
        fn id(&self) -> &str {
            "always-invalid"
        }

        async fn generate(&self, _context: &GenerationContext) -> Result<GeneratedContent> {
            Ok(GeneratedContent::text("hi"))
        }

        async fn validate(&self) -> Result<()> {
            Err(CoreError::generator("always-invalid", "broken prompt template"))
        }
    }

    fn registration(id: &str, generator: Arc<dyn ContentGenerator>) -> GeneratorRegistration {
        GeneratorRegistration {
            id: id.to_string(),
            name: id.to_string(),
            priority: Priority::P2,
            model_tier: Tier::Medium,
            apply_frame: true,
            format_options: None,
            event_pattern: None,
            gating_circuit: None,
            schedule_window: None,
            generator,
        }
    }

    #[tokio::test]
    async fn invalid_generator_is_not_registered() {
        let registry = ContentRegistry::new();
        let result = registry.register(registration("always-invalid", Arc::new(AlwaysInvalid))).await;
        assert!(result.is_err());
        assert!(registry.get_by_id("always-invalid").is_none());
    }

    #[tokio::test]
    async fn valid_generator_round_trips_through_list_and_get() {
        let registry = ContentRegistry::new();
        registry.register(registration("always-ok", Arc::new(AlwaysOk))).await.unwrap();

        assert_eq!(registry.list().len(), 1);
        assert!(registry.get_by_id("always-ok").is_some());

        assert!(registry.unregister("always-ok"));
        assert!(registry.get_by_id("always-ok").is_none());
    }

    #[tokio::test]
    async fn duplicate_ids_are_rejected() {
        let registry = ContentRegistry::new();
        registry.register(registration("dup", Arc::new(AlwaysOk))).await.unwrap();
        let result = registry.register(registration("dup", Arc::new(AlwaysOk))).await;
        assert!(result.is_err());
    }
}

//! Trigger Matcher (spec §4.11) — evaluates entity-state-change events
//! against the loaded trigger config, first match wins, with per-trigger
//! debouncing. Pattern compilation reuses `crate::pattern`.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Utc};

use super::config::TriggersConfig;
use crate::pattern::Pattern;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchResult {
    pub matched: bool,
    pub trigger_name: Option<String>,
    pub debounced: bool,
}

impl MatchResult {
    fn no_match() -> Self {
        Self { matched: false, trigger_name: None, debounced: false }
    }
}

/// Holds a compiled snapshot of the trigger config plus per-trigger
/// debounce timestamps. Replaced wholesale on hot-reload (spec §4.12);
/// readers in flight keep using the snapshot they were handed.
pub struct TriggerMatcher {
    triggers: Vec<(TriggerDefCompiled, u64)>,
    last_match_at: Mutex<HashMap<String, DateTime<Utc>>>,
}

struct TriggerDefCompiled {
    name: String,
    pattern: Pattern,
    state_filter: Option<Vec<String>>,
}

impl TriggerMatcher {
    pub fn from_config(config: &TriggersConfig) -> crate::error::Result<Self> {
        let mut triggers = Vec::new();
        for def in &config.triggers {
            let pattern = Pattern::compile(&def.entity_pattern, &def.name)?;
            triggers.push((
                TriggerDefCompiled {
                    name: def.name.clone(),
                    pattern,
                    state_filter: def.state_filter.clone(),
                },
                def.debounce_seconds,
            ));
        }
        Ok(Self { triggers, last_match_at: Mutex::new(HashMap::new()) })
    }

    pub fn match_event(&self, entity_id: &str, new_state: &str) -> MatchResult {
        for (trigger, debounce_seconds) in &self.triggers {
            if !trigger.pattern.matches(entity_id) {
                continue;
            }
            if let Some(filter) = &trigger.state_filter {
                if !filter.iter().any(|s| s == new_state) {
                    continue;
                }
            }

            let now = Utc::now();
            let mut last_match = self.last_match_at.lock().expect("lock poisoned");
            let debounced = last_match
                .get(&trigger.name)
                .map(|prev| (now - *prev).num_seconds() < *debounce_seconds as i64)
                .unwrap_or(false);

            if !debounced {
                last_match.insert(trigger.name.clone(), now);
            }

            return MatchResult {
                matched: true,
                trigger_name: Some(trigger.name.clone()),
                debounced,
            };
        }
        MatchResult::no_match()
    }
}

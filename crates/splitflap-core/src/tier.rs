//! Model tier selection (spec §4.2) — maps an abstract capability tier
//! (light/medium/heavy) to a concrete provider + model id, and finds a
//! cross-provider alternate when a provider's circuit is open. Table is
//! configuration-driven with compiled-in defaults, resolving spec §9's
//! open question about two divergent tier tables in favor of one
//! authoritative, overridable source.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    Light,
    Medium,
    Heavy,
}

impl Tier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Light => "light",
            Tier::Medium => "medium",
            Tier::Heavy => "heavy",
        }
    }
}

/// A single resolved (provider, model) pair for a tier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierEntry {
    pub provider: String,
    pub model: String,
}

/// Ordered list of candidates per tier; the first entry is preferred,
/// later entries are cross-provider alternates tried when the preferred
/// provider's circuit is open.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TierTable {
    entries: HashMap<Tier, Vec<TierEntry>>,
}

impl Default for TierTable {
    fn default() -> Self {
        let mut entries = HashMap::new();
        entries.insert(
            Tier::Light,
            vec![
                TierEntry { provider: "openai".to_string(), model: "gpt-4o-mini".to_string() },
                TierEntry { provider: "anthropic".to_string(), model: "claude-3-5-haiku-latest".to_string() },
            ],
        );
        entries.insert(
            Tier::Medium,
            vec![
                TierEntry { provider: "anthropic".to_string(), model: "claude-3-5-sonnet-latest".to_string() },
                TierEntry { provider: "openai".to_string(), model: "gpt-4o".to_string() },
            ],
        );
        entries.insert(
            Tier::Heavy,
            vec![
                TierEntry { provider: "anthropic".to_string(), model: "claude-3-opus-latest".to_string() },
                TierEntry { provider: "openai".to_string(), model: "gpt-4-turbo".to_string() },
            ],
        );
        Self { entries }
    }
}

impl TierTable {
    pub fn from_overrides(overrides: HashMap<Tier, Vec<TierEntry>>) -> Self {
        let mut table = Self::default();
        for (tier, candidates) in overrides {
            table.entries.insert(tier, candidates);
        }
        table
    }

    pub fn candidates(&self, tier: Tier) -> &[TierEntry] {
        self.entries.get(&tier).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// Resolves a tier to a concrete provider/model, and finds the next
/// candidate when the currently selected provider is unavailable.
pub struct ModelTierSelector {
    table: TierTable,
}

impl ModelTierSelector {
    pub fn new(table: TierTable) -> Self {
        Self { table }
    }

    pub fn select(&self, tier: Tier) -> Result<&TierEntry> {
        self.table
            .candidates(tier)
            .first()
            .ok_or_else(|| CoreError::NoAlternate { tier: tier.as_str().to_string() })
    }

    /// Returns the candidate immediately after `current.provider` in the
    /// tier's list, wrapping around to the start but never returning to
    /// `current` itself.
    pub fn get_alternate(&self, tier: Tier, current: &TierEntry) -> Result<&TierEntry> {
        let candidates = self.table.candidates(tier);
        let position = candidates.iter().position(|c| c.provider == current.provider);
        let start = position.map(|p| p + 1).unwrap_or(0);

        candidates
            .iter()
            .cycle()
            .skip(start)
            .take(candidates.len())
            .find(|c| c.provider != current.provider)
            .ok_or_else(|| CoreError::NoAlternate { tier: tier.as_str().to_string() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn select_returns_preferred_entry() {
        let selector = ModelTierSelector::new(TierTable::default());
        let entry = selector.select(Tier::Light).unwrap();
        assert_eq!(entry.provider, "openai");
    }

    #[test]
    fn get_alternate_skips_current_provider() {
        let selector = ModelTierSelector::new(TierTable::default());
        let current = selector.select(Tier::Light).unwrap().clone();
        let alternate = selector.get_alternate(Tier::Light, &current).unwrap();
        assert_ne!(alternate.provider, current.provider);
    }

    #[test]
    fn single_candidate_tier_has_no_alternate() {
        let mut overrides = HashMap::new();
        overrides.insert(
            Tier::Heavy,
            vec![TierEntry { provider: "openai".to_string(), model: "gpt-4-turbo".to_string() }],
        );
        let table = TierTable::from_overrides(overrides);
        let selector = ModelTierSelector::new(table);
        let current = selector.select(Tier::Heavy).unwrap().clone();
        assert!(selector.get_alternate(Tier::Heavy, &current).is_err());
    }
}

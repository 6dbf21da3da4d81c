//! Trigger Config Loader (spec §4.12) — loads and validates the
//! declarative trigger file, then hot-reloads it via polling. No
//! `notify`-style filesystem-event crate appears anywhere in the
//! example pack, so watching is done with a 500ms-debounced
//! `tokio::time::interval` + mtime comparison, reusing the teacher's
//! `config.rs::from_file` extension-dispatch shape.

use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use std::time::SystemTime;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::error::{CoreError, Result};
use crate::pattern::Pattern;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriggerDef {
    pub name: String,
    pub entity_pattern: String,
    #[serde(default, deserialize_with = "deserialize_state_filter")]
    pub state_filter: Option<Vec<String>>,
    #[serde(default)]
    pub debounce_seconds: u64,
}

/// `state_filter` is "string or list of strings" per the declarative
/// trigger format; normalize either shape to `Vec<String>`.
#[derive(Deserialize)]
#[serde(untagged)]
enum StringOrVec {
    One(String),
    Many(Vec<String>),
}

fn deserialize_state_filter<'de, D>(deserializer: D) -> std::result::Result<Option<Vec<String>>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<StringOrVec>::deserialize(deserializer)?.map(|v| match v {
        StringOrVec::One(s) => vec![s],
        StringOrVec::Many(v) => v,
    }))
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TriggersConfig {
    pub triggers: Vec<TriggerDef>,
}

fn validate(config: &TriggersConfig) -> Result<()> {
    for trigger in &config.triggers {
        if trigger.name.trim().is_empty() {
            return Err(CoreError::config("trigger has empty name"));
        }
        if trigger.entity_pattern.trim().is_empty() {
            return Err(CoreError::config(format!("trigger '{}' has empty entity_pattern", trigger.name)));
        }
        Pattern::compile(&trigger.entity_pattern, &trigger.name)?;
    }
    Ok(())
}

/// Events emitted after a hot-reload attempt.
pub enum ReloadEvent {
    Reloaded(Arc<TriggersConfig>),
    Error(String),
}

pub struct TriggerConfigLoader {
    path: PathBuf,
    snapshot: RwLock<Arc<TriggersConfig>>,
    watch_handle: tokio::sync::Mutex<Option<JoinHandle<()>>>,
}

impl TriggerConfigLoader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            snapshot: RwLock::new(Arc::new(TriggersConfig::default())),
            watch_handle: tokio::sync::Mutex::new(None),
        }
    }

    /// Reads, parses, and validates the file. On any failure the current
    /// snapshot is left untouched.
    pub async fn load(&self) -> Result<Arc<TriggersConfig>> {
        let raw = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| CoreError::config(format!("failed to read trigger config {}: {e}", self.path.display())))?;

        let parsed: TriggersConfig = serde_yaml::from_str(&raw)
            .map_err(|e| CoreError::config(format!("failed to parse trigger config: {e}")))?;

        validate(&parsed)?;

        let snapshot = Arc::new(parsed);
        *self.snapshot.write().expect("lock poisoned") = Arc::clone(&snapshot);
        Ok(snapshot)
    }

    pub fn current(&self) -> Arc<TriggersConfig> {
        Arc::clone(&self.snapshot.read().expect("lock poisoned"))
    }

    async fn mtime(path: &Path) -> Option<SystemTime> {
        tokio::fs::metadata(path).await.ok()?.modified().ok()
    }

    /// Polls the file's mtime, debounced 500ms to absorb editor bursts,
    /// and re-loads on change, sending a `ReloadEvent` either way.
    pub async fn start_watching(self: &Arc<Self>) -> mpsc::Receiver<ReloadEvent> {
        let (tx, rx) = mpsc::channel(8);
        let loader = Arc::clone(self);

        let task = tokio::spawn(async move {
            let mut last_mtime = Self::mtime(&loader.path).await;
            let mut poll = tokio::time::interval(std::time::Duration::from_millis(500));
            loop {
                poll.tick().await;
                let current_mtime = Self::mtime(&loader.path).await;
                if current_mtime != last_mtime {
                    last_mtime = current_mtime;
                    match loader.load().await {
                        Ok(snapshot) => {
                            info!(path = %loader.path.display(), "trigger config reloaded");
                            if tx.send(ReloadEvent::Reloaded(snapshot)).await.is_err() {
                                return;
                            }
                        }
                        Err(e) => {
                            warn!(error = %e, "trigger config reload failed, retaining previous snapshot");
                            if tx.send(ReloadEvent::Error(e.to_string())).await.is_err() {
                                return;
                            }
                        }
                    }
                }
            }
        });

        *self.watch_handle.lock().await = Some(task);
        rx
    }

    pub async fn stop_watching(&self) {
        if let Some(task) = self.watch_handle.lock().await.take() {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_config_passes_validation() {
        let config = TriggersConfig {
            triggers: vec![TriggerDef {
                name: "front-door".to_string(),
                entity_pattern: "binary_sensor.front_door".to_string(),
                state_filter: Some(vec!["on".to_string()]),
                debounce_seconds: 10,
            }],
        };
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn invalid_regex_cites_trigger_name_in_error() {
        let config = TriggersConfig {
            triggers: vec![TriggerDef {
                name: "bad-trigger".to_string(),
                entity_pattern: "/^bad(/".to_string(),
                state_filter: None,
                debounce_seconds: 0,
            }],
        };
        let err = validate(&config).unwrap_err();
        assert!(err.to_string().contains("bad-trigger"));
    }

    #[test]
    fn state_filter_accepts_a_single_scalar() {
        let yaml = "triggers:\n  - name: front-door\n    entity_pattern: binary_sensor.front_door\n    state_filter: on\n";
        let config: TriggersConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.triggers[0].state_filter, Some(vec!["on".to_string()]));
    }

    #[test]
    fn state_filter_accepts_a_list() {
        let yaml = "triggers:\n  - name: front-door\n    entity_pattern: binary_sensor.front_door\n    state_filter: [on, open]\n";
        let config: TriggersConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.triggers[0].state_filter, Some(vec!["on".to_string(), "open".to_string()]));
    }

    #[tokio::test]
    async fn load_reads_and_validates_from_disk() {
        let dir = std::env::temp_dir();
        let path = dir.join(format!("trigger-config-test-{}.yaml", std::process::id()));
        tokio::fs::write(
            &path,
            "triggers:\n  - name: front-door\n    entity_pattern: binary_sensor.front_door\n    debounce_seconds: 5\n",
        )
        .await
        .unwrap();

        let loader = TriggerConfigLoader::new(&path);
        let snapshot = loader.load().await.unwrap();
        assert_eq!(snapshot.triggers.len(), 1);

        tokio::fs::remove_file(&path).await.ok();
    }
}

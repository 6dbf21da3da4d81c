//! Flat runtime configuration, loadable from YAML/TOML/JSON/env (spec §6
//! "Environment"). Mirrors the teacher's `AgentConfig::from_file`
//! extension-dispatch and `${VAR}` interpolation, pointed at this core's
//! settings instead of an agent definition.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::{CoreError, Result};

/// Top-level runtime configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoreConfig {
    pub preferred_provider: String,
    pub available_providers: Vec<ProviderCredentials>,
    /// `black` or `white` — which device variant's tile alphabet to use.
    #[serde(default = "default_device_variant")]
    pub device_variant: String,
    pub automation_bus: AutomationBusConfig,
    pub trigger_config_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub persistence_connection_string: Option<String>,
    #[serde(default = "default_throttle_window_secs")]
    pub throttled_logger_window_secs: u64,
    #[serde(default)]
    pub retry: RetryLimits,
    #[serde(default)]
    pub data_provider_timeouts: DataProviderTimeouts,
}

fn default_device_variant() -> String {
    "black".to_string()
}

fn default_throttle_window_secs() -> u64 {
    300
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderCredentials {
    pub name: String,
    /// May use `${ENV_VAR}` syntax; resolved via `resolve_env`.
    pub api_key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

impl ProviderCredentials {
    pub fn resolved_api_key(&self) -> String {
        resolve_env(&self.api_key)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutomationBusConfig {
    pub url: String,
    pub token: String,
    #[serde(default = "default_reconnect_backoff_ms")]
    pub reconnect_backoff_ms: u64,
    #[serde(default = "default_max_reconnect_backoff_ms")]
    pub max_reconnect_backoff_ms: u64,
}

fn default_reconnect_backoff_ms() -> u64 {
    1_000
}

fn default_max_reconnect_backoff_ms() -> u64 {
    60_000
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryLimits {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_delay_ms() -> u64 {
    500
}

fn default_max_delay_ms() -> u64 {
    10_000
}

impl Default for RetryLimits {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataProviderTimeouts {
    #[serde(default = "default_data_timeout_ms")]
    pub weather_ms: u64,
    #[serde(default = "default_data_timeout_ms")]
    pub color_bar_ms: u64,
    #[serde(default = "default_ai_timeout_ms")]
    pub ai_ms: u64,
    #[serde(default = "default_bus_timeout_ms")]
    pub automation_bus_ms: u64,
}

fn default_data_timeout_ms() -> u64 {
    10_000
}

fn default_ai_timeout_ms() -> u64 {
    30_000
}

fn default_bus_timeout_ms() -> u64 {
    60_000
}

impl Default for DataProviderTimeouts {
    fn default() -> Self {
        Self {
            weather_ms: default_data_timeout_ms(),
            color_bar_ms: default_data_timeout_ms(),
            ai_ms: default_ai_timeout_ms(),
            automation_bus_ms: default_bus_timeout_ms(),
        }
    }
}

/// Resolve `${VAR_NAME}` references against the process environment;
/// literal strings pass through unchanged.
pub fn resolve_env(value: &str) -> String {
    if let Some(stripped) = value.strip_prefix("${")
        && let Some(var_name) = stripped.strip_suffix('}')
    {
        return std::env::var(var_name).unwrap_or_default();
    }
    value.to_string()
}

impl CoreConfig {
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(|e| CoreError::config(format!("invalid YAML config: {e}")))
    }

    pub fn from_toml(toml: &str) -> Result<Self> {
        #[cfg(feature = "config-toml")]
        {
            toml::from_str(toml).map_err(|e| CoreError::config(format!("invalid TOML config: {e}")))
        }
        #[cfg(not(feature = "config-toml"))]
        {
            let _ = toml;
            Err(CoreError::config("config-toml feature not enabled"))
        }
    }

    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| CoreError::config(format!("invalid JSON config: {e}")))
    }

    /// Detect format from file extension and parse.
    pub fn from_file(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| CoreError::config(format!("failed to read config file '{path}': {e}")))?;

        if path.ends_with(".json") {
            return Self::from_json(&content);
        }
        if path.ends_with(".yaml") || path.ends_with(".yml") {
            return Self::from_yaml(&content);
        }
        if path.ends_with(".toml") {
            return Self::from_toml(&content);
        }
        Self::from_json(&content)
    }

    /// Credentials by provider name, resolving env interpolation.
    pub fn resolved_credentials(&self) -> HashMap<String, String> {
        self.available_providers
            .iter()
            .map(|p| (p.name.clone(), p.resolved_api_key()))
            .collect()
    }

    pub fn available_provider_names(&self) -> Vec<String> {
        self.available_providers.iter().map(|p| p.name.clone()).collect()
    }
}

//! External port traits (spec §6) — minimal capability surfaces for
//! collaborators that live outside this core. Concrete implementations
//! (HTTP clients, websocket bus, device transport) are out of scope;
//! these traits exist so the orchestrator, event handler, and data
//! provider can depend on interfaces instead of concrete adapters.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::model::Grid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportStatus {
    pub connected: bool,
}

/// Pushes rendered content to the physical display.
#[async_trait]
pub trait DisplayTransport: Send + Sync {
    async fn send_text(&self, text: &str) -> Result<()>;
    async fn send_layout(&self, grid: &Grid) -> Result<()>;
    async fn send_layout_with_animation(&self, grid: &Grid) -> Result<()>;
    async fn read_message(&self) -> Result<Grid>;
    async fn validate_connection(&self) -> Result<TransportStatus>;
}

/// A handle returned by `subscribe_to_events`; dropping it unsubscribes.
pub trait Unsubscribe: Send + Sync {
    fn unsubscribe(&self);
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityState {
    pub state: String,
    #[serde(default)]
    pub attributes: serde_json::Value,
}

/// Callback invoked for every event of a subscribed type.
pub type EventCallback = Box<dyn Fn(serde_json::Value) + Send + Sync>;

/// The home-automation websocket client.
#[async_trait]
pub trait AutomationBus: Send + Sync {
    async fn connect(&self) -> Result<()>;
    async fn disconnect(&self) -> Result<()>;
    async fn get_state(&self, entity_id: &str) -> Result<EntityState>;
    async fn call_service(&self, domain: &str, service: &str, data: serde_json::Value) -> Result<()>;
    /// Registers `callback` for `event_type`; the returned handle
    /// unsubscribes on `unsubscribe()` or drop.
    fn subscribe_to_events(&self, event_type: &str, callback: EventCallback) -> Box<dyn Unsubscribe>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RssItem {
    pub title: String,
    pub link: String,
    #[serde(default)]
    pub summary: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RssFeed {
    pub title: String,
    pub items: Vec<RssItem>,
}

/// Must enforce SSRF protections (protocol whitelist, private-IP
/// blocklist, single redirect hop, IPv6-mapped-private blocklist) —
/// the responsibility of the implementation, not this port.
#[async_trait]
pub trait RssClient: Send + Sync {
    async fn fetch_feed(&self, url: &str) -> Result<RssFeed>;
    async fn get_latest_items(&self, urls: &[String], limit: Option<usize>) -> Result<Vec<RssItem>>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WikipediaSummary {
    pub title: String,
    pub extract: String,
    #[serde(default)]
    pub description: Option<String>,
    pub url: String,
}

#[async_trait]
pub trait WikipediaClient: Send + Sync {
    async fn get_random_article_summary(&self, max_len: Option<usize>) -> Result<WikipediaSummary>;
}

/// Loads generator prompt templates, optionally filling variables
/// resolved by a personality/template engine outside this core.
#[async_trait]
pub trait PromptLoader: Send + Sync {
    async fn load_prompt(&self, kind: &str, file: &str) -> Result<String>;
    async fn load_prompt_with_variables(
        &self,
        kind: &str,
        file: &str,
        vars: &std::collections::HashMap<String, String>,
    ) -> Result<String>;
}

/// Audit-only sink for generated content; the core writes but never
/// reads these rows back.
#[async_trait]
pub trait ContentAuditStore: Send + Sync {
    async fn record(&self, text: &str, provider: Option<&str>) -> Result<()>;
}

//! Core data model — the envelope, payload, and output types that flow
//! through the pipeline from scheduler/event trigger to transport.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What triggered this refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateType {
    /// Event- or operator-initiated full regeneration.
    Major,
    /// Timer-driven re-decoration of the cached content.
    Minor,
}

/// Raw event payload that triggered a major refresh, if any.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventData {
    pub event_type: String,
    #[serde(default)]
    pub payload: serde_json::Value,
}

/// Weather snapshot used to decorate the info row. Fahrenheit only;
/// the device alphabet has no unit glyph, and the info row always
/// renders `{TEMP}F`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeatherData {
    pub temp_f: f64,
    pub condition: String,
    /// Single-letter color-tile code derived from `condition` (e.g. sunny -> yellow).
    pub color_letter: char,
}

/// Pre-fetched companion data for a major refresh. Never fails to
/// construct — missing sources just add a warning and leave their field
/// `None`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentData {
    pub weather: Option<WeatherData>,
    pub color_bar: Option<[i32; 6]>,
    pub fetched_at: DateTime<Utc>,
    pub warnings: Vec<String>,
}

impl ContentData {
    pub fn empty(now: DateTime<Utc>) -> Self {
        Self {
            weather: None,
            color_bar: None,
            fetched_at: now,
            warnings: Vec::new(),
        }
    }
}

/// The envelope passed through the pipeline. Immutable after creation.
#[derive(Debug, Clone)]
pub struct GenerationContext {
    pub update_type: UpdateType,
    pub timestamp: DateTime<Utc>,
    pub event_data: Option<EventData>,
    pub personality: Option<String>,
    pub data: Option<ContentData>,
    /// When true, generators should return their prompts without calling
    /// a provider (used by admin "preview" tooling outside this core).
    pub prompts_only: bool,
}

impl GenerationContext {
    pub fn major(timestamp: DateTime<Utc>) -> Self {
        Self {
            update_type: UpdateType::Major,
            timestamp,
            event_data: None,
            personality: None,
            data: None,
            prompts_only: false,
        }
    }

    pub fn minor(timestamp: DateTime<Utc>) -> Self {
        Self {
            update_type: UpdateType::Minor,
            timestamp,
            event_data: None,
            personality: None,
            data: None,
            prompts_only: false,
        }
    }

    pub fn with_event(mut self, event: EventData) -> Self {
        self.event_data = Some(event);
        self
    }

    pub fn with_data(mut self, data: ContentData) -> Self {
        self.data = Some(data);
        self
    }
}

/// A 6-row x 22-column grid of device tile codes.
pub type Grid = [[i32; 22]; 6];

/// Self-contained device grid, as opposed to `text` output that still
/// needs frame decoration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Layout {
    pub character_codes: Grid,
}

/// Whether a generator produced plain text (needs decoration) or a
/// ready-made grid (decorated already, or intentionally bypassing the
/// info bar).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputMode {
    Text,
    Layout,
}

/// The generator's product.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratedContent {
    pub text: String,
    pub output_mode: OutputMode,
    pub layout: Option<Layout>,
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl GeneratedContent {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            output_mode: OutputMode::Text,
            layout: None,
            metadata: HashMap::new(),
        }
    }

    pub fn layout(text: impl Into<String>, grid: Grid) -> Self {
        Self {
            text: text.into(),
            output_mode: OutputMode::Layout,
            layout: Some(Layout {
                character_codes: grid,
            }),
            metadata: HashMap::new(),
        }
    }

    /// Provider that produced this content, if it came from an `AIProvider`.
    pub fn provider(&self) -> Option<&str> {
        self.metadata.get("provider").and_then(|v| v.as_str())
    }

    pub fn failed_over(&self) -> bool {
        self.metadata
            .get("failed_over")
            .and_then(|v| v.as_bool())
            .unwrap_or(false)
    }
}

/// Output of frame decoration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrameResult {
    pub layout: Grid,
    pub warnings: Vec<String>,
}

/// Content generator priority tier (spec §4.5/§4.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Priority {
    P0,
    P1,
    P2,
    P3,
}

/// Left/center/right alignment for word-wrapped text rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextAlign {
    Left,
    Center,
    Right,
}

impl Default for TextAlign {
    fn default() -> Self {
        Self::Center
    }
}

/// Formatting knobs a generator registration can override from the
/// decorator defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormatOptions {
    pub max_lines: usize,
    pub max_chars_per_line: usize,
    pub text_align: TextAlign,
    pub word_wrap: bool,
}

impl Default for FormatOptions {
    fn default() -> Self {
        Self {
            max_lines: 5,
            max_chars_per_line: 21,
            text_align: TextAlign::Center,
            word_wrap: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_content_provider_roundtrip() {
        let mut content = GeneratedContent::text("HELLO");
        content
            .metadata
            .insert("provider".into(), serde_json::json!("anthropic"));
        content
            .metadata
            .insert("failed_over".into(), serde_json::json!(true));
        assert_eq!(content.provider(), Some("anthropic"));
        assert!(content.failed_over());
    }

    #[test]
    fn layout_content_has_no_decoration_needed() {
        let grid: Grid = [[0; 22]; 6];
        let content = GeneratedContent::layout("HELLO", grid);
        assert_eq!(content.output_mode, OutputMode::Layout);
        assert!(content.layout.is_some());
    }
}

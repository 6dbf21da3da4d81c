//! Throttled Logger (spec §4.13) — de-duplicates and rate-limits
//! identical warning/error logs by key, with LRU eviction once the
//! tracked key count exceeds `max_entries`. New small struct+impl,
//! written in the core's plain style; logs through `tracing` like
//! everything else in the crate.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use tracing::{error, warn};

const DEFAULT_WINDOW: Duration = Duration::from_secs(300);
const DEFAULT_MAX_ENTRIES: usize = 100;

struct Entry {
    window_started_at: Instant,
    suppressed_count: u64,
    last_seen: Instant,
}

pub struct ThrottledLogger {
    window: Duration,
    max_entries: usize,
    entries: Mutex<HashMap<String, Entry>>,
}

impl Default for ThrottledLogger {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW, DEFAULT_MAX_ENTRIES)
    }
}

enum Decision {
    LogFresh,
    LogWithSuppressed(u64),
    Suppress,
}

impl ThrottledLogger {
    pub fn new(window: Duration, max_entries: usize) -> Self {
        Self {
            window,
            max_entries,
            entries: Mutex::new(HashMap::new()),
        }
    }

    fn decide(&self, key: &str) -> Decision {
        let now = Instant::now();
        let mut entries = self.entries.lock().expect("lock poisoned");

        if let Some(entry) = entries.get_mut(key) {
            if now.duration_since(entry.window_started_at) >= self.window {
                let suppressed = entry.suppressed_count;
                entry.window_started_at = now;
                entry.suppressed_count = 0;
                entry.last_seen = now;
                return Decision::LogWithSuppressed(suppressed);
            }
            entry.suppressed_count += 1;
            entry.last_seen = now;
            return Decision::Suppress;
        }

        if entries.len() >= self.max_entries {
            if let Some(lru_key) = entries.iter().min_by_key(|(_, e)| e.last_seen).map(|(k, _)| k.clone()) {
                entries.remove(&lru_key);
            }
        }

        entries.insert(
            key.to_string(),
            Entry {
                window_started_at: now,
                suppressed_count: 0,
                last_seen: now,
            },
        );
        Decision::LogFresh
    }

    pub fn warn(&self, key: &str, message: &str) {
        match self.decide(key) {
            Decision::LogFresh => warn!(key, "{message}"),
            Decision::LogWithSuppressed(n) if n > 0 => warn!(key, suppressed = n, "{message} (suppressed {n} repeats)"),
            Decision::LogWithSuppressed(_) => warn!(key, "{message}"),
            Decision::Suppress => {}
        }
    }

    pub fn error(&self, key: &str, message: &str) {
        match self.decide(key) {
            Decision::LogFresh => error!(key, "{message}"),
            Decision::LogWithSuppressed(n) if n > 0 => error!(key, suppressed = n, "{message} (suppressed {n} repeats)"),
            Decision::LogWithSuppressed(_) => error!(key, "{message}"),
            Decision::Suppress => {}
        }
    }
}

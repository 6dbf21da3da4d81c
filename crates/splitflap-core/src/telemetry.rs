//! Telemetry & observability — span-based tracing, metrics collection
//! for the refresh pipeline. Near-verbatim adaptation of the teacher's
//! `SpanRecord`/`SpanBuilder`/`TelemetryCollector` shape, retargeted
//! from agent-run spans to orchestration-pipeline spans.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Instant;

// ---------------------------------------------------------------------------
// Span & Event types
// ---------------------------------------------------------------------------

/// A recorded span representing one step of the refresh pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpanRecord {
    pub name: String,
    pub span_type: SpanType,
    pub start_ms: u64,
    pub duration_ms: u64,
    pub attributes: HashMap<String, serde_json::Value>,
    pub status: SpanStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub children: Vec<SpanRecord>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpanType {
    Refresh,
    DataFetch,
    Selection,
    ProviderCall,
    Decoration,
    Transport,
    Custom,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpanStatus {
    Ok,
    Error,
}

// ---------------------------------------------------------------------------
// Metrics
// ---------------------------------------------------------------------------

/// Collected metrics for one refresh pipeline run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RefreshMetrics {
    pub major_refreshes: u64,
    pub minor_refreshes: u64,
    pub provider_call_count: usize,
    pub provider_call_latencies_ms: Vec<u64>,
    pub provider_failovers: u64,
    pub retry_attempts: u64,
    pub decoration_warnings: u64,
    pub transport_failures: u64,
    pub errors: Vec<String>,
}

impl RefreshMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn avg_provider_latency_ms(&self) -> f64 {
        if self.provider_call_latencies_ms.is_empty() {
            return 0.0;
        }
        let sum: u64 = self.provider_call_latencies_ms.iter().sum();
        sum as f64 / self.provider_call_latencies_ms.len() as f64
    }

    pub fn record_provider_call(&mut self, duration_ms: u64) {
        self.provider_call_count += 1;
        self.provider_call_latencies_ms.push(duration_ms);
    }

    pub fn record_failover(&mut self) {
        self.provider_failovers += 1;
    }

    pub fn record_retry(&mut self) {
        self.retry_attempts += 1;
    }

    pub fn record_error(&mut self, error: String) {
        self.errors.push(error);
    }
}

// ---------------------------------------------------------------------------
// Span Builder (for easy instrumentation)
// ---------------------------------------------------------------------------

/// Builder for creating timed spans around a pipeline step.
#[derive(Debug)]
pub struct SpanBuilder {
    name: String,
    span_type: SpanType,
    start: Instant,
    attributes: HashMap<String, serde_json::Value>,
    children: Vec<SpanRecord>,
}

impl SpanBuilder {
    pub fn new(name: impl Into<String>, span_type: SpanType) -> Self {
        Self {
            name: name.into(),
            span_type,
            start: Instant::now(),
            attributes: HashMap::new(),
            children: Vec::new(),
        }
    }

    pub fn attribute(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    pub fn child(mut self, record: SpanRecord) -> Self {
        self.children.push(record);
        self
    }

    pub fn finish(self) -> SpanRecord {
        SpanRecord {
            name: self.name,
            span_type: self.span_type,
            start_ms: 0,
            duration_ms: self.start.elapsed().as_millis() as u64,
            attributes: self.attributes,
            status: SpanStatus::Ok,
            error: None,
            children: self.children,
        }
    }

    pub fn finish_with_error(self, error: impl Into<String>) -> SpanRecord {
        SpanRecord {
            name: self.name,
            span_type: self.span_type,
            start_ms: 0,
            duration_ms: self.start.elapsed().as_millis() as u64,
            attributes: self.attributes,
            status: SpanStatus::Error,
            error: Some(error.into()),
            children: self.children,
        }
    }
}

// ---------------------------------------------------------------------------
// Telemetry Collector
// ---------------------------------------------------------------------------

/// Collects spans and metrics for the running core instance.
#[derive(Debug, Default)]
pub struct TelemetryCollector {
    spans: std::sync::Mutex<Vec<SpanRecord>>,
    metrics: std::sync::Mutex<RefreshMetrics>,
}

impl TelemetryCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_span(&self, span: SpanRecord) {
        if let Ok(mut spans) = self.spans.lock() {
            spans.push(span);
        }
    }

    pub fn with_metrics<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&mut RefreshMetrics) -> R,
    {
        let mut metrics = self.metrics.lock().expect("metrics lock");
        f(&mut metrics)
    }

    pub fn export_spans(&self) -> Vec<SpanRecord> {
        self.spans.lock().map(|s| s.clone()).unwrap_or_default()
    }

    pub fn export_metrics(&self) -> RefreshMetrics {
        self.metrics.lock().map(|m| m.clone()).unwrap_or_default()
    }

    pub fn clear(&self) {
        if let Ok(mut spans) = self.spans.lock() {
            spans.clear();
        }
        if let Ok(mut metrics) = self.metrics.lock() {
            *metrics = RefreshMetrics::default();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metrics_track_failovers_and_retries() {
        let mut metrics = RefreshMetrics::new();
        metrics.record_failover();
        metrics.record_retry();
        metrics.record_provider_call(120);
        assert_eq!(metrics.provider_failovers, 1);
        assert_eq!(metrics.retry_attempts, 1);
        assert_eq!(metrics.avg_provider_latency_ms(), 120.0);
    }

    #[test]
    fn collector_clear_resets_spans_and_metrics() {
        let collector = TelemetryCollector::new();
        collector.record_span(SpanBuilder::new("refresh", SpanType::Refresh).finish());
        collector.with_metrics(|m| m.record_retry());
        collector.clear();
        assert!(collector.export_spans().is_empty());
        assert_eq!(collector.export_metrics().retry_attempts, 0);
    }
}

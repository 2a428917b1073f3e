//! Telemetry adapters: JSON-lines metrics, tag decoration and an in-memory
//! counter registry.

use crate::log_sink::LogSink;
use docrag_ports::{TelemetryPort, TelemetryTags, TelemetryTimer};
use docrag_shared::{REDACTED, is_secret_key};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Instant, SystemTime, UNIX_EPOCH};

/// Emits each counter increment and timing as one JSON line.
#[derive(Clone)]
pub struct JsonTelemetry {
    sink: Arc<dyn LogSink>,
    base_tags: TelemetryTags,
}

impl JsonTelemetry {
    /// Telemetry writing to `sink`.
    #[must_use]
    pub fn new(sink: Arc<dyn LogSink>) -> Self {
        Self {
            sink,
            base_tags: TelemetryTags::new(),
        }
    }

    /// Tags stamped on every metric.
    #[must_use]
    pub fn with_base_tags(mut self, tags: TelemetryTags) -> Self {
        self.base_tags = tags;
        self
    }
}

impl TelemetryPort for JsonTelemetry {
    fn increment_counter(&self, name: &str, value: u64, tags: Option<&TelemetryTags>) {
        let tags = merge_tags(&self.base_tags, tags);
        self.sink
            .write_line(&metric_line("counter", name, value, None, &tags));
    }

    fn record_timer_ms(&self, name: &str, duration_ms: u64, tags: Option<&TelemetryTags>) {
        let tags = merge_tags(&self.base_tags, tags);
        self.sink
            .write_line(&metric_line("timer", name, duration_ms, Some("ms"), &tags));
    }

    fn start_timer(&self, name: &str, tags: Option<&TelemetryTags>) -> Box<dyn TelemetryTimer> {
        Box::new(PortTimer::new(Arc::new(self.clone()), name, tags))
    }
}

/// Adds fixed tags (backend, correlation id) to every metric of `inner`.
#[derive(Clone)]
pub struct TaggedTelemetry {
    inner: Arc<dyn TelemetryPort>,
    tags: TelemetryTags,
}

impl TaggedTelemetry {
    /// Decorate `inner` with `tags`.
    #[must_use]
    pub fn new(inner: Arc<dyn TelemetryPort>, tags: TelemetryTags) -> Self {
        Self { inner, tags }
    }
}

impl TelemetryPort for TaggedTelemetry {
    fn increment_counter(&self, name: &str, value: u64, tags: Option<&TelemetryTags>) {
        let merged = merge_tags(&self.tags, tags);
        self.inner.increment_counter(name, value, Some(&merged));
    }

    fn record_timer_ms(&self, name: &str, duration_ms: u64, tags: Option<&TelemetryTags>) {
        let merged = merge_tags(&self.tags, tags);
        self.inner.record_timer_ms(name, duration_ms, Some(&merged));
    }

    fn start_timer(&self, name: &str, tags: Option<&TelemetryTags>) -> Box<dyn TelemetryTimer> {
        let merged = merge_tags(&self.tags, tags);
        self.inner.start_timer(name, Some(&merged))
    }
}

/// Sums counters in memory, keyed by metric name and `layer` tag.
///
/// Used where metrics are read back in-process: tests, and the CLI query
/// summary that reports per-layer hits and misses.
#[derive(Debug, Default)]
pub struct InMemoryTelemetry {
    counters: Mutex<BTreeMap<(Box<str>, Option<Box<str>>), u64>>,
    timers: Mutex<Vec<(Box<str>, u64)>>,
}

impl InMemoryTelemetry {
    /// Total for `name` across all tags.
    pub fn counter(&self, name: &str) -> u64 {
        self.counters
            .lock()
            .map(|counters| {
                counters
                    .iter()
                    .filter(|((metric, _), _)| metric.as_ref() == name)
                    .map(|(_, value)| *value)
                    .sum()
            })
            .unwrap_or_default()
    }

    /// Total for `name` restricted to one `layer` tag value.
    pub fn layer_counter(&self, name: &str, layer: &str) -> u64 {
        self.counters
            .lock()
            .map(|counters| {
                counters
                    .get(&(Box::from(name), Some(Box::from(layer))))
                    .copied()
                    .unwrap_or_default()
            })
            .unwrap_or_default()
    }

    /// Number of recorded timings for `name`.
    pub fn timer_count(&self, name: &str) -> usize {
        self.timers
            .lock()
            .map(|timers| timers.iter().filter(|(metric, _)| metric.as_ref() == name).count())
            .unwrap_or_default()
    }
}

impl TelemetryPort for InMemoryTelemetry {
    fn increment_counter(&self, name: &str, value: u64, tags: Option<&TelemetryTags>) {
        let layer = tags.and_then(|tags| tags.get("layer")).cloned();
        if let Ok(mut counters) = self.counters.lock() {
            let slot = counters.entry((name.into(), layer)).or_default();
            *slot = slot.saturating_add(value);
        }
    }

    fn record_timer_ms(&self, name: &str, duration_ms: u64, _tags: Option<&TelemetryTags>) {
        if let Ok(mut timers) = self.timers.lock() {
            timers.push((name.into(), duration_ms));
        }
    }

    fn start_timer(&self, name: &str, _tags: Option<&TelemetryTags>) -> Box<dyn TelemetryTimer> {
        Box::new(ElapsedOnly {
            name: name.into(),
            started_at: Instant::now(),
        })
    }
}

struct ElapsedOnly {
    name: Box<str>,
    started_at: Instant,
}

impl TelemetryTimer for ElapsedOnly {
    fn stop(&self) {
        tracing::trace!(timer = %self.name, elapsed_ms = self.started_at.elapsed().as_millis());
    }
}

/// Records the elapsed time on the first `stop()`.
struct PortTimer {
    telemetry: Arc<dyn TelemetryPort>,
    name: Box<str>,
    tags: Option<TelemetryTags>,
    started_at: Instant,
    stopped: AtomicBool,
}

impl PortTimer {
    fn new(telemetry: Arc<dyn TelemetryPort>, name: &str, tags: Option<&TelemetryTags>) -> Self {
        Self {
            telemetry,
            name: name.into(),
            tags: tags.cloned(),
            started_at: Instant::now(),
            stopped: AtomicBool::new(false),
        }
    }
}

impl TelemetryTimer for PortTimer {
    fn stop(&self) {
        if self.stopped.swap(true, Ordering::SeqCst) {
            return;
        }
        let elapsed = u64::try_from(self.started_at.elapsed().as_millis()).unwrap_or(u64::MAX);
        self.telemetry
            .record_timer_ms(&self.name, elapsed, self.tags.as_ref());
    }
}

fn metric_line(
    metric_type: &str,
    name: &str,
    value: u64,
    unit: Option<&str>,
    tags: &TelemetryTags,
) -> String {
    let mut payload = Map::new();
    payload.insert("type".to_owned(), Value::from("metric"));
    payload.insert("timestampMs".to_owned(), Value::from(now_epoch_ms()));
    payload.insert("metricType".to_owned(), Value::from(metric_type));
    payload.insert("name".to_owned(), Value::from(name));
    payload.insert("value".to_owned(), Value::from(value));
    if let Some(unit) = unit {
        payload.insert("unit".to_owned(), Value::from(unit));
    }
    if !tags.is_empty() {
        let tags: Map<String, Value> = tags
            .iter()
            .map(|(key, value)| (key.to_string(), Value::from(value.as_ref())))
            .collect();
        payload.insert("tags".to_owned(), Value::Object(tags));
    }
    serde_json::to_string(&Value::Object(payload)).map_or_else(
        |_| "{\"type\":\"metric\",\"name\":\"telemetry.serialize_failed\",\"value\":1}\n".to_owned(),
        |mut line| {
            line.push('\n');
            line
        },
    )
}

fn merge_tags(base: &TelemetryTags, extra: Option<&TelemetryTags>) -> TelemetryTags {
    let mut merged = base.clone();
    if let Some(extra) = extra {
        merged.extend(extra.iter().map(|(key, value)| (key.clone(), value.clone())));
    }
    for (key, value) in &mut merged {
        if is_secret_key(key) {
            *value = REDACTED.into();
        }
    }
    merged
}

fn now_epoch_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .ok()
        .and_then(|elapsed| u64::try_from(elapsed.as_millis()).ok())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log_sink::MemoryLogSink;
    use docrag_domain::CacheLayer;
    use docrag_ports::layer_tags;

    #[test]
    fn json_telemetry_writes_counter_and_timer_lines() -> Result<(), Box<dyn std::error::Error>> {
        let sink = Arc::new(MemoryLogSink::default());
        let telemetry = JsonTelemetry::new(sink.clone());

        telemetry.increment_counter("cache.hit", 2, Some(&layer_tags(CacheLayer::Embedding)));
        telemetry.start_timer("cache.query.duration", None).stop();

        let lines: Vec<Value> = sink
            .take()
            .iter()
            .map(|line| serde_json::from_str(line.trim_end()))
            .collect::<Result<_, _>>()?;
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["metricType"], "counter");
        assert_eq!(lines[0]["value"], 2);
        assert_eq!(lines[0]["tags"]["layer"], "embedding");
        assert_eq!(lines[1]["metricType"], "timer");
        assert_eq!(lines[1]["unit"], "ms");
        Ok(())
    }

    #[test]
    fn timer_records_once() {
        let telemetry = Arc::new(InMemoryTelemetry::default());
        let timer = PortTimer::new(telemetry.clone(), "cache.query.duration", None);
        timer.stop();
        timer.stop();
        assert_eq!(telemetry.timer_count("cache.query.duration"), 1);
    }

    #[test]
    fn tagged_telemetry_adds_and_masks_tags() {
        let registry = Arc::new(InMemoryTelemetry::default());
        let mut base = TelemetryTags::new();
        base.insert("layer".into(), "query".into());
        let tagged = TaggedTelemetry::new(registry.clone(), base);

        tagged.increment_counter("cache.miss", 1, None);
        assert_eq!(registry.layer_counter("cache.miss", "query"), 1);

        let mut secret = TelemetryTags::new();
        secret.insert("apiKey".into(), "abc".into()); // pragma: allowlist secret
        assert_eq!(
            merge_tags(&TelemetryTags::new(), Some(&secret)).get("apiKey").map(AsRef::as_ref),
            Some(REDACTED)
        );
    }

    #[test]
    fn in_memory_counters_sum_across_layers() {
        let registry = InMemoryTelemetry::default();
        registry.increment_counter("cache.hit", 1, Some(&layer_tags(CacheLayer::Embedding)));
        registry.increment_counter("cache.hit", 2, Some(&layer_tags(CacheLayer::Query)));
        registry.increment_counter("cache.hit", 1, None);

        assert_eq!(registry.counter("cache.hit"), 4);
        assert_eq!(registry.layer_counter("cache.hit", "query"), 2);
        assert_eq!(registry.counter("cache.miss"), 0);
    }
}

//! Telemetry boundary contract (counters and timings).

use std::collections::BTreeMap;

/// Telemetry tags. Keep tags low-cardinality: layer names, never keys.
pub type TelemetryTags = BTreeMap<Box<str>, Box<str>>;

/// Timer handle.
pub trait TelemetryTimer: Send + Sync {
    /// Stop the timer and record its duration.
    fn stop(&self);
}

/// Boundary contract for telemetry.
pub trait TelemetryPort: Send + Sync {
    /// Increment a counter by `value`.
    fn increment_counter(&self, name: &str, value: u64, tags: Option<&TelemetryTags>);

    /// Record a duration in milliseconds.
    fn record_timer_ms(&self, name: &str, duration_ms: u64, tags: Option<&TelemetryTags>);

    /// Start a timer that records on `stop()`.
    fn start_timer(&self, name: &str, tags: Option<&TelemetryTags>) -> Box<dyn TelemetryTimer>;
}

/// Tags for a single cache layer.
#[must_use]
pub fn layer_tags(layer: docrag_domain::CacheLayer) -> TelemetryTags {
    let mut tags = TelemetryTags::new();
    tags.insert("layer".into(), layer.as_str().into());
    tags
}

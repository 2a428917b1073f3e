//! Logger and telemetry selection from the process environment.

use docrag_adapters::{
    InMemoryTelemetry, JsonLogger, JsonTelemetry, LogSink, StderrLogSink, TaggedTelemetry,
    TracingLogger,
};
use docrag_ports::{LogFields, LogLevel, LoggerPort, TelemetryPort, TelemetryTags, TelemetryTimer};
use docrag_shared::RequestContext;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Env var: `json` writes JSON log lines to stderr, `tracing` (or `text`)
/// forwards events to the installed `tracing` subscriber.
pub const LOG_FORMAT_ENV: &str = "DOCRAG_LOG_FORMAT";
/// Env var: minimum level (`debug`, `info`, `warn`, `error`).
pub const LOG_LEVEL_ENV: &str = "DOCRAG_LOG_LEVEL";
/// Env var: `json` writes metric lines to stderr.
pub const TELEMETRY_FORMAT_ENV: &str = "DOCRAG_TELEMETRY_FORMAT";

/// Where log events go.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// No port-level logging.
    Off,
    /// JSON lines on stderr.
    Json,
    /// Forwarded to `tracing`.
    Tracing,
}

impl LogFormat {
    /// Parse a `DOCRAG_LOG_FORMAT` value; unknown values turn logging off.
    #[must_use]
    pub fn parse(value: Option<&str>) -> Self {
        match value.map(|value| value.trim().to_ascii_lowercase()).as_deref() {
            Some("json") => Self::Json,
            Some("tracing" | "text" | "pretty") => Self::Tracing,
            _ => Self::Off,
        }
    }
}

/// Parse a `DOCRAG_LOG_LEVEL` value, defaulting to `info`.
#[must_use]
pub fn parse_log_level(value: Option<&str>) -> LogLevel {
    match value.map(|value| value.trim().to_ascii_lowercase()).as_deref() {
        Some("debug" | "trace") => LogLevel::Debug,
        Some("warn" | "warning") => LogLevel::Warn,
        Some("error") => LogLevel::Error,
        _ => LogLevel::Info,
    }
}

/// Optional logger and telemetry handed to every use case.
#[derive(Clone, Default)]
pub struct Observability {
    /// Structured logger.
    pub logger: Option<Arc<dyn LoggerPort>>,
    /// Counters and timers.
    pub telemetry: Option<Arc<dyn TelemetryPort>>,
}

impl Observability {
    /// Build from a variable map (`DOCRAG_LOG_FORMAT`, `DOCRAG_LOG_LEVEL`,
    /// `DOCRAG_TELEMETRY_FORMAT`).
    #[must_use]
    pub fn from_map(env: &BTreeMap<String, String>) -> Self {
        let get = |key: &str| env.get(key).map(String::as_str);
        let format = LogFormat::parse(get(LOG_FORMAT_ENV));
        let level = parse_log_level(get(LOG_LEVEL_ENV));
        let telemetry_json = get(TELEMETRY_FORMAT_ENV).map_or(format == LogFormat::Json, |value| {
            value.trim().eq_ignore_ascii_case("json")
        });

        let sink: Arc<dyn LogSink> = Arc::new(StderrLogSink);
        let logger: Option<Arc<dyn LoggerPort>> = match format {
            LogFormat::Off => None,
            LogFormat::Json => Some(Arc::new(JsonLogger::new(Arc::clone(&sink)).with_min_level(level))),
            LogFormat::Tracing => Some(Arc::new(TracingLogger::new())),
        };
        let telemetry: Option<Arc<dyn TelemetryPort>> = if telemetry_json {
            Some(Arc::new(JsonTelemetry::new(sink)))
        } else {
            None
        };
        Self { logger, telemetry }
    }

    /// Build from the process environment.
    #[must_use]
    pub fn from_env() -> Self {
        let env = [LOG_FORMAT_ENV, LOG_LEVEL_ENV, TELEMETRY_FORMAT_ENV]
            .into_iter()
            .filter_map(|key| std::env::var(key).ok().map(|value| (key.to_owned(), value)))
            .collect();
        Self::from_map(&env)
    }

    /// Copy whose events and metrics carry the request's correlation id.
    #[must_use]
    pub fn scoped(&self, ctx: &RequestContext) -> Self {
        let correlation_id = ctx.correlation_id().as_str();
        let logger = self.logger.as_ref().map(|logger| {
            let mut fields = LogFields::new();
            fields.insert("correlationId".into(), Value::String(correlation_id.to_owned()));
            Arc::<dyn LoggerPort>::from(logger.child(fields))
        });
        let telemetry = self.telemetry.as_ref().map(|telemetry| {
            let mut tags = TelemetryTags::new();
            tags.insert("correlationId".into(), correlation_id.into());
            Arc::new(TaggedTelemetry::new(Arc::clone(telemetry), tags)) as Arc<dyn TelemetryPort>
        });
        Self { logger, telemetry }
    }

    /// Telemetry that also feeds `recorder`, for in-process read-back.
    #[must_use]
    pub fn telemetry_with(&self, recorder: Arc<InMemoryTelemetry>) -> Arc<dyn TelemetryPort> {
        let recorder: Arc<dyn TelemetryPort> = recorder;
        match self.telemetry.as_ref() {
            Some(telemetry) => Arc::new(FanoutTelemetry {
                sinks: vec![recorder, Arc::clone(telemetry)],
            }),
            None => recorder,
        }
    }
}

struct FanoutTelemetry {
    sinks: Vec<Arc<dyn TelemetryPort>>,
}

struct FanoutTimer(Vec<Box<dyn TelemetryTimer>>);

impl TelemetryTimer for FanoutTimer {
    fn stop(&self) {
        for timer in &self.0 {
            timer.stop();
        }
    }
}

impl TelemetryPort for FanoutTelemetry {
    fn increment_counter(&self, name: &str, value: u64, tags: Option<&TelemetryTags>) {
        for sink in &self.sinks {
            sink.increment_counter(name, value, tags);
        }
    }

    fn record_timer_ms(&self, name: &str, duration_ms: u64, tags: Option<&TelemetryTags>) {
        for sink in &self.sinks {
            sink.record_timer_ms(name, duration_ms, tags);
        }
    }

    fn start_timer(&self, name: &str, tags: Option<&TelemetryTags>) -> Box<dyn TelemetryTimer> {
        Box::new(FanoutTimer(
            self.sinks.iter().map(|sink| sink.start_timer(name, tags)).collect(),
        ))
    }
}

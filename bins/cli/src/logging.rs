//! `tracing` subscriber setup.
//!
//! `DOCRAG_LOG_FORMAT` selects the output: `json` installs a JSON formatter,
//! `tracing`/`text`/`pretty` a human formatter at `info`. Without it a plain
//! formatter still reports warnings, so cache store failures are never
//! silent. `DOCRAG_LOG_LEVEL` (or `RUST_LOG`) overrides the filter. Output
//! goes to stderr so stdout stays reserved for command results.

use docrag_infra::observability::{LOG_FORMAT_ENV, LOG_LEVEL_ENV, LogFormat};
use tracing_subscriber::EnvFilter;

/// Filter used when neither `DOCRAG_LOG_LEVEL` nor `RUST_LOG` is set.
const fn default_directive(format: LogFormat) -> &'static str {
    match format {
        LogFormat::Off => "warn",
        LogFormat::Json | LogFormat::Tracing => "info",
    }
}

/// Install the global subscriber. A second call is a no-op.
pub fn init() {
    let format = LogFormat::parse(std::env::var(LOG_FORMAT_ENV).ok().as_deref());

    let filter = std::env::var(LOG_LEVEL_ENV)
        .ok()
        .and_then(|level| EnvFilter::try_new(level).ok())
        .or_else(|| EnvFilter::try_from_default_env().ok())
        .unwrap_or_else(|| EnvFilter::new(default_directive(format)));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true);
    let installed = match format {
        LogFormat::Json => builder.json().try_init(),
        LogFormat::Tracing | LogFormat::Off => builder.with_ansi(false).try_init(),
    };
    if let Err(error) = installed {
        tracing::debug!(%error, "tracing subscriber already installed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn warnings_are_kept_without_an_explicit_format() {
        assert_eq!(default_directive(LogFormat::Off), "warn");
        assert_eq!(default_directive(LogFormat::Json), "info");
    }
}

//! `tracing` subscriber construction.

use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::format::FmtSpan;

use crate::error::{TelemetryError, TelemetryResult};

/// Which rendering to use for log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable, single line per event, for interactive use.
    #[default]
    Compact,
    /// One JSON object per line, for collection by an external log shipper.
    Json,
}

/// Logging configuration resolved once at process start.
///
/// `directive` follows `EnvFilter` syntax (e.g. `"info,encryptor_daemon=debug"`);
/// the documented default is `info` for this workspace's crates and `warn`
/// for third-party crates.
#[derive(Debug, Clone)]
pub struct LogConfig {
    directive: String,
    format: LogFormat,
}

impl LogConfig {
    /// Start from a directive string at the documented default format.
    #[must_use]
    pub fn new(directive: impl Into<String>) -> Self {
        Self {
            directive: directive.into(),
            format: LogFormat::default(),
        }
    }

    /// Select the rendering.
    #[must_use]
    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self::new("info,tower_http=warn,hyper=warn")
    }
}

/// Install a global `tracing` subscriber built from `config`.
///
/// # Errors
///
/// Returns [`TelemetryError::InvalidDirective`] if `config`'s directive
/// string is not valid `EnvFilter` syntax, or
/// [`TelemetryError::AlreadyInitialized`] if a global subscriber was already
/// installed in this process.
pub fn setup_logging(config: &LogConfig) -> TelemetryResult<()> {
    let filter = EnvFilter::try_new(&config.directive)
        .map_err(|e| TelemetryError::InvalidDirective(e.to_string()))?;

    let registry = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_span_events(FmtSpan::CLOSE)
        .with_target(true);

    let result = match config.format {
        LogFormat::Compact => registry.compact().try_init(),
        LogFormat::Json => registry.json().try_init(),
    };

    result.map_err(|_| TelemetryError::AlreadyInitialized)
}

/// Install a global subscriber at the documented defaults (`info` directive,
/// compact rendering). Convenience wrapper for binaries that do not need to
/// override the format.
///
/// # Errors
///
/// See [`setup_logging`].
pub fn setup_default_logging() -> TelemetryResult<()> {
    setup_logging(&LogConfig::default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_uses_compact_format() {
        let config = LogConfig::default();
        assert_eq!(config.format, LogFormat::Compact);
    }

    #[test]
    fn invalid_directive_is_rejected() {
        let config = LogConfig::new("this is not a valid directive===");
        assert!(matches!(
            setup_logging(&config),
            Err(TelemetryError::InvalidDirective(_))
        ));
    }
}

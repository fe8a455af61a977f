//! Tracing subscriber installation.

use serde::{Deserialize, Serialize};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Logging errors.
#[derive(Debug, thiserror::Error)]
pub enum ObservabilityError {
    #[error("invalid log level directive: {0}")]
    InvalidLevel(String),

    #[error("failed to install tracing subscriber: {0}")]
    Install(String),
}

/// Output format for logs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// JSON format (for production/log aggregation).
    Json,
    /// Human-readable format (for development).
    #[default]
    Human,
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogSettings {
    /// Default filter directive, overridden by `RUST_LOG`.
    #[serde(default = "default_level")]
    pub level: String,
    /// Output format.
    #[serde(default)]
    pub format: LogFormat,
}

fn default_level() -> String {
    "info".to_string()
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: default_level(),
            format: LogFormat::default(),
        }
    }
}

impl LogSettings {
    /// Raise the level to debug.
    pub fn verbose(mut self) -> Self {
        self.level = "debug".to_string();
        self
    }
}

/// Install a global tracing subscriber. Logs go to stderr.
pub fn init(settings: &LogSettings) -> Result<(), ObservabilityError> {
    let directive = settings
        .level
        .parse()
        .map_err(|_| ObservabilityError::InvalidLevel(settings.level.clone()))?;
    let env_filter = EnvFilter::builder()
        .with_default_directive(directive)
        .from_env_lossy();

    let fmt_layer = match settings.format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_current_span(true)
            .with_target(true)
            .with_writer(std::io::stderr)
            .boxed(),
        LogFormat::Human => fmt::layer()
            .compact()
            .with_target(false)
            .with_writer(std::io::stderr)
            .boxed(),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()
        .map_err(|err| ObservabilityError::Install(err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_settings_defaults() {
        let settings = LogSettings::default();
        assert_eq!(settings.level, "info");
        assert_eq!(settings.format, LogFormat::Human);
        assert_eq!(settings.verbose().level, "debug");
    }

    #[test]
    fn test_invalid_level_is_rejected() {
        let settings = LogSettings {
            level: "ppr=notalevel".to_string(),
            format: LogFormat::Json,
        };
        assert!(matches!(
            init(&settings),
            Err(ObservabilityError::InvalidLevel(_))
        ));
    }
}

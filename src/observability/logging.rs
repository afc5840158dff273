//! Logging setup on top of `tracing-subscriber`
//!
//! Features:
//! - Level from configuration, overridable through `RUST_LOG`
//! - Plain or compact text output

use tracing::Level;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::EnvFilter;

/// Log format type
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum LogFormat {
    /// Plain text format (default)
    #[default]
    Text,
    /// Single-line compact format
    Compact,
}

impl LogFormat {
    /// Parse log format from string
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "text" | "plain" => Some(Self::Text),
            "compact" => Some(Self::Compact),
            _ => None,
        }
    }
}

/// Log configuration
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: Level,
    /// Log format
    pub format: LogFormat,
    /// Include the event target (module path)
    pub with_target: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            format: LogFormat::Text,
            with_target: false,
        }
    }
}

impl LogConfig {
    /// Parse log level from string
    pub fn parse_level(s: &str) -> Option<Level> {
        match s.to_lowercase().as_str() {
            "trace" => Some(Level::TRACE),
            "debug" => Some(Level::DEBUG),
            "info" => Some(Level::INFO),
            "warn" | "warning" => Some(Level::WARN),
            "error" => Some(Level::ERROR),
            _ => None,
        }
    }

    /// Convert level to string
    pub fn level_to_string(level: Level) -> &'static str {
        match level {
            Level::TRACE => "trace",
            Level::DEBUG => "debug",
            Level::INFO => "info",
            Level::WARN => "warn",
            Level::ERROR => "error",
        }
    }

    pub fn with_level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }
}

/// Install a global fmt subscriber.
///
/// Returns false if a global subscriber was already set.
pub fn init_logging(config: &LogConfig) -> bool {
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::from_level(config.level).into())
        .from_env_lossy();

    let builder = tracing_subscriber::fmt()
        .with_target(config.with_target)
        .with_level(true)
        .with_env_filter(filter);

    match config.format {
        LogFormat::Text => builder.try_init().is_ok(),
        LogFormat::Compact => builder.compact().try_init().is_ok(),
    }
}

//! Logging configuration and initialization.

use std::env;

use tracing_subscriber::fmt::time::{ChronoLocal, ChronoUtc};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

const LOCAL_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f %z";
const UTC_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3fZ";

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable multi-line output
    #[default]
    Pretty,
    /// Single-line output for batch job logs
    Compact,
    /// One JSON object per event
    Json,
}

impl LogFormat {
    /// Parse format from string, falling back to `Pretty`
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "json" => LogFormat::Json,
            "compact" => LogFormat::Compact,
            _ => LogFormat::Pretty,
        }
    }
}

/// Timestamp format for log entries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimestampFormat {
    #[default]
    Local,
    Utc,
    None,
}

impl TimestampFormat {
    /// Parse format from string, falling back to `Local`
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "utc" => TimestampFormat::Utc,
            "none" | "off" => TimestampFormat::None,
            _ => TimestampFormat::Local,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LogConfig {
    pub format: LogFormat,
    pub timestamps: TimestampFormat,
    /// Filter used when `RUST_LOG` is not set
    pub default_level: String,
    /// Include source file and line
    pub include_location: bool,
    pub include_thread_ids: bool,
    /// Include the event target (module path)
    pub include_target: bool,
    /// Application name, logged once when the subscriber is installed
    pub app_name: Option<String>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::Pretty,
            timestamps: TimestampFormat::Local,
            default_level: "info".to_string(),
            include_location: false,
            include_thread_ids: false,
            include_target: true,
            app_name: None,
        }
    }
}

impl LogConfig {
    /// Create config from environment variables
    ///
    /// Reads `LOG_FORMAT`, `LOG_TIMESTAMPS`, `LOG_LEVEL`, `LOG_LOCATION`,
    /// `LOG_THREAD_IDS` and `LOG_APP_NAME`.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            format: env::var("LOG_FORMAT")
                .map(|s| LogFormat::parse(&s))
                .unwrap_or_default(),
            timestamps: env::var("LOG_TIMESTAMPS")
                .map(|s| TimestampFormat::parse(&s))
                .unwrap_or_default(),
            default_level: env::var("LOG_LEVEL").unwrap_or(defaults.default_level),
            include_location: env::var("LOG_LOCATION")
                .map(|s| parse_flag(&s))
                .unwrap_or(defaults.include_location),
            include_thread_ids: env::var("LOG_THREAD_IDS")
                .map(|s| parse_flag(&s))
                .unwrap_or(defaults.include_thread_ids),
            include_target: defaults.include_target,
            app_name: env::var("LOG_APP_NAME").ok(),
        }
    }

    /// Config from the environment, switched to `json()` output when
    /// `LOG_FORMAT` is unset and stdout is not a terminal (cron, systemd).
    pub fn detect() -> Self {
        Self::select(
            Self::from_env(),
            env::var_os("LOG_FORMAT").is_some(),
            atty::is(atty::Stream::Stdout),
        )
    }

    fn select(from_env: Self, format_set: bool, is_tty: bool) -> Self {
        if format_set || is_tty {
            return from_env;
        }
        let json = Self::json();
        Self {
            format: json.format,
            timestamps: json.timestamps,
            include_location: json.include_location,
            ..from_env
        }
    }

    /// Config for batch jobs whose output is shipped to a log store
    pub fn json() -> Self {
        Self {
            format: LogFormat::Json,
            timestamps: TimestampFormat::Utc,
            include_location: true,
            ..Default::default()
        }
    }

    /// Set the application name unless one came from the environment
    pub fn with_app_name(mut self, name: impl Into<String>) -> Self {
        if self.app_name.is_none() {
            self.app_name = Some(name.into());
        }
        self
    }
}

fn parse_flag(s: &str) -> bool {
    matches!(s.trim(), "true" | "1" | "yes")
}

/// Initialize the global tracing subscriber
///
/// # Errors
///
/// Returns an error if a global subscriber is already set or the default
/// level is not a valid filter directive.
pub fn init_logging(config: LogConfig) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.default_level)?,
    };

    let layer = fmt::layer()
        .with_target(config.include_target)
        .with_thread_ids(config.include_thread_ids)
        .with_file(config.include_location)
        .with_line_number(config.include_location)
        .with_ansi(config.format != LogFormat::Json && atty::is(atty::Stream::Stdout));

    let registry = tracing_subscriber::registry().with(env_filter);

    // Each format/timer combination is a distinct layer type.
    match (config.format, config.timestamps) {
        (LogFormat::Json, TimestampFormat::None) => {
            registry.with(layer.json().without_time()).try_init()?
        }
        (LogFormat::Json, TimestampFormat::Local) => registry
            .with(layer.json().with_timer(ChronoLocal::new(LOCAL_TIME_FORMAT.to_string())))
            .try_init()?,
        (LogFormat::Json, TimestampFormat::Utc) => registry
            .with(layer.json().with_timer(ChronoUtc::new(UTC_TIME_FORMAT.to_string())))
            .try_init()?,
        (LogFormat::Compact, TimestampFormat::None) => {
            registry.with(layer.compact().without_time()).try_init()?
        }
        (LogFormat::Compact, TimestampFormat::Local) => registry
            .with(layer.compact().with_timer(ChronoLocal::new(LOCAL_TIME_FORMAT.to_string())))
            .try_init()?,
        (LogFormat::Compact, TimestampFormat::Utc) => registry
            .with(layer.compact().with_timer(ChronoUtc::new(UTC_TIME_FORMAT.to_string())))
            .try_init()?,
        (LogFormat::Pretty, TimestampFormat::None) => {
            registry.with(layer.without_time()).try_init()?
        }
        (LogFormat::Pretty, TimestampFormat::Local) => registry
            .with(layer.with_timer(ChronoLocal::new(LOCAL_TIME_FORMAT.to_string())))
            .try_init()?,
        (LogFormat::Pretty, TimestampFormat::Utc) => registry
            .with(layer.with_timer(ChronoUtc::new(UTC_TIME_FORMAT.to_string())))
            .try_init()?,
    }

    if let Some(app) = &config.app_name {
        tracing::debug!(app = %app, "logging initialized");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_format_parse() {
        assert_eq!(LogFormat::parse("json"), LogFormat::Json);
        assert_eq!(LogFormat::parse("JSON"), LogFormat::Json);
        assert_eq!(LogFormat::parse(" compact "), LogFormat::Compact);
        assert_eq!(LogFormat::parse("pretty"), LogFormat::Pretty);
        assert_eq!(LogFormat::parse("unknown"), LogFormat::Pretty);
    }

    #[test]
    fn test_timestamp_format_parse() {
        assert_eq!(TimestampFormat::parse("utc"), TimestampFormat::Utc);
        assert_eq!(TimestampFormat::parse("UTC"), TimestampFormat::Utc);
        assert_eq!(TimestampFormat::parse("local"), TimestampFormat::Local);
        assert_eq!(TimestampFormat::parse("none"), TimestampFormat::None);
        assert_eq!(TimestampFormat::parse("off"), TimestampFormat::None);
    }

    #[test]
    fn test_log_config_json() {
        let config = LogConfig::json();
        assert_eq!(config.format, LogFormat::Json);
        assert_eq!(config.timestamps, TimestampFormat::Utc);
        assert!(config.include_location);
    }

    #[test]
    fn test_app_name_does_not_override_existing() {
        let config = LogConfig::default().with_app_name("first").with_app_name("second");
        assert_eq!(config.app_name.as_deref(), Some("first"));
    }

    #[test]
    fn test_select_json_without_terminal() {
        let from_env = LogConfig {
            default_level: "debug".to_string(),
            app_name: Some("partition-manager".to_string()),
            ..Default::default()
        };

        let piped = LogConfig::select(from_env.clone(), false, false);
        assert_eq!(piped.format, LogFormat::Json);
        assert_eq!(piped.timestamps, TimestampFormat::Utc);
        assert!(piped.include_location);
        assert_eq!(piped.default_level, "debug");
        assert_eq!(piped.app_name.as_deref(), Some("partition-manager"));

        let terminal = LogConfig::select(from_env.clone(), false, true);
        assert_eq!(terminal.format, LogFormat::Pretty);
        assert_eq!(terminal.timestamps, TimestampFormat::Local);

        let explicit = LogConfig::select(from_env, true, false);
        assert_eq!(explicit.format, LogFormat::Pretty);
        assert!(!explicit.include_location);
    }

    #[test]
    fn test_parse_flag() {
        assert!(parse_flag("true"));
        assert!(parse_flag("1"));
        assert!(!parse_flag("false"));
        assert!(!parse_flag(""));
    }
}

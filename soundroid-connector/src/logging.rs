//! Logging set-up for applications embedding the connector
//!
//! The crates only emit `tracing` events. Nothing is printed until the
//! application installs a subscriber, which this module does in one call.

use tracing_subscriber::{fmt, EnvFilter, Registry};

const MODE_ENV: &str = "SOUNDROID_LOG_MODE";
const LEVEL_ENV: &str = "SOUNDROID_LOG_LEVEL";

/// How much the connector should print
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoggingMode {
    /// Install nothing; events are dropped
    Silent,
    /// Compact stderr output at `info`
    Development,
    /// Every line sent and received, with threads and source locations
    Debug,
}

impl LoggingMode {
    /// Parse a `SOUNDROID_LOG_MODE` value; anything unknown is silent
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => LoggingMode::Development,
            "debug" => LoggingMode::Debug,
            _ => LoggingMode::Silent,
        }
    }

    fn default_level(self) -> &'static str {
        match self {
            LoggingMode::Silent => "off",
            LoggingMode::Development => "info",
            LoggingMode::Debug => "debug",
        }
    }
}

/// Logging configuration error
#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    #[error("Failed to initialize tracing subscriber: {0}")]
    TracingInit(String),

    #[error("Invalid log filter '{0}'")]
    InvalidFilter(String),
}

/// Install a global subscriber for `mode`.
///
/// `SOUNDROID_LOG_LEVEL` overrides the mode's level, then `RUST_LOG`.
///
/// ```rust,no_run
/// use soundroid_connector::logging::{init_logging, LoggingMode};
///
/// init_logging(LoggingMode::Development)?;
/// # Ok::<(), soundroid_connector::logging::LoggingError>(())
/// ```
pub fn init_logging(mode: LoggingMode) -> Result<(), LoggingError> {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    match mode {
        LoggingMode::Silent => Ok(()),
        LoggingMode::Development => {
            let filter = create_env_filter(mode.default_level())?;
            Registry::default()
                .with(
                    fmt::layer()
                        .with_target(false)
                        .with_thread_ids(false)
                        .compact(),
                )
                .with(filter)
                .try_init()
                .map_err(|e| LoggingError::TracingInit(e.to_string()))
        }
        LoggingMode::Debug => {
            let filter = create_env_filter(mode.default_level())?;
            Registry::default()
                .with(
                    fmt::layer()
                        .with_thread_names(true)
                        .with_file(true)
                        .with_line_number(true),
                )
                .with(filter)
                .try_init()
                .map_err(|e| LoggingError::TracingInit(e.to_string()))
        }
    }
}

/// Install a subscriber chosen by `SOUNDROID_LOG_MODE` (silent when unset)
pub fn init_logging_from_env() -> Result<(), LoggingError> {
    let mode = std::env::var(MODE_ENV)
        .map(|name| LoggingMode::from_name(&name))
        .unwrap_or(LoggingMode::Silent);
    init_logging(mode)
}

fn create_env_filter(default_level: &str) -> Result<EnvFilter, LoggingError> {
    let directives = std::env::var(LEVEL_ENV)
        .or_else(|_| std::env::var("RUST_LOG"))
        .unwrap_or_else(|_| default_level.to_string());

    EnvFilter::try_new(&directives).map_err(|_| LoggingError::InvalidFilter(directives))
}

/// Whether a global subscriber is already installed
pub fn is_initialized() -> bool {
    tracing::dispatcher::has_been_set()
}

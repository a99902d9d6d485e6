//! Logging configuration and initialization
//!
//! The compilation pipeline emits `tracing` events (per-node engine
//! assignment at debug, one summary per compilation at info, failures at warn
//! or error depending on the error category). This module installs a
//! `tracing-subscriber` stack for binaries and tests that embed the crate.
//!
//! # Environment Variables
//!
//! - `RUST_LOG`: Standard tracing filter (e.g., "info", "debug,graphforge=trace")
//! - `GRAPHFORGE_LOG_LEVEL`: Simple log level (error, warn, info, debug, trace)
//! - `GRAPHFORGE_LOG_FORMAT`: Output format ("human" or "json")
//! - `GRAPHFORGE_LOG_FILE`: Optional file path for log output (always JSON)

use once_cell::sync::OnceCell;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::{Layered, SubscriberExt},
    util::SubscriberInitExt,
    EnvFilter, Layer, Registry,
};

/// Set once the global subscriber has been installed (or installation was attempted)
static TRACING_INITIALIZED: OnceCell<()> = OnceCell::new();

/// Environment variable for log level override
pub const LOG_LEVEL_ENV: &str = "GRAPHFORGE_LOG_LEVEL";

/// Environment variable for log format (json/human)
pub const LOG_FORMAT_ENV: &str = "GRAPHFORGE_LOG_FORMAT";

/// Environment variable for log file path
pub const LOG_FILE_ENV: &str = "GRAPHFORGE_LOG_FILE";

type FilteredRegistry = Layered<EnvFilter, Registry>;
type BoxedLayer = Box<dyn Layer<FilteredRegistry> + Send + Sync>;

/// Errors that can occur during logging initialization
#[derive(Debug, Error)]
pub enum LoggingError {
    /// Filter directive could not be parsed
    #[error("invalid log filter: {0}")]
    InvalidFilter(String),

    /// Failed to create log file directory
    #[error("failed to create log directory: {0}")]
    DirectoryCreationFailed(String),

    /// Failed to open log file
    #[error("failed to open log file: {0}")]
    FileOpenFailed(String),

    /// Another global subscriber is already installed
    #[error("global subscriber already installed: {0}")]
    AlreadyInstalled(String),
}

/// Log level enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    /// Parse from string
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "error" => Some(LogLevel::Error),
            "warn" | "warning" => Some(LogLevel::Warn),
            "info" => Some(LogLevel::Info),
            "debug" => Some(LogLevel::Debug),
            "trace" => Some(LogLevel::Trace),
            _ => None,
        }
    }

    /// Convert to EnvFilter directive
    pub fn as_filter_str(&self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

/// Log format enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable output (default)
    #[default]
    Human,
    /// JSON structured output
    Json,
}

impl LogFormat {
    /// Parse from string
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "human" | "pretty" | "console" => Some(LogFormat::Human),
            "json" | "structured" => Some(LogFormat::Json),
            _ => None,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Default)]
pub struct LoggingConfig {
    pub level: LogLevel,
    pub format: LogFormat,
    /// Include source file and line in console output
    pub with_file_info: bool,
    /// Emit an event when a span (e.g. one compilation) closes
    pub with_span_events: bool,
    /// Optional JSON log file
    pub log_file: Option<PathBuf>,
}

impl LoggingConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_level(mut self, level: LogLevel) -> Self {
        self.level = level;
        self
    }

    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_file_info(mut self, with_file_info: bool) -> Self {
        self.with_file_info = with_file_info;
        self
    }

    pub fn with_span_events(mut self, with_span_events: bool) -> Self {
        self.with_span_events = with_span_events;
        self
    }

    pub fn with_log_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.log_file = Some(path.into());
        self
    }

    /// Build a configuration from `GRAPHFORGE_LOG_*` variables.
    ///
    /// Unparseable values fall back to the defaults.
    pub fn from_env() -> Self {
        let level = std::env::var(LOG_LEVEL_ENV)
            .ok()
            .and_then(|s| LogLevel::from_str(&s))
            .unwrap_or_default();
        let format = std::env::var(LOG_FORMAT_ENV)
            .ok()
            .and_then(|s| LogFormat::from_str(&s))
            .unwrap_or_default();

        let mut config = LoggingConfig::new().with_level(level).with_format(format);
        if let Ok(path) = std::env::var(LOG_FILE_ENV) {
            if !path.trim().is_empty() {
                config = config.with_log_file(path);
            }
        }
        config
    }
}

/// Initialize logging from the environment, ignoring failures.
///
/// Idempotent: only the first call installs a subscriber.
///
/// # Example
///
/// ```ignore
/// graphforge::init_logging_default();
/// tracing::info!("compiler ready");
/// ```
pub fn init_logging_default() {
    init_logging_from_env().ok();
}

/// Initialize logging from `RUST_LOG` and the `GRAPHFORGE_LOG_*` variables.
///
/// Idempotent. Errors are only reported by the call that performs the
/// installation.
pub fn init_logging_from_env() -> Result<(), LoggingError> {
    init_with_config(&LoggingConfig::from_env())
}

/// Initialize logging with a custom configuration.
///
/// Idempotent. Errors are only reported by the call that performs the
/// installation.
pub fn init_with_config(config: &LoggingConfig) -> Result<(), LoggingError> {
    let mut result = Ok(());
    TRACING_INITIALIZED.get_or_init(|| {
        result = install(config);
    });
    result
}

/// Check if initialization has been attempted
pub fn is_initialized() -> bool {
    TRACING_INITIALIZED.get().is_some()
}

fn install(config: &LoggingConfig) -> Result<(), LoggingError> {
    let env_filter = build_env_filter(config.level)?;

    let mut layers: Vec<BoxedLayer> = vec![console_layer(config)];
    if let Some(path) = &config.log_file {
        layers.push(file_layer(config, path)?);
    }

    tracing_subscriber::registry()
        .with(env_filter)
        .with(layers)
        .try_init()
        .map_err(|e| LoggingError::AlreadyInstalled(e.to_string()))
}

fn console_layer(config: &LoggingConfig) -> BoxedLayer {
    match config.format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_target(false)
            .with_file(config.with_file_info)
            .with_line_number(config.with_file_info)
            .with_span_events(span_events(config.with_span_events))
            .boxed(),
        LogFormat::Human => fmt::layer()
            .with_target(true)
            .with_thread_ids(false)
            .with_thread_names(false)
            .with_file(config.with_file_info)
            .with_line_number(config.with_file_info)
            .with_span_events(span_events(config.with_span_events))
            .boxed(),
    }
}

/// File output is always JSON regardless of the console format
fn file_layer(config: &LoggingConfig, path: &Path) -> Result<BoxedLayer, LoggingError> {
    let file = open_log_file(path)?;
    Ok(fmt::layer()
        .json()
        .with_writer(file)
        .with_target(false)
        .with_file(true)
        .with_line_number(true)
        .with_ansi(false)
        .with_span_events(span_events(config.with_span_events))
        .boxed())
}

fn open_log_file(path: &Path) -> Result<std::fs::File, LoggingError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .map_err(|e| LoggingError::DirectoryCreationFailed(e.to_string()))?;
        }
    }

    std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| LoggingError::FileOpenFailed(e.to_string()))
}

fn span_events(enabled: bool) -> FmtSpan {
    if enabled {
        FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    }
}

/// RUST_LOG wins, then GRAPHFORGE_LOG_LEVEL, then the configured level.
fn build_env_filter(default_level: LogLevel) -> Result<EnvFilter, LoggingError> {
    if let Ok(rust_log) = std::env::var("RUST_LOG") {
        return EnvFilter::try_new(rust_log).map_err(|e| LoggingError::InvalidFilter(e.to_string()));
    }

    if let Some(level) = std::env::var(LOG_LEVEL_ENV)
        .ok()
        .and_then(|s| LogLevel::from_str(&s))
    {
        return Ok(EnvFilter::new(level.as_filter_str()));
    }

    Ok(EnvFilter::new(default_level.as_filter_str()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_log_level_from_str() {
        assert_eq!(LogLevel::from_str("error"), Some(LogLevel::Error));
        assert_eq!(LogLevel::from_str("WARNING"), Some(LogLevel::Warn));
        assert_eq!(LogLevel::from_str(" debug "), Some(LogLevel::Debug));
        assert_eq!(LogLevel::from_str("trace"), Some(LogLevel::Trace));
        assert_eq!(LogLevel::from_str("verbose"), None);
    }

    #[test]
    fn test_log_format_from_str() {
        assert_eq!(LogFormat::from_str("human"), Some(LogFormat::Human));
        assert_eq!(LogFormat::from_str("console"), Some(LogFormat::Human));
        assert_eq!(LogFormat::from_str("json"), Some(LogFormat::Json));
        assert_eq!(LogFormat::from_str("xml"), None);
    }

    #[test]
    fn test_logging_config_builder() {
        let config = LoggingConfig::new()
            .with_level(LogLevel::Debug)
            .with_format(LogFormat::Json)
            .with_file_info(true)
            .with_log_file("/tmp/graphforge.log");

        assert_eq!(config.level, LogLevel::Debug);
        assert_eq!(config.format, LogFormat::Json);
        assert!(config.with_file_info);
        assert!(!config.with_span_events);
        assert_eq!(config.log_file, Some(PathBuf::from("/tmp/graphforge.log")));
    }

    #[test]
    #[serial]
    fn test_config_from_env() {
        std::env::set_var(LOG_LEVEL_ENV, "trace");
        std::env::set_var(LOG_FORMAT_ENV, "json");
        std::env::set_var(LOG_FILE_ENV, "");

        let config = LoggingConfig::from_env();
        assert_eq!(config.level, LogLevel::Trace);
        assert_eq!(config.format, LogFormat::Json);
        assert!(config.log_file.is_none());

        std::env::set_var(LOG_LEVEL_ENV, "nonsense");
        assert_eq!(LoggingConfig::from_env().level, LogLevel::Info);

        std::env::remove_var(LOG_LEVEL_ENV);
        std::env::remove_var(LOG_FORMAT_ENV);
        std::env::remove_var(LOG_FILE_ENV);
    }

    #[test]
    fn test_open_log_file_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("compile.log");

        let file = open_log_file(&path);
        assert!(file.is_ok());
        assert!(path.exists());
    }

    #[test]
    fn test_init_logging_default_idempotent() {
        init_logging_default();
        init_logging_default();
        assert!(is_initialized());
    }
}

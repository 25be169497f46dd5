/// Structured logging for the aquarium tracker.
///
/// Provides context-rich logging tagged with the emitting component and an
/// optional scope (a parameter key, a bucket name, a request URL),
/// timestamps, and severity levels. Supports both console output and
/// file-based logging for the background cache process.
///
/// Logging is a no-op until `init_logger` has been called.

use chrono::Utc;
use std::fmt;
use std::fs::OpenOptions;
use std::io::Write;
use std::str::FromStr;
use std::sync::Mutex;

use crate::error::CacheError;

// ---------------------------------------------------------------------------
// Log Levels
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogLevel::Debug => write!(f, "DEBUG"),
            LogLevel::Info => write!(f, "INFO"),
            LogLevel::Warning => write!(f, "WARN"),
            LogLevel::Error => write!(f, "ERROR"),
        }
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warning),
            "error" => Ok(LogLevel::Error),
            other => Err(format!("unknown log level '{}'", other)),
        }
    }
}

// ---------------------------------------------------------------------------
// Components
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Component {
    Classifier,
    Cache,
    Config,
    System,
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Component::Classifier => write!(f, "CLASSIFY"),
            Component::Cache => write!(f, "CACHE"),
            Component::Config => write!(f, "CONFIG"),
            Component::System => write!(f, "SYS"),
        }
    }
}

// ---------------------------------------------------------------------------
// Failure Classification
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureType {
    /// Expected failure - the page is offline and the cache had nothing to offer
    Expected,
    /// Unexpected failure - storage or lifecycle misuse
    Unexpected,
    /// Unknown - cannot determine if this is expected or not
    Unknown,
}

impl fmt::Display for FailureType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureType::Expected => write!(f, "EXPECTED"),
            FailureType::Unexpected => write!(f, "UNEXPECTED"),
            FailureType::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

// ---------------------------------------------------------------------------
// Logger Configuration
// ---------------------------------------------------------------------------

/// Global logger instance
static LOGGER: Mutex<Option<Logger>> = Mutex::new(None);

pub struct Logger {
    /// Minimum log level to display
    min_level: LogLevel,
    /// Optional file path for logging
    log_file: Option<String>,
    /// Whether to include timestamps in console output
    console_timestamps: bool,
}

impl Logger {
    /// Initialize the global logger
    pub fn init(min_level: LogLevel, log_file: Option<String>, console_timestamps: bool) {
        let logger = Logger {
            min_level,
            log_file,
            console_timestamps,
        };

        if let Ok(mut slot) = LOGGER.lock() {
            *slot = Some(logger);
        }
    }

    fn format_entry(level: LogLevel, component: Component, scope: Option<&str>, message: &str) -> String {
        let timestamp = Utc::now().format("%Y-%m-%d %H:%M:%S UTC");
        let scope_part = scope.map(|s| format!(" [{}]", s)).unwrap_or_default();
        format!("{} {} {}{}: {}", timestamp, level, component, scope_part, message)
    }

    fn log(&self, level: LogLevel, component: Component, scope: Option<&str>, message: &str) {
        if level < self.min_level {
            return;
        }

        let log_entry = Self::format_entry(level, component, scope, message);
        let scope_part = scope.map(|s| format!(" [{}]", s)).unwrap_or_default();

        // Console output goes to stderr; stdout carries command output.
        if self.console_timestamps {
            eprintln!("{}", log_entry);
        } else {
            match level {
                LogLevel::Error => eprintln!("   ✗ {}{}: {}", component, scope_part, message),
                LogLevel::Warning => eprintln!("   ⚠ {}{}: {}", component, scope_part, message),
                LogLevel::Info => eprintln!("   {}", message),
                LogLevel::Debug => {} // Skip debug in non-timestamp mode
            }
        }

        if let Some(ref path) = self.log_file {
            if let Err(e) = Self::append_to_file(path, &log_entry) {
                eprintln!("Failed to write to log file {}: {}", path, e);
            }
        }
    }

    fn append_to_file(path: &str, entry: &str) -> std::io::Result<()> {
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        writeln!(file, "{}", entry)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Public Logging Functions
// ---------------------------------------------------------------------------

/// Initialize the global logger
pub fn init_logger(min_level: LogLevel, log_file: Option<&str>, console_timestamps: bool) {
    Logger::init(min_level, log_file.map(String::from), console_timestamps);
}

fn dispatch(level: LogLevel, component: Component, scope: Option<&str>, message: &str) {
    if let Ok(guard) = LOGGER.lock() {
        if let Some(logger) = guard.as_ref() {
            logger.log(level, component, scope, message);
        }
    }
}

pub fn info(component: Component, scope: Option<&str>, message: &str) {
    dispatch(LogLevel::Info, component, scope, message);
}

pub fn warn(component: Component, scope: Option<&str>, message: &str) {
    dispatch(LogLevel::Warning, component, scope, message);
}

pub fn error(component: Component, scope: Option<&str>, message: &str) {
    dispatch(LogLevel::Error, component, scope, message);
}

pub fn debug(component: Component, scope: Option<&str>, message: &str) {
    dispatch(LogLevel::Debug, component, scope, message);
}

// ---------------------------------------------------------------------------
// Failure Classification Helpers
// ---------------------------------------------------------------------------

/// Classify a cache controller failure by how surprising it is.
pub fn classify_cache_failure(err: &CacheError) -> FailureType {
    match err {
        // Offline with nothing cached is the normal offline experience
        CacheError::NoResponse { .. } => FailureType::Expected,
        CacheError::NetworkFailure { .. } | CacheError::AssetFetchFailure { .. } => FailureType::Unknown,
        CacheError::Storage { .. }
        | CacheError::NotActive { .. }
        | CacheError::InvalidTransition { .. }
        | CacheError::Config(_) => FailureType::Unexpected,
    }
}

/// Log a cache failure with automatic classification.
pub fn log_cache_failure(scope: &str, operation: &str, err: &CacheError) {
    let failure_type = classify_cache_failure(err);
    let message = format!("{} failed [{}]: {}", operation, failure_type, err);

    match failure_type {
        FailureType::Expected => debug(Component::Cache, Some(scope), &message),
        FailureType::Unexpected => error(Component::Cache, Some(scope), &message),
        FailureType::Unknown => warn(Component::Cache, Some(scope), &message),
    }
}

/// Log a completed install pass.
pub fn log_install_summary(bucket: &str, stored: usize) {
    info(
        Component::Cache,
        Some(bucket),
        &format!("Install complete: {} assets cached", stored),
    );
}

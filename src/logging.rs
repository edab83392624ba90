//! File-based logging for hosts embedding the guard.
//!
//! The guard itself only emits `tracing` events. Hosts that do not install
//! their own subscriber can call [`init_file_logging`] to get daily-rotated
//! log files, with audit records split into their own file.

use crate::security::AUDIT_TARGET;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::OnceLock;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::filter::{EnvFilter, LevelFilter, Targets};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::Layer;

/// Configuration for file logging.
///
/// By default, logs go to `~/.local/share/boundary-guard/logs/`.
///
/// # Example
///
/// ```rust
/// use boundary_guard::logging::{LogLevel, LoggingConfig};
///
/// let config = LoggingConfig::new()
///     .with_app_name("code-search")
///     .with_level(LogLevel::Debug)
///     .with_audit_file(true);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Whether file logging is enabled.
    pub enabled: bool,
    /// Log files are named `{app_name}.log` with daily rotation.
    pub app_name: String,
    /// Custom log directory. If None, uses the local data dir.
    pub log_dir: Option<PathBuf>,
    /// Level for ordinary events.
    pub level: LogLevel,
    /// Write audit records to `{app_name}-audit.log` instead of the main log.
    pub audit_file: bool,
}

impl LoggingConfig {
    /// Creates a new LoggingConfig with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a disabled logging configuration.
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Default::default()
        }
    }

    /// Sets the application name for log file naming.
    #[must_use]
    pub fn with_app_name(mut self, name: impl Into<String>) -> Self {
        self.app_name = name.into();
        self
    }

    /// Sets a custom log directory.
    #[must_use]
    pub fn with_log_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.log_dir = Some(path.into());
        self
    }

    /// Sets the level for ordinary events.
    #[must_use]
    pub fn with_level(mut self, level: LogLevel) -> Self {
        self.level = level;
        self
    }

    /// Routes audit records to a separate file.
    #[must_use]
    pub fn with_audit_file(mut self, audit_file: bool) -> Self {
        self.audit_file = audit_file;
        self
    }

    /// The filter directives applied to the main log.
    ///
    /// Audit records are always kept at debug level or above, regardless of
    /// `level`, unless they are routed to their own file.
    #[must_use]
    pub fn directives(&self) -> String {
        if self.audit_file {
            format!("{},{}=off", self.level.as_str(), AUDIT_TARGET)
        } else {
            format!("{},{}=debug", self.level.as_str(), AUDIT_TARGET)
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            app_name: "boundary-guard".to_string(),
            log_dir: None,
            level: LogLevel::default(),
            audit_file: false,
        }
    }
}

/// Log level filter for file logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Trace level - most verbose.
    Trace,
    /// Debug level.
    Debug,
    /// Info level - default.
    #[default]
    Info,
    /// Warn level.
    Warn,
    /// Error level - least verbose.
    Error,
}

impl LogLevel {
    /// Converts to a tracing_subscriber LevelFilter.
    #[must_use]
    pub fn to_filter(self) -> LevelFilter {
        match self {
            Self::Trace => LevelFilter::TRACE,
            Self::Debug => LevelFilter::DEBUG,
            Self::Info => LevelFilter::INFO,
            Self::Warn => LevelFilter::WARN,
            Self::Error => LevelFilter::ERROR,
        }
    }

    /// The directive spelling of this level.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

/// Guard that must be held to keep file logging active.
///
/// When dropped, flushes pending logs and stops file logging.
pub struct LoggingGuard {
    _guards: Vec<WorkerGuard>,
}

impl fmt::Debug for LoggingGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoggingGuard").finish_non_exhaustive()
    }
}

static LOGGING_GUARD: OnceLock<LoggingGuard> = OnceLock::new();

/// Errors that can occur during logging initialization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingError {
    /// The specific error that occurred.
    pub kind: LoggingErrorKind,
}

/// Specific logging error types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoggingErrorKind {
    /// Failed to determine the local data directory.
    NoDataDir,
    /// Failed to create log directory.
    CreateDirFailed {
        /// The path that could not be created.
        path: PathBuf,
        /// The reason for failure.
        reason: String,
    },
    /// The filter directives could not be parsed.
    InvalidFilter {
        /// The parser's complaint.
        reason: String,
    },
    /// Subscriber initialization failed.
    SubscriberInitFailed {
        /// The reason for failure.
        reason: String,
    },
}

impl LoggingError {
    /// Creates a new LoggingError with the given kind.
    #[must_use]
    pub fn new(kind: LoggingErrorKind) -> Self {
        Self { kind }
    }

    /// Creates an error for a missing data directory.
    #[must_use]
    pub fn no_data_dir() -> Self {
        Self::new(LoggingErrorKind::NoDataDir)
    }

    /// Creates an error for failed directory creation.
    #[must_use]
    pub fn create_dir_failed(path: PathBuf, reason: impl Into<String>) -> Self {
        Self::new(LoggingErrorKind::CreateDirFailed {
            path,
            reason: reason.into(),
        })
    }

    /// Creates an error for unparseable filter directives.
    #[must_use]
    pub fn invalid_filter(reason: impl Into<String>) -> Self {
        Self::new(LoggingErrorKind::InvalidFilter {
            reason: reason.into(),
        })
    }

    /// Creates an error for subscriber initialization failure.
    #[must_use]
    pub fn subscriber_init_failed(reason: impl Into<String>) -> Self {
        Self::new(LoggingErrorKind::SubscriberInitFailed {
            reason: reason.into(),
        })
    }

    /// Returns true if this is a missing data directory error.
    #[must_use]
    pub fn is_no_data_dir(&self) -> bool {
        matches!(self.kind, LoggingErrorKind::NoDataDir)
    }
}

impl fmt::Display for LoggingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            LoggingErrorKind::NoDataDir => {
                write!(
                    f,
                    "could not determine the local data directory; use a custom log_dir"
                )
            }
            LoggingErrorKind::CreateDirFailed { path, reason } => {
                write!(
                    f,
                    "failed to create log directory '{}': {}; check permissions",
                    path.display(),
                    reason
                )
            }
            LoggingErrorKind::InvalidFilter { reason } => {
                write!(f, "invalid log filter: {}", reason)
            }
            LoggingErrorKind::SubscriberInitFailed { reason } => {
                write!(
                    f,
                    "failed to initialize tracing subscriber: {}; \
                     a subscriber may already be set",
                    reason
                )
            }
        }
    }
}

impl std::error::Error for LoggingError {}

/// Returns the directory logs are written to.
///
/// # Errors
///
/// Returns `NoDataDir` if no custom directory is set and the platform data
/// directory cannot be determined.
pub fn get_log_dir(config: &LoggingConfig) -> Result<PathBuf, LoggingError> {
    if let Some(ref custom_dir) = config.log_dir {
        return Ok(custom_dir.clone());
    }

    dirs::data_local_dir()
        .map(|dir| dir.join("boundary-guard").join("logs"))
        .ok_or_else(LoggingError::no_data_dir)
}

/// Initializes file-based logging with the given configuration.
///
/// Returns `Ok(None)` if logging is disabled. The returned guard must be
/// held to keep logging active.
///
/// # Errors
///
/// Returns an error if the log directory cannot be created or a global
/// subscriber is already installed.
///
/// # Example
///
/// ```rust,ignore
/// use boundary_guard::logging::{init_file_logging, LoggingConfig};
///
/// let _guard = init_file_logging(&LoggingConfig::default())?;
/// ```
pub fn init_file_logging(config: &LoggingConfig) -> Result<Option<LoggingGuard>, LoggingError> {
    if !config.enabled {
        return Ok(None);
    }

    let log_dir = get_log_dir(config)?;
    std::fs::create_dir_all(&log_dir)
        .map_err(|e| LoggingError::create_dir_failed(log_dir.clone(), e.to_string()))?;

    let filter = EnvFilter::try_new(config.directives())
        .map_err(|e| LoggingError::invalid_filter(e.to_string()))?;

    let main_appender =
        tracing_appender::rolling::daily(&log_dir, format!("{}.log", config.app_name));
    let (main_writer, main_guard) = tracing_appender::non_blocking(main_appender);
    let mut guards = vec![main_guard];

    let main_layer = tracing_subscriber::fmt::layer()
        .with_writer(main_writer)
        .with_ansi(false)
        .with_target(true)
        .with_filter(filter);

    let audit_layer = if config.audit_file {
        let audit_appender =
            tracing_appender::rolling::daily(&log_dir, format!("{}-audit.log", config.app_name));
        let (audit_writer, audit_guard) = tracing_appender::non_blocking(audit_appender);
        guards.push(audit_guard);

        Some(
            tracing_subscriber::fmt::layer()
                .with_writer(audit_writer)
                .with_ansi(false)
                .with_target(false)
                .with_filter(Targets::new().with_target(AUDIT_TARGET, LevelFilter::DEBUG)),
        )
    } else {
        None
    };

    tracing_subscriber::registry()
        .with(main_layer)
        .with(audit_layer)
        .try_init()
        .map_err(|e| LoggingError::subscriber_init_failed(e.to_string()))?;

    Ok(Some(LoggingGuard { _guards: guards }))
}

/// Initializes file logging and keeps the guard for the process lifetime.
///
/// Returns `Ok(false)` if logging is disabled or was already initialized.
///
/// # Errors
///
/// Same as [`init_file_logging`].
pub fn init_and_store_logging(config: &LoggingConfig) -> Result<bool, LoggingError> {
    if LOGGING_GUARD.get().is_some() {
        return Ok(false);
    }

    match init_file_logging(config)? {
        Some(guard) => {
            // A concurrent initializer may have won; its guard is kept.
            let _ = LOGGING_GUARD.set(guard);
            Ok(true)
        }
        None => Ok(false),
    }
}

//! Configuration types for the guard.

use crate::security::{
    PatternSafetyChecker, DEFAULT_MAX_INPUT_LENGTH, MAX_EXECUTION_TIME, MAX_PATTERN_LENGTH,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration structure for boundary-guard.
///
/// This structure maps directly to the TOML configuration file format:
///
/// ```toml
/// root = "/home/user/project"
/// allowed_directories = ["/home/user/shared-fixtures"]
/// max_input_length = 1000
///
/// [patterns]
/// max_length = 1000
/// max_execution_ms = 1000
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuardConfig {
    /// The project root. Without one, only structural path checks apply.
    #[serde(default)]
    pub root: Option<PathBuf>,

    /// Extra directories allowed in addition to the root.
    ///
    /// Relative entries resolve against `root`.
    #[serde(default)]
    pub allowed_directories: Vec<PathBuf>,

    /// Default cap for sanitized free text, in characters.
    #[serde(default = "default_max_input_length")]
    pub max_input_length: usize,

    /// Limits for search-pattern validation.
    #[serde(default)]
    pub patterns: PatternLimits,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            root: None,
            allowed_directories: Vec::new(),
            max_input_length: DEFAULT_MAX_INPUT_LENGTH,
            patterns: PatternLimits::default(),
        }
    }
}

impl GuardConfig {
    /// Creates an empty configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the project root.
    #[must_use]
    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = Some(root.into());
        self
    }

    /// Adds an allowed directory.
    #[must_use]
    pub fn with_allowed_directory(mut self, dir: impl Into<PathBuf>) -> Self {
        self.allowed_directories.push(dir.into());
        self
    }

    /// Sets the pattern limits.
    #[must_use]
    pub fn with_patterns(mut self, patterns: PatternLimits) -> Self {
        self.patterns = patterns;
        self
    }

    /// Sets the default cap for sanitized text.
    #[must_use]
    pub fn with_max_input_length(mut self, max_input_length: usize) -> Self {
        self.max_input_length = max_input_length;
        self
    }

    /// Returns true if no root is configured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }
}

/// Limits applied by the pattern checker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatternLimits {
    /// Maximum pattern length, in characters.
    #[serde(default = "default_max_length")]
    pub max_length: usize,

    /// Wall-clock budget for the trial match, in milliseconds.
    #[serde(default = "default_max_execution_ms")]
    pub max_execution_ms: u64,
}

impl Default for PatternLimits {
    fn default() -> Self {
        Self {
            max_length: default_max_length(),
            max_execution_ms: default_max_execution_ms(),
        }
    }
}

impl PatternLimits {
    /// The trial-match budget as a [`Duration`].
    #[must_use]
    pub fn max_execution_time(&self) -> Duration {
        Duration::from_millis(self.max_execution_ms)
    }

    /// Builds a checker using these limits.
    #[must_use]
    pub fn checker(&self) -> PatternSafetyChecker {
        PatternSafetyChecker::with_limits(self.max_length, self.max_execution_time())
    }
}

fn default_max_length() -> usize {
    MAX_PATTERN_LENGTH
}

fn default_max_execution_ms() -> u64 {
    MAX_EXECUTION_TIME.as_millis() as u64
}

fn default_max_input_length() -> usize {
    DEFAULT_MAX_INPUT_LENGTH
}

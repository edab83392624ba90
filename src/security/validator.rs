//! The validation facade.
//!
//! [`SecurityValidator`] composes a [`BoundaryManager`], a
//! [`PatternSafetyChecker`] and text sanitization behind one entry point per
//! input category. Every entry point returns a [`ValidationVerdict`]; the
//! `check_*` variants return the resolved path or a typed [`GuardError`].
//!
//! Denial reasons in verdicts are short and never contain resolved paths.
//! The detailed reason goes to the audit sink only.

use super::audit::AuditSink;
use super::boundary::BoundaryManager;
use super::catalog;
use super::path::{has_drive_letter, is_absolute_like, is_unc_path, PathNormalizer};
use super::pattern::{PatternFlags, PatternReport, PatternSafetyChecker};
use crate::config::GuardConfig;
use crate::error::GuardError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Default cap for [`SecurityValidator::sanitize_input`], in characters.
pub const DEFAULT_MAX_INPUT_LENGTH: usize = 1000;

/// Message shown to untrusted callers when a path is rejected.
pub const GENERIC_PATH_DENIAL: &str = "Invalid or unsafe file path";

/// The category of input being validated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputKind {
    /// A file to read or write.
    FilePath,
    /// A directory to list or search.
    DirectoryPath,
    /// A user-supplied regular expression.
    RegexPattern,
    /// A file-name glob.
    GlobPattern,
    /// Free text.
    Text,
}

impl InputKind {
    /// Stable name used as the audit operation.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            InputKind::FilePath => "file_path",
            InputKind::DirectoryPath => "directory_path",
            InputKind::RegexPattern => "regex_pattern",
            InputKind::GlobPattern => "glob_pattern",
            InputKind::Text => "text",
        }
    }

    /// Generic message safe to return to an untrusted caller.
    #[must_use]
    pub fn generic_denial(self) -> &'static str {
        match self {
            InputKind::FilePath => GENERIC_PATH_DENIAL,
            InputKind::DirectoryPath => "Invalid or unsafe directory path",
            InputKind::RegexPattern => "Invalid or unsafe search pattern",
            InputKind::GlobPattern => "Invalid or unsafe glob pattern",
            InputKind::Text => "Invalid input",
        }
    }
}

/// Result of one validation call. `reason` is empty if and only if `ok`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationVerdict {
    ok: bool,
    reason: String,
}

impl ValidationVerdict {
    /// An accepting verdict.
    #[must_use]
    pub fn valid() -> Self {
        Self {
            ok: true,
            reason: String::new(),
        }
    }

    /// A rejecting verdict. An empty reason is replaced with a generic one.
    #[must_use]
    pub fn invalid(reason: impl Into<String>) -> Self {
        let reason = reason.into();
        Self {
            ok: false,
            reason: if reason.is_empty() {
                "rejected".to_string()
            } else {
                reason
            },
        }
    }

    /// Whether the input was accepted.
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.ok
    }

    /// The non-sensitive denial reason; empty when accepted.
    #[must_use]
    pub fn reason(&self) -> &str {
        &self.reason
    }

    /// The message to show an untrusted caller: empty when accepted,
    /// otherwise the generic denial for `kind`.
    #[must_use]
    pub fn external_message(&self, kind: InputKind) -> &'static str {
        if self.ok {
            ""
        } else {
            kind.generic_denial()
        }
    }

    /// Converts a rejection into a policy-violation error.
    ///
    /// # Errors
    ///
    /// Returns `PolicyViolation` carrying the reason if the verdict rejects.
    pub fn into_result(self) -> Result<(), GuardError> {
        if self.ok {
            Ok(())
        } else {
            Err(GuardError::policy_violation(self.reason))
        }
    }
}

impl From<PatternReport> for ValidationVerdict {
    fn from(report: PatternReport) -> Self {
        if report.safe {
            Self::valid()
        } else {
            Self::invalid(report.reason)
        }
    }
}

impl From<&GuardError> for ValidationVerdict {
    fn from(error: &GuardError) -> Self {
        Self::invalid(error.reason())
    }
}

/// A rejected path: the error for the caller plus detail for the audit log.
struct Denial {
    error: GuardError,
    detail: Option<String>,
}

impl Denial {
    fn new(error: GuardError) -> Self {
        Self {
            error,
            detail: None,
        }
    }

    fn with_detail(error: GuardError, detail: impl Into<String>) -> Self {
        Self {
            error,
            detail: Some(detail.into()),
        }
    }
}

/// Validates every path, pattern and text input before it is used.
///
/// One validator per configured root. Share it by reference or `Arc`; all
/// methods take `&self`.
///
/// # Example
///
/// ```rust,ignore
/// use boundary_guard::security::SecurityValidator;
///
/// let validator = SecurityValidator::new("/home/user/project")?;
/// assert!(validator.validate_file_path("src/main.rs", None).is_ok());
/// assert!(!validator.validate_file_path("../../etc/passwd", None).is_ok());
/// assert!(!validator.validate_regex_pattern("(a+)+").is_ok());
/// ```
#[derive(Debug)]
pub struct SecurityValidator {
    boundary: Option<BoundaryManager>,
    checker: PatternSafetyChecker,
    normalizer: PathNormalizer,
    max_input_length: usize,
}

impl SecurityValidator {
    /// Creates a validator bounded by `root`.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if `root` is not an existing directory.
    pub fn new(root: impl AsRef<Path>) -> Result<Self, GuardError> {
        Ok(Self::from_boundary(BoundaryManager::new(root)?))
    }

    /// Creates a validator bounded by `root` that audits to `sink`.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if `root` is not an existing directory.
    pub fn with_audit_sink(
        root: impl AsRef<Path>,
        sink: Arc<dyn AuditSink>,
    ) -> Result<Self, GuardError> {
        Ok(Self::from_boundary(BoundaryManager::with_audit_sink(root, sink)?))
    }

    /// Creates a validator with no project boundary.
    ///
    /// Only structural checks apply: traversal, NUL bytes and absolute forms
    /// are still rejected, but relative paths are not resolved against any
    /// root.
    ///
    /// # Errors
    ///
    /// Returns a tooling failure if the working directory cannot be read.
    pub fn without_boundary() -> Result<Self, GuardError> {
        tracing::warn!("security validator created without a project boundary");
        Ok(Self {
            boundary: None,
            checker: PatternSafetyChecker::new(),
            normalizer: PathNormalizer::from_current_dir()?,
            max_input_length: DEFAULT_MAX_INPUT_LENGTH,
        })
    }

    /// Builds a validator from a loaded [`GuardConfig`].
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the root or any allowed directory is
    /// invalid, or if allowed directories are given without a root.
    pub fn from_config(config: &GuardConfig) -> Result<Self, GuardError> {
        let validator = match &config.root {
            Some(root) => {
                let validator = Self::new(root)?;
                for dir in &config.allowed_directories {
                    validator.add_allowed_directory(dir)?;
                }
                validator
            }
            None if !config.allowed_directories.is_empty() => {
                return Err(GuardError::configuration(
                    "allowed_directories",
                    "requires a project root",
                ));
            }
            None => Self::without_boundary()?,
        };

        Ok(validator
            .with_pattern_checker(config.patterns.checker())
            .with_max_input_length(config.max_input_length))
    }

    fn from_boundary(boundary: BoundaryManager) -> Self {
        Self {
            normalizer: boundary.normalizer().clone(),
            boundary: Some(boundary),
            checker: PatternSafetyChecker::new(),
            max_input_length: DEFAULT_MAX_INPUT_LENGTH,
        }
    }

    /// Replaces the pattern checker.
    #[must_use]
    pub fn with_pattern_checker(mut self, checker: PatternSafetyChecker) -> Self {
        self.checker = checker;
        self
    }

    /// Replaces the default cap used by [`sanitize_input`](Self::sanitize_input).
    #[must_use]
    pub fn with_max_input_length(mut self, max_input_length: usize) -> Self {
        self.max_input_length = max_input_length;
        self
    }

    /// The boundary, if one is configured.
    #[must_use]
    pub fn boundary(&self) -> Option<&BoundaryManager> {
        self.boundary.as_ref()
    }

    /// The pattern checker.
    #[must_use]
    pub fn pattern_checker(&self) -> &PatternSafetyChecker {
        &self.checker
    }

    /// Adds a directory to the boundary's allow-list.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the directory is invalid or no
    /// boundary is configured.
    pub fn add_allowed_directory(&self, dir: impl AsRef<Path>) -> Result<(), GuardError> {
        match &self.boundary {
            Some(boundary) => boundary.add_allowed_directory(dir),
            None => Err(GuardError::configuration(
                "allowed_directory",
                "no project boundary is configured",
            )),
        }
    }

    /// Validates a file path. Relative paths resolve against `base`, or the
    /// project root when `base` is `None`.
    #[must_use]
    pub fn validate_file_path(&self, path: &str, base: Option<&Path>) -> ValidationVerdict {
        match self.check_file_path(path, base) {
            Ok(_) => ValidationVerdict::valid(),
            Err(e) => ValidationVerdict::from(&e),
        }
    }

    /// Like [`validate_file_path`](Self::validate_file_path), but returns the
    /// resolved path on success.
    ///
    /// # Errors
    ///
    /// `MalformedInput` for empty or NUL-bearing input, `PolicyViolation`
    /// for traversal, absolute forms and boundary escapes, `ToolingFailure`
    /// when the filesystem could not be probed.
    pub fn check_file_path(&self, path: &str, base: Option<&Path>) -> Result<PathBuf, GuardError> {
        let outcome = self.check_path(path, base);
        self.record(path, InputKind::FilePath, outcome)
    }

    /// Validates a directory path. With `must_exist`, the resolved path must
    /// also be an existing directory.
    #[must_use]
    pub fn validate_directory_path(&self, path: &str, must_exist: bool) -> ValidationVerdict {
        match self.check_directory_path(path, must_exist) {
            Ok(_) => ValidationVerdict::valid(),
            Err(e) => ValidationVerdict::from(&e),
        }
    }

    /// Like [`validate_directory_path`](Self::validate_directory_path), but
    /// returns the resolved path on success.
    ///
    /// # Errors
    ///
    /// Same as [`check_file_path`](Self::check_file_path), plus
    /// `PolicyViolation` when `must_exist` is set and the directory is
    /// missing or not a directory.
    pub fn check_directory_path(&self, path: &str, must_exist: bool) -> Result<PathBuf, GuardError> {
        let outcome = self.check_path(path, None).and_then(|resolved| {
            if must_exist {
                require_directory(&resolved)?;
            }
            Ok(resolved)
        });
        self.record(path, InputKind::DirectoryPath, outcome)
    }

    /// Validates a search pattern with the pattern checker.
    #[must_use]
    pub fn validate_regex_pattern(&self, pattern: &str) -> ValidationVerdict {
        let report = self.checker.validate_pattern(pattern);
        if !report.safe {
            tracing::warn!(reason = %report.reason, "search pattern rejected");
        }
        ValidationVerdict::from(report)
    }

    /// Validates a file-name glob. The length cap is the pattern checker's.
    #[must_use]
    pub fn validate_glob_pattern(&self, pattern: &str) -> ValidationVerdict {
        let max_length = self.checker.max_length();
        let reason = if pattern.is_empty() {
            Some("glob pattern cannot be empty".to_string())
        } else if pattern.chars().count() > max_length {
            Some(format!("glob pattern too long (> {} characters)", max_length))
        } else if pattern.contains('\0') {
            Some("null bytes not allowed".to_string())
        } else if let Some(reason) = catalog::find_dangerous_glob(pattern) {
            Some(reason.to_string())
        } else {
            glob::Pattern::new(pattern)
                .err()
                .map(|e| format!("invalid glob: {}", e.msg))
        };

        match reason {
            None => ValidationVerdict::valid(),
            Some(reason) => {
                tracing::warn!(reason = %reason, "glob pattern rejected");
                ValidationVerdict::invalid(reason)
            }
        }
    }

    /// Strips ASCII control characters, then enforces a length cap.
    ///
    /// `max_length` defaults to the validator's configured cap.
    ///
    /// # Errors
    ///
    /// Returns `MalformedInput` if the stripped text is longer than the cap,
    /// counted in characters.
    pub fn sanitize_input(&self, text: &str, max_length: Option<usize>) -> Result<String, GuardError> {
        let max_length = max_length.unwrap_or(self.max_input_length);
        let cleaned: String = text
            .chars()
            .filter(|c| !matches!(c, '\u{0}'..='\u{1f}' | '\u{7f}'))
            .collect();

        let length = cleaned.chars().count();
        if length > max_length {
            return Err(GuardError::malformed_input(format!(
                "input too long ({} > {} characters)",
                length, max_length
            )));
        }
        Ok(cleaned)
    }

    /// Compiles `pattern` only if it is safe. See
    /// [`PatternSafetyChecker::create_safe_pattern`].
    #[must_use]
    pub fn create_safe_pattern(
        &self,
        pattern: &str,
        flags: Option<PatternFlags>,
    ) -> Option<fancy_regex::Regex> {
        self.checker.create_safe_pattern(pattern, flags)
    }

    fn check_path(&self, raw: &str, base: Option<&Path>) -> Result<PathBuf, Denial> {
        if raw.is_empty() {
            return Err(Denial::new(GuardError::malformed_input("path cannot be empty")));
        }
        if raw.contains('\0') {
            return Err(Denial::new(GuardError::malformed_input("null bytes not allowed")));
        }
        if PathNormalizer::is_traversal_attempt(raw) {
            return Err(Denial::new(GuardError::policy_violation("path traversal detected")));
        }

        if is_absolute_like(raw) {
            let allow_listed = self
                .boundary
                .as_ref()
                .is_some_and(|boundary| boundary.is_within_project(raw));
            if !allow_listed {
                let reason = if has_drive_letter(raw) {
                    "drive letters not allowed"
                } else if is_unc_path(raw) {
                    "UNC paths not allowed"
                } else {
                    "absolute paths not allowed"
                };
                return Err(Denial::new(GuardError::policy_violation(reason)));
            }
        }

        let lexical = self
            .normalizer
            .lexical(raw, base)
            .map_err(|e| unverifiable(&e))?;

        let Some(boundary) = &self.boundary else {
            return Ok(lexical);
        };

        let canonical = boundary
            .normalizer()
            .normalize(&lexical, None)
            .map_err(|e| unverifiable(&e))?;

        match boundary.check_symlinks(&lexical) {
            Ok(true) => {}
            Ok(false) => {
                return Err(Denial::with_detail(
                    GuardError::policy_violation("path escapes the project boundary through a symlink"),
                    canonical.display().to_string(),
                ));
            }
            Err(e) => return Err(unverifiable(&e)),
        }

        if !boundary.contains(&canonical) {
            return Err(Denial::with_detail(
                GuardError::policy_violation("path is outside the project boundary"),
                canonical.display().to_string(),
            ));
        }

        Ok(canonical)
    }

    /// Audits the outcome and strips the internal detail.
    fn record(
        &self,
        raw: &str,
        kind: InputKind,
        outcome: Result<PathBuf, Denial>,
    ) -> Result<PathBuf, GuardError> {
        match outcome {
            Ok(resolved) => {
                tracing::debug!(kind = kind.as_str(), "path accepted");
                if let Some(boundary) = &self.boundary {
                    boundary.audit_decision(raw, kind.as_str(), true, None);
                }
                Ok(resolved)
            }
            Err(Denial { error, detail }) => {
                let detail = match &detail {
                    Some(detail) => format!("{}: {}", error.reason(), detail),
                    None => error.to_string(),
                };
                tracing::warn!(kind = kind.as_str(), reason = %error.reason(), "path rejected");
                if let Some(boundary) = &self.boundary {
                    boundary.audit_decision(raw, kind.as_str(), false, Some(&detail));
                }
                Err(error)
            }
        }
    }
}

fn unverifiable(error: &GuardError) -> Denial {
    Denial::with_detail(
        GuardError::tooling_failure("path verification", "path could not be verified"),
        error.to_string(),
    )
}

fn require_directory(resolved: &Path) -> Result<(), Denial> {
    match fs::metadata(resolved) {
        Ok(metadata) if metadata.is_dir() => Ok(()),
        Ok(_) => Err(Denial::new(GuardError::policy_violation("path is not a directory"))),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Err(Denial::new(
            GuardError::policy_violation("directory does not exist"),
        )),
        Err(e) => Err(Denial::with_detail(
            GuardError::tooling_failure("path verification", "path could not be verified"),
            e.to_string(),
        )),
    }
}

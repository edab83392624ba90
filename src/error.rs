//! Custom error types for boundary-guard.
//!
//! Every fallible operation in the crate returns [`GuardError`]. The kinds
//! mirror how a failure must be handled by the caller:
//!
//! - [`GuardErrorKind::Configuration`]: bad root or allow-list entry at setup.
//!   Fatal for the guarded subsystem; no partial object is produced.
//! - [`GuardErrorKind::MalformedInput`]: empty, NUL-bearing, or otherwise
//!   unusable input. Always recoverable.
//! - [`GuardErrorKind::PolicyViolation`]: structurally valid input that breaks
//!   the boundary or pattern policy.
//! - [`GuardErrorKind::ToolingFailure`]: the filesystem or the matching engine
//!   failed while probing. Always converted to a denial, never to an allow.
//!
//! No external error crates (anyhow, thiserror, eyre) are used.

use std::fmt;

/// Errors produced by boundary and pattern validation.
///
/// This type uses `Box<GuardErrorKind>` to keep the error small in `Result`s.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuardError {
    kind: Box<GuardErrorKind>,
}

/// Specific guard error types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardErrorKind {
    /// Invalid configuration (project root or allowed directory)
    Configuration {
        /// The configuration value that was rejected
        field: String,
        /// Why it was rejected
        reason: String,
    },
    /// Input that cannot be interpreted at all
    MalformedInput {
        /// What was wrong with the input
        reason: String,
    },
    /// Input that is well-formed but not permitted
    PolicyViolation {
        /// Non-sensitive description of the violated rule
        reason: String,
    },
    /// The filesystem or regex engine failed unexpectedly
    ToolingFailure {
        /// The operation that was being performed
        operation: String,
        /// The underlying failure
        reason: String,
    },
}

impl GuardError {
    /// Creates a new GuardError with the given kind.
    #[must_use]
    pub fn new(kind: GuardErrorKind) -> Self {
        Self {
            kind: Box::new(kind),
        }
    }

    /// Returns a reference to the error kind.
    #[must_use]
    pub fn kind(&self) -> &GuardErrorKind {
        &self.kind
    }

    /// Creates a configuration error.
    #[must_use]
    pub fn configuration(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::new(GuardErrorKind::Configuration {
            field: field.into(),
            reason: reason.into(),
        })
    }

    /// Creates a malformed input error.
    #[must_use]
    pub fn malformed_input(reason: impl Into<String>) -> Self {
        Self::new(GuardErrorKind::MalformedInput {
            reason: reason.into(),
        })
    }

    /// Creates a policy violation error.
    #[must_use]
    pub fn policy_violation(reason: impl Into<String>) -> Self {
        Self::new(GuardErrorKind::PolicyViolation {
            reason: reason.into(),
        })
    }

    /// Creates a tooling failure error.
    #[must_use]
    pub fn tooling_failure(operation: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::new(GuardErrorKind::ToolingFailure {
            operation: operation.into(),
            reason: reason.into(),
        })
    }

    /// Returns true if this is a configuration error.
    #[must_use]
    pub fn is_configuration(&self) -> bool {
        matches!(*self.kind, GuardErrorKind::Configuration { .. })
    }

    /// Returns true if this is a malformed input error.
    #[must_use]
    pub fn is_malformed_input(&self) -> bool {
        matches!(*self.kind, GuardErrorKind::MalformedInput { .. })
    }

    /// Returns true if this is a policy violation.
    #[must_use]
    pub fn is_policy_violation(&self) -> bool {
        matches!(*self.kind, GuardErrorKind::PolicyViolation { .. })
    }

    /// Returns true if this is a tooling failure.
    #[must_use]
    pub fn is_tooling_failure(&self) -> bool {
        matches!(*self.kind, GuardErrorKind::ToolingFailure { .. })
    }

    /// Returns the short reason carried by this error, without hints.
    ///
    /// Used to build verdicts; never includes resolved filesystem paths.
    #[must_use]
    pub fn reason(&self) -> &str {
        match self.kind.as_ref() {
            GuardErrorKind::Configuration { reason, .. }
            | GuardErrorKind::MalformedInput { reason }
            | GuardErrorKind::PolicyViolation { reason }
            | GuardErrorKind::ToolingFailure { reason, .. } => reason,
        }
    }
}

impl fmt::Display for GuardError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind.as_ref() {
            GuardErrorKind::Configuration { field, reason } => {
                write!(
                    f,
                    "invalid configuration for '{}': {}; provide an existing directory",
                    field, reason
                )
            }
            GuardErrorKind::MalformedInput { reason } => {
                write!(f, "malformed input: {}", reason)
            }
            GuardErrorKind::PolicyViolation { reason } => {
                write!(f, "policy violation: {}", reason)
            }
            GuardErrorKind::ToolingFailure { operation, reason } => {
                write!(
                    f,
                    "{} failed: {}; the request was denied conservatively",
                    operation, reason
                )
            }
        }
    }
}

impl std::error::Error for GuardError {}

//! Filesystem containment and pattern safety.
//!
//! Every path and search pattern a tool receives passes through this module
//! before any filesystem or matching operation:
//!
//! - [`PathNormalizer`]: canonical, comparison-ready absolute paths
//! - [`BoundaryManager`]: project root, allow-list, symlink walk, audit
//! - [`PatternSafetyChecker`]: static ReDoS catalog plus a bounded trial match
//! - [`SecurityValidator`]: one entry point per input category
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use boundary_guard::security::{InputKind, SecurityValidator};
//!
//! let validator = SecurityValidator::new("/home/user/project")?;
//!
//! let verdict = validator.validate_file_path(user_path, None);
//! if !verdict.is_ok() {
//!     return Err(verdict.external_message(InputKind::FilePath).into());
//! }
//! ```

mod audit;
mod boundary;
mod catalog;
mod path;
mod pattern;
mod probe;
mod registry;
mod validator;

pub use audit::{
    AuditError, AuditRecord, AuditSink, MemoryAuditSink, TracingAuditSink, WriterAuditSink,
    AUDIT_TARGET,
};
pub use boundary::{BoundaryIdentity, BoundaryManager, ProjectBoundary};
pub use path::{
    contains_path, has_drive_letter, is_absolute_like, is_unc_path, lexical_normalize,
    PathNormalizer,
};
pub use pattern::{
    ComplexityMetrics, PatternFlags, PatternReport, PatternSafetyChecker, MAX_EXECUTION_TIME,
    MAX_PATTERN_LENGTH,
};
pub use registry::ValidatorRegistry;
pub use validator::{
    InputKind, SecurityValidator, ValidationVerdict, DEFAULT_MAX_INPUT_LENGTH, GENERIC_PATH_DENIAL,
};

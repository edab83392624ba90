//! # boundary-guard: Trust Boundary for Code-Analysis Tools
//!
//! Every path and every user-supplied search pattern a file-read, search or
//! query tool receives must pass through this crate before any filesystem
//! or matching operation happens. Two independent policies are enforced:
//!
//! - **Filesystem containment**: all access stays inside a configured
//!   project root plus an explicit allow-list, defeating traversal,
//!   absolute-path escape and symlink escape
//! - **Pattern safety**: search patterns are screened statically and
//!   empirically so a single adversarial pattern cannot cause catastrophic
//!   backtracking
//!
//! ## Architecture
//!
//! - **PathNormalizer**: canonical, comparison-ready absolute paths
//! - **BoundaryManager**: root, allow-list, containment, symlink walk, audit
//! - **PatternSafetyChecker**: ReDoS catalog, compile check, bounded probe
//! - **SecurityValidator**: the facade tools call
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use boundary_guard::prelude::*;
//!
//! let validator = SecurityValidator::new("/home/user/project")?;
//!
//! assert!(validator.validate_file_path("src/main.rs", None).is_ok());
//! assert!(!validator.validate_file_path("../../etc/passwd", None).is_ok());
//!
//! let regex = validator
//!     .create_safe_pattern("fn\\s+\\w+", None)
//!     .ok_or("unsafe pattern")?;
//! ```

pub mod config;
pub mod error;
pub mod logging;
pub mod security;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::config::GuardConfig;
    pub use crate::error::{GuardError, GuardErrorKind};
    pub use crate::security::{
        AuditRecord, AuditSink, BoundaryIdentity, BoundaryManager, InputKind, PathNormalizer,
        PatternFlags, PatternReport, PatternSafetyChecker, SecurityValidator, ValidationVerdict,
        ValidatorRegistry,
    };
}

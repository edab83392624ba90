//! Configuration management for boundary-guard.
//!
//! The guard needs very little configuration: a project root, optional extra
//! directories, and limits for pattern and text validation. Nothing is read
//! from the environment.
//!
//! # Configuration File Format
//!
//! Configuration is stored in TOML format. [`load`] reads
//! `<project>/boundary-guard.toml`; because that file lives inside the
//! guarded project, it can only name allowed directories within it. A host
//! that trusts a file elsewhere reads it with [`from_path`].
//!
//! # Example Configuration
//!
//! ```toml
//! allowed_directories = ["vendor", "fixtures"]
//! max_input_length = 1000
//!
//! [patterns]
//! max_length = 1000
//! max_execution_ms = 1000
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use boundary_guard::config;
//! use boundary_guard::security::SecurityValidator;
//!
//! let config = config::load(Path::new("/home/user/project"))?;
//! let validator = SecurityValidator::from_config(&config)?;
//! ```

mod file;
mod types;

pub use file::{from_path, from_str, load, LOCAL_CONFIG_NAME};
pub use types::{GuardConfig, PatternLimits};

//! Configuration file loading.
//!
//! This module handles loading boundary-guard configuration from TOML files.
//! A file found inside the project may only narrow the boundary; a host that
//! wants extra directories outside the project passes its own file to
//! [`from_path`].

use crate::config::types::GuardConfig;
use crate::error::GuardError;
use crate::security::{contains_path, PathNormalizer};
use std::path::Path;

/// Configuration file name looked up in the project directory.
pub const LOCAL_CONFIG_NAME: &str = "boundary-guard.toml";

/// Loads configuration for the project in `dir`.
///
/// Reads `<dir>/boundary-guard.toml` and returns an empty configuration if
/// there is none. The file's root is always `dir`, and every allowed
/// directory it names must resolve inside `dir`.
///
/// # Errors
///
/// Returns a configuration error if the file cannot be parsed, sets a
/// different `root`, or names an allowed directory outside `dir`.
///
/// # Example
///
/// ```rust,ignore
/// use boundary_guard::config;
///
/// let config = config::load(Path::new("."))?;
/// ```
pub fn load(dir: &Path) -> Result<GuardConfig, GuardError> {
    let local_path = dir.join(LOCAL_CONFIG_NAME);
    if !local_path.exists() {
        return Ok(GuardConfig::default());
    }

    let mut config = from_path(&local_path)?;
    confine_to_project(&mut config, dir)?;
    tracing::debug!(path = %local_path.display(), "loaded project configuration");
    Ok(config)
}

/// Pins `root` to `dir` and rejects allowed directories that leave it.
fn confine_to_project(config: &mut GuardConfig, dir: &Path) -> Result<(), GuardError> {
    let project = dunce::canonicalize(dir).map_err(|e| {
        GuardError::configuration("root", format!("cannot resolve '{}': {}", dir.display(), e))
    })?;
    let normalizer = PathNormalizer::new(project.clone());

    if let Some(root) = &config.root {
        let resolved = normalizer
            .normalize(root, None)
            .map_err(|e| GuardError::configuration("root", e.reason()))?;
        if resolved != project {
            return Err(GuardError::configuration(
                "root",
                "a project configuration file cannot move the project root",
            ));
        }
    }
    config.root = Some(dir.to_path_buf());

    for entry in &config.allowed_directories {
        let resolved = normalizer
            .normalize(entry, None)
            .map_err(|e| GuardError::configuration("allowed_directories", e.reason()))?;
        if !contains_path(&project, &resolved) {
            return Err(GuardError::configuration(
                "allowed_directories",
                format!(
                    "'{}' is outside the project; pass a host configuration file to widen the boundary",
                    entry.display()
                ),
            ));
        }
    }
    Ok(())
}

/// Loads configuration from a specific file path.
///
/// # Errors
///
/// Returns an error if:
/// - The file cannot be read
/// - The file contains invalid TOML
/// - The TOML doesn't match the expected schema
pub fn from_path(path: &Path) -> Result<GuardConfig, GuardError> {
    let contents = std::fs::read_to_string(path).map_err(|e| {
        GuardError::configuration(
            "config_file",
            format!("failed to read '{}': {}", path.display(), e),
        )
    })?;

    from_str(&contents).map_err(|e| {
        GuardError::configuration(
            "config_file",
            format!("failed to parse '{}': {}", path.display(), e.reason()),
        )
    })
}

/// Parses configuration from a TOML string.
///
/// # Errors
///
/// Returns an error if the TOML is invalid or doesn't match the schema.
pub fn from_str(toml_str: &str) -> Result<GuardConfig, GuardError> {
    toml::from_str(toml_str)
        .map_err(|e| GuardError::configuration("config", format!("invalid TOML: {e}")))
}

//! Explicit per-root validator factory.
//!
//! Hosts that want "one validator per project" without threading it through
//! every call can hold a [`ValidatorRegistry`]. It is an ordinary value, not
//! a global: each test or server owns its own.

use super::audit::AuditSink;
use super::validator::SecurityValidator;
use crate::error::GuardError;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

/// Caches one [`SecurityValidator`] per canonical root.
#[derive(Debug, Default)]
pub struct ValidatorRegistry {
    validators: Mutex<HashMap<PathBuf, Arc<SecurityValidator>>>,
    sink: Option<Arc<dyn AuditSink>>,
}

impl ValidatorRegistry {
    /// Creates an empty registry whose validators audit through `tracing`.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty registry whose validators share `sink`.
    #[must_use]
    pub fn with_audit_sink(sink: Arc<dyn AuditSink>) -> Self {
        Self {
            validators: Mutex::new(HashMap::new()),
            sink: Some(sink),
        }
    }

    /// Returns the validator for `root`, creating it on first use.
    ///
    /// Different spellings of the same directory share one validator.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if `root` is not an existing directory.
    pub fn get_or_create(&self, root: impl AsRef<Path>) -> Result<Arc<SecurityValidator>, GuardError> {
        let root = root.as_ref();
        let key = dunce::canonicalize(root).unwrap_or_else(|_| root.to_path_buf());

        let mut validators = self
            .validators
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(existing) = validators.get(&key) {
            return Ok(Arc::clone(existing));
        }

        let validator = Arc::new(match &self.sink {
            Some(sink) => SecurityValidator::with_audit_sink(root, Arc::clone(sink))?,
            None => SecurityValidator::new(root)?,
        });
        validators.insert(key, Arc::clone(&validator));
        Ok(validator)
    }

    /// Returns the validator for `root` if one was created.
    #[must_use]
    pub fn get(&self, root: impl AsRef<Path>) -> Option<Arc<SecurityValidator>> {
        let root = root.as_ref();
        let key = dunce::canonicalize(root).unwrap_or_else(|_| root.to_path_buf());
        self.validators
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
            .cloned()
    }

    /// Number of roots with a validator.
    #[must_use]
    pub fn len(&self) -> usize {
        self.validators
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Returns true if no validator has been created.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

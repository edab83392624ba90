//! Project boundary ownership and containment queries.
//!
//! [`BoundaryManager`] owns the project root and the allow-list of extra
//! directories. It answers containment questions, walks symlink chains to
//! detect escapes, and emits audit records.
//!
//! ## Concurrency
//!
//! The allow-list is published as an immutable [`ProjectBoundary`] snapshot
//! behind an `Arc`. Readers take the lock only long enough to clone the
//! `Arc`; [`BoundaryManager::add_allowed_directory`] builds a new snapshot
//! and swaps it in, so a reader never observes a partially-updated set.
//!
//! ## TOCTOU
//!
//! Existence checks at construction and on append are advisory. Callers must
//! re-check with [`BoundaryManager::is_within_project`] and
//! [`BoundaryManager::is_symlink_safe`] at access time.

use super::audit::{self, AuditRecord, AuditSink, TracingAuditSink};
use super::path::{contains_path, PathNormalizer};
use crate::error::GuardError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

/// Immutable snapshot of the configured boundary.
///
/// Invariant: `root` is always a member of `allowed`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectBoundary {
    root: PathBuf,
    allowed: BTreeSet<PathBuf>,
    generation: u64,
}

impl ProjectBoundary {
    fn new(root: PathBuf) -> Self {
        let mut allowed = BTreeSet::new();
        allowed.insert(root.clone());
        Self {
            root,
            allowed,
            generation: 0,
        }
    }

    /// The canonical project root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// All canonical allowed directories, root included.
    #[must_use]
    pub fn allowed(&self) -> &BTreeSet<PathBuf> {
        &self.allowed
    }

    /// Returns true if `canonical` equals or descends from an allowed member.
    #[must_use]
    pub fn contains(&self, canonical: &Path) -> bool {
        self.allowed
            .iter()
            .any(|member| contains_path(member, canonical))
    }

    /// The member a path should be reported relative to.
    ///
    /// The root wins when it contains the path; otherwise the deepest
    /// containing member.
    fn containing_member(&self, canonical: &Path) -> Option<&Path> {
        if contains_path(&self.root, canonical) {
            return Some(&self.root);
        }
        self.allowed
            .iter()
            .filter(|member| contains_path(member, canonical))
            .max_by_key(|member| member.components().count())
            .map(PathBuf::as_path)
    }
}

/// Identifies one configuration state of a boundary.
///
/// A cache of verdicts keyed by `(normalized path, BoundaryIdentity)` is
/// invalidated automatically: every allow-list append bumps `generation`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BoundaryIdentity {
    /// The canonical project root.
    pub root: PathBuf,
    /// Number of allow-list changes since construction.
    pub generation: u64,
}

/// Owns the project root and allow-list and answers containment queries.
///
/// # Example
///
/// ```rust,ignore
/// use boundary_guard::security::BoundaryManager;
///
/// let boundary = BoundaryManager::new("/home/user/project")?;
/// assert!(boundary.is_within_project("src/main.rs"));
/// assert!(!boundary.is_within_project("/etc/passwd"));
/// ```
#[derive(Debug)]
pub struct BoundaryManager {
    boundary: RwLock<Arc<ProjectBoundary>>,
    normalizer: PathNormalizer,
    audit: Arc<dyn AuditSink>,
}

impl BoundaryManager {
    /// Creates a manager rooted at `root`, auditing through `tracing`.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the root is empty, is not a valid
    /// path, does not exist, or is not a directory.
    pub fn new(root: impl AsRef<Path>) -> Result<Self, GuardError> {
        Self::with_audit_sink(root, Arc::new(TracingAuditSink))
    }

    /// Creates a manager that sends audit records to `sink`.
    ///
    /// # Errors
    ///
    /// Same as [`new`](Self::new).
    pub fn with_audit_sink(
        root: impl AsRef<Path>,
        sink: Arc<dyn AuditSink>,
    ) -> Result<Self, GuardError> {
        let root = canonical_directory("root", root.as_ref())?;
        tracing::info!(root = %root.display(), "project boundary configured");

        Ok(Self {
            normalizer: PathNormalizer::new(root.clone()),
            boundary: RwLock::new(Arc::new(ProjectBoundary::new(root))),
            audit: sink,
        })
    }

    /// The canonical project root.
    #[must_use]
    pub fn root(&self) -> PathBuf {
        self.snapshot().root.clone()
    }

    /// The normalizer anchored at the project root.
    #[must_use]
    pub fn normalizer(&self) -> &PathNormalizer {
        &self.normalizer
    }

    /// The current immutable boundary snapshot.
    #[must_use]
    pub fn snapshot(&self) -> Arc<ProjectBoundary> {
        Arc::clone(&self.boundary.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// The current configuration identity, for cache keys.
    #[must_use]
    pub fn identity(&self) -> BoundaryIdentity {
        let snapshot = self.snapshot();
        BoundaryIdentity {
            root: snapshot.root.clone(),
            generation: snapshot.generation,
        }
    }

    /// Adds a directory to the allow-list.
    ///
    /// Relative directories are resolved against the project root. Adding a
    /// directory that is already present is a no-op.
    ///
    /// # Errors
    ///
    /// Returns a configuration error under the same conditions as
    /// construction.
    pub fn add_allowed_directory(&self, dir: impl AsRef<Path>) -> Result<(), GuardError> {
        let dir = dir.as_ref();
        let anchored = if dir.is_relative() && !dir.as_os_str().is_empty() {
            self.normalizer.default_base().join(dir)
        } else {
            dir.to_path_buf()
        };
        let canonical = canonical_directory("allowed_directory", &anchored)?;

        let mut current = self
            .boundary
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if current.allowed.contains(&canonical) {
            return Ok(());
        }

        let mut next = ProjectBoundary::clone(&current);
        next.allowed.insert(canonical.clone());
        next.generation += 1;
        *current = Arc::new(next);

        tracing::info!(directory = %canonical.display(), "allowed directory added");
        Ok(())
    }

    /// Returns a copy of the allow-list, root included.
    #[must_use]
    pub fn list_allowed_directories(&self) -> BTreeSet<PathBuf> {
        self.snapshot().allowed.clone()
    }

    /// Returns true if `path` resolves inside an allowed directory.
    ///
    /// Never fails: empty or unresolvable input is simply not contained.
    #[must_use]
    pub fn is_within_project(&self, path: impl AsRef<Path>) -> bool {
        match self.normalizer.normalize(path.as_ref(), None) {
            Ok(canonical) => self.contains(&canonical),
            Err(e) => {
                tracing::debug!(error = %e, "path could not be normalized; treating as outside");
                false
            }
        }
    }

    /// Returns true if an already-canonical path is inside the boundary.
    #[must_use]
    pub fn contains(&self, canonical: &Path) -> bool {
        self.snapshot().contains(canonical)
    }

    /// Returns `path` relative to the allowed directory containing it.
    ///
    /// The project root itself maps to `"."`. Returns `None` for paths
    /// outside the boundary.
    ///
    /// Only paths under the root round-trip through
    /// [`validate_and_resolve_path`](Self::validate_and_resolve_path). For a
    /// path inside an extra allowed directory the result is relative to that
    /// directory, and resolving it again names a file under the root. Keep
    /// the canonical path as the handle in that case.
    #[must_use]
    pub fn get_relative_path(&self, path: impl AsRef<Path>) -> Option<PathBuf> {
        let canonical = self.normalizer.normalize(path.as_ref(), None).ok()?;
        let snapshot = self.snapshot();
        let member = snapshot.containing_member(&canonical)?;
        let relative = canonical.strip_prefix(member).ok()?;

        if relative.as_os_str().is_empty() {
            Some(PathBuf::from("."))
        } else {
            Some(relative.to_path_buf())
        }
    }

    /// Resolves `path` and returns the canonical form if it is contained.
    ///
    /// Relative paths resolve against the project root. This is the call
    /// other subsystems make before touching disk.
    #[must_use]
    pub fn validate_and_resolve_path(&self, path: impl AsRef<Path>) -> Option<PathBuf> {
        let canonical = self.normalizer.normalize(path.as_ref(), None).ok()?;
        self.contains(&canonical).then_some(canonical)
    }

    /// Walks `path` component by component looking for symlink escapes.
    ///
    /// Once the walk has entered an allowed directory, a symlink whose
    /// resolved target lies outside every allowed directory makes the path
    /// unsafe. Symlinks crossed before entering the boundary belong to the
    /// system layout (e.g. `/var` on macOS) and are left to the containment
    /// check. A missing component or a dangling link ends the walk as safe.
    ///
    /// # Errors
    ///
    /// Returns a tooling failure for malformed input or any I/O error other
    /// than "not found" (permission denied, symlink loop, ...).
    pub fn check_symlinks(&self, path: impl AsRef<Path>) -> Result<bool, GuardError> {
        let lexical = self.normalizer.lexical(path.as_ref(), None)?;
        let snapshot = self.snapshot();

        let mut resolved = PathBuf::new();
        let mut inside = false;

        for component in lexical.components() {
            let name = match component {
                Component::Prefix(_) | Component::RootDir => {
                    resolved.push(component.as_os_str());
                    continue;
                }
                Component::Normal(name) => name,
                Component::CurDir | Component::ParentDir => continue,
            };

            let candidate = resolved.join(name);
            let metadata = match fs::symlink_metadata(&candidate) {
                Ok(metadata) => metadata,
                Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(true),
                Err(e) => return Err(walk_failure(name, &e)),
            };

            if metadata.file_type().is_symlink() {
                let target = match dunce::canonicalize(&candidate) {
                    Ok(target) => target,
                    Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(true),
                    Err(e) => return Err(walk_failure(name, &e)),
                };
                if inside && !snapshot.contains(&target) {
                    tracing::warn!(
                        link = %candidate.display(),
                        target = %target.display(),
                        "symlink escapes project boundary"
                    );
                    return Ok(false);
                }
                resolved = target;
            } else {
                resolved = candidate;
            }

            inside = snapshot.contains(&resolved);
        }

        Ok(true)
    }

    /// Policy wrapper over [`check_symlinks`](Self::check_symlinks).
    ///
    /// Any tooling failure (including permission denied on an intermediate
    /// component) is treated as unsafe.
    #[must_use]
    pub fn is_symlink_safe(&self, path: impl AsRef<Path>) -> bool {
        match self.check_symlinks(path) {
            Ok(safe) => safe,
            Err(e) => {
                tracing::warn!(error = %e, "symlink walk failed; denying");
                false
            }
        }
    }

    /// Records an access attempt. Never fails observably.
    pub fn audit_access(&self, path: impl AsRef<Path>, operation: &str) {
        let path = path.as_ref();
        let allowed = self.is_within_project(path);
        let reason = (!allowed).then_some("outside project boundary");
        self.audit_decision(path, operation, allowed, reason);
    }

    /// Records a decision made elsewhere (typically by the validator).
    pub fn audit_decision(
        &self,
        path: impl AsRef<Path>,
        operation: &str,
        allowed: bool,
        reason: Option<&str>,
    ) {
        let mut record = AuditRecord::new(path.as_ref().to_string_lossy(), operation, allowed);
        if let Some(reason) = reason {
            record = record.with_reason(reason);
        }
        audit::deliver(self.audit.as_ref(), &record);
    }
}

fn walk_failure(name: &std::ffi::OsStr, error: &io::Error) -> GuardError {
    GuardError::tooling_failure(
        "symlink walk",
        format!("cannot inspect '{}': {}", name.to_string_lossy(), error),
    )
}

/// Validates and canonicalizes a configured directory.
fn canonical_directory(field: &str, dir: &Path) -> Result<PathBuf, GuardError> {
    if dir.as_os_str().is_empty() {
        return Err(GuardError::configuration(field, "cannot be empty"));
    }
    match dir.to_str() {
        Some(text) if !text.contains('\0') => {}
        _ => return Err(GuardError::configuration(field, "invalid root type")),
    }

    let metadata = fs::metadata(dir).map_err(|e| {
        if e.kind() == io::ErrorKind::NotFound {
            GuardError::configuration(field, format!("'{}' does not exist", dir.display()))
        } else {
            GuardError::configuration(
                field,
                format!("'{}' cannot be inspected: {}", dir.display(), e),
            )
        }
    })?;
    if !metadata.is_dir() {
        return Err(GuardError::configuration(
            field,
            format!("'{}' is not a directory", dir.display()),
        ));
    }

    dunce::canonicalize(dir).map_err(|e| {
        GuardError::configuration(
            field,
            format!("'{}' cannot be canonicalized: {}", dir.display(), e),
        )
    })
}

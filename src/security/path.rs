//! Path normalization for boundary checks.
//!
//! Provides [`PathNormalizer`] for turning untrusted path strings into
//! canonical, comparison-ready absolute paths, plus the string-level helpers
//! the validator uses to produce precise diagnostics before resolution.

use crate::error::GuardError;
use std::ffi::OsStr;
use std::io;
use std::path::{Component, Path, PathBuf};

/// Resolves raw path strings into canonical absolute paths.
///
/// Resolution is two-pass:
/// 1. A lexical pass collapses `.` and `..` segments without touching disk
/// 2. A filesystem pass canonicalizes the longest existing ancestor
///    (resolving symlinks) and re-appends the not-yet-existing tail
///
/// Both separator styles (`/` and `\`) are accepted on every platform.
///
/// # Example
///
/// ```rust,ignore
/// use boundary_guard::security::PathNormalizer;
///
/// let normalizer = PathNormalizer::new("/home/user/project");
/// let canonical = normalizer.normalize("src/./lib.rs", None)?;
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathNormalizer {
    /// Base used to anchor relative input when no explicit base is given.
    default_base: PathBuf,
}

impl PathNormalizer {
    /// Creates a normalizer that anchors relative paths at `default_base`.
    #[must_use]
    pub fn new(default_base: impl Into<PathBuf>) -> Self {
        Self {
            default_base: default_base.into(),
        }
    }

    /// Creates a normalizer anchored at the process working directory.
    ///
    /// # Errors
    ///
    /// Returns a tooling failure if the working directory cannot be read.
    pub fn from_current_dir() -> Result<Self, GuardError> {
        std::env::current_dir()
            .map(Self::new)
            .map_err(|e| GuardError::tooling_failure("reading the working directory", e.to_string()))
    }

    /// Returns the base used for relative input.
    #[must_use]
    pub fn default_base(&self) -> &Path {
        &self.default_base
    }

    /// Normalizes `raw` into a canonical absolute path.
    ///
    /// Relative input is joined to `base` (or the default base). Symlinks in
    /// the existing part of the path are resolved; components that do not
    /// exist yet are appended lexically.
    ///
    /// # Errors
    ///
    /// - `MalformedInput` for empty input, NUL bytes, non-UTF-8 input, or an
    ///   absolute form that is foreign to this platform
    /// - `ToolingFailure` if the filesystem fails for a reason other than
    ///   "not found"
    pub fn normalize(
        &self,
        raw: impl AsRef<Path>,
        base: Option<&Path>,
    ) -> Result<PathBuf, GuardError> {
        let lexical = self.lexical(raw, base)?;
        resolve_existing_prefix(&lexical)
    }

    /// Performs only the lexical pass: absolute path, `.`/`..` collapsed.
    ///
    /// # Errors
    ///
    /// Same input errors as [`normalize`](Self::normalize); never touches disk.
    pub fn lexical(&self, raw: impl AsRef<Path>, base: Option<&Path>) -> Result<PathBuf, GuardError> {
        let text = input_str(raw.as_ref())?;

        if has_drive_letter(text) || is_unc_path(text) {
            return foreign_absolute(text);
        }

        let candidate = PathBuf::from(unify_separators(text));
        let absolute = if candidate.is_absolute() {
            candidate
        } else {
            self.anchor(base).join(candidate)
        };

        Ok(lexical_normalize(&absolute))
    }

    /// Flags any `..` segment under either separator style.
    ///
    /// This is a string-level pre-check; the authoritative boundary check
    /// happens after resolution.
    #[must_use]
    pub fn is_traversal_attempt(raw: &str) -> bool {
        raw.split(['/', '\\']).any(|segment| segment == "..")
    }

    fn anchor(&self, base: Option<&Path>) -> PathBuf {
        match base {
            Some(b) if b.is_absolute() => b.to_path_buf(),
            Some(b) => self.default_base.join(b),
            None => self.default_base.clone(),
        }
    }
}

/// Returns true for `C:\...`, `C:/...` and bare `C:` forms.
#[must_use]
pub fn has_drive_letter(raw: &str) -> bool {
    let bytes = raw.as_bytes();
    bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':'
}

/// Returns true for network forms such as `\\server\share` or `//server/share`.
#[must_use]
pub fn is_unc_path(raw: &str) -> bool {
    let mut chars = raw.chars();
    matches!(
        (chars.next(), chars.next()),
        (Some('/' | '\\'), Some('/' | '\\'))
    )
}

/// Returns true when `raw` is absolute under any platform's conventions.
#[must_use]
pub fn is_absolute_like(raw: &str) -> bool {
    raw.starts_with(['/', '\\']) || has_drive_letter(raw) || is_unc_path(raw)
}

/// Component-wise equality-or-descendant test.
///
/// `/root2` is not inside `/root`; `/root/a` and `/root` itself are.
#[must_use]
pub fn contains_path(parent: &Path, child: &Path) -> bool {
    child.starts_with(parent)
}

/// Collapses `.` and `..` segments without filesystem access.
///
/// `..` never climbs above the root; leading `..` on relative input is kept.
#[must_use]
pub fn lexical_normalize(path: &Path) -> PathBuf {
    let mut stack: Vec<Component<'_>> = Vec::new();

    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match stack.last() {
                Some(Component::Normal(_)) => {
                    stack.pop();
                }
                Some(Component::RootDir | Component::Prefix(_)) => {}
                _ => stack.push(component),
            },
            other => stack.push(other),
        }
    }

    if stack.is_empty() {
        return PathBuf::from(".");
    }
    stack.iter().collect()
}

fn input_str(raw: &Path) -> Result<&str, GuardError> {
    let text = raw
        .to_str()
        .ok_or_else(|| GuardError::malformed_input("path is not valid UTF-8"))?;
    if text.is_empty() {
        return Err(GuardError::malformed_input("path cannot be empty"));
    }
    if text.contains('\0') {
        return Err(GuardError::malformed_input("null byte in path"));
    }
    Ok(text)
}

#[cfg(windows)]
fn unify_separators(text: &str) -> String {
    text.to_string()
}

#[cfg(not(windows))]
fn unify_separators(text: &str) -> String {
    text.replace('\\', "/")
}

#[cfg(windows)]
fn foreign_absolute(text: &str) -> Result<PathBuf, GuardError> {
    Ok(lexical_normalize(Path::new(text)))
}

#[cfg(not(windows))]
fn foreign_absolute(_text: &str) -> Result<PathBuf, GuardError> {
    Err(GuardError::malformed_input("foreign absolute path"))
}

/// Canonicalizes the longest existing ancestor and re-appends the rest.
///
/// The input must already be lexically normalized, so the tail contains only
/// plain names.
fn resolve_existing_prefix(lexical: &Path) -> Result<PathBuf, GuardError> {
    let mut tail: Vec<&OsStr> = Vec::new();
    let mut current = lexical;

    loop {
        match dunce::canonicalize(current) {
            Ok(mut resolved) => {
                for name in tail.iter().rev() {
                    resolved.push(name);
                }
                return Ok(resolved);
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                match (current.parent(), current.file_name()) {
                    (Some(parent), Some(name)) => {
                        tail.push(name);
                        current = parent;
                    }
                    _ => return Ok(lexical.to_path_buf()),
                }
            }
            Err(e) => {
                return Err(GuardError::tooling_failure("path resolution", e.to_string()));
            }
        }
    }
}

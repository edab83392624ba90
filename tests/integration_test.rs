//! Integration tests for boundary-guard.
//!
//! These tests exercise the public facade the way a file or search tool
//! would:
//! - Path containment against a real temporary project
//! - Pattern screening, including inputs the static catalog misses
//! - Multiple independent roots
//! - Configuration loading and audit delivery

use boundary_guard::config::{self, GuardConfig, PatternLimits};
use boundary_guard::prelude::*;
use boundary_guard::security::{MemoryAuditSink, WriterAuditSink, MAX_EXECUTION_TIME};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::Instant;
use tempfile::TempDir;

fn project() -> anyhow::Result<(TempDir, SecurityValidator)> {
    let dir = TempDir::new()?;
    fs::create_dir_all(dir.path().join("src"))?;
    fs::write(dir.path().join("src/main.py"), "print('hi')\n")?;
    let validator = SecurityValidator::new(dir.path())?;
    Ok((dir, validator))
}

fn root_of(validator: &SecurityValidator) -> PathBuf {
    validator
        .boundary()
        .map(BoundaryManager::root)
        .unwrap_or_default()
}

/// Relative paths inside the root pass; traversal and absolute escapes fail.
#[test]
fn containment_rejects_traversal_and_absolute() -> anyhow::Result<()> {
    let (_dir, validator) = project()?;

    assert!(validator.validate_file_path("src/main.py", None).is_ok());

    let err = validator
        .check_file_path("../../etc/passwd", None)
        .unwrap_err();
    assert!(err.is_policy_violation());
    assert!(err.reason().contains("traversal"));

    let err = validator.check_file_path("/etc/passwd", None).unwrap_err();
    assert!(err.is_policy_violation());
    assert!(err.reason().contains("absolute"));
    Ok(())
}

/// Dangerous patterns are rejected and never compiled.
#[test]
fn dangerous_patterns_are_never_compiled() -> anyhow::Result<()> {
    let (_dir, validator) = project()?;

    let verdict = validator.validate_regex_pattern("(.+)+");
    assert!(!verdict.is_ok());
    assert!(verdict.clone().into_result().unwrap_err().is_policy_violation());

    assert!(validator.validate_regex_pattern("[a-z]+").is_ok());
    assert!(validator.create_safe_pattern("(.+)+", None).is_none());
    Ok(())
}

/// Two validators with different roots do not share a boundary.
#[test]
fn independent_roots_do_not_share_boundary() -> anyhow::Result<()> {
    let a = TempDir::new()?;
    let b = TempDir::new()?;
    let validator_a = SecurityValidator::new(a.path())?;
    let validator_b = SecurityValidator::new(b.path())?;

    let inside_b = dunce::canonicalize(b.path())?.join("notes.txt");
    let inside_b = inside_b.to_string_lossy();

    assert!(!validator_a.validate_file_path(&inside_b, None).is_ok());
    assert!(validator_b.validate_file_path(&inside_b, None).is_ok());
    Ok(())
}

#[test]
fn redos_catalog_lists() {
    let checker = PatternSafetyChecker::new();

    for pattern in ["(a+)+", "(a*)*", "(a|a)*", "(?=.*)+", "(?<=.*)+"] {
        let report = checker.validate_pattern(pattern);
        assert!(!report.safe, "{pattern} should be unsafe");
        assert!(report.reason.starts_with("dangerous pattern"), "{pattern}: {}", report.reason);
    }

    for pattern in ["hello.*world", "^test[a-z]+\\.py$", "[a-zA-Z0-9]+"] {
        let report = checker.validate_pattern(pattern);
        assert!(report.safe, "{pattern} should be safe: {}", report.reason);
    }
}

#[test]
fn adversarial_patterns_finish_in_bounded_time() {
    let checker = PatternSafetyChecker::new();
    let adversarial = [
        "^(?:(?=a)a|a(?=a)a)+$".to_string(),
        "^(?:a(?=a)|a)*b$".to_string(),
        format!("({})", "a?".repeat(30)) + &"a".repeat(30),
        "x".repeat(1000),
    ];

    for pattern in &adversarial {
        let start = Instant::now();
        let _ = checker.validate_pattern(pattern);
        assert!(
            start.elapsed() < MAX_EXECUTION_TIME * 2,
            "{pattern} took {:?}",
            start.elapsed()
        );
    }
}

#[test]
fn relative_path_round_trip() -> anyhow::Result<()> {
    let (_dir, validator) = project()?;
    let boundary = validator.boundary().unwrap();
    let file = root_of(&validator).join("src").join("main.py");

    let relative = boundary.get_relative_path(&file).unwrap();
    assert_eq!(relative, Path::new("src").join("main.py"));
    assert_eq!(
        boundary.validate_and_resolve_path(&relative),
        Some(dunce::canonicalize(&file)?)
    );
    Ok(())
}

#[test]
fn allowed_directory_extends_boundary() -> anyhow::Result<()> {
    let (_dir, validator) = project()?;
    let shared = TempDir::new()?;
    let shared_file = dunce::canonicalize(shared.path())?.join("fixture.json");
    let shared_file = shared_file.to_string_lossy().into_owned();

    assert!(!validator.validate_file_path(&shared_file, None).is_ok());

    validator.add_allowed_directory(shared.path())?;
    validator.add_allowed_directory(shared.path())?;

    assert!(validator.validate_file_path(&shared_file, None).is_ok());
    let boundary = validator.boundary().unwrap();
    assert_eq!(boundary.list_allowed_directories().len(), 2);
    assert_eq!(boundary.identity().generation, 1);
    Ok(())
}

#[cfg(unix)]
#[test]
fn symlink_containment() -> anyhow::Result<()> {
    use std::os::unix::fs::symlink;

    let (_dir, validator) = project()?;
    let boundary = validator.boundary().unwrap();
    let root = root_of(&validator);
    let outside = TempDir::new()?;
    fs::write(outside.path().join("secret.txt"), "secret")?;

    symlink(root.join("src/main.py"), root.join("inside-link"))?;
    symlink(outside.path().join("secret.txt"), root.join("outside-link"))?;
    symlink(root.join("not-yet-created"), root.join("dangling-link"))?;

    assert!(boundary.is_symlink_safe("inside-link"));
    assert!(!boundary.is_symlink_safe("outside-link"));
    assert!(boundary.is_symlink_safe("dangling-link"));

    assert!(validator.validate_file_path("inside-link", None).is_ok());
    assert!(!validator.validate_file_path("outside-link", None).is_ok());
    Ok(())
}

/// A path the guard cannot inspect is denied, not waved through.
#[cfg(unix)]
#[test]
fn symlink_loop_is_denied_as_unverifiable() -> anyhow::Result<()> {
    use std::os::unix::fs::symlink;

    let (_dir, validator) = project()?;
    let boundary = validator.boundary().unwrap();
    let root = root_of(&validator);
    symlink(root.join("b"), root.join("a"))?;
    symlink(root.join("a"), root.join("b"))?;

    assert!(!boundary.is_symlink_safe("a/x"));
    assert!(!boundary.is_within_project("a/x"));

    let verdict = validator.validate_file_path("a/x", None);
    assert!(!verdict.is_ok());
    assert_eq!(verdict.reason(), "path could not be verified");

    let err = validator.check_file_path("a/x", None).unwrap_err();
    assert!(err.is_tooling_failure());
    Ok(())
}

/// Rejections never reveal where a denied path actually points.
#[cfg(unix)]
#[test]
fn denial_reason_does_not_leak_resolved_path() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let sink = Arc::new(MemoryAuditSink::new());
    let validator = SecurityValidator::with_audit_sink(dir.path(), sink.clone())?;
    let root = root_of(&validator);

    let outside = TempDir::new()?;
    let outside_canonical = dunce::canonicalize(outside.path())?;
    std::os::unix::fs::symlink(&outside_canonical, root.join("data"))?;

    let verdict = validator.validate_file_path("data/passwords.txt", None);
    assert!(!verdict.is_ok());

    let outside_text = outside_canonical.to_string_lossy();
    let root_text = root.to_string_lossy();
    assert!(!verdict.reason().contains(outside_text.as_ref()));
    assert!(!verdict.reason().contains(root_text.as_ref()));
    assert_eq!(
        verdict.external_message(InputKind::FilePath),
        "Invalid or unsafe file path"
    );

    let records = sink.records();
    let record = records.last().unwrap();
    assert_eq!(record.path, "data/passwords.txt");
    assert!(record.reason.as_deref().unwrap_or("").contains(outside_text.as_ref()));
    Ok(())
}

#[test]
fn glob_screening() -> anyhow::Result<()> {
    let (_dir, validator) = project()?;
    assert!(validator.validate_glob_pattern("src/**/*.py").is_ok());
    assert!(validator.validate_glob_pattern("*.toml").is_ok());
    assert!(!validator.validate_glob_pattern("../**/*").is_ok());
    assert!(!validator.validate_glob_pattern("/etc/*").is_ok());
    assert!(!validator.validate_glob_pattern("src\\\\*.py").is_ok());
    Ok(())
}

#[test]
fn validator_from_config_file() -> anyhow::Result<()> {
    let project = TempDir::new()?;
    fs::create_dir(project.path().join("vendor"))?;

    let toml = "allowed_directories = [\"vendor\"]\nmax_input_length = 8\n\n[patterns]\nmax_length = 16\n";
    fs::write(project.path().join(config::LOCAL_CONFIG_NAME), toml)?;

    let loaded = config::load(project.path())?;
    let validator = SecurityValidator::from_config(&loaded)?;

    let boundary = validator.boundary().unwrap();
    assert_eq!(boundary.list_allowed_directories().len(), 2);
    assert_eq!(validator.pattern_checker().max_length(), 16);
    assert!(validator.sanitize_input("123456789", None).is_err());
    assert!(!validator.validate_regex_pattern(&"a".repeat(17)).is_ok());
    Ok(())
}

/// A config file written inside the project cannot open the rest of the disk.
#[test]
fn project_config_cannot_widen_boundary() -> anyhow::Result<()> {
    let project = TempDir::new()?;
    fs::write(
        project.path().join(config::LOCAL_CONFIG_NAME),
        "allowed_directories = [\"/\"]\n",
    )?;

    let err = config::load(project.path()).unwrap_err();
    assert!(err.is_configuration());

    let validator = SecurityValidator::new(project.path())?;
    assert!(!validator.validate_file_path("/etc/passwd", None).is_ok());
    Ok(())
}

/// Directories outside the project come only from a file the host chooses.
#[test]
fn host_config_file_may_add_outside_directories() -> anyhow::Result<()> {
    let project = TempDir::new()?;
    let shared = TempDir::new()?;
    let host = TempDir::new()?;

    let host_file = host.path().join("guard.toml");
    fs::write(
        &host_file,
        format!(
            "root = {:?}\nallowed_directories = [{:?}]\n",
            project.path().to_string_lossy(),
            shared.path().to_string_lossy()
        ),
    )?;

    let validator = SecurityValidator::from_config(&config::from_path(&host_file)?)?;
    let shared_file = dunce::canonicalize(shared.path())?.join("fixture.json");
    assert!(validator
        .validate_file_path(&shared_file.to_string_lossy(), None)
        .is_ok());
    Ok(())
}

#[test]
fn config_rejects_allowed_directories_without_root() {
    let config = GuardConfig::new().with_allowed_directory("/tmp");
    let err = SecurityValidator::from_config(&config).unwrap_err();
    assert!(err.is_configuration());
}

#[test]
fn config_with_missing_root_fails_construction() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let config = GuardConfig::new()
        .with_root(dir.path().join("gone"))
        .with_patterns(PatternLimits::default());
    let err = SecurityValidator::from_config(&config).unwrap_err();
    assert!(err.is_configuration());
    assert!(err.to_string().contains("does not exist"));
    Ok(())
}

#[test]
fn concurrent_readers_see_consistent_snapshots() -> anyhow::Result<()> {
    let (_dir, validator) = project()?;
    let validator = Arc::new(validator);
    let extras: Vec<TempDir> = (0..4).map(|_| TempDir::new()).collect::<Result<_, _>>()?;

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let validator = Arc::clone(&validator);
            thread::spawn(move || {
                for _ in 0..200 {
                    assert!(validator.validate_file_path("src/main.py", None).is_ok());
                    let allowed = validator.boundary().unwrap().list_allowed_directories();
                    assert!(!allowed.is_empty() && allowed.len() <= 5);
                }
            })
        })
        .collect();

    for extra in &extras {
        validator.add_allowed_directory(extra.path())?;
    }
    for reader in readers {
        reader.join().map_err(|_| anyhow::anyhow!("reader panicked"))?;
    }

    assert_eq!(
        validator.boundary().unwrap().list_allowed_directories().len(),
        5
    );
    Ok(())
}

#[test]
fn writer_sink_produces_json_lines() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let sink = Arc::new(WriterAuditSink::new(Vec::new()));
    let validator = SecurityValidator::with_audit_sink(dir.path(), sink.clone())?;

    let _ = validator.validate_file_path("ok.txt", None);
    let _ = validator.validate_directory_path("../up", false);
    drop(validator);

    let sink = Arc::try_unwrap(sink).map_err(|_| anyhow::anyhow!("sink still shared"))?;
    let bytes = sink.into_inner()?;
    let text = String::from_utf8(bytes)?;

    let records: Vec<AuditRecord> = text
        .lines()
        .map(serde_json::from_str)
        .collect::<Result<_, _>>()?;
    assert_eq!(records.len(), 2);
    assert!(records[0].allowed);
    assert_eq!(records[1].operation, "directory_path");
    assert!(!records[1].allowed);
    Ok(())
}

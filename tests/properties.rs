use boundary_guard::security::{
    PathNormalizer, PatternSafetyChecker, SecurityValidator, MAX_EXECUTION_TIME,
};
use proptest::prelude::*;
use std::path::PathBuf;
use std::sync::LazyLock;
use std::time::Instant;
use tempfile::TempDir;

static PROJECT: LazyLock<(TempDir, SecurityValidator)> = LazyLock::new(|| {
    let dir = TempDir::new().unwrap();
    let validator = SecurityValidator::new(dir.path()).unwrap();
    (dir, validator)
});

fn segment() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9_]{0,7}"
}

fn separator() -> impl Strategy<Value = &'static str> {
    prop_oneof![Just("/"), Just("\\")]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn any_dotdot_segment_is_traversal(
        segments in prop::collection::vec(segment(), 0..5),
        position in 0usize..5,
        sep in separator(),
    ) {
        let mut segments = segments;
        let position = position.min(segments.len());
        segments.insert(position, "..".to_string());
        let raw = segments.join(sep);

        prop_assert!(PathNormalizer::is_traversal_attempt(&raw));
        let err = PROJECT.1.check_file_path(&raw, None).unwrap_err();
        prop_assert!(err.is_policy_violation());
        prop_assert!(err.reason().contains("traversal"));
    }

    #[test]
    fn absolute_forms_outside_boundary_are_rejected(
        segments in prop::collection::vec(segment(), 1..5),
        form in 0u8..3,
        drive in "[A-Za-z]",
    ) {
        let raw = match form {
            0 => format!("/{}", segments.join("/")),
            1 => format!("{}:\\{}", drive, segments.join("\\")),
            _ => format!("\\\\{}", segments.join("\\")),
        };
        let err = PROJECT.1.check_file_path(&raw, None).unwrap_err();
        prop_assert!(err.is_policy_violation());
    }

    #[test]
    fn contained_paths_round_trip(segments in prop::collection::vec(segment(), 1..5)) {
        let boundary = PROJECT.1.boundary().unwrap();
        let relative: PathBuf = segments.iter().collect();

        prop_assert!(boundary.is_within_project(&relative));
        let back = boundary.get_relative_path(&relative).unwrap();
        prop_assert_eq!(&back, &relative);

        let root = boundary.root();
        let normalizer = boundary.normalizer();
        prop_assert_eq!(
            normalizer.normalize(root.join(&back), None).unwrap(),
            normalizer.normalize(&relative, None).unwrap()
        );
    }

    #[test]
    fn sanitize_never_emits_control_characters(text in any::<String>()) {
        match PROJECT.1.sanitize_input(&text, Some(usize::MAX)) {
            Ok(cleaned) => {
                prop_assert!(!cleaned.chars().any(|c| matches!(c, '\u{0}'..='\u{1f}' | '\u{7f}')), "cleaned output contains control characters");
            }
            Err(e) => prop_assert!(false, "unexpected error: {}", e),
        }
    }

    #[test]
    fn sanitize_enforces_max_length(text in "[a-z]{0,40}", max in 0usize..40) {
        let result = PROJECT.1.sanitize_input(&text, Some(max));
        prop_assert_eq!(result.is_err(), text.len() > max);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn pattern_validation_is_bounded(pattern in "[a(|)+*?.\\\\1]{1,40}") {
        let checker = PatternSafetyChecker::new();
        let start = Instant::now();
        let report = checker.validate_pattern(&pattern);
        prop_assert!(start.elapsed() < MAX_EXECUTION_TIME * 2);
        prop_assert_eq!(report.reason.is_empty(), report.safe);
    }
}

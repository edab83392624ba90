//! Pattern safety checking.
//!
//! [`PatternSafetyChecker`] screens user-supplied search patterns before they
//! run against real input. The backtracking engine (`fancy-regex`) supports
//! lookaround and backreferences, so a single adversarial pattern can take
//! exponential time; the static catalog and the bounded probe are both
//! required.

use super::catalog;
use super::probe::{self, ProbeError, BACKTRACK_LIMIT};
use fancy_regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Maximum accepted pattern length, in characters.
pub const MAX_PATTERN_LENGTH: usize = 1000;

/// Wall-clock budget for the empirical trial match.
pub const MAX_EXECUTION_TIME: Duration = Duration::from_secs(1);

/// Match-behavior flags applied when compiling a pattern.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PatternFlags {
    /// `(?i)`
    #[serde(default)]
    pub case_insensitive: bool,
    /// `(?m)`: `^` and `$` match at line boundaries
    #[serde(default)]
    pub multi_line: bool,
    /// `(?s)`: `.` also matches `\n`
    #[serde(default)]
    pub dot_matches_new_line: bool,
}

impl PatternFlags {
    /// The recommended flags: multi-line plus dot-matches-all.
    pub const SAFE: Self = Self {
        case_insensitive: false,
        multi_line: true,
        dot_matches_new_line: true,
    };

    /// Returns the flags set in either `self` or `other`.
    #[must_use]
    pub fn union(self, other: Self) -> Self {
        Self {
            case_insensitive: self.case_insensitive || other.case_insensitive,
            multi_line: self.multi_line || other.multi_line,
            dot_matches_new_line: self.dot_matches_new_line || other.dot_matches_new_line,
        }
    }

    /// Renders the flags as an inline group such as `(?ms)`.
    #[must_use]
    pub fn inline_prefix(self) -> String {
        let mut letters = String::new();
        if self.case_insensitive {
            letters.push('i');
        }
        if self.multi_line {
            letters.push('m');
        }
        if self.dot_matches_new_line {
            letters.push('s');
        }
        if letters.is_empty() {
            letters
        } else {
            format!("(?{})", letters)
        }
    }
}

/// Structural counts for a pattern. Informational only.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComplexityMetrics {
    /// Length in characters.
    pub length: usize,
    /// `*`, `+`, `?` and `{n,m}` quantifiers. Lazy suffixes are not counted.
    pub quantifier_count: usize,
    /// Opening parentheses of any kind.
    pub group_count: usize,
    /// Top-level and nested `|` outside character classes.
    pub alternation_count: usize,
    /// Bracketed classes plus shorthand classes like `\d`.
    pub char_class_count: usize,
    /// `^`, `$`, `\b`, `\B`, `\A`, `\z`.
    pub anchor_count: usize,
    /// Deepest group nesting.
    pub nesting_depth: usize,
    /// Weighted sum of the above.
    pub score: usize,
}

impl ComplexityMetrics {
    fn weigh(mut self) -> Self {
        self.score = self.quantifier_count * 3
            + self.group_count * 2
            + self.alternation_count * 2
            + self.char_class_count
            + self.anchor_count
            + self.nesting_depth * 4
            + self.length / 20;
        self
    }
}

/// Outcome of [`PatternSafetyChecker::validate_pattern`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatternReport {
    /// Whether the pattern passed every check.
    pub safe: bool,
    /// Empty when safe; otherwise names the failed check.
    pub reason: String,
    /// Present whenever the pattern got past the length check.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub complexity: Option<ComplexityMetrics>,
}

impl PatternReport {
    fn safe(complexity: ComplexityMetrics) -> Self {
        Self {
            safe: true,
            reason: String::new(),
            complexity: Some(complexity),
        }
    }

    fn unsafe_with(reason: impl Into<String>, complexity: Option<ComplexityMetrics>) -> Self {
        Self {
            safe: false,
            reason: reason.into(),
            complexity,
        }
    }
}

/// Screens search patterns for catastrophic-backtracking risk.
///
/// # Example
///
/// ```rust,ignore
/// use boundary_guard::security::PatternSafetyChecker;
///
/// let checker = PatternSafetyChecker::new();
/// assert!(checker.validate_pattern("[a-z]+").safe);
/// assert!(!checker.validate_pattern("(a+)+").safe);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatternSafetyChecker {
    max_length: usize,
    max_execution_time: Duration,
}

impl Default for PatternSafetyChecker {
    fn default() -> Self {
        Self::new()
    }
}

impl PatternSafetyChecker {
    /// Creates a checker with the default limits.
    #[must_use]
    pub fn new() -> Self {
        Self::with_limits(MAX_PATTERN_LENGTH, MAX_EXECUTION_TIME)
    }

    /// Creates a checker with custom limits.
    #[must_use]
    pub fn with_limits(max_length: usize, max_execution_time: Duration) -> Self {
        Self {
            max_length,
            max_execution_time,
        }
    }

    /// Maximum accepted pattern length, in characters.
    #[must_use]
    pub fn max_length(&self) -> usize {
        self.max_length
    }

    /// Budget for the trial match.
    #[must_use]
    pub fn max_execution_time(&self) -> Duration {
        self.max_execution_time
    }

    /// Runs every check in order and stops at the first failure.
    ///
    /// 1. non-empty
    /// 2. length within the limit
    /// 3. no dangerous shape from the static catalog
    /// 4. compiles on the native engine
    /// 5. a trial match against a worst-case probe finishes within budget
    #[must_use]
    pub fn validate_pattern(&self, pattern: &str) -> PatternReport {
        if pattern.is_empty() {
            return PatternReport::unsafe_with("pattern must be a non-empty string", None);
        }

        let length = pattern.chars().count();
        if length > self.max_length {
            return PatternReport::unsafe_with(
                format!("pattern too long ({} > {} characters)", length, self.max_length),
                None,
            );
        }

        let complexity = self.analyze_complexity(pattern);

        if let Some(shape) = catalog::find_dangerous_shape(pattern) {
            tracing::debug!(shape, "pattern rejected by static catalog");
            return PatternReport::unsafe_with(format!("dangerous pattern: {}", shape), Some(complexity));
        }

        if let Err(e) = Regex::new(pattern) {
            return PatternReport::unsafe_with(format!("invalid regex: {}", e), Some(complexity));
        }

        let regex = match self.compile_with(pattern, self.get_safe_flags()) {
            Ok(regex) => regex,
            Err(e) => {
                return PatternReport::unsafe_with(format!("execution error: {}", e), Some(complexity));
            }
        };

        let trial = probe::worst_case_probe(pattern);
        match probe::run_bounded(regex, trial, self.max_execution_time) {
            Ok(_) => PatternReport::safe(complexity),
            Err(e @ (ProbeError::TimedOut(_) | ProbeError::BacktrackLimit)) => {
                tracing::warn!(error = %e, "pattern failed the bounded trial match");
                PatternReport::unsafe_with(format!("performance check failed: {}", e), Some(complexity))
            }
            Err(e) => PatternReport::unsafe_with(format!("execution error: {}", e), Some(complexity)),
        }
    }

    /// Counts structural features of `pattern`. Never fails.
    #[must_use]
    pub fn analyze_complexity(&self, pattern: &str) -> ComplexityMetrics {
        #[derive(Clone, Copy, PartialEq, Eq)]
        enum Token {
            Start,
            GroupOpen,
            Quantifier,
            Other,
        }

        let mut metrics = ComplexityMetrics {
            length: pattern.chars().count(),
            ..ComplexityMetrics::default()
        };
        let mut depth = 0usize;
        let mut prev = Token::Start;
        let mut chars = pattern.chars().peekable();

        while let Some(c) = chars.next() {
            let token = match c {
                '\\' => {
                    match chars.next() {
                        Some('d' | 'D' | 'w' | 'W' | 's' | 'S') => metrics.char_class_count += 1,
                        Some('b' | 'B' | 'A' | 'z' | 'Z') => metrics.anchor_count += 1,
                        _ => {}
                    }
                    Token::Other
                }
                '[' => {
                    metrics.char_class_count += 1;
                    skip_class(&mut chars);
                    Token::Other
                }
                '(' => {
                    metrics.group_count += 1;
                    depth += 1;
                    metrics.nesting_depth = metrics.nesting_depth.max(depth);
                    Token::GroupOpen
                }
                ')' => {
                    depth = depth.saturating_sub(1);
                    Token::Other
                }
                '|' => {
                    metrics.alternation_count += 1;
                    Token::Other
                }
                '^' | '$' => {
                    metrics.anchor_count += 1;
                    Token::Other
                }
                '?' if prev == Token::GroupOpen => Token::Other,
                '?' | '+' if prev == Token::Quantifier => Token::Other,
                '*' | '+' | '?' => {
                    metrics.quantifier_count += 1;
                    Token::Quantifier
                }
                '{' if chars.peek().is_some_and(char::is_ascii_digit) => {
                    for next in chars.by_ref() {
                        if next == '}' {
                            break;
                        }
                    }
                    metrics.quantifier_count += 1;
                    Token::Quantifier
                }
                _ => Token::Other,
            };
            prev = token;
        }

        metrics.weigh()
    }

    /// Rewrites known-dangerous sub-shapes into safer equivalents.
    ///
    /// Returns `None` when no rewrite applies.
    #[must_use]
    pub fn suggest_safer_pattern(&self, pattern: &str) -> Option<String> {
        catalog::rewrite_dangerous(pattern)
    }

    /// The flags every compiled pattern receives.
    #[must_use]
    pub fn get_safe_flags(&self) -> PatternFlags {
        PatternFlags::SAFE
    }

    /// Compiles `pattern` if, and only if, it passes validation.
    ///
    /// Caller flags are added to the safe flags; they can never remove them.
    #[must_use]
    pub fn create_safe_pattern(&self, pattern: &str, flags: Option<PatternFlags>) -> Option<Regex> {
        let report = self.validate_pattern(pattern);
        if !report.safe {
            tracing::debug!(reason = %report.reason, "refusing to compile unsafe pattern");
            return None;
        }
        let flags = self.get_safe_flags().union(flags.unwrap_or_default());
        self.compile_with(pattern, flags).ok()
    }

    fn compile_with(&self, pattern: &str, flags: PatternFlags) -> Result<Regex, fancy_regex::Error> {
        RegexBuilder::new(&format!("{}{}", flags.inline_prefix(), pattern))
            .backtrack_limit(BACKTRACK_LIMIT)
            .build()
    }
}

/// Advances past the body of a bracketed class, honoring escapes and a
/// leading `]` or `^]`.
fn skip_class(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) {
    if chars.peek() == Some(&'^') {
        chars.next();
    }
    if chars.peek() == Some(&']') {
        chars.next();
    }
    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                chars.next();
            }
            ']' => return,
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[test]
    fn empty_pattern_rejected() {
        let report = PatternSafetyChecker::new().validate_pattern("");
        assert!(!report.safe);
        assert!(report.reason.contains("non-empty"));
        assert!(report.complexity.is_none());
    }

    #[test]
    fn long_pattern_rejected() {
        let pattern = "a".repeat(MAX_PATTERN_LENGTH + 1);
        let report = PatternSafetyChecker::new().validate_pattern(&pattern);
        assert!(!report.safe);
        assert!(report.reason.contains("pattern too long"));
    }

    #[test]
    fn length_limit_is_inclusive() {
        let pattern = "a".repeat(MAX_PATTERN_LENGTH);
        assert!(PatternSafetyChecker::new().validate_pattern(&pattern).safe);
    }

    #[test]
    fn catalog_hit_names_shape() {
        let report = PatternSafetyChecker::new().validate_pattern("(a+)+");
        assert!(!report.safe);
        assert_eq!(report.reason, "dangerous pattern: nested unbounded quantifiers");
        assert!(report.complexity.is_some());
    }

    #[test]
    fn compile_error_is_surfaced() {
        let report = PatternSafetyChecker::new().validate_pattern("[unclosed");
        assert!(!report.safe);
        assert!(report.reason.starts_with("invalid regex:"));
    }

    #[test]
    fn ordinary_patterns_are_safe() {
        let checker = PatternSafetyChecker::new();
        for pattern in ["hello.*world", "^test[a-z]+\\.py$", "[a-zA-Z0-9]+", "fn\\s+main"] {
            let report = checker.validate_pattern(pattern);
            assert!(report.safe, "{pattern}: {}", report.reason);
            assert!(report.reason.is_empty());
        }
    }

    #[test]
    fn adversarial_pattern_missed_by_catalog_is_bounded() {
        let checker = PatternSafetyChecker::new();
        let pattern = "^(?:(?=a)a|a(?=a)a)+$";
        assert_eq!(catalog::find_dangerous_shape(pattern), None);

        let start = Instant::now();
        let report = checker.validate_pattern(pattern);
        assert!(!report.safe);
        assert!(report.reason.starts_with("performance check failed"));
        assert!(start.elapsed() < MAX_EXECUTION_TIME * 2);
    }

    #[test]
    fn complexity_counts() {
        let metrics = PatternSafetyChecker::new().analyze_complexity("^(a|b)+[0-9]*\\d{2,3}$");
        assert_eq!(metrics.length, 21);
        assert_eq!(metrics.quantifier_count, 3);
        assert_eq!(metrics.group_count, 1);
        assert_eq!(metrics.alternation_count, 1);
        assert_eq!(metrics.char_class_count, 2);
        assert_eq!(metrics.anchor_count, 2);
        assert_eq!(metrics.nesting_depth, 1);
        assert_eq!(metrics.score, 3 * 3 + 2 + 2 + 2 + 2 + 4 + 1);
    }

    #[test]
    fn complexity_ignores_class_contents_and_group_modifiers() {
        let checker = PatternSafetyChecker::new();
        let metrics = checker.analyze_complexity("[|(+*^]");
        assert_eq!(metrics.char_class_count, 1);
        assert_eq!(metrics.alternation_count, 0);
        assert_eq!(metrics.quantifier_count, 0);

        let metrics = checker.analyze_complexity("(?:a+?)");
        assert_eq!(metrics.quantifier_count, 1);
        assert_eq!(metrics.group_count, 1);
    }

    #[test]
    fn complexity_tracks_nesting_depth() {
        let metrics = PatternSafetyChecker::new().analyze_complexity("((a)(b(c)))");
        assert_eq!(metrics.nesting_depth, 3);
        assert_eq!(metrics.group_count, 4);
    }

    #[test]
    fn suggestions() {
        let checker = PatternSafetyChecker::new();
        assert_eq!(checker.suggest_safer_pattern("(a+)+").as_deref(), Some("a+"));
        assert_eq!(checker.suggest_safer_pattern("[a-z]+"), None);

        let suggestion = checker.suggest_safer_pattern("(a|a)*").unwrap();
        assert!(checker.validate_pattern(&suggestion).safe);
    }

    #[test]
    fn safe_flags() {
        let flags = PatternSafetyChecker::new().get_safe_flags();
        assert!(flags.multi_line);
        assert!(flags.dot_matches_new_line);
        assert!(!flags.case_insensitive);
        assert_eq!(flags.inline_prefix(), "(?ms)");
        assert_eq!(PatternFlags::default().inline_prefix(), "");
    }

    #[test]
    fn create_safe_pattern_applies_flags() {
        let checker = PatternSafetyChecker::new();
        let regex = checker.create_safe_pattern("a.b", None).unwrap();
        assert!(regex.is_match("a\nb").unwrap());

        let caseless = PatternFlags {
            case_insensitive: true,
            ..PatternFlags::default()
        };
        let regex = checker.create_safe_pattern("^hello$", Some(caseless)).unwrap();
        assert!(regex.is_match("first\nHELLO\nlast").unwrap());
    }

    #[test]
    fn create_safe_pattern_refuses_unsafe() {
        let checker = PatternSafetyChecker::new();
        assert!(checker.create_safe_pattern("(.+)+", None).is_none());
        assert!(checker.create_safe_pattern("(", None).is_none());
        assert!(checker.create_safe_pattern("", None).is_none());
    }

    #[test]
    fn custom_limits() {
        let checker = PatternSafetyChecker::with_limits(5, Duration::from_millis(200));
        assert_eq!(checker.max_length(), 5);
        assert!(!checker.validate_pattern("abcdef").safe);
        assert!(checker.validate_pattern("abcde").safe);
    }
}

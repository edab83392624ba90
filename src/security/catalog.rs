//! Static catalogs of dangerous pattern shapes and glob forms.
//!
//! The catalogs are patterns that describe patterns. They run on the linear
//! `regex` engine so that screening an adversarial input can never itself
//! backtrack.

use regex::{Captures, Regex};
use std::sync::LazyLock;

/// A known catastrophic-backtracking shape.
struct Shape {
    name: &'static str,
    matcher: Regex,
    /// Extra check on the first match, for shapes a regex alone over-reports.
    confirm: Option<fn(&Captures<'_>) -> bool>,
}

/// A forbidden glob form and the reason reported for it.
struct GlobRule {
    reason: &'static str,
    matcher: Regex,
}

/// A textual rewrite that removes a dangerous sub-shape.
struct Rewrite {
    matcher: Regex,
    replace: fn(&Regex, &str) -> String,
}

const ATOM: &str = r"\\[^\d]|\[[^\]]*\]|[^()|\\\[\]+*?{}^$]";

static SHAPES: LazyLock<Vec<Shape>> = LazyLock::new(|| {
    let entries: [(&'static str, &str, Option<fn(&Captures<'_>) -> bool>); 4] = [
        (
            "quantified lookaround",
            r"\(\?<?[=!](?:[^()\\]|\\.|\((?:[^()\\]|\\.)*\))*\)(?:[+*?]|\{\d+(?:,\d*)?\})",
            None,
        ),
        (
            "quantified backreference",
            r"(?:^|[^\\])(?:\\\\)*\\(?:[1-9]\d*|k<\w+>)(?:[+*]|\{\d+(?:,\d*)?\})",
            None,
        ),
        (
            "nested unbounded quantifiers",
            r"\((?:[^()\\]|\\.)*(?:[+*]|\{\d+,\})(?:[^()\\]|\\.)*\)(?:[+*]|\{\d+,\d*\})",
            None,
        ),
        (
            "overlapping alternation under repetition",
            r"\(((?:[^()\\]|\\.)*\|(?:[^()\\]|\\.)*)\)(?:[+*]|\{\d+,\d*\})",
            Some(alternation_overlaps),
        ),
    ];

    entries
        .into_iter()
        .filter_map(|(name, source, confirm)| match Regex::new(source) {
            Ok(matcher) => Some(Shape {
                name,
                matcher,
                confirm,
            }),
            Err(e) => {
                tracing::warn!(shape = name, error = %e, "skipping catalog entry that failed to compile");
                None
            }
        })
        .collect()
});

static GLOB_RULES: LazyLock<Vec<GlobRule>> = LazyLock::new(|| {
    [
        ("glob traversal detected", r"(?:^|[/\\])\.\.(?:[/\\]|$)"),
        ("absolute glob patterns not allowed", r"^[/\\]"),
        ("drive letters not allowed in glob patterns", r"^[A-Za-z]:"),
        ("malformed glob separators", r"//|\\\\|/\\|\\/"),
        ("malformed recursive wildcard", r"\*{3,}"),
    ]
    .into_iter()
    .filter_map(|(reason, source)| match Regex::new(source) {
        Ok(matcher) => Some(GlobRule { reason, matcher }),
        Err(e) => {
            tracing::warn!(rule = reason, error = %e, "skipping glob rule that failed to compile");
            None
        }
    })
    .collect()
});

static REWRITES: LazyLock<Vec<Rewrite>> = LazyLock::new(|| {
    let sources: [(String, fn(&Regex, &str) -> String); 4] = [
        (
            format!(r"\((?:\?:)?({ATOM})\+\)\+"),
            |re, text| re.replace_all(text, "${1}+").into_owned(),
        ),
        (
            format!(r"\((?:\?:)?({ATOM})[+*]\)[+*]"),
            |re, text| re.replace_all(text, "${1}*").into_owned(),
        ),
        (
            r"(\(\?<?[=!](?:[^()\\]|\\.)*\))(?:[+*?]|\{\d+(?:,\d*)?\})".to_string(),
            |re, text| re.replace_all(text, "${1}").into_owned(),
        ),
        (
            r"\((\?:)?((?:[^()\\]|\\.)*\|(?:[^()\\]|\\.)*)\)".to_string(),
            |re, text| re.replace_all(text, dedupe_alternation).into_owned(),
        ),
    ];

    sources
        .into_iter()
        .filter_map(|(source, replace)| match Regex::new(&source) {
            Ok(matcher) => Some(Rewrite { matcher, replace }),
            Err(e) => {
                tracing::warn!(error = %e, "skipping rewrite that failed to compile");
                None
            }
        })
        .collect()
});

/// Returns the name of the first dangerous shape found in `pattern`.
#[must_use]
pub fn find_dangerous_shape(pattern: &str) -> Option<&'static str> {
    SHAPES.iter().find_map(|shape| {
        let hit = match shape.confirm {
            None => shape.matcher.is_match(pattern),
            Some(confirm) => shape
                .matcher
                .captures_iter(pattern)
                .any(|caps| confirm(&caps)),
        };
        hit.then_some(shape.name)
    })
}

/// Returns the reason the first matching glob rule reports, if any.
#[must_use]
pub fn find_dangerous_glob(pattern: &str) -> Option<&'static str> {
    GLOB_RULES
        .iter()
        .find(|rule| rule.matcher.is_match(pattern))
        .map(|rule| rule.reason)
}

/// Applies the rewrite table. Returns `None` when nothing was rewritten.
#[must_use]
pub fn rewrite_dangerous(pattern: &str) -> Option<String> {
    let rewritten = REWRITES
        .iter()
        .fold(pattern.to_string(), |text, rewrite| {
            (rewrite.replace)(&rewrite.matcher, &text)
        });
    (rewritten != pattern).then_some(rewritten)
}

fn alternation_overlaps(caps: &Captures<'_>) -> bool {
    let Some(body) = caps.get(1) else {
        return false;
    };
    let branches = split_branches(strip_group_prefix(body.as_str()));

    if branches.iter().any(|branch| branch.is_empty()) {
        return true;
    }

    let firsts: Vec<&str> = branches.iter().map(|branch| first_atom(branch)).collect();
    for (i, a) in branches.iter().enumerate() {
        for (j, b) in branches.iter().enumerate().skip(i + 1) {
            if a == b || atoms_intersect(firsts[i], firsts[j]) {
                return true;
            }
        }
    }
    false
}

fn dedupe_alternation(caps: &Captures<'_>) -> String {
    let whole = caps.get(0).map_or("", |m| m.as_str());
    let Some(body) = caps.get(2) else {
        return whole.to_string();
    };

    let branches = split_branches(body.as_str());
    let mut unique: Vec<&str> = Vec::with_capacity(branches.len());
    for branch in &branches {
        if !unique.contains(branch) {
            unique.push(branch);
        }
    }

    if unique.len() == branches.len() {
        whole.to_string()
    } else {
        format!("(?:{})", unique.join("|"))
    }
}

/// Drops a leading `?:`, `?<name>` or `?P<name>` from a group body.
fn strip_group_prefix(body: &str) -> &str {
    if let Some(rest) = body.strip_prefix("?:") {
        return rest;
    }
    let named = body
        .strip_prefix("?P<")
        .or_else(|| body.strip_prefix("?<"))
        .filter(|rest| !rest.starts_with(['=', '!']));
    match named.and_then(|rest| rest.find('>').map(|end| &rest[end + 1..])) {
        Some(rest) => rest,
        None => body,
    }
}

/// Splits on `|` that is neither escaped nor inside a character class.
fn split_branches(body: &str) -> Vec<&str> {
    let mut branches = Vec::new();
    let mut start = 0;
    let mut escaped = false;
    let mut in_class = false;

    for (i, c) in body.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' => escaped = true,
            '[' => in_class = true,
            ']' => in_class = false,
            '|' if !in_class => {
                branches.push(&body[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    branches.push(&body[start..]);
    branches
}

fn first_atom(branch: &str) -> &str {
    let mut chars = branch.char_indices();
    match chars.next() {
        None => "",
        Some((_, '\\')) => {
            let end = chars.next().map_or(branch.len(), |(i, c)| i + c.len_utf8());
            &branch[..end]
        }
        Some((_, '[')) => {
            let mut escaped = false;
            for (i, c) in chars {
                if escaped {
                    escaped = false;
                } else if c == '\\' {
                    escaped = true;
                } else if c == ']' && i > 1 {
                    return &branch[..=i];
                }
            }
            branch
        }
        Some((_, c)) => &branch[..c.len_utf8()],
    }
}

/// Atoms whose match set cannot be sampled. These always count as overlapping.
fn is_open_ended(atom: &str) -> bool {
    matches!(atom, "." | "\\W" | "\\S" | "\\D")
        || atom.starts_with("[^")
        || (atom.starts_with('[') && !atom.is_ascii())
}

/// Whether two leading atoms can match the same character.
///
/// Samples printable ASCII, common whitespace and every character spelled in
/// either atom. Anything that fails to compile counts as overlapping.
fn atoms_intersect(a: &str, b: &str) -> bool {
    if a == b || is_open_ended(a) || is_open_ended(b) {
        return true;
    }
    let (Ok(left), Ok(right)) = (
        Regex::new(&format!("^(?:{a})$")),
        Regex::new(&format!("^(?:{b})$")),
    ) else {
        return true;
    };

    let mut buf = [0u8; 4];
    a.chars()
        .chain(b.chars())
        .chain((0x20u8..0x7f).map(char::from))
        .chain(['\t', '\n', '\r'])
        .any(|c| {
            let sample = c.encode_utf8(&mut buf);
            left.is_match(sample) && right.is_match(sample)
        })
}

//! Bounded empirical execution of a compiled pattern.
//!
//! The trial match runs on a dedicated worker thread. The caller waits with a
//! wall-clock deadline and abandons the worker when it expires, so a pattern
//! that ignores cooperative cancellation still cannot stall validation. The
//! abandoned worker is itself bounded by the engine's backtrack limit.

use crate::error::GuardError;
use fancy_regex::{Regex, RuntimeError};
use std::fmt;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

/// Backtracking steps allowed per trial match before the engine gives up.
pub(crate) const BACKTRACK_LIMIT: usize = 1_000_000;

/// Number of repetitions of the seed character in the probe string.
const PROBE_REPEAT: usize = 48;

/// Why a bounded probe did not produce a result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ProbeError {
    /// The deadline passed before the worker answered.
    TimedOut(Duration),
    /// The engine gave up after [`BACKTRACK_LIMIT`] steps.
    BacktrackLimit,
    /// The engine reported any other runtime error.
    Engine(String),
    /// The worker could not be started or exited without answering.
    WorkerLost,
}

impl fmt::Display for ProbeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProbeError::TimedOut(budget) => {
                write!(f, "trial match exceeded {} ms", budget.as_millis())
            }
            ProbeError::BacktrackLimit => {
                write!(f, "trial match exceeded {} backtracking steps", BACKTRACK_LIMIT)
            }
            ProbeError::Engine(reason) => write!(f, "{}", reason),
            ProbeError::WorkerLost => write!(f, "probe worker exited without a result"),
        }
    }
}

impl From<ProbeError> for GuardError {
    fn from(error: ProbeError) -> Self {
        GuardError::tooling_failure("pattern probe", error.to_string())
    }
}

/// Runs `regex` against `probe` and waits at most `budget` for the answer.
pub(crate) fn run_bounded(regex: Regex, probe: String, budget: Duration) -> Result<bool, ProbeError> {
    let (tx, rx) = mpsc::sync_channel(1);

    thread::Builder::new()
        .name("pattern-probe".to_string())
        .spawn(move || {
            let outcome = regex.is_match(&probe).map_err(|e| match e {
                fancy_regex::Error::RuntimeError(RuntimeError::BacktrackLimitExceeded) => {
                    ProbeError::BacktrackLimit
                }
                other => ProbeError::Engine(other.to_string()),
            });
            // The receiver is gone once the deadline has passed.
            let _ = tx.send(outcome);
        })
        .map_err(|e| {
            tracing::warn!(error = %e, "failed to spawn pattern probe worker");
            ProbeError::WorkerLost
        })?;

    match rx.recv_timeout(budget) {
        Ok(Ok(matched)) => Ok(matched),
        Ok(Err(error)) => Err(error),
        Err(mpsc::RecvTimeoutError::Timeout) => {
            tracing::warn!(budget_ms = budget.as_millis() as u64, "pattern probe abandoned");
            Err(ProbeError::TimedOut(budget))
        }
        Err(mpsc::RecvTimeoutError::Disconnected) => Err(ProbeError::WorkerLost),
    }
}

/// Builds an input shaped to drive a backtracking engine into its worst case.
///
/// A long run of a character the pattern is likely to accept, followed by a
/// suffix it is unlikely to accept, forces every alternative split of the run
/// to be tried before the match fails.
pub(crate) fn worst_case_probe(pattern: &str) -> String {
    let seed = seed_char(pattern);
    let mut probe = String::with_capacity(PROBE_REPEAT + 2);
    probe.extend(std::iter::repeat(seed).take(PROBE_REPEAT));
    probe.push('\u{1}');
    probe.push('!');
    probe
}

/// First unescaped ASCII alphanumeric literal in the pattern, `'a'` otherwise.
fn seed_char(pattern: &str) -> char {
    let mut escaped = false;
    for c in pattern.chars() {
        if escaped {
            escaped = false;
            continue;
        }
        if c == '\\' {
            escaped = true;
        } else if c.is_ascii_alphanumeric() {
            return c;
        }
    }
    'a'
}

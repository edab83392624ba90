//! Audit records for boundary decisions.
//!
//! Audit delivery is fire-and-forget: a failing or panicking sink never
//! changes the outcome of the guarded operation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::Write;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Mutex;

/// The `tracing` target used by [`TracingAuditSink`].
pub const AUDIT_TARGET: &str = "boundary_guard::audit";

/// One append-only audit entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditRecord {
    /// The path as supplied by the caller.
    pub path: String,
    /// The operation being guarded (e.g. `"read_file"`).
    pub operation: String,
    /// Whether access was permitted.
    pub allowed: bool,
    /// Detailed denial reason. Internal only; never shown to the caller.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// When the decision was made.
    pub timestamp: DateTime<Utc>,
}

impl AuditRecord {
    /// Creates a record stamped with the current time.
    #[must_use]
    pub fn new(path: impl Into<String>, operation: impl Into<String>, allowed: bool) -> Self {
        Self {
            path: path.into(),
            operation: operation.into(),
            allowed,
            reason: None,
            timestamp: Utc::now(),
        }
    }

    /// Attaches a detailed reason.
    #[must_use]
    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }
}

/// Error returned by an [`AuditSink`] that could not store a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditError {
    /// Why the record was not stored.
    pub reason: String,
}

impl AuditError {
    /// Creates a new audit error.
    #[must_use]
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl fmt::Display for AuditError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "failed to write audit record: {}", self.reason)
    }
}

impl std::error::Error for AuditError {}

/// Destination for audit records.
///
/// Implementations must be `Send + Sync`; a validator is shared across
/// concurrent callers.
pub trait AuditSink: Send + Sync + fmt::Debug {
    /// Stores one record.
    ///
    /// # Errors
    ///
    /// Returns `AuditError` if the record could not be stored. The caller
    /// swallows the error.
    fn record(&self, record: &AuditRecord) -> Result<(), AuditError>;
}

/// Emits audit records as `tracing` events on [`AUDIT_TARGET`].
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn record(&self, record: &AuditRecord) -> Result<(), AuditError> {
        if record.allowed {
            tracing::debug!(
                target: AUDIT_TARGET,
                path = %record.path,
                operation = %record.operation,
                allowed = true,
                "access granted"
            );
        } else {
            tracing::warn!(
                target: AUDIT_TARGET,
                path = %record.path,
                operation = %record.operation,
                allowed = false,
                reason = record.reason.as_deref().unwrap_or(""),
                "access denied"
            );
        }
        Ok(())
    }
}

/// Keeps records in memory. Useful for hosts that ship records elsewhere.
#[derive(Debug, Default)]
pub struct MemoryAuditSink {
    records: Mutex<Vec<AuditRecord>>,
}

impl MemoryAuditSink {
    /// Creates an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of all records stored so far.
    #[must_use]
    pub fn records(&self) -> Vec<AuditRecord> {
        self.records
            .lock()
            .map(|records| records.clone())
            .unwrap_or_default()
    }

    /// Returns the number of stored records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.lock().map(|records| records.len()).unwrap_or(0)
    }

    /// Returns true if no records have been stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl AuditSink for MemoryAuditSink {
    fn record(&self, record: &AuditRecord) -> Result<(), AuditError> {
        let mut records = self
            .records
            .lock()
            .map_err(|_| AuditError::new("record buffer lock poisoned"))?;
        records.push(record.clone());
        Ok(())
    }
}

/// Writes records as JSON lines to any writer (file, socket, buffer).
pub struct WriterAuditSink<W: Write + Send> {
    writer: Mutex<W>,
}

impl<W: Write + Send> WriterAuditSink<W> {
    /// Wraps a writer.
    #[must_use]
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    /// Returns the inner writer.
    ///
    /// # Errors
    ///
    /// Returns `AuditError` if the writer lock was poisoned.
    pub fn into_inner(self) -> Result<W, AuditError> {
        self.writer
            .into_inner()
            .map_err(|_| AuditError::new("writer lock poisoned"))
    }
}

impl<W: Write + Send> fmt::Debug for WriterAuditSink<W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WriterAuditSink").finish_non_exhaustive()
    }
}

impl<W: Write + Send> AuditSink for WriterAuditSink<W> {
    fn record(&self, record: &AuditRecord) -> Result<(), AuditError> {
        let mut writer = self
            .writer
            .lock()
            .map_err(|_| AuditError::new("writer lock poisoned"))?;
        serde_json::to_writer(&mut *writer, record).map_err(|e| AuditError::new(e.to_string()))?;
        writer
            .write_all(b"\n")
            .and_then(|()| writer.flush())
            .map_err(|e| AuditError::new(e.to_string()))
    }
}

/// Hands a record to a sink, swallowing both errors and panics.
pub(crate) fn deliver(sink: &dyn AuditSink, record: &AuditRecord) {
    match panic::catch_unwind(AssertUnwindSafe(|| sink.record(record))) {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::debug!(error = %e, "audit sink rejected record"),
        Err(_) => tracing::debug!("audit sink panicked; record dropped"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[derive(Debug)]
    struct FailingSink;

    impl AuditSink for FailingSink {
        fn record(&self, _record: &AuditRecord) -> Result<(), AuditError> {
            Err(AuditError::new("disk full"))
        }
    }

    #[derive(Debug)]
    struct PanickingSink;

    impl AuditSink for PanickingSink {
        fn record(&self, _record: &AuditRecord) -> Result<(), AuditError> {
            panic!("sink exploded");
        }
    }

    #[test]
    fn record_builder_sets_fields() {
        let record = AuditRecord::new("src/main.rs", "read_file", false).with_reason("outside");
        assert_eq!(record.path, "src/main.rs");
        assert_eq!(record.operation, "read_file");
        assert!(!record.allowed);
        assert_eq!(record.reason.as_deref(), Some("outside"));
    }

    #[test]
    fn memory_sink_collects_records() {
        let sink = MemoryAuditSink::new();
        assert!(sink.is_empty());
        deliver(&sink, &AuditRecord::new("a", "read", true));
        deliver(&sink, &AuditRecord::new("b", "read", false));
        assert_eq!(sink.len(), 2);
        assert_eq!(sink.records()[1].path, "b");
    }

    #[test]
    fn deliver_swallows_sink_errors() {
        deliver(&FailingSink, &AuditRecord::new("a", "read", true));
    }

    #[test]
    fn deliver_swallows_sink_panics() {
        deliver(&PanickingSink, &AuditRecord::new("a", "read", true));
    }

    #[test]
    fn writer_sink_emits_json_lines() {
        let sink = WriterAuditSink::new(Vec::new());
        sink.record(&AuditRecord::new("one", "read", true)).unwrap();
        sink.record(&AuditRecord::new("two", "list", false).with_reason("symlink escape"))
            .unwrap();

        let bytes = sink.into_inner().unwrap();
        let text = String::from_utf8(bytes).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);

        let second: AuditRecord = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(second.path, "two");
        assert_eq!(second.reason.as_deref(), Some("symlink escape"));
        assert!(!lines[0].contains("reason"));
    }

    #[derive(Clone, Default)]
    struct TargetRecorder(Arc<Mutex<Vec<String>>>);

    impl<S: tracing::Subscriber> tracing_subscriber::Layer<S> for TargetRecorder {
        fn on_event(
            &self,
            event: &tracing::Event<'_>,
            _ctx: tracing_subscriber::layer::Context<'_, S>,
        ) {
            self.0.lock().unwrap().push(event.metadata().target().to_string());
        }
    }

    #[test]
    fn tracing_sink_emits_on_audit_target() {
        use tracing_subscriber::layer::SubscriberExt;

        let recorder = TargetRecorder::default();
        let subscriber = tracing_subscriber::registry().with(recorder.clone());
        tracing::subscriber::with_default(subscriber, || {
            TracingAuditSink.record(&AuditRecord::new("a", "read", true)).unwrap();
            TracingAuditSink
                .record(&AuditRecord::new("b", "read", false).with_reason("outside"))
                .unwrap();
        });

        let targets = recorder.0.lock().unwrap();
        assert_eq!(targets.as_slice(), [AUDIT_TARGET, AUDIT_TARGET]);
    }

    #[test]
    fn audit_error_display() {
        let error = AuditError::new("disk full");
        assert!(error.to_string().contains("disk full"));
    }
}

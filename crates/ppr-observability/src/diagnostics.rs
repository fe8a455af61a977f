//! Postpone interception diagnostics.
//!
//! Every render attempt owns an [`AttemptDiagnostics`] that collects
//! interception records while subtrees settle. At attempt completion the
//! records are flushed into the shared [`DiagnosticsSink`], which formats the
//! operator-facing lines. External tooling matches on this text, so the
//! wording is fixed.

use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use ppr_core::{AttemptId, NodeId};
use serde::Serialize;

/// Header line printed when intercepting code re-threw a different error.
pub const RETHROWN_ERRORS_HEADER: &str =
    "The following errors were re-thrown, and might help find the location of the try/catch that triggered this.";

/// Line printed for a route whose postpone signal was intercepted.
pub fn opt_out_message(pathname: &str) -> String {
    format!(
        "{} opted out of partial prerendering because the postpone signal was intercepted by a try/catch in your application code.",
        pathname
    )
}

/// One intercepted postpone signal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InterceptionRecord {
    /// Subtree whose render swallowed the signal.
    pub subtree: NodeId,
    /// Path of the nearest enclosing boundary, root first.
    pub boundary_path: String,
    /// Message of the error the intercepting code threw instead, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rethrown: Option<String>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Append-only diagnostics owned by a single render attempt.
#[derive(Debug)]
pub struct AttemptDiagnostics {
    attempt: AttemptId,
    pathname: String,
    records: Mutex<Vec<InterceptionRecord>>,
}

impl AttemptDiagnostics {
    /// Create diagnostics for an attempt.
    pub fn new(attempt: AttemptId, pathname: impl Into<String>) -> Self {
        Self {
            attempt,
            pathname: pathname.into(),
            records: Mutex::new(Vec::new()),
        }
    }

    /// Append a record. Safe to call from concurrently settling subtrees.
    pub fn record(&self, record: InterceptionRecord) {
        lock(&self.records).push(record);
    }

    /// Snapshot of the records so far.
    pub fn records(&self) -> Vec<InterceptionRecord> {
        lock(&self.records).clone()
    }

    /// Whether any interception was recorded.
    pub fn has_interceptions(&self) -> bool {
        !lock(&self.records).is_empty()
    }

    /// Attempt these diagnostics belong to.
    pub fn attempt(&self) -> AttemptId {
        self.attempt
    }

    /// Route pathname.
    pub fn pathname(&self) -> &str {
        &self.pathname
    }

    fn into_records(self) -> Vec<InterceptionRecord> {
        self.records
            .into_inner()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Flushed diagnostics for one route attempt.
#[derive(Debug, Clone, Serialize)]
pub struct RouteReport {
    /// Route pathname.
    pub pathname: String,
    /// Attempt that produced the report.
    pub attempt: AttemptId,
    /// Interceptions in settle order.
    pub interceptions: Vec<InterceptionRecord>,
}

impl RouteReport {
    /// Whether the route opted out of partial prerendering.
    pub fn opted_out(&self) -> bool {
        !self.interceptions.is_empty()
    }

    /// Messages of re-thrown errors, in record order.
    pub fn rethrown(&self) -> impl Iterator<Item = &str> {
        self.interceptions
            .iter()
            .filter_map(|r| r.rethrown.as_deref())
    }

    /// Render the operator-facing text block.
    pub fn render(&self) -> String {
        let mut text = opt_out_message(&self.pathname);

        let rethrown: Vec<&str> = self.rethrown().collect();
        if !rethrown.is_empty() {
            text.push('\n');
            text.push_str(RETHROWN_ERRORS_HEADER);
            for message in rethrown {
                text.push_str("\n\n");
                text.push_str(&format!("Error: {}", message));
            }
        }

        text
    }
}

impl fmt::Display for RouteReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

/// Destination for diagnostics text.
pub trait DiagnosticsWriter: Send + Sync {
    /// Write one report block.
    fn write_block(&self, block: &str);
}

/// Writes blocks as `tracing` warnings on the `ppr::diagnostics` target.
#[derive(Debug, Default)]
pub struct TracingWriter;

impl DiagnosticsWriter for TracingWriter {
    fn write_block(&self, block: &str) {
        tracing::warn!(target: "ppr::diagnostics", "{}", block);
    }
}

/// Writes blocks to stderr as plain process output.
#[derive(Debug, Default)]
pub struct StderrWriter;

impl DiagnosticsWriter for StderrWriter {
    fn write_block(&self, block: &str) {
        eprintln!("{}", block);
    }
}

/// Keeps blocks in memory.
#[derive(Debug, Default)]
pub struct MemoryWriter {
    blocks: Mutex<Vec<String>>,
}

impl MemoryWriter {
    /// Create an empty writer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything written so far, one block per entry.
    pub fn blocks(&self) -> Vec<String> {
        lock(&self.blocks).clone()
    }

    /// Everything written so far, joined as process output.
    pub fn output(&self) -> String {
        lock(&self.blocks).join("\n")
    }
}

impl DiagnosticsWriter for MemoryWriter {
    fn write_block(&self, block: &str) {
        lock(&self.blocks).push(block.to_string());
    }
}

/// Reports a sink keeps before dropping the oldest.
pub const DEFAULT_REPORT_RETENTION: usize = 256;

/// Process-wide aggregation of route reports.
///
/// Never affects control flow: flushing only formats and writes text.
/// Only the most recent reports are retained; every report is still written.
pub struct DiagnosticsSink {
    writer: Arc<dyn DiagnosticsWriter>,
    reports: Mutex<VecDeque<RouteReport>>,
    retention: usize,
}

impl DiagnosticsSink {
    /// Create a sink writing to the given destination.
    pub fn new(writer: Arc<dyn DiagnosticsWriter>) -> Self {
        Self {
            writer,
            reports: Mutex::new(VecDeque::new()),
            retention: DEFAULT_REPORT_RETENTION,
        }
    }

    /// Keep at most `retention` reports.
    pub fn with_retention(mut self, retention: usize) -> Self {
        self.retention = retention;
        self
    }

    /// Sink that logs through `tracing`.
    pub fn tracing() -> Self {
        Self::new(Arc::new(TracingWriter))
    }

    /// Flush an attempt's diagnostics. Returns the report when the attempt
    /// recorded interceptions.
    pub fn flush(&self, diagnostics: AttemptDiagnostics) -> Option<RouteReport> {
        let attempt = diagnostics.attempt();
        let pathname = diagnostics.pathname().to_string();
        let interceptions = diagnostics.into_records();
        if interceptions.is_empty() {
            return None;
        }

        let report = RouteReport {
            pathname,
            attempt,
            interceptions,
        };
        self.writer.write_block(&report.render());
        let mut reports = lock(&self.reports);
        if self.retention > 0 {
            while reports.len() >= self.retention {
                reports.pop_front();
            }
            reports.push_back(report.clone());
        }
        Some(report)
    }

    /// Retained reports, oldest first.
    pub fn reports(&self) -> Vec<RouteReport> {
        lock(&self.reports).iter().cloned().collect()
    }

    /// Take the retained reports, leaving the sink empty.
    pub fn drain(&self) -> Vec<RouteReport> {
        lock(&self.reports).drain(..).collect()
    }

    /// Pathnames that opted out, in flush order, without duplicates.
    pub fn opted_out_routes(&self) -> Vec<String> {
        let mut routes: Vec<String> = Vec::new();
        for report in lock(&self.reports).iter() {
            if !routes.contains(&report.pathname) {
                routes.push(report.pathname.clone());
            }
        }
        routes
    }
}

impl Default for DiagnosticsSink {
    fn default() -> Self {
        Self::tracing()
    }
}

impl fmt::Debug for DiagnosticsSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DiagnosticsSink")
            .field("reports", &lock(&self.reports).len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(subtree: usize, rethrown: Option<&str>) -> InterceptionRecord {
        InterceptionRecord {
            subtree: NodeId::new(subtree),
            boundary_path: "root > boundary:dynamic".to_string(),
            rethrown: rethrown.map(String::from),
        }
    }

    #[test]
    fn test_flush_without_records_is_silent() {
        let writer = Arc::new(MemoryWriter::new());
        let sink = DiagnosticsSink::new(writer.clone());

        let report = sink.flush(AttemptDiagnostics::new(AttemptId::next(), "/a"));

        assert!(report.is_none());
        assert!(writer.blocks().is_empty());
        assert!(sink.reports().is_empty());
    }

    #[test]
    fn test_flush_emits_exact_opt_out_line() {
        let writer = Arc::new(MemoryWriter::new());
        let sink = DiagnosticsSink::new(writer.clone());
        let diagnostics = AttemptDiagnostics::new(AttemptId::next(), "/suspense/node/cookies-error");
        diagnostics.record(record(3, None));

        sink.flush(diagnostics).expect("report");

        assert_eq!(
            writer.output(),
            "/suspense/node/cookies-error opted out of partial prerendering because the postpone signal was intercepted by a try/catch in your application code."
        );
        assert_eq!(sink.opted_out_routes(), vec!["/suspense/node/cookies-error"]);
    }

    #[test]
    fn test_flush_includes_rethrown_block() {
        let writer = Arc::new(MemoryWriter::new());
        let sink = DiagnosticsSink::new(writer.clone());
        let diagnostics = AttemptDiagnostics::new(AttemptId::next(), "/fetch-error");
        diagnostics.record(record(5, Some("You are not signed in")));

        sink.flush(diagnostics);

        let output = writer.output();
        assert!(output.starts_with(&opt_out_message("/fetch-error")));
        assert!(output.contains(RETHROWN_ERRORS_HEADER));
        assert!(output.contains("Error: You are not signed in"));
    }

    #[test]
    fn test_concurrent_records_are_not_lost() {
        let diagnostics = Arc::new(AttemptDiagnostics::new(AttemptId::next(), "/a"));
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let diagnostics = Arc::clone(&diagnostics);
                std::thread::spawn(move || diagnostics.record(record(i, None)))
            })
            .collect();
        for handle in handles {
            handle.join().expect("thread");
        }

        assert_eq!(diagnostics.records().len(), 8);
    }

    #[test]
    fn test_retention_drops_oldest_reports() {
        let writer = Arc::new(MemoryWriter::new());
        let sink = DiagnosticsSink::new(writer.clone()).with_retention(2);

        for pathname in ["/a", "/b", "/c"] {
            let diagnostics = AttemptDiagnostics::new(AttemptId::next(), pathname);
            diagnostics.record(record(1, None));
            sink.flush(diagnostics);
        }

        assert_eq!(writer.blocks().len(), 3);
        assert_eq!(sink.opted_out_routes(), vec!["/b", "/c"]);

        let drained = sink.drain();
        assert_eq!(drained.len(), 2);
        assert_eq!(drained[0].pathname, "/b");
        assert!(sink.reports().is_empty());
    }
}

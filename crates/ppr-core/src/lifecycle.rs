//! Request lifecycle tracking.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::ids::HoleId;

/// Lifecycle phases for a served page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecyclePhase {
    /// Request received, processing started.
    Start,
    /// Shell HTML has been flushed to client.
    ShellSent,
    /// A hole's resolved content has been sent.
    HoleSent(HoleId),
    /// Response completed successfully.
    Completion,
    /// Client went away before every hole was sent.
    Abandoned,
    /// An error occurred.
    Error(String),
}

/// Timing context for observability.
#[derive(Debug, Clone)]
pub struct TimingContext {
    start: Instant,
    marks: HashMap<String, Instant>,
}

impl TimingContext {
    /// Create a new timing context.
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
            marks: HashMap::new(),
        }
    }

    /// Record a timing mark.
    pub fn mark(&mut self, name: &str) {
        self.marks.insert(name.to_string(), Instant::now());
    }

    /// Mark hole resolution start.
    pub fn mark_hole_start(&mut self, hole: HoleId) {
        self.mark(&format!("hole_{}_start", hole));
    }

    /// Mark hole sent.
    pub fn mark_hole_sent(&mut self, hole: HoleId) {
        self.mark(&format!("hole_{}_sent", hole));
    }

    /// Get elapsed time since start.
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Get time to shell flush.
    pub fn time_to_shell(&self) -> Option<Duration> {
        self.marks
            .get("shell_sent")
            .map(|t| t.duration_since(self.start))
    }

    /// Get time to the first streamed hole.
    pub fn time_to_first_hole(&self) -> Option<Duration> {
        self.marks
            .iter()
            .filter(|(k, _)| k.starts_with("hole_") && k.ends_with("_sent"))
            .map(|(_, t)| t.duration_since(self.start))
            .min()
    }

    /// Get timing for a specific hole.
    pub fn hole_timing(&self, hole: HoleId) -> Option<HoleTiming> {
        let start = self.marks.get(&format!("hole_{}_start", hole))?;
        let sent = self.marks.get(&format!("hole_{}_sent", hole))?;

        Some(HoleTiming {
            hole,
            start: start.duration_since(self.start),
            sent: sent.duration_since(self.start),
            duration: sent.duration_since(*start),
        })
    }
}

impl Default for TimingContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Timing information for a hole.
#[derive(Debug, Clone)]
pub struct HoleTiming {
    /// Hole id.
    pub hole: HoleId,
    /// Time from request start to resolution start.
    pub start: Duration,
    /// Time from request start to hole sent.
    pub sent: Duration,
    /// Duration of the hole's render.
    pub duration: Duration,
}

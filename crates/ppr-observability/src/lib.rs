//! Observability infrastructure for the partial prerendering engine.
//!
//! This crate provides:
//! - `AttemptDiagnostics` / `DiagnosticsSink` - Postpone interception reporting
//! - `EngineMetrics` - Engine-level counters
//! - `logging::init` - Tracing subscriber installation

mod diagnostics;
pub mod logging;
mod metrics;

pub use diagnostics::*;
pub use metrics::*;
pub use logging::{LogFormat, LogSettings, ObservabilityError};

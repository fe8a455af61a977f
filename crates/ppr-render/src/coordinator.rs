//! Per-subtree postpone state machine.
//!
//! ```text
//! Rendering ──► Completed
//!     │
//!     ├──────► Postponed ──► Resumed
//!     ├──────► Intercepted
//!     └──────► Failed
//! ```
//!
//! A subtree that raised the signal but did not return it was intercepted by
//! application code. Interceptions are recorded in the attempt diagnostics
//! and make the nearest enclosing boundary fall back to dynamic rendering.

use std::fmt;
use std::sync::{Mutex, MutexGuard};

use ppr_core::NodeId;
use ppr_observability::{AttemptDiagnostics, InterceptionRecord};

use crate::signal::{PostponeSignal, RenderError, SignalChannel};
use crate::tree::RenderTree;

/// State of one tracked subtree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubtreeState {
    /// Render in flight.
    Rendering,
    /// Rendered without postponing.
    Completed,
    /// Postponed to the nearest boundary.
    Postponed,
    /// Filled with live data by a resume.
    Resumed,
    /// The postpone signal was swallowed by application code.
    Intercepted,
    /// Failed with a genuine error.
    Failed,
}

impl SubtreeState {
    fn can_transition_to(self, next: SubtreeState) -> bool {
        use SubtreeState::*;
        matches!(
            (self, next),
            (Rendering, Completed)
                | (Rendering, Postponed)
                | (Rendering, Intercepted)
                | (Rendering, Failed)
                | (Postponed, Resumed)
        )
    }
}

impl fmt::Display for SubtreeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Rendering => "rendering",
            Self::Completed => "completed",
            Self::Postponed => "postponed",
            Self::Resumed => "resumed",
            Self::Intercepted => "intercepted",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Coordinator errors.
#[derive(Debug, thiserror::Error)]
pub enum CoordinatorError {
    #[error("subtree {node} cannot move from {from} to {to}")]
    InvalidTransition {
        node: NodeId,
        from: String,
        to: SubtreeState,
    },

    #[error("subtree {0} is outside the render tree")]
    UnknownNode(NodeId),
}

/// How a subtree's render ended.
#[derive(Debug, Clone)]
pub enum Settlement {
    /// Html for the subtree.
    Completed(String),
    /// Signal reached the coordinator unmodified.
    Postponed(PostponeSignal),
    /// Application code swallowed the signal.
    Intercepted { rethrown: Option<String> },
    /// Genuine render error.
    Failed(String),
}

/// Where an intercepted or postponed subtree's fallback lands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackTarget {
    /// Innermost enclosing boundary becomes a hole.
    Boundary(NodeId),
    /// No enclosing boundary: the whole route renders dynamically.
    Route,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Owns the state machine for every tracked subtree of one attempt.
pub struct PostponeCoordinator<'a> {
    tree: &'a RenderTree,
    channel: &'a SignalChannel,
    diagnostics: &'a AttemptDiagnostics,
    states: Vec<Mutex<Option<SubtreeState>>>,
}

impl<'a> PostponeCoordinator<'a> {
    /// Create a coordinator for an attempt.
    pub fn new(
        tree: &'a RenderTree,
        channel: &'a SignalChannel,
        diagnostics: &'a AttemptDiagnostics,
    ) -> Self {
        Self {
            tree,
            channel,
            diagnostics,
            states: (0..tree.len()).map(|_| Mutex::new(None)).collect(),
        }
    }

    fn slot(&self, node: NodeId) -> Result<&Mutex<Option<SubtreeState>>, CoordinatorError> {
        self.states
            .get(node.index())
            .ok_or(CoordinatorError::UnknownNode(node))
    }

    fn transition(&self, node: NodeId, next: SubtreeState) -> Result<(), CoordinatorError> {
        let mut state = lock(self.slot(node)?);
        let current = *state;
        match current {
            Some(current) if current.can_transition_to(next) => {
                *state = Some(next);
                Ok(())
            }
            current => Err(CoordinatorError::InvalidTransition {
                node,
                from: current.map_or_else(|| "untracked".to_string(), |s| s.to_string()),
                to: next,
            }),
        }
    }

    /// Start tracking a subtree that is about to render.
    pub fn begin(&self, node: NodeId) -> Result<(), CoordinatorError> {
        let mut state = lock(self.slot(node)?);
        let current = *state;
        match current {
            None => {
                *state = Some(SubtreeState::Rendering);
                Ok(())
            }
            Some(current) => Err(CoordinatorError::InvalidTransition {
                node,
                from: current.to_string(),
                to: SubtreeState::Rendering,
            }),
        }
    }

    /// Track a subtree that a previous prerender left postponed.
    pub fn restore_postponed(&self, node: NodeId) -> Result<(), CoordinatorError> {
        *lock(self.slot(node)?) = Some(SubtreeState::Postponed);
        Ok(())
    }

    /// Mark a postponed subtree as filled with live data.
    pub fn resume(&self, node: NodeId) -> Result<(), CoordinatorError> {
        self.transition(node, SubtreeState::Resumed)
    }

    /// Current state of a subtree.
    pub fn state(&self, node: NodeId) -> Option<SubtreeState> {
        self.states.get(node.index()).and_then(|slot| *lock(slot))
    }

    /// Number of subtrees still rendering.
    pub fn in_flight(&self) -> usize {
        self.states
            .iter()
            .filter(|slot| *lock(slot) == Some(SubtreeState::Rendering))
            .count()
    }

    /// Where a subtree's fallback lands: the innermost enclosing boundary.
    pub fn fallback_target(&self, node: NodeId) -> FallbackTarget {
        self.tree
            .nearest_boundary(node)
            .map_or(FallbackTarget::Route, FallbackTarget::Boundary)
    }

    /// Classify a finished render and advance the subtree's state.
    pub fn settle(
        &self,
        node: NodeId,
        result: Result<String, RenderError>,
    ) -> Result<Settlement, CoordinatorError> {
        let raised = self.channel.was_raised(node);

        let settlement = match result {
            Err(RenderError::Postpone(signal)) if self.channel.owns(&signal) => {
                Settlement::Postponed(signal)
            }
            Err(RenderError::Postpone(signal)) => Settlement::Failed(format!(
                "postpone signal from {} escaped into {}",
                signal.attempt(),
                self.channel.attempt()
            )),
            Ok(_) if raised => Settlement::Intercepted { rethrown: None },
            Err(RenderError::Failed(message)) if raised => Settlement::Intercepted {
                rethrown: Some(message),
            },
            Ok(html) => Settlement::Completed(html),
            Err(RenderError::Failed(message)) => Settlement::Failed(message),
        };

        let next = match &settlement {
            Settlement::Completed(_) => SubtreeState::Completed,
            Settlement::Postponed(_) => SubtreeState::Postponed,
            Settlement::Intercepted { .. } => SubtreeState::Intercepted,
            Settlement::Failed(_) => SubtreeState::Failed,
        };
        self.transition(node, next)?;

        if let Settlement::Intercepted { rethrown } = &settlement {
            let boundary_path = match self.fallback_target(node) {
                FallbackTarget::Boundary(boundary) => self.tree.path(boundary),
                FallbackTarget::Route => self.tree.path(RenderTree::root()),
            };
            tracing::debug!(
                attempt = %self.channel.attempt(),
                %node,
                boundary = %boundary_path,
                rethrown = rethrown.is_some(),
                "postpone signal intercepted"
            );
            self.diagnostics.record(InterceptionRecord {
                subtree: node,
                boundary_path,
                rethrown: rethrown.clone(),
            });
        }

        Ok(settlement)
    }
}

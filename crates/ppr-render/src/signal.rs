//! The postpone signal and its per-attempt channel.
//!
//! Postponing is a typed unwind: the data-access call returns
//! `Err(RenderError::Postpone(..))` and the component propagates it with `?`
//! up to the job. Code that catches render errors generically must ask
//! [`RenderError::is_postpone`] (or [`is_postpone_signal`]) and re-raise the
//! signal; anything else is detected as an interception.

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

use ppr_core::{AttemptId, NodeId};

/// Why a subtree postponed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PostponeReason {
    /// Read request cookies.
    Cookies,
    /// Read request headers.
    Headers,
    /// Opted out of caching for a data fetch.
    NoStore(String),
    /// Any other per-request data.
    Custom(String),
}

impl fmt::Display for PostponeReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cookies => write!(f, "cookies()"),
            Self::Headers => write!(f, "headers()"),
            Self::NoStore(what) => write!(f, "uncached fetch of {}", what),
            Self::Custom(what) => write!(f, "{}", what),
        }
    }
}

/// Control-flow value carried out of a postponed subtree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostponeSignal {
    attempt: AttemptId,
    origin: NodeId,
    reason: PostponeReason,
}

impl PostponeSignal {
    /// Attempt the signal was raised in.
    pub fn attempt(&self) -> AttemptId {
        self.attempt
    }

    /// Subtree that raised it.
    pub fn origin(&self) -> NodeId {
        self.origin
    }

    /// Why it was raised.
    pub fn reason(&self) -> &PostponeReason {
        &self.reason
    }
}

/// Error returned by component render logic.
#[derive(Debug, Clone, thiserror::Error)]
pub enum RenderError {
    /// The postpone signal. Not an error; must reach the job unmodified.
    #[error("render of {} postponed by {}", .0.origin, .0.reason)]
    Postpone(PostponeSignal),

    /// A genuine failure in application code.
    #[error("{0}")]
    Failed(String),
}

impl RenderError {
    /// Create a genuine render failure.
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }

    /// Whether this is the postpone signal.
    pub fn is_postpone(&self) -> bool {
        matches!(self, Self::Postpone(_))
    }

    /// Borrow the signal, if this is one.
    pub fn as_postpone(&self) -> Option<&PostponeSignal> {
        match self {
            Self::Postpone(signal) => Some(signal),
            Self::Failed(_) => None,
        }
    }

    /// For generic catch-alls: hands back ordinary errors for handling and
    /// re-raises the postpone signal.
    ///
    /// ```ignore
    /// match load(scope).await {
    ///     Ok(v) => v,
    ///     Err(err) => {
    ///         let err = err.rethrow_if_postpone()?;
    ///         return Ok(render_error_panel(&err));
    ///     }
    /// }
    /// ```
    pub fn rethrow_if_postpone(self) -> Result<RenderError, RenderError> {
        match self {
            Self::Postpone(_) => Err(self),
            other => Ok(other),
        }
    }
}

/// Free-function form of [`RenderError::is_postpone`].
pub fn is_postpone_signal(err: &RenderError) -> bool {
    err.is_postpone()
}

const RAISED: u8 = 0b01;
const ACCESSED: u8 = 0b10;

/// Per-attempt signal channel.
///
/// Holds one flag slot per render tree node. Raising records the origin slot
/// so the coordinator can tell a propagated signal from a swallowed one.
/// Never shared between attempts: a signal carries the attempt id and is only
/// recognised by the channel that minted it.
#[derive(Debug)]
pub struct SignalChannel {
    attempt: AttemptId,
    slots: Vec<AtomicU8>,
}

impl SignalChannel {
    /// Create a channel with one slot per tree node.
    pub fn new(attempt: AttemptId, slots: usize) -> Self {
        Self {
            attempt,
            slots: (0..slots).map(|_| AtomicU8::new(0)).collect(),
        }
    }

    /// Attempt this channel belongs to.
    pub fn attempt(&self) -> AttemptId {
        self.attempt
    }

    /// Raise the postpone signal for `origin`. The returned error must be
    /// propagated by the caller.
    pub fn raise(&self, origin: NodeId, reason: PostponeReason) -> RenderError {
        self.set(origin, RAISED);
        tracing::trace!(attempt = %self.attempt, %origin, %reason, "postpone raised");
        RenderError::Postpone(PostponeSignal {
            attempt: self.attempt,
            origin,
            reason,
        })
    }

    /// Record that `node` read live request data.
    pub fn note_access(&self, node: NodeId) {
        self.set(node, ACCESSED);
    }

    /// Whether `node` raised the signal during this attempt.
    pub fn was_raised(&self, node: NodeId) -> bool {
        self.get(node) & RAISED != 0
    }

    /// Whether `node` read live request data during this attempt.
    pub fn was_accessed(&self, node: NodeId) -> bool {
        self.get(node) & ACCESSED != 0
    }

    /// Whether `signal` was minted by this channel.
    pub fn owns(&self, signal: &PostponeSignal) -> bool {
        signal.attempt == self.attempt
    }

    fn set(&self, node: NodeId, flag: u8) {
        if let Some(slot) = self.slots.get(node.index()) {
            slot.fetch_or(flag, Ordering::AcqRel);
        }
    }

    fn get(&self, node: NodeId) -> u8 {
        self.slots
            .get(node.index())
            .map(|slot| slot.load(Ordering::Acquire))
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raise_records_origin() {
        let channel = SignalChannel::new(AttemptId::next(), 4);
        let err = channel.raise(NodeId::new(2), PostponeReason::Cookies);

        assert!(err.is_postpone());
        assert!(is_postpone_signal(&err));
        assert!(channel.was_raised(NodeId::new(2)));
        assert!(!channel.was_raised(NodeId::new(1)));
        assert_eq!(err.as_postpone().map(|s| s.origin()), Some(NodeId::new(2)));
    }

    #[test]
    fn test_signal_not_owned_by_other_attempt() {
        let first = SignalChannel::new(AttemptId::next(), 1);
        let second = SignalChannel::new(AttemptId::next(), 1);

        let err = first.raise(NodeId::new(0), PostponeReason::Headers);
        let signal = err.as_postpone().expect("signal");

        assert!(first.owns(signal));
        assert!(!second.owns(signal));
    }

    #[test]
    fn test_rethrow_if_postpone() {
        let channel = SignalChannel::new(AttemptId::next(), 1);
        let signal = channel.raise(NodeId::new(0), PostponeReason::Cookies);
        assert!(signal.rethrow_if_postpone().is_err());

        let failure = RenderError::failed("boom");
        let handed_back = failure.rethrow_if_postpone().expect("ordinary error");
        assert_eq!(handed_back.to_string(), "boom");
    }

    #[test]
    fn test_out_of_range_slot_is_ignored() {
        let channel = SignalChannel::new(AttemptId::next(), 1);
        channel.note_access(NodeId::new(10));
        assert!(!channel.was_accessed(NodeId::new(10)));
    }
}

//! Shell-first streaming sink.

use std::fmt::Display;

use futures::{Sink, SinkExt};
use ppr_cache::AssembleError;
use ppr_core::{HoleId, LifecyclePhase, TimingContext};
use ppr_render::JobError;

use crate::chunk::StreamChunk;

/// Streaming errors.
#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    #[error("shell must be sent before hole content")]
    ShellNotSent,

    #[error("shell already sent")]
    ShellAlreadySent,

    #[error("stream already completed")]
    Completed,

    #[error("client disconnected: {0}")]
    Disconnected(String),

    #[error("no placeholder for hole {0}")]
    MissingPlaceholder(HoleId),

    #[error("response body is not utf-8")]
    InvalidUtf8(#[from] std::string::FromUtf8Error),

    #[error(transparent)]
    Job(#[from] JobError),

    #[error(transparent)]
    Assemble(#[from] AssembleError),
}

/// State of the streaming sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SinkState {
    /// Shell not yet sent.
    Initial,
    /// Shell sent, holes can be streamed.
    ShellSent,
    /// Response completed.
    Completed,
}

/// Sink that enforces shell-first ordering.
///
/// Generic over any `Sink<Vec<u8>>`, e.g. the sending half of a response
/// body channel.
pub struct StreamingSink<S, E>
where
    S: Sink<Vec<u8>, Error = E> + Unpin,
    E: Display,
{
    inner: S,
    state: SinkState,
    timing: TimingContext,
    holes_sent: Vec<HoleId>,
    disconnected: bool,
}

impl<S, E> StreamingSink<S, E>
where
    S: Sink<Vec<u8>, Error = E> + Unpin,
    E: Display,
{
    /// Create a new streaming sink.
    pub fn new(sink: S, timing: TimingContext) -> Self {
        Self {
            inner: sink,
            state: SinkState::Initial,
            timing,
            holes_sent: Vec::new(),
            disconnected: false,
        }
    }

    async fn write(&mut self, chunk: StreamChunk) -> Result<(), StreamError> {
        let bytes = chunk.encode().into_bytes();
        if let Err(e) = self.inner.send(bytes).await {
            self.disconnected = true;
            return Err(StreamError::Disconnected(e.to_string()));
        }
        Ok(())
    }

    /// Send the document opening and shell body. Must come first.
    pub async fn send_shell(&mut self, html: String) -> Result<(), StreamError> {
        if self.state != SinkState::Initial {
            return Err(StreamError::ShellAlreadySent);
        }

        self.timing.mark("shell_start");
        self.write(StreamChunk::Shell(html)).await?;
        self.timing.mark("shell_sent");
        self.state = SinkState::ShellSent;

        Ok(())
    }

    /// Send the resolved content of one hole.
    pub async fn send_hole(&mut self, hole: HoleId, html: String) -> Result<(), StreamError> {
        match self.state {
            SinkState::Initial => return Err(StreamError::ShellNotSent),
            SinkState::Completed => return Err(StreamError::Completed),
            SinkState::ShellSent => {}
        }

        self.write(StreamChunk::Hole { hole, html }).await?;
        self.timing.mark_hole_sent(hole);
        self.holes_sent.push(hole);

        Ok(())
    }

    /// Send the document closing and complete the response.
    pub async fn finish(&mut self, tail: String) -> Result<(), StreamError> {
        match self.state {
            SinkState::Initial => return Err(StreamError::ShellNotSent),
            SinkState::Completed => return Err(StreamError::Completed),
            SinkState::ShellSent => {}
        }

        self.write(StreamChunk::Tail(tail)).await?;
        let _ = self.inner.close().await;
        self.state = SinkState::Completed;
        self.timing.mark("complete");

        Ok(())
    }

    /// Holes sent so far, in send order.
    pub fn holes_sent(&self) -> &[HoleId] {
        &self.holes_sent
    }

    /// Current lifecycle phase.
    pub fn phase(&self) -> LifecyclePhase {
        if self.disconnected {
            return LifecyclePhase::Abandoned;
        }
        match (self.state, self.holes_sent.last()) {
            (SinkState::Initial, _) => LifecyclePhase::Start,
            (SinkState::ShellSent, None) => LifecyclePhase::ShellSent,
            (SinkState::ShellSent, Some(hole)) => LifecyclePhase::HoleSent(*hole),
            (SinkState::Completed, _) => LifecyclePhase::Completion,
        }
    }

    /// Timing context reference.
    pub fn timing(&self) -> &TimingContext {
        &self.timing
    }

    /// Mutable timing context.
    pub fn timing_mut(&mut self) -> &mut TimingContext {
        &mut self.timing
    }

    /// Consume the sink and return the inner value.
    pub fn into_inner(self) -> S {
        self.inner
    }
}

#[cfg(test)]
mod tests {
    use futures::channel::mpsc;
    use futures::StreamExt;

    use super::*;

    #[tokio::test]
    async fn test_shell_first_ordering() {
        let (tx, rx) = mpsc::channel::<Vec<u8>>(8);
        let mut sink = StreamingSink::new(tx, TimingContext::new());

        assert!(matches!(
            sink.send_hole(HoleId::new(0), "x".into()).await,
            Err(StreamError::ShellNotSent)
        ));

        sink.send_shell("<main>".into()).await.unwrap();
        assert_eq!(sink.phase(), LifecyclePhase::ShellSent);
        sink.send_hole(HoleId::new(0), "x".into()).await.unwrap();
        assert_eq!(sink.phase(), LifecyclePhase::HoleSent(HoleId::new(0)));
        sink.finish("</main>".into()).await.unwrap();
        assert_eq!(sink.phase(), LifecyclePhase::Completion);
        assert!(sink.timing().time_to_shell().is_some());
        drop(sink);

        let chunks: Vec<Vec<u8>> = rx.collect().await;
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0], b"<main>".to_vec());
    }

    #[tokio::test]
    async fn test_dropped_receiver_is_disconnect() {
        let (tx, rx) = mpsc::channel::<Vec<u8>>(1);
        drop(rx);
        let mut sink = StreamingSink::new(tx, TimingContext::new());

        let err = sink.send_shell("<main>".into()).await.unwrap_err();

        assert!(matches!(err, StreamError::Disconnected(_)));
        assert_eq!(sink.phase(), LifecyclePhase::Abandoned);
    }
}

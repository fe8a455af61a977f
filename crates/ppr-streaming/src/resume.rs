//! Resume execution.
//!
//! Streaming resume sends the shell first and then each hole as soon as its
//! render finishes. Synchronous resume renders the whole tree with live data
//! and returns one body without holes. For the same request data both
//! produce the same hole content.

use std::fmt::Display;

use futures::stream::{FuturesUnordered, StreamExt};
use futures::Sink;
use ppr_cache::ShellArtifact;
use ppr_core::RequestData;
use ppr_render::{RenderJob, ResumedHole};
use tracing::Instrument;

use crate::document::Document;
use crate::sink::{StreamError, StreamingSink};

/// Summary of a finished streaming resume.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StreamSummary {
    /// Holes resolved and sent.
    pub holes_sent: usize,
}

/// Fills the holes of a shell with live request data.
#[derive(Debug, Clone)]
pub struct ResumeExecutor {
    job: RenderJob,
    document: Document,
}

impl ResumeExecutor {
    /// Create an executor for a route's job.
    pub fn new(job: RenderJob, document: Document) -> Self {
        Self { job, document }
    }

    /// The route's job.
    pub fn job(&self) -> &RenderJob {
        &self.job
    }

    /// The document wrapper.
    pub fn document(&self) -> &Document {
        &self.document
    }

    /// Stream the shell, then every hole as it resolves, then the tail.
    ///
    /// When the client disconnects the remaining hole renders are dropped
    /// and [`StreamError::Disconnected`] is returned.
    pub async fn stream<S, E>(
        &self,
        artifact: &ShellArtifact,
        data: &RequestData,
        sink: &mut StreamingSink<S, E>,
    ) -> Result<StreamSummary, StreamError>
    where
        S: Sink<Vec<u8>, Error = E> + Unpin,
        E: Display,
    {
        let span = tracing::info_span!(
            "resume",
            pathname = %self.job.pathname(),
            holes = artifact.holes().len()
        );

        async move {
            let mut shell = self.document.render_opening();
            shell.push_str(artifact.html());
            sink.send_shell(shell).await?;

            let mut pending = FuturesUnordered::new();
            for target in artifact.resume_targets() {
                sink.timing_mut().mark_hole_start(target.hole);
                pending.push(self.job.resume_hole(target, data));
            }

            let mut summary = StreamSummary::default();
            while let Some(resolved) = pending.next().await {
                let ResumedHole { hole, html, .. } = resolved?;
                if let Err(err) = sink.send_hole(hole, html).await {
                    tracing::debug!(
                        sent = summary.holes_sent,
                        abandoned = pending.len(),
                        "client went away"
                    );
                    return Err(err);
                }
                summary.holes_sent += 1;
            }

            sink.finish(self.document.render_closing()).await?;
            tracing::debug!(holes_sent = summary.holes_sent, "stream completed");
            Ok(summary)
        }
        .instrument(span)
        .await
    }

    /// Resolve every hole of a shell without streaming.
    pub async fn resume_all(
        &self,
        artifact: &ShellArtifact,
        data: &RequestData,
    ) -> Result<Vec<ResumedHole>, StreamError> {
        let mut pending: FuturesUnordered<_> = artifact
            .resume_targets()
            .into_iter()
            .map(|target| self.job.resume_hole(target, data))
            .collect();

        let mut resolved = Vec::with_capacity(artifact.holes().len());
        while let Some(hole) = pending.next().await {
            resolved.push(hole?);
        }
        resolved.sort_by_key(|hole| hole.hole);
        Ok(resolved)
    }

    /// Synchronous full-dynamic render of the whole page.
    pub async fn render_full(&self, data: &RequestData) -> Result<String, StreamError> {
        let page = self.job.render_dynamic(data).await?;
        Ok(self.document.wrap(&page.html))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use futures::channel::mpsc;
    use ppr_cache::assemble;
    use ppr_core::{CookieJar, TimingContext};
    use ppr_observability::DiagnosticsSink;
    use ppr_render::{Component, RenderError, RenderScope, RenderTree, View};

    use super::*;
    use crate::chunk::reconstruct;

    struct Slow {
        delay: u64,
        label: &'static str,
    }

    #[async_trait]
    impl Component for Slow {
        async fn render(&self, scope: &RenderScope<'_>) -> Result<String, RenderError> {
            let signed_in = scope.cookie("session")?.is_some();
            tokio::time::sleep(Duration::from_millis(self.delay)).await;
            Ok(format!("<p>{} {}</p>", self.label, signed_in))
        }
    }

    fn executor() -> ResumeExecutor {
        let tree = RenderTree::from_view(View::element("main").with_children([
            View::boundary("first", "<i>1</i>").with_child(View::component(Slow {
                delay: 30,
                label: "first",
            })),
            View::text("|"),
            View::boundary("second", "<i>2</i>").with_child(View::component(Slow {
                delay: 1,
                label: "second",
            })),
        ]));
        ResumeExecutor::new(
            RenderJob::new(Arc::new(tree), "/suspense/node"),
            Document::default(),
        )
    }

    fn data() -> RequestData {
        RequestData {
            cookies: CookieJar::new().with("session", "1"),
            ..RequestData::default()
        }
    }

    async fn shell(executor: &ResumeExecutor) -> ShellArtifact {
        let job = executor.job();
        let outcome = job.prerender(&DiagnosticsSink::tracing()).await.unwrap();
        assemble(&outcome, job.tree()).unwrap()
    }

    #[tokio::test]
    async fn test_stream_matches_full_render() {
        let executor = executor();
        let artifact = shell(&executor).await;
        let (tx, rx) = mpsc::channel::<Vec<u8>>(16);
        let mut sink = StreamingSink::new(tx, TimingContext::new());

        let summary = executor.stream(&artifact, &data(), &mut sink).await.unwrap();
        drop(sink);

        assert_eq!(summary.holes_sent, 2);
        let chunks: Vec<String> = rx
            .map(|bytes| String::from_utf8(bytes).unwrap())
            .collect()
            .await;
        assert_eq!(chunks.len(), 4);
        // The faster second hole arrives first.
        assert!(chunks[1].contains("second true"));
        let streamed = reconstruct(&chunks).unwrap();
        let full = executor.render_full(&data()).await.unwrap();
        assert_eq!(streamed, full);
    }

    #[tokio::test]
    async fn test_resume_all_in_hole_order() {
        let executor = executor();
        let artifact = shell(&executor).await;

        let holes = executor.resume_all(&artifact, &data()).await.unwrap();
        let body = artifact.fill(&holes).unwrap();

        assert_eq!(holes.len(), 2);
        assert_eq!(
            executor.document().wrap(&body),
            executor.render_full(&data()).await.unwrap()
        );
    }

    #[tokio::test]
    async fn test_disconnect_abandons_remaining_holes() {
        let executor = executor();
        let artifact = shell(&executor).await;
        let (tx, mut rx) = mpsc::channel::<Vec<u8>>(0);
        let mut sink = StreamingSink::new(tx, TimingContext::new());

        let reader = tokio::spawn(async move {
            let first = rx.next().await;
            drop(rx);
            first
        });

        let err = executor
            .stream(&artifact, &data(), &mut sink)
            .await
            .unwrap_err();

        assert!(matches!(err, StreamError::Disconnected(_)));
        assert!(reader.await.unwrap().is_some());
        assert!(sink.holes_sent().len() < 2);
    }
}

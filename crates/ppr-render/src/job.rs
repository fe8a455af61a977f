//! Render jobs.
//!
//! A [`RenderJob`] executes a page tree once per attempt in one of three
//! modes. Components of one attempt render concurrently; each settles into
//! its own slot through the [`PostponeCoordinator`].

use std::sync::Arc;

use futures::future::join_all;
use ppr_core::{AttemptId, HoleId, NodeId, RequestData};
use ppr_observability::{AttemptDiagnostics, DiagnosticsSink, RouteReport};
use tracing::Instrument;

use crate::coordinator::{CoordinatorError, FallbackTarget, PostponeCoordinator, Settlement};
use crate::html::{HtmlWriter, NoHoles, SerializeError};
use crate::scope::RenderScope;
use crate::signal::SignalChannel;
use crate::tree::RenderTree;

/// Static/dynamic classification of a node after a render.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeStatus {
    /// Part of the shell.
    Static,
    /// Inside a boundary waiting for request data.
    DynamicPending,
    /// Rendered with request data.
    DynamicResolved,
}

/// A hole to fill during a resume.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResumeTarget {
    /// Hole id assigned in the shell.
    pub hole: HoleId,
    /// Boundary node the hole stands for.
    pub boundary: NodeId,
}

/// How a job executes the tree.
#[derive(Debug, Clone)]
pub enum RenderMode<'r> {
    /// Request data postpones.
    Prerender,
    /// Whole tree with live request data.
    FullDynamic(&'r RequestData),
    /// Only the named holes, with live request data.
    Resume {
        holes: Vec<ResumeTarget>,
        data: &'r RequestData,
    },
}

/// Job errors.
#[derive(Debug, thiserror::Error)]
pub enum JobError {
    #[error("render of {pathname} failed at {node}: {message}")]
    Render {
        pathname: String,
        node: NodeId,
        message: String,
    },

    #[error(transparent)]
    Coordinator(#[from] CoordinatorError),

    #[error(transparent)]
    Serialize(#[from] SerializeError),

    #[error("node {0} is not a boundary of this tree")]
    UnknownBoundary(NodeId),
}

/// Result of a prerender attempt.
#[derive(Debug, Clone)]
pub struct PrerenderOutcome {
    attempt: AttemptId,
    pathname: String,
    outputs: Vec<Option<String>>,
    statuses: Vec<NodeStatus>,
    holes: Vec<NodeId>,
    route_dynamic: bool,
    in_flight: usize,
    report: Option<RouteReport>,
}

impl PrerenderOutcome {
    /// Attempt that produced this outcome.
    pub fn attempt(&self) -> AttemptId {
        self.attempt
    }

    /// Route pathname.
    pub fn pathname(&self) -> &str {
        &self.pathname
    }

    /// Component html indexed by node id. Only meaningful for static nodes.
    pub fn outputs(&self) -> &[Option<String>] {
        &self.outputs
    }

    /// Status of one node.
    pub fn status(&self, node: NodeId) -> Option<NodeStatus> {
        self.statuses.get(node.index()).copied()
    }

    /// Status of every node, indexed by node id.
    pub fn statuses(&self) -> &[NodeStatus] {
        &self.statuses
    }

    /// Outermost pending boundaries in document order; each becomes a hole.
    pub fn hole_boundaries(&self) -> &[NodeId] {
        &self.holes
    }

    /// A subtree postponed or was intercepted outside every boundary.
    pub fn is_route_dynamic(&self) -> bool {
        self.route_dynamic
    }

    /// Whether application code intercepted the signal.
    pub fn intercepted(&self) -> bool {
        self.report.is_some()
    }

    /// Subtrees still rendering when the attempt returned.
    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    /// Diagnostics flushed for this attempt.
    pub fn report(&self) -> Option<&RouteReport> {
        self.report.as_ref()
    }
}

/// Whole-page render with live request data.
#[derive(Debug, Clone)]
pub struct RenderedPage {
    /// Page body.
    pub html: String,
    /// Status of every node, indexed by node id.
    pub statuses: Vec<NodeStatus>,
}

/// A filled hole.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResumedHole {
    pub hole: HoleId,
    pub boundary: NodeId,
    /// Html of the boundary's content.
    pub html: String,
}

/// Output of [`RenderJob::run`].
#[derive(Debug, Clone)]
pub enum JobOutput {
    Prerendered(PrerenderOutcome),
    Rendered(RenderedPage),
    Resumed(Vec<ResumedHole>),
}

/// Executes one route's tree.
#[derive(Debug, Clone)]
pub struct RenderJob {
    tree: Arc<RenderTree>,
    pathname: String,
}

impl RenderJob {
    /// Create a job for a route.
    pub fn new(tree: Arc<RenderTree>, pathname: impl Into<String>) -> Self {
        Self {
            tree,
            pathname: pathname.into(),
        }
    }

    /// Tree this job renders.
    pub fn tree(&self) -> &Arc<RenderTree> {
        &self.tree
    }

    /// Route pathname.
    pub fn pathname(&self) -> &str {
        &self.pathname
    }

    /// Run the job in the given mode.
    pub async fn run(
        &self,
        mode: RenderMode<'_>,
        sink: &DiagnosticsSink,
    ) -> Result<JobOutput, JobError> {
        match mode {
            RenderMode::Prerender => self.prerender(sink).await.map(JobOutput::Prerendered),
            RenderMode::FullDynamic(data) => {
                self.render_dynamic(data).await.map(JobOutput::Rendered)
            }
            RenderMode::Resume { holes, data } => {
                let filled = join_all(holes.into_iter().map(|t| self.resume_hole(t, data))).await;
                filled
                    .into_iter()
                    .collect::<Result<Vec<_>, _>>()
                    .map(JobOutput::Resumed)
            }
        }
    }

    /// Render with request data postponing. Diagnostics are flushed to
    /// `sink` before returning, also when the attempt fails.
    pub async fn prerender(&self, sink: &DiagnosticsSink) -> Result<PrerenderOutcome, JobError> {
        let attempt = AttemptId::next();
        let span = tracing::info_span!("prerender", pathname = %self.pathname, %attempt);

        async move {
            let tree = self.tree.as_ref();
            let channel = SignalChannel::new(attempt, tree.len());
            let diagnostics = AttemptDiagnostics::new(attempt, self.pathname.as_str());

            let (outputs, pending, route_dynamic, in_flight, failure) = {
                let coordinator = PostponeCoordinator::new(tree, &channel, &diagnostics);
                let components = tree.components();
                let results = join_all(components.iter().map(|(node, component)| {
                    let coordinator = &coordinator;
                    let scope = RenderScope::prerender(*node, &channel);
                    async move {
                        coordinator.begin(*node)?;
                        let result = component.render(&scope).await;
                        coordinator
                            .settle(*node, result)
                            .map(|settlement| (*node, settlement))
                    }
                }))
                .await;

                let mut outputs = vec![None; tree.len()];
                let mut pending = vec![false; tree.len()];
                let mut route_dynamic = false;
                let mut failure: Option<JobError> = None;

                for result in results {
                    match result {
                        Ok((node, Settlement::Completed(html))) => {
                            outputs[node.index()] = Some(html);
                        }
                        Ok((node, Settlement::Postponed(_) | Settlement::Intercepted { .. })) => {
                            match coordinator.fallback_target(node) {
                                FallbackTarget::Boundary(boundary) => {
                                    pending[boundary.index()] = true
                                }
                                FallbackTarget::Route => route_dynamic = true,
                            }
                        }
                        Ok((node, Settlement::Failed(message))) => {
                            if failure.is_none() {
                                failure = Some(JobError::Render {
                                    pathname: self.pathname.clone(),
                                    node,
                                    message,
                                });
                            }
                        }
                        Err(err) => {
                            if failure.is_none() {
                                failure = Some(err.into());
                            }
                        }
                    }
                }

                let in_flight = coordinator.in_flight();
                (outputs, pending, route_dynamic, in_flight, failure)
            };

            let report = sink.flush(diagnostics);
            if let Some(err) = failure {
                tracing::error!(error = %err, "prerender failed");
                return Err(err);
            }

            let mut statuses = vec![NodeStatus::Static; tree.len()];
            let mut holes = Vec::new();
            for node in tree.descendants(RenderTree::root()) {
                if !pending[node.index()] {
                    continue;
                }
                for inner in tree.descendants(node) {
                    statuses[inner.index()] = NodeStatus::DynamicPending;
                }
                if !has_pending_ancestor(tree, &pending, node) {
                    holes.push(node);
                }
            }
            if route_dynamic {
                statuses.fill(NodeStatus::DynamicPending);
                holes.clear();
            }

            tracing::debug!(
                holes = holes.len(),
                route_dynamic,
                intercepted = report.is_some(),
                "prerender settled"
            );

            Ok(PrerenderOutcome {
                attempt,
                pathname: self.pathname.clone(),
                outputs,
                statuses,
                holes,
                route_dynamic,
                in_flight,
                report,
            })
        }
        .instrument(span)
        .await
    }

    /// Render the whole tree with live request data.
    pub async fn render_dynamic(&self, data: &RequestData) -> Result<RenderedPage, JobError> {
        let attempt = AttemptId::next();
        let span = tracing::info_span!("render_attempt", pathname = %self.pathname, %attempt);

        async move {
            let root = RenderTree::root();
            let live = self.render_live(root, data, attempt, None).await?;

            let mut html = String::new();
            HtmlWriter::new(&self.tree, &live.outputs).write(root, &mut html, &mut NoHoles)?;

            Ok(RenderedPage {
                html,
                statuses: live.statuses,
            })
        }
        .instrument(span)
        .await
    }

    /// Fill one hole with live request data.
    pub async fn resume_hole(
        &self,
        target: ResumeTarget,
        data: &RequestData,
    ) -> Result<ResumedHole, JobError> {
        let is_boundary = self
            .tree
            .node(target.boundary)
            .is_some_and(|node| node.is_boundary());
        if !is_boundary {
            return Err(JobError::UnknownBoundary(target.boundary));
        }

        let attempt = AttemptId::next();
        let span = tracing::debug_span!(
            "resume",
            pathname = %self.pathname,
            %attempt,
            hole = %target.hole
        );

        async move {
            let live = self
                .render_live(target.boundary, data, attempt, Some(target.boundary))
                .await?;

            let mut html = String::new();
            HtmlWriter::new(&self.tree, &live.outputs).write_children(
                target.boundary,
                &mut html,
                &mut NoHoles,
            )?;

            Ok(ResumedHole {
                hole: target.hole,
                boundary: target.boundary,
                html,
            })
        }
        .instrument(span)
        .await
    }

    async fn render_live(
        &self,
        subtree: NodeId,
        data: &RequestData,
        attempt: AttemptId,
        resumed: Option<NodeId>,
    ) -> Result<LiveRender, JobError> {
        let tree = self.tree.as_ref();
        let channel = SignalChannel::new(attempt, tree.len());
        let diagnostics = AttemptDiagnostics::new(attempt, self.pathname.as_str());
        let coordinator = PostponeCoordinator::new(tree, &channel, &diagnostics);

        if let Some(boundary) = resumed {
            coordinator.restore_postponed(boundary)?;
        }

        let components = tree.components_under(subtree);
        let results = join_all(components.iter().map(|(node, component)| {
            let coordinator = &coordinator;
            let scope = RenderScope::live(*node, data, &channel);
            async move {
                coordinator.begin(*node)?;
                let result = component.render(&scope).await;
                coordinator
                    .settle(*node, result)
                    .map(|settlement| (*node, settlement))
            }
        }))
        .await;

        let mut outputs = vec![None; tree.len()];
        let mut statuses = vec![NodeStatus::Static; tree.len()];
        for result in results {
            let (node, settlement) = result?;
            let message = match settlement {
                Settlement::Completed(html) => {
                    if channel.was_accessed(node) {
                        statuses[node.index()] = NodeStatus::DynamicResolved;
                    }
                    outputs[node.index()] = Some(html);
                    continue;
                }
                Settlement::Failed(message) => message,
                Settlement::Postponed(signal) => {
                    format!("postponed with request data available ({})", signal.reason())
                }
                Settlement::Intercepted { .. } => {
                    "postpone signal intercepted with request data available".to_string()
                }
            };
            return Err(JobError::Render {
                pathname: self.pathname.clone(),
                node,
                message,
            });
        }

        if let Some(boundary) = resumed {
            coordinator.resume(boundary)?;
            for node in tree.descendants(boundary) {
                statuses[node.index()] = NodeStatus::DynamicResolved;
            }
        }

        Ok(LiveRender { outputs, statuses })
    }
}

struct LiveRender {
    outputs: Vec<Option<String>>,
    statuses: Vec<NodeStatus>,
}

fn has_pending_ancestor(tree: &RenderTree, pending: &[bool], node: NodeId) -> bool {
    let mut current = tree.nearest_boundary(node);
    while let Some(boundary) = current {
        if pending[boundary.index()] {
            return true;
        }
        current = tree.nearest_boundary(boundary);
    }
    false
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use ppr_core::CookieJar;
    use ppr_observability::{opt_out_message, RETHROWN_ERRORS_HEADER};

    use super::*;
    use crate::scope::Component;
    use crate::signal::RenderError;
    use crate::tree::View;

    struct Static(&'static str);

    #[async_trait]
    impl Component for Static {
        async fn render(&self, _scope: &RenderScope<'_>) -> Result<String, RenderError> {
            Ok(self.0.to_string())
        }
    }

    struct Session;

    #[async_trait]
    impl Component for Session {
        async fn render(&self, scope: &RenderScope<'_>) -> Result<String, RenderError> {
            let state = match scope.cookie("session")? {
                Some(_) => "Signed In",
                None => "Not Signed In",
            };
            Ok(format!(r#"<p id="state">{}</p>"#, state))
        }
    }

    struct Swallow(Option<&'static str>);

    #[async_trait]
    impl Component for Swallow {
        async fn render(&self, scope: &RenderScope<'_>) -> Result<String, RenderError> {
            match scope.cookies() {
                Ok(_) => Ok("live".to_string()),
                Err(_) => match self.0 {
                    Some(message) => Err(RenderError::failed(message)),
                    None => Ok("swallowed".to_string()),
                },
            }
        }
    }

    struct Broken;

    #[async_trait]
    impl Component for Broken {
        async fn render(&self, _scope: &RenderScope<'_>) -> Result<String, RenderError> {
            Err(RenderError::failed("boom"))
        }
    }

    fn page(dynamic: View) -> Arc<RenderTree> {
        Arc::new(RenderTree::from_view(
            View::element("div")
                .with_id("page")
                .with_child(View::component(Static("<h1>Page</h1>")))
                .with_child(
                    View::boundary("dynamic", "<p>Loading...</p>")
                        .with_child(View::element("div").with_id("dynamic").with_child(dynamic)),
                ),
        ))
    }

    fn signed_in() -> RequestData {
        RequestData {
            cookies: CookieJar::new().with("session", "1"),
            ..RequestData::default()
        }
    }

    #[tokio::test]
    async fn test_prerender_postpones_to_boundary() {
        let job = RenderJob::new(page(View::component(Session)), "/suspense/node");
        let sink = DiagnosticsSink::tracing();

        let outcome = job.prerender(&sink).await.unwrap();

        assert_eq!(outcome.hole_boundaries().len(), 1);
        let boundary = outcome.hole_boundaries()[0];
        assert_eq!(outcome.status(boundary), Some(NodeStatus::DynamicPending));
        assert_eq!(outcome.status(RenderTree::root()), Some(NodeStatus::Static));

        let pending = job.tree().descendants(boundary);
        assert!(pending.len() > 1);
        for node in job.tree().descendants(RenderTree::root()) {
            let expected = if pending.contains(&node) {
                NodeStatus::DynamicPending
            } else {
                NodeStatus::Static
            };
            assert_eq!(outcome.status(node), Some(expected), "node {}", node);
        }
        assert!(!outcome.is_route_dynamic());
        assert!(!outcome.intercepted());
        assert_eq!(outcome.in_flight(), 0);
        assert!(sink.reports().is_empty());
    }

    #[tokio::test]
    async fn test_prerender_without_boundary_is_route_dynamic() {
        let tree = Arc::new(RenderTree::from_view(
            View::element("div").with_child(View::component(Session)),
        ));
        let job = RenderJob::new(tree, "/no-suspense");

        let outcome = job.prerender(&DiagnosticsSink::tracing()).await.unwrap();

        assert!(outcome.is_route_dynamic());
        assert!(outcome.hole_boundaries().is_empty());
        assert!(outcome
            .statuses()
            .iter()
            .all(|s| *s == NodeStatus::DynamicPending));
    }

    #[tokio::test]
    async fn test_resume_matches_full_dynamic() {
        let job = RenderJob::new(page(View::component(Session)), "/suspense/node");
        let outcome = job.prerender(&DiagnosticsSink::tracing()).await.unwrap();
        let data = signed_in();

        let target = ResumeTarget {
            hole: HoleId::new(0),
            boundary: outcome.hole_boundaries()[0],
        };
        let resumed = job.resume_hole(target, &data).await.unwrap();
        let full = job.render_dynamic(&data).await.unwrap();

        assert_eq!(
            resumed.html,
            r#"<div id="dynamic"><p id="state">Signed In</p></div>"#
        );
        assert!(full.html.contains(&resumed.html));
        assert!(full.statuses.contains(&NodeStatus::DynamicResolved));
    }

    #[tokio::test]
    async fn test_swallowed_signal_reports_interception() {
        let job = RenderJob::new(
            page(View::component(Swallow(Some("You are not signed in")))),
            "/suspense/node/fetch-error",
        );
        let sink = DiagnosticsSink::tracing();

        let outcome = job.prerender(&sink).await.unwrap();

        assert!(outcome.intercepted());
        assert_eq!(outcome.hole_boundaries().len(), 1);
        let text = outcome.report().unwrap().render();
        assert!(text.starts_with(&opt_out_message("/suspense/node/fetch-error")));
        assert!(text.contains(RETHROWN_ERRORS_HEADER));
        assert!(text.contains("Error: You are not signed in"));
        assert_eq!(sink.opted_out_routes(), vec!["/suspense/node/fetch-error"]);
    }

    #[tokio::test]
    async fn test_genuine_error_keeps_interception_diagnostics() {
        let tree = Arc::new(RenderTree::from_view(View::fragment(vec![
            View::boundary("a", "").with_child(View::component(Swallow(None))),
            View::component(Broken),
        ])));
        let job = RenderJob::new(tree, "/broken");
        let sink = DiagnosticsSink::tracing();

        let err = job.prerender(&sink).await.unwrap_err();

        assert!(matches!(err, JobError::Render { ref message, .. } if message == "boom"));
        assert_eq!(sink.reports().len(), 1);
        assert!(sink.reports()[0].rethrown().next().is_none());
    }

    #[tokio::test]
    async fn test_nested_postpone_holes_innermost_boundary() {
        let tree = Arc::new(RenderTree::from_view(
            View::boundary("outer", "<p>outer</p>")
                .with_child(View::component(Static("static")))
                .with_child(
                    View::boundary("inner", "<p>inner</p>").with_child(View::component(Session)),
                ),
        ));
        let job = RenderJob::new(tree.clone(), "/suspense/node/nested/1");

        let outcome = job.prerender(&DiagnosticsSink::tracing()).await.unwrap();

        let holes = outcome.hole_boundaries();
        assert_eq!(holes.len(), 1);
        assert_eq!(tree.path(holes[0]), "root > boundary:outer > boundary:inner");
        assert_eq!(outcome.status(NodeId::new(1)), Some(NodeStatus::Static));
    }

    #[tokio::test]
    async fn test_run_resume_rejects_non_boundary() {
        let job = RenderJob::new(page(View::component(Session)), "/suspense/node");
        let data = RequestData::default();
        let mode = RenderMode::Resume {
            holes: vec![ResumeTarget {
                hole: HoleId::new(0),
                boundary: RenderTree::root(),
            }],
            data: &data,
        };

        let err = job.run(mode, &DiagnosticsSink::tracing()).await.unwrap_err();

        assert!(matches!(err, JobError::UnknownBoundary(_)));
    }

    #[tokio::test]
    async fn test_run_full_dynamic_without_cookie() {
        let job = RenderJob::new(page(View::component(Session)), "/suspense/node");
        let data = RequestData::default();

        let output = job
            .run(RenderMode::FullDynamic(&data), &DiagnosticsSink::tracing())
            .await
            .unwrap();

        let JobOutput::Rendered(rendered) = output else {
            panic!("expected a rendered page");
        };
        assert_eq!(
            rendered.html,
            concat!(
                r#"<div id="page"><h1>Page</h1>"#,
                r#"<div id="dynamic"><p id="state">Not Signed In</p></div></div>"#
            )
        );
    }
}

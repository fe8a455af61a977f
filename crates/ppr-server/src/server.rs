//! Request handling.
//!
//! Production requests for eligible routes go through the shell cache: a
//! miss prerenders and stores the route's shell, a hit reuses it, and the
//! holes of the served shell are resumed with the request's data. Every
//! other request renders the whole page with live data.

use std::sync::Arc;

use futures::channel::mpsc;
use futures::future::join_all;
use http::header::CONTENT_TYPE;
use http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use ppr_cache::{
    assemble, CacheError, CacheLookup, CacheStatus, ShellArtifact, ShellCache, ShellHeaders,
    ShellKey, ShellKeyBuilder,
};
use ppr_core::{ClientKind, EngineConfig, PageRequest, RequestData};
use ppr_observability::{DiagnosticsSink, EngineMetrics, MetricsSnapshot};
use ppr_streaming::{StreamError, StreamingSink};
use tracing::Instrument;

use crate::build::{BuildReport, RouteBuild};
use crate::error::ServerError;
use crate::response::{PprResponse, ResponseBody};
use crate::routes::{Route, RouteTable};

/// Chunks buffered between the resume task and the response body.
const STREAM_BUFFER: usize = 16;

const REQUEST_ID_HEADER: HeaderName = HeaderName::from_static("x-request-id");

/// Serves the pages of a route table.
#[derive(Clone)]
pub struct PprServer {
    config: EngineConfig,
    routes: Arc<RouteTable>,
    cache: ShellCache,
    diagnostics: Arc<DiagnosticsSink>,
    metrics: Arc<EngineMetrics>,
}

impl PprServer {
    /// Create a server with an in-memory shell cache and diagnostics
    /// logged through `tracing`.
    pub fn new(config: EngineConfig, routes: RouteTable) -> Result<Self, ServerError> {
        config.validate()?;
        Ok(Self {
            config,
            routes: Arc::new(routes),
            cache: ShellCache::in_memory(),
            diagnostics: Arc::new(DiagnosticsSink::tracing()),
            metrics: Arc::new(EngineMetrics::new()),
        })
    }

    /// Use a different shell cache.
    pub fn with_cache(mut self, cache: ShellCache) -> Self {
        self.cache = cache;
        self
    }

    /// Use a different diagnostics sink.
    pub fn with_diagnostics(mut self, diagnostics: Arc<DiagnosticsSink>) -> Self {
        self.diagnostics = diagnostics;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }

    pub fn cache(&self) -> &ShellCache {
        &self.cache
    }

    pub fn diagnostics(&self) -> &DiagnosticsSink {
        &self.diagnostics
    }

    /// Current engine counters.
    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Serve one request. Failures become error responses.
    pub async fn handle(&self, request: PageRequest) -> PprResponse {
        let request_id = request.request_id.clone();
        let span = tracing::info_span!(
            "request",
            request_id = %request_id,
            pathname = %request.pathname
        );

        let mut response = match self.serve(request).instrument(span.clone()).await {
            Ok(response) => response,
            Err(err) => {
                let _entered = span.enter();
                match &err {
                    ServerError::RouteNotFound(pathname) => {
                        tracing::debug!(pathname = %pathname, "no route");
                    }
                    _ => {
                        self.metrics.record_render_error();
                        tracing::error!(error = %err, "request failed");
                    }
                }
                error_response(&err)
            }
        };

        if let Ok(value) = HeaderValue::from_str(&request_id.0) {
            response.headers_mut().insert(REQUEST_ID_HEADER, value);
        }
        response
    }

    async fn serve(&self, request: PageRequest) -> Result<PprResponse, ServerError> {
        let route = self
            .routes
            .get(&request.pathname)
            .ok_or_else(|| ServerError::RouteNotFound(request.pathname.clone()))?;

        if !self.config.prerenders() || !route.ppr() || request.client == ClientKind::FullPage {
            return self.render_synchronous(&route, &request.data).await;
        }

        let key = self.shell_key(&route, request.locale.as_deref());
        let (status, artifact) = match self.cache.lookup(&key).await? {
            CacheLookup::Hit(artifact) => {
                self.metrics.record_cache_hit();
                (CacheStatus::Hit, artifact)
            }
            CacheLookup::Miss => {
                self.metrics.record_cache_miss();
                let _guard = match self.cache.begin_population(&key) {
                    Ok(guard) => guard,
                    Err(CacheError::AlreadyPopulating { .. }) => {
                        tracing::debug!(key = %key, "shell is being prerendered elsewhere");
                        return self.render_synchronous(&route, &request.data).await;
                    }
                    Err(err) => return Err(err.into()),
                };
                (CacheStatus::Miss, self.populate(&route, key.clone()).await?)
            }
        };

        if !artifact.eligible() {
            tracing::debug!(intercepted = artifact.intercepted(), "shell not servable");
            return self.render_synchronous(&route, &request.data).await;
        }

        let mut shell_headers = ShellHeaders::for_artifact(status, &artifact);
        if self.config.debug_headers {
            shell_headers = shell_headers.with_debug_key(&key);
        }
        tracing::debug!(cache = %status, holes = artifact.holes().len(), "serving shell");

        let document = route.executor().document();
        if !artifact.has_holes() {
            let mut headers = HeaderMap::new();
            shell_headers.apply(&mut headers);
            return Ok(PprResponse::html(
                StatusCode::OK,
                headers,
                document.wrap(artifact.html()),
            ));
        }

        if !self.config.streaming {
            let resumed = route.executor().resume_all(&artifact, &request.data).await?;
            let body = artifact.fill(&resumed)?;
            for _ in &resumed {
                self.metrics.record_hole_resumed();
            }

            // Every hole is resolved in the body.
            shell_headers.postponed = false;
            let mut headers = HeaderMap::new();
            shell_headers.apply(&mut headers);
            return Ok(PprResponse::html(StatusCode::OK, headers, document.wrap(&body)));
        }

        Ok(self.stream(&route, artifact, request, &shell_headers))
    }

    fn stream(
        &self,
        route: &Route,
        artifact: Arc<ShellArtifact>,
        request: PageRequest,
        shell_headers: &ShellHeaders,
    ) -> PprResponse {
        let mut headers = HeaderMap::new();
        headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_static("text/html; charset=utf-8"),
        );
        shell_headers.apply(&mut headers);

        let (tx, rx) = mpsc::channel(STREAM_BUFFER);
        let executor = route.executor().clone();
        let metrics = Arc::clone(&self.metrics);
        let PageRequest {
            request_id,
            data,
            timing,
            ..
        } = request;
        let span = tracing::info_span!("stream", request_id = %request_id, pathname = %route.pathname());

        tokio::spawn(
            async move {
                let mut sink = StreamingSink::new(tx, timing);
                match executor.stream(&artifact, &data, &mut sink).await {
                    Ok(summary) => {
                        for _ in 0..summary.holes_sent {
                            metrics.record_hole_resumed();
                        }
                        tracing::debug!(
                            holes = summary.holes_sent,
                            time_to_shell = ?sink.timing().time_to_shell(),
                            "stream finished"
                        );
                    }
                    Err(StreamError::Disconnected(reason)) => {
                        metrics.record_abandoned_stream();
                        tracing::debug!(%reason, phase = ?sink.phase(), "stream abandoned");
                    }
                    Err(err) => {
                        metrics.record_render_error();
                        tracing::error!(error = %err, "resume failed");
                    }
                }
            }
            .instrument(span),
        );

        PprResponse::new(StatusCode::OK, headers, ResponseBody::Streaming(rx))
    }

    async fn render_synchronous(
        &self,
        route: &Route,
        data: &RequestData,
    ) -> Result<PprResponse, ServerError> {
        let body = route.executor().render_full(data).await?;
        self.metrics.record_synchronous_render();
        Ok(PprResponse::html(StatusCode::OK, HeaderMap::new(), body))
    }

    /// Prerender a route and store its shell.
    async fn populate(&self, route: &Route, key: ShellKey) -> Result<Arc<ShellArtifact>, ServerError> {
        let job = route.job();
        let outcome = job.prerender(&self.diagnostics).await?;
        let artifact = assemble(&outcome, job.tree())?;
        let interceptions = outcome.report().map_or(0, |report| report.interceptions.len());
        self.metrics
            .record_prerender(artifact.holes().len(), interceptions);

        Ok(self.cache.store(key, artifact).await?)
    }

    fn shell_key(&self, route: &Route, locale: Option<&str>) -> ShellKey {
        ShellKeyBuilder::new(self.config.build_id.as_str())
            .maybe_locale(locale.or(route.config().locale.as_deref()))
            .build(route.pathname())
    }

    /// Prerender a route's shell ahead of requests.
    pub async fn prerender(&self, pathname: &str) -> Result<Arc<ShellArtifact>, ServerError> {
        let route = self
            .routes
            .get(pathname)
            .ok_or_else(|| ServerError::RouteNotFound(pathname.to_string()))?;
        let key = self.shell_key(&route, None);
        let _guard = self.cache.begin_population(&key)?;
        self.populate(&route, key).await
    }

    /// Prerender every route taking part in partial prerendering and
    /// store the shells.
    pub async fn prerender_all(&self) -> BuildReport {
        let span = tracing::info_span!("build", build_id = %self.config.build_id);

        async move {
            let builds = join_all(self.routes.iter().map(|route| async move {
                let mut build = RouteBuild {
                    pathname: route.pathname().to_string(),
                    ppr: route.ppr(),
                    holes: 0,
                    eligible: false,
                    intercepted: false,
                    error: None,
                };
                if !route.ppr() {
                    return build;
                }

                match self.prerender(route.pathname()).await {
                    Ok(artifact) => {
                        build.holes = artifact.holes().len();
                        build.eligible = artifact.eligible();
                        build.intercepted = artifact.intercepted();
                    }
                    Err(err) => {
                        self.metrics.record_render_error();
                        tracing::error!(pathname = %route.pathname(), error = %err, "prerender failed");
                        build.error = Some(err.to_string());
                    }
                }
                build
            }))
            .await;

            let report = BuildReport { routes: builds };
            tracing::info!(
                routes = report.routes.len(),
                failures = report.failures().count(),
                "prerender finished"
            );
            report
        }
        .instrument(span)
        .await
    }
}

fn error_response(err: &ServerError) -> PprResponse {
    let status = err.status();
    let body = match status {
        StatusCode::NOT_FOUND => "This page could not be found.",
        _ => "Internal Server Error",
    };
    PprResponse::html(status, HeaderMap::new(), body.to_string())
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use ppr_cache::header_names::{X_NEXTJS_CACHE, X_NEXTJS_POSTPONED, X_PPR_CACHE_KEY};
    use ppr_core::RouteConfig;
    use ppr_observability::MemoryWriter;
    use ppr_render::{Component, RenderError, RenderScope, View};

    use super::*;

    struct SessionState;

    #[async_trait]
    impl Component for SessionState {
        async fn render(&self, scope: &RenderScope<'_>) -> Result<String, RenderError> {
            let state = match scope.cookie("session")? {
                Some(_) => "Signed In",
                None => "Not Signed In",
            };
            Ok(format!("<p id=\"state\">{}</p>", state))
        }
    }

    struct Broken;

    #[async_trait]
    impl Component for Broken {
        async fn render(&self, _scope: &RenderScope<'_>) -> Result<String, RenderError> {
            Err(RenderError::failed("database unavailable"))
        }
    }

    fn page(dynamic: View) -> View {
        View::element("main")
            .with_id("page")
            .with_children([View::text("static"), dynamic])
    }

    fn routes() -> RouteTable {
        let suspense = page(
            View::boundary("dynamic", "<p>Loading...</p>").with_child(View::component(SessionState)),
        );
        RouteTable::new()
            .with(Route::new(RouteConfig::new("/suspense/node"), suspense).unwrap())
            .with(Route::new(RouteConfig::new("/static"), page(View::text("done"))).unwrap())
            .with(
                Route::new(
                    RouteConfig::new("/no-suspense"),
                    page(View::component(SessionState)),
                )
                .unwrap(),
            )
            .with(
                Route::new(
                    RouteConfig::new("/opted-out").with_ppr(false),
                    page(View::boundary("dynamic", "").with_child(View::component(SessionState))),
                )
                .unwrap(),
            )
            .with(
                Route::new(
                    RouteConfig::new("/broken"),
                    page(View::component(Broken)),
                )
                .unwrap(),
            )
    }

    fn server(config: EngineConfig) -> PprServer {
        PprServer::new(config, routes()).unwrap()
    }

    #[tokio::test]
    async fn test_miss_then_hit_with_postponed_header() {
        let server = server(EngineConfig::production("b1"));

        let first = server.handle(PageRequest::new("/suspense/node")).await;
        assert_eq!(first.status(), StatusCode::OK);
        assert_eq!(first.header(X_NEXTJS_CACHE), Some("MISS"));
        assert_eq!(first.header(X_NEXTJS_POSTPONED), Some("1"));
        assert!(first.is_streaming());
        assert!(first.header("x-request-id").is_some());
        let first_body = first.document().await.unwrap();

        let second = server.handle(PageRequest::new("/suspense/node")).await;
        assert_eq!(second.status(), StatusCode::OK);
        assert_eq!(second.header(X_NEXTJS_CACHE), Some("HIT"));
        assert_eq!(second.header(X_NEXTJS_POSTPONED), Some("1"));
        assert_eq!(second.document().await.unwrap(), first_body);

        let metrics = server.metrics();
        assert_eq!(metrics.prerenders, 1);
        assert_eq!(metrics.cache_hits, 1);
        assert_eq!(metrics.cache_misses, 1);
    }

    #[tokio::test]
    async fn test_streamed_hole_reads_request_cookie() {
        let server = server(EngineConfig::production("b1"));

        let anonymous = server.handle(PageRequest::new("/suspense/node")).await;
        assert!(anonymous.document().await.unwrap().contains("Not Signed In"));

        let signed_in = server
            .handle(PageRequest::new("/suspense/node").with_cookie("session", "1"))
            .await;
        let body = signed_in.document().await.unwrap();
        assert!(body.contains(">Signed In<"));
        assert!(!body.contains("Loading..."));
    }

    #[tokio::test]
    async fn test_static_route_has_no_postponed_header() {
        let server = server(EngineConfig::production("b1"));

        let response = server.handle(PageRequest::new("/static")).await;

        assert_eq!(response.header(X_NEXTJS_CACHE), Some("MISS"));
        assert_eq!(response.header(X_NEXTJS_POSTPONED), None);
        assert!(!response.is_streaming());
        assert!(response.text().await.unwrap().contains("done"));
    }

    #[tokio::test]
    async fn test_development_renders_without_cache_headers() {
        let server = server(EngineConfig::development());

        let response = server
            .handle(PageRequest::new("/suspense/node").with_cookie("session", "1"))
            .await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.header(X_NEXTJS_CACHE), None);
        assert_eq!(response.header(X_NEXTJS_POSTPONED), None);
        assert!(response.text().await.unwrap().contains(">Signed In<"));
        assert_eq!(server.cache().len().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_full_page_client_gets_complete_body() {
        let server = server(EngineConfig::production("b1"));

        let response = server
            .handle(PageRequest::new("/suspense/node").with_client(ClientKind::FullPage))
            .await;

        assert_eq!(response.header(X_NEXTJS_CACHE), None);
        assert_eq!(response.header(X_NEXTJS_POSTPONED), None);
        let body = response.text().await.unwrap();
        assert!(body.contains("Not Signed In"));
        assert!(!body.contains("ppr:hole"));
    }

    #[tokio::test]
    async fn test_streaming_disabled_resolves_holes() {
        let server = server(EngineConfig::production("b1").with_streaming(false));

        let response = server.handle(PageRequest::new("/suspense/node")).await;

        assert_eq!(response.header(X_NEXTJS_CACHE), Some("MISS"));
        assert_eq!(response.header(X_NEXTJS_POSTPONED), None);
        assert!(!response.is_streaming());
        let body = response.text().await.unwrap();
        assert!(body.contains("Not Signed In"));
        assert!(!body.contains("ppr:hole"));
        assert_eq!(server.metrics().holes_resumed, 1);
    }

    #[tokio::test]
    async fn test_route_without_boundary_renders_synchronously() {
        let server = server(EngineConfig::production("b1"));

        let response = server.handle(PageRequest::new("/no-suspense")).await;

        assert_eq!(response.header(X_NEXTJS_CACHE), None);
        assert_eq!(response.header(X_NEXTJS_POSTPONED), None);
        assert!(response.text().await.unwrap().contains("Not Signed In"));
        assert_eq!(server.cache().len().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_non_ppr_route_is_never_cached() {
        let server = server(EngineConfig::production("b1"));

        let response = server.handle(PageRequest::new("/opted-out")).await;

        assert_eq!(response.header(X_NEXTJS_CACHE), None);
        assert_eq!(server.cache().len().await.unwrap(), 0);
        assert_eq!(server.metrics().synchronous_renders, 1);
    }

    #[tokio::test]
    async fn test_unknown_route_is_404() {
        let server = server(EngineConfig::production("b1"));

        let response = server.handle(PageRequest::new("/missing")).await;

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            response.text().await.unwrap(),
            "This page could not be found."
        );
    }

    #[tokio::test]
    async fn test_render_error_is_500_and_not_cached() {
        let server = server(EngineConfig::production("b1"));

        let response = server.handle(PageRequest::new("/broken")).await;

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(server.cache().len().await.unwrap(), 0);
        assert_eq!(server.metrics().render_errors, 1);
    }

    #[tokio::test]
    async fn test_concurrent_miss_renders_synchronously() {
        let server = server(EngineConfig::production("b1"));
        let key = ShellKeyBuilder::new("b1").build("/suspense/node");
        let guard = server.cache().begin_population(&key).unwrap();

        let response = server
            .handle(PageRequest::new("/suspense/node").with_cookie("session", "1"))
            .await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.header(X_NEXTJS_CACHE), None);
        assert_eq!(response.header(X_NEXTJS_POSTPONED), None);
        assert!(!response.is_streaming());
        assert!(response.text().await.unwrap().contains(">Signed In<"));
        assert_eq!(server.cache().len().await.unwrap(), 0);

        let metrics = server.metrics();
        assert_eq!(metrics.synchronous_renders, 1);
        assert_eq!(metrics.cache_misses, 1);
        assert_eq!(metrics.prerenders, 0);

        drop(guard);
        let populated = server.handle(PageRequest::new("/suspense/node")).await;
        assert_eq!(populated.header(X_NEXTJS_CACHE), Some("MISS"));
        assert_eq!(server.cache().len().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_debug_headers_carry_cache_key() {
        let mut config = EngineConfig::production("b1");
        config.debug_headers = true;
        let server = server(config);

        let response = server
            .handle(PageRequest::new("/static").with_locale("en"))
            .await;

        assert_eq!(response.header(X_PPR_CACHE_KEY), Some("b1|/static|locale=en"));
    }

    #[tokio::test]
    async fn test_prerender_all_reports_routes() {
        let writer = Arc::new(MemoryWriter::new());
        let server = server(EngineConfig::production("b1"))
            .with_diagnostics(Arc::new(DiagnosticsSink::new(writer.clone())));

        let report = server.prerender_all().await;

        assert_eq!(report.routes.len(), 5);
        let node = report
            .routes
            .iter()
            .find(|r| r.pathname == "/suspense/node")
            .unwrap();
        assert_eq!(node.holes, 1);
        assert!(node.eligible);
        assert!(!report.is_success());
        assert!(writer.blocks().is_empty());

        let hit = server.handle(PageRequest::new("/suspense/node")).await;
        assert_eq!(hit.header(X_NEXTJS_CACHE), Some("HIT"));
    }
}

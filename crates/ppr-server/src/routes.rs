//! Route table.

use std::collections::BTreeMap;
use std::sync::Arc;

use ppr_cache::normalize_pathname;
use ppr_core::{ConfigError, RouteConfig};
use ppr_render::{RenderJob, RenderTree, View};
use ppr_streaming::{Document, HeadContent, ResumeExecutor};

/// A servable page: its configuration and render tree.
#[derive(Debug, Clone)]
pub struct Route {
    config: RouteConfig,
    executor: ResumeExecutor,
}

impl Route {
    /// Create a route from its page view.
    pub fn new(config: RouteConfig, view: View) -> Result<Self, ConfigError> {
        config.validate()?;

        let pathname = normalize_pathname(&config.pathname);
        let head = config
            .title
            .as_deref()
            .map(HeadContent::new)
            .unwrap_or_default();
        let job = RenderJob::new(Arc::new(RenderTree::from_view(view)), pathname.clone());
        let executor = ResumeExecutor::new(job, Document::new(head));

        Ok(Self {
            config: RouteConfig { pathname, ..config },
            executor,
        })
    }

    /// Route pathname.
    pub fn pathname(&self) -> &str {
        &self.config.pathname
    }

    /// Route configuration.
    pub fn config(&self) -> &RouteConfig {
        &self.config
    }

    /// Whether the route takes part in partial prerendering.
    pub fn ppr(&self) -> bool {
        self.config.ppr
    }

    /// Render job for the route's tree.
    pub fn job(&self) -> &RenderJob {
        self.executor.job()
    }

    /// Resume executor for the route.
    pub fn executor(&self) -> &ResumeExecutor {
        &self.executor
    }
}

/// Routes by normalized pathname.
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    routes: BTreeMap<String, Arc<Route>>,
}

impl RouteTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a route, replacing any route with the same pathname.
    pub fn insert(&mut self, route: Route) {
        self.routes
            .insert(route.pathname().to_string(), Arc::new(route));
    }

    /// Builder form of [`RouteTable::insert`].
    pub fn with(mut self, route: Route) -> Self {
        self.insert(route);
        self
    }

    /// Look up a route. Trailing slashes are ignored.
    pub fn get(&self, pathname: &str) -> Option<Arc<Route>> {
        self.routes.get(&normalize_pathname(pathname)).cloned()
    }

    /// Routes in pathname order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<Route>> {
        self.routes.values()
    }

    /// Number of routes.
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn route(pathname: &str) -> Route {
        Route::new(RouteConfig::new(pathname), View::text("hi")).unwrap()
    }

    #[test]
    fn test_lookup_ignores_trailing_slash() {
        let table = RouteTable::new().with(route("/static/")).with(route("/"));

        assert_eq!(table.len(), 2);
        assert_eq!(table.get("/static").unwrap().pathname(), "/static");
        assert!(table.get("/static/").is_some());
        assert!(table.get("/").is_some());
        assert!(table.get("/missing").is_none());
    }

    #[test]
    fn test_invalid_pathname_rejected() {
        let err = Route::new(RouteConfig::new("static"), View::text("hi")).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidPathname(_)));
    }
}

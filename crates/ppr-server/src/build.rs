//! Build-time prerender report.

use serde::{Deserialize, Serialize};

/// How a route is served after the build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteKind {
    /// Prerendered with no holes.
    Static,
    /// Prerendered shell with holes resumed per request.
    Partial,
    /// Rendered per request.
    Dynamic,
}

impl RouteKind {
    /// Build log symbol.
    pub fn symbol(self) -> &'static str {
        match self {
            Self::Static => "○",
            Self::Partial => "◐",
            Self::Dynamic => "λ",
        }
    }

    /// Build log legend text.
    pub fn describe(self) -> &'static str {
        match self {
            Self::Static => "(Static)  prerendered as static content",
            Self::Partial => "(Partial Prerender)  prerendered as static HTML with dynamic server-streamed content",
            Self::Dynamic => "(Dynamic)  server-rendered on demand",
        }
    }
}

/// Build result of one route.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteBuild {
    pub pathname: String,
    /// Route takes part in partial prerendering.
    pub ppr: bool,
    /// Holes in the stored shell.
    pub holes: usize,
    /// Stored shell can be served with resume.
    pub eligible: bool,
    /// A postpone signal was intercepted.
    pub intercepted: bool,
    /// Prerender failure, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RouteBuild {
    /// How the route is served.
    pub fn kind(&self) -> RouteKind {
        if !self.ppr || !self.eligible || self.error.is_some() {
            RouteKind::Dynamic
        } else if self.holes > 0 {
            RouteKind::Partial
        } else {
            RouteKind::Static
        }
    }
}

/// Result of prerendering every route.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildReport {
    pub routes: Vec<RouteBuild>,
}

impl BuildReport {
    /// Routes whose prerender failed.
    pub fn failures(&self) -> impl Iterator<Item = &RouteBuild> {
        self.routes.iter().filter(|r| r.error.is_some())
    }

    /// Whether every prerender succeeded.
    pub fn is_success(&self) -> bool {
        self.failures().next().is_none()
    }

    /// Number of routes of a kind.
    pub fn count(&self, kind: RouteKind) -> usize {
        self.routes.iter().filter(|r| r.kind() == kind).count()
    }

    /// Render the route listing printed at the end of a build.
    pub fn render(&self) -> String {
        let mut out = String::from("Route\n");
        let last = self.routes.len().saturating_sub(1);

        for (i, route) in self.routes.iter().enumerate() {
            let branch = match i {
                0 if last == 0 => "─",
                0 => "┌",
                i if i == last => "└",
                _ => "├",
            };
            out.push_str(&format!("{} {} {}", branch, route.kind().symbol(), route.pathname));
            if let Some(error) = &route.error {
                out.push_str(&format!("  (failed: {})", error));
            }
            out.push('\n');
        }

        out.push('\n');
        for kind in [RouteKind::Static, RouteKind::Partial, RouteKind::Dynamic] {
            if self.count(kind) > 0 {
                out.push_str(&format!("{}  {}\n", kind.symbol(), kind.describe()));
            }
        }

        out
    }

    /// Format as JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build(pathname: &str, holes: usize, eligible: bool) -> RouteBuild {
        RouteBuild {
            pathname: pathname.to_string(),
            ppr: true,
            holes,
            eligible,
            intercepted: false,
            error: None,
        }
    }

    #[test]
    fn test_route_kind() {
        assert_eq!(build("/static", 0, true).kind(), RouteKind::Static);
        assert_eq!(build("/suspense/node", 1, true).kind(), RouteKind::Partial);
        assert_eq!(build("/no-suspense", 0, false).kind(), RouteKind::Dynamic);

        let failed = RouteBuild {
            error: Some("boom".into()),
            ..build("/a", 0, true)
        };
        assert_eq!(failed.kind(), RouteKind::Dynamic);
    }

    #[test]
    fn test_render_listing() {
        let report = BuildReport {
            routes: vec![
                build("/no-suspense", 0, false),
                build("/static", 0, true),
                build("/suspense/node", 1, true),
            ],
        };

        let text = report.render();
        assert!(text.contains("┌ λ /no-suspense"));
        assert!(text.contains("├ ○ /static"));
        assert!(text.contains("└ ◐ /suspense/node"));
        assert!(text.contains("(Partial Prerender)"));
        assert!(report.is_success());
    }
}

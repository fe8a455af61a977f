//! Per-request data access during a render.

use async_trait::async_trait;
use http::HeaderMap;
use ppr_core::{CookieJar, NodeId, RequestData};

use crate::signal::{PostponeReason, RenderError, SignalChannel};

/// Application render logic for one node.
///
/// Implementations read per-request data only through the [`RenderScope`]
/// and must propagate the postpone signal with `?`.
#[async_trait]
pub trait Component: Send + Sync {
    /// Render this node to html.
    async fn render(&self, scope: &RenderScope<'_>) -> Result<String, RenderError>;

    /// Name used in diagnostics paths.
    fn name(&self) -> &str {
        "component"
    }
}

#[derive(Debug, Clone, Copy)]
enum Access<'a> {
    Postpone(&'a SignalChannel),
    Live {
        data: &'a RequestData,
        channel: &'a SignalChannel,
    },
}

/// Handle a component uses to read per-request data.
///
/// During a prerender every read raises the postpone signal instead of
/// returning a value.
#[derive(Debug, Clone, Copy)]
pub struct RenderScope<'a> {
    node: NodeId,
    access: Access<'a>,
}

impl<'a> RenderScope<'a> {
    /// Scope for a prerender: reads postpone.
    pub fn prerender(node: NodeId, channel: &'a SignalChannel) -> Self {
        Self {
            node,
            access: Access::Postpone(channel),
        }
    }

    /// Scope with live request data.
    pub fn live(node: NodeId, data: &'a RequestData, channel: &'a SignalChannel) -> Self {
        Self {
            node,
            access: Access::Live { data, channel },
        }
    }

    /// Node being rendered.
    pub fn node(&self) -> NodeId {
        self.node
    }

    /// Whether reads postpone.
    pub fn is_prerender(&self) -> bool {
        matches!(self.access, Access::Postpone(_))
    }

    /// Access the request data, postponing during a prerender.
    pub fn request_data(&self, reason: PostponeReason) -> Result<&'a RequestData, RenderError> {
        match self.access {
            Access::Postpone(channel) => Err(channel.raise(self.node, reason)),
            Access::Live { data, channel } => {
                channel.note_access(self.node);
                Ok(data)
            }
        }
    }

    /// Request cookies.
    pub fn cookies(&self) -> Result<&'a CookieJar, RenderError> {
        Ok(&self.request_data(PostponeReason::Cookies)?.cookies)
    }

    /// A single request cookie.
    pub fn cookie(&self, name: &str) -> Result<Option<&'a str>, RenderError> {
        Ok(self.cookies()?.get(name))
    }

    /// Request headers.
    pub fn headers(&self) -> Result<&'a HeaderMap, RenderError> {
        Ok(&self.request_data(PostponeReason::Headers)?.headers)
    }

    /// Declare that the following data fetch must not be cached.
    pub fn no_store(&self, what: &str) -> Result<(), RenderError> {
        self.request_data(PostponeReason::NoStore(what.to_string()))
            .map(|_| ())
    }
}

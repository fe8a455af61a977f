//! Components of the demo pages.
//!
//! Each reads the `session` cookie and renders the signed-in state. The
//! interception components wrap that read in a catch-all the way careless
//! application code does.

use async_trait::async_trait;
use ppr_server::prelude::{Component, RenderError, RenderScope};

/// Cookie that marks a signed-in visitor.
pub const SESSION_COOKIE: &str = "session";

/// Session API the fetch component declares uncacheable.
const SESSION_API: &str = "https://next-data-api-endpoint.vercel.app/api/random";

/// Html of the dynamic slot.
pub fn state_html(signed_in: bool) -> String {
    let state = if signed_in { "Signed In" } else { "Not Signed In" };
    format!(r#"<div id="dynamic"><div id="state">{}</div></div>"#, state)
}

/// Renders the signed-in state from the session cookie.
#[derive(Debug, Default)]
pub struct SessionState;

#[async_trait]
impl Component for SessionState {
    async fn render(&self, scope: &RenderScope<'_>) -> Result<String, RenderError> {
        let signed_in = scope.cookie(SESSION_COOKIE)?.is_some();
        Ok(state_html(signed_in))
    }

    fn name(&self) -> &str {
        "Dynamic"
    }
}

/// Reads cookies inside a catch-all and throws its own error instead.
#[derive(Debug, Default)]
pub struct CookiesError;

#[async_trait]
impl Component for CookiesError {
    async fn render(&self, scope: &RenderScope<'_>) -> Result<String, RenderError> {
        match scope.cookie(SESSION_COOKIE) {
            Ok(session) => Ok(state_html(session.is_some())),
            Err(_) => Err(RenderError::failed("Failed to read cookies")),
        }
    }

    fn name(&self) -> &str {
        "CookiesError"
    }
}

/// Reads cookies inside a catch-all and renders as signed out on failure.
#[derive(Debug, Default)]
pub struct CookiesErrorNoThrow;

#[async_trait]
impl Component for CookiesErrorNoThrow {
    async fn render(&self, scope: &RenderScope<'_>) -> Result<String, RenderError> {
        let signed_in = scope
            .cookie(SESSION_COOKIE)
            .map(|session| session.is_some())
            .unwrap_or(false);
        Ok(state_html(signed_in))
    }

    fn name(&self) -> &str {
        "CookiesErrorNoThrow"
    }
}

/// Fetches the session without caching, converting any failure into a
/// sign-in error.
#[derive(Debug, Default)]
pub struct FetchError;

#[async_trait]
impl Component for FetchError {
    async fn render(&self, scope: &RenderScope<'_>) -> Result<String, RenderError> {
        let fetched = scope
            .no_store(SESSION_API)
            .and_then(|()| scope.cookie(SESSION_COOKIE));
        match fetched {
            Ok(session) => Ok(state_html(session.is_some())),
            Err(_) => Err(RenderError::failed("You are not signed in")),
        }
    }

    fn name(&self) -> &str {
        "FetchError"
    }
}

/// Same as [`SessionState`] but re-raises the postpone signal from its
/// catch-all, so partial prerendering keeps working.
#[derive(Debug, Default)]
pub struct GuardedSession;

#[async_trait]
impl Component for GuardedSession {
    async fn render(&self, scope: &RenderScope<'_>) -> Result<String, RenderError> {
        match scope.cookie(SESSION_COOKIE) {
            Ok(session) => Ok(state_html(session.is_some())),
            Err(err) => {
                let err = err.rethrow_if_postpone()?;
                tracing::warn!(error = %err, "session lookup failed");
                Ok(state_html(false))
            }
        }
    }

    fn name(&self) -> &str {
        "GuardedSession"
    }
}

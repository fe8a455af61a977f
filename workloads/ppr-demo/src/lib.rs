//! Partial prerendering demo workload.
//!
//! A small application whose pages show every shape the engine handles:
//! - a dynamic slot in a suspense boundary (`/suspense/node`, `/suspense/edge`)
//! - slots under nested boundaries and nested layouts
//! - a dynamic read with no boundary (`/no-suspense`)
//! - a fully static page
//! - catch-alls that intercept the postpone signal

mod components;
mod pages;

use ppr_server::prelude::{ConfigError, Route, RouteConfig, RouteTable, Runtime, View};

pub use components::*;
pub use pages::*;

/// Pathnames served by the demo, in declaration order.
pub const PATHNAMES: &[&str] = &[
    "/suspense/node",
    "/suspense/edge",
    "/suspense/node/nested/1",
    "/suspense/node/nested/2",
    "/suspense/node/nested/3",
    "/loading/nested/1",
    "/loading/nested/2",
    "/loading/nested/3",
    "/no-suspense",
    "/static",
    "/suspense/node/guarded",
    "/suspense/node/cookies-error",
    "/suspense/node/cookies-error-no-throw",
    "/suspense/node/fetch-error",
];

/// Pathnames whose pages intercept the postpone signal.
pub const INTERCEPTING: &[&str] = &[
    "/suspense/node/cookies-error",
    "/suspense/node/cookies-error-no-throw",
    "/suspense/node/fetch-error",
];

fn route(pathname: &str, view: View) -> Result<Route, ConfigError> {
    Route::new(RouteConfig::new(pathname).with_title("PPR Demo"), view)
}

/// Build the demo route table.
pub fn routes() -> Result<RouteTable, ConfigError> {
    let mut table = RouteTable::new()
        .with(route("/suspense/node", suspense("Node", SessionState))?)
        .with(Route::new(
            RouteConfig::new("/suspense/edge")
                .with_title("PPR Demo")
                .with_runtime(Runtime::Edge),
            suspense("Edge", SessionState),
        )?)
        .with(route("/no-suspense", no_suspense())?)
        .with(route("/static", static_page())?)
        .with(route("/suspense/node/guarded", suspense("Guarded", GuardedSession))?)
        .with(route(
            "/suspense/node/cookies-error",
            suspense("Cookies Error", CookiesError),
        )?)
        .with(route(
            "/suspense/node/cookies-error-no-throw",
            suspense("Cookies Error No Throw", CookiesErrorNoThrow),
        )?)
        .with(route(
            "/suspense/node/fetch-error",
            suspense("Fetch Error", FetchError),
        )?);

    for depth in 1..=3 {
        table.insert(route(
            &format!("/suspense/node/nested/{}", depth),
            nested_suspense(depth),
        )?);
        table.insert(route(
            &format!("/loading/nested/{}", depth),
            nested_loading(depth),
        )?);
    }

    Ok(table)
}

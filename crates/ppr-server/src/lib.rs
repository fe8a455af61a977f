//! Request handling for the partial prerendering engine.
//!
//! A [`PprServer`] owns a [`RouteTable`], the shell cache and the
//! diagnostics sink. In production it serves eligible routes as a cached
//! static shell followed by streamed hole content; everything else is
//! rendered synchronously with live request data.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use ppr_server::prelude::*;
//!
//! let routes = RouteTable::new().with(Route::new(
//!     RouteConfig::new("/suspense/node"),
//!     View::element("main").with_child(
//!         View::boundary("dynamic", "<p>Loading...</p>").with_child(View::component(State)),
//!     ),
//! )?);
//!
//! let server = PprServer::new(EngineConfig::production("build-1"), routes)?;
//! let response = server.handle(PageRequest::new("/suspense/node")).await;
//! assert_eq!(response.header("x-nextjs-postponed"), Some("1"));
//! ```

mod build;
mod error;
pub mod prelude;
mod response;
mod routes;
mod server;

pub use build::*;
pub use error::*;
pub use response::*;
pub use routes::*;
pub use server::*;

//! Prelude for convenient imports.
//!
//! ```rust,ignore
//! use ppr_server::prelude::*;
//! ```

pub use async_trait::async_trait;
pub use http::{HeaderMap, StatusCode};

pub use ppr_cache::*;
pub use ppr_core::*;
pub use ppr_observability::*;
pub use ppr_render::*;
pub use ppr_streaming::*;

pub use crate::{
    BuildReport, PprResponse, PprServer, ResponseBody, Route, RouteBuild, RouteKind, RouteTable,
    ServerError,
};

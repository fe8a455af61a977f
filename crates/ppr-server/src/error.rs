//! Error types for request handling.

use http::StatusCode;
use ppr_cache::{AssembleError, CacheError};
use ppr_core::ConfigError;
use ppr_render::JobError;
use ppr_streaming::StreamError;
use thiserror::Error;

/// Errors that can occur while serving a page.
#[derive(Error, Debug)]
pub enum ServerError {
    /// No route for the pathname.
    #[error("route not found: {0}")]
    RouteNotFound(String),

    /// Invalid engine or route configuration.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Render attempt failed.
    #[error("render error: {0}")]
    Job(#[from] JobError),

    /// Shell assembly failed.
    #[error("assembly error: {0}")]
    Assemble(#[from] AssembleError),

    /// Shell cache failed.
    #[error("cache error: {0}")]
    Cache(#[from] CacheError),

    /// Streaming failed.
    #[error("streaming error: {0}")]
    Stream(#[from] StreamError),
}

impl ServerError {
    /// Response status for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::RouteNotFound(_) => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            ServerError::RouteNotFound("/x".into()).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ServerError::Config(ConfigError::EmptyBuildId).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
